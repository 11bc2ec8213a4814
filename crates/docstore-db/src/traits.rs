use crate::error::{DbError, DbResult};
use crate::value::{Row, SqlValue};

/// A restartable, forward-only sequence of result rows.
pub trait RowCursor: Send {
    /// Number of rows the statement produced.
    fn total(&self) -> usize;

    /// Return to the first row.
    fn rewind(&mut self);

    /// Advance and return the next row, or `None` once exhausted.
    fn next_row(&mut self) -> Option<Row>;

    /// `true` once every row has been returned.
    fn is_eof(&self) -> bool;
}

/// The relational engine as seen by the document store.
///
/// Implementations must be thread-safe (`Send + Sync`). [`Database::perform`]
/// is the unit of atomic work: an implementation shared between threads
/// must keep other callers out of the connection from `begin` to `commit`.
/// Bare `begin`/`commit` pairs carry no such guarantee.
pub trait Database: Send + Sync {
    /// Prefixed, quoted name of a logical table.
    fn table(&self, name: &str) -> String;

    /// Quote an identifier (column or alias).
    fn quote_ident(&self, ident: &str) -> String {
        format!("\"{}\"", ident.replace('"', "\"\""))
    }

    /// Render a value as an SQL literal.
    fn quote(&self, value: &SqlValue) -> String {
        match value {
            SqlValue::Null => "NULL".to_string(),
            SqlValue::Integer(n) => n.to_string(),
            SqlValue::Real(r) => r.to_string(),
            SqlValue::Text(s) => format!("'{}'", s.replace('\'', "''")),
            SqlValue::Now => self.now().to_string(),
        }
    }

    /// SQL expression evaluating to the current time in the engine's
    /// timestamp text form.
    fn now(&self) -> &str;

    /// Execute a statement and return the number of rows changed.
    fn exec(&self, sql: &str, params: &[SqlValue]) -> DbResult<usize>;

    /// First row of a query, or `None` if it produced no rows.
    fn row(&self, sql: &str, params: &[SqlValue]) -> DbResult<Option<Row>>;

    /// Run a query and return a cursor over its rows.
    fn query(&self, sql: &str, params: &[SqlValue]) -> DbResult<Box<dyn RowCursor>>;

    /// Execute several `;`-separated statements without parameters.
    fn execute_batch(&self, sql: &str) -> DbResult<()>;

    fn begin(&self) -> DbResult<()>;

    /// Commit the open transaction.
    ///
    /// Returns `Ok(false)` when the engine rejected the commit because of a
    /// conflicting writer; the transaction has been rolled back and the
    /// whole unit of work may be retried.
    fn commit(&self) -> DbResult<bool>;

    /// Roll back the open transaction, if any.
    fn rollback(&self) -> DbResult<()>;

    /// Insert one row. Fields whose value is [`SqlValue::Now`] are set to
    /// the engine's clock instead of a bound parameter.
    fn insert(&self, table: &str, fields: &[(&str, SqlValue)]) -> DbResult<()> {
        if fields.is_empty() {
            return Err(DbError::EmptyInsert(table.to_string()));
        }
        let mut columns = Vec::with_capacity(fields.len());
        let mut placeholders = Vec::with_capacity(fields.len());
        let mut params = Vec::with_capacity(fields.len());
        for (name, value) in fields {
            columns.push(self.quote_ident(name));
            match value {
                SqlValue::Now => placeholders.push(self.now().to_string()),
                other => {
                    placeholders.push("?".to_string());
                    params.push(other.clone());
                }
            }
        }
        let sql = format!(
            "INSERT INTO {} ({}) VALUES ({})",
            self.table(table),
            columns.join(", "),
            placeholders.join(", ")
        );
        self.exec(&sql, &params).map(|_| ())
    }

    /// Run `work` inside a transaction.
    ///
    /// The transaction is rolled back if `work` fails or returns `false`.
    /// Otherwise the commit outcome is returned: `Ok(false)` on conflict.
    fn perform(&self, work: &mut dyn FnMut() -> DbResult<bool>) -> DbResult<bool> {
        transaction(self, work)
    }
}

/// `begin`, `work`, then `commit` or `rollback` on `db`. Callers hold
/// whatever exclusivity `db` needs around it.
pub(crate) fn transaction<D: Database + ?Sized>(
    db: &D,
    work: &mut dyn FnMut() -> DbResult<bool>,
) -> DbResult<bool> {
    db.begin()?;
    match work() {
        Ok(true) => db.commit(),
        Ok(false) => {
            db.rollback()?;
            Ok(false)
        }
        Err(e) => {
            if let Err(rollback) = db.rollback() {
                tracing::warn!("rollback after failed transaction also failed: {}", rollback);
            }
            Err(e)
        }
    }
}
