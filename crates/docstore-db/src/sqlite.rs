//! SQLite binding for the [`Database`] contract.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::{ReentrantMutex, ReentrantMutexGuard};
use rusqlite::types::{Value, ValueRef};
use rusqlite::{params_from_iter, Connection, ErrorCode};
use tracing::debug;

use crate::config::DatabaseConfig;
use crate::cursor::BufferedCursor;
use crate::error::{DbError, DbResult};
use crate::traits::{transaction, Database, RowCursor};
use crate::value::{Row, SqlValue};

/// Millisecond-precision RFC 3339 text, matching `Timestamp::to_text`.
const NOW_EXPR: &str = "strftime('%Y-%m-%dT%H:%M:%fZ', 'now')";

/// A single SQLite connection behind a reentrant lock.
///
/// Every statement takes the lock; [`Database::perform`] holds it for the
/// whole transaction, so statements the unit of work issues on the same
/// thread re-enter it while other threads wait.
pub struct SqliteDatabase {
    conn: ReentrantMutex<Connection>,
    prefix: String,
}

impl SqliteDatabase {
    /// Open (or create) a database file.
    pub fn open(path: &Path) -> DbResult<Self> {
        Self::init(Connection::open(path)?, String::new())
    }

    /// Create a private in-memory database.
    pub fn open_in_memory() -> DbResult<Self> {
        Self::init(Connection::open_in_memory()?, String::new())
    }

    pub fn from_config(config: &DatabaseConfig) -> DbResult<Self> {
        let conn = match &config.path {
            Some(path) => Connection::open(path)?,
            None => Connection::open_in_memory()?,
        };
        conn.busy_timeout(Duration::from_millis(config.busy_timeout_ms))?;
        Self::init(conn, config.table_prefix.clone())
    }

    /// Prefix every logical table name with `prefix`.
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    fn init(conn: Connection, prefix: String) -> DbResult<Self> {
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        Ok(Self {
            conn: ReentrantMutex::new(conn),
            prefix,
        })
    }

    fn lock(&self) -> ReentrantMutexGuard<'_, Connection> {
        self.conn.lock()
    }
}

fn bind(params: &[SqlValue]) -> DbResult<Vec<Value>> {
    params
        .iter()
        .enumerate()
        .map(|(i, p)| match p {
            SqlValue::Null => Ok(Value::Null),
            SqlValue::Integer(n) => Ok(Value::Integer(*n)),
            SqlValue::Real(r) => Ok(Value::Real(*r)),
            SqlValue::Text(s) => Ok(Value::Text(s.clone())),
            SqlValue::Now => Err(DbError::UnboundNow(i)),
        })
        .collect()
}

fn column_value(value: ValueRef<'_>) -> SqlValue {
    match value {
        ValueRef::Null => SqlValue::Null,
        ValueRef::Integer(n) => SqlValue::Integer(n),
        ValueRef::Real(r) => SqlValue::Real(r),
        ValueRef::Text(t) | ValueRef::Blob(t) => {
            SqlValue::Text(String::from_utf8_lossy(t).into_owned())
        }
    }
}

fn fetch(conn: &Connection, sql: &str, params: &[SqlValue], limit: Option<usize>) -> DbResult<Vec<Row>> {
    let bound = bind(params)?;
    let mut stmt = conn.prepare(sql)?;
    let columns: Arc<[String]> = stmt
        .column_names()
        .into_iter()
        .map(str::to_string)
        .collect::<Vec<_>>()
        .into();
    let width = columns.len();
    let mut rows = stmt.query(params_from_iter(bound.iter()))?;
    let mut out = Vec::new();
    while let Some(row) = rows.next()? {
        let mut values = Vec::with_capacity(width);
        for i in 0..width {
            values.push(column_value(row.get_ref(i)?));
        }
        out.push(Row::new(columns.clone(), values));
        if limit.is_some_and(|l| out.len() >= l) {
            break;
        }
    }
    Ok(out)
}

fn is_conflict(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _)
            if matches!(e.code, ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked)
    )
}

impl Database for SqliteDatabase {
    fn table(&self, name: &str) -> String {
        self.quote_ident(&format!("{}{}", self.prefix, name))
    }

    fn now(&self) -> &str {
        NOW_EXPR
    }

    fn exec(&self, sql: &str, params: &[SqlValue]) -> DbResult<usize> {
        let bound = bind(params)?;
        let conn = self.lock();
        Ok(conn.execute(sql, params_from_iter(bound.iter()))?)
    }

    fn row(&self, sql: &str, params: &[SqlValue]) -> DbResult<Option<Row>> {
        let conn = self.lock();
        Ok(fetch(&conn, sql, params, Some(1))?.into_iter().next())
    }

    fn query(&self, sql: &str, params: &[SqlValue]) -> DbResult<Box<dyn RowCursor>> {
        let conn = self.lock();
        let rows = fetch(&conn, sql, params, None)?;
        debug!(rows = rows.len(), "query buffered");
        Ok(Box::new(BufferedCursor::new(rows)))
    }

    fn execute_batch(&self, sql: &str) -> DbResult<()> {
        Ok(self.lock().execute_batch(sql)?)
    }

    fn begin(&self) -> DbResult<()> {
        Ok(self.lock().execute_batch("BEGIN IMMEDIATE")?)
    }

    fn commit(&self) -> DbResult<bool> {
        let conn = self.lock();
        match conn.execute_batch("COMMIT") {
            Ok(()) => Ok(true),
            Err(e) if is_conflict(&e) => {
                debug!("commit rejected: {}", e);
                if !conn.is_autocommit() {
                    conn.execute_batch("ROLLBACK")?;
                }
                Ok(false)
            }
            Err(e) => Err(e.into()),
        }
    }

    fn rollback(&self) -> DbResult<()> {
        let conn = self.lock();
        if conn.is_autocommit() {
            return Ok(());
        }
        Ok(conn.execute_batch("ROLLBACK")?)
    }

    fn perform(&self, work: &mut dyn FnMut() -> DbResult<bool>) -> DbResult<bool> {
        let _held = self.lock();
        transaction(self, work)
    }
}

impl std::fmt::Debug for SqliteDatabase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteDatabase")
            .field("prefix", &self.prefix)
            .finish()
    }
}
