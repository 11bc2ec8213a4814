//! Transactional rewrite of a document's index rows.
//!
//! The [`IndexMaintainer`] owns no state beyond table names. All work happens
//! in the engine, inside one transaction per document.

use docstore_db::{Database, DbResult, SqlValue};
use docstore_types::{Payload, TableNames};
use tracing::debug;

use crate::derive::{derive_rows, BaseRow, IndexRows};
use crate::error::{IndexError, IndexResult};

/// Keeps the base, tag and IRI tables in step with document payloads.
#[derive(Clone, Debug)]
pub struct IndexMaintainer {
    tables: TableNames,
}

impl IndexMaintainer {
    pub fn new(tables: TableNames) -> Self {
        Self { tables }
    }

    pub fn tables(&self) -> &TableNames {
        &self.tables
    }

    /// Regenerate every index row for `uuid` from `payload` and clear the
    /// document's dirty flag, all in one transaction.
    ///
    /// Returns the rows written.
    pub fn maintain(
        &self,
        db: &dyn Database,
        uuid: &str,
        payload: &Payload,
    ) -> IndexResult<IndexRows> {
        let rows = derive_rows(uuid, payload);
        let committed = db.perform(&mut || {
            self.delete_rows(db, uuid)?;
            self.insert_rows(db, &rows)?;
            db.exec(
                &format!(
                    r#"UPDATE {} SET "dirty" = 0 WHERE "uuid" = ?"#,
                    db.table(&self.tables.objects)
                ),
                &[uuid.into()],
            )?;
            Ok(true)
        })?;
        if !committed {
            return Err(IndexError::CommitRejected(uuid.to_string()));
        }
        debug!(
            uuid,
            base = rows.base.is_some(),
            tags = rows.tags.len(),
            iris = rows.iris.len(),
            "index rows rewritten"
        );
        Ok(rows)
    }

    /// Delete every index row for `uuid`, outside any transaction.
    pub fn clear(&self, db: &dyn Database, uuid: &str) -> IndexResult<()> {
        self.delete_rows(db, uuid)?;
        Ok(())
    }

    /// Read back the index rows currently stored for `uuid`, tags and IRIs
    /// sorted.
    pub fn stored_rows(&self, db: &dyn Database, uuid: &str) -> IndexResult<IndexRows> {
        let base = db
            .row(
                &format!(
                    r#"SELECT "kind", "realm", "tag" FROM {} WHERE "uuid" = ?"#,
                    db.table(&self.tables.base)
                ),
                &[uuid.into()],
            )?
            .map(|row| BaseRow {
                kind: row.text("kind").map(str::to_string),
                realm: row.text("realm").map(str::to_string),
                tag: row.text("tag").map(str::to_string),
            });
        let tags = self.column_values(db, &self.tables.tags, "tag", uuid)?;
        let iris = self.column_values(db, &self.tables.iri, "iri", uuid)?;
        Ok(IndexRows {
            uuid: uuid.to_string(),
            base,
            tags,
            iris,
        })
    }

    fn column_values(
        &self,
        db: &dyn Database,
        table: &str,
        column: &str,
        uuid: &str,
    ) -> DbResult<Vec<String>> {
        let col = db.quote_ident(column);
        let mut cursor = db.query(
            &format!(
                r#"SELECT {col} FROM {} WHERE "uuid" = ? ORDER BY {col}"#,
                db.table(table)
            ),
            &[uuid.into()],
        )?;
        let mut out = Vec::with_capacity(cursor.total());
        while let Some(row) = cursor.next_row() {
            if let Some(value) = row.text(column) {
                out.push(value.to_string());
            }
        }
        Ok(out)
    }

    fn delete_rows(&self, db: &dyn Database, uuid: &str) -> DbResult<()> {
        for table in [&self.tables.base, &self.tables.tags, &self.tables.iri] {
            db.exec(
                &format!(r#"DELETE FROM {} WHERE "uuid" = ?"#, db.table(table)),
                &[uuid.into()],
            )?;
        }
        Ok(())
    }

    fn insert_rows(&self, db: &dyn Database, rows: &IndexRows) -> DbResult<()> {
        if let Some(base) = &rows.base {
            db.insert(
                &self.tables.base,
                &[
                    ("uuid", rows.uuid.as_str().into()),
                    ("kind", SqlValue::from(base.kind.clone())),
                    ("realm", SqlValue::from(base.realm.clone())),
                    ("tag", SqlValue::from(base.tag.clone())),
                ],
            )?;
        }
        for tag in &rows.tags {
            db.insert(
                &self.tables.tags,
                &[("uuid", rows.uuid.as_str().into()), ("tag", tag.into())],
            )?;
        }
        for iri in &rows.iris {
            db.insert(
                &self.tables.iri,
                &[("uuid", rows.uuid.as_str().into()), ("iri", iri.into())],
            )?;
        }
        Ok(())
    }
}

impl Default for IndexMaintainer {
    fn default() -> Self {
        Self::new(TableNames::default())
    }
}
