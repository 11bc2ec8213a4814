//! The document store: authoritative writes, point lookups, queries and
//! index repair.

use std::sync::Arc;
use std::thread;

use serde_json::Value;
use tracing::{debug, info};

use docstore_db::{Database, Row, SqlValue, SqliteDatabase};
use docstore_index::{IndexError, IndexMaintainer, IndexRows};
use docstore_types::{generate, is_uuid, is_uuid_value, Actor, DocumentMeta, Payload, Timestamp};

use crate::cache::ResolverCache;
use crate::config::{Settings, StoreConfig};
use crate::entity::{Entity, EntityClass, PlainEntity};
use crate::error::{StoreError, StoreResult};
use crate::mirror::FsMirror;
use crate::observer::{StoreObserver, TracingObserver};
use crate::query::{kind_name, Query};
use crate::resultset::{CursorResultSet, EntitySet, ResultSet};

/// Identifiers returned by [`DocumentStore::pending_dirty`] when no limit is
/// given.
pub const DEFAULT_PENDING_LIMIT: usize = 10;

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct WriteOptions {
    /// Skip index maintenance and the mirror; the document stays dirty.
    pub lazy: bool,
    /// Owner to record. On update it replaces the stored owner only when
    /// different.
    pub owner: Option<String>,
}

impl WriteOptions {
    pub fn lazy() -> Self {
        Self {
            lazy: true,
            ..Self::default()
        }
    }

    pub fn owned_by(owner: impl Into<String>) -> Self {
        Self {
            owner: Some(owner.into()),
            ..Self::default()
        }
    }
}

/// Schemaless documents persisted in a relational engine, with derived
/// index tables for lookup by kind, realm, tag, tag set and IRI.
pub struct DocumentStore {
    db: Arc<dyn Database>,
    config: StoreConfig,
    maintainer: IndexMaintainer,
    mirror: Option<FsMirror>,
    class: Arc<dyn EntityClass>,
    cache: Arc<ResolverCache>,
    observer: Arc<dyn StoreObserver>,
}

impl DocumentStore {
    pub fn new(db: Arc<dyn Database>, config: StoreConfig) -> Self {
        Self {
            maintainer: IndexMaintainer::new(config.tables.clone()),
            mirror: config.mirror_root.clone().map(FsMirror::new),
            db,
            config,
            class: Arc::new(PlainEntity),
            cache: Arc::new(ResolverCache::new()),
            observer: Arc::new(TracingObserver),
        }
    }

    /// Open the configured SQLite database and make sure the tables exist.
    pub fn open(settings: &Settings) -> StoreResult<Self> {
        let db = SqliteDatabase::from_config(&settings.database)?;
        let store = Self::new(Arc::new(db), settings.store.clone());
        store.ensure_schema()?;
        Ok(store)
    }

    /// Entity type produced by reads and reference resolution.
    pub fn with_class(mut self, class: Arc<dyn EntityClass>) -> Self {
        self.class = class;
        self
    }

    pub fn with_cache(mut self, cache: Arc<ResolverCache>) -> Self {
        self.cache = cache;
        self
    }

    pub fn with_observer(mut self, observer: Arc<dyn StoreObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn ensure_schema(&self) -> StoreResult<()> {
        docstore_index::ensure_schema(self.db.as_ref(), &self.config.tables)?;
        Ok(())
    }

    pub fn database(&self) -> &dyn Database {
        self.db.as_ref()
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    pub fn maintainer(&self) -> &IndexMaintainer {
        &self.maintainer
    }

    pub fn class(&self) -> &Arc<dyn EntityClass> {
        &self.class
    }

    pub fn cache(&self) -> &Arc<ResolverCache> {
        &self.cache
    }

    fn objects(&self) -> String {
        self.db.table(&self.config.tables.objects)
    }

    // ---- Writes ----

    /// Persist `payload` and return it enriched with the stored metadata.
    ///
    /// A valid `uuid` in the payload selects the document to update;
    /// otherwise a new identifier is generated. Reserved fields are never
    /// persisted from the payload, except that `created` seeds the creation
    /// time of a new document.
    pub fn write(
        &self,
        mut payload: Payload,
        actor: Option<&Actor>,
        options: &WriteOptions,
    ) -> StoreResult<Payload> {
        let actor = actor.map(Actor::validated).transpose()?;
        let uuid = payload
            .get("uuid")
            .and_then(is_uuid_value)
            .unwrap_or_else(generate);
        let created = match payload.get("created") {
            Some(Value::String(text)) => Timestamp::parse(text).ok(),
            _ => None,
        };
        DocumentMeta::strip(&mut payload);
        let data = serde_json::to_string(&payload)?;

        self.with_retries(&uuid, || {
            Ok(self.db.perform(&mut || {
                self.upsert(
                    &uuid,
                    &data,
                    created.as_ref(),
                    actor.as_ref(),
                    options.owner.as_deref(),
                )
            })?)
        })?;

        let row = self
            .db
            .row(
                &format!(r#"SELECT * FROM {} WHERE "uuid" = ?"#, self.objects()),
                &[uuid.as_str().into()],
            )?
            .ok_or_else(|| StoreError::Vanished(uuid.clone()))?;
        row_meta(&row).merge_into(&mut payload);
        debug!(uuid = %uuid, lazy = options.lazy, "document written");

        if !options.lazy {
            self.refresh(&uuid, &payload)?;
        }
        Ok(payload)
    }

    fn upsert(
        &self,
        uuid: &str,
        data: &str,
        created: Option<&Timestamp>,
        actor: Option<&Actor>,
        owner: Option<&str>,
    ) -> docstore_db::DbResult<bool> {
        let db = self.db.as_ref();
        let objects = self.objects();
        let scheme = SqlValue::from(actor.map(|a| a.scheme.as_str()));
        let actor_uuid = SqlValue::from(actor.map(|a| a.uuid.as_str()));

        let existing = db.row(
            &format!(r#"SELECT "owner" FROM {objects} WHERE "uuid" = ?"#),
            &[uuid.into()],
        )?;
        match existing {
            Some(row) => {
                db.exec(
                    &format!(
                        r#"UPDATE {objects} SET "data" = ?, "dirty" = 1, "modified" = {now}, "modifier_scheme" = ?, "modifier_uuid" = ? WHERE "uuid" = ?"#,
                        now = db.now()
                    ),
                    &[data.into(), scheme, actor_uuid, uuid.into()],
                )?;
                if let Some(owner) = owner.filter(|o| row.text("owner") != Some(*o)) {
                    db.exec(
                        &format!(r#"UPDATE {objects} SET "owner" = ? WHERE "uuid" = ?"#),
                        &[owner.into(), uuid.into()],
                    )?;
                }
            }
            None => {
                let created = created
                    .map(|t| SqlValue::from(t.to_text()))
                    .unwrap_or(SqlValue::Now);
                db.insert(
                    &self.config.tables.objects,
                    &[
                        ("uuid", uuid.into()),
                        ("data", data.into()),
                        ("created", created),
                        ("creator_scheme", scheme.clone()),
                        ("creator_uuid", actor_uuid.clone()),
                        ("modified", SqlValue::Now),
                        ("modifier_scheme", scheme),
                        ("modifier_uuid", actor_uuid),
                        ("owner", SqlValue::from(owner)),
                        ("dirty", 1i64.into()),
                    ],
                )?;
            }
        }
        Ok(true)
    }

    /// Run `attempt` until it reports a committed transaction, sleeping
    /// between rejected commits as the retry policy says.
    fn with_retries(
        &self,
        uuid: &str,
        mut attempt: impl FnMut() -> StoreResult<bool>,
    ) -> StoreResult<()> {
        let mut failed = 0u32;
        loop {
            if attempt()? {
                return Ok(());
            }
            failed = failed.saturating_add(1);
            match self.config.retry.delay_after(failed) {
                Some(delay) => {
                    self.observer.write_retried(uuid, failed);
                    if !delay.is_zero() {
                        thread::sleep(delay);
                    }
                }
                None => {
                    return Err(StoreError::RetriesExhausted {
                        uuid: uuid.to_string(),
                        attempts: failed,
                    })
                }
            }
        }
    }

    /// Rebuild the index rows for `uuid` from `payload`, then mirror it.
    fn refresh(&self, uuid: &str, payload: &Payload) -> StoreResult<IndexRows> {
        let db = self.db.as_ref();
        let mut written = None;
        self.with_retries(uuid, || match self.maintainer.maintain(db, uuid, payload) {
            Ok(rows) => {
                written = Some(rows);
                Ok(true)
            }
            Err(IndexError::CommitRejected(_)) => Ok(false),
            Err(e) => Err(e.into()),
        })?;
        let rows = written.ok_or_else(|| StoreError::Vanished(uuid.to_string()))?;
        self.observer.index_refreshed(&rows);

        if let Some(mirror) = &self.mirror {
            let mut body = payload.clone();
            DocumentMeta::strip(&mut body);
            let json = serde_json::to_string(&body)?;
            if let Err(e) = mirror.write(uuid, &body, &json) {
                self.observer.mirror_failed(uuid, &e);
            }
        }
        Ok(rows)
    }

    // ---- Reads ----

    /// The stored payload with metadata, or `None` for an unknown identifier.
    pub fn fetch_by_uuid(&self, uuid: &str) -> StoreResult<Option<Payload>> {
        let Some(uuid) = is_uuid(uuid) else {
            return Ok(None);
        };
        self.db
            .row(
                &format!(r#"SELECT * FROM {} WHERE "uuid" = ?"#, self.objects()),
                &[uuid.into()],
            )?
            .map(|row| decode_row(&row))
            .transpose()
    }

    pub fn object_by_uuid(self: &Arc<Self>, uuid: &str) -> StoreResult<Option<Entity>> {
        Ok(self
            .fetch_by_uuid(uuid)?
            .map(|payload| Entity::from_payload(self, payload)))
    }

    pub fn object_by_iri(self: &Arc<Self>, iri: &str) -> StoreResult<Option<Entity>> {
        self.object(&Query::new().iri(iri))
    }

    /// First entity matching `query`.
    pub fn object(self: &Arc<Self>, query: &Query) -> StoreResult<Option<Entity>> {
        let mut query = query.clone();
        if query.limit == 0 {
            query.limit = 1;
        }
        self.query(&query)?.next_entity()
    }

    pub fn query(self: &Arc<Self>, query: &Query) -> StoreResult<ResultSet> {
        let compiled = query.compile(self.db.as_ref(), &self.config.tables);
        for warning in &compiled.warnings {
            self.observer.query_warning(warning);
        }
        let cursor = self.db.query(&compiled.sql, &compiled.params)?;
        let total = if compiled.limit > 0 {
            self.db
                .row(&compiled.count_sql, &compiled.params)?
                .and_then(|row| row.integer("total"))
                .and_then(|n| usize::try_from(n).ok())
                .unwrap_or(0)
        } else {
            cursor.total()
        };
        Ok(ResultSet::Cursor(
            CursorResultSet::new(Arc::clone(self), cursor, total)
                .with_window(compiled.offset, compiled.limit),
        ))
    }

    /// [`DocumentStore::query`] over a criteria mapping.
    pub fn query_criteria(self: &Arc<Self>, criteria: &Payload) -> StoreResult<ResultSet> {
        self.query(&Query::from_criteria(criteria)?)
    }

    // ---- Maintenance ----

    /// Re-derive the index rows and mirror copy of a stored document without
    /// changing it. `false` when the identifier is unknown.
    pub fn update_object_with_uuid(&self, uuid: &str) -> StoreResult<bool> {
        let Some(payload) = self.fetch_by_uuid(uuid)? else {
            return Ok(false);
        };
        let uuid = payload
            .get("uuid")
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| uuid.to_string());
        self.refresh(&uuid, &payload)?;
        Ok(true)
    }

    /// Remove a document and its index rows. `true` if a document existed.
    pub fn delete_by_uuid(&self, uuid: &str) -> StoreResult<bool> {
        let Some(uuid) = is_uuid(uuid) else {
            return Ok(false);
        };
        let removed = self.db.exec(
            &format!(r#"DELETE FROM {} WHERE "uuid" = ?"#, self.objects()),
            &[uuid.as_str().into()],
        )?;
        self.maintainer.clear(self.db.as_ref(), &uuid)?;
        debug!(uuid = %uuid, removed, "document deleted");
        Ok(removed > 0)
    }

    /// Flag every document for index rebuild. Returns the number flagged.
    pub fn mark_all_dirty(&self) -> StoreResult<usize> {
        let n = self
            .db
            .exec(&format!(r#"UPDATE {} SET "dirty" = 1"#, self.objects()), &[])?;
        info!(documents = n, "marked all documents dirty");
        Ok(n)
    }

    /// Up to `limit` identifiers whose index rows may be stale, oldest
    /// modification first. Zero means [`DEFAULT_PENDING_LIMIT`].
    pub fn pending_dirty(&self, limit: usize) -> StoreResult<Vec<String>> {
        let limit = if limit == 0 { DEFAULT_PENDING_LIMIT } else { limit };
        let mut cursor = self.db.query(
            &format!(
                r#"SELECT "uuid" FROM {} WHERE "dirty" = 1 ORDER BY "modified", "uuid" LIMIT {limit}"#,
                self.objects()
            ),
            &[],
        )?;
        let mut out = Vec::with_capacity(cursor.total());
        while let Some(row) = cursor.next_row() {
            if let Some(uuid) = row.text("uuid") {
                out.push(uuid.to_string());
            }
        }
        Ok(out)
    }

    /// Re-derive every dirty document, `batch` at a time, until none is
    /// left or a pass makes no progress. Returns the number re-derived.
    pub fn reindex_pending(&self, batch: usize) -> StoreResult<usize> {
        let mut done = 0;
        let mut previous: Vec<String> = Vec::new();
        loop {
            let pending = self.pending_dirty(batch)?;
            if pending.is_empty() || pending == previous {
                break;
            }
            let mut progressed = 0;
            for uuid in &pending {
                if self.update_object_with_uuid(uuid)? {
                    progressed += 1;
                }
            }
            if progressed == 0 {
                break;
            }
            done += progressed;
            previous = pending;
        }
        info!(documents = done, "reindex pass finished");
        Ok(done)
    }
}

impl std::fmt::Debug for DocumentStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DocumentStore")
            .field("config", &self.config)
            .field("class", &self.class.name())
            .field("cache", &self.cache)
            .finish()
    }
}

/// Store metadata held in the columns of a primary-table row.
fn row_meta(row: &Row) -> DocumentMeta {
    let time = |column: &str| row.text(column).and_then(|t| Timestamp::parse(t).ok());
    DocumentMeta {
        uuid: row.text("uuid").map(str::to_string),
        created: time("created"),
        modified: time("modified"),
        creator: Actor::from_columns(row.text("creator_scheme"), row.text("creator_uuid")),
        modifier: Actor::from_columns(row.text("modifier_scheme"), row.text("modifier_uuid")),
        owner: row.text("owner").map(str::to_string),
    }
}

/// Decode a primary-table row into a payload with metadata merged in.
pub(crate) fn decode_row(row: &Row) -> StoreResult<Payload> {
    let uuid = row.text("uuid").unwrap_or_default();
    let corrupt = |reason: String| StoreError::CorruptDocument {
        uuid: uuid.to_string(),
        reason,
    };
    let data = row
        .text("data")
        .ok_or_else(|| corrupt("no data column".into()))?;
    let mut payload = match serde_json::from_str::<Value>(data) {
        Ok(Value::Object(map)) => map,
        Ok(other) => return Err(corrupt(format!("data is {}", kind_name(&other)))),
        Err(e) => return Err(corrupt(e.to_string())),
    };
    DocumentMeta::strip(&mut payload);
    row_meta(row).merge_into(&mut payload);
    Ok(payload)
}
