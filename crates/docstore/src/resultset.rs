//! Lazy, restartable sequences of entities.
//!
//! Two backings exist: a fixed list of identifiers or payloads
//! ([`ListResultSet`]) and a database cursor ([`CursorResultSet`]). Both
//! materialize one entity per call to [`EntitySet::next_entity`].

use std::fmt;
use std::sync::Arc;

use serde_json::Value;
use tracing::debug;

use docstore_db::RowCursor;
use docstore_types::{is_uuid, Payload};

use crate::entity::Entity;
use crate::error::StoreResult;
use crate::store::{decode_row, DocumentStore};

pub trait EntitySet {
    /// Materialize and return the next entity, or `None` once exhausted.
    fn next_entity(&mut self) -> StoreResult<Option<Entity>>;

    /// Start again from the first element.
    fn rewind(&mut self);

    /// Number of entities returned since the last rewind.
    fn position(&self) -> usize;

    /// `true` once no element is left to visit. A list whose remaining
    /// identifiers have no document reads `false` until the call to
    /// [`EntitySet::next_entity`] that skips them and returns `None`.
    fn is_eof(&self) -> bool;

    /// Elements in the set: the list length for lists, entities visited so
    /// far for cursors.
    fn len(&self) -> usize;

    /// Size of the whole match, which may exceed the elements present.
    fn total(&self) -> usize;
}

/// One element of a list-backed set.
#[derive(Clone, Debug, PartialEq)]
pub enum ListEntry {
    /// Loaded by identifier on visit.
    Uuid(String),
    /// Wrapped directly.
    Data(Payload),
}

impl ListEntry {
    /// Identifier strings and mappings are entries; anything else is not.
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::String(s) => Some(Self::Uuid(is_uuid(s).unwrap_or_else(|| s.clone()))),
            Value::Object(map) => Some(Self::Data(map.clone())),
            _ => None,
        }
    }
}

pub struct ListResultSet {
    store: Arc<DocumentStore>,
    entries: Arc<Vec<ListEntry>>,
    next: usize,
    visited: usize,
    total: usize,
}

impl ListResultSet {
    pub fn new(store: Arc<DocumentStore>, entries: Vec<ListEntry>) -> Self {
        Self::shared(store, Arc::new(entries))
    }

    pub fn shared(store: Arc<DocumentStore>, entries: Arc<Vec<ListEntry>>) -> Self {
        let total = entries.len();
        Self {
            store,
            entries,
            next: 0,
            visited: 0,
            total,
        }
    }

    /// Report `total` instead of the list length, for a page of a larger
    /// match.
    pub fn with_total(mut self, total: usize) -> Self {
        self.total = total;
        self
    }

    pub fn entries(&self) -> &[ListEntry] {
        &self.entries
    }
}

impl EntitySet for ListResultSet {
    fn next_entity(&mut self) -> StoreResult<Option<Entity>> {
        while let Some(entry) = self.entries.get(self.next) {
            self.next += 1;
            let entity = match entry {
                ListEntry::Uuid(uuid) => {
                    let found = self.store.object_by_uuid(uuid)?;
                    if found.is_none() {
                        debug!(uuid = %uuid, "list entry has no document, skipped");
                    }
                    found
                }
                ListEntry::Data(payload) => Some(Entity::from_payload(&self.store, payload.clone())),
            };
            if let Some(entity) = entity {
                self.visited += 1;
                return Ok(Some(entity));
            }
        }
        Ok(None)
    }

    fn rewind(&mut self) {
        self.next = 0;
        self.visited = 0;
    }

    fn position(&self) -> usize {
        self.visited
    }

    fn is_eof(&self) -> bool {
        self.next >= self.entries.len()
    }

    fn len(&self) -> usize {
        self.entries.len()
    }

    fn total(&self) -> usize {
        self.total
    }
}

pub struct CursorResultSet {
    store: Arc<DocumentStore>,
    cursor: Box<dyn RowCursor>,
    last_uuid: Option<String>,
    visited: usize,
    total: usize,
    offset: u64,
    limit: u64,
}

impl CursorResultSet {
    pub fn new(store: Arc<DocumentStore>, cursor: Box<dyn RowCursor>, total: usize) -> Self {
        Self {
            store,
            cursor,
            last_uuid: None,
            visited: 0,
            total,
            offset: 0,
            limit: 0,
        }
    }

    /// Record the offset and limit the query ran with.
    pub fn with_window(mut self, offset: u64, limit: u64) -> Self {
        self.offset = offset;
        self.limit = limit;
        self
    }

    pub fn offset(&self) -> u64 {
        self.offset
    }

    pub fn limit(&self) -> u64 {
        self.limit
    }
}

impl EntitySet for CursorResultSet {
    fn next_entity(&mut self) -> StoreResult<Option<Entity>> {
        while let Some(row) = self.cursor.next_row() {
            let uuid = row.text("uuid").map(str::to_string);
            if uuid.is_some() && uuid == self.last_uuid {
                continue;
            }
            let payload = decode_row(&row)?;
            self.last_uuid = uuid;
            self.visited += 1;
            return Ok(Some(Entity::from_payload(&self.store, payload)));
        }
        Ok(None)
    }

    fn rewind(&mut self) {
        self.cursor.rewind();
        self.last_uuid = None;
        self.visited = 0;
    }

    fn position(&self) -> usize {
        self.visited
    }

    fn is_eof(&self) -> bool {
        self.cursor.is_eof()
    }

    fn len(&self) -> usize {
        self.visited
    }

    fn total(&self) -> usize {
        self.total
    }
}

/// Either kind of result set.
pub enum ResultSet {
    List(ListResultSet),
    Cursor(CursorResultSet),
}

impl ResultSet {
    /// Offset and limit of the underlying query; zeros for lists.
    pub fn window(&self) -> (u64, u64) {
        match self {
            Self::List(_) => (0, 0),
            Self::Cursor(set) => (set.offset(), set.limit()),
        }
    }

    /// Drain the remaining entities.
    pub fn collect_entities(mut self) -> StoreResult<Vec<Entity>> {
        let mut out = Vec::new();
        while let Some(entity) = self.next_entity()? {
            out.push(entity);
        }
        Ok(out)
    }
}

impl EntitySet for ResultSet {
    fn next_entity(&mut self) -> StoreResult<Option<Entity>> {
        match self {
            Self::List(set) => set.next_entity(),
            Self::Cursor(set) => set.next_entity(),
        }
    }

    fn rewind(&mut self) {
        match self {
            Self::List(set) => set.rewind(),
            Self::Cursor(set) => set.rewind(),
        }
    }

    fn position(&self) -> usize {
        match self {
            Self::List(set) => set.position(),
            Self::Cursor(set) => set.position(),
        }
    }

    fn is_eof(&self) -> bool {
        match self {
            Self::List(set) => set.is_eof(),
            Self::Cursor(set) => set.is_eof(),
        }
    }

    fn len(&self) -> usize {
        match self {
            Self::List(set) => set.len(),
            Self::Cursor(set) => set.len(),
        }
    }

    fn total(&self) -> usize {
        match self {
            Self::List(set) => set.total(),
            Self::Cursor(set) => set.total(),
        }
    }
}

impl Iterator for ResultSet {
    type Item = StoreResult<Entity>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_entity().transpose()
    }
}

impl fmt::Debug for ResultSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self {
            Self::List(_) => "list",
            Self::Cursor(_) => "cursor",
        };
        f.debug_struct("ResultSet")
            .field("kind", &kind)
            .field("position", &self.position())
            .field("total", &self.total())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StoreConfig;
    use crate::query::Query;
    use crate::store::WriteOptions;
    use docstore_db::{BufferedCursor, Row, SqlValue, SqliteDatabase};
    use serde_json::json;

    fn store() -> Arc<DocumentStore> {
        let store = DocumentStore::new(
            Arc::new(SqliteDatabase::open_in_memory().unwrap()),
            StoreConfig::default(),
        );
        store.ensure_schema().unwrap();
        Arc::new(store)
    }

    fn put(store: &DocumentStore, value: Value) -> String {
        let written = store
            .write(
                value.as_object().cloned().unwrap(),
                None,
                &WriteOptions::default(),
            )
            .unwrap();
        written["uuid"].as_str().unwrap().to_string()
    }

    #[test]
    fn empty_list_is_immediately_exhausted() {
        let mut set = ListResultSet::new(store(), Vec::new());
        assert!(set.is_eof());
        assert_eq!(set.len(), 0);
        assert_eq!(set.total(), 0);
        assert!(set.next_entity().unwrap().is_none());
    }

    #[test]
    fn list_yields_entities_in_order() {
        let store = store();
        let a = put(&store, json!({ "n": 1 }));
        let b = put(&store, json!({ "n": 2 }));

        let mut set = ListResultSet::new(
            store.clone(),
            vec![ListEntry::Uuid(b.clone()), ListEntry::Uuid(a.clone())],
        );
        assert!(!set.is_eof());
        assert_eq!(set.next_entity().unwrap().unwrap().uuid(), Some(b.as_str()));
        assert_eq!(set.position(), 1);
        assert_eq!(set.next_entity().unwrap().unwrap().uuid(), Some(a.as_str()));
        assert!(set.is_eof());
        assert!(set.next_entity().unwrap().is_none());
        assert_eq!(set.len(), 2);

        set.rewind();
        assert!(!set.is_eof());
        assert_eq!(set.position(), 0);
        assert_eq!(set.next_entity().unwrap().unwrap().uuid(), Some(b.as_str()));
    }

    #[test]
    fn list_accepts_inline_payloads_and_skips_missing() {
        let store = store();
        let missing = docstore_types::generate();
        let mut set = ListResultSet::new(
            store,
            vec![
                ListEntry::Uuid(missing),
                ListEntry::Data(json!({ "title": "inline" }).as_object().cloned().unwrap()),
            ],
        )
        .with_total(40);
        assert_eq!(set.total(), 40);
        let entity = set.next_entity().unwrap().unwrap();
        assert_eq!(entity.get_raw("title"), Some(&json!("inline")));
        assert!(entity.uuid().is_none());
        assert!(set.next_entity().unwrap().is_none());
    }

    #[test]
    fn trailing_missing_entries_end_the_list() {
        let store = store();
        let present = put(&store, json!({ "n": 1 }));
        let mut set = ListResultSet::new(
            store,
            vec![
                ListEntry::Uuid(present.clone()),
                ListEntry::Uuid(docstore_types::generate()),
                ListEntry::Uuid(docstore_types::generate()),
            ],
        );
        assert_eq!(set.next_entity().unwrap().unwrap().uuid(), Some(present.as_str()));
        assert!(!set.is_eof());
        assert!(set.next_entity().unwrap().is_none());
        assert!(set.is_eof());
        assert_eq!(set.position(), 1);
    }

    #[test]
    fn list_entries_from_values() {
        let id = docstore_types::generate();
        assert_eq!(
            ListEntry::from_value(&json!(id.to_uppercase())),
            Some(ListEntry::Uuid(id))
        );
        assert!(matches!(
            ListEntry::from_value(&json!({ "a": 1 })),
            Some(ListEntry::Data(_))
        ));
        assert_eq!(ListEntry::from_value(&json!(7)), None);
    }

    #[test]
    fn cursor_counts_visited_entities() {
        let store = store();
        for n in 0..3 {
            put(&store, json!({ "kind": "item", "n": n }));
        }
        let mut set = store.query(&Query::new().kind("item")).unwrap();
        assert_eq!(set.total(), 3);
        assert_eq!(set.len(), 0);
        set.next_entity().unwrap().unwrap();
        assert_eq!(set.len(), 1);
        while set.next_entity().unwrap().is_some() {}
        assert!(set.is_eof());
        assert_eq!(set.len(), 3);
        assert!(set.next_entity().unwrap().is_none());

        set.rewind();
        assert_eq!(set.len(), 0);
        assert_eq!(set.by_ref().count(), 3);
    }

    #[test]
    fn cursor_skips_repeated_rows_of_one_document() {
        let uuid = docstore_types::generate();
        let columns: Arc<[String]> = ["uuid", "data", "created", "modified"]
            .into_iter()
            .map(String::from)
            .collect::<Vec<_>>()
            .into();
        let row = |data: &str| {
            Row::new(
                columns.clone(),
                vec![
                    SqlValue::from(uuid.as_str()),
                    SqlValue::from(data),
                    SqlValue::from("2024-05-01T09:30:00.000Z"),
                    SqlValue::from("2024-05-01T09:30:00.000Z"),
                ],
            )
        };
        let rows = vec![row(r#"{"n":1}"#), row(r#"{"n":1}"#), row(r#"{"n":1}"#)];
        let mut set = CursorResultSet::new(store(), Box::new(BufferedCursor::new(rows)), 3);

        let entity = set.next_entity().unwrap().unwrap();
        assert_eq!(entity.uuid(), Some(uuid.as_str()));
        assert_eq!(entity.get_raw("n"), Some(&json!(1)));
        assert!(set.next_entity().unwrap().is_none());
        assert_eq!(set.len(), 1);
        assert!(set.is_eof());
    }

    #[test]
    fn cursor_entities_carry_metadata() {
        let store = store();
        let uuid = put(&store, json!({ "kind": "item", "title": "t" }));
        let entities = store
            .query(&Query::new().uuid(uuid.as_str()))
            .unwrap()
            .collect_entities()
            .unwrap();
        assert_eq!(entities.len(), 1);
        let entity = &entities[0];
        assert_eq!(entity.uuid(), Some(uuid.as_str()));
        assert!(entity.created().is_some());
        assert_eq!(entity.get_raw("title"), Some(&json!("t")));
    }

    #[test]
    fn iterator_surfaces_entities() {
        let store = store();
        put(&store, json!({ "kind": "item" }));
        let set = store.query(&Query::new().kind("item")).unwrap();
        let all: Vec<Entity> = set.collect::<StoreResult<_>>().unwrap();
        assert_eq!(all.len(), 1);
    }
}
