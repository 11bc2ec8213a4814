//! Schemaless document store on a relational engine.
//!
//! Documents are ordered field mappings persisted as serialized text in a
//! primary table, with derived index tables that make them findable by
//! kind, realm, tag, tag set and IRI. The store owns identifiers and
//! metadata; callers own everything else.
//!
//! # Architecture
//!
//! ```text
//! DocumentStore ── write / fetch / query / repair
//!   ├── Database          (docstore-db: engine contract, SQLite binding)
//!   ├── IndexMaintainer   (docstore-index: delete-then-insert index rows)
//!   ├── FsMirror          optional file copy per document
//!   ├── StoreObserver     non-fatal events
//!   └── ResolverCache     shared memo of resolved references
//!
//! Query ── compile ──> CompiledQuery ──> ResultSet ──> Entity
//! ```
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use docstore::{DocumentStore, EntitySet, Query, StoreConfig, WriteOptions};
//! use docstore_db::SqliteDatabase;
//! use serde_json::json;
//!
//! let db = SqliteDatabase::open_in_memory().unwrap();
//! let store = Arc::new(DocumentStore::new(Arc::new(db), StoreConfig::default()));
//! store.ensure_schema().unwrap();
//!
//! let doc = json!({ "kind": "note", "tags": ["todo"] });
//! let written = store
//!     .write(doc.as_object().cloned().unwrap(), None, &WriteOptions::default())
//!     .unwrap();
//!
//! let mut found = store.query(&Query::new().kind("note").with_tag("todo")).unwrap();
//! let note = found.next_entity().unwrap().unwrap();
//! assert_eq!(note.uuid(), written["uuid"].as_str());
//! ```

pub mod cache;
pub mod config;
pub mod entity;
pub mod error;
pub mod mirror;
pub mod observer;
pub mod query;
pub mod resultset;
pub mod store;

pub use cache::ResolverCache;
pub use config::{RetryPolicy, Settings, StoreConfig};
pub use entity::{Entity, EntityClass, FieldRef, PlainEntity, REFS_FIELD};
pub use error::{ConfigError, EntityError, MirrorError, QueryError, StoreError, StoreResult};
pub use mirror::FsMirror;
pub use observer::{NoopObserver, StoreObserver, TracingObserver};
pub use query::{CompiledQuery, Query, QueryWarning};
pub use resultset::{CursorResultSet, EntitySet, ListEntry, ListResultSet, ResultSet};
pub use store::{DocumentStore, WriteOptions, DEFAULT_PENDING_LIMIT};

pub use docstore_index::ensure_schema;
pub use docstore_types::{Actor, DocumentMeta, Payload, TableNames, Timestamp};
