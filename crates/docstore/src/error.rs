//! Error types for the store, queries, entities, the mirror and settings.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("invalid actor: {0}")]
    InvalidActor(#[from] docstore_types::TypeError),

    #[error("write of {uuid} gave up after {attempts} rejected commits")]
    RetriesExhausted { uuid: String, attempts: u32 },

    #[error("stored document {uuid} is corrupt: {reason}")]
    CorruptDocument { uuid: String, reason: String },

    #[error("document {0} vanished between write and read-back")]
    Vanished(String),

    #[error("query error: {0}")]
    Query(#[from] QueryError),

    #[error("entity error: {0}")]
    Entity(#[from] EntityError),

    #[error("index error: {0}")]
    Index(#[from] docstore_index::IndexError),

    #[error("database error: {0}")]
    Database(#[from] docstore_db::DbError),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// A criteria mapping that cannot be turned into a query.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum QueryError {
    #[error("criterion {key}: {reason}")]
    InvalidValue { key: String, reason: String },
}

impl QueryError {
    pub(crate) fn invalid(key: &str, reason: impl Into<String>) -> Self {
        Self::InvalidValue {
            key: key.to_string(),
            reason: reason.into(),
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum EntityError {
    #[error("entity data must be a mapping, got {0}")]
    NotAMapping(&'static str),

    #[error("write returned no identifier")]
    MissingIdentifier,
}

/// Failure of the best-effort filesystem mirror. Never fails a write.
#[derive(Debug, Error)]
pub enum MirrorError {
    #[error("kind {0:?} cannot be used as a directory name")]
    UnsafeKind(String),

    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid configuration: {0}")]
    Parse(#[from] toml::de::Error),
}
