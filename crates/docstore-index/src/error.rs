//! Error types for the index crate.

/// Errors that can occur during index maintenance.
#[derive(Debug, thiserror::Error)]
pub enum IndexError {
    /// The engine rejected the index transaction's commit.
    #[error("index commit rejected for {0}")]
    CommitRejected(String),

    /// Engine operation failed.
    #[error("database error: {0}")]
    Database(#[from] docstore_db::DbError),
}

/// Convenience alias for index results.
pub type IndexResult<T> = Result<T, IndexError>;
