/// Errors from the relational engine.
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    /// The SQLite driver reported a failure.
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// `SqlValue::Now` was passed as a bound parameter.
    #[error("SqlValue::Now cannot be bound as a parameter (parameter {0})")]
    UnboundNow(usize),

    /// An insert was requested with no fields.
    #[error("insert into {0} without fields")]
    EmptyInsert(String),
}

/// Result alias for engine operations.
pub type DbResult<T> = Result<T, DbError>;
