use thiserror::Error;

/// Errors produced by type operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TypeError {
    #[error("invalid identifier: {0:?}")]
    InvalidIdentifier(String),

    #[error("invalid actor: {0}")]
    InvalidActor(String),

    #[error("invalid timestamp: {0:?}")]
    InvalidTimestamp(String),
}
