//! Relational engine contract for the document store.
//!
//! The store never talks to a driver directly. It goes through the
//! [`Database`] trait, which captures the handful of things it needs from a
//! relational engine: table naming, literal quoting, parameterized
//! statements, row cursors, and transactions whose commit can report a
//! conflict instead of failing outright.
//!
//! # Backends
//!
//! - [`SqliteDatabase`] -- rusqlite connection behind a mutex; file-backed or
//!   in-memory
//!
//! # Design Rules
//!
//! 1. `commit()` returning `Ok(false)` means "conflict, already rolled back,
//!    try again"; `Err` means the engine itself failed.
//! 2. `SqlValue::Now` is only meaningful in [`Database::insert`], where it
//!    becomes the engine's own clock expression.
//! 3. Cursors are restartable.

pub mod config;
pub mod cursor;
pub mod error;
pub mod sqlite;
pub mod traits;
pub mod value;

pub use config::DatabaseConfig;
pub use cursor::BufferedCursor;
pub use error::{DbError, DbResult};
pub use sqlite::SqliteDatabase;
pub use traits::{Database, RowCursor};
pub use value::{Row, SqlValue};
