//! Foundation types for the document store.
//!
//! Every other docstore crate depends on `docstore-types`. Nothing in here
//! touches storage; these are the values that flow between the store, the
//! index maintainer and callers.
//!
//! # Key Types
//!
//! - [`Payload`] -- Ordered field mapping persisted as a document body
//! - [`DocumentMeta`] -- Store-managed metadata (uuid, timestamps, actors, owner)
//! - [`Actor`] -- Acting principal: `(scheme, uuid)`
//! - [`Timestamp`] -- Millisecond-precision UTC instant with a sortable text form
//! - [`TableNames`] -- Names of the primary and index tables
//!
//! Identifier handling lives in [`identifier`]: [`generate`] and [`is_uuid`].

pub mod actor;
pub mod error;
pub mod identifier;
pub mod meta;
pub mod tables;
pub mod temporal;

pub use actor::Actor;
pub use error::TypeError;
pub use identifier::{generate, is_uuid, is_uuid_value};
pub use meta::{DocumentMeta, RESERVED_FIELDS};
pub use tables::TableNames;
pub use temporal::Timestamp;

/// A document body: ordered mapping of field name to structured value.
pub type Payload = serde_json::Map<String, serde_json::Value>;
