//! Secondary index maintenance for the document store.
//!
//! Every document may be represented in three derived tables:
//!
//! - the **base index**, one `(uuid, kind, realm, tag)` row when any of the
//!   three classification fields is set;
//! - the **tag index**, one `(uuid, tag)` row per cleaned free-form tag;
//! - the **IRI index**, one `(uuid, iri)` row per alternate identifier.
//!
//! These rows are pure functions of the payload ([`derive_rows`]). The
//! [`IndexMaintainer`] rewrites them delete-then-insert inside one
//! transaction and clears the document's dirty flag in the same commit, so a
//! document whose flag is clear is never partially indexed.
//!
//! [`schema::ensure_schema`] creates the primary and index tables.

pub mod derive;
pub mod error;
pub mod maintainer;
pub mod schema;

pub use derive::{clean_tag, derive_rows, BaseRow, IndexRows};
pub use error::{IndexError, IndexResult};
pub use maintainer::IndexMaintainer;
pub use schema::ensure_schema;
