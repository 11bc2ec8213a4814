use serde::{Deserialize, Serialize};

/// Unprefixed names of the four tables a store uses.
///
/// The engine applies its own prefix and quoting on top of these.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TableNames {
    /// Primary table: one row per document, payload plus metadata.
    pub objects: String,
    /// Base index: `(uuid, kind, realm, tag)`.
    pub base: String,
    /// Alternate identifier index: `(uuid, iri)`.
    pub iri: String,
    /// Free-form tag index: `(uuid, tag)`.
    pub tags: String,
}

impl Default for TableNames {
    fn default() -> Self {
        Self {
            objects: "object".into(),
            base: "object_base".into(),
            iri: "object_iri".into(),
            tags: "object_tags".into(),
        }
    }
}
