//! Pure derivation of index rows from a payload.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use docstore_types::Payload;

/// The single classification row of a document.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BaseRow {
    pub kind: Option<String>,
    pub realm: Option<String>,
    pub tag: Option<String>,
}

/// Every index row a document should have.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexRows {
    pub uuid: String,
    /// Present only when at least one of kind/realm/tag is set.
    pub base: Option<BaseRow>,
    /// Cleaned, deduplicated tags in first-seen order.
    pub tags: Vec<String>,
    /// Deduplicated alternate identifiers in first-seen order.
    pub iris: Vec<String>,
}

impl IndexRows {
    /// Same rows with tags and IRIs sorted, for comparing sets.
    pub fn sorted(mut self) -> Self {
        self.tags.sort();
        self.iris.sort();
        self
    }

    pub fn is_empty(&self) -> bool {
        self.base.is_none() && self.tags.is_empty() && self.iris.is_empty()
    }
}

/// Lowercase and trim a tag; empty tags are dropped.
pub fn clean_tag(tag: &str) -> Option<String> {
    let cleaned = tag.trim().to_lowercase();
    (!cleaned.is_empty()).then_some(cleaned)
}

/// Text form of a scalar value. Mappings, sequences and null have none.
fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Null | Value::Array(_) | Value::Object(_) => None,
    }
}

fn non_empty(value: Option<&Value>) -> Option<String> {
    value
        .and_then(scalar_text)
        .filter(|s| !s.trim().is_empty())
}

/// A field holding either one scalar or a sequence of scalars.
fn scalar_list(value: Option<&Value>) -> Vec<String> {
    match value {
        Some(Value::Array(items)) => items.iter().filter_map(scalar_text).collect(),
        Some(other) => scalar_text(other).into_iter().collect(),
        None => Vec::new(),
    }
}

fn dedup(items: impl IntoIterator<Item = String>) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for item in items {
        if !out.contains(&item) {
            out.push(item);
        }
    }
    out
}

/// Derive the index rows for document `uuid` from its payload.
///
/// A document of kind `realm` with no `realm` field is its own realm.
pub fn derive_rows(uuid: &str, payload: &Payload) -> IndexRows {
    let kind = non_empty(payload.get("kind"));
    let mut realm = non_empty(payload.get("realm"));
    if realm.is_none() && kind.as_deref() == Some("realm") {
        realm = Some(uuid.to_string());
    }
    let tag = payload
        .get("tag")
        .and_then(scalar_text)
        .and_then(|t| clean_tag(&t));

    let base = (kind.is_some() || realm.is_some() || tag.is_some())
        .then_some(BaseRow { kind, realm, tag });

    let tags = dedup(
        scalar_list(payload.get("tags"))
            .iter()
            .filter_map(|t| clean_tag(t)),
    );
    let iris = dedup(
        scalar_list(payload.get("iri"))
            .into_iter()
            .filter(|iri| !iri.is_empty()),
    );

    IndexRows {
        uuid: uuid.to_string(),
        base,
        tags,
        iris,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;

    const ID: &str = "6ba7b810-9dad-11d1-80b4-00c04fd430c8";

    fn payload(value: Value) -> Payload {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn no_classification_means_no_base_row() {
        let rows = derive_rows(ID, &payload(json!({ "title": "x" })));
        assert!(rows.base.is_none());
        assert!(rows.is_empty());
    }

    #[test]
    fn base_row_from_any_field() {
        let rows = derive_rows(ID, &payload(json!({ "tag": "  Featured " })));
        assert_eq!(
            rows.base,
            Some(BaseRow {
                kind: None,
                realm: None,
                tag: Some("featured".into())
            })
        );

        let rows = derive_rows(ID, &payload(json!({ "kind": "person", "realm": "r1" })));
        let base = rows.base.unwrap();
        assert_eq!(base.kind.as_deref(), Some("person"));
        assert_eq!(base.realm.as_deref(), Some("r1"));
        assert!(base.tag.is_none());
    }

    #[test]
    fn realm_kind_is_its_own_realm() {
        let rows = derive_rows(ID, &payload(json!({ "kind": "realm" })));
        assert_eq!(rows.base.unwrap().realm.as_deref(), Some(ID));

        let rows = derive_rows(ID, &payload(json!({ "kind": "realm", "realm": "outer" })));
        assert_eq!(rows.base.unwrap().realm.as_deref(), Some("outer"));
    }

    #[test]
    fn tags_are_cleaned_and_deduplicated() {
        let rows = derive_rows(
            ID,
            &payload(json!({ "tags": ["  Rust", "rust", "", "   ", "DB", 42, null, ["nested"]] })),
        );
        assert_eq!(rows.tags, vec!["rust", "db", "42"]);
    }

    #[test]
    fn single_tag_and_iri_values_are_accepted() {
        let rows = derive_rows(
            ID,
            &payload(json!({ "tags": "Solo", "iri": "http://example.com/a" })),
        );
        assert_eq!(rows.tags, vec!["solo"]);
        assert_eq!(rows.iris, vec!["http://example.com/a"]);
    }

    #[test]
    fn iris_keep_their_case() {
        let rows = derive_rows(
            ID,
            &payload(json!({ "iri": ["http://Example.com/A", "", "http://Example.com/A", "urn:x"] })),
        );
        assert_eq!(rows.iris, vec!["http://Example.com/A", "urn:x"]);
    }

    #[test]
    fn empty_kind_does_not_count() {
        let rows = derive_rows(ID, &payload(json!({ "kind": "  " })));
        assert!(rows.base.is_none());
    }

    #[test]
    fn clean_tag_rules() {
        assert_eq!(clean_tag(" MiXed "), Some("mixed".into()));
        assert_eq!(clean_tag("   "), None);
    }

    proptest! {
        #[test]
        fn derived_tags_are_clean_and_unique(tags in proptest::collection::vec("[ A-Za-z0-9_-]{0,8}", 0..12)) {
            let rows = derive_rows(ID, &payload(json!({ "tags": tags })));
            for tag in &rows.tags {
                prop_assert_eq!(tag, &tag.trim().to_lowercase());
                prop_assert!(!tag.is_empty());
            }
            let mut unique = rows.tags.clone();
            unique.sort();
            unique.dedup();
            prop_assert_eq!(unique.len(), rows.tags.len());
        }

        #[test]
        fn derivation_is_deterministic(kind in "[a-z]{0,6}", tag in "[A-Za-z ]{0,6}") {
            let p = payload(json!({ "kind": kind, "tag": tag.clone(), "tags": [tag] }));
            prop_assert_eq!(derive_rows(ID, &p), derive_rows(ID, &p));
        }
    }
}
