//! Best-effort filesystem copy of stored documents.
//!
//! Layout: `<root>/<kind>/<first two chars of uuid>/<uuid>.json`. The file
//! holds the caller's fields without store metadata.

use std::fs;
use std::path::{Path, PathBuf};

use serde_json::Value;

use docstore_types::Payload;

use crate::error::MirrorError;

#[derive(Clone, Debug)]
pub struct FsMirror {
    root: PathBuf,
}

impl FsMirror {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Where the document would be mirrored.
    pub fn path_for(&self, kind: &str, uuid: &str) -> Result<PathBuf, MirrorError> {
        if !is_safe_segment(kind) {
            return Err(MirrorError::UnsafeKind(kind.to_string()));
        }
        let shard: String = uuid.chars().take(2).collect();
        if !is_safe_segment(&shard) || !is_safe_segment(uuid) {
            return Err(MirrorError::UnsafeKind(uuid.to_string()));
        }
        Ok(self
            .root
            .join(kind)
            .join(shard)
            .join(format!("{uuid}.json")))
    }

    /// Write `json` for a document whose payload is `payload`.
    ///
    /// Documents without a textual `kind` are not mirrored; `Ok(None)` is
    /// returned for them.
    pub fn write(
        &self,
        uuid: &str,
        payload: &Payload,
        json: &str,
    ) -> Result<Option<PathBuf>, MirrorError> {
        let kind = match payload.get("kind") {
            Some(Value::String(kind)) if !kind.is_empty() => kind,
            _ => return Ok(None),
        };
        let path = self.path_for(kind, uuid)?;
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir).map_err(|source| MirrorError::Io {
                path: dir.to_path_buf(),
                source,
            })?;
        }
        fs::write(&path, json).map_err(|source| MirrorError::Io {
            path: path.clone(),
            source,
        })?;
        Ok(Some(path))
    }
}

fn is_safe_segment(segment: &str) -> bool {
    !segment.is_empty()
        && segment != "."
        && segment != ".."
        && !segment.contains(['/', '\\', '\0'])
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const ID: &str = "6ba7b810-9dad-11d1-80b4-00c04fd430c8";

    fn payload(value: Value) -> Payload {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn writes_sharded_path() {
        let dir = tempfile::tempdir().unwrap();
        let mirror = FsMirror::new(dir.path());
        let written = mirror
            .write(ID, &payload(json!({ "kind": "article" })), r#"{"kind":"article"}"#)
            .unwrap()
            .unwrap();
        assert_eq!(written, dir.path().join("article").join("6b").join(format!("{ID}.json")));
        assert_eq!(fs::read_to_string(written).unwrap(), r#"{"kind":"article"}"#);
    }

    #[test]
    fn skips_documents_without_kind() {
        let dir = tempfile::tempdir().unwrap();
        let mirror = FsMirror::new(dir.path());
        assert!(mirror.write(ID, &payload(json!({ "kind": 3 })), "{}").unwrap().is_none());
        assert!(mirror.write(ID, &Payload::new(), "{}").unwrap().is_none());
    }

    #[test]
    fn rejects_path_traversal() {
        let mirror = FsMirror::new("/nonexistent");
        for kind in ["..", "a/b", "a\\b", "."] {
            assert!(matches!(
                mirror.path_for(kind, ID),
                Err(MirrorError::UnsafeKind(_))
            ));
        }
    }

    #[test]
    fn io_failure_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("file");
        fs::write(&blocker, "x").unwrap();
        let mirror = FsMirror::new(&blocker);
        let err = mirror
            .write(ID, &payload(json!({ "kind": "article" })), "{}")
            .unwrap_err();
        assert!(matches!(err, MirrorError::Io { .. }));
    }
}
