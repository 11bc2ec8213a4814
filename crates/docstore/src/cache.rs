//! Shared memo of resolved references.
//!
//! Entries are never invalidated by writes; a cached payload reflects the
//! document as it was when first resolved. Call [`ResolverCache::clear`] to
//! start over.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};

use tracing::debug;

use docstore_types::Payload;

use crate::error::StoreResult;
use crate::resultset::ListEntry;

type ObjectKey = (String, String);
type ListKey = (String, String, String);

#[derive(Default)]
pub struct ResolverCache {
    objects: RwLock<HashMap<ObjectKey, Arc<Payload>>>,
    lists: RwLock<HashMap<ListKey, Arc<Vec<ListEntry>>>>,
}

impl ResolverCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// The document `uuid` as resolved for entity class `class`, loading it
    /// on first use. Misses are not remembered.
    pub fn object<F>(&self, class: &str, uuid: &str, load: F) -> StoreResult<Option<Arc<Payload>>>
    where
        F: FnOnce() -> StoreResult<Option<Payload>>,
    {
        let key = (class.to_string(), uuid.to_string());
        {
            let objects = self.objects.read().unwrap_or_else(PoisonError::into_inner);
            if let Some(payload) = objects.get(&key) {
                return Ok(Some(payload.clone()));
            }
        }
        let Some(payload) = load()? else {
            return Ok(None);
        };
        debug!(class, uuid, "reference cached");
        let mut objects = self.objects.write().unwrap_or_else(PoisonError::into_inner);
        Ok(Some(
            objects.entry(key).or_insert_with(|| Arc::new(payload)).clone(),
        ))
    }

    /// The entries of list field `field` on document `owner`, built on
    /// first use.
    pub fn list<F>(&self, class: &str, owner: &str, field: &str, build: F) -> Arc<Vec<ListEntry>>
    where
        F: FnOnce() -> Vec<ListEntry>,
    {
        let key = (class.to_string(), owner.to_string(), field.to_string());
        {
            let lists = self.lists.read().unwrap_or_else(PoisonError::into_inner);
            if let Some(entries) = lists.get(&key) {
                return entries.clone();
            }
        }
        let built = build();
        let mut lists = self.lists.write().unwrap_or_else(PoisonError::into_inner);
        lists.entry(key).or_insert_with(|| Arc::new(built)).clone()
    }

    pub fn contains_object(&self, class: &str, uuid: &str) -> bool {
        self.objects
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(&(class.to_string(), uuid.to_string()))
    }

    /// Number of cached documents and lists.
    pub fn len(&self) -> usize {
        let objects = self.objects.read().unwrap_or_else(PoisonError::into_inner).len();
        let lists = self.lists.read().unwrap_or_else(PoisonError::into_inner).len();
        objects + lists
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.objects.write().unwrap_or_else(PoisonError::into_inner).clear();
        self.lists.write().unwrap_or_else(PoisonError::into_inner).clear();
    }
}

impl fmt::Debug for ResolverCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResolverCache")
            .field("entries", &self.len())
            .finish()
    }
}
