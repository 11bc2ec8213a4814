//! Object view over a document, with lazily resolved reference fields.
//!
//! An [`Entity`] keeps store metadata in a typed [`DocumentMeta`] and the
//! caller's fields in an ordered [`Payload`]. A field holding a valid
//! identifier is a reference: reading it yields the referenced entity, and
//! a reference field holding a sequence of identifiers yields a result set.
//! The names of reference fields persist with the document under `_refs`.

use std::fmt;
use std::sync::Arc;

use serde_json::Value;
use tracing::debug;

use docstore_types::{
    is_uuid, is_uuid_value, Actor, DocumentMeta, Payload, Timestamp, RESERVED_FIELDS,
};

use crate::error::{EntityError, StoreResult};
use crate::query::kind_name;
use crate::resultset::{ListEntry, ListResultSet, ResultSet};
use crate::store::{DocumentStore, WriteOptions};

/// Payload field listing the names of reference fields.
pub const REFS_FIELD: &str = "_refs";

/// Customization point for entity types.
///
/// The name scopes the resolver cache; `loaded` runs after every
/// construction and reload.
pub trait EntityClass: Send + Sync {
    fn name(&self) -> &str;

    fn loaded(&self, _entity: &mut Entity, _reloaded: bool) {}
}

/// The default entity type: no post-load behavior.
#[derive(Clone, Copy, Debug, Default)]
pub struct PlainEntity;

impl EntityClass for PlainEntity {
    fn name(&self) -> &str {
        "entity"
    }
}

/// Result of reading a field.
#[derive(Debug)]
pub enum FieldRef<'a> {
    Value(&'a Value),
    Object(Entity),
    Set(ResultSet),
}

impl<'a> FieldRef<'a> {
    pub fn as_value(&self) -> Option<&'a Value> {
        match self {
            Self::Value(v) => Some(*v),
            _ => None,
        }
    }

    pub fn into_object(self) -> Option<Entity> {
        match self {
            Self::Object(e) => Some(e),
            _ => None,
        }
    }

    pub fn into_set(self) -> Option<ResultSet> {
        match self {
            Self::Set(s) => Some(s),
            _ => None,
        }
    }
}

#[derive(Clone)]
pub struct Entity {
    store: Arc<DocumentStore>,
    meta: DocumentMeta,
    fields: Payload,
    refs: Vec<String>,
    /// Last identifier seen, kept across reloads that wipe `meta`.
    remembered: Option<String>,
}

impl Entity {
    /// An empty, unsaved entity.
    pub fn new(store: &Arc<DocumentStore>) -> Self {
        Self::from_payload(store, Payload::new())
    }

    pub fn from_payload(store: &Arc<DocumentStore>, payload: Payload) -> Self {
        let mut entity = Self {
            store: Arc::clone(store),
            meta: DocumentMeta::default(),
            fields: Payload::new(),
            refs: Vec::new(),
            remembered: None,
        };
        entity.populate(payload);
        let class = Arc::clone(store.class());
        class.loaded(&mut entity, false);
        entity
    }

    /// Build from arbitrary structured data, which must be a mapping.
    pub fn from_value(store: &Arc<DocumentStore>, value: Value) -> Result<Self, EntityError> {
        match value {
            Value::Object(map) => Ok(Self::from_payload(store, map)),
            other => Err(EntityError::NotAMapping(kind_name(&other))),
        }
    }

    fn populate(&mut self, mut payload: Payload) {
        self.meta = DocumentMeta::take_from(&mut payload);
        self.refs.clear();
        if let Some(Value::Array(names)) = payload.shift_remove(REFS_FIELD) {
            for name in names.iter().filter_map(Value::as_str) {
                self.register(name);
            }
        }
        self.fields = payload;
        if self.meta.uuid.is_some() {
            self.remembered = self.meta.uuid.clone();
        }
    }

    pub fn document_store(&self) -> &Arc<DocumentStore> {
        &self.store
    }

    pub fn meta(&self) -> &DocumentMeta {
        &self.meta
    }

    pub fn uuid(&self) -> Option<&str> {
        self.meta.uuid.as_deref()
    }

    /// Identifier to reload from, surviving a reload that found nothing.
    pub fn remembered_uuid(&self) -> Option<&str> {
        self.remembered.as_deref()
    }

    pub fn created(&self) -> Option<Timestamp> {
        self.meta.created
    }

    pub fn modified(&self) -> Option<Timestamp> {
        self.meta.modified
    }

    pub fn creator(&self) -> Option<&Actor> {
        self.meta.creator.as_ref()
    }

    pub fn modifier(&self) -> Option<&Actor> {
        self.meta.modifier.as_ref()
    }

    pub fn owner(&self) -> Option<&str> {
        self.meta.owner.as_deref()
    }

    /// The caller's fields, without metadata or `_refs`.
    pub fn fields(&self) -> &Payload {
        &self.fields
    }

    /// Names of fields resolved on read.
    pub fn references(&self) -> &[String] {
        &self.refs
    }

    pub fn is_reference(&self, name: &str) -> bool {
        self.refs.iter().any(|r| r == name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.fields.contains_key(name)
    }

    /// The stored value of a field, never resolved.
    pub fn get_raw(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    /// Read a field, resolving references.
    ///
    /// A reference whose target no longer exists reads as `None`.
    pub fn get(&self, name: &str) -> StoreResult<Option<FieldRef<'_>>> {
        let Some(value) = self.fields.get(name) else {
            return Ok(None);
        };
        if !self.is_reference(name) {
            return Ok(Some(FieldRef::Value(value)));
        }
        let class = self.store.class().name();
        match value {
            Value::Array(items) => {
                let build = || -> Vec<ListEntry> { items.iter().filter_map(ListEntry::from_value).collect() };
                let entries = match &self.meta.uuid {
                    Some(owner) => self.store.cache().list(class, owner, name, build),
                    None => Arc::new(build()),
                };
                let set = ListResultSet::shared(Arc::clone(&self.store), entries);
                Ok(Some(FieldRef::Set(ResultSet::List(set))))
            }
            other => match is_uuid_value(other) {
                Some(uuid) => {
                    let resolved = self
                        .store
                        .cache()
                        .object(class, &uuid, || self.store.fetch_by_uuid(&uuid))?;
                    match resolved {
                        Some(payload) => {
                            let target = Entity::from_payload(&self.store, Payload::clone(&payload));
                            Ok(Some(FieldRef::Object(target)))
                        }
                        None => {
                            debug!(field = name, uuid = %uuid, "dangling reference");
                            Ok(None)
                        }
                    }
                }
                None => Ok(Some(FieldRef::Value(value))),
            },
        }
    }

    /// Assign a field.
    ///
    /// A valid identifier makes the field a reference; any other value makes
    /// it plain. `uuid`, `owner` and `created` update the metadata; the other
    /// store-managed fields cannot be set.
    pub fn set(&mut self, name: &str, value: impl Into<Value>) {
        let value = value.into();
        match name {
            "uuid" => self.meta.uuid = is_uuid_value(&value),
            "owner" => self.meta.owner = value.as_str().map(str::to_string),
            "created" => {
                self.meta.created = value.as_str().and_then(|t| Timestamp::parse(t).ok())
            }
            _ if name == REFS_FIELD || RESERVED_FIELDS.contains(&name) => {
                debug!(field = name, "store-managed field not assigned");
            }
            _ => match is_uuid_value(&value) {
                Some(uuid) => {
                    self.fields.insert(name.to_string(), Value::String(uuid));
                    self.register(name);
                }
                None => {
                    self.fields.insert(name.to_string(), value);
                    self.deregister(name);
                }
            },
        }
    }

    /// Point a field at another entity. An unsaved target clears the field.
    pub fn set_object(&mut self, name: &str, target: &Entity) {
        match target.uuid() {
            Some(uuid) => self.set(name, uuid),
            None => self.set(name, Value::Null),
        }
    }

    /// Make a field a reference to several documents, in order. Invalid
    /// identifiers are dropped.
    pub fn set_references<I, S>(&mut self, name: &str, targets: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let ids = targets
            .into_iter()
            .filter_map(|t| is_uuid(t.as_ref()))
            .map(Value::String)
            .collect();
        self.fields.insert(name.to_string(), Value::Array(ids));
        self.register(name);
    }

    pub fn remove(&mut self, name: &str) -> Option<Value> {
        self.deregister(name);
        self.fields.shift_remove(name)
    }

    fn register(&mut self, name: &str) {
        if !self.is_reference(name) {
            self.refs.push(name.to_string());
        }
    }

    fn deregister(&mut self, name: &str) {
        self.refs.retain(|r| r != name);
    }

    /// The payload `store` would write: fields, `_refs` and metadata.
    pub fn to_payload(&self) -> Payload {
        let mut payload = self.fields.clone();
        if !self.refs.is_empty() {
            let names = self.refs.iter().cloned().map(Value::String).collect();
            payload.insert(REFS_FIELD.to_string(), Value::Array(names));
        }
        self.meta.merge_into(&mut payload);
        payload
    }

    /// Write through the owning store and reload from the stored result.
    /// Returns the identifier.
    pub fn store(&mut self) -> StoreResult<String> {
        self.store_with(None, &WriteOptions::default())
    }

    /// [`Entity::store`] with an actor and write options. Without an explicit
    /// owner the entity's own owner is written.
    pub fn store_with(&mut self, actor: Option<&Actor>, options: &WriteOptions) -> StoreResult<String> {
        let mut options = options.clone();
        if options.owner.is_none() {
            options.owner = self.meta.owner.clone();
        }
        let written = self.store.write(self.to_payload(), actor, &options)?;
        self.reload(Some(written))?;
        Ok(self
            .meta
            .uuid
            .clone()
            .ok_or(EntityError::MissingIdentifier)?)
    }

    /// Replace every field with `data`, or with the stored document when
    /// `data` is `None`.
    ///
    /// Returns the identifier reloaded, or `None` when there was nothing to
    /// load; the entity is then empty but still remembers its identifier.
    pub fn reload(&mut self, data: Option<Payload>) -> StoreResult<Option<String>> {
        let data = match data {
            Some(data) => Some(data),
            None => match self.meta.uuid.clone().or_else(|| self.remembered.clone()) {
                Some(uuid) => self.store.fetch_by_uuid(&uuid)?,
                None => None,
            },
        };
        if self.meta.uuid.is_some() {
            self.remembered = self.meta.uuid.clone();
        }
        self.meta = DocumentMeta::default();
        self.fields.clear();
        self.refs.clear();

        let Some(data) = data else {
            return Ok(None);
        };
        self.populate(data);
        let class = Arc::clone(self.store.class());
        class.loaded(self, true);
        Ok(self.remembered.clone())
    }
}

impl fmt::Debug for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Entity")
            .field("meta", &self.meta)
            .field("fields", &self.fields)
            .field("refs", &self.refs)
            .finish()
    }
}
