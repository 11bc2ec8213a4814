//! Store-managed document metadata.
//!
//! A payload as seen by callers is the caller's own fields plus the metadata
//! below. The store owns these fields: they are stripped before the payload
//! is serialized and merged back from the primary row after every read.

use serde_json::Value;

use crate::actor::Actor;
use crate::temporal::Timestamp;
use crate::Payload;

/// Field names the store manages. Callers never persist these directly.
pub const RESERVED_FIELDS: [&str; 7] = [
    "uuid", "created", "modified", "creator", "modifier", "dirty", "owner",
];

/// Typed view of the reserved fields of a document.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DocumentMeta {
    pub uuid: Option<String>,
    pub created: Option<Timestamp>,
    pub modified: Option<Timestamp>,
    pub creator: Option<Actor>,
    pub modifier: Option<Actor>,
    pub owner: Option<String>,
}

impl DocumentMeta {
    /// Remove every reserved field from `payload`.
    pub fn strip(payload: &mut Payload) {
        for field in RESERVED_FIELDS {
            payload.shift_remove(field);
        }
    }

    /// Remove the reserved fields from `payload`, keeping whatever parses.
    ///
    /// Values that do not parse (a `created` that is not a timestamp, a
    /// `creator` that is not a mapping) are dropped.
    pub fn take_from(payload: &mut Payload) -> Self {
        let text = |v: Option<Value>| match v {
            Some(Value::String(s)) if !s.is_empty() => Some(s),
            _ => None,
        };
        let time = |v: Option<Value>| text(v).and_then(|s| Timestamp::parse(&s).ok());
        let actor = |v: Option<Value>| v.as_ref().and_then(Actor::from_value);

        let meta = Self {
            uuid: text(payload.shift_remove("uuid")),
            created: time(payload.shift_remove("created")),
            modified: time(payload.shift_remove("modified")),
            creator: actor(payload.shift_remove("creator")),
            modifier: actor(payload.shift_remove("modifier")),
            owner: text(payload.shift_remove("owner")),
        };
        payload.shift_remove("dirty");
        meta
    }

    /// Write the known fields into `payload`, replacing any existing values.
    pub fn merge_into(&self, payload: &mut Payload) {
        if let Some(uuid) = &self.uuid {
            payload.insert("uuid".into(), Value::String(uuid.clone()));
        }
        if let Some(created) = &self.created {
            payload.insert("created".into(), Value::String(created.to_text()));
        }
        if let Some(creator) = &self.creator {
            payload.insert("creator".into(), creator.to_value());
        }
        if let Some(modified) = &self.modified {
            payload.insert("modified".into(), Value::String(modified.to_text()));
        }
        if let Some(modifier) = &self.modifier {
            payload.insert("modifier".into(), modifier.to_value());
        }
        if let Some(owner) = &self.owner {
            payload.insert("owner".into(), Value::String(owner.clone()));
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}
