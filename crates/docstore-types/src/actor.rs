use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::error::TypeError;
use crate::identifier::is_uuid;

/// The principal performing a write: an authentication scheme plus the
/// identity's uuid within that scheme.
///
/// Recorded as `creator` on insert and `modifier` on every write.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Actor {
    pub scheme: String,
    pub uuid: String,
}

impl Actor {
    /// Build a validated actor.
    pub fn new(scheme: impl Into<String>, uuid: &str) -> Result<Self, TypeError> {
        Self {
            scheme: scheme.into(),
            uuid: uuid.to_string(),
        }
        .validated()
    }

    /// Check the scheme is non-empty and the uuid is an identifier, returning
    /// a copy with the uuid normalized.
    pub fn validated(&self) -> Result<Self, TypeError> {
        if self.scheme.trim().is_empty() {
            return Err(TypeError::InvalidActor("empty scheme".into()));
        }
        let uuid = is_uuid(&self.uuid)
            .ok_or_else(|| TypeError::InvalidActor(format!("bad uuid {:?}", self.uuid)))?;
        Ok(Self {
            scheme: self.scheme.clone(),
            uuid,
        })
    }

    /// Parse the `scheme:uuid` command-line spelling.
    pub fn parse(spec: &str) -> Result<Self, TypeError> {
        let (scheme, uuid) = spec
            .split_once(':')
            .ok_or_else(|| TypeError::InvalidActor(format!("expected scheme:uuid, got {spec:?}")))?;
        Self::new(scheme, uuid)
    }

    /// Rebuild from the two nullable columns a row stores. Absent when the
    /// uuid column is empty.
    pub fn from_columns(scheme: Option<&str>, uuid: Option<&str>) -> Option<Self> {
        let uuid = uuid.filter(|u| !u.is_empty())?;
        Some(Self {
            scheme: scheme.unwrap_or_default().to_string(),
            uuid: uuid.to_string(),
        })
    }

    /// The `{ "scheme": .., "uuid": .. }` mapping merged into payloads.
    pub fn to_value(&self) -> Value {
        json!({ "scheme": self.scheme, "uuid": self.uuid })
    }

    pub fn from_value(value: &Value) -> Option<Self> {
        let map = value.as_object()?;
        let scheme = map.get("scheme")?.as_str()?;
        let uuid = map.get("uuid")?.as_str()?;
        Some(Self {
            scheme: scheme.to_string(),
            uuid: uuid.to_string(),
        })
    }
}

impl fmt::Display for Actor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.scheme, self.uuid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ID: &str = "6ba7b810-9dad-11d1-80b4-00c04fd430c8";

    #[test]
    fn new_normalizes_uuid() {
        let actor = Actor::new("oauth", &ID.to_uppercase()).unwrap();
        assert_eq!(actor.uuid, ID);
        assert_eq!(actor.scheme, "oauth");
    }

    #[test]
    fn empty_scheme_is_rejected() {
        assert!(matches!(
            Actor::new("  ", ID),
            Err(TypeError::InvalidActor(_))
        ));
    }

    #[test]
    fn bad_uuid_is_rejected() {
        assert!(Actor::new("local", "not-a-uuid").is_err());
    }

    #[test]
    fn parse_cli_spelling() {
        let actor = Actor::parse(&format!("local:{ID}")).unwrap();
        assert_eq!(actor.to_string(), format!("local:{ID}"));
        assert!(Actor::parse("missing-colon").is_err());
    }

    #[test]
    fn columns_without_uuid_mean_no_actor() {
        assert!(Actor::from_columns(Some("local"), None).is_none());
        assert!(Actor::from_columns(Some("local"), Some("")).is_none());
        let actor = Actor::from_columns(Some("local"), Some(ID)).unwrap();
        assert_eq!(actor.uuid, ID);
    }

    #[test]
    fn value_form() {
        let actor = Actor::new("local", ID).unwrap();
        let value = actor.to_value();
        assert_eq!(value["scheme"], "local");
        assert_eq!(Actor::from_value(&value), Some(actor));
        assert!(Actor::from_value(&json!("local")).is_none());
    }
}
