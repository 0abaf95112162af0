//! Core domain types for groupstore
//!
//! ## Terminology
//!
//! | Term | Definition |
//! |------|------------|
//! | **Entity** | Any record stored in the collection; the caller owns its schema |
//! | **EntityId** | Integer identity, unique within the collection and never reused |
//! | **Record** | Schema-less entity: an identity plus a JSON object of fields |
//!
//! The store only ever looks at an entity's identity. Everything else is
//! serialized to JSON and written back verbatim.

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

// ============================================
// Identity
// ============================================

/// Identity of a stored entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityId(pub i64);

impl EntityId {
    /// Returns the raw integer value
    pub fn get(self) -> i64 {
        self.0
    }
}

impl From<i64> for EntityId {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================
// Entity
// ============================================

/// A record that can live in a [`Store`](crate::Store).
///
/// Implementors expose their identity slot. The store fills it in on
/// [`Store::add`](crate::Store::add) when it is empty and treats it as
/// immutable afterwards.
pub trait Entity: Serialize + DeserializeOwned {
    /// Current identity, `None` before the entity is first stored
    fn id(&self) -> Option<EntityId>;

    /// Set the identity (called by the store only)
    fn set_id(&mut self, id: EntityId);
}

/// Schema-less entity: an optional identity plus arbitrary JSON fields.
///
/// Serializes flat, so `Record::new().with("name", "A")` stored as id 1
/// reads back as `{"id":1,"name":"A"}`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Record {
    /// Identity (assigned by the store if unset)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<EntityId>,
    /// Caller-owned fields
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl Record {
    /// Creates an empty record with no identity
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty record with a caller-chosen identity
    pub fn with_id(id: i64) -> Self {
        Self {
            id: Some(EntityId(id)),
            fields: Map::new(),
        }
    }

    /// Builder-style field setter
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set(key, value);
        self
    }

    /// Sets a field, replacing any previous value
    ///
    /// An `"id"` key is routed to the identity slot so it never shadows it.
    /// A non-integer `"id"` leaves the identity unchanged.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        let key = key.into();
        let value = value.into();
        if key == "id" {
            if let Some(id) = value.as_i64() {
                self.id = Some(EntityId(id));
            }
            return;
        }
        self.fields.insert(key, value);
    }

    /// Looks up a field
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    /// Builds a record from a JSON object, taking `id` from the object if present
    pub fn from_json(value: Value) -> crate::error::Result<Self> {
        Ok(serde_json::from_value(value)?)
    }
}

impl Entity for Record {
    fn id(&self) -> Option<EntityId> {
        self.id
    }

    fn set_id(&mut self, id: EntityId) {
        self.id = Some(id);
    }
}

// ============================================
// Metadata & listing
// ============================================

/// Bookkeeping the store keeps for each entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EntityMeta {
    pub id: EntityId,
    /// When the entity was added
    pub created_at: DateTime<Utc>,
    /// When the entity was last written (equal to `created_at` until updated)
    pub updated_at: DateTime<Utc>,
}

/// Ordering for [`Store::list_by`](crate::Store::list_by).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ListOrder {
    /// Order in which entities were added
    #[default]
    Inserted,
    /// Ascending identity
    Id,
    /// Most recently written first
    RecentlyUpdated,
}

impl ListOrder {
    /// Returns the string representation used in the CLI
    pub fn as_str(&self) -> &'static str {
        match self {
            ListOrder::Inserted => "inserted",
            ListOrder::Id => "id",
            ListOrder::RecentlyUpdated => "updated",
        }
    }

    /// Parses the CLI representation
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "inserted" => Some(ListOrder::Inserted),
            "id" => Some(ListOrder::Id),
            "updated" => Some(ListOrder::RecentlyUpdated),
            _ => None,
        }
    }

    pub(crate) fn order_by(&self) -> &'static str {
        match self {
            ListOrder::Inserted => "seq ASC",
            ListOrder::Id => "id ASC",
            ListOrder::RecentlyUpdated => "rev DESC",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_record_serializes_flat() {
        let mut record = Record::new().with("name", "A");
        record.set_id(EntityId(1));

        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(value, json!({"id": 1, "name": "A"}));
    }

    #[test]
    fn test_record_without_id_omits_it() {
        let record = Record::new().with("name", "A");
        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(value, json!({"name": "A"}));
    }

    #[test]
    fn test_record_from_json_takes_id() {
        let record = Record::from_json(json!({"id": 7, "name": "B", "size": 3})).unwrap();
        assert_eq!(record.id, Some(EntityId(7)));
        assert_eq!(record.get("name"), Some(&json!("B")));
        assert_eq!(record.get("size"), Some(&json!(3)));
        assert!(record.get("id").is_none());
    }

    #[test]
    fn test_set_id_field_routes_to_identity() {
        let mut record = Record::new();
        record.set("id", 42);
        assert_eq!(record.id(), Some(EntityId(42)));
        assert!(record.fields.is_empty());

        record.set("id", "abc");
        record.set("id", 1.5);
        assert_eq!(record.id(), Some(EntityId(42)));
        assert!(record.fields.is_empty());
    }

    #[test]
    fn test_list_order_round_trip_names() {
        for order in [ListOrder::Inserted, ListOrder::Id, ListOrder::RecentlyUpdated] {
            assert_eq!(ListOrder::parse(order.as_str()), Some(order));
        }
        assert_eq!(ListOrder::parse("random"), None);
        assert_eq!(ListOrder::default(), ListOrder::Inserted);
    }
}
