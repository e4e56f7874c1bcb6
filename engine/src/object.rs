//! Synchronized objects and their collection properties.

use crate::{
    schema::CollectionKind, List, LogicalClock, ObjectSchema, PrimaryKey, PropertyName, Set,
    Timestamp,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Origin of the last change to an object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Origin {
    /// Written by this replica
    Local,
    /// Received from another replica through the service
    Remote,
}

/// Metadata associated with an object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Metadata {
    /// When the object was created (milliseconds since epoch)
    pub created_at: Timestamp,
    /// When any of its collections last changed (milliseconds since epoch)
    pub updated_at: Timestamp,
    /// Who made the last change
    pub origin: Origin,
    /// Clock of the last operation applied to the object
    pub clock: LogicalClock,
}

impl Metadata {
    pub fn new(timestamp: Timestamp, clock: LogicalClock, origin: Origin) -> Self {
        Self {
            created_at: timestamp,
            updated_at: timestamp,
            origin,
            clock,
        }
    }

    /// Record a modification.
    pub fn touch(&mut self, timestamp: Timestamp, clock: LogicalClock, origin: Origin) {
        self.updated_at = self.updated_at.max(timestamp);
        self.clock = clock;
        self.origin = origin;
    }
}

/// A synchronized object: one list or set per collection property.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncObject {
    /// Primary key
    pub key: PrimaryKey,
    /// List properties by name
    pub lists: BTreeMap<PropertyName, List>,
    /// Set properties by name
    pub sets: BTreeMap<PropertyName, Set>,
    /// Object metadata
    pub metadata: Metadata,
}

impl SyncObject {
    /// Create an object with every collection of `schema` empty.
    pub fn new(
        key: impl Into<PrimaryKey>,
        schema: &ObjectSchema,
        timestamp: Timestamp,
        clock: LogicalClock,
        origin: Origin,
    ) -> Self {
        let mut lists = BTreeMap::new();
        let mut sets = BTreeMap::new();
        for def in schema.properties.values() {
            match def.kind {
                CollectionKind::List => {
                    lists.insert(def.name.clone(), List::new());
                }
                CollectionKind::Set => {
                    sets.insert(def.name.clone(), Set::new());
                }
            }
        }

        Self {
            key: key.into(),
            lists,
            sets,
            metadata: Metadata::new(timestamp, clock, origin),
        }
    }

    pub fn list(&self, property: &str) -> Option<&List> {
        self.lists.get(property)
    }

    pub fn set(&self, property: &str) -> Option<&Set> {
        self.sets.get(property)
    }

    pub(crate) fn list_mut(&mut self, property: &str) -> &mut List {
        self.lists.entry(property.to_string()).or_default()
    }

    pub(crate) fn set_mut(&mut self, property: &str) -> &mut Set {
        self.sets.entry(property.to_string()).or_default()
    }
}
