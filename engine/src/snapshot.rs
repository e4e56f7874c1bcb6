//! Snapshot types for persisting and restoring store state.
//!
//! A snapshot holds the replayed base state, the sync cursor and every
//! pending operation, so a replica can restart without losing queued writes.
//! The view (base plus pending) is not stored; it is rebuilt on import.

use crate::{
    error::Result, schema::CollectionKind, Error, LogicalClock, NodeId, PartitionKey,
    PartitionState, PendingOp, Schema, SchemaVersion, SeqNo,
};
use serde::{Deserialize, Serialize};

/// Version of the snapshot format for future compatibility.
pub const SNAPSHOT_FORMAT_VERSION: u32 = 1;

/// A point-in-time snapshot of a replica.
///
/// Objects are kept in ordered maps, so serialization is deterministic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreSnapshot {
    /// Snapshot format version
    pub format_version: u32,
    /// Schema version at time of snapshot
    pub schema_version: SchemaVersion,
    /// Node ID of the store
    pub node_id: NodeId,
    /// Partition the store syncs
    pub partition: PartitionKey,
    /// Current logical clock state
    pub clock: LogicalClock,
    /// Last sequence number replayed into `base`
    pub synced_seq: SeqNo,
    /// Highest sequence number the service has reported
    pub known_head: SeqNo,
    /// State of the replayed sequenced log
    pub base: PartitionState,
    /// Pending operations not yet downloaded back
    pub pending_ops: Vec<PendingOp>,
}

impl StoreSnapshot {
    /// Create a new empty snapshot.
    pub fn new(
        schema_version: SchemaVersion,
        node_id: impl Into<NodeId>,
        partition: impl Into<PartitionKey>,
    ) -> Self {
        let node_id = node_id.into();
        Self {
            format_version: SNAPSHOT_FORMAT_VERSION,
            schema_version,
            node_id: node_id.clone(),
            partition: partition.into(),
            clock: LogicalClock::new(node_id),
            synced_seq: 0,
            known_head: 0,
            base: PartitionState::new(),
            pending_ops: Vec::new(),
        }
    }

    /// Validate the snapshot against a schema.
    pub fn validate(&self, schema: &Schema) -> Result<()> {
        if self.schema_version != schema.version {
            return Err(Error::SchemaVersionMismatch {
                expected: schema.version,
                actual: self.schema_version,
            });
        }
        if self.known_head < self.synced_seq {
            return Err(Error::InvalidSnapshot(format!(
                "synced sequence {} is past known head {}",
                self.synced_seq, self.known_head
            )));
        }

        for object in self.base.objects() {
            for (name, list) in &object.lists {
                let def = schema.object.property(name, CollectionKind::List)?;
                list.iter()
                    .try_for_each(|v| schema.object.check_value(def, v))?;
            }
            for (name, set) in &object.sets {
                let def = schema.object.property(name, CollectionKind::Set)?;
                set.iter()
                    .try_for_each(|v| schema.object.check_value(def, v))?;
            }
        }

        for pending in &self.pending_ops {
            let op = &pending.operation;
            if op.clock.node_id != self.node_id {
                return Err(Error::InvalidSnapshot(format!(
                    "pending operation {} was issued by another node",
                    op.op_id()
                )));
            }
            schema.validate_operation(op)?;
        }

        Ok(())
    }

    /// Serialize to JSON with deterministic ordering.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self).map_err(|e| Error::InvalidSnapshot(e.to_string()))
    }

    /// Serialize to pretty JSON with deterministic ordering.
    pub fn to_json_pretty(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| Error::InvalidSnapshot(e.to_string()))
    }

    /// Deserialize from JSON.
    pub fn from_json(json: &str) -> Result<Self> {
        let snapshot: Self =
            serde_json::from_str(json).map_err(|e| Error::InvalidSnapshot(e.to_string()))?;

        if snapshot.format_version > SNAPSHOT_FORMAT_VERSION {
            return Err(Error::InvalidSnapshot(format!(
                "unsupported snapshot format version: {} (max supported: {})",
                snapshot.format_version, SNAPSHOT_FORMAT_VERSION
            )));
        }

        Ok(snapshot)
    }
}

/// Metadata about a snapshot (without the full data).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotMetadata {
    pub format_version: u32,
    pub schema_version: SchemaVersion,
    pub node_id: NodeId,
    pub partition: PartitionKey,
    /// Clock counter at snapshot time
    pub clock_counter: u64,
    pub synced_seq: SeqNo,
    pub object_count: usize,
    pub pending_count: usize,
}

impl From<&StoreSnapshot> for SnapshotMetadata {
    fn from(snapshot: &StoreSnapshot) -> Self {
        Self {
            format_version: snapshot.format_version,
            schema_version: snapshot.schema_version,
            node_id: snapshot.node_id.clone(),
            partition: snapshot.partition.clone(),
            clock_counter: snapshot.clock.counter,
            synced_seq: snapshot.synced_seq,
            object_count: snapshot.base.object_count(),
            pending_count: snapshot.pending_ops.len(),
        }
    }
}
