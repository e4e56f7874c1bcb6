//! Store - the local replica of one partition.
//!
//! The store keeps two states: `base`, the result of replaying the sequenced
//! log downloaded so far, and the view, which is `base` with every pending
//! local operation applied on top. Reads see the view. Mutations happen
//! inside a write transaction; each one is captured as exactly one
//! [`Operation`] and queued until the replica downloads its sequenced copy.

use crate::{
    error::Result,
    object::Origin,
    operation::OperationKind,
    protocol::{DownloadBatch, UploadAck, UploadRequest},
    reconcile::ReconcileResult,
    schema::CollectionKind,
    snapshot::{SnapshotMetadata, StoreSnapshot, SNAPSHOT_FORMAT_VERSION},
    Error, List, LogicalClock, NodeId, Operation, OperationId, PartitionKey, PartitionState,
    PrimaryKey, Reconciler, Schema, SeqNo, Set, SyncObject, Timestamp, Value,
};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::ops::RangeInclusive;
use tracing::{debug, info, warn};

/// A pending operation waiting to be synced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingOp {
    /// The operation
    pub operation: Operation,
    /// When it was applied locally
    pub applied_at: Timestamp,
    /// Whether the service has acknowledged it
    #[serde(default)]
    pub uploaded: bool,
}

/// Sync state of one collection property.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum CollectionState {
    /// No values and nothing in flight
    Empty,
    /// Local changes not yet uploaded
    Populated,
    /// Uploaded changes not yet downloaded, or remote changes not yet replayed
    Merging,
    /// Matches the service log
    Converged,
}

#[derive(Debug, Clone)]
struct WriteTxn {
    timestamp: Timestamp,
    saved_view: PartitionState,
    saved_clock: LogicalClock,
    ops: Vec<Operation>,
}

/// Local replica of one partition.
#[derive(Debug, Clone)]
pub struct Store {
    schema: Schema,
    node_id: NodeId,
    partition: PartitionKey,
    clock: LogicalClock,
    base: PartitionState,
    view: PartitionState,
    pending: Vec<PendingOp>,
    synced_seq: SeqNo,
    known_head: SeqNo,
    write: Option<WriteTxn>,
}

impl Store {
    /// Create an empty store.
    pub fn new(
        schema: Schema,
        node_id: impl Into<NodeId>,
        partition: impl Into<PartitionKey>,
    ) -> Self {
        let node_id = node_id.into();
        let clock = LogicalClock::new(node_id.clone());
        Self {
            schema,
            node_id,
            partition: partition.into(),
            clock,
            base: PartitionState::new(),
            view: PartitionState::new(),
            pending: Vec::new(),
            synced_seq: 0,
            known_head: 0,
            write: None,
        }
    }

    pub fn node_id(&self) -> &NodeId {
        &self.node_id
    }

    pub fn partition(&self) -> &PartitionKey {
        &self.partition
    }

    pub fn clock(&self) -> &LogicalClock {
        &self.clock
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    // Transactions

    /// Open a write transaction stamped with the current wall-clock time.
    pub fn begin_write(&mut self) -> Result<()> {
        let now = chrono::Utc::now().timestamp_millis().max(0) as Timestamp;
        self.begin_write_at(now)
    }

    /// Open a write transaction with an explicit timestamp.
    pub fn begin_write_at(&mut self, timestamp: Timestamp) -> Result<()> {
        if self.write.is_some() {
            return Err(Error::TransactionInProgress);
        }
        self.write = Some(WriteTxn {
            timestamp,
            saved_view: self.view.clone(),
            saved_clock: self.clock.clone(),
            ops: Vec::new(),
        });
        Ok(())
    }

    /// Commit the open transaction, queueing its operations in program order.
    ///
    /// Returns the ids of the captured operations.
    pub fn commit_write(&mut self) -> Result<Vec<OperationId>> {
        let txn = self.write.take().ok_or(Error::WriteOutsideTransaction)?;
        let ids: Vec<OperationId> = txn.ops.iter().map(|op| op.op_id().clone()).collect();
        self.pending.extend(txn.ops.into_iter().map(|operation| PendingOp {
            operation,
            applied_at: txn.timestamp,
            uploaded: false,
        }));
        debug!(
            node_id = %self.node_id,
            operations = ids.len(),
            pending = self.pending.len(),
            "Write committed"
        );
        Ok(ids)
    }

    /// Discard the open transaction and every change made in it.
    pub fn cancel_write(&mut self) -> Result<()> {
        let txn = self.write.take().ok_or(Error::WriteOutsideTransaction)?;
        self.view = txn.saved_view;
        self.clock = txn.saved_clock;
        Ok(())
    }

    /// Run `f` in a write transaction: commit on `Ok`, roll back on `Err`.
    pub fn write<T, F>(&mut self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Self) -> Result<T>,
    {
        self.begin_write()?;
        match f(self) {
            Ok(value) => {
                self.commit_write()?;
                Ok(value)
            }
            Err(e) => {
                self.cancel_write()?;
                Err(e)
            }
        }
    }

    pub fn is_in_write_transaction(&self) -> bool {
        self.write.is_some()
    }

    /// Capture one operation: apply it to the view and add it to the open
    /// transaction. The clock only advances if the operation applies.
    fn record(&mut self, object: &str, kind: OperationKind) -> Result<OperationId> {
        let timestamp = match &self.write {
            Some(txn) => txn.timestamp,
            None => return Err(Error::WriteOutsideTransaction),
        };

        let previous = self.clock.clone();
        let op = Operation::new(self.clock.tick(), timestamp, object, kind);
        if let Err(e) = self.view.apply(&self.schema, &op, Origin::Local) {
            self.clock = previous;
            return Err(e);
        }

        let id = op.op_id().clone();
        if let Some(txn) = self.write.as_mut() {
            txn.ops.push(op);
        }
        Ok(id)
    }

    fn require_write(&self) -> Result<()> {
        match self.write {
            Some(_) => Ok(()),
            None => Err(Error::WriteOutsideTransaction),
        }
    }

    // Objects

    /// Create an object. Creating an existing object is a no-op on merge.
    pub fn create_object(&mut self, key: impl Into<PrimaryKey>) -> Result<OperationId> {
        let key = key.into();
        self.record(&key, OperationKind::CreateObject)
    }

    pub fn delete_object(&mut self, key: &str) -> Result<OperationId> {
        self.require_write()?;
        self.object_or_err(key)?;
        self.record(key, OperationKind::DeleteObject)
    }

    /// Delete every object; one operation per object.
    pub fn delete_all(&mut self) -> Result<Vec<OperationId>> {
        self.require_write()?;
        let keys: Vec<PrimaryKey> = self.view.objects().map(|o| o.key.clone()).collect();
        keys.iter()
            .map(|key| self.record(key, OperationKind::DeleteObject))
            .collect()
    }

    // Lists

    /// Append values at the end of a list.
    pub fn list_append<I>(&mut self, key: &str, property: &str, values: I) -> Result<OperationId>
    where
        I: IntoIterator,
        I::Item: Into<Value>,
    {
        self.require_write()?;
        self.list(key, property)?;
        let values = values.into_iter().map(Into::into).collect();
        self.record(
            key,
            OperationKind::ListAppend {
                property: property.to_string(),
                values,
            },
        )
    }

    /// Replace the value at `index`.
    pub fn list_set(
        &mut self,
        key: &str,
        property: &str,
        index: usize,
        value: impl Into<Value>,
    ) -> Result<OperationId> {
        self.require_write()?;
        let element = self.list(key, property)?.id_at(index)?.clone();
        self.record(
            key,
            OperationKind::ListSet {
                property: property.to_string(),
                element,
                value: value.into(),
            },
        )
    }

    /// Remove the elements at `range`; later elements shift down.
    pub fn list_remove_range(
        &mut self,
        key: &str,
        property: &str,
        range: RangeInclusive<usize>,
    ) -> Result<OperationId> {
        self.require_write()?;
        let elements = self.list(key, property)?.ids_in(range)?;
        self.record(
            key,
            OperationKind::ListRemove {
                property: property.to_string(),
                elements,
            },
        )
    }

    /// Remove every element of a list.
    pub fn list_remove_all(&mut self, key: &str, property: &str) -> Result<OperationId> {
        self.require_write()?;
        self.list(key, property)?;
        self.record(
            key,
            OperationKind::ListClear {
                property: property.to_string(),
            },
        )
    }

    // Sets

    pub fn set_insert<I>(&mut self, key: &str, property: &str, values: I) -> Result<OperationId>
    where
        I: IntoIterator,
        I::Item: Into<Value>,
    {
        self.require_write()?;
        self.set(key, property)?;
        let values = values.into_iter().map(Into::into).collect();
        self.record(
            key,
            OperationKind::SetInsert {
                property: property.to_string(),
                values,
            },
        )
    }

    pub fn set_remove<I>(&mut self, key: &str, property: &str, values: I) -> Result<OperationId>
    where
        I: IntoIterator,
        I::Item: Into<Value>,
    {
        self.require_write()?;
        self.set(key, property)?;
        let values = values.into_iter().map(Into::into).collect();
        self.record(
            key,
            OperationKind::SetRemove {
                property: property.to_string(),
                values,
            },
        )
    }

    pub fn set_remove_all(&mut self, key: &str, property: &str) -> Result<OperationId> {
        self.require_write()?;
        self.set(key, property)?;
        self.record(
            key,
            OperationKind::SetClear {
                property: property.to_string(),
            },
        )
    }

    /// Keep only values also present in `other`, as merged at replay time.
    pub fn set_intersect(&mut self, key: &str, property: &str, other: &str) -> Result<OperationId> {
        self.require_write()?;
        self.set(key, property)?;
        self.record(
            key,
            OperationKind::SetIntersect {
                property: property.to_string(),
                other: other.to_string(),
            },
        )
    }

    pub fn set_union(&mut self, key: &str, property: &str, other: &str) -> Result<OperationId> {
        self.require_write()?;
        self.set(key, property)?;
        self.record(
            key,
            OperationKind::SetUnion {
                property: property.to_string(),
                other: other.to_string(),
            },
        )
    }

    pub fn set_subtract(&mut self, key: &str, property: &str, other: &str) -> Result<OperationId> {
        self.require_write()?;
        self.set(key, property)?;
        self.record(
            key,
            OperationKind::SetSubtract {
                property: property.to_string(),
                other: other.to_string(),
            },
        )
    }

    // Reads

    pub fn object(&self, key: &str) -> Option<&SyncObject> {
        self.view.object(key)
    }

    pub fn objects(&self) -> impl Iterator<Item = &SyncObject> {
        self.view.objects()
    }

    pub fn object_count(&self) -> usize {
        self.view.object_count()
    }

    fn object_or_err(&self, key: &str) -> Result<&SyncObject> {
        self.view
            .object(key)
            .ok_or_else(|| Error::ObjectNotFound(key.to_string()))
    }

    /// Current contents of a list property.
    pub fn list(&self, key: &str, property: &str) -> Result<&List> {
        self.schema.object.property(property, CollectionKind::List)?;
        self.object_or_err(key)?
            .list(property)
            .ok_or_else(|| self.missing_property(property))
    }

    /// Current contents of a set property.
    pub fn set(&self, key: &str, property: &str) -> Result<&Set> {
        self.schema.object.property(property, CollectionKind::Set)?;
        self.object_or_err(key)?
            .set(property)
            .ok_or_else(|| self.missing_property(property))
    }

    fn missing_property(&self, property: &str) -> Error {
        Error::PropertyNotFound {
            object_type: self.schema.object.name.clone(),
            property: property.to_string(),
        }
    }

    // Sync

    pub fn pending_ops(&self) -> &[PendingOp] {
        &self.pending
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Whether any committed operation still has to be uploaded.
    pub fn has_unuploaded(&self) -> bool {
        self.pending.iter().any(|p| !p.uploaded)
    }

    /// Last sequence number replayed locally.
    pub fn synced_seq(&self) -> SeqNo {
        self.synced_seq
    }

    /// Highest sequence number the service has reported.
    pub fn known_head(&self) -> SeqNo {
        self.known_head
    }

    /// Whether every local change has come back and every known remote change
    /// has been replayed.
    pub fn is_synced(&self) -> bool {
        self.pending.is_empty() && self.synced_seq >= self.known_head
    }

    /// Committed operations that have not been acknowledged yet.
    pub fn upload_request(&self) -> UploadRequest {
        UploadRequest {
            node_id: self.node_id.clone(),
            operations: self
                .pending
                .iter()
                .filter(|p| !p.uploaded)
                .map(|p| p.operation.clone())
                .collect(),
        }
    }

    /// Record the service's response to an upload.
    ///
    /// Accepted operations stay pending until they are downloaded. Rejected
    /// operations are dropped and their local effects rolled back.
    pub fn acknowledge(&mut self, ack: &UploadAck) {
        let accepted: HashSet<&OperationId> = ack.accepted.iter().map(|a| &a.op_id).collect();
        for pending in &mut self.pending {
            if accepted.contains(pending.operation.op_id()) {
                pending.uploaded = true;
            }
        }
        self.known_head = self.known_head.max(ack.head);

        if !ack.rejected.is_empty() {
            let rejected: HashSet<&OperationId> = ack.rejected.iter().map(|r| &r.op_id).collect();
            self.pending
                .retain(|p| !rejected.contains(p.operation.op_id()));
            for skipped in &ack.rejected {
                warn!(
                    node_id = %self.node_id,
                    op_id = %skipped.op_id,
                    reason = %skipped.reason,
                    "Local operation rejected by service"
                );
            }
            self.rebuild_view();
        }
    }

    /// Replay a downloaded batch of the sequenced log.
    ///
    /// Operations already replayed are skipped. Pending operations whose
    /// sequenced copy arrives are dequeued; the rest are re-applied on top of
    /// the new base state.
    pub fn integrate(&mut self, batch: DownloadBatch) -> Result<ReconcileResult> {
        if self.write.is_some() {
            return Err(Error::TransactionInProgress);
        }

        let mut fresh: Vec<_> = batch
            .operations
            .into_iter()
            .filter(|s| s.seq > self.synced_seq)
            .collect();
        fresh.sort_by_key(|s| s.seq);
        for (expected, sequenced) in (self.synced_seq + 1..).zip(&fresh) {
            if sequenced.seq != expected {
                return Err(Error::MalformedOperation(format!(
                    "sequence gap: expected {}, found {}",
                    expected, sequenced.seq
                )));
            }
        }

        let mut reconciler = Reconciler::for_node(&self.schema, self.node_id.clone());
        reconciler.replay(&mut self.base, &fresh);
        let result = reconciler.finish();

        let arrived: HashSet<&OperationId> = fresh.iter().map(|s| s.operation.op_id()).collect();
        self.pending
            .retain(|p| !arrived.contains(p.operation.op_id()));
        for sequenced in &fresh {
            self.clock.observe(&sequenced.operation.clock);
        }
        if let Some(last) = fresh.last() {
            self.synced_seq = last.seq;
        }
        self.known_head = self.known_head.max(batch.head).max(self.synced_seq);
        self.rebuild_view();

        if !fresh.is_empty() {
            info!(
                node_id = %self.node_id,
                applied = result.applied.len(),
                discarded = result.discarded.len(),
                synced_seq = self.synced_seq,
                pending = self.pending.len(),
                "Integrated download"
            );
        }
        Ok(result)
    }

    /// Recompute the view as base plus pending (plus the open transaction).
    fn rebuild_view(&mut self) {
        let mut view = self.base.clone();
        let mut reconciler = Reconciler::for_node(&self.schema, self.node_id.clone());
        for pending in &self.pending {
            reconciler.apply(&mut view, &pending.operation);
        }

        if let Some(txn) = self.write.as_mut() {
            txn.saved_view = view.clone();
            for op in &txn.ops {
                reconciler.apply(&mut view, op);
            }
        }
        self.view = view;
    }

    /// Sync state of one collection property of an object.
    pub fn collection_state(&self, key: &str, property: &str) -> Result<CollectionState> {
        let def = self
            .schema
            .object
            .properties
            .get(property)
            .ok_or_else(|| self.missing_property(property))?;

        let touches = |op: &Operation| {
            op.object == key
                && op
                    .kind
                    .property()
                    .map_or(true, |p| p.as_str() == property)
        };
        let mut in_flight = self.pending.iter().filter(|p| touches(&p.operation));

        if in_flight.clone().any(|p| !p.uploaded) {
            return Ok(CollectionState::Populated);
        }
        if in_flight.next().is_some() || self.known_head > self.synced_seq {
            return Ok(CollectionState::Merging);
        }

        let len = self.view.object(key).map_or(0, |object| match def.kind {
            CollectionKind::List => object.list(property).map_or(0, List::len),
            CollectionKind::Set => object.set(property).map_or(0, Set::len),
        });
        Ok(if len == 0 {
            CollectionState::Empty
        } else {
            CollectionState::Converged
        })
    }

    // Persistence

    /// Export the current store state as a snapshot.
    ///
    /// Operations of an open transaction are not included.
    pub fn export_state(&self) -> StoreSnapshot {
        let mut snapshot = StoreSnapshot::new(
            self.schema.version,
            self.node_id.clone(),
            self.partition.clone(),
        );
        snapshot.clock = match &self.write {
            Some(txn) => txn.saved_clock.clone(),
            None => self.clock.clone(),
        };
        snapshot.synced_seq = self.synced_seq;
        snapshot.known_head = self.known_head;
        snapshot.base = self.base.clone();
        snapshot.pending_ops = self.pending.clone();
        snapshot
    }

    /// Replace the current state with a snapshot's.
    pub fn import_state(&mut self, snapshot: StoreSnapshot) -> Result<()> {
        if self.write.is_some() {
            return Err(Error::TransactionInProgress);
        }
        snapshot.validate(&self.schema)?;

        if snapshot.node_id != self.node_id {
            return Err(Error::InvalidSnapshot(format!(
                "node ID mismatch: expected '{}', got '{}'",
                self.node_id, snapshot.node_id
            )));
        }
        if snapshot.partition != self.partition {
            return Err(Error::PartitionMismatch {
                expected: self.partition.clone(),
                actual: snapshot.partition,
            });
        }

        self.clock = snapshot.clock;
        self.synced_seq = snapshot.synced_seq;
        self.known_head = snapshot.known_head;
        self.base = snapshot.base;
        self.pending = snapshot.pending_ops;
        self.rebuild_view();
        Ok(())
    }

    /// Get snapshot metadata without full export.
    pub fn snapshot_metadata(&self) -> SnapshotMetadata {
        SnapshotMetadata {
            format_version: SNAPSHOT_FORMAT_VERSION,
            schema_version: self.schema.version,
            node_id: self.node_id.clone(),
            partition: self.partition.clone(),
            clock_counter: self.clock.counter,
            synced_seq: self.synced_seq,
            object_count: self.base.object_count(),
            pending_count: self.pending.len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{protocol::AcceptedOp, reconcile::SkippedOp, SequencedOp};

    fn store(node: &str) -> Store {
        Store::new(Schema::collection_sync_object(), node, "p")
    }

    fn with_object(node: &str) -> Store {
        let mut store = store(node);
        store
            .write(|s| s.create_object("pk").map(|_| ()))
            .unwrap();
        store
    }

    fn ints(values: &[i64]) -> Vec<Value> {
        values.iter().map(|v| Value::Int(*v)).collect()
    }

    /// Sequence every unuploaded operation of `store` starting at `seq`.
    fn sequence_pending(store: &Store, seq: SeqNo) -> Vec<SequencedOp> {
        store
            .upload_request()
            .operations
            .into_iter()
            .zip(seq..)
            .map(|(operation, seq)| SequencedOp { seq, operation })
            .collect()
    }

    #[test]
    fn mutation_outside_transaction_fails() {
        let mut store = with_object("child");
        assert_eq!(
            store.list_append("pk", "intList", [1]),
            Err(Error::WriteOutsideTransaction)
        );
        assert_eq!(
            store.create_object("other"),
            Err(Error::WriteOutsideTransaction)
        );
        assert_eq!(store.pending_count(), 1);
    }

    #[test]
    fn nested_begin_fails() {
        let mut store = store("child");
        store.begin_write_at(1000).unwrap();
        assert_eq!(store.begin_write_at(1000), Err(Error::TransactionInProgress));
        store.cancel_write().unwrap();
        assert!(!store.is_in_write_transaction());
    }

    #[test]
    fn list_scenario() {
        let mut store = with_object("child");
        store
            .write(|s| {
                s.list_append("pk", "intList", [1, 2, 3])?;
                s.list_append("pk", "intList", [1, 2, 3])
            })
            .unwrap();
        assert_eq!(store.list("pk", "intList").unwrap().len(), 6);

        store
            .write(|s| s.list_remove_range("pk", "intList", 3..=5))
            .unwrap();
        assert_eq!(store.list("pk", "intList").unwrap().to_vec(), ints(&[1, 2, 3]));

        store.write(|s| s.list_set("pk", "intList", 0, 2)).unwrap();
        assert_eq!(store.list("pk", "intList").unwrap().to_vec(), ints(&[2, 2, 3]));
        assert_eq!(store.pending_count(), 5);
    }

    #[test]
    fn out_of_range_leaves_no_operation() {
        let mut store = with_object("child");
        let result = store.write(|s| s.list_set("pk", "intList", 0, 1));
        assert_eq!(result, Err(Error::OutOfRange { index: 0, len: 0 }));

        let result = store.write(|s| {
            s.list_append("pk", "intList", [1, 2])?;
            s.list_remove_range("pk", "intList", 1..=2)
        });
        assert_eq!(result, Err(Error::OutOfRange { index: 2, len: 2 }));

        // Failed closure rolled back the append too.
        assert!(store.list("pk", "intList").unwrap().is_empty());
        assert_eq!(store.pending_count(), 1);
        assert_eq!(store.clock().counter, 1);
    }

    #[test]
    fn rejected_operation_does_not_advance_clock() {
        let mut store = with_object("child");
        store.begin_write_at(1000).unwrap();
        let err = store
            .set_insert("pk", "boolSet", ["not a bool"])
            .unwrap_err();
        assert!(matches!(err, Error::TypeMismatch { .. }));
        assert_eq!(store.clock().counter, 1);

        store.set_insert("pk", "boolSet", [true]).unwrap();
        store.commit_write().unwrap();
        assert_eq!(store.clock().counter, 2);
        assert_eq!(store.pending_ops()[1].operation.clock.counter, 2);
    }

    #[test]
    fn cancel_restores_view() {
        let mut store = with_object("child");
        store.begin_write_at(1000).unwrap();
        store.set_insert("pk", "intSet", [1, 2]).unwrap();
        assert_eq!(store.set("pk", "intSet").unwrap().len(), 2);
        store.cancel_write().unwrap();
        assert!(store.set("pk", "intSet").unwrap().is_empty());
        assert_eq!(store.pending_count(), 1);
    }

    #[test]
    fn commit_preserves_program_order() {
        let mut store = with_object("child");
        store.begin_write_at(5000).unwrap();
        store.set_insert("pk", "intSet", [1]).unwrap();
        store.set_remove_all("pk", "intSet").unwrap();
        let ids = store.commit_write().unwrap();

        assert_eq!(ids.len(), 2);
        assert!(ids[0] < ids[1]);
        let pending = store.pending_ops();
        assert_eq!(pending[2].operation.kind.name(), "setClear");
        assert_eq!(pending[2].applied_at, 5000);
    }

    #[test]
    fn typed_errors() {
        let mut store = with_object("child");
        store.begin_write_at(1000).unwrap();
        assert!(matches!(
            store.set_insert("pk", "intSet", ["x"]),
            Err(Error::TypeMismatch { .. })
        ));
        assert!(matches!(
            store.list_append("pk", "intSet", [1]),
            Err(Error::TypeMismatch { .. })
        ));
        assert!(matches!(
            store.set_insert("missing", "intSet", [1]),
            Err(Error::ObjectNotFound(_))
        ));
        assert!(matches!(
            store.set_intersect("pk", "intSet", "otherStringSet"),
            Err(Error::TypeMismatch { .. })
        ));
        assert!(matches!(
            store.delete_object("missing"),
            Err(Error::ObjectNotFound(_))
        ));
        store.commit_write().unwrap();
        assert_eq!(store.pending_count(), 1);
    }

    #[test]
    fn integrate_dequeues_own_operations() {
        let mut store = with_object("child");
        store
            .write(|s| s.set_insert("pk", "intSet", [1, 2, 3]))
            .unwrap();

        let log = sequence_pending(&store, 1);
        store.acknowledge(&UploadAck {
            accepted: log
                .iter()
                .map(|s| AcceptedOp {
                    op_id: s.operation.op_id().clone(),
                    seq: s.seq,
                })
                .collect(),
            rejected: Vec::new(),
            head: 2,
        });
        assert_eq!(store.collection_state("pk", "intSet"), Ok(CollectionState::Merging));
        assert!(store.upload_request().operations.is_empty());

        let result = store
            .integrate(DownloadBatch {
                operations: log,
                head: 2,
                has_more: false,
            })
            .unwrap();
        assert_eq!(result.applied.len(), 2);
        assert!(store.is_synced());
        assert_eq!(store.set("pk", "intSet").unwrap().len(), 3);
        assert_eq!(
            store.collection_state("pk", "intSet"),
            Ok(CollectionState::Converged)
        );
        assert_eq!(
            store.collection_state("pk", "intList"),
            Ok(CollectionState::Empty)
        );
    }

    #[test]
    fn remote_operations_apply_under_pending() {
        let mut parent = with_object("parent");
        let remote = sequence_pending(&parent, 1);
        parent.integrate(DownloadBatch {
            operations: remote.clone(),
            head: 1,
            has_more: false,
        })
        .unwrap();
        parent
            .write(|s| s.list_append("pk", "stringList", ["remote"]))
            .unwrap();
        let mut log = remote;
        log.extend(sequence_pending(&parent, 2));

        let mut child = store("child");
        child.integrate(DownloadBatch {
            operations: log[..1].to_vec(),
            head: 1,
            has_more: false,
        })
        .unwrap();
        child
            .write(|s| s.list_append("pk", "stringList", ["local"]))
            .unwrap();
        assert_eq!(
            child.collection_state("pk", "stringList"),
            Ok(CollectionState::Populated)
        );

        child
            .integrate(DownloadBatch {
                operations: log,
                head: 2,
                has_more: false,
            })
            .unwrap();
        assert_eq!(
            child.list("pk", "stringList").unwrap().to_vec(),
            vec![Value::from("remote"), Value::from("local")]
        );
        assert!(child.clock().counter >= 2);
    }

    #[test]
    fn integrate_rejects_gaps_and_open_transactions() {
        let mut store = store("child");
        let ops = sequence_pending(&with_object("parent"), 2);
        assert!(matches!(
            store.integrate(DownloadBatch {
                operations: ops,
                head: 2,
                has_more: false,
            }),
            Err(Error::MalformedOperation(_))
        ));

        store.begin_write_at(1000).unwrap();
        assert_eq!(
            store.integrate(DownloadBatch::default()),
            Err(Error::TransactionInProgress)
        );
    }

    #[test]
    fn rejected_operations_are_rolled_back() {
        let mut store = with_object("child");
        store.write(|s| s.set_insert("pk", "intSet", [7])).unwrap();
        let ops = store.upload_request().operations;

        store.acknowledge(&UploadAck {
            accepted: vec![AcceptedOp {
                op_id: ops[0].op_id().clone(),
                seq: 1,
            }],
            rejected: vec![SkippedOp {
                op_id: ops[1].op_id().clone(),
                reason: "test".into(),
            }],
            head: 1,
        });
        assert_eq!(store.pending_count(), 1);
        assert!(store.set("pk", "intSet").unwrap().is_empty());
    }

    #[test]
    fn delete_all_emits_one_operation_per_object() {
        let mut store = store("child");
        store
            .write(|s| {
                s.create_object("a")?;
                s.create_object("b")?;
                s.delete_all()
            })
            .unwrap();
        assert_eq!(store.object_count(), 0);
        assert_eq!(store.pending_count(), 4);
    }

    #[test]
    fn export_import_roundtrip() {
        let mut store = with_object("child");
        store
            .write(|s| {
                let epoch = chrono::DateTime::<chrono::Utc>::UNIX_EPOCH;
                s.list_append("pk", "dateList", [epoch])
            })
            .unwrap();

        let snapshot = store.export_state();
        let json = snapshot.to_json().unwrap();

        let mut restored = Store::new(Schema::collection_sync_object(), "child", "p");
        restored
            .import_state(StoreSnapshot::from_json(&json).unwrap())
            .unwrap();
        assert_eq!(restored.pending_count(), 2);
        assert_eq!(restored.list("pk", "dateList").unwrap().len(), 1);
        assert_eq!(restored.clock().counter, 2);
        assert_eq!(restored.snapshot_metadata().pending_count, 2);

        let mut other = Store::new(Schema::collection_sync_object(), "child", "q");
        assert!(matches!(
            other.import_state(snapshot),
            Err(Error::PartitionMismatch { .. })
        ));
    }
}
