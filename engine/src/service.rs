//! In-memory sync service: sequences uploaded operations per partition.
//!
//! A [`PartitionLog`] is the authoritative order for one partition. Each
//! uploaded operation is checked against the partition state as of the end of
//! the log; operations that are malformed there are rejected and never get a
//! sequence number, everything else is appended.

use crate::{
    error::Result,
    object::Origin,
    protocol::{AcceptedOp, DownloadBatch, DownloadQuery, UploadAck, UploadRequest},
    reconcile::SkippedOp,
    state::ApplyOutcome,
    Error, Operation, OperationId, PartitionKey, PartitionState, Reconciler, Schema, SeqNo,
    SequencedOp,
};
use std::collections::HashMap;
use tracing::{debug, info, warn};

/// Default page size for downloads.
pub const DEFAULT_DOWNLOAD_LIMIT: usize = 100;

/// Maximum page size for downloads.
pub const MAX_DOWNLOAD_LIMIT: usize = 1000;

/// The sequenced log of one partition.
#[derive(Debug, Clone)]
pub struct PartitionLog {
    partition: PartitionKey,
    schema: Schema,
    entries: Vec<SequencedOp>,
    index: HashMap<OperationId, SeqNo>,
    state: PartitionState,
}

impl PartitionLog {
    pub fn new(partition: impl Into<PartitionKey>, schema: Schema) -> Self {
        Self {
            partition: partition.into(),
            schema,
            entries: Vec::new(),
            index: HashMap::new(),
            state: PartitionState::new(),
        }
    }

    /// Rebuild a log from persisted entries.
    ///
    /// Entries must be contiguous from sequence number 1.
    pub fn from_entries(
        partition: impl Into<PartitionKey>,
        schema: Schema,
        mut entries: Vec<SequencedOp>,
    ) -> Result<Self> {
        entries.sort_by_key(|s| s.seq);
        let mut log = Self::new(partition, schema);

        for (expected, entry) in (1..).zip(&entries) {
            if entry.seq != expected {
                return Err(Error::MalformedOperation(format!(
                    "sequence gap in partition {}: expected {}, found {}",
                    log.partition, expected, entry.seq
                )));
            }
            log.index.insert(entry.operation.op_id().clone(), entry.seq);
        }

        let mut reconciler = Reconciler::new(&log.schema);
        reconciler.replay(&mut log.state, &entries);
        let result = reconciler.finish();
        debug!(
            partition = %log.partition,
            entries = entries.len(),
            discarded = result.discarded.len(),
            "Partition log restored"
        );

        log.entries = entries;
        Ok(log)
    }

    pub fn partition(&self) -> &PartitionKey {
        &self.partition
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// Highest assigned sequence number, 0 when empty.
    pub fn head(&self) -> SeqNo {
        self.entries.len() as SeqNo
    }

    /// State after applying the whole log.
    pub fn state(&self) -> &PartitionState {
        &self.state
    }

    /// Sequence number of an already sequenced operation.
    pub fn seq_of(&self, op_id: &OperationId) -> Option<SeqNo> {
        self.index.get(op_id).copied()
    }

    /// Sequence a batch of uploaded operations.
    ///
    /// Each operation is handled on its own: a rejected operation does not
    /// affect the others. Re-uploading an operation returns its existing
    /// sequence number.
    pub fn upload(&mut self, request: &UploadRequest) -> UploadAck {
        let mut ack = UploadAck::default();

        for op in &request.operations {
            if let Some(seq) = self.seq_of(op.op_id()) {
                ack.accepted.push(AcceptedOp {
                    op_id: op.op_id().clone(),
                    seq,
                });
                continue;
            }

            match self.sequence(&request.node_id, op) {
                Ok(seq) => ack.accepted.push(AcceptedOp {
                    op_id: op.op_id().clone(),
                    seq,
                }),
                Err(e) => {
                    warn!(
                        partition = %self.partition,
                        op_id = %op.op_id(),
                        kind = op.kind.name(),
                        error = %e,
                        "Rejected uploaded operation"
                    );
                    ack.rejected.push(SkippedOp {
                        op_id: op.op_id().clone(),
                        reason: e.to_string(),
                    });
                }
            }
        }

        ack.head = self.head();
        info!(
            partition = %self.partition,
            node_id = %request.node_id,
            accepted = ack.accepted.len(),
            rejected = ack.rejected.len(),
            head = ack.head,
            "Upload processed"
        );
        ack
    }

    fn sequence(&mut self, node_id: &str, op: &Operation) -> Result<SeqNo> {
        if op.clock.node_id != node_id {
            return Err(Error::MalformedOperation(format!(
                "operation {} was not issued by {}",
                op.op_id(),
                node_id
            )));
        }

        // Malformed operations leave the state untouched.
        if let ApplyOutcome::Discarded(reason) = self.state.apply(&self.schema, op, Origin::Remote)? {
            debug!(
                partition = %self.partition,
                op_id = %op.op_id(),
                %reason,
                "Sequencing operation with no effect"
            );
        }

        let seq = self.head() + 1;
        self.index.insert(op.op_id().clone(), seq);
        self.entries.push(SequencedOp {
            seq,
            operation: op.clone(),
        });
        Ok(seq)
    }

    /// Operations with a sequence number greater than `since`.
    pub fn entries_since(&self, since: SeqNo) -> &[SequencedOp] {
        let start = (since as usize).min(self.entries.len());
        &self.entries[start..]
    }

    /// One page of the log after `query.since`.
    pub fn download(&self, query: DownloadQuery) -> DownloadBatch {
        let limit = query
            .limit
            .map(|l| l.clamp(1, MAX_DOWNLOAD_LIMIT))
            .unwrap_or(DEFAULT_DOWNLOAD_LIMIT);
        let remaining = self.entries_since(query.since);

        DownloadBatch {
            operations: remaining.iter().take(limit).cloned().collect(),
            head: self.head(),
            has_more: remaining.len() > limit,
        }
    }
}

/// Sync service holding one log per partition.
#[derive(Debug, Clone)]
pub struct SyncService {
    schema: Schema,
    partitions: HashMap<PartitionKey, PartitionLog>,
}

impl SyncService {
    pub fn new(schema: Schema) -> Self {
        Self {
            schema,
            partitions: HashMap::new(),
        }
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn partition(&self, partition: &str) -> Option<&PartitionLog> {
        self.partitions.get(partition)
    }

    /// Log of `partition`, created empty on first use.
    pub fn partition_mut(&mut self, partition: &str) -> &mut PartitionLog {
        let schema = &self.schema;
        self.partitions
            .entry(partition.to_string())
            .or_insert_with(|| PartitionLog::new(partition, schema.clone()))
    }

    pub fn upload(&mut self, partition: &str, request: &UploadRequest) -> UploadAck {
        self.partition_mut(partition).upload(request)
    }

    pub fn download(&self, partition: &str, query: DownloadQuery) -> DownloadBatch {
        self.partition(partition)
            .map(|log| log.download(query))
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{operation::OperationKind, LogicalClock, Value};

    fn op(node: &str, counter: u64, kind: OperationKind) -> Operation {
        Operation::new(LogicalClock::with_counter(node, counter), 1000, "pk", kind)
    }

    fn request(node: &str, operations: Vec<Operation>) -> UploadRequest {
        UploadRequest {
            node_id: node.into(),
            operations,
        }
    }

    fn seeded() -> PartitionLog {
        let mut log = PartitionLog::new("p", Schema::collection_sync_object());
        log.upload(&request("child", vec![op("child", 1, OperationKind::CreateObject)]));
        log
    }

    #[test]
    fn upload_assigns_sequence_numbers() {
        let mut log = seeded();
        let ack = log.upload(&request(
            "child",
            vec![
                op(
                    "child",
                    2,
                    OperationKind::SetInsert {
                        property: "intSet".into(),
                        values: vec![Value::Int(1)],
                    },
                ),
                op(
                    "child",
                    3,
                    OperationKind::SetClear {
                        property: "intSet".into(),
                    },
                ),
            ],
        ));
        assert_eq!(ack.head, 3);
        assert_eq!(
            ack.accepted.iter().map(|a| a.seq).collect::<Vec<_>>(),
            vec![2, 3]
        );
    }

    #[test]
    fn reupload_is_idempotent() {
        let mut log = seeded();
        let again = log.upload(&request("child", vec![op("child", 1, OperationKind::CreateObject)]));
        assert_eq!(again.accepted[0].seq, 1);
        assert_eq!(log.head(), 1);
    }

    #[test]
    fn malformed_operation_rejected_in_isolation() {
        let mut log = seeded();
        let ack = log.upload(&request(
            "child",
            vec![
                op(
                    "child",
                    2,
                    OperationKind::SetInsert {
                        property: "intSet".into(),
                        values: vec![Value::from("nope")],
                    },
                ),
                op(
                    "child",
                    3,
                    OperationKind::SetInsert {
                        property: "intSet".into(),
                        values: vec![Value::Int(4)],
                    },
                ),
            ],
        ));
        assert_eq!(ack.rejected.len(), 1);
        assert_eq!(ack.rejected[0].op_id.counter, 2);
        assert_eq!(ack.accepted.len(), 1);
        assert_eq!(ack.accepted[0].seq, 2);
        assert!(log.seq_of(&LogicalClock::with_counter("child", 2)).is_none());
    }

    #[test]
    fn foreign_operation_rejected() {
        let mut log = seeded();
        let ack = log.upload(&request("parent", vec![op("child", 9, OperationKind::DeleteObject)]));
        assert_eq!(ack.rejected.len(), 1);
        assert_eq!(log.head(), 1);
    }

    #[test]
    fn download_pages() {
        let mut log = seeded();
        let ops = (2..=6)
            .map(|c| {
                op(
                    "child",
                    c,
                    OperationKind::ListAppend {
                        property: "intList".into(),
                        values: vec![Value::Int(c as i64)],
                    },
                )
            })
            .collect();
        log.upload(&request("child", ops));

        let first = log.download(DownloadQuery {
            since: 0,
            limit: Some(4),
        });
        assert_eq!(first.operations.len(), 4);
        assert!(first.has_more);
        assert_eq!(first.head, 6);

        let rest = log.download(DownloadQuery {
            since: first.last_seq().unwrap(),
            limit: Some(4),
        });
        assert_eq!(rest.operations.len(), 2);
        assert!(!rest.has_more);

        let beyond = log.download(DownloadQuery {
            since: 99,
            limit: None,
        });
        assert!(beyond.operations.is_empty());
    }

    #[test]
    fn restore_replays_entries() {
        let mut log = seeded();
        log.upload(&request(
            "child",
            vec![op(
                "child",
                2,
                OperationKind::ListAppend {
                    property: "intList".into(),
                    values: vec![Value::Int(1), Value::Int(2)],
                },
            )],
        ));

        let restored = PartitionLog::from_entries(
            "p",
            Schema::collection_sync_object(),
            log.entries_since(0).to_vec(),
        )
        .unwrap();
        assert_eq!(restored.head(), 2);
        assert_eq!(restored.state(), log.state());
        assert_eq!(
            restored.seq_of(&LogicalClock::with_counter("child", 2)),
            Some(2)
        );
    }

    #[test]
    fn restore_rejects_gaps() {
        let entries = vec![SequencedOp {
            seq: 2,
            operation: op("child", 1, OperationKind::CreateObject),
        }];
        let result = PartitionLog::from_entries("p", Schema::collection_sync_object(), entries);
        assert!(result.is_err());
    }

    #[test]
    fn service_keeps_partitions_apart() {
        let mut service = SyncService::new(Schema::collection_sync_object());
        service.upload("a", &request("child", vec![op("child", 1, OperationKind::CreateObject)]));
        assert_eq!(service.download("a", DownloadQuery::default()).head, 1);
        assert_eq!(service.download("b", DownloadQuery::default()).head, 0);
    }
}
