//! Deterministic replay of the sequenced log.
//!
//! # Algorithm
//!
//! 1. The service assigns every accepted operation a sequence number
//! 2. Replicas apply sequenced operations strictly in that order
//! 3. Conflicts are settled by the order itself: a later operation sees the
//!    effects of every earlier one (a replace of a removed element, or any
//!    operation on a deleted object, becomes a discarded no-op)
//! 4. Pending local operations are re-applied on top of the result
//!
//! Because every replica applies the same operations in the same order through
//! [`PartitionState::apply`], all replicas end in the same state.

use crate::{
    object::Origin, state::ApplyOutcome, NodeId, Operation, OperationId, PartitionState, Schema,
    SequencedOp,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// An operation that had no effect, with the reason.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SkippedOp {
    pub op_id: OperationId,
    pub reason: String,
}

/// Result of replaying a batch of operations.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconcileResult {
    /// Operations that changed state
    pub applied: Vec<OperationId>,
    /// Valid operations that lost a conflict
    pub discarded: Vec<SkippedOp>,
    /// Operations that could not be applied at all
    pub rejected: Vec<SkippedOp>,
}

impl ReconcileResult {
    /// Number of operations processed.
    pub fn total(&self) -> usize {
        self.applied.len() + self.discarded.len() + self.rejected.len()
    }

    /// Merge another result into this one.
    pub fn extend(&mut self, other: ReconcileResult) {
        self.applied.extend(other.applied);
        self.discarded.extend(other.discarded);
        self.rejected.extend(other.rejected);
    }
}

/// Applies operations to a [`PartitionState`] and records what happened.
pub struct Reconciler<'a> {
    schema: &'a Schema,
    local_node: Option<NodeId>,
    result: ReconcileResult,
}

impl<'a> Reconciler<'a> {
    /// Reconciler for the service, where every operation is remote.
    pub fn new(schema: &'a Schema) -> Self {
        Self {
            schema,
            local_node: None,
            result: ReconcileResult::default(),
        }
    }

    /// Reconciler for a replica; operations issued by `node_id` are local.
    pub fn for_node(schema: &'a Schema, node_id: impl Into<NodeId>) -> Self {
        Self {
            schema,
            local_node: Some(node_id.into()),
            result: ReconcileResult::default(),
        }
    }

    fn origin(&self, op: &Operation) -> Origin {
        match &self.local_node {
            Some(node) if *node == op.clock.node_id => Origin::Local,
            _ => Origin::Remote,
        }
    }

    /// Apply one operation. Returns whether the state changed.
    pub fn apply(&mut self, state: &mut PartitionState, op: &Operation) -> bool {
        let origin = self.origin(op);
        match state.apply(self.schema, op, origin) {
            Ok(ApplyOutcome::Applied) => {
                self.result.applied.push(op.op_id().clone());
                true
            }
            Ok(ApplyOutcome::Discarded(reason)) => {
                debug!(
                    op_id = %op.op_id(),
                    kind = op.kind.name(),
                    object = %op.object,
                    %reason,
                    "Operation discarded"
                );
                self.result.discarded.push(SkippedOp {
                    op_id: op.op_id().clone(),
                    reason,
                });
                false
            }
            Err(e) => {
                warn!(
                    op_id = %op.op_id(),
                    kind = op.kind.name(),
                    object = %op.object,
                    error = %e,
                    "Operation rejected"
                );
                self.result.rejected.push(SkippedOp {
                    op_id: op.op_id().clone(),
                    reason: e.to_string(),
                });
                false
            }
        }
    }

    /// Apply sequenced operations in sequence order.
    pub fn replay<'o, I>(&mut self, state: &mut PartitionState, ops: I)
    where
        I: IntoIterator<Item = &'o SequencedOp>,
    {
        let mut ops: Vec<&SequencedOp> = ops.into_iter().collect();
        ops.sort_by_key(|s| s.seq);
        for sequenced in ops {
            self.apply(state, &sequenced.operation);
        }
    }

    /// Consume the reconciler and return what happened.
    pub fn finish(self) -> ReconcileResult {
        self.result
    }
}
