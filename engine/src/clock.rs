//! Lamport clock used to name operations and list elements.
//!
//! A `(counter, node_id)` pair is unique per operation: a node never reuses a
//! counter value, and node ids are distinct across replicas. The merge order
//! itself comes from service sequence numbers, so the clock only has to be
//! unique and monotonic per node, not globally meaningful.

use crate::NodeId;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// A Lamport clock stamp.
///
/// Ordered by counter, then by node id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogicalClock {
    /// Replica that issued the stamp
    pub node_id: NodeId,
    /// Lamport counter
    pub counter: u64,
}

impl LogicalClock {
    /// A fresh clock for `node_id` at counter 0.
    pub fn new(node_id: impl Into<NodeId>) -> Self {
        Self {
            node_id: node_id.into(),
            counter: 0,
        }
    }

    /// A stamp with an explicit counter.
    pub fn with_counter(node_id: impl Into<NodeId>, counter: u64) -> Self {
        Self {
            node_id: node_id.into(),
            counter,
        }
    }

    /// Advance the clock and return the stamp for the next local operation.
    pub fn tick(&mut self) -> LogicalClock {
        self.counter += 1;
        self.clone()
    }

    /// Fold a remote stamp into this clock so later local stamps sort after it.
    pub fn observe(&mut self, other: &LogicalClock) {
        self.counter = self.counter.max(other.counter);
    }
}

impl Ord for LogicalClock {
    fn cmp(&self, other: &Self) -> Ordering {
        self.counter
            .cmp(&other.counter)
            .then_with(|| self.node_id.cmp(&other.node_id))
    }
}

impl PartialOrd for LogicalClock {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for LogicalClock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.counter, self.node_id)
    }
}
