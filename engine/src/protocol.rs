//! Messages exchanged between replicas and the sync service.

use crate::{reconcile::SkippedOp, NodeId, Operation, OperationId, SeqNo, SequencedOp};
use serde::{Deserialize, Serialize};

/// Pending operations sent by a replica.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadRequest {
    pub node_id: NodeId,
    pub operations: Vec<Operation>,
}

/// An uploaded operation and the sequence number it was given.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AcceptedOp {
    pub op_id: OperationId,
    pub seq: SeqNo,
}

/// Service response to an upload.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadAck {
    /// Sequenced operations, including ones already sequenced by an earlier upload
    pub accepted: Vec<AcceptedOp>,
    /// Malformed operations that will never be sequenced
    pub rejected: Vec<SkippedOp>,
    /// Highest sequence number after the upload
    pub head: SeqNo,
}

/// Query parameters for a download.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DownloadQuery {
    /// Return operations with a sequence number greater than this
    #[serde(default)]
    pub since: SeqNo,
    pub limit: Option<usize>,
}

/// A page of the sequenced log.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DownloadBatch {
    pub operations: Vec<SequencedOp>,
    /// Highest sequence number in the log
    pub head: SeqNo,
    /// Whether more operations follow this page
    pub has_more: bool,
}

impl DownloadBatch {
    /// Sequence number of the last operation in the batch, if any.
    pub fn last_seq(&self) -> Option<SeqNo> {
        self.operations.last().map(|s| s.seq)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn download_query_defaults() {
        let query: DownloadQuery = serde_json::from_str("{}").unwrap();
        assert_eq!(query.since, 0);
        assert_eq!(query.limit, None);
    }

    #[test]
    fn ack_wire_format() {
        let ack = UploadAck {
            accepted: vec![AcceptedOp {
                op_id: crate::LogicalClock::with_counter("child", 1),
                seq: 4,
            }],
            rejected: Vec::new(),
            head: 4,
        };
        let json = serde_json::to_value(&ack).unwrap();
        assert_eq!(json["accepted"][0]["opId"]["nodeId"], "child");
        assert_eq!(json["head"], 4);
    }
}
