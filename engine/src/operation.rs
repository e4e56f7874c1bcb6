//! Operation log entries.
//!
//! Every local mutation is captured as one [`Operation`]. Operations refer to
//! list elements by [`ElementId`] and to set operands by property name, never
//! by position, so they can be replayed on top of state that already contains
//! other replicas' changes.

use crate::{LogicalClock, PrimaryKey, PropertyName, SeqNo, Timestamp, Value};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Unique identifier for an operation: the issuing replica's clock stamp.
pub type OperationId = LogicalClock;

/// Stable identity of one list element.
///
/// The element appended at position `offset` of the values of operation `op`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ElementId {
    pub op: OperationId,
    pub offset: u32,
}

impl ElementId {
    pub fn new(op: OperationId, offset: u32) -> Self {
        Self { op, offset }
    }
}

impl fmt::Display for ElementId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.op, self.offset)
    }
}

/// What an operation does.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum OperationKind {
    /// Create the object if it does not exist
    CreateObject,
    /// Delete the object and all its collections
    DeleteObject,
    /// Append values at the tail of a list
    ListAppend {
        property: PropertyName,
        values: Vec<Value>,
    },
    /// Replace the value of one list element
    ListSet {
        property: PropertyName,
        element: ElementId,
        value: Value,
    },
    /// Remove list elements (a contiguous range at capture time)
    ListRemove {
        property: PropertyName,
        elements: Vec<ElementId>,
    },
    /// Remove every element of a list
    ListClear { property: PropertyName },
    /// Insert values into a set
    SetInsert {
        property: PropertyName,
        values: Vec<Value>,
    },
    /// Remove values from a set
    SetRemove {
        property: PropertyName,
        values: Vec<Value>,
    },
    /// Remove every value of a set
    SetClear { property: PropertyName },
    /// Keep only values also present in `other`
    SetIntersect {
        property: PropertyName,
        other: PropertyName,
    },
    /// Insert every value of `other`
    SetUnion {
        property: PropertyName,
        other: PropertyName,
    },
    /// Remove every value present in `other`
    SetSubtract {
        property: PropertyName,
        other: PropertyName,
    },
}

impl OperationKind {
    /// Short name used in logs.
    pub fn name(&self) -> &'static str {
        match self {
            OperationKind::CreateObject => "createObject",
            OperationKind::DeleteObject => "deleteObject",
            OperationKind::ListAppend { .. } => "listAppend",
            OperationKind::ListSet { .. } => "listSet",
            OperationKind::ListRemove { .. } => "listRemove",
            OperationKind::ListClear { .. } => "listClear",
            OperationKind::SetInsert { .. } => "setInsert",
            OperationKind::SetRemove { .. } => "setRemove",
            OperationKind::SetClear { .. } => "setClear",
            OperationKind::SetIntersect { .. } => "setIntersect",
            OperationKind::SetUnion { .. } => "setUnion",
            OperationKind::SetSubtract { .. } => "setSubtract",
        }
    }

    /// The collection property this operation writes, if any.
    pub fn property(&self) -> Option<&PropertyName> {
        match self {
            OperationKind::CreateObject | OperationKind::DeleteObject => None,
            OperationKind::ListAppend { property, .. }
            | OperationKind::ListSet { property, .. }
            | OperationKind::ListRemove { property, .. }
            | OperationKind::ListClear { property }
            | OperationKind::SetInsert { property, .. }
            | OperationKind::SetRemove { property, .. }
            | OperationKind::SetClear { property }
            | OperationKind::SetIntersect { property, .. }
            | OperationKind::SetUnion { property, .. }
            | OperationKind::SetSubtract { property, .. } => Some(property),
        }
    }
}

/// One captured local mutation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Operation {
    /// Clock stamp; doubles as the operation id
    pub clock: LogicalClock,
    /// Wall-clock time of capture (milliseconds since epoch)
    pub timestamp: Timestamp,
    /// Target object
    pub object: PrimaryKey,
    /// The mutation
    pub kind: OperationKind,
}

impl Operation {
    /// Create a new operation.
    pub fn new(
        clock: LogicalClock,
        timestamp: Timestamp,
        object: impl Into<PrimaryKey>,
        kind: OperationKind,
    ) -> Self {
        Self {
            clock,
            timestamp,
            object: object.into(),
            kind,
        }
    }

    /// Get the operation ID.
    pub fn op_id(&self) -> &OperationId {
        &self.clock
    }

    /// Ids of the list elements this operation creates.
    pub fn created_elements(&self) -> Vec<ElementId> {
        match &self.kind {
            OperationKind::ListAppend { values, .. } => (0..values.len())
                .map(|offset| ElementId::new(self.clock.clone(), offset as u32))
                .collect(),
            _ => Vec::new(),
        }
    }
}

/// An operation with its service-assigned merge sequence number.
///
/// The sequence number is the total order every replica replays in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SequencedOp {
    pub seq: SeqNo,
    pub operation: Operation,
}
