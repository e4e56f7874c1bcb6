//! Error types for the collection sync engine.

use crate::{PartitionKey, PrimaryKey, PropertyName, SchemaVersion};
use thiserror::Error;

/// All possible errors from the engine.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Error {
    // Local store errors
    #[error("index {index} out of range for collection of length {len}")]
    OutOfRange { index: usize, len: usize },

    #[error("cannot modify managed collection outside of a write transaction")]
    WriteOutsideTransaction,

    #[error("a write transaction is already in progress")]
    TransactionInProgress,

    #[error("object not found: {0}")]
    ObjectNotFound(PrimaryKey),

    #[error("property not found: {object_type}.{property}")]
    PropertyNotFound {
        object_type: String,
        property: PropertyName,
    },

    #[error("type mismatch for property '{property}': expected {expected}, got {got}")]
    TypeMismatch {
        property: PropertyName,
        expected: String,
        got: String,
    },

    // Merge errors
    #[error("malformed operation: {0}")]
    MalformedOperation(String),

    // Transport errors
    #[error("disconnected from sync service: {0}")]
    Disconnected(String),

    // State errors
    #[error("partition mismatch: expected {expected}, got {actual}")]
    PartitionMismatch {
        expected: PartitionKey,
        actual: PartitionKey,
    },

    #[error("invalid snapshot: {0}")]
    InvalidSnapshot(String),

    #[error("schema version mismatch: expected {expected}, got {actual}")]
    SchemaVersionMismatch {
        expected: SchemaVersion,
        actual: SchemaVersion,
    },
}

/// Result type for engine operations.
pub type Result<T> = std::result::Result<T, Error>;
