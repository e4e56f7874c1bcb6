//! Request handlers for sync operations.

mod download;
mod upload;

pub use download::*;
pub use upload::*;

use crate::error::{AppError, Result};

/// Longest accepted partition key, in bytes.
const MAX_PARTITION_LEN: usize = 128;

fn validate_partition(partition: &str) -> Result<()> {
    if partition.is_empty() || partition.len() > MAX_PARTITION_LEN {
        return Err(AppError::BadRequest(format!(
            "partition key must be 1 to {} bytes",
            MAX_PARTITION_LEN
        )));
    }
    if partition.chars().any(char::is_control) {
        return Err(AppError::BadRequest(
            "partition key contains control characters".to_string(),
        ));
    }
    Ok(())
}
