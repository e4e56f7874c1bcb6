//! Upload handler - sequences operations sent by replicas.

use super::validate_partition;
use crate::db;
use crate::error::{AppError, Result};
use crate::registry::PartitionRegistry;
use colsync_engine::{UploadAck, UploadRequest};

/// Process an upload from a replica.
///
/// Operations already in the log are acknowledged with their existing
/// sequence number. Malformed operations are rejected one by one without
/// affecting the rest of the batch.
///
/// With a database configured the batch is sequenced on a copy of the log,
/// which replaces the shared log only once the new entries are stored. A
/// failed write leaves the shared log as it was, so no request ever serves
/// an operation that is not persisted.
pub async fn handle_upload(
    registry: &PartitionRegistry,
    partition: &str,
    request: UploadRequest,
) -> Result<UploadAck> {
    validate_partition(partition)?;
    if request.node_id.is_empty() {
        return Err(AppError::BadRequest("nodeId is required".to_string()));
    }

    let shared = registry.log(partition).await?;
    let mut log = shared.lock().await;

    let Some(pool) = registry.pool() else {
        return Ok(log.upload(&request));
    };

    let before = log.head();
    let mut staged = log.clone();
    let ack = staged.upload(&request);

    if let Err(e) = db::insert_operations(pool, partition, staged.entries_since(before)).await {
        // The write may have landed even though it reported failure; reload
        // from the database on next use.
        drop(log);
        registry.evict(partition);
        return Err(e.into());
    }

    *log = staged;
    Ok(ack)
}
