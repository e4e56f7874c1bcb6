//! Download handler - serves the sequenced log to replicas.

use super::validate_partition;
use crate::error::Result;
use crate::registry::PartitionRegistry;
use colsync_engine::{DownloadBatch, DownloadQuery};

/// Serve one page of a partition's log after `query.since`.
pub async fn handle_download(
    registry: &PartitionRegistry,
    partition: &str,
    query: DownloadQuery,
) -> Result<DownloadBatch> {
    validate_partition(partition)?;

    let shared = registry.log(partition).await?;
    let log = shared.lock().await;
    let batch = log.download(query);

    tracing::debug!(
        partition,
        since = query.since,
        returned = batch.operations.len(),
        head = batch.head,
        has_more = batch.has_more,
        "Download served"
    );
    Ok(batch)
}
