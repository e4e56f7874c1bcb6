//! Transports carry uploads and downloads between a replica and the sync
//! service.

mod http;
mod local;

pub use http::HttpTransport;
pub use local::LocalTransport;

use crate::error::Result;
use async_trait::async_trait;
use colsync_engine::{DownloadBatch, SeqNo, UploadAck, UploadRequest};

/// Network layer between a [`SyncSession`](crate::SyncSession) and the
/// service.
///
/// Implementations report an unreachable service as a retryable error
/// (see [`ClientError::is_retryable`](crate::ClientError::is_retryable)).
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send pending operations to be sequenced.
    async fn upload(&self, partition: &str, request: &UploadRequest) -> Result<UploadAck>;

    /// Fetch sequenced operations after `since`, at most `limit` of them.
    async fn download(
        &self,
        partition: &str,
        since: SeqNo,
        limit: Option<usize>,
    ) -> Result<DownloadBatch>;
}
