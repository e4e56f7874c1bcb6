//! In-process transport backed by a shared [`SyncService`].

use super::Transport;
use crate::error::Result;
use async_trait::async_trait;
use colsync_engine::{
    DownloadBatch, DownloadQuery, Error, Schema, SeqNo, SyncService, UploadAck, UploadRequest,
};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;

/// Talks to a [`SyncService`] in the same process.
///
/// Clones share the service, so several sessions built from one transport
/// behave like replicas of one server. The transport can be taken offline
/// to simulate a lost connection.
#[derive(Clone)]
pub struct LocalTransport {
    service: Arc<Mutex<SyncService>>,
    online: Arc<AtomicBool>,
}

impl LocalTransport {
    pub fn new(schema: Schema) -> Self {
        Self::from_service(Arc::new(Mutex::new(SyncService::new(schema))))
    }

    pub fn from_service(service: Arc<Mutex<SyncService>>) -> Self {
        Self {
            service,
            online: Arc::new(AtomicBool::new(true)),
        }
    }

    pub fn service(&self) -> &Arc<Mutex<SyncService>> {
        &self.service
    }

    /// Connect or disconnect every clone of this transport.
    pub fn set_online(&self, online: bool) {
        self.online.store(online, Ordering::SeqCst);
    }

    pub fn is_online(&self) -> bool {
        self.online.load(Ordering::SeqCst)
    }

    fn check_online(&self) -> Result<()> {
        if self.is_online() {
            Ok(())
        } else {
            Err(Error::Disconnected("local transport is offline".to_string()).into())
        }
    }
}

#[async_trait]
impl Transport for LocalTransport {
    async fn upload(&self, partition: &str, request: &UploadRequest) -> Result<UploadAck> {
        self.check_online()?;
        let mut service = self.service.lock().await;
        Ok(service.upload(partition, request))
    }

    async fn download(
        &self,
        partition: &str,
        since: SeqNo,
        limit: Option<usize>,
    ) -> Result<DownloadBatch> {
        self.check_online()?;
        let service = self.service.lock().await;
        Ok(service.download(partition, DownloadQuery { since, limit }))
    }
}
