//! A replica connected to the sync service.

use crate::config::ClientConfig;
use crate::error::{ClientError, Result};
use crate::retry::RetryPolicy;
use crate::transport::{HttpTransport, Transport};
use colsync_engine::{
    NodeId, Operation, PartitionKey, ReconcileResult, Schema, Store, UploadAck, UploadRequest,
};
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::{debug, info};

/// Default budget for the encoded operations of one upload request. A single
/// operation larger than this is sent on its own.
pub const DEFAULT_UPLOAD_BATCH_BYTES: usize = 4 * 1024 * 1024;

/// Owns a replica's [`Store`] and moves its operations to and from the
/// service through a [`Transport`].
///
/// The store is only locked for local work; network calls run without
/// holding it so writes can continue while a request is in flight.
pub struct SyncSession<T: Transport> {
    store: Mutex<Store>,
    transport: T,
    node_id: NodeId,
    partition: PartitionKey,
    retry: RetryPolicy,
    page_size: Option<usize>,
    upload_batch_bytes: usize,
}

impl SyncSession<HttpTransport> {
    /// Connect a fresh replica to the server named in `config`.
    pub fn connect(config: &ClientConfig, schema: Schema) -> Result<Self> {
        let transport = HttpTransport::from_config(config)?;
        let store = Store::new(schema, config.node_id.clone(), config.partition.clone());
        Ok(Self::new(store, transport).with_retry(config.retry))
    }
}

impl<T: Transport> SyncSession<T> {
    pub fn new(store: Store, transport: T) -> Self {
        let node_id = store.node_id().clone();
        let partition = store.partition().clone();
        Self {
            store: Mutex::new(store),
            transport,
            node_id,
            partition,
            retry: RetryPolicy::default(),
            page_size: None,
            upload_batch_bytes: DEFAULT_UPLOAD_BATCH_BYTES,
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Limit the number of operations fetched per download request.
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = Some(page_size);
        self
    }

    /// Split uploads so each request carries roughly `bytes` of encoded
    /// operations.
    pub fn with_upload_batch_bytes(mut self, bytes: usize) -> Self {
        self.upload_batch_bytes = bytes.max(1);
        self
    }

    pub fn node_id(&self) -> &NodeId {
        &self.node_id
    }

    pub fn partition(&self) -> &PartitionKey {
        &self.partition
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Run `f` inside a write transaction on the local store.
    pub async fn write<R, F>(&self, f: F) -> Result<R>
    where
        F: FnOnce(&mut Store) -> colsync_engine::Result<R>,
    {
        let mut store = self.store.lock().await;
        Ok(store.write(f)?)
    }

    /// Read from the local store.
    pub async fn read<R>(&self, f: impl FnOnce(&Store) -> R) -> R {
        let store = self.store.lock().await;
        f(&store)
    }

    pub fn into_store(self) -> Store {
        self.store.into_inner()
    }

    /// Upload operations the service has not acknowledged yet.
    ///
    /// Pending operations are sent in order, in as many requests as the
    /// batch budget requires. Each batch is acknowledged before the next is
    /// sent, so a failure part way leaves only the remainder pending.
    pub async fn upload(&self) -> Result<UploadAck> {
        let request = self.store.lock().await.upload_request();
        let mut total = UploadAck {
            head: self.store.lock().await.known_head(),
            ..UploadAck::default()
        };
        if request.operations.is_empty() {
            return Ok(total);
        }

        for operations in batches(request.operations, self.upload_batch_bytes)? {
            let batch = UploadRequest {
                node_id: request.node_id.clone(),
                operations,
            };
            let ack = self
                .retry
                .run("upload", || self.transport.upload(&self.partition, &batch))
                .await?;
            debug!(
                node_id = %self.node_id,
                sent = batch.operations.len(),
                accepted = ack.accepted.len(),
                rejected = ack.rejected.len(),
                head = ack.head,
                "Upload acknowledged"
            );
            self.store.lock().await.acknowledge(&ack);
            total.accepted.extend(ack.accepted);
            total.rejected.extend(ack.rejected);
            total.head = total.head.max(ack.head);
        }
        Ok(total)
    }

    /// Download and replay everything the service has sequenced since the
    /// last download.
    pub async fn download(&self) -> Result<ReconcileResult> {
        let mut total = ReconcileResult::default();
        loop {
            let since = self.store.lock().await.synced_seq();
            let batch = self
                .retry
                .run("download", || {
                    self.transport
                        .download(&self.partition, since, self.page_size)
                })
                .await?;
            let has_more = batch.has_more;
            let result = self.store.lock().await.integrate(batch)?;
            total.extend(result);
            if !has_more {
                return Ok(total);
            }
        }
    }

    /// Upload then download.
    pub async fn sync(&self) -> Result<ReconcileResult> {
        self.upload().await?;
        self.download().await
    }

    /// Return once the service has acknowledged every committed operation.
    pub async fn wait_for_upload(&self) -> Result<()> {
        while self.store.lock().await.has_unuploaded() {
            self.upload().await?;
        }
        Ok(())
    }

    /// Return once every operation the service has sequenced is replayed
    /// locally.
    pub async fn wait_for_download(&self) -> Result<()> {
        self.download().await?;
        Ok(())
    }

    /// Download repeatedly until `predicate` holds for the local store,
    /// backing off between attempts.
    pub async fn wait_until<P>(&self, predicate: P, timeout: Duration) -> Result<()>
    where
        P: Fn(&Store) -> bool,
    {
        let started = Instant::now();
        let mut attempt = 0;
        loop {
            self.download().await?;
            if predicate(&*self.store.lock().await) {
                info!(
                    node_id = %self.node_id,
                    attempts = attempt + 1,
                    "Replica reached expected state"
                );
                return Ok(());
            }

            let elapsed = started.elapsed();
            if elapsed >= timeout {
                return Err(ClientError::Timeout {
                    elapsed,
                    waiting_for: "replica to reach expected state",
                });
            }
            let delay = self.retry.delay(attempt).min(timeout - elapsed);
            tokio::time::sleep(delay).await;
            attempt += 1;
        }
    }
}

/// Group operations into runs whose JSON encoding stays within `max_bytes`.
fn batches(operations: Vec<Operation>, max_bytes: usize) -> Result<Vec<Vec<Operation>>> {
    let mut batches = Vec::new();
    let mut current = Vec::new();
    let mut current_bytes = 0;
    for op in operations {
        let size = serde_json::to_vec(&op)?.len();
        if !current.is_empty() && current_bytes + size > max_bytes {
            batches.push(std::mem::take(&mut current));
            current_bytes = 0;
        }
        current_bytes += size;
        current.push(op);
    }
    if !current.is_empty() {
        batches.push(current);
    }
    Ok(batches)
}
