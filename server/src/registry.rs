//! Partition logs held by the server.
//!
//! Each partition's [`PartitionLog`] sits behind its own async mutex, so
//! uploads to one partition are serialized while partitions proceed
//! independently. With a database configured, a log is loaded on first
//! access and every newly sequenced operation is written before the upload
//! is acknowledged.

use crate::db::{self, Pool};
use crate::error::{AppError, Result};
use colsync_engine::{PartitionKey, PartitionLog, Schema};
use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Shared handle to one partition log.
pub type SharedLog = Arc<Mutex<PartitionLog>>;

/// All partition logs known to this server.
pub struct PartitionRegistry {
    schema: Schema,
    pool: Option<Pool>,
    partitions: DashMap<PartitionKey, SharedLog>,
}

impl PartitionRegistry {
    pub fn new(schema: Schema, pool: Option<Pool>) -> Self {
        Self {
            schema,
            pool,
            partitions: DashMap::new(),
        }
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn pool(&self) -> Option<&Pool> {
        self.pool.as_ref()
    }

    /// Number of partitions currently held in memory.
    pub fn loaded(&self) -> usize {
        self.partitions.len()
    }

    /// The log of `partition`, loading it from the database if needed.
    pub async fn log(&self, partition: &str) -> Result<SharedLog> {
        if let Some(log) = self.partitions.get(partition) {
            return Ok(log.clone());
        }

        let log = match &self.pool {
            Some(pool) => {
                let rows = db::load_partition(pool, partition).await?;
                let entries = rows
                    .iter()
                    .map(|row| row.to_sequenced())
                    .collect::<std::result::Result<Vec<_>, _>>()
                    .map_err(AppError::Internal)?;
                tracing::info!(partition, entries = entries.len(), "Loaded partition log");
                PartitionLog::from_entries(partition, self.schema.clone(), entries)?
            }
            None => PartitionLog::new(partition, self.schema.clone()),
        };

        // Another request may have loaded the same partition meanwhile.
        Ok(self
            .partitions
            .entry(partition.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(log)))
            .clone())
    }

    /// Drop a partition from memory so the next access reloads it.
    pub fn evict(&self, partition: &str) {
        if self.partitions.remove(partition).is_some() {
            tracing::warn!(partition, "Evicted partition log");
        }
    }
}
