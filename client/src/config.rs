//! Configuration management for sync clients.

use crate::retry::RetryPolicy;
use colsync_engine::{NodeId, PartitionKey};
use std::env;
use std::time::Duration;

/// Client configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base URL of the sync server
    pub url: String,
    /// Identity of this replica
    pub node_id: NodeId,
    pub partition: PartitionKey,
    /// Per-request HTTP timeout
    pub request_timeout: Duration,
    pub retry: RetryPolicy,
}

impl ClientConfig {
    /// Load configuration from environment variables.
    ///
    /// `COLSYNC_NODE_ID` is required; everything else has a default. A
    /// `.env` file in the working directory is read first if present.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        let url = env::var("COLSYNC_URL").unwrap_or_else(|_| "http://127.0.0.1:3000".to_string());
        let node_id = env::var("COLSYNC_NODE_ID")
            .ok()
            .filter(|id| !id.is_empty())
            .ok_or(ConfigError::Missing("COLSYNC_NODE_ID"))?;
        let partition = env::var("COLSYNC_PARTITION").unwrap_or_else(|_| "default".to_string());

        let defaults = RetryPolicy::default();
        let retry = RetryPolicy {
            max_attempts: parse_var("COLSYNC_RETRY_ATTEMPTS")?.unwrap_or(defaults.max_attempts),
            initial_delay: parse_var("COLSYNC_RETRY_BASE_MS")?
                .map(Duration::from_millis)
                .unwrap_or(defaults.initial_delay),
            max_delay: parse_var("COLSYNC_RETRY_MAX_MS")?
                .map(Duration::from_millis)
                .unwrap_or(defaults.max_delay),
            multiplier: defaults.multiplier,
        };
        let request_timeout = parse_var("COLSYNC_TIMEOUT_MS")?
            .map(Duration::from_millis)
            .unwrap_or(Duration::from_secs(10));

        Ok(Self {
            url,
            node_id,
            partition,
            request_timeout,
            retry,
        })
    }

    pub fn new(
        url: impl Into<String>,
        node_id: impl Into<NodeId>,
        partition: impl Into<PartitionKey>,
    ) -> Self {
        Self {
            url: url.into(),
            node_id: node_id.into(),
            partition: partition.into(),
            request_timeout: Duration::from_secs(10),
            retry: RetryPolicy::default(),
        }
    }
}

fn parse_var<T: std::str::FromStr>(name: &'static str) -> Result<Option<T>, ConfigError> {
    match env::var(name) {
        Ok(raw) => raw
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::Invalid { name, value: raw }),
        Err(_) => Ok(None),
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("Invalid {name} value: {value:?}")]
    Invalid { name: &'static str, value: String },
}
