//! Client error types.

use std::time::Duration;
use thiserror::Error;

/// Errors raised by a sync session or transport.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error(transparent)]
    Engine(#[from] colsync_engine::Error),

    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("sync service returned {status}: {message}")]
    Status { status: u16, message: String },

    #[error("cannot encode request: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("invalid service URL: {0}")]
    InvalidUrl(String),

    #[error("timed out after {elapsed:?} waiting for {waiting_for}")]
    Timeout {
        elapsed: Duration,
        waiting_for: &'static str,
    },

    #[error(transparent)]
    Config(#[from] crate::config::ConfigError),
}

impl ClientError {
    /// Whether retrying the same request may succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            ClientError::Engine(colsync_engine::Error::Disconnected(_)) => true,
            ClientError::Transport(e) => e.is_connect() || e.is_timeout() || e.is_request(),
            ClientError::Status { status, .. } => *status >= 500,
            _ => false,
        }
    }
}

/// Result type for client operations.
pub type Result<T> = std::result::Result<T, ClientError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_classification() {
        let offline = ClientError::Engine(colsync_engine::Error::Disconnected("offline".into()));
        assert!(offline.is_retryable());

        let unavailable = ClientError::Status {
            status: 503,
            message: "degraded".into(),
        };
        assert!(unavailable.is_retryable());

        let bad_request = ClientError::Status {
            status: 400,
            message: "nodeId is required".into(),
        };
        assert!(!bad_request.is_retryable());

        let engine = ClientError::Engine(colsync_engine::Error::TransactionInProgress);
        assert!(!engine.is_retryable());
    }
}
