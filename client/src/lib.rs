//! Colsync Client - sync sessions for collection replicas.
//!
//! A [`SyncSession`] wraps a local [`Store`](colsync_engine::Store) and a
//! [`Transport`]. Writes are captured by the store; the session uploads them,
//! downloads the service's sequenced log and replays it so every replica of
//! a partition converges.
//!
//! ```no_run
//! use colsync_client::{ClientConfig, SyncSession};
//! use colsync_engine::Schema;
//!
//! # async fn run() -> colsync_client::Result<()> {
//! let config = ClientConfig::from_env()?;
//! let session = SyncSession::connect(&config, Schema::collection_sync_object())?;
//!
//! session
//!     .write(|store| {
//!         store.create_object("pk")?;
//!         store.set_insert("pk", "intSet", [1, 2, 3])
//!     })
//!     .await?;
//! session.wait_for_upload().await?;
//! session.wait_for_download().await?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod retry;
pub mod session;
pub mod transport;

pub use config::{ClientConfig, ConfigError};
pub use error::{ClientError, Result};
pub use retry::RetryPolicy;
pub use session::SyncSession;
pub use transport::{HttpTransport, LocalTransport, Transport};
