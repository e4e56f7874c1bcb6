//! Colsync Server - sync service for collection replicas.
//!
//! Replicas upload their pending operations to a partition and download the
//! partition's sequenced log. The sequencing and validation rules live in
//! `colsync-engine`; this crate adds HTTP, PostgreSQL durability and the
//! per-partition locking around them.

pub mod config;
pub mod db;
pub mod error;
pub mod handlers;
pub mod registry;
pub mod routes;

use crate::config::Config;
use crate::registry::PartitionRegistry;
use axum::extract::DefaultBodyLimit;
use axum::Router;
use colsync_engine::Schema;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub use config::ConfigError;
pub use error::AppError;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<PartitionRegistry>,
    pub config: Arc<Config>,
}

impl AppState {
    pub fn new(config: Config, schema: Schema, pool: Option<db::Pool>) -> Self {
        Self {
            registry: Arc::new(PartitionRegistry::new(schema, pool)),
            config: Arc::new(config),
        }
    }

    /// State with the standard schema and no database.
    pub fn in_memory() -> Self {
        Self::new(Config::default(), Schema::collection_sync_object(), None)
    }
}

/// Build the application router with tracing and CORS layers.
///
/// Request bodies are capped at `config.max_upload_bytes`.
pub fn app(state: AppState) -> Router {
    let body_limit = state.config.max_upload_bytes;
    Router::new()
        .merge(routes::create_routes())
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}
