//! Health check endpoint.

use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use serde::Serialize;

use crate::db;
use crate::AppState;

/// Health check response.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    /// "postgres" or "memory"
    pub storage: String,
    pub schema_version: u32,
    pub partitions_loaded: usize,
}

/// Create health routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health_check))
        .route("/", get(root))
}

/// Health check handler.
async fn health_check(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    let registry = &state.registry;
    let (status, storage) = match registry.pool() {
        Some(pool) => match db::ping(pool).await {
            Ok(()) => (StatusCode::OK, "postgres"),
            Err(e) => {
                tracing::warn!("Health check database ping failed: {}", e);
                (StatusCode::SERVICE_UNAVAILABLE, "postgres")
            }
        },
        None => (StatusCode::OK, "memory"),
    };

    let body = HealthResponse {
        status: if status == StatusCode::OK { "ok" } else { "degraded" }.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        storage: storage.to_string(),
        schema_version: registry.schema().version,
        partitions_loaded: registry.loaded(),
    };
    (status, Json(body))
}

/// Root handler.
async fn root() -> &'static str {
    "Colsync Sync Server"
}
