//! HTTP routes: health probes and per-partition sync endpoints.

mod health;
mod sync;

use crate::error::AppError;
use crate::AppState;
use axum::{http::Uri, Router};

/// Every endpoint, with a JSON 404 for anything else.
pub fn create_routes() -> Router<AppState> {
    Router::new()
        .merge(health::routes())
        .nest("/partitions", sync::routes())
        .fallback(not_found)
}

async fn not_found(uri: Uri) -> AppError {
    AppError::NotFound(format!("no route for {}", uri.path()))
}
