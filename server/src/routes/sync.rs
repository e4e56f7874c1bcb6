//! Sync endpoint routes.

use axum::{
    extract::{Path, Query, State},
    routing::{get, post},
    Json, Router,
};
use colsync_engine::{DownloadBatch, DownloadQuery, UploadAck, UploadRequest};

use crate::error::Result;
use crate::handlers::{handle_download, handle_upload};
use crate::AppState;

/// Per-partition sync routes, nested under `/partitions`.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/{partition}/upload", post(upload_handler))
        .route("/{partition}/download", get(download_handler))
}

/// POST /partitions/{partition}/upload - Sequence pending operations.
async fn upload_handler(
    State(state): State<AppState>,
    Path(partition): Path<String>,
    Json(request): Json<UploadRequest>,
) -> Result<Json<UploadAck>> {
    let ack = handle_upload(&state.registry, &partition, request).await?;
    Ok(Json(ack))
}

/// GET /partitions/{partition}/download - Fetch the log after `since`.
async fn download_handler(
    State(state): State<AppState>,
    Path(partition): Path<String>,
    Query(query): Query<DownloadQuery>,
) -> Result<Json<DownloadBatch>> {
    let batch = handle_download(&state.registry, &partition, query).await?;
    Ok(Json(batch))
}
