//! Route table for the upload API

use axum::{
    extract::State,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};

use super::files;
use crate::{models::ApiResponse, AppState};

pub fn create_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(handle_root))
        .route("/health", get(handle_health))
        .route(
            "/api/files",
            get(files::list_files)
                .post(files::upload_file)
                .delete(files::delete_files),
        )
        .route("/api/files/batch", post(files::upload_batch))
        .route("/api/files/info", get(files::file_info))
        .route("/api/images", post(files::upload_image))
        .route("/api/documents", post(files::upload_document))
        .route("/api/library", get(files::library))
}

async fn handle_root(State(state): State<AppState>) -> impl IntoResponse {
    Json(ApiResponse::success(serde_json::json!({
        "app": state.app_name,
        "version": state.version,
        "endpoints": {
            "health": "/health",
            "files": "/api/files",
            "batch": "/api/files/batch",
            "info": "/api/files/info?url={url}",
            "images": "/api/images?category={profile|platform|receipt|blog}",
            "documents": "/api/documents",
            "library": "/api/library"
        }
    })))
}

async fn handle_health(State(state): State<AppState>) -> impl IntoResponse {
    let constraints = state.uploader.constraints();

    Json(ApiResponse::success(serde_json::json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().timestamp(),
        "version": state.version,
        "max_upload_bytes": constraints.max_size_bytes,
        "allowed_mime_types": constraints.allowed_mime_patterns,
        "cached_files": state.library.stats().file_count
    })))
}
