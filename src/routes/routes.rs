//! Defines routes for the gallery service.
//!
//! ## Structure
//! - **Image actions**
//!   - `GET    /api/images`        — the caller's images (JSON, ETag aware)
//!   - `POST   /api/images`        — upload (multipart field `image`)
//!   - `POST   /api/images/delete` — delete (form fields `imageId`, `imagePath`)
//!
//! - **Pages and files**
//!   - `GET    /`                  — HTML upload form
//!   - `GET    /management`        — HTML gallery
//!   - `GET    /files/{*key}`      — blobs held by the local store
//!
//! - **Probes**: `/healthz`, `/readyz`

use crate::{
    handlers::{
        file_handlers::get_file,
        health_handlers::{healthz, readyz},
        image_handlers::{
            GALLERY_PATH, UPLOAD_PAGE_PATH, delete_image, gallery_page, list_images, upload_image,
            upload_page,
        },
    },
    state::AppState,
};
use axum::{
    Router,
    extract::DefaultBodyLimit,
    routing::{get, post},
};
use tower_http::trace::TraceLayer;

/// Build the router. Request bodies above `max_upload_bytes` are rejected
/// with 413 before reaching a handler.
pub fn routes(max_upload_bytes: usize) -> Router<AppState> {
    Router::new()
        // health endpoints (mounted at root)
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .route("/api/images", get(list_images).post(upload_image))
        .route("/api/images/delete", post(delete_image))
        .route(UPLOAD_PAGE_PATH, get(upload_page))
        .route(GALLERY_PATH, get(gallery_page))
        .route("/files/{*key}", get(get_file))
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .layer(TraceLayer::new_for_http())
}
