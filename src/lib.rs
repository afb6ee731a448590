//! Authenticated image gallery: upload images to an object store, list your
//! own uploads, delete them.

pub mod config;
pub mod db;
pub mod errors;
pub mod handlers;
pub mod identity;
pub mod models;
pub mod routes;
pub mod services;
pub mod state;
pub mod storage;

use axum::Router;
use state::AppState;

/// The full application router with state attached.
pub fn app(state: AppState, max_upload_bytes: usize) -> Router {
    routes::routes::routes(max_upload_bytes).with_state(state)
}
