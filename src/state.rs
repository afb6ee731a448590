//! Shared application state handed to every handler.

use crate::{identity::IdentityProvider, services::image_service::ImageService, storage::LocalStore};
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    /// Upload, delete, and gallery actions.
    pub images: ImageService,

    /// Resolves the caller on each request.
    pub identity: Arc<dyn IdentityProvider>,

    /// Set when blobs are stored on local disk and served by `/files`.
    pub local_store: Option<Arc<LocalStore>>,

    /// Where unauthenticated gallery visitors are sent.
    pub sign_in_url: String,
}
