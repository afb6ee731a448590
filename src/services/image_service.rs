//! ImageService — the upload, delete, and gallery actions.
//!
//! A blob and its record live in two stores with no shared transaction, so
//! both mutations run as two-step sagas:
//! - upload writes the blob, then inserts the record; if the insert fails the
//!   blob is removed again before the failure is reported
//! - delete removes the blob best-effort, then deletes the record; a failed
//!   blob removal is logged and never blocks the record delete
//!
//! Every action returns a structured [`ActionResult`]. No error crosses the
//! action boundary as a panic.

use crate::{
    identity::Identity,
    models::image::{ImageRecord, NewImage},
    services::{image_repository::ImageRepository, revalidate::Revalidator},
    storage::ObjectStore,
};
use bytes::Bytes;
use chrono::{DateTime, SecondsFormat, Utc};
use std::sync::Arc;
use thiserror::Error;
use tracing::{error, info, warn};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ActionError {
    #[error("{0}")]
    Unauthorized(&'static str),
    #[error("{0}")]
    MissingInput(&'static str),
    #[error("{0}")]
    InvalidInput(&'static str),
    #[error("{0}")]
    Misconfigured(&'static str),
    #[error("{0}")]
    StorageFailure(&'static str),
    #[error("{0}")]
    PersistenceFailure(&'static str),
    #[error("{0}")]
    NotFoundOrForbidden(&'static str),
}

pub type ActionResult<T> = Result<T, ActionError>;

/// A file submitted in the `image` form field.
#[derive(Clone, Debug)]
pub struct UploadFile {
    pub file_name: String,
    pub content_type: Option<String>,
    pub bytes: Bytes,
}

#[derive(Clone, Debug)]
pub struct UploadOutcome {
    pub url: String,
    pub image: ImageRecord,
}

/// Raw delete form fields, as submitted.
#[derive(Clone, Debug, Default)]
pub struct DeleteRequest {
    pub image_id: Option<String>,
    pub image_path: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DeleteOutcome {
    pub id: i64,
    /// False when the record was deleted but the blob could not be removed.
    pub blob_removed: bool,
}

#[derive(Clone)]
pub struct ImageService {
    repo: Arc<dyn ImageRepository>,
    store: Option<Arc<dyn ObjectStore>>,
    revalidator: Revalidator,
}

impl ImageService {
    /// `store` is `None` when no object store credentials are configured;
    /// mutations then fail with `Misconfigured`.
    pub fn new(
        repo: Arc<dyn ImageRepository>,
        store: Option<Arc<dyn ObjectStore>>,
        revalidator: Revalidator,
    ) -> Self {
        Self {
            repo,
            store,
            revalidator,
        }
    }

    pub fn repo(&self) -> &Arc<dyn ImageRepository> {
        &self.repo
    }

    pub fn revalidator(&self) -> &Revalidator {
        &self.revalidator
    }

    pub fn storage_configured(&self) -> bool {
        self.store.is_some()
    }

    fn store(&self) -> ActionResult<&Arc<dyn ObjectStore>> {
        self.store.as_ref().ok_or_else(|| {
            error!("object storage is not configured: set SUPABASE_URL and SUPABASE_KEY");
            ActionError::Misconfigured("Image storage is not configured.")
        })
    }

    /// Store an uploaded image and record it for the caller.
    pub async fn upload(
        &self,
        identity: Option<&Identity>,
        file: Option<UploadFile>,
    ) -> ActionResult<UploadOutcome> {
        let user = identity.ok_or(ActionError::Unauthorized(
            "You must be logged in to upload an image.",
        ))?;
        let file = file
            .filter(|f| !base_name(&f.file_name).is_empty())
            .ok_or(ActionError::MissingInput("No image provided."))?;
        let store = self.store()?;

        let key = storage_key(&user.user_id, Utc::now(), &file.file_name);
        let content_type = content_type_for(&file);

        if let Err(err) = store.put(&key, file.bytes, &content_type).await {
            error!("Upload error for `{}`: {}", key, err);
            return Err(ActionError::StorageFailure("Failed to upload image."));
        }

        let url = match store.public_url(&key) {
            Ok(url) => url,
            Err(err) => {
                error!("Public URL error for `{}`: {}", key, err);
                self.discard_blob(store, &key).await;
                return Err(ActionError::StorageFailure("Failed to get public URL."));
            }
        };

        let insert = self
            .repo
            .insert(NewImage {
                user_id: user.user_id.clone(),
                url: url.clone(),
                path: key.clone(),
            })
            .await;

        let image = match insert {
            Ok(image) => image,
            Err(err) => {
                error!("Database insert error for `{}`: {}", key, err);
                self.discard_blob(store, &key).await;
                return Err(ActionError::PersistenceFailure(
                    "Failed to save image information.",
                ));
            }
        };

        info!(id = image.id, user = %user.user_id, "uploaded image {}", key);
        self.revalidator.revalidate("upload");

        Ok(UploadOutcome { url, image })
    }

    /// Compensate a failed upload by removing the orphaned blob.
    async fn discard_blob(&self, store: &Arc<dyn ObjectStore>, key: &str) {
        if let Err(err) = store.remove(key).await {
            error!("failed to remove orphaned blob `{}`: {}", key, err);
        }
    }

    /// Delete one of the caller's images.
    ///
    /// The record is looked up by `(id, user)`; a record that does not exist
    /// and one owned by someone else are indistinguishable to the caller.
    pub async fn delete(
        &self,
        identity: Option<&Identity>,
        request: DeleteRequest,
    ) -> ActionResult<DeleteOutcome> {
        let Some(user) = identity else {
            warn!("Authentication error: user not logged in.");
            return Err(ActionError::Unauthorized(
                "You must be logged in to delete an image.",
            ));
        };
        let Some(id) = parse_image_id(request.image_id.as_deref()) else {
            warn!("Validation error: invalid imageId {:?}.", request.image_id);
            return Err(ActionError::InvalidInput("Invalid image id."));
        };
        let store = self.store()?;

        let existing = self
            .repo
            .find_one(id, &user.user_id)
            .await
            .map_err(|err| {
                error!("Delete lookup error for image {}: {}", id, err);
                ActionError::PersistenceFailure("Failed to look up image.")
            })?;

        let Some(record) = existing else {
            warn!(
                "Authorization error: image {} not found or not owned by {}.",
                id, user.user_id
            );
            return Err(ActionError::NotFoundOrForbidden("Image not found."));
        };

        if let Some(submitted) = request.image_path.as_deref() {
            if submitted != record.path {
                warn!(
                    "submitted imagePath `{}` differs from stored path `{}`; using stored path",
                    submitted, record.path
                );
            }
        }

        let blob_removed = match store.remove(&record.path).await {
            Ok(()) => true,
            Err(err) => {
                warn!("Storage deletion error for `{}`: {}", record.path, err);
                false
            }
        };

        let deleted = self.repo.delete(id, &user.user_id).await.map_err(|err| {
            error!("Database delete error for image {}: {}", id, err);
            ActionError::PersistenceFailure("Failed to delete image information.")
        })?;
        if deleted == 0 {
            // Row vanished after the lookup: a concurrent delete won.
            warn!("image {} was deleted concurrently", id);
            return Err(ActionError::NotFoundOrForbidden("Image not found."));
        }

        info!(id, user = %user.user_id, blob_removed, "deleted image {}", record.path);
        self.revalidator.revalidate("delete");

        Ok(DeleteOutcome { id, blob_removed })
    }

    /// The caller's images, newest first.
    pub async fn gallery(&self, identity: Option<&Identity>) -> ActionResult<Vec<ImageRecord>> {
        let user = identity.ok_or(ActionError::Unauthorized(
            "You must be logged in to view your images.",
        ))?;
        self.repo.find_many(&user.user_id).await.map_err(|err| {
            error!("Gallery query error for {}: {}", user.user_id, err);
            ActionError::PersistenceFailure("Failed to load images.")
        })
    }
}

/// Object-store key for an upload: `{user}/{ISO-8601 millis Z}-{file name}`.
///
/// Only the final component of `file_name` is kept so a submitted name can
/// never introduce extra path segments.
pub fn storage_key(user_id: &str, at: DateTime<Utc>, file_name: &str) -> String {
    format!(
        "{}/{}-{}",
        user_id,
        at.to_rfc3339_opts(SecondsFormat::Millis, true),
        base_name(file_name)
    )
}

/// Final path component of a client-supplied file name.
fn base_name(file_name: &str) -> &str {
    file_name.rsplit(['/', '\\']).next().unwrap_or(file_name)
}

fn content_type_for(file: &UploadFile) -> String {
    file.content_type
        .clone()
        .filter(|ct| !ct.is_empty())
        .unwrap_or_else(|| {
            mime_guess::from_path(&file.file_name)
                .first_or_octet_stream()
                .to_string()
        })
}

/// Parse a submitted id, accepting only positive integers.
fn parse_image_id(raw: Option<&str>) -> Option<i64> {
    raw?.trim().parse::<i64>().ok().filter(|id| *id > 0)
}
