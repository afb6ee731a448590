//! Object storage for uploaded image bytes.
//!
//! The gallery never stores blobs itself; it talks to an [`ObjectStore`]
//! addressed by opaque keys. Two backends exist:
//! - [`supabase::SupabaseStore`] for the hosted Supabase Storage API
//! - [`local::LocalStore`] for on-disk storage served back by this service

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::Url;
use std::io;
use thiserror::Error;

pub mod local;
pub mod supabase;

pub use local::LocalStore;
pub use supabase::SupabaseStore;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("invalid object key")]
    InvalidKey,
    #[error("object `{0}` not found")]
    NotFound(String),
    #[error("invalid storage url `{0}`")]
    InvalidUrl(String),
    #[error("storage rejected request ({status}): {message}")]
    Rejected { status: u16, message: String },
    #[error(transparent)]
    Http(#[from] reqwest::Error),
    #[error(transparent)]
    Io(#[from] io::Error),
}

pub type StorageResult<T> = Result<T, StorageError>;

/// Blob storage addressed by key.
///
/// `put` must not overwrite silently: callers generate unique keys and rely
/// on the backend's per-key atomicity.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Store `data` under `key`.
    async fn put(&self, key: &str, data: Bytes, content_type: &str) -> StorageResult<()>;

    /// Public URL at which the blob stored under `key` can be fetched.
    fn public_url(&self, key: &str) -> StorageResult<String>;

    /// Remove the blob stored under `key`. Removing a missing key succeeds.
    async fn remove(&self, key: &str) -> StorageResult<()>;
}

const MAX_OBJECT_KEY_LEN: usize = 1024;

/// Basic key validation to avoid trivial path traversal vectors.
///
/// Rejects empty or overlong keys, keys that begin with `/`, keys with a `.`
/// or `..` segment, backslashes, or control characters. Dots inside a
/// segment (`holiday..final.png`) are fine.
pub fn ensure_key_safe(key: &str) -> StorageResult<()> {
    if key.is_empty() || key.len() > MAX_OBJECT_KEY_LEN {
        return Err(StorageError::InvalidKey);
    }
    if key.starts_with('/') || key.split('/').any(|s| s == ".." || s == ".") {
        return Err(StorageError::InvalidKey);
    }
    if key
        .bytes()
        .any(|b| b.is_ascii_control() || b == b'\\' || b == b'\0')
    {
        return Err(StorageError::InvalidKey);
    }
    Ok(())
}

/// Append `prefix` segments and every `/`-separated segment of `key` to
/// `base`, percent-encoding each segment.
pub(crate) fn url_with_key(base: &Url, prefix: &[&str], key: &str) -> StorageResult<Url> {
    let mut url = base.clone();
    url.path_segments_mut()
        .map_err(|_| StorageError::InvalidUrl(base.to_string()))?
        .pop_if_empty()
        .extend(prefix)
        .extend(key.split('/'));
    Ok(url)
}
