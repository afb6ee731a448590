//! LocalStore — on-disk object storage.
//!
//! Blobs live beneath `base_path/{shard}/{shard}/{key}` where the shards are
//! the first two bytes of MD5(key). Public URLs point back at this service's
//! `/files/{*key}` route.

use super::{ObjectStore, StorageError, StorageResult, ensure_key_safe, url_with_key};
use async_trait::async_trait;
use bytes::Bytes;
use reqwest::Url;
use std::{
    io::{self, ErrorKind},
    path::{Path, PathBuf},
};
use tokio::{
    fs::{self, File},
    io::AsyncWriteExt,
};
use tracing::debug;
use uuid::Uuid;

#[derive(Debug)]
pub struct LocalStore {
    /// Base directory on disk where blobs are stored.
    base_path: PathBuf,

    /// Externally reachable base URL of this service.
    public_base: Url,
}

impl LocalStore {
    /// Create a store rooted at `base_path`, creating the directory if needed.
    pub async fn new(base_path: impl Into<PathBuf>, public_base: &str) -> StorageResult<Self> {
        let base_path = base_path.into();
        fs::create_dir_all(&base_path).await?;
        let public_base =
            Url::parse(public_base).map_err(|_| StorageError::InvalidUrl(public_base.to_string()))?;
        Ok(Self {
            base_path,
            public_base,
        })
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    /// Two-level shard identifiers for a key, as lowercase hex (00–ff).
    fn object_shards(key: &str) -> (String, String) {
        let digest = md5::compute(key);
        (format!("{:02x}", digest[0]), format!("{:02x}", digest[1]))
    }

    /// Fully-qualified payload path. Parent directories may not exist yet.
    fn object_path(&self, key: &str) -> PathBuf {
        let (shard_a, shard_b) = Self::object_shards(key);
        let mut path = self.base_path.clone();
        path.push(shard_a);
        path.push(shard_b);
        path.push(key);
        path
    }

    /// Open a stored blob for reading, returning the file and its length.
    pub async fn open(&self, key: &str) -> StorageResult<(File, u64)> {
        ensure_key_safe(key)?;
        let file_path = self.object_path(key);
        let file = File::open(&file_path).await.map_err(|err| {
            if err.kind() == ErrorKind::NotFound {
                StorageError::NotFound(key.to_string())
            } else {
                StorageError::Io(err)
            }
        })?;
        let len = file.metadata().await?.len();
        Ok((file, len))
    }

    /// Remove empty directories from `start` up to (not including) `stop`.
    async fn prune_empty_dirs(&self, start: &Path, stop: &Path) {
        let mut current = start.to_path_buf();
        while current.starts_with(stop) && current != stop {
            match fs::remove_dir(&current).await {
                Ok(_) => {
                    if let Some(parent) = current.parent() {
                        current = parent.to_path_buf();
                    } else {
                        break;
                    }
                }
                Err(err) if err.kind() == ErrorKind::NotFound => break,
                Err(err) if err.kind() == ErrorKind::DirectoryNotEmpty => break,
                Err(err) => {
                    debug!("failed to prune directory {}: {}", current.display(), err);
                    break;
                }
            }
        }
    }
}

#[async_trait]
impl ObjectStore for LocalStore {
    /// Write to a temporary file, fsync, then move into place. Refuses to
    /// overwrite an existing key.
    async fn put(&self, key: &str, data: Bytes, _content_type: &str) -> StorageResult<()> {
        ensure_key_safe(key)?;

        let file_path = self.object_path(key);
        let parent = file_path.parent().map(Path::to_path_buf).ok_or_else(|| {
            StorageError::Io(io::Error::new(
                ErrorKind::Other,
                "object path missing parent directory",
            ))
        })?;
        fs::create_dir_all(&parent).await?;

        if fs::try_exists(&file_path).await? {
            return Err(StorageError::Io(io::Error::new(
                ErrorKind::AlreadyExists,
                format!("object `{key}` already exists"),
            )));
        }

        let tmp_path = parent.join(format!(".tmp-{}", Uuid::new_v4()));
        let mut file = File::create(&tmp_path).await?;

        if let Err(err) = file.write_all(&data).await {
            let _ = fs::remove_file(&tmp_path).await;
            return Err(StorageError::Io(err));
        }
        if let Err(err) = file.sync_all().await {
            let _ = fs::remove_file(&tmp_path).await;
            return Err(StorageError::Io(err));
        }
        drop(file);

        if let Err(err) = fs::rename(&tmp_path, &file_path).await {
            let _ = fs::remove_file(&tmp_path).await;
            return Err(StorageError::Io(err));
        }

        debug!("stored {} bytes at {}", data.len(), file_path.display());
        Ok(())
    }

    fn public_url(&self, key: &str) -> StorageResult<String> {
        ensure_key_safe(key)?;
        Ok(url_with_key(&self.public_base, &["files"], key)?.to_string())
    }

    async fn remove(&self, key: &str) -> StorageResult<()> {
        ensure_key_safe(key)?;
        let file_path = self.object_path(key);
        match fs::remove_file(&file_path).await {
            Ok(_) => debug!("removed physical file {}", file_path.display()),
            Err(err) if err.kind() == ErrorKind::NotFound => {
                debug!("file {} already missing", file_path.display());
            }
            Err(err) => return Err(StorageError::Io(err)),
        }

        if let Some(parent) = file_path.parent() {
            self.prune_empty_dirs(parent, &self.base_path).await;
        }
        Ok(())
    }
}
