//! Supabase Storage client.
//!
//! Speaks the Storage REST API directly:
//! - `POST   {base}/storage/v1/object/{bucket}/{key}` — upload
//! - `DELETE {base}/storage/v1/object/{bucket}` — remove (`{"prefixes": [key]}`)
//! - `{base}/storage/v1/object/public/{bucket}/{key}` — public URL

use super::{ObjectStore, StorageError, StorageResult, url_with_key};
use async_trait::async_trait;
use bytes::Bytes;
use reqwest::{Client, Response, Url, header};
use serde::Serialize;
use tracing::{debug, error};

#[derive(Clone)]
pub struct SupabaseStore {
    client: Client,
    base_url: Url,
    api_key: String,
    bucket: String,
}

#[derive(Serialize)]
struct RemoveRequest<'a> {
    prefixes: [&'a str; 1],
}

impl SupabaseStore {
    pub fn new(
        base_url: &str,
        api_key: impl Into<String>,
        bucket: impl Into<String>,
    ) -> StorageResult<Self> {
        let base_url =
            Url::parse(base_url).map_err(|_| StorageError::InvalidUrl(base_url.to_string()))?;
        Ok(Self {
            client: Client::new(),
            base_url,
            api_key: api_key.into(),
            bucket: bucket.into(),
        })
    }

    fn object_url(&self, key: &str) -> StorageResult<Url> {
        url_with_key(
            &self.base_url,
            &["storage", "v1", "object", &self.bucket],
            key,
        )
    }

    fn bucket_url(&self) -> StorageResult<Url> {
        url_with_key(&self.base_url, &["storage", "v1", "object"], &self.bucket)
    }

    /// Turn a non-2xx response into `StorageError::Rejected`.
    async fn check(response: Response) -> StorageResult<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let message = response.text().await.unwrap_or_default();
        Err(StorageError::Rejected {
            status: status.as_u16(),
            message,
        })
    }
}

#[async_trait]
impl ObjectStore for SupabaseStore {
    async fn put(&self, key: &str, data: Bytes, content_type: &str) -> StorageResult<()> {
        let url = self.object_url(key)?;
        debug!("uploading {} bytes to {}", data.len(), url);

        let response = self
            .client
            .post(url)
            .bearer_auth(&self.api_key)
            .header("apikey", &self.api_key)
            .header(header::CONTENT_TYPE, content_type)
            .header("x-upsert", "false")
            .body(data)
            .send()
            .await?;

        Self::check(response).await.map(|_| ()).inspect_err(|err| {
            error!("supabase upload of `{}` failed: {}", key, err);
        })
    }

    fn public_url(&self, key: &str) -> StorageResult<String> {
        let url = url_with_key(
            &self.base_url,
            &["storage", "v1", "object", "public", &self.bucket],
            key,
        )?;
        Ok(url.to_string())
    }

    async fn remove(&self, key: &str) -> StorageResult<()> {
        let url = self.bucket_url()?;
        debug!("removing `{}` via {}", key, url);

        let response = self
            .client
            .delete(url)
            .bearer_auth(&self.api_key)
            .header("apikey", &self.api_key)
            .json(&RemoveRequest { prefixes: [key] })
            .send()
            .await?;

        Self::check(response).await.map(|_| ())
    }
}
