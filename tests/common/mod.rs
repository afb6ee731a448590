#![allow(dead_code)]

use axum::{
    Router,
    body::{Body, Bytes},
    http::{HeaderMap, Request, StatusCode, header},
};
use http_body_util::BodyExt;
use image_gallery::{
    db,
    identity::{JwtIdentityProvider, jwt},
    services::{
        image_repository::SqliteImageRepository, image_service::ImageService,
        revalidate::Revalidator,
    },
    state::AppState,
    storage::{LocalStore, ObjectStore},
};
use serde_json::Value;
use std::sync::Arc;
use tempfile::TempDir;
use tower::ServiceExt;

pub const SECRET: &[u8] = b"integration-secret";
pub const PUBLIC_BASE: &str = "http://gallery.test";
pub const MAX_UPLOAD_BYTES: usize = 64 * 1024;
const BOUNDARY: &str = "gallery-test-boundary";

pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub bytes: Bytes,
    pub body: Value,
}

impl TestResponse {
    pub fn header(&self, name: header::HeaderName) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }
}

pub struct TestApp {
    pub router: Router,
    pub state: AppState,
    pub storage_dir: TempDir,
}

impl TestApp {
    /// App backed by in-memory SQLite and a local store in a temp dir.
    pub async fn spawn() -> Self {
        Self::build(true).await
    }

    /// App with no object store configured.
    pub async fn without_storage() -> Self {
        Self::build(false).await
    }

    async fn build(with_storage: bool) -> Self {
        let pool = db::connect_in_memory().await.unwrap();
        db::run_migrations(&pool).await.unwrap();
        let repo = Arc::new(SqliteImageRepository::new(Arc::new(pool)));

        let storage_dir = tempfile::tempdir().unwrap();
        let local = if with_storage {
            Some(Arc::new(
                LocalStore::new(storage_dir.path().join("objects"), PUBLIC_BASE)
                    .await
                    .unwrap(),
            ))
        } else {
            None
        };
        let store = local.clone().map(|s| s as Arc<dyn ObjectStore>);

        let state = AppState {
            images: ImageService::new(repo, store, Revalidator::new()),
            identity: Arc::new(JwtIdentityProvider::new(SECRET)),
            local_store: local,
            sign_in_url: "/sign-in".into(),
        };
        let router = image_gallery::app(state.clone(), MAX_UPLOAD_BYTES);

        Self {
            router,
            state,
            storage_dir,
        }
    }

    pub fn token(&self, user_id: &str) -> String {
        jwt::sign(SECRET, user_id, 3600).unwrap()
    }

    pub async fn send(&self, request: Request<Body>) -> TestResponse {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        TestResponse {
            status,
            headers,
            bytes,
            body,
        }
    }

    pub async fn upload(&self, token: Option<&str>, file_name: &str, data: &[u8]) -> TestResponse {
        self.upload_field(token, "image", Some(file_name), data).await
    }

    pub async fn upload_field(
        &self,
        token: Option<&str>,
        field: &str,
        file_name: Option<&str>,
        data: &[u8],
    ) -> TestResponse {
        let body = multipart_body(field, file_name, data);
        self.send(upload_builder(token).body(Body::from(body)).unwrap())
            .await
    }

    pub async fn delete(&self, token: Option<&str>, image_id: &str, image_path: &str) -> TestResponse {
        let mut builder = Request::builder()
            .method("POST")
            .uri("/api/images/delete")
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded");
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        let form = format!(
            "imageId={}&imagePath={}",
            form_encode(image_id),
            form_encode(image_path)
        );
        self.send(builder.body(Body::from(form)).unwrap()).await
    }

    pub async fn list(&self, token: Option<&str>) -> TestResponse {
        let mut builder = Request::builder().method("GET").uri("/api/images");
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        self.send(builder.body(Body::empty()).unwrap()).await
    }

    pub async fn get(&self, uri: &str) -> TestResponse {
        self.send(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
    }

    /// Number of regular files under the local store.
    pub fn stored_file_count(&self) -> usize {
        fn walk(dir: &std::path::Path) -> usize {
            let Ok(entries) = std::fs::read_dir(dir) else {
                return 0;
            };
            entries
                .flatten()
                .map(|e| {
                    let path = e.path();
                    if path.is_dir() { walk(&path) } else { 1 }
                })
                .sum()
        }
        walk(&self.storage_dir.path().join("objects"))
    }
}

/// `POST /api/images` with the multipart content type and optional bearer.
pub fn upload_builder(token: Option<&str>) -> axum::http::request::Builder {
    let builder = Request::builder()
        .method("POST")
        .uri("/api/images")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        );
    match token {
        Some(token) => builder.header(header::AUTHORIZATION, format!("Bearer {token}")),
        None => builder,
    }
}

pub fn multipart_body(field: &str, file_name: Option<&str>, data: &[u8]) -> Vec<u8> {
    let disposition = match file_name {
        Some(name) => format!("form-data; name=\"{field}\"; filename=\"{name}\""),
        None => format!("form-data; name=\"{field}\""),
    };
    let mut body = Vec::new();
    body.extend_from_slice(format!("--{BOUNDARY}\r\nContent-Disposition: {disposition}\r\n").as_bytes());
    if file_name.is_some() {
        body.extend_from_slice(b"Content-Type: image/png\r\n");
    }
    body.extend_from_slice(b"\r\n");
    body.extend_from_slice(data);
    body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());
    body
}

fn form_encode(value: &str) -> String {
    value
        .bytes()
        .map(|b| match b {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                (b as char).to_string()
            }
            _ => format!("%{b:02X}"),
        })
        .collect()
}
