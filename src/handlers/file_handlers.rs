//! Serves blobs held by the local object store.

use crate::{errors::AppError, state::AppState};
use axum::{
    body::Body,
    extract::{Path, State},
    http::{HeaderValue, header},
    response::Response,
};
use tokio_util::io::ReaderStream;

/// GET `/files/{*key}` — stream a locally stored blob.
///
/// Returns 404 when the service is not using local storage.
pub async fn get_file(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<Response, AppError> {
    let store = state
        .local_store
        .as_ref()
        .ok_or_else(|| AppError::not_found("object not found"))?;

    let (file, len) = store.open(&key).await?;
    let content_type = mime_guess::from_path(&key).first_or_octet_stream();

    let mut response = Response::new(Body::from_stream(ReaderStream::new(file)));
    let headers = response.headers_mut();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_str(content_type.as_ref())
            .unwrap_or_else(|_| HeaderValue::from_static("application/octet-stream")),
    );
    headers.insert(header::CONTENT_LENGTH, HeaderValue::from(len));
    Ok(response)
}
