//! HTTP handlers for the image actions and the gallery.
//!
//! Handlers only translate between HTTP and [`ImageService`]; every decision
//! about identity, validation and storage is made by the service.
//!
//! [`ImageService`]: crate::services::image_service::ImageService

use crate::{
    errors::AppError,
    identity::MaybeUser,
    models::image::ImageRecord,
    services::image_service::{ActionError, DeleteRequest, UploadFile},
    state::AppState,
};
use axum::{
    Form, Json,
    extract::{Multipart, State, multipart::MultipartRejection},
    http::{HeaderMap, StatusCode, header},
    response::{Html, IntoResponse, Redirect, Response},
};
use serde::{Deserialize, Serialize};

/// Multipart field carrying the uploaded file.
pub const IMAGE_FIELD: &str = "image";

/// Path of the HTML gallery.
pub const GALLERY_PATH: &str = "/management";

/// Path of the HTML upload form.
pub const UPLOAD_PAGE_PATH: &str = "/";

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct UploadResponse {
    success: bool,
    url: String,
    image: ImageRecord,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct DeleteResponse {
    success: bool,
    id: i64,
    blob_removed: bool,
}

#[derive(Serialize)]
struct GalleryResponse {
    images: Vec<ImageRecord>,
    revision: u64,
}

/// Fields posted by a gallery delete control.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteImageForm {
    pub image_id: Option<String>,
    pub image_path: Option<String>,
}

/// POST `/api/images` — upload the file in the `image` field.
///
/// Browser form posts (`Accept: text/html`) are redirected to the gallery,
/// or to sign-in when anonymous; API callers get a JSON result.
pub async fn upload_image(
    State(state): State<AppState>,
    MaybeUser(user): MaybeUser,
    headers: HeaderMap,
    multipart: Result<Multipart, MultipartRejection>,
) -> Response {
    // Anonymous bodies are never read.
    let file = match multipart {
        Ok(multipart) if user.is_some() => match read_image_field(multipart).await {
            Ok(file) => file,
            Err(err) => return err.into_response(),
        },
        _ => None,
    };

    let result = state.images.upload(user.as_ref(), file).await;

    if wants_html(&headers) {
        return match result {
            Err(ActionError::Unauthorized(_)) => Redirect::to(&state.sign_in_url).into_response(),
            _ => Redirect::to(GALLERY_PATH).into_response(),
        };
    }

    match result {
        Ok(outcome) => (
            StatusCode::CREATED,
            Json(UploadResponse {
                success: true,
                url: outcome.url,
                image: outcome.image,
            }),
        )
            .into_response(),
        Err(err) => AppError::from(err).into_response(),
    }
}

async fn read_image_field(mut multipart: Multipart) -> Result<Option<UploadFile>, AppError> {
    while let Some(field) = multipart.next_field().await? {
        if field.name() != Some(IMAGE_FIELD) {
            continue;
        }
        let file_name = field.file_name().unwrap_or_default().to_string();
        let content_type = field.content_type().map(str::to_owned);
        let bytes = field.bytes().await?;
        return Ok(Some(UploadFile {
            file_name,
            content_type,
            bytes,
        }));
    }
    Ok(None)
}

/// POST `/api/images/delete` — delete one of the caller's images.
///
/// Browser form posts (`Accept: text/html`) are redirected back to the
/// gallery whatever the outcome; API callers get a JSON result.
pub async fn delete_image(
    State(state): State<AppState>,
    MaybeUser(user): MaybeUser,
    headers: HeaderMap,
    Form(form): Form<DeleteImageForm>,
) -> Response {
    let request = DeleteRequest {
        image_id: form.image_id,
        image_path: form.image_path,
    };
    let result = state.images.delete(user.as_ref(), request).await;

    if wants_html(&headers) {
        return match result {
            Err(ActionError::Unauthorized(_)) => Redirect::to(&state.sign_in_url).into_response(),
            _ => Redirect::to(GALLERY_PATH).into_response(),
        };
    }

    match result {
        Ok(outcome) => Json(DeleteResponse {
            success: true,
            id: outcome.id,
            blob_removed: outcome.blob_removed,
        })
        .into_response(),
        Err(err) => AppError::from(err).into_response(),
    }
}

/// GET `/api/images` — the caller's images, newest first.
///
/// Carries a weak `ETag` tied to the gallery revision; a matching
/// `If-None-Match` short-circuits to `304 Not Modified`.
pub async fn list_images(
    State(state): State<AppState>,
    MaybeUser(user): MaybeUser,
    headers: HeaderMap,
) -> Result<Response, AppError> {
    let revalidator = state.images.revalidator();
    let revision = revalidator.revision();
    let etag = user.as_ref().map(|u| revalidator.etag_for(&u.user_id));

    if let Some(tag) = &etag {
        if etag_matches(&headers, tag) {
            return Ok((StatusCode::NOT_MODIFIED, [(header::ETAG, tag.clone())]).into_response());
        }
    }

    let images = state.images.gallery(user.as_ref()).await?;
    let body = Json(GalleryResponse { images, revision });

    Ok(match etag {
        Some(tag) => ([(header::ETAG, tag)], body).into_response(),
        None => body.into_response(),
    })
}

/// GET `/management` — HTML gallery with view links and delete controls.
pub async fn gallery_page(
    State(state): State<AppState>,
    MaybeUser(user): MaybeUser,
) -> Result<Response, AppError> {
    if user.is_none() {
        return Ok(Redirect::to(&state.sign_in_url).into_response());
    }
    let images = state.images.gallery(user.as_ref()).await?;
    Ok(Html(render_gallery(&images)).into_response())
}

/// GET `/` — HTML upload form posting the `image` field to `/api/images`.
pub async fn upload_page(State(state): State<AppState>, MaybeUser(user): MaybeUser) -> Response {
    if user.is_none() {
        return Redirect::to(&state.sign_in_url).into_response();
    }
    Html(render_upload_form()).into_response()
}

fn render_upload_form() -> String {
    let mut html = String::from(
        "<!DOCTYPE html><html><head><meta charset=\"utf-8\"><title>Upload an Image</title></head><body>",
    );
    html.push_str("<h2>Upload an Image</h2>");
    html.push_str(
        "<form method=\"post\" action=\"/api/images\" enctype=\"multipart/form-data\">",
    );
    html.push_str(&format!(
        "<input type=\"file\" name=\"{IMAGE_FIELD}\" accept=\"image/*\" required>"
    ));
    html.push_str("<button type=\"submit\">Upload</button></form>");
    html.push_str(&format!("<p><a href=\"{GALLERY_PATH}\">Your images</a></p>"));
    html.push_str("</body></html>");
    html
}

fn render_gallery(images: &[ImageRecord]) -> String {
    let mut html = String::from(
        "<!DOCTYPE html><html><head><meta charset=\"utf-8\"><title>Your Uploaded Images</title></head><body>",
    );
    html.push_str("<h2>Your Uploaded Images</h2>");
    html.push_str(&format!(
        "<p><a href=\"{UPLOAD_PAGE_PATH}\">Upload an image</a></p>"
    ));

    if images.is_empty() {
        html.push_str("<p>No images uploaded yet.</p>");
    } else {
        html.push_str("<ul class=\"gallery\">");
        for image in images {
            let url = html_escape(&image.url);
            html.push_str("<li>");
            html.push_str(&format!("<img src=\"{url}\" alt=\"Uploaded\">"));
            html.push_str(&format!(
                "<a href=\"{url}\" target=\"_blank\" rel=\"noopener noreferrer\">View</a>"
            ));
            html.push_str("<form method=\"post\" action=\"/api/images/delete\">");
            html.push_str(&format!(
                "<input type=\"hidden\" name=\"imageId\" value=\"{}\">",
                image.id
            ));
            html.push_str(&format!(
                "<input type=\"hidden\" name=\"imagePath\" value=\"{}\">",
                html_escape(&image.path)
            ));
            html.push_str("<button type=\"submit\">Delete</button></form>");
            html.push_str(&format!(
                "<p>{}</p>",
                image.created_at.format("%Y-%m-%d")
            ));
            html.push_str("</li>");
        }
        html.push_str("</ul>");
    }

    html.push_str("</body></html>");
    html
}

fn wants_html(headers: &HeaderMap) -> bool {
    headers
        .get(header::ACCEPT)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|accept| accept.contains("text/html"))
}

fn etag_matches(headers: &HeaderMap, tag: &str) -> bool {
    headers
        .get(header::IF_NONE_MATCH)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|value| {
            value
                .split(',')
                .map(str::trim)
                .any(|candidate| candidate == "*" || candidate == tag)
        })
}

fn html_escape(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}
