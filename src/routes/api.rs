use axum::extract::{DefaultBodyLimit, Multipart, Path, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Serialize;

use crate::error::{AppError, AppResult};
use crate::extractors::CurrentUser;
use crate::relationships::Relationships;
use crate::state::AppState;

pub const MAX_UPLOAD_BYTES: usize = 5 * 1024 * 1024;
const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "gif", "webp"];

#[derive(Serialize)]
pub struct UploadResponse {
    pub url: String,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/relationships", get(relationships))
        .route(
            "/api/uploads",
            post(upload).layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES + 64 * 1024)),
        )
        .route("/uploads/{name}", get(serve_upload))
}

async fn relationships(
    State(state): State<AppState>,
    user: CurrentUser,
) -> AppResult<Json<Relationships>> {
    let client = state.client(user.id);
    Ok(Json(Relationships::load(&client).await?))
}

fn image_extension(file_name: &str) -> Option<String> {
    let (_, ext) = file_name.rsplit_once('.')?;
    let ext = ext.to_ascii_lowercase();
    IMAGE_EXTENSIONS.contains(&ext.as_str()).then_some(ext)
}

/// Upload names are generated here; anything else is not ours to serve.
fn is_safe_upload_name(name: &str) -> bool {
    !name.is_empty()
        && !name.starts_with('.')
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '.')
}

async fn upload(
    State(state): State<AppState>,
    user: CurrentUser,
    mut multipart: Multipart,
) -> AppResult<Json<UploadResponse>> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(e.to_string()))?
    {
        if field.name() != Some("file") {
            continue;
        }
        let ext = field
            .file_name()
            .and_then(image_extension)
            .ok_or_else(|| AppError::BadRequest("Unsupported image type".into()))?;
        let data = field
            .bytes()
            .await
            .map_err(|e| AppError::BadRequest(e.to_string()))?;
        if data.is_empty() || data.len() > MAX_UPLOAD_BYTES {
            return Err(AppError::BadRequest("Image must be under 5 MB".into()));
        }

        let dir = state.config.uploads_path();
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|e| AppError::Internal(e.to_string()))?;
        let name = format!("{}.{}", uuid::Uuid::now_v7(), ext);
        tokio::fs::write(dir.join(&name), &data)
            .await
            .map_err(|e| AppError::Internal(e.to_string()))?;

        tracing::info!(caller = %user.id, bytes = data.len(), "image uploaded: {}", name);
        return Ok(Json(UploadResponse {
            url: format!("/uploads/{}", name),
        }));
    }

    Err(AppError::BadRequest("Missing file field".into()))
}

async fn serve_upload(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> AppResult<Response> {
    if !is_safe_upload_name(&name) {
        return Err(AppError::NotFound);
    }
    let bytes = tokio::fs::read(state.config.uploads_path().join(&name))
        .await
        .map_err(|_| AppError::NotFound)?;
    let mime = mime_guess::from_path(&name).first_or_octet_stream();
    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, mime.as_ref().to_string()),
            (header::CACHE_CONTROL, "public, max-age=86400".to_string()),
        ],
        bytes,
    )
        .into_response())
}
