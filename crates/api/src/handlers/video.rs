//! Handlers for the `/videos` and `/users/{id}/videos` resources.
//!
//! Uploaded files are staged under [`ServerConfig::upload_dir`] with a
//! random name, handed to the access policy by path, and removed once the
//! request finishes.
//!
//! [`ServerConfig::upload_dir`]: crate::config::ServerConfig::upload_dir

use std::collections::HashMap;
use std::path::{Path as FsPath, PathBuf};

use axum::extract::multipart::MultipartRejection;
use axum::extract::rejection::QueryRejection;
use axum::extract::{Multipart, Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use uuid::Uuid;
use vidcat_core::query::{Document, QueryParams};
use vidcat_core::types::parse_id;
use vidcat_core::video::{PublishVideo, VideoPatch, VideoView};

use crate::error::{AppError, AppResult};
use crate::middleware::auth::AuthUser;
use crate::response::DataResponse;
use crate::state::AppState;

/// Multipart field carrying the video file.
const VIDEO_FILE_FIELD: &str = "videoFile";
/// Multipart field carrying the thumbnail image.
const THUMBNAIL_FIELD: &str = "thumbnail";

/// GET /api/v1/videos
///
/// List published videos. See `vidcat_core::query` for the query-string
/// language (filters, `sort`, `fields`, `page`, `limit`).
pub async fn list(
    State(state): State<AppState>,
    _user: AuthUser,
    query: Result<Query<QueryParams>, QueryRejection>,
) -> AppResult<Json<DataResponse<Vec<Document>>>> {
    let Query(params) = query?;
    let videos = state.videos.list(&params).await?;
    Ok(Json(DataResponse { data: videos }))
}

/// GET /api/v1/users/{id}/videos
pub async fn list_by_owner(
    State(state): State<AppState>,
    _user: AuthUser,
    Path(owner_id): Path<String>,
    query: Result<Query<QueryParams>, QueryRejection>,
) -> AppResult<Json<DataResponse<Vec<Document>>>> {
    let Query(params) = query?;
    let owner_id = parse_id(&owner_id)?;
    let videos = state.videos.list_by_owner(owner_id, &params).await?;
    Ok(Json(DataResponse { data: videos }))
}

/// GET /api/v1/videos/{id}
pub async fn get_by_id(
    State(state): State<AppState>,
    _user: AuthUser,
    Path(id): Path<String>,
) -> AppResult<Json<DataResponse<VideoView>>> {
    let video = state.videos.get_by_id(&id).await?;
    Ok(Json(DataResponse { data: video }))
}

/// POST /api/v1/videos
///
/// Multipart fields: `videoFile`, `thumbnail`, `title`, `description`.
pub async fn publish(
    State(state): State<AppState>,
    user: AuthUser,
    multipart: Result<Multipart, MultipartRejection>,
) -> AppResult<(StatusCode, Json<DataResponse<VideoView>>)> {
    let mut form = read_form(multipart?, &state.config.upload_dir).await?;

    let input = PublishVideo {
        title: form.texts.remove("title"),
        description: form.texts.remove("description"),
        media_path: form.files.get(VIDEO_FILE_FIELD).cloned(),
        thumbnail_path: form.files.get(THUMBNAIL_FIELD).cloned(),
    };
    let result = state.videos.publish(user.user_id, input).await;
    form.discard().await;

    Ok((StatusCode::CREATED, Json(DataResponse { data: result? })))
}

/// PATCH /api/v1/videos/{id}
///
/// Multipart fields, all optional: `title`, `description`, `thumbnail`.
pub async fn update(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<String>,
    multipart: Result<Multipart, MultipartRejection>,
) -> AppResult<Json<DataResponse<VideoView>>> {
    let mut form = read_form(multipart?, &state.config.upload_dir).await?;

    let patch = VideoPatch {
        title: form.texts.remove("title"),
        description: form.texts.remove("description"),
        thumbnail_path: form.files.get(THUMBNAIL_FIELD).cloned(),
    };
    let result = state.videos.update(&id, user.user_id, patch).await;
    form.discard().await;

    Ok(Json(DataResponse { data: result? }))
}

/// DELETE /api/v1/videos/{id}
pub async fn delete(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<String>,
) -> AppResult<StatusCode> {
    state.videos.delete(&id, user.user_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// PATCH /api/v1/videos/toggle/publish/{id}
pub async fn toggle_publish(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<String>,
) -> AppResult<Json<DataResponse<VideoView>>> {
    let video = state.videos.toggle_publish(&id, user.user_id).await?;
    Ok(Json(DataResponse { data: video }))
}

// ---------------------------------------------------------------------------
// Multipart staging
// ---------------------------------------------------------------------------

/// Text fields and staged file paths read from a multipart body.
#[derive(Debug, Default)]
struct StagedForm {
    texts: HashMap<String, String>,
    files: HashMap<String, PathBuf>,
}

impl StagedForm {
    /// Remove staged files that the media store has not already consumed.
    async fn discard(self) {
        for path in self.files.into_values() {
            remove_staged(&path).await;
        }
    }
}

async fn remove_staged(path: &FsPath) {
    match tokio::fs::remove_file(path).await {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "Failed to remove staged upload")
        }
    }
}

/// Read every field of `multipart`. File fields are written to `upload_dir`;
/// empty file parts are ignored.
async fn read_form(mut multipart: Multipart, upload_dir: &FsPath) -> AppResult<StagedForm> {
    let mut form = StagedForm::default();

    let outcome = async {
        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(|e| AppError::BadRequest(e.to_string()))?
        {
            let name = field.name().unwrap_or("").to_string();
            match name.as_str() {
                VIDEO_FILE_FIELD | THUMBNAIL_FIELD => {
                    let extension = staged_extension(field.file_name());
                    let data = field
                        .bytes()
                        .await
                        .map_err(|e| AppError::BadRequest(e.to_string()))?;
                    if data.is_empty() {
                        continue;
                    }

                    tokio::fs::create_dir_all(upload_dir)
                        .await
                        .map_err(|e| AppError::InternalError(e.to_string()))?;
                    let path = upload_dir.join(format!("{}{extension}", Uuid::new_v4()));
                    tokio::fs::write(&path, &data)
                        .await
                        .map_err(|e| AppError::InternalError(e.to_string()))?;

                    if let Some(previous) = form.files.insert(name, path) {
                        remove_staged(&previous).await;
                    }
                }
                "title" | "description" => {
                    let text = field
                        .text()
                        .await
                        .map_err(|e| AppError::BadRequest(e.to_string()))?;
                    form.texts.insert(name, text);
                }
                _ => {} // ignore unknown fields
            }
        }
        Ok::<(), AppError>(())
    }
    .await;

    match outcome {
        Ok(()) => Ok(form),
        Err(e) => {
            form.discard().await;
            Err(e)
        }
    }
}

/// `.ext` of the client's file name, if it is a plain alphanumeric suffix.
fn staged_extension(file_name: Option<&str>) -> String {
    file_name
        .and_then(|name| FsPath::new(name).extension())
        .and_then(|ext| ext.to_str())
        .filter(|ext| !ext.is_empty() && ext.len() <= 8 && ext.chars().all(|c| c.is_ascii_alphanumeric()))
        .map(|ext| format!(".{}", ext.to_ascii_lowercase()))
        .unwrap_or_default()
}
