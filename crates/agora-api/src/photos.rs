use axum::{
    Extension, Json,
    body::Bytes,
    extract::{Path, State},
    http::{StatusCode, header},
    response::IntoResponse,
};
use chrono::Utc;
use tokio::io::AsyncWriteExt;
use tracing::{error, info, warn};
use uuid::Uuid;

use agora_types::api::UploadPhotoResponse;
use agora_types::models::Photo;

use crate::auth::AppState;
use crate::blocking;
use crate::error::{ApiError, ApiResult};
use crate::guard::AuthUser;

/// 10 MB upload limit for photos
pub const MAX_PHOTO_SIZE: usize = 10 * 1024 * 1024;

/// POST /photos — raw image bytes. The photo belongs to the uploader and is
/// not attached to anything until an offer claims it.
pub async fn upload_photo(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    bytes: Bytes,
) -> ApiResult<impl IntoResponse> {
    if bytes.is_empty() {
        return Err(ApiError::Validation("empty upload".into()));
    }
    if bytes.len() > MAX_PHOTO_SIZE {
        return Err(ApiError::Validation("photo too large".into()));
    }

    let photo_id = Uuid::new_v4();
    let photo = Photo {
        id: photo_id,
        path: state.photo_dir.join(photo_id.to_string()).to_string_lossy().into_owned(),
        user_id: user.0,
        offer_id: None,
        request_id: None,
        created_at: Utc::now(),
    };
    store(&state, &photo, &bytes).await?;
    info!("{} uploaded photo {} ({} bytes)", user.0, photo.id, bytes.len());

    Ok((
        StatusCode::CREATED,
        Json(UploadPhotoResponse {
            photo_id: photo.id,
            path: photo.path,
        }),
    ))
}

/// Writes the bytes to `photo.path`, then records the row. A file whose row
/// could not be written is removed again.
pub(crate) async fn store(state: &AppState, photo: &Photo, bytes: &[u8]) -> ApiResult<()> {
    tokio::fs::create_dir_all(&state.photo_dir).await.map_err(|e| {
        error!("Failed to create photo directory {}: {}", state.photo_dir.display(), e);
        ApiError::Storage(e.into())
    })?;

    let mut file = tokio::fs::File::create(&photo.path).await.map_err(|e| {
        error!("Failed to create file {}: {}", photo.path, e);
        ApiError::Storage(e.into())
    })?;
    file.write_all(bytes).await.map_err(|e| {
        error!("Failed to write file {}: {}", photo.path, e);
        ApiError::Storage(e.into())
    })?;
    file.flush().await.map_err(|e| ApiError::Storage(e.into()))?;
    drop(file);

    let db_state = state.clone();
    let record = photo.clone();
    if let Err(e) = blocking(move || Ok(db_state.db.insert_photo(&record)?)).await {
        if let Err(rm) = tokio::fs::remove_file(&photo.path).await {
            warn!("Failed to remove orphaned photo {}: {}", photo.path, rm);
        }
        return Err(e);
    }
    Ok(())
}

/// GET /photos/{photo_id}
pub async fn get_photo(
    State(state): State<AppState>,
    Path(photo_id): Path<Uuid>,
) -> ApiResult<impl IntoResponse> {
    let photo = blocking(move || Ok(state.db.get_photo(photo_id)?))
        .await?
        .ok_or(ApiError::NotFound)?;

    let data = tokio::fs::read(&photo.path).await.map_err(|e| {
        error!("Photo {} missing on disk at {}: {}", photo.id, photo.path, e);
        ApiError::NotFound
    })?;

    Ok(([(header::CONTENT_TYPE, "application/octet-stream")], data))
}
