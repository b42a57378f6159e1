//! Photo handlers.
//!
//! Thin adapters over [`crate::wall::PhotoWall`]; every decision lives in
//! the wall, handlers only translate outcomes to status codes.

use axum::{
    Json,
    extract::{Path, State, rejection::JsonRejection},
    http::StatusCode,
};

use super::super::{AppError, AppState};
use crate::wall::{PublicPhotoView, RawEntry};

/// GET /api/photos - Current photos, newest first.
pub(crate) async fn list_photos(State(state): State<AppState>) -> Json<Vec<PublicPhotoView>> {
    Json(state.wall.list_photos())
}

/// GET /api/photos/{id} - One photo.
pub(crate) async fn get_photo(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<PublicPhotoView>, AppError> {
    state
        .wall
        .get_photo(&id)
        .map(Json)
        .ok_or_else(|| crate::error::Error::not_found(id).into())
}

/// POST /api/photos - Submit a photo.
///
/// 201 with the public view on success; 400 for invalid payloads,
/// 413 for oversized bodies, 503 when busy or shutting down.
pub(crate) async fn submit_photo(
    State(state): State<AppState>,
    payload: Result<Json<RawEntry>, JsonRejection>,
) -> Result<(StatusCode, Json<PublicPhotoView>), AppError> {
    let Json(raw) = payload.map_err(|rejection| {
        let status = match rejection.status() {
            StatusCode::PAYLOAD_TOO_LARGE => StatusCode::PAYLOAD_TOO_LARGE,
            _ => StatusCode::BAD_REQUEST,
        };
        AppError::Rejected {
            status,
            message: rejection.body_text(),
        }
    })?;

    let view = state.wall.submit_photo(raw).await?;
    Ok((StatusCode::CREATED, Json(view)))
}

/// DELETE /api/photos/{id} - Delete a photo.
pub(crate) async fn delete_photo(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    state.wall.delete_photo(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}
