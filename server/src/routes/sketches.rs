//! Saved sketch REST routes.
//!
//! Authentication happens upstream; the gateway forwards the caller's id in
//! the `x-user-id` header and every route is scoped to it.

#[cfg(test)]
#[path = "sketches_test.rs"]
mod sketches_test;

use axum::extract::{FromRequestParts, Path, State};
use axum::http::StatusCode;
use axum::http::request::Parts;
use axum::response::Json;
use sketch::error::ErrorCode;
use sketch::model::UserSketch;
use tracing::warn;
use uuid::Uuid;

use crate::services::sketches::{NewSketch, SketchError, SketchPatch};
use crate::state::AppState;

pub const USER_ID_HEADER: &str = "x-user-id";

// =============================================================================
// CALLER EXTRACTOR
// =============================================================================

/// Calling user, read from the `x-user-id` header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UserId(pub Uuid);

impl<S> FromRequestParts<S> for UserId
where
    S: Send + Sync,
{
    type Rejection = StatusCode;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let raw = parts
            .headers
            .get(USER_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .ok_or(StatusCode::UNAUTHORIZED)?;
        raw.trim().parse().map(Self).map_err(|_| StatusCode::UNAUTHORIZED)
    }
}

pub(crate) fn sketch_error_to_status(err: SketchError) -> StatusCode {
    match err {
        SketchError::NotFound(_) => StatusCode::NOT_FOUND,
        SketchError::EmptyName => StatusCode::UNPROCESSABLE_ENTITY,
        SketchError::Database(_) => {
            warn!(error = %err, code = err.error_code(), "sketch storage failed");
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

// =============================================================================
// HANDLERS
// =============================================================================

/// `GET /api/sketches`: list the caller's saved sketches, newest first.
pub async fn list_sketches(
    State(state): State<AppState>,
    UserId(user_id): UserId,
) -> Result<Json<Vec<UserSketch>>, StatusCode> {
    let sketches = state.sketches.list(user_id).await.map_err(sketch_error_to_status)?;
    Ok(Json(sketches))
}

/// `POST /api/sketches`: save a new named sketch.
pub async fn create_sketch(
    State(state): State<AppState>,
    UserId(user_id): UserId,
    Json(body): Json<NewSketch>,
) -> Result<(StatusCode, Json<UserSketch>), StatusCode> {
    let sketch = state.sketches.create(user_id, body).await.map_err(sketch_error_to_status)?;
    tracing::info!(sketch_id = %sketch.id, %user_id, "sketch saved");
    Ok((StatusCode::CREATED, Json(sketch)))
}

/// `GET /api/sketches/:id`: fetch one saved sketch.
pub async fn get_sketch(
    State(state): State<AppState>,
    UserId(user_id): UserId,
    Path(id): Path<Uuid>,
) -> Result<Json<UserSketch>, StatusCode> {
    let sketch = state.sketches.get(user_id, id).await.map_err(sketch_error_to_status)?;
    Ok(Json(sketch))
}

/// `PATCH /api/sketches/:id`: rename and/or overwrite a saved sketch.
pub async fn update_sketch(
    State(state): State<AppState>,
    UserId(user_id): UserId,
    Path(id): Path<Uuid>,
    Json(body): Json<SketchPatch>,
) -> Result<Json<UserSketch>, StatusCode> {
    let sketch = state.sketches.update(user_id, id, body).await.map_err(sketch_error_to_status)?;
    Ok(Json(sketch))
}

/// `DELETE /api/sketches/:id`: delete a saved sketch.
pub async fn delete_sketch(
    State(state): State<AppState>,
    UserId(user_id): UserId,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, StatusCode> {
    state.sketches.delete(user_id, id).await.map_err(sketch_error_to_status)?;
    Ok(StatusCode::NO_CONTENT)
}
