//! Tag handlers.

use super::ApiState;
use super::extract::CurrentUser;
use crate::error::{ApiError, ApiResult};
use crate::types::{Tag, TagInput};
use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;

/// GET /tags/
pub async fn list(
    State(state): State<ApiState>,
    current: CurrentUser,
) -> ApiResult<Json<Vec<Tag>>> {
    let tags = state.db.list_tags(&current.user.id).map_err(ApiError::from)?;
    Ok(Json(tags))
}

/// POST /tags/
pub async fn create(
    State(state): State<ApiState>,
    current: CurrentUser,
    Json(input): Json<TagInput>,
) -> ApiResult<(StatusCode, Json<Tag>)> {
    let tag = state
        .db
        .create_tag(&current.user.id, input)
        .map_err(ApiError::from)?;
    Ok((StatusCode::CREATED, Json(tag)))
}

/// GET /tags/{id}/
pub async fn get(
    State(state): State<ApiState>,
    current: CurrentUser,
    Path(tag_id): Path<String>,
) -> ApiResult<Json<Tag>> {
    let tag = state
        .db
        .get_tag(&current.user.id, &tag_id)
        .map_err(ApiError::from)?;
    Ok(Json(tag))
}

/// PATCH /tags/{id}/
pub async fn patch(
    State(state): State<ApiState>,
    current: CurrentUser,
    Path(tag_id): Path<String>,
    Json(input): Json<TagInput>,
) -> ApiResult<Json<Tag>> {
    let tag = state
        .db
        .update_tag(&current.user.id, &tag_id, input)
        .map_err(ApiError::from)?;
    Ok(Json(tag))
}

/// DELETE /tags/{id}/: removes associations only; tasks are untouched.
pub async fn delete(
    State(state): State<ApiState>,
    current: CurrentUser,
    Path(tag_id): Path<String>,
) -> ApiResult<StatusCode> {
    state
        .db
        .delete_tag(&current.user.id, &tag_id)
        .map_err(ApiError::from)?;
    Ok(StatusCode::NO_CONTENT)
}
