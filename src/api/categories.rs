//! Category handlers.

use super::ApiState;
use super::extract::CurrentUser;
use crate::error::{ApiError, ApiResult};
use crate::types::{Category, CategoryInput, CategoryPatch};
use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;

/// GET /categories/
pub async fn list(
    State(state): State<ApiState>,
    current: CurrentUser,
) -> ApiResult<Json<Vec<Category>>> {
    let categories = state
        .db
        .list_categories(&current.user.id)
        .map_err(ApiError::from)?;
    Ok(Json(categories))
}

/// POST /categories/
pub async fn create(
    State(state): State<ApiState>,
    current: CurrentUser,
    Json(input): Json<CategoryInput>,
) -> ApiResult<(StatusCode, Json<Category>)> {
    let category = state
        .db
        .create_category(&current.user.id, input)
        .map_err(ApiError::from)?;
    Ok((StatusCode::CREATED, Json(category)))
}

/// GET /categories/{id}/
pub async fn get(
    State(state): State<ApiState>,
    current: CurrentUser,
    Path(category_id): Path<String>,
) -> ApiResult<Json<Category>> {
    let category = state
        .db
        .get_category(&current.user.id, &category_id)
        .map_err(ApiError::from)?;
    Ok(Json(category))
}

/// PATCH /categories/{id}/
pub async fn patch(
    State(state): State<ApiState>,
    current: CurrentUser,
    Path(category_id): Path<String>,
    Json(patch): Json<CategoryPatch>,
) -> ApiResult<Json<Category>> {
    let category = state
        .db
        .update_category(&current.user.id, &category_id, patch)
        .map_err(ApiError::from)?;
    Ok(Json(category))
}

/// DELETE /categories/{id}/: tasks in the category are detached, not deleted.
pub async fn delete(
    State(state): State<ApiState>,
    current: CurrentUser,
    Path(category_id): Path<String>,
) -> ApiResult<StatusCode> {
    state
        .db
        .delete_category(&current.user.id, &category_id)
        .map_err(ApiError::from)?;
    Ok(StatusCode::NO_CONTENT)
}
