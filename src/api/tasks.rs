//! Task handlers: listing, CRUD, subtasks, and the delete cascade.

use super::ApiState;
use super::extract::CurrentUser;
use crate::db::now_ms;
use crate::db::query::TaskFilters;
use crate::error::{ApiError, ApiResult};
use crate::types::{DeleteOutcome, SubtaskListing, TaskDetail, TaskInput, TaskPage, TaskPatch};
use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;

/// GET /tasks/: filter, sort, and shape the user's tasks.
pub async fn list(
    State(state): State<ApiState>,
    current: CurrentUser,
    Query(params): Query<Vec<(String, String)>>,
) -> ApiResult<Json<TaskPage>> {
    let filters = TaskFilters::from_params(&params);
    let page = state
        .db
        .list_task_page(&current.user.id, &filters, now_ms())
        .map_err(ApiError::from)?;
    Ok(Json(page))
}

/// GET /tasks/top-level/: parentless tasks in the default order.
pub async fn top_level(
    State(state): State<ApiState>,
    current: CurrentUser,
) -> ApiResult<Json<TaskPage>> {
    let page = state
        .db
        .list_task_page(&current.user.id, &TaskFilters::top_level(), now_ms())
        .map_err(ApiError::from)?;
    Ok(Json(page))
}

/// POST /tasks/
pub async fn create(
    State(state): State<ApiState>,
    current: CurrentUser,
    Json(input): Json<TaskInput>,
) -> ApiResult<(StatusCode, Json<TaskDetail>)> {
    let detail = state
        .db
        .create_task(&current.user.id, input)
        .map_err(ApiError::from)?;
    tracing::info!(task_id = %detail.id, "Task created");
    Ok((StatusCode::CREATED, Json(detail)))
}

/// GET /tasks/{id}/
pub async fn get(
    State(state): State<ApiState>,
    current: CurrentUser,
    Path(task_id): Path<String>,
) -> ApiResult<Json<TaskDetail>> {
    let detail = state
        .db
        .task_detail(&current.user.id, &task_id)
        .map_err(ApiError::from)?;
    Ok(Json(detail))
}

/// PUT /tasks/{id}/: full replace.
pub async fn replace(
    State(state): State<ApiState>,
    current: CurrentUser,
    Path(task_id): Path<String>,
    Json(input): Json<TaskInput>,
) -> ApiResult<Json<TaskDetail>> {
    let detail = state
        .db
        .update_task(&current.user.id, &task_id, TaskPatch::from(input))
        .map_err(ApiError::from)?;
    Ok(Json(detail))
}

/// PATCH /tasks/{id}/: partial update.
pub async fn patch(
    State(state): State<ApiState>,
    current: CurrentUser,
    Path(task_id): Path<String>,
    Json(patch): Json<TaskPatch>,
) -> ApiResult<Json<TaskDetail>> {
    let detail = state
        .db
        .update_task(&current.user.id, &task_id, patch)
        .map_err(ApiError::from)?;
    Ok(Json(detail))
}

/// DELETE /tasks/{id}/?keep_subtasks=
///
/// `keep_subtasks` defaults to true; only an explicit "false" opts into
/// deleting the subtasks as well.
pub async fn delete(
    State(state): State<ApiState>,
    current: CurrentUser,
    Path(task_id): Path<String>,
    Query(params): Query<Vec<(String, String)>>,
) -> ApiResult<Json<DeleteOutcome>> {
    let keep_subtasks = params
        .iter()
        .find(|(key, _)| key == "keep_subtasks")
        .map(|(_, value)| !value.eq_ignore_ascii_case("false"))
        .unwrap_or(true);

    let outcome = state
        .db
        .delete_task(&current.user.id, &task_id, keep_subtasks)
        .map_err(ApiError::from)?;
    tracing::info!(task_id = %task_id, sub_count = outcome.sub_count, keep_subtasks, "Task deleted");
    Ok(Json(outcome))
}

/// GET /tasks/{id}/subtasks/
pub async fn subtasks(
    State(state): State<ApiState>,
    current: CurrentUser,
    Path(task_id): Path<String>,
) -> ApiResult<Json<SubtaskListing>> {
    let listing = state
        .db
        .subtask_listing(&current.user.id, &task_id)
        .map_err(ApiError::from)?;
    Ok(Json(listing))
}
