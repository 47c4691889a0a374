//! Registration, login, and profile handlers.

use super::ApiState;
use super::extract::CurrentUser;
use crate::error::{ApiError, ApiResult};
use crate::types::{LoginInput, LoginResponse, ProfilePatch, RegisterInput, User};
use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;

/// POST /register/
pub async fn register(
    State(state): State<ApiState>,
    Json(input): Json<RegisterInput>,
) -> ApiResult<(StatusCode, Json<User>)> {
    let user = state.db.create_user(input).map_err(ApiError::from)?;
    tracing::info!(user_id = %user.id, username = %user.username, "User registered");
    Ok((StatusCode::CREATED, Json(user)))
}

/// POST /auth/
pub async fn login(
    State(state): State<ApiState>,
    Json(input): Json<LoginInput>,
) -> ApiResult<Json<LoginResponse>> {
    let user = state
        .db
        .authenticate(&input.username, &input.password)
        .map_err(ApiError::from)?;
    let session = state
        .db
        .create_session(&user.id, state.session_ttl_ms)
        .map_err(ApiError::from)?;
    Ok(Json(LoginResponse {
        token: session.token,
        user,
    }))
}

/// POST /logout/
pub async fn logout(
    State(state): State<ApiState>,
    current: CurrentUser,
) -> ApiResult<StatusCode> {
    state
        .db
        .delete_session(&current.token)
        .map_err(ApiError::from)?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /users/me/
pub async fn me(current: CurrentUser) -> Json<User> {
    Json(current.user)
}

/// GET /profile/
pub async fn profile(current: CurrentUser) -> Json<User> {
    Json(current.user)
}

/// PATCH /profile/
pub async fn update_profile(
    State(state): State<ApiState>,
    current: CurrentUser,
    Json(patch): Json<ProfilePatch>,
) -> ApiResult<Json<User>> {
    let user = state
        .db
        .update_profile(&current.user.id, patch)
        .map_err(ApiError::from)?;
    Ok(Json(user))
}
