//! Principal resolution for handlers.

use super::ApiState;
use crate::db::now_ms;
use crate::error::ApiError;
use crate::types::User;
use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;

/// The authenticated principal, resolved from the `Authorization: Bearer`
/// header against the sessions table. Handlers take this by value; there is
/// no ambient request-scoped user state.
pub struct CurrentUser {
    pub user: User,
    pub token: String,
}

impl FromRequestParts<ApiState> for CurrentUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &ApiState,
    ) -> Result<Self, Self::Rejection> {
        let token = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("Bearer "))
            .ok_or_else(ApiError::unauthorized)?;

        let user = state
            .db
            .session_user(token, now_ms())
            .map_err(ApiError::from)?
            .ok_or_else(ApiError::unauthorized)?;

        Ok(CurrentUser {
            user,
            token: token.to_string(),
        })
    }
}
