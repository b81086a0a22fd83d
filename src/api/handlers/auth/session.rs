//! Session endpoints: refresh rotation, logout and the current user.

use axum::{
    extract::Extension,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use std::sync::Arc;
use tracing::{error, instrument};

use super::{
    cookies::{clear_refresh_cookie, extract_access_token, extract_refresh_token},
    refresh_error_response, session_response,
    types::{AuthResponse, MeResponse, MessageResponse},
};
use crate::{
    api::handlers::response::{data, ApiError, ErrorBody},
    auth::AuthService,
};

#[utoipa::path(
    post,
    path = "/api/v1/auth/refresh",
    responses(
        (status = 200, description = "Refresh token rotated; body wrapped in `data`, new refresh cookie set", body = AuthResponse),
        (status = 401, description = "Refresh token missing, unknown, expired or already used", body = ErrorBody),
        (status = 500, description = "Storage failure", body = ErrorBody)
    ),
    tag = "auth"
)]
#[instrument(skip_all)]
pub async fn refresh(auth: Extension<Arc<AuthService>>, headers: HeaderMap) -> Response {
    let token = extract_refresh_token(&headers);
    match auth.refresh(token.as_deref()).await {
        Ok(outcome) => session_response(&auth, StatusCode::OK, outcome),
        Err(err) => refresh_error_response(&auth, err),
    }
}

#[utoipa::path(
    post,
    path = "/api/v1/auth/logout",
    responses(
        (status = 200, description = "Refresh token revoked and cookie cleared", body = MessageResponse)
    ),
    tag = "auth"
)]
#[instrument(skip_all)]
pub async fn logout(auth: Extension<Arc<AuthService>>, headers: HeaderMap) -> Response {
    let token = extract_refresh_token(&headers);
    auth.logout(token.as_deref()).await;

    // Always clear the cookie, even if no session record existed.
    let cookie = match clear_refresh_cookie(auth.config()) {
        Ok(cookie) => Some(cookie),
        Err(err) => {
            error!("Failed to build clear cookie: {err}");
            None
        }
    };
    data(
        StatusCode::OK,
        MessageResponse {
            message: "logged out".to_string(),
        },
        cookie,
    )
}

#[utoipa::path(
    get,
    path = "/api/v1/auth/me",
    responses(
        (status = 200, description = "Current user wrapped in `data`", body = MeResponse),
        (status = 401, description = "Missing or invalid access token", body = ErrorBody),
        (status = 500, description = "Storage failure", body = ErrorBody)
    ),
    tag = "auth"
)]
#[instrument(skip_all)]
pub async fn me(auth: Extension<Arc<AuthService>>, headers: HeaderMap) -> Response {
    let token = extract_access_token(&headers);
    match auth.whoami(token.as_deref()).await {
        Ok(user) => data(StatusCode::OK, MeResponse { user: user.into() }, None),
        Err(err) => ApiError(err).into_response(),
    }
}
