//! Auth endpoints under `/api/v1/auth`.
//!
//! Handlers only translate HTTP into [`AuthService`] calls: bodies, cookies and
//! headers in; the JSON envelope and `Set-Cookie` directives out.

pub(crate) mod cookies;
pub mod login;
pub mod password;
pub mod register;
pub mod session;
pub mod types;

use axum::{
    http::{header::SET_COOKIE, StatusCode},
    response::{IntoResponse, Response},
};
use tracing::error;

use self::{
    cookies::{clear_refresh_cookie, refresh_cookie},
    types::AuthResponse,
};
use super::response::{data, error as error_response, ApiError, INTERNAL_ERROR};
use crate::auth::{AuthError, AuthService, SessionOutcome};

/// Serialize a freshly issued session: access token in the body, refresh token
/// in the cookie.
pub(crate) fn session_response(
    auth: &AuthService,
    status: StatusCode,
    outcome: SessionOutcome,
) -> Response {
    let cookie = match refresh_cookie(auth.config(), &outcome.session.refresh_token) {
        Ok(cookie) => cookie,
        Err(err) => {
            error!("Failed to build refresh cookie: {err}");
            return error_response(StatusCode::INTERNAL_SERVER_ERROR, INTERNAL_ERROR);
        }
    };
    let body = AuthResponse {
        access_token: outcome.session.access_token,
        user: outcome.user.into(),
    };
    data(status, body, Some(cookie))
}

/// Error response that also drops the refresh cookie when it can no longer be used.
pub(crate) fn refresh_error_response(auth: &AuthService, err: AuthError) -> Response {
    let clear = err.clears_refresh_cookie();
    let mut response = ApiError(err).into_response();
    if clear {
        match clear_refresh_cookie(auth.config()) {
            Ok(cookie) => {
                response.headers_mut().append(SET_COOKIE, cookie);
            }
            Err(err) => error!("Failed to build clear cookie: {err}"),
        }
    }
    response
}
