use axum::{
    extract::Extension,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use std::sync::Arc;
use tracing::instrument;

use super::{
    session_response,
    types::{AuthResponse, LoginRequest},
};
use crate::{
    api::handlers::response::{invalid_body, ApiError, ErrorBody},
    auth::AuthService,
};

#[utoipa::path(
    post,
    path = "/api/v1/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Signed in; body wrapped in `data`, refresh cookie set", body = AuthResponse),
        (status = 400, description = "Invalid request body or missing fields", body = ErrorBody),
        (status = 401, description = "Invalid credentials", body = ErrorBody),
        (status = 500, description = "Storage failure", body = ErrorBody)
    ),
    tag = "auth"
)]
#[instrument(skip_all)]
pub async fn login(
    auth: Extension<Arc<AuthService>>,
    payload: Option<Json<LoginRequest>>,
) -> Response {
    let Some(Json(request)) = payload else {
        return invalid_body();
    };

    match auth.login(&request.email, &request.password).await {
        Ok(outcome) => session_response(&auth, StatusCode::OK, outcome),
        Err(err) => ApiError(err).into_response(),
    }
}
