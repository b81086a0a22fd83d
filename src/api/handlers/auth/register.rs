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
    types::{AuthResponse, RegisterRequest},
};
use crate::{
    api::handlers::response::{invalid_body, ApiError, ErrorBody},
    auth::AuthService,
};

#[utoipa::path(
    post,
    path = "/api/v1/auth/register",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "Account created; body wrapped in `data`, refresh cookie set", body = AuthResponse),
        (status = 400, description = "Invalid request body or fields", body = ErrorBody),
        (status = 409, description = "Email already in use", body = ErrorBody),
        (status = 500, description = "Storage failure", body = ErrorBody)
    ),
    tag = "auth"
)]
#[instrument(skip_all)]
pub async fn register(
    auth: Extension<Arc<AuthService>>,
    payload: Option<Json<RegisterRequest>>,
) -> Response {
    let Some(Json(request)) = payload else {
        return invalid_body();
    };

    match auth
        .register(&request.name, &request.email, &request.password)
        .await
    {
        Ok(outcome) => session_response(&auth, StatusCode::CREATED, outcome),
        Err(err) => ApiError(err).into_response(),
    }
}
