//! Password reset endpoints.

use axum::{
    extract::Extension,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use std::sync::Arc;
use tracing::instrument;

use super::types::{
    ForgotPasswordRequest, ForgotPasswordResponse, MessageResponse, ResetPasswordRequest,
};
use crate::{
    api::handlers::response::{data, invalid_body, ApiError, ErrorBody},
    auth::AuthService,
};

#[utoipa::path(
    post,
    path = "/api/v1/auth/forgot-password",
    request_body = ForgotPasswordRequest,
    responses(
        (status = 200, description = "Same response whether or not the account exists", body = ForgotPasswordResponse),
        (status = 400, description = "Invalid request body or missing email", body = ErrorBody),
        (status = 500, description = "Storage failure", body = ErrorBody)
    ),
    tag = "auth"
)]
#[instrument(skip_all)]
pub async fn forgot_password(
    auth: Extension<Arc<AuthService>>,
    payload: Option<Json<ForgotPasswordRequest>>,
) -> Response {
    let Some(Json(request)) = payload else {
        return invalid_body();
    };

    match auth.forgot_password(&request.email).await {
        Ok(outcome) => data(
            StatusCode::OK,
            ForgotPasswordResponse {
                message: outcome.message.to_string(),
                reset_token: outcome.reset_token,
            },
            None,
        ),
        Err(err) => ApiError(err).into_response(),
    }
}

#[utoipa::path(
    post,
    path = "/api/v1/auth/reset-password",
    request_body = ResetPasswordRequest,
    responses(
        (status = 200, description = "Password replaced", body = MessageResponse),
        (status = 400, description = "Invalid body, short password, or invalid or expired token", body = ErrorBody),
        (status = 500, description = "Storage failure", body = ErrorBody)
    ),
    tag = "auth"
)]
#[instrument(skip_all)]
pub async fn reset_password(
    auth: Extension<Arc<AuthService>>,
    payload: Option<Json<ResetPasswordRequest>>,
) -> Response {
    let Some(Json(request)) = payload else {
        return invalid_body();
    };

    match auth
        .reset_password(&request.token, &request.new_password)
        .await
    {
        Ok(()) => data(
            StatusCode::OK,
            MessageResponse {
                message: "password reset successful".to_string(),
            },
            None,
        ),
        Err(err) => ApiError(err).into_response(),
    }
}
