//! JSON envelope shared by every endpoint.
//!
//! Success bodies are `{"data": ...}`; failures are `{"error": "...", "fields": {...}}`
//! with `fields` present only for validation errors.

use axum::{
    http::{header::SET_COOKIE, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::error;
use utoipa::ToSchema;

use crate::auth::AuthError;

pub const INVALID_BODY: &str = "invalid request body";
pub const INTERNAL_ERROR: &str = "internal server error";

#[derive(Serialize, Deserialize, Debug)]
pub struct Envelope<T> {
    pub data: T,
}

#[derive(ToSchema, Serialize, Deserialize, Debug, PartialEq, Eq)]
pub struct ErrorBody {
    pub error: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fields: Option<BTreeMap<String, String>>,
}

impl ErrorBody {
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            error: message.into(),
            fields: None,
        }
    }
}

/// Success response with an optional `Set-Cookie` directive.
pub(crate) fn data<T: Serialize>(
    status: StatusCode,
    payload: T,
    cookie: Option<HeaderValue>,
) -> Response {
    let mut response = (status, Json(Envelope { data: payload })).into_response();
    if let Some(cookie) = cookie {
        response.headers_mut().append(SET_COOKIE, cookie);
    }
    response
}

pub(crate) fn error(status: StatusCode, message: impl Into<String>) -> Response {
    (status, Json(ErrorBody::new(message))).into_response()
}

pub(crate) fn invalid_body() -> Response {
    error(StatusCode::BAD_REQUEST, INVALID_BODY)
}

/// Status code for each auth failure kind.
#[must_use]
pub fn status_for(err: &AuthError) -> StatusCode {
    match err {
        AuthError::InvalidInput { .. } | AuthError::InvalidToken | AuthError::TokenExpired => {
            StatusCode::BAD_REQUEST
        }
        AuthError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
        AuthError::Conflict => StatusCode::CONFLICT,
        AuthError::NotFound => StatusCode::NOT_FOUND,
        AuthError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// Render an [`AuthError`], logging storage detail instead of returning it.
pub struct ApiError(pub AuthError);

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = status_for(&self.0);
        let body = match self.0 {
            AuthError::Store(err) => {
                error!("storage failure: {err:#}");
                ErrorBody::new(INTERNAL_ERROR)
            }
            AuthError::InvalidInput { message, fields } => ErrorBody {
                error: message,
                fields: Some(
                    fields
                        .into_iter()
                        .map(|(field, reason)| (field.to_string(), reason.to_string()))
                        .collect(),
                )
                .filter(|fields: &BTreeMap<String, String>| !fields.is_empty()),
            },
            other => ErrorBody::new(other.to_string()),
        };
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::Unauthorized;
    use anyhow::Result;
    use axum::body::to_bytes;
    use serde_json::{json, Value};

    async fn render(err: AuthError) -> Result<(StatusCode, Value)> {
        let response = ApiError(err).into_response();
        let status = response.status();
        let body = to_bytes(response.into_body(), usize::MAX).await?;
        Ok((status, serde_json::from_slice(&body)?))
    }

    #[tokio::test]
    async fn store_errors_are_opaque() -> Result<()> {
        let (status, body) = render(AuthError::from(anyhow::anyhow!(
            "relation \"users\" does not exist"
        )))
        .await?;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body, json!({ "error": "internal server error" }));
        Ok(())
    }

    #[tokio::test]
    async fn validation_errors_carry_fields() -> Result<()> {
        let (status, body) = render(AuthError::invalid_input(
            "validation failed",
            [("email", "invalid email format")],
        ))
        .await?;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(
            body,
            json!({
                "error": "validation failed",
                "fields": { "email": "invalid email format" }
            })
        );
        Ok(())
    }

    #[tokio::test]
    async fn status_codes_follow_error_kind() -> Result<()> {
        let cases = [
            (AuthError::Conflict, StatusCode::CONFLICT, "email already in use"),
            (AuthError::NotFound, StatusCode::NOT_FOUND, "not found"),
            (
                AuthError::TokenExpired,
                StatusCode::BAD_REQUEST,
                "invalid or expired token",
            ),
            (
                AuthError::from(Unauthorized::InvalidCredentials),
                StatusCode::UNAUTHORIZED,
                "invalid credentials",
            ),
        ];
        for (err, expected_status, expected_message) in cases {
            let (status, body) = render(err).await?;
            assert_eq!(status, expected_status);
            assert_eq!(body, json!({ "error": expected_message }));
        }
        Ok(())
    }

    #[tokio::test]
    async fn data_wraps_payload_and_sets_cookie() -> Result<()> {
        let response = data(
            StatusCode::CREATED,
            json!({ "ok": true }),
            Some(HeaderValue::from_static("refresh_token=abc")),
        );
        assert_eq!(response.status(), StatusCode::CREATED);
        assert_eq!(
            response.headers().get(SET_COOKIE),
            Some(&HeaderValue::from_static("refresh_token=abc"))
        );
        let body = to_bytes(response.into_body(), usize::MAX).await?;
        let body: Value = serde_json::from_slice(&body)?;
        assert_eq!(body, json!({ "data": { "ok": true } }));
        Ok(())
    }
}
