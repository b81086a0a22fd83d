use anyhow::{Context, Result};
use axum::{
    body::{to_bytes, Body},
    http::{header, Method, Request, StatusCode},
    response::Response,
    Router,
};
use secrecy::SecretString;
use serde_json::{json, Value};
use std::sync::Arc;
use taskflow::{
    api,
    auth::{AuthConfig, AuthService, Environment, MemoryCredentialStore, TokenCodec},
};
use tower::ServiceExt;

const SECRET: &str = "integration-secret-0123456789abcdef";

fn app(environment: Environment) -> Result<Router> {
    let codec = TokenCodec::new(SecretString::from(SECRET.to_string()))?;
    let service = AuthService::new(
        AuthConfig::new(environment),
        codec,
        Arc::new(MemoryCredentialStore::new()),
    );
    Ok(api::router(Arc::new(service)))
}

async fn send(app: &Router, request: Request<Body>) -> Result<(StatusCode, Option<String>, Value)> {
    let response: Response = app.clone().oneshot(request).await?;
    let status = response.status();
    let cookie = response
        .headers()
        .get(header::SET_COOKIE)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string);
    let body = to_bytes(response.into_body(), usize::MAX).await?;
    let payload = if body.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&body)?
    };
    Ok((status, cookie, payload))
}

fn post_json(uri: &str, body: &Value) -> Result<Request<Body>> {
    Ok(Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(serde_json::to_vec(body)?))?)
}

fn post_with_cookie(uri: &str, cookie: &str) -> Result<Request<Body>> {
    Ok(Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header(header::COOKIE, format!("refresh_token={cookie}"))
        .body(Body::empty())?)
}

/// Raw refresh token from a `Set-Cookie` header value.
fn refresh_token(set_cookie: Option<&str>) -> Result<String> {
    let value = set_cookie.context("missing Set-Cookie")?;
    let pair = value.split(';').next().context("empty cookie")?;
    let token = pair
        .strip_prefix("refresh_token=")
        .context("unexpected cookie name")?;
    Ok(token.to_string())
}

async fn register_ada(app: &Router) -> Result<(Value, String)> {
    let (status, cookie, body) = send(
        app,
        post_json(
            "/api/v1/auth/register",
            &json!({"name": "Ada", "email": "ada@x.com", "password": "s3cretpass"}),
        )?,
    )
    .await?;
    assert_eq!(status, StatusCode::CREATED);
    Ok((body, refresh_token(cookie.as_deref())?))
}

#[tokio::test]
async fn register_login_me_refresh_and_replay() -> Result<()> {
    let app = app(Environment::Development)?;

    let (registered, register_cookie) = register_ada(&app).await?;
    let user_id = registered["data"]["user"]["id"].clone();
    assert_eq!(registered["data"]["user"]["email"], "ada@x.com");
    assert!(registered["data"]["user"].get("password_hash").is_none());

    let (status, cookie, login) = send(
        &app,
        post_json(
            "/api/v1/auth/login",
            &json!({"email": "ADA@x.com", "password": "s3cretpass"}),
        )?,
    )
    .await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(login["data"]["user"]["id"], user_id);
    let login_cookie = refresh_token(cookie.as_deref())?;
    assert_ne!(login_cookie, register_cookie);

    let access = login["data"]["access_token"]
        .as_str()
        .context("missing access token")?;
    let (status, _, me) = send(
        &app,
        Request::builder()
            .uri("/api/v1/auth/me")
            .header(header::AUTHORIZATION, format!("Bearer {access}"))
            .body(Body::empty())?,
    )
    .await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(me["data"]["user"]["id"], user_id);

    let (status, cookie, refreshed) =
        send(&app, post_with_cookie("/api/v1/auth/refresh", &login_cookie)?).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(refreshed["data"]["user"]["id"], user_id);
    let rotated = refresh_token(cookie.as_deref())?;
    assert_ne!(rotated, login_cookie);

    // The consumed token is gone and the client is told to drop it.
    let (status, cookie, body) =
        send(&app, post_with_cookie("/api/v1/auth/refresh", &login_cookie)?).await?;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert!(body["error"].is_string());
    assert!(cookie.is_some_and(|value| value.contains("Max-Age=0")));

    let (status, _, _) = send(&app, post_with_cookie("/api/v1/auth/refresh", &rotated)?).await?;
    assert_eq!(status, StatusCode::OK);
    Ok(())
}

#[tokio::test]
async fn duplicate_registration_conflicts() -> Result<()> {
    let app = app(Environment::Development)?;
    register_ada(&app).await?;

    let (status, cookie, body) = send(
        &app,
        post_json(
            "/api/v1/auth/register",
            &json!({"name": "Other", "email": " Ada@X.com ", "password": "anotherpass"}),
        )?,
    )
    .await?;
    assert_eq!(status, StatusCode::CONFLICT);
    assert!(cookie.is_none());
    assert_eq!(body["error"], "email already in use");
    Ok(())
}

#[tokio::test]
async fn invalid_registration_reports_fields() -> Result<()> {
    let app = app(Environment::Development)?;

    let (status, _, body) = send(
        &app,
        post_json(
            "/api/v1/auth/register",
            &json!({"name": " ", "email": "nope", "password": "short"}),
        )?,
    )
    .await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["fields"]["name"].is_string());
    assert!(body["fields"]["email"].is_string());
    assert!(body["fields"]["password"].is_string());
    Ok(())
}

#[tokio::test]
async fn malformed_body_is_rejected() -> Result<()> {
    let app = app(Environment::Development)?;

    let request = Request::builder()
        .method(Method::POST)
        .uri("/api/v1/auth/login")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{not json"))?;
    let (status, _, body) = send(&app, request).await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "invalid request body");

    let (status, _, _) = send(
        &app,
        post_json(
            "/api/v1/auth/login",
            &json!({"email": "ada@x.com", "password": "s3cretpass", "extra": true}),
        )?,
    )
    .await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    Ok(())
}

#[tokio::test]
async fn login_failures_are_indistinguishable() -> Result<()> {
    let app = app(Environment::Development)?;
    register_ada(&app).await?;

    let (wrong_status, _, wrong) = send(
        &app,
        post_json(
            "/api/v1/auth/login",
            &json!({"email": "ada@x.com", "password": "wrongpass"}),
        )?,
    )
    .await?;
    let (unknown_status, _, unknown) = send(
        &app,
        post_json(
            "/api/v1/auth/login",
            &json!({"email": "nobody@x.com", "password": "wrongpass"}),
        )?,
    )
    .await?;
    assert_eq!(wrong_status, StatusCode::UNAUTHORIZED);
    assert_eq!(unknown_status, StatusCode::UNAUTHORIZED);
    assert_eq!(wrong, unknown);
    Ok(())
}

#[tokio::test]
async fn logout_is_idempotent() -> Result<()> {
    let app = app(Environment::Development)?;
    let (_, cookie) = register_ada(&app).await?;

    for _ in 0..2 {
        let (status, set_cookie, body) =
            send(&app, post_with_cookie("/api/v1/auth/logout", &cookie)?).await?;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["message"], "logged out");
        assert!(set_cookie.is_some_and(|value| value.contains("Max-Age=0")));
    }

    let (status, _, _) = send(&app, post_with_cookie("/api/v1/auth/refresh", &cookie)?).await?;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    Ok(())
}

#[tokio::test]
async fn forgot_and_reset_password() -> Result<()> {
    let app = app(Environment::Development)?;
    register_ada(&app).await?;

    let (status, _, unknown) = send(
        &app,
        post_json(
            "/api/v1/auth/forgot-password",
            &json!({"email": "nobody@x.com"}),
        )?,
    )
    .await?;
    assert_eq!(status, StatusCode::OK);
    assert!(unknown["data"].get("reset_token").is_none());

    let (status, _, known) = send(
        &app,
        post_json(
            "/api/v1/auth/forgot-password",
            &json!({"email": "ada@x.com"}),
        )?,
    )
    .await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(known["data"]["message"], unknown["data"]["message"]);
    let reset_token = known["data"]["reset_token"]
        .as_str()
        .context("reset token not echoed outside production")?
        .to_string();

    let reset = json!({"token": reset_token, "new_password": "n3wpassword"});
    let (status, _, body) = send(&app, post_json("/api/v1/auth/reset-password", &reset)?).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["message"], "password reset successful");

    let (status, _, _) = send(&app, post_json("/api/v1/auth/reset-password", &reset)?).await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _, _) = send(
        &app,
        post_json(
            "/api/v1/auth/login",
            &json!({"email": "ada@x.com", "password": "s3cretpass"}),
        )?,
    )
    .await?;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _, _) = send(
        &app,
        post_json(
            "/api/v1/auth/login",
            &json!({"email": "ada@x.com", "password": "n3wpassword"}),
        )?,
    )
    .await?;
    assert_eq!(status, StatusCode::OK);
    Ok(())
}

#[tokio::test]
async fn production_hides_reset_token_and_secures_cookie() -> Result<()> {
    let app = app(Environment::Production)?;
    let (status, cookie, _) = send(
        &app,
        post_json(
            "/api/v1/auth/register",
            &json!({"name": "Ada", "email": "ada@x.com", "password": "s3cretpass"}),
        )?,
    )
    .await?;
    assert_eq!(status, StatusCode::CREATED);
    assert!(cookie.is_some_and(|value| value.contains("Secure")));

    let (status, _, body) = send(
        &app,
        post_json(
            "/api/v1/auth/forgot-password",
            &json!({"email": "ada@x.com"}),
        )?,
    )
    .await?;
    assert_eq!(status, StatusCode::OK);
    assert!(body["data"].get("reset_token").is_none());
    Ok(())
}

#[tokio::test]
async fn me_requires_access_token() -> Result<()> {
    let app = app(Environment::Development)?;

    let (status, _, _) = send(
        &app,
        Request::builder()
            .uri("/api/v1/auth/me")
            .body(Body::empty())?,
    )
    .await?;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _, _) = send(
        &app,
        Request::builder()
            .uri("/api/v1/auth/me")
            .header(header::AUTHORIZATION, "Bearer not.a.token")
            .body(Body::empty())?,
    )
    .await?;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    Ok(())
}
