//! Transport-independent auth operations.
//!
//! Handlers translate requests into these calls and map [`AuthError`] onto
//! status codes. Nothing here knows about HTTP, cookies or headers.

use chrono::Utc;
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::{
    config::AuthConfig,
    error::{AuthError, Unauthorized},
    issuer::{IssuedSession, SessionIssuer},
    models::{NewUser, Principal, SignupOutcome, User},
    password::PasswordHasher,
    store::CredentialStore,
    token::{TokenCodec, TokenPurpose},
    utils::{hash_token, normalize_email, valid_email, valid_password, MIN_PASSWORD_CHARS},
};

/// Message returned by forgot-password whether or not the account exists.
pub const FORGOT_PASSWORD_MESSAGE: &str =
    "if an account exists for this email, a reset link has been sent";

/// A user together with freshly issued tokens.
#[derive(Debug)]
pub struct SessionOutcome {
    pub user: User,
    pub session: IssuedSession,
}

/// Result of a forgot-password request.
///
/// `reset_token` is only populated outside production.
#[derive(Debug)]
pub struct ForgotPasswordOutcome {
    pub message: &'static str,
    pub reset_token: Option<String>,
}

pub struct AuthService {
    config: AuthConfig,
    codec: Arc<TokenCodec>,
    store: Arc<dyn CredentialStore>,
    issuer: SessionIssuer,
    hasher: PasswordHasher,
}

impl AuthService {
    #[must_use]
    pub fn new(config: AuthConfig, codec: TokenCodec, store: Arc<dyn CredentialStore>) -> Self {
        let codec = Arc::new(codec);
        let issuer = SessionIssuer::new(
            codec.clone(),
            store.clone(),
            config.access_ttl(),
            config.refresh_ttl(),
        );
        let hasher = PasswordHasher::new(config.password_hash_concurrency());
        Self {
            config,
            codec,
            store,
            issuer,
            hasher,
        }
    }

    #[must_use]
    pub fn config(&self) -> &AuthConfig {
        &self.config
    }

    #[must_use]
    pub fn store(&self) -> &Arc<dyn CredentialStore> {
        &self.store
    }

    /// Create an account and sign it in.
    ///
    /// # Errors
    /// [`AuthError::InvalidInput`] for malformed fields, [`AuthError::Conflict`]
    /// when the email is taken, [`AuthError::Store`] on storage failure.
    pub async fn register(
        &self,
        name: &str,
        email: &str,
        password: &str,
    ) -> Result<SessionOutcome, AuthError> {
        let name = name.trim();
        let email = normalize_email(email);

        let mut fields = Vec::new();
        if name.is_empty() {
            fields.push(("name", "name is required"));
        }
        if email.is_empty() {
            fields.push(("email", "email is required"));
        } else if !valid_email(&email) {
            fields.push(("email", "invalid email format"));
        }
        if !valid_password(password) {
            fields.push(("password", "password must be at least 8 characters"));
        }
        if !fields.is_empty() {
            return Err(AuthError::invalid_input("validation failed", fields));
        }

        if self.store.find_user_by_email(&email).await?.is_some() {
            return Err(AuthError::Conflict);
        }

        let password_hash = self.hasher.hash(password).await?;
        let outcome = self
            .store
            .create_user(NewUser {
                name,
                email: &email,
                password_hash: &password_hash,
            })
            .await?;
        let user = match outcome {
            SignupOutcome::Created(user) => user,
            SignupOutcome::Conflict => return Err(AuthError::Conflict),
        };

        let session = self.issuer.issue(&user).await?;
        info!(user_id = %user.id, "user registered");
        Ok(SessionOutcome { user, session })
    }

    /// Check credentials and sign the user in.
    ///
    /// # Errors
    /// [`AuthError::InvalidInput`] for empty fields,
    /// [`Unauthorized::InvalidCredentials`] for an unknown email or wrong password.
    pub async fn login(&self, email: &str, password: &str) -> Result<SessionOutcome, AuthError> {
        let email = normalize_email(email);
        if email.is_empty() || password.is_empty() {
            return Err(AuthError::invalid_input(
                "email and password are required",
                std::iter::empty(),
            ));
        }

        let Some(mut user) = self.store.find_user_by_email(&email).await? else {
            debug!("login for unknown email");
            // Same Argon2 cost as a wrong password.
            if let Err(err) = self.hasher.verify_dummy(password).await {
                warn!("dummy password verification failed: {err:#}");
            }
            return Err(Unauthorized::InvalidCredentials.into());
        };

        if !self.hasher.verify(password, &user.password_hash).await? {
            info!(user_id = %user.id, "login rejected: wrong password");
            return Err(Unauthorized::InvalidCredentials.into());
        }

        match self.store.update_last_login(user.id).await {
            Ok(()) => user.last_login_at = Some(Utc::now()),
            Err(err) => warn!(user_id = %user.id, "failed to update last login: {err:#}"),
        }

        let session = self.issuer.issue(&user).await?;
        info!(user_id = %user.id, "user logged in");
        Ok(SessionOutcome { user, session })
    }

    /// Exchange a refresh token for a new session; the presented token is consumed.
    ///
    /// # Errors
    /// [`AuthError::Unauthorized`] when the token is missing, unknown, expired,
    /// already used or its owner no longer exists.
    pub async fn refresh(&self, refresh_token: Option<&str>) -> Result<SessionOutcome, AuthError> {
        let Some(refresh_token) = refresh_token.filter(|token| !token.is_empty()) else {
            return Err(Unauthorized::MissingRefreshToken.into());
        };
        let token_hash = hash_token(refresh_token);

        let Some(record) = self.store.find_refresh_token_by_hash(&token_hash).await? else {
            return Err(Unauthorized::InvalidRefreshToken.into());
        };

        if record.is_expired_at(Utc::now()) {
            if let Err(err) = self.store.delete_refresh_token_by_hash(&token_hash).await {
                warn!(user_id = %record.user_id, "failed to delete expired refresh token: {err:#}");
            }
            return Err(Unauthorized::RefreshTokenExpired.into());
        }

        let Some(user) = self.store.find_user_by_id(record.user_id).await? else {
            return Err(Unauthorized::UserNotFound.into());
        };

        let Some(session) = self.issuer.rotate(&user, &token_hash).await? else {
            warn!(user_id = %user.id, "refresh token replayed or concurrently rotated");
            return Err(Unauthorized::InvalidRefreshToken.into());
        };

        debug!(user_id = %user.id, "refresh token rotated");
        Ok(SessionOutcome { user, session })
    }

    /// Revoke the presented refresh token, if any. Always succeeds.
    pub async fn logout(&self, refresh_token: Option<&str>) {
        let Some(refresh_token) = refresh_token.filter(|token| !token.is_empty()) else {
            return;
        };
        match self
            .store
            .delete_refresh_token_by_hash(&hash_token(refresh_token))
            .await
        {
            Ok(true) => debug!("refresh token revoked"),
            Ok(false) => debug!("logout with unknown refresh token"),
            Err(err) => warn!("failed to revoke refresh token: {err:#}"),
        }
    }

    /// Start a password reset.
    ///
    /// The outcome looks the same whether or not the email belongs to an account.
    ///
    /// # Errors
    /// [`AuthError::InvalidInput`] for an empty email, [`AuthError::Store`] on
    /// storage failure.
    pub async fn forgot_password(&self, email: &str) -> Result<ForgotPasswordOutcome, AuthError> {
        let email = normalize_email(email);
        if email.is_empty() {
            return Err(AuthError::invalid_input(
                "email is required",
                [("email", "email is required")],
            ));
        }

        let mut outcome = ForgotPasswordOutcome {
            message: FORGOT_PASSWORD_MESSAGE,
            reset_token: None,
        };

        let Some(user) = self.store.find_user_by_email(&email).await? else {
            debug!("password reset requested for unknown email");
            return Ok(outcome);
        };

        let now = Utc::now();
        let ttl = self.config.reset_ttl();
        let expires_at = now
            .checked_add_signed(ttl)
            .ok_or_else(|| AuthError::Store(anyhow::anyhow!("reset token expiry out of range")))?;
        let token = self
            .codec
            .sign_at(user.id, TokenPurpose::Reset, ttl, now)
            .map_err(|err| AuthError::Store(anyhow::Error::new(err).context("sign reset token")))?;
        self.store
            .set_reset_token(user.id, &hash_token(&token), expires_at)
            .await?;
        info!(user_id = %user.id, "password reset issued");

        if self.config.echo_reset_token() {
            outcome.reset_token = Some(token);
        }
        Ok(outcome)
    }

    /// Replace the password using a reset token. The token is single use.
    ///
    /// # Errors
    /// [`AuthError::InvalidInput`] for empty token or short password,
    /// [`AuthError::InvalidToken`] / [`AuthError::TokenExpired`] when the token
    /// is not the latest one issued for a live account.
    pub async fn reset_password(&self, token: &str, new_password: &str) -> Result<(), AuthError> {
        let mut fields = Vec::new();
        if token.is_empty() {
            fields.push(("token", "token is required"));
        }
        if !valid_password(new_password) {
            fields.push(("new_password", "password must be at least 8 characters"));
        }
        if !fields.is_empty() {
            return Err(AuthError::invalid_input(
                format!("token and a password of at least {MIN_PASSWORD_CHARS} characters are required"),
                fields,
            ));
        }

        let user_id = self.codec.verify_purpose(token, TokenPurpose::Reset)?;
        let Some(user) = self.store.find_user_by_id(user_id).await? else {
            return Err(AuthError::InvalidToken);
        };

        // A newer request or a completed reset replaces or clears the stored hash.
        if user.reset_token.as_deref() != Some(hash_token(token).as_str()) {
            return Err(AuthError::InvalidToken);
        }
        match user.reset_token_expires_at {
            Some(expires_at) if expires_at >= Utc::now() => {}
            _ => return Err(AuthError::InvalidToken),
        }

        let password_hash = self.hasher.hash(new_password).await?;
        self.store.update_password(user.id, &password_hash).await?;
        info!(user_id = %user.id, "password reset completed");
        Ok(())
    }

    /// Resolve an access token into the identity it was issued for.
    ///
    /// # Errors
    /// [`Unauthorized::MissingAccessToken`] or [`Unauthorized::InvalidAccessToken`].
    pub fn authenticate(&self, access_token: Option<&str>) -> Result<Principal, AuthError> {
        let Some(access_token) = access_token.filter(|token| !token.is_empty()) else {
            return Err(Unauthorized::MissingAccessToken.into());
        };
        let user_id = self
            .codec
            .verify_purpose(access_token, TokenPurpose::Access)
            .map_err(|err| {
                debug!("access token rejected: {err}");
                AuthError::from(Unauthorized::InvalidAccessToken)
            })?;
        Ok(Principal { user_id })
    }

    /// Load the account behind an access token.
    ///
    /// # Errors
    /// Any authentication failure or a vanished account is [`AuthError::Unauthorized`];
    /// storage failures are [`AuthError::Store`].
    pub async fn whoami(&self, access_token: Option<&str>) -> Result<User, AuthError> {
        let principal = self.authenticate(access_token)?;
        self.store
            .find_user_by_id(principal.user_id)
            .await?
            .ok_or_else(|| Unauthorized::UserNotFound.into())
    }
}
