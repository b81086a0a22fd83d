//! Mints access/refresh token pairs.

use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;

use super::{
    error::AuthError,
    models::User,
    store::CredentialStore,
    token::{TokenCodec, TokenPurpose},
    utils::{generate_refresh_token, hash_token},
};

/// Tokens handed to the client after register, login or refresh.
///
/// `refresh_token` is the raw value; only its hash reaches the store.
#[derive(Clone)]
pub struct IssuedSession {
    pub access_token: String,
    pub refresh_token: String,
    pub refresh_expires_at: DateTime<Utc>,
}

impl std::fmt::Debug for IssuedSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IssuedSession")
            .field("refresh_expires_at", &self.refresh_expires_at)
            .finish_non_exhaustive()
    }
}

#[derive(Clone)]
pub struct SessionIssuer {
    codec: Arc<TokenCodec>,
    store: Arc<dyn CredentialStore>,
    access_ttl: Duration,
    refresh_ttl: Duration,
}

impl SessionIssuer {
    #[must_use]
    pub fn new(
        codec: Arc<TokenCodec>,
        store: Arc<dyn CredentialStore>,
        access_ttl: Duration,
        refresh_ttl: Duration,
    ) -> Self {
        Self {
            codec,
            store,
            access_ttl,
            refresh_ttl,
        }
    }

    /// Sign an access token and persist a fresh refresh token for `user`.
    ///
    /// # Errors
    /// Returns [`AuthError::Store`] when the refresh token cannot be stored; no
    /// session is returned in that case.
    pub async fn issue(&self, user: &User) -> Result<IssuedSession, AuthError> {
        let (access_token, refresh_token, token_hash, expires_at) = self.mint(user)?;
        self.store
            .create_refresh_token(user.id, &token_hash, expires_at)
            .await?;

        Ok(IssuedSession {
            access_token,
            refresh_token,
            refresh_expires_at: expires_at,
        })
    }

    /// Consume the refresh token stored as `presented_hash` and issue its replacement.
    ///
    /// Returns `Ok(None)` when the presented token was already consumed.
    ///
    /// # Errors
    /// Returns [`AuthError::Store`] on persistence failure.
    pub async fn rotate(
        &self,
        user: &User,
        presented_hash: &str,
    ) -> Result<Option<IssuedSession>, AuthError> {
        let (access_token, refresh_token, token_hash, expires_at) = self.mint(user)?;
        let rotated = self
            .store
            .rotate_refresh_token(presented_hash, user.id, &token_hash, expires_at)
            .await?;

        Ok(rotated.map(|_| IssuedSession {
            access_token,
            refresh_token,
            refresh_expires_at: expires_at,
        }))
    }

    fn mint(&self, user: &User) -> Result<(String, String, String, DateTime<Utc>), AuthError> {
        let access_token = self
            .codec
            .sign(user.id, TokenPurpose::Access, self.access_ttl)
            .map_err(|err| AuthError::Store(anyhow::Error::new(err).context("sign access token")))?;
        let refresh_token = generate_refresh_token()?;
        let token_hash = hash_token(&refresh_token);
        let expires_at = Utc::now()
            .checked_add_signed(self.refresh_ttl)
            .ok_or_else(|| AuthError::Store(anyhow::anyhow!("refresh token expiry out of range")))?;
        Ok((access_token, refresh_token, token_hash, expires_at))
    }
}
