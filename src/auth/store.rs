//! Persistence boundary for accounts and refresh tokens.

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::models::{NewUser, RefreshTokenRecord, SignupOutcome, User};

/// Storage consumed by the auth flow.
///
/// Implementations attach operation context to their errors; callers treat any
/// error as an opaque storage failure and do not retry.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>>;

    async fn find_user_by_id(&self, id: Uuid) -> Result<Option<User>>;

    /// Insert a user; a duplicate email yields [`SignupOutcome::Conflict`].
    async fn create_user(&self, user: NewUser<'_>) -> Result<SignupOutcome>;

    async fn update_last_login(&self, id: Uuid) -> Result<()>;

    /// Replace the password hash and clear any pending reset token.
    async fn update_password(&self, id: Uuid, password_hash: &str) -> Result<()>;

    /// Record the hash of the latest reset token, replacing any earlier one.
    async fn set_reset_token(
        &self,
        id: Uuid,
        token_hash: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<()>;

    async fn create_refresh_token(
        &self,
        user_id: Uuid,
        token_hash: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<RefreshTokenRecord>;

    async fn find_refresh_token_by_hash(&self, token_hash: &str)
        -> Result<Option<RefreshTokenRecord>>;

    /// Returns whether a row was removed.
    async fn delete_refresh_token_by_hash(&self, token_hash: &str) -> Result<bool>;

    /// Consume `old_hash` and insert the replacement as one atomic step.
    ///
    /// Returns `None` without inserting anything when `old_hash` is no longer
    /// present, e.g. because a concurrent refresh already consumed it.
    async fn rotate_refresh_token(
        &self,
        old_hash: &str,
        user_id: Uuid,
        new_hash: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<Option<RefreshTokenRecord>>;

    /// Cheap reachability check for health reporting.
    async fn ping(&self) -> Result<()>;
}
