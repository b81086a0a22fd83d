//! PostgreSQL-backed [`CredentialStore`].

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Connection, PgPool};
use tracing::{info_span, warn, Instrument, Span};
use uuid::Uuid;

use super::{
    models::{NewUser, RefreshTokenRecord, SignupOutcome, User},
    store::CredentialStore,
};

const USER_COLUMNS: &str = "id, name, email, password_hash, avatar_url, is_verified, status, \
     last_login_at, reset_token, reset_token_expires_at, created_at, updated_at";

#[derive(Clone, Debug)]
pub struct PgCredentialStore {
    pool: PgPool,
}

impl PgCredentialStore {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

fn query_span(operation: &'static str, statement: &str) -> Span {
    info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = operation,
        db.statement = statement
    )
}

pub(crate) fn is_unique_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_err) => db_err.code().is_some_and(|code| code.as_ref() == "23505"),
        _ => false,
    }
}

#[async_trait]
impl CredentialStore for PgCredentialStore {
    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>> {
        let query = format!("SELECT {USER_COLUMNS} FROM users WHERE email = $1");
        sqlx::query_as::<_, User>(&query)
            .bind(email)
            .fetch_optional(&self.pool)
            .instrument(query_span("SELECT", &query))
            .await
            .context("failed to lookup user by email")
    }

    async fn find_user_by_id(&self, id: Uuid) -> Result<Option<User>> {
        let query = format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1");
        sqlx::query_as::<_, User>(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .instrument(query_span("SELECT", &query))
            .await
            .context("failed to lookup user by id")
    }

    async fn create_user(&self, user: NewUser<'_>) -> Result<SignupOutcome> {
        let query = format!(
            "INSERT INTO users (name, email, password_hash) VALUES ($1, $2, $3) RETURNING {USER_COLUMNS}"
        );
        let result = sqlx::query_as::<_, User>(&query)
            .bind(user.name)
            .bind(user.email)
            .bind(user.password_hash)
            .fetch_one(&self.pool)
            .instrument(query_span("INSERT", &query))
            .await;

        match result {
            Ok(created) => Ok(SignupOutcome::Created(created)),
            // Two concurrent registrations can both pass the up-front lookup.
            Err(err) if is_unique_violation(&err) => Ok(SignupOutcome::Conflict),
            Err(err) => Err(err).context("failed to insert user"),
        }
    }

    async fn update_last_login(&self, id: Uuid) -> Result<()> {
        let query = "UPDATE users SET last_login_at = NOW(), updated_at = NOW() WHERE id = $1";
        sqlx::query(query)
            .bind(id)
            .execute(&self.pool)
            .instrument(query_span("UPDATE", query))
            .await
            .context("failed to update last login")?;
        Ok(())
    }

    async fn update_password(&self, id: Uuid, password_hash: &str) -> Result<()> {
        let query = r"
            UPDATE users
            SET password_hash = $2,
                reset_token = NULL,
                reset_token_expires_at = NULL,
                updated_at = NOW()
            WHERE id = $1
        ";
        sqlx::query(query)
            .bind(id)
            .bind(password_hash)
            .execute(&self.pool)
            .instrument(query_span("UPDATE", query))
            .await
            .context("failed to update password")?;
        Ok(())
    }

    async fn set_reset_token(
        &self,
        id: Uuid,
        token_hash: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<()> {
        let query = r"
            UPDATE users
            SET reset_token = $2,
                reset_token_expires_at = $3,
                updated_at = NOW()
            WHERE id = $1
        ";
        sqlx::query(query)
            .bind(id)
            .bind(token_hash)
            .bind(expires_at)
            .execute(&self.pool)
            .instrument(query_span("UPDATE", query))
            .await
            .context("failed to set reset token")?;
        Ok(())
    }

    async fn create_refresh_token(
        &self,
        user_id: Uuid,
        token_hash: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<RefreshTokenRecord> {
        let query = r"
            INSERT INTO refresh_tokens (user_id, token_hash, expires_at)
            VALUES ($1, $2, $3)
            RETURNING id, user_id, token_hash, expires_at, created_at
        ";
        sqlx::query_as::<_, RefreshTokenRecord>(query)
            .bind(user_id)
            .bind(token_hash)
            .bind(expires_at)
            .fetch_one(&self.pool)
            .instrument(query_span("INSERT", query))
            .await
            .context("failed to insert refresh token")
    }

    async fn find_refresh_token_by_hash(
        &self,
        token_hash: &str,
    ) -> Result<Option<RefreshTokenRecord>> {
        let query = r"
            SELECT id, user_id, token_hash, expires_at, created_at
            FROM refresh_tokens
            WHERE token_hash = $1
        ";
        sqlx::query_as::<_, RefreshTokenRecord>(query)
            .bind(token_hash)
            .fetch_optional(&self.pool)
            .instrument(query_span("SELECT", query))
            .await
            .context("failed to lookup refresh token")
    }

    async fn delete_refresh_token_by_hash(&self, token_hash: &str) -> Result<bool> {
        let query = "DELETE FROM refresh_tokens WHERE token_hash = $1";
        let result = sqlx::query(query)
            .bind(token_hash)
            .execute(&self.pool)
            .instrument(query_span("DELETE", query))
            .await
            .context("failed to delete refresh token")?;
        Ok(result.rows_affected() > 0)
    }

    async fn rotate_refresh_token(
        &self,
        old_hash: &str,
        user_id: Uuid,
        new_hash: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<Option<RefreshTokenRecord>> {
        // Consume and reissue together so a crash cannot drop the session and a
        // concurrent refresh with the same token finds nothing to delete.
        let mut tx = self
            .pool
            .begin()
            .await
            .context("begin refresh rotation transaction")?;

        let query = r"
            DELETE FROM refresh_tokens
            WHERE token_hash = $1 AND user_id = $2
            RETURNING id
        ";
        let consumed: Option<Uuid> = sqlx::query_scalar(query)
            .bind(old_hash)
            .bind(user_id)
            .fetch_optional(&mut *tx)
            .instrument(query_span("DELETE", query))
            .await
            .context("failed to consume refresh token")?;

        if consumed.is_none() {
            if let Err(err) = tx.rollback().await {
                warn!("failed to roll back refresh rotation: {err}");
            }
            return Ok(None);
        }

        let query = r"
            INSERT INTO refresh_tokens (user_id, token_hash, expires_at)
            VALUES ($1, $2, $3)
            RETURNING id, user_id, token_hash, expires_at, created_at
        ";
        let record = sqlx::query_as::<_, RefreshTokenRecord>(query)
            .bind(user_id)
            .bind(new_hash)
            .bind(expires_at)
            .fetch_one(&mut *tx)
            .instrument(query_span("INSERT", query))
            .await
            .context("failed to insert rotated refresh token")?;

        tx.commit()
            .await
            .context("commit refresh rotation transaction")?;

        Ok(Some(record))
    }

    async fn ping(&self) -> Result<()> {
        let span = info_span!(
            "db.acquire",
            db.system = "postgresql",
            db.operation = "ACQUIRE"
        );
        let mut conn = self
            .pool
            .acquire()
            .instrument(span)
            .await
            .context("failed to acquire database connection")?;
        let span = info_span!("db.ping", db.system = "postgresql", db.operation = "PING");
        conn.ping()
            .instrument(span)
            .await
            .context("failed to ping database")
    }
}
