//! # Password hashing and verification (Argon2id)
//!
//! Hashes use the `argon2` crate defaults (memory-hard, tens of milliseconds per
//! operation) and are stored as PHC strings such as `$argon2id$v=19$m=19456,t=2,p=1$...`.
//!
//! Both operations run on tokio's blocking pool. A semaphore caps how many run at
//! once so a login burst cannot occupy every core.

use anyhow::{anyhow, Context, Result};
use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher as _, PasswordVerifier, SaltString},
    Argon2,
};
use std::sync::Arc;
use tokio::sync::{OnceCell, Semaphore};

pub const DEFAULT_HASH_CONCURRENCY: usize = 4;

const DUMMY_PASSWORD: &str = "taskflow-unknown-account";

#[derive(Clone, Debug)]
pub struct PasswordHasher {
    permits: Arc<Semaphore>,
    dummy_hash: Arc<OnceCell<String>>,
}

impl Default for PasswordHasher {
    fn default() -> Self {
        Self::new(DEFAULT_HASH_CONCURRENCY)
    }
}

impl PasswordHasher {
    /// `concurrency` is clamped to at least one in-flight hash.
    #[must_use]
    pub fn new(concurrency: usize) -> Self {
        Self {
            permits: Arc::new(Semaphore::new(concurrency.max(1))),
            dummy_hash: Arc::new(OnceCell::new()),
        }
    }

    /// Hash a plaintext password into a PHC string.
    ///
    /// # Errors
    /// Returns an error if hashing fails or the blocking task panics.
    pub async fn hash(&self, password: &str) -> Result<String> {
        let _permit = self
            .permits
            .acquire()
            .await
            .context("password hasher closed")?;
        let password = password.to_owned();
        tokio::task::spawn_blocking(move || hash_password(&password))
            .await
            .context("password hashing task failed")?
    }

    /// Check a plaintext password against a stored PHC string.
    ///
    /// # Errors
    /// Returns an error if the stored hash is malformed or the blocking task panics.
    pub async fn verify(&self, password: &str, hash: &str) -> Result<bool> {
        let _permit = self
            .permits
            .acquire()
            .await
            .context("password hasher closed")?;
        let password = password.to_owned();
        let hash = hash.to_owned();
        tokio::task::spawn_blocking(move || verify_password(&password, &hash))
            .await
            .context("password verification task failed")?
    }

    /// Verify `password` against a throwaway hash, for lookups that found no account.
    ///
    /// The hash is generated on first use and reused afterwards.
    ///
    /// # Errors
    /// Returns an error if the throwaway hash cannot be produced or checked.
    pub async fn verify_dummy(&self, password: &str) -> Result<()> {
        let hash = self
            .dummy_hash
            .get_or_try_init(|| self.hash(DUMMY_PASSWORD))
            .await?;
        self.verify(password, hash).await?;
        Ok(())
    }
}

fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| anyhow!("failed to hash password: {e}"))?;
    Ok(hash.to_string())
}

fn verify_password(password: &str, hash: &str) -> Result<bool> {
    let parsed = PasswordHash::new(hash).map_err(|e| anyhow!("invalid password hash: {e}"))?;
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok())
}
