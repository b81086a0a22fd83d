use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{
    models::{NewUser, RefreshTokenRecord, SignupOutcome, User},
    store::CredentialStore,
};

#[derive(Debug, Default)]
struct State {
    users: HashMap<Uuid, User>,
    refresh_tokens: HashMap<String, RefreshTokenRecord>,
}

/// In-memory [`CredentialStore`] for tests and database-less local runs.
///
/// Every mutation happens under one write lock, so rotation is atomic here too.
#[derive(Clone, Debug, Default)]
pub struct MemoryCredentialStore {
    state: Arc<RwLock<State>>,
}

impl MemoryCredentialStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live refresh-token rows, expired ones included.
    pub async fn refresh_token_count(&self) -> usize {
        self.state.read().await.refresh_tokens.len()
    }
}

#[async_trait]
impl CredentialStore for MemoryCredentialStore {
    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>> {
        let state = self.state.read().await;
        Ok(state.users.values().find(|user| user.email == email).cloned())
    }

    async fn find_user_by_id(&self, id: Uuid) -> Result<Option<User>> {
        Ok(self.state.read().await.users.get(&id).cloned())
    }

    async fn create_user(&self, user: NewUser<'_>) -> Result<SignupOutcome> {
        let mut state = self.state.write().await;
        if state.users.values().any(|existing| existing.email == user.email) {
            return Ok(SignupOutcome::Conflict);
        }

        let now = Utc::now();
        let created = User {
            id: Uuid::now_v7(),
            name: user.name.to_string(),
            email: user.email.to_string(),
            password_hash: user.password_hash.to_string(),
            avatar_url: None,
            is_verified: false,
            status: "active".to_string(),
            last_login_at: None,
            reset_token: None,
            reset_token_expires_at: None,
            created_at: now,
            updated_at: now,
        };
        state.users.insert(created.id, created.clone());
        Ok(SignupOutcome::Created(created))
    }

    async fn update_last_login(&self, id: Uuid) -> Result<()> {
        if let Some(user) = self.state.write().await.users.get_mut(&id) {
            let now = Utc::now();
            user.last_login_at = Some(now);
            user.updated_at = now;
        }
        Ok(())
    }

    async fn update_password(&self, id: Uuid, password_hash: &str) -> Result<()> {
        if let Some(user) = self.state.write().await.users.get_mut(&id) {
            user.password_hash = password_hash.to_string();
            user.reset_token = None;
            user.reset_token_expires_at = None;
            user.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn set_reset_token(
        &self,
        id: Uuid,
        token_hash: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<()> {
        if let Some(user) = self.state.write().await.users.get_mut(&id) {
            user.reset_token = Some(token_hash.to_string());
            user.reset_token_expires_at = Some(expires_at);
            user.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn create_refresh_token(
        &self,
        user_id: Uuid,
        token_hash: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<RefreshTokenRecord> {
        let record = RefreshTokenRecord {
            id: Uuid::now_v7(),
            user_id,
            token_hash: token_hash.to_string(),
            expires_at,
            created_at: Utc::now(),
        };
        self.state
            .write()
            .await
            .refresh_tokens
            .insert(record.token_hash.clone(), record.clone());
        Ok(record)
    }

    async fn find_refresh_token_by_hash(
        &self,
        token_hash: &str,
    ) -> Result<Option<RefreshTokenRecord>> {
        Ok(self.state.read().await.refresh_tokens.get(token_hash).cloned())
    }

    async fn delete_refresh_token_by_hash(&self, token_hash: &str) -> Result<bool> {
        Ok(self
            .state
            .write()
            .await
            .refresh_tokens
            .remove(token_hash)
            .is_some())
    }

    async fn rotate_refresh_token(
        &self,
        old_hash: &str,
        user_id: Uuid,
        new_hash: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<Option<RefreshTokenRecord>> {
        let mut state = self.state.write().await;
        match state.refresh_tokens.get(old_hash) {
            Some(record) if record.user_id == user_id => {}
            _ => return Ok(None),
        }
        state.refresh_tokens.remove(old_hash);

        let record = RefreshTokenRecord {
            id: Uuid::now_v7(),
            user_id,
            token_hash: new_hash.to_string(),
            expires_at,
            created_at: Utc::now(),
        };
        state
            .refresh_tokens
            .insert(record.token_hash.clone(), record.clone());
        Ok(Some(record))
    }

    async fn ping(&self) -> Result<()> {
        Ok(())
    }
}
