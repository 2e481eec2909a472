use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::Mutex;
use time::OffsetDateTime;
use uuid::Uuid;

use super::repo_types::{NewUser, User};
use super::store::{CredentialStore, StoreError};

/// In-process credential store with the same invariants as the Postgres
/// schema: unique normalized email, reset token cleared atomically on use.
#[derive(Default)]
pub struct InMemoryCredentialStore {
    users: Mutex<HashMap<Uuid, User>>,
}

impl InMemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.users.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.users.lock().await.is_empty()
    }
}

fn email_key(email: &str) -> String {
    email.trim().to_lowercase()
}

#[async_trait]
impl CredentialStore for InMemoryCredentialStore {
    async fn create(&self, user: NewUser) -> Result<User, StoreError> {
        let mut users = self.users.lock().await;
        let key = email_key(&user.email);
        if users.values().any(|u| email_key(&u.email) == key) {
            return Err(StoreError::Conflict(user.email));
        }
        let user = user.into_user();
        users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError> {
        Ok(self.users.lock().await.get(&id).cloned())
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        let key = email_key(email);
        let users = self.users.lock().await;
        Ok(users.values().find(|u| email_key(&u.email) == key).cloned())
    }

    async fn touch(&self, id: Uuid, at: OffsetDateTime) -> Result<Option<User>, StoreError> {
        let mut users = self.users.lock().await;
        Ok(users.get_mut(&id).map(|u| {
            u.updated_at = at;
            u.clone()
        }))
    }

    async fn update_password(
        &self,
        id: Uuid,
        password_hash: &str,
        at: OffsetDateTime,
    ) -> Result<Option<User>, StoreError> {
        let mut users = self.users.lock().await;
        Ok(users.get_mut(&id).map(|u| {
            u.password_hash = password_hash.to_string();
            u.updated_at = at;
            u.clone()
        }))
    }

    async fn set_reset_token(
        &self,
        id: Uuid,
        token_hash: &str,
        expiry: OffsetDateTime,
        at: OffsetDateTime,
    ) -> Result<(), StoreError> {
        let mut users = self.users.lock().await;
        if let Some(u) = users.get_mut(&id) {
            u.reset_token_hash = Some(token_hash.to_string());
            u.reset_token_expiry = Some(expiry);
            u.updated_at = at;
        }
        Ok(())
    }

    async fn find_by_reset_token(
        &self,
        token_hash: &str,
        now: OffsetDateTime,
    ) -> Result<Option<User>, StoreError> {
        let users = self.users.lock().await;
        Ok(users
            .values()
            .find(|u| reset_token_live(u, token_hash, now))
            .cloned())
    }

    async fn consume_reset_token(
        &self,
        token_hash: &str,
        now: OffsetDateTime,
        password_hash: &str,
    ) -> Result<Option<User>, StoreError> {
        let mut users = self.users.lock().await;
        Ok(users
            .values_mut()
            .find(|u| reset_token_live(u, token_hash, now))
            .map(|u| {
                u.password_hash = password_hash.to_string();
                u.reset_token_hash = None;
                u.reset_token_expiry = None;
                u.updated_at = now;
                u.clone()
            }))
    }
}

fn reset_token_live(user: &User, token_hash: &str, now: OffsetDateTime) -> bool {
    user.reset_token_hash.as_deref() == Some(token_hash)
        && user.reset_token_expiry.is_some_and(|exp| exp > now)
}
