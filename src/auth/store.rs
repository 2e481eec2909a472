use async_trait::async_trait;
use thiserror::Error;
use time::OffsetDateTime;
use uuid::Uuid;

use super::repo_types::{NewUser, User};

#[derive(Debug, Error)]
pub enum StoreError {
    /// The unique index on normalized email rejected the insert.
    #[error("email already registered: {0}")]
    Conflict(String),

    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

/// Persistence port for user credentials.
///
/// The store is the sole authority for email uniqueness: callers may check
/// `find_by_email` first, but only `create` can reliably reject a duplicate.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Insert a new user.
    ///
    /// # Errors
    /// * `Conflict` - a user with the same normalized email exists
    async fn create(&self, user: NewUser) -> Result<User, StoreError>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError>;

    /// Look up by already-normalized email.
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError>;

    /// Set `updated_at`. Returns the refreshed user, or `None` if it vanished.
    async fn touch(&self, id: Uuid, at: OffsetDateTime) -> Result<Option<User>, StoreError>;

    async fn update_password(
        &self,
        id: Uuid,
        password_hash: &str,
        at: OffsetDateTime,
    ) -> Result<Option<User>, StoreError>;

    /// Store the digest of a pending reset token, replacing any earlier one.
    async fn set_reset_token(
        &self,
        id: Uuid,
        token_hash: &str,
        expiry: OffsetDateTime,
        at: OffsetDateTime,
    ) -> Result<(), StoreError>;

    /// Find the holder of `token_hash` if its expiry is strictly after `now`.
    async fn find_by_reset_token(
        &self,
        token_hash: &str,
        now: OffsetDateTime,
    ) -> Result<Option<User>, StoreError>;

    /// Replace the password and clear the reset fields in one conditional
    /// update. Matches only a live token, so each token is consumed at most
    /// once; `None` means nothing matched.
    async fn consume_reset_token(
        &self,
        token_hash: &str,
        now: OffsetDateTime,
        password_hash: &str,
    ) -> Result<Option<User>, StoreError>;
}
