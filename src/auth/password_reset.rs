use std::sync::Arc;

use base64ct::{Base64UrlUnpadded, Encoding};
use rand::{rngs::OsRng, RngCore};
use sha2::{Digest, Sha256};
use time::Duration;
use tracing::{error, info, warn};

use super::{
    notifier::ResetNotifier,
    password::PasswordHasher,
    repo_types::User,
    services::{check_password_strength, normalize_email, require},
    store::CredentialStore,
};
use crate::{clock::Clock, config::AuthConfig, errors::AppError};

/// Returned for every reset request, whether or not the account exists.
pub const RESET_REQUESTED_MESSAGE: &str =
    "If an account exists for that email, a password reset link has been sent";

const RESET_TOKEN_BYTES: usize = 32;

/// 256 bits from the OS CSPRNG, base64url without padding.
pub fn generate_reset_token() -> String {
    let mut bytes = [0u8; RESET_TOKEN_BYTES];
    OsRng.fill_bytes(&mut bytes);
    Base64UrlUnpadded::encode_string(&bytes)
}

/// At-rest form of a reset token: SHA-256, base64url without padding. Only
/// this digest is stored; the token itself goes to the notifier.
pub fn hash_reset_token(token: &str) -> String {
    Base64UrlUnpadded::encode_string(&Sha256::digest(token.as_bytes()))
}

/// Reset lifecycle: NoActiveReset -> PendingReset(token, expiry) -> consumed.
/// Expired tokens are simply never matched again.
pub struct PasswordResetService {
    store: Arc<dyn CredentialStore>,
    hasher: PasswordHasher,
    notifier: Arc<dyn ResetNotifier>,
    clock: Arc<dyn Clock>,
    ttl: Duration,
}

impl PasswordResetService {
    pub fn new(
        store: Arc<dyn CredentialStore>,
        hasher: PasswordHasher,
        notifier: Arc<dyn ResetNotifier>,
        clock: Arc<dyn Clock>,
        config: &AuthConfig,
    ) -> Self {
        Self {
            store,
            hasher,
            notifier,
            clock,
            ttl: Duration::minutes(config.reset_ttl_minutes),
        }
    }

    /// Always answers with [`RESET_REQUESTED_MESSAGE`] once the email is present.
    pub async fn request_reset(&self, email: &str) -> Result<&'static str, AppError> {
        let email = normalize_email(require("email", email)?);

        let Some(user) = self.store.find_by_email(&email).await? else {
            info!(%email, "password reset requested for unknown email");
            return Ok(RESET_REQUESTED_MESSAGE);
        };

        let now = self.clock.now();
        let token = generate_reset_token();
        let expires_at = now + self.ttl;
        // Overwrites any earlier pending token
        self.store
            .set_reset_token(user.id, &hash_reset_token(&token), expires_at, now)
            .await?;

        if let Err(e) = self.notifier.reset_requested(&user, &token, expires_at).await {
            error!(user_id = %user.id, error = %e, "reset notification failed");
        }

        info!(user_id = %user.id, %expires_at, "password reset requested");
        Ok(RESET_REQUESTED_MESSAGE)
    }

    pub async fn complete_reset(&self, token: &str, new_password: &str) -> Result<User, AppError> {
        require("token", token)?;
        require("newPassword", new_password)?;

        let token_hash = hash_reset_token(token);
        let now = self.clock.now();
        let Some(holder) = self.store.find_by_reset_token(&token_hash, now).await? else {
            warn!("password reset with invalid or expired token");
            return Err(AppError::InvalidResetToken);
        };

        check_password_strength("newPassword", new_password)?;
        let hash = self.hasher.hash_blocking(new_password.to_string()).await?;

        // Re-read the clock: hashing takes time and the token may lapse meanwhile
        let Some(user) = self
            .store
            .consume_reset_token(&token_hash, self.clock.now(), &hash)
            .await?
        else {
            warn!(user_id = %holder.id, "reset token consumed concurrently or expired");
            return Err(AppError::InvalidResetToken);
        };

        info!(user_id = %user.id, "password reset completed");
        Ok(user)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        auth::{
            memory::InMemoryCredentialStore,
            notifier::RecordingNotifier,
            repo_types::{NewUser, Role},
        },
        clock::ManualClock,
    };
    use time::macros::datetime;
    use uuid::Uuid;

    struct Fixture {
        store: Arc<InMemoryCredentialStore>,
        clock: Arc<ManualClock>,
        notifier: Arc<RecordingNotifier>,
        svc: PasswordResetService,
        hasher: PasswordHasher,
        user_id: Uuid,
    }

    async fn fixture() -> Fixture {
        let store = Arc::new(InMemoryCredentialStore::new());
        let clock = Arc::new(ManualClock::new(datetime!(2024-02-01 09:00:00 UTC)));
        let notifier = Arc::new(RecordingNotifier::new());
        let hasher = PasswordHasher::new(1).unwrap();
        let user = store
            .create(NewUser {
                id: Uuid::new_v4(),
                email: "a@x.com".into(),
                first_name: "Ann".into(),
                last_name: "Lee".into(),
                password_hash: hasher.hash("secret1").unwrap(),
                role: Role::User,
                created_at: clock.now(),
            })
            .await
            .unwrap();
        let svc = PasswordResetService::new(
            store.clone(),
            hasher.clone(),
            notifier.clone(),
            clock.clone(),
            &AuthConfig {
                hash_cost: 1,
                reset_ttl_minutes: 10,
                bootstrap_admin_email: None,
            },
        );
        Fixture {
            store,
            clock,
            notifier,
            svc,
            hasher,
            user_id: user.id,
        }
    }

    #[test]
    fn reset_tokens_are_long_and_distinct() {
        let a = generate_reset_token();
        let b = generate_reset_token();
        // 32 bytes -> 43 base64url chars
        assert_eq!(a.len(), 43);
        assert_ne!(a, b);
        assert!(a.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
    }

    #[test]
    fn token_digest_is_stable_and_not_the_token() {
        let token = generate_reset_token();
        let digest = hash_reset_token(&token);
        assert_eq!(digest, hash_reset_token(&token));
        assert_ne!(digest, token);
        assert_ne!(digest, hash_reset_token(&generate_reset_token()));
        // 32-byte digest -> 43 base64url chars
        assert_eq!(digest.len(), 43);
    }

    #[tokio::test]
    async fn stored_value_is_not_the_delivered_token() {
        let f = fixture().await;
        f.svc.request_reset("a@x.com").await.unwrap();
        let delivered = f.notifier.last_token_for("a@x.com").unwrap();
        let user = f.store.find_by_id(f.user_id).await.unwrap().unwrap();
        let stored = user.reset_token_hash.expect("pending reset");
        assert_ne!(stored, delivered);

        // the digest itself is not a usable token
        let err = f.svc.complete_reset(&stored, "newpass1").await.unwrap_err();
        assert!(matches!(err, AppError::InvalidResetToken));
        f.svc.complete_reset(&delivered, "newpass1").await.unwrap();
    }

    #[tokio::test]
    async fn unknown_email_gets_same_message_and_no_mutation() {
        let f = fixture().await;
        let before = f.store.find_by_id(f.user_id).await.unwrap().unwrap();
        let msg = f.svc.request_reset("ghost@x.com").await.unwrap();
        assert_eq!(msg, RESET_REQUESTED_MESSAGE);
        assert_eq!(f.store.len().await, 1);
        assert_eq!(f.notifier.sent_count(), 0);

        let after = f.store.find_by_id(f.user_id).await.unwrap().unwrap();
        assert_eq!(after.updated_at, before.updated_at);
        assert!(after.reset_token_hash.is_none());
    }

    #[tokio::test]
    async fn pending_token_has_ten_minute_expiry() {
        let f = fixture().await;
        f.svc.request_reset("A@X.com").await.unwrap();
        let user = f.store.find_by_id(f.user_id).await.unwrap().unwrap();
        let delivered = f.notifier.last_token_for("a@x.com").unwrap();
        assert_eq!(user.reset_token_hash, Some(hash_reset_token(&delivered)));
        assert_eq!(
            user.reset_token_expiry,
            Some(f.clock.now() + Duration::minutes(10))
        );
    }

    #[tokio::test]
    async fn token_is_single_use() {
        let f = fixture().await;
        f.svc.request_reset("a@x.com").await.unwrap();
        let token = f.notifier.last_token_for("a@x.com").unwrap();

        f.svc.complete_reset(&token, "newpass1").await.unwrap();
        let user = f.store.find_by_id(f.user_id).await.unwrap().unwrap();
        assert!(f.hasher.verify("newpass1", &user.password_hash).unwrap());
        assert!(user.reset_token_hash.is_none() && user.reset_token_expiry.is_none());

        let err = f.svc.complete_reset(&token, "again123").await.unwrap_err();
        assert!(matches!(err, AppError::InvalidResetToken));
    }

    #[tokio::test]
    async fn new_request_supersedes_previous_token() {
        let f = fixture().await;
        f.svc.request_reset("a@x.com").await.unwrap();
        let first = f.notifier.last_token_for("a@x.com").unwrap();
        f.svc.request_reset("a@x.com").await.unwrap();
        let second = f.notifier.last_token_for("a@x.com").unwrap();
        assert_ne!(first, second);

        let err = f.svc.complete_reset(&first, "newpass1").await.unwrap_err();
        assert!(matches!(err, AppError::InvalidResetToken));
        f.svc.complete_reset(&second, "newpass1").await.unwrap();
    }

    #[tokio::test]
    async fn expired_token_is_rejected() {
        let f = fixture().await;
        f.svc.request_reset("a@x.com").await.unwrap();
        let token = f.notifier.last_token_for("a@x.com").unwrap();
        f.clock.advance(Duration::minutes(10));
        let err = f.svc.complete_reset(&token, "newpass1").await.unwrap_err();
        assert!(matches!(err, AppError::InvalidResetToken));
    }

    #[tokio::test]
    async fn weak_password_keeps_token_pending() {
        let f = fixture().await;
        f.svc.request_reset("a@x.com").await.unwrap();
        let token = f.notifier.last_token_for("a@x.com").unwrap();
        let err = f.svc.complete_reset(&token, "123").await.unwrap_err();
        assert!(matches!(err, AppError::Validation { field: Some("newPassword"), .. }));
        f.svc.complete_reset(&token, "123456").await.unwrap();
    }

    #[tokio::test]
    async fn racing_completions_succeed_exactly_once() {
        let f = fixture().await;
        f.svc.request_reset("a@x.com").await.unwrap();
        let token = f.notifier.last_token_for("a@x.com").unwrap();

        let (a, b) = tokio::join!(
            f.svc.complete_reset(&token, "first-pass"),
            f.svc.complete_reset(&token, "second-pass"),
        );
        assert_eq!(a.is_ok() as u8 + b.is_ok() as u8, 1);
        let loser = if a.is_ok() { b } else { a };
        assert!(matches!(loser.unwrap_err(), AppError::InvalidResetToken));
    }

    #[tokio::test]
    async fn blank_inputs_are_validation_errors() {
        let f = fixture().await;
        assert!(matches!(
            f.svc.request_reset("  ").await.unwrap_err(),
            AppError::Validation { field: Some("email"), .. }
        ));
        assert!(matches!(
            f.svc.complete_reset("", "newpass1").await.unwrap_err(),
            AppError::Validation { field: Some("token"), .. }
        ));
    }
}
