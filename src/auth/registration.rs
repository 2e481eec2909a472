use std::sync::Arc;

use tracing::{info, warn};
use uuid::Uuid;

use super::{
    jwt::JwtKeys,
    password::PasswordHasher,
    repo_types::{NewUser, Role, User},
    services::{check_password_strength, is_valid_email, normalize_email, require},
    store::CredentialStore,
};
use crate::{clock::Clock, config::AuthConfig, errors::AppError};

#[derive(Debug, Clone)]
pub struct RegisterCommand {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub password: String,
}

/// A user together with a freshly issued bearer token.
#[derive(Debug, Clone)]
pub struct Session {
    pub user: User,
    pub token: String,
}

pub struct RegistrationService {
    store: Arc<dyn CredentialStore>,
    hasher: PasswordHasher,
    jwt: JwtKeys,
    clock: Arc<dyn Clock>,
    config: AuthConfig,
}

impl RegistrationService {
    pub fn new(
        store: Arc<dyn CredentialStore>,
        hasher: PasswordHasher,
        jwt: JwtKeys,
        clock: Arc<dyn Clock>,
        config: AuthConfig,
    ) -> Self {
        Self {
            store,
            hasher,
            jwt,
            clock,
            config,
        }
    }

    fn validate(cmd: RegisterCommand) -> Result<RegisterCommand, AppError> {
        let first_name = require("firstName", &cmd.first_name)?.trim().to_string();
        let last_name = require("lastName", &cmd.last_name)?.trim().to_string();
        let email = normalize_email(require("email", &cmd.email)?);
        require("password", &cmd.password)?;

        if !is_valid_email(&email) {
            return Err(AppError::validation("email", "Invalid email address"));
        }
        check_password_strength("password", &cmd.password)?;

        Ok(RegisterCommand {
            first_name,
            last_name,
            email,
            password: cmd.password,
        })
    }

    pub async fn register(&self, cmd: RegisterCommand) -> Result<Session, AppError> {
        let cmd = Self::validate(cmd)?;

        // Advisory only; the store's unique index decides under a race.
        if self.store.find_by_email(&cmd.email).await?.is_some() {
            warn!(email = %cmd.email, "email already registered");
            return Err(AppError::Conflict { email: cmd.email });
        }

        let password_hash = self.hasher.hash_blocking(cmd.password).await?;

        let role = if self.config.is_bootstrap_admin(&cmd.email) {
            Role::Admin
        } else {
            Role::User
        };

        let now = self.clock.now();
        let user = self
            .store
            .create(NewUser {
                id: Uuid::new_v4(),
                email: cmd.email,
                first_name: cmd.first_name,
                last_name: cmd.last_name,
                password_hash,
                role,
                created_at: now,
            })
            .await?;

        let token = self.jwt.sign(&user, now)?;
        info!(user_id = %user.id, email = %user.email, %role, "user registered");
        Ok(Session { user, token })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        auth::memory::InMemoryCredentialStore, clock::ManualClock, config::JwtConfig,
    };
    use time::macros::datetime;

    fn service(store: Arc<InMemoryCredentialStore>, admin: Option<&str>) -> RegistrationService {
        RegistrationService::new(
            store,
            PasswordHasher::new(1).unwrap(),
            JwtKeys::from_config(&JwtConfig {
                secret: "test-secret".into(),
                issuer: "iss".into(),
                audience: "aud".into(),
                ttl_minutes: 7 * 24 * 60,
            }),
            Arc::new(ManualClock::new(datetime!(2024-02-01 09:00:00 UTC))),
            AuthConfig {
                hash_cost: 1,
                reset_ttl_minutes: 10,
                bootstrap_admin_email: admin.map(str::to_string),
            },
        )
    }

    fn cmd(email: &str, password: &str) -> RegisterCommand {
        RegisterCommand {
            first_name: "Ann".into(),
            last_name: "Lee".into(),
            email: email.into(),
            password: password.into(),
        }
    }

    #[tokio::test]
    async fn stores_hash_not_plaintext() {
        let store = Arc::new(InMemoryCredentialStore::new());
        let svc = service(store.clone(), None);
        let session = svc.register(cmd(" A@X.com ", "secret1")).await.unwrap();

        assert_eq!(session.user.email, "a@x.com");
        assert_eq!(session.user.role, Role::User);
        assert_ne!(session.user.password_hash, "secret1");
        assert!(svc
            .hasher
            .verify("secret1", &session.user.password_hash)
            .unwrap());
        assert!(!session.token.is_empty());
    }

    #[tokio::test]
    async fn duplicate_email_in_any_case_conflicts() {
        let store = Arc::new(InMemoryCredentialStore::new());
        let svc = service(store.clone(), None);
        svc.register(cmd("a@x.com", "secret1")).await.unwrap();
        let err = svc.register(cmd("A@X.COM", "other12")).await.unwrap_err();
        assert!(matches!(err, AppError::Conflict { .. }));
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn bootstrap_admin_gets_admin_role() {
        let store = Arc::new(InMemoryCredentialStore::new());
        let svc = service(store, Some("root@calm.app"));
        let session = svc.register(cmd("Root@Calm.app", "secret1")).await.unwrap();
        assert_eq!(session.user.role, Role::Admin);
    }

    #[tokio::test]
    async fn validation_failures_name_the_field() {
        let store = Arc::new(InMemoryCredentialStore::new());
        let svc = service(store.clone(), None);

        let err = svc.register(cmd("not-an-email", "secret1")).await.unwrap_err();
        assert!(matches!(err, AppError::Validation { field: Some("email"), .. }));

        let err = svc.register(cmd("a@x.com", "12345")).await.unwrap_err();
        assert!(matches!(err, AppError::Validation { field: Some("password"), .. }));

        let mut missing = cmd("a@x.com", "secret1");
        missing.last_name = "  ".into();
        let err = svc.register(missing).await.unwrap_err();
        assert!(matches!(err, AppError::Validation { field: Some("lastName"), .. }));

        assert!(store.is_empty().await);
    }
}
