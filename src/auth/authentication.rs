use std::sync::Arc;

use tracing::{info, warn};
use uuid::Uuid;

use super::{
    jwt::JwtKeys,
    password::PasswordHasher,
    registration::Session,
    repo_types::User,
    services::{check_password_strength, normalize_email, require},
    store::CredentialStore,
};
use crate::{clock::Clock, errors::AppError};

pub struct AuthenticationService {
    store: Arc<dyn CredentialStore>,
    hasher: PasswordHasher,
    jwt: JwtKeys,
    clock: Arc<dyn Clock>,
}

impl AuthenticationService {
    pub fn new(
        store: Arc<dyn CredentialStore>,
        hasher: PasswordHasher,
        jwt: JwtKeys,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            store,
            hasher,
            jwt,
            clock,
        }
    }

    /// Unknown email and wrong password both end in `InvalidCredentials`.
    pub async fn login(&self, email: &str, password: &str) -> Result<Session, AppError> {
        let email = normalize_email(require("email", email)?);
        require("password", password)?;

        let Some(user) = self.store.find_by_email(&email).await? else {
            self.hasher
                .verify_dummy_blocking(password.to_string())
                .await?;
            warn!(%email, "login unknown email");
            return Err(AppError::InvalidCredentials);
        };

        let ok = self
            .hasher
            .verify_blocking(password.to_string(), user.password_hash.clone())
            .await?;
        if !ok {
            warn!(%email, user_id = %user.id, "login invalid password");
            return Err(AppError::InvalidCredentials);
        }

        let now = self.clock.now();
        // updated_at doubles as a last-active marker
        let user = self.store.touch(user.id, now).await?.unwrap_or(user);

        let token = self.jwt.sign(&user, now)?;
        info!(user_id = %user.id, email = %user.email, "user logged in");
        Ok(Session { user, token })
    }

    /// Loads the account behind an already-verified token.
    pub async fn current_user(&self, user_id: Uuid) -> Result<User, AppError> {
        self.store
            .find_by_id(user_id)
            .await?
            .ok_or(AppError::NotFound { resource: "User" })
    }

    pub async fn change_password(
        &self,
        user_id: Uuid,
        current_password: &str,
        new_password: &str,
    ) -> Result<User, AppError> {
        require("currentPassword", current_password)?;
        require("newPassword", new_password)?;
        check_password_strength("newPassword", new_password)?;

        let user = self.current_user(user_id).await?;
        let ok = self
            .hasher
            .verify_blocking(current_password.to_string(), user.password_hash.clone())
            .await?;
        if !ok {
            warn!(%user_id, "change password with wrong current password");
            return Err(AppError::Unauthenticated {
                message: "Current password is incorrect".into(),
            });
        }

        let hash = self.hasher.hash_blocking(new_password.to_string()).await?;
        let user = self
            .store
            .update_password(user_id, &hash, self.clock.now())
            .await?
            .ok_or(AppError::NotFound { resource: "User" })?;

        info!(%user_id, "password changed");
        Ok(user)
    }
}
