use std::sync::Arc;

use crate::auth::{
    authentication::AuthenticationService,
    jwt::JwtKeys,
    memory::InMemoryCredentialStore,
    notifier::{ResetNotifier, TracingNotifier},
    password::PasswordHasher,
    password_reset::PasswordResetService,
    registration::RegistrationService,
    repo::PgCredentialStore,
    store::CredentialStore,
};
use crate::clock::{Clock, SystemClock};
use crate::config::{AppConfig, StoreBackend};
use crate::db;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub jwt: JwtKeys,
    pub clock: Arc<dyn Clock>,
    pub registration: Arc<RegistrationService>,
    pub authentication: Arc<AuthenticationService>,
    pub password_reset: Arc<PasswordResetService>,
}

impl AppState {
    /// Build everything from the environment, connecting to the configured store.
    pub async fn init() -> anyhow::Result<Self> {
        let config = AppConfig::from_env()?;

        let store: Arc<dyn CredentialStore> = match config.store_backend {
            StoreBackend::Postgres => {
                let url = config.database_url.as_deref().unwrap_or_default();
                let pool = db::connect(url).await?;
                db::migrate(&pool).await;
                Arc::new(PgCredentialStore::new(pool))
            }
            StoreBackend::Memory => {
                tracing::warn!("using in-memory credential store; accounts are lost on restart");
                Arc::new(InMemoryCredentialStore::new())
            }
        };

        Self::from_parts(
            config,
            store,
            Arc::new(SystemClock),
            Arc::new(TracingNotifier),
        )
    }

    pub fn from_parts(
        config: AppConfig,
        store: Arc<dyn CredentialStore>,
        clock: Arc<dyn Clock>,
        notifier: Arc<dyn ResetNotifier>,
    ) -> anyhow::Result<Self> {
        let hasher = PasswordHasher::new(config.auth.hash_cost)?;
        let jwt = JwtKeys::from_config(&config.jwt);

        let registration = RegistrationService::new(
            store.clone(),
            hasher.clone(),
            jwt.clone(),
            clock.clone(),
            config.auth.clone(),
        );
        let authentication =
            AuthenticationService::new(store.clone(), hasher.clone(), jwt.clone(), clock.clone());
        let password_reset =
            PasswordResetService::new(store, hasher, notifier, clock.clone(), &config.auth);

        Ok(Self {
            config: Arc::new(config),
            jwt,
            clock,
            registration: Arc::new(registration),
            authentication: Arc::new(authentication),
            password_reset: Arc::new(password_reset),
        })
    }
}
