use std::sync::Mutex;

use async_trait::async_trait;
use time::OffsetDateTime;
use tracing::info;

use super::repo_types::User;

/// Hands a freshly issued reset token to its account holder (email, push, ...).
#[async_trait]
pub trait ResetNotifier: Send + Sync {
    async fn reset_requested(
        &self,
        user: &User,
        token: &str,
        expires_at: OffsetDateTime,
    ) -> anyhow::Result<()>;
}

/// Default notifier: records that a reset was issued, never the token itself.
#[derive(Debug, Default)]
pub struct TracingNotifier;

#[async_trait]
impl ResetNotifier for TracingNotifier {
    async fn reset_requested(
        &self,
        user: &User,
        _token: &str,
        expires_at: OffsetDateTime,
    ) -> anyhow::Result<()> {
        info!(user_id = %user.id, %expires_at, "password reset issued; no delivery channel configured");
        Ok(())
    }
}

/// Keeps every delivered token in memory. For tests and local tooling.
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<(String, String)>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Most recent token delivered to `email`.
    pub fn last_token_for(&self, email: &str) -> Option<String> {
        let sent = self.sent.lock().unwrap_or_else(|e| e.into_inner());
        sent.iter()
            .rev()
            .find(|(to, _)| to == email)
            .map(|(_, token)| token.clone())
    }

    pub fn sent_count(&self) -> usize {
        self.sent.lock().unwrap_or_else(|e| e.into_inner()).len()
    }
}

#[async_trait]
impl ResetNotifier for RecordingNotifier {
    async fn reset_requested(
        &self,
        user: &User,
        token: &str,
        _expires_at: OffsetDateTime,
    ) -> anyhow::Result<()> {
        let mut sent = self.sent.lock().unwrap_or_else(|e| e.into_inner());
        sent.push((user.email.clone(), token.to_string()));
        Ok(())
    }
}
