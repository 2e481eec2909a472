use std::collections::HashMap;
use std::ops::RangeInclusive;

use anyhow::Context;

#[derive(Debug, Clone)]
pub struct JwtConfig {
    pub secret: String,
    pub issuer: String,
    pub audience: String,
    pub ttl_minutes: i64,
}

/// Password and reset-token policy.
#[derive(Debug, Clone)]
pub struct AuthConfig {
    /// Argon2 time cost (iterations) used for new hashes.
    pub hash_cost: u32,
    pub reset_ttl_minutes: i64,
    /// Stored normalized; registering with this address grants ADMIN.
    pub bootstrap_admin_email: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    Postgres,
    Memory,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: Option<String>,
    pub store_backend: StoreBackend,
    pub jwt: JwtConfig,
    pub auth: AuthConfig,
}

const DEFAULT_TOKEN_TTL_MINUTES: i64 = 7 * 24 * 60;
const DEFAULT_RESET_TTL_MINUTES: i64 = 10;
const DEFAULT_HASH_COST: u32 = 12;

/// Session tokens live at most 30 days.
const TOKEN_TTL_RANGE: RangeInclusive<i64> = 1..=30 * 24 * 60;
/// Reset tokens live at most one day.
const RESET_TTL_RANGE: RangeInclusive<i64> = 1..=24 * 60;

fn parse_var<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &str,
    default: T,
) -> anyhow::Result<T>
where
    T::Err: std::fmt::Display,
{
    match lookup(name) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|e| anyhow::anyhow!("{name}={raw:?} is not valid: {e}")),
        None => Ok(default),
    }
}

fn parse_minutes(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &str,
    default: i64,
    range: RangeInclusive<i64>,
) -> anyhow::Result<i64> {
    let minutes = parse_var(lookup, name, default)?;
    if !range.contains(&minutes) {
        anyhow::bail!(
            "{name}={minutes} must be between {} and {} minutes",
            range.start(),
            range.end()
        );
    }
    Ok(minutes)
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_map(vars: &HashMap<String, String>) -> anyhow::Result<Self> {
        Self::from_lookup(|name| vars.get(name).cloned())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let store_backend = match lookup("STORE_BACKEND")
            .unwrap_or_else(|| "postgres".into())
            .to_lowercase()
            .as_str()
        {
            "postgres" => StoreBackend::Postgres,
            "memory" => StoreBackend::Memory,
            other => anyhow::bail!("STORE_BACKEND={other:?} is not one of postgres, memory"),
        };

        let database_url = lookup("DATABASE_URL");
        if store_backend == StoreBackend::Postgres && database_url.is_none() {
            anyhow::bail!("DATABASE_URL must be set when STORE_BACKEND=postgres");
        }

        let jwt = JwtConfig {
            secret: lookup("JWT_SECRET").context("JWT_SECRET must be set")?,
            issuer: lookup("JWT_ISSUER").unwrap_or_else(|| "mindtrack".into()),
            audience: lookup("JWT_AUDIENCE").unwrap_or_else(|| "mindtrack-users".into()),
            ttl_minutes: parse_minutes(
                &lookup,
                "JWT_TTL_MINUTES",
                DEFAULT_TOKEN_TTL_MINUTES,
                TOKEN_TTL_RANGE,
            )?,
        };

        let hash_cost = parse_var(&lookup, "PASSWORD_HASH_COST", DEFAULT_HASH_COST)?;
        if hash_cost == 0 {
            anyhow::bail!("PASSWORD_HASH_COST must be at least 1");
        }

        let auth = AuthConfig {
            hash_cost,
            reset_ttl_minutes: parse_minutes(
                &lookup,
                "RESET_TTL_MINUTES",
                DEFAULT_RESET_TTL_MINUTES,
                RESET_TTL_RANGE,
            )?,
            bootstrap_admin_email: lookup("BOOTSTRAP_ADMIN_EMAIL")
                .map(|e| crate::auth::services::normalize_email(&e))
                .filter(|e| !e.is_empty()),
        };

        Ok(Self {
            database_url,
            store_backend,
            jwt,
            auth,
        })
    }
}

impl AuthConfig {
    pub fn is_bootstrap_admin(&self, normalized_email: &str) -> bool {
        self.bootstrap_admin_email
            .as_deref()
            .is_some_and(|admin| admin == normalized_email)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bootstrap_admin_matches_exact_normalized_email() {
        let cfg = AuthConfig {
            hash_cost: 1,
            reset_ttl_minutes: 10,
            bootstrap_admin_email: Some("root@calm.app".into()),
        };
        assert!(cfg.is_bootstrap_admin("root@calm.app"));
        assert!(!cfg.is_bootstrap_admin("someone@calm.app"));
    }

    #[test]
    fn no_bootstrap_admin_when_unset() {
        let cfg = AuthConfig {
            hash_cost: 1,
            reset_ttl_minutes: 10,
            bootstrap_admin_email: None,
        };
        assert!(!cfg.is_bootstrap_admin(""));
    }

    fn vars(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        let mut map: HashMap<String, String> = [("STORE_BACKEND", "memory"), ("JWT_SECRET", "s3cret")]
            .into_iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        for (k, v) in pairs {
            map.insert(k.to_string(), v.to_string());
        }
        map
    }

    #[test]
    fn defaults_apply_when_unset() {
        let cfg = AppConfig::from_map(&vars(&[])).unwrap();
        assert_eq!(cfg.store_backend, StoreBackend::Memory);
        assert_eq!(cfg.jwt.ttl_minutes, 7 * 24 * 60);
        assert_eq!(cfg.auth.reset_ttl_minutes, 10);
        assert_eq!(cfg.auth.hash_cost, 12);
        assert!(cfg.auth.bootstrap_admin_email.is_none());
    }

    #[test]
    fn non_positive_ttls_are_rejected() {
        for value in ["0", "-5"] {
            assert!(AppConfig::from_map(&vars(&[("RESET_TTL_MINUTES", value)])).is_err());
            assert!(AppConfig::from_map(&vars(&[("JWT_TTL_MINUTES", value)])).is_err());
        }
    }

    #[test]
    fn oversized_ttls_are_rejected() {
        assert!(AppConfig::from_map(&vars(&[("RESET_TTL_MINUTES", "1441")])).is_err());
        assert!(AppConfig::from_map(&vars(&[("JWT_TTL_MINUTES", "99999999999999")])).is_err());
        let cfg = AppConfig::from_map(&vars(&[("RESET_TTL_MINUTES", "1440")])).unwrap();
        assert_eq!(cfg.auth.reset_ttl_minutes, 1440);
    }

    #[test]
    fn postgres_backend_needs_database_url() {
        let err = AppConfig::from_map(&vars(&[("STORE_BACKEND", "postgres")])).unwrap_err();
        assert!(err.to_string().contains("DATABASE_URL"));
    }

    #[test]
    fn bootstrap_admin_is_normalized() {
        let cfg = AppConfig::from_map(&vars(&[("BOOTSTRAP_ADMIN_EMAIL", " Root@Calm.App ")])).unwrap();
        assert!(cfg.auth.is_bootstrap_admin("root@calm.app"));
    }
}
