//! Configuration loading and representation.
//!
//! Everything comes from environment variables:
//!
//! | variable | required | meaning |
//! |----------|----------|---------|
//! | `RBAC_SIGNATURE_KEYS` | yes | comma-separated `key_id:hex_secret`; first entry signs, all entries verify |
//! | `DATABASE_URL` | for [`crate::connect`] | Postgres connection string |
//! | `RBAC_LOAD_STRATEGY` | no | `default` \| `global-only` \| `project-only` |

use std::collections::HashSet;

use thiserror::Error;

use rbacload_rbac::{Keyring, LoadStrategy, SigningKey};

pub const SIGNATURE_KEYS_VAR: &str = "RBAC_SIGNATURE_KEYS";
pub const DATABASE_URL_VAR: &str = "DATABASE_URL";
pub const LOAD_STRATEGY_VAR: &str = "RBAC_LOAD_STRATEGY";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} is not set")]
    Missing(&'static str),

    #[error("invalid {var}: {reason}")]
    Invalid { var: &'static str, reason: String },
}

impl ConfigError {
    fn invalid(var: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            var,
            reason: reason.into(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct RbacConfig {
    pub keyring: Keyring,
    pub database_url: Option<String>,
    pub strategy: LoadStrategy,
}

impl RbacConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Build from an arbitrary variable source (tests use a map).
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let keys = lookup(SIGNATURE_KEYS_VAR)
            .filter(|v| !v.trim().is_empty())
            .ok_or(ConfigError::Missing(SIGNATURE_KEYS_VAR))?;
        let keyring = parse_keyring(&keys)?;

        let database_url = lookup(DATABASE_URL_VAR).filter(|v| !v.trim().is_empty());

        let strategy = match lookup(LOAD_STRATEGY_VAR) {
            Some(raw) if !raw.trim().is_empty() => raw
                .parse::<LoadStrategy>()
                .map_err(|e| ConfigError::invalid(LOAD_STRATEGY_VAR, e.to_string()))?,
            _ => LoadStrategy::default(),
        };

        Ok(Self {
            keyring,
            database_url,
            strategy,
        })
    }
}

/// Parse `id:hex[,id:hex...]` into a keyring, first entry current.
pub fn parse_keyring(raw: &str) -> Result<Keyring, ConfigError> {
    let mut seen = HashSet::new();
    let mut keys = Vec::new();

    for entry in raw.split(',').map(str::trim).filter(|e| !e.is_empty()) {
        let (id, secret) = entry
            .split_once(':')
            .ok_or_else(|| ConfigError::invalid(SIGNATURE_KEYS_VAR, format!("entry '{entry}' is not id:hex")))?;
        let id = id.trim();
        if id.is_empty() {
            return Err(ConfigError::invalid(SIGNATURE_KEYS_VAR, "empty key id"));
        }
        if !seen.insert(id.to_string()) {
            return Err(ConfigError::invalid(SIGNATURE_KEYS_VAR, format!("duplicate key id '{id}'")));
        }
        let key = SigningKey::from_hex(id, secret)
            .map_err(|e| ConfigError::invalid(SIGNATURE_KEYS_VAR, e.to_string()))?;
        keys.push(key);
    }

    let mut keys = keys.into_iter();
    let current = keys
        .next()
        .ok_or(ConfigError::Missing(SIGNATURE_KEYS_VAR))?;
    Ok(Keyring::new(current, keys.collect()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |k| map.get(k).cloned()
    }

    fn secret(byte: &str) -> String {
        byte.repeat(32)
    }

    #[test]
    fn minimal_config_uses_defaults() {
        let keys = format!("k1:{}", secret("aa"));
        let config = RbacConfig::from_lookup(lookup(&[(SIGNATURE_KEYS_VAR, &keys)])).unwrap();
        assert_eq!(config.keyring.len(), 1);
        assert_eq!(config.keyring.current().unwrap().id(), "k1");
        assert_eq!(config.strategy, LoadStrategy::Default);
        assert!(config.database_url.is_none());
    }

    #[test]
    fn rotation_keys_keep_order() {
        let keys = format!("new:{}, old:{}", secret("bb"), secret("aa"));
        let config = RbacConfig::from_lookup(lookup(&[
            (SIGNATURE_KEYS_VAR, &keys),
            (LOAD_STRATEGY_VAR, "project-only"),
            (DATABASE_URL_VAR, "postgres://localhost/rbac"),
        ]))
        .unwrap();
        assert_eq!(config.keyring.len(), 2);
        assert_eq!(config.keyring.current().unwrap().id(), "new");
        assert_eq!(config.strategy, LoadStrategy::ProjectOnly);
        assert_eq!(config.database_url.as_deref(), Some("postgres://localhost/rbac"));
    }

    #[test]
    fn missing_keys_is_an_error() {
        assert_eq!(
            RbacConfig::from_lookup(lookup(&[])).unwrap_err(),
            ConfigError::Missing(SIGNATURE_KEYS_VAR)
        );
    }

    #[test]
    fn malformed_keys_are_rejected() {
        for raw in ["k1", "k1:nothex", ":abcd", "k1:abcd"] {
            assert!(matches!(parse_keyring(raw), Err(ConfigError::Invalid { .. })), "{raw}");
        }
        let dup = format!("k1:{s},k1:{s}", s = secret("aa"));
        assert!(matches!(parse_keyring(&dup), Err(ConfigError::Invalid { .. })));
    }

    #[test]
    fn unknown_strategy_is_rejected() {
        let keys = format!("k1:{}", secret("aa"));
        let err = RbacConfig::from_lookup(lookup(&[
            (SIGNATURE_KEYS_VAR, &keys),
            (LOAD_STRATEGY_VAR, "everything"),
        ]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { var: LOAD_STRATEGY_VAR, .. }));
    }
}
