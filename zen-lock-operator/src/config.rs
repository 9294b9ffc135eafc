//! Environment-variable configuration for the reconciler process
//! (spec.md §6 "Tunables"), the same gathered-into-one-struct shape
//! `zen-lock-webhook::config` uses.

use std::time::Duration;

const DEFAULT_ORPHAN_GRACE_SECONDS: u64 = 60;

#[derive(Debug, Clone)]
pub struct Config {
    pub identity_b64: String,
    pub orphan_grace: Duration,
    pub log_format: String,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("ZEN_LOCK_IDENTITY is not set")]
    MissingIdentity,
}

impl Config {
    /// `ZEN_LOCK_IDENTITY` is required (spec.md §7 "Configuration errors" —
    /// fatal at startup). The orphan grace window defaults to the 1-minute
    /// floor spec.md §9 settles on.
    pub fn from_env() -> Result<Self, ConfigError> {
        let identity_b64 = std::env::var("ZEN_LOCK_IDENTITY").map_err(|_| ConfigError::MissingIdentity)?;
        if identity_b64.is_empty() {
            return Err(ConfigError::MissingIdentity);
        }
        let orphan_grace_secs = env_parse("ZEN_LOCK_ORPHAN_GRACE_SECONDS").unwrap_or(DEFAULT_ORPHAN_GRACE_SECONDS);
        let log_format = std::env::var("ZEN_LOCK_LOG_FORMAT").unwrap_or_else(|_| "pretty".into());
        Ok(Self { identity_b64, orphan_grace: Duration::from_secs(orphan_grace_secs), log_format })
    }
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok().and_then(|v| v.parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_orphan_grace_is_one_minute() {
        std::env::set_var("ZEN_LOCK_IDENTITY", "dGVzdA==");
        std::env::remove_var("ZEN_LOCK_ORPHAN_GRACE_SECONDS");
        let config = Config::from_env().unwrap();
        assert_eq!(config.orphan_grace, Duration::from_secs(60));
        std::env::remove_var("ZEN_LOCK_IDENTITY");
    }
}
