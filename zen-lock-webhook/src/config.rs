//! Environment-variable configuration (spec.md §6 "Environment"/"Tunables").
//!
//! Teacher's `main()` (`citadel-api/src/main.rs`) reads env vars directly
//! inline; gathered into one struct here since the injector has retry/cache
//! knobs that stages need independently of `main`, and a struct is easier to
//! unit test than a pile of `std::env::var` calls scattered through a binary.

use std::time::Duration;

const DEFAULT_PORT: u16 = 9443;
const DEFAULT_CACHE_TTL_SECONDS: u64 = 300;
const DEFAULT_RETRY_MAX_ATTEMPTS: u32 = 3;
const DEFAULT_RETRY_INITIAL_DELAY_MS: u64 = 50;
const DEFAULT_RETRY_MAX_DELAY_MS: u64 = 1000;

#[derive(Debug, Clone)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_RETRY_MAX_ATTEMPTS,
            initial_delay: Duration::from_millis(DEFAULT_RETRY_INITIAL_DELAY_MS),
            max_delay: Duration::from_millis(DEFAULT_RETRY_MAX_DELAY_MS),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub identity_b64: String,
    pub port: u16,
    pub cache_ttl: Duration,
    pub retry: RetryConfig,
    pub log_format: String,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("ZEN_LOCK_IDENTITY is not set")]
    MissingIdentity,
}

impl Config {
    /// Read configuration from the process environment. `ZEN_LOCK_IDENTITY`
    /// is the only required variable (spec.md §7 "Configuration errors" —
    /// fatal at startup when absent); every other variable has a documented
    /// default.
    pub fn from_env() -> Result<Self, ConfigError> {
        let identity_b64 = std::env::var("ZEN_LOCK_IDENTITY").map_err(|_| ConfigError::MissingIdentity)?;
        if identity_b64.is_empty() {
            return Err(ConfigError::MissingIdentity);
        }

        let port = env_parse("ZEN_LOCK_PORT").unwrap_or(DEFAULT_PORT);
        let cache_ttl_secs = env_parse("ZEN_LOCK_CACHE_TTL_SECONDS").unwrap_or(DEFAULT_CACHE_TTL_SECONDS);
        let retry = RetryConfig {
            max_attempts: env_parse("ZEN_LOCK_RETRY_MAX_ATTEMPTS").unwrap_or(DEFAULT_RETRY_MAX_ATTEMPTS),
            initial_delay: Duration::from_millis(
                env_parse("ZEN_LOCK_RETRY_INITIAL_DELAY_MS").unwrap_or(DEFAULT_RETRY_INITIAL_DELAY_MS),
            ),
            max_delay: Duration::from_millis(env_parse("ZEN_LOCK_RETRY_MAX_DELAY_MS").unwrap_or(DEFAULT_RETRY_MAX_DELAY_MS)),
        };
        let log_format = std::env::var("ZEN_LOCK_LOG_FORMAT").unwrap_or_else(|_| "pretty".into());

        Ok(Self { identity_b64, port, cache_ttl: Duration::from_secs(cache_ttl_secs), retry, log_format })
    }
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok().and_then(|v| v.parse().ok())
}
