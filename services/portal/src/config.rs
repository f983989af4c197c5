//! services/portal/src/config.rs
//!
//! Defines the portal's configuration structure and loading logic.
//!
//! All configuration is loaded from environment variables at startup. The `.env`
//! file is used for local development.

use std::net::SocketAddr;
use std::time::Duration;
use tracing::Level;

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing the environment variable {0}")]
    MissingVar(String),
    #[error("Invalid value for the environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// Holds all configuration loaded from the environment at startup.
#[derive(Clone, Debug)]
pub struct Config {
    pub bind_address: SocketAddr,
    pub database_url: String,
    pub log_level: Level,
    pub allowed_origin: String,
    /// Quiet period before a reading position is written.
    pub progress_debounce: Duration,
    /// Percentage stored when a document is opened for the first time.
    pub seed_progress_percent: u8,
    pub auth_session_days: i64,
    pub featured_limit: usize,
}

impl Config {
    /// Loads configuration from environment variables.
    ///
    /// It will look for a `.env` file in the current directory for development,
    /// but this is skipped in test environments to ensure tests are hermetic.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Only load from .env in non-test mode to avoid contamination.
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }

        // --- Load Server and Database Settings ---
        let bind_address_str =
            std::env::var("BIND_ADDRESS").unwrap_or_else(|_| "0.0.0.0:3000".to_string());
        let bind_address = bind_address_str.parse::<SocketAddr>().map_err(|e| {
            ConfigError::InvalidValue("BIND_ADDRESS".to_string(), e.to_string())
        })?;

        let database_url = std::env::var("DATABASE_URL")
            .map_err(|_| ConfigError::MissingVar("DATABASE_URL".to_string()))?;

        let log_level_str = std::env::var("RUST_LOG").unwrap_or_else(|_| "INFO".to_string());
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        let allowed_origin = std::env::var("ALLOWED_ORIGIN")
            .unwrap_or_else(|_| "http://localhost:5173".to_string());

        // --- Load Reader Settings ---
        let debounce_ms: u64 = parse_var("PROGRESS_DEBOUNCE_MS", 1000)?;
        let seed_progress_percent: u8 = parse_var("SEED_PROGRESS_PERCENT", 5)?;
        if !(1..=100).contains(&seed_progress_percent) {
            return Err(ConfigError::InvalidValue(
                "SEED_PROGRESS_PERCENT".to_string(),
                format!("{} is outside 1..=100", seed_progress_percent),
            ));
        }

        let auth_session_days: i64 = parse_var("AUTH_SESSION_DAYS", 30)?;
        let featured_limit: usize = parse_var("FEATURED_LIMIT", 4)?;

        Ok(Self {
            bind_address,
            database_url,
            log_level,
            allowed_origin,
            progress_debounce: Duration::from_millis(debounce_ms),
            seed_progress_percent,
            auth_session_days,
            featured_limit,
        })
    }
}

/// Reads an optional numeric variable, falling back to `default` when unset.
fn parse_var<T>(name: &str, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|e| ConfigError::InvalidValue(name.to_string(), e.to_string())),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_var_falls_back_and_rejects_garbage() {
        std::env::remove_var("PORTAL_TEST_UNSET_VAR");
        assert_eq!(parse_var::<u64>("PORTAL_TEST_UNSET_VAR", 7).unwrap(), 7);

        std::env::set_var("PORTAL_TEST_BAD_VAR", "soon");
        let err = parse_var::<u64>("PORTAL_TEST_BAD_VAR", 7).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue(name, _) if name == "PORTAL_TEST_BAD_VAR"));

        std::env::set_var("PORTAL_TEST_GOOD_VAR", " 250 ");
        assert_eq!(parse_var::<u64>("PORTAL_TEST_GOOD_VAR", 7).unwrap(), 250);
    }
}
