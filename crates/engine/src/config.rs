//! Engine configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required (Postgres store only)
//! - `SHOPFLOOR_DATABASE_URL` - `PostgreSQL` connection string (falls back to `DATABASE_URL`)
//!
//! ## Optional
//! - `SHOPFLOOR_MUTATION_TIMEOUT_MS` - Deadline for a single mutation (default: 5000)
//! - `SHOPFLOOR_AGGREGATION_TIMEOUT_MS` - Deadline for an aggregation read (default: 30000)
//! - `SHOPFLOOR_DB_MAX_CONNECTIONS` - Pool size (default: 10)
//! - `SHOPFLOOR_LOG_FORMAT` - `pretty` or `json` (default: pretty)

use std::time::Duration;

use secrecy::SecretString;
use thiserror::Error;

use crate::scope::Timeouts;
use crate::telemetry::LogFormat;

const DEFAULT_MUTATION_TIMEOUT_MS: &str = "5000";
const DEFAULT_AGGREGATION_TIMEOUT_MS: &str = "30000";
const DEFAULT_MAX_CONNECTIONS: &str = "10";

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
}

/// Engine configuration.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// `PostgreSQL` database connection URL (contains password)
    pub database_url: Option<SecretString>,
    /// Deadlines for mutations and aggregations
    pub timeouts: Timeouts,
    /// Maximum pooled database connections
    pub max_connections: u32,
    /// Log output format
    pub log_format: LogFormat,
}

impl EngineConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidEnvVar` if a variable is set but cannot be parsed.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let database_url = get_database_url("SHOPFLOOR_DATABASE_URL");
        let mutation = parse_millis(
            "SHOPFLOOR_MUTATION_TIMEOUT_MS",
            &get_env_or_default("SHOPFLOOR_MUTATION_TIMEOUT_MS", DEFAULT_MUTATION_TIMEOUT_MS),
        )?;
        let aggregation = parse_millis(
            "SHOPFLOOR_AGGREGATION_TIMEOUT_MS",
            &get_env_or_default(
                "SHOPFLOOR_AGGREGATION_TIMEOUT_MS",
                DEFAULT_AGGREGATION_TIMEOUT_MS,
            ),
        )?;
        let max_connections =
            get_env_or_default("SHOPFLOOR_DB_MAX_CONNECTIONS", DEFAULT_MAX_CONNECTIONS)
                .parse::<u32>()
                .map_err(|e| {
                    ConfigError::InvalidEnvVar(
                        "SHOPFLOOR_DB_MAX_CONNECTIONS".to_string(),
                        e.to_string(),
                    )
                })?;
        let log_format = get_env_or_default("SHOPFLOOR_LOG_FORMAT", "pretty")
            .parse::<LogFormat>()
            .map_err(|e| ConfigError::InvalidEnvVar("SHOPFLOOR_LOG_FORMAT".to_string(), e))?;

        Ok(Self {
            database_url,
            timeouts: Timeouts {
                mutation,
                aggregation,
            },
            max_connections,
            log_format,
        })
    }

    /// The database URL, required by commands that talk to `PostgreSQL`.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::MissingEnvVar` when neither URL variable is set.
    pub fn require_database_url(&self) -> Result<&SecretString, ConfigError> {
        self.database_url
            .as_ref()
            .ok_or_else(|| ConfigError::MissingEnvVar("SHOPFLOOR_DATABASE_URL".to_string()))
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            database_url: None,
            timeouts: Timeouts::default(),
            max_connections: 10,
            log_format: LogFormat::Pretty,
        }
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Get database URL with fallback to generic `DATABASE_URL`.
fn get_database_url(primary_key: &str) -> Option<SecretString> {
    std::env::var(primary_key)
        .or_else(|_| std::env::var("DATABASE_URL"))
        .ok()
        .map(SecretString::from)
}

/// Get an environment variable with a default value.
fn get_env_or_default(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Parse a positive millisecond count into a `Duration`.
fn parse_millis(key: &str, value: &str) -> Result<Duration, ConfigError> {
    let millis = value
        .trim()
        .parse::<u64>()
        .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))?;
    if millis == 0 {
        return Err(ConfigError::InvalidEnvVar(
            key.to_string(),
            "timeout must be greater than zero".to_string(),
        ));
    }
    Ok(Duration::from_millis(millis))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_millis_valid() {
        assert_eq!(
            parse_millis("TEST_VAR", "2500").unwrap(),
            Duration::from_millis(2500)
        );
        assert_eq!(
            parse_millis("TEST_VAR", " 100 ").unwrap(),
            Duration::from_millis(100)
        );
    }

    #[test]
    fn test_parse_millis_zero_rejected() {
        let err = parse_millis("TEST_VAR", "0").unwrap_err();
        assert!(matches!(err, ConfigError::InvalidEnvVar(key, _) if key == "TEST_VAR"));
    }

    #[test]
    fn test_parse_millis_garbage_rejected() {
        assert!(parse_millis("TEST_VAR", "5s").is_err());
        assert!(parse_millis("TEST_VAR", "-1").is_err());
    }

    #[test]
    fn test_defaults_parse() {
        assert_eq!(
            parse_millis("M", DEFAULT_MUTATION_TIMEOUT_MS).unwrap(),
            Timeouts::default().mutation
        );
        assert_eq!(
            parse_millis("A", DEFAULT_AGGREGATION_TIMEOUT_MS).unwrap(),
            Timeouts::default().aggregation
        );
    }

    #[test]
    fn test_require_database_url_missing() {
        let config = EngineConfig::default();
        assert!(matches!(
            config.require_database_url(),
            Err(ConfigError::MissingEnvVar(_))
        ));
    }
}
