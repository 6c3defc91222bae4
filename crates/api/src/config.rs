//! API configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `API_DATABASE_URL` - `PostgreSQL` connection string (falls back to `DATABASE_URL`)
//! - `SERVICE_JWT_SECRET` - HS256 secret shared with the Discord bot (min 32 chars, high entropy)
//! - `TRANSACTION_ENCRYPTION_KEY` - Secret the AES-256-GCM key is derived from
//! - `WEBHOOK_SECRET` - HMAC secret shared with the payment processor
//!
//! ## Optional
//! - `API_HOST` - Bind address (default: 127.0.0.1)
//! - `API_PORT` - Listen port (default: 4000)
//! - `REDIS_URL` - Redis connection string; response caching is disabled when unset
//! - `CACHE_TTL_SECS` - Default response cache TTL (default: 300)
//! - `PAYMENT_ORDER_TTL_MINS` - Minutes a payment order stays payable (default: 30)
//! - `PAY_ADDRESS_PREFIX` - Prefix for generated deposit references (default: shopbot)
//! - `RISK_REVIEW_THRESHOLD` - Score at which orders are flagged for review (default: 50)
//! - `RISK_BLOCK_THRESHOLD` - Score at which orders are rejected (default: 80)
//! - `CORS_ORIGINS` - Comma-separated list of allowed origins
//! - `LOG_FORMAT` - `json` for JSON logs, anything else for human-readable
//! - `SENTRY_DSN` - Sentry error tracking DSN
//! - `SENTRY_ENVIRONMENT` - Sentry environment name
//! - `SENTRY_TRACES_SAMPLE_RATE` - Fraction of requests traced (default: 0.0)

use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use thiserror::Error;

const MIN_SECRET_LENGTH: usize = 32;
const MIN_ENTROPY_BITS_PER_CHAR: f64 = 3.3;

/// Blocklist of common placeholder patterns (case-insensitive)
const PLACEHOLDER_PATTERNS: &[&str] = &[
    "your-",
    "changeme",
    "replace",
    "placeholder",
    "example",
    "password",
    "xxx",
    "todo",
    "fixme",
    "insert",
    "enter-",
    "put-your",
    "add-your",
];

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
    #[error("Insecure secret in {0}: {1}")]
    InsecureSecret(String, String),
}

/// API application configuration.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// `PostgreSQL` database connection URL (contains password)
    pub database_url: SecretString,
    /// IP address to bind the server to
    pub host: IpAddr,
    /// Port to listen on
    pub port: u16,
    /// Redis URL; `None` disables response caching
    pub redis_url: Option<SecretString>,
    /// Default TTL for cached responses
    pub cache_ttl: Duration,
    /// Secrets for signing, encryption and webhook verification
    pub secrets: SecretsConfig,
    /// Payment order settings
    pub payments: PaymentsConfig,
    /// Risk scoring thresholds
    pub risk: RiskConfig,
    /// Allowed CORS origins (empty = same-origin only)
    pub cors_origins: Vec<String>,
    /// Emit JSON logs instead of human-readable lines
    pub log_json: bool,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
    /// Sentry environment name
    pub sentry_environment: Option<String>,
    /// Fraction of transactions sent to Sentry performance monitoring
    pub sentry_traces_sample_rate: f32,
}

/// Shared secrets.
///
/// Implements `Debug` manually to redact every field.
#[derive(Clone)]
pub struct SecretsConfig {
    /// HS256 secret for service-to-service JWTs
    pub service_jwt_secret: SecretString,
    /// Material the transaction encryption key is derived from
    pub encryption_key: SecretString,
    /// HMAC secret for payment webhooks
    pub webhook_secret: SecretString,
}

impl std::fmt::Debug for SecretsConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecretsConfig")
            .field("service_jwt_secret", &"[REDACTED]")
            .field("encryption_key", &"[REDACTED]")
            .field("webhook_secret", &"[REDACTED]")
            .finish()
    }
}

/// Payment order settings.
#[derive(Debug, Clone)]
pub struct PaymentsConfig {
    /// How long an order stays payable
    pub order_ttl: chrono::Duration,
    /// Prefix for generated deposit references
    pub pay_address_prefix: String,
    /// How often overdue orders and lapsed subscriptions are swept
    pub sweep_interval: Duration,
}

impl Default for PaymentsConfig {
    fn default() -> Self {
        Self {
            order_ttl: chrono::Duration::minutes(30),
            pay_address_prefix: "shopbot".to_string(),
            sweep_interval: Duration::from_secs(60),
        }
    }
}

/// Risk decision thresholds (scores are `0..=100`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RiskConfig {
    /// Scores at or above this are allowed but flagged
    pub review_threshold: u32,
    /// Scores at or above this are rejected
    pub block_threshold: u32,
}

impl Default for RiskConfig {
    fn default() -> Self {
        Self {
            review_threshold: 50,
            block_threshold: 80,
        }
    }
}

impl ApiConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing, invalid, or
    /// if secrets fail validation (placeholder detection, entropy check).
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let database_url = get_database_url("API_DATABASE_URL")?;
        let host = parse_env("API_HOST", "127.0.0.1")?;
        let port = parse_env("API_PORT", "4000")?;
        let redis_url = get_optional_env("REDIS_URL").map(SecretString::from);
        let cache_ttl = Duration::from_secs(parse_env("CACHE_TTL_SECS", "300")?);

        let secrets = SecretsConfig {
            service_jwt_secret: get_validated_secret("SERVICE_JWT_SECRET")?,
            encryption_key: get_validated_secret("TRANSACTION_ENCRYPTION_KEY")?,
            webhook_secret: get_validated_secret("WEBHOOK_SECRET")?,
        };

        let order_ttl_mins: i64 = parse_env("PAYMENT_ORDER_TTL_MINS", "30")?;
        if !(1..=24 * 60).contains(&order_ttl_mins) {
            return Err(ConfigError::InvalidEnvVar(
                "PAYMENT_ORDER_TTL_MINS".to_string(),
                "must be between 1 and 1440".to_string(),
            ));
        }
        let payments = PaymentsConfig {
            order_ttl: chrono::Duration::minutes(order_ttl_mins),
            pay_address_prefix: get_env_or_default("PAY_ADDRESS_PREFIX", "shopbot"),
            ..PaymentsConfig::default()
        };

        let risk = RiskConfig {
            review_threshold: parse_env("RISK_REVIEW_THRESHOLD", "50")?,
            block_threshold: parse_env("RISK_BLOCK_THRESHOLD", "80")?,
        };
        validate_risk_thresholds(&risk)?;

        let cors_origins = get_optional_env("CORS_ORIGINS")
            .map(|v| {
                v.split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(String::from)
                    .collect()
            })
            .unwrap_or_default();

        Ok(Self {
            database_url,
            host,
            port,
            redis_url,
            cache_ttl,
            secrets,
            payments,
            risk,
            cors_origins,
            log_json: get_env_or_default("LOG_FORMAT", "text").eq_ignore_ascii_case("json"),
            sentry_dsn: get_optional_env("SENTRY_DSN"),
            sentry_environment: get_optional_env("SENTRY_ENVIRONMENT"),
            sentry_traces_sample_rate: parse_env("SENTRY_TRACES_SAMPLE_RATE", "0.0")?,
        })
    }

    /// Returns the socket address for binding the server.
    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Get a required environment variable.
fn get_required_env(key: &str) -> Result<String, ConfigError> {
    std::env::var(key).map_err(|_| ConfigError::MissingEnvVar(key.to_string()))
}

/// Get database URL with fallback to generic `DATABASE_URL` (set by most hosted Postgres providers).
fn get_database_url(primary_key: &str) -> Result<SecretString, ConfigError> {
    if let Ok(value) = std::env::var(primary_key) {
        return Ok(SecretString::from(value));
    }
    if let Ok(value) = std::env::var("DATABASE_URL") {
        return Ok(SecretString::from(value));
    }
    Err(ConfigError::MissingEnvVar(primary_key.to_string()))
}

/// Get an optional environment variable.
fn get_optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

/// Get an environment variable with a default value.
fn get_env_or_default(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Parse an environment variable (or its default) into `T`.
fn parse_env<T>(key: &str, default: &str) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    get_env_or_default(key, default)
        .trim()
        .parse::<T>()
        .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
}

/// Thresholds must be ordered and within the score range.
fn validate_risk_thresholds(risk: &RiskConfig) -> Result<(), ConfigError> {
    if risk.block_threshold > 100 || risk.review_threshold == 0 {
        return Err(ConfigError::InvalidEnvVar(
            "RISK_BLOCK_THRESHOLD".to_string(),
            "thresholds must be within 1..=100".to_string(),
        ));
    }
    if risk.review_threshold >= risk.block_threshold {
        return Err(ConfigError::InvalidEnvVar(
            "RISK_REVIEW_THRESHOLD".to_string(),
            format!(
                "must be lower than RISK_BLOCK_THRESHOLD ({})",
                risk.block_threshold
            ),
        ));
    }
    Ok(())
}

/// Validate that a secret meets minimum length requirements.
fn validate_secret_length(secret: &str, var_name: &str) -> Result<(), ConfigError> {
    if secret.len() < MIN_SECRET_LENGTH {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!(
                "must be at least {} characters (got {})",
                MIN_SECRET_LENGTH,
                secret.len()
            ),
        ));
    }
    Ok(())
}

/// Calculate Shannon entropy in bits per character.
fn shannon_entropy(s: &str) -> f64 {
    if s.is_empty() {
        return 0.0;
    }

    let mut freq: HashMap<char, usize> = HashMap::new();
    for c in s.chars() {
        *freq.entry(c).or_insert(0) += 1;
    }

    #[allow(clippy::cast_precision_loss)] // String length will never exceed f64 precision
    let len = s.chars().count() as f64;
    freq.values()
        .map(|&count| {
            #[allow(clippy::cast_precision_loss)] // Character count will never exceed f64 precision
            let p = count as f64 / len;
            -p * p.log2()
        })
        .sum()
}

/// Validate that a secret is not a placeholder and has sufficient entropy.
fn validate_secret_strength(secret: &str, var_name: &str) -> Result<(), ConfigError> {
    let lower = secret.to_lowercase();

    for pattern in PLACEHOLDER_PATTERNS {
        if lower.contains(pattern) {
            return Err(ConfigError::InsecureSecret(
                var_name.to_string(),
                format!("appears to be a placeholder (contains '{pattern}')"),
            ));
        }
    }

    let entropy = shannon_entropy(secret);
    if entropy < MIN_ENTROPY_BITS_PER_CHAR {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!(
                "entropy too low ({entropy:.2} bits/char, need >= {MIN_ENTROPY_BITS_PER_CHAR:.1}). Use a randomly generated secret."
            ),
        ));
    }

    Ok(())
}

/// Load and validate a secret from environment.
fn get_validated_secret(key: &str) -> Result<SecretString, ConfigError> {
    let value = get_required_env(key)?;
    validate_secret_length(&value, key)?;
    validate_secret_strength(&value, key)?;
    Ok(SecretString::from(value))
}

/// Expose a secret's bytes (kept here so callers never format secrets).
pub(crate) fn secret_bytes(secret: &SecretString) -> &[u8] {
    secret.expose_secret().as_bytes()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_shannon_entropy_empty() {
        assert!((shannon_entropy("") - 0.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_shannon_entropy_single_char() {
        assert!((shannon_entropy("aaaaaaa") - 0.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_shannon_entropy_two_chars() {
        let entropy = shannon_entropy("ab");
        assert!((entropy - 1.0).abs() < 0.01);
    }

    #[test]
    fn test_validate_secret_strength_placeholder() {
        let result = validate_secret_strength("your-api-key-here", "TEST_VAR");
        assert!(matches!(result, Err(ConfigError::InsecureSecret(_, _))));
    }

    #[test]
    fn test_validate_secret_strength_low_entropy() {
        let result = validate_secret_strength("aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa", "TEST_VAR");
        assert!(matches!(result, Err(ConfigError::InsecureSecret(_, _))));
    }

    #[test]
    fn test_validate_secret_strength_valid() {
        let result = validate_secret_strength("aB3$xY9!mK2@nL5#pQ7&rT0*uW4^zC6", "TEST_VAR");
        assert!(result.is_ok());
    }

    #[test]
    fn test_validate_secret_length() {
        assert!(validate_secret_length("short", "TEST").is_err());
        assert!(validate_secret_length(&"a".repeat(32), "TEST").is_ok());
    }

    #[test]
    fn test_risk_thresholds_must_be_ordered() {
        assert!(validate_risk_thresholds(&RiskConfig::default()).is_ok());
        assert!(
            validate_risk_thresholds(&RiskConfig {
                review_threshold: 80,
                block_threshold: 80,
            })
            .is_err()
        );
        assert!(
            validate_risk_thresholds(&RiskConfig {
                review_threshold: 50,
                block_threshold: 101,
            })
            .is_err()
        );
    }

    #[test]
    fn test_secrets_debug_redacts() {
        let secrets = SecretsConfig {
            service_jwt_secret: SecretString::from("super_secret_jwt_value"),
            encryption_key: SecretString::from("super_secret_encryption"),
            webhook_secret: SecretString::from("super_secret_webhook"),
        };
        let debug_output = format!("{secrets:?}");
        assert!(debug_output.contains("[REDACTED]"));
        assert!(!debug_output.contains("super_secret"));
    }

    #[test]
    fn test_parse_env_default() {
        let port: u16 = parse_env("SHOPBOT_TEST_UNSET_PORT", "4000").unwrap();
        assert_eq!(port, 4000);
        assert!(parse_env::<u16>("SHOPBOT_TEST_UNSET_PORT", "not-a-port").is_err());
    }
}
