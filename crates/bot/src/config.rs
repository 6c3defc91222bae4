//! Bot configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `DISCORD_TOKEN` - Bot token from the Discord developer portal
//! - `SERVICE_JWT_SECRET` - HS256 secret shared with the API (min 32 chars)
//!
//! ## Optional
//! - `API_BASE_URL` - Backend base URL (default: `http://127.0.0.1:4000`)
//! - `DISCORD_GUILD_ID` - Register commands for this guild only (instant
//!   propagation, useful in development); global registration when unset
//! - `SESSION_TTL_SECS` - Idle lifetime of a purchase session (default: 900)
//! - `BOT_SERVICE_NAME` - Subject of minted service tokens (default: `discord-bot`)
//! - `LOG_FORMAT` - `json` for JSON logs, anything else for human-readable

use std::time::Duration;

use secrecy::SecretString;
use thiserror::Error;
use url::Url;

const MIN_SECRET_LENGTH: usize = 32;

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
}

/// Discord bot configuration.
#[derive(Clone)]
pub struct BotConfig {
    pub discord_token: SecretString,
    pub guild_id: Option<u64>,
    pub api_base_url: Url,
    pub service_jwt_secret: SecretString,
    pub service_name: String,
    pub session_ttl: Duration,
    pub log_json: bool,
}

impl std::fmt::Debug for BotConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BotConfig")
            .field("discord_token", &"[REDACTED]")
            .field("guild_id", &self.guild_id)
            .field("api_base_url", &self.api_base_url.as_str())
            .field("service_jwt_secret", &"[REDACTED]")
            .field("service_name", &self.service_name)
            .field("session_ttl", &self.session_ttl)
            .finish()
    }
}

impl BotConfig {
    /// Load configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if a required variable is missing or a value
    /// does not parse.
    pub fn from_env() -> Result<Self, ConfigError> {
        let _ = dotenvy::dotenv();

        let discord_token = SecretString::from(get_required_env("DISCORD_TOKEN")?);

        let secret = get_required_env("SERVICE_JWT_SECRET")?;
        if secret.len() < MIN_SECRET_LENGTH {
            return Err(ConfigError::InvalidEnvVar(
                "SERVICE_JWT_SECRET".to_string(),
                format!("must be at least {MIN_SECRET_LENGTH} characters"),
            ));
        }

        let api_base_url = parse_base_url(&get_env_or_default(
            "API_BASE_URL",
            "http://127.0.0.1:4000",
        ))?;

        let guild_id = get_optional_env("DISCORD_GUILD_ID")
            .map(|v| {
                match v.trim().parse::<u64>() {
                    Ok(0) => Err(ConfigError::InvalidEnvVar(
                        "DISCORD_GUILD_ID".to_string(),
                        "must not be zero".to_string(),
                    )),
                    Ok(id) => Ok(id),
                    Err(e) => Err(ConfigError::InvalidEnvVar(
                        "DISCORD_GUILD_ID".to_string(),
                        e.to_string(),
                    )),
                }
            })
            .transpose()?;

        let ttl_secs: u64 = get_env_or_default("SESSION_TTL_SECS", "900")
            .trim()
            .parse()
            .map_err(|e: std::num::ParseIntError| {
                ConfigError::InvalidEnvVar("SESSION_TTL_SECS".to_string(), e.to_string())
            })?;
        if ttl_secs == 0 {
            return Err(ConfigError::InvalidEnvVar(
                "SESSION_TTL_SECS".to_string(),
                "must be positive".to_string(),
            ));
        }

        Ok(Self {
            discord_token,
            guild_id,
            api_base_url,
            service_jwt_secret: SecretString::from(secret),
            service_name: get_env_or_default("BOT_SERVICE_NAME", "discord-bot"),
            session_ttl: Duration::from_secs(ttl_secs),
            log_json: get_env_or_default("LOG_FORMAT", "text").eq_ignore_ascii_case("json"),
        })
    }
}

/// Parse the backend base URL; only http(s) is accepted.
fn parse_base_url(raw: &str) -> Result<Url, ConfigError> {
    let url = Url::parse(raw.trim())
        .map_err(|e| ConfigError::InvalidEnvVar("API_BASE_URL".to_string(), e.to_string()))?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(ConfigError::InvalidEnvVar(
            "API_BASE_URL".to_string(),
            format!("unsupported scheme '{other}'"),
        )),
    }
}

fn get_required_env(key: &str) -> Result<String, ConfigError> {
    std::env::var(key).map_err(|_| ConfigError::MissingEnvVar(key.to_string()))
}

fn get_optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn get_env_or_default(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_base_url() {
        let url = parse_base_url(" https://api.example.com/ ").unwrap();
        assert_eq!(url.host_str(), Some("api.example.com"));

        assert!(parse_base_url("ftp://api.example.com").is_err());
        assert!(parse_base_url("not a url").is_err());
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let config = BotConfig {
            discord_token: SecretString::from("discord-token-value"),
            guild_id: None,
            api_base_url: Url::parse("http://127.0.0.1:4000").unwrap(),
            service_jwt_secret: SecretString::from("jwt-secret-value"),
            service_name: "discord-bot".to_string(),
            session_ttl: Duration::from_secs(900),
            log_json: false,
        };
        let debug = format!("{config:?}");
        assert!(!debug.contains("discord-token-value"));
        assert!(!debug.contains("jwt-secret-value"));
        assert!(debug.contains("[REDACTED]"));
    }
}
