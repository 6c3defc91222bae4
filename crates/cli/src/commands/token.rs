//! Service token minting.
//!
//! # Usage
//!
//! ```bash
//! shopbot-cli token --subject ops --ttl 3600
//! ```
//!
//! Prints a bearer token for the API's service routes, signed with
//! `SERVICE_JWT_SECRET`. Handy for curl and for seeding products by hand.

use secrecy::{ExposeSecret, SecretString};
use thiserror::Error;

use shopbot_core::auth::{ServiceTokens, TokenError};

/// Longest lifetime the CLI will mint (one week).
pub const MAX_TTL_SECS: i64 = 7 * 24 * 3600;

/// Errors that can occur while minting.
#[derive(Debug, Error)]
pub enum TokenCommandError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(&'static str),

    #[error("TTL must be between 1 and {MAX_TTL_SECS} seconds")]
    BadTtl,

    #[error("Subject must not be empty")]
    EmptySubject,

    #[error(transparent)]
    Token(#[from] TokenError),
}

/// Mint a token with an explicit secret.
///
/// # Errors
///
/// Returns `TokenCommandError` for an empty subject, an out-of-range TTL,
/// or a signing failure.
pub fn mint_with_secret(
    secret: &SecretString,
    subject: &str,
    ttl_secs: i64,
) -> Result<String, TokenCommandError> {
    if subject.trim().is_empty() {
        return Err(TokenCommandError::EmptySubject);
    }
    if !(1..=MAX_TTL_SECS).contains(&ttl_secs) {
        return Err(TokenCommandError::BadTtl);
    }
    let tokens = ServiceTokens::new(secret.expose_secret().as_bytes());
    let (token, claims) = tokens.issue(subject.trim(), ttl_secs)?;
    tracing::info!(subject = %claims.sub, exp = claims.exp, "Minted service token");
    Ok(token)
}

/// Mint a token with `SERVICE_JWT_SECRET` and print it.
///
/// # Errors
///
/// Returns `TokenCommandError` if the secret is missing or minting fails.
pub fn mint(subject: &str, ttl_secs: i64) -> Result<(), TokenCommandError> {
    dotenvy::dotenv().ok();

    let secret = std::env::var("SERVICE_JWT_SECRET")
        .map(SecretString::from)
        .map_err(|_| TokenCommandError::MissingEnvVar("SERVICE_JWT_SECRET"))?;

    let token = mint_with_secret(&secret, subject, ttl_secs)?;

    #[allow(clippy::print_stdout)]
    {
        println!("{token}");
    }
    Ok(())
}
