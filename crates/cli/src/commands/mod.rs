//! CLI command implementations.

pub mod migrate;
pub mod seed;
pub mod token;

use secrecy::SecretString;

/// Database URL from `API_DATABASE_URL`, falling back to `DATABASE_URL`.
pub(crate) fn database_url() -> Option<SecretString> {
    std::env::var("API_DATABASE_URL")
        .or_else(|_| std::env::var("DATABASE_URL"))
        .ok()
        .map(SecretString::from)
}
