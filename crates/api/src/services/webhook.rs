//! Payment processor webhook signatures.
//!
//! The processor signs `"{timestamp}.{body}"` with HMAC-SHA256 and sends
//! `x-webhook-signature: sha256=<hex>` plus `x-webhook-timestamp: <unix secs>`.
//! Deliveries more than [`MAX_SKEW_SECS`] away from our clock are rejected to
//! stop replays.

use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, SecretString};
use sha2::Sha256;
use thiserror::Error;
use tracing::{debug, instrument};

/// Header carrying the signature.
pub const SIGNATURE_HEADER: &str = "x-webhook-signature";

/// Header carrying the signing timestamp.
pub const TIMESTAMP_HEADER: &str = "x-webhook-timestamp";

/// Allowed clock difference between processor and API.
pub const MAX_SKEW_SECS: i64 = 300;

const SIGNATURE_PREFIX: &str = "sha256=";

/// Errors that can occur when verifying a webhook.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum WebhookError {
    /// A signing header is absent.
    #[error("missing {0} header")]
    MissingHeader(&'static str),

    /// Timestamp is not an integer.
    #[error("invalid timestamp")]
    InvalidTimestamp,

    /// Timestamp is outside the allowed window.
    #[error("request timestamp outside allowed window")]
    Stale,

    /// Signature does not match the body.
    #[error("signature mismatch")]
    Mismatch,

    /// The HMAC could not be keyed.
    #[error("webhook verifier misconfigured")]
    Key,
}

/// Verifies and produces webhook signatures.
#[derive(Clone)]
pub struct WebhookVerifier {
    secret: SecretString,
}

impl std::fmt::Debug for WebhookVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebhookVerifier").finish_non_exhaustive()
    }
}

impl WebhookVerifier {
    /// Create a verifier for the shared secret.
    #[must_use]
    pub const fn new(secret: SecretString) -> Self {
        Self { secret }
    }

    /// Signature header value for `body` signed at `timestamp`.
    ///
    /// # Errors
    ///
    /// Returns [`WebhookError::Key`] if the HMAC cannot be keyed.
    pub fn sign(&self, timestamp: i64, body: &[u8]) -> Result<String, WebhookError> {
        let mut mac = Hmac::<Sha256>::new_from_slice(self.secret.expose_secret().as_bytes())
            .map_err(|_| WebhookError::Key)?;
        mac.update(timestamp.to_string().as_bytes());
        mac.update(b".");
        mac.update(body);
        Ok(format!(
            "{SIGNATURE_PREFIX}{}",
            hex::encode(mac.finalize().into_bytes())
        ))
    }

    /// Verify a delivery against `now`.
    ///
    /// # Errors
    ///
    /// Returns an error if a header is missing, the timestamp is malformed or
    /// stale, or the signature does not match.
    #[instrument(skip(self, body, signature))]
    pub fn verify(
        &self,
        timestamp: Option<&str>,
        signature: Option<&str>,
        body: &[u8],
        now: DateTime<Utc>,
    ) -> Result<(), WebhookError> {
        let timestamp = timestamp.ok_or(WebhookError::MissingHeader(TIMESTAMP_HEADER))?;
        let signature = signature.ok_or(WebhookError::MissingHeader(SIGNATURE_HEADER))?;

        let ts: i64 = timestamp
            .trim()
            .parse()
            .map_err(|_| WebhookError::InvalidTimestamp)?;

        if now.timestamp().abs_diff(ts) > MAX_SKEW_SECS.unsigned_abs() {
            return Err(WebhookError::Stale);
        }

        let expected = self.sign(ts, body)?;
        if !constant_time_compare(&expected, signature.trim()) {
            return Err(WebhookError::Mismatch);
        }

        debug!("Webhook signature verified");
        Ok(())
    }
}

/// Constant-time string comparison to prevent timing attacks.
fn constant_time_compare(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }

    let mut result: u8 = 0;
    for (x, y) in a.bytes().zip(b.bytes()) {
        result |= x ^ y;
    }

    result == 0
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::Duration;

    use super::*;

    const BODY: &[u8] = br#"{"event_id":"evt_1"}"#;

    fn verifier() -> WebhookVerifier {
        WebhookVerifier::new(SecretString::from("whsec-4f9a1c2e8b7d6f3a0e5c9b8a7d6e5f4c".to_string()))
    }

    #[test]
    fn test_constant_time_compare() {
        assert!(constant_time_compare("hello", "hello"));
        assert!(constant_time_compare("", ""));
        assert!(!constant_time_compare("hello", "world"));
        assert!(!constant_time_compare("hello", "hell"));
    }

    #[test]
    fn test_valid_signature() {
        let now = Utc::now();
        let ts = now.timestamp();
        let sig = verifier().sign(ts, BODY).unwrap();
        assert!(sig.starts_with("sha256="));
        assert_eq!(sig.len(), "sha256=".len() + 64);
        assert!(
            verifier()
                .verify(Some(&ts.to_string()), Some(&sig), BODY, now)
                .is_ok()
        );
    }

    #[test]
    fn test_tampered_body_rejected() {
        let now = Utc::now();
        let ts = now.timestamp();
        let sig = verifier().sign(ts, BODY).unwrap();
        assert_eq!(
            verifier().verify(Some(&ts.to_string()), Some(&sig), b"{}", now),
            Err(WebhookError::Mismatch)
        );
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let now = Utc::now();
        let ts = now.timestamp();
        let other = WebhookVerifier::new(SecretString::from("another-secret-value".to_string()));
        let sig = other.sign(ts, BODY).unwrap();
        assert_eq!(
            verifier().verify(Some(&ts.to_string()), Some(&sig), BODY, now),
            Err(WebhookError::Mismatch)
        );
    }

    #[test]
    fn test_stale_timestamp_rejected() {
        let now = Utc::now();
        let old = (now - Duration::seconds(MAX_SKEW_SECS + 1)).timestamp();
        let sig = verifier().sign(old, BODY).unwrap();
        assert_eq!(
            verifier().verify(Some(&old.to_string()), Some(&sig), BODY, now),
            Err(WebhookError::Stale)
        );

        // Edge of the window is still accepted
        let edge = (now - Duration::seconds(MAX_SKEW_SECS)).timestamp();
        let sig = verifier().sign(edge, BODY).unwrap();
        assert!(
            verifier()
                .verify(Some(&edge.to_string()), Some(&sig), BODY, now)
                .is_ok()
        );
    }

    #[test]
    fn test_extreme_timestamps_are_stale() {
        let now = Utc::now();
        for ts in ["-9223372036854775808", "9223372036854775807"] {
            assert_eq!(
                verifier().verify(Some(ts), Some("sha256=00"), BODY, now),
                Err(WebhookError::Stale)
            );
        }
    }

    #[test]
    fn test_missing_and_malformed_headers() {
        let now = Utc::now();
        assert_eq!(
            verifier().verify(None, Some("sha256=00"), BODY, now),
            Err(WebhookError::MissingHeader(TIMESTAMP_HEADER))
        );
        assert_eq!(
            verifier().verify(Some("1"), None, BODY, now),
            Err(WebhookError::MissingHeader(SIGNATURE_HEADER))
        );
        assert_eq!(
            verifier().verify(Some("yesterday"), Some("sha256=00"), BODY, now),
            Err(WebhookError::InvalidTimestamp)
        );
    }
}
