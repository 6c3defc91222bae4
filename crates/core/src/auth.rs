//! Service-to-service JWTs.
//!
//! The Discord bot and the CLI mint short-lived HS256 tokens with the shared
//! `SERVICE_JWT_SECRET`; the API verifies them on every write and on every
//! payment route.

use chrono::Utc;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

/// Role carried by tokens that may call service routes.
pub const SERVICE_ROLE: &str = "service";

/// Errors from issuing or verifying a service token.
#[derive(thiserror::Error, Debug)]
pub enum TokenError {
    /// Signature, expiry or format check failed.
    #[error("invalid token: {0}")]
    Invalid(#[from] jsonwebtoken::errors::Error),

    /// Token is valid but not for a service caller.
    #[error("token role '{0}' is not allowed")]
    WrongRole(String),

    /// Requested lifetime is not positive.
    #[error("token lifetime must be positive")]
    BadLifetime,
}

/// Claims of a service token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceClaims {
    /// Calling service (e.g. `discord-bot`).
    pub sub: String,
    /// Must be [`SERVICE_ROLE`].
    pub role: String,
    /// Issued at (unix seconds).
    pub iat: i64,
    /// Expires at (unix seconds).
    pub exp: i64,
}

/// Issues and verifies service tokens with one shared secret.
#[derive(Clone)]
pub struct ServiceTokens {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
}

impl std::fmt::Debug for ServiceTokens {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceTokens").finish_non_exhaustive()
    }
}

impl ServiceTokens {
    /// Create from the raw shared secret.
    #[must_use]
    pub fn new(secret: &[u8]) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_required_spec_claims(&["exp", "sub"]);
        Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            validation,
        }
    }

    /// Mint a service token for `subject` valid for `ttl_secs`.
    ///
    /// # Errors
    ///
    /// Returns `TokenError::BadLifetime` for a non-positive lifetime and
    /// `TokenError::Invalid` if encoding fails.
    pub fn issue(&self, subject: &str, ttl_secs: i64) -> Result<(String, ServiceClaims), TokenError> {
        if ttl_secs <= 0 {
            return Err(TokenError::BadLifetime);
        }
        let now = Utc::now().timestamp();
        let claims = ServiceClaims {
            sub: subject.to_owned(),
            role: SERVICE_ROLE.to_owned(),
            iat: now,
            exp: now + ttl_secs,
        };
        let token = jsonwebtoken::encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)?;
        Ok((token, claims))
    }

    /// Verify signature and expiry and return the claims.
    ///
    /// The role is not checked here; see [`ServiceTokens::verify_service`].
    ///
    /// # Errors
    ///
    /// Returns `TokenError::Invalid` if the token is malformed, expired or
    /// signed with another secret.
    pub fn verify(&self, token: &str) -> Result<ServiceClaims, TokenError> {
        let data = jsonwebtoken::decode::<ServiceClaims>(token, &self.decoding_key, &self.validation)?;
        Ok(data.claims)
    }

    /// Verify the token and require the service role.
    ///
    /// # Errors
    ///
    /// Returns `TokenError::WrongRole` for a valid token with another role,
    /// and the errors of [`ServiceTokens::verify`] otherwise.
    pub fn verify_service(&self, token: &str) -> Result<ServiceClaims, TokenError> {
        let claims = self.verify(token)?;
        if claims.role != SERVICE_ROLE {
            return Err(TokenError::WrongRole(claims.role));
        }
        Ok(claims)
    }

    /// Sign arbitrary claims. Used to build tokens with a non-service role.
    ///
    /// # Errors
    ///
    /// Returns `TokenError::Invalid` if encoding fails.
    pub fn sign(&self, claims: &ServiceClaims) -> Result<String, TokenError> {
        Ok(jsonwebtoken::encode(
            &Header::new(Algorithm::HS256),
            claims,
            &self.encoding_key,
        )?)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    const SECRET: &[u8] = b"test-service-secret-with-enough-entropy";

    #[test]
    fn test_issue_and_verify() {
        let tokens = ServiceTokens::new(SECRET);
        let (token, issued) = tokens.issue("discord-bot", 300).unwrap();
        let claims = tokens.verify_service(&token).unwrap();
        assert_eq!(claims, issued);
        assert_eq!(claims.role, SERVICE_ROLE);
        assert_eq!(claims.exp - claims.iat, 300);
    }

    #[test]
    fn test_other_secret_rejected() {
        let (token, _) = ServiceTokens::new(SECRET).issue("discord-bot", 300).unwrap();
        let other = ServiceTokens::new(b"a-completely-different-secret-value");
        assert!(matches!(other.verify(&token), Err(TokenError::Invalid(_))));
    }

    #[test]
    fn test_expired_rejected() {
        let tokens = ServiceTokens::new(SECRET);
        let now = Utc::now().timestamp();
        let token = tokens
            .sign(&ServiceClaims {
                sub: "discord-bot".into(),
                role: SERVICE_ROLE.into(),
                iat: now - 7200,
                exp: now - 3600,
            })
            .unwrap();
        assert!(matches!(tokens.verify(&token), Err(TokenError::Invalid(_))));
    }

    #[test]
    fn test_wrong_role_rejected() {
        let tokens = ServiceTokens::new(SECRET);
        let now = Utc::now().timestamp();
        let token = tokens
            .sign(&ServiceClaims {
                sub: "someone".into(),
                role: "user".into(),
                iat: now,
                exp: now + 60,
            })
            .unwrap();
        assert!(tokens.verify(&token).is_ok());
        assert!(matches!(
            tokens.verify_service(&token),
            Err(TokenError::WrongRole(role)) if role == "user"
        ));
    }

    #[test]
    fn test_non_positive_lifetime() {
        let tokens = ServiceTokens::new(SECRET);
        assert!(matches!(tokens.issue("x", 0), Err(TokenError::BadLifetime)));
    }
}
