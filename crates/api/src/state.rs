//! Application state shared across handlers.

use std::sync::Arc;

use axum::extract::FromRef;
use sqlx::PgPool;

use shopbot_core::auth::ServiceTokens;

use crate::cache::ResponseCache;
use crate::config::{ApiConfig, secret_bytes};
use crate::security::{CryptoError, TransactionCipher, TransactionSecurity};
use crate::services::{PaymentService, WebhookVerifier};

/// Application state shared across all handlers.
///
/// This struct is cheaply cloneable via `Arc` and provides access to
/// shared resources like database connections and configuration.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: ApiConfig,
    pool: PgPool,
    cache: ResponseCache,
    security: TransactionSecurity,
    tokens: ServiceTokens,
    cipher: TransactionCipher,
    webhooks: WebhookVerifier,
}

impl AppState {
    /// Create a new application state.
    ///
    /// # Arguments
    ///
    /// * `config` - API configuration
    /// * `pool` - `PostgreSQL` connection pool
    /// * `cache` - Response cache (possibly disabled)
    ///
    /// # Errors
    ///
    /// Returns an error if the transaction encryption key cannot be derived.
    pub fn new(config: ApiConfig, pool: PgPool, cache: ResponseCache) -> Result<Self, CryptoError> {
        let cipher = TransactionCipher::new(&config.secrets.encryption_key)?;
        let tokens = ServiceTokens::new(secret_bytes(&config.secrets.service_jwt_secret));
        let webhooks = WebhookVerifier::new(config.secrets.webhook_secret.clone());
        let security = TransactionSecurity::new(config.risk);

        Ok(Self {
            inner: Arc::new(AppStateInner {
                config,
                pool,
                cache,
                security,
                tokens,
                cipher,
                webhooks,
            }),
        })
    }

    /// Get a reference to the API configuration.
    #[must_use]
    pub fn config(&self) -> &ApiConfig {
        &self.inner.config
    }

    /// Get a reference to the database connection pool.
    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.inner.pool
    }

    /// Get a reference to the response cache.
    #[must_use]
    pub fn cache(&self) -> &ResponseCache {
        &self.inner.cache
    }

    /// Get a reference to the risk engine.
    #[must_use]
    pub fn security(&self) -> &TransactionSecurity {
        &self.inner.security
    }

    /// Get a reference to the service token signer/verifier.
    #[must_use]
    pub fn tokens(&self) -> &ServiceTokens {
        &self.inner.tokens
    }

    /// Get a reference to the transaction payload cipher.
    #[must_use]
    pub fn cipher(&self) -> &TransactionCipher {
        &self.inner.cipher
    }

    /// Get a reference to the webhook signature verifier.
    #[must_use]
    pub fn webhooks(&self) -> &WebhookVerifier {
        &self.inner.webhooks
    }

    /// Payment service over this state's components.
    #[must_use]
    pub fn payments(&self) -> PaymentService<'_> {
        PaymentService::new(
            &self.inner.pool,
            &self.inner.config.payments,
            &self.inner.security,
            &self.inner.cipher,
        )
    }
}

impl FromRef<AppState> for ResponseCache {
    fn from_ref(state: &AppState) -> Self {
        state.inner.cache.clone()
    }
}
