//! Typed client for the Shopbot backend.
//!
//! Every call carries a short-lived service JWT. Tokens are minted locally
//! with the shared secret and reused until shortly before they expire.
//! Order creation also sends an `x-device-id` header so the backend's risk
//! screen can tell Discord users apart.

mod error;
mod types;

use std::sync::{Mutex, PoisonError};

use chrono::Utc;
use reqwest::{Client, RequestBuilder, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use tracing::{debug, instrument, warn};
use url::Url;

use shopbot_core::auth::{ServiceTokens, TokenError};
use shopbot_core::{
    ApiResponse, Category, CategoryId, DiscordId, OrderId, Paginated, PaymentOrder, Product,
    ProductId,
};

pub use error::ApiClientError;
pub use types::{OrderCreated, SubscriptionView};
use types::{CancelOrderBody, CreateOrderBody};

/// User agent sent on every request.
pub const USER_AGENT: &str = "DiscordShop/0.1";

/// Header the backend reads the device fingerprint from.
pub const DEVICE_ID_HEADER: &str = "x-device-id";

/// Lifetime of minted service tokens.
const TOKEN_TTL_SECS: i64 = 600;

/// Tokens are replaced this long before they expire.
const TOKEN_REFRESH_MARGIN_SECS: i64 = 60;

/// Page size used for listings shown in Discord (select menus cap at 25).
pub const LIST_LIMIT: u32 = 25;

/// Mints service tokens and hands out the cached one while it is fresh.
pub struct TokenCache {
    tokens: ServiceTokens,
    subject: String,
    current: Mutex<Option<(String, i64)>>,
}

impl TokenCache {
    /// Create a cache minting tokens for `subject`.
    #[must_use]
    pub fn new(secret: &SecretString, subject: impl Into<String>) -> Self {
        Self {
            tokens: ServiceTokens::new(secret.expose_secret().as_bytes()),
            subject: subject.into(),
            current: Mutex::new(None),
        }
    }

    /// Bearer token valid at `now` (unix seconds).
    ///
    /// # Errors
    ///
    /// Returns `TokenError` if minting a replacement fails.
    pub fn bearer(&self, now: i64) -> Result<String, TokenError> {
        let mut current = self.current.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some((token, exp)) = current.as_ref()
            && now < exp - TOKEN_REFRESH_MARGIN_SECS
        {
            return Ok(token.clone());
        }

        let (token, claims) = self.tokens.issue(&self.subject, TOKEN_TTL_SECS)?;
        debug!(exp = claims.exp, "Minted service token");
        *current = Some((token.clone(), claims.exp));
        Ok(token)
    }
}

impl std::fmt::Debug for TokenCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenCache")
            .field("subject", &self.subject)
            .finish_non_exhaustive()
    }
}

/// Unwrap an API envelope.
///
/// Non-JSON bodies (e.g. a plain-text 429 from the rate limiter) are
/// reported with an `HTTP_<status>` code.
///
/// # Errors
///
/// Returns `ApiClientError::Api` for error envelopes and failed statuses,
/// and `ApiClientError::Response` for a success status with an unreadable body.
pub fn decode_envelope<T: DeserializeOwned>(
    status: StatusCode,
    body: &[u8],
) -> Result<T, ApiClientError> {
    match serde_json::from_slice::<ApiResponse<T>>(body) {
        Ok(envelope) => envelope
            .into_result()
            .map_err(|error| ApiClientError::Api {
                status: status.as_u16(),
                code: error.code,
                message: error.message,
            }),
        Err(e) if status.is_success() => Err(ApiClientError::Response(e.to_string())),
        Err(_) => Err(ApiClientError::Api {
            status: status.as_u16(),
            code: format!("HTTP_{}", status.as_u16()),
            message: String::from_utf8_lossy(body).chars().take(200).collect(),
        }),
    }
}

/// Backend API client.
#[derive(Debug)]
pub struct ApiClient {
    client: Client,
    base: String,
    tokens: TokenCache,
}

impl ApiClient {
    /// Create a client for the API at `base_url`.
    ///
    /// # Errors
    ///
    /// Returns `ApiClientError::Request` if the HTTP client cannot be built.
    pub fn new(base_url: &Url, tokens: TokenCache) -> Result<Self, ApiClientError> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(std::time::Duration::from_secs(10))
            .build()
            .map_err(|e| ApiClientError::Request(e.to_string()))?;
        Ok(Self {
            client,
            base: base_url.as_str().trim_end_matches('/').to_string(),
            tokens,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/api{path}", self.base)
    }

    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, ApiClientError> {
        let token = self.tokens.bearer(Utc::now().timestamp())?;
        let response = request
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| ApiClientError::Request(e.to_string()))?;

        let status = response.status();
        let body = response
            .bytes()
            .await
            .map_err(|e| ApiClientError::Response(e.to_string()))?;

        let result = decode_envelope(status, &body);
        if let Err(ApiClientError::Api { status, code, .. }) = &result
            && *status >= 500
        {
            warn!(status, code = %code, "API server error");
        }
        result
    }

    /// Categories of a guild, in display order.
    ///
    /// # Errors
    ///
    /// Returns `ApiClientError` on transport or API failure.
    #[instrument(skip(self))]
    pub async fn list_categories(&self, guild: &DiscordId) -> Result<Vec<Category>, ApiClientError> {
        let request = self
            .client
            .get(self.url("/categories"))
            .query(&[("guild_id", guild.as_str())]);
        self.send(request).await
    }

    /// First page of a guild's active products, optionally in one category.
    ///
    /// # Errors
    ///
    /// Returns `ApiClientError` on transport or API failure.
    #[instrument(skip(self))]
    pub async fn list_products(
        &self,
        guild: &DiscordId,
        category: Option<CategoryId>,
    ) -> Result<Paginated<Product>, ApiClientError> {
        let mut query = vec![
            ("guild_id", guild.to_string()),
            ("limit", LIST_LIMIT.to_string()),
        ];
        if let Some(category) = category {
            query.push(("category_id", category.to_string()));
        }
        let request = self.client.get(self.url("/products")).query(&query);
        self.send(request).await
    }

    /// One product.
    ///
    /// # Errors
    ///
    /// Returns `ApiClientError` on transport or API failure.
    #[instrument(skip(self))]
    pub async fn get_product(&self, id: ProductId) -> Result<Product, ApiClientError> {
        self.send(self.client.get(self.url(&format!("/products/{id}"))))
            .await
    }

    /// Place a payment order for `user`.
    ///
    /// # Errors
    ///
    /// Returns `ApiClientError` on transport or API failure, including a
    /// `TRANSACTION_BLOCKED` rejection from the risk screen.
    #[instrument(skip(self))]
    pub async fn create_order(
        &self,
        guild: &DiscordId,
        user: &DiscordId,
        product: ProductId,
    ) -> Result<OrderCreated, ApiClientError> {
        let request = self
            .client
            .post(self.url("/payments/orders"))
            .header(DEVICE_ID_HEADER, device_id(user))
            .json(&CreateOrderBody {
                guild_id: guild,
                discord_user_id: user,
                product_id: product,
            });
        self.send(request).await
    }

    /// One of `user`'s orders; orders of other users are refused.
    ///
    /// # Errors
    ///
    /// Returns `ApiClientError` on transport or API failure.
    #[instrument(skip(self))]
    pub async fn get_order(
        &self,
        id: OrderId,
        user: &DiscordId,
    ) -> Result<PaymentOrder, ApiClientError> {
        let request = self
            .client
            .get(self.url(&format!("/payments/orders/{id}")))
            .query(&[("discord_user_id", user.as_str())]);
        self.send(request).await
    }

    /// Cancel one of `user`'s pending orders.
    ///
    /// # Errors
    ///
    /// Returns `ApiClientError` on transport or API failure.
    #[instrument(skip(self))]
    pub async fn cancel_order(
        &self,
        id: OrderId,
        user: &DiscordId,
    ) -> Result<PaymentOrder, ApiClientError> {
        let request = self
            .client
            .post(self.url(&format!("/payments/orders/{id}/cancel")))
            .json(&CancelOrderBody {
                discord_user_id: user,
            });
        self.send(request).await
    }

    /// Most recent orders of `user`.
    ///
    /// # Errors
    ///
    /// Returns `ApiClientError` on transport or API failure.
    #[instrument(skip(self))]
    pub async fn user_orders(
        &self,
        user: &DiscordId,
    ) -> Result<Paginated<PaymentOrder>, ApiClientError> {
        let request = self
            .client
            .get(self.url(&format!("/payments/users/{user}/orders")))
            .query(&[("limit", LIST_LIMIT)]);
        self.send(request).await
    }

    /// Subscriptions of `user`.
    ///
    /// # Errors
    ///
    /// Returns `ApiClientError` on transport or API failure.
    #[instrument(skip(self))]
    pub async fn user_subscriptions(
        &self,
        user: &DiscordId,
    ) -> Result<Vec<SubscriptionView>, ApiClientError> {
        self.send(
            self.client
                .get(self.url(&format!("/payments/users/{user}/subscriptions"))),
        )
        .await
    }
}

/// Device fingerprint for a Discord user.
#[must_use]
pub fn device_id(user: &DiscordId) -> String {
    format!("discord:{user}")
}
