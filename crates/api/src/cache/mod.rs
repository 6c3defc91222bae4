//! Response cache backed by Redis, or disabled.
//!
//! Redis is optional. When `REDIS_URL` is unset or the server cannot be
//! reached within [`CONNECT_TIMEOUT`] at startup, the cache runs disabled and
//! every lookup is a miss. Runtime Redis failures are logged and swallowed:
//! a broken cache degrades to pass-through, never to an error response.
//!
//! # Keys
//!
//! `shopbot:cache:v1:{path}?{query}`. Writes invalidate by path prefix with
//! `SCAN MATCH` + `DEL`, so a product write drops every cached product page.

pub mod middleware;

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use redis::aio::ConnectionManager;
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, instrument, warn};

pub use middleware::response_cache_middleware;

/// Namespace prefix for every key this service writes.
pub const KEY_PREFIX: &str = "shopbot:cache:v1:";

/// How long startup waits for Redis before running disabled.
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(2);

/// Keys deleted per `SCAN` round trip during invalidation.
const SCAN_BATCH: usize = 200;

/// Internal cache failures. Never surfaced to clients.
#[derive(Debug, Error)]
pub enum CacheError {
    /// Redis rejected a command or the connection dropped.
    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),

    /// Redis did not answer in time.
    #[error("redis connection timed out")]
    Timeout,
}

#[derive(Clone)]
enum Backend {
    Redis(ConnectionManager),
    Disabled,
}

#[derive(Debug, Default)]
struct Counters {
    hits: AtomicU64,
    misses: AtomicU64,
    errors: AtomicU64,
}

/// Cache counters for monitoring.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub enabled: bool,
    pub hits: u64,
    pub misses: u64,
    pub errors: u64,
}

/// Shared response cache handle. Cheap to clone.
#[derive(Clone)]
pub struct ResponseCache {
    backend: Backend,
    default_ttl: Duration,
    counters: Arc<Counters>,
}

impl ResponseCache {
    /// Connect to Redis, falling back to a disabled cache.
    pub async fn connect(redis_url: Option<&SecretString>, default_ttl: Duration) -> Self {
        let Some(url) = redis_url else {
            info!("REDIS_URL not set, response cache disabled");
            return Self::disabled(default_ttl);
        };

        match open(url).await {
            Ok(manager) => {
                info!("Response cache connected to Redis");
                Self {
                    backend: Backend::Redis(manager),
                    default_ttl,
                    counters: Arc::default(),
                }
            }
            Err(e) => {
                warn!(error = %e, "Redis unavailable, response cache disabled");
                Self::disabled(default_ttl)
            }
        }
    }

    /// A cache that never stores anything.
    #[must_use]
    pub fn disabled(default_ttl: Duration) -> Self {
        Self {
            backend: Backend::Disabled,
            default_ttl,
            counters: Arc::default(),
        }
    }

    /// Whether a Redis backend is configured.
    #[must_use]
    pub const fn is_enabled(&self) -> bool {
        matches!(self.backend, Backend::Redis(_))
    }

    /// TTL applied when callers do not pick one.
    #[must_use]
    pub const fn default_ttl(&self) -> Duration {
        self.default_ttl
    }

    /// Look up a cached value.
    pub async fn get(&self, key: &str) -> Option<Vec<u8>> {
        let Backend::Redis(conn) = &self.backend else {
            return None;
        };

        let mut conn = conn.clone();
        let result: Result<Option<Vec<u8>>, redis::RedisError> = redis::cmd("GET")
            .arg(namespaced(key))
            .query_async(&mut conn)
            .await;

        match result {
            Ok(Some(value)) => {
                self.counters.hits.fetch_add(1, Ordering::Relaxed);
                Some(value)
            }
            Ok(None) => {
                self.counters.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
            Err(e) => {
                self.record_error("GET", &e.into());
                None
            }
        }
    }

    /// Store a value for `ttl`. Failures are logged and ignored.
    pub async fn set(&self, key: &str, value: &[u8], ttl: Duration) {
        let Backend::Redis(conn) = &self.backend else {
            return;
        };

        let mut conn = conn.clone();
        let result: Result<(), redis::RedisError> = redis::cmd("SET")
            .arg(namespaced(key))
            .arg(value)
            .arg("EX")
            .arg(ttl.as_secs().max(1))
            .query_async(&mut conn)
            .await;

        if let Err(e) = result {
            self.record_error("SET", &e.into());
        }
    }

    /// Remaining lifetime of a cached key, if it exists and expires.
    pub async fn ttl(&self, key: &str) -> Option<Duration> {
        let Backend::Redis(conn) = &self.backend else {
            return None;
        };

        let mut conn = conn.clone();
        let result: Result<i64, redis::RedisError> = redis::cmd("TTL")
            .arg(namespaced(key))
            .query_async(&mut conn)
            .await;

        match result {
            // -2: no such key, -1: no expiry
            Ok(secs) => u64::try_from(secs).ok().map(Duration::from_secs),
            Err(e) => {
                self.record_error("TTL", &e.into());
                None
            }
        }
    }

    /// Drop every key under `prefix`. Returns how many were deleted.
    #[instrument(skip(self))]
    pub async fn invalidate_prefix(&self, prefix: &str) -> u64 {
        let Backend::Redis(conn) = &self.backend else {
            return 0;
        };

        match scan_and_delete(conn.clone(), &format!("{}*", namespaced(prefix))).await {
            Ok(deleted) => {
                debug!(deleted, "Cache prefix invalidated");
                deleted
            }
            Err(e) => {
                self.record_error("INVALIDATE", &e);
                0
            }
        }
    }

    /// Current counters.
    #[must_use]
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            enabled: self.is_enabled(),
            hits: self.counters.hits.load(Ordering::Relaxed),
            misses: self.counters.misses.load(Ordering::Relaxed),
            errors: self.counters.errors.load(Ordering::Relaxed),
        }
    }

    /// Round-trip `PING`, for health checks.
    pub async fn ping(&self) -> bool {
        let Backend::Redis(conn) = &self.backend else {
            return false;
        };
        let mut conn = conn.clone();
        let result: Result<String, redis::RedisError> =
            redis::cmd("PING").query_async(&mut conn).await;
        result.is_ok()
    }

    fn record_error(&self, op: &str, e: &CacheError) {
        self.counters.errors.fetch_add(1, Ordering::Relaxed);
        warn!(op, error = %e, "Cache operation failed");
    }
}

fn namespaced(key: &str) -> String {
    format!("{KEY_PREFIX}{key}")
}

async fn open(url: &SecretString) -> Result<ConnectionManager, CacheError> {
    let client = redis::Client::open(url.expose_secret())?;
    tokio::time::timeout(CONNECT_TIMEOUT, ConnectionManager::new(client))
        .await
        .map_err(|_| CacheError::Timeout)?
        .map_err(CacheError::from)
}

async fn scan_and_delete(mut conn: ConnectionManager, pattern: &str) -> Result<u64, CacheError> {
    let mut cursor: u64 = 0;
    let mut deleted = 0;
    loop {
        let (next, keys): (u64, Vec<String>) = redis::cmd("SCAN")
            .arg(cursor)
            .arg("MATCH")
            .arg(pattern)
            .arg("COUNT")
            .arg(SCAN_BATCH)
            .query_async(&mut conn)
            .await?;

        if !keys.is_empty() {
            let removed: u64 = redis::cmd("DEL").arg(&keys).query_async(&mut conn).await?;
            deleted += removed;
        }
        if next == 0 {
            return Ok(deleted);
        }
        cursor = next;
    }
}
