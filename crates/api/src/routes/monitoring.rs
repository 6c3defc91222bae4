//! Liveness, readiness and runtime statistics.

use axum::{Json, Router, extract::State, http::StatusCode, routing::get};
use serde::Serialize;

use shopbot_core::ApiResponse;

use crate::cache::CacheStats;
use crate::db::OrderRepository;
use crate::db::orders::OrderCounts;
use crate::error::Result;
use crate::security::DecisionStats;
use crate::state::AppState;

/// Monitoring routes, nested under `/api/monitoring`.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        .route("/stats", get(stats))
}

/// Dependency status.
#[derive(Debug, Serialize)]
pub struct HealthReport {
    pub database: bool,
    /// `None` when the cache is disabled.
    pub cache: Option<bool>,
    pub version: &'static str,
}

/// Runtime counters.
#[derive(Debug, Serialize)]
pub struct StatsReport {
    pub cache: CacheStats,
    pub risk: DecisionStats,
    pub orders: OrderCounts,
}

/// Liveness health check endpoint.
///
/// Returns "ok" if the server is running. Does not check dependencies.
pub async fn liveness() -> &'static str {
    "ok"
}

/// `GET /api/monitoring/health`
///
/// 503 when the database is unreachable. A broken cache only degrades
/// performance, so it is reported but never fails the check.
async fn health(State(state): State<AppState>) -> (StatusCode, Json<ApiResponse<HealthReport>>) {
    let database = sqlx::query("SELECT 1").fetch_one(state.pool()).await.is_ok();
    let cache = if state.cache().is_enabled() {
        Some(state.cache().ping().await)
    } else {
        None
    };

    let status = if database {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let report = HealthReport {
        database,
        cache,
        version: env!("CARGO_PKG_VERSION"),
    };
    (status, Json(ApiResponse::ok(report)))
}

/// `GET /api/monitoring/stats`
async fn stats(State(state): State<AppState>) -> Result<Json<ApiResponse<StatsReport>>> {
    let orders = OrderRepository::new(state.pool()).counts().await?;
    Ok(Json(ApiResponse::ok(StatsReport {
        cache: state.cache().stats(),
        risk: state.security().stats(),
        orders,
    })))
}
