//! Transaction security: risk scoring, attempt bookkeeping and payload
//! encryption.
//!
//! # Pipeline
//!
//! 1. [`middleware::transaction_security_middleware`] scores the raw request
//!    before the handler runs and rejects `Block` outright.
//! 2. The order handler re-scores against the product's real price through
//!    [`TransactionSecurity::assess_and_record`].
//! 3. On settlement the processor payload is sealed with
//!    [`crypto::TransactionCipher`].

pub mod crypto;
pub mod ledger;
pub mod middleware;
pub mod risk;

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::Duration;
use serde::Serialize;
use tracing::{info, warn};

pub use crypto::{CryptoError, EncryptedPayload, TransactionCipher};
pub use ledger::AttemptLedger;
pub use risk::{RiskAssessment, RiskContext, RiskDecision, RiskSignal, Velocity};

use crate::config::RiskConfig;

/// Decision counters for monitoring.
#[derive(Debug, Default)]
struct DecisionCounters {
    allowed: AtomicU64,
    reviewed: AtomicU64,
    blocked: AtomicU64,
}

/// Snapshot of [`DecisionCounters`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DecisionStats {
    pub allowed: u64,
    pub reviewed: u64,
    pub blocked: u64,
    pub tracked_users: u64,
}

/// Scores payment attempts and remembers them for velocity checks.
#[derive(Clone)]
pub struct TransactionSecurity {
    config: RiskConfig,
    ledger: AttemptLedger,
    counters: Arc<DecisionCounters>,
}

impl TransactionSecurity {
    /// Create an engine with empty ledgers.
    #[must_use]
    pub fn new(config: RiskConfig) -> Self {
        Self {
            config,
            ledger: AttemptLedger::new(),
            counters: Arc::new(DecisionCounters::default()),
        }
    }

    /// Score `ctx` without recording it.
    #[must_use]
    pub fn assess(&self, ctx: &RiskContext) -> RiskAssessment {
        let velocity = self.velocity(ctx);
        RiskAssessment::from_signals(risk::score(ctx, &velocity), &self.config)
    }

    /// Score `ctx`, then record the attempt and count the decision.
    ///
    /// The attempt is recorded whatever the outcome, so blocked retries keep
    /// raising the caller's velocity.
    pub fn assess_and_record(&self, ctx: &RiskContext) -> RiskAssessment {
        let assessment = self.assess(ctx);
        self.record(ctx, &assessment);
        assessment
    }

    /// Record an attempt that was scored earlier.
    pub fn record(&self, ctx: &RiskContext, assessment: &RiskAssessment) {
        let user = ctx.user.as_str();
        self.ledger.users.record(user, ctx.at, None);
        if let Some(ip) = ctx.ip {
            self.ledger.ips.record(&ip.to_string(), ctx.at, None);
        }
        if let Some(device) = ctx.device_id.as_deref().filter(|d| !d.trim().is_empty()) {
            self.ledger.devices.record(device, ctx.at, Some(user));
        }

        let counter = match assessment.decision {
            RiskDecision::Allow => &self.counters.allowed,
            RiskDecision::Review => &self.counters.reviewed,
            RiskDecision::Block => &self.counters.blocked,
        };
        counter.fetch_add(1, Ordering::Relaxed);

        match assessment.decision {
            RiskDecision::Allow => {}
            RiskDecision::Review => info!(
                user = %ctx.user,
                score = assessment.score,
                signals = ?assessment.signals,
                "Payment attempt flagged for review"
            ),
            RiskDecision::Block => warn!(
                user = %ctx.user,
                score = assessment.score,
                signals = ?assessment.signals,
                "Payment attempt blocked"
            ),
        }
    }

    /// Decision counters.
    #[must_use]
    pub fn stats(&self) -> DecisionStats {
        DecisionStats {
            allowed: self.counters.allowed.load(Ordering::Relaxed),
            reviewed: self.counters.reviewed.load(Ordering::Relaxed),
            blocked: self.counters.blocked.load(Ordering::Relaxed),
            tracked_users: self.ledger.users.tracked_keys(),
        }
    }

    /// Configured thresholds.
    #[must_use]
    pub const fn config(&self) -> &RiskConfig {
        &self.config
    }

    fn velocity(&self, ctx: &RiskContext) -> Velocity {
        let user = ctx.user.as_str();
        let hour_ago = ctx.at - Duration::hours(1);
        Velocity {
            user_last_10m: self
                .ledger
                .users
                .count_since(user, ctx.at - Duration::minutes(10)),
            user_last_hour: self.ledger.users.count_since(user, hour_ago),
            ip_last_hour: ctx.ip.map_or(0, |ip| {
                self.ledger.ips.count_since(&ip.to_string(), hour_ago)
            }),
            device_users_last_day: ctx.device_id.as_deref().map_or(0, |device| {
                self.ledger
                    .devices
                    .distinct_subjects_since(device, ctx.at - Duration::hours(24))
            }),
        }
    }
}
