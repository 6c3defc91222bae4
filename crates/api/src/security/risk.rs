//! Request-time fraud heuristics.
//!
//! Scoring is pure: [`score`] takes the request context plus a velocity
//! snapshot read from the ledgers and returns the signals that fired. The
//! total is capped at 100 and mapped to a [`RiskLevel`] and a
//! [`RiskDecision`].

use std::net::IpAddr;

use chrono::{DateTime, Timelike, Utc};
use rust_decimal::Decimal;
use serde::Serialize;

use shopbot_core::{DiscordId, Money, RiskLevel};

use crate::config::RiskConfig;

/// Highest possible score.
pub const MAX_SCORE: u32 = 100;

/// User-agent fragments that indicate scripted clients.
const AUTOMATION_PATTERNS: &[&str] = &[
    "curl",
    "wget",
    "python-",
    "httpclient",
    "postman",
    "headless",
    "selenium",
    "puppeteer",
    "bot",
    "spider",
];

/// Everything known about a payment attempt when it is scored.
#[derive(Debug, Clone)]
pub struct RiskContext {
    pub user: DiscordId,
    pub ip: Option<IpAddr>,
    pub user_agent: Option<String>,
    pub device_id: Option<String>,
    /// Amount being paid, when known.
    pub amount: Option<Money>,
    pub at: DateTime<Utc>,
}

/// Recent activity counts for the context's keys.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Velocity {
    pub user_last_10m: usize,
    pub user_last_hour: usize,
    pub ip_last_hour: usize,
    pub device_users_last_day: usize,
}

/// A heuristic that contributed to a score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskSignal {
    /// More than 3 attempts by the user in 10 minutes.
    UserBurst,
    /// More than 10 attempts by the user in an hour.
    UserHourlyVolume,
    /// More than 20 attempts from one IP in an hour.
    IpHourlyVolume,
    /// Amount at least 1000.
    LargeAmount,
    /// Amount at least 5000.
    VeryLargeAmount,
    /// Suspiciously round amount (multiple of 100, at least 500).
    RoundAmount,
    /// No user agent.
    MissingUserAgent,
    /// User agent matches a scripting tool.
    AutomatedClient,
    /// No device fingerprint.
    MissingDevice,
    /// Device used by more than 3 users in a day.
    SharedDevice,
    /// Between 00:00 and 05:59 UTC.
    NightHours,
}

impl RiskSignal {
    /// Points this signal adds.
    #[must_use]
    pub const fn weight(self) -> u32 {
        match self {
            Self::UserBurst | Self::IpHourlyVolume | Self::SharedDevice => 25,
            Self::UserHourlyVolume => 40,
            Self::LargeAmount => 15,
            Self::VeryLargeAmount | Self::AutomatedClient => 30,
            Self::RoundAmount | Self::NightHours => 10,
            Self::MissingUserAgent => 20,
            Self::MissingDevice => 5,
        }
    }
}

/// What to do with a scored attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskDecision {
    Allow,
    Review,
    Block,
}

impl RiskDecision {
    /// Decision for `score` under `config`'s thresholds.
    #[must_use]
    pub const fn for_score(score: u32, config: &RiskConfig) -> Self {
        if score >= config.block_threshold {
            Self::Block
        } else if score >= config.review_threshold {
            Self::Review
        } else {
            Self::Allow
        }
    }
}

/// Result of scoring one attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RiskAssessment {
    pub score: u32,
    pub level: RiskLevel,
    pub decision: RiskDecision,
    pub signals: Vec<RiskSignal>,
}

impl RiskAssessment {
    /// Build from fired signals.
    #[must_use]
    pub fn from_signals(signals: Vec<RiskSignal>, config: &RiskConfig) -> Self {
        let score = signals
            .iter()
            .map(|s| s.weight())
            .sum::<u32>()
            .min(MAX_SCORE);
        Self {
            score,
            level: RiskLevel::from_score(score),
            decision: RiskDecision::for_score(score, config),
            signals,
        }
    }

    /// Whether the attempt must be rejected.
    #[must_use]
    pub fn is_blocked(&self) -> bool {
        self.decision == RiskDecision::Block
    }
}

/// Evaluate every heuristic for `ctx`.
#[must_use]
pub fn score(ctx: &RiskContext, velocity: &Velocity) -> Vec<RiskSignal> {
    let mut signals = Vec::new();

    // Velocity: only the stronger user signal counts
    if velocity.user_last_hour > 10 {
        signals.push(RiskSignal::UserHourlyVolume);
    } else if velocity.user_last_10m > 3 {
        signals.push(RiskSignal::UserBurst);
    }
    if velocity.ip_last_hour > 20 {
        signals.push(RiskSignal::IpHourlyVolume);
    }

    if let Some(money) = &ctx.amount {
        signals.extend(amount_signals(money.amount));
    }

    match ctx.user_agent.as_deref().map(str::trim) {
        None | Some("") => signals.push(RiskSignal::MissingUserAgent),
        Some(ua) if is_automated(ua) => signals.push(RiskSignal::AutomatedClient),
        Some(_) => {}
    }

    match ctx.device_id.as_deref().map(str::trim) {
        None | Some("") => signals.push(RiskSignal::MissingDevice),
        Some(_) if velocity.device_users_last_day > 3 => signals.push(RiskSignal::SharedDevice),
        Some(_) => {}
    }

    if ctx.at.hour() < 6 {
        signals.push(RiskSignal::NightHours);
    }

    signals
}

fn amount_signals(amount: Decimal) -> Vec<RiskSignal> {
    let mut signals = Vec::new();
    if amount >= Decimal::from(5000) {
        signals.push(RiskSignal::VeryLargeAmount);
    } else if amount >= Decimal::from(1000) {
        signals.push(RiskSignal::LargeAmount);
    }
    if amount >= Decimal::from(500) && (amount % Decimal::from(100)).is_zero() {
        signals.push(RiskSignal::RoundAmount);
    }
    signals
}

fn is_automated(user_agent: &str) -> bool {
    let ua = user_agent.to_ascii_lowercase();
    AUTOMATION_PATTERNS.iter().any(|p| ua.contains(p))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::TimeZone;
    use shopbot_core::Currency;

    use super::*;

    const BROWSER: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36";

    fn midday() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 5, 4, 14, 0, 0).single().unwrap()
    }

    fn clean_context() -> RiskContext {
        RiskContext {
            user: DiscordId::from_u64(80_351_110_224_678_912),
            ip: "203.0.113.7".parse().ok(),
            user_agent: Some(BROWSER.to_string()),
            device_id: Some("dev-1".to_string()),
            amount: Some(Money::parse("19.99", Currency::Usdt).unwrap()),
            at: midday(),
        }
    }

    #[test]
    fn test_clean_request_scores_zero() {
        let signals = score(&clean_context(), &Velocity::default());
        assert!(signals.is_empty());
        let assessment = RiskAssessment::from_signals(signals, &RiskConfig::default());
        assert_eq!(assessment.score, 0);
        assert_eq!(assessment.level, RiskLevel::Low);
        assert_eq!(assessment.decision, RiskDecision::Allow);
    }

    #[test]
    fn test_user_velocity_takes_highest_only() {
        let velocity = Velocity {
            user_last_10m: 5,
            user_last_hour: 12,
            ..Velocity::default()
        };
        assert_eq!(
            score(&clean_context(), &velocity),
            vec![RiskSignal::UserHourlyVolume]
        );

        let velocity = Velocity {
            user_last_10m: 4,
            user_last_hour: 4,
            ..Velocity::default()
        };
        assert_eq!(score(&clean_context(), &velocity), vec![RiskSignal::UserBurst]);

        // Exactly at the threshold does not fire
        let velocity = Velocity {
            user_last_10m: 3,
            user_last_hour: 10,
            ip_last_hour: 20,
            ..Velocity::default()
        };
        assert!(score(&clean_context(), &velocity).is_empty());
    }

    #[test]
    fn test_amount_heuristics() {
        assert!(amount_signals(Decimal::from(999)).is_empty());
        assert_eq!(
            amount_signals(Decimal::from(1000)),
            vec![RiskSignal::LargeAmount, RiskSignal::RoundAmount]
        );
        assert_eq!(
            amount_signals(Decimal::new(500_001, 2)),
            vec![RiskSignal::VeryLargeAmount]
        );
        assert_eq!(amount_signals(Decimal::from(500)), vec![RiskSignal::RoundAmount]);
        assert!(amount_signals(Decimal::from(400)).is_empty());
    }

    #[test]
    fn test_user_agent_heuristics() {
        let mut ctx = clean_context();
        ctx.user_agent = None;
        assert_eq!(score(&ctx, &Velocity::default()), vec![RiskSignal::MissingUserAgent]);

        ctx.user_agent = Some("python-requests/2.31".to_string());
        assert_eq!(score(&ctx, &Velocity::default()), vec![RiskSignal::AutomatedClient]);

        ctx.user_agent = Some("Mozilla/5.0 HeadlessChrome/120".to_string());
        assert_eq!(score(&ctx, &Velocity::default()), vec![RiskSignal::AutomatedClient]);
    }

    #[test]
    fn test_device_heuristics() {
        let mut ctx = clean_context();
        ctx.device_id = None;
        assert_eq!(score(&ctx, &Velocity::default()), vec![RiskSignal::MissingDevice]);

        let shared = Velocity {
            device_users_last_day: 4,
            ..Velocity::default()
        };
        assert_eq!(
            score(&clean_context(), &shared),
            vec![RiskSignal::SharedDevice]
        );
    }

    #[test]
    fn test_night_hours() {
        let mut ctx = clean_context();
        ctx.at = Utc.with_ymd_and_hms(2026, 5, 4, 5, 59, 0).single().unwrap();
        assert_eq!(score(&ctx, &Velocity::default()), vec![RiskSignal::NightHours]);
        ctx.at = Utc.with_ymd_and_hms(2026, 5, 4, 6, 0, 0).single().unwrap();
        assert!(score(&ctx, &Velocity::default()).is_empty());
    }

    #[test]
    fn test_score_capped_and_blocked() {
        let ctx = RiskContext {
            user_agent: Some("curl/8.0".to_string()),
            device_id: None,
            amount: Some(Money::parse("5000", Currency::Usdt).unwrap()),
            at: Utc.with_ymd_and_hms(2026, 5, 4, 3, 0, 0).single().unwrap(),
            ..clean_context()
        };
        let velocity = Velocity {
            user_last_hour: 11,
            ip_last_hour: 21,
            ..Velocity::default()
        };
        let assessment =
            RiskAssessment::from_signals(score(&ctx, &velocity), &RiskConfig::default());
        assert_eq!(assessment.score, MAX_SCORE);
        assert_eq!(assessment.level, RiskLevel::Critical);
        assert!(assessment.is_blocked());
    }

    #[test]
    fn test_decision_thresholds() {
        let config = RiskConfig::default();
        assert_eq!(RiskDecision::for_score(49, &config), RiskDecision::Allow);
        assert_eq!(RiskDecision::for_score(50, &config), RiskDecision::Review);
        assert_eq!(RiskDecision::for_score(79, &config), RiskDecision::Review);
        assert_eq!(RiskDecision::for_score(80, &config), RiskDecision::Block);
    }
}
