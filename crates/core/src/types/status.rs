//! Status enums for payments and risk.

use core::fmt;

use serde::{Deserialize, Serialize};

/// Lifecycle of a payment order.
///
/// ```text
/// Pending ──► Completed
///    │
///    ├──────► Expired
///    ├──────► Failed
///    └──────► Cancelled
/// ```
///
/// Every state other than `Pending` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "payment_status", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    #[default]
    Pending,
    Completed,
    Expired,
    Failed,
    Cancelled,
}

impl PaymentStatus {
    /// Whether no further transitions are allowed.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        !matches!(self, Self::Pending)
    }

    /// Whether moving from `self` to `next` is a legal transition.
    #[must_use]
    pub const fn can_transition_to(&self, next: Self) -> bool {
        matches!(
            (self, next),
            (
                Self::Pending,
                Self::Completed | Self::Expired | Self::Failed | Self::Cancelled
            )
        )
    }

    /// Database / wire representation.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Completed => "completed",
            Self::Expired => "expired",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Coarse risk band derived from a numeric risk score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "risk_level", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
    Critical,
}

impl RiskLevel {
    /// Band for a score in `0..=100`.
    #[must_use]
    pub const fn from_score(score: u32) -> Self {
        match score {
            0..30 => Self::Low,
            30..50 => Self::Medium,
            50..80 => Self::High,
            _ => Self::Critical,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pending_transitions() {
        let pending = PaymentStatus::Pending;
        assert!(pending.can_transition_to(PaymentStatus::Completed));
        assert!(pending.can_transition_to(PaymentStatus::Expired));
        assert!(pending.can_transition_to(PaymentStatus::Failed));
        assert!(pending.can_transition_to(PaymentStatus::Cancelled));
        assert!(!pending.can_transition_to(PaymentStatus::Pending));
    }

    #[test]
    fn test_terminal_states_are_final() {
        for status in [
            PaymentStatus::Completed,
            PaymentStatus::Expired,
            PaymentStatus::Failed,
            PaymentStatus::Cancelled,
        ] {
            assert!(status.is_terminal());
            assert!(!status.can_transition_to(PaymentStatus::Pending));
            assert!(!status.can_transition_to(PaymentStatus::Completed));
        }
        assert!(!PaymentStatus::Pending.is_terminal());
    }

    #[test]
    fn test_risk_level_bands() {
        assert_eq!(RiskLevel::from_score(0), RiskLevel::Low);
        assert_eq!(RiskLevel::from_score(29), RiskLevel::Low);
        assert_eq!(RiskLevel::from_score(30), RiskLevel::Medium);
        assert_eq!(RiskLevel::from_score(50), RiskLevel::High);
        assert_eq!(RiskLevel::from_score(79), RiskLevel::High);
        assert_eq!(RiskLevel::from_score(80), RiskLevel::Critical);
        assert_eq!(RiskLevel::from_score(100), RiskLevel::Critical);
    }

    #[test]
    fn test_status_serde() {
        assert_eq!(
            serde_json::to_string(&PaymentStatus::Cancelled).unwrap_or_default(),
            "\"cancelled\""
        );
    }
}
