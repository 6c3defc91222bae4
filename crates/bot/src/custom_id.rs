//! Component custom IDs.
//!
//! Discord echoes a component's `custom_id` back on every click, so the ID
//! carries everything needed to route the interaction:
//!
//! ```text
//! shop:cat               category select menu (value = category id)
//! shop:prod              product select menu (value = product id)
//! shop:buy:{product}     "Buy" button on a product
//! shop:confirm:{product} "Confirm" button on the order summary
//! shop:cancel            abandon the flow (and a pending order)
//! shop:status:{order}    refresh an order's payment status
//! shop:back              one step back
//! ```

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

use shopbot_core::{OrderId, ProductId};

const PREFIX: &str = "shop";

/// Errors from parsing a custom ID.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CustomIdError {
    #[error("custom id '{0}' does not belong to the shop")]
    UnknownPrefix(String),
    #[error("unknown shop action '{0}'")]
    UnknownAction(String),
    #[error("malformed custom id '{0}'")]
    Malformed(String),
}

/// What a component interaction asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CustomId {
    CategorySelect,
    ProductSelect,
    Buy(ProductId),
    Confirm(ProductId),
    Cancel,
    Status(OrderId),
    Back,
}

impl fmt::Display for CustomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CategorySelect => write!(f, "{PREFIX}:cat"),
            Self::ProductSelect => write!(f, "{PREFIX}:prod"),
            Self::Buy(id) => write!(f, "{PREFIX}:buy:{id}"),
            Self::Confirm(id) => write!(f, "{PREFIX}:confirm:{id}"),
            Self::Cancel => write!(f, "{PREFIX}:cancel"),
            Self::Status(id) => write!(f, "{PREFIX}:status:{id}"),
            Self::Back => write!(f, "{PREFIX}:back"),
        }
    }
}

impl FromStr for CustomId {
    type Err = CustomIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.split(':');
        if parts.next() != Some(PREFIX) {
            return Err(CustomIdError::UnknownPrefix(s.to_string()));
        }
        let action = parts
            .next()
            .ok_or_else(|| CustomIdError::Malformed(s.to_string()))?;
        let arg = parts.next();
        if parts.next().is_some() {
            return Err(CustomIdError::Malformed(s.to_string()));
        }

        let malformed = || CustomIdError::Malformed(s.to_string());
        let id = match (action, arg) {
            ("cat", None) => Self::CategorySelect,
            ("prod", None) => Self::ProductSelect,
            ("cancel", None) => Self::Cancel,
            ("back", None) => Self::Back,
            ("buy", Some(arg)) => Self::Buy(arg.parse().map_err(|_| malformed())?),
            ("confirm", Some(arg)) => Self::Confirm(arg.parse().map_err(|_| malformed())?),
            ("status", Some(arg)) => Self::Status(arg.parse().map_err(|_| malformed())?),
            ("cat" | "prod" | "cancel" | "back" | "buy" | "confirm" | "status", _) => {
                return Err(malformed());
            }
            (other, _) => return Err(CustomIdError::UnknownAction(other.to_string())),
        };
        Ok(id)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_format_and_parse() {
        let order = OrderId::generate();
        let ids = [
            CustomId::CategorySelect,
            CustomId::ProductSelect,
            CustomId::Buy(ProductId::new(12)),
            CustomId::Confirm(ProductId::new(12)),
            CustomId::Cancel,
            CustomId::Status(order),
            CustomId::Back,
        ];
        for id in ids {
            assert_eq!(id.to_string().parse::<CustomId>().unwrap(), id);
        }
        assert_eq!(CustomId::Buy(ProductId::new(3)).to_string(), "shop:buy:3");
    }

    #[test]
    fn test_rejects_foreign_prefix() {
        assert_eq!(
            "poll:vote:1".parse::<CustomId>(),
            Err(CustomIdError::UnknownPrefix("poll:vote:1".to_string()))
        );
    }

    #[test]
    fn test_rejects_unknown_action() {
        assert_eq!(
            "shop:refund:1".parse::<CustomId>(),
            Err(CustomIdError::UnknownAction("refund".to_string()))
        );
    }

    #[test]
    fn test_rejects_malformed() {
        for raw in ["shop", "shop:buy", "shop:buy:abc", "shop:cat:1", "shop:back:1:2"] {
            assert!(
                matches!(raw.parse::<CustomId>(), Err(CustomIdError::Malformed(_))),
                "{raw} should be malformed"
            );
        }
    }
}
