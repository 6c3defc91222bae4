//! Type-safe money representation using decimal arithmetic.
//!
//! Every amount in the system is paired with a [`Currency`]; the currency
//! decides how many fractional digits an amount may carry.

use core::fmt;
use core::str::FromStr;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Errors that can occur when constructing [`Money`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum MoneyError {
    /// Amount is zero or negative.
    #[error("amount must be greater than zero")]
    NotPositive,
    /// Amount has more fractional digits than the currency supports.
    #[error("{currency} supports at most {max} decimal places")]
    TooPrecise {
        /// Currency the amount was parsed for.
        currency: Currency,
        /// Maximum allowed fractional digits.
        max: u32,
    },
    /// Amount exceeds the configured ceiling.
    #[error("amount must not exceed {max}")]
    TooLarge {
        /// Maximum allowed amount.
        max: Decimal,
    },
    /// Input is not a decimal number.
    #[error("invalid amount: {0}")]
    Invalid(String),
    /// Unknown currency code.
    #[error("unsupported currency: {0}")]
    UnknownCurrency(String),
}

/// Cryptocurrencies accepted for payment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "currency_code", rename_all = "UPPERCASE")
)]
#[serde(rename_all = "UPPERCASE")]
pub enum Currency {
    #[default]
    Usdt,
    Usdc,
    Btc,
    Eth,
    Ltc,
}

impl Currency {
    /// All supported currencies, in display order.
    pub const ALL: [Self; 5] = [Self::Usdt, Self::Usdc, Self::Btc, Self::Eth, Self::Ltc];

    /// Ticker code (e.g. `USDT`).
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::Usdt => "USDT",
            Self::Usdc => "USDC",
            Self::Btc => "BTC",
            Self::Eth => "ETH",
            Self::Ltc => "LTC",
        }
    }

    /// Maximum fractional digits accepted for prices in this currency.
    #[must_use]
    pub const fn decimals(&self) -> u32 {
        match self {
            Self::Usdt | Self::Usdc => 2,
            Self::Btc | Self::Ltc => 8,
            Self::Eth => 9,
        }
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for Currency {
    type Err = MoneyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|c| c.code().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| MoneyError::UnknownCurrency(s.to_string()))
    }
}

/// A positive amount in a specific currency.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Money {
    /// Amount in the currency's standard unit (e.g. whole USDT, not cents).
    pub amount: Decimal,
    /// Currency the amount is denominated in.
    pub currency: Currency,
}

impl Money {
    /// Upper bound on any single price or payment.
    pub const MAX_AMOUNT: Decimal = Decimal::from_parts(1_000_000, 0, 0, false, 0);

    /// Validate an amount for the given currency.
    ///
    /// # Errors
    ///
    /// Returns an error if the amount is not positive, exceeds
    /// [`Money::MAX_AMOUNT`], or carries more fractional digits than
    /// [`Currency::decimals`].
    pub fn new(amount: Decimal, currency: Currency) -> Result<Self, MoneyError> {
        if amount <= Decimal::ZERO {
            return Err(MoneyError::NotPositive);
        }
        if amount > Self::MAX_AMOUNT {
            return Err(MoneyError::TooLarge {
                max: Self::MAX_AMOUNT,
            });
        }
        let max = currency.decimals();
        if amount.normalize().scale() > max {
            return Err(MoneyError::TooPrecise { currency, max });
        }
        Ok(Self { amount, currency })
    }

    /// Parse a decimal string (e.g. `"19.99"`) for the given currency.
    ///
    /// # Errors
    ///
    /// Returns [`MoneyError::Invalid`] if the string is not a decimal, and the
    /// errors of [`Money::new`] otherwise.
    pub fn parse(s: &str, currency: Currency) -> Result<Self, MoneyError> {
        let amount =
            Decimal::from_str(s.trim()).map_err(|e| MoneyError::Invalid(e.to_string()))?;
        Self::new(amount, currency)
    }

    /// Whether this amount covers `expected` (same currency, not less).
    #[must_use]
    pub fn covers(&self, expected: &Self) -> bool {
        self.currency == expected.currency && self.amount >= expected.amount
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.amount.normalize(), self.currency)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_valid_amounts() {
        let m = Money::parse("19.99", Currency::Usdt).unwrap();
        assert_eq!(m.amount, Decimal::new(1999, 2));
        assert_eq!(m.to_string(), "19.99 USDT");

        assert!(Money::parse("0.00012345", Currency::Btc).is_ok());
        // Trailing zeros do not count against precision
        assert!(Money::parse("5.1000", Currency::Usdc).is_ok());
    }

    #[test]
    fn test_parse_rejects_non_positive() {
        assert_eq!(
            Money::parse("0", Currency::Usdt),
            Err(MoneyError::NotPositive)
        );
        assert_eq!(
            Money::parse("-3", Currency::Usdt),
            Err(MoneyError::NotPositive)
        );
    }

    #[test]
    fn test_parse_rejects_excess_precision() {
        let err = Money::parse("1.001", Currency::Usdt).unwrap_err();
        assert!(matches!(err, MoneyError::TooPrecise { max: 2, .. }));
    }

    #[test]
    fn test_parse_rejects_garbage_and_huge() {
        assert!(matches!(
            Money::parse("ten", Currency::Eth),
            Err(MoneyError::Invalid(_))
        ));
        assert!(matches!(
            Money::parse("1000001", Currency::Usdt),
            Err(MoneyError::TooLarge { .. })
        ));
    }

    #[test]
    fn test_currency_from_str_is_case_insensitive() {
        assert_eq!("usdt".parse::<Currency>().unwrap(), Currency::Usdt);
        assert_eq!(" BTC ".parse::<Currency>().unwrap(), Currency::Btc);
        assert!("DOGE".parse::<Currency>().is_err());
    }

    #[test]
    fn test_covers_requires_same_currency() {
        let price = Money::parse("10", Currency::Usdt).unwrap();
        assert!(Money::parse("10", Currency::Usdt).unwrap().covers(&price));
        assert!(Money::parse("10.5", Currency::Usdt).unwrap().covers(&price));
        assert!(!Money::parse("9.99", Currency::Usdt).unwrap().covers(&price));
        assert!(!Money::parse("10", Currency::Usdc).unwrap().covers(&price));
    }

    #[test]
    fn test_currency_serde_uses_ticker() {
        assert_eq!(serde_json::to_string(&Currency::Ltc).unwrap(), "\"LTC\"");
    }
}
