//! Discord snowflake identifiers.

use core::fmt;

use serde::{Deserialize, Serialize};

/// Errors that can occur when parsing a [`DiscordId`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum DiscordIdError {
    /// The input string is empty.
    #[error("discord id cannot be empty")]
    Empty,
    /// The input contains something other than ASCII digits.
    #[error("discord id must contain only digits")]
    NotNumeric,
    /// The input is shorter or longer than a snowflake can be.
    #[error("discord id must be {min}-{max} digits")]
    BadLength {
        /// Minimum digit count.
        min: usize,
        /// Maximum digit count.
        max: usize,
    },
}

/// A Discord snowflake (user, guild, role or channel ID).
///
/// Stored and serialized as a decimal string, which is how Discord's JSON API
/// and the database carry it (snowflakes overflow JavaScript numbers).
///
/// ## Constraints
///
/// - 17-20 ASCII digits
/// - Fits in a `u64`
///
/// ## Examples
///
/// ```
/// use shopbot_core::DiscordId;
///
/// assert!(DiscordId::parse("80351110224678912").is_ok());
/// assert!(DiscordId::parse("").is_err());
/// assert!(DiscordId::parse("12ab").is_err());
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(try_from = "String", into = "String")]
pub struct DiscordId(String);

impl DiscordId {
    /// Minimum digits in a snowflake issued after Discord's epoch.
    pub const MIN_LENGTH: usize = 17;
    /// Maximum digits in a `u64`.
    pub const MAX_LENGTH: usize = 20;

    /// Parse a `DiscordId` from a string.
    ///
    /// # Errors
    ///
    /// Returns an error if the input is empty, not numeric, has the wrong
    /// length, or does not fit in a `u64`.
    pub fn parse(s: &str) -> Result<Self, DiscordIdError> {
        if s.is_empty() {
            return Err(DiscordIdError::Empty);
        }
        if !s.bytes().all(|b| b.is_ascii_digit()) {
            return Err(DiscordIdError::NotNumeric);
        }
        if !(Self::MIN_LENGTH..=Self::MAX_LENGTH).contains(&s.len()) || s.parse::<u64>().is_err()
        {
            return Err(DiscordIdError::BadLength {
                min: Self::MIN_LENGTH,
                max: Self::MAX_LENGTH,
            });
        }
        Ok(Self(s.to_owned()))
    }

    /// Build from a numeric snowflake (always valid).
    #[must_use]
    pub fn from_u64(id: u64) -> Self {
        Self(id.to_string())
    }

    /// Returns the ID as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns the numeric snowflake.
    #[must_use]
    pub fn as_u64(&self) -> u64 {
        // Validated on construction
        self.0.parse().unwrap_or_default()
    }
}

impl fmt::Display for DiscordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::str::FromStr for DiscordId {
    type Err = DiscordIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for DiscordId {
    type Error = DiscordIdError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<DiscordId> for String {
    fn from(id: DiscordId) -> Self {
        id.0
    }
}

// SQLx support (with postgres feature)
#[cfg(feature = "postgres")]
impl sqlx::Type<sqlx::Postgres> for DiscordId {
    fn type_info() -> sqlx::postgres::PgTypeInfo {
        <String as sqlx::Type<sqlx::Postgres>>::type_info()
    }

    fn compatible(ty: &sqlx::postgres::PgTypeInfo) -> bool {
        <String as sqlx::Type<sqlx::Postgres>>::compatible(ty)
    }
}

#[cfg(feature = "postgres")]
impl<'r> sqlx::Decode<'r, sqlx::Postgres> for DiscordId {
    fn decode(value: sqlx::postgres::PgValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        let s = <String as sqlx::Decode<sqlx::Postgres>>::decode(value)?;
        // Database values are assumed valid
        Ok(Self(s))
    }
}

#[cfg(feature = "postgres")]
impl sqlx::Encode<'_, sqlx::Postgres> for DiscordId {
    fn encode_by_ref(
        &self,
        buf: &mut sqlx::postgres::PgArgumentBuffer,
    ) -> Result<sqlx::encode::IsNull, sqlx::error::BoxDynError> {
        <String as sqlx::Encode<sqlx::Postgres>>::encode_by_ref(&self.0, buf)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_valid_snowflakes() {
        assert!(DiscordId::parse("80351110224678912").is_ok());
        assert!(DiscordId::parse("1234567890123456789").is_ok());
        assert!(DiscordId::parse("18446744073709551615").is_ok());
    }

    #[test]
    fn test_parse_empty() {
        assert_eq!(DiscordId::parse(""), Err(DiscordIdError::Empty));
    }

    #[test]
    fn test_parse_non_numeric() {
        assert_eq!(
            DiscordId::parse("8035111022467891x"),
            Err(DiscordIdError::NotNumeric)
        );
        assert_eq!(
            DiscordId::parse("-80351110224678912"),
            Err(DiscordIdError::NotNumeric)
        );
    }

    #[test]
    fn test_parse_bad_length() {
        assert!(matches!(
            DiscordId::parse("12345"),
            Err(DiscordIdError::BadLength { .. })
        ));
        // 20 digits but larger than u64::MAX
        assert!(matches!(
            DiscordId::parse("99999999999999999999"),
            Err(DiscordIdError::BadLength { .. })
        ));
    }

    #[test]
    fn test_as_u64() {
        let id = DiscordId::from_u64(80_351_110_224_678_912);
        assert_eq!(id.as_str(), "80351110224678912");
        assert_eq!(id.as_u64(), 80_351_110_224_678_912);
    }

    #[test]
    fn test_serde_validates() {
        let id: DiscordId = serde_json::from_str("\"80351110224678912\"").unwrap();
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"80351110224678912\"");
        assert!(serde_json::from_str::<DiscordId>("\"nope\"").is_err());
    }
}
