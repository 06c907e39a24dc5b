//! Mobile phone number type.

use core::fmt;

use serde::{Deserialize, Serialize};

/// Errors that can occur when parsing a [`Phone`].
#[derive(thiserror::Error, Debug, Clone)]
pub enum PhoneError {
    /// The input string is empty.
    #[error("phone number cannot be empty")]
    Empty,
    /// The input is not an 11-digit mobile number.
    #[error("phone number must be 11 digits")]
    WrongLength,
    /// The input does not start with the mobile prefix.
    #[error("phone number must start with 09")]
    WrongPrefix,
    /// The input contains non-digit characters.
    #[error("phone number may only contain digits")]
    NonDigit,
}

/// A verified-format Iranian mobile number (`09xxxxxxxxx`).
///
/// All account identity in Zagros hangs off the mobile number: SMS
/// verification codes are sent to it and a verified number may belong to
/// at most one user.
///
/// ## Constraints
///
/// - Exactly 11 characters
/// - ASCII digits only
/// - Must start with `09`
///
/// ## Examples
///
/// ```
/// use zagros_core::Phone;
///
/// assert!(Phone::parse("09123456789").is_ok());
///
/// assert!(Phone::parse("").is_err());            // empty
/// assert!(Phone::parse("0912345678").is_err());  // too short
/// assert!(Phone::parse("08123456789").is_err()); // wrong prefix
/// assert!(Phone::parse("0912345678x").is_err()); // non-digit
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(transparent)]
pub struct Phone(String);

impl Phone {
    /// Length of a mobile number.
    pub const LENGTH: usize = 11;

    /// Parse a `Phone` from a string.
    ///
    /// # Errors
    ///
    /// Returns an error if the input:
    /// - Is empty
    /// - Is not exactly 11 characters
    /// - Contains non-digit characters
    /// - Does not start with `09`
    pub fn parse(s: &str) -> Result<Self, PhoneError> {
        let s = s.trim();

        if s.is_empty() {
            return Err(PhoneError::Empty);
        }

        if s.len() != Self::LENGTH {
            return Err(PhoneError::WrongLength);
        }

        if !s.bytes().all(|b| b.is_ascii_digit()) {
            return Err(PhoneError::NonDigit);
        }

        if !s.starts_with("09") {
            return Err(PhoneError::WrongPrefix);
        }

        Ok(Self(s.to_owned()))
    }

    /// Returns the phone number as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consumes the `Phone` and returns its inner string.
    #[must_use]
    pub fn into_inner(self) -> String {
        self.0
    }

    /// Masked form for user-facing responses, e.g. `0912***6789`.
    ///
    /// Keeps the first four and last four digits and hides the middle
    /// three, so a password-reset confirmation never echoes the full
    /// number back.
    #[must_use]
    pub fn masked(&self) -> String {
        let (head, rest) = self.0.split_at(4);
        let tail = rest.get(3..).unwrap_or("");
        format!("{head}***{tail}")
    }
}

impl fmt::Display for Phone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for Phone {
    type Err = PhoneError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl AsRef<str> for Phone {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

// SQLx support (with postgres feature)
#[cfg(feature = "postgres")]
impl sqlx::Type<sqlx::Postgres> for Phone {
    fn type_info() -> sqlx::postgres::PgTypeInfo {
        <String as sqlx::Type<sqlx::Postgres>>::type_info()
    }

    fn compatible(ty: &sqlx::postgres::PgTypeInfo) -> bool {
        <String as sqlx::Type<sqlx::Postgres>>::compatible(ty)
    }
}

#[cfg(feature = "postgres")]
impl<'r> sqlx::Decode<'r, sqlx::Postgres> for Phone {
    fn decode(value: sqlx::postgres::PgValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        let s = <String as sqlx::Decode<sqlx::Postgres>>::decode(value)?;
        // Database values are assumed valid
        Ok(Self(s))
    }
}

#[cfg(feature = "postgres")]
impl sqlx::Encode<'_, sqlx::Postgres> for Phone {
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
    fn test_parse_valid() {
        assert!(Phone::parse("09123456789").is_ok());
        assert!(Phone::parse("09000000000").is_ok());
        assert!(Phone::parse(" 09123456789 ").is_ok()); // trimmed
    }

    #[test]
    fn test_parse_empty() {
        assert!(matches!(Phone::parse(""), Err(PhoneError::Empty)));
        assert!(matches!(Phone::parse("   "), Err(PhoneError::Empty)));
    }

    #[test]
    fn test_parse_wrong_length() {
        assert!(matches!(
            Phone::parse("0912345678"),
            Err(PhoneError::WrongLength)
        ));
        assert!(matches!(
            Phone::parse("091234567890"),
            Err(PhoneError::WrongLength)
        ));
    }

    #[test]
    fn test_parse_wrong_prefix() {
        assert!(matches!(
            Phone::parse("08123456789"),
            Err(PhoneError::WrongPrefix)
        ));
        assert!(matches!(
            Phone::parse("19123456789"),
            Err(PhoneError::WrongPrefix)
        ));
    }

    #[test]
    fn test_parse_non_digit() {
        assert!(matches!(
            Phone::parse("0912345678x"),
            Err(PhoneError::NonDigit)
        ));
        assert!(matches!(
            Phone::parse("0912-345678"),
            Err(PhoneError::NonDigit)
        ));
    }

    #[test]
    fn test_masked() {
        let phone = Phone::parse("09123456789").unwrap();
        assert_eq!(phone.masked(), "0912***6789");
    }

    #[test]
    fn test_serde_roundtrip() {
        let phone = Phone::parse("09123456789").unwrap();
        let json = serde_json::to_string(&phone).unwrap();
        assert_eq!(json, "\"09123456789\"");

        let parsed: Phone = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, phone);
    }

    #[test]
    fn test_from_str() {
        let phone: Phone = "09123456789".parse().unwrap();
        assert_eq!(phone.as_str(), "09123456789");
    }
}
