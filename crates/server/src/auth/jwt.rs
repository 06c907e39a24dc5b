//! JWT issuance and validation.
//!
//! Three token kinds, all HS256 over the same secret, discriminated by a
//! `kind` claim so one kind can never be replayed as another:
//!
//! - `access` - short-lived, sent as `Authorization: Bearer` on requests
//! - `refresh` - long-lived, also persisted per user so logout can
//!   revoke it server-side
//! - `reset` - very short-lived, minted after a password-reset code
//!   checks out and consumed by the password change endpoint

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use zagros_core::{Phone, UserId, UserRole};

/// Access token lifetime.
const ACCESS_TTL_HOURS: i64 = 1;

/// Refresh token lifetime.
const REFRESH_TTL_DAYS: i64 = 30;

/// Password-reset token lifetime.
const RESET_TTL_MINUTES: i64 = 15;

/// JWT errors.
#[derive(Debug, Error)]
pub enum JwtError {
    #[error("token expired")]
    Expired,

    #[error("invalid token")]
    Invalid,

    #[error("token generation failed: {0}")]
    Generation(String),
}

/// Claims carried by access and refresh tokens.
#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    /// User ID.
    sub: i64,
    /// Account role at issuance time.
    role: String,
    /// `access` or `refresh`.
    kind: String,
    /// Unique token ID. Two tokens minted in the same second would
    /// otherwise be byte-identical, and revoking one would revoke both.
    jti: String,
    exp: i64,
    iat: i64,
}

/// Claims carried by password-reset tokens.
#[derive(Debug, Serialize, Deserialize)]
struct ResetClaims {
    /// Phone the reset was verified for.
    phone: String,
    /// Always `reset`.
    kind: String,
    exp: i64,
    iat: i64,
}

/// JWT token service.
#[derive(Clone)]
pub struct JwtService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
}

impl JwtService {
    /// Create a token service from the configured secret.
    #[must_use]
    pub fn new(secret: &SecretString) -> Self {
        let bytes = secret.expose_secret().as_bytes();
        Self {
            encoding_key: EncodingKey::from_secret(bytes),
            decoding_key: DecodingKey::from_secret(bytes),
        }
    }

    /// Issue a 1-hour access token.
    ///
    /// # Errors
    ///
    /// Returns [`JwtError::Generation`] if encoding fails.
    pub fn issue_access(&self, user_id: UserId, role: UserRole) -> Result<String, JwtError> {
        self.issue(user_id, role, "access", Duration::hours(ACCESS_TTL_HOURS))
    }

    /// Issue a 30-day refresh token, returning it with its expiry so the
    /// caller can persist both.
    ///
    /// # Errors
    ///
    /// Returns [`JwtError::Generation`] if encoding fails.
    pub fn issue_refresh(
        &self,
        user_id: UserId,
        role: UserRole,
    ) -> Result<(String, DateTime<Utc>), JwtError> {
        let ttl = Duration::days(REFRESH_TTL_DAYS);
        let expires_at = Utc::now() + ttl;
        let token = self.issue(user_id, role, "refresh", ttl)?;
        Ok((token, expires_at))
    }

    /// Issue a 15-minute password-reset token for a verified phone.
    ///
    /// # Errors
    ///
    /// Returns [`JwtError::Generation`] if encoding fails.
    pub fn issue_reset(&self, phone: &Phone) -> Result<String, JwtError> {
        let now = Utc::now();
        let claims = ResetClaims {
            phone: phone.as_str().to_owned(),
            kind: "reset".to_owned(),
            exp: (now + Duration::minutes(RESET_TTL_MINUTES)).timestamp(),
            iat: now.timestamp(),
        };
        encode(&Header::default(), &claims, &self.encoding_key)
            .map_err(|e| JwtError::Generation(e.to_string()))
    }

    /// Validate an access token, returning the user ID and role.
    ///
    /// # Errors
    ///
    /// Returns [`JwtError::Expired`] or [`JwtError::Invalid`].
    pub fn verify_access(&self, token: &str) -> Result<(UserId, UserRole), JwtError> {
        self.verify(token, "access")
    }

    /// Validate a refresh token, returning the user ID and role.
    ///
    /// # Errors
    ///
    /// Returns [`JwtError::Expired`] or [`JwtError::Invalid`].
    pub fn verify_refresh(&self, token: &str) -> Result<(UserId, UserRole), JwtError> {
        self.verify(token, "refresh")
    }

    /// Validate a password-reset token, returning the phone it was
    /// issued for.
    ///
    /// # Errors
    ///
    /// Returns [`JwtError::Expired`] or [`JwtError::Invalid`].
    pub fn verify_reset(&self, token: &str) -> Result<Phone, JwtError> {
        let data = decode::<ResetClaims>(token, &self.decoding_key, &validation())
            .map_err(map_jwt_error)?;
        if data.claims.kind != "reset" {
            return Err(JwtError::Invalid);
        }
        Phone::parse(&data.claims.phone).map_err(|_| JwtError::Invalid)
    }

    fn issue(
        &self,
        user_id: UserId,
        role: UserRole,
        kind: &str,
        ttl: Duration,
    ) -> Result<String, JwtError> {
        let now = Utc::now();
        let claims = Claims {
            sub: user_id.as_i64(),
            role: role.to_string(),
            kind: kind.to_owned(),
            jti: Uuid::new_v4().to_string(),
            exp: (now + ttl).timestamp(),
            iat: now.timestamp(),
        };
        encode(&Header::default(), &claims, &self.encoding_key)
            .map_err(|e| JwtError::Generation(e.to_string()))
    }

    fn verify(&self, token: &str, expected_kind: &str) -> Result<(UserId, UserRole), JwtError> {
        let data =
            decode::<Claims>(token, &self.decoding_key, &validation()).map_err(map_jwt_error)?;
        if data.claims.kind != expected_kind {
            return Err(JwtError::Invalid);
        }
        let role: UserRole = data.claims.role.parse().map_err(|_| JwtError::Invalid)?;
        Ok((UserId::new(data.claims.sub), role))
    }
}

fn validation() -> Validation {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.set_required_spec_claims(&["exp"]);
    validation
}

fn map_jwt_error(e: jsonwebtoken::errors::Error) -> JwtError {
    match e.kind() {
        ErrorKind::ExpiredSignature => JwtError::Expired,
        _ => JwtError::Invalid,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn service() -> JwtService {
        JwtService::new(&SecretString::from("Ff3y1R8PqarWk0ZbDv6uHx2mJc9TnE5L4sQgVdNh7K".to_owned()))
    }

    #[test]
    fn test_access_token_roundtrip() {
        let service = service();
        let token = service
            .issue_access(UserId::new(42), UserRole::Admin)
            .unwrap();
        let (user_id, role) = service.verify_access(&token).unwrap();
        assert_eq!(user_id, UserId::new(42));
        assert_eq!(role, UserRole::Admin);
    }

    #[test]
    fn test_refresh_token_is_not_an_access_token() {
        let service = service();
        let (token, _) = service.issue_refresh(UserId::new(7), UserRole::User).unwrap();
        assert!(matches!(
            service.verify_access(&token),
            Err(JwtError::Invalid)
        ));
        assert!(service.verify_refresh(&token).is_ok());
    }

    #[test]
    fn test_reset_token_roundtrip() {
        let service = service();
        let phone = Phone::parse("09123456789").unwrap();
        let token = service.issue_reset(&phone).unwrap();
        assert_eq!(service.verify_reset(&token).unwrap(), phone);
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let token = service()
            .issue_access(UserId::new(1), UserRole::User)
            .unwrap();
        let other = JwtService::new(&SecretString::from("u9Xp2QvLsE6wRc1KaZ8dBmT4yGn7HfJ3NkV5WqjD0S".to_owned()));
        assert!(matches!(
            other.verify_access(&token),
            Err(JwtError::Invalid)
        ));
    }
}
