//! Account management: SMS-gated registration, login, token lifecycle,
//! and password reset.
//!
//! Registration never writes a user row up front. The profile data waits
//! in the verification ledger and is promoted into a durable account
//! only when the texted code checks out.

use std::sync::Arc;

use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use serde::Serialize;
use tracing::{info, instrument};

use zagros_core::{Phone, UserId, UserRole, VerificationPurpose};

use crate::auth::JwtService;
use crate::db::{RepositoryError, UserStore};
use crate::models::{NewUser, ProfileUpdate, User};
use crate::services::verification::{CodeIssued, VerificationError, VerificationService};

/// Minimum password length.
const MIN_PASSWORD_LENGTH: usize = 6;

/// Errors from account operations.
#[derive(Debug, thiserror::Error)]
pub enum AccountError {
    /// The phone is already claimed by a verified account.
    #[error("phone number already registered")]
    PhoneTaken,

    /// Unknown phone or wrong password.
    #[error("invalid credentials")]
    InvalidCredentials,

    /// The account exists but has been deactivated.
    #[error("account is inactive")]
    AccountInactive,

    /// No account for this phone / ID.
    #[error("user not found")]
    UserNotFound,

    /// The refresh token is unknown, revoked, or expired.
    #[error("invalid refresh token")]
    InvalidRefreshToken,

    /// The password-reset token is invalid or expired.
    #[error("invalid reset token")]
    InvalidResetToken,

    /// Password does not meet the minimum requirements.
    #[error("password must be at least {MIN_PASSWORD_LENGTH} characters")]
    WeakPassword,

    /// Password hashing failed.
    #[error("password hashing failed")]
    PasswordHash,

    /// Token generation failed.
    #[error("token generation failed: {0}")]
    Token(String),

    /// Verification ledger error.
    #[error(transparent)]
    Verification(#[from] VerificationError),

    /// Storage failure.
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

/// Token pair handed out after registration or login.
#[derive(Debug, Clone, Serialize)]
pub struct AuthTokens {
    pub access_token: String,
    pub refresh_token: String,
    #[serde(skip)]
    pub user: User,
}

/// Response to a password-reset request.
#[derive(Debug, Clone, Serialize)]
pub struct ResetRequested {
    /// Masked phone the code went to, e.g. `0912***6789`.
    pub phone: String,
    /// Seconds until the code expires.
    pub expires_in: u64,
}

/// The account service.
#[derive(Clone)]
pub struct AccountService {
    users: Arc<dyn UserStore>,
    verification: VerificationService,
    jwt: JwtService,
}

impl AccountService {
    /// Create the service.
    #[must_use]
    pub fn new(
        users: Arc<dyn UserStore>,
        verification: VerificationService,
        jwt: JwtService,
    ) -> Self {
        Self {
            users,
            verification,
            jwt,
        }
    }

    /// Stage a registration and text its verification code.
    ///
    /// # Errors
    ///
    /// Returns `PhoneTaken` if a verified account already owns the
    /// phone, `WeakPassword` on a short password, or a ledger error.
    #[instrument(skip(self, name, last_name, password))]
    pub async fn start_registration(
        &self,
        name: String,
        last_name: String,
        phone: Phone,
        password: &str,
    ) -> Result<CodeIssued, AccountError> {
        validate_password(password)?;

        if let Some(existing) = self.users.find_by_phone(&phone).await?
            && existing.phone_verified
        {
            return Err(AccountError::PhoneTaken);
        }

        let payload = crate::models::RegistrationPayload {
            name,
            last_name,
            password_hash: hash_password(password)?,
        };

        let issued = self
            .verification
            .issue_code(&phone, VerificationPurpose::Registration, Some(payload))
            .await?;

        Ok(issued)
    }

    /// Check the registration code and promote the staged payload into a
    /// durable, verified user. Returns a fresh token pair.
    ///
    /// # Errors
    ///
    /// Propagates ledger errors (`NotFound`, `Expired`,
    /// `AttemptsExhausted`, `CodeMismatch`) and returns `PhoneTaken` if
    /// the phone was claimed while the code was pending.
    #[instrument(skip(self, code))]
    pub async fn complete_registration(
        &self,
        phone: Phone,
        code: &str,
    ) -> Result<AuthTokens, AccountError> {
        let payload = self
            .verification
            .verify_code(&phone, code, VerificationPurpose::Registration)
            .await?
            .ok_or(AccountError::Verification(VerificationError::NotFound))?;

        let user = self
            .users
            .create(NewUser {
                name: payload.name,
                last_name: payload.last_name,
                phone,
                password_hash: payload.password_hash,
                phone_verified: true,
                role: UserRole::User,
            })
            .await
            .map_err(|e| match e {
                RepositoryError::Conflict(_) => AccountError::PhoneTaken,
                other => AccountError::Repository(other),
            })?;

        info!(user_id = %user.id, "registration completed");
        self.issue_tokens(user).await
    }

    /// Re-send the registration code for a pending registration.
    ///
    /// # Errors
    ///
    /// Returns the ledger's `NotFound` if no registration is pending.
    pub async fn resend_registration_code(
        &self,
        phone: &Phone,
    ) -> Result<CodeIssued, AccountError> {
        let issued = self
            .verification
            .resend_code(phone, VerificationPurpose::Registration)
            .await?;
        Ok(issued)
    }

    /// Log in with phone and password.
    ///
    /// # Errors
    ///
    /// Returns `InvalidCredentials` for unknown phone or wrong password,
    /// `AccountInactive` for deactivated accounts.
    #[instrument(skip(self, password))]
    pub async fn login(&self, phone: &Phone, password: &str) -> Result<AuthTokens, AccountError> {
        let user = self
            .users
            .find_by_phone(phone)
            .await?
            .ok_or(AccountError::InvalidCredentials)?;

        if !user.is_active {
            return Err(AccountError::AccountInactive);
        }

        let hash = self
            .users
            .password_hash(user.id)
            .await?
            .ok_or(AccountError::InvalidCredentials)?;
        verify_password(password, &hash)?;

        info!(user_id = %user.id, "login succeeded");
        self.issue_tokens(user).await
    }

    /// Exchange a refresh token for a new access token.
    ///
    /// The token must both decode and still be present (unexpired) in
    /// the user's stored token set - logout revokes it server-side.
    ///
    /// # Errors
    ///
    /// Returns `InvalidRefreshToken` in every failure case so callers
    /// cannot probe which check failed.
    pub async fn refresh(&self, refresh_token: &str) -> Result<(String, User), AccountError> {
        let (user_id, _) = self
            .jwt
            .verify_refresh(refresh_token)
            .map_err(|_| AccountError::InvalidRefreshToken)?;

        let user = self
            .users
            .get_by_id(user_id)
            .await?
            .ok_or(AccountError::InvalidRefreshToken)?;

        let valid = self
            .users
            .refresh_token_valid(user.id, refresh_token, chrono::Utc::now())
            .await?;
        if !valid {
            return Err(AccountError::InvalidRefreshToken);
        }

        let access = self
            .jwt
            .issue_access(user.id, user.role)
            .map_err(|e| AccountError::Token(e.to_string()))?;
        Ok((access, user))
    }

    /// Revoke one refresh token.
    ///
    /// # Errors
    ///
    /// Returns [`AccountError::Repository`] on storage failure.
    pub async fn logout(&self, user_id: UserId, refresh_token: &str) -> Result<(), AccountError> {
        self.users
            .remove_refresh_token(user_id, refresh_token)
            .await?;
        Ok(())
    }

    /// Start a password reset by texting a code to the account's phone.
    ///
    /// # Errors
    ///
    /// Returns `UserNotFound` for unknown phones, or a ledger error.
    #[instrument(skip(self))]
    pub async fn forgot_password(&self, phone: &Phone) -> Result<ResetRequested, AccountError> {
        let user = self
            .users
            .find_by_phone(phone)
            .await?
            .ok_or(AccountError::UserNotFound)?;

        let issued = self
            .verification
            .issue_code(&user.phone, VerificationPurpose::PasswordReset, None)
            .await?;

        Ok(ResetRequested {
            phone: user.phone.masked(),
            expires_in: issued.expires_in,
        })
    }

    /// Check a password-reset code; on success mint a short-lived reset
    /// token that authorizes the actual password change.
    ///
    /// # Errors
    ///
    /// Propagates the ledger errors for bad/expired/exhausted codes.
    pub async fn verify_reset_code(
        &self,
        phone: &Phone,
        code: &str,
    ) -> Result<String, AccountError> {
        self.verification
            .verify_code(phone, code, VerificationPurpose::PasswordReset)
            .await?;

        self.jwt
            .issue_reset(phone)
            .map_err(|e| AccountError::Token(e.to_string()))
    }

    /// Set a new password, authorized by a reset token.
    ///
    /// # Errors
    ///
    /// Returns `InvalidResetToken` for bad/expired tokens,
    /// `WeakPassword` for short passwords, `UserNotFound` if the account
    /// vanished in the meantime.
    #[instrument(skip(self, reset_token, new_password))]
    pub async fn reset_password(
        &self,
        reset_token: &str,
        new_password: &str,
    ) -> Result<(), AccountError> {
        let phone = self
            .jwt
            .verify_reset(reset_token)
            .map_err(|_| AccountError::InvalidResetToken)?;

        validate_password(new_password)?;

        let user = self
            .users
            .find_by_phone(&phone)
            .await?
            .ok_or(AccountError::UserNotFound)?;

        let hash = hash_password(new_password)?;
        self.users.set_password_hash(user.id, &hash).await?;

        // The code was already consumed at verify time; this only mops
        // up a record left behind by a concurrent re-request.
        self.verification
            .discard(&phone, VerificationPurpose::PasswordReset)
            .await?;

        info!(user_id = %user.id, "password reset completed");
        Ok(())
    }

    /// Load the caller's own account.
    ///
    /// # Errors
    ///
    /// Returns `UserNotFound` if the account no longer exists.
    pub async fn me(&self, user_id: UserId) -> Result<User, AccountError> {
        self.users
            .get_by_id(user_id)
            .await?
            .ok_or(AccountError::UserNotFound)
    }

    /// Apply a partial profile update. The phone number is immutable.
    ///
    /// # Errors
    ///
    /// Returns `UserNotFound` if the account no longer exists.
    pub async fn update_profile(
        &self,
        user_id: UserId,
        update: ProfileUpdate,
    ) -> Result<User, AccountError> {
        self.users
            .update_profile(user_id, update)
            .await?
            .ok_or(AccountError::UserNotFound)
    }

    async fn issue_tokens(&self, user: User) -> Result<AuthTokens, AccountError> {
        let access_token = self
            .jwt
            .issue_access(user.id, user.role)
            .map_err(|e| AccountError::Token(e.to_string()))?;
        let (refresh_token, expires_at) = self
            .jwt
            .issue_refresh(user.id, user.role)
            .map_err(|e| AccountError::Token(e.to_string()))?;

        self.users
            .add_refresh_token(user.id, &refresh_token, expires_at)
            .await?;

        Ok(AuthTokens {
            access_token,
            refresh_token,
            user,
        })
    }
}

/// Validate password meets requirements.
fn validate_password(password: &str) -> Result<(), AccountError> {
    if password.len() < MIN_PASSWORD_LENGTH {
        return Err(AccountError::WeakPassword);
    }
    Ok(())
}

/// Hash a password using Argon2id. Also used by the CLI when creating
/// admin accounts directly.
pub fn hash_password(password: &str) -> Result<String, AccountError> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();

    argon2
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|_| AccountError::PasswordHash)
}

/// Verify a password against a stored hash.
fn verify_password(password: &str, hash: &str) -> Result<(), AccountError> {
    let parsed_hash = PasswordHash::new(hash).map_err(|_| AccountError::InvalidCredentials)?;
    let argon2 = Argon2::default();

    argon2
        .verify_password(password.as_bytes(), &parsed_hash)
        .map_err(|_| AccountError::InvalidCredentials)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_password_hash_roundtrip() {
        let hash = hash_password("correct horse").unwrap();
        assert!(verify_password("correct horse", &hash).is_ok());
        assert!(matches!(
            verify_password("wrong horse", &hash),
            Err(AccountError::InvalidCredentials)
        ));
    }

    #[test]
    fn test_short_password_rejected() {
        assert!(matches!(
            validate_password("12345"),
            Err(AccountError::WeakPassword)
        ));
        assert!(validate_password("123456").is_ok());
    }
}
