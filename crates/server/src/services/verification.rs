//! SMS verification ledger.
//!
//! One reusable flow for everything that gates on a texted code:
//! registration stages a profile payload behind the code, password reset
//! stages nothing. Records live in the store keyed by `(phone, purpose)`
//! so re-requesting a code atomically replaces the old one.

use std::sync::Arc;

use chrono::{Duration, Utc};
use rand::Rng;
use serde::Serialize;
use tracing::{info, instrument, warn};

use zagros_core::{Phone, VerificationPurpose};

use crate::db::{RepositoryError, VerificationStore};
use crate::gateways::{GatewayError, SmsGateway, SmsTemplate};
use crate::models::{PendingVerification, RegistrationPayload};

/// Codes expire this many minutes after issuance.
const CODE_TTL_MINUTES: i64 = 10;

/// Wrong-code submissions tolerated before the record is burned.
const MAX_ATTEMPTS: u32 = 5;

/// Errors from the verification ledger.
#[derive(Debug, thiserror::Error)]
pub enum VerificationError {
    /// No pending record for this phone and purpose.
    #[error("no pending verification")]
    NotFound,

    /// The code expired; the record has been deleted.
    #[error("verification code expired")]
    Expired,

    /// Too many wrong submissions; the record has been deleted.
    #[error("verification attempts exhausted")]
    AttemptsExhausted,

    /// Wrong code.
    #[error("wrong verification code ({remaining} attempts remaining)")]
    CodeMismatch {
        /// Attempts left before the record is burned.
        remaining: u32,
    },

    /// The SMS could not be delivered; the pending record was removed so
    /// the user can retry cleanly.
    #[error("SMS delivery failed: {0}")]
    Sms(#[from] GatewayError),

    /// Storage failure.
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

/// Successful code issuance.
#[derive(Debug, Clone, Serialize)]
pub struct CodeIssued {
    /// Seconds until the code expires.
    pub expires_in: u64,
}

/// The verification ledger service.
#[derive(Clone)]
pub struct VerificationService {
    store: Arc<dyn VerificationStore>,
    sms: Arc<dyn SmsGateway>,
}

impl VerificationService {
    /// Create the service over a store and an SMS gateway.
    #[must_use]
    pub fn new(store: Arc<dyn VerificationStore>, sms: Arc<dyn SmsGateway>) -> Self {
        Self { store, sms }
    }

    /// Issue (or re-issue) a code for `(phone, purpose)`.
    ///
    /// Any previously pending code for the same key is replaced, which
    /// invalidates it. If the SMS cannot be delivered the fresh record
    /// is deleted again so no dangling, unusable record blocks the user.
    ///
    /// # Errors
    ///
    /// Returns [`VerificationError::Sms`] when delivery fails, or
    /// [`VerificationError::Repository`] on storage failure.
    #[instrument(skip(self, payload), fields(purpose = %purpose))]
    pub async fn issue_code(
        &self,
        phone: &Phone,
        purpose: VerificationPurpose,
        payload: Option<RegistrationPayload>,
    ) -> Result<CodeIssued, VerificationError> {
        let code = generate_code();
        let now = Utc::now();

        let record = PendingVerification {
            phone: phone.clone(),
            purpose,
            code: code.clone(),
            expires_at: now + Duration::minutes(CODE_TTL_MINUTES),
            attempts: 0,
            payload,
            created_at: now,
        };
        self.store.upsert(record).await?;

        let template = match purpose {
            VerificationPurpose::Registration => SmsTemplate::Registration,
            VerificationPurpose::PasswordReset => SmsTemplate::PasswordReset,
        };

        match self.sms.send_code(phone, &code, template).await {
            Ok(rec_id) => {
                info!(rec_id = %rec_id, "verification code sent");
                Ok(CodeIssued {
                    expires_in: (CODE_TTL_MINUTES * 60).unsigned_abs(),
                })
            }
            Err(e) => {
                warn!(error = %e, "SMS send failed, discarding pending verification");
                self.store.delete(phone, purpose).await?;
                Err(e.into())
            }
        }
    }

    /// Check a submitted code.
    ///
    /// On success the record is consumed and its staged payload (if any)
    /// is handed back for promotion into a durable entity.
    ///
    /// # Errors
    ///
    /// - [`VerificationError::NotFound`] - nothing pending
    /// - [`VerificationError::Expired`] - past expiry (record deleted)
    /// - [`VerificationError::AttemptsExhausted`] - counter at the
    ///   maximum, even if this submission is correct (record deleted)
    /// - [`VerificationError::CodeMismatch`] - wrong code, counter bumped
    #[instrument(skip(self, code), fields(purpose = %purpose))]
    pub async fn verify_code(
        &self,
        phone: &Phone,
        code: &str,
        purpose: VerificationPurpose,
    ) -> Result<Option<RegistrationPayload>, VerificationError> {
        let record = self
            .store
            .get(phone, purpose)
            .await?
            .ok_or(VerificationError::NotFound)?;

        if record.expires_at < Utc::now() {
            self.store.delete(phone, purpose).await?;
            return Err(VerificationError::Expired);
        }

        if record.attempts >= MAX_ATTEMPTS {
            self.store.delete(phone, purpose).await?;
            return Err(VerificationError::AttemptsExhausted);
        }

        if record.code != code {
            let attempts = self.store.increment_attempts(phone, purpose).await?;
            let remaining = MAX_ATTEMPTS.saturating_sub(attempts);
            return Err(VerificationError::CodeMismatch { remaining });
        }

        self.store.delete(phone, purpose).await?;
        Ok(record.payload)
    }

    /// Re-send a code for an existing pending record, reusing its staged
    /// payload.
    ///
    /// # Errors
    ///
    /// Returns [`VerificationError::NotFound`] if nothing is pending,
    /// otherwise the same errors as [`Self::issue_code`].
    #[instrument(skip(self), fields(purpose = %purpose))]
    pub async fn resend_code(
        &self,
        phone: &Phone,
        purpose: VerificationPurpose,
    ) -> Result<CodeIssued, VerificationError> {
        let record = self
            .store
            .get(phone, purpose)
            .await?
            .ok_or(VerificationError::NotFound)?;

        self.issue_code(phone, purpose, record.payload).await
    }

    /// Drop any pending record for this key, e.g. after a completed
    /// password reset.
    ///
    /// # Errors
    ///
    /// Returns [`VerificationError::Repository`] on storage failure.
    pub async fn discard(
        &self,
        phone: &Phone,
        purpose: VerificationPurpose,
    ) -> Result<(), VerificationError> {
        self.store.delete(phone, purpose).await?;
        Ok(())
    }
}

/// A random 6-digit numeric code.
fn generate_code() -> String {
    rand::rng().random_range(100_000..1_000_000).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_codes_are_six_digits() {
        for _ in 0..100 {
            let code = generate_code();
            assert_eq!(code.len(), 6);
            assert!(code.bytes().all(|b| b.is_ascii_digit()));
        }
    }
}
