//! Pending SMS verification records.
//!
//! Registration and password reset share one shape: a short-lived record
//! keyed by `(phone, purpose)` holding a code, an expiry, and an attempt
//! counter. Registration additionally stages the profile data that will
//! become the user once the code checks out.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use zagros_core::{Phone, VerificationPurpose};

/// A staged verification awaiting its SMS code.
#[derive(Debug, Clone)]
pub struct PendingVerification {
    pub phone: Phone,
    pub purpose: VerificationPurpose,
    /// 6-digit numeric code, stored as text to keep leading zeros.
    pub code: String,
    /// After this instant the record is inert and rejected on sight.
    pub expires_at: DateTime<Utc>,
    /// Wrong-code submissions so far.
    pub attempts: u32,
    /// Registration profile data; `None` for password resets.
    pub payload: Option<RegistrationPayload>,
    pub created_at: DateTime<Utc>,
}

/// Profile data staged during registration.
///
/// The password is hashed before it ever reaches the ledger, so a leaked
/// pending record never exposes a plaintext credential.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistrationPayload {
    pub name: String,
    pub last_name: String,
    pub password_hash: String,
}
