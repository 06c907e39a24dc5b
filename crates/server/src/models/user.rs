//! User domain types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use zagros_core::{Phone, UserId, UserRole};

/// A registered account.
///
/// The password hash is intentionally not part of this type; repositories
/// expose it through a dedicated lookup so it never rides along into
/// handler responses.
#[derive(Debug, Clone)]
pub struct User {
    /// Unique user ID.
    pub id: UserId,
    /// First name.
    pub name: String,
    /// Last name.
    pub last_name: String,
    /// Mobile number the account is keyed on.
    pub phone: Phone,
    /// Whether the number was confirmed via SMS code.
    pub phone_verified: bool,
    /// Account role.
    pub role: UserRole,
    /// Deactivated accounts cannot log in.
    pub is_active: bool,
    /// Optional saved address.
    pub address: Option<SavedAddress>,
    /// Optional 10-digit postal code.
    pub postal_code: Option<String>,
    /// When the account was created.
    pub created_at: DateTime<Utc>,
    /// When the account was last updated.
    pub updated_at: DateTime<Utc>,
}

/// Address stored on the user profile.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SavedAddress {
    pub street: String,
    pub city: String,
    pub state: String,
    #[serde(default)]
    pub postal_code: Option<String>,
}

/// Data required to create a user.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub name: String,
    pub last_name: String,
    pub phone: Phone,
    pub password_hash: String,
    pub phone_verified: bool,
    pub role: UserRole,
}

/// Partial profile update; `None` fields are left untouched.
///
/// The phone number is deliberately absent - it is the account identity
/// and cannot be changed.
#[derive(Debug, Clone, Default)]
pub struct ProfileUpdate {
    pub name: Option<String>,
    pub last_name: Option<String>,
    pub address: Option<SavedAddress>,
    pub postal_code: Option<Option<String>>,
}
