//! Pending-verification repository backed by `PostgreSQL`.
//!
//! The `(phone, purpose)` primary key plus `ON CONFLICT` upsert is what
//! guarantees at most one live code per phone per purpose, even when two
//! code requests race.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use zagros_core::{Phone, VerificationPurpose};

use crate::db::{RepositoryError, VerificationStore};
use crate::models::{PendingVerification, RegistrationPayload};

/// Repository for pending verification records.
#[derive(Clone)]
pub struct PgVerificationStore {
    pool: PgPool,
}

impl PgVerificationStore {
    /// Create a new verification repository.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct PendingRow {
    phone: String,
    purpose: String,
    code: String,
    expires_at: DateTime<Utc>,
    attempts: i32,
    payload: Option<serde_json::Value>,
    created_at: DateTime<Utc>,
}

impl TryFrom<PendingRow> for PendingVerification {
    type Error = RepositoryError;

    fn try_from(row: PendingRow) -> Result<Self, RepositoryError> {
        let phone = Phone::parse(&row.phone).map_err(|e| {
            RepositoryError::DataCorruption(format!("invalid phone in database: {e}"))
        })?;
        let purpose: VerificationPurpose = row
            .purpose
            .parse()
            .map_err(RepositoryError::DataCorruption)?;
        let attempts = u32::try_from(row.attempts).map_err(|_| {
            RepositoryError::DataCorruption(format!("negative attempt count: {}", row.attempts))
        })?;
        let payload = match row.payload {
            Some(value) => {
                Some(
                    serde_json::from_value::<RegistrationPayload>(value).map_err(|e| {
                        RepositoryError::DataCorruption(format!("invalid payload: {e}"))
                    })?,
                )
            }
            None => None,
        };

        Ok(Self {
            phone,
            purpose,
            code: row.code,
            expires_at: row.expires_at,
            attempts,
            payload,
            created_at: row.created_at,
        })
    }
}

#[async_trait]
impl VerificationStore for PgVerificationStore {
    async fn upsert(&self, record: PendingVerification) -> Result<(), RepositoryError> {
        let payload = match &record.payload {
            Some(payload) => Some(serde_json::to_value(payload).map_err(|e| {
                RepositoryError::DataCorruption(format!("unserializable payload: {e}"))
            })?),
            None => None,
        };

        sqlx::query(
            "INSERT INTO pending_verifications \
                 (phone, purpose, code, expires_at, attempts, payload, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7) \
             ON CONFLICT (phone, purpose) DO UPDATE SET \
                 code = EXCLUDED.code, \
                 expires_at = EXCLUDED.expires_at, \
                 attempts = EXCLUDED.attempts, \
                 payload = EXCLUDED.payload, \
                 created_at = EXCLUDED.created_at",
        )
        .bind(record.phone.as_str())
        .bind(record.purpose.to_string())
        .bind(&record.code)
        .bind(record.expires_at)
        .bind(i32::try_from(record.attempts).unwrap_or(i32::MAX))
        .bind(payload)
        .bind(record.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get(
        &self,
        phone: &Phone,
        purpose: VerificationPurpose,
    ) -> Result<Option<PendingVerification>, RepositoryError> {
        let row = sqlx::query_as::<_, PendingRow>(
            "SELECT phone, purpose, code, expires_at, attempts, payload, created_at \
             FROM pending_verifications WHERE phone = $1 AND purpose = $2",
        )
        .bind(phone.as_str())
        .bind(purpose.to_string())
        .fetch_optional(&self.pool)
        .await?;

        row.map(PendingVerification::try_from).transpose()
    }

    async fn increment_attempts(
        &self,
        phone: &Phone,
        purpose: VerificationPurpose,
    ) -> Result<u32, RepositoryError> {
        let attempts = sqlx::query_scalar::<_, i32>(
            "UPDATE pending_verifications SET attempts = attempts + 1 \
             WHERE phone = $1 AND purpose = $2 \
             RETURNING attempts",
        )
        .bind(phone.as_str())
        .bind(purpose.to_string())
        .fetch_optional(&self.pool)
        .await?;

        Ok(attempts.map_or(0, |a| u32::try_from(a).unwrap_or(0)))
    }

    async fn delete(
        &self,
        phone: &Phone,
        purpose: VerificationPurpose,
    ) -> Result<(), RepositoryError> {
        sqlx::query("DELETE FROM pending_verifications WHERE phone = $1 AND purpose = $2")
            .bind(phone.as_str())
            .bind(purpose.to_string())
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
