//! User repository backed by `PostgreSQL`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use zagros_core::{Phone, UserId, UserRole};

use crate::db::{RepositoryError, UserStore};
use crate::models::user::SavedAddress;
use crate::models::{NewUser, ProfileUpdate, User};

/// Repository for user database operations.
#[derive(Clone)]
pub struct PgUserStore {
    pool: PgPool,
}

impl PgUserStore {
    /// Create a new user repository.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct UserRow {
    id: i64,
    name: String,
    last_name: String,
    phone: String,
    phone_verified: bool,
    role: String,
    is_active: bool,
    address: Option<serde_json::Value>,
    postal_code: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<UserRow> for User {
    type Error = RepositoryError;

    fn try_from(row: UserRow) -> Result<Self, RepositoryError> {
        let phone = Phone::parse(&row.phone).map_err(|e| {
            RepositoryError::DataCorruption(format!("invalid phone in database: {e}"))
        })?;
        let role: UserRole = row.role.parse().map_err(RepositoryError::DataCorruption)?;
        let address = match row.address {
            Some(value) => Some(serde_json::from_value::<SavedAddress>(value).map_err(|e| {
                RepositoryError::DataCorruption(format!("invalid address in database: {e}"))
            })?),
            None => None,
        };

        Ok(Self {
            id: UserId::new(row.id),
            name: row.name,
            last_name: row.last_name,
            phone,
            phone_verified: row.phone_verified,
            role,
            is_active: row.is_active,
            address,
            postal_code: row.postal_code,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

const USER_COLUMNS: &str = "id, name, last_name, phone, phone_verified, role, is_active, \
                            address, postal_code, created_at, updated_at";

#[async_trait]
impl UserStore for PgUserStore {
    async fn create(&self, new: NewUser) -> Result<User, RepositoryError> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "INSERT INTO users (name, last_name, phone, phone_verified, password_hash, role) \
             VALUES ($1, $2, $3, $4, $5, $6) \
             RETURNING {USER_COLUMNS}"
        ))
        .bind(&new.name)
        .bind(&new.last_name)
        .bind(new.phone.as_str())
        .bind(new.phone_verified)
        .bind(&new.password_hash)
        .bind(new.role.to_string())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(ref db_err) = e
                && db_err.is_unique_violation()
            {
                return RepositoryError::Conflict("phone already registered".to_owned());
            }
            RepositoryError::Database(e)
        })?;

        row.try_into()
    }

    async fn get_by_id(&self, id: UserId) -> Result<Option<User>, RepositoryError> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = $1"
        ))
        .bind(id.as_i64())
        .fetch_optional(&self.pool)
        .await?;

        row.map(User::try_from).transpose()
    }

    async fn find_by_phone(&self, phone: &Phone) -> Result<Option<User>, RepositoryError> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE phone = $1 \
             ORDER BY phone_verified DESC, id LIMIT 1"
        ))
        .bind(phone.as_str())
        .fetch_optional(&self.pool)
        .await?;

        row.map(User::try_from).transpose()
    }

    async fn password_hash(&self, id: UserId) -> Result<Option<String>, RepositoryError> {
        let hash = sqlx::query_scalar::<_, String>("SELECT password_hash FROM users WHERE id = $1")
            .bind(id.as_i64())
            .fetch_optional(&self.pool)
            .await?;
        Ok(hash)
    }

    async fn set_password_hash(&self, id: UserId, hash: &str) -> Result<(), RepositoryError> {
        sqlx::query("UPDATE users SET password_hash = $2, updated_at = now() WHERE id = $1")
            .bind(id.as_i64())
            .bind(hash)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn update_profile(
        &self,
        id: UserId,
        update: ProfileUpdate,
    ) -> Result<Option<User>, RepositoryError> {
        let address = match &update.address {
            Some(address) => Some(serde_json::to_value(address).map_err(|e| {
                RepositoryError::DataCorruption(format!("unserializable address: {e}"))
            })?),
            None => None,
        };

        let row = sqlx::query_as::<_, UserRow>(&format!(
            "UPDATE users SET \
                 name = COALESCE($2, name), \
                 last_name = COALESCE($3, last_name), \
                 address = COALESCE($4, address), \
                 postal_code = CASE WHEN $5 THEN $6 ELSE postal_code END, \
                 updated_at = now() \
             WHERE id = $1 \
             RETURNING {USER_COLUMNS}"
        ))
        .bind(id.as_i64())
        .bind(update.name)
        .bind(update.last_name)
        .bind(address)
        .bind(update.postal_code.is_some())
        .bind(update.postal_code.flatten())
        .fetch_optional(&self.pool)
        .await?;

        row.map(User::try_from).transpose()
    }

    async fn add_refresh_token(
        &self,
        id: UserId,
        token: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO user_refresh_tokens (user_id, token, expires_at) \
             VALUES ($1, $2, $3) \
             ON CONFLICT (user_id, token) DO UPDATE SET expires_at = EXCLUDED.expires_at",
        )
        .bind(id.as_i64())
        .bind(token)
        .bind(expires_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn refresh_token_valid(
        &self,
        id: UserId,
        token: &str,
        now: DateTime<Utc>,
    ) -> Result<bool, RepositoryError> {
        let found = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM user_refresh_tokens \
             WHERE user_id = $1 AND token = $2 AND expires_at > $3",
        )
        .bind(id.as_i64())
        .bind(token)
        .bind(now)
        .fetch_one(&self.pool)
        .await?;
        Ok(found > 0)
    }

    async fn remove_refresh_token(&self, id: UserId, token: &str) -> Result<(), RepositoryError> {
        sqlx::query("DELETE FROM user_refresh_tokens WHERE user_id = $1 AND token = $2")
            .bind(id.as_i64())
            .bind(token)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
