//! Storage layer.
//!
//! The services talk to storage through the trait contracts in this
//! module; the document collections behind them are an implementation
//! detail. Two implementations exist:
//!
//! - [`postgres`] - the production store backed by `PostgreSQL` via sqlx
//! - [`memory`] - an in-process store with the same semantics, used by
//!   the test suites and local experiments
//!
//! The one primitive beyond plain CRUD that the order pipeline depends
//! on is [`ProductStore::try_reserve`]: an atomic conditional stock
//! decrement that can never jointly overdraw under concurrency.
//!
//! # Migrations
//!
//! Plain SQL migrations live in `crates/server/migrations/` and run via:
//! ```bash
//! cargo run -p zagros-cli -- migrate
//! ```

pub mod memory;
pub mod postgres;

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use secrecy::ExposeSecret;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;

use zagros_core::{OrderId, OrderStatus, Phone, ProductId, UserId, VerificationPurpose};

use crate::models::{
    ActivityFilter, ActivityLogEntry, NewActivityLog, NewOrder, NewProduct, NewUser, Order,
    OrderFilter, Page, Pagination, PendingVerification, Product, ProductUpdate, ProfileUpdate,
    User,
};

/// Create a `PostgreSQL` connection pool with sensible defaults.
///
/// # Errors
///
/// Returns `sqlx::Error` if the connection cannot be established.
pub async fn create_pool(database_url: &secrecy::SecretString) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .min_connections(2)
        .acquire_timeout(Duration::from_secs(10))
        .connect(database_url.expose_secret())
        .await
}

/// Errors from the storage layer.
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    /// Underlying database failure.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A uniqueness constraint was violated.
    #[error("conflict: {0}")]
    Conflict(String),

    /// A stored value could not be mapped back into a domain type.
    #[error("data corruption: {0}")]
    DataCorruption(String),
}

/// Outcome of an atomic stock reservation attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReserveOutcome {
    /// Stock was decremented by the requested quantity.
    Reserved,
    /// Available stock was below the requested quantity; nothing changed.
    InsufficientStock,
    /// No such product.
    NotFound,
}

/// User collection.
#[async_trait]
pub trait UserStore: Send + Sync {
    /// Create a user.
    ///
    /// Fails with [`RepositoryError::Conflict`] if the phone is already
    /// claimed by a verified user.
    async fn create(&self, new: NewUser) -> Result<User, RepositoryError>;

    async fn get_by_id(&self, id: UserId) -> Result<Option<User>, RepositoryError>;

    async fn find_by_phone(&self, phone: &Phone) -> Result<Option<User>, RepositoryError>;

    /// Password hash for login verification; `None` if the user is gone.
    async fn password_hash(&self, id: UserId) -> Result<Option<String>, RepositoryError>;

    async fn set_password_hash(&self, id: UserId, hash: &str) -> Result<(), RepositoryError>;

    /// Apply a partial profile update and return the fresh user.
    async fn update_profile(
        &self,
        id: UserId,
        update: ProfileUpdate,
    ) -> Result<Option<User>, RepositoryError>;

    /// Store a refresh token with its expiry.
    async fn add_refresh_token(
        &self,
        id: UserId,
        token: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<(), RepositoryError>;

    /// Whether the user currently holds this token, unexpired.
    async fn refresh_token_valid(
        &self,
        id: UserId,
        token: &str,
        now: DateTime<Utc>,
    ) -> Result<bool, RepositoryError>;

    /// Revoke one stored refresh token.
    async fn remove_refresh_token(&self, id: UserId, token: &str) -> Result<(), RepositoryError>;
}

/// Product collection; doubles as the inventory and pricing authority.
#[async_trait]
pub trait ProductStore: Send + Sync {
    async fn create(&self, new: NewProduct) -> Result<Product, RepositoryError>;

    async fn update(
        &self,
        id: ProductId,
        update: ProductUpdate,
    ) -> Result<Option<Product>, RepositoryError>;

    async fn get(&self, id: ProductId) -> Result<Option<Product>, RepositoryError>;

    /// Active products, newest first.
    async fn list(&self, pagination: Pagination) -> Result<Page<Product>, RepositoryError>;

    /// Atomically decrement stock by `quantity` if enough is available.
    ///
    /// Concurrent reservations against the same product must never
    /// jointly drive stock negative; implementations use a conditional
    /// decrement at the storage layer, not a read-then-write pair.
    async fn try_reserve(
        &self,
        id: ProductId,
        quantity: u32,
    ) -> Result<ReserveOutcome, RepositoryError>;

    /// Compensating increment for a reservation that did not become a
    /// committed sale.
    async fn release(&self, id: ProductId, quantity: u32) -> Result<(), RepositoryError>;
}

/// Order collection.
#[async_trait]
pub trait OrderStore: Send + Sync {
    async fn create(&self, new: NewOrder) -> Result<Order, RepositoryError>;

    async fn get(&self, id: OrderId) -> Result<Option<Order>, RepositoryError>;

    /// Look up an order by the gateway authority token; the callback
    /// carries only the authority, never our order ID.
    async fn find_by_authority(&self, authority: &str) -> Result<Option<Order>, RepositoryError>;

    async fn list(
        &self,
        filter: &OrderFilter,
        pagination: Pagination,
    ) -> Result<Page<Order>, RepositoryError>;

    /// All orders created in `[start, end)`, oldest first (reporting).
    async fn created_between(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Order>, RepositoryError>;

    /// Unconditional status overwrite; returns the fresh order.
    async fn set_status(
        &self,
        id: OrderId,
        status: OrderStatus,
    ) -> Result<Option<Order>, RepositoryError>;

    /// Attach the authority for a freshly created payment attempt.
    /// Prior authorities are overwritten (abandoned, not invalidated).
    async fn set_payment_authority(
        &self,
        id: OrderId,
        authority: &str,
    ) -> Result<(), RepositoryError>;

    /// Settle a verified payment: set payment status to paid, move the
    /// order to `order_status`, and record the reference ID and paid
    /// timestamp - but only if the order is not already paid.
    ///
    /// Returns `true` when this call performed the transition, `false`
    /// when the order was already paid (duplicate callback).
    async fn record_payment(
        &self,
        id: OrderId,
        order_status: OrderStatus,
        ref_id: &str,
        paid_at: DateTime<Utc>,
    ) -> Result<bool, RepositoryError>;

    /// Mark the payment attempt as failed, unless already paid.
    async fn set_payment_failed(&self, id: OrderId) -> Result<(), RepositoryError>;

    /// Flip the once-only restock guard.
    ///
    /// Returns `true` if this call flipped it, `false` if stock for this
    /// order was already released.
    async fn mark_stock_released(&self, id: OrderId) -> Result<bool, RepositoryError>;
}

/// Pending-verification collection, keyed by `(phone, purpose)`.
#[async_trait]
pub trait VerificationStore: Send + Sync {
    /// Insert or replace the record for this `(phone, purpose)` key.
    /// The storage-level upsert is what serializes racing code requests.
    async fn upsert(&self, record: PendingVerification) -> Result<(), RepositoryError>;

    async fn get(
        &self,
        phone: &Phone,
        purpose: VerificationPurpose,
    ) -> Result<Option<PendingVerification>, RepositoryError>;

    /// Bump the attempt counter, returning the new value.
    async fn increment_attempts(
        &self,
        phone: &Phone,
        purpose: VerificationPurpose,
    ) -> Result<u32, RepositoryError>;

    async fn delete(
        &self,
        phone: &Phone,
        purpose: VerificationPurpose,
    ) -> Result<(), RepositoryError>;
}

/// Activity log collection (append-mostly).
#[async_trait]
pub trait ActivityStore: Send + Sync {
    async fn insert(&self, entry: NewActivityLog) -> Result<(), RepositoryError>;

    async fn list(
        &self,
        filter: &ActivityFilter,
        pagination: Pagination,
    ) -> Result<Page<ActivityLogEntry>, RepositoryError>;
}
