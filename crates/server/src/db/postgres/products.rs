//! Product repository backed by `PostgreSQL`.
//!
//! Stock reservation is a single conditional `UPDATE`: the decrement only
//! happens when enough stock remains, so racing checkouts serialize at
//! the row lock instead of overdrawing through a read-then-write pair.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use zagros_core::{ProductId, Toman};

use crate::db::{ProductStore, RepositoryError, ReserveOutcome};
use crate::models::{NewProduct, Page, Pagination, Product, ProductUpdate};

/// Repository for product database operations.
#[derive(Clone)]
pub struct PgProductStore {
    pool: PgPool,
}

impl PgProductStore {
    /// Create a new product repository.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct ProductRow {
    id: i64,
    name: String,
    description: String,
    price: i64,
    stock: i32,
    is_active: bool,
    is_accessory: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<ProductRow> for Product {
    type Error = RepositoryError;

    fn try_from(row: ProductRow) -> Result<Self, RepositoryError> {
        let stock = u32::try_from(row.stock).map_err(|_| {
            RepositoryError::DataCorruption(format!(
                "negative stock for product {}: {}",
                row.id, row.stock
            ))
        })?;
        Ok(Self {
            id: ProductId::new(row.id),
            name: row.name,
            description: row.description,
            price: Toman::new(row.price),
            stock,
            is_active: row.is_active,
            is_accessory: row.is_accessory,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

const PRODUCT_COLUMNS: &str =
    "id, name, description, price, stock, is_active, is_accessory, created_at, updated_at";

#[async_trait]
impl ProductStore for PgProductStore {
    async fn create(&self, new: NewProduct) -> Result<Product, RepositoryError> {
        let row = sqlx::query_as::<_, ProductRow>(&format!(
            "INSERT INTO products (name, description, price, stock, is_active, is_accessory) \
             VALUES ($1, $2, $3, $4, $5, $6) \
             RETURNING {PRODUCT_COLUMNS}"
        ))
        .bind(&new.name)
        .bind(&new.description)
        .bind(new.price.as_i64())
        .bind(i64::from(new.stock))
        .bind(new.is_active)
        .bind(new.is_accessory)
        .fetch_one(&self.pool)
        .await?;

        row.try_into()
    }

    async fn update(
        &self,
        id: ProductId,
        update: ProductUpdate,
    ) -> Result<Option<Product>, RepositoryError> {
        let row = sqlx::query_as::<_, ProductRow>(&format!(
            "UPDATE products SET \
                 name = COALESCE($2, name), \
                 description = COALESCE($3, description), \
                 price = COALESCE($4, price), \
                 stock = COALESCE($5, stock), \
                 is_active = COALESCE($6, is_active), \
                 is_accessory = COALESCE($7, is_accessory), \
                 updated_at = now() \
             WHERE id = $1 \
             RETURNING {PRODUCT_COLUMNS}"
        ))
        .bind(id.as_i64())
        .bind(update.name)
        .bind(update.description)
        .bind(update.price.as_ref().map(Toman::as_i64))
        .bind(update.stock.map(i64::from))
        .bind(update.is_active)
        .bind(update.is_accessory)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Product::try_from).transpose()
    }

    async fn get(&self, id: ProductId) -> Result<Option<Product>, RepositoryError> {
        let row = sqlx::query_as::<_, ProductRow>(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products WHERE id = $1"
        ))
        .bind(id.as_i64())
        .fetch_optional(&self.pool)
        .await?;

        row.map(Product::try_from).transpose()
    }

    async fn list(&self, pagination: Pagination) -> Result<Page<Product>, RepositoryError> {
        let total = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM products WHERE is_active")
            .fetch_one(&self.pool)
            .await?;

        let rows = sqlx::query_as::<_, ProductRow>(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products WHERE is_active \
             ORDER BY id DESC LIMIT $1 OFFSET $2"
        ))
        .bind(i64::from(pagination.limit))
        .bind(i64::try_from(pagination.offset()).unwrap_or(i64::MAX))
        .fetch_all(&self.pool)
        .await?;

        let items = rows
            .into_iter()
            .map(Product::try_from)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Page::new(
            items,
            u64::try_from(total).unwrap_or(0),
            pagination,
        ))
    }

    async fn try_reserve(
        &self,
        id: ProductId,
        quantity: u32,
    ) -> Result<ReserveOutcome, RepositoryError> {
        // Conditional decrement: only succeeds when enough stock remains.
        let updated = sqlx::query(
            "UPDATE products SET stock = stock - $2, updated_at = now() \
             WHERE id = $1 AND stock >= $2",
        )
        .bind(id.as_i64())
        .bind(i64::from(quantity))
        .execute(&self.pool)
        .await?;

        if updated.rows_affected() > 0 {
            return Ok(ReserveOutcome::Reserved);
        }

        let exists = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM products WHERE id = $1")
            .bind(id.as_i64())
            .fetch_one(&self.pool)
            .await?;

        if exists > 0 {
            Ok(ReserveOutcome::InsufficientStock)
        } else {
            Ok(ReserveOutcome::NotFound)
        }
    }

    async fn release(&self, id: ProductId, quantity: u32) -> Result<(), RepositoryError> {
        sqlx::query("UPDATE products SET stock = stock + $2, updated_at = now() WHERE id = $1")
            .bind(id.as_i64())
            .bind(i64::from(quantity))
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
