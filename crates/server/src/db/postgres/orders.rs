//! Order repository backed by `PostgreSQL`.
//!
//! Payment settlement is a conditional update guarded on
//! `payment_status <> 'paid'`, which is what makes duplicate gateway
//! callbacks harmless at the storage layer.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, QueryBuilder};

use zagros_core::{OrderId, OrderStatus, PaymentMethod, PaymentStatus, ProductId, Toman, UserId};

use crate::db::{OrderStore, RepositoryError};
use crate::models::{
    NewOrder, Order, OrderFilter, OrderItem, OrderSort, Page, Pagination, ShippingAddress,
};

/// Repository for order database operations.
#[derive(Clone)]
pub struct PgOrderStore {
    pool: PgPool,
}

impl PgOrderStore {
    /// Create a new order repository.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Load the line items for a batch of orders in one query.
    async fn items_for(
        &self,
        order_ids: &[i64],
    ) -> Result<HashMap<i64, Vec<OrderItem>>, RepositoryError> {
        if order_ids.is_empty() {
            return Ok(HashMap::new());
        }

        let rows = sqlx::query_as::<_, ItemRow>(
            "SELECT order_id, product_id, name, price, quantity \
             FROM order_items WHERE order_id = ANY($1) ORDER BY id",
        )
        .bind(order_ids)
        .fetch_all(&self.pool)
        .await?;

        let mut grouped: HashMap<i64, Vec<OrderItem>> = HashMap::new();
        for row in rows {
            let item = OrderItem::try_from(&row)?;
            grouped.entry(row.order_id).or_default().push(item);
        }
        Ok(grouped)
    }

    async fn assemble(&self, rows: Vec<OrderRow>) -> Result<Vec<Order>, RepositoryError> {
        let ids: Vec<i64> = rows.iter().map(|r| r.id).collect();
        let mut items = self.items_for(&ids).await?;
        rows.into_iter()
            .map(|row| {
                let order_items = items.remove(&row.id).unwrap_or_default();
                row.into_order(order_items)
            })
            .collect()
    }
}

#[derive(sqlx::FromRow)]
struct OrderRow {
    id: i64,
    user_id: i64,
    total_amount: i64,
    status: String,
    payment_status: String,
    payment_method: String,
    shipping_address: serde_json::Value,
    note: Option<String>,
    tracking_number: Option<String>,
    delivered_at: Option<DateTime<Utc>>,
    payment_authority: Option<String>,
    payment_ref_id: Option<String>,
    paid_at: Option<DateTime<Utc>>,
    stock_released: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(sqlx::FromRow)]
struct ItemRow {
    order_id: i64,
    product_id: i64,
    name: String,
    price: i64,
    quantity: i32,
}

impl TryFrom<&ItemRow> for OrderItem {
    type Error = RepositoryError;

    fn try_from(row: &ItemRow) -> Result<Self, RepositoryError> {
        let quantity = u32::try_from(row.quantity).map_err(|_| {
            RepositoryError::DataCorruption(format!(
                "negative quantity on order {}: {}",
                row.order_id, row.quantity
            ))
        })?;
        Ok(Self {
            product_id: ProductId::new(row.product_id),
            name: row.name.clone(),
            price: Toman::new(row.price),
            quantity,
        })
    }
}

impl OrderRow {
    fn into_order(self, items: Vec<OrderItem>) -> Result<Order, RepositoryError> {
        let status: OrderStatus = self.status.parse().map_err(RepositoryError::DataCorruption)?;
        let payment_status: PaymentStatus = self
            .payment_status
            .parse()
            .map_err(RepositoryError::DataCorruption)?;
        let payment_method: PaymentMethod = self
            .payment_method
            .parse()
            .map_err(RepositoryError::DataCorruption)?;
        let shipping_address: ShippingAddress = serde_json::from_value(self.shipping_address)
            .map_err(|e| {
                RepositoryError::DataCorruption(format!("invalid shipping address: {e}"))
            })?;

        Ok(Order {
            id: OrderId::new(self.id),
            user_id: UserId::new(self.user_id),
            items,
            total_amount: Toman::new(self.total_amount),
            status,
            payment_status,
            payment_method,
            shipping_address,
            note: self.note,
            tracking_number: self.tracking_number,
            delivered_at: self.delivered_at,
            payment_authority: self.payment_authority,
            payment_ref_id: self.payment_ref_id,
            paid_at: self.paid_at,
            stock_released: self.stock_released,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

const ORDER_COLUMNS: &str = "id, user_id, total_amount, status, payment_status, payment_method, \
                             shipping_address, note, tracking_number, delivered_at, \
                             payment_authority, payment_ref_id, paid_at, stock_released, \
                             created_at, updated_at";

fn push_filters(builder: &mut QueryBuilder<'_, sqlx::Postgres>, filter: &OrderFilter) {
    if let Some(user_id) = filter.user_id {
        builder.push(" AND user_id = ").push_bind(user_id.as_i64());
    }
    if let Some(status) = filter.status {
        builder.push(" AND status = ").push_bind(status.to_string());
    }
    if let Some(from) = filter.date_from {
        builder.push(" AND created_at >= ").push_bind(from);
    }
    if let Some(to) = filter.date_to {
        builder.push(" AND created_at <= ").push_bind(to);
    }
    if let Some(min) = filter.min_amount {
        builder
            .push(" AND total_amount >= ")
            .push_bind(min.as_i64());
    }
    if let Some(max) = filter.max_amount {
        builder
            .push(" AND total_amount <= ")
            .push_bind(max.as_i64());
    }
}

const fn order_by(sort: OrderSort) -> &'static str {
    match sort {
        OrderSort::CreatedDesc => " ORDER BY created_at DESC",
        OrderSort::CreatedAsc => " ORDER BY created_at ASC",
        OrderSort::AmountAsc => " ORDER BY total_amount ASC",
        OrderSort::AmountDesc => " ORDER BY total_amount DESC",
        OrderSort::Status => " ORDER BY status ASC, created_at DESC",
    }
}

#[async_trait]
impl OrderStore for PgOrderStore {
    async fn create(&self, new: NewOrder) -> Result<Order, RepositoryError> {
        let shipping_address = serde_json::to_value(&new.shipping_address).map_err(|e| {
            RepositoryError::DataCorruption(format!("unserializable shipping address: {e}"))
        })?;

        let mut tx = self.pool.begin().await?;

        let row = sqlx::query_as::<_, OrderRow>(&format!(
            "INSERT INTO orders \
                 (user_id, total_amount, payment_method, shipping_address, note) \
             VALUES ($1, $2, $3, $4, $5) \
             RETURNING {ORDER_COLUMNS}"
        ))
        .bind(new.user_id.as_i64())
        .bind(new.total_amount.as_i64())
        .bind(new.payment_method.to_string())
        .bind(shipping_address)
        .bind(&new.note)
        .fetch_one(&mut *tx)
        .await?;

        for item in &new.items {
            sqlx::query(
                "INSERT INTO order_items (order_id, product_id, name, price, quantity) \
                 VALUES ($1, $2, $3, $4, $5)",
            )
            .bind(row.id)
            .bind(item.product_id.as_i64())
            .bind(&item.name)
            .bind(item.price.as_i64())
            .bind(i64::from(item.quantity))
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        row.into_order(new.items)
    }

    async fn get(&self, id: OrderId) -> Result<Option<Order>, RepositoryError> {
        let row = sqlx::query_as::<_, OrderRow>(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1"
        ))
        .bind(id.as_i64())
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => Ok(self.assemble(vec![row]).await?.pop()),
            None => Ok(None),
        }
    }

    async fn find_by_authority(&self, authority: &str) -> Result<Option<Order>, RepositoryError> {
        let row = sqlx::query_as::<_, OrderRow>(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE payment_authority = $1"
        ))
        .bind(authority)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => Ok(self.assemble(vec![row]).await?.pop()),
            None => Ok(None),
        }
    }

    async fn list(
        &self,
        filter: &OrderFilter,
        pagination: Pagination,
    ) -> Result<Page<Order>, RepositoryError> {
        let mut count = QueryBuilder::new("SELECT COUNT(*) FROM orders WHERE TRUE");
        push_filters(&mut count, filter);
        let total: i64 = count.build_query_scalar().fetch_one(&self.pool).await?;

        let mut query =
            QueryBuilder::new(format!("SELECT {ORDER_COLUMNS} FROM orders WHERE TRUE"));
        push_filters(&mut query, filter);
        query.push(order_by(filter.sort));
        query.push(" LIMIT ").push_bind(i64::from(pagination.limit));
        query
            .push(" OFFSET ")
            .push_bind(i64::try_from(pagination.offset()).unwrap_or(i64::MAX));

        let rows: Vec<OrderRow> = query.build_query_as().fetch_all(&self.pool).await?;
        let items = self.assemble(rows).await?;

        Ok(Page::new(
            items,
            u64::try_from(total).unwrap_or(0),
            pagination,
        ))
    }

    async fn created_between(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Order>, RepositoryError> {
        let rows = sqlx::query_as::<_, OrderRow>(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders \
             WHERE created_at >= $1 AND created_at < $2 ORDER BY created_at"
        ))
        .bind(start)
        .bind(end)
        .fetch_all(&self.pool)
        .await?;

        self.assemble(rows).await
    }

    async fn set_status(
        &self,
        id: OrderId,
        status: OrderStatus,
    ) -> Result<Option<Order>, RepositoryError> {
        let row = sqlx::query_as::<_, OrderRow>(&format!(
            "UPDATE orders SET \
                 status = $2, \
                 delivered_at = CASE \
                     WHEN $2 = 'delivered' THEN COALESCE(delivered_at, now()) \
                     ELSE delivered_at END, \
                 updated_at = now() \
             WHERE id = $1 \
             RETURNING {ORDER_COLUMNS}"
        ))
        .bind(id.as_i64())
        .bind(status.to_string())
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => Ok(self.assemble(vec![row]).await?.pop()),
            None => Ok(None),
        }
    }

    async fn set_payment_authority(
        &self,
        id: OrderId,
        authority: &str,
    ) -> Result<(), RepositoryError> {
        sqlx::query("UPDATE orders SET payment_authority = $2, updated_at = now() WHERE id = $1")
            .bind(id.as_i64())
            .bind(authority)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn record_payment(
        &self,
        id: OrderId,
        order_status: OrderStatus,
        ref_id: &str,
        paid_at: DateTime<Utc>,
    ) -> Result<bool, RepositoryError> {
        // The payment_status guard makes this transition exactly-once;
        // a duplicate callback sees zero rows affected.
        let updated = sqlx::query(
            "UPDATE orders SET \
                 payment_status = 'paid', \
                 status = $2, \
                 payment_ref_id = $3, \
                 paid_at = $4, \
                 updated_at = now() \
             WHERE id = $1 AND payment_status <> 'paid'",
        )
        .bind(id.as_i64())
        .bind(order_status.to_string())
        .bind(ref_id)
        .bind(paid_at)
        .execute(&self.pool)
        .await?;

        Ok(updated.rows_affected() > 0)
    }

    async fn set_payment_failed(&self, id: OrderId) -> Result<(), RepositoryError> {
        sqlx::query(
            "UPDATE orders SET payment_status = 'failed', updated_at = now() \
             WHERE id = $1 AND payment_status <> 'paid'",
        )
        .bind(id.as_i64())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn mark_stock_released(&self, id: OrderId) -> Result<bool, RepositoryError> {
        let updated = sqlx::query(
            "UPDATE orders SET stock_released = TRUE, updated_at = now() \
             WHERE id = $1 AND NOT stock_released",
        )
        .bind(id.as_i64())
        .execute(&self.pool)
        .await?;
        Ok(updated.rows_affected() > 0)
    }
}
