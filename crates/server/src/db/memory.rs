//! In-memory store.
//!
//! Implements every storage contract over plain maps behind one async
//! mutex, with the same observable semantics as the Postgres store:
//! conditional stock decrements, upsert-by-key verification records, and
//! once-only payment settlement. Used by the test suites and for running
//! the server without a database.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;

use zagros_core::{
    ActivityLogId, OrderId, OrderStatus, PaymentStatus, Phone, ProductId, UserId,
    VerificationPurpose,
};

use crate::models::{
    ActivityFilter, ActivityLogEntry, NewActivityLog, NewOrder, NewProduct, NewUser, Order,
    OrderFilter, OrderSort, Page, Pagination, PendingVerification, Product, ProductUpdate,
    ProfileUpdate, User,
};

use super::{
    ActivityStore, OrderStore, ProductStore, RepositoryError, ReserveOutcome, UserStore,
    VerificationStore,
};

#[derive(Debug, Clone)]
struct StoredUser {
    user: User,
    password_hash: String,
    refresh_tokens: Vec<(String, DateTime<Utc>)>,
}

#[derive(Default)]
struct Collections {
    users: HashMap<UserId, StoredUser>,
    products: HashMap<ProductId, Product>,
    orders: HashMap<OrderId, Order>,
    verifications: HashMap<(Phone, VerificationPurpose), PendingVerification>,
    activity: Vec<ActivityLogEntry>,
    next_user_id: i64,
    next_product_id: i64,
    next_order_id: i64,
    next_activity_id: i64,
}

/// In-memory implementation of all store contracts.
///
/// Cheap to clone; clones share the same collections.
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Mutex<Collections>>,
}

impl MemoryStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn create(&self, new: NewUser) -> Result<User, RepositoryError> {
        let mut c = self.inner.lock().await;

        let taken = c
            .users
            .values()
            .any(|s| s.user.phone == new.phone && s.user.phone_verified);
        if taken {
            return Err(RepositoryError::Conflict(
                "phone already registered".to_owned(),
            ));
        }

        c.next_user_id += 1;
        let now = Utc::now();
        let user = User {
            id: UserId::new(c.next_user_id),
            name: new.name,
            last_name: new.last_name,
            phone: new.phone,
            phone_verified: new.phone_verified,
            role: new.role,
            is_active: true,
            address: None,
            postal_code: None,
            created_at: now,
            updated_at: now,
        };
        c.users.insert(
            user.id,
            StoredUser {
                user: user.clone(),
                password_hash: new.password_hash,
                refresh_tokens: Vec::new(),
            },
        );
        Ok(user)
    }

    async fn get_by_id(&self, id: UserId) -> Result<Option<User>, RepositoryError> {
        let c = self.inner.lock().await;
        Ok(c.users.get(&id).map(|s| s.user.clone()))
    }

    async fn find_by_phone(&self, phone: &Phone) -> Result<Option<User>, RepositoryError> {
        let c = self.inner.lock().await;
        Ok(c.users
            .values()
            .find(|s| &s.user.phone == phone)
            .map(|s| s.user.clone()))
    }

    async fn password_hash(&self, id: UserId) -> Result<Option<String>, RepositoryError> {
        let c = self.inner.lock().await;
        Ok(c.users.get(&id).map(|s| s.password_hash.clone()))
    }

    async fn set_password_hash(&self, id: UserId, hash: &str) -> Result<(), RepositoryError> {
        let mut c = self.inner.lock().await;
        if let Some(stored) = c.users.get_mut(&id) {
            stored.password_hash = hash.to_owned();
            stored.user.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn update_profile(
        &self,
        id: UserId,
        update: ProfileUpdate,
    ) -> Result<Option<User>, RepositoryError> {
        let mut c = self.inner.lock().await;
        let Some(stored) = c.users.get_mut(&id) else {
            return Ok(None);
        };
        if let Some(name) = update.name {
            stored.user.name = name;
        }
        if let Some(last_name) = update.last_name {
            stored.user.last_name = last_name;
        }
        if let Some(address) = update.address {
            stored.user.address = Some(address);
        }
        if let Some(postal_code) = update.postal_code {
            stored.user.postal_code = postal_code;
        }
        stored.user.updated_at = Utc::now();
        Ok(Some(stored.user.clone()))
    }

    async fn add_refresh_token(
        &self,
        id: UserId,
        token: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<(), RepositoryError> {
        let mut c = self.inner.lock().await;
        if let Some(stored) = c.users.get_mut(&id) {
            stored.refresh_tokens.push((token.to_owned(), expires_at));
        }
        Ok(())
    }

    async fn refresh_token_valid(
        &self,
        id: UserId,
        token: &str,
        now: DateTime<Utc>,
    ) -> Result<bool, RepositoryError> {
        let c = self.inner.lock().await;
        Ok(c.users.get(&id).is_some_and(|s| {
            s.refresh_tokens
                .iter()
                .any(|(t, exp)| t == token && *exp > now)
        }))
    }

    async fn remove_refresh_token(&self, id: UserId, token: &str) -> Result<(), RepositoryError> {
        let mut c = self.inner.lock().await;
        if let Some(stored) = c.users.get_mut(&id) {
            stored.refresh_tokens.retain(|(t, _)| t != token);
        }
        Ok(())
    }
}

#[async_trait]
impl ProductStore for MemoryStore {
    async fn create(&self, new: NewProduct) -> Result<Product, RepositoryError> {
        let mut c = self.inner.lock().await;
        c.next_product_id += 1;
        let now = Utc::now();
        let product = Product {
            id: ProductId::new(c.next_product_id),
            name: new.name,
            description: new.description,
            price: new.price,
            stock: new.stock,
            is_active: new.is_active,
            is_accessory: new.is_accessory,
            created_at: now,
            updated_at: now,
        };
        c.products.insert(product.id, product.clone());
        Ok(product)
    }

    async fn update(
        &self,
        id: ProductId,
        update: ProductUpdate,
    ) -> Result<Option<Product>, RepositoryError> {
        let mut c = self.inner.lock().await;
        let Some(product) = c.products.get_mut(&id) else {
            return Ok(None);
        };
        if let Some(name) = update.name {
            product.name = name;
        }
        if let Some(description) = update.description {
            product.description = description;
        }
        if let Some(price) = update.price {
            product.price = price;
        }
        if let Some(stock) = update.stock {
            product.stock = stock;
        }
        if let Some(is_active) = update.is_active {
            product.is_active = is_active;
        }
        if let Some(is_accessory) = update.is_accessory {
            product.is_accessory = is_accessory;
        }
        product.updated_at = Utc::now();
        Ok(Some(product.clone()))
    }

    async fn get(&self, id: ProductId) -> Result<Option<Product>, RepositoryError> {
        let c = self.inner.lock().await;
        Ok(c.products.get(&id).cloned())
    }

    async fn list(&self, pagination: Pagination) -> Result<Page<Product>, RepositoryError> {
        let c = self.inner.lock().await;
        let mut active: Vec<Product> = c
            .products
            .values()
            .filter(|p| p.is_active)
            .cloned()
            .collect();
        active.sort_by(|a, b| b.id.cmp(&a.id));
        let total = active.len() as u64;
        let items = active
            .into_iter()
            .skip(usize::try_from(pagination.offset()).unwrap_or(usize::MAX))
            .take(pagination.limit as usize)
            .collect();
        Ok(Page::new(items, total, pagination))
    }

    async fn try_reserve(
        &self,
        id: ProductId,
        quantity: u32,
    ) -> Result<ReserveOutcome, RepositoryError> {
        let mut c = self.inner.lock().await;
        // Check and decrement under the same lock, mirroring the
        // conditional UPDATE the Postgres store uses.
        match c.products.get_mut(&id) {
            None => Ok(ReserveOutcome::NotFound),
            Some(product) if product.stock < quantity => Ok(ReserveOutcome::InsufficientStock),
            Some(product) => {
                product.stock -= quantity;
                product.updated_at = Utc::now();
                Ok(ReserveOutcome::Reserved)
            }
        }
    }

    async fn release(&self, id: ProductId, quantity: u32) -> Result<(), RepositoryError> {
        let mut c = self.inner.lock().await;
        if let Some(product) = c.products.get_mut(&id) {
            product.stock += quantity;
            product.updated_at = Utc::now();
        }
        Ok(())
    }
}

#[async_trait]
impl OrderStore for MemoryStore {
    async fn create(&self, new: NewOrder) -> Result<Order, RepositoryError> {
        let mut c = self.inner.lock().await;
        c.next_order_id += 1;
        let now = Utc::now();
        let order = Order {
            id: OrderId::new(c.next_order_id),
            user_id: new.user_id,
            items: new.items,
            total_amount: new.total_amount,
            status: OrderStatus::Pending,
            payment_status: PaymentStatus::Pending,
            payment_method: new.payment_method,
            shipping_address: new.shipping_address,
            note: new.note,
            tracking_number: None,
            delivered_at: None,
            payment_authority: None,
            payment_ref_id: None,
            paid_at: None,
            stock_released: false,
            created_at: now,
            updated_at: now,
        };
        c.orders.insert(order.id, order.clone());
        Ok(order)
    }

    async fn get(&self, id: OrderId) -> Result<Option<Order>, RepositoryError> {
        let c = self.inner.lock().await;
        Ok(c.orders.get(&id).cloned())
    }

    async fn find_by_authority(&self, authority: &str) -> Result<Option<Order>, RepositoryError> {
        let c = self.inner.lock().await;
        Ok(c.orders
            .values()
            .find(|o| o.payment_authority.as_deref() == Some(authority))
            .cloned())
    }

    async fn list(
        &self,
        filter: &OrderFilter,
        pagination: Pagination,
    ) -> Result<Page<Order>, RepositoryError> {
        let c = self.inner.lock().await;
        let mut matched: Vec<Order> = c
            .orders
            .values()
            .filter(|o| filter.user_id.is_none_or(|u| o.user_id == u))
            .filter(|o| filter.status.is_none_or(|s| o.status == s))
            .filter(|o| filter.date_from.is_none_or(|d| o.created_at >= d))
            .filter(|o| filter.date_to.is_none_or(|d| o.created_at <= d))
            .filter(|o| filter.min_amount.is_none_or(|a| o.total_amount >= a))
            .filter(|o| filter.max_amount.is_none_or(|a| o.total_amount <= a))
            .cloned()
            .collect();

        match filter.sort {
            OrderSort::CreatedDesc => matched.sort_by(|a, b| b.created_at.cmp(&a.created_at)),
            OrderSort::CreatedAsc => matched.sort_by(|a, b| a.created_at.cmp(&b.created_at)),
            OrderSort::AmountAsc => matched.sort_by(|a, b| a.total_amount.cmp(&b.total_amount)),
            OrderSort::AmountDesc => matched.sort_by(|a, b| b.total_amount.cmp(&a.total_amount)),
            OrderSort::Status => matched.sort_by(|a, b| {
                a.status
                    .to_string()
                    .cmp(&b.status.to_string())
                    .then_with(|| b.created_at.cmp(&a.created_at))
            }),
        }

        let total = matched.len() as u64;
        let items = matched
            .into_iter()
            .skip(usize::try_from(pagination.offset()).unwrap_or(usize::MAX))
            .take(pagination.limit as usize)
            .collect();
        Ok(Page::new(items, total, pagination))
    }

    async fn created_between(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Order>, RepositoryError> {
        let c = self.inner.lock().await;
        let mut orders: Vec<Order> = c
            .orders
            .values()
            .filter(|o| o.created_at >= start && o.created_at < end)
            .cloned()
            .collect();
        orders.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(orders)
    }

    async fn set_status(
        &self,
        id: OrderId,
        status: OrderStatus,
    ) -> Result<Option<Order>, RepositoryError> {
        let mut c = self.inner.lock().await;
        let Some(order) = c.orders.get_mut(&id) else {
            return Ok(None);
        };
        order.status = status;
        if status == OrderStatus::Delivered && order.delivered_at.is_none() {
            order.delivered_at = Some(Utc::now());
        }
        order.updated_at = Utc::now();
        Ok(Some(order.clone()))
    }

    async fn set_payment_authority(
        &self,
        id: OrderId,
        authority: &str,
    ) -> Result<(), RepositoryError> {
        let mut c = self.inner.lock().await;
        if let Some(order) = c.orders.get_mut(&id) {
            order.payment_authority = Some(authority.to_owned());
            order.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn record_payment(
        &self,
        id: OrderId,
        order_status: OrderStatus,
        ref_id: &str,
        paid_at: DateTime<Utc>,
    ) -> Result<bool, RepositoryError> {
        let mut c = self.inner.lock().await;
        let Some(order) = c.orders.get_mut(&id) else {
            return Ok(false);
        };
        if order.payment_status == PaymentStatus::Paid {
            return Ok(false);
        }
        order.payment_status = PaymentStatus::Paid;
        order.status = order_status;
        order.payment_ref_id = Some(ref_id.to_owned());
        order.paid_at = Some(paid_at);
        order.updated_at = Utc::now();
        Ok(true)
    }

    async fn set_payment_failed(&self, id: OrderId) -> Result<(), RepositoryError> {
        let mut c = self.inner.lock().await;
        if let Some(order) = c.orders.get_mut(&id)
            && order.payment_status != PaymentStatus::Paid
        {
            order.payment_status = PaymentStatus::Failed;
            order.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn mark_stock_released(&self, id: OrderId) -> Result<bool, RepositoryError> {
        let mut c = self.inner.lock().await;
        let Some(order) = c.orders.get_mut(&id) else {
            return Ok(false);
        };
        if order.stock_released {
            return Ok(false);
        }
        order.stock_released = true;
        order.updated_at = Utc::now();
        Ok(true)
    }
}

#[async_trait]
impl VerificationStore for MemoryStore {
    async fn upsert(&self, record: PendingVerification) -> Result<(), RepositoryError> {
        let mut c = self.inner.lock().await;
        c.verifications
            .insert((record.phone.clone(), record.purpose), record);
        Ok(())
    }

    async fn get(
        &self,
        phone: &Phone,
        purpose: VerificationPurpose,
    ) -> Result<Option<PendingVerification>, RepositoryError> {
        let c = self.inner.lock().await;
        Ok(c.verifications.get(&(phone.clone(), purpose)).cloned())
    }

    async fn increment_attempts(
        &self,
        phone: &Phone,
        purpose: VerificationPurpose,
    ) -> Result<u32, RepositoryError> {
        let mut c = self.inner.lock().await;
        match c.verifications.get_mut(&(phone.clone(), purpose)) {
            Some(record) => {
                record.attempts += 1;
                Ok(record.attempts)
            }
            None => Ok(0),
        }
    }

    async fn delete(
        &self,
        phone: &Phone,
        purpose: VerificationPurpose,
    ) -> Result<(), RepositoryError> {
        let mut c = self.inner.lock().await;
        c.verifications.remove(&(phone.clone(), purpose));
        Ok(())
    }
}

#[async_trait]
impl ActivityStore for MemoryStore {
    async fn insert(&self, entry: NewActivityLog) -> Result<(), RepositoryError> {
        let mut c = self.inner.lock().await;
        c.next_activity_id += 1;
        let stored = ActivityLogEntry {
            id: ActivityLogId::new(c.next_activity_id),
            user_id: entry.user_id,
            action: entry.action,
            entity: entry.entity,
            entity_id: entry.entity_id,
            description: entry.description,
            metadata: entry.metadata,
            created_at: Utc::now(),
        };
        c.activity.push(stored);
        Ok(())
    }

    async fn list(
        &self,
        filter: &ActivityFilter,
        pagination: Pagination,
    ) -> Result<Page<ActivityLogEntry>, RepositoryError> {
        let c = self.inner.lock().await;
        let mut matched: Vec<ActivityLogEntry> = c
            .activity
            .iter()
            .filter(|e| filter.user_id.is_none_or(|u| e.user_id == u))
            .filter(|e| filter.action.as_ref().is_none_or(|a| &e.action == a))
            .filter(|e| filter.entity.as_ref().is_none_or(|a| &e.entity == a))
            .filter(|e| filter.date_from.is_none_or(|d| e.created_at >= d))
            .filter(|e| filter.date_to.is_none_or(|d| e.created_at <= d))
            .cloned()
            .collect();
        matched.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        let total = matched.len() as u64;
        let items = matched
            .into_iter()
            .skip(usize::try_from(pagination.offset()).unwrap_or(usize::MAX))
            .take(pagination.limit as usize)
            .collect();
        Ok(Page::new(items, total, pagination))
    }
}
