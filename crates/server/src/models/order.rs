//! Order domain types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use zagros_core::{
    OrderId, OrderStatus, PaymentMethod, PaymentStatus, Phone, ProductId, Toman, UserId,
};

/// A customer order.
#[derive(Debug, Clone)]
pub struct Order {
    /// Unique order ID.
    pub id: OrderId,
    /// Owning user.
    pub user_id: UserId,
    /// Priced line items, snapshotted at creation time.
    pub items: Vec<OrderItem>,
    /// Sum of `price * quantity` over the items. Derived, never
    /// client-supplied.
    pub total_amount: Toman,
    /// Fulfillment status.
    pub status: OrderStatus,
    /// Payment settlement status.
    pub payment_status: PaymentStatus,
    /// How the customer pays.
    pub payment_method: PaymentMethod,
    /// Where the order ships to.
    pub shipping_address: ShippingAddress,
    /// Optional customer note.
    pub note: Option<String>,
    /// Carrier tracking number, set when shipped.
    pub tracking_number: Option<String>,
    /// When the order was delivered.
    pub delivered_at: Option<DateTime<Utc>>,
    /// Gateway authority token for the most recent payment attempt.
    pub payment_authority: Option<String>,
    /// Gateway reference ID, set once a payment verifies.
    pub payment_ref_id: Option<String>,
    /// When payment was verified.
    pub paid_at: Option<DateTime<Utc>>,
    /// Guard so a cancelled order restocks its items at most once.
    pub stock_released: bool,
    /// When the order was placed.
    pub created_at: DateTime<Utc>,
    /// When the order was last updated.
    pub updated_at: DateTime<Utc>,
}

/// One priced line of an order.
///
/// Name and price are snapshots: later catalog edits must not change
/// what the customer agreed to pay.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderItem {
    pub product_id: ProductId,
    pub name: String,
    pub price: Toman,
    pub quantity: u32,
}

/// Shipping destination captured at checkout.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShippingAddress {
    /// Recipient name.
    pub name: String,
    /// Recipient phone.
    pub phone: Phone,
    pub street: String,
    pub city: String,
    pub state: String,
    #[serde(default)]
    pub postal_code: Option<String>,
}

/// Data required to persist an order.
#[derive(Debug, Clone)]
pub struct NewOrder {
    pub user_id: UserId,
    pub items: Vec<OrderItem>,
    pub total_amount: Toman,
    pub payment_method: PaymentMethod,
    pub shipping_address: ShippingAddress,
    pub note: Option<String>,
}

/// Filters for order listings.
#[derive(Debug, Clone, Default)]
pub struct OrderFilter {
    pub user_id: Option<UserId>,
    pub status: Option<OrderStatus>,
    pub date_from: Option<DateTime<Utc>>,
    pub date_to: Option<DateTime<Utc>>,
    pub min_amount: Option<Toman>,
    pub max_amount: Option<Toman>,
    pub sort: OrderSort,
}

/// Sort orders for listings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OrderSort {
    #[default]
    CreatedDesc,
    CreatedAsc,
    AmountAsc,
    AmountDesc,
    Status,
}

impl OrderSort {
    /// Parse the `sort` query parameter; unknown values fall back to the
    /// default ordering rather than failing the request.
    #[must_use]
    pub fn from_query(s: &str) -> Self {
        match s {
            "createdAt-asc" => Self::CreatedAsc,
            "amount-asc" => Self::AmountAsc,
            "amount-desc" => Self::AmountDesc,
            "status" => Self::Status,
            _ => Self::CreatedDesc,
        }
    }
}

/// Page request for listings.
#[derive(Debug, Clone, Copy)]
pub struct Pagination {
    /// 1-based page number.
    pub page: u32,
    /// Items per page.
    pub limit: u32,
}

impl Pagination {
    /// Largest page size a caller may request.
    pub const MAX_LIMIT: u32 = 100;

    /// Clamp raw query values into a sane page request.
    #[must_use]
    pub fn clamped(page: u32, limit: u32) -> Self {
        Self {
            page: page.max(1),
            limit: limit.clamp(1, Self::MAX_LIMIT),
        }
    }

    /// Rows to skip for this page.
    #[must_use]
    pub const fn offset(&self) -> u64 {
        (self.page as u64 - 1) * self.limit as u64
    }
}

impl Default for Pagination {
    fn default() -> Self {
        Self { page: 1, limit: 10 }
    }
}

/// One page of results plus pagination metadata.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: u64,
    pub page: u32,
    pub total_pages: u32,
}

impl<T> Page<T> {
    /// Assemble a page from a slice of results and the total row count.
    #[must_use]
    pub fn new(items: Vec<T>, total: u64, pagination: Pagination) -> Self {
        let total_pages = u32::try_from(total.div_ceil(u64::from(pagination.limit))).unwrap_or(0);
        Self {
            items,
            total,
            page: pagination.page,
            total_pages,
        }
    }

    /// Map the items while keeping the pagination metadata.
    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            items: self.items.into_iter().map(f).collect(),
            total: self.total,
            page: self.page,
            total_pages: self.total_pages,
        }
    }
}
