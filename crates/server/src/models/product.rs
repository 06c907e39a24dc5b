//! Product domain types.
//!
//! The order pipeline only depends on price, stock, and the active flag;
//! the rest exists for the minimal admin CRUD surface.

use chrono::{DateTime, Utc};

use zagros_core::{ProductId, Toman};

/// A sellable product.
#[derive(Debug, Clone)]
pub struct Product {
    /// Unique product ID.
    pub id: ProductId,
    /// Display name.
    pub name: String,
    /// Description shown on the product page.
    pub description: String,
    /// Current unit price in Toman. Never trusted from clients.
    pub price: Toman,
    /// Units available for sale. Never negative.
    pub stock: u32,
    /// Inactive products are hidden from listings.
    pub is_active: bool,
    /// Accessories can ride along on a main cart line.
    pub is_accessory: bool,
    /// When the product was created.
    pub created_at: DateTime<Utc>,
    /// When the product was last updated.
    pub updated_at: DateTime<Utc>,
}

/// Data required to create a product.
#[derive(Debug, Clone)]
pub struct NewProduct {
    pub name: String,
    pub description: String,
    pub price: Toman,
    pub stock: u32,
    pub is_active: bool,
    pub is_accessory: bool,
}

/// Partial product update; `None` fields are left untouched.
#[derive(Debug, Clone, Default)]
pub struct ProductUpdate {
    pub name: Option<String>,
    pub description: Option<String>,
    pub price: Option<Toman>,
    pub stock: Option<u32>,
    pub is_active: Option<bool>,
    pub is_accessory: Option<bool>,
}
