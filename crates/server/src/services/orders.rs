//! Order lifecycle: cart validation, checkout, payment, status changes.
//!
//! Checkout is all-or-nothing with respect to stock. Each line item is
//! reserved through the store's atomic conditional decrement; if any
//! later step of the same checkout fails, every reservation made so far
//! is released again, so a failed order never leaks inventory.
//!
//! Payment settlement is exactly-once per authority: the store-level
//! conditional update wins or loses the race, and losers simply report
//! the already-settled result.

use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{error, info, instrument, warn};

use zagros_core::{
    OrderId, OrderStatus, PaymentMethod, PaymentStatus, ProductId, Toman, UserId,
    on_payment_verified,
};

use crate::auth::CurrentUser;
use crate::db::{OrderStore, ProductStore, RepositoryError, ReserveOutcome};
use crate::gateways::{GatewayError, PaymentGateway, PaymentRequest};
use crate::models::{
    NewActivityLog, NewOrder, Order, OrderFilter, OrderItem, Page, Pagination, ShippingAddress,
};
use crate::services::activity::ActivityLogger;

/// Largest quantity a single cart line may carry.
const MAX_ITEM_QUANTITY: u32 = 100;

/// Errors from the order lifecycle.
#[derive(Debug, thiserror::Error)]
pub enum OrderError {
    /// The cart is empty.
    #[error("cart is empty")]
    EmptyCart,

    /// A line quantity is outside `1..=100`.
    #[error("item quantity must be between 1 and {MAX_ITEM_QUANTITY}")]
    QuantityOutOfRange,

    /// A referenced product does not exist.
    #[error("product {product_id} not found")]
    ProductNotFound {
        /// The dangling reference.
        product_id: ProductId,
    },

    /// Requested quantity exceeds current stock.
    #[error("insufficient stock for {name}: {available} available")]
    InsufficientStock {
        /// Product name for the user-facing message.
        name: String,
        /// Stock at the time of the attempt.
        available: u32,
    },

    /// No such order (or not visible to the caller).
    #[error("order not found")]
    OrderNotFound,

    /// Caller does not own the order.
    #[error("access to this order is forbidden")]
    Forbidden,

    /// The order is already paid.
    #[error("order is already paid")]
    AlreadyPaid,

    /// The order was cancelled and can no longer be paid.
    #[error("order is cancelled")]
    OrderCancelled,

    /// Line totals overflowed. Practically unreachable with bounded
    /// quantities, but never silently wrapped.
    #[error("order total overflow")]
    AmountOverflow,

    /// Payment gateway failure.
    #[error(transparent)]
    Gateway(#[from] GatewayError),

    /// Storage failure.
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

/// One cart line as submitted by the client. Prices never appear here;
/// they are always re-read from the product store.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartItemInput {
    pub product_id: ProductId,
    pub quantity: u32,
    #[serde(default)]
    pub accessories: Vec<AccessoryInput>,
}

/// An accessory riding on a cart line.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessoryInput {
    pub accessory_id: ProductId,
    pub quantity: u32,
}

/// Server-priced mirror of a submitted cart.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidatedCart {
    pub items: Vec<ValidatedItem>,
    pub total_price: Toman,
    pub is_valid: bool,
}

/// A validated cart line with the authoritative price.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidatedItem {
    pub product_id: ProductId,
    pub name: String,
    pub price: Toman,
    pub quantity: u32,
    pub accessories: Vec<ValidatedAccessory>,
}

/// A validated accessory line.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidatedAccessory {
    pub accessory_id: ProductId,
    pub name: String,
    pub price: Toman,
    pub quantity: u32,
}

/// A created payment request.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentStarted {
    /// Where to redirect the customer.
    pub payment_url: String,
    /// Gateway token identifying this attempt.
    pub authority: String,
}

/// What the gateway callback told us.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallbackStatus {
    /// The customer completed the gateway flow.
    Ok,
    /// The customer backed out; the order stays payable.
    Cancelled,
}

impl CallbackStatus {
    /// Parse the gateway's `Status` query parameter.
    #[must_use]
    pub fn from_query(s: &str) -> Self {
        if s == "OK" { Self::Ok } else { Self::Cancelled }
    }
}

/// Result of processing a payment callback.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum PaymentOutcome {
    /// This callback settled the payment.
    Verified { order_id: OrderId, ref_id: String },
    /// The payment was already settled; nothing changed.
    AlreadyVerified {
        order_id: OrderId,
        ref_id: Option<String>,
    },
    /// The customer cancelled; the order remains payable.
    CancelledByUser { order_id: OrderId },
    /// The gateway rejected the payment.
    Failed { order_id: OrderId, message: String },
}

/// Query parameters for order listings.
#[derive(Debug, Clone, Default)]
pub struct OrderListQuery {
    pub user_id: Option<UserId>,
    pub filter: OrderFilter,
    pub pagination: Pagination,
}

/// The order lifecycle service.
#[derive(Clone)]
pub struct OrderService {
    products: Arc<dyn ProductStore>,
    orders: Arc<dyn OrderStore>,
    payment: Arc<dyn PaymentGateway>,
    activity: ActivityLogger,
    public_base_url: String,
}

impl OrderService {
    /// Create the service.
    #[must_use]
    pub fn new(
        products: Arc<dyn ProductStore>,
        orders: Arc<dyn OrderStore>,
        payment: Arc<dyn PaymentGateway>,
        activity: ActivityLogger,
        public_base_url: String,
    ) -> Self {
        Self {
            products,
            orders,
            payment,
            activity,
            public_base_url,
        }
    }

    // =========================================================================
    // Cart validation
    // =========================================================================

    /// Price a submitted cart against the authoritative catalog.
    ///
    /// Purely advisory and side-effect free: no stock moves, and calling
    /// it repeatedly with unchanged stock yields identical results.
    /// Requested quantities are clamped to available stock; accessories
    /// that are missing or out of stock are silently dropped rather than
    /// failing the whole cart.
    ///
    /// # Errors
    ///
    /// Returns `ProductNotFound` if a main line references a product
    /// that does not exist, `EmptyCart` / `QuantityOutOfRange` on
    /// malformed input.
    #[instrument(skip(self, items), fields(lines = items.len()))]
    pub async fn validate_cart(
        &self,
        items: &[CartItemInput],
    ) -> Result<ValidatedCart, OrderError> {
        check_cart_shape(items)?;

        let mut validated = Vec::with_capacity(items.len());
        let mut total = Toman::ZERO;

        for item in items {
            let product = self
                .products
                .get(item.product_id)
                .await?
                .ok_or(OrderError::ProductNotFound {
                    product_id: item.product_id,
                })?;

            let quantity = item.quantity.min(product.stock.max(1));

            let mut accessories = Vec::new();
            for acc in &item.accessories {
                let Some(accessory) = self.products.get(acc.accessory_id).await? else {
                    continue;
                };
                if accessory.stock < acc.quantity {
                    continue;
                }
                total = total
                    .saturating_add(accessory.price.times(acc.quantity).ok_or(OrderError::AmountOverflow)?);
                accessories.push(ValidatedAccessory {
                    accessory_id: accessory.id,
                    name: accessory.name,
                    price: accessory.price,
                    quantity: acc.quantity,
                });
            }

            total = total
                .saturating_add(product.price.times(quantity).ok_or(OrderError::AmountOverflow)?);
            validated.push(ValidatedItem {
                product_id: product.id,
                name: product.name,
                price: product.price,
                quantity,
                accessories,
            });
        }

        Ok(ValidatedCart {
            items: validated,
            total_price: total,
            is_valid: true,
        })
    }

    // =========================================================================
    // Checkout
    // =========================================================================

    /// Create an order: re-validate every line against the authority,
    /// reserve stock atomically, and persist the order as
    /// `pending`/`pending`.
    ///
    /// Client-supplied prices never exist in the input; the total is
    /// computed strictly from the catalog. If any step fails after some
    /// lines were already reserved, those reservations are released
    /// before the error is returned.
    ///
    /// # Errors
    ///
    /// Returns `InsufficientStock` when a requested quantity exceeds
    /// current stock, `ProductNotFound` for dangling references, plus
    /// the input-shape errors of [`Self::validate_cart`].
    #[instrument(skip_all, fields(user_id = %user_id, lines = items.len()))]
    pub async fn create_order(
        &self,
        user_id: UserId,
        items: &[CartItemInput],
        shipping_address: ShippingAddress,
        payment_method: PaymentMethod,
        note: Option<String>,
    ) -> Result<Order, OrderError> {
        check_cart_shape(items)?;

        let mut reserved: Vec<(ProductId, u32)> = Vec::new();
        let mut order_items: Vec<OrderItem> = Vec::new();
        let mut total = Toman::ZERO;

        for item in items {
            let product = match self.products.get(item.product_id).await {
                Ok(Some(product)) => product,
                Ok(None) => {
                    self.release_all(&reserved).await;
                    return Err(OrderError::ProductNotFound {
                        product_id: item.product_id,
                    });
                }
                Err(e) => {
                    self.release_all(&reserved).await;
                    return Err(e.into());
                }
            };

            match self.products.try_reserve(product.id, item.quantity).await {
                Ok(ReserveOutcome::Reserved) => reserved.push((product.id, item.quantity)),
                Ok(ReserveOutcome::InsufficientStock) => {
                    self.release_all(&reserved).await;
                    return Err(OrderError::InsufficientStock {
                        name: product.name,
                        available: product.stock,
                    });
                }
                Ok(ReserveOutcome::NotFound) => {
                    self.release_all(&reserved).await;
                    return Err(OrderError::ProductNotFound {
                        product_id: product.id,
                    });
                }
                Err(e) => {
                    self.release_all(&reserved).await;
                    return Err(e.into());
                }
            }

            let Some(line_total) = product.price.times(item.quantity) else {
                self.release_all(&reserved).await;
                return Err(OrderError::AmountOverflow);
            };
            total = total.saturating_add(line_total);

            order_items.push(OrderItem {
                product_id: product.id,
                name: product.name,
                price: product.price,
                quantity: item.quantity,
            });
        }

        let new_order = NewOrder {
            user_id,
            items: order_items,
            total_amount: total,
            payment_method,
            shipping_address,
            note,
        };

        match self.orders.create(new_order).await {
            Ok(order) => {
                info!(order_id = %order.id, total = %order.total_amount, "order created");
                Ok(order)
            }
            Err(e) => {
                // Persistence failed after stock was committed; put it back.
                self.release_all(&reserved).await;
                Err(e.into())
            }
        }
    }

    // =========================================================================
    // Payment
    // =========================================================================

    /// Ask the gateway for a redirect URL to pay an order.
    ///
    /// Repeated calls mint a fresh authority each time; earlier ones are
    /// abandoned (overwritten on the order), not invalidated.
    ///
    /// # Errors
    ///
    /// `OrderNotFound`, `Forbidden` for non-owners, `AlreadyPaid`,
    /// `OrderCancelled`, or a gateway error.
    #[instrument(skip(self, caller), fields(order_id = %order_id, user_id = %caller.id))]
    pub async fn create_payment_request(
        &self,
        order_id: OrderId,
        caller: &CurrentUser,
    ) -> Result<PaymentStarted, OrderError> {
        let order = self
            .orders
            .get(order_id)
            .await?
            .ok_or(OrderError::OrderNotFound)?;

        if order.user_id != caller.id {
            return Err(OrderError::Forbidden);
        }
        if order.payment_status == PaymentStatus::Paid {
            return Err(OrderError::AlreadyPaid);
        }
        if order.status == OrderStatus::Cancelled {
            return Err(OrderError::OrderCancelled);
        }

        let request = PaymentRequest {
            amount: order.total_amount,
            description: format!("payment for order {}", order.id),
            callback_url: format!(
                "{}/order-success?orderId={}",
                self.public_base_url, order.id
            ),
            metadata: serde_json::json!({
                "order_id": order.id.to_string(),
                "user_id": caller.id.to_string(),
            }),
        };

        let created = self.payment.create_request(&request).await?;
        self.orders
            .set_payment_authority(order.id, &created.authority)
            .await?;

        info!(order_id = %order.id, authority = %created.authority, "payment request created");

        Ok(PaymentStarted {
            payment_url: created.redirect_url,
            authority: created.authority,
        })
    }

    /// Process the gateway callback for a payment attempt.
    ///
    /// Idempotent per authority: an already-paid order short-circuits to
    /// [`PaymentOutcome::AlreadyVerified`] without touching the gateway
    /// or the order. Verification always uses the order's stored total,
    /// never anything from the callback, so a tampered amount cannot
    /// settle.
    ///
    /// # Errors
    ///
    /// `OrderNotFound` if no order carries the authority, or a gateway
    /// transport error.
    #[instrument(skip(self))]
    pub async fn verify_payment(
        &self,
        authority: &str,
        callback: CallbackStatus,
    ) -> Result<PaymentOutcome, OrderError> {
        let order = self
            .orders
            .find_by_authority(authority)
            .await?
            .ok_or(OrderError::OrderNotFound)?;

        if order.payment_status == PaymentStatus::Paid {
            return Ok(PaymentOutcome::AlreadyVerified {
                order_id: order.id,
                ref_id: order.payment_ref_id,
            });
        }

        if callback == CallbackStatus::Cancelled {
            info!(order_id = %order.id, "payment cancelled by customer");
            return Ok(PaymentOutcome::CancelledByUser { order_id: order.id });
        }

        match self.payment.verify(authority, order.total_amount).await? {
            crate::gateways::VerifyOutcome::Verified { ref_id } => {
                let (next_status, _) = on_payment_verified(order.status);
                let settled = self
                    .orders
                    .record_payment(order.id, next_status, &ref_id, Utc::now())
                    .await?;

                if settled {
                    info!(order_id = %order.id, ref_id = %ref_id, "payment verified");
                    Ok(PaymentOutcome::Verified {
                        order_id: order.id,
                        ref_id,
                    })
                } else {
                    // A concurrent callback settled first; report its result.
                    let fresh = self.orders.get(order.id).await?;
                    Ok(PaymentOutcome::AlreadyVerified {
                        order_id: order.id,
                        ref_id: fresh.and_then(|o| o.payment_ref_id),
                    })
                }
            }
            crate::gateways::VerifyOutcome::Rejected { code, message } => {
                warn!(order_id = %order.id, code, error = %message, "payment verification rejected");
                self.orders.set_payment_failed(order.id).await?;
                Ok(PaymentOutcome::Failed {
                    order_id: order.id,
                    message,
                })
            }
        }
    }

    /// Payment status view for the owning customer.
    ///
    /// # Errors
    ///
    /// `OrderNotFound`, or `Forbidden` for non-owners.
    pub async fn payment_status(
        &self,
        order_id: OrderId,
        caller: &CurrentUser,
    ) -> Result<Order, OrderError> {
        let order = self
            .orders
            .get(order_id)
            .await?
            .ok_or(OrderError::OrderNotFound)?;
        if order.user_id != caller.id {
            return Err(OrderError::Forbidden);
        }
        Ok(order)
    }

    // =========================================================================
    // Status management
    // =========================================================================

    /// Admin status overwrite. Transitions are unconditional; the one
    /// side effect is that cancelling an unpaid order releases its
    /// reserved stock, exactly once.
    ///
    /// # Errors
    ///
    /// `OrderNotFound` if the order does not exist.
    #[instrument(skip(self, actor), fields(order_id = %order_id, actor = %actor.id))]
    pub async fn update_status(
        &self,
        order_id: OrderId,
        new_status: OrderStatus,
        actor: &CurrentUser,
    ) -> Result<Order, OrderError> {
        let before = self
            .orders
            .get(order_id)
            .await?
            .ok_or(OrderError::OrderNotFound)?;

        let updated = self
            .orders
            .set_status(order_id, new_status)
            .await?
            .ok_or(OrderError::OrderNotFound)?;

        if new_status == OrderStatus::Cancelled && updated.payment_status != PaymentStatus::Paid {
            self.restock_once(&updated).await?;
        }

        self.activity.record(NewActivityLog {
            user_id: actor.id,
            action: "order_status_change".to_owned(),
            entity: "order".to_owned(),
            entity_id: Some(order_id.to_string()),
            description: format!(
                "order {order_id} status changed from {} to {new_status}",
                before.status
            ),
            metadata: serde_json::json!({
                "old_status": before.status,
                "new_status": new_status,
            }),
        });

        Ok(updated)
    }

    /// Release the order's reserved stock, guarded so repeated
    /// cancellations restock at most once.
    async fn restock_once(&self, order: &Order) -> Result<(), OrderError> {
        if !self.orders.mark_stock_released(order.id).await? {
            return Ok(());
        }
        for item in &order.items {
            if let Err(e) = self.products.release(item.product_id, item.quantity).await {
                error!(
                    order_id = %order.id,
                    product_id = %item.product_id,
                    error = %e,
                    "failed to restock cancelled order line"
                );
            }
        }
        info!(order_id = %order.id, "cancelled order restocked");
        Ok(())
    }

    // =========================================================================
    // Queries
    // =========================================================================

    /// Fetch one order; customers see only their own, admins see all.
    ///
    /// # Errors
    ///
    /// `OrderNotFound` - also for orders the caller may not see, so
    /// existence does not leak.
    pub async fn get_order(
        &self,
        order_id: OrderId,
        caller: &CurrentUser,
    ) -> Result<Order, OrderError> {
        let order = self
            .orders
            .get(order_id)
            .await?
            .ok_or(OrderError::OrderNotFound)?;
        if !caller.is_admin() && order.user_id != caller.id {
            return Err(OrderError::OrderNotFound);
        }
        Ok(order)
    }

    /// List orders. Non-admin callers are always scoped to their own
    /// orders regardless of the requested filter.
    ///
    /// # Errors
    ///
    /// Returns [`OrderError::Repository`] on storage failure.
    pub async fn list_orders(
        &self,
        caller: &CurrentUser,
        mut query: OrderListQuery,
    ) -> Result<Page<Order>, OrderError> {
        query.filter.user_id = if caller.is_admin() {
            query.user_id
        } else {
            Some(caller.id)
        };

        let page = self.orders.list(&query.filter, query.pagination).await?;
        Ok(page)
    }

    async fn release_all(&self, reserved: &[(ProductId, u32)]) {
        for (product_id, quantity) in reserved {
            if let Err(e) = self.products.release(*product_id, *quantity).await {
                error!(
                    product_id = %product_id,
                    quantity,
                    error = %e,
                    "failed to release reserved stock"
                );
            }
        }
    }
}

fn check_cart_shape(items: &[CartItemInput]) -> Result<(), OrderError> {
    if items.is_empty() {
        return Err(OrderError::EmptyCart);
    }
    for item in items {
        if item.quantity == 0 || item.quantity > MAX_ITEM_QUANTITY {
            return Err(OrderError::QuantityOutOfRange);
        }
        for acc in &item.accessories {
            if acc.quantity == 0 || acc.quantity > MAX_ITEM_QUANTITY {
                return Err(OrderError::QuantityOutOfRange);
            }
        }
    }
    Ok(())
}
