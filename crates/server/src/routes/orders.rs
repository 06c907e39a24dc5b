//! Order route handlers.

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post, put},
};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use zagros_core::{
    OrderId, OrderStatus, PaymentMethod, PaymentStatus, ProductId, Toman, UserId,
};

use crate::auth::{CurrentUser, RequireAdmin};
use crate::error::{AppError, Result};
use crate::models::{Order, OrderFilter, OrderSort, Pagination, ShippingAddress};
use crate::services::orders::OrderListQuery;
use crate::services::{CartItemInput, ReportPeriod};
use crate::state::AppState;

/// Build the orders subrouter.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/validate-cart", post(validate_cart))
        .route("/", post(create_order).get(list_orders))
        .route("/{id}", get(get_order))
        .route("/{id}/status", put(update_status))
        .route("/stats/sales", get(sales_stats))
}

// =============================================================================
// Wire types
// =============================================================================

/// Public view of an order.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderView {
    pub id: OrderId,
    pub user_id: UserId,
    pub items: Vec<OrderItemView>,
    pub total_amount: Toman,
    pub status: OrderStatus,
    pub payment_status: PaymentStatus,
    pub payment_method: PaymentMethod,
    pub shipping_address: ShippingAddress,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tracking_number: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delivered_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment_ref_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub paid_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// One line of an order view.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderItemView {
    pub product_id: ProductId,
    pub name: String,
    pub price: Toman,
    pub quantity: u32,
}

impl From<Order> for OrderView {
    fn from(order: Order) -> Self {
        Self {
            id: order.id,
            user_id: order.user_id,
            items: order
                .items
                .into_iter()
                .map(|item| OrderItemView {
                    product_id: item.product_id,
                    name: item.name,
                    price: item.price,
                    quantity: item.quantity,
                })
                .collect(),
            total_amount: order.total_amount,
            status: order.status,
            payment_status: order.payment_status,
            payment_method: order.payment_method,
            shipping_address: order.shipping_address,
            note: order.note,
            tracking_number: order.tracking_number,
            delivered_at: order.delivered_at,
            payment_ref_id: order.payment_ref_id,
            paid_at: order.paid_at,
            created_at: order.created_at,
            updated_at: order.updated_at,
        }
    }
}

#[derive(Debug, Deserialize)]
struct ValidateCartRequest {
    items: Vec<CartItemInput>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateOrderRequest {
    items: Vec<CartItemInput>,
    shipping_address: ShippingAddressInput,
    payment_method: String,
    note: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ShippingAddressInput {
    name: String,
    phone: String,
    street: String,
    city: String,
    state: String,
    postal_code: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListOrdersQuery {
    user_id: Option<i64>,
    status: Option<String>,
    date_from: Option<String>,
    date_to: Option<String>,
    min_amount: Option<i64>,
    max_amount: Option<i64>,
    page: Option<u32>,
    limit: Option<u32>,
    sort: Option<String>,
}

#[derive(Debug, Deserialize)]
struct UpdateStatusRequest {
    status: String,
}

#[derive(Debug, Deserialize)]
struct SalesStatsQuery {
    period: Option<String>,
}

// =============================================================================
// Validation helpers
// =============================================================================

fn parse_shipping_address(input: ShippingAddressInput) -> Result<ShippingAddress> {
    if input.name.trim().len() < 2 {
        return Err(AppError::BadRequest(
            "recipient name must be at least 2 characters".to_owned(),
        ));
    }
    let phone = zagros_core::Phone::parse(&input.phone)
        .map_err(|e| AppError::BadRequest(format!("recipient phone: {e}")))?;
    if input.street.trim().len() < 5 {
        return Err(AppError::BadRequest(
            "street address must be at least 5 characters".to_owned(),
        ));
    }
    if input.city.trim().is_empty() || input.state.trim().is_empty() {
        return Err(AppError::BadRequest(
            "city and state are required".to_owned(),
        ));
    }
    if let Some(postal_code) = &input.postal_code
        && !postal_code.is_empty()
        && (postal_code.len() != 10 || !postal_code.bytes().all(|b| b.is_ascii_digit()))
    {
        return Err(AppError::BadRequest(
            "postal code must be 10 digits".to_owned(),
        ));
    }

    Ok(ShippingAddress {
        name: input.name.trim().to_owned(),
        phone,
        street: input.street.trim().to_owned(),
        city: input.city.trim().to_owned(),
        state: input.state.trim().to_owned(),
        postal_code: input.postal_code.filter(|p| !p.is_empty()),
    })
}

fn parse_order_status(raw: &str) -> Result<OrderStatus> {
    raw.parse().map_err(AppError::BadRequest)
}

/// Accept either an RFC 3339 timestamp or a plain `YYYY-MM-DD` date.
/// Plain dates snap to the start (or, for upper bounds, end) of the day.
pub(super) fn parse_date(raw: &str, end_of_day: bool) -> Result<DateTime<Utc>> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Ok(ts.with_timezone(&Utc));
    }
    let date = raw
        .parse::<NaiveDate>()
        .map_err(|_| AppError::BadRequest(format!("invalid date: {raw}")))?;
    let time = if end_of_day {
        date.and_hms_milli_opt(23, 59, 59, 999)
    } else {
        date.and_hms_opt(0, 0, 0)
    };
    time.map(|t| t.and_utc())
        .ok_or_else(|| AppError::BadRequest(format!("invalid date: {raw}")))
}

// =============================================================================
// Handlers
// =============================================================================

/// `POST /api/orders/validate-cart` - advisory server-side pricing.
async fn validate_cart(
    State(state): State<AppState>,
    Json(body): Json<ValidateCartRequest>,
) -> Result<impl IntoResponse> {
    let cart = state.orders().validate_cart(&body.items).await?;
    Ok(Json(cart))
}

/// `POST /api/orders` - checkout.
async fn create_order(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(body): Json<CreateOrderRequest>,
) -> Result<impl IntoResponse> {
    let shipping_address = parse_shipping_address(body.shipping_address)?;
    let payment_method: PaymentMethod = match body.payment_method.as_str() {
        // "cod" is the wire name the storefront uses for cash on delivery.
        "cod" => PaymentMethod::Cash,
        other => other.parse().map_err(AppError::BadRequest)?,
    };

    let order = state
        .orders()
        .create_order(user.id, &body.items, shipping_address, payment_method, body.note)
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(serde_json::json!({
            "message": "Order placed successfully",
            "order": OrderView::from(order),
        })),
    ))
}

/// `GET /api/orders` - list own orders, or any orders for admins.
async fn list_orders(
    State(state): State<AppState>,
    user: CurrentUser,
    Query(query): Query<ListOrdersQuery>,
) -> Result<impl IntoResponse> {
    let filter = OrderFilter {
        user_id: None, // filled in by the service from the caller's role
        status: query
            .status
            .as_deref()
            .map(parse_order_status)
            .transpose()?,
        date_from: query
            .date_from
            .as_deref()
            .map(|d| parse_date(d, false))
            .transpose()?,
        date_to: query
            .date_to
            .as_deref()
            .map(|d| parse_date(d, true))
            .transpose()?,
        min_amount: query.min_amount.map(Toman::new),
        max_amount: query.max_amount.map(Toman::new),
        sort: query
            .sort
            .as_deref()
            .map_or_else(OrderSort::default, OrderSort::from_query),
    };

    let page = state
        .orders()
        .list_orders(
            &user,
            OrderListQuery {
                user_id: query.user_id.map(UserId::new),
                filter,
                pagination: Pagination::clamped(
                    query.page.unwrap_or(1),
                    query.limit.unwrap_or(10),
                ),
            },
        )
        .await?;

    let total_pages = page.total_pages;
    let current_page = page.page;
    let total = page.total;
    let orders: Vec<OrderView> = page.items.into_iter().map(OrderView::from).collect();

    Ok(Json(serde_json::json!({
        "orders": orders,
        "pagination": {
            "currentPage": current_page,
            "totalPages": total_pages,
            "totalOrders": total,
            "hasNext": current_page < total_pages,
            "hasPrev": current_page > 1,
        },
    })))
}

/// `GET /api/orders/{id}`
async fn get_order(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse> {
    let order = state.orders().get_order(OrderId::new(id), &user).await?;
    Ok(Json(OrderView::from(order)))
}

/// `PUT /api/orders/{id}/status` - admin-only unconditional overwrite.
async fn update_status(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Path(id): Path<i64>,
    Json(body): Json<UpdateStatusRequest>,
) -> Result<impl IntoResponse> {
    let status = parse_order_status(&body.status)?;
    let order = state
        .orders()
        .update_status(OrderId::new(id), status, &admin)
        .await?;

    Ok(Json(serde_json::json!({
        "message": "Order status updated",
        "order": OrderView::from(order),
    })))
}

/// `GET /api/orders/stats/sales` - admin sales dashboard.
async fn sales_stats(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
    Query(query): Query<SalesStatsQuery>,
) -> Result<impl IntoResponse> {
    let period = query
        .period
        .as_deref()
        .map_or_else(ReportPeriod::default, ReportPeriod::from_query);
    let stats = state.reports().sales_statistics(period).await?;
    Ok(Json(stats))
}
