//! Product route handlers.
//!
//! Public read access for the storefront, admin-only writes. Catalog
//! search and filtering live elsewhere; this is just the inventory
//! surface the order pipeline depends on.

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post, put},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use zagros_core::{ProductId, Toman};

use crate::auth::RequireAdmin;
use crate::error::{AppError, Result};
use crate::models::{NewProduct, Pagination, Product, ProductUpdate};
use crate::state::AppState;

/// Build the products subrouter.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list).post(create))
        .route("/{id}", get(get_one).put(update))
}

/// Public view of a product.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductView {
    pub id: ProductId,
    pub name: String,
    pub description: String,
    pub price: Toman,
    pub stock: u32,
    pub in_stock: bool,
    pub is_active: bool,
    pub is_accessory: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Product> for ProductView {
    fn from(product: Product) -> Self {
        Self {
            id: product.id,
            name: product.name,
            description: product.description,
            price: product.price,
            stock: product.stock,
            in_stock: product.stock > 0,
            is_active: product.is_active,
            is_accessory: product.is_accessory,
            created_at: product.created_at,
            updated_at: product.updated_at,
        }
    }
}

#[derive(Debug, Deserialize)]
struct ListQuery {
    page: Option<u32>,
    limit: Option<u32>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateProductRequest {
    name: String,
    #[serde(default)]
    description: String,
    price: i64,
    #[serde(default)]
    stock: u32,
    #[serde(default = "default_true")]
    is_active: bool,
    #[serde(default)]
    is_accessory: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UpdateProductRequest {
    name: Option<String>,
    description: Option<String>,
    price: Option<i64>,
    stock: Option<u32>,
    is_active: Option<bool>,
    is_accessory: Option<bool>,
}

const fn default_true() -> bool {
    true
}

fn check_price(price: i64) -> Result<Toman> {
    if price < 0 {
        return Err(AppError::BadRequest("price cannot be negative".to_owned()));
    }
    Ok(Toman::new(price))
}

/// `GET /api/products` - active products, newest first.
async fn list(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> Result<impl IntoResponse> {
    let page = state
        .products()
        .list(Pagination::clamped(
            query.page.unwrap_or(1),
            query.limit.unwrap_or(20),
        ))
        .await
        .map_err(AppError::Database)?;

    Ok(Json(page.map(ProductView::from)))
}

/// `GET /api/products/{id}`
async fn get_one(State(state): State<AppState>, Path(id): Path<i64>) -> Result<impl IntoResponse> {
    let product = state
        .products()
        .get(ProductId::new(id))
        .await
        .map_err(AppError::Database)?
        .ok_or_else(|| AppError::NotFound("product".to_owned()))?;

    Ok(Json(ProductView::from(product)))
}

/// `POST /api/products` - admin-only.
async fn create(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
    Json(body): Json<CreateProductRequest>,
) -> Result<impl IntoResponse> {
    if body.name.trim().is_empty() {
        return Err(AppError::BadRequest("product name is required".to_owned()));
    }
    let price = check_price(body.price)?;

    let product = state
        .products()
        .create(NewProduct {
            name: body.name.trim().to_owned(),
            description: body.description,
            price,
            stock: body.stock,
            is_active: body.is_active,
            is_accessory: body.is_accessory,
        })
        .await
        .map_err(AppError::Database)?;

    Ok((StatusCode::CREATED, Json(ProductView::from(product))))
}

/// `PUT /api/products/{id}` - admin-only partial update.
async fn update(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
    Path(id): Path<i64>,
    Json(body): Json<UpdateProductRequest>,
) -> Result<impl IntoResponse> {
    let price = body.price.map(check_price).transpose()?;

    let product = state
        .products()
        .update(
            ProductId::new(id),
            ProductUpdate {
                name: body.name,
                description: body.description,
                price,
                stock: body.stock,
                is_active: body.is_active,
                is_accessory: body.is_accessory,
            },
        )
        .await
        .map_err(AppError::Database)?
        .ok_or_else(|| AppError::NotFound("product".to_owned()))?;

    Ok(Json(ProductView::from(product)))
}
