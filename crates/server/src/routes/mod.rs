//! HTTP routes.
//!
//! Handlers are a thin adapter: parse and validate the wire shape, call
//! the owning service with an already-authenticated caller, translate
//! errors through [`crate::error::AppError`]. No business rules live
//! here.

pub mod activity_logs;
pub mod auth;
pub mod orders;
pub mod payment;
pub mod products;
pub mod reports;

use axum::Router;

use crate::state::AppState;

/// Build the full API router.
pub fn routes() -> Router<AppState> {
    Router::new()
        .nest("/api/auth", auth::routes())
        .nest("/api/orders", orders::routes())
        .nest("/api/payment", payment::routes())
        .nest("/api/products", products::routes())
        .nest("/api/reports", reports::routes())
        .nest("/api/activity-logs", activity_logs::routes())
}
