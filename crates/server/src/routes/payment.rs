//! Payment route handlers.
//!
//! `verify` is the gateway's redirect target: the customer lands here
//! after the gateway flow, carrying only the authority token and a
//! coarse status flag. The handler hands both to the order service and
//! turns the outcome into the frontend redirect the original flow used.

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    response::{IntoResponse, Redirect, Response},
    routing::{get, post},
};
use serde::Deserialize;

use zagros_core::OrderId;

use crate::auth::CurrentUser;
use crate::error::Result;
use crate::services::{CallbackStatus, PaymentOutcome};
use crate::state::AppState;

/// Build the payment subrouter.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/create", post(create))
        .route("/verify", get(verify))
        .route("/status/{order_id}", get(status))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreatePaymentRequest {
    order_id: i64,
}

/// Query parameters the gateway appends to the callback redirect.
#[derive(Debug, Deserialize)]
struct VerifyQuery {
    #[serde(rename = "Authority")]
    authority: String,
    #[serde(rename = "Status", default)]
    status: Option<String>,
}

/// `POST /api/payment/create` - start a payment for one's own order.
async fn create(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(body): Json<CreatePaymentRequest>,
) -> Result<impl IntoResponse> {
    let started = state
        .orders()
        .create_payment_request(OrderId::new(body.order_id), &user)
        .await?;

    Ok(Json(serde_json::json!({
        "success": true,
        "paymentUrl": started.payment_url,
        "authority": started.authority,
    })))
}

/// `GET /api/payment/verify` - gateway callback.
async fn verify(
    State(state): State<AppState>,
    Query(query): Query<VerifyQuery>,
) -> Result<Response> {
    let callback = query
        .status
        .as_deref()
        .map_or(CallbackStatus::Cancelled, CallbackStatus::from_query);

    let outcome = state.orders().verify_payment(&query.authority, callback).await?;
    let base = &state.config().public_base_url;

    let response = match outcome {
        PaymentOutcome::Verified { order_id, .. } => {
            Redirect::to(&format!("{base}/order-success?orderId={order_id}&payment=success"))
                .into_response()
        }
        PaymentOutcome::AlreadyVerified { order_id, .. } => Json(serde_json::json!({
            "success": true,
            "message": "Payment was already verified",
            "orderId": order_id,
        }))
        .into_response(),
        PaymentOutcome::CancelledByUser { order_id } => {
            Redirect::to(&format!("{base}/order-success?orderId={order_id}&payment=cancelled"))
                .into_response()
        }
        PaymentOutcome::Failed { order_id, message } => Redirect::to(&format!(
            "{base}/order-success?orderId={order_id}&payment=failed&error={}",
            urlencode(&message)
        ))
        .into_response(),
    };

    Ok(response)
}

/// `GET /api/payment/status/{order_id}` - payment state for the owner.
async fn status(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(order_id): Path<i64>,
) -> Result<impl IntoResponse> {
    let order = state
        .orders()
        .payment_status(OrderId::new(order_id), &user)
        .await?;

    Ok(Json(serde_json::json!({
        "paymentStatus": order.payment_status,
        "orderStatus": order.status,
        "paymentMethod": order.payment_method,
        "paidAt": order.paid_at,
        "paymentRefId": order.payment_ref_id,
    })))
}

/// Minimal percent-encoding for the error message we put in the redirect
/// query string.
fn urlencode(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for byte in s.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                out.push(byte as char);
            }
            _ => out.push_str(&format!("%{byte:02X}")),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_urlencode() {
        assert_eq!(urlencode("abc-123"), "abc-123");
        assert_eq!(urlencode("a b"), "a%20b");
        assert_eq!(urlencode("x&y=z"), "x%26y%3Dz");
    }
}
