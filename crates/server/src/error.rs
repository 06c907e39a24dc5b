//! Unified error handling with Sentry integration.
//!
//! Provides a unified `AppError` type that maps service errors onto HTTP
//! statuses and stable machine-readable codes, capturing server errors
//! to Sentry before responding. All route handlers return
//! `Result<T, AppError>`.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;

use crate::db::RepositoryError;
use crate::gateways::GatewayError;
use crate::services::{AccountError, OrderError, VerificationError};

/// Application-level error type for the server.
#[derive(Debug, Error)]
pub enum AppError {
    /// Database operation failed.
    #[error("Database error: {0}")]
    Database(#[from] RepositoryError),

    /// Outbound gateway failed.
    #[error("Gateway error: {0}")]
    Gateway(#[from] GatewayError),

    /// Account operation failed.
    #[error("Account error: {0}")]
    Account(#[from] AccountError),

    /// Verification ledger operation failed.
    #[error("Verification error: {0}")]
    Verification(#[from] VerificationError),

    /// Order operation failed.
    #[error("Order error: {0}")]
    Order(#[from] OrderError),

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Caller is not authenticated.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Bad request from client.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Internal server error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Wire shape of an error response.
#[derive(Debug, Serialize)]
struct ErrorBody {
    /// Stable machine-readable code.
    code: &'static str,
    /// Human-readable message.
    message: String,
    /// Attempts left, for code-mismatch responses.
    #[serde(skip_serializing_if = "Option::is_none")]
    remaining_attempts: Option<u32>,
}

impl AppError {
    fn parts(&self) -> (StatusCode, &'static str, String, Option<u32>) {
        match self {
            Self::Database(_) | Self::Internal(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal_error",
                "Internal server error".to_owned(),
                None,
            ),
            Self::Gateway(_) => (
                StatusCode::BAD_GATEWAY,
                "gateway_unavailable",
                "External service error".to_owned(),
                None,
            ),
            Self::Account(err) => account_parts(err),
            Self::Verification(err) => verification_parts(err),
            Self::Order(err) => order_parts(err),
            Self::NotFound(what) => (
                StatusCode::NOT_FOUND,
                "not_found",
                format!("{what} not found"),
                None,
            ),
            Self::Unauthorized(msg) => {
                (StatusCode::UNAUTHORIZED, "unauthorized", msg.clone(), None)
            }
            Self::BadRequest(msg) => (
                StatusCode::BAD_REQUEST,
                "validation_failed",
                msg.clone(),
                None,
            ),
        }
    }
}

fn account_parts(err: &AccountError) -> (StatusCode, &'static str, String, Option<u32>) {
    match err {
        AccountError::PhoneTaken => (
            StatusCode::CONFLICT,
            "phone_taken",
            "This phone number is already registered".to_owned(),
            None,
        ),
        AccountError::InvalidCredentials => (
            StatusCode::UNAUTHORIZED,
            "invalid_credentials",
            "Invalid phone number or password".to_owned(),
            None,
        ),
        AccountError::AccountInactive => (
            StatusCode::FORBIDDEN,
            "account_inactive",
            "This account has been deactivated".to_owned(),
            None,
        ),
        AccountError::UserNotFound => (
            StatusCode::NOT_FOUND,
            "not_found",
            "User not found".to_owned(),
            None,
        ),
        AccountError::InvalidRefreshToken => (
            StatusCode::UNAUTHORIZED,
            "invalid_token",
            "Invalid refresh token".to_owned(),
            None,
        ),
        AccountError::InvalidResetToken => (
            StatusCode::BAD_REQUEST,
            "invalid_token",
            "Invalid or expired reset token".to_owned(),
            None,
        ),
        AccountError::WeakPassword => (
            StatusCode::BAD_REQUEST,
            "validation_failed",
            err.to_string(),
            None,
        ),
        AccountError::Verification(inner) => verification_parts(inner),
        AccountError::PasswordHash | AccountError::Token(_) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            "internal_error",
            "Internal server error".to_owned(),
            None,
        ),
        AccountError::Repository(_) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            "internal_error",
            "Internal server error".to_owned(),
            None,
        ),
    }
}

fn verification_parts(err: &VerificationError) -> (StatusCode, &'static str, String, Option<u32>) {
    match err {
        VerificationError::NotFound => (
            StatusCode::BAD_REQUEST,
            "verification_not_found",
            "Verification code is invalid or expired".to_owned(),
            None,
        ),
        VerificationError::Expired => (
            StatusCode::BAD_REQUEST,
            "code_expired",
            "Verification code has expired, please request a new one".to_owned(),
            None,
        ),
        VerificationError::AttemptsExhausted => (
            StatusCode::BAD_REQUEST,
            "attempts_exhausted",
            "Too many wrong attempts, please request a new code".to_owned(),
            None,
        ),
        VerificationError::CodeMismatch { remaining } => (
            StatusCode::BAD_REQUEST,
            "code_mismatch",
            format!("Wrong verification code, {remaining} attempts remaining"),
            Some(*remaining),
        ),
        VerificationError::Sms(_) => (
            StatusCode::BAD_GATEWAY,
            "gateway_unavailable",
            "Could not send SMS, please try again".to_owned(),
            None,
        ),
        VerificationError::Repository(_) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            "internal_error",
            "Internal server error".to_owned(),
            None,
        ),
    }
}

fn order_parts(err: &OrderError) -> (StatusCode, &'static str, String, Option<u32>) {
    match err {
        OrderError::EmptyCart | OrderError::QuantityOutOfRange | OrderError::AmountOverflow => (
            StatusCode::BAD_REQUEST,
            "validation_failed",
            err.to_string(),
            None,
        ),
        OrderError::ProductNotFound { .. } => (
            StatusCode::NOT_FOUND,
            "product_not_found",
            err.to_string(),
            None,
        ),
        OrderError::InsufficientStock { .. } => (
            StatusCode::BAD_REQUEST,
            "insufficient_stock",
            err.to_string(),
            None,
        ),
        OrderError::OrderNotFound => (
            StatusCode::NOT_FOUND,
            "not_found",
            "Order not found".to_owned(),
            None,
        ),
        OrderError::Forbidden => (
            StatusCode::FORBIDDEN,
            "forbidden",
            "You do not have access to this order".to_owned(),
            None,
        ),
        OrderError::AlreadyPaid => (
            StatusCode::BAD_REQUEST,
            "already_paid",
            "This order has already been paid".to_owned(),
            None,
        ),
        OrderError::OrderCancelled => (
            StatusCode::BAD_REQUEST,
            "order_cancelled",
            "This order has been cancelled".to_owned(),
            None,
        ),
        OrderError::Gateway(_) => (
            StatusCode::BAD_GATEWAY,
            "gateway_unavailable",
            "Payment gateway error, please try again".to_owned(),
            None,
        ),
        OrderError::Repository(_) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            "internal_error",
            "Internal server error".to_owned(),
            None,
        ),
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        // Capture server errors to Sentry
        let is_server_error = matches!(
            self,
            Self::Database(_)
                | Self::Internal(_)
                | Self::Gateway(_)
                | Self::Account(
                    AccountError::Repository(_) | AccountError::PasswordHash | AccountError::Token(_)
                )
                | Self::Verification(VerificationError::Repository(_))
                | Self::Order(OrderError::Repository(_))
        );
        if is_server_error {
            let event_id = sentry::capture_error(&self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "Request error"
            );
        }

        let (status, code, message, remaining_attempts) = self.parts();
        let body = Json(ErrorBody {
            code,
            message,
            remaining_attempts,
        });
        (status, body).into_response()
    }
}

/// Result type alias for `AppError`.
pub type Result<T> = std::result::Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    fn status_of(err: AppError) -> StatusCode {
        err.into_response().status()
    }

    #[test]
    fn test_error_status_codes() {
        assert_eq!(
            status_of(AppError::NotFound("order".to_owned())),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            status_of(AppError::Order(OrderError::AlreadyPaid)),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status_of(AppError::Order(OrderError::Forbidden)),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            status_of(AppError::Account(AccountError::PhoneTaken)),
            StatusCode::CONFLICT
        );
        assert_eq!(
            status_of(AppError::Verification(VerificationError::CodeMismatch {
                remaining: 2
            })),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status_of(AppError::Gateway(GatewayError::Unavailable(
                "timeout".to_owned()
            ))),
            StatusCode::BAD_GATEWAY
        );
    }

    #[test]
    fn test_internal_details_not_exposed() {
        let err = AppError::Internal("connection pool exhausted".to_owned());
        let (_, _, message, _) = err.parts();
        assert_eq!(message, "Internal server error");
    }
}
