//! Status enums for orders, payments, users, and verification codes.
//!
//! Order status and payment status are independent axes. The only place
//! they move together is [`on_payment_verified`]: a successful gateway
//! verification confirms the order and marks it paid in one step. Every
//! other order-status change is an explicit administrative action.

use serde::{Deserialize, Serialize};

/// Order fulfillment status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    #[default]
    Pending,
    Confirmed,
    Processing,
    Shipped,
    Delivered,
    Cancelled,
}

impl OrderStatus {
    /// Whether this status counts as an active sale for reporting.
    #[must_use]
    pub const fn is_active_sale(self) -> bool {
        matches!(
            self,
            Self::Confirmed | Self::Processing | Self::Shipped | Self::Delivered
        )
    }

    /// Terminal statuses cannot be reached again once left.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Delivered | Self::Cancelled)
    }
}

/// Payment settlement status, driven by the gateway callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    #[default]
    Pending,
    Paid,
    Failed,
    Refunded,
}

/// How the customer pays for an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    /// Gateway redirect payment.
    #[default]
    Online,
    /// Cash on delivery.
    Cash,
    /// Card-to-card, recorded manually by an admin.
    Card,
}

/// Account role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    #[default]
    User,
    Admin,
}

/// What a pending SMS verification code is for.
///
/// Registration and password reset share one ledger; the purpose is part
/// of the record key, so one phone can hold one live code of each kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerificationPurpose {
    Registration,
    PasswordReset,
}

/// The single automatic coupling between the two status axes.
///
/// Returns the `(order_status, payment_status)` pair an order moves to
/// when the gateway confirms payment. Order status only advances from
/// `Pending`; an order an admin already moved along (or cancelled) keeps
/// its status while the payment axis settles to `Paid`.
#[must_use]
pub const fn on_payment_verified(current: OrderStatus) -> (OrderStatus, PaymentStatus) {
    let order = match current {
        OrderStatus::Pending => OrderStatus::Confirmed,
        other => other,
    };
    (order, PaymentStatus::Paid)
}

macro_rules! impl_status_strings {
    ($ty:ident { $($variant:ident => $text:literal),+ $(,)? }) => {
        impl std::fmt::Display for $ty {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                match self {
                    $(Self::$variant => write!(f, $text),)+
                }
            }
        }

        impl std::str::FromStr for $ty {
            type Err = String;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok(Self::$variant),)+
                    _ => Err(format!(concat!("invalid ", stringify!($ty), ": {}"), s)),
                }
            }
        }
    };
}

impl_status_strings!(OrderStatus {
    Pending => "pending",
    Confirmed => "confirmed",
    Processing => "processing",
    Shipped => "shipped",
    Delivered => "delivered",
    Cancelled => "cancelled",
});

impl_status_strings!(PaymentStatus {
    Pending => "pending",
    Paid => "paid",
    Failed => "failed",
    Refunded => "refunded",
});

impl_status_strings!(PaymentMethod {
    Online => "online",
    Cash => "cash",
    Card => "card",
});

impl_status_strings!(UserRole {
    User => "user",
    Admin => "admin",
});

impl_status_strings!(VerificationPurpose {
    Registration => "registration",
    PasswordReset => "password_reset",
});

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_payment_verified_confirms_pending_order() {
        let (order, payment) = on_payment_verified(OrderStatus::Pending);
        assert_eq!(order, OrderStatus::Confirmed);
        assert_eq!(payment, PaymentStatus::Paid);
    }

    #[test]
    fn test_payment_verified_keeps_advanced_order_status() {
        for status in [
            OrderStatus::Processing,
            OrderStatus::Shipped,
            OrderStatus::Delivered,
            OrderStatus::Cancelled,
        ] {
            let (order, payment) = on_payment_verified(status);
            assert_eq!(order, status);
            assert_eq!(payment, PaymentStatus::Paid);
        }
    }

    #[test]
    fn test_status_string_roundtrip() {
        for status in [
            OrderStatus::Pending,
            OrderStatus::Confirmed,
            OrderStatus::Processing,
            OrderStatus::Shipped,
            OrderStatus::Delivered,
            OrderStatus::Cancelled,
        ] {
            let parsed: OrderStatus = status.to_string().parse().unwrap();
            assert_eq!(parsed, status);
        }

        assert!("unknown".parse::<OrderStatus>().is_err());
    }

    #[test]
    fn test_serde_matches_display() {
        let json = serde_json::to_string(&PaymentStatus::Paid).unwrap();
        assert_eq!(json, "\"paid\"");
        let json = serde_json::to_string(&VerificationPurpose::PasswordReset).unwrap();
        assert_eq!(json, "\"password_reset\"");
    }

    #[test]
    fn test_active_sale_statuses() {
        assert!(!OrderStatus::Pending.is_active_sale());
        assert!(!OrderStatus::Cancelled.is_active_sale());
        assert!(OrderStatus::Confirmed.is_active_sale());
        assert!(OrderStatus::Delivered.is_active_sale());
    }
}
