//! Outbound gateway contracts.
//!
//! The SMS provider and the payment gateway are external network
//! services; the services layer only sees these traits. Production
//! implementations live in [`sms`] and [`payment`], test suites plug in
//! scripted fakes.

pub mod payment;
pub mod sms;

use async_trait::async_trait;

use zagros_core::{Phone, Toman};

pub use payment::ZarinpalGateway;
pub use sms::MelipayamakSms;

/// Errors from outbound gateways.
///
/// A gateway saying "no" is not an error - rejection is modeled in the
/// respective outcome types. These variants cover the gateway being
/// unreachable or speaking something we cannot parse.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    /// Timeout, connection failure, or a 5xx from the provider.
    #[error("gateway unavailable: {0}")]
    Unavailable(String),

    /// The provider answered with an unexpected payload.
    #[error("unexpected gateway response: {0}")]
    Protocol(String),
}

/// Which SMS template a code rides on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SmsTemplate {
    /// Registration verification code.
    Registration,
    /// Password-reset verification code.
    PasswordReset,
}

/// Outbound SMS provider.
#[async_trait]
pub trait SmsGateway: Send + Sync {
    /// Send a verification code to `phone` using the given template.
    ///
    /// Returns the provider's delivery receipt ID.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError`] if the provider is unreachable or
    /// reports a delivery failure.
    async fn send_code(
        &self,
        phone: &Phone,
        code: &str,
        template: SmsTemplate,
    ) -> Result<String, GatewayError>;
}

/// Parameters for creating a payment request.
#[derive(Debug, Clone)]
pub struct PaymentRequest {
    /// Amount in whole Toman.
    pub amount: Toman,
    /// Human-readable description shown on the gateway page.
    pub description: String,
    /// Where the gateway redirects the customer afterwards.
    pub callback_url: String,
    /// Opaque metadata echoed back by the gateway.
    pub metadata: serde_json::Value,
}

/// A successfully created payment request.
#[derive(Debug, Clone)]
pub struct CreatedPayment {
    /// Opaque token identifying this payment attempt.
    pub authority: String,
    /// URL to redirect the customer to.
    pub redirect_url: String,
}

/// Result of asking the gateway to verify a payment.
#[derive(Debug, Clone)]
pub enum VerifyOutcome {
    /// The gateway confirmed the payment.
    Verified {
        /// Gateway reference ID for the settled transaction.
        ref_id: String,
    },
    /// The gateway rejected the verification.
    Rejected {
        /// Gateway error code.
        code: i32,
        /// Gateway error message.
        message: String,
    },
}

/// Outbound payment provider.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Create a payment request for `request.amount`.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError`] if the provider is unreachable or the
    /// request is refused.
    async fn create_request(&self, request: &PaymentRequest)
    -> Result<CreatedPayment, GatewayError>;

    /// Verify the payment identified by `authority` against the expected
    /// `amount`. Passing the stored order total here is the defense
    /// against amount tampering on the callback.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError`] only for transport-level failures;
    /// gateway-side rejection is a [`VerifyOutcome::Rejected`].
    async fn verify(&self, authority: &str, amount: Toman) -> Result<VerifyOutcome, GatewayError>;
}
