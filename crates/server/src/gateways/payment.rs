//! Zarinpal payment gateway client (v4 JSON API).
//!
//! Request creation is never retried: a duplicate request would mint a
//! second payment intent. Verification is an idempotent read on the
//! gateway side, so transient failures there get a bounded retry with
//! backoff.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, instrument, warn};

use zagros_core::Toman;

use super::{CreatedPayment, GatewayError, PaymentGateway, PaymentRequest, VerifyOutcome};

/// Outbound request timeout.
const GATEWAY_TIMEOUT: Duration = Duration::from_secs(10);

/// Retry attempts for the (idempotent) verify call.
const VERIFY_ATTEMPTS: u32 = 3;

/// Base backoff between verify retries.
const VERIFY_BACKOFF: Duration = Duration::from_millis(500);

/// Gateway code for a successful operation.
const CODE_OK: i32 = 100;

/// Gateway code for "already verified" - treated as success so a
/// duplicate callback settles idempotently on the gateway side too.
const CODE_ALREADY_VERIFIED: i32 = 101;

/// Zarinpal v4 payment client.
#[derive(Clone)]
pub struct ZarinpalGateway {
    client: Client,
    merchant_id: SecretString,
    api_base: String,
    start_pay_base: String,
}

impl std::fmt::Debug for ZarinpalGateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ZarinpalGateway")
            .field("merchant_id", &"[REDACTED]")
            .field("api_base", &self.api_base)
            .finish_non_exhaustive()
    }
}

#[derive(Serialize)]
struct CreateBody<'a> {
    merchant_id: &'a str,
    amount: i64,
    description: &'a str,
    callback_url: &'a str,
    metadata: &'a serde_json::Value,
}

#[derive(Serialize)]
struct VerifyBody<'a> {
    merchant_id: &'a str,
    authority: &'a str,
    amount: i64,
}

#[derive(Deserialize, Default)]
struct ResponseEnvelope {
    #[serde(default)]
    data: Option<ResponseData>,
    #[serde(default)]
    errors: Option<serde_json::Value>,
}

#[derive(Deserialize, Default)]
struct ResponseData {
    #[serde(default)]
    code: Option<i32>,
    #[serde(default)]
    authority: Option<String>,
    #[serde(default)]
    ref_id: Option<serde_json::Number>,
    #[serde(default)]
    message: Option<String>,
}

impl ZarinpalGateway {
    /// Create a client against the production endpoints.
    #[must_use]
    pub fn new(merchant_id: SecretString) -> Self {
        Self::with_endpoints(
            merchant_id,
            "https://api.zarinpal.com/pg/v4/payment".to_owned(),
            "https://www.zarinpal.com/pg/StartPay".to_owned(),
        )
    }

    /// Create a client against the sandbox endpoints.
    #[must_use]
    pub fn sandbox(merchant_id: SecretString) -> Self {
        Self::with_endpoints(
            merchant_id,
            "https://sandbox.zarinpal.com/pg/v4/payment".to_owned(),
            "https://sandbox.zarinpal.com/pg/StartPay".to_owned(),
        )
    }

    /// Create a client with explicit endpoints (tests, self-hosted mocks).
    #[must_use]
    pub fn with_endpoints(
        merchant_id: SecretString,
        api_base: String,
        start_pay_base: String,
    ) -> Self {
        Self {
            client: Client::new(),
            merchant_id,
            api_base,
            start_pay_base,
        }
    }

    async fn post(
        &self,
        path: &str,
        body: &impl Serialize,
    ) -> Result<ResponseEnvelope, GatewayError> {
        let response = self
            .client
            .post(format!("{}/{path}", self.api_base))
            .timeout(GATEWAY_TIMEOUT)
            .json(body)
            .send()
            .await
            .map_err(|e| GatewayError::Unavailable(e.to_string()))?;

        let status = response.status();
        if status.is_server_error() {
            return Err(GatewayError::Unavailable(format!(
                "payment gateway returned {status}"
            )));
        }

        response
            .json()
            .await
            .map_err(|e| GatewayError::Protocol(e.to_string()))
    }
}

#[async_trait]
impl PaymentGateway for ZarinpalGateway {
    #[instrument(skip(self, request), fields(amount = %request.amount))]
    async fn create_request(
        &self,
        request: &PaymentRequest,
    ) -> Result<CreatedPayment, GatewayError> {
        let body = CreateBody {
            merchant_id: self.merchant_id.expose_secret(),
            amount: request.amount.as_i64(),
            description: &request.description,
            callback_url: &request.callback_url,
            metadata: &request.metadata,
        };

        let envelope = self.post("request.json", &body).await?;

        let data = envelope.data.unwrap_or_default();
        if data.code == Some(CODE_OK)
            && let Some(authority) = data.authority
        {
            info!(authority = %authority, "payment request created");
            let redirect_url = format!("{}/{authority}", self.start_pay_base);
            return Ok(CreatedPayment {
                authority,
                redirect_url,
            });
        }

        let message = data
            .message
            .or_else(|| envelope.errors.map(|e| e.to_string()))
            .unwrap_or_else(|| "payment request failed".to_owned());
        error!(error = %message, "payment request rejected");
        Err(GatewayError::Protocol(message))
    }

    #[instrument(skip(self), fields(amount = %amount))]
    async fn verify(&self, authority: &str, amount: Toman) -> Result<VerifyOutcome, GatewayError> {
        let body = VerifyBody {
            merchant_id: self.merchant_id.expose_secret(),
            authority,
            amount: amount.as_i64(),
        };

        let mut last_err = None;
        for attempt in 1..=VERIFY_ATTEMPTS {
            match self.post("verify.json", &body).await {
                Ok(envelope) => {
                    let data = envelope.data.unwrap_or_default();
                    let code = data.code.unwrap_or(0);

                    if code == CODE_OK || code == CODE_ALREADY_VERIFIED {
                        let ref_id = data
                            .ref_id
                            .map(|n| n.to_string())
                            .ok_or_else(|| {
                                GatewayError::Protocol("verify succeeded without ref_id".to_owned())
                            })?;
                        debug!(ref_id = %ref_id, code, "payment verified by gateway");
                        return Ok(VerifyOutcome::Verified { ref_id });
                    }

                    let message = data
                        .message
                        .unwrap_or_else(|| verify_error_message(code).to_owned());
                    return Ok(VerifyOutcome::Rejected { code, message });
                }
                Err(GatewayError::Unavailable(reason)) => {
                    warn!(attempt, error = %reason, "payment verify attempt failed");
                    last_err = Some(GatewayError::Unavailable(reason));
                    if attempt < VERIFY_ATTEMPTS {
                        tokio::time::sleep(VERIFY_BACKOFF * attempt).await;
                    }
                }
                Err(other) => return Err(other),
            }
        }

        Err(last_err
            .unwrap_or_else(|| GatewayError::Unavailable("payment verify failed".to_owned())))
    }
}

/// Human-readable messages for the gateway's documented verify errors.
const fn verify_error_message(code: i32) -> &'static str {
    match code {
        -9 => "validation error",
        -10 => "invalid merchant IP or terminal",
        -11 => "terminal is not active",
        -12 => "too many attempts in a short window",
        -15 => "terminal is suspended",
        -16 => "terminal level too low for this operation",
        _ => "payment verification failed",
    }
}
