//! Melipayamak SMS client.
//!
//! The provider exposes a shared-template endpoint: we post a template
//! body ID plus the code as a template argument, and success is signaled
//! by a positive `recId` in the response body rather than the HTTP
//! status alone.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, instrument};

use zagros_core::Phone;

use super::{GatewayError, SmsGateway, SmsTemplate};

/// Outbound request timeout.
const SMS_TIMEOUT: Duration = Duration::from_secs(10);

/// Melipayamak shared-template SMS client.
#[derive(Clone)]
pub struct MelipayamakSms {
    client: Client,
    api_url: String,
    register_body_id: i64,
    password_reset_body_id: i64,
}

impl std::fmt::Debug for MelipayamakSms {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // The API key is embedded in the URL path, so the URL itself is a secret.
        f.debug_struct("MelipayamakSms")
            .field("api_url", &"[REDACTED]")
            .field("register_body_id", &self.register_body_id)
            .field("password_reset_body_id", &self.password_reset_body_id)
            .finish_non_exhaustive()
    }
}

#[derive(Serialize)]
struct SendRequest<'a> {
    #[serde(rename = "bodyId")]
    body_id: i64,
    to: &'a str,
    args: Vec<&'a str>,
}

#[derive(Deserialize)]
struct SendResponse {
    #[serde(rename = "recId", default)]
    rec_id: Option<i64>,
    #[serde(default)]
    status: Option<String>,
}

impl MelipayamakSms {
    /// Create a new SMS client.
    ///
    /// `api_url` is the provider's shared-send endpoint including the
    /// account key; `register_body_id` / `password_reset_body_id` select
    /// the approved message templates.
    #[must_use]
    pub fn new(api_url: String, register_body_id: i64, password_reset_body_id: i64) -> Self {
        Self {
            client: Client::new(),
            api_url,
            register_body_id,
            password_reset_body_id,
        }
    }

    const fn body_id(&self, template: SmsTemplate) -> i64 {
        match template {
            SmsTemplate::Registration => self.register_body_id,
            SmsTemplate::PasswordReset => self.password_reset_body_id,
        }
    }
}

#[async_trait]
impl SmsGateway for MelipayamakSms {
    #[instrument(skip(self, code), fields(template = ?template))]
    async fn send_code(
        &self,
        phone: &Phone,
        code: &str,
        template: SmsTemplate,
    ) -> Result<String, GatewayError> {
        let request = SendRequest {
            body_id: self.body_id(template),
            to: phone.as_str(),
            args: vec![code],
        };

        let response = self
            .client
            .post(&self.api_url)
            .timeout(SMS_TIMEOUT)
            .json(&request)
            .send()
            .await
            .map_err(|e| GatewayError::Unavailable(e.to_string()))?;

        let status = response.status();
        if status.is_server_error() {
            return Err(GatewayError::Unavailable(format!(
                "SMS provider returned {status}"
            )));
        }

        let body: SendResponse = response
            .json()
            .await
            .map_err(|e| GatewayError::Protocol(e.to_string()))?;

        match body.rec_id {
            Some(rec_id) if rec_id > 0 => {
                debug!(rec_id, "SMS accepted by provider");
                Ok(rec_id.to_string())
            }
            _ => {
                let reason = body
                    .status
                    .unwrap_or_else(|| "SMS send rejected".to_owned());
                error!(error = %reason, "SMS provider rejected message");
                Err(GatewayError::Protocol(reason))
            }
        }
    }
}
