//! Payment gateway client (Razorpay-compatible REST API).
//!
//! Online checkout is a three-step dance: the server creates a gateway order
//! for the order total, the client completes payment in the gateway's widget,
//! and the gateway hands back `(order_id, payment_id, signature)` for the
//! server to verify. Captures and failures are also pushed to the webhook.

use hmac::{Hmac, Mac};
use rust_decimal::Decimal;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use thiserror::Error;
use tracing::{debug, instrument};

use mindy_munchs_core::{CurrencyCode, Price};

use crate::config::PaymentConfig;

/// Errors that can occur when talking to the payment gateway.
#[derive(Debug, Error)]
pub enum PaymentError {
    /// Gateway credentials are not configured.
    #[error("payment gateway not configured")]
    NotConfigured,

    /// A checkout or webhook signature did not match.
    #[error("invalid payment signature")]
    InvalidSignature,

    /// The order total cannot be expressed in minor units.
    #[error("invalid amount: {0}")]
    InvalidAmount(String),

    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// API returned an error response.
    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    /// Failed to parse a response or payload.
    #[error("Parse error: {0}")]
    Parse(String),
}

#[derive(Debug, Serialize)]
struct CreateOrderRequest<'a> {
    amount: i64,
    currency: &'a str,
    receipt: &'a str,
}

/// A gateway-side order, as returned by `POST /orders`.
#[derive(Debug, Clone, Deserialize)]
pub struct GatewayOrder {
    pub id: String,
    /// Amount in minor units (paise).
    pub amount: i64,
    pub currency: String,
    #[serde(default)]
    pub receipt: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
}

/// A webhook delivery.
#[derive(Debug, Clone, Deserialize)]
pub struct WebhookEvent {
    pub event: String,
    #[serde(default)]
    pub payload: WebhookPayload,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct WebhookPayload {
    #[serde(default)]
    pub payment: Option<PaymentWrapper>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PaymentWrapper {
    pub entity: PaymentEntity,
}

/// The payment object inside a webhook payload.
#[derive(Debug, Clone, Deserialize)]
pub struct PaymentEntity {
    pub id: String,
    #[serde(default)]
    pub order_id: Option<String>,
    #[serde(default)]
    pub amount: Option<i64>,
    #[serde(default)]
    pub error_description: Option<String>,
}

/// Webhook events the store acts on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WebhookKind {
    PaymentCaptured,
    PaymentFailed,
    Ignored,
}

impl WebhookEvent {
    /// Parse a raw webhook body.
    ///
    /// # Errors
    ///
    /// Returns `PaymentError::Parse` if the body is not a webhook envelope.
    pub fn parse(body: &[u8]) -> Result<Self, PaymentError> {
        serde_json::from_slice(body).map_err(|e| PaymentError::Parse(e.to_string()))
    }

    /// Classify the event.
    #[must_use]
    pub fn kind(&self) -> WebhookKind {
        match self.event.as_str() {
            "payment.captured" => WebhookKind::PaymentCaptured,
            "payment.failed" => WebhookKind::PaymentFailed,
            _ => WebhookKind::Ignored,
        }
    }

    /// The payment entity, when the event carries one.
    #[must_use]
    pub fn payment(&self) -> Option<&PaymentEntity> {
        self.payload.payment.as_ref().map(|p| &p.entity)
    }
}

/// Payment gateway API client.
#[derive(Clone)]
pub struct PaymentGateway {
    client: reqwest::Client,
    api_base: String,
    key_id: String,
    key_secret: SecretString,
    webhook_secret: Option<SecretString>,
}

impl PaymentGateway {
    /// Create a new gateway client.
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client fails to build.
    pub fn new(config: &PaymentConfig) -> Result<Self, PaymentError> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(15))
            .build()?;

        Ok(Self {
            client,
            api_base: config.api_base.clone(),
            key_id: config.key_id.clone(),
            key_secret: config.key_secret.clone(),
            webhook_secret: config.webhook_secret.clone(),
        })
    }

    /// The public key id, handed to the checkout widget.
    #[must_use]
    pub fn key_id(&self) -> &str {
        &self.key_id
    }

    /// Create a gateway order for `total` rupees.
    ///
    /// # Errors
    ///
    /// Returns error if the amount is invalid or the API request fails.
    #[instrument(skip(self))]
    pub async fn create_order(
        &self,
        total: Decimal,
        receipt: &str,
    ) -> Result<GatewayOrder, PaymentError> {
        let price = Price::new(total, CurrencyCode::INR);
        let amount = price
            .minor_units()
            .filter(|a| *a > 0)
            .ok_or_else(|| PaymentError::InvalidAmount(total.to_string()))?;

        let response = self
            .client
            .post(format!("{}/orders", self.api_base))
            .basic_auth(&self.key_id, Some(self.key_secret.expose_secret()))
            .json(&CreateOrderRequest {
                amount,
                currency: price.currency_code.code(),
                receipt,
            })
            .send()
            .await?;
        let status = response.status();

        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(PaymentError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let order: GatewayOrder = response
            .json()
            .await
            .map_err(|e| PaymentError::Parse(e.to_string()))?;

        debug!(gateway_order_id = %order.id, amount = order.amount, "Gateway order created");
        Ok(order)
    }

    /// Verify the signature returned by the checkout widget.
    ///
    /// The expected value is `hex(HMAC_SHA256(key_secret, "<order_id>|<payment_id>"))`.
    ///
    /// # Errors
    ///
    /// Returns `PaymentError::InvalidSignature` on mismatch.
    pub fn verify_payment_signature(
        &self,
        gateway_order_id: &str,
        gateway_payment_id: &str,
        signature: &str,
    ) -> Result<(), PaymentError> {
        let message = format!("{gateway_order_id}|{gateway_payment_id}");
        verify_hmac(&self.key_secret, message.as_bytes(), signature)
    }

    /// Verify a webhook body against its `X-Razorpay-Signature` header.
    ///
    /// # Errors
    ///
    /// Returns `PaymentError::NotConfigured` without a webhook secret, and
    /// `PaymentError::InvalidSignature` on mismatch.
    pub fn verify_webhook_signature(&self, body: &[u8], signature: &str) -> Result<(), PaymentError> {
        let secret = self
            .webhook_secret
            .as_ref()
            .ok_or(PaymentError::NotConfigured)?;
        verify_hmac(secret, body, signature)
    }
}

/// Hex-encoded HMAC-SHA256 of `message`.
///
/// # Errors
///
/// Returns `PaymentError::InvalidSignature` if the key is rejected.
pub fn sign(secret: &SecretString, message: &[u8]) -> Result<String, PaymentError> {
    let mut mac = Hmac::<Sha256>::new_from_slice(secret.expose_secret().as_bytes())
        .map_err(|_| PaymentError::InvalidSignature)?;
    mac.update(message);
    Ok(hex::encode(mac.finalize().into_bytes()))
}

fn verify_hmac(secret: &SecretString, message: &[u8], signature: &str) -> Result<(), PaymentError> {
    let expected = sign(secret, message)?;
    if constant_time_compare(&expected, signature.trim()) {
        Ok(())
    } else {
        Err(PaymentError::InvalidSignature)
    }
}

/// Constant-time string comparison to prevent timing attacks.
fn constant_time_compare(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }

    let mut result: u8 = 0;
    for (x, y) in a.bytes().zip(b.bytes()) {
        result |= x ^ y;
    }

    result == 0
}
