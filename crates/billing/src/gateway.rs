//! Payment gateway client seam
//!
//! The engine only depends on the trait; the HTTP implementation speaks the
//! Paystack REST contract (amounts in minor units, bearer-key auth). Jobs and
//! tests substitute their own implementations.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::{BillingError, BillingResult};

/// Configuration for the payment gateway integration
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Secret API key (bearer auth on REST calls)
    pub secret_key: String,
    /// Shared secret for webhook HMAC-SHA512 signatures
    pub webhook_secret: String,
    /// REST base URL
    pub base_url: String,
    /// Default redirect URL after hosted checkout
    pub callback_url: String,
}

impl GatewayConfig {
    /// Create config from environment variables
    pub fn from_env() -> BillingResult<Self> {
        Ok(Self {
            secret_key: std::env::var("PAYSTACK_SECRET_KEY")
                .map_err(|_| BillingError::Config("PAYSTACK_SECRET_KEY not set".to_string()))?,
            webhook_secret: std::env::var("PAYSTACK_WEBHOOK_SECRET")
                .map_err(|_| BillingError::Config("PAYSTACK_WEBHOOK_SECRET not set".to_string()))?,
            base_url: std::env::var("PAYSTACK_BASE_URL")
                .unwrap_or_else(|_| "https://api.paystack.co".to_string()),
            callback_url: std::env::var("PAYSTACK_CALLBACK_URL")
                .unwrap_or_else(|_| "https://app.shepherd.church/billing/callback".to_string()),
        })
    }
}

/// A hosted checkout session handed back to the client for redirection
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentSession {
    pub authorization_url: String,
    pub access_code: String,
    pub reference: String,
}

/// Result of charging a stored authorization
#[derive(Debug, Clone)]
pub struct ChargeOutcome {
    pub success: bool,
    pub transaction_id: Option<String>,
    pub message: Option<String>,
}

/// Gateway operations the billing engine needs.
///
/// Webhook *handling* is in-scope for this crate; these outbound calls are
/// the minimum surface the checkout and renewal flows require.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Open a hosted checkout session for `amount_cents` under `reference`
    async fn initialize_payment(
        &self,
        email: &str,
        amount_cents: i64,
        reference: &str,
    ) -> BillingResult<PaymentSession>;

    /// Charge a stored authorization code (renewals)
    async fn charge_authorization(
        &self,
        authorization_code: &str,
        email: &str,
        amount_cents: i64,
        reference: &str,
    ) -> BillingResult<ChargeOutcome>;
}

/// Paystack REST implementation
pub struct PaystackGateway {
    config: GatewayConfig,
    client: reqwest::Client,
}

impl PaystackGateway {
    pub fn new(config: GatewayConfig) -> Self {
        Self {
            config,
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl PaymentGateway for PaystackGateway {
    async fn initialize_payment(
        &self,
        email: &str,
        amount_cents: i64,
        reference: &str,
    ) -> BillingResult<PaymentSession> {
        let url = format!("{}/transaction/initialize", self.config.base_url);

        let body = serde_json::json!({
            "email": email,
            "amount": amount_cents,
            "reference": reference,
            "currency": "GHS",
            "callback_url": self.config.callback_url,
            // Card and mobile money are the channels in use for Ghana
            "channels": ["card", "mobile_money"],
        });

        let response: serde_json::Value = self
            .client
            .post(&url)
            .bearer_auth(&self.config.secret_key)
            .json(&body)
            .send()
            .await?
            .json()
            .await?;

        if !response["status"].as_bool().unwrap_or(false) {
            let message = response["message"].as_str().unwrap_or("initialize failed");
            return Err(BillingError::Gateway(message.to_string()));
        }

        let data = &response["data"];
        Ok(PaymentSession {
            authorization_url: data["authorization_url"].as_str().unwrap_or_default().to_string(),
            access_code: data["access_code"].as_str().unwrap_or_default().to_string(),
            reference: data["reference"].as_str().unwrap_or(reference).to_string(),
        })
    }

    async fn charge_authorization(
        &self,
        authorization_code: &str,
        email: &str,
        amount_cents: i64,
        reference: &str,
    ) -> BillingResult<ChargeOutcome> {
        let url = format!("{}/transaction/charge_authorization", self.config.base_url);

        let body = serde_json::json!({
            "authorization_code": authorization_code,
            "email": email,
            "amount": amount_cents,
            "reference": reference,
        });

        let response: serde_json::Value = self
            .client
            .post(&url)
            .bearer_auth(&self.config.secret_key)
            .json(&body)
            .send()
            .await?
            .json()
            .await?;

        let success = response["status"].as_bool().unwrap_or(false)
            && response["data"]["status"].as_str() == Some("success");

        Ok(ChargeOutcome {
            success,
            transaction_id: response["data"]["reference"].as_str().map(str::to_string),
            message: response["message"].as_str().map(str::to_string),
        })
    }
}
