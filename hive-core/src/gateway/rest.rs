//! REST payment gateway adapter
//!
//! Talks to the hosted payment processor's REST API with form-encoded
//! requests and bearer authentication. Requests carry a bounded timeout and
//! are never retried here; retry policy belongs to the caller or to webhook
//! redelivery.

use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;
use serde::Deserialize;
use std::env;
use std::time::Duration;

use super::signature;
use super::{
    decode_event, to_minor_units, ConnectedAccount, GatewayEvent, PaymentGateway, PaymentIntent,
    PlatformBalance, RefundHandle, TransferHandle, WebhookChannel,
};
use crate::error::{CoreError, CoreResult};

/// REST gateway configuration
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// API base URL
    pub base_url: String,
    /// API secret key
    pub secret_key: String,
    /// Signing secret for the platform webhook endpoint
    pub platform_webhook_secret: String,
    /// Signing secret for the connected-accounts webhook endpoint
    pub connect_webhook_secret: String,
    /// Request timeout in seconds
    pub timeout_secs: u64,
    /// Accepted webhook timestamp skew in seconds
    pub signature_tolerance_secs: i64,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.stripe.com".to_string(),
            secret_key: String::new(),
            platform_webhook_secret: String::new(),
            connect_webhook_secret: String::new(),
            timeout_secs: 30,
            signature_tolerance_secs: signature::DEFAULT_TOLERANCE_SECS,
        }
    }
}

impl GatewayConfig {
    /// Load configuration from environment variables
    ///
    /// Environment variables:
    /// - HIVE_GATEWAY_BASE_URL: API base URL
    /// - HIVE_GATEWAY_SECRET_KEY: API secret key
    /// - HIVE_GATEWAY_WEBHOOK_SECRET: platform webhook signing secret
    /// - HIVE_GATEWAY_CONNECT_WEBHOOK_SECRET: connect webhook signing secret
    /// - HIVE_GATEWAY_TIMEOUT_SECS: request timeout
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            base_url: env::var("HIVE_GATEWAY_BASE_URL").unwrap_or(defaults.base_url),
            secret_key: env::var("HIVE_GATEWAY_SECRET_KEY").unwrap_or_default(),
            platform_webhook_secret: env::var("HIVE_GATEWAY_WEBHOOK_SECRET").unwrap_or_default(),
            connect_webhook_secret: env::var("HIVE_GATEWAY_CONNECT_WEBHOOK_SECRET")
                .unwrap_or_default(),
            timeout_secs: env::var("HIVE_GATEWAY_TIMEOUT_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.timeout_secs),
            signature_tolerance_secs: defaults.signature_tolerance_secs,
        }
    }
}

/// REST payment gateway client
pub struct RestGateway {
    config: GatewayConfig,
    http: reqwest::Client,
}

impl RestGateway {
    /// Create a client from configuration
    pub fn new(config: GatewayConfig) -> CoreResult<Self> {
        if config.secret_key.is_empty() {
            return Err(CoreError::Configuration(
                "gateway secret key is not set".to_string(),
            ));
        }
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| CoreError::Configuration(e.to_string()))?;
        Ok(Self { config, http })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.config.base_url)
    }

    async fn post_form<T: for<'de> Deserialize<'de>>(
        &self,
        path: &str,
        form: &[(&str, String)],
    ) -> CoreResult<T> {
        let response = self
            .http
            .post(self.url(path))
            .bearer_auth(&self.config.secret_key)
            .form(form)
            .send()
            .await?;
        Self::decode_response(response).await
    }

    async fn get<T: for<'de> Deserialize<'de>>(&self, path: &str) -> CoreResult<T> {
        let response = self
            .http
            .get(self.url(path))
            .bearer_auth(&self.config.secret_key)
            .send()
            .await?;
        Self::decode_response(response).await
    }

    async fn decode_response<T: for<'de> Deserialize<'de>>(
        response: reqwest::Response,
    ) -> CoreResult<T> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(CoreError::Gateway(format!(
                "gateway responded {status}: {body}"
            )));
        }
        Ok(response.json().await?)
    }
}

#[derive(Debug, Deserialize)]
struct BalanceResponse {
    available: Vec<BalanceEntry>,
}

#[derive(Debug, Deserialize)]
struct BalanceEntry {
    amount: i64,
}

#[async_trait]
impl PaymentGateway for RestGateway {
    fn verify_webhook(
        &self,
        channel: WebhookChannel,
        payload: &[u8],
        signature_header: &str,
    ) -> CoreResult<GatewayEvent> {
        let secret = match channel {
            WebhookChannel::Platform => &self.config.platform_webhook_secret,
            WebhookChannel::Connect => &self.config.connect_webhook_secret,
        };
        signature::verify(
            secret,
            payload,
            signature_header,
            self.config.signature_tolerance_secs,
            Utc::now(),
        )?;
        decode_event(payload)
    }

    async fn create_payment_intent(
        &self,
        amount: Decimal,
        currency: &str,
    ) -> CoreResult<PaymentIntent> {
        let minor = to_minor_units(amount)?;
        self.post_form(
            "/v1/payment_intents",
            &[
                ("amount", minor.to_string()),
                ("currency", currency.to_string()),
            ],
        )
        .await
    }

    async fn create_refund(&self, intent_id: &str) -> CoreResult<RefundHandle> {
        self.post_form(
            "/v1/refunds",
            &[("payment_intent", intent_id.to_string())],
        )
        .await
    }

    async fn retrieve_account(&self, account_id: &str) -> CoreResult<ConnectedAccount> {
        self.get(&format!("/v1/accounts/{account_id}")).await
    }

    async fn retrieve_balance(&self) -> CoreResult<PlatformBalance> {
        let balance: BalanceResponse = self.get("/v1/balance").await?;
        let available_minor = balance.available.first().map(|e| e.amount).unwrap_or(0);
        Ok(PlatformBalance { available_minor })
    }

    async fn create_transfer(
        &self,
        amount_minor: i64,
        currency: &str,
        destination: &str,
    ) -> CoreResult<TransferHandle> {
        self.post_form(
            "/v1/transfers",
            &[
                ("amount", amount_minor.to_string()),
                ("currency", currency.to_string()),
                ("destination", destination.to_string()),
            ],
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_requires_secret_key() {
        let result = RestGateway::new(GatewayConfig::default());
        assert!(matches!(result, Err(CoreError::Configuration(_))));
    }

    #[test]
    fn test_url_join() {
        let gateway = RestGateway::new(GatewayConfig {
            secret_key: "sk_test".to_string(),
            ..GatewayConfig::default()
        })
        .unwrap();
        assert_eq!(
            gateway.url("/v1/balance"),
            "https://api.stripe.com/v1/balance"
        );
    }

    #[test]
    fn test_verify_webhook_selects_channel_secret() {
        let config = GatewayConfig {
            secret_key: "sk_test".to_string(),
            platform_webhook_secret: "whsec_platform".to_string(),
            connect_webhook_secret: "whsec_connect".to_string(),
            ..GatewayConfig::default()
        };
        let gateway = RestGateway::new(config).unwrap();

        let payload = serde_json::to_vec(&crate::gateway::EventBody::new(
            "payout.paid",
            serde_json::json!({"id": "po_1"}),
        ))
        .unwrap();
        let header = signature::sign("whsec_connect", &payload, Utc::now());

        assert!(gateway
            .verify_webhook(WebhookChannel::Connect, &payload, &header)
            .is_ok());
        // The same header fails on the platform channel
        assert!(gateway
            .verify_webhook(WebhookChannel::Platform, &payload, &header)
            .is_err());
    }
}
