//! Payment gateway port
//!
//! Wraps the hosted payment processor: intent, refund, transfer and balance
//! operations plus webhook signature verification. [`RestGateway`] is the
//! production adapter; tests use the mock in [`crate::mock`].

pub mod rest;
pub mod signature;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};
use crate::types::{RefundDestination, RefundStatus};

pub use rest::{GatewayConfig, RestGateway};

/// Which webhook endpoint a delivery arrived on; each has its own secret
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WebhookChannel {
    /// Platform account events (payment intents, refunds)
    Platform,
    /// Connected-account events (payouts)
    Connect,
}

/// A verified, decoded gateway webhook event
#[derive(Debug, Clone, PartialEq)]
pub enum GatewayEvent {
    /// A payment intent was captured
    PaymentIntentSucceeded {
        /// Gateway intent id
        intent_id: String,
    },
    /// A refund changed state
    RefundUpdated {
        /// Gateway refund id
        refund_id: String,
        /// Reported status
        status: RefundStatus,
        /// Reported amount
        amount: Option<Decimal>,
        /// Gateway-side creation time
        created: Option<DateTime<Utc>>,
        /// Destination account type
        destination: Option<RefundDestination>,
    },
    /// A payout reached a terminal state
    PayoutUpdated {
        /// Gateway payout id
        payout_id: String,
        /// Reported status
        status: crate::types::PayoutStatus,
    },
    /// Event kind this system does not handle
    Unrecognized {
        /// Gateway event type string
        kind: String,
    },
}

/// Created payment intent
#[derive(Debug, Clone, Deserialize)]
pub struct PaymentIntent {
    /// Gateway intent id
    pub id: String,
    /// Client secret for the payer's client
    pub client_secret: Option<String>,
}

/// Created refund
#[derive(Debug, Clone, Deserialize)]
pub struct RefundHandle {
    /// Gateway refund id
    pub id: String,
}

/// Connected-account onboarding state
#[derive(Debug, Clone, Deserialize)]
pub struct ConnectedAccount {
    /// Gateway account id
    pub id: String,
    /// Account can receive payouts
    pub payouts_enabled: bool,
    /// Onboarding questionnaire finished
    pub details_submitted: bool,
}

impl ConnectedAccount {
    /// Whether funds may be transferred to this account
    pub fn is_payout_ready(&self) -> bool {
        self.payouts_enabled && self.details_submitted
    }
}

/// Platform balance snapshot
#[derive(Debug, Clone)]
pub struct PlatformBalance {
    /// Available balance in minor units
    pub available_minor: i64,
}

/// Executed transfer
#[derive(Debug, Clone, Deserialize)]
pub struct TransferHandle {
    /// Gateway transfer id
    pub id: String,
}

/// Payment gateway interface
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Verify a webhook delivery and decode its event. Verification failure
    /// is an error; no state may be mutated before this succeeds.
    fn verify_webhook(
        &self,
        channel: WebhookChannel,
        payload: &[u8],
        signature: &str,
    ) -> CoreResult<GatewayEvent>;

    /// Create a payment intent for a booking payment
    async fn create_payment_intent(
        &self,
        amount: Decimal,
        currency: &str,
    ) -> CoreResult<PaymentIntent>;

    /// Refund a captured payment intent in full
    async fn create_refund(&self, intent_id: &str) -> CoreResult<RefundHandle>;

    /// Fetch a connected account's onboarding state
    async fn retrieve_account(&self, account_id: &str) -> CoreResult<ConnectedAccount>;

    /// Fetch the platform's available balance
    async fn retrieve_balance(&self) -> CoreResult<PlatformBalance>;

    /// Transfer funds to a connected account
    async fn create_transfer(
        &self,
        amount_minor: i64,
        currency: &str,
        destination: &str,
    ) -> CoreResult<TransferHandle>;
}

/// Convert a decimal amount to gateway minor units (cents)
pub fn to_minor_units(amount: Decimal) -> CoreResult<i64> {
    (amount * Decimal::new(100, 0))
        .round()
        .to_i64()
        .ok_or_else(|| CoreError::Validation(format!("amount out of range: {amount}")))
}

/// Convert gateway minor units (cents) to a decimal amount
pub fn from_minor_units(minor: i64) -> Decimal {
    Decimal::new(minor, 2)
}

/// Raw webhook envelope as delivered by the gateway
#[derive(Debug, Deserialize)]
struct EventEnvelope {
    #[serde(rename = "type")]
    kind: String,
    data: EventData,
}

#[derive(Debug, Deserialize)]
struct EventData {
    object: serde_json::Value,
}

/// Decode a verified webhook payload into a [`GatewayEvent`]
pub fn decode_event(payload: &[u8]) -> CoreResult<GatewayEvent> {
    let envelope: EventEnvelope = serde_json::from_slice(payload)?;
    let object = &envelope.data.object;

    let object_id = || -> CoreResult<String> {
        object
            .get("id")
            .and_then(|v| v.as_str())
            .map(str::to_string)
            .ok_or_else(|| {
                CoreError::InvalidPayload(format!("{} event without object id", envelope.kind))
            })
    };

    let event = match envelope.kind.as_str() {
        "payment_intent.succeeded" => GatewayEvent::PaymentIntentSucceeded {
            intent_id: object_id()?,
        },
        "refund.updated" => {
            let status = match object.get("status").and_then(|v| v.as_str()) {
                Some("pending") => RefundStatus::Pending,
                Some("succeeded") => RefundStatus::Succeeded,
                Some("failed") => RefundStatus::Failed,
                Some("canceled") => RefundStatus::Cancelled,
                other => {
                    return Err(CoreError::InvalidPayload(format!(
                        "unknown refund status: {other:?}"
                    )))
                }
            };
            GatewayEvent::RefundUpdated {
                refund_id: object_id()?,
                status,
                amount: object
                    .get("amount")
                    .and_then(|v| v.as_i64())
                    .map(from_minor_units),
                created: object
                    .get("created")
                    .and_then(|v| v.as_i64())
                    .and_then(|secs| DateTime::<Utc>::from_timestamp(secs, 0)),
                destination: object
                    .get("destination_details")
                    .and_then(|d| d.get("type"))
                    .and_then(|v| v.as_str())
                    .map(RefundDestination::parse),
            }
        }
        "payout.paid" => GatewayEvent::PayoutUpdated {
            payout_id: object_id()?,
            status: crate::types::PayoutStatus::Paid,
        },
        "payout.failed" => GatewayEvent::PayoutUpdated {
            payout_id: object_id()?,
            status: crate::types::PayoutStatus::Failed,
        },
        "payout.canceled" => GatewayEvent::PayoutUpdated {
            payout_id: object_id()?,
            status: crate::types::PayoutStatus::Cancelled,
        },
        _ => GatewayEvent::Unrecognized {
            kind: envelope.kind.clone(),
        },
    };

    Ok(event)
}

/// Serializable event body, used when composing webhook payloads in tests
/// and development tooling
#[derive(Debug, Serialize)]
pub struct EventBody<'a> {
    /// Gateway event type string
    #[serde(rename = "type")]
    pub kind: &'a str,
    /// Event data wrapper
    pub data: serde_json::Value,
}

impl<'a> EventBody<'a> {
    /// Wrap an object in the gateway's event envelope
    pub fn new(kind: &'a str, object: serde_json::Value) -> Self {
        Self {
            kind,
            data: serde_json::json!({ "object": object }),
        }
    }
}
