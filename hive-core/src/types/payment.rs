//! Payment record and refund sub-record

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::common::{BookingId, PaymentId};

/// Payment status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    /// Intent created, capture not confirmed
    #[default]
    Pending,
    /// Gateway confirmed the capture
    Completed,
    /// Intent abandoned or voided
    Cancelled,
}

/// Refund status, monotonic once terminal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RefundStatus {
    /// Refund initiated, gateway outcome unknown
    Pending,
    /// Funds returned to the payer
    Succeeded,
    /// Gateway could not return the funds
    Failed,
    /// Refund cancelled before execution
    Cancelled,
}

impl RefundStatus {
    /// Whether the status is terminal
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Pending)
    }
}

/// Destination account type reported by the gateway for a refund
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RefundDestination {
    Card,
    BankAccount,
    Other(String),
}

impl RefundDestination {
    /// Parse the gateway's destination-type string
    pub fn parse(s: &str) -> Self {
        match s {
            "card" => Self::Card,
            "bank_account" => Self::BankAccount,
            other => Self::Other(other.to_string()),
        }
    }
}

/// Refund sub-record, populated once a refund has been initiated
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefundInfo {
    /// Gateway refund id
    pub refund_id: String,
    /// Refund status
    pub status: RefundStatus,
    /// Refunded amount, as reported by the gateway
    pub amount: Option<Decimal>,
    /// Gateway-side creation time
    pub created: Option<DateTime<Utc>>,
    /// Destination account type
    pub destination: Option<RefundDestination>,
}

impl RefundInfo {
    /// A freshly initiated refund
    pub fn pending(refund_id: impl Into<String>) -> Self {
        Self {
            refund_id: refund_id.into(),
            status: RefundStatus::Pending,
            amount: None,
            created: None,
            destination: None,
        }
    }
}

/// Payment backing a booking (1:1)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Payment {
    /// Payment id
    pub id: PaymentId,
    /// Booking this payment backs
    pub booking_id: BookingId,
    /// Captured amount
    pub amount: Decimal,
    /// Payment status
    pub status: PaymentStatus,
    /// Gateway payment-intent id
    pub intent_id: String,
    /// Client secret handed to the payer's client
    pub client_secret: Option<String>,
    /// Refund, once one has been initiated
    pub refund: Option<RefundInfo>,
    /// Creation time
    pub created_at: DateTime<Utc>,
    /// Last mutation time
    pub updated_at: DateTime<Utc>,
}

impl Payment {
    /// Create a pending payment for a booking
    pub fn new(
        booking_id: BookingId,
        amount: Decimal,
        intent_id: impl Into<String>,
        client_secret: Option<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: PaymentId::generate(),
            booking_id,
            amount,
            status: PaymentStatus::Pending,
            intent_id: intent_id.into(),
            client_secret,
            refund: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Whether the capture has been confirmed
    pub fn is_completed(&self) -> bool {
        self.status == PaymentStatus::Completed
    }

    /// Record a refund update from the gateway.
    ///
    /// Returns false (no mutation) when no refund was initiated, the update
    /// is for a different refund, or the refund is already terminal.
    pub fn apply_refund_update(
        &mut self,
        refund_id: &str,
        status: RefundStatus,
        amount: Option<Decimal>,
        created: Option<DateTime<Utc>>,
        destination: Option<RefundDestination>,
    ) -> bool {
        let Some(refund) = self.refund.as_mut() else {
            return false;
        };
        if refund.refund_id != refund_id || refund.status.is_terminal() {
            return false;
        }
        refund.status = status;
        if amount.is_some() {
            refund.amount = amount;
        }
        if created.is_some() {
            refund.created = created;
        }
        if destination.is_some() {
            refund.destination = destination;
        }
        self.updated_at = Utc::now();
        true
    }
}
