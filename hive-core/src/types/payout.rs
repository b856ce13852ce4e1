//! Payout record
//!
//! A transfer of a provider's accumulated balance out to their external
//! account. The core only reacts to webhook-driven status updates; creation
//! happens elsewhere. On failure or cancellation the provider's balance is
//! credited back exactly once, guarded by the terminal-before-update check.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::common::{PayoutId, UserId};

/// Payout status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum PayoutStatus {
    /// Initiated, gateway outcome unknown
    #[default]
    Pending,
    /// Funds arrived at the external account
    Paid,
    /// Gateway could not deliver the funds
    Failed,
    /// Cancelled before delivery
    Cancelled,
}

impl PayoutStatus {
    /// Whether the status is terminal
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Pending)
    }

    /// Whether the payout amount must be returned to the provider's balance
    pub fn reverses_balance(&self) -> bool {
        matches!(self, Self::Failed | Self::Cancelled)
    }
}

/// Destination details reported by the gateway
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PayoutDestination {
    /// Destination kind ("bank_account" or "card")
    pub kind: String,
    /// Last four digits of the destination account
    pub last4: Option<String>,
    /// Destination country
    pub country: Option<String>,
    /// Destination currency
    pub currency: Option<String>,
}

/// Provider payout
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Payout {
    /// Payout id
    pub id: PayoutId,
    /// Provider whose balance funded the payout
    pub user_id: UserId,
    /// Payout amount
    pub amount: Decimal,
    /// Payout currency
    pub currency: String,
    /// Gateway payout id
    pub gateway_payout_id: String,
    /// Payout status
    pub status: PayoutStatus,
    /// Destination details
    pub destination: PayoutDestination,
    /// Creation time
    pub created_at: DateTime<Utc>,
    /// Last mutation time
    pub updated_at: DateTime<Utc>,
}

impl Payout {
    /// Create a pending payout record
    pub fn new(
        user_id: UserId,
        amount: Decimal,
        currency: impl Into<String>,
        gateway_payout_id: impl Into<String>,
        destination: PayoutDestination,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: PayoutId::generate(),
            user_id,
            amount,
            currency: currency.into(),
            gateway_payout_id: gateway_payout_id.into(),
            status: PayoutStatus::Pending,
            destination,
            created_at: now,
            updated_at: now,
        }
    }

    /// Apply a webhook-driven status update.
    ///
    /// Returns true when the update moved the payout out of Pending for the
    /// first time; duplicate deliveries of a terminal status return false so
    /// the caller skips the balance reversal.
    pub fn apply_status(&mut self, status: PayoutStatus) -> bool {
        if self.status.is_terminal() {
            return false;
        }
        self.status = status;
        self.updated_at = Utc::now();
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_payout() -> Payout {
        Payout::new(
            UserId::new("provider-1"),
            Decimal::new(120, 0),
            "usd",
            "po_123",
            PayoutDestination {
                kind: "bank_account".to_string(),
                last4: Some("4242".to_string()),
                country: Some("US".to_string()),
                currency: Some("usd".to_string()),
            },
        )
    }

    #[test]
    fn test_apply_status_once() {
        let mut payout = create_test_payout();
        assert!(payout.apply_status(PayoutStatus::Failed));
        assert_eq!(payout.status, PayoutStatus::Failed);

        // Duplicate webhook delivery
        assert!(!payout.apply_status(PayoutStatus::Failed));
        assert!(!payout.apply_status(PayoutStatus::Paid));
        assert_eq!(payout.status, PayoutStatus::Failed);
    }

    #[test]
    fn test_reverses_balance() {
        assert!(PayoutStatus::Failed.reverses_balance());
        assert!(PayoutStatus::Cancelled.reverses_balance());
        assert!(!PayoutStatus::Paid.reverses_balance());
        assert!(!PayoutStatus::Pending.reverses_balance());
    }
}
