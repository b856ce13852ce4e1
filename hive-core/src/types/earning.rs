//! Earning record
//!
//! The provider's net-of-commission share of a booking payment, created at
//! completion and settled on a delay. The status moves from Pending to
//! exactly one terminal state; re-delivered settlement triggers must see a
//! terminal record and do nothing.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::common::{BookingId, EarningId};

/// Earning status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum EarningStatus {
    /// Awaiting deferred settlement
    #[default]
    Pending,
    /// Funds transferred to the provider's connected account
    Completed,
    /// Settlement abandoned (booking dispute or reversal)
    Cancelled,
}

impl EarningStatus {
    /// Whether the status is terminal
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Pending)
    }
}

/// Provider earning for a completed booking (1:1)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Earning {
    /// Earning id
    pub id: EarningId,
    /// Booking that produced the earning
    pub booking_id: BookingId,
    /// Net amount owed to the provider
    pub amount: Decimal,
    /// Earning status
    pub status: EarningStatus,
    /// Settlement time, set when status becomes Completed
    pub completion_date: Option<DateTime<Utc>>,
    /// Gateway transfer id; the reconciliation key for settlement
    pub transfer_id: Option<String>,
    /// Creation time
    pub created_at: DateTime<Utc>,
}

impl Earning {
    /// Create a pending earning for a booking
    pub fn new(booking_id: BookingId, amount: Decimal) -> Self {
        Self {
            id: EarningId::generate(),
            booking_id,
            amount,
            status: EarningStatus::Pending,
            completion_date: None,
            transfer_id: None,
            created_at: Utc::now(),
        }
    }

    /// Mark the earning settled with the executed transfer id.
    ///
    /// Returns false when the record is already terminal.
    pub fn mark_completed(&mut self, transfer_id: impl Into<String>) -> bool {
        if self.status.is_terminal() {
            return false;
        }
        self.status = EarningStatus::Completed;
        self.completion_date = Some(Utc::now());
        self.transfer_id = Some(transfer_id.into());
        true
    }

    /// Mark the earning cancelled. Returns false when already terminal.
    pub fn mark_cancelled(&mut self) -> bool {
        if self.status.is_terminal() {
            return false;
        }
        self.status = EarningStatus::Cancelled;
        true
    }
}
