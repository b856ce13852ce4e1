//! Ledger storage port
//!
//! Document-store operations the engines depend on. The production system
//! backs this with a hosted document database; [`MemoryLedger`] backs it in
//! tests and development. Cross-entity consistency is the engines' job; the
//! store only promises that each individual save is atomic and that
//! [`LedgerStore::assign_provider_if_unassigned`] is a conditional write.

pub mod memory;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::CoreResult;
use crate::types::{
    Booking, BookingId, Earning, NotificationRecord, Payment, PaymentId, Payout, PayoutId,
    ProviderAccount, UserId,
};

/// Ledger storage interface
#[async_trait]
pub trait LedgerStore: Send + Sync {
    // ==================== Booking operations ====================

    /// Save a booking (insert or replace)
    async fn save_booking(&self, booking: &Booking) -> CoreResult<()>;

    /// Get a booking by id
    async fn get_booking(&self, id: &BookingId) -> CoreResult<Option<Booking>>;

    /// Conditionally assign a provider to a still-unassigned pending
    /// booking. Returns false, without mutating, when the booking is
    /// missing, no longer pending, or already assigned.
    async fn assign_provider_if_unassigned(
        &self,
        id: &BookingId,
        provider: &UserId,
    ) -> CoreResult<bool>;

    /// List bookings requested by a user, soonest start first
    async fn list_bookings_by_requester(&self, user: &UserId) -> CoreResult<Vec<Booking>>;

    /// List bookings assigned to a provider, soonest start first
    async fn list_bookings_by_provider(&self, provider: &UserId) -> CoreResult<Vec<Booking>>;

    /// List unassigned pending bookings starting at or after `not_before`,
    /// soonest start first
    async fn list_open_bookings(&self, not_before: DateTime<Utc>) -> CoreResult<Vec<Booking>>;

    // ==================== Payment operations ====================

    /// Save a payment (insert or replace)
    async fn save_payment(&self, payment: &Payment) -> CoreResult<()>;

    /// Get a payment by id
    async fn get_payment(&self, id: &PaymentId) -> CoreResult<Option<Payment>>;

    /// Get the payment backing a booking
    async fn payment_for_booking(&self, booking: &BookingId) -> CoreResult<Option<Payment>>;

    /// Find a payment by gateway intent id
    async fn payment_by_intent(&self, intent_id: &str) -> CoreResult<Option<Payment>>;

    /// Find a payment by gateway refund id
    async fn payment_by_refund(&self, refund_id: &str) -> CoreResult<Option<Payment>>;

    // ==================== Earning operations ====================

    /// Save an earning (insert or replace)
    async fn save_earning(&self, earning: &Earning) -> CoreResult<()>;

    /// Get the earning for a booking
    async fn earning_for_booking(&self, booking: &BookingId) -> CoreResult<Option<Earning>>;

    /// Delete the earning for a booking (completion rollback)
    async fn delete_earning_for_booking(&self, booking: &BookingId) -> CoreResult<()>;

    // ==================== Payout operations ====================

    /// Save a payout (insert or replace)
    async fn save_payout(&self, payout: &Payout) -> CoreResult<()>;

    /// Get a payout by id
    async fn get_payout(&self, id: &PayoutId) -> CoreResult<Option<Payout>>;

    /// Find a payout by gateway payout id
    async fn payout_by_gateway_id(&self, gateway_payout_id: &str) -> CoreResult<Option<Payout>>;

    // ==================== Account operations ====================

    /// Save a provider account projection (insert or replace)
    async fn save_account(&self, account: &ProviderAccount) -> CoreResult<()>;

    /// Get a provider account projection
    async fn get_account(&self, user: &UserId) -> CoreResult<Option<ProviderAccount>>;

    /// List providers currently accepting job broadcasts
    async fn list_available_providers(&self) -> CoreResult<Vec<UserId>>;

    // ==================== Notification operations ====================

    /// Append a persisted notification record
    async fn save_notification(&self, record: &NotificationRecord) -> CoreResult<()>;

    /// List notifications for a user, newest first
    async fn notifications_for_user(&self, user: &UserId)
        -> CoreResult<Vec<NotificationRecord>>;

    // ==================== Diagnostics ====================

    /// Get record counts
    async fn stats(&self) -> CoreResult<LedgerStats>;
}

/// Record counts for diagnostics
#[derive(Debug, Clone, Default)]
pub struct LedgerStats {
    /// Booking count
    pub bookings: u64,
    /// Payment count
    pub payments: u64,
    /// Earning count
    pub earnings: u64,
    /// Payout count
    pub payouts: u64,
    /// Provider account count
    pub accounts: u64,
    /// Notification record count
    pub notifications: u64,
}

pub use memory::MemoryLedger;
