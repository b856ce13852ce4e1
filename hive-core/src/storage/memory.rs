//! In-memory ledger
//!
//! Thread-safe in-memory implementation of [`LedgerStore`], used in tests
//! and development. Secondary indexes mirror the lookups the hosted
//! document store serves with filter queries.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use super::{LedgerStats, LedgerStore};
use crate::error::CoreResult;
use crate::types::{
    Booking, BookingId, BookingStatus, Earning, NotificationRecord, Payment, PaymentId, Payout,
    PayoutId, ProviderAccount, UserId,
};

/// In-memory ledger storage
#[derive(Debug, Default)]
pub struct MemoryLedger {
    bookings: Arc<RwLock<HashMap<BookingId, Booking>>>,
    payments: Arc<RwLock<HashMap<PaymentId, Payment>>>,
    earnings: Arc<RwLock<HashMap<BookingId, Earning>>>,
    payouts: Arc<RwLock<HashMap<PayoutId, Payout>>>,
    accounts: Arc<RwLock<HashMap<UserId, ProviderAccount>>>,
    notifications: Arc<RwLock<Vec<NotificationRecord>>>,
    // Indexes
    payment_by_booking: Arc<RwLock<HashMap<BookingId, PaymentId>>>,
    payment_by_intent: Arc<RwLock<HashMap<String, PaymentId>>>,
    payment_by_refund: Arc<RwLock<HashMap<String, PaymentId>>>,
    payout_by_gateway: Arc<RwLock<HashMap<String, PayoutId>>>,
}

impl MemoryLedger {
    /// Create an empty ledger
    pub fn new() -> Self {
        Self::default()
    }

    /// Clear all data
    pub async fn clear(&self) {
        self.bookings.write().await.clear();
        self.payments.write().await.clear();
        self.earnings.write().await.clear();
        self.payouts.write().await.clear();
        self.accounts.write().await.clear();
        self.notifications.write().await.clear();
        self.payment_by_booking.write().await.clear();
        self.payment_by_intent.write().await.clear();
        self.payment_by_refund.write().await.clear();
        self.payout_by_gateway.write().await.clear();
    }
}

fn sort_by_start(mut bookings: Vec<Booking>) -> Vec<Booking> {
    bookings.sort_by_key(|b| b.start_at);
    bookings
}

#[async_trait]
impl LedgerStore for MemoryLedger {
    // ==================== Booking operations ====================

    async fn save_booking(&self, booking: &Booking) -> CoreResult<()> {
        let mut bookings = self.bookings.write().await;
        bookings.insert(booking.id.clone(), booking.clone());
        Ok(())
    }

    async fn get_booking(&self, id: &BookingId) -> CoreResult<Option<Booking>> {
        let bookings = self.bookings.read().await;
        Ok(bookings.get(id).cloned())
    }

    async fn assign_provider_if_unassigned(
        &self,
        id: &BookingId,
        provider: &UserId,
    ) -> CoreResult<bool> {
        // Single write lock held across check and mutate: this is the
        // conditional-update primitive the accept/expiry race relies on.
        let mut bookings = self.bookings.write().await;
        match bookings.get_mut(id) {
            Some(booking)
                if booking.status == BookingStatus::Pending && booking.provider_id.is_none() =>
            {
                booking.provider_id = Some(provider.clone());
                booking.updated_at = Utc::now();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn list_bookings_by_requester(&self, user: &UserId) -> CoreResult<Vec<Booking>> {
        let bookings = self.bookings.read().await;
        Ok(sort_by_start(
            bookings
                .values()
                .filter(|b| &b.user_id == user)
                .cloned()
                .collect(),
        ))
    }

    async fn list_bookings_by_provider(&self, provider: &UserId) -> CoreResult<Vec<Booking>> {
        let bookings = self.bookings.read().await;
        Ok(sort_by_start(
            bookings
                .values()
                .filter(|b| b.provider_id.as_ref() == Some(provider))
                .cloned()
                .collect(),
        ))
    }

    async fn list_open_bookings(&self, not_before: DateTime<Utc>) -> CoreResult<Vec<Booking>> {
        let bookings = self.bookings.read().await;
        Ok(sort_by_start(
            bookings
                .values()
                .filter(|b| b.is_unassigned() && b.start_at >= not_before)
                .cloned()
                .collect(),
        ))
    }

    // ==================== Payment operations ====================

    async fn save_payment(&self, payment: &Payment) -> CoreResult<()> {
        let mut payments = self.payments.write().await;
        payments.insert(payment.id.clone(), payment.clone());

        let mut by_booking = self.payment_by_booking.write().await;
        by_booking.insert(payment.booking_id.clone(), payment.id.clone());

        let mut by_intent = self.payment_by_intent.write().await;
        by_intent.insert(payment.intent_id.clone(), payment.id.clone());

        if let Some(refund) = &payment.refund {
            let mut by_refund = self.payment_by_refund.write().await;
            by_refund.insert(refund.refund_id.clone(), payment.id.clone());
        }

        Ok(())
    }

    async fn get_payment(&self, id: &PaymentId) -> CoreResult<Option<Payment>> {
        let payments = self.payments.read().await;
        Ok(payments.get(id).cloned())
    }

    async fn payment_for_booking(&self, booking: &BookingId) -> CoreResult<Option<Payment>> {
        let by_booking = self.payment_by_booking.read().await;
        if let Some(payment_id) = by_booking.get(booking) {
            let payments = self.payments.read().await;
            return Ok(payments.get(payment_id).cloned());
        }
        Ok(None)
    }

    async fn payment_by_intent(&self, intent_id: &str) -> CoreResult<Option<Payment>> {
        let by_intent = self.payment_by_intent.read().await;
        if let Some(payment_id) = by_intent.get(intent_id) {
            let payments = self.payments.read().await;
            return Ok(payments.get(payment_id).cloned());
        }
        Ok(None)
    }

    async fn payment_by_refund(&self, refund_id: &str) -> CoreResult<Option<Payment>> {
        let by_refund = self.payment_by_refund.read().await;
        if let Some(payment_id) = by_refund.get(refund_id) {
            let payments = self.payments.read().await;
            return Ok(payments.get(payment_id).cloned());
        }
        Ok(None)
    }

    // ==================== Earning operations ====================

    async fn save_earning(&self, earning: &Earning) -> CoreResult<()> {
        let mut earnings = self.earnings.write().await;
        earnings.insert(earning.booking_id.clone(), earning.clone());
        Ok(())
    }

    async fn earning_for_booking(&self, booking: &BookingId) -> CoreResult<Option<Earning>> {
        let earnings = self.earnings.read().await;
        Ok(earnings.get(booking).cloned())
    }

    async fn delete_earning_for_booking(&self, booking: &BookingId) -> CoreResult<()> {
        let mut earnings = self.earnings.write().await;
        earnings.remove(booking);
        Ok(())
    }

    // ==================== Payout operations ====================

    async fn save_payout(&self, payout: &Payout) -> CoreResult<()> {
        let mut payouts = self.payouts.write().await;
        payouts.insert(payout.id.clone(), payout.clone());

        let mut by_gateway = self.payout_by_gateway.write().await;
        by_gateway.insert(payout.gateway_payout_id.clone(), payout.id.clone());

        Ok(())
    }

    async fn get_payout(&self, id: &PayoutId) -> CoreResult<Option<Payout>> {
        let payouts = self.payouts.read().await;
        Ok(payouts.get(id).cloned())
    }

    async fn payout_by_gateway_id(&self, gateway_payout_id: &str) -> CoreResult<Option<Payout>> {
        let by_gateway = self.payout_by_gateway.read().await;
        if let Some(payout_id) = by_gateway.get(gateway_payout_id) {
            let payouts = self.payouts.read().await;
            return Ok(payouts.get(payout_id).cloned());
        }
        Ok(None)
    }

    // ==================== Account operations ====================

    async fn save_account(&self, account: &ProviderAccount) -> CoreResult<()> {
        let mut accounts = self.accounts.write().await;
        accounts.insert(account.user_id.clone(), account.clone());
        Ok(())
    }

    async fn get_account(&self, user: &UserId) -> CoreResult<Option<ProviderAccount>> {
        let accounts = self.accounts.read().await;
        Ok(accounts.get(user).cloned())
    }

    async fn list_available_providers(&self) -> CoreResult<Vec<UserId>> {
        let accounts = self.accounts.read().await;
        Ok(accounts
            .values()
            .filter(|a| a.is_available)
            .map(|a| a.user_id.clone())
            .collect())
    }

    // ==================== Notification operations ====================

    async fn save_notification(&self, record: &NotificationRecord) -> CoreResult<()> {
        let mut notifications = self.notifications.write().await;
        notifications.push(record.clone());
        Ok(())
    }

    async fn notifications_for_user(
        &self,
        user: &UserId,
    ) -> CoreResult<Vec<NotificationRecord>> {
        let notifications = self.notifications.read().await;
        let mut records: Vec<NotificationRecord> = notifications
            .iter()
            .filter(|n| &n.user_id == user)
            .cloned()
            .collect();
        records.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(records)
    }

    // ==================== Diagnostics ====================

    async fn stats(&self) -> CoreResult<LedgerStats> {
        Ok(LedgerStats {
            bookings: self.bookings.read().await.len() as u64,
            payments: self.payments.read().await.len() as u64,
            earnings: self.earnings.read().await.len() as u64,
            payouts: self.payouts.read().await.len() as u64,
            accounts: self.accounts.read().await.len() as u64,
            notifications: self.notifications.read().await.len() as u64,
        })
    }
}
