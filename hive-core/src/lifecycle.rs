//! Booking Lifecycle Engine
//!
//! Owns the booking state machine and the side effects of each transition.
//! Every operation re-reads current state immediately before committing and
//! rejects precondition violations without partial mutation. Side effects
//! that must not be lost (settlement scheduling, refund initiation) run
//! before the state commit so that a failure aborts the transition; push
//! notifications run after and are best effort.

use chrono::{Duration, Utc};
use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::{info, warn};

use crate::config::CoreConfig;
use crate::error::{CoreError, CoreResult};
use crate::gateway::PaymentGateway;
use crate::notify::{send_and_store, Note, Notifier};
use crate::scheduler::TaskScheduler;
use crate::storage::LedgerStore;
use crate::types::{
    Booking, BookingId, Earning, Payment, PaymentStatus, RefundInfo, UserId,
};

/// Outcome of the system-triggered expiry check
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExpiryOutcome {
    /// The booking was still unaccepted and has been cancelled
    Expired,
    /// The booking had already moved on; nothing was changed
    AlreadyHandled,
    /// No such booking
    NotFound,
}

/// Booking lifecycle engine
pub struct LifecycleEngine {
    ledger: Arc<dyn LedgerStore>,
    gateway: Arc<dyn PaymentGateway>,
    scheduler: Arc<dyn TaskScheduler>,
    notifier: Arc<dyn Notifier>,
    config: CoreConfig,
}

impl LifecycleEngine {
    /// Create an engine over the given ports
    pub fn new(
        ledger: Arc<dyn LedgerStore>,
        gateway: Arc<dyn PaymentGateway>,
        scheduler: Arc<dyn TaskScheduler>,
        notifier: Arc<dyn Notifier>,
        config: CoreConfig,
    ) -> Self {
        Self {
            ledger,
            gateway,
            scheduler,
            notifier,
            config,
        }
    }

    async fn load_booking(&self, id: &BookingId) -> CoreResult<Booking> {
        self.ledger
            .get_booking(id)
            .await?
            .ok_or_else(|| CoreError::NotFound {
                entity: "booking",
                id: id.to_string(),
            })
    }

    async fn completed_payment(&self, booking: &BookingId) -> CoreResult<Payment> {
        match self.ledger.payment_for_booking(booking).await? {
            Some(payment) if payment.is_completed() => Ok(payment),
            _ => Err(CoreError::PaymentIncomplete(booking.to_string())),
        }
    }

    /// Create a pending, unassigned booking and schedule its acceptance
    /// deadline. The expiry trigger is scheduled before the booking is
    /// persisted; a stale trigger for an unsaved booking is a no-op.
    pub async fn create_booking(
        &self,
        user: UserId,
        amount: Decimal,
        start_at: chrono::DateTime<Utc>,
    ) -> CoreResult<Booking> {
        if amount <= Decimal::ZERO {
            return Err(CoreError::Validation(
                "booking amount must be positive".to_string(),
            ));
        }
        if start_at <= Utc::now() {
            return Err(CoreError::Validation(
                "booking start must be in the future".to_string(),
            ));
        }

        let booking = Booking::new(user, amount, start_at);

        self.scheduler
            .schedule(
                &self.config.booking_expired_url(),
                serde_json::json!({ "bookingId": booking.id }),
                start_at,
            )
            .await?;

        self.ledger.save_booking(&booking).await?;
        info!(booking = %booking.id, start = %booking.start_at, "booking created");
        Ok(booking)
    }

    /// Create the gateway payment intent and pending payment record for a
    /// booking. Returns the existing record when an intent was already
    /// created.
    pub async fn create_payment_intent(&self, id: &BookingId) -> CoreResult<Payment> {
        let booking = self.load_booking(id).await?;

        if let Some(existing) = self.ledger.payment_for_booking(id).await? {
            return Ok(existing);
        }

        let intent = self
            .gateway
            .create_payment_intent(booking.amount, &self.config.currency)
            .await?;
        let payment = Payment::new(
            booking.id.clone(),
            booking.amount,
            intent.id,
            intent.client_secret,
        );
        self.ledger.save_payment(&payment).await?;
        Ok(payment)
    }

    /// Accept a pending, unassigned, paid booking as `provider`.
    ///
    /// Assignment is a conditional write: when two providers race, exactly
    /// one wins and the other observes a state conflict.
    pub async fn accept(&self, id: &BookingId, provider: &UserId) -> CoreResult<Booking> {
        let booking = self.load_booking(id).await?;

        if !booking.is_unassigned() {
            return Err(CoreError::AlreadyAssigned(id.to_string()));
        }
        self.completed_payment(id).await?;
        if booking.start_at <= Utc::now() {
            return Err(CoreError::StartTimePassed(id.to_string()));
        }

        let assigned = self
            .ledger
            .assign_provider_if_unassigned(id, provider)
            .await?;
        if !assigned {
            return Err(CoreError::AlreadyAssigned(id.to_string()));
        }

        info!(booking = %id, provider = %provider, "booking accepted");
        self.load_booking(id).await
    }

    /// Record the assigned provider's request to start; the requester must
    /// approve before the booking moves in progress.
    pub async fn request_start(&self, id: &BookingId, provider: &UserId) -> CoreResult<Booking> {
        let mut booking = self.load_booking(id).await?;
        booking.request_start(provider)?;
        self.ledger.save_booking(&booking).await?;

        send_and_store(
            self.notifier.as_ref(),
            self.ledger.as_ref(),
            &[booking.user_id.clone()],
            &Note::new(
                "Booking start requested",
                "Please approve the provider's request to start the job.",
                "BookingDetails",
                serde_json::json!({ "bookingId": booking.id }),
            ),
        )
        .await;

        Ok(booking)
    }

    /// Approve the provider's start request as the requester, moving the
    /// booking in progress.
    pub async fn approve_start(&self, id: &BookingId, user: &UserId) -> CoreResult<Booking> {
        let mut booking = self.load_booking(id).await?;
        booking.approve_start(user)?;
        self.ledger.save_booking(&booking).await?;

        if let Some(provider) = booking.provider_id.clone() {
            send_and_store(
                self.notifier.as_ref(),
                self.ledger.as_ref(),
                &[provider],
                &Note::new(
                    "Booking start approved",
                    "Your start request was approved. Your time is being tracked.",
                    "MyOrderDetails",
                    serde_json::json!({ "bookingId": booking.id }),
                ),
            )
            .await;
        }

        Ok(booking)
    }

    /// Complete an in-progress booking as either party.
    ///
    /// Ordering is a correctness invariant: the pending earning and its
    /// settlement trigger exist before the booking is marked completed. A
    /// scheduling failure aborts the completion and removes the earning so
    /// no earning can exist without a scheduled settlement.
    pub async fn complete(&self, id: &BookingId, actor: &UserId) -> CoreResult<Booking> {
        let mut booking = self.load_booking(id).await?;
        booking.mark_completed(actor)?;
        let payment = self.completed_payment(id).await?;

        let earning = Earning::new(id.clone(), self.config.provider_share(payment.amount));
        self.ledger.save_earning(&earning).await?;

        let settle_at = Utc::now() + Duration::seconds(self.config.settlement_delay_secs as i64);
        let scheduled = self
            .scheduler
            .schedule(
                &self.config.earning_complete_url(),
                serde_json::json!({ "bookingId": id }),
                settle_at,
            )
            .await;

        if let Err(e) = scheduled {
            warn!(booking = %id, error = %e, "settlement scheduling failed; completion aborted");
            self.ledger.delete_earning_for_booking(id).await?;
            return Err(e);
        }

        self.ledger.save_booking(&booking).await?;
        info!(booking = %id, actor = %actor, amount = %earning.amount, "booking completed");

        send_and_store(
            self.notifier.as_ref(),
            self.ledger.as_ref(),
            &[booking.user_id.clone()],
            &Note::new(
                "Booking completed",
                "Your booking has been marked as completed.",
                "BookingDetails",
                serde_json::json!({ "bookingId": booking.id }),
            ),
        )
        .await;
        if let Some(provider) = booking.provider_id.clone() {
            send_and_store(
                self.notifier.as_ref(),
                self.ledger.as_ref(),
                &[provider],
                &Note::new(
                    "Booking completed",
                    "The booking was marked as completed. Your earning settles shortly.",
                    "MyOrderDetails",
                    serde_json::json!({ "bookingId": booking.id }),
                ),
            )
            .await;
        }

        Ok(booking)
    }

    /// Cancel a pending booking as either party, refunding a completed
    /// payment if one exists.
    pub async fn cancel(&self, id: &BookingId, actor: &UserId) -> CoreResult<Booking> {
        let mut booking = self.load_booking(id).await?;
        booking.mark_cancelled(actor)?;

        self.initiate_refund_if_paid(id).await?;
        self.ledger.save_booking(&booking).await?;
        info!(booking = %id, actor = %actor, "booking cancelled");

        self.notify_cancellation(&booking).await;
        Ok(booking)
    }

    /// System-triggered expiry of a still-unaccepted booking. Fired by the
    /// deferred task queue at the acceptance deadline; a booking that has
    /// already been accepted or resolved is left untouched.
    pub async fn expire_unaccepted(&self, id: &BookingId) -> CoreResult<ExpiryOutcome> {
        let Some(mut booking) = self.ledger.get_booking(id).await? else {
            return Ok(ExpiryOutcome::NotFound);
        };
        if !booking.is_unassigned() {
            return Ok(ExpiryOutcome::AlreadyHandled);
        }

        let requester = booking.user_id.clone();
        if booking.mark_cancelled(&requester).is_err() {
            return Ok(ExpiryOutcome::AlreadyHandled);
        }

        self.initiate_refund_if_paid(id).await?;
        self.ledger.save_booking(&booking).await?;
        info!(booking = %id, "unaccepted booking expired");

        send_and_store(
            self.notifier.as_ref(),
            self.ledger.as_ref(),
            &[requester],
            &Note::new(
                "Booking expired",
                "No provider accepted your booking in time. Your payment will be refunded.",
                "BookingDetails",
                serde_json::json!({ "bookingId": booking.id }),
            ),
        )
        .await;

        Ok(ExpiryOutcome::Expired)
    }

    /// Booking plus its payment, for detail views
    pub async fn booking_with_payment(
        &self,
        id: &BookingId,
    ) -> CoreResult<(Booking, Option<Payment>)> {
        let booking = self.load_booking(id).await?;
        let payment = self.ledger.payment_for_booking(id).await?;
        Ok((booking, payment))
    }

    /// Unassigned, paid bookings far enough from their start to offer to
    /// providers
    pub async fn open_bookings(&self) -> CoreResult<Vec<Booking>> {
        let not_before = Utc::now() + Duration::seconds(self.config.booking_lead_secs as i64);
        let candidates = self.ledger.list_open_bookings(not_before).await?;

        let mut paid = Vec::with_capacity(candidates.len());
        for booking in candidates {
            if let Some(payment) = self.ledger.payment_for_booking(&booking.id).await? {
                if payment.status == PaymentStatus::Completed {
                    paid.push(booking);
                }
            }
        }
        Ok(paid)
    }

    /// Bookings requested by a user
    pub async fn bookings_for_user(&self, user: &UserId) -> CoreResult<Vec<Booking>> {
        self.ledger.list_bookings_by_requester(user).await
    }

    /// Bookings assigned to a provider
    pub async fn bookings_for_provider(&self, provider: &UserId) -> CoreResult<Vec<Booking>> {
        self.ledger.list_bookings_by_provider(provider).await
    }

    async fn initiate_refund_if_paid(&self, id: &BookingId) -> CoreResult<()> {
        let Some(mut payment) = self.ledger.payment_for_booking(id).await? else {
            return Ok(());
        };
        if !payment.is_completed() || payment.refund.is_some() {
            return Ok(());
        }

        let refund = self.gateway.create_refund(&payment.intent_id).await?;
        payment.refund = Some(RefundInfo::pending(refund.id));
        self.ledger.save_payment(&payment).await?;
        info!(booking = %id, intent = %payment.intent_id, "refund initiated");
        Ok(())
    }

    async fn notify_cancellation(&self, booking: &Booking) {
        let mut recipients = vec![booking.user_id.clone()];
        if let Some(provider) = booking.provider_id.clone() {
            recipients.push(provider);
        }
        send_and_store(
            self.notifier.as_ref(),
            self.ledger.as_ref(),
            &recipients,
            &Note::new(
                "Booking cancelled",
                "The booking has been cancelled.",
                "BookingDetails",
                serde_json::json!({ "bookingId": booking.id }),
            ),
        )
        .await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{CapturingNotifier, MockGateway, MockScheduler};
    use crate::storage::MemoryLedger;
    use crate::types::{BookingStatus, RefundStatus};

    struct Harness {
        ledger: Arc<MemoryLedger>,
        gateway: Arc<MockGateway>,
        scheduler: Arc<MockScheduler>,
        notifier: Arc<CapturingNotifier>,
        engine: LifecycleEngine,
    }

    fn harness() -> Harness {
        let ledger = Arc::new(MemoryLedger::new());
        let gateway = Arc::new(MockGateway::new());
        let scheduler = Arc::new(MockScheduler::new());
        let notifier = Arc::new(CapturingNotifier::new());
        let engine = LifecycleEngine::new(
            ledger.clone(),
            gateway.clone(),
            scheduler.clone(),
            notifier.clone(),
            CoreConfig::development(),
        );
        Harness {
            ledger,
            gateway,
            scheduler,
            notifier,
            engine,
        }
    }

    async fn seed_paid_booking(h: &Harness) -> Booking {
        let booking = Booking::new(
            UserId::new("user-1"),
            Decimal::new(100, 0),
            Utc::now() + Duration::hours(4),
        );
        h.ledger.save_booking(&booking).await.unwrap();

        let mut payment = Payment::new(
            booking.id.clone(),
            booking.amount,
            format!("pi_{}", booking.id),
            None,
        );
        payment.status = PaymentStatus::Completed;
        h.ledger.save_payment(&payment).await.unwrap();

        booking
    }

    async fn seed_in_progress_booking(h: &Harness) -> (Booking, UserId) {
        let booking = seed_paid_booking(h).await;
        let provider = UserId::new("provider-1");
        h.engine.accept(&booking.id, &provider).await.unwrap();
        h.engine.request_start(&booking.id, &provider).await.unwrap();
        let booking = h
            .engine
            .approve_start(&booking.id, &booking.user_id)
            .await
            .unwrap();
        (booking, provider)
    }

    #[tokio::test]
    async fn test_create_booking_schedules_expiry() {
        let h = harness();
        let start = Utc::now() + Duration::hours(6);
        let booking = h
            .engine
            .create_booking(UserId::new("user-1"), Decimal::new(50, 0), start)
            .await
            .unwrap();

        assert_eq!(booking.status, BookingStatus::Pending);
        let tasks = h.scheduler.tasks();
        assert_eq!(tasks.len(), 1);
        assert!(tasks[0].target_url.ends_with("/tasks/booking-expired"));
        assert_eq!(tasks[0].body["bookingId"], booking.id.as_str());
        assert_eq!(tasks[0].run_at, start);
    }

    #[tokio::test]
    async fn test_create_booking_rejects_past_start() {
        let h = harness();
        let result = h
            .engine
            .create_booking(
                UserId::new("user-1"),
                Decimal::new(50, 0),
                Utc::now() - Duration::minutes(1),
            )
            .await;
        assert!(matches!(result, Err(CoreError::Validation(_))));
        assert!(h.scheduler.tasks().is_empty());
    }

    #[tokio::test]
    async fn test_create_payment_intent_is_reused() {
        let h = harness();
        let booking = h
            .engine
            .create_booking(
                UserId::new("user-1"),
                Decimal::new(75, 0),
                Utc::now() + Duration::hours(2),
            )
            .await
            .unwrap();

        let first = h.engine.create_payment_intent(&booking.id).await.unwrap();
        let second = h.engine.create_payment_intent(&booking.id).await.unwrap();
        assert_eq!(first.id, second.id);
        assert_eq!(first.intent_id, second.intent_id);
        assert_eq!(first.status, PaymentStatus::Pending);
    }

    #[tokio::test]
    async fn test_accept_assigns_provider() {
        let h = harness();
        let booking = seed_paid_booking(&h).await;

        let accepted = h
            .engine
            .accept(&booking.id, &UserId::new("provider-1"))
            .await
            .unwrap();
        assert_eq!(accepted.provider_id, Some(UserId::new("provider-1")));
        assert_eq!(accepted.status, BookingStatus::Pending);
    }

    #[tokio::test]
    async fn test_accept_requires_completed_payment() {
        let h = harness();
        let booking = Booking::new(
            UserId::new("user-1"),
            Decimal::new(100, 0),
            Utc::now() + Duration::hours(4),
        );
        h.ledger.save_booking(&booking).await.unwrap();

        let result = h.engine.accept(&booking.id, &UserId::new("provider-1")).await;
        assert!(matches!(result, Err(CoreError::PaymentIncomplete(_))));
    }

    #[tokio::test]
    async fn test_accept_rejects_passed_start_time() {
        let h = harness();
        let booking = seed_paid_booking(&h).await;
        let mut stale = h.ledger.get_booking(&booking.id).await.unwrap().unwrap();
        stale.start_at = Utc::now() - Duration::minutes(5);
        h.ledger.save_booking(&stale).await.unwrap();

        let result = h.engine.accept(&booking.id, &UserId::new("provider-1")).await;
        assert!(matches!(result, Err(CoreError::StartTimePassed(_))));
    }

    #[tokio::test]
    async fn test_accept_race_has_single_winner() {
        let h = harness();
        let booking = seed_paid_booking(&h).await;

        h.engine
            .accept(&booking.id, &UserId::new("provider-1"))
            .await
            .unwrap();
        let second = h.engine.accept(&booking.id, &UserId::new("provider-2")).await;
        assert!(matches!(second, Err(CoreError::AlreadyAssigned(_))));

        let stored = h.ledger.get_booking(&booking.id).await.unwrap().unwrap();
        assert_eq!(stored.provider_id, Some(UserId::new("provider-1")));
    }

    #[tokio::test]
    async fn test_start_flow_requires_request_then_approval() {
        let h = harness();
        let booking = seed_paid_booking(&h).await;
        let provider = UserId::new("provider-1");
        h.engine.accept(&booking.id, &provider).await.unwrap();

        // Approval before request is rejected
        let early = h.engine.approve_start(&booking.id, &booking.user_id).await;
        assert!(matches!(early, Err(CoreError::ApprovalNotRequested(_))));

        h.engine.request_start(&booking.id, &provider).await.unwrap();
        let started = h
            .engine
            .approve_start(&booking.id, &booking.user_id)
            .await
            .unwrap();
        assert_eq!(started.status, BookingStatus::InProgress);

        // The requester was asked, the provider was told
        let sent = h.notifier.sent();
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[0].recipients, vec![booking.user_id.clone()]);
        assert_eq!(sent[1].recipients, vec![provider]);
    }

    #[tokio::test]
    async fn test_complete_creates_earning_and_schedules_settlement() {
        let h = harness();
        let (booking, provider) = seed_in_progress_booking(&h).await;
        let before = h.scheduler.tasks().len();

        let completed = h.engine.complete(&booking.id, &provider).await.unwrap();
        assert_eq!(completed.status, BookingStatus::Completed);
        assert_eq!(completed.completed_by, Some(provider));
        assert!(completed.completed_at.is_some());

        // 20% commission on the $100 payment
        let earning = h
            .ledger
            .earning_for_booking(&booking.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(earning.amount, Decimal::new(8000, 2));
        assert_eq!(earning.status, crate::types::EarningStatus::Pending);

        let tasks = h.scheduler.tasks();
        assert_eq!(tasks.len(), before + 1);
        let task = tasks.last().unwrap();
        assert!(task.target_url.ends_with("/tasks/earning-complete"));
        assert_eq!(task.body["bookingId"], booking.id.as_str());
    }

    #[tokio::test]
    async fn test_complete_aborts_when_scheduling_fails() {
        let h = harness();
        let (booking, provider) = seed_in_progress_booking(&h).await;

        h.scheduler.set_fail(true);
        let result = h.engine.complete(&booking.id, &provider).await;
        assert!(matches!(result, Err(CoreError::Scheduler(_))));

        let stored = h.ledger.get_booking(&booking.id).await.unwrap().unwrap();
        assert_eq!(stored.status, BookingStatus::InProgress);
        assert!(h
            .ledger
            .earning_for_booking(&booking.id)
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_complete_rejects_non_party() {
        let h = harness();
        let (booking, _provider) = seed_in_progress_booking(&h).await;

        let result = h
            .engine
            .complete(&booking.id, &UserId::new("someone-else"))
            .await;
        assert!(matches!(result, Err(CoreError::NotAParty { .. })));
    }

    #[tokio::test]
    async fn test_cancel_initiates_refund_for_paid_booking() {
        let h = harness();
        let booking = seed_paid_booking(&h).await;

        let cancelled = h.engine.cancel(&booking.id, &booking.user_id).await.unwrap();
        assert_eq!(cancelled.status, BookingStatus::Cancelled);
        assert_eq!(cancelled.cancelled_by, Some(booking.user_id.clone()));

        assert_eq!(h.gateway.refunds().len(), 1);
        let payment = h
            .ledger
            .payment_for_booking(&booking.id)
            .await
            .unwrap()
            .unwrap();
        let refund = payment.refund.unwrap();
        assert_eq!(refund.status, RefundStatus::Pending);
    }

    #[tokio::test]
    async fn test_cancel_without_payment_skips_refund() {
        let h = harness();
        let booking = Booking::new(
            UserId::new("user-1"),
            Decimal::new(100, 0),
            Utc::now() + Duration::hours(4),
        );
        h.ledger.save_booking(&booking).await.unwrap();

        h.engine.cancel(&booking.id, &booking.user_id).await.unwrap();
        assert!(h.gateway.refunds().is_empty());
    }

    #[tokio::test]
    async fn test_cancel_in_progress_is_rejected() {
        let h = harness();
        let (booking, provider) = seed_in_progress_booking(&h).await;

        let result = h.engine.cancel(&booking.id, &provider).await;
        assert!(matches!(result, Err(CoreError::InvalidTransition { .. })));
    }

    #[tokio::test]
    async fn test_expire_unaccepted_cancels_and_refunds() {
        let h = harness();
        let booking = seed_paid_booking(&h).await;

        let outcome = h.engine.expire_unaccepted(&booking.id).await.unwrap();
        assert_eq!(outcome, ExpiryOutcome::Expired);

        let stored = h.ledger.get_booking(&booking.id).await.unwrap().unwrap();
        assert_eq!(stored.status, BookingStatus::Cancelled);
        assert_eq!(stored.cancelled_by, Some(booking.user_id.clone()));
        assert_eq!(h.gateway.refunds().len(), 1);
    }

    #[tokio::test]
    async fn test_expire_is_noop_after_accept() {
        let h = harness();
        let booking = seed_paid_booking(&h).await;
        h.engine
            .accept(&booking.id, &UserId::new("provider-1"))
            .await
            .unwrap();

        let outcome = h.engine.expire_unaccepted(&booking.id).await.unwrap();
        assert_eq!(outcome, ExpiryOutcome::AlreadyHandled);

        let stored = h.ledger.get_booking(&booking.id).await.unwrap().unwrap();
        assert_eq!(stored.status, BookingStatus::Pending);
        assert!(h.gateway.refunds().is_empty());
    }

    #[tokio::test]
    async fn test_expire_missing_booking() {
        let h = harness();
        let outcome = h
            .engine
            .expire_unaccepted(&BookingId::new("ghost"))
            .await
            .unwrap();
        assert_eq!(outcome, ExpiryOutcome::NotFound);
    }

    #[tokio::test]
    async fn test_open_bookings_requires_completed_payment() {
        let h = harness();
        let paid = seed_paid_booking(&h).await;

        let unpaid = Booking::new(
            UserId::new("user-2"),
            Decimal::new(60, 0),
            Utc::now() + Duration::hours(4),
        );
        h.ledger.save_booking(&unpaid).await.unwrap();

        let open = h.engine.open_bookings().await.unwrap();
        assert_eq!(open.len(), 1);
        assert_eq!(open[0].id, paid.id);
    }
}
