//! Settlement Engine
//!
//! Reacts to the two asynchronous settlement triggers: the deferred
//! earning-complete callback and payment-gateway webhook events. Both are
//! delivered at least once, in any order, so every branch re-checks
//! terminal-state guards and reports logical no-ops as distinct outcomes
//! the API layer acknowledges with success. Only genuinely transient
//! upstream failures surface as errors.

use std::sync::Arc;
use tracing::{info, warn};

use crate::config::CoreConfig;
use crate::error::{CoreError, CoreResult};
use crate::gateway::{to_minor_units, GatewayEvent, PaymentGateway};
use crate::notify::{send_and_store, Note, Notifier};
use crate::storage::LedgerStore;
use crate::types::{
    BookingId, PaymentStatus, ProviderAccount, RefundStatus, UserId,
};

/// Outcome of the deferred earning-settlement trigger.
///
/// Every variant other than a hard error is acknowledged with success so
/// the task queue does not redeliver logical no-ops.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SettlementOutcome {
    /// Funds transferred and the earning marked completed
    Settled {
        /// Gateway transfer id, stored on the earning for reconciliation
        transfer_id: String,
    },
    /// The earning was already settled by an earlier delivery
    AlreadySettled,
    /// The earning was cancelled before settlement
    EarningCancelled,
    /// Booking, provider or earning record is missing
    MissingRecord {
        /// Which record was absent
        entity: &'static str,
    },
    /// The provider has no payout-ready connected account
    NotPayoutReady,
    /// The platform balance does not cover the transfer
    InsufficientPlatformBalance,
}

/// Outcome of a gateway webhook event
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WebhookOutcome {
    /// Payment moved to completed and the job was broadcast
    PaymentCompleted {
        /// Number of providers the broadcast targeted
        broadcast_to: usize,
    },
    /// Duplicate delivery; payment was already completed
    PaymentAlreadyCompleted,
    /// Refund sub-record updated
    RefundRecorded {
        /// Status recorded
        status: RefundStatus,
    },
    /// Duplicate delivery; refund was already terminal
    RefundAlreadyTerminal,
    /// Payout status updated
    PayoutRecorded {
        /// Whether the payout amount was returned to the provider balance
        balance_reversed: bool,
    },
    /// Duplicate delivery; payout was already terminal
    PayoutAlreadyTerminal,
    /// The referenced record does not exist in the ledger
    UnknownEntity {
        /// Which record was absent
        entity: &'static str,
        /// Gateway-side id carried by the event
        id: String,
    },
    /// Event kind this system does not handle
    Ignored {
        /// Gateway event type string
        kind: String,
    },
}

/// Settlement engine
pub struct SettlementEngine {
    ledger: Arc<dyn LedgerStore>,
    gateway: Arc<dyn PaymentGateway>,
    notifier: Arc<dyn Notifier>,
    config: CoreConfig,
}

impl SettlementEngine {
    /// Create an engine over the given ports
    pub fn new(
        ledger: Arc<dyn LedgerStore>,
        gateway: Arc<dyn PaymentGateway>,
        notifier: Arc<dyn Notifier>,
        config: CoreConfig,
    ) -> Self {
        Self {
            ledger,
            gateway,
            notifier,
            config,
        }
    }

    /// Settle a completed booking's earning: transfer the provider's share
    /// to their connected account and credit their available balance.
    ///
    /// Idempotent under redelivery: a terminal earning short-circuits before
    /// any side effect. An error after the transfer has executed leaves the
    /// stored `transfer_id` absent; the transfer id on the gateway side is
    /// the reconciliation key for that window.
    pub async fn settle_earning(&self, id: &BookingId) -> CoreResult<SettlementOutcome> {
        let Some(booking) = self.ledger.get_booking(id).await? else {
            return Ok(SettlementOutcome::MissingRecord { entity: "booking" });
        };
        let Some(provider_id) = booking.provider_id.clone() else {
            return Ok(SettlementOutcome::MissingRecord { entity: "provider" });
        };
        let Some(mut account) = self.ledger.get_account(&provider_id).await? else {
            return Ok(SettlementOutcome::MissingRecord { entity: "provider" });
        };
        let Some(mut earning) = self.ledger.earning_for_booking(id).await? else {
            return Ok(SettlementOutcome::MissingRecord { entity: "earning" });
        };

        match earning.status {
            crate::types::EarningStatus::Completed => {
                return Ok(SettlementOutcome::AlreadySettled)
            }
            crate::types::EarningStatus::Cancelled => {
                return Ok(SettlementOutcome::EarningCancelled)
            }
            crate::types::EarningStatus::Pending => {}
        }

        let Some(destination) = account.connected_account_id.clone() else {
            warn!(booking = %id, provider = %provider_id, "no connected account; settlement skipped");
            return Ok(SettlementOutcome::NotPayoutReady);
        };
        let connected = self.gateway.retrieve_account(&destination).await?;
        if !connected.is_payout_ready() {
            warn!(booking = %id, account = %destination, "connected account not payout ready");
            return Ok(SettlementOutcome::NotPayoutReady);
        }

        let amount_minor = to_minor_units(earning.amount)?;
        let balance = self.gateway.retrieve_balance().await?;
        if balance.available_minor < amount_minor {
            warn!(
                booking = %id,
                required = amount_minor,
                available = balance.available_minor,
                "platform balance insufficient; settlement skipped"
            );
            return Ok(SettlementOutcome::InsufficientPlatformBalance);
        }

        let transfer = self
            .gateway
            .create_transfer(amount_minor, &self.config.currency, &destination)
            .await?;

        earning.mark_completed(transfer.id.clone());
        self.ledger.save_earning(&earning).await?;

        account.credit(earning.amount);
        self.ledger.save_account(&account).await?;

        info!(
            booking = %id,
            provider = %provider_id,
            transfer = %transfer.id,
            amount = %earning.amount,
            "earning settled"
        );

        send_and_store(
            self.notifier.as_ref(),
            self.ledger.as_ref(),
            &[provider_id],
            &Note::new(
                "Payment received",
                "Your earning has been added to your available balance.",
                "Earnings",
                serde_json::json!({ "bookingId": id }),
            ),
        )
        .await;

        Ok(SettlementOutcome::Settled {
            transfer_id: transfer.id,
        })
    }

    /// Apply a verified gateway webhook event
    pub async fn apply_gateway_event(&self, event: GatewayEvent) -> CoreResult<WebhookOutcome> {
        match event {
            GatewayEvent::PaymentIntentSucceeded { intent_id } => {
                self.apply_payment_succeeded(&intent_id).await
            }
            GatewayEvent::RefundUpdated {
                refund_id,
                status,
                amount,
                created,
                destination,
            } => {
                self.apply_refund_update(&refund_id, status, amount, created, destination)
                    .await
            }
            GatewayEvent::PayoutUpdated { payout_id, status } => {
                self.apply_payout_update(&payout_id, status).await
            }
            GatewayEvent::Unrecognized { kind } => {
                info!(kind = %kind, "unhandled gateway event acknowledged");
                Ok(WebhookOutcome::Ignored { kind })
            }
        }
    }

    async fn apply_payment_succeeded(&self, intent_id: &str) -> CoreResult<WebhookOutcome> {
        let Some(mut payment) = self.ledger.payment_by_intent(intent_id).await? else {
            warn!(intent = %intent_id, "payment for intent not found");
            return Ok(WebhookOutcome::UnknownEntity {
                entity: "payment",
                id: intent_id.to_string(),
            });
        };

        if payment.status == PaymentStatus::Completed {
            // Duplicate delivery: no status change, no re-broadcast
            return Ok(WebhookOutcome::PaymentAlreadyCompleted);
        }

        payment.status = PaymentStatus::Completed;
        self.ledger.save_payment(&payment).await?;
        info!(intent = %intent_id, booking = %payment.booking_id, "payment completed");

        let Some(booking) = self.ledger.get_booking(&payment.booking_id).await? else {
            warn!(booking = %payment.booking_id, "paid booking not found; broadcast skipped");
            return Ok(WebhookOutcome::UnknownEntity {
                entity: "booking",
                id: payment.booking_id.to_string(),
            });
        };

        let providers = self.ledger.list_available_providers().await?;
        let broadcast_to = providers.len();
        if !providers.is_empty() {
            let note = Note::new(
                "New job available",
                "A new job is available near you.",
                "AcceptOrder",
                serde_json::json!({ "bookingId": booking.id }),
            );
            if let Err(e) = self.notifier.send(&providers, &note).await {
                warn!(error = %e, booking = %booking.id, "job broadcast failed");
            }
        }

        Ok(WebhookOutcome::PaymentCompleted { broadcast_to })
    }

    async fn apply_refund_update(
        &self,
        refund_id: &str,
        status: RefundStatus,
        amount: Option<rust_decimal::Decimal>,
        created: Option<chrono::DateTime<chrono::Utc>>,
        destination: Option<crate::types::RefundDestination>,
    ) -> CoreResult<WebhookOutcome> {
        let Some(mut payment) = self.ledger.payment_by_refund(refund_id).await? else {
            warn!(refund = %refund_id, "payment for refund not found");
            return Ok(WebhookOutcome::UnknownEntity {
                entity: "payment",
                id: refund_id.to_string(),
            });
        };

        if !payment.apply_refund_update(refund_id, status, amount, created, destination) {
            return Ok(WebhookOutcome::RefundAlreadyTerminal);
        }
        self.ledger.save_payment(&payment).await?;
        info!(refund = %refund_id, status = ?status, "refund updated");

        if status == RefundStatus::Succeeded {
            if let Some(booking) = self.ledger.get_booking(&payment.booking_id).await? {
                send_and_store(
                    self.notifier.as_ref(),
                    self.ledger.as_ref(),
                    &[booking.user_id.clone()],
                    &Note::new(
                        "Refund processed",
                        "Your payment has been refunded.",
                        "BookingDetails",
                        serde_json::json!({ "bookingId": booking.id }),
                    ),
                )
                .await;
            }
        }

        Ok(WebhookOutcome::RefundRecorded { status })
    }

    async fn apply_payout_update(
        &self,
        gateway_payout_id: &str,
        status: crate::types::PayoutStatus,
    ) -> CoreResult<WebhookOutcome> {
        let Some(mut payout) = self.ledger.payout_by_gateway_id(gateway_payout_id).await? else {
            warn!(payout = %gateway_payout_id, "payout not found");
            return Ok(WebhookOutcome::UnknownEntity {
                entity: "payout",
                id: gateway_payout_id.to_string(),
            });
        };

        // apply_status returns false when the payout was already terminal;
        // the credit below must run at most once per payout.
        if !payout.apply_status(status) {
            return Ok(WebhookOutcome::PayoutAlreadyTerminal);
        }

        let mut balance_reversed = false;
        if status.reverses_balance() {
            let account = match self.ledger.get_account(&payout.user_id).await? {
                Some(account) => Some(account),
                None => {
                    warn!(user = %payout.user_id, "payout owner has no account; credit skipped");
                    None
                }
            };
            if let Some(mut account) = account {
                account.credit(payout.amount);
                self.ledger.save_account(&account).await?;
                balance_reversed = true;
            }
        }

        self.ledger.save_payout(&payout).await?;
        info!(payout = %gateway_payout_id, status = ?status, balance_reversed, "payout updated");

        Ok(WebhookOutcome::PayoutRecorded { balance_reversed })
    }

    /// Provider account lookup used by the earnings view
    pub async fn provider_account(&self, user: &UserId) -> CoreResult<ProviderAccount> {
        self.ledger
            .get_account(user)
            .await?
            .ok_or_else(|| CoreError::NotFound {
                entity: "account",
                id: user.to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{CapturingNotifier, MockGateway};
    use crate::storage::MemoryLedger;
    use crate::types::{
        Booking, EarningStatus, Payment, Payout, PayoutStatus, RefundInfo,
    };
    use chrono::{Duration, Utc};
    use rust_decimal::Decimal;

    struct Harness {
        ledger: Arc<MemoryLedger>,
        gateway: Arc<MockGateway>,
        notifier: Arc<CapturingNotifier>,
        engine: SettlementEngine,
    }

    fn harness() -> Harness {
        let ledger = Arc::new(MemoryLedger::new());
        let gateway = Arc::new(MockGateway::new());
        let notifier = Arc::new(CapturingNotifier::new());
        let engine = SettlementEngine::new(
            ledger.clone(),
            gateway.clone(),
            notifier.clone(),
            CoreConfig::development(),
        );
        Harness {
            ledger,
            gateway,
            notifier,
            engine,
        }
    }

    /// Completed $100 booking with a pending $80 earning and a provider
    /// holding a connected account
    async fn seed_settleable(h: &Harness) -> (Booking, UserId) {
        let provider = UserId::new("provider-1");

        let mut booking = Booking::new(
            UserId::new("user-1"),
            Decimal::new(100, 0),
            Utc::now() - Duration::hours(2),
        );
        booking.provider_id = Some(provider.clone());
        booking.status = crate::types::BookingStatus::Completed;
        h.ledger.save_booking(&booking).await.unwrap();

        let earning = crate::types::Earning::new(booking.id.clone(), Decimal::new(80, 0));
        h.ledger.save_earning(&earning).await.unwrap();

        let mut account = ProviderAccount::new(provider.clone());
        account.connected_account_id = Some("acct_1".to_string());
        h.ledger.save_account(&account).await.unwrap();

        (booking, provider)
    }

    #[tokio::test]
    async fn test_settle_transfers_and_credits_balance() {
        let h = harness();
        let (booking, provider) = seed_settleable(&h).await;

        let outcome = h.engine.settle_earning(&booking.id).await.unwrap();
        let SettlementOutcome::Settled { transfer_id } = outcome else {
            panic!("expected settled, got {outcome:?}");
        };

        let transfers = h.gateway.transfers();
        assert_eq!(transfers, vec![(8000, "acct_1".to_string())]);

        let earning = h
            .ledger
            .earning_for_booking(&booking.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(earning.status, EarningStatus::Completed);
        assert_eq!(earning.transfer_id, Some(transfer_id));
        assert!(earning.completion_date.is_some());

        let account = h.ledger.get_account(&provider).await.unwrap().unwrap();
        assert_eq!(account.available_balance, Decimal::new(80, 0));

        let sent = h.notifier.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].recipients, vec![provider]);
        assert_eq!(sent[0].title, "Payment received");
    }

    #[tokio::test]
    async fn test_settle_is_idempotent() {
        let h = harness();
        let (booking, provider) = seed_settleable(&h).await;

        h.engine.settle_earning(&booking.id).await.unwrap();
        let second = h.engine.settle_earning(&booking.id).await.unwrap();
        assert_eq!(second, SettlementOutcome::AlreadySettled);

        // Exactly one transfer, exactly one credit
        assert_eq!(h.gateway.transfers().len(), 1);
        let account = h.ledger.get_account(&provider).await.unwrap().unwrap();
        assert_eq!(account.available_balance, Decimal::new(80, 0));
    }

    #[tokio::test]
    async fn test_settle_skips_cancelled_earning() {
        let h = harness();
        let (booking, _) = seed_settleable(&h).await;

        let mut earning = h
            .ledger
            .earning_for_booking(&booking.id)
            .await
            .unwrap()
            .unwrap();
        earning.mark_cancelled();
        h.ledger.save_earning(&earning).await.unwrap();

        let outcome = h.engine.settle_earning(&booking.id).await.unwrap();
        assert_eq!(outcome, SettlementOutcome::EarningCancelled);
        assert!(h.gateway.transfers().is_empty());
    }

    #[tokio::test]
    async fn test_settle_missing_records_are_acknowledged() {
        let h = harness();
        let outcome = h
            .engine
            .settle_earning(&BookingId::new("ghost"))
            .await
            .unwrap();
        assert_eq!(
            outcome,
            SettlementOutcome::MissingRecord { entity: "booking" }
        );
    }

    #[tokio::test]
    async fn test_settle_requires_payout_ready_account() {
        let h = harness();
        let (booking, provider) = seed_settleable(&h).await;

        h.gateway.set_account_payout_ready(false);
        let outcome = h.engine.settle_earning(&booking.id).await.unwrap();
        assert_eq!(outcome, SettlementOutcome::NotPayoutReady);
        assert!(h.gateway.transfers().is_empty());

        // Missing connected account id is also a no-op
        let mut account = h.ledger.get_account(&provider).await.unwrap().unwrap();
        account.connected_account_id = None;
        h.ledger.save_account(&account).await.unwrap();
        h.gateway.set_account_payout_ready(true);
        let outcome = h.engine.settle_earning(&booking.id).await.unwrap();
        assert_eq!(outcome, SettlementOutcome::NotPayoutReady);
    }

    #[tokio::test]
    async fn test_settle_requires_platform_balance() {
        let h = harness();
        let (booking, _) = seed_settleable(&h).await;

        h.gateway.set_balance_minor(7999);
        let outcome = h.engine.settle_earning(&booking.id).await.unwrap();
        assert_eq!(outcome, SettlementOutcome::InsufficientPlatformBalance);
        assert!(h.gateway.transfers().is_empty());

        let earning = h
            .ledger
            .earning_for_booking(&booking.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(earning.status, EarningStatus::Pending);
    }

    #[tokio::test]
    async fn test_settle_transfer_failure_leaves_earning_pending() {
        let h = harness();
        let (booking, provider) = seed_settleable(&h).await;

        h.gateway.set_fail_transfers(true);
        let result = h.engine.settle_earning(&booking.id).await;
        assert!(matches!(result, Err(CoreError::Gateway(_))));

        let earning = h
            .ledger
            .earning_for_booking(&booking.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(earning.status, EarningStatus::Pending);
        let account = h.ledger.get_account(&provider).await.unwrap().unwrap();
        assert_eq!(account.available_balance, Decimal::ZERO);
    }

    async fn seed_pending_payment(h: &Harness) -> (Booking, Payment) {
        let booking = Booking::new(
            UserId::new("user-1"),
            Decimal::new(50, 0),
            Utc::now() + Duration::hours(3),
        );
        h.ledger.save_booking(&booking).await.unwrap();

        let payment = Payment::new(booking.id.clone(), Decimal::new(50, 0), "pi_1", None);
        h.ledger.save_payment(&payment).await.unwrap();
        (booking, payment)
    }

    #[tokio::test]
    async fn test_payment_succeeded_broadcasts_once() {
        let h = harness();
        let (_booking, _payment) = seed_pending_payment(&h).await;

        for name in ["provider-1", "provider-2"] {
            let mut account = ProviderAccount::new(UserId::new(name));
            account.is_available = true;
            h.ledger.save_account(&account).await.unwrap();
        }

        let event = GatewayEvent::PaymentIntentSucceeded {
            intent_id: "pi_1".to_string(),
        };
        let outcome = h.engine.apply_gateway_event(event.clone()).await.unwrap();
        assert_eq!(outcome, WebhookOutcome::PaymentCompleted { broadcast_to: 2 });

        let payment = h.ledger.payment_by_intent("pi_1").await.unwrap().unwrap();
        assert_eq!(payment.status, PaymentStatus::Completed);
        assert_eq!(h.notifier.sent().len(), 1);

        // Duplicate delivery: status already completed, no second broadcast
        let outcome = h.engine.apply_gateway_event(event).await.unwrap();
        assert_eq!(outcome, WebhookOutcome::PaymentAlreadyCompleted);
        assert_eq!(h.notifier.sent().len(), 1);
    }

    #[tokio::test]
    async fn test_payment_succeeded_unknown_intent() {
        let h = harness();
        let outcome = h
            .engine
            .apply_gateway_event(GatewayEvent::PaymentIntentSucceeded {
                intent_id: "pi_ghost".to_string(),
            })
            .await
            .unwrap();
        assert!(matches!(outcome, WebhookOutcome::UnknownEntity { .. }));
    }

    #[tokio::test]
    async fn test_refund_succeeded_records_and_notifies() {
        let h = harness();
        let (booking, mut payment) = seed_pending_payment(&h).await;
        payment.status = PaymentStatus::Completed;
        payment.refund = Some(RefundInfo::pending("re_1"));
        h.ledger.save_payment(&payment).await.unwrap();

        let outcome = h
            .engine
            .apply_gateway_event(GatewayEvent::RefundUpdated {
                refund_id: "re_1".to_string(),
                status: RefundStatus::Succeeded,
                amount: Some(Decimal::new(50, 0)),
                created: Some(Utc::now()),
                destination: Some(crate::types::RefundDestination::Card),
            })
            .await
            .unwrap();
        assert_eq!(
            outcome,
            WebhookOutcome::RefundRecorded {
                status: RefundStatus::Succeeded
            }
        );

        let stored = h.ledger.payment_by_refund("re_1").await.unwrap().unwrap();
        let refund = stored.refund.unwrap();
        assert_eq!(refund.status, RefundStatus::Succeeded);
        assert_eq!(refund.amount, Some(Decimal::new(50, 0)));

        let sent = h.notifier.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].recipients, vec![booking.user_id]);
        assert_eq!(sent[0].title, "Refund processed");

        // Terminal refund ignores a second delivery
        let outcome = h
            .engine
            .apply_gateway_event(GatewayEvent::RefundUpdated {
                refund_id: "re_1".to_string(),
                status: RefundStatus::Failed,
                amount: None,
                created: None,
                destination: None,
            })
            .await
            .unwrap();
        assert_eq!(outcome, WebhookOutcome::RefundAlreadyTerminal);
    }

    #[tokio::test]
    async fn test_payout_failed_credits_owner_once() {
        let h = harness();
        let provider = UserId::new("provider-1");
        let account = ProviderAccount::new(provider.clone());
        h.ledger.save_account(&account).await.unwrap();

        let payout = Payout::new(
            provider.clone(),
            Decimal::new(120, 0),
            "usd",
            "po_1",
            Default::default(),
        );
        h.ledger.save_payout(&payout).await.unwrap();

        let event = GatewayEvent::PayoutUpdated {
            payout_id: "po_1".to_string(),
            status: PayoutStatus::Failed,
        };
        let outcome = h.engine.apply_gateway_event(event.clone()).await.unwrap();
        assert_eq!(
            outcome,
            WebhookOutcome::PayoutRecorded {
                balance_reversed: true
            }
        );

        let account = h.ledger.get_account(&provider).await.unwrap().unwrap();
        assert_eq!(account.available_balance, Decimal::new(120, 0));

        // Duplicate delivery must not credit again
        let outcome = h.engine.apply_gateway_event(event).await.unwrap();
        assert_eq!(outcome, WebhookOutcome::PayoutAlreadyTerminal);
        let account = h.ledger.get_account(&provider).await.unwrap().unwrap();
        assert_eq!(account.available_balance, Decimal::new(120, 0));
    }

    #[tokio::test]
    async fn test_payout_paid_does_not_credit() {
        let h = harness();
        let provider = UserId::new("provider-1");
        h.ledger
            .save_account(&ProviderAccount::new(provider.clone()))
            .await
            .unwrap();
        let payout = Payout::new(
            provider.clone(),
            Decimal::new(45, 0),
            "usd",
            "po_2",
            Default::default(),
        );
        h.ledger.save_payout(&payout).await.unwrap();

        let outcome = h
            .engine
            .apply_gateway_event(GatewayEvent::PayoutUpdated {
                payout_id: "po_2".to_string(),
                status: PayoutStatus::Paid,
            })
            .await
            .unwrap();
        assert_eq!(
            outcome,
            WebhookOutcome::PayoutRecorded {
                balance_reversed: false
            }
        );

        let account = h.ledger.get_account(&provider).await.unwrap().unwrap();
        assert_eq!(account.available_balance, Decimal::ZERO);
        let stored = h.ledger.payout_by_gateway_id("po_2").await.unwrap().unwrap();
        assert_eq!(stored.status, PayoutStatus::Paid);
    }

    #[tokio::test]
    async fn test_unrecognized_event_is_ignored() {
        let h = harness();
        let outcome = h
            .engine
            .apply_gateway_event(GatewayEvent::Unrecognized {
                kind: "charge.updated".to_string(),
            })
            .await
            .unwrap();
        assert_eq!(
            outcome,
            WebhookOutcome::Ignored {
                kind: "charge.updated".to_string()
            }
        );
    }
}
