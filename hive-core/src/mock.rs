//! Test and development doubles for the outbound ports
//!
//! Deterministic in-process implementations of the gateway, scheduler and
//! notifier ports. Used by the engine tests here and by the API integration
//! tests; also handy for local development without live service
//! credentials.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU64, Ordering};
use std::sync::Mutex;

use crate::error::{CoreError, CoreResult};
use crate::gateway::{
    decode_event, signature, ConnectedAccount, GatewayEvent, PaymentGateway, PaymentIntent,
    PlatformBalance, RefundHandle, TransferHandle, WebhookChannel,
};
use crate::notify::{Note, Notifier};
use crate::scheduler::TaskScheduler;
use crate::types::{TaskId, UserId};

/// Gateway double with scriptable balances and failure switches
pub struct MockGateway {
    /// Platform webhook signing secret
    pub platform_secret: String,
    /// Connect webhook signing secret
    pub connect_secret: String,
    account_payout_ready: AtomicBool,
    balance_minor: AtomicI64,
    fail_transfers: AtomicBool,
    seq: AtomicU64,
    refunds: Mutex<Vec<String>>,
    transfers: Mutex<Vec<(i64, String)>>,
}

impl Default for MockGateway {
    fn default() -> Self {
        Self::new()
    }
}

impl MockGateway {
    /// Create a gateway double with a large platform balance and a
    /// payout-ready connected account
    pub fn new() -> Self {
        Self {
            platform_secret: "whsec_platform_test".to_string(),
            connect_secret: "whsec_connect_test".to_string(),
            account_payout_ready: AtomicBool::new(true),
            balance_minor: AtomicI64::new(1_000_000),
            fail_transfers: AtomicBool::new(false),
            seq: AtomicU64::new(1),
            refunds: Mutex::new(Vec::new()),
            transfers: Mutex::new(Vec::new()),
        }
    }

    /// Set the platform's available balance in minor units
    pub fn set_balance_minor(&self, minor: i64) {
        self.balance_minor.store(minor, Ordering::SeqCst);
    }

    /// Make the connected account fail the payout-readiness check
    pub fn set_account_payout_ready(&self, ready: bool) {
        self.account_payout_ready.store(ready, Ordering::SeqCst);
    }

    /// Make every transfer attempt fail
    pub fn set_fail_transfers(&self, fail: bool) {
        self.fail_transfers.store(fail, Ordering::SeqCst);
    }

    /// Intent ids refunded so far
    pub fn refunds(&self) -> Vec<String> {
        self.refunds.lock().unwrap().clone()
    }

    /// Transfers executed so far as (minor units, destination)
    pub fn transfers(&self) -> Vec<(i64, String)> {
        self.transfers.lock().unwrap().clone()
    }

    /// Sign a payload for the given channel, as the gateway would
    pub fn sign(&self, channel: WebhookChannel, payload: &[u8], at: DateTime<Utc>) -> String {
        let secret = match channel {
            WebhookChannel::Platform => &self.platform_secret,
            WebhookChannel::Connect => &self.connect_secret,
        };
        signature::sign(secret, payload, at)
    }

    fn next_id(&self, prefix: &str) -> String {
        format!("{prefix}_{}", self.seq.fetch_add(1, Ordering::SeqCst))
    }
}

#[async_trait]
impl PaymentGateway for MockGateway {
    fn verify_webhook(
        &self,
        channel: WebhookChannel,
        payload: &[u8],
        signature_header: &str,
    ) -> CoreResult<GatewayEvent> {
        let secret = match channel {
            WebhookChannel::Platform => &self.platform_secret,
            WebhookChannel::Connect => &self.connect_secret,
        };
        signature::verify(
            secret,
            payload,
            signature_header,
            signature::DEFAULT_TOLERANCE_SECS,
            Utc::now(),
        )?;
        decode_event(payload)
    }

    async fn create_payment_intent(
        &self,
        _amount: Decimal,
        _currency: &str,
    ) -> CoreResult<PaymentIntent> {
        let id = self.next_id("pi");
        let client_secret = Some(format!("{id}_secret"));
        Ok(PaymentIntent { id, client_secret })
    }

    async fn create_refund(&self, intent_id: &str) -> CoreResult<RefundHandle> {
        self.refunds.lock().unwrap().push(intent_id.to_string());
        Ok(RefundHandle {
            id: self.next_id("re"),
        })
    }

    async fn retrieve_account(&self, account_id: &str) -> CoreResult<ConnectedAccount> {
        let ready = self.account_payout_ready.load(Ordering::SeqCst);
        Ok(ConnectedAccount {
            id: account_id.to_string(),
            payouts_enabled: ready,
            details_submitted: ready,
        })
    }

    async fn retrieve_balance(&self) -> CoreResult<PlatformBalance> {
        Ok(PlatformBalance {
            available_minor: self.balance_minor.load(Ordering::SeqCst),
        })
    }

    async fn create_transfer(
        &self,
        amount_minor: i64,
        _currency: &str,
        destination: &str,
    ) -> CoreResult<TransferHandle> {
        if self.fail_transfers.load(Ordering::SeqCst) {
            return Err(CoreError::Gateway("transfer refused".to_string()));
        }
        self.transfers
            .lock()
            .unwrap()
            .push((amount_minor, destination.to_string()));
        Ok(TransferHandle {
            id: self.next_id("tr"),
        })
    }
}

/// A task captured by [`MockScheduler`]
#[derive(Debug, Clone)]
pub struct ScheduledTask {
    /// Callback target
    pub target_url: String,
    /// Callback body
    pub body: serde_json::Value,
    /// Scheduled run time
    pub run_at: DateTime<Utc>,
}

/// Scheduler double that records tasks instead of queuing them
#[derive(Default)]
pub struct MockScheduler {
    fail: AtomicBool,
    seq: AtomicU64,
    tasks: Mutex<Vec<ScheduledTask>>,
}

impl MockScheduler {
    /// Create a recording scheduler
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every schedule attempt fail (scheduler outage)
    pub fn set_fail(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    /// Tasks scheduled so far
    pub fn tasks(&self) -> Vec<ScheduledTask> {
        self.tasks.lock().unwrap().clone()
    }
}

#[async_trait]
impl TaskScheduler for MockScheduler {
    async fn schedule(
        &self,
        target_url: &str,
        body: serde_json::Value,
        run_at: DateTime<Utc>,
    ) -> CoreResult<TaskId> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(CoreError::Scheduler("queue unavailable".to_string()));
        }
        self.tasks.lock().unwrap().push(ScheduledTask {
            target_url: target_url.to_string(),
            body,
            run_at,
        });
        let n = self.seq.fetch_add(1, Ordering::SeqCst);
        Ok(TaskId::new(format!("task_{n}")))
    }
}

/// A notification captured by [`CapturingNotifier`]
#[derive(Debug, Clone)]
pub struct SentNote {
    /// Recipients
    pub recipients: Vec<UserId>,
    /// Notification title
    pub title: String,
    /// Client screen
    pub screen: String,
}

/// Notifier double that records sends
#[derive(Default)]
pub struct CapturingNotifier {
    sent: Mutex<Vec<SentNote>>,
}

impl CapturingNotifier {
    /// Create a recording notifier
    pub fn new() -> Self {
        Self::default()
    }

    /// Notifications sent so far
    pub fn sent(&self) -> Vec<SentNote> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl Notifier for CapturingNotifier {
    async fn send(&self, recipients: &[UserId], note: &Note) -> CoreResult<()> {
        self.sent.lock().unwrap().push(SentNote {
            recipients: recipients.to_vec(),
            title: note.title.clone(),
            screen: note.screen.clone(),
        });
        Ok(())
    }
}
