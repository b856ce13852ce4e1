//! Hive Core - Booking Lifecycle and Settlement Engines
//!
//! This crate owns the two stateful engines of the Hive marketplace backend:
//!
//! - **Booking Lifecycle Engine**: enforces the booking state machine
//!   (pending → in progress → completed/cancelled) and drives the side
//!   effects of each transition (settlement scheduling, refunds,
//!   notifications).
//! - **Settlement Engine**: reacts to the deferred earning-complete trigger
//!   and to payment-gateway webhook events, applying idempotent updates to
//!   payment, earning and payout records.
//!
//! # Architecture
//!
//! The engines talk to the outside world only through ports:
//!
//! - [`LedgerStore`]: document storage for bookings, payments, earnings,
//!   payouts and provider accounts
//! - [`PaymentGateway`]: payment-intent, refund, transfer and balance
//!   operations plus webhook signature verification
//! - [`TaskScheduler`]: "run this HTTP callback at time T" requests
//! - [`Notifier`]: fire-and-forget push notifications
//!
//! Production adapters ([`RestGateway`], [`HttpTaskScheduler`],
//! [`PushNotifier`]) live next to the ports; [`MemoryLedger`] and the
//! [`mock`] module back the engines in tests and development.

pub mod config;
pub mod error;
pub mod gateway;
pub mod lifecycle;
pub mod mock;
pub mod notify;
pub mod scheduler;
pub mod settlement;
pub mod storage;
pub mod types;

pub use config::CoreConfig;
pub use error::{CoreError, CoreResult};
pub use gateway::{GatewayConfig, GatewayEvent, PaymentGateway, RestGateway, WebhookChannel};
pub use lifecycle::LifecycleEngine;
pub use notify::{Note, Notifier, PushNotifier};
pub use scheduler::{HttpTaskScheduler, TaskScheduler};
pub use settlement::{SettlementEngine, SettlementOutcome, WebhookOutcome};
pub use storage::{LedgerStore, MemoryLedger};
