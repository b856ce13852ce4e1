//! Domain types
//!
//! Record types for the booking aggregate and its satellites. Statuses are
//! tagged enums with explicit transition rules; a record refuses illegal
//! moves instead of trusting its callers.

pub mod account;
pub mod booking;
pub mod common;
pub mod earning;
pub mod payment;
pub mod payout;

pub use account::{NotificationRecord, ProviderAccount};
pub use booking::{Booking, BookingStatus};
pub use common::{BookingId, EarningId, NotificationId, PaymentId, PayoutId, TaskId, UserId};
pub use earning::{Earning, EarningStatus};
pub use payment::{Payment, PaymentStatus, RefundDestination, RefundInfo, RefundStatus};
pub use payout::{Payout, PayoutDestination, PayoutStatus};
