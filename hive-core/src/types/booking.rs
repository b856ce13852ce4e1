//! Booking aggregate
//!
//! # State machine
//!
//! ```text
//! pending ──(accept: provider assigned)──→ pending+provider
//!    │                                          │
//!    │                              (approve start)
//!    │                                          ↓
//!    ├──(cancel / expiry)──→ cancelled     in_progress ──(complete)──→ completed
//! ```
//!
//! `pending` with no provider is the unassigned sub-state; assignment does
//! not change the status value, only `provider_id`. Terminal states never
//! re-transition.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::common::{BookingId, UserId};
use crate::error::{CoreError, CoreResult};

/// Booking status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum BookingStatus {
    /// Awaiting acceptance and start
    #[default]
    Pending,
    /// Work underway, start approved by the requester
    InProgress,
    /// Finished by a party to the booking
    Completed,
    /// Cancelled by a party or expired unaccepted
    Cancelled,
}

impl BookingStatus {
    /// Whether the status is terminal
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled)
    }

    /// Whether a transition to `target` is legal
    pub fn can_transition_to(&self, target: BookingStatus) -> bool {
        matches!(
            (self, target),
            (Self::Pending, Self::InProgress)
                | (Self::Pending, Self::Cancelled)
                | (Self::InProgress, Self::Completed)
        )
    }
}

/// A requested service engagement between a user and, once accepted, a
/// provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Booking {
    /// Booking id
    pub id: BookingId,
    /// Requesting user
    pub user_id: UserId,
    /// Assigned provider, none until accepted
    pub provider_id: Option<UserId>,
    /// Quoted price for the engagement
    pub amount: rust_decimal::Decimal,
    /// Scheduled start
    pub start_at: DateTime<Utc>,
    /// Current status
    pub status: BookingStatus,
    /// Provider has asked the requester to approve the start
    pub user_approval_requested: bool,
    /// Set when status becomes Completed
    pub completed_at: Option<DateTime<Utc>>,
    /// Party that completed the booking
    pub completed_by: Option<UserId>,
    /// Set when status becomes Cancelled
    pub cancelled_at: Option<DateTime<Utc>>,
    /// Party that cancelled the booking (the requester, on expiry)
    pub cancelled_by: Option<UserId>,
    /// Creation time
    pub created_at: DateTime<Utc>,
    /// Last mutation time
    pub updated_at: DateTime<Utc>,
}

impl Booking {
    /// Create a new unassigned pending booking
    pub fn new(
        user_id: UserId,
        amount: rust_decimal::Decimal,
        start_at: DateTime<Utc>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: BookingId::generate(),
            user_id,
            provider_id: None,
            amount,
            start_at,
            status: BookingStatus::Pending,
            user_approval_requested: false,
            completed_at: None,
            completed_by: None,
            cancelled_at: None,
            cancelled_by: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Whether the booking is still pending and unassigned
    pub fn is_unassigned(&self) -> bool {
        self.status == BookingStatus::Pending && self.provider_id.is_none()
    }

    /// Whether `actor` is the requester or the assigned provider
    pub fn is_party(&self, actor: &UserId) -> bool {
        &self.user_id == actor || self.provider_id.as_ref() == Some(actor)
    }

    fn transition_to(&mut self, target: BookingStatus) -> CoreResult<()> {
        if !self.status.can_transition_to(target) {
            return Err(CoreError::InvalidTransition {
                from: self.status,
                to: target,
            });
        }
        self.status = target;
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Record the provider's request to start; status is unchanged
    pub fn request_start(&mut self, provider: &UserId) -> CoreResult<()> {
        if self.provider_id.as_ref() != Some(provider) {
            return Err(CoreError::NotAParty {
                actor: provider.to_string(),
                booking: self.id.to_string(),
            });
        }
        self.user_approval_requested = true;
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Approve the pending start request, moving the booking in progress
    pub fn approve_start(&mut self, user: &UserId) -> CoreResult<()> {
        if &self.user_id != user {
            return Err(CoreError::NotAParty {
                actor: user.to_string(),
                booking: self.id.to_string(),
            });
        }
        if !self.user_approval_requested {
            return Err(CoreError::ApprovalNotRequested(self.id.to_string()));
        }
        self.transition_to(BookingStatus::InProgress)
    }

    /// Mark the booking completed by `actor`
    pub fn mark_completed(&mut self, actor: &UserId) -> CoreResult<()> {
        if !self.is_party(actor) {
            return Err(CoreError::NotAParty {
                actor: actor.to_string(),
                booking: self.id.to_string(),
            });
        }
        self.transition_to(BookingStatus::Completed)?;
        self.completed_at = Some(Utc::now());
        self.completed_by = Some(actor.clone());
        Ok(())
    }

    /// Mark the booking cancelled by `actor`
    pub fn mark_cancelled(&mut self, actor: &UserId) -> CoreResult<()> {
        if !self.is_party(actor) {
            return Err(CoreError::NotAParty {
                actor: actor.to_string(),
                booking: self.id.to_string(),
            });
        }
        self.transition_to(BookingStatus::Cancelled)?;
        self.cancelled_at = Some(Utc::now());
        self.cancelled_by = Some(actor.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use rust_decimal::Decimal;

    fn create_test_booking() -> Booking {
        Booking::new(
            UserId::new("user-1"),
            Decimal::new(100, 0),
            Utc::now() + Duration::hours(4),
        )
    }

    #[test]
    fn test_new_booking_is_unassigned_pending() {
        let booking = create_test_booking();
        assert_eq!(booking.status, BookingStatus::Pending);
        assert!(booking.is_unassigned());
        assert!(!booking.user_approval_requested);
    }

    #[test]
    fn test_full_lifecycle() {
        let mut booking = create_test_booking();
        let provider = UserId::new("provider-1");

        booking.provider_id = Some(provider.clone());
        assert!(booking.request_start(&provider).is_ok());
        assert!(booking.user_approval_requested);
        assert_eq!(booking.status, BookingStatus::Pending);

        assert!(booking.approve_start(&booking.user_id.clone()).is_ok());
        assert_eq!(booking.status, BookingStatus::InProgress);

        assert!(booking.mark_completed(&provider).is_ok());
        assert_eq!(booking.status, BookingStatus::Completed);
        assert!(booking.completed_at.is_some());
        assert_eq!(booking.completed_by, Some(provider));
        assert!(booking.cancelled_at.is_none());
    }

    #[test]
    fn test_request_start_rejects_other_provider() {
        let mut booking = create_test_booking();
        booking.provider_id = Some(UserId::new("provider-1"));

        let result = booking.request_start(&UserId::new("provider-2"));
        assert!(matches!(result, Err(CoreError::NotAParty { .. })));
        assert!(!booking.user_approval_requested);
    }

    #[test]
    fn test_approve_start_requires_request() {
        let mut booking = create_test_booking();
        booking.provider_id = Some(UserId::new("provider-1"));

        let result = booking.approve_start(&booking.user_id.clone());
        assert!(matches!(result, Err(CoreError::ApprovalNotRequested(_))));
    }

    #[test]
    fn test_cannot_complete_pending() {
        let mut booking = create_test_booking();
        let user = booking.user_id.clone();
        let result = booking.mark_completed(&user);
        assert!(matches!(result, Err(CoreError::InvalidTransition { .. })));
    }

    #[test]
    fn test_cancel_from_pending() {
        let mut booking = create_test_booking();
        let user = booking.user_id.clone();
        assert!(booking.mark_cancelled(&user).is_ok());
        assert_eq!(booking.status, BookingStatus::Cancelled);
        assert!(booking.cancelled_at.is_some());
        assert!(booking.completed_at.is_none());
    }

    #[test]
    fn test_terminal_states_reject_transitions() {
        let mut booking = create_test_booking();
        let user = booking.user_id.clone();
        booking.mark_cancelled(&user).unwrap();

        assert!(booking.mark_cancelled(&user).is_err());
        assert!(booking.mark_completed(&user).is_err());
    }

    #[test]
    fn test_cannot_cancel_in_progress() {
        let mut booking = create_test_booking();
        let provider = UserId::new("provider-1");
        booking.provider_id = Some(provider.clone());
        booking.request_start(&provider).unwrap();
        booking.approve_start(&booking.user_id.clone()).unwrap();

        let result = booking.mark_cancelled(&provider);
        assert!(matches!(result, Err(CoreError::InvalidTransition { .. })));
    }

    #[test]
    fn test_status_transition_table() {
        assert!(BookingStatus::Pending.can_transition_to(BookingStatus::InProgress));
        assert!(BookingStatus::Pending.can_transition_to(BookingStatus::Cancelled));
        assert!(BookingStatus::InProgress.can_transition_to(BookingStatus::Completed));
        assert!(!BookingStatus::InProgress.can_transition_to(BookingStatus::Cancelled));
        assert!(!BookingStatus::Completed.can_transition_to(BookingStatus::Cancelled));
        assert!(!BookingStatus::Cancelled.can_transition_to(BookingStatus::Pending));
    }
}
