//! Core error types
//!
//! Error definitions shared by the lifecycle and settlement engines.

use thiserror::Error;

use crate::types::BookingStatus;

/// Core error
#[derive(Error, Debug)]
pub enum CoreError {
    /// Entity lookup failed
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// Illegal booking state transition
    #[error("invalid booking transition from {from:?} to {to:?}")]
    InvalidTransition {
        from: BookingStatus,
        to: BookingStatus,
    },

    /// Booking already has an assigned provider
    #[error("booking {0} already has an assigned provider")]
    AlreadyAssigned(String),

    /// Acting party is neither the requester nor the assigned provider
    #[error("actor {actor} is not a party to booking {booking}")]
    NotAParty { actor: String, booking: String },

    /// No completed payment backs the booking
    #[error("booking {0} has no completed payment")]
    PaymentIncomplete(String),

    /// Scheduled start is already in the past
    #[error("booking {0} start time has already passed")]
    StartTimePassed(String),

    /// User approval was requested before the provider asked to start
    #[error("start approval has not been requested for booking {0}")]
    ApprovalNotRequested(String),

    /// Webhook signature verification failure
    #[error("webhook signature verification failed: {0}")]
    InvalidSignature(String),

    /// Webhook payload could not be decoded
    #[error("webhook payload invalid: {0}")]
    InvalidPayload(String),

    /// Payment gateway request failed
    #[error("payment gateway error: {0}")]
    Gateway(String),

    /// Deferred task scheduler request failed
    #[error("task scheduler error: {0}")]
    Scheduler(String),

    /// Storage error
    #[error("storage error: {0}")]
    Storage(String),

    /// Configuration error
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Request validation error
    #[error("validation error: {0}")]
    Validation(String),
}

/// Core result type
pub type CoreResult<T> = Result<T, CoreError>;

impl From<reqwest::Error> for CoreError {
    fn from(e: reqwest::Error) -> Self {
        CoreError::Gateway(e.to_string())
    }
}

impl From<serde_json::Error> for CoreError {
    fn from(e: serde_json::Error) -> Self {
        CoreError::InvalidPayload(e.to_string())
    }
}
