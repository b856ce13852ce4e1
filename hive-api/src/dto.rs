//! Data Transfer Objects for API requests and responses

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use hive_core::types::{Booking, BookingStatus, Payment, PaymentStatus, RefundStatus};

// ============ Booking DTOs ============

/// Create booking request
#[derive(Debug, Deserialize)]
pub struct CreateBookingRequest {
    /// Requesting user id
    pub user_id: String,
    /// Quoted price
    pub amount: Decimal,
    /// Scheduled start
    pub start_at: DateTime<Utc>,
}

/// Acting party for a booking operation
#[derive(Debug, Deserialize)]
pub struct ActorRequest {
    /// Id of the user or provider performing the operation
    pub actor_id: String,
}

/// Booking response
#[derive(Debug, Serialize)]
pub struct BookingResponse {
    pub id: String,
    pub user_id: String,
    pub provider_id: Option<String>,
    pub amount: Decimal,
    pub start_at: DateTime<Utc>,
    pub status: String,
    pub user_approval_requested: bool,
    pub completed_at: Option<DateTime<Utc>>,
    pub completed_by: Option<String>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub cancelled_by: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Booking detail response with its payment
#[derive(Debug, Serialize)]
pub struct BookingDetailResponse {
    pub booking: BookingResponse,
    pub payment: Option<PaymentResponse>,
}

/// Booking list response
#[derive(Debug, Serialize)]
pub struct BookingListResponse {
    pub bookings: Vec<BookingResponse>,
}

// ============ Payment DTOs ============

/// Payment response
#[derive(Debug, Serialize)]
pub struct PaymentResponse {
    pub id: String,
    pub booking_id: String,
    pub amount: Decimal,
    pub status: String,
    pub intent_id: String,
    pub client_secret: Option<String>,
    pub refund_status: Option<String>,
    pub refund_amount: Option<Decimal>,
}

// ============ Account DTOs ============

/// Provider account response
#[derive(Debug, Serialize)]
pub struct AccountResponse {
    pub user_id: String,
    pub available_balance: Decimal,
    pub is_available: bool,
    pub connected_account_id: Option<String>,
}

// ============ Task callback DTOs ============

/// Deferred-task callback body
#[derive(Debug, Deserialize)]
pub struct TaskCallbackRequest {
    /// Target booking
    #[serde(rename = "bookingId")]
    pub booking_id: String,
}

/// Generic acknowledgement body
#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    /// Wrap a message
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

// ============ Health DTOs ============

/// Health response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

// ============ Mapping helpers ============

pub(crate) fn booking_status_str(status: BookingStatus) -> &'static str {
    match status {
        BookingStatus::Pending => "pending",
        BookingStatus::InProgress => "in_progress",
        BookingStatus::Completed => "completed",
        BookingStatus::Cancelled => "cancelled",
    }
}

pub(crate) fn payment_status_str(status: PaymentStatus) -> &'static str {
    match status {
        PaymentStatus::Pending => "pending",
        PaymentStatus::Completed => "completed",
        PaymentStatus::Cancelled => "cancelled",
    }
}

pub(crate) fn refund_status_str(status: RefundStatus) -> &'static str {
    match status {
        RefundStatus::Pending => "pending",
        RefundStatus::Succeeded => "succeeded",
        RefundStatus::Failed => "failed",
        RefundStatus::Cancelled => "cancelled",
    }
}

pub(crate) fn booking_to_response(booking: &Booking) -> BookingResponse {
    BookingResponse {
        id: booking.id.to_string(),
        user_id: booking.user_id.to_string(),
        provider_id: booking.provider_id.as_ref().map(|p| p.to_string()),
        amount: booking.amount,
        start_at: booking.start_at,
        status: booking_status_str(booking.status).to_string(),
        user_approval_requested: booking.user_approval_requested,
        completed_at: booking.completed_at,
        completed_by: booking.completed_by.as_ref().map(|u| u.to_string()),
        cancelled_at: booking.cancelled_at,
        cancelled_by: booking.cancelled_by.as_ref().map(|u| u.to_string()),
        created_at: booking.created_at,
    }
}

pub(crate) fn payment_to_response(payment: &Payment) -> PaymentResponse {
    PaymentResponse {
        id: payment.id.to_string(),
        booking_id: payment.booking_id.to_string(),
        amount: payment.amount,
        status: payment_status_str(payment.status).to_string(),
        intent_id: payment.intent_id.clone(),
        client_secret: payment.client_secret.clone(),
        refund_status: payment
            .refund
            .as_ref()
            .map(|r| refund_status_str(r.status).to_string()),
        refund_amount: payment.refund.as_ref().and_then(|r| r.amount),
    }
}
