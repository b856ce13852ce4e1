//! Booking lifecycle endpoints

use axum::{
    extract::{Path, State},
    Json,
};

use hive_core::types::{BookingId, UserId};

use crate::dto::{
    booking_to_response, payment_to_response, ActorRequest, BookingDetailResponse,
    BookingListResponse, BookingResponse, CreateBookingRequest, PaymentResponse,
};
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

/// Create a booking request
pub async fn create_booking(
    State(state): State<AppState>,
    Json(req): Json<CreateBookingRequest>,
) -> ApiResult<Json<BookingResponse>> {
    if req.user_id.is_empty() {
        return Err(ApiError::BadRequest("user_id is required".to_string()));
    }

    let booking = state
        .lifecycle
        .create_booking(UserId::new(req.user_id), req.amount, req.start_at)
        .await?;

    Ok(Json(booking_to_response(&booking)))
}

/// Get a booking with its payment
pub async fn get_booking(
    State(state): State<AppState>,
    Path(booking_id): Path<String>,
) -> ApiResult<Json<BookingDetailResponse>> {
    let (booking, payment) = state
        .lifecycle
        .booking_with_payment(&BookingId::new(booking_id))
        .await?;

    Ok(Json(BookingDetailResponse {
        booking: booking_to_response(&booking),
        payment: payment.as_ref().map(payment_to_response),
    }))
}

/// Create the payment intent for a booking
pub async fn create_payment_intent(
    State(state): State<AppState>,
    Path(booking_id): Path<String>,
) -> ApiResult<Json<PaymentResponse>> {
    let payment = state
        .lifecycle
        .create_payment_intent(&BookingId::new(booking_id))
        .await?;

    Ok(Json(payment_to_response(&payment)))
}

/// Accept a pending booking as a provider
pub async fn accept_booking(
    State(state): State<AppState>,
    Path(booking_id): Path<String>,
    Json(req): Json<ActorRequest>,
) -> ApiResult<Json<BookingResponse>> {
    let booking = state
        .lifecycle
        .accept(&BookingId::new(booking_id), &UserId::new(req.actor_id))
        .await?;

    Ok(Json(booking_to_response(&booking)))
}

/// Ask the requester to approve the start of the job
pub async fn request_start(
    State(state): State<AppState>,
    Path(booking_id): Path<String>,
    Json(req): Json<ActorRequest>,
) -> ApiResult<Json<BookingResponse>> {
    let booking = state
        .lifecycle
        .request_start(&BookingId::new(booking_id), &UserId::new(req.actor_id))
        .await?;

    Ok(Json(booking_to_response(&booking)))
}

/// Approve the provider's start request as the requester
pub async fn approve_start(
    State(state): State<AppState>,
    Path(booking_id): Path<String>,
    Json(req): Json<ActorRequest>,
) -> ApiResult<Json<BookingResponse>> {
    let booking = state
        .lifecycle
        .approve_start(&BookingId::new(booking_id), &UserId::new(req.actor_id))
        .await?;

    Ok(Json(booking_to_response(&booking)))
}

/// Complete an in-progress booking
pub async fn complete_booking(
    State(state): State<AppState>,
    Path(booking_id): Path<String>,
    Json(req): Json<ActorRequest>,
) -> ApiResult<Json<BookingResponse>> {
    let booking = state
        .lifecycle
        .complete(&BookingId::new(booking_id), &UserId::new(req.actor_id))
        .await?;

    Ok(Json(booking_to_response(&booking)))
}

/// Cancel a pending booking
pub async fn cancel_booking(
    State(state): State<AppState>,
    Path(booking_id): Path<String>,
    Json(req): Json<ActorRequest>,
) -> ApiResult<Json<BookingResponse>> {
    let booking = state
        .lifecycle
        .cancel(&BookingId::new(booking_id), &UserId::new(req.actor_id))
        .await?;

    Ok(Json(booking_to_response(&booking)))
}

/// Open, paid bookings available for providers to accept
pub async fn open_bookings(
    State(state): State<AppState>,
) -> ApiResult<Json<BookingListResponse>> {
    let bookings = state.lifecycle.open_bookings().await?;
    Ok(Json(BookingListResponse {
        bookings: bookings.iter().map(booking_to_response).collect(),
    }))
}

/// Bookings requested by a user
pub async fn user_bookings(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> ApiResult<Json<BookingListResponse>> {
    let bookings = state
        .lifecycle
        .bookings_for_user(&UserId::new(user_id))
        .await?;
    Ok(Json(BookingListResponse {
        bookings: bookings.iter().map(booking_to_response).collect(),
    }))
}

/// Bookings assigned to a provider
pub async fn provider_bookings(
    State(state): State<AppState>,
    Path(provider_id): Path<String>,
) -> ApiResult<Json<BookingListResponse>> {
    let bookings = state
        .lifecycle
        .bookings_for_provider(&UserId::new(provider_id))
        .await?;
    Ok(Json(BookingListResponse {
        bookings: bookings.iter().map(booking_to_response).collect(),
    }))
}
