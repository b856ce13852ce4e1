//! API route handlers

pub mod account;
pub mod booking;
pub mod health;
pub mod tasks;
pub mod webhook;

use axum::{routing::get, routing::post, Router};

use crate::state::AppState;

/// Create the API router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Health endpoints
        .route("/health", get(health::health_check))
        .route("/ready", get(health::ready_check))
        // Booking endpoints
        .route("/bookings", post(booking::create_booking))
        .route("/bookings/open", get(booking::open_bookings))
        .route("/bookings/:booking_id", get(booking::get_booking))
        .route(
            "/bookings/:booking_id/payment-intent",
            post(booking::create_payment_intent),
        )
        .route("/bookings/:booking_id/accept", post(booking::accept_booking))
        .route(
            "/bookings/:booking_id/request-start",
            post(booking::request_start),
        )
        .route(
            "/bookings/:booking_id/approve-start",
            post(booking::approve_start),
        )
        .route(
            "/bookings/:booking_id/complete",
            post(booking::complete_booking),
        )
        .route("/bookings/:booking_id/cancel", post(booking::cancel_booking))
        .route("/users/:user_id/bookings", get(booking::user_bookings))
        .route(
            "/providers/:provider_id/bookings",
            get(booking::provider_bookings),
        )
        .route(
            "/providers/:provider_id/account",
            get(account::get_account),
        )
        // Deferred-task callbacks
        .route("/tasks/earning-complete", post(tasks::earning_complete))
        .route("/tasks/booking-expired", post(tasks::booking_expired))
        // Payment gateway webhooks
        .route("/webhooks/gateway", post(webhook::platform_webhook))
        .route("/webhooks/gateway/payouts", post(webhook::connect_webhook))
        // State
        .with_state(state)
}
