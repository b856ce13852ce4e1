//! Deferred-task callback endpoints
//!
//! Invoked by the task queue with a shared-secret bearer header. Logical
//! no-ops (missing records, already-terminal states, skipped settlements)
//! are acknowledged with 200 so the queue does not redeliver them; only a
//! bad secret (401) or a transient upstream failure (500) signals anything
//! else.

use axum::{
    extract::State,
    http::{header, HeaderMap},
    Json,
};

use hive_core::lifecycle::ExpiryOutcome;
use hive_core::types::BookingId;
use hive_core::SettlementOutcome;

use crate::dto::{MessageResponse, TaskCallbackRequest};
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

fn check_bearer(state: &AppState, headers: &HeaderMap) -> ApiResult<()> {
    let expected = format!("Bearer {}", state.task_callback_secret);
    let provided = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok());

    if state.task_callback_secret.is_empty() || provided != Some(expected.as_str()) {
        return Err(ApiError::Unauthorized(
            "invalid task callback credentials".to_string(),
        ));
    }
    Ok(())
}

/// Deferred earning-settlement trigger
pub async fn earning_complete(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<TaskCallbackRequest>,
) -> ApiResult<Json<MessageResponse>> {
    check_bearer(&state, &headers)?;

    let outcome = state
        .settlement
        .settle_earning(&BookingId::new(req.booking_id))
        .await?;

    let message = match outcome {
        SettlementOutcome::Settled { .. } => "Earning settled",
        SettlementOutcome::AlreadySettled => "Earning already paid",
        SettlementOutcome::EarningCancelled => "Earning already cancelled",
        SettlementOutcome::MissingRecord { entity } => match entity {
            "booking" => "Booking not found",
            "provider" => "Provider not found",
            _ => "Earning not found",
        },
        SettlementOutcome::NotPayoutReady => "Provider payout account not ready",
        SettlementOutcome::InsufficientPlatformBalance => "Platform balance insufficient",
    };

    Ok(Json(MessageResponse::new(message)))
}

/// Booking acceptance-deadline trigger
pub async fn booking_expired(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<TaskCallbackRequest>,
) -> ApiResult<Json<MessageResponse>> {
    check_bearer(&state, &headers)?;

    let outcome = state
        .lifecycle
        .expire_unaccepted(&BookingId::new(req.booking_id))
        .await?;

    let message = match outcome {
        ExpiryOutcome::Expired => "Booking expired and cancelled",
        ExpiryOutcome::AlreadyHandled => "Booking already handled",
        ExpiryOutcome::NotFound => "Booking not found",
    };

    Ok(Json(MessageResponse::new(message)))
}
