//! Payment gateway webhook endpoints
//!
//! Raw-body endpoints: the signature covers the exact bytes delivered, so
//! the payload must not pass through JSON extraction before verification.
//! A bad signature is rejected with 400 before any state is touched;
//! recognized events are applied idempotently and unrecognized kinds are
//! acknowledged with 200.

use axum::{body::Bytes, extract::State, http::HeaderMap, Json};

use hive_core::{WebhookChannel, WebhookOutcome};

use crate::dto::MessageResponse;
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

/// Signature header sent by the gateway
pub const SIGNATURE_HEADER: &str = "gateway-signature";

async fn handle(
    state: AppState,
    channel: WebhookChannel,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult<Json<MessageResponse>> {
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| ApiError::BadRequest("missing signature header".to_string()))?;

    let event = state.gateway.verify_webhook(channel, &body, signature)?;
    let outcome = state.settlement.apply_gateway_event(event).await?;

    let message = match outcome {
        WebhookOutcome::PaymentCompleted { .. } => "Payment completed",
        WebhookOutcome::PaymentAlreadyCompleted => "Payment already completed",
        WebhookOutcome::RefundRecorded { .. } => "Refund updated",
        WebhookOutcome::RefundAlreadyTerminal => "Refund already settled",
        WebhookOutcome::PayoutRecorded { .. } => "Payout updated",
        WebhookOutcome::PayoutAlreadyTerminal => "Payout already settled",
        WebhookOutcome::UnknownEntity { .. } => "No matching record",
        WebhookOutcome::Ignored { .. } => "Event ignored",
    };

    Ok(Json(MessageResponse::new(message)))
}

/// Platform-account events: payment intents and refunds
pub async fn platform_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult<Json<MessageResponse>> {
    handle(state, WebhookChannel::Platform, headers, body).await
}

/// Connected-account events: payouts
pub async fn connect_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult<Json<MessageResponse>> {
    handle(state, WebhookChannel::Connect, headers, body).await
}
