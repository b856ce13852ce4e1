//! Provider account endpoints

use axum::{
    extract::{Path, State},
    Json,
};

use hive_core::types::UserId;

use crate::dto::AccountResponse;
use crate::error::ApiResult;
use crate::state::AppState;

/// Provider balance and payout-account state
pub async fn get_account(
    State(state): State<AppState>,
    Path(provider_id): Path<String>,
) -> ApiResult<Json<AccountResponse>> {
    let account = state
        .settlement
        .provider_account(&UserId::new(provider_id))
        .await?;

    Ok(Json(AccountResponse {
        user_id: account.user_id.to_string(),
        available_balance: account.available_balance,
        is_available: account.is_available,
        connected_account_id: account.connected_account_id,
    }))
}
