//! Provider account projection and persisted notifications
//!
//! The core does not own user identity; it reads and writes only the
//! provider-account fields the engines need: the available balance, the
//! broadcast-availability flag and the connected payout account.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::common::{NotificationId, UserId};

/// Provider-side account fields owned by the settlement flow
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderAccount {
    /// Account owner
    pub user_id: UserId,
    /// Balance available for payout
    pub available_balance: Decimal,
    /// Whether the provider is currently accepting job broadcasts
    pub is_available: bool,
    /// Gateway connected-account id, none until onboarding starts
    pub connected_account_id: Option<String>,
    /// Last mutation time
    pub updated_at: DateTime<Utc>,
}

impl ProviderAccount {
    /// Create an account projection with a zero balance
    pub fn new(user_id: UserId) -> Self {
        Self {
            user_id,
            available_balance: Decimal::ZERO,
            is_available: false,
            connected_account_id: None,
            updated_at: Utc::now(),
        }
    }

    /// Credit the available balance
    pub fn credit(&mut self, amount: Decimal) {
        self.available_balance += amount;
        self.updated_at = Utc::now();
    }
}

/// Persisted notification record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationRecord {
    /// Record id
    pub id: NotificationId,
    /// Recipient
    pub user_id: UserId,
    /// Notification title
    pub title: String,
    /// Notification body
    pub body: String,
    /// Client screen to open
    pub screen: String,
    /// Structured payload for the client
    pub data: serde_json::Value,
    /// Creation time
    pub created_at: DateTime<Utc>,
}

impl NotificationRecord {
    /// Create a notification record
    pub fn new(
        user_id: UserId,
        title: impl Into<String>,
        body: impl Into<String>,
        screen: impl Into<String>,
        data: serde_json::Value,
    ) -> Self {
        Self {
            id: NotificationId::generate(),
            user_id,
            title: title.into(),
            body: body.into(),
            screen: screen.into(),
            data,
            created_at: Utc::now(),
        }
    }
}
