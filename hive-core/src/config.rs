//! Core configuration
//!
//! Engine configuration with environment-variable loading under the HIVE_
//! prefix. Commission rate and settlement delay are deployment decisions and
//! must come from configuration, never from constants at the use site.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::env;
use std::str::FromStr;

/// Engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoreConfig {
    /// Base URL of this server, used to build deferred-task callback targets
    pub server_base_url: String,
    /// Platform commission taken from each booking payment (0.0 - 1.0)
    pub commission_rate: Decimal,
    /// Delay between booking completion and earning settlement, in seconds
    pub settlement_delay_secs: u64,
    /// Minimum lead time before a booking's start for it to be offered to
    /// providers, in seconds
    pub booking_lead_secs: u64,
    /// Settlement currency (ISO 4217, lowercase)
    pub currency: String,
    /// Shared secret expected on deferred-task callbacks
    pub task_callback_secret: String,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            server_base_url: "http://localhost:3000".to_string(),
            commission_rate: Decimal::new(20, 2), // 0.20
            settlement_delay_secs: 2 * 60 * 60,
            booking_lead_secs: 10 * 60,
            currency: "usd".to_string(),
            task_callback_secret: String::new(),
        }
    }
}

impl CoreConfig {
    /// Create development configuration
    pub fn development() -> Self {
        Self {
            task_callback_secret: "dev-task-secret".to_string(),
            ..Self::default()
        }
    }

    /// Load configuration from environment variables
    ///
    /// Environment variables:
    /// - HIVE_SERVER_BASE_URL: public base URL of this server
    /// - HIVE_COMMISSION_RATE: platform commission (decimal, e.g. "0.20")
    /// - HIVE_SETTLEMENT_DELAY_SECS: completion-to-settlement delay
    /// - HIVE_BOOKING_LEAD_SECS: minimum lead time for open bookings
    /// - HIVE_CURRENCY: settlement currency
    /// - HIVE_TASK_CALLBACK_SECRET: deferred-task bearer secret
    pub fn from_env() -> Self {
        let defaults = Self::default();

        Self {
            server_base_url: env::var("HIVE_SERVER_BASE_URL")
                .unwrap_or(defaults.server_base_url),
            commission_rate: env::var("HIVE_COMMISSION_RATE")
                .ok()
                .and_then(|s| Decimal::from_str(&s).ok())
                .unwrap_or(defaults.commission_rate),
            settlement_delay_secs: env::var("HIVE_SETTLEMENT_DELAY_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.settlement_delay_secs),
            booking_lead_secs: env::var("HIVE_BOOKING_LEAD_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.booking_lead_secs),
            currency: env::var("HIVE_CURRENCY").unwrap_or(defaults.currency),
            task_callback_secret: env::var("HIVE_TASK_CALLBACK_SECRET")
                .unwrap_or(defaults.task_callback_secret),
        }
    }

    /// Net-of-commission share of a payment amount, rounded to cents
    pub fn provider_share(&self, amount: Decimal) -> Decimal {
        (amount * (Decimal::ONE - self.commission_rate)).round_dp(2)
    }

    /// Callback URL for the deferred earning-settlement trigger
    pub fn earning_complete_url(&self) -> String {
        format!("{}/tasks/earning-complete", self.server_base_url)
    }

    /// Callback URL for the booking-expiry trigger
    pub fn booking_expired_url(&self) -> String {
        format!("{}/tasks/booking-expired", self.server_base_url)
    }
}
