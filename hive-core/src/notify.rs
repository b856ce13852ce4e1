//! Notification dispatcher port
//!
//! Fire-and-forget push notifications. Delivery failures are logged and
//! swallowed; a booking transition never fails because a push could not be
//! sent. `send_and_store` additionally persists a notification record
//! through the ledger for the in-app notification list.

use async_trait::async_trait;
use std::env;
use std::time::Duration;
use tracing::warn;

use crate::error::{CoreError, CoreResult};
use crate::storage::LedgerStore;
use crate::types::{NotificationRecord, UserId};

/// A push notification
#[derive(Debug, Clone)]
pub struct Note {
    /// Notification title
    pub title: String,
    /// Notification body
    pub body: String,
    /// Client screen to open on tap
    pub screen: String,
    /// Structured payload for the client
    pub data: serde_json::Value,
}

impl Note {
    /// Create a note
    pub fn new(
        title: impl Into<String>,
        body: impl Into<String>,
        screen: impl Into<String>,
        data: serde_json::Value,
    ) -> Self {
        Self {
            title: title.into(),
            body: body.into(),
            screen: screen.into(),
            data,
        }
    }
}

/// Notification dispatcher interface
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Send a push notification to each recipient. Best effort; errors are
    /// reported but callers treat delivery as fire-and-forget.
    async fn send(&self, recipients: &[UserId], note: &Note) -> CoreResult<()>;
}

/// Send a note and persist one record per recipient.
///
/// Push delivery and record persistence are both best effort here; the
/// caller's transition has already committed.
pub async fn send_and_store(
    notifier: &dyn Notifier,
    ledger: &dyn LedgerStore,
    recipients: &[UserId],
    note: &Note,
) {
    if let Err(e) = notifier.send(recipients, note).await {
        warn!(error = %e, title = %note.title, "push delivery failed");
    }
    for recipient in recipients {
        let record = NotificationRecord::new(
            recipient.clone(),
            note.title.clone(),
            note.body.clone(),
            note.screen.clone(),
            note.data.clone(),
        );
        if let Err(e) = ledger.save_notification(&record).await {
            warn!(error = %e, user = %recipient, "notification record not persisted");
        }
    }
}

/// Push service configuration
#[derive(Debug, Clone)]
pub struct PushConfig {
    /// Push service endpoint
    pub api_url: String,
    /// Application id at the push service
    pub app_id: String,
    /// Push service credential
    pub api_key: String,
    /// Request timeout in seconds
    pub timeout_secs: u64,
}

impl Default for PushConfig {
    fn default() -> Self {
        Self {
            api_url: "https://api.onesignal.com/notifications".to_string(),
            app_id: String::new(),
            api_key: String::new(),
            timeout_secs: 10,
        }
    }
}

impl PushConfig {
    /// Load configuration from environment variables
    ///
    /// Environment variables:
    /// - HIVE_PUSH_API_URL: push service endpoint
    /// - HIVE_PUSH_APP_ID: application id
    /// - HIVE_PUSH_API_KEY: push service credential
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            api_url: env::var("HIVE_PUSH_API_URL").unwrap_or(defaults.api_url),
            app_id: env::var("HIVE_PUSH_APP_ID").unwrap_or_default(),
            api_key: env::var("HIVE_PUSH_API_KEY").unwrap_or_default(),
            timeout_secs: defaults.timeout_secs,
        }
    }
}

/// HTTP push notification dispatcher
pub struct PushNotifier {
    config: PushConfig,
    http: reqwest::Client,
}

impl PushNotifier {
    /// Create a dispatcher from configuration
    pub fn new(config: PushConfig) -> CoreResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| CoreError::Configuration(e.to_string()))?;
        Ok(Self { config, http })
    }
}

#[async_trait]
impl Notifier for PushNotifier {
    async fn send(&self, recipients: &[UserId], note: &Note) -> CoreResult<()> {
        if recipients.is_empty() {
            return Ok(());
        }

        let external_ids: Vec<&str> = recipients.iter().map(|u| u.as_str()).collect();
        let mut data = note.data.clone();
        if let Some(map) = data.as_object_mut() {
            map.insert("screen".to_string(), note.screen.clone().into());
        }

        let message = serde_json::json!({
            "app_id": self.config.app_id,
            "include_aliases": { "external_id": external_ids },
            "headings": { "en": note.title },
            "contents": { "en": note.body },
            "data": data,
        });

        let response = self
            .http
            .post(&self.config.api_url)
            .bearer_auth(&self.config.api_key)
            .json(&message)
            .send()
            .await
            .map_err(|e| CoreError::Gateway(format!("push service: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(CoreError::Gateway(format!(
                "push service responded {status}: {text}"
            )));
        }
        Ok(())
    }
}

/// Dispatcher that drops every notification; for environments without a
/// push service
#[derive(Debug, Default)]
pub struct NoopNotifier;

#[async_trait]
impl Notifier for NoopNotifier {
    async fn send(&self, _recipients: &[UserId], _note: &Note) -> CoreResult<()> {
        Ok(())
    }
}
