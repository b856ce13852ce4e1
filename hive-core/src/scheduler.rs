//! Deferred task scheduler port
//!
//! "Run this HTTP callback at time T" requests. Deliveries are at least
//! once; every callback handler re-validates state and treats logical
//! no-ops as success. There is no cancel operation: a stale trigger simply
//! finds nothing left to do.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::env;
use std::time::Duration;

use crate::error::{CoreError, CoreResult};
use crate::types::TaskId;

/// Deferred task scheduler interface
#[async_trait]
pub trait TaskScheduler: Send + Sync {
    /// Schedule a POST of `body` to `target_url` at `run_at`, authenticated
    /// with the configured bearer secret
    async fn schedule(
        &self,
        target_url: &str,
        body: serde_json::Value,
        run_at: DateTime<Utc>,
    ) -> CoreResult<TaskId>;
}

/// Scheduler service configuration
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Queue service endpoint accepting task descriptors
    pub queue_url: String,
    /// Credential for the queue service
    pub api_key: String,
    /// Bearer secret the queue will attach to callbacks
    pub callback_secret: String,
    /// Request timeout in seconds
    pub timeout_secs: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            queue_url: "http://localhost:8090/tasks".to_string(),
            api_key: String::new(),
            callback_secret: String::new(),
            timeout_secs: 15,
        }
    }
}

impl SchedulerConfig {
    /// Load configuration from environment variables
    ///
    /// Environment variables:
    /// - HIVE_SCHEDULER_QUEUE_URL: queue service endpoint
    /// - HIVE_SCHEDULER_API_KEY: queue service credential
    /// - HIVE_TASK_CALLBACK_SECRET: callback bearer secret
    /// - HIVE_SCHEDULER_TIMEOUT_SECS: request timeout
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            queue_url: env::var("HIVE_SCHEDULER_QUEUE_URL").unwrap_or(defaults.queue_url),
            api_key: env::var("HIVE_SCHEDULER_API_KEY").unwrap_or_default(),
            callback_secret: env::var("HIVE_TASK_CALLBACK_SECRET").unwrap_or_default(),
            timeout_secs: env::var("HIVE_SCHEDULER_TIMEOUT_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.timeout_secs),
        }
    }
}

/// HTTP-backed scheduler adapter
pub struct HttpTaskScheduler {
    config: SchedulerConfig,
    http: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct CreateTaskResponse {
    name: String,
}

impl HttpTaskScheduler {
    /// Create a scheduler client from configuration
    pub fn new(config: SchedulerConfig) -> CoreResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| CoreError::Configuration(e.to_string()))?;
        Ok(Self { config, http })
    }
}

#[async_trait]
impl TaskScheduler for HttpTaskScheduler {
    async fn schedule(
        &self,
        target_url: &str,
        body: serde_json::Value,
        run_at: DateTime<Utc>,
    ) -> CoreResult<TaskId> {
        let descriptor = serde_json::json!({
            "httpRequest": {
                "httpMethod": "POST",
                "url": target_url,
                "body": body,
                "headers": {
                    "Content-Type": "application/json",
                    "Authorization": format!("Bearer {}", self.config.callback_secret),
                },
            },
            "scheduleTime": { "seconds": run_at.timestamp() },
        });

        let response = self
            .http
            .post(&self.config.queue_url)
            .bearer_auth(&self.config.api_key)
            .json(&descriptor)
            .send()
            .await
            .map_err(|e| CoreError::Scheduler(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(CoreError::Scheduler(format!(
                "queue responded {status}: {text}"
            )));
        }

        let created: CreateTaskResponse = response
            .json()
            .await
            .map_err(|e| CoreError::Scheduler(e.to_string()))?;
        Ok(TaskId::new(created.name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults() {
        let config = SchedulerConfig::default();
        assert_eq!(config.timeout_secs, 15);
        assert!(config.callback_secret.is_empty());
    }
}
