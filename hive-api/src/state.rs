//! Application state for the API server

use std::sync::Arc;

use hive_core::{
    CoreConfig, LedgerStore, LifecycleEngine, Notifier, PaymentGateway, SettlementEngine,
    TaskScheduler,
};

/// API server state
#[derive(Clone)]
pub struct AppState {
    /// Booking lifecycle engine
    pub lifecycle: Arc<LifecycleEngine>,
    /// Settlement engine
    pub settlement: Arc<SettlementEngine>,
    /// Gateway handle for webhook verification
    pub gateway: Arc<dyn PaymentGateway>,
    /// Shared secret expected on deferred-task callbacks
    pub task_callback_secret: String,
    /// API version
    pub version: String,
}

impl AppState {
    /// Wire the engines over the given ports
    pub fn new(
        ledger: Arc<dyn LedgerStore>,
        gateway: Arc<dyn PaymentGateway>,
        scheduler: Arc<dyn TaskScheduler>,
        notifier: Arc<dyn Notifier>,
        config: CoreConfig,
    ) -> Self {
        let task_callback_secret = config.task_callback_secret.clone();
        let lifecycle = Arc::new(LifecycleEngine::new(
            ledger.clone(),
            gateway.clone(),
            scheduler,
            notifier.clone(),
            config.clone(),
        ));
        let settlement = Arc::new(SettlementEngine::new(
            ledger,
            gateway.clone(),
            notifier,
            config,
        ));

        Self {
            lifecycle,
            settlement,
            gateway,
            task_callback_secret,
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

/// API server configuration
#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub host: String,
    pub port: u16,
    pub enable_cors: bool,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            enable_cors: true,
        }
    }
}
