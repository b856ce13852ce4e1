//! Hive API server binary
//!
//! Usage:
//!   hive-server                 - run with live service adapters from env
//!   hive-server --dev           - run with in-process doubles, no credentials
//!   hive-server -H 0.0.0.0 -p 8080

use clap::Parser;
use std::sync::Arc;

use hive_api::{run_server, ApiConfig, AppState};
use hive_core::mock::{MockGateway, MockScheduler};
use hive_core::notify::{NoopNotifier, PushConfig, PushNotifier};
use hive_core::scheduler::{HttpTaskScheduler, SchedulerConfig};
use hive_core::{
    CoreConfig, GatewayConfig, LedgerStore, MemoryLedger, Notifier, PaymentGateway, RestGateway,
    TaskScheduler,
};

#[derive(Parser)]
#[command(name = "hive-server")]
#[command(about = "Hive marketplace booking and settlement API")]
#[command(version)]
struct Cli {
    /// Host to bind to
    #[arg(short = 'H', long, default_value = "0.0.0.0")]
    host: String,

    /// Port to listen on
    #[arg(short, long, default_value = "3000")]
    port: u16,

    /// Disable CORS
    #[arg(long)]
    no_cors: bool,

    /// Use in-process doubles for gateway, scheduler and notifier instead
    /// of live services
    #[arg(long)]
    dev: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tower_http=debug".into()),
        )
        .init();

    let cli = Cli::parse();

    let core_config = if cli.dev {
        CoreConfig::development()
    } else {
        CoreConfig::from_env()
    };

    let ledger: Arc<dyn LedgerStore> = Arc::new(MemoryLedger::new());

    let (gateway, scheduler, notifier): (
        Arc<dyn PaymentGateway>,
        Arc<dyn TaskScheduler>,
        Arc<dyn Notifier>,
    ) = if cli.dev {
        tracing::warn!("running with in-process service doubles");
        (
            Arc::new(MockGateway::new()),
            Arc::new(MockScheduler::new()),
            Arc::new(NoopNotifier),
        )
    } else {
        (
            Arc::new(RestGateway::new(GatewayConfig::from_env())?),
            Arc::new(HttpTaskScheduler::new(SchedulerConfig::from_env())?),
            Arc::new(PushNotifier::new(PushConfig::from_env())?),
        )
    };

    let state = AppState::new(ledger, gateway, scheduler, notifier, core_config);

    let api_config = ApiConfig {
        host: cli.host,
        port: cli.port,
        enable_cors: !cli.no_cors,
    };

    run_server(&api_config, state).await
}
