//! Hive API - HTTP surface for the booking and settlement engines
//!
//! Thin axum layer over `hive-core`: booking operation routes, the
//! deferred-task callback endpoints, the payment-gateway webhook endpoints
//! and health checks. Handlers validate and translate; all domain rules
//! live in the engines.

pub mod dto;
pub mod error;
pub mod routes;
pub mod server;
pub mod state;

pub use error::{ApiError, ApiResult};
pub use routes::create_router;
pub use server::{create_server, run_server, start_background_server};
pub use state::{ApiConfig, AppState};
