//! Observability Module
//!
//! Structured logging setup and Prometheus metrics.

pub mod metrics;
pub mod telemetry;

pub use metrics::GatewayMetrics;
pub use telemetry::{TelemetryConfig, init_tracing};
