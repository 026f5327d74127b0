//! Tower and axum middleware for the gateway router.

pub mod auth;
pub mod tracing;

pub use auth::authenticate;
pub use tracing::{CORRELATION_ID_HEADER, CorrelationLayer, CorrelationService};
