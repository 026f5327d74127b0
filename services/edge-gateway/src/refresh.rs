//! Refresh coordination
//!
//! One identity call per invocation, bounded by a timeout and never retried.
//! The coordinator keeps no state between calls.

use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

use crate::error::GatewayError;
use crate::identity::{IdentityClient, IdentityError, TokenPair};

/// Exchanges refresh credentials through the identity service.
#[derive(Clone)]
pub struct RefreshCoordinator {
    identity: Arc<dyn IdentityClient>,
    timeout: Duration,
}

impl RefreshCoordinator {
    /// Creates a coordinator bounded by `timeout`
    pub fn new(identity: Arc<dyn IdentityClient>, timeout: Duration) -> Self {
        Self { identity, timeout }
    }

    /// Obtains a new token pair for `refresh_token`.
    ///
    /// # Errors
    ///
    /// [`GatewayError::RefreshInvalid`] when the identity service refuses the
    /// credential, [`GatewayError::RefreshServiceUnavailable`] when it cannot
    /// answer in time or at all.
    pub async fn refresh(&self, refresh_token: &str) -> Result<TokenPair, GatewayError> {
        let outcome = tokio::time::timeout(self.timeout, self.identity.refresh(refresh_token)).await;

        match outcome {
            Ok(Ok(pair)) => {
                info!("Access credential refreshed");
                Ok(pair)
            }
            Ok(Err(IdentityError::Rejected { status })) => {
                warn!(status, "Identity service rejected refresh credential");
                Err(GatewayError::RefreshInvalid)
            }
            Ok(Err(err)) => {
                error!(error = %err, "Refresh failed");
                Err(GatewayError::RefreshServiceUnavailable {
                    reason: err.to_string(),
                })
            }
            Err(_) => {
                error!(timeout_ms = self.timeout.as_millis(), "Refresh timed out");
                Err(GatewayError::RefreshServiceUnavailable {
                    reason: "timed out".to_string(),
                })
            }
        }
    }
}
