//! Role guard for privileged paths

use std::sync::Arc;
use std::time::Duration;
use tracing::{error, warn};

use crate::error::GatewayError;
use crate::identity::{IdentityClient, IdentityError};
use crate::jwt::{Claims, Role};

/// Whether `claims` carry `required`.
pub fn require_role(claims: &Claims, required: &Role) -> bool {
    claims.has_role(required)
}

/// Where the caller's role comes from.
#[derive(Clone)]
pub enum RoleSource {
    /// The verified `role` claim
    Claims,
    /// A live lookup, bounded by `timeout`
    Identity {
        /// Identity client
        client: Arc<dyn IdentityClient>,
        /// Bound on the lookup
        timeout: Duration,
    },
}

/// Admin authorization applied after authentication succeeded.
#[derive(Clone)]
pub struct RoleGuard {
    required: Role,
    source: RoleSource,
}

impl RoleGuard {
    /// Guard requiring `required`, read from `source`
    pub const fn new(required: Role, source: RoleSource) -> Self {
        Self { required, source }
    }

    /// Role the guard demands
    pub const fn required(&self) -> &Role {
        &self.required
    }

    /// Checks the caller against the required role.
    ///
    /// # Errors
    ///
    /// [`GatewayError::Forbidden`] when the role is missing or the account is
    /// not active; [`GatewayError::RefreshServiceUnavailable`] when a live
    /// lookup cannot be answered.
    pub async fn authorize(&self, claims: &Claims) -> Result<(), GatewayError> {
        let allowed = match &self.source {
            RoleSource::Claims => require_role(claims, &self.required),
            RoleSource::Identity { client, timeout } => {
                match tokio::time::timeout(*timeout, client.get_user_info(&claims.sub)).await {
                    Ok(Ok(info)) => info.is_active() && info.role == self.required,
                    Ok(Err(IdentityError::NotFound | IdentityError::Rejected { .. })) => false,
                    Ok(Err(err)) => {
                        error!(error = %err, subject = %claims.sub, "Role lookup failed");
                        return Err(GatewayError::RefreshServiceUnavailable {
                            reason: err.to_string(),
                        });
                    }
                    Err(_) => {
                        error!(subject = %claims.sub, "Role lookup timed out");
                        return Err(GatewayError::RefreshServiceUnavailable {
                            reason: "role lookup timed out".to_string(),
                        });
                    }
                }
            }
        };

        if allowed {
            Ok(())
        } else {
            warn!(
                subject = %claims.sub,
                required = %self.required,
                "Role check failed"
            );
            Err(GatewayError::Forbidden {
                required: self.required.to_string(),
            })
        }
    }
}
