//! Refresh Coordinator and Role Guard Unit Tests

use std::sync::Arc;
use std::time::{Duration, Instant};

use edge_gateway::error::GatewayError;
use edge_gateway::guard::{RoleGuard, RoleSource};
use edge_gateway::jwt::{Claims, Role};
use edge_gateway::refresh::RefreshCoordinator;

use crate::common::{FakeIdentity, IDENTITY_TIMEOUT, RefreshBehavior, fixed_now};

fn coordinator(identity: &Arc<FakeIdentity>) -> RefreshCoordinator {
    RefreshCoordinator::new(Arc::clone(identity) as _, IDENTITY_TIMEOUT)
}

fn claims(sub: &str, role: Role) -> Claims {
    Claims {
        sub: sub.to_string(),
        role: Some(role),
        exp: fixed_now().timestamp() + 600,
        iat: None,
    }
}

#[tokio::test]
async fn test_refresh_success_makes_one_call() {
    let identity = Arc::new(FakeIdentity::issuing(Role::User, fixed_now()));
    let pair = coordinator(&identity).refresh("r").await.unwrap();

    assert_eq!(Some(&pair), identity.issued_pair());
    assert_eq!(identity.refresh_calls(), 1);
}

#[tokio::test]
async fn test_rejection_is_refresh_invalid() {
    let identity = Arc::new(FakeIdentity::new(RefreshBehavior::Reject(403)));
    let err = coordinator(&identity).refresh("r").await.unwrap_err();
    assert!(matches!(err, GatewayError::RefreshInvalid));
}

#[tokio::test]
async fn test_timeout_is_unavailable_and_not_retried() {
    let identity = Arc::new(FakeIdentity::new(RefreshBehavior::Hang));
    let started = Instant::now();
    let err = coordinator(&identity).refresh("r").await.unwrap_err();

    assert!(matches!(err, GatewayError::RefreshServiceUnavailable { .. }));
    assert!(started.elapsed() < IDENTITY_TIMEOUT + Duration::from_secs(1));
    assert_eq!(identity.refresh_calls(), 1);
}

#[tokio::test]
async fn test_live_lookup_requires_active_admin() {
    let identity = Arc::new(
        FakeIdentity::new(RefreshBehavior::Unavailable)
            .with_user("1", Role::Admin, "ACTIVE")
            .with_user("2", Role::Admin, "DORMANT")
            .with_user("3", Role::User, "ACTIVE"),
    );
    let guard = RoleGuard::new(
        Role::Admin,
        RoleSource::Identity {
            client: Arc::clone(&identity) as _,
            timeout: IDENTITY_TIMEOUT,
        },
    );

    // Live lookup ignores the role claim
    assert!(guard.authorize(&claims("1", Role::User)).await.is_ok());
    for sub in ["2", "3", "unknown"] {
        let err = guard.authorize(&claims(sub, Role::Admin)).await.unwrap_err();
        assert!(matches!(err, GatewayError::Forbidden { .. }), "{sub}");
    }
    assert_eq!(identity.lookup_calls(), 4);
}
