//! Edge Filter State Machine Unit Tests
//!
//! Drives the filter against the built-in policy with a fixed clock and a
//! call-counting identity fake.

use std::sync::Arc;

use axum::http::header::AUTHORIZATION;
use axum::http::{HeaderMap, HeaderValue, Method};

use edge_gateway::filter::{AuthOutcome, REFRESH_TOKEN_HEADER, RequestView, rewrite_credentials};
use edge_gateway::identity::TokenPair;
use edge_gateway::jwt::Role;

use crate::common::{
    FOREIGN_SECRET, FakeIdentity, RefreshBehavior, access_token_at, filter_with, fixed_now,
    mint_with, refresh_token_at,
};

fn headers(access: Option<&str>, refresh: Option<&str>) -> HeaderMap {
    let mut headers = HeaderMap::new();
    if let Some(token) = access {
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {token}")).unwrap(),
        );
    }
    if let Some(token) = refresh {
        headers.insert(REFRESH_TOKEN_HEADER, HeaderValue::from_str(token).unwrap());
    }
    headers
}

fn raw_authorization(value: &'static str) -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(AUTHORIZATION, HeaderValue::from_static(value));
    headers
}

async fn evaluate(
    identity: &Arc<FakeIdentity>,
    method: Method,
    path: &str,
    headers: &HeaderMap,
) -> AuthOutcome {
    let filter = filter_with(Arc::clone(identity));
    filter
        .evaluate_at(RequestView::new(&method, path, headers), fixed_now())
        .await
}

fn rejected_with(outcome: &AuthOutcome, status: u16) -> bool {
    matches!(outcome, AuthOutcome::Reject(s) if s.status == status)
}

#[tokio::test]
async fn test_exempt_path_ignores_garbage_header() {
    let identity = Arc::new(FakeIdentity::new(RefreshBehavior::Unavailable));
    let outcome = evaluate(
        &identity,
        Method::GET,
        "/books/42",
        &raw_authorization("Bearer not-a-token"),
    )
    .await;

    assert_eq!(outcome, AuthOutcome::Allow);
    assert_eq!(identity.refresh_calls(), 0);
}

#[tokio::test]
async fn test_guest_checkout_without_header_is_allowed() {
    let identity = Arc::new(FakeIdentity::new(RefreshBehavior::Unavailable));
    let outcome = evaluate(&identity, Method::POST, "/orders", &HeaderMap::new()).await;
    assert_eq!(outcome, AuthOutcome::Allow);

    // The exemption is method-scoped
    let outcome = evaluate(&identity, Method::GET, "/orders", &HeaderMap::new()).await;
    assert!(rejected_with(&outcome, 401));
}

#[tokio::test]
async fn test_malformed_header_on_conditional_path_follows_rule() {
    let identity = Arc::new(FakeIdentity::new(RefreshBehavior::Unavailable));

    let forwarded = evaluate(
        &identity,
        Method::POST,
        "/payments/confirm",
        &raw_authorization("Basic dXNlcjpwYXNz"),
    )
    .await;
    assert_eq!(forwarded, AuthOutcome::Allow);

    let rejected = evaluate(
        &identity,
        Method::GET,
        "/coupons",
        &raw_authorization("Basic dXNlcjpwYXNz"),
    )
    .await;
    assert!(rejected_with(&rejected, 401));
}

#[tokio::test]
async fn test_presented_credential_on_conditional_path_is_validated() {
    let identity = Arc::new(FakeIdentity::new(RefreshBehavior::Unavailable));
    let forged = mint_with(FOREIGN_SECRET, "user-42", Some(Role::User), fixed_now().timestamp() + 600);

    let outcome = evaluate(&identity, Method::POST, "/orders", &headers(Some(&forged), None)).await;
    assert!(rejected_with(&outcome, 401));
}

#[tokio::test]
async fn test_delivery_lookup_checks_presented_credential() {
    let identity = Arc::new(FakeIdentity::new(RefreshBehavior::Unavailable));
    let forged = mint_with(FOREIGN_SECRET, "user-42", Some(Role::User), fixed_now().timestamp() + 600);
    let genuine = access_token_at(Role::User, fixed_now(), 600);

    let anonymous = evaluate(&identity, Method::GET, "/orders/5/delivery", &HeaderMap::new()).await;
    assert_eq!(anonymous, AuthOutcome::Allow);

    let outcome = evaluate(&identity, Method::GET, "/orders/5/delivery", &headers(Some(&forged), None)).await;
    assert!(rejected_with(&outcome, 401));

    let outcome = evaluate(&identity, Method::GET, "/orders/none/5", &headers(Some(&forged), None)).await;
    assert!(rejected_with(&outcome, 401));

    let outcome = evaluate(&identity, Method::GET, "/orders/5/delivery", &headers(Some(&genuine), None)).await;
    assert_eq!(outcome, AuthOutcome::Allow);
    assert_eq!(identity.refresh_calls(), 0);
}

#[tokio::test]
async fn test_non_canonical_path_rejected_before_classification() {
    let identity = Arc::new(FakeIdentity::new(RefreshBehavior::Unavailable));
    for path in ["/books/../users/me", "/books/%2e%2e/users/me", "/books/.%2E/admin"] {
        let outcome = evaluate(&identity, Method::GET, path, &HeaderMap::new()).await;
        assert!(rejected_with(&outcome, 400), "{path}");
    }
    assert_eq!(identity.refresh_calls(), 0);
}

#[tokio::test]
async fn test_missing_header_on_protected_path() {
    let identity = Arc::new(FakeIdentity::new(RefreshBehavior::Unavailable));
    let outcome = evaluate(&identity, Method::GET, "/users/me", &HeaderMap::new()).await;

    match outcome {
        AuthOutcome::Reject(status) => {
            assert_eq!(status.status, 401);
            assert_eq!(status.message, "Authentication required");
        }
        other => panic!("expected rejection, got {other:?}"),
    }
}

#[tokio::test]
async fn test_usable_token_forwarded_without_identity_call() {
    let identity = Arc::new(FakeIdentity::new(RefreshBehavior::Unavailable));
    let access = access_token_at(Role::User, fixed_now(), 600);

    let outcome = evaluate(&identity, Method::GET, "/users/me", &headers(Some(&access), None)).await;

    assert_eq!(outcome, AuthOutcome::Allow);
    assert_eq!(identity.refresh_calls(), 0);
}

#[tokio::test]
async fn test_expired_access_with_valid_refresh_rewrites_headers() {
    let identity = Arc::new(FakeIdentity::issuing(Role::User, fixed_now()));
    let expired = access_token_at(Role::User, fixed_now(), -60);
    let refresh = refresh_token_at(fixed_now(), 86_400);
    let mut request_headers = headers(Some(&expired), Some(&refresh));

    let outcome = evaluate(&identity, Method::POST, "/orders", &request_headers).await;

    let AuthOutcome::AllowWithRewrittenHeaders(pair) = outcome else {
        panic!("expected a refreshed outcome, got {outcome:?}");
    };
    assert_eq!(Some(&pair), identity.issued_pair());
    assert_eq!(identity.refresh_calls(), 1);

    rewrite_credentials(&mut request_headers, &pair).unwrap();
    assert_eq!(
        request_headers[AUTHORIZATION],
        format!("Bearer {}", pair.access_token).as_str()
    );
    assert_eq!(request_headers[REFRESH_TOKEN_HEADER], pair.refresh_token.as_str());
}

#[tokio::test]
async fn test_token_inside_safety_margin_is_refreshed() {
    let identity = Arc::new(FakeIdentity::issuing(Role::User, fixed_now()));
    let almost_expired = access_token_at(Role::User, fixed_now(), 3);
    let refresh = refresh_token_at(fixed_now(), 86_400);

    let outcome = evaluate(
        &identity,
        Method::GET,
        "/users/me",
        &headers(Some(&almost_expired), Some(&refresh)),
    )
    .await;

    assert!(matches!(outcome, AuthOutcome::AllowWithRewrittenHeaders(_)));
    assert_eq!(identity.refresh_calls(), 1);
}

#[tokio::test]
async fn test_unusable_refresh_token_never_reaches_identity() {
    let identity = Arc::new(FakeIdentity::issuing(Role::User, fixed_now()));
    let expired = access_token_at(Role::User, fixed_now(), -60);
    let expired_refresh = refresh_token_at(fixed_now(), -1);
    let forged_refresh = mint_with(FOREIGN_SECRET, "user-42", None, fixed_now().timestamp() + 600);

    for refresh in [Some(expired_refresh.as_str()), Some(forged_refresh.as_str()), Some("junk"), None] {
        let outcome = evaluate(&identity, Method::GET, "/users/me", &headers(Some(&expired), refresh)).await;
        match outcome {
            AuthOutcome::Reject(status) => {
                assert_eq!(status.status, 401);
                assert_eq!(status.message, "Session expired, please sign in again");
            }
            other => panic!("expected rejection, got {other:?}"),
        }
    }
    assert_eq!(identity.refresh_calls(), 0);
}

#[tokio::test]
async fn test_forged_access_token_is_fatal() {
    let identity = Arc::new(FakeIdentity::issuing(Role::User, fixed_now()));
    let forged = mint_with(FOREIGN_SECRET, "user-42", Some(Role::Admin), fixed_now().timestamp() - 60);
    let refresh = refresh_token_at(fixed_now(), 86_400);

    let outcome = evaluate(&identity, Method::GET, "/users/me", &headers(Some(&forged), Some(&refresh))).await;

    assert!(rejected_with(&outcome, 401));
    assert_eq!(identity.refresh_calls(), 0);
}

#[tokio::test]
async fn test_refresh_failures_map_to_status() {
    let expired = access_token_at(Role::User, fixed_now(), -60);
    let refresh = refresh_token_at(fixed_now(), 86_400);
    let request_headers = headers(Some(&expired), Some(&refresh));

    let cases = [
        (RefreshBehavior::Reject(401), 401),
        (RefreshBehavior::Unavailable, 502),
        (RefreshBehavior::Hang, 502),
    ];
    for (behavior, expected) in cases {
        let identity = Arc::new(FakeIdentity::new(behavior));
        let outcome = evaluate(&identity, Method::GET, "/users/me", &request_headers).await;
        assert!(rejected_with(&outcome, expected), "{outcome:?}");
        assert_eq!(identity.refresh_calls(), 1);
    }
}

#[tokio::test]
async fn test_unusable_issued_credential_fails_closed() {
    let issued = TokenPair::new(
        access_token_at(Role::User, fixed_now(), -10),
        refresh_token_at(fixed_now(), 86_400),
    );
    let identity = Arc::new(FakeIdentity::new(RefreshBehavior::Issue(issued)));
    let expired = access_token_at(Role::User, fixed_now(), -60);
    let refresh = refresh_token_at(fixed_now(), 86_400);

    let outcome = evaluate(&identity, Method::GET, "/users/me", &headers(Some(&expired), Some(&refresh))).await;
    assert!(rejected_with(&outcome, 502));
}

#[tokio::test]
async fn test_admin_path_requires_admin_role() {
    let identity = Arc::new(FakeIdentity::new(RefreshBehavior::Unavailable));
    let user = access_token_at(Role::User, fixed_now(), 600);
    let admin = access_token_at(Role::Admin, fixed_now(), 600);

    let denied = evaluate(&identity, Method::GET, "/admin/reports", &headers(Some(&user), None)).await;
    match denied {
        AuthOutcome::Reject(status) => {
            assert_eq!(status.status, 403);
            assert_eq!(status.message, "Access denied");
        }
        other => panic!("expected 403, got {other:?}"),
    }

    let allowed = evaluate(&identity, Method::GET, "/admin/reports", &headers(Some(&admin), None)).await;
    assert_eq!(allowed, AuthOutcome::Allow);
}

#[tokio::test]
async fn test_admin_segment_overrides_public_prefix() {
    let identity = Arc::new(FakeIdentity::new(RefreshBehavior::Unavailable));
    let outcome = evaluate(&identity, Method::GET, "/books/admin/stock", &HeaderMap::new()).await;
    assert!(rejected_with(&outcome, 401));
}

#[tokio::test]
async fn test_refreshed_credential_is_role_checked() {
    let identity = Arc::new(FakeIdentity::issuing(Role::User, fixed_now()));
    let expired_admin = access_token_at(Role::Admin, fixed_now(), -60);
    let refresh = refresh_token_at(fixed_now(), 86_400);

    let outcome = evaluate(
        &identity,
        Method::GET,
        "/admin/reports",
        &headers(Some(&expired_admin), Some(&refresh)),
    )
    .await;

    assert!(rejected_with(&outcome, 403));
    assert_eq!(identity.refresh_calls(), 1);
}
