//! Path Classifier Unit Tests
//!
//! Classification of the built-in bookstore policy and rule-table checks.

use axum::http::Method;

use edge_gateway::config::ConfigError;
use edge_gateway::policy::{
    ExclusionRule, GatewayPolicy, MalformedHeaderPolicy, PathClass, PathClassifier, PathMatcher,
};

fn builtin() -> PathClassifier {
    GatewayPolicy::load(None).unwrap().classifier
}

const FORWARD: PathClass = PathClass::ConditionallyExempt {
    on_malformed: MalformedHeaderPolicy::Forward,
};

#[test]
fn test_builtin_exempt_paths() {
    let classifier = builtin();
    for path in [
        "/auth/login",
        "/auth/refresh",
        "/auth/logout",
        "/auth/dormant/unlock",
        "/books",
        "/books/42",
        "/books/categories/root",
        "/books/likes/books/7",
        "/users/check-email",
        "/users/sign-up",
        "/users/find/password",
        "/users/cart-books/3",
        "/policies/returns",
    ] {
        assert_eq!(classifier.classify(&Method::GET, path), PathClass::Exempt, "{path}");
    }
}

#[test]
fn test_builtin_conditional_paths() {
    let classifier = builtin();
    assert_eq!(classifier.classify(&Method::POST, "/orders"), FORWARD);
    assert_eq!(classifier.classify(&Method::GET, "/reviews/books/5"), FORWARD);
    assert_eq!(classifier.classify(&Method::POST, "/payments"), FORWARD);
    assert_eq!(classifier.classify(&Method::GET, "/books/likes/5/exist"), FORWARD);
    for path in [
        "/orders/none/17",
        "/orders/99/delivery",
        "/members/orders/99/delivery/status",
    ] {
        assert_eq!(classifier.classify(&Method::GET, path), FORWARD, "{path}");
    }
    assert_eq!(
        classifier.classify(&Method::GET, "/coupons"),
        PathClass::ConditionallyExempt {
            on_malformed: MalformedHeaderPolicy::Reject,
        }
    );
}

#[test]
fn test_builtin_protected_paths() {
    let classifier = builtin();
    for (method, path) in [
        (Method::GET, "/orders"),
        (Method::GET, "/users/me"),
        (Method::POST, "/books/likes/5"),
        (Method::GET, "/booksale"),
        (Method::GET, "/auth/login/extra"),
        (Method::GET, "/coupons/mine"),
    ] {
        assert_eq!(classifier.classify(&method, path), PathClass::RequiresAuth, "{path}");
    }
}

#[test]
fn test_privileged_segment_is_exact_segment() {
    let classifier = builtin();
    assert_eq!(classifier.classify(&Method::GET, "/admin"), PathClass::RequiresAdmin);
    assert_eq!(
        classifier.classify(&Method::GET, "/books/admin/stock"),
        PathClass::RequiresAdmin
    );
    assert_eq!(
        classifier.classify(&Method::GET, "/policies/administrator"),
        PathClass::Exempt
    );
}

#[test]
fn test_exact_beats_prefix_and_pattern() {
    let classifier = PathClassifier::new(
        vec![
            ExclusionRule::new(PathMatcher::pattern("/shop/.*").unwrap(), PathClass::RequiresAuth),
            ExclusionRule::new(PathMatcher::Prefix("/shop".into()), PathClass::RequiresAuth),
            ExclusionRule::new(PathMatcher::Exact("/shop/open".into()), PathClass::Exempt),
        ],
        None,
    )
    .unwrap();

    assert_eq!(classifier.classify(&Method::GET, "/shop/open"), PathClass::Exempt);
    assert_eq!(classifier.classify(&Method::GET, "/shop/closed"), PathClass::RequiresAuth);
}

#[test]
fn test_patterns_are_anchored() {
    let classifier = PathClassifier::new(
        vec![ExclusionRule::new(
            PathMatcher::pattern(r"/books/\d+").unwrap(),
            PathClass::Exempt,
        )],
        None,
    )
    .unwrap();

    assert_eq!(classifier.classify(&Method::GET, "/books/12"), PathClass::Exempt);
    assert_eq!(classifier.classify(&Method::GET, "/books/12/reviews"), PathClass::RequiresAuth);
    assert_eq!(classifier.classify(&Method::GET, "/x/books/12"), PathClass::RequiresAuth);
}

#[test]
fn test_duplicate_rules_rejected() {
    let result = PathClassifier::new(
        vec![
            ExclusionRule::new(PathMatcher::Prefix("/payments".into()), PathClass::Exempt),
            ExclusionRule::new(PathMatcher::Prefix("/payments".into()), PathClass::RequiresAuth)
                .with_methods(vec![Method::POST]),
        ],
        None,
    );
    assert!(matches!(result, Err(ConfigError::AmbiguousRules { .. })));
}

#[test]
fn test_no_privileged_segment_configured() {
    let classifier = PathClassifier::new(Vec::new(), None).unwrap();
    assert_eq!(classifier.classify(&Method::GET, "/admin"), PathClass::RequiresAuth);
}
