//! Router assembly
//!
//! Gateway endpoints under `/_gateway` answer directly. Every other request
//! goes through the edge filter and, when allowed, to its backend.

use axum::extract::{Request, State};
use axum::http::header::{AUTHORIZATION, CONTENT_TYPE};
use axum::http::{HeaderName, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router, middleware};
use secrecy::ExposeSecret;
use serde_json::json;
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::sensitive_headers::SetSensitiveRequestHeadersLayer;

use crate::config::{Config, RoleLookup};
use crate::error::GatewayError;
use crate::filter::{EdgeFilter, REFRESH_TOKEN_HEADER};
use crate::guard::{RoleGuard, RoleSource};
use crate::identity::IdentityClient;
use crate::jwt::{CredentialValidator, TokenCodec};
use crate::middleware::{CorrelationLayer, authenticate};
use crate::observability::GatewayMetrics;
use crate::policy::GatewayPolicy;
use crate::proxy::Forwarder;
use crate::refresh::RefreshCoordinator;

/// Shared, immutable per-process state.
#[derive(Clone)]
pub struct AppState {
    /// Authentication pipeline
    pub filter: Arc<EdgeFilter>,
    /// Backend forwarder
    pub forwarder: Arc<Forwarder>,
    /// Metrics registry
    pub metrics: Arc<GatewayMetrics>,
}

impl AppState {
    /// Wires the pipeline from configuration, the compiled policy and an
    /// identity client.
    ///
    /// # Errors
    ///
    /// Returns error if the secret is too weak or a client cannot be built.
    pub fn new(
        config: &Config,
        policy: GatewayPolicy,
        identity: Arc<dyn IdentityClient>,
    ) -> Result<Self, GatewayError> {
        let codec = TokenCodec::new(config.jwt_secret.expose_secret().as_bytes())?;
        let validator = CredentialValidator::new(Arc::new(codec));
        let refresher = RefreshCoordinator::new(Arc::clone(&identity), config.identity_timeout());

        let source = match config.role_lookup {
            RoleLookup::Claims => RoleSource::Claims,
            RoleLookup::Identity => RoleSource::Identity {
                client: identity,
                timeout: config.identity_timeout(),
            },
        };
        let guard = RoleGuard::new(config.admin_role.clone(), source);

        let metrics = Arc::new(
            GatewayMetrics::new().map_err(|e| GatewayError::Internal(e.into()))?,
        );
        let forwarder = Forwarder::new(
            policy.routes,
            config.backend_timeout(),
            config.max_body_bytes,
            Arc::clone(&metrics),
        )?;

        Ok(Self {
            filter: Arc::new(EdgeFilter::new(policy.classifier, validator, refresher, guard)),
            forwarder: Arc::new(forwarder),
            metrics,
        })
    }
}

async fn health() -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "service": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

async fn metrics(State(state): State<AppState>) -> Response {
    match state.metrics.render() {
        Ok(body) => (
            StatusCode::OK,
            [(CONTENT_TYPE, "text/plain; version=0.0.4")],
            body,
        )
            .into_response(),
        Err(err) => GatewayError::Internal(err.into()).into_response(),
    }
}

async fn forward(State(state): State<AppState>, req: Request) -> Response {
    match state.forwarder.forward(req).await {
        Ok(response) => response,
        Err(err) => err.into_response(),
    }
}

/// Builds the gateway router.
pub fn build_router(state: AppState) -> Router {
    let gated = ServiceBuilder::new()
        .layer(middleware::from_fn_with_state(state.clone(), authenticate))
        .service(
            Router::new()
                .fallback(forward)
                .with_state(state.clone()),
        );

    Router::new()
        .route("/_gateway/health", get(health))
        .route("/_gateway/metrics", get(metrics))
        .fallback_service(gated)
        .layer(SetSensitiveRequestHeadersLayer::new([
            AUTHORIZATION,
            HeaderName::from_static(REFRESH_TOKEN_HEADER),
        ]))
        .layer(CorrelationLayer::new())
        .with_state(state)
}
