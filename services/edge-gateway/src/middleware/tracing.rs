//! Correlation Tower Layer
//!
//! Assigns or propagates `X-Correlation-Id` on every request and response and
//! runs the rest of the stack inside a per-request span.

use std::task::{Context, Poll};
use std::time::Instant;

use axum::http::{HeaderName, HeaderValue, Request, Response};
use futures::future::BoxFuture;
use tower::{Layer, Service};
use tracing::{Instrument, error, info, info_span};
use uuid::Uuid;

/// Correlation header name.
pub static CORRELATION_ID_HEADER: HeaderName = HeaderName::from_static("x-correlation-id");

const MAX_CORRELATION_ID_LEN: usize = 128;

/// Accepts caller-supplied ids only when they are short and log-safe.
fn inbound_correlation_id(value: &HeaderValue) -> Option<&str> {
    value.to_str().ok().filter(|id| {
        !id.is_empty()
            && id.len() <= MAX_CORRELATION_ID_LEN
            && id
                .bytes()
                .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_')
    })
}

/// Correlation layer for Tower
#[derive(Debug, Clone, Default)]
pub struct CorrelationLayer;

impl CorrelationLayer {
    /// Creates a new correlation layer
    pub const fn new() -> Self {
        Self
    }
}

impl<S> Layer<S> for CorrelationLayer {
    type Service = CorrelationService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        CorrelationService { inner }
    }
}

/// Correlation service wrapper
#[derive(Debug, Clone)]
pub struct CorrelationService<S> {
    inner: S,
}

impl<S, ReqBody, ResBody> Service<Request<ReqBody>> for CorrelationService<S>
where
    S: Service<Request<ReqBody>, Response = Response<ResBody>> + Clone + Send + 'static,
    S::Error: std::fmt::Display + Send + 'static,
    S::Future: Send + 'static,
    ReqBody: Send + 'static,
    ResBody: Send + 'static,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = BoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut req: Request<ReqBody>) -> Self::Future {
        let correlation_id = req
            .headers()
            .get(&CORRELATION_ID_HEADER)
            .and_then(inbound_correlation_id)
            .map_or_else(|| Uuid::new_v4().to_string(), str::to_string);
        let header_value = HeaderValue::from_str(&correlation_id).ok();
        if let Some(value) = &header_value {
            req.headers_mut()
                .insert(CORRELATION_ID_HEADER.clone(), value.clone());
        }

        let span = info_span!(
            "request",
            correlation_id = %correlation_id,
            method = %req.method(),
            path = %req.uri().path(),
        );

        // The ready service is the one that must handle the call.
        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);

        Box::pin(
            async move {
                let started = Instant::now();
                match inner.call(req).await {
                    Ok(mut response) => {
                        if let Some(value) = header_value {
                            response
                                .headers_mut()
                                .insert(CORRELATION_ID_HEADER.clone(), value);
                        }
                        info!(
                            status = response.status().as_u16(),
                            latency_ms = started.elapsed().as_millis(),
                            "Request completed"
                        );
                        Ok(response)
                    }
                    Err(err) => {
                        error!(error = %err, "Request failed");
                        Err(err)
                    }
                }
            }
            .instrument(span),
        )
    }
}
