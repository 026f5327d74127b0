//! Request forwarding to backends

use axum::body::{Body, to_bytes};
use axum::extract::Request;
use axum::http::header::{self, HeaderMap, HeaderName};
use axum::response::Response;
use futures::TryStreamExt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};
use url::Url;

use crate::error::GatewayError;
use crate::observability::GatewayMetrics;
use crate::policy::{Backend, RouteTable};

/// Connection-scoped headers never copied across the hop.
const HOP_BY_HOP: [HeaderName; 9] = [
    header::CONNECTION,
    HeaderName::from_static("keep-alive"),
    header::PROXY_AUTHENTICATE,
    header::PROXY_AUTHORIZATION,
    header::TE,
    header::TRAILER,
    header::TRANSFER_ENCODING,
    header::UPGRADE,
    header::CONTENT_LENGTH,
];

fn copy_end_to_end(source: &HeaderMap) -> HeaderMap {
    let mut headers = source.clone();
    for name in &HOP_BY_HOP {
        headers.remove(name);
    }
    headers
}

fn target_url(backend: &Backend, path: &str, query: Option<&str>) -> Url {
    let mut url = backend.base_url.clone();
    let joined = format!("{}{}", url.path().trim_end_matches('/'), path);
    url.set_path(&joined);
    url.set_query(query);
    url
}

/// Forwards allowed requests to the backend their path routes to.
pub struct Forwarder {
    routes: RouteTable,
    client: reqwest::Client,
    timeout: Duration,
    max_body_bytes: usize,
    metrics: Arc<GatewayMetrics>,
}

impl Forwarder {
    /// Builds a forwarder with one pooled HTTP client.
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client cannot be built.
    pub fn new(
        routes: RouteTable,
        timeout: Duration,
        max_body_bytes: usize,
        metrics: Arc<GatewayMetrics>,
    ) -> Result<Self, GatewayError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .map_err(|e| GatewayError::Internal(e.into()))?;

        Ok(Self {
            routes,
            client,
            timeout,
            max_body_bytes,
            metrics,
        })
    }

    /// Sends `req` to its backend and streams the answer back.
    ///
    /// # Errors
    ///
    /// [`GatewayError::RouteNotFound`] without a matching route,
    /// [`GatewayError::PayloadTooLarge`] above the body limit, and
    /// [`GatewayError::BackendTimeout`] or [`GatewayError::BackendUnavailable`]
    /// when the backend cannot answer.
    pub async fn forward(&self, req: Request) -> Result<Response, GatewayError> {
        let backend = self
            .routes
            .resolve(req.uri().path())
            .ok_or_else(|| GatewayError::RouteNotFound {
                path: req.uri().path().to_string(),
            })?
            .clone();

        let declared_len = req
            .headers()
            .get(header::CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<usize>().ok());
        if declared_len.is_some_and(|len| len > self.max_body_bytes) {
            return Err(GatewayError::PayloadTooLarge {
                limit: self.max_body_bytes,
            });
        }

        let (parts, body) = req.into_parts();
        let body = to_bytes(body, self.max_body_bytes)
            .await
            .map_err(|_| GatewayError::PayloadTooLarge {
                limit: self.max_body_bytes,
            })?;

        let url = target_url(&backend, parts.uri.path(), parts.uri.query());
        let mut headers = copy_end_to_end(&parts.headers);
        headers.remove(header::HOST);
        debug!(backend = %backend.name, url = %url, "Forwarding request");

        let started = Instant::now();
        let result = self
            .client
            .request(parts.method, url)
            .headers(headers)
            .body(body)
            .send()
            .await;

        let upstream = match result {
            Ok(upstream) => upstream,
            Err(err) => return Err(self.transport_failure(&backend, &err, started.elapsed())),
        };

        let status = upstream.status();
        let headers = copy_end_to_end(upstream.headers());
        self.metrics
            .record_forward(&backend.name, status.as_str(), started.elapsed());

        let name = Arc::clone(&backend.name);
        let stream = upstream.bytes_stream().inspect_err(move |err| {
            warn!(backend = %name, error = %err, "Backend response interrupted");
        });
        let mut response = Response::new(Body::from_stream(stream));
        *response.status_mut() = status;
        *response.headers_mut() = headers;
        Ok(response)
    }

    fn transport_failure(
        &self,
        backend: &Backend,
        err: &reqwest::Error,
        elapsed: Duration,
    ) -> GatewayError {
        if err.is_timeout() {
            warn!(backend = %backend.name, "Backend timed out");
            self.metrics.record_forward(&backend.name, "timeout", elapsed);
            GatewayError::BackendTimeout {
                backend: backend.name.to_string(),
                after: self.timeout,
            }
        } else {
            warn!(backend = %backend.name, error = %err, "Backend unavailable");
            self.metrics
                .record_forward(&backend.name, "unavailable", elapsed);
            GatewayError::BackendUnavailable {
                backend: backend.name.to_string(),
            }
        }
    }
}
