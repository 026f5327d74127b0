//! Gateway Prometheus metrics
//!
//! Each [`GatewayMetrics`] owns its own registry, so tests can build as many
//! as they like without name clashes.

use prometheus::{CounterVec, Encoder, HistogramOpts, HistogramVec, Opts, Registry, TextEncoder};
use std::time::Duration;

const NAMESPACE: &str = "edge_gateway";

/// Decision, forwarding and latency metrics
#[derive(Clone)]
pub struct GatewayMetrics {
    registry: Registry,
    /// Filter decisions by outcome
    pub auth_decisions: CounterVec,
    /// Forwarded requests by backend and upstream status
    pub forwarded_requests: CounterVec,
    /// Forward latency by backend
    pub forward_latency: HistogramVec,
}

impl GatewayMetrics {
    /// Creates and registers the metric families.
    ///
    /// # Errors
    ///
    /// Returns error if a family cannot be registered.
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let auth_decisions = CounterVec::new(
            Opts::new("auth_decisions_total", "Edge filter decisions").namespace(NAMESPACE),
            &["decision"],
        )?;
        registry.register(Box::new(auth_decisions.clone()))?;

        let forwarded_requests = CounterVec::new(
            Opts::new("forwarded_requests_total", "Requests forwarded to backends")
                .namespace(NAMESPACE),
            &["backend", "status"],
        )?;
        registry.register(Box::new(forwarded_requests.clone()))?;

        let forward_latency = HistogramVec::new(
            HistogramOpts::new("forward_latency_seconds", "Backend round-trip latency")
                .namespace(NAMESPACE)
                .buckets(vec![0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0]),
            &["backend"],
        )?;
        registry.register(Box::new(forward_latency.clone()))?;

        Ok(Self {
            registry,
            auth_decisions,
            forwarded_requests,
            forward_latency,
        })
    }

    /// Records one filter decision
    pub fn record_decision(&self, decision: &str) {
        self.auth_decisions.with_label_values(&[decision]).inc();
    }

    /// Records one forward attempt; `status` is the upstream status or a
    /// gateway failure label
    pub fn record_forward(&self, backend: &str, status: &str, elapsed: Duration) {
        self.forwarded_requests
            .with_label_values(&[backend, status])
            .inc();
        self.forward_latency
            .with_label_values(&[backend])
            .observe(elapsed.as_secs_f64());
    }

    /// Prometheus text exposition of every family.
    ///
    /// # Errors
    ///
    /// Returns error if encoding fails.
    pub fn render(&self) -> Result<String, prometheus::Error> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}
