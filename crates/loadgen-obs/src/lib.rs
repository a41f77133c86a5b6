//! Observability utilities: per-run request metrics

use std::time::Duration;

use prometheus::{Encoder, Histogram, HistogramOpts, IntCounter, IntCounterVec, Opts, Registry, TextEncoder};

const LATENCY_BUCKETS: &[f64] = &[0.05, 0.1, 0.25, 0.5, 1.0, 2.0, 4.0, 8.0, 16.0, 32.0];

/// Metrics for a single run. Each instance owns its registry, so parallel
/// runs (and tests) never share counters.
#[derive(Clone)]
pub struct RunMetrics {
    registry: Registry,
    requests_total: IntCounterVec,
    latency_seconds: Histogram,
    tokens_total: IntCounter,
}

impl RunMetrics {
    pub fn new() -> prometheus::Result<Self> {
        let registry = Registry::new();
        let requests_total = IntCounterVec::new(
            Opts::new("loadgen_requests_total", "Settled batch requests by outcome"),
            &["outcome"],
        )?;
        let latency_seconds = Histogram::with_opts(
            HistogramOpts::new("loadgen_request_latency_seconds", "Wall-clock latency of successful requests")
                .buckets(LATENCY_BUCKETS.to_vec()),
        )?;
        let tokens_total = IntCounter::new("loadgen_tokens_total", "Total tokens reported by the service")?;
        registry.register(Box::new(requests_total.clone()))?;
        registry.register(Box::new(latency_seconds.clone()))?;
        registry.register(Box::new(tokens_total.clone()))?;
        Ok(Self { registry, requests_total, latency_seconds, tokens_total })
    }

    pub fn record_success(&self, elapsed: Duration, tokens: u64) {
        self.requests_total.with_label_values(&["ok"]).inc();
        self.latency_seconds.observe(elapsed.as_secs_f64());
        self.tokens_total.inc_by(tokens);
    }

    pub fn record_failure(&self) {
        self.requests_total.with_label_values(&["error"]).inc();
    }

    pub fn succeeded(&self) -> u64 {
        self.requests_total.with_label_values(&["ok"]).get()
    }

    pub fn failed(&self) -> u64 {
        self.requests_total.with_label_values(&["error"]).get()
    }

    /// Prometheus text exposition of everything recorded so far.
    pub fn render(&self) -> String {
        let mut buffer = Vec::new();
        if let Err(e) = TextEncoder::new().encode(&self.registry.gather(), &mut buffer) {
            tracing::warn!(target: "obs", "failed to encode metrics: {}", e);
        }
        String::from_utf8_lossy(&buffer).into_owned()
    }
}
