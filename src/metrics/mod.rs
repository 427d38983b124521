//! Prometheus metrics for the prober itself
//!
//! Exposed on the probe server at `/metrics`.

use prometheus::{
    Histogram, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, IntGauge, Opts, Registry,
};
use std::sync::OnceLock;

/// Global metrics registry
static METRICS: OnceLock<Metrics> = OnceLock::new();

/// Get the global metrics instance
pub fn metrics() -> &'static Metrics {
    METRICS.get_or_init(Metrics::new)
}

/// Prober metrics collection
pub struct Metrics {
    /// Registry for all metrics
    pub registry: Registry,

    // Poll loop metrics
    /// Poll cycles by result (changed, unchanged, no_success, transport_error, idle)
    pub poll_cycles_total: IntCounterVec,
    /// Poll cycle latency histogram (in seconds)
    pub poll_duration_seconds: Histogram,
    /// Addresses in the current view
    pub known_nodes: IntGauge,
    /// Nodes removed by the stale reaper
    pub evictions_total: IntCounter,
    /// Credential variant flips
    pub credential_toggles_total: IntCounter,

    // HTTP metrics
    /// Requests by route and status code
    pub http_requests_total: IntCounterVec,
    /// Response time by route (in seconds)
    pub http_response_time_seconds: HistogramVec,
}

impl Metrics {
    /// Create a new metrics collection
    pub fn new() -> Self {
        let registry = Registry::new();

        let poll_cycles_total = IntCounterVec::new(
            Opts::new("cassprober_poll_cycles_total", "Total number of poll cycles by result"),
            &["result"],
        )
        .unwrap();

        let poll_duration_seconds = Histogram::with_opts(
            HistogramOpts::new(
                "cassprober_poll_duration_seconds",
                "Poll cycle latency in seconds",
            )
            .buckets(vec![0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0]),
        )
        .unwrap();

        let known_nodes = IntGauge::new(
            "cassprober_known_nodes",
            "Current number of known node addresses",
        )
        .unwrap();

        let evictions_total = IntCounter::new(
            "cassprober_evictions_total",
            "Total number of stale nodes evicted",
        )
        .unwrap();

        let credential_toggles_total = IntCounter::new(
            "cassprober_credential_toggles_total",
            "Total number of switches between file and fallback credentials",
        )
        .unwrap();

        let http_requests_total = IntCounterVec::new(
            Opts::new("cassprober_http_requests_total", "Total number of HTTP requests"),
            &["path", "status"],
        )
        .unwrap();

        let http_response_time_seconds = HistogramVec::new(
            HistogramOpts::new(
                "cassprober_http_response_time_seconds",
                "HTTP response time in seconds",
            )
            .buckets(vec![0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 2.5, 5.0]),
            &["path"],
        )
        .unwrap();

        // Register all metrics
        registry
            .register(Box::new(poll_cycles_total.clone()))
            .unwrap();
        registry
            .register(Box::new(poll_duration_seconds.clone()))
            .unwrap();
        registry.register(Box::new(known_nodes.clone())).unwrap();
        registry
            .register(Box::new(evictions_total.clone()))
            .unwrap();
        registry
            .register(Box::new(credential_toggles_total.clone()))
            .unwrap();
        registry
            .register(Box::new(http_requests_total.clone()))
            .unwrap();
        registry
            .register(Box::new(http_response_time_seconds.clone()))
            .unwrap();

        Self {
            registry,
            poll_cycles_total,
            poll_duration_seconds,
            known_nodes,
            evictions_total,
            credential_toggles_total,
            http_requests_total,
            http_response_time_seconds,
        }
    }

    /// Record a finished poll cycle
    pub fn record_poll_cycle(&self, result: &str, duration_secs: f64) {
        self.poll_cycles_total.with_label_values(&[result]).inc();
        self.poll_duration_seconds.observe(duration_secs);
    }

    pub fn set_known_nodes(&self, count: usize) {
        self.known_nodes.set(count as i64);
    }

    pub fn record_evictions(&self, count: usize) {
        self.evictions_total.inc_by(count as u64);
    }

    pub fn record_credential_toggle(&self) {
        self.credential_toggles_total.inc();
    }

    /// Record a served HTTP request
    pub fn record_http_request(&self, path: &str, status: u16, duration_secs: f64) {
        self.http_requests_total
            .with_label_values(&[path, &status.to_string()])
            .inc();
        self.http_response_time_seconds
            .with_label_values(&[path])
            .observe(duration_secs);
    }

    /// Get metrics as Prometheus text format
    pub fn gather(&self) -> String {
        use prometheus::Encoder;
        let encoder = prometheus::TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        if encoder.encode(&metric_families, &mut buffer).is_err() {
            return String::new();
        }
        String::from_utf8(buffer).unwrap_or_default()
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}
