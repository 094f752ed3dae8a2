//! Prometheus metrics registry for the daily-close service.
//!
//! [`AppMetrics`] owns all registered metrics and the [`Registry`] they
//! belong to. Construct it once at startup, wrap in `Arc`, and pass it
//! to the orchestrator and HTTP layer.
//!
//! Exposed at `GET /metrics` in Prometheus text exposition format.

use prometheus::{Counter, CounterVec, Encoder, Histogram, HistogramOpts, Opts, Registry, TextEncoder};

/// All application-level Prometheus metrics.
pub struct AppMetrics {
    /// Total pipeline runs started (scheduled + manual + backfill).
    pub runs_started_total: Counter,
    /// Total pipeline runs that reached the failed terminal state.
    pub runs_failed_total: Counter,
    /// Total ledger legs actually inserted.
    pub ledger_entries_created_total: Counter,
    /// Total anomaly alert rows created (reconciliation + rules).
    pub alerts_created_total: Counter,
    /// HTTP request count, labelled by method, path, and status code.
    pub http_requests_total: CounterVec,
    /// HTTP request latency histogram in seconds.
    pub http_request_duration: Histogram,
    /// The registry that owns all of the above metrics.
    pub registry: Registry,
}

impl AppMetrics {
    /// Create and register all metrics. Returns an error if any metric
    /// name is invalid or duplicated (should not happen in practice).
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let runs_started_total = Counter::with_opts(Opts::new(
            "daily_close_runs_started_total",
            "Pipeline runs started",
        ))?;

        let runs_failed_total = Counter::with_opts(Opts::new(
            "daily_close_runs_failed_total",
            "Pipeline runs that failed",
        ))?;

        let ledger_entries_created_total = Counter::with_opts(Opts::new(
            "daily_close_ledger_entries_created_total",
            "Ledger legs inserted",
        ))?;

        let alerts_created_total = Counter::with_opts(Opts::new(
            "daily_close_alerts_created_total",
            "Anomaly alert rows created",
        ))?;

        let http_requests_total = CounterVec::new(
            Opts::new(
                "daily_close_http_requests_total",
                "HTTP requests by method, path, and status",
            ),
            &["method", "path", "status"],
        )?;

        let http_request_duration = Histogram::with_opts(
            HistogramOpts::new(
                "daily_close_http_request_duration_seconds",
                "HTTP request latency in seconds",
            )
            .buckets(vec![0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0]),
        )?;

        registry.register(Box::new(runs_started_total.clone()))?;
        registry.register(Box::new(runs_failed_total.clone()))?;
        registry.register(Box::new(ledger_entries_created_total.clone()))?;
        registry.register(Box::new(alerts_created_total.clone()))?;
        registry.register(Box::new(http_requests_total.clone()))?;
        registry.register(Box::new(http_request_duration.clone()))?;

        Ok(Self {
            runs_started_total,
            runs_failed_total,
            ledger_entries_created_total,
            alerts_created_total,
            http_requests_total,
            http_request_duration,
            registry,
        })
    }

    /// Render all metrics in text exposition format.
    pub fn render(&self) -> Result<String, prometheus::Error> {
        let encoder = TextEncoder::new();
        let families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&families, &mut buffer)?;
        String::from_utf8(buffer).map_err(|err| prometheus::Error::Msg(err.to_string()))
    }
}
