//! Metrics collection and export module

use prometheus::{
    Encoder, Histogram, HistogramOpts, IntCounter, IntCounterVec, IntGauge, Opts, Registry,
    TextEncoder,
};

/// Engine-wide Prometheus metrics
pub struct Metrics {
    registry: Registry,

    // Dispatcher
    pub rpc_dispatches: IntCounter,
    pub rate_limit_retries: IntCounter,
    pub rpc_in_flight: IntGauge,
    pub rpc_latency: Histogram,

    // Submitter
    pub submissions_started: IntCounter,
    pub submissions_landed: IntCounter,
    pub submissions_failed: IntCounter,
    pub submission_retries: IntCounter,
    pub idempotent_short_circuits: IntCounter,

    // Confirmation, labelled by method and outcome
    pub confirmations: IntCounterVec,
    pub active_subscriptions: IntGauge,

    // Relay
    pub bundles_sent: IntCounter,
    pub bundles_failed: IntCounter,
    pub relay_rotations: IntCounter,
}

impl Metrics {
    /// Create new metrics instance
    pub fn new() -> anyhow::Result<Self> {
        let registry = Registry::new();

        let rpc_dispatches = IntCounter::with_opts(Opts::new(
            "rpc_dispatches_total",
            "RPC calls issued through the dispatcher",
        ))?;

        let rate_limit_retries = IntCounter::with_opts(Opts::new(
            "rpc_rate_limit_retries_total",
            "Dispatcher retries caused by provider rate limiting",
        ))?;

        let rpc_in_flight =
            IntGauge::with_opts(Opts::new("rpc_in_flight", "RPC calls currently in flight"))?;

        let rpc_latency = Histogram::with_opts(
            HistogramOpts::new("rpc_latency_seconds", "RPC call latency")
                .buckets(vec![0.005, 0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0]),
        )?;

        let submissions_started = IntCounter::with_opts(Opts::new(
            "submissions_started_total",
            "Logical transactions handed to the submitter",
        ))?;

        let submissions_landed = IntCounter::with_opts(Opts::new(
            "submissions_landed_total",
            "Logical transactions confirmed at the requested commitment",
        ))?;

        let submissions_failed = IntCounter::with_opts(Opts::new(
            "submissions_failed_total",
            "Logical transactions that ended in a terminal error",
        ))?;

        let submission_retries = IntCounter::with_opts(Opts::new(
            "submission_retries_total",
            "Resend attempts after a failed attempt",
        ))?;

        let idempotent_short_circuits = IntCounter::with_opts(Opts::new(
            "submission_idempotent_hits_total",
            "Prior attempts found already confirmed before resending",
        ))?;

        let confirmations = IntCounterVec::new(
            Opts::new("confirmations_total", "Confirmation watches by method and outcome"),
            &["method", "outcome"],
        )?;

        let active_subscriptions = IntGauge::with_opts(Opts::new(
            "signature_subscriptions_active",
            "Open signature notification subscriptions",
        ))?;

        let bundles_sent =
            IntCounter::with_opts(Opts::new("bundles_sent_total", "Bundles accepted by a relay"))?;

        let bundles_failed = IntCounter::with_opts(Opts::new(
            "bundles_failed_total",
            "Bundle submissions that ended in an error",
        ))?;

        let relay_rotations = IntCounter::with_opts(Opts::new(
            "relay_rotations_total",
            "Relay endpoint rotations after a rate-limit rejection",
        ))?;

        // Register all metrics
        registry.register(Box::new(rpc_dispatches.clone()))?;
        registry.register(Box::new(rate_limit_retries.clone()))?;
        registry.register(Box::new(rpc_in_flight.clone()))?;
        registry.register(Box::new(rpc_latency.clone()))?;
        registry.register(Box::new(submissions_started.clone()))?;
        registry.register(Box::new(submissions_landed.clone()))?;
        registry.register(Box::new(submissions_failed.clone()))?;
        registry.register(Box::new(submission_retries.clone()))?;
        registry.register(Box::new(idempotent_short_circuits.clone()))?;
        registry.register(Box::new(confirmations.clone()))?;
        registry.register(Box::new(active_subscriptions.clone()))?;
        registry.register(Box::new(bundles_sent.clone()))?;
        registry.register(Box::new(bundles_failed.clone()))?;
        registry.register(Box::new(relay_rotations.clone()))?;

        Ok(Self {
            registry,
            rpc_dispatches,
            rate_limit_retries,
            rpc_in_flight,
            rpc_latency,
            submissions_started,
            submissions_landed,
            submissions_failed,
            submission_retries,
            idempotent_short_circuits,
            confirmations,
            active_subscriptions,
            bundles_sent,
            bundles_failed,
            relay_rotations,
        })
    }

    /// Get the registry for exporting
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn record_confirmation(&self, method: &str, outcome: &str) {
        self.confirmations.with_label_values(&[method, outcome]).inc();
    }

    /// Render all metrics in the Prometheus text exposition format
    pub fn gather_text(&self) -> anyhow::Result<String> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        Ok(String::from_utf8(buffer)?)
    }
}

/// Global metrics instance
pub fn metrics() -> &'static Metrics {
    static METRICS: once_cell::sync::Lazy<Metrics> =
        once_cell::sync::Lazy::new(|| Metrics::new().expect("Failed to initialize metrics"));
    &METRICS
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gather_text_contains_registered_metrics() {
        let m = Metrics::new().unwrap();
        m.rpc_dispatches.inc();
        m.record_confirmation("push", "confirmed");

        let text = m.gather_text().unwrap();
        assert!(text.contains("rpc_dispatches_total 1"));
        assert!(text.contains("confirmations_total{method=\"push\",outcome=\"confirmed\"} 1"));
    }
}
