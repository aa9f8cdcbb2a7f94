//! Prometheus metrics for the token trust engine.
//!
//! Metrics are registered against a caller-supplied registry and injected
//! into each component's constructor, so tests get isolated registries
//! instead of fighting over a process-wide one.

use prometheus::{
    HistogramOpts, HistogramVec, IntCounter, IntCounterVec, IntGauge, Opts, Registry,
};
use std::time::Duration;

/// Operation outcome labels used across the crate.
pub mod outcome {
    /// The operation completed as intended.
    pub const SUCCESS: &str = "success";
    /// The operation failed.
    pub const ERROR: &str = "error";
    /// A binding existed but disagreed with the presented value.
    pub const MISMATCH: &str = "mismatch";
    /// A binding was persisted for the first time.
    pub const FIRST_USE: &str = "first_use";
}

/// Observability sink consumed by every component.
pub struct SecurityMetrics {
    /// Operation outcomes by operation name and outcome.
    pub operations_total: IntCounterVec,
    /// Operation latency by operation name.
    pub operation_duration_seconds: HistogramVec,
    /// Key rotations performed.
    pub key_rotations_total: IntCounter,
    /// Key rotation failures.
    pub key_rotation_failures_total: IntCounter,
    /// Blacklist entries currently held by the in-memory store.
    pub blacklist_size: IntGauge,
    /// Blacklist lookups by result (`hit`/`miss`).
    pub blacklist_lookups_total: IntCounterVec,
}

impl SecurityMetrics {
    /// Create metrics and register them on the given registry.
    ///
    /// # Errors
    ///
    /// Returns an error if a metric with the same name is already
    /// registered on the registry.
    pub fn new(registry: &Registry) -> Result<Self, prometheus::Error> {
        let operations_total = IntCounterVec::new(
            Opts::new(
                "token_guard_operations_total",
                "Operation outcomes by operation and outcome",
            ),
            &["operation", "outcome"],
        )?;
        registry.register(Box::new(operations_total.clone()))?;

        let operation_duration_seconds = HistogramVec::new(
            HistogramOpts::new(
                "token_guard_operation_duration_seconds",
                "Operation latency in seconds",
            )
            .buckets(vec![
                0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0,
            ]),
            &["operation"],
        )?;
        registry.register(Box::new(operation_duration_seconds.clone()))?;

        let key_rotations_total = IntCounter::new(
            "token_guard_key_rotations_total",
            "Total number of key rotations performed",
        )?;
        registry.register(Box::new(key_rotations_total.clone()))?;

        let key_rotation_failures_total = IntCounter::new(
            "token_guard_key_rotation_failures_total",
            "Total number of failed key rotation attempts",
        )?;
        registry.register(Box::new(key_rotation_failures_total.clone()))?;

        let blacklist_size = IntGauge::new(
            "token_guard_blacklist_size",
            "Entries currently held by the in-memory blacklist",
        )?;
        registry.register(Box::new(blacklist_size.clone()))?;

        let blacklist_lookups_total = IntCounterVec::new(
            Opts::new(
                "token_guard_blacklist_lookups_total",
                "Blacklist lookups by result",
            ),
            &["result"],
        )?;
        registry.register(Box::new(blacklist_lookups_total.clone()))?;

        Ok(Self {
            operations_total,
            operation_duration_seconds,
            key_rotations_total,
            key_rotation_failures_total,
            blacklist_size,
            blacklist_lookups_total,
        })
    }

    /// Metrics bound to a private registry. Used by tests and by callers
    /// that do not scrape.
    #[must_use]
    pub fn unregistered() -> Self {
        Self::new(&Registry::new()).expect("fresh registry cannot collide")
    }

    /// Record an operation outcome.
    pub fn record_outcome(&self, operation: &str, outcome: &str) {
        self.operations_total
            .with_label_values(&[operation, outcome])
            .inc();
    }

    /// Record an operation outcome together with its duration.
    pub fn record_operation(&self, operation: &str, outcome: &str, duration: Duration) {
        self.record_outcome(operation, outcome);
        self.operation_duration_seconds
            .with_label_values(&[operation])
            .observe(duration.as_secs_f64());
    }

    /// Record a completed key rotation.
    pub fn record_rotation(&self) {
        self.key_rotations_total.inc();
    }

    /// Record a failed key rotation attempt.
    pub fn record_rotation_failure(&self) {
        self.key_rotation_failures_total.inc();
    }

    /// Record a blacklist lookup result.
    pub fn record_blacklist_lookup(&self, hit: bool) {
        let result = if hit { "hit" } else { "miss" };
        self.blacklist_lookups_total
            .with_label_values(&[result])
            .inc();
    }
}
