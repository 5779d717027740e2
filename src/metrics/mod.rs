// Private module declaration
mod server;

use prometheus::{HistogramOpts, HistogramVec, IntCounter, IntCounterVec, Opts, Registry};

// Re-export for public API
pub use server::start_metrics_server;

// ============================================================================
// Metrics Module - Prometheus metrics for the order lifecycle engine
// ============================================================================
//
// Provides metrics for:
// - Status transitions (throughput by edge, latency, rejections)
// - Batch executions and per-item outcomes
// - Aggregate statistics writes and version conflicts
// - Storage failures
//
// All metrics are registered with Prometheus and can be scraped via /metrics
// ============================================================================

pub struct Metrics {
    registry: Registry,

    // Transition Metrics
    pub transitions_total: IntCounterVec,
    pub transition_rejections_total: IntCounterVec,
    pub transition_duration: HistogramVec,

    // Batch Metrics
    pub batch_runs_total: IntCounter,
    pub batch_items_total: IntCounterVec,

    // Aggregate Metrics
    pub aggregate_updates_total: IntCounter,
    pub aggregate_conflicts_total: IntCounter,
    pub aggregate_updates_abandoned_total: IntCounter,

    // Storage Metrics
    pub storage_errors_total: IntCounterVec,
}

impl Metrics {
    pub fn new() -> anyhow::Result<Self> {
        let registry = Registry::new();

        let transitions_total = IntCounterVec::new(
            Opts::new("order_transitions_total", "Successful order status transitions"),
            &["from", "to"],
        )?;
        registry.register(Box::new(transitions_total.clone()))?;

        let transition_rejections_total = IntCounterVec::new(
            Opts::new("order_transition_rejections_total", "Rejected transition requests"),
            &["reason"],
        )?;
        registry.register(Box::new(transition_rejections_total.clone()))?;

        let transition_duration = HistogramVec::new(
            HistogramOpts::new("order_transition_duration_seconds", "Single transition duration")
                .buckets(vec![0.0005, 0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0]),
            &["outcome"],
        )?;
        registry.register(Box::new(transition_duration.clone()))?;

        let batch_runs_total = IntCounter::new(
            "order_batch_runs_total",
            "Batch transition calls that ran to completion",
        )?;
        registry.register(Box::new(batch_runs_total.clone()))?;

        let batch_items_total = IntCounterVec::new(
            Opts::new("order_batch_items_total", "Batch items by outcome"),
            &["outcome"],
        )?;
        registry.register(Box::new(batch_items_total.clone()))?;

        let aggregate_updates_total = IntCounter::new(
            "aggregate_updates_total",
            "Aggregate statistics writes accepted",
        )?;
        registry.register(Box::new(aggregate_updates_total.clone()))?;

        let aggregate_conflicts_total = IntCounter::new(
            "aggregate_version_conflicts_total",
            "Aggregate writes rejected for presenting a stale version",
        )?;
        registry.register(Box::new(aggregate_conflicts_total.clone()))?;

        let aggregate_updates_abandoned_total = IntCounter::new(
            "aggregate_updates_abandoned_total",
            "Aggregate updates given up after exhausting retries",
        )?;
        registry.register(Box::new(aggregate_updates_abandoned_total.clone()))?;

        let storage_errors_total = IntCounterVec::new(
            Opts::new("storage_errors_total", "Storage failures surfaced to callers"),
            &["operation"],
        )?;
        registry.register(Box::new(storage_errors_total.clone()))?;

        Ok(Self {
            registry,
            transitions_total,
            transition_rejections_total,
            transition_duration,
            batch_runs_total,
            batch_items_total,
            aggregate_updates_total,
            aggregate_conflicts_total,
            aggregate_updates_abandoned_total,
            storage_errors_total,
        })
    }

    /// Get the Prometheus registry for exposing metrics via HTTP
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn record_transition(&self, from: &str, to: &str, duration_secs: f64) {
        self.transitions_total.with_label_values(&[from, to]).inc();
        self.transition_duration
            .with_label_values(&["success"])
            .observe(duration_secs);
    }

    pub fn record_rejection(&self, reason: &str, duration_secs: f64) {
        self.transition_rejections_total.with_label_values(&[reason]).inc();
        self.transition_duration
            .with_label_values(&["rejected"])
            .observe(duration_secs);
    }

    /// Infrastructure failure; kept out of the business rejection counter.
    pub fn record_transition_error(&self, duration_secs: f64) {
        self.transition_duration
            .with_label_values(&["error"])
            .observe(duration_secs);
    }

    pub fn record_batch(&self, succeeded: usize, failed: usize) {
        self.batch_runs_total.inc();
        self.batch_items_total
            .with_label_values(&["success"])
            .inc_by(succeeded as u64);
        self.batch_items_total
            .with_label_values(&["failure"])
            .inc_by(failed as u64);
    }

    pub fn record_aggregate_update(&self, conflicts: u32) {
        self.aggregate_updates_total.inc();
        self.aggregate_conflicts_total.inc_by(u64::from(conflicts));
    }

    pub fn record_aggregate_abandoned(&self, conflicts: u32) {
        self.aggregate_updates_abandoned_total.inc();
        self.aggregate_conflicts_total.inc_by(u64::from(conflicts));
    }

    pub fn record_storage_error(&self, operation: &str) {
        self.storage_errors_total.with_label_values(&[operation]).inc();
    }
}
