use prometheus::{HistogramVec, IntCounterVec, Opts, Registry};

/// Prometheus metrics tracked by the Room reconciler, scraped from
/// `/metrics` via [`crate::metrics::run_server`]. Field names match the
/// call sites in `room::reconcile`.
#[derive(Clone)]
pub struct ControllerMetrics {
    pub registry: Registry,
    pub reconcile_counter: IntCounterVec,
    pub read_histogram: HistogramVec,
    pub write_histogram: HistogramVec,
    pub action_counter: IntCounterVec,
}

impl ControllerMetrics {
    pub fn new(namespace: &str) -> Self {
        let registry = Registry::new();

        let reconcile_counter = IntCounterVec::new(
            Opts::new("reconcile_total", "Total number of reconciliations").namespace(namespace),
            &["name", "namespace"],
        )
        .expect("valid reconcile_total metric");

        let read_histogram = HistogramVec::new(
            prometheus::HistogramOpts::new(
                "reconcile_read_duration_seconds",
                "Duration of the read phase of a reconcile",
            )
            .namespace(namespace),
            &["name", "namespace", "action"],
        )
        .expect("valid reconcile_read_duration_seconds metric");

        let write_histogram = HistogramVec::new(
            prometheus::HistogramOpts::new(
                "reconcile_write_duration_seconds",
                "Duration of the write phase of a reconcile",
            )
            .namespace(namespace),
            &["name", "namespace", "action"],
        )
        .expect("valid reconcile_write_duration_seconds metric");

        let action_counter = IntCounterVec::new(
            Opts::new("reconcile_action_total", "Count of actions taken per reconcile")
                .namespace(namespace),
            &["name", "namespace", "action"],
        )
        .expect("valid reconcile_action_total metric");

        registry
            .register(Box::new(reconcile_counter.clone()))
            .expect("register reconcile_counter");
        registry
            .register(Box::new(read_histogram.clone()))
            .expect("register read_histogram");
        registry
            .register(Box::new(write_histogram.clone()))
            .expect("register write_histogram");
        registry
            .register(Box::new(action_counter.clone()))
            .expect("register action_counter");

        Self {
            registry,
            reconcile_counter,
            read_histogram,
            write_histogram,
            action_counter,
        }
    }
}
