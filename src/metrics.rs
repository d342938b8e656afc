//! Prometheus metrics for the decision pipeline and the stream worker.

use lazy_static::lazy_static;
use prometheus::{CounterVec, Histogram, HistogramOpts, IntCounter, Opts, Registry};

lazy_static! {
    /// Global Prometheus registry for all metrics
    pub static ref PROMETHEUS_REGISTRY: Registry = Registry::new();

    /// Intent messages consumed from the intent stream
    pub static ref INTENTS_CONSUMED_TOTAL: IntCounter = IntCounter::new(
        "guardian_intents_consumed_total",
        "Total intent messages consumed from the intent stream",
    )
    .expect("metric can be created");

    /// Malformed intent messages acknowledged and dropped
    pub static ref INTENTS_MALFORMED_TOTAL: IntCounter = IntCounter::new(
        "guardian_intents_malformed_total",
        "Total intent messages dropped as unparseable",
    )
    .expect("metric can be created");

    /// Decisions rendered, labelled by outcome
    ///
    /// Labels: decision
    pub static ref DECISIONS_TOTAL: CounterVec = CounterVec::new(
        Opts::new("guardian_decisions_total", "Total decisions rendered"),
        &["decision"],
    )
    .expect("metric can be created");

    /// Pipeline invocations that failed (policy load, persistence, stream append)
    pub static ref PIPELINE_FAILURES_TOTAL: IntCounter = IntCounter::new(
        "guardian_pipeline_failures_total",
        "Total pipeline invocations that failed and were left for redelivery",
    )
    .expect("metric can be created");

    /// Approvals resolved by a reviewer, labelled by terminal status
    ///
    /// Labels: status
    pub static ref APPROVALS_RESOLVED_TOTAL: CounterVec = CounterVec::new(
        Opts::new("guardian_approvals_resolved_total", "Total approvals resolved"),
        &["status"],
    )
    .expect("metric can be created");

    /// Wall-clock duration of a full pipeline evaluation
    pub static ref PIPELINE_DURATION_SECONDS: Histogram = Histogram::with_opts(
        HistogramOpts::new(
            "guardian_pipeline_duration_seconds",
            "Duration of a full pipeline evaluation",
        )
        .buckets(vec![0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 2.5, 5.0, 10.0]),
    )
    .expect("metric can be created");
}

/// Register all metrics. Call once at startup.
pub fn init_metrics() -> Result<(), prometheus::Error> {
    PROMETHEUS_REGISTRY.register(Box::new(INTENTS_CONSUMED_TOTAL.clone()))?;
    PROMETHEUS_REGISTRY.register(Box::new(INTENTS_MALFORMED_TOTAL.clone()))?;
    PROMETHEUS_REGISTRY.register(Box::new(DECISIONS_TOTAL.clone()))?;
    PROMETHEUS_REGISTRY.register(Box::new(PIPELINE_FAILURES_TOTAL.clone()))?;
    PROMETHEUS_REGISTRY.register(Box::new(APPROVALS_RESOLVED_TOTAL.clone()))?;
    PROMETHEUS_REGISTRY.register(Box::new(PIPELINE_DURATION_SECONDS.clone()))?;

    tracing::info!("Prometheus metrics initialized");
    Ok(())
}

/// Generate Prometheus text exposition format, used by the /metrics endpoint.
pub fn gather_metrics() -> String {
    use prometheus::Encoder;
    let encoder = prometheus::TextEncoder::new();
    let metric_families = PROMETHEUS_REGISTRY.gather();
    let mut buffer = Vec::new();

    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::error!("Failed to encode metrics: {}", e);
        return String::from("# Error encoding metrics\n");
    }

    String::from_utf8(buffer).unwrap_or_else(|e| {
        tracing::error!("Failed to convert metrics to string: {}", e);
        String::from("# Error converting metrics\n")
    })
}
