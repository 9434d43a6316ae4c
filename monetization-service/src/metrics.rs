/// Prometheus metrics for the earnings engine
use lazy_static::lazy_static;
use prometheus::{
    register_counter_vec, register_int_counter, CounterVec, Encoder, IntCounter, TextEncoder,
};

lazy_static! {
    /// Accrual attempts (labels: kind=view|like|comment|share, outcome=created|updated|skipped)
    pub static ref ACCRUALS_TOTAL: CounterVec = register_counter_vec!(
        "earnings_accruals_total",
        "Total accrual invocations",
        &["kind", "outcome"]
    )
    .unwrap();

    /// Weekly aggregation runs (labels: status=completed|already_calculated)
    pub static ref WEEKLY_RUNS_TOTAL: CounterVec = register_counter_vec!(
        "earnings_weekly_runs_total",
        "Total weekly aggregation runs",
        &["status"]
    )
    .unwrap();

    /// Creators skipped during a weekly run due to a per-creator failure
    pub static ref WEEKLY_CREATORS_SKIPPED: IntCounter = register_int_counter!(
        "earnings_weekly_creators_skipped_total",
        "Creators skipped during weekly aggregation"
    )
    .unwrap();

    /// Balance reconciliation runs
    pub static ref RECONCILE_RUNS_TOTAL: IntCounter = register_int_counter!(
        "earnings_reconcile_runs_total",
        "Total balance reconciliation runs"
    )
    .unwrap();
}

/// Render all registered metrics in Prometheus text format
pub fn gather_metrics() -> String {
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    let encoder = TextEncoder::new();

    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::error!("Failed to encode metrics: {}", e);
        return String::new();
    }

    String::from_utf8(buffer).unwrap_or_default()
}
