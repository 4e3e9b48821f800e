//! Prometheus metrics for observability.
//!
//! This module provides metrics for monitoring the Warden server:
//! - HTTP request metrics (latency, counts, auth failures)
//! - Ticket counts by status (collected dynamically)
//! - Archival scheduler state (collected dynamically)

use once_cell::sync::Lazy;
use prometheus::{
    self, Encoder, HistogramOpts, HistogramVec, IntCounterVec, IntGauge, IntGaugeVec, Opts,
    Registry, TextEncoder,
};
use tracing::warn;

/// Global metrics registry.
pub static REGISTRY: Lazy<Registry> = Lazy::new(|| {
    let registry = Registry::new();
    register_metrics(&registry);
    registry
});

// =============================================================================
// HTTP Request Metrics
// =============================================================================

/// HTTP request duration in seconds.
pub static HTTP_REQUEST_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "warden_http_request_duration_seconds",
            "HTTP request duration in seconds",
        )
        .buckets(vec![
            0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0,
        ]),
        &["method", "path", "status"],
    )
    .unwrap()
});

/// HTTP requests total count.
pub static HTTP_REQUESTS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("warden_http_requests_total", "Total HTTP requests"),
        &["method", "path", "status"],
    )
    .unwrap()
});

/// HTTP requests currently in flight.
pub static HTTP_REQUESTS_IN_FLIGHT: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "warden_http_requests_in_flight",
        "Number of HTTP requests currently being processed",
    )
    .unwrap()
});

/// Rejected API keys.
pub static AUTH_FAILURES_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("warden_auth_failures_total", "Total authentication failures"),
        &["reason"], // "missing", "invalid"
    )
    .unwrap()
});

// =============================================================================
// Ticket Metrics (collected dynamically)
// =============================================================================

/// Tickets by current status.
pub static TICKETS_BY_STATUS: Lazy<IntGaugeVec> = Lazy::new(|| {
    IntGaugeVec::new(
        Opts::new("warden_tickets_by_status", "Current ticket count by status"),
        &["status"],
    )
    .unwrap()
});

// =============================================================================
// Scheduler Metrics (collected dynamically)
// =============================================================================

/// Scheduler running state (1 = running, 0 = stopped).
pub static SCHEDULER_RUNNING: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "warden_scheduler_running",
        "Whether the archival scheduler is running (1) or stopped (0)",
    )
    .unwrap()
});

/// Tickets waiting out a retry delay.
pub static SCHEDULER_BACKOFF: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "warden_scheduler_backoff_tickets",
        "Tickets the archival scheduler is backing off from",
    )
    .unwrap()
});

// =============================================================================
// Registration
// =============================================================================

fn register_metrics(registry: &Registry) {
    let collectors: Vec<Box<dyn prometheus::core::Collector>> = vec![
        // HTTP
        Box::new(HTTP_REQUEST_DURATION.clone()),
        Box::new(HTTP_REQUESTS_TOTAL.clone()),
        Box::new(HTTP_REQUESTS_IN_FLIGHT.clone()),
        Box::new(AUTH_FAILURES_TOTAL.clone()),
        // Tickets
        Box::new(TICKETS_BY_STATUS.clone()),
        // Scheduler
        Box::new(SCHEDULER_RUNNING.clone()),
        Box::new(SCHEDULER_BACKOFF.clone()),
    ];

    // Core metrics (lifecycle, scheduler, chat platform)
    for metric in collectors
        .into_iter()
        .chain(warden_core::metrics::all_metrics())
    {
        registry.register(metric).unwrap();
    }
}

/// Encode all metrics as Prometheus text format.
pub fn encode_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        warn!(error = %e, "Failed to encode metrics");
    }
    String::from_utf8_lossy(&buffer).into_owned()
}

/// Collect dynamic metrics from current application state.
///
/// This is called before encoding metrics to update gauges with current values
/// from the registry and the scheduler.
pub async fn collect_dynamic_metrics(state: &crate::state::AppState) {
    let status = state.scheduler().status().await;
    SCHEDULER_RUNNING.set(if status.running { 1 } else { 0 });
    SCHEDULER_BACKOFF.set(status.backoff.len() as i64);

    match state.engine().registry().count_by_status() {
        Ok(counts) => {
            for count in counts {
                TICKETS_BY_STATUS
                    .with_label_values(&[count.status.as_str()])
                    .set(count.count as i64);
            }
        }
        Err(e) => warn!(error = %e, "Failed to count tickets by status"),
    }
}

static TICKET_ID_SEGMENT: Lazy<regex_lite::Regex> =
    Lazy::new(|| regex_lite::Regex::new(r"/\d+-\d+(/|$)").unwrap());
static NUMERIC_SEGMENT: Lazy<regex_lite::Regex> =
    Lazy::new(|| regex_lite::Regex::new(r"/\d+(/|$)").unwrap());

/// Normalize a path for metric labels (replace IDs with placeholders).
pub fn normalize_path(path: &str) -> String {
    let result = TICKET_ID_SEGMENT.replace_all(path, "/{ticket}$1");
    let result = NUMERIC_SEGMENT.replace_all(&result, "/{id}$1");
    result.to_string()
}
