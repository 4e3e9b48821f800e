//! Prometheus metrics for core components.
//!
//! This module provides metrics for:
//! - Ticket lifecycle (transitions, non-fatal side effect failures)
//! - Archival scheduler (cycles, processed tickets, failures)
//! - Chat platform calls (requests, durations, retries)

use once_cell::sync::Lazy;
use prometheus::{HistogramOpts, HistogramVec, IntCounter, IntCounterVec, Opts};

// =============================================================================
// Lifecycle Metrics
// =============================================================================

/// Lifecycle operations by operation and outcome.
pub static TRANSITIONS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "warden_ticket_transitions_total",
            "Total ticket lifecycle operations",
        ),
        &["operation", "result"], // result: "ok" or the error kind
    )
    .unwrap()
});

/// Side effects that failed after the state change was kept.
pub static SIDE_EFFECT_FAILURES: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "warden_side_effect_failures_total",
            "Channel or notification side effects that failed without undoing the transition",
        ),
        &["operation"], // "welcome", "rename", "lock", "notice", ...
    )
    .unwrap()
});

// =============================================================================
// Scheduler Metrics
// =============================================================================

/// Completed scheduler cycles.
pub static SCHEDULER_CYCLES: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "warden_scheduler_cycles_total",
        "Total archival scheduler cycles",
    )
    .unwrap()
});

/// Scheduler cycle duration in seconds.
pub static SCHEDULER_CYCLE_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "warden_scheduler_cycle_duration_seconds",
            "Duration of one archival scheduler cycle",
        )
        .buckets(vec![0.01, 0.05, 0.1, 0.5, 1.0, 5.0, 15.0, 60.0]),
        &[],
    )
    .unwrap()
});

/// Tickets the scheduler moved forward, by phase.
pub static SCHEDULER_PROCESSED: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "warden_scheduler_processed_total",
            "Tickets processed by the archival scheduler",
        ),
        &["phase"], // "archive", "delete", "release"
    )
    .unwrap()
});

/// Per-ticket scheduler failures, by phase.
pub static SCHEDULER_FAILURES: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "warden_scheduler_failures_total",
            "Tickets the archival scheduler failed to process",
        ),
        &["phase"],
    )
    .unwrap()
});

// =============================================================================
// Chat Platform Metrics
// =============================================================================

/// Chat platform request duration.
pub static PLATFORM_REQUEST_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "warden_platform_request_duration_seconds",
            "Duration of chat platform API calls",
        )
        .buckets(vec![0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0]),
        &["operation"],
    )
    .unwrap()
});

/// Chat platform requests total.
pub static PLATFORM_REQUESTS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "warden_platform_requests_total",
            "Total chat platform API calls",
        ),
        &["operation", "status"], // status: "success", "error"
    )
    .unwrap()
});

/// In-call retries of channel operations.
pub static CHANNEL_RETRIES: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "warden_channel_retries_total",
            "Retries of transient channel operation failures",
        ),
        &["operation"],
    )
    .unwrap()
});

// =============================================================================
// Helper functions
// =============================================================================

/// Get all core metrics for registration in a registry.
pub fn all_metrics() -> Vec<Box<dyn prometheus::core::Collector>> {
    vec![
        // Lifecycle
        Box::new(TRANSITIONS_TOTAL.clone()),
        Box::new(SIDE_EFFECT_FAILURES.clone()),
        // Scheduler
        Box::new(SCHEDULER_CYCLES.clone()),
        Box::new(SCHEDULER_CYCLE_DURATION.clone()),
        Box::new(SCHEDULER_PROCESSED.clone()),
        Box::new(SCHEDULER_FAILURES.clone()),
        // Chat platform
        Box::new(PLATFORM_REQUEST_DURATION.clone()),
        Box::new(PLATFORM_REQUESTS.clone()),
        Box::new(CHANNEL_RETRIES.clone()),
    ]
}
