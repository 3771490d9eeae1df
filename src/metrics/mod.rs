//! Metrics module
//!
//! Prometheus metrics for upload runs, pipeline phases and per-file outcomes.
//!
//! Recording is on by default. `set_enabled(false)` (driven by
//! `metrics.enabled` in the config) turns every `record_*` call into a no-op.

use lazy_static::lazy_static;
use prometheus::{
    register_counter, register_counter_vec, register_histogram_vec, Counter, CounterVec,
    Encoder, HistogramVec, TextEncoder,
};
use std::sync::atomic::{AtomicBool, Ordering};

static ENABLED: AtomicBool = AtomicBool::new(true);

lazy_static! {
    // Run metrics
    pub static ref RUNS_TOTAL: CounterVec = register_counter_vec!(
        "hayate_runs_total",
        "Total number of upload runs",
        &["strategy"]
    ).unwrap();

    pub static ref RUN_DURATION: HistogramVec = register_histogram_vec!(
        "hayate_run_duration_seconds",
        "Wall-clock duration of a whole upload run in seconds",
        &["strategy"],
        vec![0.01, 0.05, 0.1, 0.5, 1.0, 5.0, 10.0, 30.0, 60.0]
    ).unwrap();

    // File metrics
    pub static ref FILE_OUTCOMES_TOTAL: CounterVec = register_counter_vec!(
        "hayate_file_outcomes_total",
        "Per-file terminal outcomes",
        &["strategy", "status"]
    ).unwrap();

    pub static ref UPLOAD_BYTES_TOTAL: Counter = register_counter!(
        "hayate_upload_bytes_total",
        "Total bytes accepted by the storage backend"
    ).unwrap();

    // Phase metrics
    pub static ref PHASE_DURATION: HistogramVec = register_histogram_vec!(
        "hayate_phase_duration_seconds",
        "Duration of a single pipeline phase in seconds",
        &["phase"],
        vec![0.0001, 0.0005, 0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0]
    ).unwrap();
}

/// Turn metric recording on or off for the whole process
pub fn set_enabled(enabled: bool) {
    ENABLED.store(enabled, Ordering::Relaxed);
}

pub fn is_enabled() -> bool {
    ENABLED.load(Ordering::Relaxed)
}

/// Record a finished run
pub fn record_run(strategy: &str, duration_secs: f64) {
    if !is_enabled() {
        return;
    }
    RUNS_TOTAL.with_label_values(&[strategy]).inc();
    RUN_DURATION
        .with_label_values(&[strategy])
        .observe(duration_secs);
}

/// Record one file's terminal outcome
pub fn record_file_outcome(strategy: &str, success: bool) {
    if !is_enabled() {
        return;
    }
    let status = if success { "success" } else { "failure" };
    FILE_OUTCOMES_TOTAL
        .with_label_values(&[strategy, status])
        .inc();
}

/// Record bytes accepted by a successful PUT
pub fn record_upload_bytes(bytes: u64) {
    if !is_enabled() {
        return;
    }
    UPLOAD_BYTES_TOTAL.inc_by(bytes as f64);
}

/// Record how long one pipeline phase took
pub fn record_phase_duration(phase: &str, duration_secs: f64) {
    if !is_enabled() {
        return;
    }
    PHASE_DURATION
        .with_label_values(&[phase])
        .observe(duration_secs);
}

/// Render all registered metrics in the Prometheus text format
pub fn gather_text() -> String {
    let mut buffer = Vec::new();
    let encoder = TextEncoder::new();
    if let Err(e) = encoder.encode(&prometheus::gather(), &mut buffer) {
        tracing::warn!(error = %e, "Failed to encode metrics");
        return String::new();
    }
    String::from_utf8_lossy(&buffer).into_owned()
}
