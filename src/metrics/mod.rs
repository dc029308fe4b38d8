//! Metrics module
//!
//! Prometheus counters and histograms for the upload pipeline.

pub mod server;

use lazy_static::lazy_static;
use prometheus::{
    register_counter, register_counter_vec, register_histogram, Counter, CounterVec, Histogram,
};

lazy_static! {
    // Upload metrics
    pub static ref UPLOADS_TOTAL: CounterVec = register_counter_vec!(
        "formrelay_uploads_total",
        "Total number of relayed uploads",
        &["status"]
    ).unwrap();

    pub static ref UPLOAD_BYTES_TOTAL: Counter = register_counter!(
        "formrelay_upload_bytes_total",
        "Total bytes relayed to the remote media host"
    ).unwrap();

    pub static ref UPLOAD_DURATION: Histogram = register_histogram!(
        "formrelay_upload_duration_seconds",
        "End-to-end relay duration in seconds",
        vec![0.01, 0.05, 0.1, 0.5, 1.0, 5.0, 10.0, 30.0]
    ).unwrap();

    // Ingest metrics
    pub static ref INGEST_REJECTED: CounterVec = register_counter_vec!(
        "formrelay_ingest_rejected_total",
        "Submissions rejected before reaching the remote sink",
        &["reason"]
    ).unwrap();

    // Error metrics
    pub static ref ERRORS_TOTAL: CounterVec = register_counter_vec!(
        "formrelay_errors_total",
        "Total errors",
        &["type"]
    ).unwrap();
}

/// Record a successfully relayed upload
pub fn record_upload_success(bytes: u64) {
    UPLOADS_TOTAL.with_label_values(&["success"]).inc();
    UPLOAD_BYTES_TOTAL.inc_by(bytes as f64);
}

/// Record a failed relay attempt
pub fn record_upload_failure() {
    UPLOADS_TOTAL.with_label_values(&["failure"]).inc();
}

/// Record end-to-end relay duration
pub fn record_upload_duration(duration_secs: f64) {
    UPLOAD_DURATION.observe(duration_secs);
}

/// Record a submission rejected at ingest
pub fn record_ingest_rejected(reason: &str) {
    INGEST_REJECTED.with_label_values(&[reason]).inc();
}

/// Record an error
pub fn record_error(error_type: &str) {
    ERRORS_TOTAL.with_label_values(&[error_type]).inc();
}
