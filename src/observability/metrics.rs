//! # Metrics Collection
//!
//! Counters and histograms for platform calls and reconciliation outcomes.
//! Recording goes through the `metrics` facade; installing an exporter is left
//! to the embedding process.

use metrics::{counter, histogram};

/// Metrics recorder for reconciliation activity
#[derive(Debug, Clone, Default)]
pub struct MetricsRecorder;

impl MetricsRecorder {
    /// Create a new metrics recorder instance
    pub fn new() -> Self {
        Self
    }

    /// Record a platform API call and its outcome (`success` or an error kind)
    pub fn record_remote_call(&self, operation: &str, outcome: &str, duration: f64) {
        let labels = [("operation", operation.to_string()), ("outcome", outcome.to_string())];
        counter!("certplane_remote_calls_total", &labels).increment(1);

        let duration_labels = [("operation", operation.to_string())];
        histogram!("certplane_remote_call_duration_seconds", &duration_labels).record(duration);
    }

    /// Record the result of a drift check
    pub fn record_drift_check(&self, drifted: bool) {
        counter!("certplane_drift_checks_total").increment(1);
        if drifted {
            counter!("certplane_drift_detected_total").increment(1);
        }
    }

    /// Record a rejected input before any remote call
    pub fn record_validation_failure(&self, operation: &str) {
        let labels = [("operation", operation.to_string())];
        counter!("certplane_validation_failures_total", &labels).increment(1);
    }

    /// Record a destroy verification attempt
    pub fn record_destroy_verification(&self, confirmed: bool) {
        let status = if confirmed { "absent" } else { "present" };
        let labels = [("status", status.to_string())];
        counter!("certplane_destroy_verifications_total", &labels).increment(1);
    }
}
