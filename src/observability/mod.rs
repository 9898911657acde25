//! # Observability Infrastructure
//!
//! Structured logging and metrics for the reconciler and platform clients.

pub mod logging;
pub mod metrics;

pub use logging::init_logging;
pub use metrics::MetricsRecorder;
