//! # Structured Logging
//!
//! Subscriber setup and span helpers built on the tracing ecosystem.
//! Private keys never appear in any span or event field.

use tracing_subscriber::{fmt, EnvFilter};

use crate::config::ObservabilityConfig;

/// Create a tracing span for an endpoint operation.
///
/// ```rust,ignore
/// let span = endpoint_span!("create", app);
/// let span = endpoint_span!("update", app, endpoint_id = %id);
/// ```
#[macro_export]
macro_rules! endpoint_span {
    ($operation:expr, $app:expr) => {
        tracing::info_span!(
            "endpoint_operation",
            operation = %$operation,
            app = %$app,
            operation_id = %uuid::Uuid::new_v4(),
            endpoint_id = tracing::field::Empty
        )
    };
    ($operation:expr, $app:expr, $($field:tt)*) => {
        tracing::info_span!(
            "endpoint_operation",
            operation = %$operation,
            app = %$app,
            operation_id = %uuid::Uuid::new_v4(),
            $($field)*
        )
    };
}

/// Install a global fmt subscriber.
///
/// `RUST_LOG` takes precedence over the configured level. Returns `false`
/// when a subscriber was already installed (e.g. by a test harness).
pub fn init_logging(config: &ObservabilityConfig) -> bool {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| configured_filter(config));

    let result = if config.json_logging {
        fmt().with_env_filter(filter).json().with_current_span(true).try_init()
    } else {
        fmt().with_env_filter(filter).with_target(true).try_init()
    };

    match result {
        Ok(()) => {
            tracing::info!(
                service_name = %config.service_name,
                log_level = %config.log_level,
                json = config.json_logging,
                "Logging initialized"
            );
            true
        }
        Err(_) => false,
    }
}

/// Filter from the configured level, falling back to `info` for unparseable directives.
fn configured_filter(config: &ObservabilityConfig) -> EnvFilter {
    EnvFilter::try_new(&config.log_level).unwrap_or_else(|_| EnvFilter::new("info"))
}
