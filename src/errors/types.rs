//! # Error Types
//!
//! Error types for certificate endpoint reconciliation using `thiserror`.

use std::fmt;

use crate::platform::PlatformError;

/// Custom result type for certplane operations
pub type Result<T> = std::result::Result<T, CertError>;

/// Main error type for certificate endpoint reconciliation
#[derive(thiserror::Error, Debug)]
pub enum CertError {
    /// Missing or malformed input, detected before any remote call
    #[error("Validation error: {message}")]
    Validation { message: String, field: Option<String> },

    /// The remote endpoint does not exist
    #[error("Certificate endpoint '{id}' not found on app '{app}'")]
    NotFound { app: String, id: String },

    /// Transport or API failure reported by the platform client
    #[error("Remote error during {operation}: {source}")]
    Remote {
        operation: String,
        #[source]
        source: PlatformError,
    },

    /// Remote state violates the invariants of the endpoint resource
    #[error("Consistency error: {message}")]
    Consistency { message: String, id: Option<String> },

    /// Destroy verification found the endpoint still present
    #[error("Certificate endpoint '{id}' still exists on app '{app}'")]
    StillExists { app: String, id: String },

    /// Operation aborted by the caller's cancellation token or deadline
    #[error("Operation {operation} canceled: {reason}")]
    Canceled { operation: String, reason: CancelReason },

    /// Configuration loading or validation errors
    #[error("Configuration error: {message}")]
    Config {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },
}

/// Why an operation was canceled
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelReason {
    /// The caller triggered the cancellation token
    Canceled,
    /// The operation deadline elapsed before the remote call completed
    DeadlineExceeded,
}

impl fmt::Display for CancelReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CancelReason::Canceled => write!(f, "canceled"),
            CancelReason::DeadlineExceeded => write!(f, "deadline_exceeded"),
        }
    }
}

impl CertError {
    /// Create a validation error
    pub fn validation<S: Into<String>>(message: S) -> Self {
        Self::Validation { message: message.into(), field: None }
    }

    /// Create a validation error with field information
    pub fn validation_field<S: Into<String>, F: Into<String>>(message: S, field: F) -> Self {
        Self::Validation { message: message.into(), field: Some(field.into()) }
    }

    /// Create a not found error
    pub fn not_found<A: Into<String>, I: Into<String>>(app: A, id: I) -> Self {
        Self::NotFound { app: app.into(), id: id.into() }
    }

    /// Wrap a platform error raised by `operation`
    pub fn remote<S: Into<String>>(operation: S, source: PlatformError) -> Self {
        Self::Remote { operation: operation.into(), source }
    }

    /// Create a consistency error
    pub fn consistency<S: Into<String>>(message: S) -> Self {
        Self::Consistency { message: message.into(), id: None }
    }

    /// Create a consistency error bound to an endpoint id
    pub fn consistency_for<S: Into<String>, I: Into<String>>(message: S, id: I) -> Self {
        Self::Consistency { message: message.into(), id: Some(id.into()) }
    }

    /// Create a still-exists error
    pub fn still_exists<A: Into<String>, I: Into<String>>(app: A, id: I) -> Self {
        Self::StillExists { app: app.into(), id: id.into() }
    }

    /// Create a canceled error
    pub fn canceled<S: Into<String>>(operation: S, reason: CancelReason) -> Self {
        Self::Canceled { operation: operation.into(), reason }
    }

    /// Create a new configuration error
    pub fn config<S: Into<String>>(message: S) -> Self {
        Self::Config { message: message.into(), source: None }
    }

    /// Create a configuration error with source
    pub fn config_with_source<S: Into<String>>(
        message: S,
        source: Box<dyn std::error::Error + Send + Sync>,
    ) -> Self {
        Self::Config { message: message.into(), source: Some(source) }
    }

    /// Short, stable name of the error kind for logs and metrics labels
    pub fn kind(&self) -> &'static str {
        match self {
            CertError::Validation { .. } => "validation",
            CertError::NotFound { .. } => "not_found",
            CertError::Remote { .. } => "remote",
            CertError::Consistency { .. } => "consistency",
            CertError::StillExists { .. } => "still_exists",
            CertError::Canceled { .. } => "canceled",
            CertError::Config { .. } => "config",
        }
    }

    /// Check if a caller-driven retry of the same operation makes sense
    pub fn is_retryable(&self) -> bool {
        match self {
            CertError::Remote { source, .. } => source.is_retryable(),
            CertError::StillExists { .. } => true,
            _ => false,
        }
    }

    /// Whether the error is fatal for the resource and must be surfaced immediately
    pub fn is_fatal(&self) -> bool {
        matches!(self, CertError::Consistency { .. })
    }
}

impl From<config::ConfigError> for CertError {
    fn from(error: config::ConfigError) -> Self {
        Self::config_with_source("Configuration loading failed", Box::new(error))
    }
}

impl From<validator::ValidationErrors> for CertError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let message = errors
            .field_errors()
            .iter()
            .map(|(field, field_errors)| {
                let error_messages: Vec<String> = field_errors
                    .iter()
                    .map(|e| {
                        e.message.as_ref().map_or("Invalid value".to_string(), |m| m.to_string())
                    })
                    .collect();
                format!("{}: {}", field, error_messages.join(", "))
            })
            .collect::<Vec<_>>()
            .join("; ");

        Self::config(format!("Validation failed: {}", message))
    }
}
