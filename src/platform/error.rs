//! Error types for platform API client operations.

use thiserror::Error;

/// Result type for platform client operations.
pub type Result<T> = std::result::Result<T, PlatformError>;

/// Errors returned by a [`PlatformClient`](super::PlatformClient).
#[derive(Error, Debug)]
pub enum PlatformError {
    /// The addressed endpoint (or its application) does not exist.
    #[error("Resource not found: {resource}")]
    NotFound { resource: String },

    /// The platform answered with a non-success status.
    #[error("Platform API error (status {status}): {message}")]
    Api { status: u16, id: Option<String>, message: String },

    /// The request never produced a response (connect, TLS, timeout).
    #[error("Transport error: {message}")]
    Transport {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// The response body could not be decoded.
    #[error("Failed to decode platform response: {message}")]
    Decode { message: String },

    /// The client itself is misconfigured.
    #[error("Client configuration error: {message}")]
    Config { message: String },
}

impl PlatformError {
    /// Create a not found error.
    pub fn not_found(resource: impl Into<String>) -> Self {
        Self::NotFound { resource: resource.into() }
    }

    /// Create an API error from a status code and the platform's error body.
    pub fn api(status: u16, id: Option<String>, message: impl Into<String>) -> Self {
        Self::Api { status, id, message: message.into() }
    }

    /// Create a transport error without an underlying source.
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport { message: message.into(), source: None }
    }

    /// Create a transport error wrapping the underlying failure.
    pub fn transport_with_source(
        message: impl Into<String>,
        source: Box<dyn std::error::Error + Send + Sync>,
    ) -> Self {
        Self::Transport { message: message.into(), source: Some(source) }
    }

    /// Create a decode error.
    pub fn decode(message: impl Into<String>) -> Self {
        Self::Decode { message: message.into() }
    }

    /// Create a config error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config { message: message.into() }
    }

    /// Returns true for the distinguishable "endpoint absent" outcome.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Whether a caller may retry the request that produced this error.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Api { status, .. } => *status == 429 || *status >= 500,
            Self::Transport { .. } => true,
            _ => false,
        }
    }
}

impl From<reqwest::Error> for PlatformError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_decode() {
            return Self::decode(error.to_string());
        }
        Self::transport_with_source("HTTP request failed", Box::new(error))
    }
}
