//! # Configuration Settings
//!
//! Defines the configuration structure for certificate endpoint reconciliation.

use crate::domain::SecretString;
use crate::errors::{CertError, Result};
use crate::reconciler::RetryConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use validator::Validate;

/// Environment variable prefix for layered overrides, e.g. `CERTPLANE__PLATFORM__API_URL`
pub const ENV_PREFIX: &str = "CERTPLANE";

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize, Validate, Default)]
#[serde(default)]
pub struct AppConfig {
    /// Platform API configuration
    #[validate(nested)]
    pub platform: PlatformConfig,

    /// Observability configuration
    #[validate(nested)]
    pub observability: ObservabilityConfig,

    /// Destroy verification retry policy
    #[validate(nested)]
    pub verify: VerifyConfig,
}

impl AppConfig {
    /// Load configuration from an optional file, then `CERTPLANE__*` environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = config::Config::builder();

        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path).required(true));
        }

        builder = builder.add_source(
            config::Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        );

        let mut config: AppConfig = builder.build()?.try_deserialize()?;

        if config.platform.api_key.is_blank() {
            if let Ok(key) = std::env::var(API_KEY_ENV) {
                config.platform.api_key = SecretString::new(key);
            }
        }

        config.validate()?;
        Ok(config)
    }

    /// Validate the entire configuration
    pub fn validate(&self) -> Result<()> {
        Validate::validate(self).map_err(CertError::from)?;
        self.validate_custom()
    }

    fn validate_custom(&self) -> Result<()> {
        if self.verify.max_backoff_ms < self.verify.initial_backoff_ms {
            return Err(CertError::config(
                "verify.max_backoff_ms must not be smaller than verify.initial_backoff_ms",
            ));
        }

        if !self.platform.api_url.starts_with("https://")
            && !self.platform.api_url.starts_with("http://")
        {
            return Err(CertError::config("platform.api_url must start with 'http://' or 'https://'"));
        }

        Ok(())
    }
}

/// Environment variable holding the platform API key
pub const API_KEY_ENV: &str = "HEROKU_API_KEY";

/// Platform API client configuration
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct PlatformConfig {
    /// Base URL of the platform API
    #[validate(url(message = "API URL must be a valid URL"))]
    pub api_url: String,

    /// Bearer token for the platform API
    pub api_key: SecretString,

    /// Domain under which applications are exposed (`<app>.<platform_domain>`)
    #[validate(length(min = 1, message = "Platform domain cannot be empty"))]
    pub platform_domain: String,

    /// Request timeout in seconds
    #[validate(range(min = 1, max = 300, message = "Timeout must be between 1 and 300 seconds"))]
    pub timeout_seconds: u64,

    /// Connect timeout in seconds
    #[validate(range(
        min = 1,
        max = 60,
        message = "Connect timeout must be between 1 and 60 seconds"
    ))]
    pub connect_timeout_seconds: u64,

    /// User agent sent with every request
    #[validate(length(min = 1, message = "User agent cannot be empty"))]
    pub user_agent: String,
}

impl Default for PlatformConfig {
    fn default() -> Self {
        Self {
            api_url: "https://api.heroku.com".to_string(),
            api_key: SecretString::default(),
            platform_domain: "herokuapp.com".to_string(),
            timeout_seconds: 30,
            connect_timeout_seconds: 10,
            user_agent: format!("{}/{}", crate::APP_NAME, crate::VERSION),
        }
    }
}

impl PlatformConfig {
    /// Get request timeout as Duration
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }

    /// Get connect timeout as Duration
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_seconds)
    }

    /// Canonical hostname the platform assigns to an application
    pub fn canonical_name_for(&self, app: &str) -> String {
        format!("{}.{}", app, self.platform_domain)
    }

    /// Create PlatformConfig from environment variables
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let api_url = std::env::var("CERTPLANE_API_URL").unwrap_or(defaults.api_url);

        let api_key = std::env::var(API_KEY_ENV).map(SecretString::new).unwrap_or_default();

        let platform_domain =
            std::env::var("CERTPLANE_PLATFORM_DOMAIN").unwrap_or(defaults.platform_domain);

        let timeout_seconds = std::env::var("CERTPLANE_TIMEOUT_SECONDS")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .unwrap_or(defaults.timeout_seconds);

        Self { api_url, api_key, platform_domain, timeout_seconds, ..defaults }
    }
}

/// Observability configuration for logging
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Service name attached to log output
    #[validate(length(min = 1, message = "Service name cannot be empty"))]
    pub service_name: String,

    /// Log level or filter directive (trace, debug, info, warn, error)
    #[validate(length(min = 1, message = "Log level cannot be empty"))]
    pub log_level: String,

    /// Enable JSON structured logging
    pub json_logging: bool,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            service_name: crate::APP_NAME.to_string(),
            log_level: "info".to_string(),
            json_logging: false,
        }
    }
}

impl ObservabilityConfig {
    /// Create ObservabilityConfig from environment variables
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let log_level = std::env::var("CERTPLANE_LOG_LEVEL").unwrap_or(defaults.log_level);

        let json_logging = std::env::var("CERTPLANE_JSON_LOGGING")
            .map(|s| s.to_lowercase() == "true" || s == "1")
            .unwrap_or(defaults.json_logging);

        Self { log_level, json_logging, ..defaults }
    }
}

/// Retry policy used by callers of destroy verification
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct VerifyConfig {
    /// Maximum number of verification attempts
    #[validate(range(min = 1, max = 100, message = "Max attempts must be between 1 and 100"))]
    pub max_attempts: u32,

    /// Backoff before the second attempt, in milliseconds
    #[validate(range(min = 1, message = "Initial backoff must be at least 1ms"))]
    pub initial_backoff_ms: u64,

    /// Cap for exponential backoff, in milliseconds
    #[validate(range(min = 1, message = "Max backoff must be at least 1ms"))]
    pub max_backoff_ms: u64,

    /// Multiplier applied to the backoff after each attempt
    #[validate(range(min = 1.0, max = 10.0, message = "Multiplier must be between 1 and 10"))]
    pub backoff_multiplier: f64,
}

impl Default for VerifyConfig {
    fn default() -> Self {
        let retry = RetryConfig::default();
        Self {
            max_attempts: retry.max_attempts,
            initial_backoff_ms: retry.initial_backoff.as_millis() as u64,
            max_backoff_ms: retry.max_backoff.as_millis() as u64,
            backoff_multiplier: retry.backoff_multiplier,
        }
    }
}

impl VerifyConfig {
    /// Convert to the retry policy consumed by `verify_absent_with_retry`
    pub fn retry_config(&self) -> RetryConfig {
        RetryConfig {
            max_attempts: self.max_attempts,
            initial_backoff: Duration::from_millis(self.initial_backoff_ms),
            max_backoff: Duration::from_millis(self.max_backoff_ms),
            backoff_multiplier: self.backoff_multiplier,
        }
    }
}
