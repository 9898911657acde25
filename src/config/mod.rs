//! # Configuration Management
//!
//! Settings for the platform client, logging and the destroy verification
//! retry policy. Values come from defaults, an optional config file and
//! environment variables, in that order.

pub mod settings;

pub use settings::{
    AppConfig, ObservabilityConfig, PlatformConfig, VerifyConfig, API_KEY_ENV, ENV_PREFIX,
};
