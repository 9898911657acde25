//! # Certplane
//!
//! Reconciliation of TLS certificate endpoints attached to applications on a
//! hosting platform. A configuration engine declares a certificate chain and
//! private key per application; certplane creates the matching endpoint,
//! detects chain drift, updates in place, deletes, and verifies that deleted
//! endpoints are gone.
//!
//! ## Architecture
//!
//! ```text
//! Configuration engine → Reconciler → PlatformClient → Platform API
//!                            ↓
//!                  Drift detector / Destroy verifier
//! ```
//!
//! ## Core Components
//!
//! - **Reconciler**: single-shot create/read/reconcile/update/delete/resolve
//! - **Drift detector**: byte-for-byte comparison of declared and observed chains
//! - **Destroy verifier**: confirms absence after delete, with a caller-side retry helper
//! - **Platform clients**: Heroku API client and an in-memory mock
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use certplane::{
//!     AppConfig, AppRef, DesiredCertificate, HerokuPlatformClient, OperationContext, Reconciler,
//! };
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = AppConfig::load(None)?;
//!     certplane::observability::init_logging(&config.observability);
//!
//!     let client = HerokuPlatformClient::new(&config.platform)?;
//!     let reconciler = Reconciler::new(Arc::new(client));
//!
//!     let desired = DesiredCertificate::new(
//!         AppRef::parse("my-app")?,
//!         std::fs::read_to_string("server.crt")?,
//!         std::fs::read_to_string("server.key")?,
//!     );
//!
//!     let ctx = OperationContext::new();
//!     let endpoint = reconciler.create(&ctx, &desired).await?;
//!     println!("{} -> {}", endpoint.id(), endpoint.canonical_name());
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod domain;
pub mod errors;
pub mod observability;
pub mod platform;
pub mod reconciler;
pub mod validation;

// Re-export commonly used types and traits
pub use config::AppConfig;
pub use domain::{AppRef, CertificateDescriptor, DesiredCertificate, EndpointId, EndpointState};
pub use errors::{CertError, Result};
pub use platform::{HerokuPlatformClient, MockPlatformClient, PlatformClient, PlatformError};
pub use reconciler::{
    has_drift, verify_absent, verify_absent_with_retry, OperationContext, ReconcileOutcome,
    Reconciler, RetryConfig,
};

/// Application version from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name from Cargo.toml
pub const APP_NAME: &str = env!("CARGO_PKG_NAME");
