//! # Platform Clients
//!
//! The [`PlatformClient`] trait is the only way the reconciler reaches the
//! hosting platform. Two implementations ship with the crate:
//!
//! - [`HerokuPlatformClient`]: Heroku Platform API v3 over HTTPS
//! - [`MockPlatformClient`]: in-memory platform with failure and lag injection

pub mod client;
pub mod error;
pub mod heroku;
pub mod mock;

pub use client::{EndpointRecord, PlatformClient};
pub use error::{PlatformError, Result};
pub use heroku::HerokuPlatformClient;
pub use mock::{CallCounts, MockFailure, MockOperation, MockPlatformClient};
