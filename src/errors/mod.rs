//! # Error Handling
//!
//! Error types shared by the reconciler, the destroy verifier and the
//! configuration layer. Platform client failures keep their own
//! [`PlatformError`](crate::platform::PlatformError) type and are wrapped,
//! never flattened, when they cross into [`CertError`].

pub mod types;

pub use types::{CancelReason, CertError, Result};
