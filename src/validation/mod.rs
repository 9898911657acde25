//! # Validation Module
//!
//! Local checks run before any remote call. A failure here is always a
//! [`CertError::Validation`](crate::errors::CertError::Validation) and never
//! reaches the platform.

pub mod pem;

pub use pem::{validate_certificate_chain, validate_private_key, ChainSummary};
