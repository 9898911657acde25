//! Domain layer
//!
//! Pure entities for certificate endpoints with no infrastructure
//! dependencies. Anything that talks to the platform lives in
//! [`crate::platform`] and [`crate::reconciler`].
//!
//! ## Module Organization
//!
//! - `id`: Type-safe identifiers with NewType pattern
//! - `certificate`: Desired configuration, bound descriptors and lookup state
//! - `secret`: Redacting wrapper for write-only private keys

pub mod certificate;
pub mod id;
pub mod secret;

pub use certificate::{CertificateDescriptor, DesiredCertificate, EndpointState};
pub use id::{AppRef, EndpointId};
pub use secret::SecretString;
