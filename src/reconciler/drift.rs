//! Drift detection between declared and observed certificate chains.
//!
//! Chains are compared as raw PEM bytes: no decoding, no whitespace
//! normalization, and the order of intermediates matters.
//!
//! The private key cannot take part in the comparison because the platform
//! never returns it. Rotating only the key while keeping the same chain is
//! invisible here; the configuration engine must notice that change in its
//! own diff and call [`Reconciler::update`](super::Reconciler::update)
//! directly.

use crate::domain::{CertificateDescriptor, DesiredCertificate};

/// True when the desired chain differs from the last observed chain.
pub fn has_drift(desired: &DesiredCertificate, observed: &CertificateDescriptor) -> bool {
    chains_differ(&desired.certificate_chain, observed.observed_chain())
}

/// Byte-for-byte chain comparison.
pub fn chains_differ(desired: &str, observed: &str) -> bool {
    desired.as_bytes() != observed.as_bytes()
}

/// Offset of the first differing byte, for diagnostics.
pub fn first_difference(desired: &str, observed: &str) -> Option<usize> {
    let (a, b) = (desired.as_bytes(), observed.as_bytes());
    match a.iter().zip(b).position(|(x, y)| x != y) {
        Some(offset) => Some(offset),
        None if a.len() != b.len() => Some(a.len().min(b.len())),
        None => None,
    }
}
