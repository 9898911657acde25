//! PEM well-formedness checks for certificate chains and private keys.
//!
//! Material is treated as opaque text by the rest of the crate. These checks
//! only make sure a create or update is never sent with input the platform
//! would reject as unparseable: every chain block must decode to an X.509
//! certificate and the key must be a single unencrypted private key.

use chrono::{DateTime, Utc};
use rustls::pki_types::{pem::PemObject, PrivateKeyDer};
use x509_parser::pem::Pem;

use crate::domain::SecretString;
use crate::errors::{CertError, Result};

const CERTIFICATE_LABEL: &str = "CERTIFICATE";
const CHAIN_FIELD: &str = "certificate_chain";
const KEY_FIELD: &str = "private_key";

/// Metadata extracted from the leaf certificate for logging.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainSummary {
    /// Number of certificates in the chain, leaf included
    pub certificates: usize,
    pub leaf_subject: String,
    pub leaf_not_after: Option<DateTime<Utc>>,
}

/// Validate a PEM certificate chain (leaf first, then intermediates).
pub fn validate_certificate_chain(chain: &str) -> Result<ChainSummary> {
    if chain.trim().is_empty() {
        return Err(CertError::validation_field("certificate chain is required", CHAIN_FIELD));
    }

    let blocks = parse_blocks(chain.as_bytes(), CHAIN_FIELD)?;
    if blocks.is_empty() {
        return Err(CertError::validation_field(
            "certificate chain does not contain any PEM blocks",
            CHAIN_FIELD,
        ));
    }

    let mut summary = None;
    for (index, block) in blocks.iter().enumerate() {
        if block.label != CERTIFICATE_LABEL {
            return Err(CertError::validation_field(
                format!(
                    "certificate chain block {} has label '{}', expected '{}'",
                    index, block.label, CERTIFICATE_LABEL
                ),
                CHAIN_FIELD,
            ));
        }

        let cert = block.parse_x509().map_err(|e| {
            CertError::validation_field(
                format!("certificate chain block {} is not a valid X.509 certificate: {}", index, e),
                CHAIN_FIELD,
            )
        })?;

        if index == 0 {
            summary = Some(ChainSummary {
                certificates: blocks.len(),
                leaf_subject: cert.subject().to_string(),
                leaf_not_after: DateTime::from_timestamp(cert.validity().not_after.timestamp(), 0),
            });
        }
    }

    summary.ok_or_else(|| {
        CertError::validation_field("certificate chain does not contain a leaf", CHAIN_FIELD)
    })
}

/// Validate a PEM private key.
pub fn validate_private_key(key: &SecretString) -> Result<()> {
    if key.is_blank() {
        return Err(CertError::validation_field("private key is required", KEY_FIELD));
    }

    let raw = key.expose_secret().as_bytes();
    let blocks = parse_blocks(raw, KEY_FIELD)?;
    match blocks.as_slice() {
        [block] if block.label.ends_with("PRIVATE KEY") => {}
        [block] => {
            return Err(CertError::validation_field(
                format!("private key block has unexpected label '{}'", block.label),
                KEY_FIELD,
            ));
        }
        [] => {
            return Err(CertError::validation_field(
                "private key does not contain any PEM blocks",
                KEY_FIELD,
            ));
        }
        _ => {
            return Err(CertError::validation_field(
                format!("expected exactly one private key block, found {}", blocks.len()),
                KEY_FIELD,
            ));
        }
    }

    // Accepts PKCS#1, PKCS#8 and SEC1; encrypted keys are rejected here.
    PrivateKeyDer::from_pem_slice(raw).map_err(|_| {
        CertError::validation_field(
            "private key is not a supported unencrypted PEM private key",
            KEY_FIELD,
        )
    })?;

    Ok(())
}

fn parse_blocks(input: &[u8], field: &str) -> Result<Vec<Pem>> {
    Pem::iter_from_buffer(input)
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| CertError::validation_field(format!("malformed PEM: {}", e), field))
}
