//! Certificate endpoint domain entities.
//!
//! [`DesiredCertificate`] is what the configuration engine declares.
//! [`CertificateDescriptor`] is an endpoint bound to a platform id; only the
//! reconciler builds one, from a confirmed platform response, so its observed
//! fields always reflect the last successful remote call.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::id::{AppRef, EndpointId};
use super::secret::SecretString;
use crate::errors::{CertError, Result};
use crate::validation;

/// Declared certificate configuration for one endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DesiredCertificate {
    pub app: AppRef,
    /// Full PEM chain, leaf first. Compared byte-for-byte, never normalized.
    pub certificate_chain: String,
    /// PEM private key paired with the leaf. Write-only on the platform.
    pub private_key: SecretString,
}

impl DesiredCertificate {
    pub fn new(
        app: AppRef,
        certificate_chain: impl Into<String>,
        private_key: impl Into<SecretString>,
    ) -> Self {
        Self { app, certificate_chain: certificate_chain.into(), private_key: private_key.into() }
    }

    /// Check that chain and key are present and well-formed PEM.
    pub fn validate(&self) -> Result<()> {
        validation::validate_certificate_chain(&self.certificate_chain)?;
        validation::validate_private_key(&self.private_key)?;
        Ok(())
    }
}

/// A certificate endpoint bound to a platform identifier
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CertificateDescriptor {
    id: EndpointId,
    app: AppRef,
    canonical_name: String,
    name: Option<String>,
    certificate_chain: Option<String>,
    observed_chain: String,
    updated_at: Option<DateTime<Utc>>,
}

impl CertificateDescriptor {
    pub(crate) fn bound(
        id: EndpointId,
        app: AppRef,
        canonical_name: String,
        name: Option<String>,
        certificate_chain: Option<String>,
        observed_chain: String,
        updated_at: Option<DateTime<Utc>>,
    ) -> Self {
        Self { id, app, canonical_name, name, certificate_chain, observed_chain, updated_at }
    }

    pub fn id(&self) -> &EndpointId {
        &self.id
    }

    pub fn app(&self) -> &AppRef {
        &self.app
    }

    /// Platform-assigned hostname alias of the endpoint.
    pub fn canonical_name(&self) -> &str {
        &self.canonical_name
    }

    /// Platform-assigned endpoint name, when the platform reports one.
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Chain last submitted through this crate, if known.
    pub fn certificate_chain(&self) -> Option<&str> {
        self.certificate_chain.as_deref()
    }

    /// Chain as last read back from the platform.
    pub fn observed_chain(&self) -> &str {
        &self.observed_chain
    }

    pub fn updated_at(&self) -> Option<DateTime<Utc>> {
        self.updated_at
    }

    /// Record a chain the platform just accepted through create or update.
    pub(crate) fn confirmed(mut self, chain: &str) -> Self {
        self.certificate_chain = Some(chain.to_string());
        self.observed_chain = chain.to_string();
        self
    }
}

/// Result of looking up an endpoint on the platform
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EndpointState {
    /// The platform reports no endpoint with this identifier
    Absent,
    /// The endpoint exists
    Present(CertificateDescriptor),
}

impl EndpointState {
    pub fn is_present(&self) -> bool {
        matches!(self, Self::Present(_))
    }

    pub fn as_present(&self) -> Option<&CertificateDescriptor> {
        match self {
            Self::Present(descriptor) => Some(descriptor),
            Self::Absent => None,
        }
    }

    /// Require the endpoint to exist, turning `Absent` into a not found error.
    pub fn into_present(self, app: &AppRef, id: &EndpointId) -> Result<CertificateDescriptor> {
        match self {
            Self::Present(descriptor) => Ok(descriptor),
            Self::Absent => Err(CertError::not_found(app.as_str(), id.as_str())),
        }
    }
}
