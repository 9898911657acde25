//! Platform API client trait and wire types.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use super::error::Result;
use crate::domain::{AppRef, EndpointId, SecretString};

/// A certificate endpoint as reported by the platform.
///
/// Field names follow the platform's JSON representation. The private key is
/// absent: the platform never returns it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndpointRecord {
    /// Platform-assigned identifier
    pub id: String,

    /// Platform-assigned endpoint name
    #[serde(default)]
    pub name: Option<String>,

    /// Canonical hostname alias of the endpoint
    #[serde(default)]
    pub cname: Option<String>,

    /// Certificate chain currently served by the endpoint, empty when unreported
    #[serde(default, deserialize_with = "null_as_empty")]
    pub certificate_chain: String,

    /// When the endpoint was last modified
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

fn null_as_empty<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<String>::deserialize(deserializer).map(Option::unwrap_or_default)
}

/// Remote operations on certificate endpoints scoped to an application.
///
/// Implementations must be thread-safe and must report a missing endpoint
/// with [`PlatformError::NotFound`](super::PlatformError::NotFound) so the
/// reconciler can tell absence apart from failure.
///
/// # Example Implementation
///
/// ```rust,ignore
/// use certplane::platform::{EndpointRecord, PlatformClient, Result};
/// use async_trait::async_trait;
///
/// struct MyPlatform { /* HTTP client, credentials */ }
///
/// #[async_trait]
/// impl PlatformClient for MyPlatform {
///     async fn create_endpoint(&self, app: &AppRef, chain: &str, key: &SecretString)
///         -> Result<EndpointRecord> {
///         // POST the chain and key, decode the endpoint
///     }
///     // ...
/// }
/// ```
#[async_trait]
pub trait PlatformClient: Send + Sync {
    /// Provision a new endpoint serving `chain` with `key`.
    ///
    /// A failed create leaves no endpoint behind.
    async fn create_endpoint(
        &self,
        app: &AppRef,
        chain: &str,
        key: &SecretString,
    ) -> Result<EndpointRecord>;

    /// Fetch an endpoint.
    ///
    /// # Errors
    ///
    /// - [`PlatformError::NotFound`](super::PlatformError::NotFound) if it does not exist
    async fn get_endpoint(&self, app: &AppRef, id: &EndpointId) -> Result<EndpointRecord>;

    /// Replace the chain and key of an existing endpoint.
    async fn update_endpoint(
        &self,
        app: &AppRef,
        id: &EndpointId,
        chain: &str,
        key: &SecretString,
    ) -> Result<EndpointRecord>;

    /// Remove an endpoint. Deleting a missing endpoint reports `NotFound`.
    async fn delete_endpoint(&self, app: &AppRef, id: &EndpointId) -> Result<()>;

    /// List all endpoints of an application.
    async fn list_endpoints(&self, app: &AppRef) -> Result<Vec<EndpointRecord>>;
}
