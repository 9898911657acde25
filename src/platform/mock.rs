//! In-memory platform for tests and dry runs.
//!
//! Behaves like the real platform for the certificate endpoint resource:
//! ids are assigned on create, the canonical name is `<app>.<domain>`,
//! deletes of missing endpoints report not found. On top of that it can
//! inject one-shot failures, keep deleted endpoints visible for a number of
//! reads (eventual consistency), change or drop the canonical name in a
//! response, and add latency to every call.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::Mutex;

use super::client::{EndpointRecord, PlatformClient};
use super::error::{PlatformError, Result};
use crate::domain::{AppRef, EndpointId, SecretString};

/// Platform operations, used for call counting and failure injection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MockOperation {
    Create,
    Get,
    Update,
    Delete,
    List,
}

/// A failure to return from the next matching call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockFailure {
    NotFound,
    Api { status: u16, message: String },
    Transport(String),
}

impl MockFailure {
    fn into_error(self, resource: String) -> PlatformError {
        match self {
            MockFailure::NotFound => PlatformError::not_found(resource),
            MockFailure::Api { status, message } => PlatformError::api(status, None, message),
            MockFailure::Transport(message) => PlatformError::transport(message),
        }
    }
}

/// Number of calls received per operation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CallCounts {
    pub create: u32,
    pub get: u32,
    pub update: u32,
    pub delete: u32,
    pub list: u32,
}

impl CallCounts {
    /// Calls that change remote state.
    pub fn mutating(&self) -> u32 {
        self.create + self.update + self.delete
    }

    pub fn total(&self) -> u32 {
        self.mutating() + self.get + self.list
    }
}

#[derive(Debug, Clone)]
struct StoredEndpoint {
    record: EndpointRecord,
    private_key: SecretString,
}

#[derive(Debug, Default)]
struct MockState {
    endpoints: HashMap<(String, String), StoredEndpoint>,
    // Deleted endpoints that stay visible to `get` for the given number of reads.
    lingering: HashMap<(String, String), (EndpointRecord, u32)>,
    next_id: u64,
    calls: CallCounts,
    failures: HashMap<MockOperation, MockFailure>,
    delete_lag: u32,
    cname_on_next_update: Option<String>,
    omit_cname_on_next_create: bool,
}

/// In-memory [`PlatformClient`].
#[derive(Debug)]
pub struct MockPlatformClient {
    platform_domain: String,
    latency: Option<Duration>,
    state: Mutex<MockState>,
}

impl MockPlatformClient {
    /// Create a mock platform serving apps under `platform_domain`.
    pub fn new(platform_domain: impl Into<String>) -> Self {
        Self { platform_domain: platform_domain.into(), latency: None, state: Mutex::default() }
    }

    /// Delay every call by `latency`.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Keep deleted endpoints visible to the next `reads` get calls.
    pub async fn set_delete_lag(&self, reads: u32) {
        self.state.lock().await.delete_lag = reads;
    }

    /// Fail the next call of `operation` with `failure`.
    pub async fn fail_next(&self, operation: MockOperation, failure: MockFailure) {
        self.state.lock().await.failures.insert(operation, failure);
    }

    /// Report `cname` instead of the current canonical name on the next update.
    pub async fn change_cname_on_next_update(&self, cname: impl Into<String>) {
        self.state.lock().await.cname_on_next_update = Some(cname.into());
    }

    /// Leave the canonical name out of the next create response.
    pub async fn omit_cname_on_next_create(&self) {
        self.state.lock().await.omit_cname_on_next_create = true;
    }

    pub async fn calls(&self) -> CallCounts {
        self.state.lock().await.calls
    }

    /// Current record of a live endpoint.
    pub async fn endpoint(&self, app: &AppRef, id: &EndpointId) -> Option<EndpointRecord> {
        let state = self.state.lock().await;
        state.endpoints.get(&key(app, id)).map(|stored| stored.record.clone())
    }

    /// Private key the endpoint was last configured with.
    pub async fn private_key(&self, app: &AppRef, id: &EndpointId) -> Option<SecretString> {
        let state = self.state.lock().await;
        state.endpoints.get(&key(app, id)).map(|stored| stored.private_key.clone())
    }

    /// Number of live endpoints across all apps.
    pub async fn endpoint_count(&self) -> usize {
        self.state.lock().await.endpoints.len()
    }

    fn canonical_name(&self, app: &AppRef) -> String {
        format!("{}.{}", app, self.platform_domain)
    }

    async fn enter(&self, operation: MockOperation, resource: String) -> Result<()> {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }

        let mut state = self.state.lock().await;
        match operation {
            MockOperation::Create => state.calls.create += 1,
            MockOperation::Get => state.calls.get += 1,
            MockOperation::Update => state.calls.update += 1,
            MockOperation::Delete => state.calls.delete += 1,
            MockOperation::List => state.calls.list += 1,
        }

        match state.failures.remove(&operation) {
            Some(failure) => Err(failure.into_error(resource)),
            None => Ok(()),
        }
    }
}

fn key(app: &AppRef, id: &EndpointId) -> (String, String) {
    (app.as_str().to_string(), id.as_str().to_string())
}

fn resource(app: &AppRef, id: Option<&EndpointId>) -> String {
    match id {
        Some(id) => format!("apps/{}/ssl-endpoints/{}", app, id),
        None => format!("apps/{}/ssl-endpoints", app),
    }
}

#[async_trait]
impl PlatformClient for MockPlatformClient {
    async fn create_endpoint(
        &self,
        app: &AppRef,
        chain: &str,
        key_pem: &SecretString,
    ) -> Result<EndpointRecord> {
        self.enter(MockOperation::Create, resource(app, None)).await?;

        let mut state = self.state.lock().await;
        state.next_id += 1;
        let id = format!("{:08x}-0000-4000-8000-{:012x}", state.next_id, state.next_id);

        let record = EndpointRecord {
            id: id.clone(),
            name: Some(format!("endpoint-{}", state.next_id)),
            cname: Some(self.canonical_name(app)),
            certificate_chain: chain.to_string(),
            updated_at: Some(Utc::now()),
        };

        state.endpoints.insert(
            (app.as_str().to_string(), id),
            StoredEndpoint { record: record.clone(), private_key: key_pem.clone() },
        );

        if std::mem::take(&mut state.omit_cname_on_next_create) {
            return Ok(EndpointRecord { cname: None, ..record });
        }
        Ok(record)
    }

    async fn get_endpoint(&self, app: &AppRef, id: &EndpointId) -> Result<EndpointRecord> {
        let path = resource(app, Some(id));
        self.enter(MockOperation::Get, path.clone()).await?;

        let mut state = self.state.lock().await;
        let k = key(app, id);
        if let Some(stored) = state.endpoints.get(&k) {
            return Ok(stored.record.clone());
        }

        if let Some((record, remaining)) = state.lingering.get_mut(&k) {
            let record = record.clone();
            *remaining -= 1;
            if *remaining == 0 {
                state.lingering.remove(&k);
            }
            return Ok(record);
        }

        Err(PlatformError::not_found(path))
    }

    async fn update_endpoint(
        &self,
        app: &AppRef,
        id: &EndpointId,
        chain: &str,
        key_pem: &SecretString,
    ) -> Result<EndpointRecord> {
        let path = resource(app, Some(id));
        self.enter(MockOperation::Update, path.clone()).await?;

        let mut guard = self.state.lock().await;
        let state = &mut *guard;
        let stored =
            state.endpoints.get_mut(&key(app, id)).ok_or_else(|| PlatformError::not_found(path))?;

        // The override stays armed until an update actually lands.
        stored.record.certificate_chain = chain.to_string();
        stored.record.updated_at = Some(Utc::now());
        if let Some(cname) = state.cname_on_next_update.take() {
            stored.record.cname = Some(cname);
        }
        stored.private_key = key_pem.clone();

        Ok(stored.record.clone())
    }

    async fn delete_endpoint(&self, app: &AppRef, id: &EndpointId) -> Result<()> {
        let path = resource(app, Some(id));
        self.enter(MockOperation::Delete, path.clone()).await?;

        let mut state = self.state.lock().await;
        let k = key(app, id);
        let stored = state.endpoints.remove(&k).ok_or_else(|| PlatformError::not_found(path))?;

        if state.delete_lag > 0 {
            let lag = state.delete_lag;
            state.lingering.insert(k, (stored.record, lag));
        }

        Ok(())
    }

    async fn list_endpoints(&self, app: &AppRef) -> Result<Vec<EndpointRecord>> {
        self.enter(MockOperation::List, resource(app, None)).await?;

        let state = self.state.lock().await;
        let mut records: Vec<EndpointRecord> = state
            .endpoints
            .iter()
            .filter(|((owner, _), _)| owner == app.as_str())
            .map(|(_, stored)| stored.record.clone())
            .collect();
        records.sort_by(|a, b| a.id.cmp(&b.id));

        Ok(records)
    }
}
