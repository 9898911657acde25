//! # Endpoint Reconciler
//!
//! Lifecycle operations for a single certificate endpoint: create, read,
//! reconcile (read + drift check + optional update), update, delete and
//! resolve-by-canonical-name.
//!
//! Every operation performs at most one platform call (reconcile: a read and
//! at most one update), never retries, and races the call against the
//! caller's [`OperationContext`]. Input is validated locally before anything
//! is sent.
//!
//! An endpoint whose most recent read, delete or update reported it missing is
//! stale. `update` refuses stale endpoints with [`CertError::NotFound`] without
//! contacting the platform until a read or `resolve` finds the endpoint again.
//!
//! ```rust,ignore
//! let reconciler = Reconciler::new(Arc::new(HerokuPlatformClient::new(&config.platform)?));
//! let ctx = OperationContext::new().with_timeout(Duration::from_secs(30));
//!
//! let created = reconciler.create(&ctx, &desired).await?;
//! match reconciler.reconcile(&ctx, created.id(), &desired).await? {
//!     ReconcileOutcome::Unchanged(_) => {}
//!     ReconcileOutcome::Updated(d) => println!("rotated {}", d.id()),
//! }
//! ```

pub mod context;
pub mod drift;
pub mod verify;

use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

use dashmap::DashSet;
use tracing::{debug, error, info, instrument, warn, Instrument};

use crate::domain::{AppRef, CertificateDescriptor, DesiredCertificate, EndpointId, EndpointState};
use crate::errors::{CertError, Result};
use crate::observability::MetricsRecorder;
use crate::platform::{EndpointRecord, PlatformClient, PlatformError};

pub use context::OperationContext;
pub use drift::{chains_differ, first_difference, has_drift};
pub use verify::{verify_absent, verify_absent_with_retry, RetryConfig};

/// Result of [`Reconciler::reconcile`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// No drift; the descriptor reflects the fresh read
    Unchanged(CertificateDescriptor),
    /// Drift was found and the endpoint was updated in place
    Updated(CertificateDescriptor),
}

impl ReconcileOutcome {
    pub fn descriptor(&self) -> &CertificateDescriptor {
        match self {
            Self::Unchanged(d) | Self::Updated(d) => d,
        }
    }

    pub fn into_descriptor(self) -> CertificateDescriptor {
        match self {
            Self::Unchanged(d) | Self::Updated(d) => d,
        }
    }

    pub fn was_updated(&self) -> bool {
        matches!(self, Self::Updated(_))
    }
}

type EndpointKey = (String, String);

/// Certificate endpoint reconciler
///
/// Clones share the platform client and the set of endpoints known to be gone.
#[derive(Clone)]
pub struct Reconciler {
    client: Arc<dyn PlatformClient>,
    metrics: MetricsRecorder,
    gone: Arc<DashSet<EndpointKey>>,
}

impl std::fmt::Debug for Reconciler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reconciler").field("gone", &self.gone.len()).finish_non_exhaustive()
    }
}

impl Reconciler {
    pub fn new(client: Arc<dyn PlatformClient>) -> Self {
        Self { client, metrics: MetricsRecorder::new(), gone: Arc::new(DashSet::new()) }
    }

    /// Whether the endpoint was last reported missing by the platform.
    pub fn is_stale(&self, app: &AppRef, id: &EndpointId) -> bool {
        self.gone.contains(&endpoint_key(app, id))
    }

    fn mark_gone(&self, app: &AppRef, id: &EndpointId) {
        self.gone.insert(endpoint_key(app, id));
    }

    fn mark_present(&self, app: &AppRef, id: &EndpointId) {
        self.gone.remove(&endpoint_key(app, id));
    }

    pub(crate) fn metrics(&self) -> &MetricsRecorder {
        &self.metrics
    }

    /// Create a new endpoint from `desired`.
    ///
    /// On success the descriptor carries the platform-assigned id and
    /// canonical name, and its observed chain equals the submitted chain.
    ///
    /// # Errors
    ///
    /// - [`CertError::Validation`] for missing or malformed PEM input; nothing is sent
    /// - [`CertError::Remote`] when the platform call fails
    /// - [`CertError::Consistency`] when the platform returns no id or canonical name
    /// - [`CertError::Canceled`] when the context fires first
    #[instrument(skip(self, ctx, desired), fields(app = %desired.app), name = "create_endpoint")]
    pub async fn create(
        &self,
        ctx: &OperationContext,
        desired: &DesiredCertificate,
    ) -> Result<CertificateDescriptor> {
        self.validate("create", desired)?;

        let record = self
            .call(
                ctx,
                "create",
                &desired.app,
                None,
                self.client.create_endpoint(
                    &desired.app,
                    &desired.certificate_chain,
                    &desired.private_key,
                ),
            )
            .await?
            .map_err(|e| CertError::remote("create", e))?;

        let descriptor = confirm(&desired.app, record, &desired.certificate_chain)?;

        info!(
            endpoint_id = %descriptor.id(),
            canonical_name = %descriptor.canonical_name(),
            "Certificate endpoint created"
        );

        Ok(descriptor)
    }

    /// Fetch the current state of an endpoint.
    ///
    /// A platform not-found is reported as [`EndpointState::Absent`], not as an error.
    #[instrument(skip(self, ctx), fields(app = %app, endpoint_id = %id), name = "read_endpoint")]
    pub async fn read(
        &self,
        ctx: &OperationContext,
        app: &AppRef,
        id: &EndpointId,
    ) -> Result<EndpointState> {
        let result = self
            .call(ctx, "read", app, Some(id), self.client.get_endpoint(app, id))
            .await?;

        let record = match result {
            Ok(record) => record,
            Err(e) if e.is_not_found() => {
                debug!("Certificate endpoint not found");
                self.mark_gone(app, id);
                return Ok(EndpointState::Absent);
            }
            Err(e) => return Err(CertError::remote("read", e)),
        };

        if record.id != id.as_str() {
            return Err(CertError::consistency_for(
                format!("platform returned endpoint '{}' for a read of '{}'", record.id, id),
                id.as_str(),
            ));
        }

        let descriptor = bind(app, record)?;
        self.mark_present(app, id);
        Ok(EndpointState::Present(descriptor))
    }

    /// Bring an existing endpoint in line with `desired`.
    ///
    /// Reads the endpoint and updates it only when its chain drifted. Two
    /// calls with the same desired state issue at most one update in total.
    ///
    /// # Errors
    ///
    /// - [`CertError::NotFound`] when the endpoint no longer exists; the caller recreates it
    /// - any error of [`Reconciler::read`] or [`Reconciler::update`]
    #[instrument(skip(self, ctx, desired), fields(app = %desired.app, endpoint_id = %id), name = "reconcile_endpoint")]
    pub async fn reconcile(
        &self,
        ctx: &OperationContext,
        id: &EndpointId,
        desired: &DesiredCertificate,
    ) -> Result<ReconcileOutcome> {
        self.validate("reconcile", desired)?;

        let current = self.read(ctx, &desired.app, id).await?.into_present(&desired.app, id)?;

        let drifted = has_drift(desired, &current);
        self.metrics.record_drift_check(drifted);

        if !drifted {
            debug!("Certificate chain matches, no update needed");
            return Ok(ReconcileOutcome::Unchanged(current));
        }

        info!(
            first_difference = ?first_difference(&desired.certificate_chain, current.observed_chain()),
            "Certificate chain drift detected"
        );

        let updated = self.apply_update(ctx, &current, desired).await?;
        Ok(ReconcileOutcome::Updated(updated))
    }

    /// Replace the chain and key of an existing endpoint.
    ///
    /// Usually reached through [`Reconciler::reconcile`]. Calling it directly
    /// with an unchanged chain rotates the private key, which drift detection
    /// cannot see.
    ///
    /// # Errors
    ///
    /// - [`CertError::Validation`] for malformed input or a descriptor of another app
    /// - [`CertError::NotFound`] when the endpoint was deleted in the meantime, or
    ///   is stale; a stale endpoint is refused without a platform call
    /// - [`CertError::Remote`] when the platform call fails
    /// - [`CertError::Consistency`] when the canonical name changed
    #[instrument(skip(self, ctx, current, desired), fields(app = %desired.app, endpoint_id = %current.id()), name = "update_endpoint")]
    pub async fn update(
        &self,
        ctx: &OperationContext,
        current: &CertificateDescriptor,
        desired: &DesiredCertificate,
    ) -> Result<CertificateDescriptor> {
        self.validate("update", desired)?;

        if current.app() != &desired.app {
            self.metrics.record_validation_failure("update");
            return Err(CertError::validation_field(
                format!(
                    "endpoint belongs to app '{}', desired configuration targets '{}'",
                    current.app(),
                    desired.app
                ),
                "app",
            ));
        }

        if self.is_stale(current.app(), current.id()) {
            debug!("Endpoint is stale, refusing update until it is re-resolved");
            return Err(CertError::not_found(current.app().as_str(), current.id().as_str()));
        }

        if !chains_differ(&desired.certificate_chain, current.observed_chain()) {
            debug!("Chain unchanged, forcing private key rotation");
        }

        self.apply_update(ctx, current, desired).await
    }

    async fn apply_update(
        &self,
        ctx: &OperationContext,
        current: &CertificateDescriptor,
        desired: &DesiredCertificate,
    ) -> Result<CertificateDescriptor> {
        let (app, id) = (current.app(), current.id());

        let record = self
            .call(
                ctx,
                "update",
                app,
                Some(id),
                self.client.update_endpoint(
                    app,
                    id,
                    &desired.certificate_chain,
                    &desired.private_key,
                ),
            )
            .await?
            .map_err(|e| {
                if e.is_not_found() {
                    self.mark_gone(app, id);
                    CertError::not_found(app.as_str(), id.as_str())
                } else {
                    CertError::remote("update", e)
                }
            })?;

        if record.id != id.as_str() {
            return Err(CertError::consistency_for(
                format!("platform updated endpoint '{}' instead of '{}'", record.id, id),
                id.as_str(),
            ));
        }

        let updated = confirm(app, record, &desired.certificate_chain)?;

        if updated.canonical_name() != current.canonical_name() {
            error!(
                previous = %current.canonical_name(),
                reported = %updated.canonical_name(),
                "Canonical name changed during update"
            );
            return Err(CertError::consistency_for(
                format!(
                    "canonical name changed from '{}' to '{}' during update",
                    current.canonical_name(),
                    updated.canonical_name()
                ),
                id.as_str(),
            ));
        }

        info!("Certificate endpoint updated");
        Ok(updated)
    }

    /// Delete an endpoint. Deleting an endpoint that does not exist succeeds.
    #[instrument(skip(self, ctx), fields(app = %app, endpoint_id = %id), name = "delete_endpoint")]
    pub async fn delete(&self, ctx: &OperationContext, app: &AppRef, id: &EndpointId) -> Result<()> {
        match self.call(ctx, "delete", app, Some(id), self.client.delete_endpoint(app, id)).await? {
            Ok(()) => {
                info!("Certificate endpoint deleted");
                self.mark_gone(app, id);
                Ok(())
            }
            Err(e) if e.is_not_found() => {
                debug!("Certificate endpoint already gone");
                self.mark_gone(app, id);
                Ok(())
            }
            Err(e) => Err(CertError::remote("delete", e)),
        }
    }

    /// Find the endpoint of `app` serving `canonical_name`.
    ///
    /// Used to rebind state whose endpoint id went stale. Several endpoints
    /// claiming the same canonical name is a consistency error.
    #[instrument(skip(self, ctx), fields(app = %app), name = "resolve_endpoint")]
    pub async fn resolve(
        &self,
        ctx: &OperationContext,
        app: &AppRef,
        canonical_name: &str,
    ) -> Result<EndpointState> {
        if canonical_name.trim().is_empty() {
            self.metrics.record_validation_failure("resolve");
            return Err(CertError::validation_field(
                "canonical name cannot be empty",
                "canonical_name",
            ));
        }

        let records = self
            .call(ctx, "list", app, None, self.client.list_endpoints(app))
            .await?
            .map_err(|e| CertError::remote("list", e))?;

        let mut matching =
            records.into_iter().filter(|r| r.cname.as_deref() == Some(canonical_name));

        let Some(record) = matching.next() else {
            debug!(canonical_name, "No endpoint serves canonical name");
            return Ok(EndpointState::Absent);
        };

        if let Some(other) = matching.next() {
            return Err(CertError::consistency(format!(
                "endpoints '{}' and '{}' both claim canonical name '{}'",
                record.id, other.id, canonical_name
            )));
        }

        let descriptor = bind(app, record)?;
        self.mark_present(app, descriptor.id());
        debug!(endpoint_id = %descriptor.id(), canonical_name, "Endpoint resolved");
        Ok(EndpointState::Present(descriptor))
    }

    fn validate(&self, operation: &str, desired: &DesiredCertificate) -> Result<()> {
        desired.validate().map_err(|e| {
            self.metrics.record_validation_failure(operation);
            warn!(operation, error = %e, "Rejected certificate input");
            e
        })
    }

    /// Run one platform call under the context, recording its outcome.
    async fn call<T, F>(
        &self,
        ctx: &OperationContext,
        operation: &'static str,
        app: &AppRef,
        id: Option<&EndpointId>,
        fut: F,
    ) -> Result<std::result::Result<T, PlatformError>>
    where
        F: Future<Output = std::result::Result<T, PlatformError>>,
    {
        let span = crate::endpoint_span!(operation, app);
        if let Some(id) = id {
            span.record("endpoint_id", tracing::field::display(id));
        }

        let started = Instant::now();
        let result = ctx.guard(operation, fut).instrument(span.clone()).await;
        let elapsed = started.elapsed();

        let outcome = match &result {
            Ok(Ok(_)) => "success",
            Ok(Err(e)) if e.is_not_found() => "not_found",
            Ok(Err(_)) => "error",
            Err(_) => "canceled",
        };
        self.metrics.record_remote_call(operation, outcome, elapsed.as_secs_f64());

        span.in_scope(|| match &result {
            Ok(Err(e)) if !e.is_not_found() => warn!(
                outcome,
                error = %e,
                duration_ms = elapsed.as_millis() as u64,
                "Platform call failed"
            ),
            Err(e) => warn!(outcome, error = %e, "Platform call abandoned"),
            _ => debug!(outcome, duration_ms = elapsed.as_millis() as u64, "Platform call completed"),
        });

        result
    }
}

fn endpoint_key(app: &AppRef, id: &EndpointId) -> EndpointKey {
    (app.as_str().to_string(), id.as_str().to_string())
}

/// Build a descriptor from a platform record read without local desired state.
fn bind(app: &AppRef, record: EndpointRecord) -> Result<CertificateDescriptor> {
    let id = EndpointId::parse(record.id).map_err(|_| {
        CertError::consistency("platform returned a certificate endpoint without an id")
    })?;

    let canonical_name = match record.cname {
        Some(cname) if !cname.trim().is_empty() => cname,
        _ => {
            return Err(CertError::consistency_for(
                "platform returned a certificate endpoint without a canonical name",
                id.as_str(),
            ))
        }
    };

    Ok(CertificateDescriptor::bound(
        id,
        app.clone(),
        canonical_name,
        record.name,
        None,
        record.certificate_chain,
        record.updated_at,
    ))
}

/// Build a descriptor from the response to a create or update of `chain`.
fn confirm(app: &AppRef, record: EndpointRecord, chain: &str) -> Result<CertificateDescriptor> {
    let echoed = !record.certificate_chain.is_empty();
    let descriptor = bind(app, record)?;

    if echoed && chains_differ(chain, descriptor.observed_chain()) {
        warn!(
            endpoint_id = %descriptor.id(),
            "Platform echoed a different certificate chain than submitted"
        );
    }

    Ok(descriptor.confirmed(chain))
}
