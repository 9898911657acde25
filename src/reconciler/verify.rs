//! Destroy verification.
//!
//! [`verify_absent`] is single-shot like every other reconciler operation.
//! Platforms may keep serving an endpoint for a short while after a delete,
//! so callers that need eventual confirmation use
//! [`verify_absent_with_retry`], which only retries on
//! [`CertError::StillExists`].

use std::time::Duration;

use tracing::{debug, info, warn};

use super::{OperationContext, Reconciler};
use crate::domain::{AppRef, EndpointId, EndpointState};
use crate::errors::{CertError, Result};

/// Backoff policy for caller-driven verification retries.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of attempts, the first one included
    pub max_attempts: u32,
    /// Backoff before the second attempt
    pub initial_backoff: Duration,
    /// Cap for exponential growth
    pub max_backoff: Duration,
    /// Growth factor between consecutive backoffs
    pub backoff_multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            initial_backoff: Duration::from_millis(500),
            max_backoff: Duration::from_secs(10),
            backoff_multiplier: 2.0,
        }
    }
}

impl RetryConfig {
    /// Backoff to wait before `attempt` (0-indexed; the first attempt never waits).
    pub fn backoff_for_attempt(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return Duration::ZERO;
        }

        let factor = self.backoff_multiplier.powi(attempt as i32 - 1);
        let millis = (self.initial_backoff.as_millis() as f64 * factor)
            .min(self.max_backoff.as_millis() as f64);

        Duration::from_millis(millis as u64)
    }
}

/// Confirm that an endpoint no longer resolves.
///
/// # Errors
///
/// - [`CertError::StillExists`] if the platform still reports the endpoint
/// - any other read error unchanged; absence cannot be confirmed under failure
pub async fn verify_absent(
    reconciler: &Reconciler,
    ctx: &OperationContext,
    app: &AppRef,
    id: &EndpointId,
) -> Result<()> {
    let state = reconciler.read(ctx, app, id).await?;
    let confirmed = !state.is_present();
    reconciler.metrics().record_destroy_verification(confirmed);

    match state {
        EndpointState::Absent => {
            debug!(app = %app, endpoint_id = %id, "Endpoint absence confirmed");
            Ok(())
        }
        EndpointState::Present(_) => Err(CertError::still_exists(app.as_str(), id.as_str())),
    }
}

/// Repeat [`verify_absent`] with backoff while the endpoint is still visible.
///
/// Stops immediately on any error other than `StillExists`. Waiting between
/// attempts honors the context's cancellation and deadline.
pub async fn verify_absent_with_retry(
    reconciler: &Reconciler,
    ctx: &OperationContext,
    app: &AppRef,
    id: &EndpointId,
    retry: &RetryConfig,
) -> Result<()> {
    let max_attempts = retry.max_attempts.max(1);
    let mut attempt = 0;

    loop {
        if attempt > 0 {
            let backoff = retry.backoff_for_attempt(attempt);
            warn!(
                app = %app,
                endpoint_id = %id,
                attempt = attempt + 1,
                max_attempts,
                backoff_ms = backoff.as_millis() as u64,
                "Endpoint still visible after delete, retrying verification after backoff"
            );
            ctx.guard("verify_absent", tokio::time::sleep(backoff)).await?;
        }

        match verify_absent(reconciler, ctx, app, id).await {
            Ok(()) => {
                if attempt > 0 {
                    info!(
                        app = %app,
                        endpoint_id = %id,
                        attempts = attempt + 1,
                        "Endpoint absence confirmed after retries"
                    );
                }
                return Ok(());
            }
            Err(e @ CertError::StillExists { .. }) if attempt + 1 >= max_attempts => {
                return Err(e);
            }
            Err(CertError::StillExists { .. }) => attempt += 1,
            Err(e) => return Err(e),
        }
    }
}
