//! Caller-supplied cancellation and deadline for reconciler operations.
//!
//! Every operation races its platform call against the context. When the
//! token fires or the deadline passes first, the call future is dropped and
//! the operation fails with [`CertError::Canceled`]; no descriptor is produced.

use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::errors::{CancelReason, CertError, Result};

/// Cancellation signal and optional deadline forwarded to platform calls
#[derive(Debug, Clone, Default)]
pub struct OperationContext {
    cancel: CancellationToken,
    deadline: Option<Instant>,
}

impl OperationContext {
    /// A context that never cancels on its own.
    pub fn new() -> Self {
        Self::default()
    }

    /// Use an existing token, e.g. a child of the orchestration loop's token.
    pub fn with_cancellation(token: CancellationToken) -> Self {
        Self { cancel: token, deadline: None }
    }

    /// Fail operations that have not completed `timeout` from now.
    ///
    /// A timeout too large to represent as an instant leaves the context
    /// without a deadline.
    pub fn with_timeout(self, timeout: Duration) -> Self {
        match Instant::now().checked_add(timeout) {
            Some(deadline) => self.with_deadline(deadline),
            None => self,
        }
    }

    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Cancel every operation running under this context (and its clones).
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Fail fast when the context is already done.
    pub(crate) fn check(&self, operation: &str) -> Result<()> {
        if self.cancel.is_cancelled() {
            return Err(CertError::canceled(operation, CancelReason::Canceled));
        }
        if matches!(self.deadline, Some(deadline) if deadline <= Instant::now()) {
            return Err(CertError::canceled(operation, CancelReason::DeadlineExceeded));
        }
        Ok(())
    }

    /// Drive `fut` to completion unless the context is canceled or times out first.
    pub(crate) async fn guard<F>(&self, operation: &str, fut: F) -> Result<F::Output>
    where
        F: Future,
    {
        self.check(operation)?;

        let deadline = async {
            match self.deadline {
                Some(deadline) => tokio::time::sleep_until(deadline).await,
                None => std::future::pending::<()>().await,
            }
        };

        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => {
                Err(CertError::canceled(operation, CancelReason::Canceled))
            }
            _ = deadline => {
                Err(CertError::canceled(operation, CancelReason::DeadlineExceeded))
            }
            output = fut => Ok(output),
        }
    }
}
