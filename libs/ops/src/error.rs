//! Error taxonomy for convergence operations.

use std::time::Duration;

use stratus_openstack::ApiError;
use stratus_wait::WaitError;
use thiserror::Error;

/// Errors from the higher-level cloud operations.
#[derive(Debug, Error)]
pub enum OpsError {
    /// A service call failed (outside any tolerated set).
    #[error(transparent)]
    Api(#[from] ApiError),

    /// A wait exhausted its time budget.
    #[error("timed out after {elapsed:?} waiting for {waiting_for}")]
    Timeout {
        waiting_for: String,
        elapsed: Duration,
    },

    /// A server reached ERROR status. Raised by predicates as soon as the
    /// status is observed; polling cannot recover an errored instance, so
    /// waiting out the timeout would only delay the report.
    #[error("server {name} ({id}) is in ERROR status: {detail}")]
    ServerInError {
        id: String,
        name: String,
        detail: String,
    },

    /// The cloud is not in a state the operation requires (no external
    /// network, no candidate agent to move a resource to, ...).
    #[error("{0}")]
    Environment(String),

    /// Harness-side failure (a trigger task panicked).
    #[error("internal error: {0}")]
    Internal(String),
}

impl OpsError {
    /// Returns true if this is a wait timeout.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }

    /// Returns true for a 404 from the underlying service.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Api(api) if api.is_not_found())
    }
}

/// Flatten a wait outcome so helpers expose a single error type while the
/// timeout stays a distinct variant.
impl From<WaitError<OpsError>> for OpsError {
    fn from(err: WaitError<OpsError>) -> Self {
        match err {
            WaitError::Timeout {
                waiting_for,
                elapsed,
            } => OpsError::Timeout {
                waiting_for,
                elapsed,
            },
            WaitError::Fatal(inner) => inner,
        }
    }
}
