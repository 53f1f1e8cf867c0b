//! Error taxonomy for OpenStack API calls.

use thiserror::Error;

/// Errors from any OpenStack service call.
///
/// Call sites that tolerate specific failures while polling (a lookup on a
/// resource that does not exist yet, a delete racing another delete) match
/// on the narrow variants via [`ApiError::is_not_found`] and
/// [`ApiError::is_conflict`] rather than catching everything.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Authentication or service-catalog failure.
    #[error("authentication failed: {0}")]
    Auth(String),

    /// The requested resource does not exist (HTTP 404).
    #[error("resource not found: {0}")]
    NotFound(String),

    /// The request conflicts with the resource's current state (HTTP 409).
    #[error("conflict: {0}")]
    Conflict(String),

    /// Any other non-success response from the service.
    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    /// Transport-level failure.
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),
}

impl ApiError {
    /// Returns true for a 404 response.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    /// Returns true for a 409 response.
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict(_))
    }
}
