//! Sync error types.

use thiserror::Error;

/// A failed exchange with the remote.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RemoteError {
    /// Connection refused, DNS failure, reset.
    #[error("network error: {0}")]
    Network(String),

    /// No response within the configured timeout.
    #[error("request timed out")]
    Timeout,

    /// Non-2xx response.
    #[error("remote returned {status}: {body}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Response body, truncated.
        body: String,
    },

    /// The response could not be decoded.
    #[error("invalid response: {0}")]
    InvalidResponse(String),

    /// The request could not be built from the queued item.
    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

impl RemoteError {
    /// Whether retrying the same request cannot succeed.
    ///
    /// Client errors other than 408 and 429 are permanent, as is a request
    /// that could not be built.
    #[must_use]
    pub fn is_permanent(&self) -> bool {
        match self {
            Self::Status { status, .. } => {
                (400..500).contains(status) && *status != 408 && *status != 429
            },
            Self::InvalidRequest(_) => true,
            Self::Network(_) | Self::Timeout | Self::InvalidResponse(_) => false,
        }
    }
}

impl From<reqwest::Error> for RemoteError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            Self::Timeout
        } else if e.is_decode() {
            Self::InvalidResponse(e.to_string())
        } else if e.is_builder() {
            Self::InvalidRequest(e.to_string())
        } else {
            Self::Network(e.to_string())
        }
    }
}

/// Errors surfaced by reconciliation.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Remote history could not be read; the previous view stands.
    #[error("reconciliation failed: {0}")]
    Reconciliation(#[source] RemoteError),
}

/// Result type for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;

#[cfg(test)]
mod tests {
    use super::*;

    fn status(code: u16) -> RemoteError {
        RemoteError::Status {
            status: code,
            body: String::new(),
        }
    }

    #[test]
    fn test_permanent_classification() {
        assert!(status(400).is_permanent());
        assert!(status(422).is_permanent());
        assert!(!status(408).is_permanent());
        assert!(!status(429).is_permanent());
        assert!(!status(503).is_permanent());
        assert!(!RemoteError::Timeout.is_permanent());
        assert!(!RemoteError::Network("reset".into()).is_permanent());
    }
}
