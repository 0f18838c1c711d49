//! Session error types.

use thiserror::Error;

/// Errors reported by a [`Session`](crate::Session) implementation.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SessionError {
    /// Establishing the session failed.
    #[error("connect failed: {0}")]
    ConnectFailed(String),

    /// A statement or query was rejected.
    #[error("query failed: {0}")]
    QueryFailed(String),

    /// The connection to the server was lost.
    #[error("connection lost: {0}")]
    ConnectionLost(String),

    /// IO error on the underlying transport.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl SessionError {
    /// Whether this error means the session itself is no longer usable.
    ///
    /// A failed query leaves the session healthy; a lost connection does not.
    #[must_use]
    pub fn is_connectivity(&self) -> bool {
        matches!(self, Self::ConnectionLost(_) | Self::Io(_))
    }
}
