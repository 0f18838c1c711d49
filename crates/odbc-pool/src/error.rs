//! Pool error types.

use std::time::Duration;

use odbc_session::SessionError;
use thiserror::Error;

/// Errors returned by the connection pool.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum PoolError {
    /// A new session could not be established.
    ///
    /// The pool does not retry; the caller decides whether to try again.
    #[error("failed to create connection: {0}")]
    ConnectionCreationFailed(#[source] SessionError),

    /// No session became available before the deadline.
    #[error("timed out after {waited:?} waiting for a connection")]
    Timeout {
        /// How long the caller waited.
        waited: Duration,
    },

    /// The pool has been shut down.
    #[error("connection pool is shut down")]
    PoolShutdown,

    /// The connection handle was already released, detached or invalidated.
    #[error("connection handle is no longer valid")]
    InvalidHandleUse,

    /// The pool has no room for another session.
    #[error("connection pool is at capacity ({max} connections)")]
    AtCapacity {
        /// Configured maximum.
        max: usize,
    },

    /// A statement executed through a pooled connection failed.
    #[error("session error: {0}")]
    Session(#[from] SessionError),

    /// Invalid pool configuration.
    #[error("invalid pool configuration: {0}")]
    Config(String),
}

impl PoolError {
    /// Whether trying the same operation again may succeed.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Timeout { .. } | Self::ConnectionCreationFailed(_)
        )
    }
}
