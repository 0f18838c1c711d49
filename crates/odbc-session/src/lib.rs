//! # odbc-session
//!
//! The contract a physical database connection must satisfy to be managed by
//! `odbc-pool`.
//!
//! A [`Session`] owns its native handles. Establishing it, executing SQL and
//! marshalling rows are the driver's business; the pool only needs to connect,
//! disconnect, probe liveness and pass statements through.
//!
//! ## Example
//!
//! ```rust,ignore
//! use odbc_session::{Session, SessionError};
//!
//! struct OdbcSession { /* native handles */ }
//!
//! impl Session for OdbcSession {
//!     type Config = ConnectionConfig;
//!     type Rows = ResultSet;
//!
//!     fn connect(config: &ConnectionConfig) -> Result<Self, SessionError> { /* ... */ }
//!     fn disconnect(&mut self) { /* ... */ }
//!     fn is_alive(&mut self) -> bool { self.execute("SELECT 1").is_ok() }
//!     fn execute(&mut self, sql: &str) -> Result<u64, SessionError> { /* ... */ }
//!     fn query(&mut self, sql: &str) -> Result<ResultSet, SessionError> { /* ... */ }
//! }
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]

mod error;

pub use error::SessionError;

/// One live database connection.
///
/// Implementations are exclusively owned: the pool never shares a `Session`
/// between threads, it only moves it between them.
pub trait Session: Send + 'static {
    /// Settings needed to establish a session.
    type Config: Clone + Send + Sync + 'static;

    /// Result set produced by [`query`](Session::query).
    type Rows;

    /// Establish a new session.
    ///
    /// This usually performs network I/O and may block for a long time.
    fn connect(config: &Self::Config) -> Result<Self, SessionError>
    where
        Self: Sized;

    /// Release the native resources of the session.
    ///
    /// Must be idempotent and must not fail; errors are swallowed by the
    /// implementation.
    fn disconnect(&mut self);

    /// Cheap liveness probe, typically a `SELECT 1` round-trip.
    fn is_alive(&mut self) -> bool;

    /// Execute a statement, returning the number of affected rows.
    fn execute(&mut self, sql: &str) -> Result<u64, SessionError>;

    /// Execute a query and return its result set.
    fn query(&mut self, sql: &str) -> Result<Self::Rows, SessionError>;
}
