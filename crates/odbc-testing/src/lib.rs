//! # odbc-testing
//!
//! Test infrastructure for `odbc-pool`.
//!
//! [`MockServer`] plays the database: tests script it to refuse logins, slow
//! them down or kill individual sessions, and inspect it afterwards to check
//! how many sessions were opened and how often each was disconnected.
//! [`MockSession`] is the matching [`Session`] implementation.
//!
//! ```rust,ignore
//! let server = MockServer::new();
//! let pool = Pool::<MockSession>::new(config, server.clone())?;
//!
//! let conn = pool.acquire(Duration::from_secs(1))?;
//! server.kill(conn.session()?.id());
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]

mod server;
mod session;

pub use server::MockServer;
pub use session::MockSession;

pub use odbc_session::{Session, SessionError};
