//! Mock session backed by a [`MockServer`].

use odbc_session::{Session, SessionError};

use crate::server::MockServer;

/// A session connected to a [`MockServer`].
#[derive(Debug)]
pub struct MockSession {
    id: u64,
    server: MockServer,
    connected: bool,
}

impl MockSession {
    /// Server-assigned session identity, starting at 1.
    #[must_use]
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Whether `disconnect` has not been called yet.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.connected
    }

    fn check_connection(&self) -> Result<(), SessionError> {
        if !self.connected {
            return Err(SessionError::ConnectionLost("not connected".into()));
        }
        if self.server.is_killed(self.id) {
            return Err(SessionError::ConnectionLost(format!(
                "session {} terminated by server",
                self.id
            )));
        }
        Ok(())
    }
}

impl Session for MockSession {
    type Config = MockServer;
    type Rows = Vec<String>;

    fn connect(config: &MockServer) -> Result<Self, SessionError> {
        let id = config.open_session()?;
        Ok(Self {
            id,
            server: config.clone(),
            connected: true,
        })
    }

    fn disconnect(&mut self) {
        self.server.close_session(self.id, self.connected);
        self.connected = false;
    }

    fn is_alive(&mut self) -> bool {
        self.connected && self.server.probe(self.id)
    }

    fn execute(&mut self, sql: &str) -> Result<u64, SessionError> {
        self.check_connection()?;
        if sql.trim().is_empty() {
            return Err(SessionError::QueryFailed("empty statement".into()));
        }
        Ok(1)
    }

    fn query(&mut self, sql: &str) -> Result<Vec<String>, SessionError> {
        self.check_connection()?;
        if sql.trim().is_empty() {
            return Err(SessionError::QueryFailed("empty statement".into()));
        }
        Ok(vec![sql.to_string()])
    }
}
