//! Scriptable in-memory database server.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

use hashbrown::{HashMap, HashSet};
use odbc_session::SessionError;
use parking_lot::Mutex;

/// Shared handle to a mock database server.
///
/// Cloning the handle shares the server; it doubles as the
/// [`Session::Config`](odbc_session::Session::Config) of [`MockSession`](crate::MockSession).
#[derive(Debug, Clone, Default)]
pub struct MockServer {
    inner: Arc<ServerState>,
}

#[derive(Debug, Default)]
struct ServerState {
    next_session_id: AtomicU64,
    refuse_connections: AtomicBool,
    failing_connects: AtomicUsize,
    connect_delay: Mutex<Duration>,
    probe_delay: Mutex<Duration>,
    connects: AtomicUsize,
    probes: AtomicUsize,
    open: Mutex<HashSet<u64>>,
    killed: Mutex<HashSet<u64>>,
    disconnects: Mutex<HashMap<u64, usize>>,
}

impl MockServer {
    /// Create a server that accepts every connection.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Refuse (or accept again) every new connection.
    pub fn refuse_connections(&self, refuse: bool) {
        self.inner.refuse_connections.store(refuse, Ordering::SeqCst);
    }

    /// Refuse the next `count` connection attempts.
    pub fn fail_next_connects(&self, count: usize) {
        self.inner.failing_connects.store(count, Ordering::SeqCst);
    }

    /// Make every connection attempt take at least `delay`.
    pub fn set_connect_delay(&self, delay: Duration) {
        *self.inner.connect_delay.lock() = delay;
    }

    /// Make every liveness probe take at least `delay`.
    pub fn set_probe_delay(&self, delay: Duration) {
        *self.inner.probe_delay.lock() = delay;
    }

    /// Sever a session; its probes fail and its statements report a lost
    /// connection from now on.
    pub fn kill(&self, session_id: u64) {
        self.inner.killed.lock().insert(session_id);
    }

    /// Sever every session currently connected.
    pub fn kill_all(&self) {
        let open: Vec<u64> = self.inner.open.lock().iter().copied().collect();
        self.inner.killed.lock().extend(open);
    }

    /// Successful connections so far.
    #[must_use]
    pub fn connect_count(&self) -> usize {
        self.inner.connects.load(Ordering::SeqCst)
    }

    /// Liveness probes received so far.
    #[must_use]
    pub fn probe_count(&self) -> usize {
        self.inner.probes.load(Ordering::SeqCst)
    }

    /// Sessions connected and not yet disconnected.
    #[must_use]
    pub fn open_sessions(&self) -> usize {
        self.inner.open.lock().len()
    }

    /// How many times `disconnect` was called on the given session.
    #[must_use]
    pub fn disconnect_count(&self, session_id: u64) -> usize {
        self.inner
            .disconnects
            .lock()
            .get(&session_id)
            .copied()
            .unwrap_or(0)
    }

    /// Highest number of `disconnect` calls seen by any single session.
    #[must_use]
    pub fn max_disconnects_per_session(&self) -> usize {
        self.inner
            .disconnects
            .lock()
            .values()
            .copied()
            .max()
            .unwrap_or(0)
    }

    pub(crate) fn open_session(&self) -> Result<u64, SessionError> {
        let delay = *self.inner.connect_delay.lock();
        if !delay.is_zero() {
            std::thread::sleep(delay);
        }

        if self.inner.refuse_connections.load(Ordering::SeqCst) {
            return Err(SessionError::ConnectFailed("server refused connection".into()));
        }
        let scripted_failure = self
            .inner
            .failing_connects
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if scripted_failure {
            return Err(SessionError::ConnectFailed("login timeout expired".into()));
        }

        let id = self.inner.next_session_id.fetch_add(1, Ordering::SeqCst) + 1;
        self.inner.open.lock().insert(id);
        self.inner.connects.fetch_add(1, Ordering::SeqCst);
        tracing::trace!(session_id = id, "mock session opened");
        Ok(id)
    }

    pub(crate) fn close_session(&self, session_id: u64, was_open: bool) {
        *self.inner.disconnects.lock().entry(session_id).or_insert(0) += 1;
        if was_open {
            self.inner.open.lock().remove(&session_id);
        }
    }

    pub(crate) fn probe(&self, session_id: u64) -> bool {
        self.inner.probes.fetch_add(1, Ordering::SeqCst);
        let delay = *self.inner.probe_delay.lock();
        if !delay.is_zero() {
            std::thread::sleep(delay);
        }
        !self.is_killed(session_id)
    }

    pub(crate) fn is_killed(&self, session_id: u64) -> bool {
        self.inner.killed.lock().contains(&session_id)
    }
}
