//! Session lifecycle bookkeeping.
//!
//! The pool wraps every session with [`ConnectionMetadata`] so it can tell
//! sessions apart, track idle time and record state transitions.

use std::time::{Duration, Instant};

/// Lifecycle state of a pooled session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Allocated but not yet connected.
    Created,
    /// Connected and believed usable.
    Connected,
    /// A liveness probe failed or an operation lost the connection.
    Broken,
    /// Native resources have been released.
    Disposed,
}

impl ConnectionState {
    /// Whether a session in this state may be handed out again.
    #[must_use]
    pub fn is_reusable(self) -> bool {
        self == Self::Connected
    }
}

/// Metadata the pool keeps for each session.
#[derive(Debug, Clone)]
pub struct ConnectionMetadata {
    /// Pool-unique session identity.
    pub id: u64,
    /// When the session was created.
    pub created_at: Instant,
    /// When the session was last checked out or returned.
    pub last_used: Instant,
    /// Number of times the session has been checked out.
    pub checkout_count: u64,
    /// Current lifecycle state.
    pub state: ConnectionState,
}

impl ConnectionMetadata {
    /// Create metadata for a freshly allocated session.
    #[must_use]
    pub fn new(id: u64) -> Self {
        let now = Instant::now();
        Self {
            id,
            created_at: now,
            last_used: now,
            checkout_count: 0,
            state: ConnectionState::Created,
        }
    }

    /// Time since the session was created.
    #[must_use]
    pub fn age(&self) -> Duration {
        self.created_at.elapsed()
    }

    /// Time since the session was last used.
    #[must_use]
    pub fn idle_time(&self) -> Duration {
        self.last_used.elapsed()
    }

    /// Whether the session has been idle longer than `max_idle_time`.
    #[must_use]
    pub fn is_idle_expired(&self, max_idle_time: Duration) -> bool {
        self.idle_time() > max_idle_time
    }

    pub(crate) fn touch(&mut self) {
        self.last_used = Instant::now();
    }

    pub(crate) fn mark_checked_out(&mut self) {
        self.checkout_count += 1;
        self.touch();
    }
}

/// Outcome of one health check sweep over the idle queue.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HealthCheckReport {
    /// Idle sessions examined.
    pub checked: usize,
    /// Sessions evicted because their liveness probe failed.
    pub evicted_dead: usize,
    /// Sessions evicted because they exceeded the maximum idle time.
    pub evicted_idle: usize,
}

impl HealthCheckReport {
    /// Total number of sessions evicted by the sweep.
    #[must_use]
    pub fn evicted(&self) -> usize {
        self.evicted_dead + self.evicted_idle
    }
}
