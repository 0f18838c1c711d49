//! Background health checking.
//!
//! A dedicated thread wakes every `validation_interval` and sweeps the idle
//! queue. It holds only a weak reference to the pool, and sleeps on a stop
//! signal so shutdown does not have to wait out a full interval.

use std::sync::{Arc, Weak};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use odbc_session::Session;
use parking_lot::{Condvar, Mutex};

use crate::pool::PoolInner;

/// Handle to the running health checker thread.
///
/// Dropping the handle stops the thread and joins it.
pub(crate) struct HealthChecker {
    signal: Arc<StopSignal>,
    handle: Option<JoinHandle<()>>,
}

#[derive(Default)]
struct StopSignal {
    stopped: Mutex<bool>,
    wakeup: Condvar,
}

impl StopSignal {
    fn stop(&self) {
        *self.stopped.lock() = true;
        self.wakeup.notify_all();
    }

    /// Sleep for `interval` or until stopped. Returns whether stop was requested.
    fn wait(&self, interval: Duration) -> bool {
        let mut stopped = self.stopped.lock();
        match Instant::now().checked_add(interval) {
            Some(deadline) => {
                while !*stopped {
                    if self.wakeup.wait_until(&mut stopped, deadline).timed_out() {
                        break;
                    }
                }
            }
            None => {
                while !*stopped {
                    self.wakeup.wait(&mut stopped);
                }
            }
        }
        *stopped
    }
}

impl HealthChecker {
    /// Start the health checker for `pool`.
    ///
    /// Returns `None` if the thread could not be spawned; the pool then runs
    /// without background validation.
    pub(crate) fn spawn<S: Session>(pool: Weak<PoolInner<S>>, interval: Duration) -> Option<Self> {
        let signal = Arc::new(StopSignal::default());
        let thread_signal = Arc::clone(&signal);

        let spawned = thread::Builder::new()
            .name("odbc-pool-health".into())
            .spawn(move || run(&pool, interval, &thread_signal));

        match spawned {
            Ok(handle) => Some(Self {
                signal,
                handle: Some(handle),
            }),
            Err(err) => {
                tracing::warn!(
                    error = %err,
                    "failed to start health checker, idle connections will not be validated"
                );
                None
            }
        }
    }

    /// Stop the thread and wait for an in-progress sweep to finish.
    pub(crate) fn stop(self) {
        drop(self);
    }
}

impl Drop for HealthChecker {
    fn drop(&mut self) {
        self.signal.stop();
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                tracing::warn!("health checker thread panicked");
            }
        }
    }
}

fn run<S: Session>(pool: &Weak<PoolInner<S>>, interval: Duration, signal: &StopSignal) {
    tracing::debug!(?interval, "health checker started");

    while !signal.wait(interval) {
        let Some(pool) = pool.upgrade() else {
            break;
        };
        if pool.is_shutdown() {
            break;
        }

        let report = pool.validate_idle();
        tracing::trace!(
            checked = report.checked,
            evicted = report.evicted(),
            "health check completed"
        );
    }

    tracing::debug!("health checker stopped");
}
