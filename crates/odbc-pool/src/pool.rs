//! Connection pool implementation.
//!
//! All structural state (idle queue, active set, counters) lives behind one
//! mutex. Session creation, liveness probes and disconnects perform network
//! I/O and therefore run with the mutex released; a capacity slot is reserved
//! in `total` before the lock is dropped so the bound is never exceeded.

use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::{Duration, Instant};

use hashbrown::HashSet;
use odbc_session::Session;
use parking_lot::{Condvar, Mutex, MutexGuard};

use crate::config::PoolConfig;
use crate::connection::{PooledConnection, PooledSession};
use crate::error::PoolError;
use crate::health::HealthChecker;
use crate::lifecycle::HealthCheckReport;

/// A bounded pool of database sessions.
///
/// The pool hands out [`PooledConnection`] leases. Callers block in
/// [`acquire`](Pool::acquire) while the pool is at capacity, until a lease is
/// returned or the timeout elapses. A background health checker periodically
/// evicts dead and long-idle sessions from the idle queue.
///
/// Blocked callers are not served in arrival order: a caller that arrives
/// while capacity is free may create a session ahead of one that has been
/// waiting.
///
/// # Example
///
/// ```rust,ignore
/// use odbc_pool::{Pool, PoolConfig};
/// use std::time::Duration;
///
/// let pool = Pool::<OdbcSession>::builder()
///     .session_config(connection_config)
///     .min_connections(2)
///     .max_connections(8)
///     .build()?;
///
/// let mut conn = pool.acquire(Duration::from_secs(2))?;
/// conn.execute("UPDATE jobs SET state = 'done' WHERE id = 1")?;
/// // Connection automatically returned to pool on drop
/// ```
pub struct Pool<S: Session> {
    config: PoolConfig,
    inner: Arc<PoolInner<S>>,
    health: Mutex<Option<HealthChecker>>,
}

pub(crate) struct PoolInner<S: Session> {
    /// Pool configuration.
    config: PoolConfig,

    /// Settings passed to [`Session::connect`].
    session_config: S::Config,

    /// Idle queue, active set and counters.
    state: Mutex<PoolState<S>>,

    /// Signalled whenever a session or a capacity slot frees up.
    available: Condvar,

    /// Whether the pool has been shut down. Only ever goes from false to true.
    shutdown: AtomicBool,

    /// Counter for generating connection IDs.
    next_connection_id: AtomicU64,

    /// When the pool was created.
    created_at: Instant,

    /// Pool metrics. Never locked while `state` is held.
    metrics: Mutex<PoolMetricsInner>,
}

struct PoolState<S: Session> {
    /// Sessions available for checkout, oldest first.
    idle: VecDeque<PooledSession<S>>,
    /// IDs of sessions currently leased.
    active: HashSet<u64>,
    /// Sessions taken out of `idle` by an in-progress health sweep.
    validating: usize,
    /// All sessions owned by the pool, including reserved creation slots.
    total: usize,
    /// Callers currently inside `acquire`.
    waiting: usize,
}

/// Internal metrics tracking.
#[derive(Debug, Default)]
struct PoolMetricsInner {
    /// Total connections created.
    connections_created: u64,
    /// Total connections closed.
    connections_closed: u64,
    /// Total successful checkouts.
    checkouts_successful: u64,
    /// Total failed checkouts (timeouts, errors).
    checkouts_failed: u64,
    /// Checkouts that failed because the deadline elapsed.
    timeouts: u64,
    /// Total health checks performed.
    health_checks_performed: u64,
    /// Total health check failures.
    health_checks_failed: u64,
}

/// How long a checkout may block.
#[derive(Debug, Clone, Copy)]
enum Wait {
    /// Fail immediately instead of blocking.
    Never,
    Until(Instant),
    Forever,
}

impl<S: Session> Pool<S> {
    /// Create a new pool builder.
    ///
    /// Use the builder to configure the pool before creating it.
    #[must_use]
    pub fn builder() -> PoolBuilder<S> {
        PoolBuilder::new()
    }

    /// Create a new pool with the given configuration.
    ///
    /// `min_connections` sessions are created up front. This is best effort:
    /// if a session cannot be established the failure is logged and the pool
    /// starts with fewer sessions.
    pub fn new(config: PoolConfig, session_config: S::Config) -> Result<Self, PoolError> {
        config.validate()?;

        let inner = Arc::new(PoolInner {
            config: config.clone(),
            session_config,
            state: Mutex::new(PoolState {
                idle: VecDeque::with_capacity(config.max_connections),
                active: HashSet::with_capacity(config.max_connections),
                validating: 0,
                total: 0,
                waiting: 0,
            }),
            available: Condvar::new(),
            shutdown: AtomicBool::new(false),
            next_connection_id: AtomicU64::new(1),
            created_at: Instant::now(),
            metrics: Mutex::new(PoolMetricsInner::default()),
        });

        let prewarmed = inner.prewarm();
        let health = HealthChecker::spawn(Arc::downgrade(&inner), config.validation_interval);

        tracing::info!(
            min = config.min_connections,
            max = config.max_connections,
            prewarmed,
            "connection pool created"
        );

        Ok(Self {
            config,
            inner,
            health: Mutex::new(health),
        })
    }

    /// Get a connection using the configured acquire timeout.
    pub fn get(&self) -> Result<PooledConnection<S>, PoolError> {
        self.acquire(self.config.acquire_timeout)
    }

    /// Get a connection from the pool.
    ///
    /// This will either return an existing idle connection or create a new one
    /// if the pool is not at capacity. If all connections are in use and the
    /// pool is at capacity, this will wait until a connection becomes available
    /// or the timeout is reached.
    ///
    /// Dead idle sessions found along the way are discarded and replaced
    /// transparently within the same timeout.
    pub fn acquire(&self, timeout: Duration) -> Result<PooledConnection<S>, PoolError> {
        if self.inner.is_shutdown() {
            self.inner.record_checkout_failure(false);
            return Err(PoolError::PoolShutdown);
        }

        tracing::trace!(?timeout, "acquiring connection from pool");

        let wait = Instant::now()
            .checked_add(timeout)
            .map_or(Wait::Forever, Wait::Until);
        let result = self.inner.checkout(wait);
        match &result {
            Ok(_) => self.inner.record_checkout_success(),
            Err(err) => {
                self.inner
                    .record_checkout_failure(matches!(err, PoolError::Timeout { .. }));
                tracing::debug!(error = %err, "connection checkout failed");
            }
        }
        result
    }

    /// Try to get a connection without waiting.
    ///
    /// Returns `None` if no connections are immediately available and the
    /// pool is at capacity.
    pub fn try_get(&self) -> Result<Option<PooledConnection<S>>, PoolError> {
        if self.inner.is_shutdown() {
            self.inner.record_checkout_failure(false);
            return Err(PoolError::PoolShutdown);
        }

        match self.inner.checkout(Wait::Never) {
            Ok(conn) => {
                self.inner.record_checkout_success();
                Ok(Some(conn))
            }
            Err(PoolError::Timeout { .. }) => Ok(None),
            Err(err) => {
                self.inner.record_checkout_failure(false);
                Err(err)
            }
        }
    }

    /// Hand a session that was connected elsewhere to the pool.
    ///
    /// The session joins the idle queue. If the pool is shut down or already
    /// at capacity the session is disconnected and an error returned.
    pub fn adopt(&self, mut session: S) -> Result<(), PoolError> {
        let rejected = {
            let mut state = self.inner.state.lock();
            if self.inner.is_shutdown() {
                PoolError::PoolShutdown
            } else if state.total >= self.config.max_connections {
                PoolError::AtCapacity {
                    max: self.config.max_connections,
                }
            } else {
                let pooled = PooledSession::adopted(self.inner.next_connection_id(), session);
                tracing::debug!(connection_id = pooled.id(), "adopted connection");
                state.total += 1;
                state.idle.push_back(pooled);
                self.inner.available.notify_one();
                return Ok(());
            }
        };

        session.disconnect();
        Err(rejected)
    }

    /// Get the current pool status.
    ///
    /// The snapshot is taken under the pool lock and is internally
    /// consistent.
    #[must_use]
    pub fn status(&self) -> PoolStatus {
        let state = self.inner.state.lock();
        PoolStatus {
            total: state.total,
            idle: state.idle.len(),
            active: state.active.len(),
            waiting: state.waiting,
            validating: state.validating,
            max: self.config.max_connections,
        }
    }

    /// Get pool metrics.
    #[must_use]
    pub fn metrics(&self) -> PoolMetrics {
        let inner = self.inner.metrics.lock();
        PoolMetrics {
            connections_created: inner.connections_created,
            connections_closed: inner.connections_closed,
            checkouts_successful: inner.checkouts_successful,
            checkouts_failed: inner.checkouts_failed,
            timeouts: inner.timeouts,
            health_checks_performed: inner.health_checks_performed,
            health_checks_failed: inner.health_checks_failed,
            uptime: self.inner.created_at.elapsed(),
        }
    }

    /// Run one health check sweep over the idle queue now.
    ///
    /// The background checker does the same on every `validation_interval`.
    pub fn run_health_check(&self) -> HealthCheckReport {
        self.inner.validate_idle()
    }

    /// Shut the pool down.
    ///
    /// Waiting callers fail with [`PoolError::PoolShutdown`], the health
    /// checker is stopped and idle sessions are disconnected. Sessions still
    /// leased are disconnected as their handles are released. Calling this
    /// more than once has no further effect.
    pub fn shutdown(&self) {
        if self.inner.shutdown.swap(true, Ordering::AcqRel) {
            return;
        }

        tracing::info!("shutting down connection pool");

        {
            // Taking the lock orders this wake-up after any waiter's shutdown check.
            let _state = self.inner.state.lock();
            self.inner.available.notify_all();
        }

        if let Some(checker) = self.health.lock().take() {
            checker.stop();
        }

        let (drained, outstanding) = {
            let mut state = self.inner.state.lock();
            let drained: Vec<_> = state.idle.drain(..).collect();
            state.total -= drained.len();
            (drained, state.active.len())
        };

        let closed = drained.len();
        for pooled in drained {
            self.inner.dispose(pooled, "pool shut down");
        }

        tracing::info!(closed, outstanding, "connection pool closed");
    }

    /// Check if the pool is shut down.
    #[must_use]
    pub fn is_shutdown(&self) -> bool {
        self.inner.is_shutdown()
    }

    /// Get the pool configuration.
    #[must_use]
    pub fn config(&self) -> &PoolConfig {
        &self.config
    }
}

impl<S: Session> Drop for Pool<S> {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl<S: Session> fmt::Debug for Pool<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pool")
            .field("config", &self.config)
            .field("status", &self.status())
            .field("shutdown", &self.is_shutdown())
            .finish()
    }
}

impl<S: Session> PoolInner<S> {
    pub(crate) fn is_shutdown(&self) -> bool {
        self.shutdown.load(Ordering::Acquire)
    }

    fn next_connection_id(&self) -> u64 {
        self.next_connection_id.fetch_add(1, Ordering::Relaxed)
    }

    /// Create `min_connections` idle sessions, stopping at the first failure.
    fn prewarm(&self) -> usize {
        let mut created = 0;
        while created < self.config.min_connections {
            match self.connect() {
                Ok(pooled) => {
                    let mut state = self.state.lock();
                    state.total += 1;
                    state.idle.push_back(pooled);
                    created += 1;
                }
                Err(err) => {
                    tracing::warn!(
                        error = %err,
                        created,
                        min = self.config.min_connections,
                        "failed to create initial connections, pool starts under-provisioned"
                    );
                    break;
                }
            }
        }
        created
    }

    /// Establish a new session. Must be called without `state` held.
    fn connect(&self) -> Result<PooledSession<S>, PoolError> {
        let id = self.next_connection_id();
        match PooledSession::establish(id, &self.session_config) {
            Ok(pooled) => {
                self.metrics.lock().connections_created += 1;
                tracing::debug!(connection_id = id, "connection created");
                Ok(pooled)
            }
            Err(err) => Err(PoolError::ConnectionCreationFailed(err)),
        }
    }

    /// Disconnect a session the pool no longer accounts for. Must be called
    /// without `state` held.
    fn dispose(&self, pooled: PooledSession<S>, reason: &'static str) {
        let id = pooled.id();
        pooled.dispose();
        self.metrics.lock().connections_closed += 1;
        tracing::debug!(connection_id = id, reason, "connection disposed");
    }

    fn checkout(self: &Arc<Self>, wait: Wait) -> Result<PooledConnection<S>, PoolError> {
        let started = Instant::now();
        let mut state = self.state.lock();
        state.waiting += 1;
        let result = self.checkout_locked(&mut state, wait, started);
        state.waiting -= 1;
        drop(state);

        result.map(|mut pooled| {
            pooled.metadata.mark_checked_out();
            tracing::trace!(connection_id = pooled.id(), "connection checked out");
            PooledConnection::new(pooled, Arc::downgrade(self))
        })
    }

    fn checkout_locked(
        &self,
        state: &mut MutexGuard<'_, PoolState<S>>,
        wait: Wait,
        started: Instant,
    ) -> Result<PooledSession<S>, PoolError> {
        loop {
            if self.is_shutdown() {
                return Err(PoolError::PoolShutdown);
            }

            if let Some(mut pooled) = state.idle.pop_front() {
                let id = pooled.id();
                state.active.insert(id);
                if !self.config.test_on_borrow {
                    return Ok(pooled);
                }

                let alive = MutexGuard::unlocked(state, || pooled.probe());
                if alive && !self.is_shutdown() {
                    return Ok(pooled);
                }

                state.active.remove(&id);
                state.total -= 1;
                if !alive {
                    MutexGuard::unlocked(state, || {
                        self.dispose(pooled, "failed liveness probe on borrow");
                    });
                    continue;
                }
                MutexGuard::unlocked(state, || {
                    self.dispose(pooled, "pool shut down during liveness probe");
                });
                return Err(PoolError::PoolShutdown);
            }

            if state.total < self.config.max_connections {
                state.total += 1;
                let created = MutexGuard::unlocked(state, || self.connect());
                match created {
                    Ok(pooled) if self.is_shutdown() => {
                        state.total -= 1;
                        MutexGuard::unlocked(state, || {
                            self.dispose(pooled, "pool shut down during connect");
                        });
                        return Err(PoolError::PoolShutdown);
                    }
                    Ok(pooled) => {
                        state.active.insert(pooled.id());
                        return Ok(pooled);
                    }
                    Err(err) => {
                        state.total -= 1;
                        self.available.notify_one();
                        return Err(err);
                    }
                }
            }

            match wait {
                Wait::Never => {
                    return Err(PoolError::Timeout {
                        waited: Duration::ZERO,
                    });
                }
                Wait::Until(deadline) => {
                    if Instant::now() >= deadline {
                        return Err(PoolError::Timeout {
                            waited: started.elapsed(),
                        });
                    }
                    self.available.wait_until(state, deadline);
                }
                Wait::Forever => self.available.wait(state),
            }
        }
    }

    /// Take back a session from a released handle.
    pub(crate) fn release(&self, mut pooled: PooledSession<S>) {
        let id = pooled.id();
        pooled.metadata.touch();

        let healthy = pooled.is_reusable()
            && !self.is_shutdown()
            && (!self.config.test_on_return || pooled.probe());

        let discarded = {
            let mut state = self.state.lock();
            if !state.active.remove(&id) {
                tracing::warn!(connection_id = id, "returned connection was not checked out");
                Some((pooled, "untracked connection"))
            } else if self.is_shutdown() {
                state.total -= 1;
                Some((pooled, "pool shut down"))
            } else if !healthy {
                state.total -= 1;
                self.available.notify_one();
                Some((pooled, "unhealthy on return"))
            } else {
                state.idle.push_back(pooled);
                self.available.notify_one();
                None
            }
        };

        match discarded {
            Some((pooled, reason)) => self.dispose(pooled, reason),
            None => tracing::trace!(connection_id = id, "connection returned to idle queue"),
        }
    }

    /// Stop accounting for a session the caller has taken ownership of.
    pub(crate) fn forget(&self, id: u64) {
        let mut state = self.state.lock();
        if state.active.remove(&id) {
            state.total -= 1;
            self.available.notify_one();
        }
    }

    /// Probe every idle session and evict the dead and the long-idle.
    pub(crate) fn validate_idle(&self) -> HealthCheckReport {
        let (drained, total) = {
            let mut state = self.state.lock();
            if self.is_shutdown() {
                return HealthCheckReport::default();
            }
            let drained: Vec<_> = state.idle.drain(..).collect();
            state.validating += drained.len();
            (drained, state.total)
        };

        let mut report = HealthCheckReport {
            checked: drained.len(),
            ..HealthCheckReport::default()
        };
        let mut healthy = Vec::with_capacity(drained.len());
        let mut evicted = Vec::new();
        let mut retained = total;

        for mut pooled in drained {
            if retained > self.config.min_connections
                && pooled.metadata.is_idle_expired(self.config.max_idle_time)
            {
                retained -= 1;
                report.evicted_idle += 1;
                evicted.push((pooled, "idle timeout"));
            } else if pooled.probe() {
                healthy.push(pooled);
            } else {
                retained -= 1;
                report.evicted_dead += 1;
                evicted.push((pooled, "failed health check"));
            }
        }

        let shut_down = {
            let mut state = self.state.lock();
            state.validating -= report.checked;
            if self.is_shutdown() {
                state.total -= report.checked;
                true
            } else {
                state.total -= evicted.len();
                for pooled in healthy.drain(..).rev() {
                    state.idle.push_front(pooled);
                }
                for _ in 0..report.checked {
                    self.available.notify_one();
                }
                false
            }
        };

        if shut_down {
            for pooled in healthy {
                self.dispose(pooled, "pool shut down");
            }
        }
        for (pooled, reason) in evicted {
            self.dispose(pooled, reason);
        }

        {
            let mut metrics = self.metrics.lock();
            metrics.health_checks_performed += (report.checked - report.evicted_idle) as u64;
            metrics.health_checks_failed += report.evicted_dead as u64;
        }

        if report.evicted() > 0 {
            tracing::debug!(
                checked = report.checked,
                evicted_dead = report.evicted_dead,
                evicted_idle = report.evicted_idle,
                "health check evicted idle connections"
            );
        }

        report
    }

    fn record_checkout_success(&self) {
        self.metrics.lock().checkouts_successful += 1;
    }

    fn record_checkout_failure(&self, timed_out: bool) {
        let mut metrics = self.metrics.lock();
        metrics.checkouts_failed += 1;
        if timed_out {
            metrics.timeouts += 1;
        }
    }
}

/// Builder for creating a connection pool.
///
/// # Example
///
/// ```rust,ignore
/// let pool = Pool::<OdbcSession>::builder()
///     .session_config(connection_config)
///     .pool_config(pool_config)
///     .build()?;
/// ```
pub struct PoolBuilder<S: Session> {
    pool_config: PoolConfig,
    session_config: Option<S::Config>,
}

impl<S: Session> PoolBuilder<S> {
    /// Create a new pool builder with default settings.
    pub fn new() -> Self {
        Self {
            pool_config: PoolConfig::default(),
            session_config: None,
        }
    }

    /// Set the settings used to establish sessions.
    #[must_use]
    pub fn session_config(mut self, config: S::Config) -> Self {
        self.session_config = Some(config);
        self
    }

    /// Set the pool configuration.
    #[must_use]
    pub fn pool_config(mut self, config: PoolConfig) -> Self {
        self.pool_config = config;
        self
    }

    /// Set the minimum number of connections.
    #[must_use]
    pub fn min_connections(mut self, count: usize) -> Self {
        self.pool_config.min_connections = count;
        self
    }

    /// Set the maximum number of connections.
    #[must_use]
    pub fn max_connections(mut self, count: usize) -> Self {
        self.pool_config.max_connections = count;
        self
    }

    /// Set the default acquisition timeout.
    #[must_use]
    pub fn acquire_timeout(mut self, timeout: Duration) -> Self {
        self.pool_config.acquire_timeout = timeout;
        self
    }

    /// Set the maximum idle time.
    #[must_use]
    pub fn max_idle_time(mut self, timeout: Duration) -> Self {
        self.pool_config.max_idle_time = timeout;
        self
    }

    /// Set the health check period.
    #[must_use]
    pub fn validation_interval(mut self, interval: Duration) -> Self {
        self.pool_config.validation_interval = interval;
        self
    }

    /// Enable or disable liveness probing on checkout.
    #[must_use]
    pub fn test_on_borrow(mut self, enabled: bool) -> Self {
        self.pool_config.test_on_borrow = enabled;
        self
    }

    /// Enable or disable liveness probing on return.
    #[must_use]
    pub fn test_on_return(mut self, enabled: bool) -> Self {
        self.pool_config.test_on_return = enabled;
        self
    }

    /// Build the pool.
    pub fn build(self) -> Result<Pool<S>, PoolError> {
        let session_config = self
            .session_config
            .ok_or_else(|| PoolError::Config("session configuration is required".into()))?;
        Pool::new(self.pool_config, session_config)
    }
}

impl<S: Session> Default for PoolBuilder<S> {
    fn default() -> Self {
        Self::new()
    }
}

/// Status information about the pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolStatus {
    /// All sessions owned by the pool.
    pub total: usize,
    /// Sessions available for checkout.
    pub idle: usize,
    /// Sessions currently checked out.
    pub active: usize,
    /// Callers currently waiting in `acquire`.
    pub waiting: usize,
    /// Idle sessions being probed by a health sweep.
    pub validating: usize,
    /// Maximum allowed connections.
    pub max: usize,
}

impl PoolStatus {
    /// Calculate the utilization percentage.
    #[must_use]
    pub fn utilization(&self) -> f64 {
        if self.max == 0 {
            return 0.0;
        }
        (self.active as f64 / self.max as f64) * 100.0
    }

    /// Check if the pool is at capacity.
    #[must_use]
    pub fn is_at_capacity(&self) -> bool {
        self.total >= self.max
    }
}

/// Metrics collected from the pool.
#[derive(Debug, Clone)]
pub struct PoolMetrics {
    /// Total connections created since pool start.
    pub connections_created: u64,
    /// Total connections closed since pool start.
    pub connections_closed: u64,
    /// Successful connection checkouts.
    pub checkouts_successful: u64,
    /// Failed connection checkouts (timeouts, pool shut down, etc.).
    pub checkouts_failed: u64,
    /// Checkouts that gave up because the deadline elapsed.
    pub timeouts: u64,
    /// Health checks performed.
    pub health_checks_performed: u64,
    /// Health checks that failed.
    pub health_checks_failed: u64,
    /// Time since pool creation.
    pub uptime: Duration,
}

impl PoolMetrics {
    /// Calculate checkout success rate (0.0 to 1.0).
    #[must_use]
    pub fn checkout_success_rate(&self) -> f64 {
        let total = self.checkouts_successful + self.checkouts_failed;
        if total == 0 {
            return 1.0;
        }
        self.checkouts_successful as f64 / total as f64
    }

    /// Calculate health check success rate (0.0 to 1.0).
    #[must_use]
    pub fn health_check_success_rate(&self) -> f64 {
        if self.health_checks_performed == 0 {
            return 1.0;
        }
        let successful = self.health_checks_performed - self.health_checks_failed;
        successful as f64 / self.health_checks_performed as f64
    }
}
