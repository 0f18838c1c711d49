//! Pooled connection handles.
//!
//! A [`PooledConnection`] is the lease a caller holds while using a session.
//! It returns the session to the pool exactly once, whether it is released
//! explicitly, dropped normally or dropped during unwinding.

use std::fmt;
use std::sync::Weak;

use odbc_session::{Session, SessionError};

use crate::error::PoolError;
use crate::lifecycle::{ConnectionMetadata, ConnectionState};
use crate::pool::PoolInner;

/// A session together with the bookkeeping the pool keeps for it.
pub(crate) struct PooledSession<S: Session> {
    session: S,
    pub(crate) metadata: ConnectionMetadata,
}

impl<S: Session> PooledSession<S> {
    /// Connect a new session.
    pub(crate) fn establish(id: u64, config: &S::Config) -> Result<Self, SessionError> {
        let mut metadata = ConnectionMetadata::new(id);
        let session = S::connect(config)?;
        metadata.state = ConnectionState::Connected;
        Ok(Self { session, metadata })
    }

    /// Wrap a session that was connected outside the pool.
    pub(crate) fn adopted(id: u64, session: S) -> Self {
        let mut metadata = ConnectionMetadata::new(id);
        metadata.state = ConnectionState::Connected;
        Self { session, metadata }
    }

    pub(crate) fn id(&self) -> u64 {
        self.metadata.id
    }

    pub(crate) fn is_reusable(&self) -> bool {
        self.metadata.state.is_reusable()
    }

    pub(crate) fn mark_broken(&mut self) {
        self.metadata.state = ConnectionState::Broken;
    }

    /// Run the liveness probe, marking the session broken if it fails.
    pub(crate) fn probe(&mut self) -> bool {
        let alive = self.session.is_alive();
        if !alive {
            self.mark_broken();
        }
        alive
    }

    /// Release the native resources of the session.
    pub(crate) fn dispose(mut self) {
        self.session.disconnect();
        self.metadata.state = ConnectionState::Disposed;
    }

    fn observe<T>(&mut self, result: &Result<T, SessionError>) {
        if let Err(err) = result {
            if err.is_connectivity() {
                tracing::debug!(
                    connection_id = self.id(),
                    error = %err,
                    "connection lost during operation"
                );
                self.mark_broken();
            }
        }
    }
}

/// A connection checked out from the pool.
///
/// When dropped, the connection is automatically returned to the pool. The
/// handle keeps only a weak reference to the pool: if the pool is gone by
/// then, the session is disconnected instead.
///
/// Once the session has been released, invalidated or detached the handle is
/// inert and every accessor fails with [`PoolError::InvalidHandleUse`].
pub struct PooledConnection<S: Session> {
    inner: Option<PooledSession<S>>,
    pool: Weak<PoolInner<S>>,
}

impl<S: Session> PooledConnection<S> {
    pub(crate) fn new(pooled: PooledSession<S>, pool: Weak<PoolInner<S>>) -> Self {
        Self {
            inner: Some(pooled),
            pool,
        }
    }

    fn pooled(&self) -> Result<&PooledSession<S>, PoolError> {
        self.inner.as_ref().ok_or(PoolError::InvalidHandleUse)
    }

    fn pooled_mut(&mut self) -> Result<&mut PooledSession<S>, PoolError> {
        self.inner.as_mut().ok_or(PoolError::InvalidHandleUse)
    }

    /// Whether the handle still owns a session.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.inner.is_some()
    }

    /// Identity of the leased session.
    pub fn id(&self) -> Result<u64, PoolError> {
        self.pooled().map(PooledSession::id)
    }

    /// Get the connection metadata.
    pub fn metadata(&self) -> Result<&ConnectionMetadata, PoolError> {
        self.pooled().map(|pooled| &pooled.metadata)
    }

    /// Borrow the underlying session.
    pub fn session(&self) -> Result<&S, PoolError> {
        self.pooled().map(|pooled| &pooled.session)
    }

    /// Mutably borrow the underlying session.
    ///
    /// Errors from operations performed directly on the session are not seen
    /// by the pool; call [`invalidate`](Self::invalidate) if the session was
    /// left unusable.
    pub fn session_mut(&mut self) -> Result<&mut S, PoolError> {
        self.pooled_mut().map(|pooled| &mut pooled.session)
    }

    /// Execute a statement on the leased session.
    ///
    /// A connectivity error marks the session broken, so it is discarded
    /// rather than reused when the handle is released.
    pub fn execute(&mut self, sql: &str) -> Result<u64, PoolError> {
        let pooled = self.pooled_mut()?;
        let result = pooled.session.execute(sql);
        pooled.observe(&result);
        Ok(result?)
    }

    /// Run a query on the leased session.
    pub fn query(&mut self, sql: &str) -> Result<S::Rows, PoolError> {
        let pooled = self.pooled_mut()?;
        let result = pooled.session.query(sql);
        pooled.observe(&result);
        Ok(result?)
    }

    /// Return the session to the pool now instead of on drop.
    pub fn release(&mut self) -> Result<(), PoolError> {
        let pooled = self.inner.take().ok_or(PoolError::InvalidHandleUse)?;
        return_to_pool(&self.pool, pooled);
        Ok(())
    }

    /// Mark the session unusable and hand it back for disposal.
    ///
    /// Its capacity slot is freed for another caller.
    pub fn invalidate(&mut self) -> Result<(), PoolError> {
        let mut pooled = self.inner.take().ok_or(PoolError::InvalidHandleUse)?;
        pooled.mark_broken();
        return_to_pool(&self.pool, pooled);
        Ok(())
    }

    /// Detach the session from the pool.
    ///
    /// The session no longer counts against the pool's capacity and will not
    /// be returned on drop. The caller becomes responsible for disconnecting
    /// it.
    pub fn detach(mut self) -> Result<S, PoolError> {
        let pooled = self.inner.take().ok_or(PoolError::InvalidHandleUse)?;
        if let Some(pool) = self.pool.upgrade() {
            pool.forget(pooled.id());
        }
        tracing::debug!(connection_id = pooled.id(), "connection detached from pool");
        Ok(pooled.session)
    }
}

fn return_to_pool<S: Session>(pool: &Weak<PoolInner<S>>, pooled: PooledSession<S>) {
    match pool.upgrade() {
        Some(pool) => pool.release(pooled),
        None => {
            tracing::debug!(
                connection_id = pooled.id(),
                "pool already dropped, disconnecting returned connection"
            );
            pooled.dispose();
        }
    }
}

impl<S: Session> Drop for PooledConnection<S> {
    fn drop(&mut self) {
        if let Some(pooled) = self.inner.take() {
            tracing::trace!(connection_id = pooled.id(), "returning connection to pool");
            return_to_pool(&self.pool, pooled);
        }
    }
}

impl<S: Session> fmt::Debug for PooledConnection<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PooledConnection")
            .field("metadata", &self.inner.as_ref().map(|pooled| &pooled.metadata))
            .finish_non_exhaustive()
    }
}
