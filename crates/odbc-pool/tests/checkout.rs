//! Checkout and return behaviour against a mock server.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

mod common;

use std::sync::{Arc, Barrier};
use std::thread;
use std::time::{Duration, Instant};

use common::mock_pool;
use odbc_pool::{PoolConfig, PoolError, SessionError};

#[test]
fn test_blocked_acquire_times_out_then_succeeds_after_release() {
    let (pool, _server) = mock_pool(PoolConfig::new().min_connections(2).max_connections(3));
    let pool = Arc::new(pool);
    assert_eq!(pool.status().idle, 2);

    let mut leases: Vec<_> = (0..3)
        .map(|_| pool.acquire(Duration::from_secs(1)).unwrap())
        .collect();
    let status = pool.status();
    assert_eq!((status.total, status.active, status.idle), (3, 3, 0));

    let started = Instant::now();
    let err = pool.acquire(Duration::from_millis(100)).unwrap_err();
    assert!(matches!(err, PoolError::Timeout { .. }));
    assert!(started.elapsed() >= Duration::from_millis(100));
    assert!(err.is_retryable());

    let waiter = {
        let pool = Arc::clone(&pool);
        thread::spawn(move || {
            let conn = pool.acquire(Duration::from_secs(5)).unwrap();
            conn.session().unwrap().id()
        })
    };
    thread::sleep(Duration::from_millis(50));

    let returned = leases.pop().unwrap();
    let returned_id = returned.session().unwrap().id();
    drop(returned);

    assert_eq!(waiter.join().unwrap(), returned_id);
    assert_eq!(pool.status().total, 3);
}

#[test]
fn test_round_trip_reuses_the_same_session() {
    let (pool, server) = mock_pool(PoolConfig::new().min_connections(0).max_connections(1));

    let first = pool.get().unwrap();
    let session_id = first.session().unwrap().id();
    drop(first);

    let second = pool.get().unwrap();
    assert_eq!(second.session().unwrap().id(), session_id);
    assert_eq!(second.metadata().unwrap().checkout_count, 2);
    assert_eq!(server.connect_count(), 1);
}

#[test]
fn test_idle_queue_is_fifo() {
    let (pool, _server) = mock_pool(PoolConfig::new().min_connections(0).max_connections(2));

    let a = pool.get().unwrap();
    let b = pool.get().unwrap();
    let (a_id, b_id) = (a.id().unwrap(), b.id().unwrap());
    drop(a);
    drop(b);

    let first = pool.get().unwrap();
    let second = pool.get().unwrap();
    assert_eq!((first.id().unwrap(), second.id().unwrap()), (a_id, b_id));
}

#[test]
fn test_dead_idle_sessions_are_replaced_on_borrow() {
    let (pool, server) = mock_pool(
        PoolConfig::new()
            .min_connections(2)
            .max_connections(2)
            .test_on_borrow(true),
    );
    assert_eq!(server.connect_count(), 2);
    server.kill_all();

    let mut conn = pool.acquire(Duration::from_secs(1)).unwrap();
    assert_eq!(conn.execute("SELECT 1").unwrap(), 1);

    assert_eq!(server.connect_count(), 3);
    assert_eq!(server.disconnect_count(1), 1);
    assert_eq!(server.disconnect_count(2), 1);
    let status = pool.status();
    assert_eq!((status.total, status.active, status.idle), (1, 1, 0));
}

#[test]
fn test_borrow_without_probe_hands_out_dead_session() {
    let (pool, server) = mock_pool(
        PoolConfig::new()
            .min_connections(1)
            .max_connections(1)
            .test_on_borrow(false),
    );
    server.kill_all();

    let mut conn = pool.get().unwrap();
    let err = conn.execute("SELECT 1").unwrap_err();
    assert!(matches!(err, PoolError::Session(SessionError::ConnectionLost(_))));
    assert_eq!(server.probe_count(), 0);

    // The lost connection is discarded on return instead of re-queued.
    drop(conn);
    assert_eq!(pool.status().total, 0);
    assert_eq!(server.open_sessions(), 0);
}

#[test]
fn test_creation_failure_releases_capacity_slot() {
    let (pool, server) = mock_pool(PoolConfig::new().min_connections(0).max_connections(1));
    server.fail_next_connects(1);

    let err = pool.acquire(Duration::from_secs(1)).unwrap_err();
    assert!(matches!(err, PoolError::ConnectionCreationFailed(_)));
    assert!(err.is_retryable());
    assert_eq!(pool.status().total, 0);

    let conn = pool.acquire(Duration::from_secs(1)).unwrap();
    assert!(conn.is_valid());
    assert_eq!(pool.status().total, 1);
}

#[test]
fn test_creation_failure_wakes_a_waiter() {
    let (pool, server) = mock_pool(PoolConfig::new().min_connections(0).max_connections(1));
    let pool = Arc::new(pool);
    server.set_connect_delay(Duration::from_millis(100));
    server.fail_next_connects(1);

    let failing = {
        let pool = Arc::clone(&pool);
        thread::spawn(move || pool.acquire(Duration::from_secs(5)))
    };
    thread::sleep(Duration::from_millis(20));
    let waiting = {
        let pool = Arc::clone(&pool);
        thread::spawn(move || pool.acquire(Duration::from_secs(5)).map(|conn| conn.is_valid()))
    };

    assert!(matches!(
        failing.join().unwrap(),
        Err(PoolError::ConnectionCreationFailed(_))
    ));
    assert!(waiting.join().unwrap().unwrap());
}

#[test]
fn test_try_get_never_blocks() {
    let (pool, _server) = mock_pool(PoolConfig::new().min_connections(0).max_connections(1));

    let held = pool.try_get().unwrap().unwrap();
    let started = Instant::now();
    assert!(pool.try_get().unwrap().is_none());
    assert!(started.elapsed() < Duration::from_secs(1));
    drop(held);
    assert!(pool.try_get().unwrap().is_some());
}

#[test]
fn test_zero_timeout_fails_fast_at_capacity() {
    let (pool, _server) = mock_pool(PoolConfig::new().min_connections(1).max_connections(1));

    let _held = pool.get().unwrap();
    let err = pool.acquire(Duration::ZERO).unwrap_err();
    assert!(matches!(err, PoolError::Timeout { .. }));
    assert_eq!(pool.metrics().timeouts, 1);
}

#[test]
fn test_no_starvation_with_max_acquirers() {
    const MAX: usize = 4;
    let (pool, server) = mock_pool(PoolConfig::new().min_connections(0).max_connections(MAX));
    let pool = Arc::new(pool);
    let barrier = Arc::new(Barrier::new(MAX));

    let workers: Vec<_> = (0..MAX)
        .map(|_| {
            let pool = Arc::clone(&pool);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                for _ in 0..50 {
                    let mut conn = pool.acquire(Duration::from_secs(5)).unwrap();
                    conn.execute("UPDATE counters SET n = n + 1").unwrap();
                }
            })
        })
        .collect();
    for worker in workers {
        worker.join().unwrap();
    }

    assert!(server.connect_count() <= MAX);
    assert_eq!(pool.metrics().checkouts_successful, (MAX * 50) as u64);
    assert_eq!(pool.status().active, 0);
}

#[test]
fn test_oversubscribed_acquirers_all_make_progress() {
    const MAX: usize = 3;
    let (pool, server) = mock_pool(PoolConfig::new().min_connections(0).max_connections(MAX));
    let pool = Arc::new(pool);
    let barrier = Arc::new(Barrier::new(MAX + 1));

    let workers: Vec<_> = (0..=MAX)
        .map(|_| {
            let pool = Arc::clone(&pool);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                for _ in 0..20 {
                    let conn = pool.acquire(Duration::from_secs(10)).unwrap();
                    thread::sleep(Duration::from_millis(1));
                    drop(conn);
                }
            })
        })
        .collect();
    for worker in workers {
        worker.join().unwrap();
    }

    let status = pool.status();
    assert!(status.total <= MAX);
    assert_eq!(status.waiting, 0);
    assert!(server.connect_count() <= MAX);
}

#[test]
fn test_waiting_counts_blocked_callers() {
    let (pool, _server) = mock_pool(PoolConfig::new().min_connections(1).max_connections(1));
    let pool = Arc::new(pool);
    let held = pool.get().unwrap();

    let waiter = {
        let pool = Arc::clone(&pool);
        thread::spawn(move || pool.acquire(Duration::from_secs(5)).map(|_| ()))
    };
    assert!(common::eventually(Duration::from_secs(2), || {
        pool.status().waiting == 1
    }));

    drop(held);
    waiter.join().unwrap().unwrap();
    assert_eq!(pool.status().waiting, 0);
}

#[test]
fn test_test_on_return_discards_dead_session() {
    let (pool, server) = mock_pool(
        PoolConfig::new()
            .min_connections(0)
            .max_connections(2)
            .test_on_return(true),
    );

    let conn = pool.get().unwrap();
    server.kill(conn.session().unwrap().id());
    drop(conn);

    let status = pool.status();
    assert_eq!((status.total, status.idle), (0, 0));
    assert_eq!(pool.metrics().connections_closed, 1);
}
