//! Shared helpers for the pool integration tests.

#![allow(dead_code)]

use std::time::{Duration, Instant};

use odbc_pool::{Pool, PoolConfig};
use odbc_testing::{MockServer, MockSession};

/// Route pool logs to the test harness. Safe to call from every test.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .with_test_writer()
        .try_init();
}

/// Build a pool of mock sessions against a fresh server.
pub fn mock_pool(config: PoolConfig) -> (Pool<MockSession>, MockServer) {
    init_tracing();
    let server = MockServer::new();
    let pool = Pool::new(config, server.clone()).expect("valid pool configuration");
    (pool, server)
}

/// Poll `condition` until it holds or `limit` elapses.
pub fn eventually(limit: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + limit;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(5));
    }
    condition()
}
