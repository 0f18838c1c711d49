//! Wiring a pool into an application and tearing it down.
//!
//! Runs against the in-memory mock server:
//!
//! ```bash
//! cargo run -p odbc-pool --example basic
//! ```

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use odbc_pool::{Pool, PoolError};
use odbc_testing::{MockServer, MockSession};

/// A component that receives the pool instead of reaching for a global.
struct OrderRepository {
    pool: Arc<Pool<MockSession>>,
}

impl OrderRepository {
    fn mark_shipped(&self, order_id: u32) -> Result<u64, PoolError> {
        let mut conn = self.pool.get()?;
        conn.execute(&format!("UPDATE orders SET state = 'shipped' WHERE id = {order_id}"))
    }
}

fn main() -> Result<(), PoolError> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .init();

    let server = MockServer::new();
    let pool = Arc::new(
        Pool::<MockSession>::builder()
            .session_config(server.clone())
            .min_connections(2)
            .max_connections(4)
            .acquire_timeout(Duration::from_secs(2))
            .validation_interval(Duration::from_millis(200))
            .build()?,
    );
    let repository = Arc::new(OrderRepository {
        pool: Arc::clone(&pool),
    });

    let workers: Vec<_> = (0..8)
        .map(|order_id| {
            let repository = Arc::clone(&repository);
            thread::spawn(move || repository.mark_shipped(order_id))
        })
        .collect();
    for worker in workers {
        let updated = worker.join().expect("worker panicked")?;
        println!("updated {updated} row(s)");
    }

    // Simulate the server dropping a session; the health checker evicts it.
    server.kill(1);
    thread::sleep(Duration::from_millis(500));

    let status = pool.status();
    println!(
        "total={} idle={} active={} utilization={:.1}%",
        status.total,
        status.idle,
        status.active,
        status.utilization()
    );

    let metrics = pool.metrics();
    println!(
        "created={} closed={} checkouts={} health_checks={}",
        metrics.connections_created,
        metrics.connections_closed,
        metrics.checkouts_successful,
        metrics.health_checks_performed
    );

    pool.shutdown();
    println!("open sessions after shutdown: {}", server.open_sessions());
    Ok(())
}
