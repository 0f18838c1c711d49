//! Property-based tests for pool accounting.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

mod common;

use std::time::Duration;

use odbc_pool::{PoolConfig, PoolStatus, PooledConnection};
use odbc_testing::MockSession;
use proptest::prelude::*;

#[derive(Debug, Clone)]
enum Op {
    Acquire,
    Release(usize),
    Invalidate(usize),
    Detach(usize),
    Kill(usize),
    KillAll,
    HealthCheck,
    FailNextConnect,
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        4 => Just(Op::Acquire),
        3 => any::<usize>().prop_map(Op::Release),
        1 => any::<usize>().prop_map(Op::Invalidate),
        1 => any::<usize>().prop_map(Op::Detach),
        1 => any::<usize>().prop_map(Op::Kill),
        1 => Just(Op::KillAll),
        1 => Just(Op::HealthCheck),
        1 => Just(Op::FailNextConnect),
    ]
}

fn check_accounting(status: &PoolStatus, held: usize) -> Result<(), TestCaseError> {
    prop_assert_eq!(status.idle + status.active + status.validating, status.total);
    prop_assert!(status.total <= status.max);
    prop_assert_eq!(status.active, held);
    prop_assert_eq!(status.validating, 0);
    Ok(())
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_accounting_holds_across_operations(
        min in 0usize..3,
        extra in 0usize..3,
        test_on_borrow in any::<bool>(),
        ops in prop::collection::vec(op_strategy(), 1..40),
    ) {
        let max = min + extra + 1;
        let (pool, server) = common::mock_pool(
            PoolConfig::new()
                .min_connections(min)
                .max_connections(max)
                .max_idle_time(Duration::from_secs(600))
                .test_on_borrow(test_on_borrow),
        );
        let mut held: Vec<PooledConnection<MockSession>> = Vec::new();
        let mut detached: Vec<MockSession> = Vec::new();

        for op in ops {
            match op {
                Op::Acquire => match pool.try_get() {
                    Ok(Some(conn)) => held.push(conn),
                    Ok(None) => {
                        prop_assert_eq!(held.len(), max);
                    }
                    Err(err) => {
                        prop_assert!(err.is_retryable());
                    }
                },
                Op::Release(i) if !held.is_empty() => {
                    let mut conn = held.remove(i % held.len());
                    conn.release().unwrap();
                }
                Op::Invalidate(i) if !held.is_empty() => {
                    let mut conn = held.remove(i % held.len());
                    conn.invalidate().unwrap();
                }
                Op::Detach(i) if !held.is_empty() => {
                    let conn = held.remove(i % held.len());
                    detached.push(conn.detach().unwrap());
                }
                Op::Kill(i) if !held.is_empty() => {
                    let id = held[i % held.len()].session().unwrap().id();
                    server.kill(id);
                }
                Op::KillAll => server.kill_all(),
                Op::HealthCheck => {
                    let report = pool.run_health_check();
                    prop_assert!(report.evicted() <= report.checked);
                }
                Op::FailNextConnect => server.fail_next_connects(1),
                _ => {}
            }
            check_accounting(&pool.status(), held.len())?;
        }

        drop(held);
        pool.shutdown();
        let status = pool.status();
        prop_assert_eq!((status.total, status.idle, status.active), (0, 0, 0));
        prop_assert_eq!(server.open_sessions(), detached.len());
        prop_assert!(server.max_disconnects_per_session() <= 1);
    }
}
