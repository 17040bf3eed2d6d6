use std::time::Duration;

use anyhow::Context;
use probe_core::{ProbeConfig, Session};
use tokio::task::JoinHandle;

pub const BENCH_TABLE: &str = "bench_kv";

/// Work done by one or more clients.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ClientStats {
    pub completed: u64,
    pub errors: u64,
}

impl ClientStats {
    pub fn merge(&mut self, other: ClientStats) {
        self.completed += other.completed;
        self.errors += other.errors;
    }

    pub fn total(&self) -> u64 {
        self.completed + self.errors
    }
}

/// Operations per second, or 0 when the run was too short to time.
pub fn ops_per_sec(operations: u64, elapsed: Duration) -> f64 {
    if elapsed.as_secs_f64() == 0.0 {
        0.0
    } else {
        operations as f64 / elapsed.as_secs_f64()
    }
}

pub fn print_results(elapsed: Duration, stats: &ClientStats) {
    println!("Results:");
    println!("  Total time: {:?}", elapsed);
    println!(
        "  Operations per second: {:.2}",
        ops_per_sec(stats.total(), elapsed)
    );
    println!("  Completed: {}", stats.completed);
    println!("  Errors: {}", stats.errors);
}

/// Splits `total` operations across `clients`, spreading the remainder
/// over the first clients.
pub fn split_operations(total: usize, clients: usize) -> Vec<usize> {
    if clients == 0 {
        return Vec::new();
    }
    let base = total / clients;
    let extra = total % clients;
    (0..clients)
        .map(|i| if i < extra { base + 1 } else { base })
        .collect()
}

pub async fn connect_clients(config: &ProbeConfig, clients: usize) -> anyhow::Result<Vec<Session>> {
    let mut sessions = Vec::with_capacity(clients);
    for i in 0..clients {
        let session = Session::connect(config)
            .await
            .with_context(|| format!("Failed to connect client {}", i))?;
        sessions.push(session);
    }
    Ok(sessions)
}

/// Drops and recreates the `id -> val` benchmark table.
pub async fn recreate_table(session: &mut Session) -> anyhow::Result<()> {
    session
        .execute(&format!("DROP TABLE IF EXISTS {}", BENCH_TABLE))
        .await?;
    session
        .execute(&format!(
            "CREATE TABLE {} (id BIGINT PRIMARY KEY, val BIGINT)",
            BENCH_TABLE
        ))
        .await?;
    Ok(())
}

/// Recreates the table holding ids `0..record_count` in one transaction.
pub async fn populate(session: &mut Session, record_count: usize) -> anyhow::Result<()> {
    println!("Pre-populating {} records...", record_count);
    recreate_table(session).await?;

    let insert = session
        .prepare(&format!("INSERT INTO {} VALUES ($1, $2)", BENCH_TABLE))
        .await?;
    session.set_autocommit(false).await?;
    for id in 0..record_count as i64 {
        session.execute_prepared(&insert, &[&id, &(id * 10)]).await?;
    }
    session.set_autocommit(true).await?;
    Ok(())
}

pub async fn close_all(sessions: Vec<Session>) {
    for session in sessions {
        if let Err(e) = session.close().await {
            tracing::warn!("Failed to close session: {}", e);
        }
    }
}

/// Waits for every client and sums their stats.
pub async fn join_clients(
    handles: Vec<JoinHandle<anyhow::Result<ClientStats>>>,
) -> anyhow::Result<ClientStats> {
    let mut total = ClientStats::default();
    for handle in handles {
        let stats = handle.await.context("Client task failed")??;
        total.merge(stats);
    }
    Ok(total)
}

/// Run all benchmarks with their default arguments
pub async fn run_all_benchmarks(config: &ProbeConfig) -> anyhow::Result<()> {
    use crate::benchmarks;

    println!("Running all benchmarks against {}...", config.target());
    println!("{}", "=".repeat(60));

    println!("\n1. No-op Round Trip Test");
    println!("{}", "-".repeat(40));
    benchmarks::nop::run_nop_test(config, 1_000_000).await?;

    println!("\n2. Insert Throughput Test");
    println!("{}", "-".repeat(40));
    benchmarks::insert_throughput::run_insert_throughput_test(config, 100_000, 4).await?;

    println!("\n3. Point Select Test");
    println!("{}", "-".repeat(40));
    benchmarks::point_select::run_point_select_test(config, 100_000, 10_000, 4).await?;

    println!("\n4. Mixed Workload Test");
    println!("{}", "-".repeat(40));
    benchmarks::mixed_workload::run_mixed_workload_test(config, 100_000, 80, 4).await?;

    println!("\n{}", "=".repeat(60));
    println!("All benchmarks completed.");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_operations() {
        assert_eq!(split_operations(10, 3), vec![4, 3, 3]);
        assert_eq!(split_operations(2, 4), vec![1, 1, 0, 0]);
        assert_eq!(split_operations(8, 4), vec![2, 2, 2, 2]);
        assert!(split_operations(5, 0).is_empty());
        assert_eq!(split_operations(1_000, 7).iter().sum::<usize>(), 1_000);
    }

    #[test]
    fn test_ops_per_sec_zero_duration() {
        assert_eq!(ops_per_sec(1_000, Duration::ZERO), 0.0);
        assert_eq!(ops_per_sec(1_000, Duration::from_secs(2)), 500.0);
    }

    #[test]
    fn test_stats_merge() {
        let mut total = ClientStats::default();
        total.merge(ClientStats {
            completed: 5,
            errors: 1,
        });
        total.merge(ClientStats {
            completed: 3,
            errors: 0,
        });
        assert_eq!(total.completed, 8);
        assert_eq!(total.errors, 1);
        assert_eq!(total.total(), 9);
    }
}
