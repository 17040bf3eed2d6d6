use std::time::Instant;

use probe_core::{ProbeConfig, Session};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::utils::{
    close_all, connect_clients, join_clients, populate, print_results, split_operations,
    ClientStats, BENCH_TABLE,
};

/// Rows the workload reads and updates.
const RECORD_COUNT: usize = 10_000;

/// Per-client tally of the operation mix.
#[derive(Debug, Default, Clone, Copy)]
struct MixStats {
    reads: u64,
    writes: u64,
    errors: u64,
}

/// Run mixed workload test
pub async fn run_mixed_workload_test(
    config: &ProbeConfig,
    operations: usize,
    read_percent: u8,
    clients: usize,
) -> anyhow::Result<()> {
    println!("Running mixed workload test...");
    println!(
        "Total operations: {}, Read percentage: {}%, Clients: {}",
        operations, read_percent, clients
    );

    let mut sessions = connect_clients(config, clients).await?;
    if let Some(first) = sessions.first_mut() {
        populate(first, RECORD_COUNT).await?;
    }

    println!("Starting mixed workload benchmark...");
    let start = Instant::now();
    let mut handles = Vec::with_capacity(clients);
    for (client, (session, count)) in sessions
        .into_iter()
        .zip(split_operations(operations, clients))
        .enumerate()
    {
        handles.push(tokio::spawn(mixed_ops(
            session,
            client as u64,
            count,
            read_percent,
        )));
    }

    let mut mix = MixStats::default();
    for handle in handles {
        let client = handle.await??;
        mix.reads += client.reads;
        mix.writes += client.writes;
        mix.errors += client.errors;
    }
    let elapsed = start.elapsed();

    let stats = ClientStats {
        completed: mix.reads + mix.writes,
        errors: mix.errors,
    };
    print_results(elapsed, &stats);
    println!("  Reads performed: {}", mix.reads);
    println!("  Writes performed: {}", mix.writes);
    Ok(())
}

async fn mixed_ops(
    mut session: Session,
    seed: u64,
    count: usize,
    read_percent: u8,
) -> anyhow::Result<MixStats> {
    let select = session
        .prepare(&format!("SELECT val FROM {} WHERE id = $1", BENCH_TABLE))
        .await?;
    let update = session
        .prepare(&format!("UPDATE {} SET val = val + 1 WHERE id = $1", BENCH_TABLE))
        .await?;
    let mut rng = StdRng::seed_from_u64(seed);

    let mut mix = MixStats::default();
    for _ in 0..count {
        let id = rng.gen_range(0..RECORD_COUNT as i64);
        if rng.gen_range(0..100u8) < read_percent {
            match session.query_prepared(&select, &[&id]).await {
                Ok(_) => mix.reads += 1,
                Err(e) => {
                    tracing::debug!("read {} failed: {}", id, e);
                    mix.errors += 1;
                }
            }
        } else {
            match session.execute_prepared(&update, &[&id]).await {
                Ok(_) => mix.writes += 1,
                Err(e) => {
                    tracing::debug!("update {} failed: {}", id, e);
                    mix.errors += 1;
                }
            }
        }
    }
    close_all(vec![session]).await;
    Ok(mix)
}
