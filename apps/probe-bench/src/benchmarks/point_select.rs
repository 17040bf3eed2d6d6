use std::time::Instant;

use probe_core::{ProbeConfig, Session};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::utils::{
    close_all, connect_clients, join_clients, populate, print_results, split_operations,
    ClientStats, BENCH_TABLE,
};

/// Run point select test
pub async fn run_point_select_test(
    config: &ProbeConfig,
    operations: usize,
    record_count: usize,
    clients: usize,
) -> anyhow::Result<()> {
    println!("Running point select test...");
    println!(
        "Lookups: {}, Records: {}, Clients: {}",
        operations, record_count, clients
    );

    let mut sessions = connect_clients(config, clients).await?;
    if let Some(first) = sessions.first_mut() {
        populate(first, record_count).await?;
    }

    println!("Starting point select benchmark...");
    let start = Instant::now();
    let mut handles = Vec::with_capacity(clients);
    for (client, (session, count)) in sessions
        .into_iter()
        .zip(split_operations(operations, clients))
        .enumerate()
    {
        handles.push(tokio::spawn(select_rows(
            session,
            client as u64,
            count,
            record_count,
        )));
    }
    let stats = join_clients(handles).await?;
    let elapsed = start.elapsed();

    print_results(elapsed, &stats);
    Ok(())
}

/// Looks up `count` random ids below `record_count`. A lookup that returns
/// no row counts as an error.
async fn select_rows(
    mut session: Session,
    seed: u64,
    count: usize,
    record_count: usize,
) -> anyhow::Result<ClientStats> {
    let select = session
        .prepare(&format!("SELECT val FROM {} WHERE id = $1", BENCH_TABLE))
        .await?;
    let mut rng = StdRng::seed_from_u64(seed);

    let mut stats = ClientStats::default();
    for _ in 0..count {
        let id = rng.gen_range(0..record_count as i64);
        match session.query_prepared(&select, &[&id]).await {
            Ok(rs) if rs.row_count() == 1 => stats.completed += 1,
            Ok(_) => {
                tracing::debug!("id {} not found", id);
                stats.errors += 1;
            }
            Err(e) => {
                tracing::debug!("lookup {} failed: {}", id, e);
                stats.errors += 1;
            }
        }
    }
    close_all(vec![session]).await;
    Ok(stats)
}
