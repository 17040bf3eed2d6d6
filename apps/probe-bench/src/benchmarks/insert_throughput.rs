use std::time::Instant;

use probe_core::{ProbeConfig, Session};

use crate::utils::{
    close_all, connect_clients, join_clients, print_results, recreate_table, split_operations,
    ClientStats, BENCH_TABLE,
};

/// Run insert throughput test
pub async fn run_insert_throughput_test(
    config: &ProbeConfig,
    operations: usize,
    clients: usize,
) -> anyhow::Result<()> {
    println!("Running insert throughput test...");
    println!("Rows: {}, Clients: {}", operations, clients);

    let mut sessions = connect_clients(config, clients).await?;
    if let Some(first) = sessions.first_mut() {
        recreate_table(first).await?;
    }

    let start = Instant::now();
    let mut handles = Vec::with_capacity(clients);
    let mut next_id = 0i64;
    for (session, count) in sessions.into_iter().zip(split_operations(operations, clients)) {
        let first_id = next_id;
        next_id += count as i64;
        handles.push(tokio::spawn(insert_rows(session, first_id, count)));
    }
    let stats = join_clients(handles).await?;
    let elapsed = start.elapsed();

    print_results(elapsed, &stats);
    Ok(())
}

/// Inserts `count` rows with ids starting at `first_id`, one per statement.
async fn insert_rows(mut session: Session, first_id: i64, count: usize) -> anyhow::Result<ClientStats> {
    let insert = session
        .prepare(&format!("INSERT INTO {} VALUES ($1, $2)", BENCH_TABLE))
        .await?;

    let mut stats = ClientStats::default();
    for id in first_id..first_id + count as i64 {
        match session.execute_prepared(&insert, &[&id, &id]).await {
            Ok(_) => stats.completed += 1,
            Err(e) => {
                tracing::debug!("insert {} failed: {}", id, e);
                stats.errors += 1;
            }
        }
    }
    close_all(vec![session]).await;
    Ok(stats)
}
