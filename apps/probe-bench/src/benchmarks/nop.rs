use std::time::Instant;

use probe_core::{ProbeConfig, Session};

/// Throughput in ops/sec from whole milliseconds, or 0 under 1 ms.
pub fn nop_throughput(operations: usize, elapsed_ms: u128) -> u128 {
    if elapsed_ms == 0 {
        0
    } else {
        operations as u128 * 1000 / elapsed_ms
    }
}

/// Run no-op round trip test
pub async fn run_nop_test(config: &ProbeConfig, operations: usize) -> anyhow::Result<()> {
    println!("Running no-op round trip test...");
    println!("Statements: {}", operations);

    let mut session = Session::connect(config).await?;

    let start = Instant::now();
    let mut errors = 0usize;
    for _ in 0..operations {
        // empty statements are sent and answered like any other
        if session.execute(";").await.is_err() {
            errors += 1;
        }
    }
    let elapsed = start.elapsed();

    println!("Results:");
    println!("  Total time: {:?}", elapsed);
    println!(
        "  Operations per second: {}",
        nop_throughput(operations, elapsed.as_millis())
    );
    println!("  Errors: {}", errors);

    if let Err(e) = session.close().await {
        tracing::warn!("Failed to close session: {}", e);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nop_throughput() {
        assert_eq!(nop_throughput(1_000_000, 0), 0);
        assert_eq!(nop_throughput(1_000_000, 2_000), 500_000);
        assert_eq!(nop_throughput(3, 2), 1_500);
    }
}
