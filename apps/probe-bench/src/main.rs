//! Throughput drivers for PostgreSQL-compatible servers.
//!
//! Each benchmark opens its own sessions over the wire protocol and
//! reports total time, operations per second and failed operations:
//! - No-op round trips on a single session
//! - Single-row insert throughput across concurrent clients
//! - Primary-key point selects against a pre-populated table
//! - Mixed point reads and updates

mod benchmarks;
mod cli;
mod utils;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use benchmarks::insert_throughput::run_insert_throughput_test;
use benchmarks::mixed_workload::run_mixed_workload_test;
use benchmarks::nop::run_nop_test;
use benchmarks::point_select::run_point_select_test;
use cli::{Cli, Commands};
use utils::run_all_benchmarks;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .init();

    if let Err(msg) = cli.command.validate() {
        eprintln!("Error: {}", msg);
        std::process::exit(1);
    }

    let config = match cli.connection.resolve() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    };

    let result = match cli.command {
        Commands::Nop { operations } => run_nop_test(&config, operations).await,
        Commands::InsertThroughput {
            operations,
            clients,
        } => run_insert_throughput_test(&config, operations, clients).await,
        Commands::PointSelect {
            operations,
            record_count,
            clients,
        } => run_point_select_test(&config, operations, record_count, clients).await,
        Commands::MixedWorkload {
            operations,
            read_percent,
            clients,
        } => run_mixed_workload_test(&config, operations, read_percent, clients).await,
        Commands::All => run_all_benchmarks(&config).await,
    };

    if let Err(e) = result {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}
