//! Runs SQL probe suites against a PostgreSQL-compatible server.
//!
//! Each suite connects over the wire protocol, drives a fixed scenario and
//! reports every case as PASS or FAIL. The exit code is 0 only when every
//! case passed.

mod cli;

use anyhow::Context;
use clap::Parser;
use probe_suites::{RunSummary, Suite, SuiteContext};
use tracing_subscriber::EnvFilter;

use crate::cli::{Cli, Commands};

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn print_suites() {
    for suite in Suite::ALL {
        let marker = if suite.needs_server_setup() { "*" } else { " " };
        println!("{}{:<18} {}", marker, suite.name(), suite.description());
    }
    println!("\n* not part of `all`; needs server-side setup");
}

fn print_summary(summary: &RunSummary) {
    for report in &summary.suites {
        for case in &report.cases {
            if case.passed {
                println!("PASS {}::{} ({} ms)", report.suite, case.name, case.elapsed_ms);
            } else {
                println!(
                    "FAIL {}::{} ({} ms): {}",
                    report.suite,
                    case.name,
                    case.elapsed_ms,
                    case.error.as_deref().unwrap_or("unknown error")
                );
            }
        }
    }
    println!(
        "\n{} cases, {} passed, {} failed",
        summary.total_cases(),
        summary.total_cases() - summary.failed_cases(),
        summary.failed_cases()
    );
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if cli.command == Commands::List {
        print_suites();
        return Ok(());
    }

    let config = match cli.connection.resolve() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    };

    let mut ctx = SuiteContext::new(config);
    if let Commands::Copy { path } = &cli.command {
        ctx = ctx.with_copy_path(path.clone());
    }

    let mut summary = RunSummary::new();
    for suite in cli.command.suites() {
        summary.push(suite.run(&ctx).await);
    }

    if cli.json {
        let json = serde_json::to_string_pretty(&summary).context("Failed to encode summary")?;
        println!("{}", json);
    } else {
        print_summary(&summary);
    }

    std::process::exit(summary.exit_code());
}
