//! Suite runs against a running server.
//!
//! Skipped unless `SQLPROBE_LIVE` is set. `SQLPROBE_*` variables select the
//! server; set `SQLPROBE_BINARY_TYPE=BYTEA` for a stock PostgreSQL.

use probe_core::ProbeConfig;
use probe_suites::{RunSummary, Suite, SuiteContext};

fn live_context() -> Option<SuiteContext> {
    if std::env::var("SQLPROBE_LIVE").is_err() {
        eprintln!("SQLPROBE_LIVE not set, skipping");
        return None;
    }
    let mut config = ProbeConfig::default();
    config.apply_env_overrides().unwrap();
    Some(SuiteContext::new(config))
}

fn print_failures(summary: &RunSummary) {
    for suite in &summary.suites {
        for case in suite.failures() {
            eprintln!("{}::{} failed: {:?}", suite.suite, case.name, case.error);
        }
    }
}

#[tokio::test]
async fn test_simple_suite() {
    let Some(ctx) = live_context() else { return };
    let report = Suite::Simple.run(&ctx).await;
    assert_eq!(report.cases.len(), 1);
    assert!(report.passed(), "{:?}", report.failures());
}

#[tokio::test]
async fn test_default_suites_report_every_case() {
    let Some(ctx) = live_context() else { return };
    let mut summary = RunSummary::new();
    for suite in Suite::defaults() {
        summary.push(suite.run(&ctx).await);
    }
    print_failures(&summary);

    assert_eq!(summary.suites.len(), Suite::defaults().len());
    // suites that rebuild their fixtures always run every case
    let mvcc = summary.suites.iter().find(|s| s.suite == "mvcc").unwrap();
    assert_eq!(mvcc.cases.len(), 10);
    let sequence = summary.suites.iter().find(|s| s.suite == "sequence").unwrap();
    assert_eq!(sequence.cases.len(), 7);
}

