//! Suite implementations.
//!
//! A suite is a `run(ctx) -> SuiteReport` function. Suites sharing one
//! session stop at the first failed case; suites whose cases build their
//! own fixtures run every case.

use probe_core::{Session, Value};

use crate::context::SuiteContext;
use crate::report::{timed, SuiteReport};

/// Runs one case future, records it, and evaluates to whether it passed.
macro_rules! run_case {
    ($report:expr, $name:expr, $case:expr) => {{
        let (elapsed, result) = $crate::report::timed($case).await;
        $report.record($name, elapsed, result)
    }};
}

pub mod alter;
pub mod basic;
pub mod concurrent_index;
pub mod copy;
pub mod insert;
pub mod mvcc;
pub mod sequence;
pub mod simple;
pub mod stats;
pub mod temp_table;

/// Opens the shared session of a fail-fast suite, recording a `connect`
/// case if that fails.
pub(crate) async fn open_session(report: &mut SuiteReport, ctx: &SuiteContext) -> Option<Session> {
    let (elapsed, result) = timed(ctx.connect()).await;
    match result {
        Ok(session) => Some(session),
        Err(e) => {
            report.record("connect", elapsed, Err(e));
            None
        }
    }
}

pub(crate) async fn close_session(session: Session) {
    let target = session.target().to_string();
    if let Err(e) = session.close().await {
        tracing::warn!("Closing session to {} failed: {}", target, e);
    }
}

/// Single-quoted SQL literal.
pub(crate) fn quote_literal(s: &str) -> String {
    format!("'{}'", s.replace('\'', "''"))
}

/// Integer row helper for expected result sets.
pub(crate) fn int_row(values: &[i64]) -> Vec<Value> {
    values.iter().map(|v| Value::Int(*v)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use probe_core::{ProbeConfig, ProbeError};

    fn unreachable_context() -> SuiteContext {
        SuiteContext::new(ProbeConfig {
            host: "127.0.0.1".to_string(),
            port: 1,
            connect_timeout_ms: 500,
            ..Default::default()
        })
    }

    #[tokio::test]
    async fn test_chained_cases_stop_at_first_failure() {
        let mut report = SuiteReport::new("chain");
        let completed = run_case!(report, "first", async { Ok(()) })
            && run_case!(report, "second", async { Err(ProbeError::assertion("boom")) })
            && run_case!(report, "third", async { Ok(()) });

        assert!(!completed);
        let names: Vec<_> = report.cases.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["first", "second"]);
        assert!(!report.cases[1].passed);
    }

    #[tokio::test]
    async fn test_unchained_cases_all_run() {
        let mut report = SuiteReport::new("each");
        run_case!(report, "first", async { Err(ProbeError::assertion("boom")) });
        run_case!(report, "second", async { Ok(()) });
        assert_eq!(report.cases.len(), 2);
        assert_eq!(report.passed_count(), 1);
    }

    #[tokio::test]
    async fn test_open_session_records_connect_failure() {
        let mut report = SuiteReport::new("basic");
        let session = open_session(&mut report, &unreachable_context()).await;
        assert!(session.is_none());
        assert_eq!(report.cases.len(), 1);
        assert_eq!(report.cases[0].name, "connect");
        assert!(!report.cases[0].passed);
    }

    #[test]
    fn test_quote_literal() {
        assert_eq!(quote_literal("/tmp/stats.csv"), "'/tmp/stats.csv'");
        assert_eq!(quote_literal("it's"), "'it''s'");
    }

    #[test]
    fn test_int_row() {
        assert_eq!(int_row(&[1, 11]), vec![Value::Int(1), Value::Int(11)]);
    }
}
