//! Case and suite outcomes.

use std::future::Future;
use std::time::{Duration, Instant};

use probe_core::{ProbeError, SqlDiagnostics};
use serde::Serialize;

/// Result of one case.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CaseOutcome {
    pub name: String,
    pub passed: bool,
    pub elapsed_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub diagnostics: Option<SqlDiagnostics>,
}

/// Outcomes of one suite, in execution order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SuiteReport {
    pub suite: String,
    pub cases: Vec<CaseOutcome>,
}

impl SuiteReport {
    pub fn new(suite: impl Into<String>) -> Self {
        Self {
            suite: suite.into(),
            cases: Vec::new(),
        }
    }

    /// Records a finished case and returns whether it passed.
    pub fn record(&mut self, name: &str, elapsed: Duration, result: Result<(), ProbeError>) -> bool {
        let elapsed_ms = elapsed.as_millis() as u64;
        let outcome = match result {
            Ok(()) => {
                tracing::info!("{}::{} passed in {} ms", self.suite, name, elapsed_ms);
                CaseOutcome {
                    name: name.to_string(),
                    passed: true,
                    elapsed_ms,
                    error: None,
                    diagnostics: None,
                }
            }
            Err(e) => {
                tracing::error!("{}::{} failed: {}", self.suite, name, e);
                CaseOutcome {
                    name: name.to_string(),
                    passed: false,
                    elapsed_ms,
                    diagnostics: e.diagnostics().cloned(),
                    error: Some(e.to_string()),
                }
            }
        };
        let passed = outcome.passed;
        self.cases.push(outcome);
        passed
    }

    /// True when every recorded case passed.
    pub fn passed(&self) -> bool {
        self.cases.iter().all(|c| c.passed)
    }

    pub fn failures(&self) -> Vec<&CaseOutcome> {
        self.cases.iter().filter(|c| !c.passed).collect()
    }

    pub fn passed_count(&self) -> usize {
        self.cases.iter().filter(|c| c.passed).count()
    }
}

/// Reports of every suite in a run.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RunSummary {
    pub suites: Vec<SuiteReport>,
}

impl RunSummary {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, report: SuiteReport) {
        self.suites.push(report);
    }

    pub fn total_cases(&self) -> usize {
        self.suites.iter().map(|s| s.cases.len()).sum()
    }

    pub fn failed_cases(&self) -> usize {
        self.suites.iter().map(|s| s.failures().len()).sum()
    }

    pub fn passed(&self) -> bool {
        self.suites.iter().all(SuiteReport::passed)
    }

    /// 0 when every case passed, 1 otherwise.
    pub fn exit_code(&self) -> i32 {
        if self.passed() {
            0
        } else {
            1
        }
    }
}

/// Awaits `fut` and reports how long it took.
pub async fn timed<F, T>(fut: F) -> (Duration, T)
where
    F: Future<Output = T>,
{
    let start = Instant::now();
    let value = fut.await;
    (start.elapsed(), value)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sql_error() -> ProbeError {
        ProbeError::Sql {
            statement: "INSERT INTO t VALUES (3, 'abc');".to_string(),
            diagnostics: SqlDiagnostics {
                message: "duplicate key value violates unique constraint".to_string(),
                code: Some("23505".to_string()),
                severity: Some("ERROR".to_string()),
                detail: None,
            },
        }
    }

    #[test]
    fn test_record_pass_and_fail() {
        let mut report = SuiteReport::new("insert");
        assert!(report.record("one_value", Duration::from_millis(3), Ok(())));
        assert!(!report.record("unique_column", Duration::from_millis(5), Err(sql_error())));

        assert!(!report.passed());
        assert_eq!(report.passed_count(), 1);
        let failures = report.failures();
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].name, "unique_column");
        assert_eq!(
            failures[0].diagnostics.as_ref().and_then(|d| d.sql_state()),
            Some("23505")
        );
    }

    #[test]
    fn test_assertion_has_no_diagnostics() {
        let mut report = SuiteReport::new("basic");
        report.record("show_table", Duration::ZERO, Err(ProbeError::assertion("Table should have 2 columns")));
        let case = &report.cases[0];
        assert!(case.diagnostics.is_none());
        assert!(case.error.as_deref().unwrap().contains("2 columns"));
    }

    #[test]
    fn test_summary_exit_code() {
        let mut summary = RunSummary::new();
        assert_eq!(summary.exit_code(), 0);

        let mut ok = SuiteReport::new("simple");
        ok.record("init", Duration::ZERO, Ok(()));
        summary.push(ok);
        assert_eq!(summary.exit_code(), 0);

        let mut bad = SuiteReport::new("alter");
        bad.record("rename_to_existing", Duration::ZERO, Err(ProbeError::UnexpectedSuccess("ALTER".into())));
        summary.push(bad);
        assert_eq!(summary.exit_code(), 1);
        assert_eq!(summary.total_cases(), 2);
        assert_eq!(summary.failed_cases(), 1);
    }

    #[test]
    fn test_json_shape() {
        let mut report = SuiteReport::new("simple");
        report.record("init", Duration::from_millis(7), Ok(()));
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["suite"], "simple");
        assert_eq!(json["cases"][0]["elapsed_ms"], 7);
        assert!(json["cases"][0].get("error").is_none());
    }

    #[tokio::test]
    async fn test_timed() {
        let (elapsed, value) = timed(async {
            tokio::time::sleep(Duration::from_millis(5)).await;
            42
        })
        .await;
        assert_eq!(value, 42);
        assert!(elapsed >= Duration::from_millis(5));
    }
}
