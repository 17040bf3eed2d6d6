//! Suite selection.

use std::fmt;
use std::str::FromStr;

use probe_core::ProbeError;

use crate::context::SuiteContext;
use crate::report::SuiteReport;
use crate::suites;

/// Every runnable suite.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Suite {
    Simple,
    Basic,
    Stats,
    Copy,
    Mvcc,
    Insert,
    Alter,
    Sequence,
    TempTable,
    ConcurrentIndex,
}

impl Suite {
    pub const ALL: [Suite; 10] = [
        Suite::Simple,
        Suite::Basic,
        Suite::Stats,
        Suite::Copy,
        Suite::Mvcc,
        Suite::Insert,
        Suite::Alter,
        Suite::Sequence,
        Suite::TempTable,
        Suite::ConcurrentIndex,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Suite::Simple => "simple",
            Suite::Basic => "basic",
            Suite::Stats => "stats",
            Suite::Copy => "copy",
            Suite::Mvcc => "mvcc",
            Suite::Insert => "insert",
            Suite::Alter => "alter",
            Suite::Sequence => "sequence",
            Suite::TempTable => "temp-table",
            Suite::ConcurrentIndex => "concurrent-index",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Suite::Simple => "Recreate the scratch table and nothing else",
            Suite::Basic => "Scans, aggregates, batches, invalid and empty SQL, binary payloads",
            Suite::Stats => "Server statistics tables (server must collect stats)",
            Suite::Copy => "COPY of the query statistics table to a server-side file",
            Suite::Mvcc => "Visibility and write conflicts between two transactions",
            Suite::Insert => "INSERT forms, constraint violations and malformed inserts",
            Suite::Alter => "Column renames",
            Suite::Sequence => "Sequence generation, bounds and cycling",
            Suite::TempTable => "Session-scoped temporary tables",
            Suite::ConcurrentIndex => "Index creation raced against writes and itself",
        }
    }

    /// Suites that depend on server setup beyond a plain database.
    pub fn needs_server_setup(&self) -> bool {
        matches!(self, Suite::Stats | Suite::Copy)
    }

    /// The set run by `all`.
    pub fn defaults() -> Vec<Suite> {
        Self::ALL
            .into_iter()
            .filter(|s| !s.needs_server_setup())
            .collect()
    }

    pub async fn run(&self, ctx: &SuiteContext) -> SuiteReport {
        tracing::info!("Running suite {} against {}", self.name(), ctx.config.target());
        match self {
            Suite::Simple => suites::simple::run(ctx).await,
            Suite::Basic => suites::basic::run(ctx).await,
            Suite::Stats => suites::stats::run(ctx).await,
            Suite::Copy => suites::copy::run(ctx).await,
            Suite::Mvcc => suites::mvcc::run(ctx).await,
            Suite::Insert => suites::insert::run(ctx).await,
            Suite::Alter => suites::alter::run(ctx).await,
            Suite::Sequence => suites::sequence::run(ctx).await,
            Suite::TempTable => suites::temp_table::run(ctx).await,
            Suite::ConcurrentIndex => suites::concurrent_index::run(ctx).await,
        }
    }
}

impl fmt::Display for Suite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Suite {
    type Err = ProbeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase().replace('_', "-");
        Self::ALL
            .into_iter()
            .find(|suite| suite.name() == wanted)
            .ok_or_else(|| ProbeError::Config(format!("Unknown suite: {}", s)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use probe_core::ProbeConfig;

    /// Nothing listens on port 1, so every connect fails at once.
    fn unreachable_context() -> SuiteContext {
        SuiteContext::new(ProbeConfig {
            host: "127.0.0.1".to_string(),
            port: 1,
            connect_timeout_ms: 500,
            ..Default::default()
        })
    }

    #[tokio::test]
    async fn test_shared_session_suites_stop_at_connect() {
        let ctx = unreachable_context();
        for suite in [Suite::Simple, Suite::Basic, Suite::Stats] {
            let report = suite.run(&ctx).await;
            assert_eq!(report.suite, suite.name());
            assert_eq!(report.cases.len(), 1, "{}", suite);
            assert_eq!(report.cases[0].name, "connect");
            assert!(!report.cases[0].passed);
        }
    }

    #[tokio::test]
    async fn test_fixture_suites_record_every_case() {
        let ctx = unreachable_context();
        let expected = [
            (Suite::Mvcc, 10),
            (Suite::Insert, 9),
            (Suite::Alter, 4),
            (Suite::Sequence, 7),
            (Suite::TempTable, 4),
            (Suite::ConcurrentIndex, 4),
        ];
        for (suite, cases) in expected {
            let report = suite.run(&ctx).await;
            assert_eq!(report.cases.len(), cases, "{}", suite);
            assert_eq!(report.passed_count(), 0, "{}", suite);
        }
    }

    #[test]
    fn test_parse_names() {
        for suite in Suite::ALL {
            assert_eq!(suite.name().parse::<Suite>().unwrap(), suite);
        }
        assert_eq!("temp_table".parse::<Suite>().unwrap(), Suite::TempTable);
        assert_eq!("MVCC".parse::<Suite>().unwrap(), Suite::Mvcc);
        assert!("tpcc".parse::<Suite>().is_err());
    }

    #[test]
    fn test_defaults_skip_server_setup() {
        let defaults = Suite::defaults();
        assert_eq!(defaults.len(), 8);
        assert!(!defaults.contains(&Suite::Stats));
        assert!(!defaults.contains(&Suite::Copy));
        assert_eq!(defaults[0], Suite::Simple);
    }

    #[test]
    fn test_display_matches_name() {
        assert_eq!(Suite::ConcurrentIndex.to_string(), "concurrent-index");
    }
}
