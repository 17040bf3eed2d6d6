//! Statement races across concurrent sessions.
//!
//! Every contender gets its own connection, opened before the race starts.
//! A barrier releases all contenders at once; the race returns only after
//! every contender has finished, so callers can assert on the combined
//! outcome.

use std::sync::Arc;

use tokio::sync::Barrier;

use crate::config::ProbeConfig;
use crate::error::{ProbeError, Result, SqlDiagnostics};
use crate::session::Session;

/// How one raced statement ended.
#[derive(Debug, Clone, PartialEq)]
pub enum StatementOutcome {
    /// Accepted; holds the number of rows affected
    Succeeded(u64),
    /// Rejected by the server
    Failed(SqlDiagnostics),
}

impl StatementOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, StatementOutcome::Succeeded(_))
    }

    pub fn diagnostics(&self) -> Option<&SqlDiagnostics> {
        match self {
            StatementOutcome::Failed(d) => Some(d),
            StatementOutcome::Succeeded(_) => None,
        }
    }
}

/// Outcome of a two-statement race.
#[derive(Debug, Clone, PartialEq)]
pub struct RaceOutcome {
    pub left: StatementOutcome,
    pub right: StatementOutcome,
}

impl RaceOutcome {
    pub fn successes(&self) -> usize {
        [&self.left, &self.right]
            .iter()
            .filter(|o| o.is_success())
            .count()
    }
}

/// Races `statements`, one session each. Outcomes keep input order.
///
/// Server rejections are outcomes, not errors; connection failures and
/// panicked workers are errors.
pub async fn race_statements(
    config: &ProbeConfig,
    statements: &[&str],
) -> Result<Vec<StatementOutcome>> {
    if statements.is_empty() {
        return Ok(Vec::new());
    }

    let mut sessions = Vec::with_capacity(statements.len());
    for _ in statements {
        sessions.push(Session::connect(config).await?);
    }

    let barrier = Arc::new(Barrier::new(statements.len()));
    let mut handles = Vec::with_capacity(statements.len());
    for (mut session, sql) in sessions.into_iter().zip(statements) {
        let barrier = barrier.clone();
        let sql = sql.to_string();
        handles.push(tokio::spawn(async move {
            barrier.wait().await;
            let outcome = match session.execute(&sql).await {
                Ok(rows) => Ok(StatementOutcome::Succeeded(rows)),
                Err(ProbeError::Sql { diagnostics, .. }) => Ok(StatementOutcome::Failed(diagnostics)),
                Err(e) => Err(e),
            };
            session.close().await?;
            outcome
        }));
    }

    let mut outcomes = Vec::with_capacity(handles.len());
    for (handle, sql) in handles.into_iter().zip(statements) {
        let outcome = handle
            .await
            .map_err(|e| ProbeError::Task(format!("`{}`: {}", sql, e)))??;
        tracing::debug!("Race contender `{}` finished: {:?}", sql, outcome);
        outcomes.push(outcome);
    }
    Ok(outcomes)
}

/// Races two statements against each other.
pub async fn race_pair(config: &ProbeConfig, left: &str, right: &str) -> Result<RaceOutcome> {
    let mut outcomes = race_statements(config, &[left, right]).await?.into_iter();
    match (outcomes.next(), outcomes.next()) {
        (Some(left), Some(right)) => Ok(RaceOutcome { left, right }),
        _ => Err(ProbeError::Task("race lost a contender".to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_empty_race_needs_no_connection() {
        // port 1 is never a database; an empty race must not try to connect
        let config = ProbeConfig {
            port: 1,
            ..Default::default()
        };
        assert!(race_statements(&config, &[]).await.unwrap().is_empty());
    }

    #[test]
    fn test_successes() {
        let outcome = RaceOutcome {
            left: StatementOutcome::Succeeded(0),
            right: StatementOutcome::Failed(SqlDiagnostics::message_only("relation exists")),
        };
        assert_eq!(outcome.successes(), 1);
        assert!(outcome.right.diagnostics().is_some());
        assert!(outcome.left.diagnostics().is_none());
    }
}
