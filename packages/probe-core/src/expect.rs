//! Expectation helpers used by the suites.
//!
//! Each helper returns `ProbeError::Assertion` (or `UnexpectedSuccess`) so a
//! failing check propagates with `?` like any other error.

use std::fmt::Debug;
use std::future::Future;
use std::time::Duration;

use crate::error::{ProbeError, Result, SqlDiagnostics};
use crate::result::ResultSet;
use crate::session::Session;
use crate::value::Value;

/// Fails with `msg` unless `cond` holds.
pub fn ensure(cond: bool, msg: impl Into<String>) -> Result<()> {
    if cond {
        Ok(())
    } else {
        Err(ProbeError::Assertion(msg.into()))
    }
}

pub fn expect_eq<T: PartialEq + Debug>(actual: T, expected: T, what: &str) -> Result<()> {
    if actual == expected {
        Ok(())
    } else {
        Err(ProbeError::assertion(format!(
            "{}: expected {:?}, got {:?}",
            what, expected, actual
        )))
    }
}

pub fn expect_row_count(rs: &ResultSet, expected: usize, what: &str) -> Result<()> {
    expect_eq(rs.row_count(), expected, &format!("{} row count", what))
}

/// Compares every row, in order, against `expected`.
pub fn expect_rows(rs: &ResultSet, expected: &[Vec<Value>], what: &str) -> Result<()> {
    expect_row_count(rs, expected.len(), what)?;
    for (i, (actual, wanted)) in rs.rows().iter().zip(expected).enumerate() {
        if actual != wanted {
            return Err(ProbeError::assertion(format!(
                "{} row {}: expected {:?}, got {:?}",
                what, i, wanted, actual
            )));
        }
    }
    Ok(())
}

/// Turns the outcome of a statement that must fail into its diagnostics.
///
/// Success becomes `UnexpectedSuccess(statement)`; non-SQL errors (lost
/// connection, decode failures) propagate unchanged.
pub fn expect_failure<T>(result: Result<T>, statement: &str) -> Result<SqlDiagnostics> {
    match result {
        Ok(_) => Err(ProbeError::UnexpectedSuccess(statement.to_string())),
        Err(ProbeError::Sql { diagnostics, .. }) => {
            tracing::debug!("Expected failure for `{}`: {}", statement, diagnostics);
            Ok(diagnostics)
        }
        Err(other) => Err(other),
    }
}

/// Runs `sql` and requires the server to reject it.
pub async fn expect_sql_error(session: &mut Session, sql: &str) -> Result<SqlDiagnostics> {
    expect_failure(session.execute(sql).await, sql)
}

/// Requires `diagnostics` to carry an SQLSTATE of `class` (e.g. `42` for
/// syntax and reference errors, `23` for constraint violations).
pub fn expect_state_class(diagnostics: &SqlDiagnostics, class: &str, statement: &str) -> Result<()> {
    if diagnostics.class() == Some(class) {
        Ok(())
    } else {
        Err(ProbeError::assertion(format!(
            "`{}` failed with SQLSTATE {}, expected class {}: {}",
            statement,
            diagnostics.sql_state().unwrap_or("none"),
            class,
            diagnostics.message
        )))
    }
}

/// Runs `sql`, requiring a rejection in SQLSTATE class `class`.
pub async fn expect_sql_error_class(session: &mut Session, sql: &str, class: &str) -> Result<SqlDiagnostics> {
    let diagnostics = expect_sql_error(session, sql).await?;
    expect_state_class(&diagnostics, class, sql)?;
    Ok(diagnostics)
}

/// `expect_failure` for a statement that may block on a lock held by
/// another session. Blocking longer than `limit` fails the check.
pub async fn expect_failure_within<T, F>(limit: Duration, statement: &str, fut: F) -> Result<SqlDiagnostics>
where
    F: Future<Output = Result<T>>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(result) => expect_failure(result, statement),
        Err(_) => Err(ProbeError::assertion(format!(
            "`{}` blocked for {:?} instead of failing",
            statement, limit
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sql_err() -> ProbeError {
        ProbeError::Sql {
            statement: "CREATE TABEL foo (id);".to_string(),
            diagnostics: SqlDiagnostics {
                message: "syntax error at or near \"TABEL\"".to_string(),
                code: Some("42601".to_string()),
                severity: Some("ERROR".to_string()),
                detail: None,
            },
        }
    }

    #[test]
    fn test_ensure() {
        assert!(ensure(true, "never").is_ok());
        let err = ensure(false, "Rows aren't distinct").unwrap_err();
        assert_eq!(err.to_string(), "Assertion failed: Rows aren't distinct");
    }

    #[test]
    fn test_expect_eq_message() {
        let err = expect_eq(3, 2, "count").unwrap_err();
        assert_eq!(err.to_string(), "Assertion failed: count: expected 2, got 3");
    }

    #[test]
    fn test_expect_rows() {
        let rs = ResultSet::new(
            vec!["a".into(), "b".into()],
            vec![vec![Value::Int(1), Value::Int(11)]],
        );
        assert!(expect_rows(&rs, &[vec![Value::Int(1), Value::Int(11)]], "foo").is_ok());
        assert!(expect_rows(&rs, &[vec![Value::Int(1), Value::Int(100)]], "foo").is_err());
        assert!(expect_rows(&rs, &[], "foo").is_err());
    }

    #[test]
    fn test_expect_failure_on_success() {
        let err = expect_failure(Ok(1u64), "SELECT * FROM A, B;").unwrap_err();
        assert!(matches!(err, ProbeError::UnexpectedSuccess(ref s) if s == "SELECT * FROM A, B;"));
    }

    #[test]
    fn test_expect_failure_on_sql_error() {
        let diag = expect_failure::<u64>(Err(sql_err()), "CREATE TABEL foo (id);").unwrap();
        assert_eq!(diag.class(), Some("42"));
    }

    #[test]
    fn test_expect_failure_propagates_other_errors() {
        let err = expect_failure::<u64>(Err(ProbeError::Task("gone".into())), "SELECT 1").unwrap_err();
        assert!(matches!(err, ProbeError::Task(_)));
    }

    #[test]
    fn test_expect_state_class() {
        let syntax = expect_failure::<u64>(Err(sql_err()), "CREATE TABEL foo (id);").unwrap();
        assert!(expect_state_class(&syntax, "42", "CREATE TABEL foo (id);").is_ok());

        // a duplicate key is a rejection, but not the one a malformed insert should cause
        let duplicate = SqlDiagnostics {
            message: "duplicate key value violates unique constraint \"test_pkey\"".to_string(),
            code: Some("23505".to_string()),
            severity: Some("ERROR".to_string()),
            detail: None,
        };
        let err = expect_state_class(&duplicate, "42", "INSERT INTO test VALUES(3, 4);").unwrap_err();
        assert!(err.to_string().contains("SQLSTATE 23505"));

        let no_code = SqlDiagnostics::message_only("connection reset");
        assert!(expect_state_class(&no_code, "42", "SELECT 1").is_err());
    }

    #[tokio::test]
    async fn test_expect_failure_within() {
        let limit = Duration::from_millis(500);
        let diag = expect_failure_within(limit, "DELETE", async { Err::<u64, _>(sql_err()) })
            .await
            .unwrap();
        assert_eq!(diag.sql_state(), Some("42601"));

        let blocked = async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(1u64)
        };
        let err = expect_failure_within(Duration::from_millis(10), "DELETE", blocked)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("blocked"));
    }
}
