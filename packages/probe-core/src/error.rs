//! Probe error types.

use std::fmt;

use serde::Serialize;
use thiserror::Error;

/// Errors raised while talking to the server or checking its answers.
#[derive(Error, Debug)]
pub enum ProbeError {
    /// Invalid or unreadable configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// Could not establish a connection
    #[error("Connection to {target} failed: {source}")]
    Connect {
        target: String,
        #[source]
        source: tokio_postgres::Error,
    },

    /// TLS connector setup failed
    #[error("TLS setup failed: {0}")]
    Tls(String),

    /// The server rejected a statement
    #[error("SQL error in `{statement}`: {diagnostics}")]
    Sql {
        statement: String,
        diagnostics: SqlDiagnostics,
    },

    /// A returned column could not be decoded
    #[error("Decode error: {0}")]
    Decode(String),

    /// Returned data did not match the expectation
    #[error("Assertion failed: {0}")]
    Assertion(String),

    /// A statement that must fail was accepted
    #[error("Statement should have failed but succeeded: {0}")]
    UnexpectedSuccess(String),

    /// A concurrent worker panicked or was cancelled
    #[error("Concurrent task failed: {0}")]
    Task(String),

    /// Local I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ProbeError>;

impl ProbeError {
    /// Wraps a driver error raised by `statement`.
    pub fn sql(statement: impl Into<String>, err: &tokio_postgres::Error) -> Self {
        ProbeError::Sql {
            statement: statement.into(),
            diagnostics: SqlDiagnostics::from_pg(err),
        }
    }

    /// Shorthand for an assertion failure.
    pub fn assertion(msg: impl Into<String>) -> Self {
        ProbeError::Assertion(msg.into())
    }

    /// Server diagnostics, when this is an SQL error.
    pub fn diagnostics(&self) -> Option<&SqlDiagnostics> {
        match self {
            ProbeError::Sql { diagnostics, .. } => Some(diagnostics),
            _ => None,
        }
    }
}

/// Server-reported details of a failed statement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SqlDiagnostics {
    /// Primary error message
    pub message: String,
    /// Five-character SQLSTATE, if the server sent one
    pub code: Option<String>,
    /// ERROR, FATAL, ...
    pub severity: Option<String>,
    /// Optional detail line
    pub detail: Option<String>,
}

impl SqlDiagnostics {
    /// Extracts diagnostics from a driver error.
    ///
    /// Errors that never reached the server (closed connection, protocol
    /// desync) carry only a message.
    pub fn from_pg(err: &tokio_postgres::Error) -> Self {
        match err.as_db_error() {
            Some(db) => SqlDiagnostics {
                message: db.message().to_string(),
                code: Some(db.code().code().to_string()),
                severity: Some(db.severity().to_string()),
                detail: db.detail().map(str::to_string),
            },
            None => SqlDiagnostics {
                message: err.to_string(),
                code: err.code().map(|c| c.code().to_string()),
                severity: None,
                detail: None,
            },
        }
    }

    /// Diagnostics carrying only a message.
    pub fn message_only(message: impl Into<String>) -> Self {
        SqlDiagnostics {
            message: message.into(),
            code: None,
            severity: None,
            detail: None,
        }
    }

    pub fn sql_state(&self) -> Option<&str> {
        self.code.as_deref()
    }

    /// SQLSTATE class: the first two characters of the code.
    pub fn class(&self) -> Option<&str> {
        self.code.as_deref().and_then(|c| c.get(..2))
    }
}

impl fmt::Display for SqlDiagnostics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)?;
        if let Some(code) = &self.code {
            write!(f, " (SQLSTATE {})", code)?;
        }
        if let Some(detail) = &self.detail {
            write!(f, ": {}", detail)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn diag(code: Option<&str>) -> SqlDiagnostics {
        SqlDiagnostics {
            message: "relation \"invalid_table\" does not exist".to_string(),
            code: code.map(str::to_string),
            severity: Some("ERROR".to_string()),
            detail: None,
        }
    }

    #[test]
    fn test_display_includes_sql_state() {
        let d = diag(Some("42P01"));
        assert_eq!(
            d.to_string(),
            "relation \"invalid_table\" does not exist (SQLSTATE 42P01)"
        );
    }

    #[test]
    fn test_display_without_code() {
        let d = SqlDiagnostics::message_only("connection closed");
        assert_eq!(d.to_string(), "connection closed");
    }

    #[test]
    fn test_class_is_first_two_chars() {
        assert_eq!(diag(Some("40001")).class(), Some("40"));
        assert_eq!(diag(None).class(), None);
    }

    #[test]
    fn test_sql_error_exposes_diagnostics() {
        let err = ProbeError::Sql {
            statement: "SELECT * FROM INVALID_TABLE;".to_string(),
            diagnostics: diag(Some("42P01")),
        };
        assert_eq!(err.diagnostics().and_then(|d| d.sql_state()), Some("42P01"));
        assert!(err.to_string().contains("SELECT * FROM INVALID_TABLE;"));
        assert!(ProbeError::assertion("x").diagnostics().is_none());
    }
}
