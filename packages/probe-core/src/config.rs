//! Connection configuration.
//!
//! Supports TOML config files, environment variable overrides, and defaults.

use std::env;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{ProbeError, Result};

/// Whether and how the session negotiates TLS.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SslMode {
    /// Plaintext only
    #[default]
    Disable,
    /// TLS when the server offers it and a root certificate is configured
    Prefer,
    /// Fail unless TLS is negotiated
    Require,
}

impl FromStr for SslMode {
    type Err = ProbeError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "disable" => Ok(SslMode::Disable),
            "prefer" => Ok(SslMode::Prefer),
            "require" => Ok(SslMode::Require),
            other => Err(ProbeError::Config(format!("Invalid ssl mode: {}", other))),
        }
    }
}

impl fmt::Display for SslMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SslMode::Disable => "disable",
            SslMode::Prefer => "prefer",
            SslMode::Require => "require",
        };
        f.write_str(s)
    }
}

/// Isolation level requested by the `BEGIN` of a manual transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum IsolationLevel {
    ReadCommitted,
    RepeatableRead,
    Serializable,
}

impl IsolationLevel {
    /// SQL spelling, as used after `ISOLATION LEVEL`.
    pub fn as_sql(&self) -> &'static str {
        match self {
            IsolationLevel::ReadCommitted => "READ COMMITTED",
            IsolationLevel::RepeatableRead => "REPEATABLE READ",
            IsolationLevel::Serializable => "SERIALIZABLE",
        }
    }
}

impl FromStr for IsolationLevel {
    type Err = ProbeError;

    fn from_str(s: &str) -> Result<Self> {
        let normalized: String = s
            .trim()
            .chars()
            .map(|c| if c == '_' || c == ' ' { '-' } else { c.to_ascii_lowercase() })
            .collect();
        match normalized.as_str() {
            "read-committed" => Ok(IsolationLevel::ReadCommitted),
            "repeatable-read" => Ok(IsolationLevel::RepeatableRead),
            "serializable" => Ok(IsolationLevel::Serializable),
            _ => Err(ProbeError::Config(format!("Invalid isolation level: {}", s.trim()))),
        }
    }
}

impl fmt::Display for IsolationLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            IsolationLevel::ReadCommitted => "read-committed",
            IsolationLevel::RepeatableRead => "repeatable-read",
            IsolationLevel::Serializable => "serializable",
        };
        f.write_str(s)
    }
}

/// Target server and harness settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProbeConfig {
    /// Server host (default: "localhost")
    pub host: String,
    /// Server port (default: 15721)
    pub port: u16,
    /// Database name (default: "postgres")
    pub dbname: String,
    /// Login user (default: "postgres")
    pub user: String,
    /// Login password (default: "postgres")
    pub password: String,
    /// TLS negotiation mode (default: disable)
    pub ssl_mode: SslMode,
    /// PEM file with the CA certificate(s) trusted for the server
    pub ssl_root_cert: Option<PathBuf>,
    /// Connect timeout in milliseconds (default: 5000)
    pub connect_timeout_ms: u64,
    /// Server statistics aggregation interval in milliseconds (default: 1000)
    pub stat_interval_ms: u64,
    /// Upper bound for a statement expected to hit a write conflict
    /// (default: 5000). A server that blocks instead of failing is reported
    /// once this elapses.
    pub conflict_timeout_ms: u64,
    /// Column type used to store binary payloads (default: "VARBINARY")
    pub binary_column_type: String,
    /// Application name reported to the server
    pub application_name: String,
    /// Isolation level for manual transactions; unset leaves the server default
    pub isolation_level: Option<IsolationLevel>,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 15721,
            dbname: "postgres".to_string(),
            user: "postgres".to_string(),
            password: "postgres".to_string(),
            ssl_mode: SslMode::Disable,
            ssl_root_cert: None,
            connect_timeout_ms: 5000,
            stat_interval_ms: 1000,
            conflict_timeout_ms: 5000,
            binary_column_type: "VARBINARY".to_string(),
            application_name: "sqlprobe".to_string(),
            isolation_level: None,
        }
    }
}

impl ProbeConfig {
    /// Creates a new configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads configuration from a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(|e| {
            ProbeError::Config(format!(
                "Failed to read config file {}: {}",
                path.as_ref().display(),
                e
            ))
        })?;
        Self::from_toml(&content)
    }

    /// Parses configuration from a TOML string.
    pub fn from_toml(toml_str: &str) -> Result<Self> {
        toml::from_str(toml_str).map_err(|e| ProbeError::Config(format!("Invalid TOML: {}", e)))
    }

    /// Applies environment variable overrides.
    /// Variables are prefixed with `SQLPROBE_`, e.g. `SQLPROBE_PORT=5432`.
    pub fn apply_env_overrides(&mut self) -> Result<()> {
        if let Ok(val) = env::var("SQLPROBE_HOST") {
            self.host = val;
        }
        if let Ok(val) = env::var("SQLPROBE_PORT") {
            self.port = val
                .parse()
                .map_err(|_| ProbeError::Config(format!("Invalid port: {}", val)))?;
        }
        if let Ok(val) = env::var("SQLPROBE_DBNAME") {
            self.dbname = val;
        }
        if let Ok(val) = env::var("SQLPROBE_USER") {
            self.user = val;
        }
        if let Ok(val) = env::var("SQLPROBE_PASSWORD") {
            self.password = val;
        }
        if let Ok(val) = env::var("SQLPROBE_SSLMODE") {
            self.ssl_mode = val.parse()?;
        }
        if let Ok(val) = env::var("SQLPROBE_SSLROOTCERT") {
            self.ssl_root_cert = Some(PathBuf::from(val));
        }
        if let Ok(val) = env::var("SQLPROBE_STAT_INTERVAL_MS") {
            self.stat_interval_ms = val
                .parse()
                .map_err(|_| ProbeError::Config(format!("Invalid stat_interval_ms: {}", val)))?;
        }
        if let Ok(val) = env::var("SQLPROBE_CONFLICT_TIMEOUT_MS") {
            self.conflict_timeout_ms = val.parse().map_err(|_| {
                ProbeError::Config(format!("Invalid conflict_timeout_ms: {}", val))
            })?;
        }
        if let Ok(val) = env::var("SQLPROBE_BINARY_TYPE") {
            self.binary_column_type = val;
        }
        if let Ok(val) = env::var("SQLPROBE_ISOLATION") {
            self.isolation_level = Some(val.parse()?);
        }
        Ok(())
    }

    /// Rejects settings that cannot produce a connection.
    pub fn validate(&self) -> Result<()> {
        if self.host.trim().is_empty() {
            return Err(ProbeError::Config("host must not be empty".to_string()));
        }
        if self.port == 0 {
            return Err(ProbeError::Config("port must be greater than 0".to_string()));
        }
        if self.ssl_mode == SslMode::Require && self.ssl_root_cert.is_none() {
            return Err(ProbeError::Config(
                "ssl_mode=require needs ssl_root_cert".to_string(),
            ));
        }
        Ok(())
    }

    /// Driver configuration for this target.
    pub fn pg_config(&self) -> tokio_postgres::Config {
        let ssl_mode = match self.ssl_mode {
            SslMode::Disable => tokio_postgres::config::SslMode::Disable,
            SslMode::Prefer => tokio_postgres::config::SslMode::Prefer,
            SslMode::Require => tokio_postgres::config::SslMode::Require,
        };

        let mut pg = tokio_postgres::Config::new();
        pg.host(&self.host)
            .port(self.port)
            .dbname(&self.dbname)
            .user(&self.user)
            .password(&self.password)
            .application_name(&self.application_name)
            .connect_timeout(Duration::from_millis(self.connect_timeout_ms))
            .ssl_mode(ssl_mode);
        pg
    }

    /// `user@host:port/dbname`, safe to log.
    pub fn target(&self) -> String {
        format!("{}@{}:{}/{}", self.user, self.host, self.port, self.dbname)
    }

    /// How long to wait for the server to publish statistics.
    pub fn stat_wait(&self) -> Duration {
        Duration::from_millis(self.stat_interval_ms * 2)
    }

    pub fn conflict_timeout(&self) -> Duration {
        Duration::from_millis(self.conflict_timeout_ms)
    }

    /// Statement that opens a manual transaction.
    pub fn begin_statement(&self) -> String {
        match self.isolation_level {
            Some(level) => format!("BEGIN ISOLATION LEVEL {}", level.as_sql()),
            None => "BEGIN".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_default_config() {
        let config = ProbeConfig::default();
        assert_eq!(config.host, "localhost");
        assert_eq!(config.port, 15721);
        assert_eq!(config.ssl_mode, SslMode::Disable);
        assert_eq!(config.stat_wait(), Duration::from_millis(2000));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_from_toml_partial() {
        let config = ProbeConfig::from_toml(
            r#"
            host = "db.internal"
            port = 5432
            ssl_mode = "prefer"
            "#,
        )
        .unwrap();
        assert_eq!(config.host, "db.internal");
        assert_eq!(config.port, 5432);
        assert_eq!(config.ssl_mode, SslMode::Prefer);
        // untouched fields keep defaults
        assert_eq!(config.user, "postgres");
        assert_eq!(config.binary_column_type, "VARBINARY");
    }

    #[test]
    fn test_from_toml_invalid() {
        let err = ProbeConfig::from_toml("port = \"not a number\"").unwrap_err();
        assert!(matches!(err, ProbeError::Config(_)));
    }

    #[test]
    fn test_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "dbname = \"tpcc\"\nbinary_column_type = \"BYTEA\"").unwrap();
        let config = ProbeConfig::from_file(file.path()).unwrap();
        assert_eq!(config.dbname, "tpcc");
        assert_eq!(config.binary_column_type, "BYTEA");
    }

    #[test]
    fn test_from_missing_file() {
        let err = ProbeConfig::from_file("/nonexistent/sqlprobe.toml").unwrap_err();
        assert!(matches!(err, ProbeError::Config(_)));
    }

    #[test]
    fn test_ssl_mode_parse() {
        assert_eq!("Require".parse::<SslMode>().unwrap(), SslMode::Require);
        assert_eq!(" disable ".parse::<SslMode>().unwrap(), SslMode::Disable);
        assert!("verify-full".parse::<SslMode>().is_err());
        assert_eq!(SslMode::Prefer.to_string(), "prefer");
    }

    #[test]
    fn test_isolation_level() {
        assert_eq!(
            "Repeatable Read".parse::<IsolationLevel>().unwrap(),
            IsolationLevel::RepeatableRead
        );
        assert_eq!(
            "read_committed".parse::<IsolationLevel>().unwrap(),
            IsolationLevel::ReadCommitted
        );
        assert!("snapshot".parse::<IsolationLevel>().is_err());
        assert_eq!(IsolationLevel::Serializable.to_string(), "serializable");

        let config = ProbeConfig::from_toml("isolation_level = \"repeatable-read\"").unwrap();
        assert_eq!(config.isolation_level, Some(IsolationLevel::RepeatableRead));
        assert_eq!(
            config.begin_statement(),
            "BEGIN ISOLATION LEVEL REPEATABLE READ"
        );
        assert_eq!(ProbeConfig::default().begin_statement(), "BEGIN");
    }

    #[test]
    fn test_validate() {
        let mut config = ProbeConfig::default();
        config.port = 0;
        assert!(config.validate().is_err());

        let mut config = ProbeConfig::default();
        config.host = "  ".to_string();
        assert!(config.validate().is_err());

        let mut config = ProbeConfig::default();
        config.ssl_mode = SslMode::Require;
        assert!(config.validate().is_err());
        config.ssl_root_cert = Some(PathBuf::from("ca.pem"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_target_hides_password() {
        let config = ProbeConfig {
            password: "hunter2".to_string(),
            ..Default::default()
        };
        let target = config.target();
        assert_eq!(target, "postgres@localhost:15721/postgres");
        assert!(!target.contains("hunter2"));
    }

    #[test]
    fn test_pg_config() {
        let config = ProbeConfig {
            port: 5433,
            dbname: "bench".to_string(),
            ..Default::default()
        };
        let pg = config.pg_config();
        assert_eq!(pg.get_ports(), &[5433]);
        assert_eq!(pg.get_dbname(), Some("bench"));
        assert_eq!(pg.get_user(), Some("postgres"));
    }

    #[test]
    fn test_env_overrides() {
        env::set_var("SQLPROBE_PORT", "6543");
        env::set_var("SQLPROBE_SSLMODE", "prefer");
        let mut config = ProbeConfig::default();
        config.apply_env_overrides().unwrap();
        assert_eq!(config.port, 6543);
        assert_eq!(config.ssl_mode, SslMode::Prefer);

        env::set_var("SQLPROBE_PORT", "not-a-port");
        let mut config = ProbeConfig::default();
        assert!(config.apply_env_overrides().is_err());

        env::remove_var("SQLPROBE_PORT");
        env::remove_var("SQLPROBE_SSLMODE");

        env::set_var("SQLPROBE_ISOLATION", "serializable");
        let mut config = ProbeConfig::default();
        config.apply_env_overrides().unwrap();
        assert_eq!(config.begin_statement(), "BEGIN ISOLATION LEVEL SERIALIZABLE");
        env::remove_var("SQLPROBE_ISOLATION");
    }
}
