use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use probe_core::{IsolationLevel, ProbeConfig, SslMode};
use probe_suites::Suite;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(flatten)]
    pub connection: ConnectionArgs,

    /// Print the run summary as JSON instead of PASS/FAIL lines
    #[arg(long, global = true)]
    pub json: bool,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Target server. Unset flags fall back to the config file, then to
/// `SQLPROBE_*` variables, then to defaults.
#[derive(Args, Debug, Default)]
pub struct ConnectionArgs {
    /// TOML file with connection settings
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Server host
    #[arg(long, global = true)]
    pub host: Option<String>,

    /// Server port
    #[arg(short, long, global = true)]
    pub port: Option<u16>,

    /// Database name
    #[arg(long, global = true)]
    pub dbname: Option<String>,

    /// Login user
    #[arg(short, long, global = true)]
    pub user: Option<String>,

    /// Login password
    #[arg(long, global = true)]
    pub password: Option<String>,

    /// TLS mode: disable, prefer or require
    #[arg(long, global = true)]
    pub ssl_mode: Option<SslMode>,

    /// PEM file with the trusted CA certificate(s)
    #[arg(long, global = true)]
    pub ssl_root_cert: Option<PathBuf>,

    /// Isolation level for manual transactions: read-committed,
    /// repeatable-read or serializable
    #[arg(long, global = true)]
    pub isolation: Option<IsolationLevel>,
}

impl ConnectionArgs {
    /// Builds the effective configuration: defaults, then the config file,
    /// then environment overrides, then flags.
    pub fn resolve(&self) -> probe_core::Result<ProbeConfig> {
        let mut config = match &self.config {
            Some(path) => ProbeConfig::from_file(path)?,
            None => ProbeConfig::default(),
        };
        config.apply_env_overrides()?;
        self.apply_flags(&mut config);
        config.validate()?;
        Ok(config)
    }

    fn apply_flags(&self, config: &mut ProbeConfig) {
        if let Some(host) = &self.host {
            config.host = host.clone();
        }
        if let Some(port) = self.port {
            config.port = port;
        }
        if let Some(dbname) = &self.dbname {
            config.dbname = dbname.clone();
        }
        if let Some(user) = &self.user {
            config.user = user.clone();
        }
        if let Some(password) = &self.password {
            config.password = password.clone();
        }
        if let Some(ssl_mode) = self.ssl_mode {
            config.ssl_mode = ssl_mode;
        }
        if let Some(cert) = &self.ssl_root_cert {
            config.ssl_root_cert = Some(cert.clone());
        }
        if self.isolation.is_some() {
            config.isolation_level = self.isolation;
        }
    }
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Commands {
    /// Recreate the scratch table and nothing else
    Simple,

    /// Scans, aggregates, batches, invalid and empty SQL, binary payloads
    Basic,

    /// Server statistics tables (server must collect stats)
    Stats,

    /// COPY the query statistics table to a file on the server
    Copy {
        /// Target path, as seen by the server
        path: PathBuf,
    },

    /// Visibility and write conflicts between two transactions
    Mvcc,

    /// INSERT forms and malformed inserts
    Insert,

    /// Column renames
    Alter,

    /// Sequence generation, bounds and cycling
    Sequence,

    /// Session-scoped temporary tables
    TempTable,

    /// Index creation raced against writes
    ConcurrentIndex,

    /// Run every suite that needs no server setup
    All,

    /// List the available suites
    List,
}

impl Commands {
    /// Suites selected by this command; empty for `list`.
    pub fn suites(&self) -> Vec<Suite> {
        match self {
            Commands::Simple => vec![Suite::Simple],
            Commands::Basic => vec![Suite::Basic],
            Commands::Stats => vec![Suite::Stats],
            Commands::Copy { .. } => vec![Suite::Copy],
            Commands::Mvcc => vec![Suite::Mvcc],
            Commands::Insert => vec![Suite::Insert],
            Commands::Alter => vec![Suite::Alter],
            Commands::Sequence => vec![Suite::Sequence],
            Commands::TempTable => vec![Suite::TempTable],
            Commands::ConcurrentIndex => vec![Suite::ConcurrentIndex],
            Commands::All => Suite::defaults(),
            Commands::List => Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_suite_subcommand() {
        let cli = Cli::try_parse_from(["probe-runner", "--port", "5432", "mvcc"]).unwrap();
        assert_eq!(cli.command, Commands::Mvcc);
        assert_eq!(cli.connection.port, Some(5432));
        assert!(!cli.json);
    }

    #[test]
    fn test_flags_after_subcommand() {
        let cli = Cli::try_parse_from([
            "probe-runner",
            "temp-table",
            "--json",
            "--ssl-mode",
            "require",
            "--ssl-root-cert",
            "ca.pem",
        ])
        .unwrap();
        assert_eq!(cli.command, Commands::TempTable);
        assert!(cli.json);
        assert_eq!(cli.connection.ssl_mode, Some(SslMode::Require));
    }

    #[test]
    fn test_copy_requires_path() {
        assert!(Cli::try_parse_from(["probe-runner", "copy"]).is_err());
        let cli = Cli::try_parse_from(["probe-runner", "copy", "/tmp/stats.csv"]).unwrap();
        assert_eq!(
            cli.command,
            Commands::Copy {
                path: PathBuf::from("/tmp/stats.csv")
            }
        );
        assert_eq!(cli.command.suites(), vec![Suite::Copy]);
    }

    #[test]
    fn test_missing_subcommand() {
        assert!(Cli::try_parse_from(["probe-runner"]).is_err());
        assert!(Cli::try_parse_from(["probe-runner", "tpcc"]).is_err());
    }

    #[test]
    fn test_all_and_list() {
        assert_eq!(Commands::All.suites(), Suite::defaults());
        assert!(Commands::List.suites().is_empty());
    }

    #[test]
    fn test_bad_ssl_mode_rejected() {
        assert!(Cli::try_parse_from(["probe-runner", "--ssl-mode", "verify-full", "basic"]).is_err());
    }

    #[test]
    fn test_flags_override_defaults() {
        let args = ConnectionArgs {
            host: Some("db.internal".to_string()),
            port: Some(5432),
            user: Some("probe".to_string()),
            ..Default::default()
        };
        let mut config = ProbeConfig::default();
        args.apply_flags(&mut config);
        assert_eq!(config.host, "db.internal");
        assert_eq!(config.port, 5432);
        assert_eq!(config.user, "probe");
        assert_eq!(config.dbname, "postgres");
    }

    #[test]
    fn test_isolation_flag() {
        let cli = Cli::try_parse_from(["probe-runner", "mvcc", "--isolation", "repeatable-read"]).unwrap();
        assert_eq!(cli.connection.isolation, Some(IsolationLevel::RepeatableRead));
        let mut config = ProbeConfig::default();
        cli.connection.apply_flags(&mut config);
        assert_eq!(config.begin_statement(), "BEGIN ISOLATION LEVEL REPEATABLE READ");

        assert!(Cli::try_parse_from(["probe-runner", "mvcc", "--isolation", "snapshot"]).is_err());
    }

    #[test]
    fn test_resolve_rejects_invalid_config() {
        let args = ConnectionArgs {
            port: Some(0),
            ..Default::default()
        };
        assert!(args.resolve().is_err());
    }
}
