use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use probe_core::{IsolationLevel, ProbeConfig, SslMode};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(flatten)]
    pub connection: ConnectionArgs,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Target server; flags win over `SQLPROBE_*` variables, which win over
/// the config file.
#[derive(Args, Debug, Default)]
pub struct ConnectionArgs {
    /// TOML file with connection settings
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Server host
    #[arg(long, global = true)]
    pub host: Option<String>,

    /// Server port
    #[arg(long, global = true)]
    pub port: Option<u16>,

    /// Database name
    #[arg(long, global = true)]
    pub dbname: Option<String>,

    /// Login user
    #[arg(long, global = true)]
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
    pub fn resolve(&self) -> probe_core::Result<ProbeConfig> {
        let mut config = match &self.config {
            Some(path) => ProbeConfig::from_file(path)?,
            None => ProbeConfig::default(),
        };
        config.apply_env_overrides()?;

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
        if self.ssl_root_cert.is_some() {
            config.ssl_root_cert = self.ssl_root_cert.clone();
        }
        if self.isolation.is_some() {
            config.isolation_level = self.isolation;
        }

        config.validate()?;
        Ok(config)
    }
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Commands {
    /// Round-trip latency of empty statements
    Nop {
        /// Number of statements to send
        #[arg(short, long, default_value_t = 1_000_000)]
        operations: usize,
    },

    /// Single-row insert throughput across concurrent clients
    InsertThroughput {
        /// Total rows to insert
        #[arg(short, long, default_value_t = 100_000)]
        operations: usize,

        /// Number of concurrent client sessions
        #[arg(short, long, default_value_t = 4)]
        clients: usize,
    },

    /// Primary-key lookups against a pre-populated table
    PointSelect {
        /// Total lookups to perform
        #[arg(short, long, default_value_t = 100_000)]
        operations: usize,

        /// Number of pre-populated records
        #[arg(short, long, default_value_t = 10_000)]
        record_count: usize,

        /// Number of concurrent client sessions
        #[arg(short, long, default_value_t = 4)]
        clients: usize,
    },

    /// Mixed point reads and updates
    MixedWorkload {
        /// Total operations to perform
        #[arg(short, long, default_value_t = 100_000)]
        operations: usize,

        /// Read percentage (0-100)
        #[arg(short, long, default_value_t = 80)]
        read_percent: u8,

        /// Number of concurrent client sessions
        #[arg(short, long, default_value_t = 4)]
        clients: usize,
    },

    /// Run every benchmark with its defaults
    All,
}

impl Commands {
    /// Rejects arguments no benchmark run can use.
    pub fn validate(&self) -> Result<(), String> {
        match *self {
            Commands::Nop { operations } => check_operations(operations),
            Commands::InsertThroughput {
                operations,
                clients,
            } => {
                check_operations(operations)?;
                check_clients(clients)
            }
            Commands::PointSelect {
                operations,
                record_count,
                clients,
            } => {
                check_operations(operations)?;
                check_clients(clients)?;
                if record_count == 0 {
                    return Err("record_count must be greater than 0".to_string());
                }
                Ok(())
            }
            Commands::MixedWorkload {
                operations,
                read_percent,
                clients,
            } => {
                if read_percent > 100 {
                    return Err("read_percent must be between 0 and 100".to_string());
                }
                check_operations(operations)?;
                check_clients(clients)
            }
            Commands::All => Ok(()),
        }
    }
}

fn check_operations(operations: usize) -> Result<(), String> {
    if operations == 0 {
        return Err("operations must be greater than 0".to_string());
    }
    Ok(())
}

fn check_clients(clients: usize) -> Result<(), String> {
    if clients == 0 {
        return Err("clients must be greater than 0".to_string());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nop_default() {
        let cli = Cli::try_parse_from(["probe-bench", "nop"]).unwrap();
        assert_eq!(
            cli.command,
            Commands::Nop {
                operations: 1_000_000
            }
        );
    }

    #[test]
    fn test_point_select_args() {
        let cli = Cli::try_parse_from([
            "probe-bench",
            "--port",
            "5432",
            "point-select",
            "-o",
            "500",
            "-r",
            "50",
            "-c",
            "2",
        ])
        .unwrap();
        assert_eq!(cli.connection.port, Some(5432));
        assert_eq!(
            cli.command,
            Commands::PointSelect {
                operations: 500,
                record_count: 50,
                clients: 2
            }
        );
        assert!(cli.command.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_arguments() {
        let too_many_reads = Commands::MixedWorkload {
            operations: 10,
            read_percent: 101,
            clients: 1,
        };
        assert!(too_many_reads.validate().is_err());

        let no_clients = Commands::InsertThroughput {
            operations: 10,
            clients: 0,
        };
        assert!(no_clients.validate().is_err());

        let empty_table = Commands::PointSelect {
            operations: 10,
            record_count: 0,
            clients: 1,
        };
        assert!(empty_table.validate().is_err());

        assert!(Commands::Nop { operations: 0 }.validate().is_err());
        assert!(Commands::All.validate().is_ok());
    }

    #[test]
    fn test_isolation_flag() {
        let cli = Cli::try_parse_from(["probe-bench", "--isolation", "serializable", "all"]).unwrap();
        assert_eq!(cli.connection.isolation, Some(IsolationLevel::Serializable));
    }

    #[test]
    fn test_missing_subcommand() {
        assert!(Cli::try_parse_from(["probe-bench"]).is_err());
    }
}
