//! Connection and assertion primitives for probing a PostgreSQL-compatible
//! database server over its wire protocol.
//!
//! Provides connection configuration, a session with driver-style
//! transaction modes, decoded result sets, expectation helpers and
//! statement races across concurrent sessions.

pub mod config;
pub mod error;
pub mod expect;
pub mod race;
pub mod result;
pub mod session;
mod tls;
pub mod value;

pub use config::{IsolationLevel, ProbeConfig, SslMode};
pub use error::{ProbeError, Result, SqlDiagnostics};
pub use result::ResultSet;
pub use session::{Param, Prepared, Session};
pub use value::Value;
