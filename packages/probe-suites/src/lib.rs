//! SQL behavior suites for a PostgreSQL-compatible server.
//!
//! Each suite is a list of cases run against a live server through
//! `probe_core` sessions; results are collected into a [`SuiteReport`].

pub mod context;
pub mod registry;
pub mod report;
pub mod suites;

pub use context::SuiteContext;
pub use registry::Suite;
pub use report::{CaseOutcome, RunSummary, SuiteReport};
