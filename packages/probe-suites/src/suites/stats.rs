//! Server statistics tables.
//!
//! The server must be collecting statistics. Each write is counted here and
//! compared against the last row of the matching `pg_catalog` metric table
//! once the server has had two aggregation intervals to publish it.

use probe_core::expect::{ensure, expect_eq};
use probe_core::{ProbeError, ResultSet, Result, Session};

use crate::context::SuiteContext;
use crate::report::SuiteReport;
use crate::suites::basic::{init, DELETE_A, INDEXSCAN, INSERT_A_1, UPDATE_BY_INDEXSCAN};
use crate::suites::{close_session, open_session};

pub const NAME: &str = "stats";

const SELECT_DB_METRIC: &str = "SELECT * FROM pg_catalog.database_metric;";
const SELECT_QUERY_METRIC: &str = "SELECT * FROM pg_catalog.query_metric;";
const SELECT_INDEX_METRIC: &str = "SELECT * FROM pg_catalog.index_metric;";
const SELECT_TABLE_METRIC: &str = "SELECT * FROM pg_catalog.table_metric;";

// Column positions in the metric tables.
const QUERY_TEXT_COL: usize = 0;
const QUERY_READ_COL: usize = 6;
const QUERY_UPDATE_COL: usize = 7;
const QUERY_DELETE_COL: usize = 8;
const QUERY_INSERT_COL: usize = 9;
const INDEX_READ_COL: usize = 3;
const INDEX_INSERT_COL: usize = 5;
const TABLE_READ_COL: usize = 2;
const TABLE_UPDATE_COL: usize = 3;
const TABLE_DELETE_COL: usize = 4;
const TABLE_INSERT_COL: usize = 5;
const DB_COMMIT_COL: usize = 1;
const DB_ABORT_COL: usize = 2;

/// What the server should have counted so far.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExpectedCounts {
    pub txn_committed: i64,
    pub table_read: i64,
    pub table_update: i64,
    pub table_delete: i64,
    pub table_insert: i64,
    pub index_read: i64,
    pub index_insert: i64,
}

impl ExpectedCounts {
    /// Autocommit insert through the primary key.
    pub fn insert(&mut self) {
        self.txn_committed += 1;
        self.table_insert += 1;
        self.index_insert += 1;
    }

    /// Autocommit update located by primary key.
    pub fn update_by_index(&mut self) {
        self.txn_committed += 1;
        self.table_update += 1;
        self.table_read += 1;
        self.index_read += 1;
    }

    pub fn index_scan(&mut self) {
        self.txn_committed += 1;
        self.table_read += 1;
        self.index_read += 1;
    }

    /// Autocommit delete located by primary key.
    pub fn delete_by_index(&mut self) {
        self.txn_committed += 1;
        self.table_read += 1;
        self.table_delete += 1;
        self.index_read += 1;
    }
}

pub async fn run(ctx: &SuiteContext) -> SuiteReport {
    let mut report = SuiteReport::new(NAME);
    let Some(mut session) = open_session(&mut report, ctx).await else {
        return report;
    };

    let mut counts = ExpectedCounts::default();
    let s = &mut session;
    let _ = run_case!(report, "init", init(s))
        && run_case!(report, "query_metric", query_metric(s, ctx, &mut counts))
        && run_case!(report, "indexed_writes", indexed_writes(s, ctx, &mut counts))
        && run_case!(report, "index_metric", index_metric(s, &counts))
        && run_case!(report, "table_metric", table_metric(s, &counts))
        && run_case!(report, "database_metric", database_metric(s, &counts));

    close_session(session).await;
    report
}

async fn query_metric(session: &mut Session, ctx: &SuiteContext, counts: &mut ExpectedCounts) -> Result<()> {
    session.execute(INSERT_A_1).await?;
    counts.insert();
    tokio::time::sleep(ctx.config.stat_wait()).await;

    let rs = session.query(SELECT_QUERY_METRIC, &[]).await?;
    let row = last_row_index(&rs, SELECT_QUERY_METRIC)?;
    let query = rs
        .get(row, QUERY_TEXT_COL)
        .map(ToString::to_string)
        .unwrap_or_default();
    tracing::info!(
        "{}\tread:{}\tupdate:{}\tdelete:{}\tinsert:{}",
        query,
        rs.int_at(row, QUERY_READ_COL)?,
        rs.int_at(row, QUERY_UPDATE_COL)?,
        rs.int_at(row, QUERY_DELETE_COL)?,
        rs.int_at(row, QUERY_INSERT_COL)?
    );
    expect_eq(rs.int_at(row, QUERY_INSERT_COL)?, counts.table_insert, "Query insert")
}

async fn indexed_writes(session: &mut Session, ctx: &SuiteContext, counts: &mut ExpectedCounts) -> Result<()> {
    session
        .execute_params(UPDATE_BY_INDEXSCAN, &[&"Updated", &1i32])
        .await?;
    counts.update_by_index();

    session.query(INDEXSCAN, &[]).await?;
    counts.index_scan();

    session.execute(DELETE_A).await?;
    counts.delete_by_index();

    tokio::time::sleep(ctx.config.stat_wait()).await;
    Ok(())
}

async fn index_metric(session: &mut Session, counts: &ExpectedCounts) -> Result<()> {
    let rs = session.query(SELECT_INDEX_METRIC, &[]).await?;
    let row = last_row_index(&rs, SELECT_INDEX_METRIC)?;
    expect_eq(rs.int_at(row, INDEX_READ_COL)?, counts.index_read, "Index read")?;
    expect_eq(rs.int_at(row, INDEX_INSERT_COL)?, counts.index_insert, "Index insert")
}

async fn table_metric(session: &mut Session, counts: &ExpectedCounts) -> Result<()> {
    let rs = session.query(SELECT_TABLE_METRIC, &[]).await?;
    let row = last_row_index(&rs, SELECT_TABLE_METRIC)?;
    expect_eq(rs.int_at(row, TABLE_UPDATE_COL)?, counts.table_update, "Table update")?;
    expect_eq(rs.int_at(row, TABLE_DELETE_COL)?, counts.table_delete, "Table delete")?;
    expect_eq(rs.int_at(row, TABLE_INSERT_COL)?, counts.table_insert, "Table insert")?;
    expect_eq(rs.int_at(row, TABLE_READ_COL)?, counts.table_read, "Table read")
}

async fn database_metric(session: &mut Session, counts: &ExpectedCounts) -> Result<()> {
    let rs = session.query(SELECT_DB_METRIC, &[]).await?;
    let row = last_row_index(&rs, SELECT_DB_METRIC)?;
    let committed = rs.int_at(row, DB_COMMIT_COL)?;
    tracing::info!(
        "database_metric commits:{} aborts:{}",
        committed,
        rs.int_at(row, DB_ABORT_COL)?
    );
    ensure(
        committed >= counts.txn_committed,
        format!(
            "Txn committed count doesn't match: {} < {}",
            committed, counts.txn_committed
        ),
    )
}

fn last_row_index(rs: &ResultSet, table: &str) -> Result<usize> {
    rs.row_count()
        .checked_sub(1)
        .ok_or_else(|| ProbeError::assertion(format!("`{}` returned no rows", table)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use probe_core::Value;

    #[test]
    fn test_expected_counts_follow_the_write_sequence() {
        let mut counts = ExpectedCounts::default();
        counts.insert();
        counts.update_by_index();
        counts.index_scan();
        counts.delete_by_index();
        assert_eq!(
            counts,
            ExpectedCounts {
                txn_committed: 4,
                table_read: 3,
                table_update: 1,
                table_delete: 1,
                table_insert: 1,
                index_read: 3,
                index_insert: 1,
            }
        );
    }

    #[test]
    fn test_last_row_index() {
        let empty = ResultSet::new(vec!["id".into()], vec![]);
        assert!(last_row_index(&empty, SELECT_DB_METRIC).is_err());

        let rs = ResultSet::new(vec!["id".into()], vec![vec![Value::Int(1)], vec![Value::Int(2)]]);
        assert_eq!(last_row_index(&rs, SELECT_DB_METRIC).unwrap(), 1);
    }
}
