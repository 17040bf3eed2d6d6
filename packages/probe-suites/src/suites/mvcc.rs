//! Transaction visibility and write-write conflicts.
//!
//! Every scenario recreates `foo(a, b)` holding `(1, 11)` and `(2, 22)` and
//! drives one or two manual-commit sessions (`t1`, `t2`). A write that hits
//! a row another open transaction already changed must fail at once.

use probe_core::expect::{expect_eq, expect_failure_within, expect_rows};
use probe_core::{Result, Session};

use crate::context::SuiteContext;
use crate::report::SuiteReport;
use crate::suites::{close_session, int_row};

pub const NAME: &str = "mvcc";

const DROP: &str = "DROP TABLE IF EXISTS foo";
const CREATE: &str = "CREATE TABLE foo (a INT, b INT)";
const SELECT_ALL: &str = "SELECT * FROM foo";
const SELECT_ONE: &str = "SELECT * FROM foo WHERE a = $1";
const INSERT: &str = "INSERT INTO foo VALUES ($1, $2)";
const DELETE: &str = "DELETE FROM foo WHERE a = $1";
const UPDATE: &str = "UPDATE foo SET b = $1 WHERE a = $2";

pub async fn run(ctx: &SuiteContext) -> SuiteReport {
    let mut report = SuiteReport::new(NAME);
    run_case!(report, "read_my_insert", read_my_insert(ctx));
    run_case!(report, "delete_my_insert", delete_my_insert(ctx));
    run_case!(report, "update_my_insert", update_my_insert(ctx));
    run_case!(report, "read_other_insert", read_other_insert(ctx));
    run_case!(report, "delete_other_delete", delete_other_delete(ctx));
    run_case!(report, "delete_other_aborted_delete", delete_other_aborted_delete(ctx));
    run_case!(report, "update_other_delete", update_other_delete(ctx));
    run_case!(report, "update_other_update", update_other_update(ctx));
    run_case!(report, "update_other_aborted_update", update_other_aborted_update(ctx));
    run_case!(report, "update_same_tuple", update_same_tuple(ctx));
    report
}

async fn recreate_table(ctx: &SuiteContext) -> Result<()> {
    let mut session = ctx.connect().await?;
    session.execute(DROP).await?;
    session.execute(CREATE).await?;
    session.execute_params(INSERT, &[&1i32, &11i32]).await?;
    session.execute_params(INSERT, &[&2i32, &22i32]).await?;
    close_session(session).await;
    Ok(())
}

async fn expect_visible(session: &mut Session, rows: usize, who: &str) -> Result<()> {
    let rs = session.query(SELECT_ALL, &[]).await?;
    expect_eq(rs.row_count(), rows, &format!("{} visible rows", who))
}

async fn expect_tuple(session: &mut Session, a: i32, b: i64, who: &str) -> Result<()> {
    let rs = session.query(SELECT_ONE, &[&a]).await?;
    expect_rows(&rs, &[int_row(&[a.into(), b])], &format!("{} tuple a={}", who, a))
}

/// Recreates the table and opens two manual-commit sessions that both see
/// the initial two rows.
async fn two_terminals(ctx: &SuiteContext) -> Result<(Session, Session)> {
    recreate_table(ctx).await?;
    let mut t1 = ctx.connect_manual().await?;
    let mut t2 = ctx.connect_manual().await?;
    expect_visible(&mut t1, 2, "t1").await?;
    expect_visible(&mut t2, 2, "t2").await?;
    Ok((t1, t2))
}

async fn read_my_insert(ctx: &SuiteContext) -> Result<()> {
    recreate_table(ctx).await?;
    let mut t1 = ctx.connect_manual().await?;
    expect_visible(&mut t1, 2, "t1").await?;

    t1.execute_params(INSERT, &[&3i32, &33i32]).await?;
    expect_visible(&mut t1, 3, "t1 after dirty insert").await?;

    t1.rollback().await?;
    expect_visible(&mut t1, 2, "t1 after rollback").await?;
    close_session(t1).await;
    Ok(())
}

async fn delete_my_insert(ctx: &SuiteContext) -> Result<()> {
    recreate_table(ctx).await?;
    let mut t1 = ctx.connect_manual().await?;
    expect_visible(&mut t1, 2, "t1").await?;

    t1.execute_params(INSERT, &[&3i32, &33i32]).await?;
    expect_visible(&mut t1, 3, "t1 after dirty insert").await?;
    t1.execute_params(DELETE, &[&3i32]).await?;
    expect_visible(&mut t1, 2, "t1 after deleting own insert").await?;

    t1.commit().await?;
    expect_visible(&mut t1, 2, "t1 after commit").await?;
    close_session(t1).await;
    Ok(())
}

async fn update_my_insert(ctx: &SuiteContext) -> Result<()> {
    recreate_table(ctx).await?;
    let mut t1 = ctx.connect_manual().await?;
    expect_visible(&mut t1, 2, "t1").await?;

    t1.execute_params(INSERT, &[&3i32, &33i32]).await?;
    expect_visible(&mut t1, 3, "t1 after dirty insert").await?;
    t1.execute_params(UPDATE, &[&300i32, &3i32]).await?;
    expect_tuple(&mut t1, 3, 300, "t1 before commit").await?;

    t1.commit().await?;
    expect_tuple(&mut t1, 3, 300, "t1 after commit").await?;
    close_session(t1).await;
    Ok(())
}

async fn read_other_insert(ctx: &SuiteContext) -> Result<()> {
    let (mut t1, mut t2) = two_terminals(ctx).await?;

    t1.execute_params(INSERT, &[&3i32, &33i32]).await?;
    expect_visible(&mut t1, 3, "t1 after dirty insert").await?;
    expect_visible(&mut t2, 2, "t2 during t1's insert").await?;

    t1.commit().await?;
    expect_visible(&mut t1, 3, "t1 after commit").await?;
    // t2's snapshot predates the commit
    expect_visible(&mut t2, 2, "t2 in old transaction").await?;

    t2.commit().await?;
    expect_visible(&mut t2, 3, "t2 in new transaction").await?;

    close_session(t1).await;
    close_session(t2).await;
    Ok(())
}

async fn delete_other_delete(ctx: &SuiteContext) -> Result<()> {
    let limit = ctx.config.conflict_timeout();
    let (mut t1, mut t2) = two_terminals(ctx).await?;

    t1.execute_params(DELETE, &[&1i32]).await?;
    expect_visible(&mut t1, 1, "t1 after delete").await?;
    expect_visible(&mut t2, 2, "t2 during t1's delete").await?;

    expect_failure_within(limit, DELETE, t2.execute_params(DELETE, &[&1i32])).await?;

    t1.commit().await?;
    t2.rollback().await?;
    expect_visible(&mut t2, 1, "t2 in new transaction").await?;

    close_session(t1).await;
    close_session(t2).await;
    Ok(())
}

async fn delete_other_aborted_delete(ctx: &SuiteContext) -> Result<()> {
    let (mut t1, mut t2) = two_terminals(ctx).await?;

    t1.execute_params(DELETE, &[&1i32]).await?;
    expect_visible(&mut t1, 1, "t1 after delete").await?;
    expect_visible(&mut t2, 2, "t2 during t1's delete").await?;

    t1.rollback().await?;
    let deleted = t2.execute_params(DELETE, &[&1i32]).await?;
    expect_eq(deleted, 1, "t2 delete after t1 rollback")?;

    t2.commit().await?;
    expect_visible(&mut t2, 1, "t2 in new transaction").await?;

    close_session(t1).await;
    close_session(t2).await;
    Ok(())
}

async fn update_other_delete(ctx: &SuiteContext) -> Result<()> {
    let limit = ctx.config.conflict_timeout();
    let (mut t1, mut t2) = two_terminals(ctx).await?;

    t1.execute_params(DELETE, &[&1i32]).await?;
    expect_visible(&mut t1, 1, "t1 after delete").await?;
    expect_visible(&mut t2, 2, "t2 during t1's delete").await?;

    expect_failure_within(limit, UPDATE, t2.execute_params(UPDATE, &[&100i32, &1i32])).await?;

    t1.commit().await?;
    t2.rollback().await?;
    expect_visible(&mut t2, 1, "t2 in new transaction").await?;

    close_session(t1).await;
    close_session(t2).await;
    Ok(())
}

async fn update_other_update(ctx: &SuiteContext) -> Result<()> {
    let limit = ctx.config.conflict_timeout();
    let (mut t1, mut t2) = two_terminals(ctx).await?;

    t1.execute_params(UPDATE, &[&100i32, &1i32]).await?;
    expect_tuple(&mut t1, 1, 100, "t1 after update").await?;
    expect_tuple(&mut t2, 1, 11, "t2 during t1's update").await?;

    expect_failure_within(limit, UPDATE, t2.execute_params(UPDATE, &[&200i32, &1i32])).await?;

    t1.commit().await?;
    t2.rollback().await?;
    expect_tuple(&mut t2, 1, 100, "t2 in new transaction").await?;

    close_session(t1).await;
    close_session(t2).await;
    Ok(())
}

async fn update_other_aborted_update(ctx: &SuiteContext) -> Result<()> {
    let (mut t1, mut t2) = two_terminals(ctx).await?;

    t1.execute_params(UPDATE, &[&100i32, &1i32]).await?;
    expect_tuple(&mut t1, 1, 100, "t1 after update").await?;
    expect_tuple(&mut t2, 1, 11, "t2 during t1's update").await?;

    t1.rollback().await?;
    t2.execute_params(UPDATE, &[&200i32, &1i32]).await?;

    t2.commit().await?;
    expect_tuple(&mut t2, 1, 200, "t2 in new transaction").await?;

    close_session(t1).await;
    close_session(t2).await;
    Ok(())
}

async fn update_same_tuple(ctx: &SuiteContext) -> Result<()> {
    let limit = ctx.config.conflict_timeout();
    let (mut t1, mut t2) = two_terminals(ctx).await?;

    t1.execute_params(UPDATE, &[&100i32, &1i32]).await?;
    expect_tuple(&mut t1, 1, 100, "t1 after update").await?;
    expect_tuple(&mut t2, 1, 11, "t2 during t1's update").await?;

    expect_failure_within(limit, UPDATE, t2.execute_params(UPDATE, &[&200i32, &1i32])).await?;

    t2.rollback().await?;
    t1.commit().await?;

    expect_tuple(&mut t2, 1, 100, "t2 after t1 commit").await?;
    expect_tuple(&mut t1, 1, 100, "t1 after commit").await?;

    close_session(t1).await;
    close_session(t2).await;
    Ok(())
}
