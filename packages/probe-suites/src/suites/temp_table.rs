//! Session-scoped temporary tables.

use std::time::{Duration, Instant};

use probe_core::expect::{expect_eq, expect_rows, expect_sql_error};
use probe_core::{ProbeError, Result, Session};

use crate::context::SuiteContext;
use crate::report::SuiteReport;
use crate::suites::{close_session, int_row};

pub const NAME: &str = "temp-table";

/// Temp relations of a name, across every session.
const TEMP_RELATIONS: &str =
    "SELECT COUNT(*) FROM pg_class WHERE relname = $1 AND relpersistence = 't'";
const POLL_INTERVAL: Duration = Duration::from_millis(50);

pub async fn run(ctx: &SuiteContext) -> SuiteReport {
    let mut report = SuiteReport::new(NAME);
    run_case!(report, "own_session_only", own_session_only(ctx));
    run_case!(report, "shadows_permanent", shadows_permanent(ctx));
    run_case!(report, "gone_after_session_end", gone_after_session_end(ctx));
    run_case!(report, "on_commit_drop", on_commit_drop(ctx));
    report
}

async fn count(session: &mut Session, table: &str) -> Result<i64> {
    session
        .query_i64(&format!("SELECT COUNT(*) FROM {}", table), &[])
        .await
}

async fn temp_relations(session: &mut Session, name: &str) -> Result<i64> {
    session.query_i64(TEMP_RELATIONS, &[&name]).await
}

/// Waits up to `limit` for the catalog to drop every temp table `name`.
/// The server removes them when the owning backend exits, which may lag the
/// client disconnect.
async fn wait_for_temp_drop(session: &mut Session, name: &str, limit: Duration) -> Result<()> {
    let deadline = Instant::now() + limit;
    loop {
        let left = temp_relations(session, name).await?;
        if left == 0 {
            return Ok(());
        }
        if Instant::now() >= deadline {
            return Err(ProbeError::assertion(format!(
                "{} temp relation(s) named {} still exist after {:?}",
                left, name, limit
            )));
        }
        tokio::time::sleep(POLL_INTERVAL).await;
    }
}

async fn own_session_only(ctx: &SuiteContext) -> Result<()> {
    let mut owner = ctx.connect().await?;
    let mut other = ctx.connect().await?;

    owner.execute("CREATE TEMP TABLE tmp_own (id INT)").await?;
    owner.execute("INSERT INTO tmp_own VALUES (1)").await?;
    expect_eq(count(&mut owner, "tmp_own").await?, 1, "rows seen by owner")?;
    expect_sql_error(&mut other, "SELECT * FROM tmp_own").await?;

    close_session(owner).await;
    close_session(other).await;
    Ok(())
}

/// A temp table hides the permanent table of the same name from its own
/// session only, until it is dropped.
async fn shadows_permanent(ctx: &SuiteContext) -> Result<()> {
    let mut owner = ctx.connect().await?;
    let mut other = ctx.connect().await?;

    owner.execute("DROP TABLE IF EXISTS shadow_t").await?;
    owner.execute("CREATE TABLE shadow_t (id INT)").await?;
    owner.execute("INSERT INTO shadow_t VALUES (1), (2)").await?;
    owner.execute("CREATE TEMP TABLE shadow_t (id INT)").await?;
    owner.execute("INSERT INTO shadow_t VALUES (99)").await?;

    let rs = owner.query("SELECT id FROM shadow_t", &[]).await?;
    expect_rows(&rs, &[int_row(&[99])], "owner's shadow_t")?;
    expect_eq(count(&mut other, "shadow_t").await?, 2, "rows seen by other session")?;

    // drops the temp table; the permanent one shows through again
    owner.execute("DROP TABLE shadow_t").await?;
    expect_eq(count(&mut owner, "shadow_t").await?, 2, "rows after temp drop")?;

    owner.execute("DROP TABLE shadow_t").await?;
    close_session(owner).await;
    close_session(other).await;
    Ok(())
}

/// Another session cannot see a temp table either way, so the drop is
/// observed through the catalog.
async fn gone_after_session_end(ctx: &SuiteContext) -> Result<()> {
    let mut owner = ctx.connect().await?;
    let mut next = ctx.connect().await?;
    owner.execute("CREATE TEMP TABLE tmp_gone (id INT)").await?;
    owner.execute("INSERT INTO tmp_gone VALUES (1)").await?;
    expect_eq(
        temp_relations(&mut next, "tmp_gone").await?,
        1,
        "tmp_gone relations while owner is connected",
    )?;

    close_session(owner).await;
    wait_for_temp_drop(&mut next, "tmp_gone", ctx.config.stat_wait()).await?;

    expect_sql_error(&mut next, "SELECT * FROM tmp_gone").await?;
    // the name is free again and starts empty
    next.execute("CREATE TEMP TABLE tmp_gone (id INT)").await?;
    expect_eq(count(&mut next, "tmp_gone").await?, 0, "rows in recreated tmp_gone")?;
    close_session(next).await;
    Ok(())
}

async fn on_commit_drop(ctx: &SuiteContext) -> Result<()> {
    let mut session = ctx.connect_manual().await?;
    session
        .execute("CREATE TEMP TABLE tmp_txn (id INT) ON COMMIT DROP")
        .await?;
    session.execute("INSERT INTO tmp_txn VALUES (1)").await?;
    expect_eq(count(&mut session, "tmp_txn").await?, 1, "rows before commit")?;
    session.commit().await?;

    expect_sql_error(&mut session, "SELECT * FROM tmp_txn").await?;
    session.rollback().await?;
    close_session(session).await;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use probe_core::ProbeConfig;

    fn live_context() -> Option<SuiteContext> {
        if std::env::var("SQLPROBE_LIVE").is_err() {
            return None;
        }
        let mut config = ProbeConfig::default();
        config.apply_env_overrides().unwrap();
        Some(SuiteContext::new(config))
    }

    /// The drop check must fail while the owner is still connected.
    #[tokio::test]
    async fn test_temp_drop_waits_for_owner() {
        let Some(ctx) = live_context() else { return };
        let mut owner = ctx.connect().await.unwrap();
        let mut other = ctx.connect().await.unwrap();
        owner.execute("CREATE TEMP TABLE tmp_held (id INT)").await.unwrap();

        let held = wait_for_temp_drop(&mut other, "tmp_held", Duration::from_millis(200)).await;
        assert!(matches!(held, Err(ProbeError::Assertion(_))));

        owner.close().await.unwrap();
        wait_for_temp_drop(&mut other, "tmp_held", ctx.config.stat_wait())
            .await
            .unwrap();
        other.close().await.unwrap();
    }
}
