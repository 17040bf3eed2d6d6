//! Sequence generation.

use probe_core::expect::{ensure, expect_eq, expect_sql_error};
use probe_core::{Result, Session};

use crate::context::SuiteContext;
use crate::report::SuiteReport;
use crate::suites::close_session;

pub const NAME: &str = "sequence";

const SEQ: &str = "probe_seq";
const NEXTVAL: &str = "SELECT nextval('probe_seq')";

pub async fn run(ctx: &SuiteContext) -> SuiteReport {
    let mut report = SuiteReport::new(NAME);
    run_case!(report, "create_drop", create_drop(ctx));
    run_case!(report, "monotonic", monotonic(ctx));
    run_case!(report, "monotonic_across_sessions", monotonic_across_sessions(ctx));
    run_case!(report, "rollback_does_not_rewind", rollback_does_not_rewind(ctx));
    run_case!(report, "exhausted", exhausted(ctx));
    run_case!(report, "cycle", cycle(ctx));
    run_case!(report, "negative_increment", negative_increment(ctx));
    report
}

/// Recreates `probe_seq` with `options` on a new autocommit session.
async fn fresh_sequence(ctx: &SuiteContext, options: &str) -> Result<Session> {
    let mut session = ctx.connect().await?;
    session
        .execute(&format!("DROP SEQUENCE IF EXISTS {}", SEQ))
        .await?;
    session
        .execute(format!("CREATE SEQUENCE {} {}", SEQ, options).trim_end())
        .await?;
    Ok(session)
}

async fn nextval(session: &mut Session) -> Result<i64> {
    session.query_i64(NEXTVAL, &[]).await
}

async fn take(session: &mut Session, n: usize) -> Result<Vec<i64>> {
    let mut values = Vec::with_capacity(n);
    for _ in 0..n {
        values.push(nextval(session).await?);
    }
    Ok(values)
}

pub(crate) fn strictly_increasing(values: &[i64]) -> bool {
    values.windows(2).all(|w| w[0] < w[1])
}

async fn create_drop(ctx: &SuiteContext) -> Result<()> {
    let mut session = fresh_sequence(ctx, "").await?;
    session.execute(&format!("DROP SEQUENCE {}", SEQ)).await?;
    expect_sql_error(&mut session, NEXTVAL).await?;
    close_session(session).await;
    Ok(())
}

async fn monotonic(ctx: &SuiteContext) -> Result<()> {
    let mut session = fresh_sequence(ctx, "START WITH 1 INCREMENT BY 1").await?;
    let values = take(&mut session, 5).await?;
    expect_eq(values, vec![1, 2, 3, 4, 5], "nextval sequence")?;
    close_session(session).await;
    Ok(())
}

/// Interleaved calls from two sessions never repeat or go backwards.
async fn monotonic_across_sessions(ctx: &SuiteContext) -> Result<()> {
    let mut first = fresh_sequence(ctx, "START WITH 1 INCREMENT BY 1").await?;
    let mut second = ctx.connect().await?;

    let mut values = Vec::new();
    for _ in 0..5 {
        values.push(nextval(&mut first).await?);
        values.push(nextval(&mut second).await?);
    }
    ensure(
        strictly_increasing(&values),
        format!("values across sessions not increasing: {:?}", values),
    )?;

    close_session(first).await;
    close_session(second).await;
    Ok(())
}

async fn rollback_does_not_rewind(ctx: &SuiteContext) -> Result<()> {
    let mut session = fresh_sequence(ctx, "START WITH 1 INCREMENT BY 1").await?;
    session.set_autocommit(false).await?;

    let before = nextval(&mut session).await?;
    session.rollback().await?;
    let after = nextval(&mut session).await?;
    session.commit().await?;

    ensure(
        after > before,
        format!("nextval after rollback went from {} to {}", before, after),
    )?;
    close_session(session).await;
    Ok(())
}

async fn exhausted(ctx: &SuiteContext) -> Result<()> {
    let mut session = fresh_sequence(ctx, "MINVALUE 1 MAXVALUE 3 NO CYCLE").await?;
    let values = take(&mut session, 3).await?;
    expect_eq(values, vec![1, 2, 3], "values before exhaustion")?;
    expect_sql_error(&mut session, NEXTVAL).await?;
    close_session(session).await;
    Ok(())
}

async fn cycle(ctx: &SuiteContext) -> Result<()> {
    let mut session = fresh_sequence(ctx, "MINVALUE 1 MAXVALUE 3 CYCLE").await?;
    let values = take(&mut session, 5).await?;
    expect_eq(values, vec![1, 2, 3, 1, 2], "cycling values")?;
    close_session(session).await;
    Ok(())
}

async fn negative_increment(ctx: &SuiteContext) -> Result<()> {
    let mut session =
        fresh_sequence(ctx, "INCREMENT BY -1 MINVALUE -10 MAXVALUE -1 START WITH -1").await?;
    let values = take(&mut session, 3).await?;
    expect_eq(values, vec![-1, -2, -3], "descending values")?;
    close_session(session).await;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strictly_increasing() {
        assert!(strictly_increasing(&[1, 2, 5, 9]));
        assert!(strictly_increasing(&[]));
        assert!(!strictly_increasing(&[1, 2, 2]));
        assert!(!strictly_increasing(&[3, 1]));
    }
}
