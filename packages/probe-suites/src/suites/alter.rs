//! Column renames.

use probe_core::expect::{ensure, expect_rows, expect_sql_error};
use probe_core::{Result, Session, Value};

use crate::context::SuiteContext;
use crate::report::SuiteReport;
use crate::suites::close_session;

pub const NAME: &str = "alter";

const RENAME: &str = "ALTER TABLE alter_t RENAME COLUMN name TO label";

pub async fn run(ctx: &SuiteContext) -> SuiteReport {
    let mut report = SuiteReport::new(NAME);
    run_case!(report, "rename_keeps_data", rename_keeps_data(ctx));
    run_case!(report, "old_name_rejected", old_name_rejected(ctx));
    run_case!(report, "rename_to_existing", rename_to_existing(ctx));
    run_case!(report, "rename_nonexistent", rename_nonexistent(ctx));
    report
}

/// `alter_t(id, name, score)` with two rows, as a fresh autocommit session.
async fn fixture(ctx: &SuiteContext) -> Result<Session> {
    let mut session = ctx.connect().await?;
    session.execute("DROP TABLE IF EXISTS alter_t").await?;
    session
        .execute("CREATE TABLE alter_t (id INT PRIMARY KEY, name TEXT, score INT)")
        .await?;
    session
        .execute("INSERT INTO alter_t VALUES (1, 'ann', 10), (2, 'bob', 20)")
        .await?;
    Ok(session)
}

async fn rename_keeps_data(ctx: &SuiteContext) -> Result<()> {
    let mut session = fixture(ctx).await?;
    session.execute(RENAME).await?;

    let rs = session.query("SELECT * FROM alter_t ORDER BY id", &[]).await?;
    ensure(
        rs.column_index("label") == Some(1),
        format!("expected column label at position 1, got {:?}", rs.columns()),
    )?;
    expect_rows(
        &rs,
        &[
            vec![Value::Int(1), Value::from("ann"), Value::Int(10)],
            vec![Value::Int(2), Value::from("bob"), Value::Int(20)],
        ],
        "alter_t after rename",
    )?;
    close_session(session).await;
    Ok(())
}

async fn old_name_rejected(ctx: &SuiteContext) -> Result<()> {
    let mut session = fixture(ctx).await?;
    session.execute(RENAME).await?;
    expect_sql_error(&mut session, "SELECT name FROM alter_t").await?;
    expect_sql_error(&mut session, "INSERT INTO alter_t (id, name) VALUES (3, 'cy')").await?;
    close_session(session).await;
    Ok(())
}

async fn rename_to_existing(ctx: &SuiteContext) -> Result<()> {
    let mut session = fixture(ctx).await?;
    expect_sql_error(&mut session, "ALTER TABLE alter_t RENAME COLUMN name TO score").await?;

    // the failed rename left both columns in place
    let rs = session.query("SELECT name, score FROM alter_t WHERE id = 1", &[]).await?;
    expect_rows(&rs, &[vec![Value::from("ann"), Value::Int(10)]], "alter_t row 1")?;
    close_session(session).await;
    Ok(())
}

async fn rename_nonexistent(ctx: &SuiteContext) -> Result<()> {
    let mut session = fixture(ctx).await?;
    expect_sql_error(&mut session, "ALTER TABLE alter_t RENAME COLUMN missing TO other").await?;
    expect_sql_error(&mut session, "SELECT other FROM alter_t").await?;
    close_session(session).await;
    Ok(())
}
