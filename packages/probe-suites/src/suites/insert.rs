//! INSERT forms and the inserts a server must reject.

use probe_core::expect::{expect_eq, expect_rows, expect_sql_error_class};
use probe_core::{Result, Session};

use crate::context::SuiteContext;
use crate::report::SuiteReport;
use crate::suites::{close_session, int_row};

pub const NAME: &str = "insert";

const TEST_ROWS: [[i64; 3]; 4] = [[1, 22, 333], [2, 11, 0], [3, 33, 444], [4, 0, 555]];
const TEST2_ROWS: [[i64; 3]; 4] = [[5, 99, 888], [6, 88, 777], [7, 77, 666], [8, 55, 999]];
const TEST7_ROWS: [[i64; 3]; 4] = [[99, 5, 888], [88, 6, 777], [77, 7, 666], [55, 8, 999]];

/// Malformed inserts and the SQLSTATE class each must fail with. `test` is
/// absent while these run; `test8` exists and is empty.
const BAD_INSERTS: [(&str, &str); 8] = [
    ("INSERT INTO test8 VALUES(1, 2, 3, 4);", "42"),
    ("INSERT INTO test VALUES(3, 4);", "42"),
    ("INSERT INTO test8(num1, num3) VALUES(3);", "42"),
    ("INSERT INTO test8(num1, num3) VALUES (1, 2), (3, 4), (3, 4, 5);", "42"),
    ("INSERT INTO test8(num1, num3) VALUES (6, 7), (5);", "42"),
    ("INSERT INTO test8(numx) VALUES(3);", "42"),
    ("INSERT INTO test8(num1, num4) VALUES(3, 4);", "42"),
    // num3 is NOT NULL
    ("INSERT INTO test8 VALUES(1, 2)", "23"),
];

/// Text that no numeric column accepts, plus one misplaced column list.
const BAD_TYPES: [(&str, &str); 4] = [
    ("INSERT INTO(id) insert_types VALUES('h');", "42"),
    ("INSERT INTO insert_types(id2) VALUES('h');", "22"),
    ("INSERT INTO insert_types(id3) VALUES('h');", "22"),
    ("INSERT INTO insert_types(id5) VALUES('h');", "22"),
];

pub async fn run(ctx: &SuiteContext) -> SuiteReport {
    let mut report = SuiteReport::new(NAME);
    run_case!(report, "one_value", one_value(ctx));
    run_case!(report, "multiple_values", multiple_values(ctx));
    run_case!(report, "specify_columns", specify_columns(ctx));
    run_case!(report, "into_select", into_select(ctx));
    run_case!(report, "into_select_columns", into_select_columns(ctx));
    run_case!(report, "unique_column", unique_column(ctx));
    run_case!(report, "bad_types", bad_types(ctx));
    run_case!(report, "nonexistent_table", nonexistent_table(ctx));
    run_case!(report, "bad_inserts", bad_inserts(ctx));
    report
}

/// Drops and recreates `table` with `ddl`, then loads `rows`.
async fn load_table(session: &mut Session, table: &str, ddl: &str, rows: &[[i64; 3]]) -> Result<()> {
    session
        .execute(&format!("DROP TABLE IF EXISTS {}", table))
        .await?;
    session.execute(ddl).await?;
    for [a, b, c] in rows {
        session
            .execute(&format!("INSERT INTO {} VALUES ({}, {}, {});", table, a, b, c))
            .await?;
    }
    Ok(())
}

async fn load_test(session: &mut Session) -> Result<()> {
    load_table(
        session,
        "test",
        "CREATE TABLE test(a INT PRIMARY KEY, b INT, c INT);",
        &TEST_ROWS,
    )
    .await
}

async fn load_test2(session: &mut Session) -> Result<()> {
    load_table(
        session,
        "test2",
        "CREATE TABLE test2(a INT PRIMARY KEY, b INT, c INT);",
        &TEST2_ROWS,
    )
    .await
}

async fn load_test8(session: &mut Session) -> Result<()> {
    load_table(
        session,
        "test8",
        "CREATE TABLE test8(num1 int, num2 int, num3 int not null);",
        &[],
    )
    .await
}

async fn expect_single(session: &mut Session, sql: &str, expected: [i64; 3]) -> Result<()> {
    let rs = session.query(sql, &[]).await?;
    expect_rows(&rs, &[int_row(&expected)], sql)
}

async fn one_value(ctx: &SuiteContext) -> Result<()> {
    let mut session = ctx.connect().await?;
    load_test(&mut session).await?;

    let inserted = session.execute("INSERT INTO test VALUES (5, 55, 555);").await?;
    expect_eq(inserted, 1, "rows inserted")?;
    expect_single(&mut session, "SELECT * FROM test WHERE a=5", [5, 55, 555]).await?;
    close_session(session).await;
    Ok(())
}

async fn multiple_values(ctx: &SuiteContext) -> Result<()> {
    let mut session = ctx.connect().await?;
    load_test(&mut session).await?;

    let inserted = session
        .execute("INSERT INTO test VALUES (6, 11, 888), (7, 77, 999);")
        .await?;
    expect_eq(inserted, 2, "rows inserted")?;
    expect_single(&mut session, "SELECT * FROM test WHERE a=6", [6, 11, 888]).await?;
    expect_single(&mut session, "SELECT * FROM test WHERE a=7", [7, 77, 999]).await?;
    close_session(session).await;
    Ok(())
}

/// An out-of-order column list still lands values in schema order.
async fn specify_columns(ctx: &SuiteContext) -> Result<()> {
    let mut session = ctx.connect().await?;
    load_test8(&mut session).await?;

    let inserted = session
        .execute("INSERT INTO test8 (num3, num2, num1) VALUES (99, 8, 111);")
        .await?;
    expect_eq(inserted, 1, "rows inserted")?;
    expect_single(&mut session, "SELECT * FROM test8 WHERE num2=8", [111, 8, 99]).await?;
    close_session(session).await;
    Ok(())
}

async fn into_select(ctx: &SuiteContext) -> Result<()> {
    let mut session = ctx.connect().await?;
    load_test(&mut session).await?;
    load_test2(&mut session).await?;

    let inserted = session.execute("INSERT INTO test SELECT * FROM test2;").await?;
    expect_eq(inserted, 4, "rows copied from test2")?;
    expect_single(&mut session, "SELECT * FROM test WHERE a=8", [8, 55, 999]).await?;

    let inserted = session
        .execute("INSERT INTO test2 SELECT * FROM test WHERE a=1;")
        .await?;
    expect_eq(inserted, 1, "rows copied from test")?;
    expect_single(&mut session, "SELECT * FROM test2 WHERE a=1", [1, 22, 333]).await?;

    let inserted = session
        .execute("INSERT INTO test2 SELECT b,a,c FROM test WHERE a=2;")
        .await?;
    expect_eq(inserted, 1, "reordered rows copied from test")?;
    expect_single(&mut session, "SELECT * FROM test2 WHERE a=11", [11, 2, 0]).await?;
    close_session(session).await;
    Ok(())
}

async fn into_select_columns(ctx: &SuiteContext) -> Result<()> {
    let mut session = ctx.connect().await?;
    load_table(
        &mut session,
        "test6",
        "CREATE TABLE test6(a INT, b INT, c INT);",
        &TEST_ROWS,
    )
    .await?;
    load_table(
        &mut session,
        "test7",
        "CREATE TABLE test7(a INT, b INT, c INT);",
        &TEST7_ROWS,
    )
    .await?;

    let inserted = session.execute("INSERT INTO test6 SELECT b,a,c FROM test7;").await?;
    expect_eq(inserted, 4, "reordered rows copied from test7")?;
    expect_single(&mut session, "SELECT * FROM test6 WHERE a=8", [8, 55, 999]).await?;

    let inserted = session
        .execute("INSERT INTO test7 SELECT * FROM test6 WHERE a=1;")
        .await?;
    expect_eq(inserted, 1, "rows copied from test6")?;
    expect_single(&mut session, "SELECT * FROM test7 WHERE a=1", [1, 22, 333]).await?;

    let inserted = session
        .execute("INSERT INTO test7 SELECT b,a,c FROM test6 WHERE a=2;")
        .await?;
    expect_eq(inserted, 1, "reordered rows copied from test6")?;
    expect_single(&mut session, "SELECT * FROM test7 WHERE a=11", [11, 2, 0]).await?;
    close_session(session).await;
    Ok(())
}

async fn unique_column(ctx: &SuiteContext) -> Result<()> {
    let mut session = ctx.connect().await?;
    session.execute("DROP TABLE IF EXISTS t").await?;
    session
        .execute("CREATE TABLE t (id INTEGER NOT NULL PRIMARY KEY, st VARCHAR(15) NOT NULL UNIQUE);")
        .await?;
    session.execute("INSERT INTO t VALUES (1, 'abc');").await?;
    session.execute("INSERT INTO t VALUES (2, 'def');").await?;

    let diag = expect_sql_error_class(&mut session, "INSERT INTO t VALUES (3, 'abc');", "23").await?;
    tracing::debug!("Duplicate rejected: {}", diag);
    let rs = session.query("SELECT id FROM t", &[]).await?;
    expect_eq(rs.row_count(), 2, "rows after rejected duplicate")?;
    close_session(session).await;
    Ok(())
}

async fn bad_types(ctx: &SuiteContext) -> Result<()> {
    let mut session = ctx.connect().await?;
    session.execute("DROP TABLE IF EXISTS insert_types").await?;
    session
        .execute("CREATE TABLE insert_types (id1 int, id2 bigint, id3 smallint, id5 decimal);")
        .await?;
    for (sql, class) in BAD_TYPES {
        expect_sql_error_class(&mut session, sql, class).await?;
    }
    close_session(session).await;
    Ok(())
}

async fn nonexistent_table(ctx: &SuiteContext) -> Result<()> {
    let mut session = ctx.connect().await?;
    session.execute("DROP TABLE IF EXISTS NonExistentTable").await?;
    expect_sql_error_class(&mut session, "INSERT INTO NonExistentTable VALUES(3);", "42").await?;
    close_session(session).await;
    Ok(())
}

async fn bad_inserts(ctx: &SuiteContext) -> Result<()> {
    let mut session = ctx.connect().await?;
    session.execute("DROP TABLE IF EXISTS test").await?;
    load_test8(&mut session).await?;
    for (sql, class) in BAD_INSERTS {
        expect_sql_error_class(&mut session, sql, class).await?;
    }
    let rs = session.query("SELECT * FROM test8", &[]).await?;
    expect_eq(rs.row_count(), 0, "rows in test8 after rejected inserts")?;
    expect_sql_error_class(&mut session, "SELECT * FROM test", "42").await?;
    close_session(session).await;
    Ok(())
}
