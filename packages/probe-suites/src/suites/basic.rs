//! Core statement coverage on the scratch table `A(id, data)`.
//!
//! Cases share one session and build on each other's rows, so the suite
//! stops at the first failure.

use probe_core::expect::{ensure, expect_eq, expect_row_count, expect_rows, expect_sql_error};
use probe_core::{Param, ProbeError, Result, Session, Value};
use rand::rngs::StdRng;
use rand::{RngCore, SeedableRng};

use crate::context::SuiteContext;
use crate::report::SuiteReport;
use crate::suites::{close_session, open_session};

pub const NAME: &str = "basic";

pub(crate) const DROP: &str = "DROP TABLE IF EXISTS A;DROP TABLE IF EXISTS B;";
pub(crate) const DDL: &str = "CREATE TABLE A (id INT PRIMARY KEY, data TEXT);";

pub(crate) const INSERT_A_1: &str = "INSERT INTO A VALUES (1,'1961-06-16');";
pub(crate) const INSERT_A_2: &str = "INSERT INTO A VALUES (2,'Full Clip')";
pub(crate) const DELETE_A: &str = "DELETE FROM A WHERE id=1";

const AGG_COUNT: &str = "SELECT COUNT(*) FROM A";
const AGG_COUNT_2: &str = "SELECT COUNT(*) FROM A WHERE id = 1";
const AGG_AVG_PARAM: &str = "SELECT AVG(id) FROM A WHERE id < $1 + 1";

pub(crate) const BATCH_INSERT: &str = "INSERT INTO A VALUES ($1,$2);";

pub(crate) const SEQSCAN: &str = "SELECT * FROM A";
pub(crate) const INDEXSCAN: &str = "SELECT * FROM A WHERE id = 1";
const INDEXSCAN_COLUMN: &str = "SELECT data FROM A WHERE id = 1";
const INDEXSCAN_PARAM: &str = "SELECT * FROM A WHERE id = $1";
const RANGESCAN: &str = "SELECT * FROM A WHERE id > $1 and id < $2";
pub(crate) const UPDATE_BY_INDEXSCAN: &str = "UPDATE A SET data=$1 WHERE id=$2";
const UPDATE_BY_SEQSCAN: &str = "UPDATE A SET data='YO'";
const DELETE_BY_INDEXSCAN: &str = "DELETE FROM A WHERE id = $1";
const SELECT_FOR_UPDATE: &str = "SELECT * FROM A WHERE id = $1 FOR UPDATE";

/// Statements every server must reject.
pub const INVALID_SQL: [&str; 8] = [
    "SELECT * FROM INVALID_TABLE;",
    "SELECT * FROM INVALID_DB.A;",
    "INVALIDKEYWORD * FROM A;",
    "SELECT * FROM A, B;",
    "SELECT * FROM A INNER JOIN B ON A.id = B.id;",
    "SELECT id FROM A FOR UPDATE where A.id = 1;",
    "CREATE TABEL foo (id); ",
    "PREPARE func INSERT INTO foo(id int);",
];

const EMPTY_SQL: &str = ";;";

const BLOB_SEED: u64 = 12345;

pub async fn run(ctx: &SuiteContext) -> SuiteReport {
    let mut report = SuiteReport::new(NAME);
    let Some(mut session) = open_session(&mut report, ctx).await else {
        return report;
    };

    let s = &mut session;
    let _ = run_case!(report, "init", init(s))
        && run_case!(report, "show_table", show_table(s))
        && run_case!(report, "seq_scan", seq_scan(s))
        && run_case!(report, "scan", scan(s))
        && run_case!(report, "reinit", init(s))
        && run_case!(report, "batch_insert", batch_insert(s))
        && run_case!(report, "batch_update", batch_update(s))
        && run_case!(report, "batch_delete", batch_delete(s))
        && run_case!(report, "select_param", select_param(s))
        && run_case!(report, "range_scan", range_scan(s))
        && run_case!(report, "read_modify_write", read_modify_write(s))
        && run_case!(report, "update_all", update_all(s))
        && run_case!(report, "delete_by_index", delete_by_index(s))
        && run_case!(report, "invalid_sql", invalid_sql(s))
        && run_case!(report, "empty_sql", empty_sql(s))
        && run_case!(report, "blob", blob(s, &ctx.config.binary_column_type));

    close_session(session).await;
    report
}

/// Drops `A` and `B` and recreates an empty `A`.
pub(crate) async fn init(session: &mut Session) -> Result<()> {
    session.set_autocommit(true).await?;
    session.execute(DROP).await?;
    session.execute(DDL).await?;
    tracing::debug!("Test table created");
    Ok(())
}

async fn show_table(session: &mut Session) -> Result<()> {
    let rs = session.query(SEQSCAN, &[]).await?;
    ensure(rs.column_count() == 2, "Table should have 2 columns")?;
    ensure(rs.is_empty(), "No rows should be returned")
}

async fn seq_scan(session: &mut Session) -> Result<()> {
    let prepared = session.prepare(SEQSCAN).await?;
    let rs = session.query_prepared(&prepared, &[]).await?;
    for i in 0..rs.row_count() {
        tracing::debug!("SeqScan: {:?}", rs.row_strings(i));
    }
    Ok(())
}

async fn scan(session: &mut Session) -> Result<()> {
    session.execute(INSERT_A_1).await?;
    session.execute(INSERT_A_2).await?;

    let rs = session.query(SEQSCAN, &[]).await?;
    ensure(rs.row_count() <= 2, "More than 2 rows returned")?;
    expect_row_count(&rs, 2, SEQSCAN)?;
    ensure(rs.row_strings(0) != rs.row_strings(1), "Rows aren't distinct")?;

    let rs = session.query(INDEXSCAN, &[]).await?;
    expect_rows(&rs, &[vec![Value::Int(1), Value::from("1961-06-16")]], INDEXSCAN)?;
    let rs = session.query(INDEXSCAN_COLUMN, &[]).await?;
    expect_rows(&rs, &[vec![Value::from("1961-06-16")]], INDEXSCAN_COLUMN)?;

    expect_eq(session.query_i64(AGG_COUNT, &[]).await?, 2, AGG_COUNT)?;
    expect_eq(session.query_i64(AGG_COUNT_2, &[]).await?, 1, AGG_COUNT_2)?;
    let rs = session.query(AGG_AVG_PARAM, &[&1i32]).await?;
    expect_row_count(&rs, 1, AGG_AVG_PARAM)?;

    for id in 1..3i32 {
        index_scan_param(session, id).await?;
    }

    session.set_autocommit(true).await?;
    let deleted = session.execute(DELETE_A).await?;
    expect_eq(deleted, 1, DELETE_A)
}

/// Parameterized point lookup in its own explicit transaction.
async fn index_scan_param(session: &mut Session, id: i32) -> Result<()> {
    session.set_autocommit(false).await?;
    let rs = session.query(INDEXSCAN_PARAM, &[&id]).await?;
    expect_row_count(&rs, 1, INDEXSCAN_PARAM)?;
    session.commit().await
}

/// Every batch entry must report exactly one affected row.
fn check_batch(counts: &[u64], expected_entries: usize) -> Result<()> {
    expect_eq(counts.len(), expected_entries, "batch entries")?;
    for (i, count) in counts.iter().enumerate() {
        if *count != 1 {
            return Err(ProbeError::assertion(format!("Query {} returned {}", i + 1, count)));
        }
    }
    Ok(())
}

async fn batch_insert(session: &mut Session) -> Result<()> {
    let prepared = session.prepare(BATCH_INSERT).await?;
    session.set_autocommit(false).await?;
    let batch: Vec<Vec<Param>> = (1..=5i32)
        .map(|id| vec![Box::new(id) as Param, Box::new("Yo") as Param])
        .collect();
    let counts = session.execute_batch(&prepared, &batch).await?;
    check_batch(&counts, 5)?;
    session.commit().await
}

async fn batch_update(session: &mut Session) -> Result<()> {
    let prepared = session.prepare(UPDATE_BY_INDEXSCAN).await?;
    session.set_autocommit(false).await?;
    let batch: Vec<Vec<Param>> = (1..=3i32)
        .map(|id| vec![Box::new("Cool") as Param, Box::new(id) as Param])
        .collect();
    let counts = session.execute_batch(&prepared, &batch).await?;
    check_batch(&counts, 3)?;
    session.commit().await
}

async fn batch_delete(session: &mut Session) -> Result<()> {
    let prepared = session.prepare(DELETE_BY_INDEXSCAN).await?;
    session.set_autocommit(false).await?;
    let batch: Vec<Vec<Param>> = (1..=3i32).map(|id| vec![Box::new(id) as Param]).collect();
    let counts = session.execute_batch(&prepared, &batch).await?;
    check_batch(&counts, 3)?;
    session.commit().await
}

async fn select_param(session: &mut Session) -> Result<()> {
    session.set_autocommit(false).await?;
    let rs = session.query(INDEXSCAN_PARAM, &[&4i32]).await?;
    expect_rows(&rs, &[vec![Value::Int(4), Value::from("Yo")]], INDEXSCAN_PARAM)?;
    session.commit().await
}

async fn range_scan(session: &mut Session) -> Result<()> {
    let rs = session.query(RANGESCAN, &[&0i32, &10i32]).await?;
    let mut ids = Vec::with_capacity(rs.row_count());
    for row in 0..rs.row_count() {
        ids.push(rs.int_at(row, 0)?);
    }
    ids.sort_unstable();
    expect_eq(ids, vec![4, 5], RANGESCAN)?;
    session.commit().await
}

async fn read_modify_write(session: &mut Session) -> Result<()> {
    session.set_autocommit(false).await?;
    let rs = session.query(SELECT_FOR_UPDATE, &[&4i32]).await?;
    expect_row_count(&rs, 1, SELECT_FOR_UPDATE)?;
    let updated = session
        .execute_params(UPDATE_BY_INDEXSCAN, &[&"Updated", &4i32])
        .await?;
    expect_eq(updated, 1, UPDATE_BY_INDEXSCAN)?;
    session.commit().await?;

    let rs = session.query(INDEXSCAN_PARAM, &[&4i32]).await?;
    expect_rows(&rs, &[vec![Value::Int(4), Value::from("Updated")]], INDEXSCAN_PARAM)?;
    session.set_autocommit(true).await
}

async fn update_all(session: &mut Session) -> Result<()> {
    let updated = session.execute(UPDATE_BY_SEQSCAN).await?;
    expect_eq(updated, 2, UPDATE_BY_SEQSCAN)?;
    let rs = session.query(SEQSCAN, &[]).await?;
    for value in rs.column_values(1) {
        expect_eq(value, &Value::from("YO"), "data after update")?;
    }
    Ok(())
}

async fn delete_by_index(session: &mut Session) -> Result<()> {
    let deleted = session.execute_params(DELETE_BY_INDEXSCAN, &[&5i32]).await?;
    expect_eq(deleted, 1, DELETE_BY_INDEXSCAN)?;
    expect_eq(session.query_i64(AGG_COUNT, &[]).await?, 1, AGG_COUNT)
}

async fn invalid_sql(session: &mut Session) -> Result<()> {
    session.set_autocommit(true).await?;
    for sql in INVALID_SQL {
        let diag = expect_sql_error(session, sql).await?;
        tracing::debug!("Rejected `{}`: {}", sql, diag);
    }
    Ok(())
}

async fn empty_sql(session: &mut Session) -> Result<()> {
    session
        .execute(EMPTY_SQL)
        .await
        .map(|_| ())
        .map_err(|e| ProbeError::assertion(format!("Empty query should be valid: {}", e)))
}

/// Round-trips random payloads of 2..=512 bytes through a binary column.
async fn blob(session: &mut Session, column_type: &str) -> Result<()> {
    let mut rng = StdRng::seed_from_u64(BLOB_SEED);
    for shift in 1..10 {
        session.execute("DROP TABLE IF EXISTS A;").await?;
        session
            .execute(&format!("CREATE TABLE A (id INT PRIMARY KEY, data {})", column_type))
            .await?;

        let size = 1usize << shift;
        let mut sent = vec![0u8; size];
        rng.fill_bytes(&mut sent);
        session.execute_params(BATCH_INSERT, &[&1i32, &sent]).await?;

        let rs = session.query(SEQSCAN, &[]).await?;
        ensure(
            !rs.is_empty(),
            format!("Did not get result after inserting {} bytes", size),
        )?;
        ensure(rs.row_count() == 1, format!("Too many results at {} bytes", size))?;
        expect_eq(rs.int_at(0, 0)?, 1, "blob id")?;
        match rs.get(0, 1) {
            Some(Value::Bytes(received)) if *received == sent => {}
            other => {
                return Err(ProbeError::assertion(format!(
                    "byte mismatch at {} bytes:\n before: {:?}\n after:  {:?}",
                    size, sent, other
                )))
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_batch() {
        assert!(check_batch(&[1, 1, 1], 3).is_ok());
        assert!(check_batch(&[1, 1], 3).is_err());
        let err = check_batch(&[1, 0, 1], 3).unwrap_err();
        assert!(err.to_string().contains("Query 2 returned 0"));
    }

    #[test]
    fn test_invalid_sql_list() {
        assert_eq!(INVALID_SQL.len(), 8);
        assert!(INVALID_SQL.iter().all(|sql| !sql.trim().is_empty()));
    }

    #[test]
    fn test_blob_payload_is_reproducible() {
        let mut a = StdRng::seed_from_u64(BLOB_SEED);
        let mut b = StdRng::seed_from_u64(BLOB_SEED);
        let (mut x, mut y) = ([0u8; 16], [0u8; 16]);
        a.fill_bytes(&mut x);
        b.fill_bytes(&mut y);
        assert_eq!(x, y);
    }
}
