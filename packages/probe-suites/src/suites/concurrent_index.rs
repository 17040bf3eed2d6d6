//! Index creation raced against writers and against itself.
//!
//! After each race the table is checked two ways: a full scan must match
//! the seed rows with the write applied exactly when it succeeded, and an
//! equality lookup on the indexed column must agree with the full scan.

use std::collections::BTreeMap;

use probe_core::expect::{ensure, expect_eq};
use probe_core::race::race_pair;
use probe_core::{Param, ProbeError, Result, Session};

use crate::context::SuiteContext;
use crate::report::SuiteReport;
use crate::suites::close_session;

pub const NAME: &str = "concurrent-index";

const SEED_ROWS: i32 = 200;
const CREATE_INDEX: &str = "CREATE INDEX ci_val_idx ON ci_t (val)";
const CREATE_DUP_INDEX: &str = "CREATE INDEX ci_dup_idx ON ci_t (val)";
const SCAN: &str = "SELECT id, val FROM ci_t";
const LOOKUP: &str = "SELECT id FROM ci_t WHERE val = $1";

/// The write raced against index creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RacedWrite {
    Insert,
    Update,
    Delete,
}

impl RacedWrite {
    pub fn sql(&self) -> &'static str {
        match self {
            RacedWrite::Insert => "INSERT INTO ci_t VALUES (1001, 10010), (1002, 10020)",
            RacedWrite::Update => "UPDATE ci_t SET val = val + 1 WHERE id <= 50",
            RacedWrite::Delete => "DELETE FROM ci_t WHERE id > 150",
        }
    }

    /// Applies the write to an `id -> val` model of the table.
    pub fn apply(&self, rows: &mut BTreeMap<i64, i64>) {
        match self {
            RacedWrite::Insert => {
                rows.insert(1001, 10010);
                rows.insert(1002, 10020);
            }
            RacedWrite::Update => {
                for (_, val) in rows.range_mut(..=50) {
                    *val += 1;
                }
            }
            RacedWrite::Delete => rows.retain(|id, _| *id <= 150),
        }
    }
}

/// Seed contents: `(id, id * 10)` for ids `1..=200`.
pub fn seed_model() -> BTreeMap<i64, i64> {
    (1..=SEED_ROWS as i64).map(|id| (id, id * 10)).collect()
}

pub async fn run(ctx: &SuiteContext) -> SuiteReport {
    let mut report = SuiteReport::new(NAME);
    run_case!(report, "index_vs_insert", index_vs_write(ctx, RacedWrite::Insert));
    run_case!(report, "index_vs_update", index_vs_write(ctx, RacedWrite::Update));
    run_case!(report, "index_vs_delete", index_vs_write(ctx, RacedWrite::Delete));
    run_case!(report, "same_index_name", same_index_name(ctx));
    report
}

/// Recreates `ci_t` with the seed rows, committed as one transaction.
async fn seed_table(session: &mut Session) -> Result<()> {
    session.set_autocommit(true).await?;
    session.execute("DROP TABLE IF EXISTS ci_t").await?;
    session.execute("CREATE TABLE ci_t (id INT PRIMARY KEY, val INT)").await?;

    let insert = session.prepare("INSERT INTO ci_t VALUES ($1, $2)").await?;
    let batch: Vec<Vec<Param>> = (1..=SEED_ROWS)
        .map(|id| vec![Box::new(id) as Param, Box::new(id * 10) as Param])
        .collect();
    session.set_autocommit(false).await?;
    session.execute_batch(&insert, &batch).await?;
    session.set_autocommit(true).await
}

async fn index_vs_write(ctx: &SuiteContext, write: RacedWrite) -> Result<()> {
    let mut session = ctx.connect().await?;
    seed_table(&mut session).await?;

    let outcome = race_pair(&ctx.config, CREATE_INDEX, write.sql()).await?;
    tracing::info!(
        "{:?} race: index {:?}, write {:?}",
        write,
        outcome.left,
        outcome.right
    );
    ensure(
        outcome.successes() >= 1,
        "index creation and the write both failed",
    )?;

    let mut model = seed_model();
    if outcome.right.is_success() {
        write.apply(&mut model);
    }
    check_consistency(&mut session, &model).await?;

    session.execute("DROP TABLE ci_t").await?;
    close_session(session).await;
    Ok(())
}

async fn same_index_name(ctx: &SuiteContext) -> Result<()> {
    let mut session = ctx.connect().await?;
    seed_table(&mut session).await?;

    let outcome = race_pair(&ctx.config, CREATE_DUP_INDEX, CREATE_DUP_INDEX).await?;
    expect_eq(outcome.successes(), 1, "successful creators of ci_dup_idx")?;
    check_consistency(&mut session, &seed_model()).await?;

    session.execute("DROP TABLE ci_t").await?;
    close_session(session).await;
    Ok(())
}

/// Compares a full scan with `model`, then looks up every value through
/// the indexed column.
async fn check_consistency(session: &mut Session, model: &BTreeMap<i64, i64>) -> Result<()> {
    let rs = session.query(SCAN, &[]).await?;
    let mut scanned = BTreeMap::new();
    for row in 0..rs.row_count() {
        scanned.insert(rs.int_at(row, 0)?, rs.int_at(row, 1)?);
    }
    expect_eq(scanned.len(), rs.row_count(), "distinct ids in full scan")?;
    ensure(
        &scanned == model,
        format!(
            "full scan differs from expected contents ({} rows, expected {})",
            scanned.len(),
            model.len()
        ),
    )?;

    let mut by_val: BTreeMap<i64, Vec<i64>> = BTreeMap::new();
    for (id, val) in &scanned {
        by_val.entry(*val).or_default().push(*id);
    }

    let lookup = session.prepare(LOOKUP).await?;
    for (val, ids) in &by_val {
        let val = i32::try_from(*val)
            .map_err(|_| ProbeError::assertion(format!("val {} out of INT range", val)))?;
        let rs = session.query_prepared(&lookup, &[&val]).await?;
        let mut found = Vec::with_capacity(rs.row_count());
        for row in 0..rs.row_count() {
            found.push(rs.int_at(row, 0)?);
        }
        found.sort_unstable();
        expect_eq(&found, ids, &format!("ids for val = {}", val))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seed_model() {
        let model = seed_model();
        assert_eq!(model.len(), 200);
        assert_eq!(model[&1], 10);
        assert_eq!(model[&200], 2000);
    }

    #[test]
    fn test_apply_insert() {
        let mut model = seed_model();
        RacedWrite::Insert.apply(&mut model);
        assert_eq!(model.len(), 202);
        assert_eq!(model[&1002], 10020);
    }

    #[test]
    fn test_apply_update() {
        let mut model = seed_model();
        RacedWrite::Update.apply(&mut model);
        assert_eq!(model[&50], 501);
        assert_eq!(model[&51], 510);
    }

    #[test]
    fn test_apply_delete() {
        let mut model = seed_model();
        RacedWrite::Delete.apply(&mut model);
        assert_eq!(model.len(), 150);
        assert!(!model.contains_key(&151));
    }
}
