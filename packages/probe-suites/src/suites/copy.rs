//! COPY of the query statistics table into a server-side file.

use std::path::Path;

use probe_core::{Param, ProbeError, Result, Session};

use crate::context::SuiteContext;
use crate::report::SuiteReport;
use crate::suites::basic::{init, BATCH_INSERT};
use crate::suites::{close_session, open_session, quote_literal};

pub const NAME: &str = "copy";

/// Payload with the characters a CSV writer has to escape.
const TRICKY_DATA: &str = "Yo\nYo,Yo";

pub async fn run(ctx: &SuiteContext) -> SuiteReport {
    let mut report = SuiteReport::new(NAME);
    let Some(path) = ctx.copy_path.as_deref() else {
        report.record(
            "copy",
            std::time::Duration::ZERO,
            Err(ProbeError::Config("copy suite needs a target file path".to_string())),
        );
        return report;
    };
    let Some(mut session) = open_session(&mut report, ctx).await else {
        return report;
    };

    let s = &mut session;
    let _ = run_case!(report, "init", init(s))
        && run_case!(report, "batch_insert", batch_insert(s, ctx))
        && run_case!(report, "copy_query_metric", copy_query_metric(s, path));

    close_session(session).await;
    report
}

async fn batch_insert(session: &mut Session, ctx: &SuiteContext) -> Result<()> {
    let prepared = session.prepare(BATCH_INSERT).await?;
    let batch: Vec<Vec<Param>> = (1..=5i32)
        .map(|id| vec![Box::new(id) as Param, Box::new(TRICKY_DATA) as Param])
        .collect();
    session.execute_batch(&prepared, &batch).await?;

    // let the server flush query statistics
    tokio::time::sleep(ctx.config.stat_wait()).await;
    Ok(())
}

pub(crate) fn copy_statement(path: &Path) -> String {
    format!(
        "COPY pg_catalog.query_metric TO {} DELIMITER ','",
        quote_literal(&path.to_string_lossy())
    )
}

/// A rejected COPY is logged; it does not fail the case.
async fn copy_query_metric(session: &mut Session, path: &Path) -> Result<()> {
    let sql = copy_statement(path);
    match session.execute(&sql).await {
        Ok(rows) => tracing::info!("Copied {} rows to {}", rows, path.display()),
        Err(ProbeError::Sql { diagnostics, .. }) => {
            tracing::warn!("COPY to {} failed: {}", path.display(), diagnostics)
        }
        Err(e) => return Err(e),
    }
    Ok(())
}
