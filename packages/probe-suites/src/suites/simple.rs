//! Smoke test: connect and recreate the scratch table.

use crate::context::SuiteContext;
use crate::report::SuiteReport;
use crate::suites::basic::init;
use crate::suites::{close_session, open_session};

pub const NAME: &str = "simple";

pub async fn run(ctx: &SuiteContext) -> SuiteReport {
    let mut report = SuiteReport::new(NAME);
    let Some(mut session) = open_session(&mut report, ctx).await else {
        return report;
    };
    run_case!(report, "init", init(&mut session));
    close_session(session).await;
    report
}
