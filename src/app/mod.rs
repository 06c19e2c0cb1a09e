#[cfg(feature = "cli")]
pub mod cli;
pub mod correction;
pub mod general;
pub mod suites;

use crate::core::probe::ProbeResponse;
use crate::core::runner::SuiteContext;
use crate::core::server::ServerProcess;
use crate::domain::model::{CheckResult, Probe};
use crate::utils::error::Result;

/// A request and the status codes that count as a pass.
pub(crate) type StatusCase = (Probe, &'static [u16]);

pub(crate) fn case(probe: impl Into<Probe>, accepted: &'static [u16]) -> StatusCase {
    (probe.into(), accepted)
}

pub(crate) async fn run_status_cases(ctx: &SuiteContext, cases: &[StatusCase]) -> Vec<CheckResult> {
    let mut checks = Vec::with_capacity(cases.len());
    for (probe, accepted) in cases {
        checks.push(ctx.expect_status(probe, accepted).await);
    }
    checks
}

pub(crate) fn status_in(response: &Result<ProbeResponse>, accepted: &[u16]) -> bool {
    matches!(response, Ok(r) if accepted.contains(&r.status))
}

pub(crate) fn has_body(response: &Result<ProbeResponse>) -> bool {
    matches!(response, Ok(r) if !r.body.is_empty())
}

pub(crate) fn body_contains(response: &Result<ProbeResponse>, needle: &str) -> bool {
    matches!(response, Ok(r) if r.body.contains(needle))
}

/// Stops an auxiliary instance; a failed stop is logged, the checks already made stand.
pub(crate) async fn stop_quietly(server: ServerProcess, ctx: &SuiteContext) {
    let pid = server.pid();
    if let Err(e) = server.stop(ctx.settings.shutdown_timeout()).await {
        tracing::warn!("Failed to stop server {}: {}", pid, e);
    }
}

/// What the server answered, for failure details.
pub(crate) fn observed(response: &Result<ProbeResponse>) -> String {
    match response {
        Ok(r) => format!("status {}, {} bytes", r.status, r.body.len()),
        Err(e) => e.to_string(),
    }
}

/// `passed`, with the observed response attached when it did not.
pub(crate) fn judged(name: &str, passed: bool, response: &Result<ProbeResponse>) -> CheckResult {
    if passed {
        CheckResult::pass(name)
    } else {
        CheckResult::fail(name).with_details(observed(response))
    }
}
