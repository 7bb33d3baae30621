use super::agent::FixAgent;
use super::worker::{RetryPolicy, UnitOutcome, UnitStatus, run_unit};
use crate::types::WorkUnit;
use futures::stream::{FuturesUnordered, StreamExt};
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Aggregate result of dispatching a list of work units
#[derive(Debug, Clone, Default, Serialize)]
pub struct DispatchReport {
    /// Outcomes of units that reached a terminal state, in unit order
    pub outcomes: Vec<UnitOutcome>,
    /// Descriptions of units abandoned by an interrupt, in unit order
    pub cancelled: Vec<String>,
    pub interrupted: bool,
}

impl DispatchReport {
    pub fn succeeded(&self) -> impl Iterator<Item = &UnitOutcome> {
        self.outcomes
            .iter()
            .filter(|o| o.status == UnitStatus::Succeeded)
    }

    pub fn failed(&self) -> impl Iterator<Item = &UnitOutcome> {
        self.outcomes
            .iter()
            .filter(|o| o.status != UnitStatus::Succeeded)
    }

    /// True only if every unit succeeded and nothing was cancelled
    pub fn is_success(&self) -> bool {
        !self.interrupted && self.cancelled.is_empty() && self.failed().next().is_none()
    }
}

/// Fix every unit with at most `concurrency` units running at once
///
/// Blocks until all units are terminal or `shutdown` fires. On shutdown the
/// in-flight attempts and backoff sleeps are dropped, which kills any running
/// agent process, and unfinished units are reported as cancelled.
pub async fn dispatch(
    units: &[WorkUnit],
    concurrency: usize,
    agent: &dyn FixAgent,
    policy: &RetryPolicy,
    shutdown: &CancellationToken,
) -> DispatchReport {
    if units.is_empty() {
        debug!("No work units to dispatch");
        return DispatchReport::default();
    }

    let concurrency = concurrency.max(1);
    info!(
        "Dispatching {} unit(s) with concurrency {}",
        units.len(),
        concurrency
    );

    let mut pending = units.iter().enumerate();
    let mut running = FuturesUnordered::new();
    let mut outcomes = Vec::with_capacity(units.len());
    let mut interrupted = false;

    // Fill initial pool up to concurrency
    for (i, unit) in pending.by_ref().take(concurrency) {
        running.push(run_unit(i, unit, agent, policy));
    }

    // As units finish, start the next pending one to keep the pool full
    loop {
        tokio::select! {
            biased;
            _ = shutdown.cancelled() => {
                warn!("Shutdown requested, abandoning {} running unit(s)", running.len());
                interrupted = true;
                break;
            }
            next = running.next() => match next {
                Some(outcome) => {
                    outcomes.push(outcome);
                    if let Some((i, unit)) = pending.next() {
                        running.push(run_unit(i, unit, agent, policy));
                    }
                }
                None => break,
            }
        }
    }
    drop(running);

    outcomes.sort_by_key(|o| o.index);
    let cancelled: Vec<String> = units
        .iter()
        .enumerate()
        .filter(|(i, _)| outcomes.binary_search_by_key(i, |o| o.index).is_err())
        .map(|(_, unit)| unit.description())
        .collect();

    let report = DispatchReport {
        outcomes,
        cancelled,
        interrupted,
    };
    if interrupted {
        warn!(
            "Dispatch interrupted: {} succeeded, {} failed, {} cancelled",
            report.succeeded().count(),
            report.failed().count(),
            report.cancelled.len()
        );
    } else {
        info!(
            "Dispatch complete: {} succeeded, {} failed",
            report.succeeded().count(),
            report.failed().count()
        );
    }
    report
}
