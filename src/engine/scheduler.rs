//! Fixed-interval driver for the ingestion cycle.
//!
//! Runs a cycle, waits `interval` after it finishes, repeats. Cycles never
//! overlap. Shutdown is only observed while waiting; a running cycle always
//! completes.

use std::future::Future;
use std::time::Duration;
use tracing::{error, info, warn};

use super::cycle::IngestionCycle;
use crate::types::{CycleError, CycleReport};

/// Counters for a scheduler run.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SchedulerStats {
    pub cycles_run: u64,
    pub cycles_failed: u64,
    pub observations_recorded: u64,
}

pub struct Scheduler {
    cycle: IngestionCycle,
    interval: Duration,
}

impl Scheduler {
    pub fn new(cycle: IngestionCycle, interval: Duration) -> Self {
        Self { cycle, interval }
    }

    /// Drive cycles until `shutdown` resolves or a fatal error occurs.
    ///
    /// Fetch and persist failures skip the cycle and are retried after the
    /// interval. A fatal error (missing catalog) is returned.
    pub async fn run<F>(&self, shutdown: F) -> Result<SchedulerStats, CycleError>
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);
        let mut stats = SchedulerStats::default();

        info!(interval_secs = self.interval.as_secs_f64(), "Scheduler started");

        loop {
            stats.cycles_run += 1;
            let cycle = stats.cycles_run;

            match self.cycle.run_once().await {
                Ok(report) => {
                    stats.observations_recorded += report.observations.len() as u64;
                    log_cycle_report(cycle, &report);
                }
                Err(e) if e.is_fatal() => {
                    error!(cycle, error = %e, "Fatal cycle error, stopping scheduler");
                    return Err(e);
                }
                Err(e) => {
                    stats.cycles_failed += 1;
                    warn!(cycle, error = %e, "Cycle aborted, retrying after interval");
                }
            }

            tokio::select! {
                _ = tokio::time::sleep(self.interval) => {}
                _ = &mut shutdown => {
                    info!("Shutdown signal received.");
                    break;
                }
            }
        }

        info!(
            cycles = stats.cycles_run,
            failed = stats.cycles_failed,
            observations = stats.observations_recorded,
            "Scheduler stopped"
        );
        Ok(stats)
    }
}

fn log_cycle_report(cycle: u64, report: &CycleReport) {
    info!(cycle, rows = report.observations.len(), "{report}");
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
