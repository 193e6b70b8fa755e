//! Sweep Execution
//!
//! Prepares every implementation once, then walks the plan trial by trial.
//! The first failure of any kind aborts the sweep: no retries, no skipped
//! pairs, and no partial table.

use super::trial::{Measure, TrialError, run_trial};
use crate::error::HarnessError;
use crate::planner::SweepPlan;
use indicatif::{ProgressBar, ProgressStyle};
use nqbench_core::{ImplementationSet, PrepareOutcome, ToolRunner};
use nqbench_report::ResultTable;

/// Make every implementation runnable, in registration order.
pub fn prepare_all(
    implementations: &ImplementationSet,
    runner: &dyn ToolRunner,
) -> Result<(), HarnessError> {
    for implementation in implementations {
        match implementation.prepare(runner)? {
            PrepareOutcome::Ready => {
                tracing::debug!("{} ready", implementation.name());
            }
            PrepareOutcome::Built { steps_run } => {
                tracing::info!(
                    "{} prepared ({} build step{})",
                    implementation.name(),
                    steps_run,
                    if steps_run == 1 { "" } else { "s" }
                );
            }
        }
    }
    Ok(())
}

/// Sweep executor
pub struct Executor<'a> {
    measure: &'a dyn Measure,
    show_progress: bool,
}

impl<'a> Executor<'a> {
    pub fn new(measure: &'a dyn Measure) -> Self {
        Self {
            measure,
            show_progress: true,
        }
    }

    pub fn show_progress(mut self, show: bool) -> Self {
        self.show_progress = show;
        self
    }

    /// Prepare, then run every trial of the plan.
    pub fn execute(
        &self,
        plan: &SweepPlan,
        runner: &dyn ToolRunner,
    ) -> Result<ResultTable, HarnessError> {
        prepare_all(&plan.implementations, runner)?;
        Ok(self.run_trials(plan)?)
    }

    /// Run every trial of an already prepared plan.
    pub fn run_trials(&self, plan: &SweepPlan) -> Result<ResultTable, TrialError> {
        let pb = if self.show_progress {
            ProgressBar::new(plan.trial_count() as u64)
        } else {
            ProgressBar::hidden()
        };
        pb.set_style(
            ProgressStyle::default_bar()
                .template(
                    "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}",
                )
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("#>-"),
        );

        let mut table = ResultTable::new();
        for (size, implementation) in plan.trials() {
            pb.set_message(format!("{} N={}", implementation.name(), size));
            let result = pb.suspend(|| run_trial(self.measure, implementation, size, plan.workers));
            match result {
                Ok(record) => table.push(record),
                Err(e) => {
                    pb.abandon();
                    log_failure(&e);
                    return Err(e);
                }
            }
            pb.inc(1);
        }

        pb.finish_and_clear();
        Ok(table)
    }
}

/// Put the captured output of a failed trial in the log before aborting.
fn log_failure(error: &TrialError) {
    let (stdout, stderr) = match error {
        TrialError::TargetFailed { stdout, stderr, .. } => (stdout.as_str(), stderr.as_str()),
        TrialError::Metrics { stdout, .. } => (stdout.as_str(), ""),
        _ => return,
    };
    for line in tail(stdout, 20) {
        tracing::warn!("[stdout] {}", line);
    }
    for line in tail(stderr, 20) {
        tracing::warn!("[stderr] {}", line);
    }
}

fn tail(text: &str, n: usize) -> impl Iterator<Item = &str> {
    let lines: Vec<&str> = text.lines().collect();
    let skip = lines.len().saturating_sub(n);
    lines.into_iter().skip(skip)
}
