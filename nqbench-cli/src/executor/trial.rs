//! Single Trial Execution
//!
//! One (implementation, size) pair: render the command, hand it to the
//! isolated measurement apparatus, then check the outcome and pull the
//! metrics line out of the captured output.

use crate::supervisor::SupervisorError;
use nqbench_core::{Implementation, MetricsError, extract_metrics, shell_join};
use nqbench_ipc::{EnvVar, MeasureRequest, RawOutcome};
use nqbench_report::ResultRecord;
use thiserror::Error;

/// Something that can launch a command in isolation and measure it.
pub trait Measure {
    /// Run `request` to completion. `Err` is an apparatus fault, never a
    /// verdict on the target: a target that exits non-zero is still `Ok`.
    fn measure(&self, request: &MeasureRequest) -> Result<RawOutcome, SupervisorError>;
}

/// Errors raised by a single trial
#[derive(Debug, Error)]
pub enum TrialError {
    #[error("{implementation} N={size}: {source}")]
    Apparatus {
        implementation: String,
        size: u32,
        #[source]
        source: SupervisorError,
    },

    #[error("Command failed with {}: {command}", describe_exit(.code, .signal))]
    TargetFailed {
        implementation: String,
        size: u32,
        command: String,
        code: Option<i32>,
        signal: Option<i32>,
        stdout: String,
        stderr: String,
    },

    #[error("{implementation} N={size}: {source}")]
    Metrics {
        implementation: String,
        size: u32,
        stdout: String,
        #[source]
        source: MetricsError,
    },

    #[error("Implementation {implementation} reported size {reported} but expected {expected}")]
    SizeMismatch {
        implementation: String,
        expected: u32,
        reported: u32,
    },
}

impl TrialError {
    /// Exit code of the failed target, when it exited normally.
    pub fn exit_code(&self) -> Option<i32> {
        match self {
            TrialError::TargetFailed { code, .. } => *code,
            _ => None,
        }
    }
}

fn describe_exit(code: &Option<i32>, signal: &Option<i32>) -> String {
    match (code, signal) {
        (Some(code), _) => format!("exit code {}", code),
        (None, Some(signal)) => format!("signal {}", signal),
        (None, None) => "unknown status".to_string(),
    }
}

/// Build the request the worker will execute for one trial.
pub fn measure_request(implementation: &Implementation, size: u32, workers: u32) -> MeasureRequest {
    MeasureRequest {
        argv: implementation.command_for(size, workers),
        workdir: implementation.workdir().display().to_string(),
        env: implementation
            .env_overrides()
            .iter()
            .map(|(key, value)| EnvVar {
                key: key.clone(),
                value: value.clone(),
            })
            .collect(),
    }
}

/// Run one trial and produce its result record.
pub fn run_trial(
    measure: &dyn Measure,
    implementation: &Implementation,
    size: u32,
    workers: u32,
) -> Result<ResultRecord, TrialError> {
    let request = measure_request(implementation, size, workers);
    tracing::debug!(
        "{} N={}: {}$ {}",
        implementation.name(),
        size,
        request.workdir,
        shell_join(&request.argv)
    );

    let outcome = measure
        .measure(&request)
        .map_err(|source| TrialError::Apparatus {
            implementation: implementation.name().to_string(),
            size,
            source,
        })?;

    if !outcome.success() {
        return Err(TrialError::TargetFailed {
            implementation: implementation.name().to_string(),
            size,
            command: shell_join(&request.argv),
            code: outcome.exit_code,
            signal: outcome.signal,
            stdout: outcome.stdout,
            stderr: outcome.stderr,
        });
    }

    let metrics = extract_metrics(&outcome.stdout).map_err(|source| TrialError::Metrics {
        implementation: implementation.name().to_string(),
        size,
        stdout: outcome.stdout.clone(),
        source,
    })?;

    if metrics.size != size {
        return Err(TrialError::SizeMismatch {
            implementation: implementation.name().to_string(),
            expected: size,
            reported: metrics.size,
        });
    }

    tracing::info!(
        "[run] {:10} N={:2} time={:7.3}s rss={:>8}KB nodes={}",
        implementation.name(),
        size,
        outcome.elapsed_seconds,
        outcome.peak_rss_kb,
        metrics.nodes
    );

    Ok(ResultRecord {
        implementation: implementation.name().to_string(),
        language: implementation.language().to_string(),
        size,
        time_sec: outcome.elapsed_seconds,
        max_rss_kb: outcome.peak_rss_kb,
        nodes: metrics.nodes,
        solutions: metrics.solutions,
    })
}
