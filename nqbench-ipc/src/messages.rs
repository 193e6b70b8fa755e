//! IPC Message Types
//!
//! One measurement is one exchange: `Hello` from the worker, a `Measure`
//! command from the supervisor, then exactly one `Outcome` or `Failure`.

use rkyv::{Archive, Deserialize as RkyvDeserialize, Serialize as RkyvSerialize};

/// Environment override applied on top of the worker's inherited environment.
#[derive(Debug, Clone, PartialEq, Eq, Archive, RkyvSerialize, RkyvDeserialize)]
#[archive(check_bytes)]
pub struct EnvVar {
    /// Variable name
    pub key: String,
    /// Value to set
    pub value: String,
}

/// A single command to launch and measure.
#[derive(Debug, Clone, PartialEq, Eq, Archive, RkyvSerialize, RkyvDeserialize)]
#[archive(check_bytes)]
pub struct MeasureRequest {
    /// Program followed by its arguments
    pub argv: Vec<String>,
    /// Working directory for the target
    pub workdir: String,
    /// Overrides merged over the inherited environment
    pub env: Vec<EnvVar>,
}

/// Everything the worker observed about one target execution.
#[derive(Debug, Clone, PartialEq, Archive, RkyvSerialize, RkyvDeserialize)]
#[archive(check_bytes)]
pub struct RawOutcome {
    /// Exit code, `None` when the target was terminated by a signal
    pub exit_code: Option<i32>,
    /// Terminating signal, if any
    pub signal: Option<i32>,
    /// Captured standard output (lossy UTF-8)
    pub stdout: String,
    /// Captured standard error (lossy UTF-8)
    pub stderr: String,
    /// Wall-clock seconds from just before launch to exit
    pub elapsed_seconds: f64,
    /// Peak resident set size of the worker's reaped children, in kilobytes
    pub peak_rss_kb: u64,
}

impl RawOutcome {
    /// Whether the target exited normally with status zero
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }
}

/// Worker capabilities advertised during handshake
#[derive(Debug, Clone, Archive, RkyvSerialize, RkyvDeserialize)]
#[archive(check_bytes)]
pub struct WorkerCapabilities {
    /// Protocol version for compatibility
    pub protocol_version: u32,
    /// Process id of the worker
    pub pid: u32,
    /// Number of logical CPUs available
    pub cpu_count: u32,
}

impl Default for WorkerCapabilities {
    fn default() -> Self {
        Self {
            protocol_version: crate::PROTOCOL_VERSION,
            pid: std::process::id(),
            cpu_count: std::thread::available_parallelism()
                .map(|p| p.get() as u32)
                .unwrap_or(1),
        }
    }
}

/// Categories of worker-side failures
#[derive(Debug, Clone, Copy, PartialEq, Eq, Archive, RkyvSerialize, RkyvDeserialize)]
#[archive(check_bytes)]
pub enum FailureKind {
    /// The target command could not be started
    Launch,
    /// The request itself was unusable (e.g. empty argv)
    InvalidRequest,
}

/// Messages sent from Worker to Supervisor
#[derive(Debug, Clone, Archive, RkyvSerialize, RkyvDeserialize)]
#[archive(check_bytes)]
pub enum WorkerMessage {
    /// Initial handshake
    Hello(WorkerCapabilities),

    /// The target ran to completion (with any exit status)
    Outcome(RawOutcome),

    /// The target never ran
    Failure {
        /// Error category
        kind: FailureKind,
        /// Human-readable error message
        message: String,
    },
}

/// Commands sent from Supervisor to Worker
#[derive(Debug, Clone, Archive, RkyvSerialize, RkyvDeserialize)]
#[archive(check_bytes)]
pub enum SupervisorCommand {
    /// Launch and measure one command, then exit
    Measure(MeasureRequest),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outcome_success_requires_zero_exit() {
        let mut outcome = RawOutcome {
            exit_code: Some(0),
            signal: None,
            stdout: String::new(),
            stderr: String::new(),
            elapsed_seconds: 0.0,
            peak_rss_kb: 0,
        };
        assert!(outcome.success());

        outcome.exit_code = Some(3);
        assert!(!outcome.success());

        outcome.exit_code = None;
        outcome.signal = Some(9);
        assert!(!outcome.success());
    }

    #[test]
    fn test_worker_capabilities_default() {
        let caps = WorkerCapabilities::default();
        assert_eq!(caps.protocol_version, crate::PROTOCOL_VERSION);
        assert_eq!(caps.pid, std::process::id());
        assert!(caps.cpu_count >= 1);
    }
}
