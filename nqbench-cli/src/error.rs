//! Harness-level errors and their process exit codes.

use crate::config::ConfigError;
use crate::executor::TrialError;
use nqbench_core::BuildError;
use nqbench_report::ReportError;
use thiserror::Error;

/// Anything that aborts a harness command
#[derive(Debug, Error)]
pub enum HarnessError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Build(#[from] BuildError),

    #[error(transparent)]
    Trial(#[from] TrialError),

    #[error(transparent)]
    Report(#[from] ReportError),
}

impl HarnessError {
    /// Process exit code: the failing command's own code when there is one,
    /// otherwise 1.
    pub fn exit_code(&self) -> i32 {
        let code = match self {
            HarnessError::Build(e) => e.exit_code(),
            HarnessError::Trial(e) => e.exit_code(),
            HarnessError::Config(_) | HarnessError::Report(_) => None,
        };
        code.filter(|&c| c != 0).unwrap_or(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_codes() {
        let build = HarnessError::Build(BuildError::StepFailed {
            command: "make".to_string(),
            code: Some(2),
        });
        assert_eq!(build.exit_code(), 2);
        assert_eq!(build.to_string(), "Command failed with exit code 2: make");

        let signalled = HarnessError::Build(BuildError::StepFailed {
            command: "make".to_string(),
            code: None,
        });
        assert_eq!(signalled.exit_code(), 1);

        let config = HarnessError::Config(ConfigError::Sweep("no board sizes given".to_string()));
        assert_eq!(config.exit_code(), 1);
    }
}
