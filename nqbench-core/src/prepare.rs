//! Build-if-missing Preparation
//!
//! A [`BuildPlan`] names the terminal artifact an implementation needs and the
//! external steps that produce it. [`BuildPlan::ensure`] is idempotent: once
//! the artifact exists nothing runs again, even if intermediate outputs are
//! stale. There is no dependency tracking.

use crate::tool::{ToolCommand, ToolRunner, shell_join};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors raised while preparing an implementation
#[derive(Debug, Error)]
pub enum BuildError {
    #[error("Command failed to start: {command}: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Command failed with {}: {command}", .code.map(|c| format!("exit code {c}")).unwrap_or_else(|| "a signal".to_string()))]
    StepFailed { command: String, code: Option<i32> },

    #[error("Failed to mark {} executable: {source}", .path.display())]
    Permissions {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Build finished but artifact is still missing: {}", .path.display())]
    ArtifactMissing { path: PathBuf },

    #[error("Build steps given without a terminal artifact")]
    NoArtifact,
}

impl BuildError {
    /// Exit code of the failing step, when it exited normally.
    pub fn exit_code(&self) -> Option<i32> {
        match self {
            BuildError::StepFailed { code, .. } => *code,
            _ => None,
        }
    }
}

/// One external build step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildStep {
    /// The command to run
    pub command: ToolCommand,
    /// Skip this step when the path already exists (e.g. `config.status`)
    pub creates: Option<PathBuf>,
}

impl BuildStep {
    pub fn new(command: ToolCommand) -> Self {
        Self {
            command,
            creates: None,
        }
    }

    pub fn creates(mut self, path: impl Into<PathBuf>) -> Self {
        self.creates = Some(path.into());
        self
    }

    fn is_satisfied(&self) -> bool {
        self.creates.as_deref().is_some_and(Path::exists)
    }
}

/// How a preparation call ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrepareOutcome {
    /// The terminal artifact was already present (or nothing needs building)
    Ready,
    /// Build steps ran; `steps_run` excludes steps skipped via `creates`
    Built { steps_run: usize },
}

/// Steps that produce an implementation's terminal artifact.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildPlan {
    /// Path whose presence means "ready"
    pub artifact: Option<PathBuf>,
    /// Scripts that must be executable before the first step runs
    pub executable: Vec<PathBuf>,
    /// Ordered build steps
    pub steps: Vec<BuildStep>,
}

impl BuildPlan {
    /// A plan with nothing to build (e.g. a solver already on `PATH`).
    pub fn none() -> Self {
        Self::default()
    }

    pub fn new(artifact: impl Into<PathBuf>) -> Self {
        Self {
            artifact: Some(artifact.into()),
            ..Self::default()
        }
    }

    pub fn executable(mut self, path: impl Into<PathBuf>) -> Self {
        self.executable.push(path.into());
        self
    }

    pub fn step(mut self, step: BuildStep) -> Self {
        self.steps.push(step);
        self
    }

    /// Whether the terminal artifact is already in place.
    pub fn is_ready(&self) -> bool {
        match &self.artifact {
            Some(artifact) => artifact.exists(),
            None => self.steps.is_empty(),
        }
    }

    /// Make sure the artifact exists, building it if necessary.
    ///
    /// A plan with steps but no artifact is refused before anything runs.
    pub fn ensure(&self, runner: &dyn ToolRunner) -> Result<PrepareOutcome, BuildError> {
        if self.artifact.is_none() && !self.steps.is_empty() {
            return Err(BuildError::NoArtifact);
        }
        if self.is_ready() {
            return Ok(PrepareOutcome::Ready);
        }

        for script in &self.executable {
            mark_executable(script)?;
        }

        let mut steps_run = 0;
        for step in &self.steps {
            if step.is_satisfied() {
                tracing::debug!(
                    "[build] skipping {} ({} exists)",
                    step.command,
                    step.creates.as_deref().unwrap_or(Path::new("")).display()
                );
                continue;
            }
            run_step(runner, &step.command)?;
            steps_run += 1;
        }

        if let Some(artifact) = &self.artifact {
            if !artifact.exists() {
                return Err(BuildError::ArtifactMissing {
                    path: artifact.clone(),
                });
            }
        }

        Ok(PrepareOutcome::Built { steps_run })
    }
}

fn run_step(runner: &dyn ToolRunner, command: &ToolCommand) -> Result<(), BuildError> {
    tracing::info!("[build] {}$ {}", command.cwd.display(), shell_join(&command.argv));

    let output = runner.run(command).map_err(|source| BuildError::Spawn {
        command: command.to_string(),
        source,
    })?;

    if !output.success() {
        for line in tail_lines(&output.stderr, 20) {
            tracing::warn!("[build] {}", line);
        }
        return Err(BuildError::StepFailed {
            command: command.to_string(),
            code: output.code,
        });
    }

    tracing::debug!(
        "[build] ok ({} bytes stdout, {} bytes stderr)",
        output.stdout.len(),
        output.stderr.len()
    );
    Ok(())
}

fn tail_lines(text: &str, n: usize) -> impl Iterator<Item = &str> {
    let lines: Vec<&str> = text.lines().collect();
    let skip = lines.len().saturating_sub(n);
    lines.into_iter().skip(skip)
}

/// Add execute bits for everyone who can read the file. A missing file is left
/// alone; the step that invokes it will fail loudly instead.
#[cfg(unix)]
fn mark_executable(path: &Path) -> Result<(), BuildError> {
    use std::os::unix::fs::PermissionsExt;

    let metadata = match std::fs::metadata(path) {
        Ok(m) => m,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
        Err(source) => {
            return Err(BuildError::Permissions {
                path: path.to_path_buf(),
                source,
            });
        }
    };

    let mode = metadata.permissions().mode();
    if mode & 0o111 == 0o111 {
        return Ok(());
    }

    tracing::debug!("[build] chmod +x {}", path.display());
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(mode | 0o111)).map_err(
        |source| BuildError::Permissions {
            path: path.to_path_buf(),
            source,
        },
    )
}

#[cfg(not(unix))]
fn mark_executable(_path: &Path) -> Result<(), BuildError> {
    Ok(())
}
