//! External Tool Invocation
//!
//! Every build toolchain (configure/make, cmake, gradle, maven, a plain
//! compiler) is reached through the single [`ToolRunner`] capability: run a
//! command, hand back its exit status and captured output.

use std::fmt;
use std::path::PathBuf;
use std::process::{Command, Stdio};

/// A fully resolved external command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolCommand {
    /// Program followed by its arguments
    pub argv: Vec<String>,
    /// Working directory
    pub cwd: PathBuf,
    /// Overrides merged over the inherited environment
    pub env: Vec<(String, String)>,
}

impl ToolCommand {
    pub fn new<S: Into<String>>(argv: impl IntoIterator<Item = S>, cwd: impl Into<PathBuf>) -> Self {
        Self {
            argv: argv.into_iter().map(Into::into).collect(),
            cwd: cwd.into(),
            env: Vec::new(),
        }
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }
}

impl fmt::Display for ToolCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&shell_join(&self.argv))
    }
}

/// What a finished tool run reported.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolOutput {
    /// Exit code, `None` if terminated by a signal
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl ToolOutput {
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }
}

/// Run an external command to completion.
///
/// `Err` means the command could not be started at all; a non-zero exit is an
/// `Ok` with an unsuccessful [`ToolOutput`].
pub trait ToolRunner {
    fn run(&self, command: &ToolCommand) -> std::io::Result<ToolOutput>;
}

/// [`ToolRunner`] backed by `std::process::Command`.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemToolRunner;

impl ToolRunner for SystemToolRunner {
    fn run(&self, command: &ToolCommand) -> std::io::Result<ToolOutput> {
        let Some((program, args)) = command.argv.split_first() else {
            return Err(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                "empty command",
            ));
        };

        let output = Command::new(program)
            .args(args)
            .current_dir(&command.cwd)
            .envs(command.env.iter().map(|(k, v)| (k, v)))
            .stdin(Stdio::null())
            .output()?;

        Ok(ToolOutput {
            code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}

/// Join arguments for display, quoting anything a POSIX shell would split.
pub fn shell_join<S: AsRef<str>>(argv: &[S]) -> String {
    argv.iter()
        .map(|arg| shell_quote(arg.as_ref()))
        .collect::<Vec<_>>()
        .join(" ")
}

fn shell_quote(arg: &str) -> String {
    let safe = !arg.is_empty()
        && arg
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "-_./=:,+@%".contains(c));
    if safe {
        arg.to_string()
    } else {
        format!("'{}'", arg.replace('\'', r"'\''"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shell_join_quotes_when_needed() {
        assert_eq!(shell_join(&["make", "-C", "examples/queen"]), "make -C examples/queen");
        assert_eq!(shell_join(&["echo", "a b"]), "echo 'a b'");
        assert_eq!(shell_join(&["echo", "it's"]), r"echo 'it'\''s'");
        assert_eq!(shell_join(&["x", ""]), "x ''");
    }

    #[test]
    fn test_system_runner_captures_output_and_code() {
        let dir = tempfile::tempdir().unwrap();
        let command = ToolCommand::new(
            ["sh", "-c", "echo out; echo err >&2; echo $NQ_TOOL_VAR; exit 3"],
            dir.path(),
        )
        .env("NQ_TOOL_VAR", "scoped");

        let output = SystemToolRunner.run(&command).unwrap();
        assert_eq!(output.code, Some(3));
        assert!(!output.success());
        assert_eq!(output.stdout, "out\nscoped\n");
        assert_eq!(output.stderr, "err\n");
        // Overrides never touch the harness's own environment.
        assert!(std::env::var("NQ_TOOL_VAR").is_err());
    }

    #[test]
    fn test_system_runner_missing_program() {
        let dir = tempfile::tempdir().unwrap();
        let command = ToolCommand::new(["nqbench-definitely-not-a-program"], dir.path());
        assert!(SystemToolRunner.run(&command).is_err());
    }

    #[test]
    fn test_system_runner_empty_argv() {
        let command = ToolCommand::new(Vec::<String>::new(), ".");
        let err = SystemToolRunner.run(&command).unwrap_err();
        assert_eq!(err.kind(), std::io::ErrorKind::InvalidInput);
    }
}
