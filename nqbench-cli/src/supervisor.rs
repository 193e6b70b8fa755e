//! Supervisor Process
//!
//! Spawns one measurement worker per trial and collects its single report.

use crate::executor::Measure;
use nqbench_ipc::{
    FailureKind, FrameError, FrameReader, FrameWriter, IPC_FD_ENV, MeasureRequest,
    PROTOCOL_VERSION, RawOutcome, SupervisorCommand, WORKER_FLAG, WorkerMessage,
};
use std::env;
use std::os::unix::io::{FromRawFd, RawFd};
use std::os::unix::process::CommandExt;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};
use thiserror::Error;

/// Measurement apparatus failures. None of these say anything about the
/// target command itself.
#[derive(Debug, Error)]
pub enum SupervisorError {
    #[error("Failed to spawn measurement worker: {0}")]
    SpawnFailed(#[from] std::io::Error),

    #[error("IPC error: {0}")]
    IpcError(String),

    #[error("Measurement worker crashed: {0}")]
    WorkerCrashed(String),

    #[error("Worker protocol error: expected {expected}, got {got}")]
    ProtocolError { expected: String, got: String },

    #[error("Measurement worker exited with {0}")]
    WorkerExit(ExitStatus),

    #[error("Could not launch target: {0}")]
    Launch(String),

    #[error("Worker rejected request: {0}")]
    InvalidRequest(String),
}

impl From<FrameError> for SupervisorError {
    fn from(e: FrameError) -> Self {
        SupervisorError::IpcError(e.to_string())
    }
}

/// Create a pipe pair, returning (read_fd, write_fd).
fn create_pipe() -> Result<(RawFd, RawFd), std::io::Error> {
    let mut fds = [0 as RawFd; 2];
    let ret = unsafe { libc::pipe(fds.as_mut_ptr()) };
    if ret != 0 {
        return Err(std::io::Error::last_os_error());
    }
    // Close-on-exec everywhere; the child re-enables it on its own two ends.
    for &fd in &fds {
        unsafe {
            let flags = libc::fcntl(fd, libc::F_GETFD);
            libc::fcntl(fd, libc::F_SETFD, flags | libc::FD_CLOEXEC);
        }
    }
    Ok((fds[0], fds[1]))
}

fn close_fd(fd: RawFd) {
    unsafe {
        libc::close(fd);
    }
}

/// Worker process handle. Single use: one handshake, one measurement.
pub struct WorkerHandle {
    child: Child,
    reader: FrameReader<std::fs::File>,
    writer: FrameWriter<std::fs::File>,
}

impl WorkerHandle {
    /// Spawn a new worker from the running executable, using fd 3/4 for IPC.
    pub fn spawn() -> Result<Self, SupervisorError> {
        let binary = env::current_exe().map_err(SupervisorError::SpawnFailed)?;
        Self::spawn_binary(&binary)
    }

    /// Spawn a worker from a specific binary.
    pub fn spawn_binary(binary: &Path) -> Result<Self, SupervisorError> {
        // cmd_pipe: supervisor writes commands → worker reads from fd 3
        let (cmd_read, cmd_write) = create_pipe()?;
        // msg_pipe: worker writes messages from fd 4 → supervisor reads
        let (msg_read, msg_write) = match create_pipe() {
            Ok(fds) => fds,
            Err(e) => {
                close_fd(cmd_read);
                close_fd(cmd_write);
                return Err(SupervisorError::SpawnFailed(e));
            }
        };

        let mut command = Command::new(binary);
        command
            .arg(WORKER_FLAG)
            .env(IPC_FD_ENV, "3,4")
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::inherit());

        // In the child: drop the parent's ends first (they may already sit
        // on 3 or 4), then dup cmd_read→3 and msg_write→4.
        unsafe {
            command.pre_exec(move || {
                libc::close(cmd_write);
                libc::close(msg_read);

                // fd 3 is about to be claimed; move the message end clear of it.
                let mut msg_fd = msg_write;
                if msg_fd == 3 {
                    msg_fd = libc::fcntl(msg_fd, libc::F_DUPFD, 5);
                    if msg_fd < 0 {
                        return Err(std::io::Error::last_os_error());
                    }
                }

                if cmd_read != 3 {
                    if libc::dup2(cmd_read, 3) < 0 {
                        return Err(std::io::Error::last_os_error());
                    }
                    libc::close(cmd_read);
                }
                let flags = libc::fcntl(3, libc::F_GETFD);
                libc::fcntl(3, libc::F_SETFD, flags & !libc::FD_CLOEXEC);

                if msg_fd != 4 {
                    if libc::dup2(msg_fd, 4) < 0 {
                        return Err(std::io::Error::last_os_error());
                    }
                    libc::close(msg_fd);
                }
                let flags = libc::fcntl(4, libc::F_GETFD);
                libc::fcntl(4, libc::F_SETFD, flags & !libc::FD_CLOEXEC);

                Ok(())
            });
        }

        let child = match command.spawn() {
            Ok(c) => c,
            Err(e) => {
                close_fd(cmd_read);
                close_fd(cmd_write);
                close_fd(msg_read);
                close_fd(msg_write);
                return Err(SupervisorError::SpawnFailed(e));
            }
        };

        // The child owns these now; keeping them open would hide its EOF.
        close_fd(cmd_read);
        close_fd(msg_write);

        let writer_file = unsafe { std::fs::File::from_raw_fd(cmd_write) };
        let reader_file = unsafe { std::fs::File::from_raw_fd(msg_read) };

        let mut handle = Self {
            child,
            reader: FrameReader::new(reader_file),
            writer: FrameWriter::new(writer_file),
        };

        handle.wait_for_hello()?;
        Ok(handle)
    }

    /// Wait for Hello message from worker and validate protocol version
    fn wait_for_hello(&mut self) -> Result<(), SupervisorError> {
        let msg: WorkerMessage = self.read_message("Hello")?;

        match msg {
            WorkerMessage::Hello(caps) => {
                if caps.protocol_version != PROTOCOL_VERSION {
                    return Err(SupervisorError::ProtocolError {
                        expected: format!("protocol version {}", PROTOCOL_VERSION),
                        got: format!("protocol version {}", caps.protocol_version),
                    });
                }
                tracing::debug!(
                    "worker pid={} cpus={} ready",
                    caps.pid,
                    caps.cpu_count
                );
                Ok(())
            }
            other => Err(SupervisorError::ProtocolError {
                expected: "Hello".to_string(),
                got: format!("{:?}", other),
            }),
        }
    }

    /// Read one message. Blocks without a timeout; end of stream means the
    /// worker died before reporting.
    fn read_message(&mut self, expected: &str) -> Result<WorkerMessage, SupervisorError> {
        match self.reader.read::<WorkerMessage>() {
            Ok(msg) => Ok(msg),
            Err(FrameError::EndOfStream) => {
                let status = self.child.wait().map_err(SupervisorError::SpawnFailed)?;
                Err(SupervisorError::WorkerCrashed(format!(
                    "exited with {} before sending {}",
                    status, expected
                )))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Launch and measure one command, consuming the worker.
    pub fn measure(mut self, request: &MeasureRequest) -> Result<RawOutcome, SupervisorError> {
        self.writer
            .write(&SupervisorCommand::Measure(request.clone()))?;

        let reply = self.read_message("Outcome")?;

        let status = self.child.wait().map_err(SupervisorError::SpawnFailed)?;

        match reply {
            WorkerMessage::Outcome(outcome) => {
                if !status.success() {
                    return Err(SupervisorError::WorkerExit(status));
                }
                Ok(outcome)
            }
            WorkerMessage::Failure {
                kind: FailureKind::Launch,
                message,
            } => Err(SupervisorError::Launch(message)),
            WorkerMessage::Failure {
                kind: FailureKind::InvalidRequest,
                message,
            } => Err(SupervisorError::InvalidRequest(message)),
            WorkerMessage::Hello(_) => Err(SupervisorError::ProtocolError {
                expected: "Outcome/Failure".to_string(),
                got: "Hello".to_string(),
            }),
        }
    }

    /// Check if worker process is still running
    pub fn is_alive(&mut self) -> bool {
        matches!(self.child.try_wait(), Ok(None))
    }
}

impl Drop for WorkerHandle {
    fn drop(&mut self) {
        if self.is_alive() {
            let _ = self.child.kill();
            let _ = self.child.wait();
        }
    }
}

/// Runs every trial in a freshly spawned worker process.
#[derive(Debug, Clone, Default)]
pub struct Supervisor {
    binary: Option<PathBuf>,
}

impl Supervisor {
    /// Workers are re-executions of the running binary.
    pub fn new() -> Self {
        Self::default()
    }

    /// Workers are spawned from `binary` (for testing).
    pub fn with_binary(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: Some(binary.into()),
        }
    }

    fn spawn_worker(&self) -> Result<WorkerHandle, SupervisorError> {
        match &self.binary {
            Some(binary) => WorkerHandle::spawn_binary(binary),
            None => WorkerHandle::spawn(),
        }
    }
}

impl Measure for Supervisor {
    fn measure(&self, request: &MeasureRequest) -> Result<RawOutcome, SupervisorError> {
        self.spawn_worker()?.measure(request)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_worker_binary_is_spawn_failure() {
        let supervisor = Supervisor::with_binary("/nonexistent/nqbench-worker");
        let request = MeasureRequest {
            argv: vec!["true".to_string()],
            workdir: "/".to_string(),
            env: Vec::new(),
        };
        assert!(matches!(
            supervisor.measure(&request),
            Err(SupervisorError::SpawnFailed(_))
        ));
    }

    #[test]
    fn test_worker_that_never_speaks_is_a_crash() {
        // `true` ignores the protocol and exits: no Hello ever arrives.
        let err = WorkerHandle::spawn_binary(Path::new("true")).err();
        assert!(matches!(err, Some(SupervisorError::WorkerCrashed(_))));
    }
}
