//! Measurement Worker
//!
//! The worker side of the supervisor-worker split. The harness re-executes its
//! own binary with `--nqbench-worker`; that process launches exactly one
//! target command, waits for it, and reports wall-clock time and the peak RSS
//! of its reaped children. Because the target is the worker's only child,
//! `RUSAGE_CHILDREN` describes the target and its descendants and nothing the
//! harness itself allocated.
//!
//! On Unix the IPC pipes arrive as fd 3/4 (`NQBENCH_IPC_FD`); otherwise the
//! worker falls back to stdin/stdout.

use nqbench_ipc::{
    FailureKind, FrameError, FrameReader, FrameWriter, IPC_FD_ENV, MeasureRequest, RawOutcome,
    SupervisorCommand, WorkerCapabilities, WorkerMessage,
};
use std::process::{Command, Stdio};
use std::time::Instant;

#[cfg(unix)]
use std::os::unix::io::FromRawFd;

/// Bytes of each captured stream sent back to the supervisor. Longer output
/// keeps its tail, where the metrics line is. Even if every kept byte decodes
/// to a replacement character, both streams together stay under
/// [`nqbench_ipc::MAX_FRAME_SIZE`].
pub const MAX_CAPTURED_BYTES: usize = 8 * 1024 * 1024;

/// IPC transport: either inherited fd pair or stdin/stdout fallback.
enum IpcTransport {
    #[cfg(unix)]
    Fds { read_fd: i32, write_fd: i32 },
    Stdio,
}

fn detect_transport() -> IpcTransport {
    #[cfg(unix)]
    if let Ok(val) = std::env::var(IPC_FD_ENV) {
        let parts: Vec<&str> = val.split(',').collect();
        if parts.len() == 2 {
            if let (Ok(r), Ok(w)) = (parts[0].parse::<i32>(), parts[1].parse::<i32>()) {
                return IpcTransport::Fds {
                    read_fd: r,
                    write_fd: w,
                };
            }
        }
        eprintln!(
            "nqbench: warning: invalid {IPC_FD_ENV}={val:?} (expected <read_fd>,<write_fd>), falling back to stdio"
        );
    }
    IpcTransport::Stdio
}

/// Keep the IPC pipes out of the measured target: if the target inherited the
/// message pipe, a crashed worker would never produce EOF for the supervisor.
#[cfg(unix)]
fn set_cloexec(fd: i32) {
    unsafe {
        let flags = libc::fcntl(fd, libc::F_GETFD);
        if flags >= 0 {
            libc::fcntl(fd, libc::F_SETFD, flags | libc::FD_CLOEXEC);
        }
    }
}

/// Worker main loop
pub struct WorkerMain {
    reader: FrameReader<Box<dyn std::io::Read>>,
    writer: FrameWriter<Box<dyn std::io::Write>>,
}

impl WorkerMain {
    /// Create a worker on fd 3/4 if `NQBENCH_IPC_FD` is set, otherwise stdin/stdout.
    pub fn new() -> Self {
        match detect_transport() {
            #[cfg(unix)]
            IpcTransport::Fds { read_fd, write_fd } => {
                set_cloexec(read_fd);
                set_cloexec(write_fd);
                let read_file = unsafe { std::fs::File::from_raw_fd(read_fd) };
                let write_file = unsafe { std::fs::File::from_raw_fd(write_fd) };
                Self {
                    reader: FrameReader::new(Box::new(read_file) as Box<dyn std::io::Read>),
                    writer: FrameWriter::new(Box::new(write_file) as Box<dyn std::io::Write>),
                }
            }
            IpcTransport::Stdio => Self {
                reader: FrameReader::new(Box::new(std::io::stdin()) as Box<dyn std::io::Read>),
                writer: FrameWriter::new(Box::new(std::io::stdout()) as Box<dyn std::io::Write>),
            },
        }
    }

    /// Handshake, serve a single command, exit.
    pub fn run(&mut self) -> Result<(), FrameError> {
        self.writer
            .write(&WorkerMessage::Hello(WorkerCapabilities::default()))?;

        let SupervisorCommand::Measure(request) = self.reader.read::<SupervisorCommand>()?;
        self.writer.write(&measure(&request))?;

        Ok(())
    }
}

impl Default for WorkerMain {
    fn default() -> Self {
        Self::new()
    }
}

/// Launch the requested command and describe how it went.
pub fn measure(request: &MeasureRequest) -> WorkerMessage {
    let Some((program, args)) = request.argv.split_first() else {
        return WorkerMessage::Failure {
            kind: FailureKind::InvalidRequest,
            message: "empty command".to_string(),
        };
    };

    let mut command = Command::new(program);
    command
        .args(args)
        .current_dir(&request.workdir)
        .env_remove(IPC_FD_ENV)
        .envs(request.env.iter().map(|var| (&var.key, &var.value)))
        .stdin(Stdio::null());

    let start = Instant::now();
    let output = match command.output() {
        Ok(output) => output,
        Err(e) => {
            return WorkerMessage::Failure {
                kind: FailureKind::Launch,
                message: format!("failed to launch {}: {}", program, e),
            };
        }
    };
    let elapsed_seconds = start.elapsed().as_secs_f64();

    WorkerMessage::Outcome(RawOutcome {
        exit_code: output.status.code(),
        signal: exit_signal(&output.status),
        stdout: captured_tail(&output.stdout, MAX_CAPTURED_BYTES),
        stderr: captured_tail(&output.stderr, MAX_CAPTURED_BYTES),
        elapsed_seconds,
        peak_rss_kb: children_peak_rss_kb(),
    })
}

fn captured_tail(bytes: &[u8], cap: usize) -> String {
    let start = bytes.len().saturating_sub(cap);
    if start > 0 {
        tracing::debug!("captured output truncated to its last {} bytes", cap);
    }
    String::from_utf8_lossy(&bytes[start..]).into_owned()
}

#[cfg(unix)]
fn exit_signal(status: &std::process::ExitStatus) -> Option<i32> {
    use std::os::unix::process::ExitStatusExt;
    status.signal()
}

#[cfg(not(unix))]
fn exit_signal(_status: &std::process::ExitStatus) -> Option<i32> {
    None
}

/// Peak RSS over all reaped children of this process, in kilobytes.
#[cfg(unix)]
pub fn children_peak_rss_kb() -> u64 {
    let mut usage: libc::rusage = unsafe { std::mem::zeroed() };
    let ret = unsafe { libc::getrusage(libc::RUSAGE_CHILDREN, &mut usage) };
    if ret != 0 {
        return 0;
    }
    let max_rss = usage.ru_maxrss.max(0) as u64;
    // macOS reports bytes, Linux and the BSDs kilobytes.
    if cfg!(target_os = "macos") {
        max_rss / 1024
    } else {
        max_rss
    }
}

#[cfg(not(unix))]
pub fn children_peak_rss_kb() -> u64 {
    0
}
