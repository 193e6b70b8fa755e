#![warn(missing_docs)]
//! nqbench IPC Protocol
//!
//! rkyv-framed messages exchanged between the harness (supervisor) and the
//! short-lived measurement worker it spawns for every trial.

mod framing;
mod messages;

pub use framing::{FrameError, FrameReader, FrameWriter, MAX_FRAME_SIZE, read_frame, write_frame};
pub use messages::{
    EnvVar, FailureKind, MeasureRequest, RawOutcome, SupervisorCommand, WorkerCapabilities,
    WorkerMessage,
};

/// Protocol version for compatibility checking
pub const PROTOCOL_VERSION: u32 = 1;

/// Environment variable naming the inherited `<read_fd>,<write_fd>` pair
pub const IPC_FD_ENV: &str = "NQBENCH_IPC_FD";

/// Hidden CLI flag that switches the harness binary into worker mode
pub const WORKER_FLAG: &str = "--nqbench-worker";
