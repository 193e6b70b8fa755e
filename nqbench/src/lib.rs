#![warn(missing_docs)]
//! # nqbench
//!
//! Benchmark harness for N-Queens solver implementations written in different
//! languages against different BDD libraries.
//!
//! - **Preparation**: each implementation declares the build steps that turn
//!   its sources into a runnable artifact; steps run once per sweep, skipped
//!   when their outputs already exist
//! - **Process Isolation**: every trial runs in a fresh worker process so peak
//!   RSS is attributed to exactly one solver invocation
//! - **Metrics Protocol**: solvers report `NQUEENS_METRICS n=<N>
//!   solutions=<S> nodes=<K>` on stdout; a run without it is a failed trial
//! - **Result Table**: one row per (implementation, size), written atomically
//!   as CSV or JSON
//!
//! ## Configuration
//!
//! ```toml
//! [sweep]
//! sizes = [4, 5, 6, 7, 8]
//!
//! [[implementation]]
//! name = "BuDDy"
//! language = "C"
//! workdir = "buddy"
//! command = ["./nqueens", "{size}"]
//!
//! [implementation.prepare]
//! artifact = "nqueens"
//! steps = [{ command = ["make"] }]
//! ```
//!
//! Without an `nqbench.toml`, the built-in presets are used (`nqbench init`
//! writes them out for editing).

// Re-export core types
pub use nqbench_core::{
    BuildError, BuildPlan, BuildStep, CommandTemplate, Implementation, ImplementationSet,
    MetricsError, MetricsTriple, Placeholders, SystemToolRunner, ToolCommand, ToolRunner,
    extract_metrics, parse_metrics_line,
};

// Re-export IPC types
pub use nqbench_ipc::{MeasureRequest, RawOutcome};

// Re-export report types
pub use nqbench_report::{
    CSV_COLUMNS, OutputFormat, ReportError, ResultRecord, ResultTable, read_csv, write_csv,
};

// Re-export the harness
pub use nqbench_cli::{
    Cli, Commands, ConfigError, Executor, HarnessError, Measure, NqConfig, Supervisor,
    SweepPlan, TrialError, build_plan,
};

/// Run the nqbench CLI harness.
///
/// This is the whole of the `nqbench` binary's `main()`:
/// ```ignore
/// fn main() {
///     if let Err(e) = nqbench::run() {
///         eprintln!("[error] {}", e);
///         std::process::exit(nqbench::exit_code(&e));
///     }
/// }
/// ```
pub use nqbench_cli::{exit_code, run};
