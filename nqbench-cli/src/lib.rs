//! nqbench CLI Library
//!
//! Command-line front end of the harness: configuration loading, the
//! supervisor that owns the measurement workers, the sweep driver and the
//! result output. The `nqbench` binary is a thin wrapper around [`run`].
//!
//! The same binary doubles as the measurement worker: the supervisor
//! re-executes it with the hidden `--nqbench-worker` flag.

mod config;
mod error;
mod executor;
mod planner;
mod supervisor;

pub use config::*;
pub use error::HarnessError;
pub use executor::{
    Executor, Measure, TrialError, build_report_meta, format_human_summary,
    format_implementation_list, measure_request, prepare_all, run_trial,
};
pub use planner::{SweepPlan, build_plan};
pub use supervisor::*;

use clap::{Parser, Subcommand};
use nqbench_core::{Placeholders, SystemToolRunner, WorkerMain};
use nqbench_report::{OutputFormat, ResultReport, read_csv, write_csv, write_json};
use regex::Regex;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

/// nqbench CLI arguments
#[derive(Parser, Debug)]
#[command(name = "nqbench")]
#[command(
    author,
    version,
    about = "nqbench - isolated, resource-measured N-Queens solver benchmarks"
)]
pub struct Cli {
    /// Optional subcommand; defaults to Run
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Board sizes to benchmark (default: 4 5 ... 12)
    #[arg(long, num_args = 1.., global = true)]
    pub sizes: Option<Vec<u32>>,

    /// Worker-count hint for multi-threaded solvers (0 = autodetect)
    #[arg(long, global = true)]
    pub workers: Option<u32>,

    /// Result table path (default: results/nqueens_metrics.csv under the root)
    #[arg(short, long, global = true)]
    pub output: Option<PathBuf>,

    /// Output format: csv, json
    #[arg(long, global = true)]
    pub format: Option<String>,

    /// Configuration file (default: nearest nqbench.toml)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Benchmark root directory
    #[arg(long, global = true)]
    pub root: Option<PathBuf>,

    /// Only benchmark implementations whose name matches this regex
    #[arg(long, global = true)]
    pub only: Option<String>,

    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Internal: Run as measurement worker (used by supervisor)
    #[arg(long, hide = true)]
    pub nqbench_worker: bool,
}

/// CLI subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Prepare every implementation, run the sweep and write the table (default)
    Run,
    /// List the active implementations and the command each would run
    List,
    /// Prepare every implementation and exit
    Prepare,
    /// Print the summary of an existing result table
    Summary {
        /// CSV result table to summarize
        #[arg(name = "CSV")]
        path: PathBuf,
    },
    /// Write the default configuration to nqbench.toml
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

/// Run the nqbench CLI with the process arguments.
pub fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();
    run_with_cli(cli)
}

/// Run the nqbench CLI with pre-parsed arguments.
pub fn run_with_cli(cli: Cli) -> anyhow::Result<()> {
    // Worker mode first: no logging, no configuration.
    if cli.nqbench_worker {
        return run_worker_mode();
    }

    let default_filter = if cli.verbose {
        "nqbench=debug"
    } else {
        "nqbench=info"
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();

    let cwd = std::env::current_dir()?;

    match cli.command {
        Some(Commands::List) => list_implementations(&cli, &cwd)?,
        Some(Commands::Prepare) => prepare_implementations(&cli, &cwd)?,
        Some(Commands::Summary { ref path }) => print_summary(&cwd.join(path))?,
        Some(Commands::Init { force }) => init_config(&cli, &cwd, force)?,
        Some(Commands::Run) | None => run_sweep(&cli, &cwd)?,
    }

    Ok(())
}

/// Exit code for an error returned by [`run`].
pub fn exit_code(error: &anyhow::Error) -> i32 {
    error
        .downcast_ref::<HarnessError>()
        .map(HarnessError::exit_code)
        .unwrap_or(1)
}

/// Run as a worker process (IPC mode)
fn run_worker_mode() -> anyhow::Result<()> {
    let mut worker = WorkerMain::new();
    worker
        .run()
        .map_err(|e| anyhow::anyhow!("Worker error: {}", e))
}

/// Configuration, root and plan for one invocation.
struct Session {
    config: NqConfig,
    root: PathBuf,
    plan: SweepPlan,
}

impl Session {
    fn load(cli: &Cli, cwd: &Path) -> Result<Self, HarnessError> {
        let loaded = NqConfig::resolve(cli.config.as_deref(), cwd)?;
        let root = match (&cli.root, &loaded.config.root) {
            (Some(root), _) => cwd.join(root),
            (None, Some(root)) => loaded.base_dir.join(root),
            (None, None) => loaded.base_dir.clone(),
        };
        tracing::debug!("benchmark root {}", root.display());

        let placeholders = Placeholders::with_detected_jobs(&root);
        let implementations = loaded.config.build_implementations(&placeholders)?;

        let filter = cli
            .only
            .as_deref()
            .map(Regex::new)
            .transpose()
            .map_err(ConfigError::from)?;
        let sizes = cli
            .sizes
            .clone()
            .unwrap_or_else(|| loaded.config.sweep.sizes.clone());
        let workers = cli.workers.unwrap_or(loaded.config.sweep.workers);
        let plan = build_plan(implementations, filter.as_ref(), sizes, workers)?;

        Ok(Self {
            config: loaded.config,
            root,
            plan,
        })
    }

    fn output_path(&self, cli: &Cli, cwd: &Path) -> PathBuf {
        match &cli.output {
            Some(path) => cwd.join(path),
            None => self.root.join(&self.config.sweep.output),
        }
    }

    fn output_format(&self, cli: &Cli) -> Result<OutputFormat, HarnessError> {
        let raw = cli.format.as_deref().unwrap_or(&self.config.sweep.format);
        raw.parse::<OutputFormat>()
            .map_err(|_| HarnessError::Config(ConfigError::Format(raw.to_string())))
    }
}

fn run_sweep(cli: &Cli, cwd: &Path) -> Result<(), HarnessError> {
    let session = Session::load(cli, cwd)?;
    let format = session.output_format(cli)?;
    let output = session.output_path(cli, cwd);

    tracing::debug!(
        "{} implementations x {} sizes, workers={}",
        session.plan.implementations.len(),
        session.plan.sizes.len(),
        session.plan.workers
    );

    let supervisor = Supervisor::new();
    let table = Executor::new(&supervisor).execute(&session.plan, &SystemToolRunner)?;

    match format {
        OutputFormat::Csv => write_csv(&output, &table)?,
        OutputFormat::Json => {
            let meta = build_report_meta(&session.plan, &session.root);
            write_json(&output, &ResultReport::new(meta, &table))?;
        }
    }

    let shown = output.strip_prefix(&session.root).unwrap_or(&output);
    tracing::info!("[done] Results saved to {}", shown.display());
    print!("{}", format_human_summary(&table));

    Ok(())
}

fn list_implementations(cli: &Cli, cwd: &Path) -> Result<(), HarnessError> {
    let session = Session::load(cli, cwd)?;
    print!("{}", format_implementation_list(&session.plan));
    Ok(())
}

fn prepare_implementations(cli: &Cli, cwd: &Path) -> Result<(), HarnessError> {
    let session = Session::load(cli, cwd)?;
    prepare_all(&session.plan.implementations, &SystemToolRunner)?;
    tracing::info!(
        "[done] {} implementations ready",
        session.plan.implementations.len()
    );
    Ok(())
}

fn print_summary(path: &Path) -> Result<(), HarnessError> {
    let table = read_csv(path)?;
    print!("{}", format_human_summary(&table));
    Ok(())
}

fn init_config(cli: &Cli, cwd: &Path, force: bool) -> Result<(), HarnessError> {
    let path = match &cli.config {
        Some(path) => cwd.join(path),
        None => cwd.join(CONFIG_FILE),
    };
    if path.exists() && !force {
        return Err(ConfigError::Exists(path).into());
    }
    nqbench_report::atomic_write(&path, NqConfig::default_toml().as_bytes()).map_err(
        |source| ConfigError::Write {
            path: path.clone(),
            source,
        },
    )?;
    println!("Wrote {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parses_run_flags() {
        let cli = Cli::try_parse_from([
            "nqbench", "--sizes", "4", "5", "--workers", "2", "-o", "out.csv", "--only", "^J",
        ])
        .unwrap();
        assert!(cli.command.is_none());
        assert_eq!(cli.sizes, Some(vec![4, 5]));
        assert_eq!(cli.workers, Some(2));
        assert_eq!(cli.output, Some(PathBuf::from("out.csv")));
        assert_eq!(cli.only.as_deref(), Some("^J"));
        assert!(!cli.nqbench_worker);
    }

    #[test]
    fn test_cli_subcommands() {
        let cli = Cli::try_parse_from(["nqbench", "summary", "results.csv"]).unwrap();
        assert!(matches!(cli.command, Some(Commands::Summary { .. })));

        let cli = Cli::try_parse_from(["nqbench", "init", "--force"]).unwrap();
        assert!(matches!(cli.command, Some(Commands::Init { force: true })));

        let cli = Cli::try_parse_from(["nqbench", "list", "--sizes", "8"]).unwrap();
        assert!(matches!(cli.command, Some(Commands::List)));
        assert_eq!(cli.sizes, Some(vec![8]));
    }

    #[test]
    fn test_worker_flag() {
        let cli = Cli::try_parse_from(["nqbench", nqbench_ipc::WORKER_FLAG]).unwrap();
        assert!(cli.nqbench_worker);
    }

    #[test]
    fn test_session_resolves_root_and_overrides() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join(CONFIG_FILE),
            r#"
root = "bench"

[sweep]
sizes = [6, 7]
workers = 3
format = "json"

[[implementation]]
name = "Echo"
language = "Shell"
command = ["echo", "{size}"]
"#,
        )
        .unwrap();

        let cli = Cli::try_parse_from(["nqbench", "--workers", "1"]).unwrap();
        let session = Session::load(&cli, dir.path()).unwrap();
        assert_eq!(session.root, dir.path().join("bench"));
        assert_eq!(session.plan.sizes, vec![6, 7]);
        assert_eq!(session.plan.workers, 1);
        assert_eq!(session.output_format(&cli).unwrap(), OutputFormat::Json);
        assert_eq!(
            session.output_path(&cli, dir.path()),
            dir.path().join("bench/results/nqueens_metrics.csv")
        );

        let cli = Cli::try_parse_from(["nqbench", "--format", "xml"]).unwrap();
        let session = Session::load(&cli, dir.path()).unwrap();
        assert!(session.output_format(&cli).is_err());
    }

    #[test]
    fn test_bad_only_pattern_is_config_error() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join(CONFIG_FILE),
            "[[implementation]]\nname = \"A\"\ncommand = [\"a\"]\n",
        )
        .unwrap();
        let cli = Cli::try_parse_from(["nqbench", "--only", "("]).unwrap();
        let err = Session::load(&cli, dir.path()).err().unwrap();
        assert!(matches!(err, HarnessError::Config(ConfigError::Filter(_))));
        assert_eq!(err.exit_code(), 1);
    }
}
