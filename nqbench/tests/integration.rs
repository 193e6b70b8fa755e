//! Integration tests for nqbench
//!
//! These drive the real `nqbench` binary end to end: configuration
//! discovery, preparation, isolated measurement through the worker
//! re-exec, result output and exit codes. Implementations are small `sh`
//! scripts.

use nqbench::{CSV_COLUMNS, Measure, MeasureRequest, Supervisor, extract_metrics, read_csv};
use std::path::Path;
use std::process::{Command, Output};

fn nqbench(dir: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_nqbench"))
        .args(args)
        .current_dir(dir)
        .env_remove("RUST_LOG")
        .output()
        .expect("failed to launch nqbench")
}

fn write_config(dir: &Path, implementations: &str) {
    std::fs::write(
        dir.join("nqbench.toml"),
        format!("[sweep]\nsizes = [4]\n\n{}", implementations),
    )
    .unwrap();
}

const GOOD: &str = r#"
[[implementation]]
name = "Echo"
language = "Shell"
command = ["sh", "-c", "echo progress; echo NQUEENS_METRICS n=$1 solutions=2 nodes=17", "sh", "{size}"]
"#;

fn stderr_lines(output: &Output) -> Vec<String> {
    String::from_utf8_lossy(&output.stderr)
        .lines()
        .map(str::to_string)
        .collect()
}

/// A two-size sweep writes one row per size, in sweep order
#[test]
fn test_sweep_writes_csv() {
    let dir = tempfile::tempdir().unwrap();
    write_config(dir.path(), GOOD);

    let output = nqbench(dir.path(), &["--sizes", "4", "5"]);
    assert!(output.status.success(), "{:?}", output);
    assert!(output.stderr.is_empty());

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("[run]"));
    assert!(stdout.contains("[done] Results saved to results/nqueens_metrics.csv"));
    assert!(stdout.contains("N = 5"));

    let csv_path = dir.path().join("results/nqueens_metrics.csv");
    let text = std::fs::read_to_string(&csv_path).unwrap();
    assert!(text.starts_with(&CSV_COLUMNS.join(",")));

    let table = read_csv(&csv_path).unwrap();
    let rows = table.records();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].size, 4);
    assert_eq!(rows[1].size, 5);
    for row in rows {
        assert_eq!(row.implementation, "Echo");
        assert_eq!(row.language, "Shell");
        assert_eq!(row.nodes, 17);
        assert_eq!(row.solutions, 2.0);
        assert!(row.time_sec >= 0.0);
    }
}

/// Preparation runs before the first trial and is skipped once the artifact exists
#[test]
fn test_prepare_then_run() {
    let dir = tempfile::tempdir().unwrap();
    write_config(
        dir.path(),
        r#"
[[implementation]]
name = "Built"
language = "Shell"
workdir = "built"
command = ["sh", "solver.sh", "{size}"]

[implementation.prepare]
artifact = "built/solver.sh"

[[implementation.prepare.steps]]
command = ["sh", "-c", "echo 'echo NQUEENS_METRICS n=$1 solutions=2 nodes=3' > solver.sh"]
cwd = "built"
"#,
    );
    std::fs::create_dir(dir.path().join("built")).unwrap();

    let output = nqbench(dir.path(), &["prepare"]);
    assert!(output.status.success(), "{:?}", output);
    assert!(String::from_utf8_lossy(&output.stdout).contains("[build]"));
    assert!(dir.path().join("built/solver.sh").is_file());

    let output = nqbench(dir.path(), &["run"]);
    assert!(output.status.success(), "{:?}", output);
    assert!(!String::from_utf8_lossy(&output.stdout).contains("[build]"));
}

/// A failing target aborts the sweep with its own exit code and no table
#[test]
fn test_failing_target_propagates_exit_code() {
    let dir = tempfile::tempdir().unwrap();
    write_config(
        dir.path(),
        r#"
[[implementation]]
name = "Broken"
command = ["sh", "-c", "echo oops >&2; exit 3"]
"#,
    );

    let output = nqbench(dir.path(), &[]);
    assert_eq!(output.status.code(), Some(3));

    let errors = stderr_lines(&output);
    assert_eq!(errors.len(), 1, "{:?}", errors);
    assert!(errors[0].starts_with("[error] Command failed with exit code 3"));
    assert!(String::from_utf8_lossy(&output.stdout).contains("[stderr] oops"));
    assert!(!dir.path().join("results/nqueens_metrics.csv").exists());
}

/// Output without a metrics line is a failed trial
#[test]
fn test_missing_metrics_line() {
    let dir = tempfile::tempdir().unwrap();
    write_config(
        dir.path(),
        r#"
[[implementation]]
name = "Chatty"
command = ["echo", "hello world"]
"#,
    );

    let output = nqbench(dir.path(), &[]);
    assert_eq!(output.status.code(), Some(1));
    let errors = stderr_lines(&output);
    assert_eq!(errors.len(), 1);
    assert!(errors[0].contains("Failed to parse NQUEENS_METRICS"));
    assert!(!dir.path().join("results/nqueens_metrics.csv").exists());
}

/// A solver that reports a different board size is rejected
#[test]
fn test_size_mismatch() {
    let dir = tempfile::tempdir().unwrap();
    write_config(
        dir.path(),
        r#"
[[implementation]]
name = "Liar"
command = ["echo", "NQUEENS_METRICS n=9 solutions=352 nodes=1"]
"#,
    );

    let output = nqbench(dir.path(), &[]);
    assert_eq!(output.status.code(), Some(1));
    let errors = stderr_lines(&output);
    assert_eq!(
        errors,
        vec!["[error] Implementation Liar reported size 9 but expected 4".to_string()]
    );
}

/// A target that cannot be launched is an apparatus fault
#[test]
fn test_missing_program() {
    let dir = tempfile::tempdir().unwrap();
    write_config(
        dir.path(),
        r#"
[[implementation]]
name = "Ghost"
command = ["./does-not-exist", "{size}"]
"#,
    );

    let output = nqbench(dir.path(), &[]);
    assert_eq!(output.status.code(), Some(1));
    assert_eq!(stderr_lines(&output).len(), 1);
}

/// JSON output carries metadata and the same rows
#[test]
fn test_json_output() {
    let dir = tempfile::tempdir().unwrap();
    write_config(dir.path(), GOOD);

    let output = nqbench(dir.path(), &["--format", "json", "-o", "out/report.json"]);
    assert!(output.status.success(), "{:?}", output);

    let text = std::fs::read_to_string(dir.path().join("out/report.json")).unwrap();
    assert!(text.contains("\"meta\""));
    assert!(text.contains("\"implementation\": \"Echo\""));
    assert!(text.contains("\"nodes\": 17"));
}

/// `--only` narrows the sweep; matching nothing is a configuration error
#[test]
fn test_only_filter() {
    let dir = tempfile::tempdir().unwrap();
    write_config(dir.path(), GOOD);

    let output = nqbench(dir.path(), &["list", "--only", "^Ech"]);
    assert!(output.status.success(), "{:?}", output);
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Echo (Shell)"));
    assert!(stdout.contains("1 implementations, sizes [4]"));

    let output = nqbench(dir.path(), &["list", "--only", "^Nothing$"]);
    assert_eq!(output.status.code(), Some(1));
    assert!(stderr_lines(&output)[0].starts_with("[error]"));
}

/// Board sizes of zero are rejected before anything runs
#[test]
fn test_invalid_sizes() {
    let dir = tempfile::tempdir().unwrap();
    write_config(dir.path(), GOOD);

    let output = nqbench(dir.path(), &["--sizes", "0"]);
    assert_eq!(output.status.code(), Some(1));
    assert!(!dir.path().join("results").exists());
}

/// `summary` re-prints a saved table
#[test]
fn test_summary_of_saved_table() {
    let dir = tempfile::tempdir().unwrap();
    write_config(dir.path(), GOOD);
    assert!(nqbench(dir.path(), &[]).status.success());

    let output = nqbench(dir.path(), &["summary", "results/nqueens_metrics.csv"]);
    assert!(output.status.success(), "{:?}", output);
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("N = 4"));
    assert!(stdout.contains("Echo"));
}

/// `init` writes the presets once and refuses to overwrite without --force
#[test]
fn test_init_writes_presets() {
    let dir = tempfile::tempdir().unwrap();

    let output = nqbench(dir.path(), &["init"]);
    assert!(output.status.success(), "{:?}", output);
    let text = std::fs::read_to_string(dir.path().join("nqbench.toml")).unwrap();
    for name in ["BuDDy", "Sylvan", "CUDD", "JDD", "JSylvan"] {
        assert!(text.contains(name), "missing preset {}", name);
    }

    let output = nqbench(dir.path(), &["init"]);
    assert_eq!(output.status.code(), Some(1));

    let output = nqbench(dir.path(), &["init", "--force"]);
    assert!(output.status.success());
}

/// The configuration is discovered from a subdirectory
#[test]
fn test_config_discovered_from_subdirectory() {
    let dir = tempfile::tempdir().unwrap();
    write_config(dir.path(), GOOD);
    let nested = dir.path().join("a/b");
    std::fs::create_dir_all(&nested).unwrap();

    let output = nqbench(&nested, &["list"]);
    assert!(output.status.success(), "{:?}", output);
    assert!(String::from_utf8_lossy(&output.stdout).contains("Echo"));
}

/// Workers hand back a measured outcome whatever fd numbers the pipes land on
#[test]
fn test_supervisor_measures_through_worker() {
    let dir = tempfile::tempdir().unwrap();
    let supervisor = Supervisor::with_binary(env!("CARGO_BIN_EXE_nqbench"));

    // Hold a few descriptors open between trials so the pipe pairs land on
    // different numbers, including the ones the worker claims (3 and 4).
    let mut held = Vec::new();
    for size in 4..=8u32 {
        let request = MeasureRequest {
            argv: vec![
                "sh".to_string(),
                "-c".to_string(),
                "echo NQUEENS_METRICS n=$1 solutions=1 nodes=$1".to_string(),
                "sh".to_string(),
                size.to_string(),
            ],
            workdir: dir.path().display().to_string(),
            env: Vec::new(),
        };
        let outcome = supervisor.measure(&request).unwrap();
        assert!(outcome.success(), "{:?}", outcome);
        let metrics = extract_metrics(&outcome.stdout).unwrap();
        assert_eq!(metrics.size, size);
        assert_eq!(metrics.nodes, u64::from(size));

        held.push(std::fs::File::open(dir.path()).unwrap());
    }
}
