//! System Metadata Collection
//!
//! Collects what goes into the JSON report's `meta` block: tool version,
//! timestamp, git commit of the benchmark root, host description and the
//! sweep parameters. CPU model detection is Linux-only and degrades to
//! "Unknown" elsewhere.

use crate::planner::SweepPlan;
use chrono::Utc;
use nqbench_report::{ReportMeta, SweepInfo, SystemInfo};
use std::path::Path;

/// Build report metadata for a finished sweep
pub fn build_report_meta(plan: &SweepPlan, root: &Path) -> ReportMeta {
    let git_commit = std::process::Command::new("git")
        .args(["rev-parse", "HEAD"])
        .current_dir(root)
        .output()
        .ok()
        .filter(|o| o.status.success())
        .and_then(|o| String::from_utf8(o.stdout).ok())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty());

    let system = SystemInfo {
        os: std::env::consts::OS.to_string(),
        arch: std::env::consts::ARCH.to_string(),
        cpu: get_cpu_model().unwrap_or_else(|| "Unknown".to_string()),
        cpu_cores: num_cpus(),
    };

    let sweep = SweepInfo {
        root: root.display().to_string(),
        sizes: plan.sizes.clone(),
        workers: plan.workers,
        implementations: plan
            .implementations
            .iter()
            .map(|i| i.name().to_string())
            .collect(),
    };

    ReportMeta {
        version: env!("CARGO_PKG_VERSION").to_string(),
        timestamp: Utc::now(),
        git_commit,
        system,
        sweep,
    }
}

/// Get CPU model name from /proc/cpuinfo (Linux only)
fn get_cpu_model() -> Option<String> {
    #[cfg(target_os = "linux")]
    {
        std::fs::read_to_string("/proc/cpuinfo")
            .ok()
            .and_then(|content| {
                content
                    .lines()
                    .find(|l| l.starts_with("model name"))
                    .and_then(|l| l.split(':').nth(1))
                    .map(|s| s.trim().to_string())
            })
    }
    #[cfg(not(target_os = "linux"))]
    {
        None
    }
}

fn num_cpus() -> u32 {
    std::thread::available_parallelism()
        .map(|n| n.get() as u32)
        .unwrap_or(1)
}
