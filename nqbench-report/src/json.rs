//! JSON Output

use crate::record::{ResultRecord, ResultTable};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Complete JSON report
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResultReport {
    pub meta: ReportMeta,
    pub results: Vec<ResultRecord>,
}

/// Report metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportMeta {
    pub version: String,
    pub timestamp: DateTime<Utc>,
    pub git_commit: Option<String>,
    pub system: SystemInfo,
    pub sweep: SweepInfo,
}

/// Host the sweep ran on
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemInfo {
    pub os: String,
    pub arch: String,
    pub cpu: String,
    pub cpu_cores: u32,
}

/// Sweep parameters captured in report metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SweepInfo {
    pub root: String,
    pub sizes: Vec<u32>,
    pub workers: u32,
    pub implementations: Vec<String>,
}

impl ResultReport {
    pub fn new(meta: ReportMeta, table: &ResultTable) -> Self {
        Self {
            meta,
            results: table.records().to_vec(),
        }
    }
}

/// Generate a prettified JSON report.
pub fn generate_json_report(report: &ResultReport) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(report)
}
