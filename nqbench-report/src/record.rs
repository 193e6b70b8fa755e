//! Result Records

use serde::{Deserialize, Serialize};

/// Column order of the result table
pub const CSV_COLUMNS: [&str; 7] = [
    "implementation",
    "language",
    "size",
    "time_sec",
    "max_rss_kb",
    "nodes",
    "solutions",
];

/// One measured (implementation, size) pair
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultRecord {
    /// Implementation display name
    pub implementation: String,
    /// Language tag of the implementation
    pub language: String,
    /// Board size that was requested (and confirmed by the solver)
    pub size: u32,
    /// Wall-clock seconds of the trial
    pub time_sec: f64,
    /// Peak resident set size in kilobytes
    pub max_rss_kb: u64,
    /// Node count reported by the solver
    pub nodes: u64,
    /// Solution count reported by the solver
    pub solutions: f64,
}

/// Records in sweep order; written once at the end of a sweep
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResultTable {
    records: Vec<ResultRecord>,
}

impl ResultTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a record. Order of insertion is the order of output.
    pub fn push(&mut self, record: ResultRecord) {
        self.records.push(record);
    }

    pub fn records(&self) -> &[ResultRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Distinct sizes in first-seen order.
    pub fn sizes(&self) -> Vec<u32> {
        let mut sizes = Vec::new();
        for record in &self.records {
            if !sizes.contains(&record.size) {
                sizes.push(record.size);
            }
        }
        sizes
    }
}

impl From<Vec<ResultRecord>> for ResultTable {
    fn from(records: Vec<ResultRecord>) -> Self {
        Self { records }
    }
}

impl<'a> IntoIterator for &'a ResultTable {
    type Item = &'a ResultRecord;
    type IntoIter = std::slice::Iter<'a, ResultRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.iter()
    }
}
