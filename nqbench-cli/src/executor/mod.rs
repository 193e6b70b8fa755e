//! Sweep Executor
//!
//! ## Pipeline Overview
//!
//! ```text
//! SweepPlan (sizes × implementations)
//!       │
//!       ▼
//! ┌─────────────┐
//! │  execution  │  Prepare every implementation once, then walk the trials
//! └──────┬──────┘
//!        │  per (size, implementation)
//!        ▼
//! ┌─────────────┐
//! │    trial    │  Measure in an isolated worker, check exit, extract metrics
//! └──────┬──────┘
//!        │
//!        ▼
//! ┌─────────────┐
//! │ formatting  │  Human-readable summary
//! └─────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`execution`] - Preparation and the sweep loop
//! - [`trial`] - One measured (implementation, size) pair
//! - [`formatting`] - Human-readable output formatting
//! - [`metadata`] - System metadata for the JSON report

mod execution;
mod formatting;
mod metadata;
mod trial;

pub use execution::{Executor, prepare_all};
pub use formatting::{format_human_summary, format_implementation_list};
pub use metadata::build_report_meta;
pub use trial::{Measure, TrialError, measure_request, run_trial};
