//! nqbench Core
//!
//! The pieces every trial is assembled from:
//! - [`Implementation`] descriptors and their [`CommandTemplate`]s
//! - [`BuildPlan`] preparation behind the [`ToolRunner`] capability
//! - [`extract_metrics`] for the `NQUEENS_METRICS` output line
//! - [`WorkerMain`], the isolated measurement process

mod implementation;
mod metrics;
mod prepare;
mod template;
mod tool;
mod worker;

pub use implementation::{DescriptorError, Implementation, ImplementationSet};
pub use metrics::{METRICS_MARKER, MetricsError, MetricsTriple, extract_metrics, parse_metrics_line};
pub use prepare::{BuildError, BuildPlan, BuildStep, PrepareOutcome};
pub use template::{CommandTemplate, Placeholders, TemplateError, find_on_path};
pub use tool::{SystemToolRunner, ToolCommand, ToolOutput, ToolRunner, shell_join};
pub use worker::{MAX_CAPTURED_BYTES, WorkerMain, children_peak_rss_kb, measure};
