//! Output Formatting
//!
//! Human-readable terminal output: the per-size results summary printed after
//! a sweep (and by `nqbench summary`), and the implementation listing.

use crate::planner::SweepPlan;
use nqbench_core::shell_join;
use nqbench_report::{ResultRecord, ResultTable};

/// Format a result table for terminal display, grouped by board size.
pub fn format_human_summary(table: &ResultTable) -> String {
    let mut output = String::new();

    output.push('\n');
    output.push_str("nqbench Results\n");
    output.push_str(&"=".repeat(72));
    output.push('\n');

    if table.is_empty() {
        output.push_str("No results.\n");
        return output;
    }

    for size in table.sizes() {
        let rows: Vec<&ResultRecord> = table.records().iter().filter(|r| r.size == size).collect();

        output.push_str(&format!("\nN = {}\n", size));
        output.push_str(&"-".repeat(72));
        output.push('\n');
        output.push_str(&format!(
            "  {:<12} {:<8} {:>10} {:>12} {:>14} {:>10}\n",
            "impl", "lang", "time (s)", "rss (KB)", "nodes", "solutions"
        ));

        let fastest = rows
            .iter()
            .min_by(|a, b| a.time_sec.total_cmp(&b.time_sec))
            .map(|r| r.implementation.as_str());

        for row in &rows {
            let marker = if Some(row.implementation.as_str()) == fastest && rows.len() > 1 {
                " *"
            } else {
                ""
            };
            output.push_str(&format!(
                "  {:<12} {:<8} {:>10.3} {:>12} {:>14} {:>10}{}\n",
                row.implementation,
                row.language,
                row.time_sec,
                row.max_rss_kb,
                row.nodes,
                row.solutions,
                marker
            ));
        }
    }

    output.push_str(&format!(
        "\n{} result{} across {} size{}",
        table.len(),
        if table.len() == 1 { "" } else { "s" },
        table.sizes().len(),
        if table.sizes().len() == 1 { "" } else { "s" },
    ));
    if table.sizes().iter().any(|&size| {
        table.records().iter().filter(|r| r.size == size).count() > 1
    }) {
        output.push_str(" (* fastest for that size)");
    }
    output.push('\n');

    output
}

/// Format the implementations of a plan, with the command each would run for
/// the first planned size.
pub fn format_implementation_list(plan: &SweepPlan) -> String {
    let mut output = String::new();
    let sample_size = plan.sizes.first().copied().unwrap_or(4);

    output.push_str("nqbench Plan:\n");
    for implementation in &plan.implementations {
        let state = if implementation.plan().is_ready() {
            "ready"
        } else {
            "needs build"
        };
        output.push_str(&format!(
            "├── {} ({}) [{}]\n",
            implementation.name(),
            implementation.language(),
            state
        ));
        output.push_str(&format!(
            "│   ├── {}$ {}\n",
            implementation.workdir().display(),
            shell_join(&implementation.command_for(sample_size, plan.workers))
        ));
        for (key, value) in implementation.env_overrides() {
            output.push_str(&format!("│   ├── {}={}\n", key, value));
        }
    }

    let sizes: Vec<String> = plan.sizes.iter().map(u32::to_string).collect();
    output.push_str(&format!(
        "{} implementations, sizes [{}], workers {}\n",
        plan.implementations.len(),
        sizes.join(", "),
        plan.workers
    ));

    output
}
