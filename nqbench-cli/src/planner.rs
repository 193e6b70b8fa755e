//! Sweep Planner
//!
//! Builds the execution plan: which implementations take part and in which
//! order the (size, implementation) trials run. Sizes form the outer loop,
//! implementations the inner loop in registration order.

use crate::config::ConfigError;
use nqbench_core::{Implementation, ImplementationSet};

/// Execution plan for one sweep
#[derive(Debug, Clone)]
pub struct SweepPlan {
    /// Board sizes in sweep order
    pub sizes: Vec<u32>,
    /// Worker-count hint passed to every command
    pub workers: u32,
    /// Participating implementations
    pub implementations: ImplementationSet,
}

impl SweepPlan {
    /// Number of trials the sweep will run
    pub fn trial_count(&self) -> usize {
        self.sizes.len() * self.implementations.len()
    }

    /// Trials in execution order.
    pub fn trials(&self) -> impl Iterator<Item = (u32, &Implementation)> + '_ {
        self.sizes
            .iter()
            .flat_map(move |&size| self.implementations.iter().map(move |imp| (size, imp)))
    }
}

/// Build the sweep plan, keeping only implementations whose name matches
/// `filter`.
pub fn build_plan(
    implementations: ImplementationSet,
    filter: Option<&regex::Regex>,
    sizes: Vec<u32>,
    workers: u32,
) -> Result<SweepPlan, ConfigError> {
    if sizes.is_empty() {
        return Err(ConfigError::Sweep("no board sizes given".to_string()));
    }
    if sizes.contains(&0) {
        return Err(ConfigError::Sweep("board sizes must be positive".to_string()));
    }

    let implementations = match filter {
        Some(re) => implementations.retain(|imp| re.is_match(imp.name()))?,
        None => implementations,
    };

    Ok(SweepPlan {
        sizes,
        workers,
        implementations,
    })
}
