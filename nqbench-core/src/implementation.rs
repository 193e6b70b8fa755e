//! Implementation Descriptors
//!
//! An [`Implementation`] is one benchmark target: a display name, a language
//! tag, how to make it runnable, how to invoke it for a board size, where to
//! run it and which environment overrides it needs. Descriptors are built once
//! at startup and never mutated.

use crate::prepare::{BuildError, BuildPlan, PrepareOutcome};
use crate::template::CommandTemplate;
use crate::tool::ToolRunner;
use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors raised while assembling the active implementation set
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DescriptorError {
    #[error("duplicate implementation name: {0}")]
    DuplicateName(String),

    #[error("implementation name must not be empty")]
    EmptyName,

    #[error("implementation {0} has an empty command")]
    EmptyCommand(String),

    #[error("no implementations selected")]
    NoImplementations,
}

/// One benchmark target.
#[derive(Debug, Clone)]
pub struct Implementation {
    name: String,
    language: String,
    command: CommandTemplate,
    workdir: PathBuf,
    env: BTreeMap<String, String>,
    plan: BuildPlan,
}

impl Implementation {
    pub fn new(
        name: impl Into<String>,
        language: impl Into<String>,
        command: CommandTemplate,
        workdir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            name: name.into(),
            language: language.into(),
            command,
            workdir: workdir.into(),
            env: BTreeMap::new(),
            plan: BuildPlan::none(),
        }
    }

    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    pub fn with_plan(mut self, plan: BuildPlan) -> Self {
        self.plan = plan;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn language(&self) -> &str {
        &self.language
    }

    pub fn workdir(&self) -> &Path {
        &self.workdir
    }

    /// Environment overrides, merged over the ambient environment at launch.
    pub fn env_overrides(&self) -> &BTreeMap<String, String> {
        &self.env
    }

    pub fn plan(&self) -> &BuildPlan {
        &self.plan
    }

    /// Argument vector for one trial. Pure: depends only on its inputs.
    pub fn command_for(&self, size: u32, workers: u32) -> Vec<String> {
        self.command.build(size, workers)
    }

    /// Make the implementation runnable; a no-op once its artifact exists.
    pub fn prepare(&self, runner: &dyn ToolRunner) -> Result<PrepareOutcome, BuildError> {
        self.plan.ensure(runner)
    }
}

/// The active, ordered set of implementations. Names are unique.
#[derive(Debug, Clone)]
pub struct ImplementationSet {
    implementations: Vec<Implementation>,
}

impl ImplementationSet {
    /// Validate and freeze a registration-ordered list.
    pub fn new(implementations: Vec<Implementation>) -> Result<Self, DescriptorError> {
        if implementations.is_empty() {
            return Err(DescriptorError::NoImplementations);
        }

        let mut seen = HashSet::new();
        for implementation in &implementations {
            if implementation.name.trim().is_empty() {
                return Err(DescriptorError::EmptyName);
            }
            if implementation.command.is_empty() {
                return Err(DescriptorError::EmptyCommand(implementation.name.clone()));
            }
            if !seen.insert(implementation.name.as_str()) {
                return Err(DescriptorError::DuplicateName(implementation.name.clone()));
            }
        }

        Ok(Self { implementations })
    }

    /// Keep only the implementations matching `keep`, preserving order.
    pub fn retain(self, keep: impl Fn(&Implementation) -> bool) -> Result<Self, DescriptorError> {
        Self::new(self.implementations.into_iter().filter(|i| keep(i)).collect())
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Implementation> {
        self.implementations.iter()
    }

    pub fn len(&self) -> usize {
        self.implementations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.implementations.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&Implementation> {
        self.implementations.iter().find(|i| i.name == name)
    }
}

impl<'a> IntoIterator for &'a ImplementationSet {
    type Item = &'a Implementation;
    type IntoIter = std::slice::Iter<'a, Implementation>;

    fn into_iter(self) -> Self::IntoIter {
        self.implementations.iter()
    }
}
