//! Configuration
//!
//! `nqbench.toml` describes the benchmark root, the sweep and the
//! implementations. Without a file (or with a file that lists no
//! implementations) the built-in presets from [`NqConfig::default_toml`] apply.

use nqbench_core::{
    BuildPlan, BuildStep, CommandTemplate, DescriptorError, Implementation, ImplementationSet,
    Placeholders, TemplateError, ToolCommand,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Name of the configuration file looked up by [`NqConfig::find`]
pub const CONFIG_FILE: &str = "nqbench.toml";

/// Configuration errors; always exit code 1
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("built-in configuration is invalid: {0}")]
    Builtin(#[source] toml::de::Error),

    #[error("implementation {name}: {source}")]
    Template {
        name: String,
        #[source]
        source: TemplateError,
    },

    #[error(transparent)]
    Descriptor(#[from] DescriptorError),

    #[error("implementation {0}: prepare steps need an artifact")]
    NoArtifact(String),

    #[error("invalid sweep: {0}")]
    Sweep(String),

    #[error("unknown output format {0:?} (expected csv or json)")]
    Format(String),

    #[error("invalid --only pattern: {0}")]
    Filter(#[from] regex::Error),

    #[error("{} already exists (use --force to overwrite)", .0.display())]
    Exists(PathBuf),

    #[error("failed to write {}: {source}", .path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Top-level `nqbench.toml`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NqConfig {
    /// Benchmark root; relative to the directory holding the file
    #[serde(default)]
    pub root: Option<PathBuf>,
    /// Sweep parameters
    #[serde(default)]
    pub sweep: SweepConfig,
    /// Implementations in registration order
    #[serde(default, rename = "implementation")]
    pub implementations: Vec<ImplementationConfig>,
}

/// `[sweep]` section
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SweepConfig {
    /// Board sizes, outer loop of the sweep
    #[serde(default = "default_sizes")]
    pub sizes: Vec<u32>,
    /// Worker-count hint passed to implementations (0 = let them decide)
    #[serde(default)]
    pub workers: u32,
    /// Result table path, relative to the root
    #[serde(default = "default_output")]
    pub output: PathBuf,
    /// Output format: "csv" or "json"
    #[serde(default = "default_format")]
    pub format: String,
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            sizes: default_sizes(),
            workers: 0,
            output: default_output(),
            format: default_format(),
        }
    }
}

fn default_sizes() -> Vec<u32> {
    (4..=12).collect()
}
fn default_output() -> PathBuf {
    PathBuf::from("results/nqueens_metrics.csv")
}
fn default_format() -> String {
    "csv".to_string()
}

/// `[[implementation]]` entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImplementationConfig {
    pub name: String,
    #[serde(default)]
    pub language: String,
    /// Working directory, relative to the root (default: the root)
    #[serde(default)]
    pub workdir: Option<String>,
    /// Argument vector template
    pub command: Vec<String>,
    /// Environment overrides for the measured process
    #[serde(default)]
    pub env: BTreeMap<String, String>,
    #[serde(default)]
    pub prepare: Option<PrepareConfig>,
}

/// `[implementation.prepare]` section
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PrepareConfig {
    /// Terminal artifact; its presence means "ready"
    #[serde(default)]
    pub artifact: Option<String>,
    /// Scripts to mark executable before the first step
    #[serde(default)]
    pub executable: Vec<String>,
    #[serde(default)]
    pub steps: Vec<StepConfig>,
}

/// `[[implementation.prepare.steps]]` entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepConfig {
    pub command: Vec<String>,
    #[serde(default)]
    pub cwd: Option<String>,
    /// Skip the step when this path exists
    #[serde(default)]
    pub creates: Option<String>,
    #[serde(default)]
    pub env: BTreeMap<String, String>,
}

/// A configuration together with the directory it was loaded from.
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    pub config: NqConfig,
    /// Config file path, if one was found
    pub path: Option<PathBuf>,
    /// Directory relative `root` values resolve against
    pub base_dir: PathBuf,
}

impl NqConfig {
    /// Load configuration from a file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Find `nqbench.toml` in `start` or any of its ancestors.
    pub fn find(start: &Path) -> Option<PathBuf> {
        let mut dir = start.to_path_buf();
        loop {
            let config_path = dir.join(CONFIG_FILE);
            if config_path.is_file() {
                return Some(config_path);
            }
            if !dir.pop() {
                return None;
            }
        }
    }

    /// Load an explicit file, or discover one from `cwd`, or fall back to
    /// the defaults anchored at `cwd`.
    pub fn resolve(explicit: Option<&Path>, cwd: &Path) -> Result<LoadedConfig, ConfigError> {
        let path = match explicit {
            Some(path) => Some(cwd.join(path)),
            None => Self::find(cwd),
        };

        match path {
            Some(path) => {
                let config = Self::load(&path)?;
                let base_dir = path
                    .parent()
                    .map(Path::to_path_buf)
                    .unwrap_or_else(|| cwd.to_path_buf());
                tracing::debug!("using configuration {}", path.display());
                Ok(LoadedConfig {
                    config,
                    path: Some(path),
                    base_dir,
                })
            }
            None => Ok(LoadedConfig {
                config: Self::default(),
                path: None,
                base_dir: cwd.to_path_buf(),
            }),
        }
    }

    /// Default configuration file contents, presets spelled out.
    pub fn default_toml() -> &'static str {
        DEFAULT_TOML
    }

    /// The built-in implementation presets.
    pub fn presets() -> Result<Vec<ImplementationConfig>, ConfigError> {
        let config: NqConfig = toml::from_str(DEFAULT_TOML).map_err(ConfigError::Builtin)?;
        Ok(config.implementations)
    }

    /// Configured implementations, or the presets when none are listed.
    pub fn implementation_configs(&self) -> Result<Vec<ImplementationConfig>, ConfigError> {
        if self.implementations.is_empty() {
            Self::presets()
        } else {
            Ok(self.implementations.clone())
        }
    }

    /// Build the validated descriptor set.
    pub fn build_implementations(
        &self,
        placeholders: &Placeholders,
    ) -> Result<ImplementationSet, ConfigError> {
        let implementations = self
            .implementation_configs()?
            .iter()
            .map(|entry| entry.to_implementation(placeholders))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(ImplementationSet::new(implementations)?)
    }
}

impl ImplementationConfig {
    /// Resolve every static placeholder and produce a descriptor.
    pub fn to_implementation(
        &self,
        placeholders: &Placeholders,
    ) -> Result<Implementation, ConfigError> {
        let wrap = |source| ConfigError::Template {
            name: self.name.clone(),
            source,
        };

        let command = CommandTemplate::parse(&self.command, placeholders).map_err(wrap)?;
        let workdir = match &self.workdir {
            Some(dir) => placeholders.expand_path(dir).map_err(wrap)?,
            None => placeholders.root().to_path_buf(),
        };

        let mut implementation = Implementation::new(&self.name, &self.language, command, workdir);
        for (key, raw) in &self.env {
            match placeholders.expand_optional(raw).map_err(wrap)? {
                Some(value) => implementation = implementation.with_env(key, value),
                None => tracing::debug!("{}: leaving {} unset", self.name, key),
            }
        }

        if let Some(prepare) = &self.prepare {
            if prepare.artifact.is_none() && !prepare.steps.is_empty() {
                return Err(ConfigError::NoArtifact(self.name.clone()));
            }
            implementation = implementation.with_plan(prepare.to_plan(placeholders).map_err(wrap)?);
        }

        Ok(implementation)
    }
}

impl PrepareConfig {
    fn to_plan(&self, placeholders: &Placeholders) -> Result<BuildPlan, TemplateError> {
        let mut plan = match &self.artifact {
            Some(artifact) => BuildPlan::new(placeholders.expand_path(artifact)?),
            None => BuildPlan::none(),
        };

        for script in &self.executable {
            plan = plan.executable(placeholders.expand_path(script)?);
        }

        for step in &self.steps {
            let argv = step
                .command
                .iter()
                .map(|arg| placeholders.expand(arg))
                .collect::<Result<Vec<_>, _>>()?;
            let cwd = match &step.cwd {
                Some(cwd) => placeholders.expand_path(cwd)?,
                None => placeholders.root().to_path_buf(),
            };

            let mut command = ToolCommand::new(argv, cwd);
            for (key, raw) in &step.env {
                if let Some(value) = placeholders.expand_optional(raw)? {
                    command = command.env(key, value);
                }
            }

            let mut build_step = BuildStep::new(command);
            if let Some(creates) = &step.creates {
                build_step = build_step.creates(placeholders.expand_path(creates)?);
            }
            plan = plan.step(build_step);
        }

        Ok(plan)
    }
}

const DEFAULT_TOML: &str = r#"# nqbench configuration
#
# Placeholders: {root} {jobs} {env:NAME} {which:NAME}, plus {size} and
# {workers} in run commands. Relative paths are resolved against `root`.

# Benchmark root (relative to this file)
root = "."

[sweep]
# Board sizes, swept in this order
sizes = [4, 5, 6, 7, 8, 9, 10, 11, 12]
# Worker-count hint for multi-threaded solvers (0 = autodetect)
workers = 0
# Result table
output = "results/nqueens_metrics.csv"
# "csv" or "json"
format = "csv"

[[implementation]]
name = "BuDDy"
language = "C"
command = ["{root}/BuDDy/examples/queen/queen", "{size}"]
env = { LD_LIBRARY_PATH = "{root}/BuDDy/src/.libs:{env:LD_LIBRARY_PATH}" }

[implementation.prepare]
artifact = "BuDDy/examples/queen/queen"
executable = ["BuDDy/configure"]

[[implementation.prepare.steps]]
command = ["./configure"]
cwd = "BuDDy"
creates = "BuDDy/config.status"

[[implementation.prepare.steps]]
command = ["make"]
cwd = "BuDDy"
creates = "BuDDy/src/libbdd.la"

[[implementation.prepare.steps]]
command = ["make", "-C", "examples/queen", "queen"]
cwd = "BuDDy"

[[implementation]]
name = "Sylvan"
language = "C"
command = ["{root}/sylvan/build/examples/nqueens_fast", "-w", "{workers}", "{size}"]
env = { LD_LIBRARY_PATH = "{root}/sylvan/build/src:{env:LD_LIBRARY_PATH}" }

[implementation.prepare]
artifact = "sylvan/build/examples/nqueens_fast"

[[implementation.prepare.steps]]
command = ["cmake", "-S", "sylvan", "-B", "sylvan/build", "-DSYLVAN_STATS=ON", "-DBUILD_SHARED_LIBS=OFF", "-DCMAKE_BUILD_TYPE=Release"]

[[implementation.prepare.steps]]
command = ["cmake", "--build", "sylvan/build", "--target", "nqueens_fast", "-j{jobs}"]

[[implementation]]
name = "CUDD"
language = "C"
command = ["{root}/cudd/bin/nqueens_bdd", "{size}"]

[implementation.prepare]
artifact = "cudd/bin/nqueens_bdd"
executable = ["cudd/configure"]

[[implementation.prepare.steps]]
command = ["./configure"]
cwd = "cudd"
creates = "cudd/config.status"

[[implementation.prepare.steps]]
command = ["make", "-j{jobs}", "ACLOCAL=true", "AUTOMAKE=true", "AUTOCONF=true", "AUTOHEADER=true"]
cwd = "cudd"
creates = "cudd/cudd/.libs/libcudd.a"

[[implementation.prepare.steps]]
command = ["mkdir", "-p", "cudd/bin"]

[[implementation.prepare.steps]]
command = ["gcc", "-O3", "-I./cudd", "-I./cudd/cudd", "-I./cudd/mtr", "-I./cudd/st", "-I./cudd/util", "-I./cudd/epd", "-o", "cudd/bin/nqueens_bdd", "cudd/examples/nqueens_bdd.c", "cudd/cudd/.libs/libcudd.a", "-lm"]

[[implementation]]
name = "JDD"
language = "Java"
workdir = "jdd"
command = ["java", "-cp", "build/classes/java/main", "jdd.examples.BDDQueens", "{size}"]

[implementation.prepare]
artifact = "jdd/build/classes/java/main/jdd/examples/BDDQueens.class"
executable = ["jdd/gradlew"]

[[implementation.prepare.steps]]
command = ["./gradlew", "--no-daemon", "classes"]
cwd = "jdd"

[[implementation]]
name = "JSylvan"
language = "Java"
workdir = "jsylvan"
command = ["java", "-cp", "target/sylvan-1.0.0-SNAPSHOT.jar", "jsylvan.examples.JSylvanNQueens", "-w", "{workers}", "{size}"]

[implementation.prepare]
artifact = "jsylvan/target/sylvan-1.0.0-SNAPSHOT.jar"
executable = ["jsylvan/src/main/c/sylvan-java/build-sylvan.sh"]

[[implementation.prepare.steps]]
command = ["./src/main/c/sylvan-java/build-sylvan.sh", "https://github.com/trolando/sylvan.git", "v1.4.1"]
cwd = "jsylvan"
creates = "jsylvan/src/main/resources/linux-x64/libsylvan-java.so"
env = { PKG_CONFIG = "{which:pkg-config}", PKG_CONFIG_EXECUTABLE = "{which:pkg-config}" }

[[implementation.prepare.steps]]
command = ["mvn", "-q", "-DskipTests", "package"]
cwd = "jsylvan"
"#;
