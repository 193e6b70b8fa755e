//! Placeholder Templates
//!
//! Commands, paths and environment values in the configuration may contain
//! `{...}` placeholders:
//!
//! | placeholder    | meaning                                   | where           |
//! |----------------|-------------------------------------------|-----------------|
//! | `{root}`       | benchmark root directory                  | everywhere      |
//! | `{jobs}`       | logical CPU count                         | everywhere      |
//! | `{env:NAME}`   | ambient value of `NAME`, empty when unset | everywhere      |
//! | `{which:NAME}` | first executable `NAME` on `PATH`         | everywhere      |
//! | `{size}`       | requested board size                      | run command     |
//! | `{workers}`    | worker-count hint                         | run command     |
//!
//! `{{` and `}}` produce literal braces. Everything except `{size}` and
//! `{workers}` is resolved once, when descriptors are built, so rendering a
//! [`CommandTemplate`] reads no ambient state.

use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors raised while expanding placeholders
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TemplateError {
    #[error("unknown placeholder {{{0}}} in {1:?}")]
    UnknownPlaceholder(String, String),

    #[error("unterminated placeholder in {0:?}")]
    Unterminated(String),

    #[error("placeholder {{{0}}} is only available in run commands ({1:?})")]
    RunOnly(String, String),

    #[error("{{which:{0}}} did not match any executable on PATH")]
    NotOnPath(String),
}

/// Values for the static placeholders.
#[derive(Debug, Clone)]
pub struct Placeholders {
    root: PathBuf,
    jobs: usize,
}

impl Placeholders {
    pub fn new(root: impl Into<PathBuf>, jobs: usize) -> Self {
        Self {
            root: root.into(),
            jobs: jobs.max(1),
        }
    }

    /// Use the machine's logical CPU count for `{jobs}`.
    pub fn with_detected_jobs(root: impl Into<PathBuf>) -> Self {
        let jobs = std::thread::available_parallelism()
            .map(|p| p.get())
            .unwrap_or(1);
        Self::new(root, jobs)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn jobs(&self) -> usize {
        self.jobs
    }

    /// Expand a string that may not reference `{size}` or `{workers}`.
    pub fn expand(&self, raw: &str) -> Result<String, TemplateError> {
        let mut out = String::new();
        for segment in parse(raw, self)? {
            match segment {
                Segment::Literal(text) => out.push_str(&text),
                Segment::Size => return Err(TemplateError::RunOnly("size".into(), raw.into())),
                Segment::Workers => {
                    return Err(TemplateError::RunOnly("workers".into(), raw.into()));
                }
            }
        }
        Ok(out)
    }

    /// Like [`expand`](Self::expand), but an unresolved `{which:..}` yields
    /// `None` instead of an error. Used for optional environment entries.
    pub fn expand_optional(&self, raw: &str) -> Result<Option<String>, TemplateError> {
        match self.expand(raw) {
            Ok(value) => Ok(Some(value)),
            Err(TemplateError::NotOnPath(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Expand a path template; relative results are anchored at the root.
    pub fn expand_path(&self, raw: &str) -> Result<PathBuf, TemplateError> {
        let expanded = PathBuf::from(self.expand(raw)?);
        if expanded.is_absolute() {
            Ok(expanded)
        } else {
            Ok(self.root.join(expanded))
        }
    }

    fn resolve(&self, name: &str, raw: &str) -> Result<Segment, TemplateError> {
        match name {
            "root" => Ok(Segment::Literal(self.root.display().to_string())),
            "jobs" => Ok(Segment::Literal(self.jobs.to_string())),
            "size" => Ok(Segment::Size),
            "workers" => Ok(Segment::Workers),
            _ => {
                if let Some(var) = name.strip_prefix("env:") {
                    Ok(Segment::Literal(std::env::var(var).unwrap_or_default()))
                } else if let Some(program) = name.strip_prefix("which:") {
                    find_on_path(program)
                        .map(|p| Segment::Literal(p.display().to_string()))
                        .ok_or_else(|| TemplateError::NotOnPath(program.to_string()))
                } else {
                    Err(TemplateError::UnknownPlaceholder(
                        name.to_string(),
                        raw.to_string(),
                    ))
                }
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Size,
    Workers,
}

fn parse(raw: &str, placeholders: &Placeholders) -> Result<Vec<Segment>, TemplateError> {
    let mut segments = Vec::new();
    let mut literal = String::new();
    let mut chars = raw.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '{' if chars.peek() == Some(&'{') => {
                chars.next();
                literal.push('{');
            }
            '}' if chars.peek() == Some(&'}') => {
                chars.next();
                literal.push('}');
            }
            '{' => {
                let mut name = String::new();
                loop {
                    match chars.next() {
                        Some('}') => break,
                        Some(ch) => name.push(ch),
                        None => return Err(TemplateError::Unterminated(raw.to_string())),
                    }
                }
                match placeholders.resolve(name.trim(), raw)? {
                    Segment::Literal(text) => literal.push_str(&text),
                    dynamic => {
                        if !literal.is_empty() {
                            segments.push(Segment::Literal(std::mem::take(&mut literal)));
                        }
                        segments.push(dynamic);
                    }
                }
            }
            other => literal.push(other),
        }
    }

    if !literal.is_empty() || segments.is_empty() {
        segments.push(Segment::Literal(literal));
    }
    Ok(segments)
}

/// Search `PATH` for an executable file named `program`.
pub fn find_on_path(program: &str) -> Option<PathBuf> {
    let path = std::env::var_os("PATH")?;
    std::env::split_paths(&path)
        .map(|dir| dir.join(program))
        .find(|candidate| is_executable(candidate))
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    path.metadata()
        .map(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file()
}

/// A run command with `{size}` and `{workers}` left open.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandTemplate {
    argv: Vec<Vec<Segment>>,
}

impl CommandTemplate {
    /// Parse an argv template, resolving every static placeholder now.
    pub fn parse<S: AsRef<str>>(
        raw: &[S],
        placeholders: &Placeholders,
    ) -> Result<Self, TemplateError> {
        let argv = raw
            .iter()
            .map(|arg| parse(arg.as_ref(), placeholders))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { argv })
    }

    pub fn is_empty(&self) -> bool {
        self.argv.is_empty()
    }

    /// Render the argument vector for one trial.
    pub fn build(&self, size: u32, workers: u32) -> Vec<String> {
        self.argv
            .iter()
            .map(|segments| {
                let mut arg = String::new();
                for segment in segments {
                    match segment {
                        Segment::Literal(text) => arg.push_str(text),
                        Segment::Size => arg.push_str(&size.to_string()),
                        Segment::Workers => arg.push_str(&workers.to_string()),
                    }
                }
                arg
            })
            .collect()
    }
}
