// src/errors.rs

//! Crate-wide error types.
//!
//! The taxonomy follows how failures propagate:
//! - [`ConfigurationError`] aborts before any work starts.
//! - [`TransformError`] fails the owning task and ends up in a [`FailureList`].
//! - [`AssetdagError::Watch`] is fatal to a single watch group only.
//! - [`AssetdagError::ServerProcess`] stops the dev server until the next trigger.

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

use crate::engine::TaskName;

/// Errors detected while loading or planning, before any step has run.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigurationError {
    #[error("unknown task: {0}")]
    UnknownTask(String),

    #[error("cyclic dependency between tasks: {}", .0.join(" -> "))]
    CyclicDependency(Vec<TaskName>),

    #[error("malformed path set '{name}': {reason}")]
    MalformedPathSet { name: String, reason: String },

    #[error("{0}")]
    Invalid(String),
}

/// Failure of a single transform step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransformError {
    /// Name of the step that failed (e.g. `concat`, `command`).
    pub step: String,
    /// File that caused the failure, when the tool reported one.
    pub file: Option<PathBuf>,
    pub message: String,
}

impl TransformError {
    pub fn new(step: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            step: step.into(),
            file: None,
            message: message.into(),
        }
    }

    pub fn with_file(mut self, file: impl Into<PathBuf>) -> Self {
        self.file = Some(file.into());
        self
    }
}

impl fmt::Display for TransformError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.file {
            Some(file) => write!(f, "[{}] {}: {}", self.step, file.display(), self.message),
            None => write!(f, "[{}] {}", self.step, self.message),
        }
    }
}

impl std::error::Error for TransformError {}

/// One failed task and the error that failed it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskFailure {
    pub task: TaskName,
    pub error: TransformError,
}

/// Every task that failed during a single run, in completion order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FailureList(pub Vec<TaskFailure>);

impl FailureList {
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn tasks(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(|f| f.task.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = &TaskFailure> {
        self.0.iter()
    }
}

impl fmt::Display for FailureList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} task(s) failed", self.0.len())?;
        for failure in &self.0 {
            write!(f, "\n  '{}': {}", failure.task, failure.error)?;
        }
        Ok(())
    }
}

#[derive(Error, Debug)]
pub enum AssetdagError {
    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigurationError),

    #[error("TOML parsing error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    TaskFailures(FailureList),

    #[error("watch group '{group}' failed: {reason}")]
    Watch { group: String, reason: String },

    #[error("server process error: {0}")]
    ServerProcess(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl AssetdagError {
    /// Process exit code for this error.
    ///
    /// `2` for anything detected before work started (bad config, unknown
    /// task, cycles), `1` for everything else.
    pub fn exit_code(&self) -> i32 {
        match self {
            AssetdagError::Configuration(_) | AssetdagError::Toml(_) => 2,
            _ => 1,
        }
    }

    pub fn invalid_config(msg: impl Into<String>) -> Self {
        AssetdagError::Configuration(ConfigurationError::Invalid(msg.into()))
    }
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, AssetdagError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn configuration_errors_exit_with_two() {
        let err = AssetdagError::from(ConfigurationError::UnknownTask("nope".into()));
        assert_eq!(err.exit_code(), 2);

        let err = AssetdagError::TaskFailures(FailureList::default());
        assert_eq!(err.exit_code(), 1);
    }

    #[test]
    fn cycle_message_lists_the_path() {
        let err = ConfigurationError::CyclicDependency(vec!["a".into(), "b".into(), "a".into()]);
        assert_eq!(err.to_string(), "cyclic dependency between tasks: a -> b -> a");
    }

    #[test]
    fn failure_list_display_names_each_task() {
        let list = FailureList(vec![TaskFailure {
            task: "css".into(),
            error: TransformError::new("command", "exit code 1").with_file("client/a.css"),
        }]);
        let text = list.to_string();
        assert!(text.contains("1 task(s) failed"));
        assert!(text.contains("'css': [command] client/a.css: exit code 1"));
    }
}
