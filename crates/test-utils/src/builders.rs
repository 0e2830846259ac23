#![allow(dead_code)]

use std::collections::BTreeMap;

use assetdag::config::{
    ConfigFile, ConfigSection, LiveReloadConfig, RawConfigFile, StepConfig, TaskConfig,
    WatchConfig,
};
use assetdag::dag::{Registry, Task};

/// Builder for `ConfigFile` to simplify test setup.
pub struct ConfigFileBuilder {
    config: RawConfigFile,
}

impl ConfigFileBuilder {
    pub fn new() -> Self {
        Self {
            config: RawConfigFile {
                config: ConfigSection::default(),
                paths: BTreeMap::new(),
                task: BTreeMap::new(),
                watch: Vec::new(),
                serve: None,
                livereload: LiveReloadConfig::default(),
            },
        }
    }

    pub fn stage(mut self, stage: &str) -> Self {
        self.config.config.stage = stage.to_string();
        self
    }

    pub fn with_paths(mut self, name: &str, patterns: &[&str]) -> Self {
        self.config
            .paths
            .insert(name.to_string(), patterns.iter().map(|p| p.to_string()).collect());
        self
    }

    pub fn with_task(mut self, name: &str, task: TaskConfig) -> Self {
        self.config.task.insert(name.to_string(), task);
        self
    }

    pub fn with_watch(mut self, name: &str, paths: &[&str], tasks: &[&str]) -> Self {
        self.config.watch.push(WatchConfig {
            name: Some(name.to_string()),
            paths: paths.iter().map(|p| p.to_string()).collect(),
            tasks: tasks.iter().map(|t| t.to_string()).collect(),
        });
        self
    }

    pub fn raw(self) -> RawConfigFile {
        self.config
    }

    pub fn build(self) -> ConfigFile {
        ConfigFile::try_from(self.config).expect("Failed to build valid config from builder")
    }
}

impl Default for ConfigFileBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for `TaskConfig`.
#[derive(Default)]
pub struct TaskConfigBuilder {
    task: TaskConfig,
}

impl TaskConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn after(mut self, dep: &str) -> Self {
        self.task.after.push(dep.to_string());
        self
    }

    pub fn describe(mut self, description: &str) -> Self {
        self.task.description = Some(description.to_string());
        self
    }

    pub fn concat(mut self, src: &[&str], dest: &str) -> Self {
        self.task.step.push(StepConfig::Concat {
            src: src.iter().map(|s| s.to_string()).collect(),
            dest: dest.to_string(),
            separator: "\n".to_string(),
        });
        self
    }

    pub fn copy(mut self, src: &[&str], dest: &str, base: Option<&str>) -> Self {
        self.task.step.push(StepConfig::Copy {
            src: src.iter().map(|s| s.to_string()).collect(),
            dest: dest.to_string(),
            base: base.map(str::to_string),
        });
        self
    }

    pub fn command(mut self, cmd: &str, src: &[&str], output: Option<&str>, cache: bool) -> Self {
        self.task.step.push(StepConfig::Command {
            cmd: cmd.to_string(),
            src: src.iter().map(|s| s.to_string()).collect(),
            output: output.map(str::to_string),
            cache,
        });
        self
    }

    pub fn build(self) -> TaskConfig {
        self.task
    }
}

/// Registry of action-less tasks from `(name, prerequisites)` pairs.
pub fn registry(tasks: &[(&str, &[&str])]) -> Registry {
    Registry::from_tasks(
        tasks
            .iter()
            .map(|(name, after)| Task::new(*name).after(after.iter().copied())),
    )
    .expect("valid registry")
}

/// Like [`registry`], but without graph validation, so cycles survive until
/// the runner plans a run.
pub fn registry_unchecked(tasks: &[(&str, &[&str])]) -> Registry {
    let mut registry = Registry::new();
    for (name, after) in tasks {
        registry
            .insert(Task::new(*name).after(after.iter().copied()))
            .expect("unique task names");
    }
    registry
}
