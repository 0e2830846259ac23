// src/config/model.rs

use std::collections::BTreeMap;

use serde::Deserialize;

use crate::paths::PathCatalog;
use crate::types::HashStorageMode;

/// Top-level configuration as read from `Assetdag.toml`, before validation.
///
/// ```toml
/// [config]
/// stage = "build/stage"
///
/// [paths]
/// css = ["client/content/**/*.css"]
///
/// [task.css]
/// [[task.css.step]]
/// kind = "concat"
/// src = ["@css"]
/// dest = "{stage}/content/all.css"
///
/// [[watch]]
/// paths = ["@css"]
/// tasks = ["css"]
/// ```
///
/// All sections except `[task.*]` are optional and have defaults.
#[derive(Debug, Clone, Deserialize)]
pub struct RawConfigFile {
    #[serde(default)]
    pub config: ConfigSection,

    /// Named path sets from `[paths]`; referenced elsewhere as `@name`.
    #[serde(default)]
    pub paths: BTreeMap<String, Vec<String>>,

    /// All tasks from `[task.<name>]`.
    #[serde(default)]
    pub task: BTreeMap<String, TaskConfig>,

    /// Watch groups from `[[watch]]`.
    #[serde(default)]
    pub watch: Vec<WatchConfig>,

    #[serde(default)]
    pub serve: Option<ServeConfig>,

    #[serde(default)]
    pub livereload: LiveReloadConfig,
}

/// Validated configuration. Only constructible through
/// `ConfigFile::try_from(RawConfigFile)`.
#[derive(Debug, Clone)]
pub struct ConfigFile {
    pub config: ConfigSection,
    pub paths: BTreeMap<String, Vec<String>>,
    pub task: BTreeMap<String, TaskConfig>,
    pub watch: Vec<WatchConfig>,
    pub serve: Option<ServeConfig>,
    pub livereload: LiveReloadConfig,
    _validated: (),
}

impl ConfigFile {
    pub(crate) fn new_unchecked(raw: RawConfigFile) -> Self {
        Self {
            config: raw.config,
            paths: raw.paths,
            task: raw.task,
            watch: raw.watch,
            serve: raw.serve,
            livereload: raw.livereload,
            _validated: (),
        }
    }

    /// Named path sets plus the staging root, for expanding patterns.
    pub fn catalog(&self) -> PathCatalog {
        PathCatalog::new(self.config.stage.clone(), self.paths.clone())
    }
}

/// `[config]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct ConfigSection {
    /// Staging root; `{stage}` in patterns expands to this.
    #[serde(default = "default_stage")]
    pub stage: String,

    /// Window in which watch events are batched into one trigger.
    #[serde(default = "default_debounce")]
    pub debounce: String,

    /// Where `cache = true` steps keep their input hashes.
    #[serde(default)]
    pub hash_storage: HashStorageMode,
}

fn default_stage() -> String {
    "build/stage".to_string()
}

fn default_debounce() -> String {
    "100ms".to_string()
}

impl Default for ConfigSection {
    fn default() -> Self {
        Self {
            stage: default_stage(),
            debounce: default_debounce(),
            hash_storage: HashStorageMode::default(),
        }
    }
}

/// `[task.<name>]` section.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TaskConfig {
    /// Shown by `list-tasks`.
    #[serde(default)]
    pub description: Option<String>,

    /// Prerequisites: this task runs after all of these succeeded.
    #[serde(default)]
    pub after: Vec<String>,

    /// Transform steps, applied in order (`[[task.<name>.step]]`).
    #[serde(default)]
    pub step: Vec<StepConfig>,
}

/// One `[[task.<name>.step]]` entry.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum StepConfig {
    /// Run an external tool through the shell.
    Command {
        cmd: String,
        #[serde(default)]
        src: Vec<String>,
        /// File produced by the tool; used for size reports and caching.
        #[serde(default)]
        output: Option<String>,
        /// Skip when the inputs hash is unchanged and `output` exists.
        #[serde(default)]
        cache: bool,
    },
    /// Concatenate inputs in path-set order.
    Concat {
        src: Vec<String>,
        dest: String,
        #[serde(default = "default_separator")]
        separator: String,
    },
    /// Copy inputs into a directory.
    Copy {
        src: Vec<String>,
        dest: String,
        /// Inputs keep their path relative to `base`; without it only the
        /// file name is kept.
        #[serde(default)]
        base: Option<String>,
    },
    /// Write script/link tags between inject markers of an HTML file and
    /// save the page into the `dest` directory.
    Inject {
        target: String,
        dest: String,
        blocks: Vec<InjectBlockConfig>,
        /// Prefix stripped from file paths before they become URLs.
        #[serde(default)]
        ignore_path: Option<String>,
    },
}

fn default_separator() -> String {
    "\n".to_string()
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct InjectBlockConfig {
    /// Marker name: `<!-- NAME:js -->`.
    #[serde(default = "default_inject_name")]
    pub name: String,
    pub src: Vec<String>,
}

fn default_inject_name() -> String {
    "inject".to_string()
}

/// `[[watch]]` entry.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct WatchConfig {
    #[serde(default)]
    pub name: Option<String>,
    pub paths: Vec<String>,
    pub tasks: Vec<String>,
}

/// `[serve]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct ServeConfig {
    /// Server command, run through the shell.
    pub command: String,

    /// Server-side files whose change restarts the server.
    #[serde(default)]
    pub watch: Vec<String>,

    /// Only changes to files with these extensions restart the server.
    /// Empty means any extension.
    #[serde(default)]
    pub extensions: Vec<String>,

    /// Pause before respawning after a change.
    #[serde(default)]
    pub delay: Option<String>,

    /// How long to wait after SIGTERM before killing the server.
    #[serde(default = "default_grace")]
    pub grace: String,

    /// Variable that receives the environment name (e.g. `NODE_ENV`).
    #[serde(default = "default_env_var")]
    pub env_var: String,

    /// Extra environment variables for the server process.
    #[serde(default)]
    pub vars: BTreeMap<String, String>,

    /// Per-environment settings, keyed by environment name.
    #[serde(default)]
    pub env: BTreeMap<String, ServeEnvConfig>,
}

fn default_grace() -> String {
    "5s".to_string()
}

fn default_env_var() -> String {
    "NODE_ENV".to_string()
}

/// `[serve.env.<name>]` section.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ServeEnvConfig {
    /// Tasks run before the server starts and before every restart.
    #[serde(default)]
    pub tasks: Vec<String>,

    /// Directory whose changes are pushed to live-reload clients.
    pub root: String,
}

/// `[livereload]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct LiveReloadConfig {
    #[serde(default = "default_livereload_enabled")]
    pub enabled: bool,

    #[serde(default = "default_livereload_addr")]
    pub addr: String,
}

fn default_livereload_enabled() -> bool {
    true
}

fn default_livereload_addr() -> String {
    "127.0.0.1:35729".to_string()
}

impl Default for LiveReloadConfig {
    fn default() -> Self {
        Self {
            enabled: default_livereload_enabled(),
            addr: default_livereload_addr(),
        }
    }
}
