// src/config/build.rs

//! Turn a validated [`ConfigFile`] into the runtime pieces.

use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use tracing::debug;

use crate::config::model::ConfigFile;
use crate::dag::{Registry, Task};
use crate::engine::TaskName;
use crate::errors::ConfigurationError;
use crate::exec::StepPipeline;
use crate::paths::CompiledPathSet;
use crate::supervisor::ServerSpec;
use crate::transform::build_step;
use crate::types::parse_duration;
use crate::watch::WatchGroup;

type Result<T> = std::result::Result<T, ConfigurationError>;

fn duration(field: &str, value: &str) -> Result<Duration> {
    parse_duration(value).map_err(|e| ConfigurationError::Invalid(format!("{field}: {e}")))
}

impl ConfigFile {
    pub fn debounce(&self) -> Result<Duration> {
        duration("[config].debounce", &self.config.debounce)
    }

    /// `None` when live reload is disabled.
    pub fn livereload_addr(&self) -> Result<Option<SocketAddr>> {
        if !self.livereload.enabled {
            return Ok(None);
        }
        self.livereload.addr.parse().map(Some).map_err(|e| {
            ConfigurationError::Invalid(format!("[livereload].addr '{}': {e}", self.livereload.addr))
        })
    }
}

/// One task per `[task.<name>]`; its steps become a [`StepPipeline`].
/// Tasks without steps only group their prerequisites.
pub fn build_registry(cfg: &ConfigFile) -> Result<Registry> {
    let catalog = cfg.catalog();
    let mut tasks = Vec::with_capacity(cfg.task.len());

    for (name, task_cfg) in &cfg.task {
        let mut task = Task::new(name.clone()).after(task_cfg.after.iter().cloned());
        if let Some(description) = &task_cfg.description {
            task = task.with_description(description.clone());
        }

        if !task_cfg.step.is_empty() {
            let mut steps = Vec::with_capacity(task_cfg.step.len());
            for (index, step) in task_cfg.step.iter().enumerate() {
                steps.push(build_step(name, index, step, &catalog)?);
            }
            task = task.with_action(Arc::new(StepPipeline::new(steps)));
        }

        debug!(task = %name, steps = task_cfg.step.len(), after = ?task_cfg.after, "registered task");
        tasks.push(task);
    }

    Registry::from_tasks(tasks)
}

/// One [`WatchGroup`] per `[[watch]]`; unnamed groups are called `watch[i]`.
pub fn build_watch_groups(cfg: &ConfigFile) -> Result<Vec<WatchGroup>> {
    let catalog = cfg.catalog();
    cfg.watch
        .iter()
        .enumerate()
        .map(|(index, group)| {
            let name = group
                .name
                .clone()
                .unwrap_or_else(|| format!("watch[{index}]"));
            let patterns = catalog.expand(&name, &group.paths)?;
            let paths = CompiledPathSet::compile(&name, &patterns)?;
            Ok(WatchGroup {
                name,
                paths,
                tasks: group.tasks.clone(),
            })
        })
        .collect()
}

/// Everything `serve <env>` needs.
#[derive(Debug, Clone)]
pub struct ServePlan {
    pub env: String,
    /// Run before the first start and before every restart.
    pub tasks: Vec<TaskName>,
    /// Directory whose changes reach live-reload clients.
    pub served_root: String,
    pub server: ServerSpec,
}

pub fn serve_plan(cfg: &ConfigFile, env: &str, root: &Path) -> Result<ServePlan> {
    let serve = cfg
        .serve
        .as_ref()
        .ok_or_else(|| ConfigurationError::Invalid("no [serve] section in config".to_string()))?;

    let settings = serve.env.get(env).ok_or_else(|| {
        let known: Vec<&str> = serve.env.keys().map(String::as_str).collect();
        ConfigurationError::Invalid(format!(
            "unknown serve environment '{env}' (known: {})",
            known.join(", ")
        ))
    })?;

    let catalog = cfg.catalog();
    let patterns = catalog.expand("serve", &serve.watch)?;
    let watch = CompiledPathSet::compile("serve", &patterns)?;

    let mut vars: BTreeMap<String, String> = serve.vars.clone();
    vars.insert(serve.env_var.clone(), env.to_string());

    let delay = match &serve.delay {
        Some(d) => duration("[serve].delay", d)?,
        None => Duration::ZERO,
    };

    Ok(ServePlan {
        env: env.to_string(),
        tasks: settings.tasks.clone(),
        served_root: catalog.substitute(&settings.root),
        server: ServerSpec {
            command: serve.command.clone(),
            cwd: root.to_path_buf(),
            env: vars,
            watch,
            extensions: serve
                .extensions
                .iter()
                .map(|e| e.trim_start_matches('.').to_ascii_lowercase())
                .collect(),
            delay,
            grace: duration("[serve].grace", &serve.grace)?,
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::loader::load_from_str;

    const CONFIG: &str = r#"
[paths]
server = ["server/**/*.js"]

[task.lint]
[[task.lint.step]]
kind = "command"
cmd = "jshint {inputs}"
src = ["@server"]

[task.test]
after = ["lint"]

[[watch]]
paths = ["@server"]
tasks = ["lint"]

[serve]
command = "node server/server.js"
watch = ["@server"]
extensions = [".JS", "html"]
delay = "1s"
vars = { PORT = "7200" }
[serve.env.dev]
tasks = ["lint", "test"]
root = "client"
"#;

    #[test]
    fn registry_mirrors_tasks() {
        let cfg = load_from_str(CONFIG).unwrap();
        let registry = build_registry(&cfg).unwrap();
        assert_eq!(registry.len(), 2);
        assert_eq!(registry.prerequisites_of("test"), Some(&["lint".to_string()][..]));
        assert!(registry.get("lint").unwrap().action.is_some());
        assert!(registry.get("test").unwrap().action.is_none());
    }

    #[test]
    fn unnamed_watch_groups_get_an_index_name() {
        let cfg = load_from_str(CONFIG).unwrap();
        let groups = build_watch_groups(&cfg).unwrap();
        assert_eq!(groups[0].name, "watch[0]");
        assert!(groups[0].paths.matches("server/routes.js"));
    }

    #[test]
    fn serve_plan_sets_env_var_and_normalizes_extensions() {
        let cfg = load_from_str(CONFIG).unwrap();
        let plan = serve_plan(&cfg, "dev", Path::new("/proj")).unwrap();
        assert_eq!(plan.server.env.get("NODE_ENV").map(String::as_str), Some("dev"));
        assert_eq!(plan.server.env.get("PORT").map(String::as_str), Some("7200"));
        assert_eq!(plan.server.extensions, vec!["js".to_string(), "html".to_string()]);
        assert_eq!(plan.server.delay, Duration::from_secs(1));
        assert_eq!(plan.tasks, vec!["lint".to_string(), "test".to_string()]);
    }

    #[test]
    fn unknown_environment_lists_the_known_ones() {
        let cfg = load_from_str(CONFIG).unwrap();
        let err = serve_plan(&cfg, "prod", Path::new("/proj")).unwrap_err();
        assert!(err.to_string().contains("known: dev"));
    }
}
