// src/config/validate.rs

use std::net::SocketAddr;

use petgraph::algo::toposort;
use petgraph::graphmap::DiGraphMap;

use crate::config::model::{ConfigFile, RawConfigFile};
use crate::dag::plan;
use crate::errors::ConfigurationError;
use crate::paths::{CompiledPathSet, PathCatalog};
use crate::transform::build_step;
use crate::types::parse_duration;

type Result<T> = std::result::Result<T, ConfigurationError>;

impl TryFrom<RawConfigFile> for ConfigFile {
    type Error = ConfigurationError;

    fn try_from(raw: RawConfigFile) -> Result<Self> {
        validate_raw_config(&raw)?;
        Ok(ConfigFile::new_unchecked(raw))
    }
}

fn validate_raw_config(cfg: &RawConfigFile) -> Result<()> {
    ensure_has_tasks(cfg)?;
    validate_global_config(cfg)?;
    validate_task_dependencies(cfg)?;
    validate_dag(cfg)?;

    let catalog = PathCatalog::new(cfg.config.stage.clone(), cfg.paths.clone());
    validate_path_sets(cfg, &catalog)?;
    validate_steps(cfg, &catalog)?;
    validate_watch_groups(cfg, &catalog)?;
    validate_serve(cfg, &catalog)?;
    validate_livereload(cfg)?;
    Ok(())
}

fn invalid(msg: String) -> ConfigurationError {
    ConfigurationError::Invalid(msg)
}

fn ensure_has_tasks(cfg: &RawConfigFile) -> Result<()> {
    if cfg.task.is_empty() {
        return Err(invalid(
            "config must contain at least one [task.<name>] section".to_string(),
        ));
    }
    Ok(())
}

fn validate_global_config(cfg: &RawConfigFile) -> Result<()> {
    if cfg.config.stage.trim().trim_matches('/').is_empty() {
        return Err(invalid("[config].stage must not be empty".to_string()));
    }
    parse_duration(&cfg.config.debounce)
        .map_err(|e| invalid(format!("[config].debounce: {e}")))?;
    Ok(())
}

fn validate_task_dependencies(cfg: &RawConfigFile) -> Result<()> {
    for (name, task) in cfg.task.iter() {
        for dep in task.after.iter() {
            if dep == name {
                return Err(ConfigurationError::CyclicDependency(vec![
                    name.clone(),
                    name.clone(),
                ]));
            }
            if !cfg.task.contains_key(dep) {
                return Err(ConfigurationError::UnknownTask(dep.clone()));
            }
        }
    }
    Ok(())
}

fn validate_dag(cfg: &RawConfigFile) -> Result<()> {
    // Edge direction: dep -> task.
    let mut graph: DiGraphMap<&str, ()> = DiGraphMap::new();

    for name in cfg.task.keys() {
        graph.add_node(name.as_str());
    }
    for (name, task) in cfg.task.iter() {
        for dep in task.after.iter() {
            graph.add_edge(dep.as_str(), name.as_str(), ());
        }
    }

    match toposort(&graph, None) {
        Ok(_order) => Ok(()),
        Err(cycle) => {
            // toposort only names one node; walk from it to report the path.
            let node = cycle.node_id().to_string();
            match plan::closure(std::slice::from_ref(&node), |n| {
                cfg.task.get(n).map(|t| t.after.as_slice())
            }) {
                Err(err) => Err(err),
                Ok(_) => Err(ConfigurationError::CyclicDependency(vec![node])),
            }
        }
    }
}

fn validate_path_sets(cfg: &RawConfigFile, catalog: &PathCatalog) -> Result<()> {
    for name in cfg.paths.keys() {
        catalog.named(name)?.compile()?;
    }
    Ok(())
}

fn validate_steps(cfg: &RawConfigFile, catalog: &PathCatalog) -> Result<()> {
    for (name, task) in cfg.task.iter() {
        for (index, step) in task.step.iter().enumerate() {
            build_step(name, index, step, catalog)?;
        }
    }
    Ok(())
}

fn validate_watch_groups(cfg: &RawConfigFile, catalog: &PathCatalog) -> Result<()> {
    for (index, group) in cfg.watch.iter().enumerate() {
        let owner = group
            .name
            .clone()
            .unwrap_or_else(|| format!("watch[{index}]"));
        if group.tasks.is_empty() {
            return Err(invalid(format!("watch group '{owner}' has no tasks")));
        }
        for task in &group.tasks {
            if !cfg.task.contains_key(task) {
                return Err(ConfigurationError::UnknownTask(task.clone()));
            }
        }
        let patterns = catalog.expand(&owner, &group.paths)?;
        let compiled = CompiledPathSet::compile(&owner, &patterns)?;
        if compiled.is_empty() {
            return Err(ConfigurationError::MalformedPathSet {
                name: owner,
                reason: "watch group has no include patterns".to_string(),
            });
        }
    }
    Ok(())
}

fn validate_serve(cfg: &RawConfigFile, catalog: &PathCatalog) -> Result<()> {
    let Some(serve) = &cfg.serve else {
        return Ok(());
    };

    if serve.command.trim().is_empty() {
        return Err(invalid("[serve].command must not be empty".to_string()));
    }
    if serve.env.is_empty() {
        return Err(invalid(
            "[serve] needs at least one [serve.env.<name>] section".to_string(),
        ));
    }
    if serve.env_var.trim().is_empty() {
        return Err(invalid("[serve].env_var must not be empty".to_string()));
    }

    if let Some(delay) = &serve.delay {
        parse_duration(delay).map_err(|e| invalid(format!("[serve].delay: {e}")))?;
    }
    parse_duration(&serve.grace).map_err(|e| invalid(format!("[serve].grace: {e}")))?;

    let patterns = catalog.expand("serve", &serve.watch)?;
    CompiledPathSet::compile("serve", &patterns)?;

    for (env, settings) in &serve.env {
        for task in &settings.tasks {
            if !cfg.task.contains_key(task) {
                return Err(ConfigurationError::UnknownTask(task.clone()));
            }
        }
        if settings.root.trim().is_empty() {
            return Err(invalid(format!("[serve.env.{env}].root must not be empty")));
        }
    }
    Ok(())
}

fn validate_livereload(cfg: &RawConfigFile) -> Result<()> {
    if cfg.livereload.enabled {
        cfg.livereload
            .addr
            .parse::<SocketAddr>()
            .map_err(|e| invalid(format!("[livereload].addr '{}': {e}", cfg.livereload.addr)))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(toml_src: &str) -> Result<ConfigFile> {
        let raw: RawConfigFile = toml::from_str(toml_src).unwrap();
        ConfigFile::try_from(raw)
    }

    #[test]
    fn empty_config_is_invalid() {
        let err = parse("").unwrap_err();
        assert!(matches!(err, ConfigurationError::Invalid(_)));
    }

    #[test]
    fn unknown_prerequisite_is_reported_by_name() {
        let err = parse("[task.a]\nafter = [\"ghost\"]\n").unwrap_err();
        assert_eq!(err, ConfigurationError::UnknownTask("ghost".to_string()));
    }

    #[test]
    fn self_dependency_is_a_cycle() {
        let err = parse("[task.a]\nafter = [\"a\"]\n").unwrap_err();
        assert_eq!(
            err,
            ConfigurationError::CyclicDependency(vec!["a".to_string(), "a".to_string()])
        );
    }

    #[test]
    fn cycle_reports_a_closed_path() {
        let err = parse(
            r#"
[task.a]
after = ["c"]
[task.b]
after = ["a"]
[task.c]
after = ["b"]
"#,
        )
        .unwrap_err();
        let ConfigurationError::CyclicDependency(path) = err else {
            panic!("expected a cycle, got {err:?}");
        };
        assert!(path.len() >= 4);
        assert_eq!(path.first(), path.last());
    }

    #[test]
    fn bad_durations_are_invalid() {
        let err = parse("[config]\ndebounce = \"soon\"\n[task.a]\n").unwrap_err();
        assert!(err.to_string().contains("[config].debounce"));
    }

    #[test]
    fn watch_groups_must_reference_known_tasks() {
        let err = parse(
            r#"
[task.css]
[[watch]]
paths = ["client/**/*.css"]
tasks = ["less"]
"#,
        )
        .unwrap_err();
        assert_eq!(err, ConfigurationError::UnknownTask("less".to_string()));
    }

    #[test]
    fn serve_needs_an_environment() {
        let err = parse(
            r#"
[task.a]
[serve]
command = "node server.js"
"#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("serve.env"));
    }

    #[test]
    fn bad_livereload_addr_is_invalid() {
        let err = parse("[task.a]\n[livereload]\naddr = \"nowhere\"\n").unwrap_err();
        assert!(err.to_string().contains("[livereload].addr"));
    }

    #[test]
    fn watch_group_named_after_its_path_set_is_valid() {
        let cfg = parse(
            r#"
[paths]
js = ["client/**/*.js"]
[task.js]
[[watch]]
name = "js"
paths = ["Assetdag.toml", "@js"]
tasks = ["js"]
"#,
        )
        .unwrap();
        assert_eq!(cfg.watch[0].name.as_deref(), Some("js"));
    }
}
