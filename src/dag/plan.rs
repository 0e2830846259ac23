// src/dag/plan.rs

//! Depth-first closure over prerequisites, shared by the runner and config
//! validation.

use std::collections::HashMap;

use crate::engine::TaskName;
use crate::errors::ConfigurationError;

#[derive(Clone, Copy, PartialEq, Eq)]
enum Mark {
    Visiting,
    Done,
}

/// Collect `roots` and all their transitive prerequisites.
///
/// The result lists every task once, each after all of its prerequisites.
/// `deps_of` returns `None` for unknown names, which become `UnknownTask`; a
/// back edge becomes `CyclicDependency` carrying the cycle, first node
/// repeated at the end.
pub fn closure<'a, F>(roots: &[TaskName], deps_of: F) -> Result<Vec<TaskName>, ConfigurationError>
where
    F: Fn(&str) -> Option<&'a [TaskName]>,
{
    let mut marks: HashMap<TaskName, Mark> = HashMap::new();
    let mut path: Vec<TaskName> = Vec::new();
    let mut order: Vec<TaskName> = Vec::new();

    for root in roots {
        visit(root, &deps_of, &mut marks, &mut path, &mut order)?;
    }
    Ok(order)
}

fn visit<'a, F>(
    name: &str,
    deps_of: &F,
    marks: &mut HashMap<TaskName, Mark>,
    path: &mut Vec<TaskName>,
    order: &mut Vec<TaskName>,
) -> Result<(), ConfigurationError>
where
    F: Fn(&str) -> Option<&'a [TaskName]>,
{
    match marks.get(name) {
        Some(Mark::Done) => return Ok(()),
        Some(Mark::Visiting) => {
            let start = path.iter().position(|p| p == name).unwrap_or(0);
            let mut cycle = path[start..].to_vec();
            cycle.push(name.to_string());
            return Err(ConfigurationError::CyclicDependency(cycle));
        }
        None => {}
    }

    let deps = deps_of(name).ok_or_else(|| ConfigurationError::UnknownTask(name.to_string()))?;

    marks.insert(name.to_string(), Mark::Visiting);
    path.push(name.to_string());
    for dep in deps {
        visit(dep, deps_of, marks, path, order)?;
    }
    path.pop();
    marks.insert(name.to_string(), Mark::Done);
    order.push(name.to_string());
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;

    fn graph(edges: &[(&str, &[&str])]) -> BTreeMap<TaskName, Vec<TaskName>> {
        edges
            .iter()
            .map(|(n, deps)| (n.to_string(), deps.iter().map(|d| d.to_string()).collect()))
            .collect()
    }

    #[test]
    fn prerequisites_come_first_and_shared_ones_once() {
        let g = graph(&[
            ("stage", &["js", "css"]),
            ("js", &["lint", "templates"]),
            ("css", &["lint"]),
            ("lint", &[]),
            ("templates", &[]),
            ("unrelated", &[]),
        ]);
        let order = closure(&["stage".to_string()], |n| g.get(n).map(|v| v.as_slice())).unwrap();

        assert_eq!(order, vec!["lint", "templates", "js", "css", "stage"]);
    }

    #[test]
    fn cycle_is_reported_with_its_path() {
        let g = graph(&[("a", &["b"]), ("b", &["c"]), ("c", &["b"])]);
        let err = closure(&["a".to_string()], |n| g.get(n).map(|v| v.as_slice())).unwrap_err();
        assert_eq!(
            err,
            ConfigurationError::CyclicDependency(vec!["b".into(), "c".into(), "b".into()])
        );
    }

    #[test]
    fn unknown_root_is_unknown_task() {
        let g = graph(&[("a", &[])]);
        let err = closure(&["nope".to_string()], |n| g.get(n).map(|v| v.as_slice())).unwrap_err();
        assert_eq!(err, ConfigurationError::UnknownTask("nope".into()));
    }
}
