// tests/scheduler_properties.rs

use std::collections::{BTreeSet, HashSet};

use proptest::prelude::*;
use assetdag::dag::{Registry, Scheduler, TaskRunState};
use assetdag::engine::TaskOutcome;
use assetdag::errors::TransformError;
use assetdag_test_utils::builders::registry;

/// Random DAG: task N may only depend on tasks 0..N, so it is acyclic.
fn dag_strategy(max_tasks: usize) -> impl Strategy<Value = Vec<Vec<usize>>> {
    (1..=max_tasks).prop_flat_map(|num_tasks| {
        proptest::collection::vec(proptest::collection::vec(any::<usize>(), 0..4), num_tasks)
            .prop_map(|raw| {
                raw.into_iter()
                    .enumerate()
                    .map(|(i, deps)| {
                        let set: BTreeSet<usize> = if i == 0 {
                            BTreeSet::new()
                        } else {
                            deps.into_iter().map(|d| d % i).collect()
                        };
                        set.into_iter().collect()
                    })
                    .collect()
            })
    })
}

fn build(deps: &[Vec<usize>]) -> Registry {
    let names: Vec<String> = (0..deps.len()).map(|i| format!("task_{i}")).collect();
    let after: Vec<Vec<&str>> = deps
        .iter()
        .map(|d| d.iter().map(|j| names[*j].as_str()).collect())
        .collect();
    let spec: Vec<(&str, &[&str])> = names
        .iter()
        .zip(after.iter())
        .map(|(n, a)| (n.as_str(), a.as_slice()))
        .collect();
    registry(&spec)
}

/// Drive a run to completion, completing running tasks FIFO. Returns the
/// start order.
fn simulate(
    scheduler: &mut Scheduler,
    registry: &Registry,
    failing: &HashSet<String>,
) -> Result<Vec<String>, TestCaseError> {
    let mut started = Vec::new();
    let mut running: Vec<String> = scheduler
        .start()
        .newly_scheduled
        .into_iter()
        .map(|t| t.name)
        .collect();

    let mut guard = 0;
    while let Some(task) = (!running.is_empty()).then(|| running.remove(0)) {
        guard += 1;
        prop_assert!(guard < 10_000, "simulation did not terminate");

        for dep in registry.prerequisites_of(&task).unwrap_or(&[]) {
            prop_assert_eq!(
                scheduler.run_state_of(dep),
                TaskRunState::DoneSuccess,
                "{} started before {} succeeded",
                task,
                dep
            );
        }
        started.push(task.clone());

        let outcome = if failing.contains(&task) {
            TaskOutcome::Failed(TransformError::new("fake", "boom"))
        } else {
            TaskOutcome::Success
        };
        running.extend(
            scheduler
                .handle_completion(&task, outcome)
                .into_iter()
                .map(|t| t.name),
        );
    }
    Ok(started)
}

proptest! {
    #[test]
    fn every_task_in_closure_runs_exactly_once(
        deps in dag_strategy(12),
        root in any::<usize>(),
    ) {
        let registry = build(&deps);
        let root = format!("task_{}", root % deps.len());
        let closure = registry.closure(&[root.clone()]).unwrap();

        let mut scheduler = Scheduler::plan(&registry, &[root], 1).unwrap();
        let started = simulate(&mut scheduler, &registry, &HashSet::new())?;

        prop_assert!(scheduler.is_finished());
        let mut sorted_started = started.clone();
        sorted_started.sort();
        let mut sorted_closure = closure.clone();
        sorted_closure.sort();
        prop_assert_eq!(sorted_started, sorted_closure);
    }

    #[test]
    fn failures_halt_the_run_and_are_reported_alone(
        deps in dag_strategy(12),
        root in any::<usize>(),
        failing_idx in proptest::collection::vec(any::<usize>(), 1..3),
    ) {
        let registry = build(&deps);
        let root = format!("task_{}", root % deps.len());
        let failing: HashSet<String> = failing_idx
            .iter()
            .map(|i| format!("task_{}", i % deps.len()))
            .collect();

        let mut scheduler = Scheduler::plan(&registry, &[root], 1).unwrap();
        let started = simulate(&mut scheduler, &registry, &failing)?;
        prop_assert!(scheduler.is_finished());

        let started_set: HashSet<&String> = started.iter().collect();
        let reported: Vec<String> = scheduler.failures().iter().map(|f| f.task.clone()).collect();
        for task in &reported {
            prop_assert!(failing.contains(task));
            prop_assert!(started_set.contains(task));
        }
        for task in failing.iter().filter(|t| started_set.contains(t)) {
            prop_assert!(reported.contains(task));
        }
    }
}
