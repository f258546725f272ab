//! Resolve requested stages into an ordered plan before anything runs.

use serde::Serialize;
use std::collections::{HashMap, HashSet, VecDeque};
use std::fmt::Display;
use std::hash::Hash;

use crate::error::{Error, Result};
use crate::stage::Stage;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PlanReason {
    Requested,
    DependencyOf { stage: Stage },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlannedStage {
    pub stage: Stage,
    pub reason: PlanReason,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct RunPlan {
    pub stages: Vec<PlannedStage>,
}

impl RunPlan {
    pub fn stage_names(&self) -> Vec<&'static str> {
        self.stages.iter().map(|p| p.stage.name()).collect()
    }
}

/// Expand requested stages with their dependencies.
///
/// Requested stages always run, in the order given. A dependency is inserted
/// before its dependent unless it already ran earlier in the plan and nothing
/// since has invalidated it.
pub fn resolve(requested: &[Stage]) -> Result<RunPlan> {
    topological_order(&Stage::ALL, |stage| stage.needs().to_vec())?;

    let mut plan = RunPlan::default();
    let mut satisfied: HashSet<Stage> = HashSet::new();

    for &stage in requested {
        push_with_needs(stage, PlanReason::Requested, &mut satisfied, &mut plan);
    }

    Ok(plan)
}

fn push_with_needs(
    stage: Stage,
    reason: PlanReason,
    satisfied: &mut HashSet<Stage>,
    plan: &mut RunPlan,
) {
    for &need in stage.needs() {
        if !satisfied.contains(&need) {
            push_with_needs(need, PlanReason::DependencyOf { stage }, satisfied, plan);
        }
    }

    plan.stages.push(PlannedStage { stage, reason });
    satisfied.insert(stage);
    for invalidated in stage.invalidates() {
        satisfied.remove(invalidated);
    }
}

/// Order nodes so every node follows the nodes it needs (Kahn's algorithm).
///
/// Fails on unknown dependencies and on cycles.
pub fn topological_order<T, F>(nodes: &[T], needs: F) -> Result<Vec<T>>
where
    T: Copy + Eq + Hash + Display,
    F: Fn(T) -> Vec<T>,
{
    let id_index: HashMap<T, usize> = nodes.iter().enumerate().map(|(i, n)| (*n, i)).collect();

    let mut indegree = vec![0usize; nodes.len()];
    let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); nodes.len()];

    for (idx, node) in nodes.iter().enumerate() {
        for need in needs(*node) {
            let Some(&parent_idx) = id_index.get(&need) else {
                return Err(Error::validation_invalid_argument(
                    "stages",
                    format!("Stage '{}' depends on unknown stage '{}'", node, need),
                    None,
                    None,
                ));
            };
            indegree[idx] += 1;
            dependents[parent_idx].push(idx);
        }
    }

    let mut queue: VecDeque<usize> = indegree
        .iter()
        .enumerate()
        .filter(|(_, count)| **count == 0)
        .map(|(idx, _)| idx)
        .collect();

    let mut ordered = Vec::with_capacity(nodes.len());
    while let Some(idx) = queue.pop_front() {
        ordered.push(nodes[idx]);
        for &child in &dependents[idx] {
            indegree[child] -= 1;
            if indegree[child] == 0 {
                queue.push_back(child);
            }
        }
    }

    if ordered.len() != nodes.len() {
        let pending: Vec<String> = nodes
            .iter()
            .enumerate()
            .filter(|(idx, _)| indegree[*idx] > 0)
            .map(|(_, node)| node.to_string())
            .collect();
        return Err(Error::validation_invalid_argument(
            "stages",
            "Stage dependencies contain a cycle",
            None,
            Some(pending),
        ));
    }

    Ok(ordered)
}
