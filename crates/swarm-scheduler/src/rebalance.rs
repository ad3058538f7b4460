//! Load rebalancing.
//!
//! Load is `active_tasks / max_concurrent_tasks` per active node. A move
//! takes one scheduled (not yet running) task off the most-loaded node and
//! puts it on the least-loaded node that passes the filter; moves are only
//! made while each one strictly lowers the standard deviation of load.

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use swarm_core::{NodeId, TaskId, TaskStatus};
use swarm_state::SwarmState;

use crate::filter;
use crate::scheduler::{TaskScheduler, release_on_node};

const EPSILON: f64 = 1e-12;

/// One task moved between nodes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Move {
    pub task_id: TaskId,
    pub from: NodeId,
    pub to: NodeId,
}

/// Load of every active node, in insertion order.
pub fn node_loads(state: &SwarmState) -> Vec<(NodeId, f64)> {
    state.active_nodes().map(|n| (n.id.clone(), n.load())).collect()
}

/// Population standard deviation of active node load; 0.0 without nodes.
pub fn load_deviation(state: &SwarmState) -> f64 {
    std_dev(node_loads(state).iter().map(|(_, load)| *load))
}

fn std_dev(values: impl Iterator<Item = f64>) -> f64 {
    let values: Vec<f64> = values.collect();
    if values.is_empty() {
        return 0.0;
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    (values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n).sqrt()
}

/// First entry with the highest (or lowest) load.
fn extreme(loads: &[(NodeId, f64)], highest: bool) -> Option<&(NodeId, f64)> {
    loads.iter().fold(None, |best: Option<&(NodeId, f64)>, entry| match best {
        Some(b) if (highest && entry.1 <= b.1) || (!highest && entry.1 >= b.1) => Some(b),
        _ => Some(entry),
    })
}

impl TaskScheduler {
    /// Move scheduled tasks off hot nodes until no move lowers the load
    /// deviation. Returns the moves made.
    pub fn rebalance(&self, state: &mut SwarmState, now_ms: u64) -> Vec<Move> {
        let before = load_deviation(state);
        let limit = state.tasks.len();
        let mut moves = Vec::new();

        while moves.len() < limit {
            let Some(next) = best_move(state) else { break };
            apply_move(state, &next, now_ms);
            debug!(task_id = %next.task_id, from = %next.from, to = %next.to, "task moved");
            moves.push(next);
        }

        if !moves.is_empty() {
            info!(moves = moves.len(), before, after = load_deviation(state), "load rebalanced");
        }
        moves
    }
}

/// The first move off the most-loaded node that lowers the deviation.
fn best_move(state: &SwarmState) -> Option<Move> {
    let loads = node_loads(state);
    let current = std_dev(loads.iter().map(|(_, l)| *l));
    let (source, _) = extreme(&loads, true)?;

    let movable = state
        .tasks_on_node(source)
        .filter(|t| t.status == TaskStatus::Scheduled);
    for task in movable {
        let targets: Vec<(NodeId, f64)> = loads
            .iter()
            .filter(|(id, _)| id != source)
            .filter(|(id, _)| {
                state
                    .nodes
                    .get(id)
                    .is_some_and(|node| filter::check(node, task, state).is_ok())
            })
            .cloned()
            .collect();
        let Some((target, _)) = extreme(&targets, false) else {
            continue;
        };

        let projected = loads.iter().map(|(id, load)| {
            let max = state
                .nodes
                .get(id)
                .map(|n| n.capabilities.max_concurrent_tasks.max(1) as f64)
                .unwrap_or(1.0);
            if id == source {
                load - 1.0 / max
            } else if id == target {
                load + 1.0 / max
            } else {
                *load
            }
        });
        if std_dev(projected) < current - EPSILON {
            return Some(Move {
                task_id: task.id.clone(),
                from: source.clone(),
                to: target.clone(),
            });
        }
    }
    None
}

fn apply_move(state: &mut SwarmState, m: &Move, now_ms: u64) {
    let Ok(task) = state.task_mut(&m.task_id) else { return };
    for node in task.assigned_nodes.iter_mut().filter(|n| **n == m.from) {
        node.clone_from(&m.to);
    }
    task.delivered = false;
    task.scheduled_at_ms = Some(now_ms);
    let request = task.requirements.resources.clone();

    release_on_node(state, &m.from, &m.task_id, &request);
    if let Ok(node) = state.node_mut(&m.to) {
        node.resources.reserve(&request);
        node.status.active_tasks.push(m.task_id.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheduler::tests::{add_node, submit};
    use crate::SchedulerConfig;
    use swarm_core::TaskSpec;

    #[test]
    fn deviation_of_uniform_load_is_zero() {
        let mut state = SwarmState::new();
        add_node(&mut state, "a", 4);
        add_node(&mut state, "b", 4);
        assert_eq!(load_deviation(&state), 0.0);
        assert_eq!(load_deviation(&SwarmState::new()), 0.0);
    }

    #[test]
    fn new_node_takes_load_until_balanced() {
        let s = TaskScheduler::new(SchedulerConfig::default());
        let mut state = SwarmState::new();
        add_node(&mut state, "w1", 10);
        for i in 0..8 {
            let id = format!("t{i}");
            submit(&s, &mut state, &id, TaskSpec::new("build"));
            s.schedule(&mut state, &id, 0).unwrap();
        }
        add_node(&mut state, "w2", 5);
        assert!((load_deviation(&state) - 0.4).abs() < 1e-9);

        let moves = s.rebalance(&mut state, 100);

        assert_eq!(moves.len(), 3);
        assert!(moves.iter().all(|m| m.from == "w1" && m.to == "w2"));
        assert!((load_deviation(&state) - 0.05).abs() < 1e-9);
        let w2 = state.node("w2").unwrap();
        assert_eq!(w2.status.active_tasks.len(), 3);
        let moved = state.task(&moves[0].task_id).unwrap();
        assert_eq!(moved.assigned_nodes, vec!["w2"]);
        assert!(!moved.delivered);
    }

    #[test]
    fn running_tasks_stay_put() {
        let s = TaskScheduler::new(SchedulerConfig::default());
        let mut state = SwarmState::new();
        add_node(&mut state, "w1", 4);
        for i in 0..3 {
            let id = format!("t{i}");
            submit(&s, &mut state, &id, TaskSpec::new("build"));
            s.schedule(&mut state, &id, 0).unwrap();
            s.start(&mut state, &id, 0).unwrap();
        }
        add_node(&mut state, "w2", 4);

        assert!(s.rebalance(&mut state, 1).is_empty());
    }

    #[test]
    fn balanced_swarm_makes_no_moves() {
        let s = TaskScheduler::new(SchedulerConfig::default());
        let mut state = SwarmState::new();
        add_node(&mut state, "a", 4);
        add_node(&mut state, "b", 4);
        for i in 0..2 {
            let id = format!("t{i}");
            submit(&s, &mut state, &id, TaskSpec::new("build"));
            s.schedule(&mut state, &id, 0).unwrap();
        }
        assert!(s.rebalance(&mut state, 1).is_empty());
    }
}
