//! Task scheduler: placement decisions and the task lifecycle.

use std::cmp::Reverse;

use tracing::{debug, info, warn};

use swarm_core::{
    Milestone, NodeId, ResourceRequest, SwarmConfig, Task, TaskId, TaskSpec, TaskStatus,
};
use swarm_state::SwarmState;

use crate::error::{SchedulerError, SchedulerResult};
use crate::filter;
use crate::scorer::{self, NodeScore, ScoringWeights};

pub const NO_SUITABLE_NODES: &str = "no suitable nodes";
pub const DEADLINE_EXCEEDED: &str = "deadline exceeded";

#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Minimum replicas for every task.
    pub replication_factor: u32,
    /// Attempts a rescheduled task gets before it is failed.
    pub max_retries: u32,
    /// Runner-up candidates remembered per task.
    pub backup_nodes: u32,
    pub enforce_dependencies: bool,
    pub weights: ScoringWeights,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            replication_factor: 1,
            max_retries: 3,
            backup_nodes: 1,
            enforce_dependencies: false,
            weights: ScoringWeights::default(),
        }
    }
}

impl SchedulerConfig {
    pub fn from_config(config: &SwarmConfig) -> Self {
        Self {
            replication_factor: config.replication_factor,
            max_retries: config.fault_tolerance.max_retries,
            backup_nodes: config.fault_tolerance.backup_nodes,
            enforce_dependencies: config.performance.enforce_dependencies,
            weights: ScoringWeights::default(),
        }
    }
}

/// Outcome of planning one pending task.
#[derive(Debug, Clone, PartialEq)]
pub enum Decision {
    /// Run on `nodes`; `backups` are the runners-up.
    Assign {
        nodes: Vec<NodeId>,
        backups: Vec<NodeId>,
    },
    /// No node passes the filter.
    NoCandidates,
    /// Not schedulable yet; stays pending with `reason`.
    Blocked { reason: String },
    /// The deadline has already passed.
    Expired,
}

pub struct TaskScheduler {
    config: SchedulerConfig,
}

impl TaskScheduler {
    pub fn new(config: SchedulerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    /// Validate `spec` and store it as a pending task.
    pub fn submit(&self, state: &mut SwarmState, id: TaskId, spec: TaskSpec, now_ms: u64) -> SchedulerResult<Task> {
        spec.validate()?;
        let task = Task::from_spec(id, spec, now_ms);
        state.tasks.insert(task.clone())?;
        info!(task_id = %task.id, kind = %task.kind, priority = task.priority, "task submitted");
        Ok(task)
    }

    /// Nodes the task runs on: its own replica count, raised to the swarm's
    /// replication factor.
    pub fn replicas(&self, task: &Task) -> usize {
        task.requirements.replicas.max(self.config.replication_factor) as usize
    }

    /// Every node that passes the filter, best first.
    pub fn candidates(&self, state: &SwarmState, task: &Task) -> Vec<NodeScore> {
        let mut scores = Vec::new();
        for (rank, node) in state.nodes.iter().enumerate() {
            if let Err(rejection) = filter::check(node, task, state) {
                debug!(task_id = %task.id, node_id = %node.id, %rejection, "node filtered out");
                continue;
            }
            let (score, breakdown) = scorer::score_node(node, &self.config.weights);
            scores.push(NodeScore {
                node_id: node.id.clone(),
                score,
                preferred: task.constraints.preferred_nodes.contains(&node.id)
                    || task.backup_nodes.contains(&node.id),
                affinity: filter::has_affinity(node, task, state),
                rank,
                breakdown,
            });
        }
        scorer::rank(&mut scores);
        scores
    }

    /// Decide where a pending task should go. Reads state only.
    pub fn plan(&self, state: &SwarmState, task_id: &str, now_ms: u64) -> SchedulerResult<Decision> {
        let task = state.task(task_id)?;
        if task.status != TaskStatus::Pending {
            return Err(invalid(task, "schedule"));
        }
        if task.deadline_ms.is_some_and(|deadline| now_ms > deadline) {
            return Ok(Decision::Expired);
        }
        if self.config.enforce_dependencies
            && let Some(dep) = task.dependencies.iter().find(|dep| {
                state
                    .tasks
                    .get(dep)
                    .is_none_or(|t| t.status != TaskStatus::Completed)
            })
        {
            return Ok(Decision::Blocked {
                reason: format!("waiting on dependency {dep}"),
            });
        }

        let ranked = self.candidates(state, task);
        if ranked.is_empty() {
            return Ok(Decision::NoCandidates);
        }
        let wanted = self.replicas(task);
        if ranked.len() < wanted {
            warn!(task_id, wanted, available = ranked.len(), "fewer candidates than replicas");
        }

        let mut ids = ranked.into_iter().map(|s| s.node_id);
        let nodes: Vec<NodeId> = ids.by_ref().take(wanted).collect();
        let backups: Vec<NodeId> = ids.take(self.config.backup_nodes as usize).collect();
        Ok(Decision::Assign { nodes, backups })
    }

    /// Commit a decision made by `plan`. Chosen nodes are re-checked, so a
    /// decision that went stale while it was being ratified leaves the task
    /// pending for the next pass.
    pub fn apply(
        &self,
        state: &mut SwarmState,
        task_id: &str,
        decision: Decision,
        now_ms: u64,
    ) -> SchedulerResult<TaskStatus> {
        let task = state.task(task_id)?;
        if task.status != TaskStatus::Pending {
            return Err(invalid(task, "schedule"));
        }

        match decision {
            Decision::Assign { nodes, backups } => {
                let snapshot = task.clone();
                for node_id in &nodes {
                    let verdict = state
                        .node(node_id)
                        .map_err(|_| "node removed".to_string())
                        .and_then(|node| filter::check(node, &snapshot, state).map_err(|r| r.to_string()));
                    if let Err(why) = verdict {
                        debug!(task_id, %node_id, %why, "assignment went stale");
                        state.task_mut(task_id)?.reason =
                            Some(format!("assignment to {node_id} no longer valid: {why}"));
                        return Ok(TaskStatus::Pending);
                    }
                }
                let request = snapshot.requirements.resources;
                for node_id in &nodes {
                    let node = state.node_mut(node_id)?;
                    node.resources.reserve(&request);
                    node.status.active_tasks.push(task_id.to_string());
                }

                let task = state.task_mut(task_id)?;
                task.status = TaskStatus::Scheduled;
                task.assigned_nodes = nodes;
                task.backup_nodes = backups;
                task.scheduled_at_ms = Some(now_ms);
                task.reason = None;
                task.rescheduling = false;
                task.attempts = 0;
                task.delivered = false;
                info!(task_id, nodes = ?task.assigned_nodes, "task scheduled");
                Ok(TaskStatus::Scheduled)
            }
            Decision::NoCandidates => {
                let max_retries = self.config.max_retries;
                let task = state.task_mut(task_id)?;
                task.attempts += 1;
                if task.rescheduling && task.attempts < max_retries {
                    debug!(task_id, attempts = task.attempts, "no candidates; task stays pending");
                    task.reason = Some(NO_SUITABLE_NODES.to_string());
                    return Ok(TaskStatus::Pending);
                }
                let reason = if task.rescheduling {
                    format!("{NO_SUITABLE_NODES} after {} attempts", task.attempts)
                } else {
                    NO_SUITABLE_NODES.to_string()
                };
                fail(task, reason, now_ms);
                Ok(TaskStatus::Failed)
            }
            Decision::Blocked { reason } => {
                debug!(task_id, %reason, "task blocked");
                state.task_mut(task_id)?.reason = Some(reason);
                Ok(TaskStatus::Pending)
            }
            Decision::Expired => {
                fail(state.task_mut(task_id)?, DEADLINE_EXCEEDED.to_string(), now_ms);
                Ok(TaskStatus::Failed)
            }
        }
    }

    /// Plan and apply in one step, for callers that need no ratification.
    pub fn schedule(&self, state: &mut SwarmState, task_id: &str, now_ms: u64) -> SchedulerResult<TaskStatus> {
        let decision = self.plan(state, task_id, now_ms)?;
        self.apply(state, task_id, decision, now_ms)
    }

    /// Pending task ids, highest priority first, then submission order.
    pub fn pending_queue(&self, state: &SwarmState) -> Vec<TaskId> {
        let mut pending: Vec<&Task> = state.tasks_with_status(TaskStatus::Pending).collect();
        pending.sort_by_key(|t| Reverse(t.priority));
        pending.into_iter().map(|t| t.id.clone()).collect()
    }

    /// Scheduled tasks whose assignment has not reached their nodes.
    pub fn undelivered(&self, state: &SwarmState) -> Vec<TaskId> {
        state
            .tasks_with_status(TaskStatus::Scheduled)
            .filter(|t| !t.delivered)
            .map(|t| t.id.clone())
            .collect()
    }

    pub fn start(&self, state: &mut SwarmState, task_id: &str, now_ms: u64) -> SchedulerResult<()> {
        let task = state.task_mut(task_id)?;
        if task.status != TaskStatus::Scheduled {
            return Err(invalid(task, "start"));
        }
        task.status = TaskStatus::Running;
        task.started_at_ms = Some(now_ms);
        info!(task_id, "task started");
        Ok(())
    }

    /// Finish a scheduled or running task and credit its nodes.
    pub fn complete(
        &self,
        state: &mut SwarmState,
        task_id: &str,
        success: bool,
        duration_ms: u64,
        now_ms: u64,
    ) -> SchedulerResult<TaskStatus> {
        let task = state.task(task_id)?;
        if !task.status.holds_assignment() {
            return Err(invalid(task, "complete"));
        }
        let nodes = task.assigned_nodes.clone();
        for node_id in &nodes {
            if let Ok(node) = state.node_mut(node_id) {
                let uptime_ms = now_ms.saturating_sub(node.joined_at_ms);
                node.status.performance.record(success, duration_ms, uptime_ms);
            }
        }
        release_assignment(state, task_id)?;

        let task = state.task_mut(task_id)?;
        task.finished_at_ms = Some(now_ms);
        if success {
            task.status = TaskStatus::Completed;
            task.progress.percentage = 100.0;
            info!(task_id, duration_ms, "task completed");
        } else {
            task.status = TaskStatus::Failed;
            task.reason = Some("reported failed".to_string());
            warn!(task_id, duration_ms, "task failed");
        }
        Ok(task.status)
    }

    pub fn cancel(&self, state: &mut SwarmState, task_id: &str, now_ms: u64) -> SchedulerResult<()> {
        let task = state.task(task_id)?;
        if task.status.is_terminal() {
            return Err(invalid(task, "cancel"));
        }
        release_assignment(state, task_id)?;
        let task = state.task_mut(task_id)?;
        task.status = TaskStatus::Cancelled;
        task.finished_at_ms = Some(now_ms);
        info!(task_id, "task cancelled");
        Ok(())
    }

    pub fn update_progress(
        &self,
        state: &mut SwarmState,
        task_id: &str,
        percentage: f64,
        phase: Option<String>,
        milestone: Option<String>,
        now_ms: u64,
    ) -> SchedulerResult<()> {
        let task = state.task_mut(task_id)?;
        if task.status.is_terminal() {
            return Err(invalid(task, "update progress of"));
        }
        task.progress.percentage = percentage.clamp(0.0, 100.0);
        if let Some(phase) = phase {
            task.progress.phase = phase;
        }
        if let Some(name) = milestone {
            task.progress.milestones.push(Milestone {
                name,
                reached_at_ms: now_ms,
            });
        }
        debug!(task_id, percentage = task.progress.percentage, "task progress");
        Ok(())
    }

    pub fn mark_delivered(&self, state: &mut SwarmState, task_id: &str, delivered: bool) -> SchedulerResult<()> {
        state.task_mut(task_id)?.delivered = delivered;
        Ok(())
    }

    /// Strip `node_id` from every task it holds. Tasks left without nodes go
    /// back to pending; their ids are returned in submission order.
    pub fn reassign(&self, state: &mut SwarmState, node_id: &str, now_ms: u64) -> Vec<TaskId> {
        let held: Vec<TaskId> = state
            .tasks_on_node(node_id)
            .filter(|t| t.status.holds_assignment())
            .map(|t| t.id.clone())
            .collect();

        let mut returned = Vec::new();
        for task_id in held {
            let Ok(task) = state.task_mut(&task_id) else { continue };
            task.assigned_nodes.retain(|n| n != node_id);
            let request = task.requirements.resources.clone();
            let orphaned = task.assigned_nodes.is_empty();
            if orphaned {
                task.status = TaskStatus::Pending;
                task.rescheduling = true;
                task.attempts = 0;
                task.delivered = false;
                task.scheduled_at_ms = None;
                task.started_at_ms = None;
                task.reason = Some(format!("node {node_id} lost"));
                returned.push(task_id.clone());
            }
            release_on_node(state, node_id, &task_id, &request);
            debug!(%task_id, node_id, orphaned, now_ms, "task unassigned from node");
        }
        if !returned.is_empty() {
            info!(node_id, tasks = returned.len(), "tasks returned to queue");
        }
        returned
    }
}

fn invalid(task: &Task, action: &'static str) -> SchedulerError {
    SchedulerError::InvalidTransition {
        task_id: task.id.clone(),
        status: task.status,
        action,
    }
}

fn fail(task: &mut Task, reason: String, now_ms: u64) {
    warn!(task_id = %task.id, %reason, "task failed");
    task.status = TaskStatus::Failed;
    task.reason = Some(reason);
    task.finished_at_ms = Some(now_ms);
}

/// Give back everything the task holds and clear its node list.
fn release_assignment(state: &mut SwarmState, task_id: &str) -> SchedulerResult<()> {
    let task = state.task_mut(task_id)?;
    let nodes = std::mem::take(&mut task.assigned_nodes);
    let request = task.requirements.resources.clone();
    for node_id in &nodes {
        release_on_node(state, node_id, task_id, &request);
    }
    Ok(())
}

pub(crate) fn release_on_node(state: &mut SwarmState, node_id: &str, task_id: &str, request: &ResourceRequest) {
    if let Ok(node) = state.node_mut(node_id) {
        node.resources.release(request);
        node.status.active_tasks.retain(|t| t != task_id);
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use swarm_core::{Node, NodeSpec, NodeStatus};

    pub(crate) fn add_node(state: &mut SwarmState, id: &str, max_tasks: u32) {
        let spec = NodeSpec::default().with_max_tasks(max_tasks).with_domain("rust");
        let mut node = Node::from_spec(id.to_string(), spec, 3, 0);
        node.status.state = NodeStatus::Active;
        state.nodes.insert(node).unwrap();
    }

    pub(crate) fn submit(scheduler: &TaskScheduler, state: &mut SwarmState, id: &str, spec: TaskSpec) {
        scheduler.submit(state, id.to_string(), spec, 0).unwrap();
    }

    fn scheduler() -> TaskScheduler {
        TaskScheduler::new(SchedulerConfig::default())
    }

    #[test]
    fn submit_rejects_invalid_spec() {
        let mut state = SwarmState::new();
        let err = scheduler().submit(&mut state, "t1".into(), TaskSpec::default(), 0).unwrap_err();
        assert!(matches!(err, SchedulerError::Validation(_)));
        assert!(state.tasks.is_empty());
    }

    #[test]
    fn schedules_on_least_loaded_node() {
        let s = scheduler();
        let mut state = SwarmState::new();
        add_node(&mut state, "a", 4);
        add_node(&mut state, "b", 4);
        submit(&s, &mut state, "t1", TaskSpec::new("build").requiring("rust"));
        submit(&s, &mut state, "t2", TaskSpec::new("build").requiring("rust"));

        assert_eq!(s.schedule(&mut state, "t1", 10).unwrap(), TaskStatus::Scheduled);
        assert_eq!(s.schedule(&mut state, "t2", 10).unwrap(), TaskStatus::Scheduled);

        assert_eq!(state.task("t1").unwrap().assigned_nodes, vec!["a"]);
        assert_eq!(state.task("t2").unwrap().assigned_nodes, vec!["b"]);
        assert_eq!(state.task("t1").unwrap().backup_nodes, vec!["b"]);
        assert_eq!(state.node("a").unwrap().status.active_tasks, vec!["t1"]);
        assert_eq!(state.task("t1").unwrap().scheduled_at_ms, Some(10));
    }

    #[test]
    fn reserves_resources_on_each_replica() {
        let s = scheduler();
        let mut state = SwarmState::new();
        add_node(&mut state, "a", 4);
        add_node(&mut state, "b", 4);
        let mut spec = TaskSpec::new("build");
        spec.requirements.replicas = 2;
        spec.requirements.resources.cpu = 1.5;
        submit(&s, &mut state, "t1", spec);

        s.schedule(&mut state, "t1", 0).unwrap();
        assert_eq!(state.task("t1").unwrap().assigned_nodes.len(), 2);
        for id in ["a", "b"] {
            assert_eq!(state.node(id).unwrap().resources.cpu.used, 1.5);
        }

        s.complete(&mut state, "t1", true, 100, 1_000).unwrap();
        for id in ["a", "b"] {
            let node = state.node(id).unwrap();
            assert_eq!(node.resources.cpu.used, 0.0);
            assert!(node.status.active_tasks.is_empty());
            assert_eq!(node.status.performance.completed, 1);
        }
        assert!(state.task("t1").unwrap().assigned_nodes.is_empty());
    }

    #[test]
    fn replication_factor_raises_replicas() {
        let s = TaskScheduler::new(SchedulerConfig {
            replication_factor: 3,
            ..SchedulerConfig::default()
        });
        let task = Task::from_spec("t".into(), TaskSpec::new("build"), 0);
        assert_eq!(s.replicas(&task), 3);
    }

    #[test]
    fn no_candidates_fails_fresh_task() {
        let s = scheduler();
        let mut state = SwarmState::new();
        add_node(&mut state, "a", 4);
        submit(&s, &mut state, "t1", TaskSpec::new("build").requiring("cobol"));

        assert_eq!(s.schedule(&mut state, "t1", 0).unwrap(), TaskStatus::Failed);
        let task = state.task("t1").unwrap();
        assert_eq!(task.reason.as_deref(), Some(NO_SUITABLE_NODES));
        // Not retried.
        assert!(s.pending_queue(&state).is_empty());
    }

    #[test]
    fn deadline_in_the_past_fails() {
        let s = scheduler();
        let mut state = SwarmState::new();
        add_node(&mut state, "a", 4);
        let mut spec = TaskSpec::new("build");
        spec.deadline_ms = Some(50);
        submit(&s, &mut state, "t1", spec);

        assert_eq!(s.schedule(&mut state, "t1", 100).unwrap(), TaskStatus::Failed);
        assert_eq!(state.task("t1").unwrap().reason.as_deref(), Some(DEADLINE_EXCEEDED));
    }

    #[test]
    fn pending_queue_orders_by_priority_then_submission() {
        let s = scheduler();
        let mut state = SwarmState::new();
        submit(&s, &mut state, "low", TaskSpec::new("x").with_priority(1));
        submit(&s, &mut state, "high", TaskSpec::new("x").with_priority(9));
        submit(&s, &mut state, "low2", TaskSpec::new("x").with_priority(1));

        assert_eq!(s.pending_queue(&state), vec!["high", "low", "low2"]);
    }

    #[test]
    fn reassign_returns_orphaned_tasks_and_retries_then_fails() {
        let s = TaskScheduler::new(SchedulerConfig {
            max_retries: 2,
            ..SchedulerConfig::default()
        });
        let mut state = SwarmState::new();
        add_node(&mut state, "a", 4);
        submit(&s, &mut state, "t1", TaskSpec::new("build"));
        s.schedule(&mut state, "t1", 0).unwrap();
        s.start(&mut state, "t1", 5).unwrap();

        state.node_mut("a").unwrap().status.state = NodeStatus::Failed;
        assert_eq!(s.reassign(&mut state, "a", 10), vec!["t1"]);
        let task = state.task("t1").unwrap();
        assert_eq!(task.status, TaskStatus::Pending);
        assert!(task.rescheduling);
        assert!(state.node("a").unwrap().status.active_tasks.is_empty());

        // No other node: stays pending for the first attempt, then fails.
        assert_eq!(s.schedule(&mut state, "t1", 20).unwrap(), TaskStatus::Pending);
        assert_eq!(state.task("t1").unwrap().reason.as_deref(), Some(NO_SUITABLE_NODES));
        assert_eq!(s.schedule(&mut state, "t1", 30).unwrap(), TaskStatus::Failed);
    }

    #[test]
    fn reassigned_task_moves_to_backup() {
        let s = scheduler();
        let mut state = SwarmState::new();
        add_node(&mut state, "a", 4);
        add_node(&mut state, "b", 4);
        add_node(&mut state, "c", 4);
        submit(&s, &mut state, "t1", TaskSpec::new("build"));
        s.schedule(&mut state, "t1", 0).unwrap();
        assert_eq!(state.task("t1").unwrap().backup_nodes, vec!["b"]);

        // b and c score the same; a remembered backup beats insertion order.
        state.task_mut("t1").unwrap().backup_nodes = vec!["c".to_string()];
        state.node_mut("a").unwrap().status.state = NodeStatus::Failed;
        s.reassign(&mut state, "a", 1);
        s.schedule(&mut state, "t1", 2).unwrap();
        assert_eq!(state.task("t1").unwrap().assigned_nodes, vec!["c"]);
    }

    #[test]
    fn partial_loss_keeps_task_scheduled() {
        let s = scheduler();
        let mut state = SwarmState::new();
        add_node(&mut state, "a", 4);
        add_node(&mut state, "b", 4);
        let mut spec = TaskSpec::new("build");
        spec.requirements.replicas = 2;
        submit(&s, &mut state, "t1", spec);
        s.schedule(&mut state, "t1", 0).unwrap();

        assert!(s.reassign(&mut state, "a", 1).is_empty());
        let task = state.task("t1").unwrap();
        assert_eq!(task.status, TaskStatus::Scheduled);
        assert_eq!(task.assigned_nodes, vec!["b"]);
    }

    #[test]
    fn stale_assignment_leaves_task_pending() {
        let s = scheduler();
        let mut state = SwarmState::new();
        add_node(&mut state, "a", 4);
        submit(&s, &mut state, "t1", TaskSpec::new("build"));

        let decision = s.plan(&state, "t1", 0).unwrap();
        state.node_mut("a").unwrap().status.state = NodeStatus::Failed;

        assert_eq!(s.apply(&mut state, "t1", decision, 1).unwrap(), TaskStatus::Pending);
        let task = state.task("t1").unwrap();
        assert!(task.assigned_nodes.is_empty());
        assert!(task.reason.as_deref().unwrap().contains("no longer valid"));
    }

    #[test]
    fn enforced_dependencies_block_until_completed() {
        let s = TaskScheduler::new(SchedulerConfig {
            enforce_dependencies: true,
            ..SchedulerConfig::default()
        });
        let mut state = SwarmState::new();
        add_node(&mut state, "a", 4);
        submit(&s, &mut state, "first", TaskSpec::new("build"));
        let mut spec = TaskSpec::new("deploy");
        spec.dependencies.push("first".into());
        submit(&s, &mut state, "second", spec);

        assert_eq!(s.schedule(&mut state, "second", 0).unwrap(), TaskStatus::Pending);
        assert_eq!(
            state.task("second").unwrap().reason.as_deref(),
            Some("waiting on dependency first")
        );

        s.schedule(&mut state, "first", 0).unwrap();
        s.complete(&mut state, "first", true, 10, 10).unwrap();
        assert_eq!(s.schedule(&mut state, "second", 20).unwrap(), TaskStatus::Scheduled);
    }

    #[test]
    fn lifecycle_transitions_are_checked() {
        let s = scheduler();
        let mut state = SwarmState::new();
        add_node(&mut state, "a", 4);
        submit(&s, &mut state, "t1", TaskSpec::new("build"));

        assert!(matches!(
            s.start(&mut state, "t1", 0),
            Err(SchedulerError::InvalidTransition { action: "start", .. })
        ));
        s.schedule(&mut state, "t1", 0).unwrap();
        s.update_progress(&mut state, "t1", 140.0, Some("compile".into()), Some("deps".into()), 3)
            .unwrap();
        let progress = &state.task("t1").unwrap().progress;
        assert_eq!(progress.percentage, 100.0);
        assert_eq!(progress.milestones[0].reached_at_ms, 3);

        s.cancel(&mut state, "t1", 5).unwrap();
        assert_eq!(state.task("t1").unwrap().status, TaskStatus::Cancelled);
        assert!(state.node("a").unwrap().status.active_tasks.is_empty());
        assert!(s.cancel(&mut state, "t1", 6).is_err());
        assert!(matches!(
            s.complete(&mut state, "t1", true, 1, 7),
            Err(SchedulerError::InvalidTransition { .. })
        ));
    }

    #[test]
    fn failed_completion_updates_error_rate() {
        let s = scheduler();
        let mut state = SwarmState::new();
        add_node(&mut state, "a", 4);
        submit(&s, &mut state, "t1", TaskSpec::new("build"));
        s.schedule(&mut state, "t1", 0).unwrap();
        s.start(&mut state, "t1", 0).unwrap();

        assert_eq!(s.complete(&mut state, "t1", false, 50, 2_000).unwrap(), TaskStatus::Failed);
        let perf = &state.node("a").unwrap().status.performance;
        assert_eq!(perf.error_rate, 1.0);
        assert_eq!(perf.failed, 1);
    }

    #[test]
    fn unknown_task_is_not_found() {
        let s = scheduler();
        let mut state = SwarmState::new();
        assert!(matches!(
            s.schedule(&mut state, "ghost", 0),
            Err(SchedulerError::State(_))
        ));
    }
}
