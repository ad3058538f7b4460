//! Hard constraints a node must satisfy to take a task.
//!
//! A task's tag is its `kind`; affinity and anti-affinity compare the
//! task's constraint lists against the kinds of tasks already active on
//! the node.

use std::fmt;

use swarm_core::{Node, Task};
use swarm_state::SwarmState;

/// Why a node was filtered out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rejection {
    NotActive,
    AlreadyAssigned,
    Excluded,
    MissingCapability(String),
    InsufficientResources,
    QualityTooLow,
    ExperienceTooLow,
    ClearanceTooLow,
    NoFreeSlot,
    Region,
    Zone,
    AntiAffinity(String),
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotActive => f.write_str("node not active"),
            Self::AlreadyAssigned => f.write_str("already assigned"),
            Self::Excluded => f.write_str("node excluded"),
            Self::MissingCapability(tag) => write!(f, "missing capability {tag}"),
            Self::InsufficientResources => f.write_str("insufficient resources"),
            Self::QualityTooLow => f.write_str("quality rating too low"),
            Self::ExperienceTooLow => f.write_str("experience too low"),
            Self::ClearanceTooLow => f.write_str("clearance too low"),
            Self::NoFreeSlot => f.write_str("no free task slot"),
            Self::Region => f.write_str("region not allowed"),
            Self::Zone => f.write_str("zone not allowed"),
            Self::AntiAffinity(kind) => write!(f, "anti-affinity with {kind}"),
        }
    }
}

/// Check every hard constraint of `task` against `node`.
pub fn check(node: &Node, task: &Task, state: &SwarmState) -> Result<(), Rejection> {
    if !node.is_active() {
        return Err(Rejection::NotActive);
    }
    if task.is_assigned_to(&node.id) {
        return Err(Rejection::AlreadyAssigned);
    }
    let constraints = &task.constraints;
    if constraints.excluded_nodes.contains(&node.id) {
        return Err(Rejection::Excluded);
    }

    let caps = &node.capabilities;
    if let Some(missing) = task.requirements.capabilities.iter().find(|tag| !caps.covers(tag)) {
        return Err(Rejection::MissingCapability(missing.clone()));
    }
    if !node.resources.can_fit(&task.requirements.resources) {
        return Err(Rejection::InsufficientResources);
    }
    let quality = &task.requirements.quality;
    if caps.quality_rating < quality.min_quality_rating {
        return Err(Rejection::QualityTooLow);
    }
    if caps.experience < quality.min_experience {
        return Err(Rejection::ExperienceTooLow);
    }
    if caps.clearance < constraints.security {
        return Err(Rejection::ClearanceTooLow);
    }
    if !node.has_free_slot() {
        return Err(Rejection::NoFreeSlot);
    }

    if !location_allowed(node.location.region.as_deref(), &constraints.regions, &constraints.excluded_regions) {
        return Err(Rejection::Region);
    }
    if !location_allowed(node.location.zone.as_deref(), &constraints.zones, &constraints.excluded_zones) {
        return Err(Rejection::Zone);
    }

    if let Some(kind) = active_kinds(node, state).find(|kind| constraints.anti_affinity.iter().any(|a| a == kind)) {
        return Err(Rejection::AntiAffinity(kind.to_string()));
    }
    Ok(())
}

/// Whether the node already runs a task the new one wants to sit next to.
pub fn has_affinity(node: &Node, task: &Task, state: &SwarmState) -> bool {
    !task.constraints.affinity.is_empty()
        && active_kinds(node, state).any(|kind| task.constraints.affinity.iter().any(|a| a == kind))
}

fn active_kinds<'a>(node: &'a Node, state: &'a SwarmState) -> impl Iterator<Item = &'a str> + 'a {
    node.status
        .active_tasks
        .iter()
        .filter_map(|id| state.tasks.get(id))
        .map(|t| t.kind.as_str())
}

fn location_allowed(value: Option<&str>, allow: &[String], deny: &[String]) -> bool {
    if !allow.is_empty() && !value.is_some_and(|v| allow.iter().any(|a| a == v)) {
        return false;
    }
    !value.is_some_and(|v| deny.iter().any(|d| d == v))
}

#[cfg(test)]
mod tests {
    use super::*;
    use swarm_core::{ExperienceTier, NodeSpec, NodeStatus, SecurityLevel, TaskSpec};

    fn node(id: &str) -> Node {
        let spec = NodeSpec::default().with_domain("rust").in_region("eu");
        let mut node = Node::from_spec(id.to_string(), spec, 3, 0);
        node.status.state = NodeStatus::Active;
        node
    }

    fn task(spec: TaskSpec) -> Task {
        Task::from_spec("t".to_string(), spec, 0)
    }

    #[test]
    fn plain_node_accepts_plain_task() {
        let state = SwarmState::new();
        assert_eq!(check(&node("n"), &task(TaskSpec::new("build").requiring("rust")), &state), Ok(()));
    }

    #[test]
    fn inactive_and_excluded_nodes_rejected() {
        let state = SwarmState::new();
        let mut n = node("n");
        n.status.state = NodeStatus::Degraded;
        assert_eq!(check(&n, &task(TaskSpec::new("build")), &state), Err(Rejection::NotActive));

        let mut spec = TaskSpec::new("build");
        spec.constraints.excluded_nodes.push("n".to_string());
        assert_eq!(check(&node("n"), &task(spec), &state), Err(Rejection::Excluded));
    }

    #[test]
    fn missing_capability_named() {
        let state = SwarmState::new();
        let t = task(TaskSpec::new("build").requiring("rust").requiring("go"));
        assert_eq!(check(&node("n"), &t, &state), Err(Rejection::MissingCapability("go".to_string())));
    }

    #[test]
    fn resources_quality_and_clearance() {
        let state = SwarmState::new();

        let mut spec = TaskSpec::new("build");
        spec.requirements.resources.cpu = 16.0;
        assert_eq!(check(&node("n"), &task(spec), &state), Err(Rejection::InsufficientResources));

        let mut spec = TaskSpec::new("build");
        spec.requirements.quality.min_quality_rating = 0.95;
        assert_eq!(check(&node("n"), &task(spec), &state), Err(Rejection::QualityTooLow));

        let mut spec = TaskSpec::new("build");
        spec.requirements.quality.min_experience = ExperienceTier::Expert;
        assert_eq!(check(&node("n"), &task(spec), &state), Err(Rejection::ExperienceTooLow));

        let mut spec = TaskSpec::new("build");
        spec.constraints.security = SecurityLevel::Restricted;
        assert_eq!(check(&node("n"), &task(spec), &state), Err(Rejection::ClearanceTooLow));
    }

    #[test]
    fn full_node_rejected() {
        let state = SwarmState::new();
        let mut n = node("n");
        n.capabilities.max_concurrent_tasks = 1;
        n.status.active_tasks.push("other".to_string());
        assert_eq!(check(&n, &task(TaskSpec::new("build")), &state), Err(Rejection::NoFreeSlot));
    }

    #[test]
    fn region_allow_and_deny_lists() {
        let state = SwarmState::new();

        let mut spec = TaskSpec::new("build");
        spec.constraints.regions.push("us".to_string());
        assert_eq!(check(&node("n"), &task(spec), &state), Err(Rejection::Region));

        let mut spec = TaskSpec::new("build");
        spec.constraints.excluded_regions.push("eu".to_string());
        assert_eq!(check(&node("n"), &task(spec), &state), Err(Rejection::Region));

        // A node without a zone fails a zone allow list.
        let mut spec = TaskSpec::new("build");
        spec.constraints.zones.push("eu-1a".to_string());
        assert_eq!(check(&node("n"), &task(spec), &state), Err(Rejection::Zone));
    }

    #[test]
    fn anti_affinity_and_affinity_use_active_task_kinds() {
        let mut state = SwarmState::new();
        let mut running = Task::from_spec("db".to_string(), TaskSpec::new("database"), 0);
        running.assigned_nodes.push("n".to_string());
        state.tasks.insert(running).unwrap();
        let mut n = node("n");
        n.status.active_tasks.push("db".to_string());

        let mut spec = TaskSpec::new("cache");
        spec.constraints.anti_affinity.push("database".to_string());
        assert_eq!(
            check(&n, &task(spec), &state),
            Err(Rejection::AntiAffinity("database".to_string()))
        );

        let mut spec = TaskSpec::new("cache");
        spec.constraints.affinity.push("database".to_string());
        let t = task(spec);
        assert_eq!(check(&n, &t, &state), Ok(()));
        assert!(has_affinity(&n, &t, &state));
        assert!(!has_affinity(&node("m"), &t, &state));
    }
}
