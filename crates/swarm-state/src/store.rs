//! SwarmState: the single owner of all nodes and tasks.

use swarm_core::{Node, NodeStatus, Task, TaskStatus};

use crate::arena::Arena;
use crate::error::{StateError, StateResult};

/// Node and task arenas, mutated under the engine's write lock.
#[derive(Debug, Clone, Default)]
pub struct SwarmState {
    pub nodes: Arena<Node>,
    pub tasks: Arena<Task>,
}

impl SwarmState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn node(&self, id: &str) -> StateResult<&Node> {
        self.nodes
            .get(id)
            .ok_or_else(|| StateError::NodeNotFound(id.to_string()))
    }

    pub fn node_mut(&mut self, id: &str) -> StateResult<&mut Node> {
        self.nodes
            .get_mut(id)
            .ok_or_else(|| StateError::NodeNotFound(id.to_string()))
    }

    pub fn task(&self, id: &str) -> StateResult<&Task> {
        self.tasks
            .get(id)
            .ok_or_else(|| StateError::TaskNotFound(id.to_string()))
    }

    pub fn task_mut(&mut self, id: &str) -> StateResult<&mut Task> {
        self.tasks
            .get_mut(id)
            .ok_or_else(|| StateError::TaskNotFound(id.to_string()))
    }

    /// Active nodes in insertion order.
    pub fn active_nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.iter().filter(|n| n.status.state == NodeStatus::Active)
    }

    pub fn active_node_ids(&self) -> Vec<String> {
        self.active_nodes().map(|n| n.id.clone()).collect()
    }

    pub fn tasks_with_status(&self, status: TaskStatus) -> impl Iterator<Item = &Task> {
        self.tasks.iter().filter(move |t| t.status == status)
    }

    /// Tasks currently assigned to `node_id`.
    pub fn tasks_on_node<'a>(&'a self, node_id: &'a str) -> impl Iterator<Item = &'a Task> + 'a {
        self.tasks.iter().filter(move |t| t.is_assigned_to(node_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use swarm_core::{NodeSpec, TaskSpec};

    fn node(id: &str, state: NodeStatus) -> Node {
        let mut node = Node::from_spec(id.to_string(), NodeSpec::default(), 3, 0);
        node.status.state = state;
        node
    }

    #[test]
    fn lookups_report_not_found() {
        let state = SwarmState::new();
        assert_eq!(state.node("n1").unwrap_err(), StateError::NodeNotFound("n1".to_string()));
        assert_eq!(state.task("t1").unwrap_err(), StateError::TaskNotFound("t1".to_string()));
    }

    #[test]
    fn active_nodes_filters_by_state() {
        let mut state = SwarmState::new();
        state.nodes.insert(node("a", NodeStatus::Active)).unwrap();
        state.nodes.insert(node("b", NodeStatus::Failed)).unwrap();
        state.nodes.insert(node("c", NodeStatus::Active)).unwrap();

        assert_eq!(state.active_node_ids(), vec!["a", "c"]);
    }

    #[test]
    fn tasks_on_node_follows_assignment() {
        let mut state = SwarmState::new();
        let mut task = Task::from_spec("t1".to_string(), TaskSpec::new("build"), 0);
        task.assigned_nodes.push("a".to_string());
        task.status = TaskStatus::Scheduled;
        state.tasks.insert(task).unwrap();
        state
            .tasks
            .insert(Task::from_spec("t2".to_string(), TaskSpec::new("build"), 0))
            .unwrap();

        let on_a: Vec<_> = state.tasks_on_node("a").map(|t| t.id.as_str()).collect();
        assert_eq!(on_a, vec!["t1"]);
        assert_eq!(state.tasks_with_status(TaskStatus::Pending).count(), 1);
    }
}
