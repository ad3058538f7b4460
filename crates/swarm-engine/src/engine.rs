//! The engine facade.
//!
//! `SwarmEngine` owns one `SwarmState` behind a `RwLock` and the consensus
//! coordinator behind its own `Mutex`. Lock order is always state, then
//! consensus; nothing holds the consensus lock while waiting for state, and
//! ratification runs with the state lock released.

use std::collections::BTreeSet;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use serde_json::json;
use tokio::sync::{Mutex, RwLock, broadcast, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use swarm_consensus::{
    BallotBox, ConsensusCoordinator, ConsensusState, ProposalKind, Resolution, Ticket,
};
use swarm_core::{
    Clock, IdGenerator, Node, NodeId, NodeSpec, NodeStatus, RecoveryStrategy, SwarmConfig,
    SystemClock, Task, TaskId, TaskSpec, TaskStatus,
};
use swarm_health::{FaultDetector, HeartbeatMonitor, SweepCallback, Transition};
use swarm_metrics::{SwarmMetrics, aggregate, render_prometheus};
use swarm_optimizer::{
    AllocationHint, OptimizationLoop, OptimizationReport, OptimizerConfig, PassCallback,
    SwarmOptimizer, allocation_hints,
};
use swarm_scheduler::{Decision, SchedulerConfig, TaskScheduler};
use swarm_state::SwarmState;
use swarm_topology::{Removal, TopologyManager};

use crate::delivery::{AssignmentPayload, DeliveryChannel, LogDelivery};
use crate::error::{SwarmError, SwarmResult};
use crate::events::{EVENT_CAPACITY, SwarmEvent};

type BoxFuture<T> = Pin<Box<dyn Future<Output = T> + Send>>;

/// Proposer and term leader for every proposal the engine raises.
const PROPOSER: &str = "swarm-engine";

/// How often a pending ratification re-checks its deadline.
const CONSENSUS_POLL: Duration = Duration::from_millis(20);

pub struct EngineBuilder {
    config: SwarmConfig,
    clock: Arc<dyn Clock>,
    delivery: Arc<dyn DeliveryChannel>,
    ballot: Option<Arc<dyn BallotBox>>,
    background: bool,
    events: broadcast::Sender<SwarmEvent>,
}

impl EngineBuilder {
    pub fn new(config: SwarmConfig) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            config,
            clock: Arc::new(SystemClock),
            delivery: Arc::new(LogDelivery),
            ballot: None,
            background: true,
            events,
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_delivery(mut self, delivery: Arc<dyn DeliveryChannel>) -> Self {
        self.delivery = delivery;
        self
    }

    /// Where member votes come from. Defaults to unanimous approval.
    pub fn with_ballot(mut self, ballot: Arc<dyn BallotBox>) -> Self {
        self.ballot = Some(ballot);
        self
    }

    /// Whether `initialize` spawns the heartbeat and optimization loops.
    pub fn with_background_loops(mut self, enabled: bool) -> Self {
        self.background = enabled;
        self
    }

    /// Subscribe before initializing to also see the `initialized` event.
    pub fn subscribe(&self) -> broadcast::Receiver<SwarmEvent> {
        self.events.subscribe()
    }

    /// Validate the configuration, build every component and start the
    /// background loops. Configuration errors are fatal.
    pub async fn initialize(self) -> SwarmResult<SwarmEngine> {
        let config = self.config;
        config.validate()?;

        let detector = FaultDetector::from_config(&config)?;
        let optimizer = SwarmOptimizer::new(OptimizerConfig::from_config(&config)?);
        let mut consensus =
            ConsensusCoordinator::new(config.consensus.algorithm, config.proposal_timeout()?);
        if let Some(ballot) = self.ballot {
            consensus = consensus.with_ballot(ballot);
        }
        let (shutdown_tx, _) = watch::channel(false);

        let engine = SwarmEngine {
            shared: Arc::new(Shared {
                topology: TopologyManager::from_config(&config),
                scheduler: TaskScheduler::new(SchedulerConfig::from_config(&config)),
                detector,
                optimizer,
                consensus: Mutex::new(consensus),
                state: RwLock::new(SwarmState::new()),
                clock: self.clock,
                ids: IdGenerator::new(),
                delivery: self.delivery,
                events: self.events,
                shut_down: AtomicBool::new(false),
                shutdown_tx,
                loops: Mutex::new(Vec::new()),
                sweep_pass: Mutex::new(()),
                optimize_pass: Mutex::new(()),
                config,
            }),
        };

        let config = &engine.shared.config;
        info!(
            topology = %config.topology,
            consensus = %config.consensus.algorithm,
            strict = config.consensus.strict,
            max_nodes = config.max_nodes,
            "swarm engine initialized"
        );
        engine.emit(SwarmEvent::Initialized {
            topology: config.topology,
            consensus: config.consensus.algorithm,
            at_ms: engine.now(),
        });

        if self.background {
            engine.spawn_loops().await;
        }
        Ok(engine)
    }
}

struct Shared {
    config: SwarmConfig,
    clock: Arc<dyn Clock>,
    ids: IdGenerator,
    state: RwLock<SwarmState>,
    consensus: Mutex<ConsensusCoordinator>,
    topology: TopologyManager,
    detector: FaultDetector,
    scheduler: TaskScheduler,
    optimizer: SwarmOptimizer,
    delivery: Arc<dyn DeliveryChannel>,
    events: broadcast::Sender<SwarmEvent>,
    shut_down: AtomicBool,
    shutdown_tx: watch::Sender<bool>,
    loops: Mutex<Vec<JoinHandle<()>>>,
    /// Held for the duration of a sweep or pass so they never overlap.
    sweep_pass: Mutex<()>,
    optimize_pass: Mutex<()>,
}

/// Handle to a running swarm. Cheap to clone; every clone drives the same
/// engine.
#[derive(Clone)]
pub struct SwarmEngine {
    shared: Arc<Shared>,
}

impl SwarmEngine {
    pub fn builder(config: SwarmConfig) -> EngineBuilder {
        EngineBuilder::new(config)
    }

    pub fn config(&self) -> &SwarmConfig {
        &self.shared.config
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SwarmEvent> {
        self.shared.events.subscribe()
    }

    pub fn is_shut_down(&self) -> bool {
        self.shared.shut_down.load(Ordering::SeqCst)
    }

    // ── Nodes ────────────────────────────────────────────────────

    /// Admit a node, place it in the topology and offer it pending work.
    pub async fn add_node(&self, spec: NodeSpec) -> SwarmResult<NodeId> {
        self.ensure_running()?;
        spec.validate()?;

        let members = {
            let state = self.shared.state.read().await;
            self.check_capacity(&state)?;
            state.active_node_ids()
        };
        let id = self.shared.ids.next("node", self.now());
        let payload = json!({ "node_id": id, "kind": spec.kind, "name": spec.name });
        self.ratify(ProposalKind::NodeAddition, payload, members).await?;

        let node = {
            let mut state = self.shared.state.write().await;
            self.ensure_running()?;
            self.check_capacity(&state)?;
            let now = self.now();
            let mut node = Node::from_spec(id.clone(), spec, self.shared.topology.max_depth(), now);
            // Joining counts as the first heartbeat.
            self.shared.detector.record_heartbeat(&mut node, now);
            self.shared.topology.add_node(&mut state.nodes, node)?;
            state.node(&id)?.clone()
        };
        info!(node_id = %id, kind = ?node.kind, "node added");
        self.emit(SwarmEvent::NodeAdded { node });

        self.schedule_pending().await;
        Ok(id)
    }

    /// Take a node out of the swarm. Its tasks are reassigned first, then
    /// its children re-parented and its connections torn down.
    pub async fn remove_node(&self, node_id: &str) -> SwarmResult<Removal> {
        self.ensure_running()?;
        let members = {
            let state = self.shared.state.read().await;
            state.node(node_id)?;
            state.active_node_ids()
        };
        self.ratify(ProposalKind::NodeRemoval, json!({ "node_id": node_id }), members)
            .await?;

        let (removal, reassigned) = {
            let mut state = self.shared.state.write().await;
            self.ensure_running()?;
            state.node(node_id)?;
            let reassigned = self.shared.scheduler.reassign(&mut state, node_id, self.now());
            let removal = self.shared.topology.remove_node(&mut state.nodes, node_id)?;
            (removal, reassigned)
        };
        info!(node_id, reassigned = reassigned.len(), "node removed");
        self.emit(SwarmEvent::NodeRemoved {
            node_id: node_id.to_string(),
            reassigned: reassigned.clone(),
        });

        if !reassigned.is_empty() {
            self.schedule_pending().await;
        }
        Ok(removal)
    }

    pub async fn get_node(&self, node_id: &str) -> Option<Node> {
        self.shared.state.read().await.nodes.get(node_id).cloned()
    }

    pub async fn list_nodes(&self) -> Vec<Node> {
        self.shared.state.read().await.nodes.iter().cloned().collect()
    }

    pub async fn connections(&self, node_id: &str) -> SwarmResult<BTreeSet<NodeId>> {
        let state = self.shared.state.read().await;
        Ok(self.shared.topology.connections(&state.nodes, node_id)?)
    }

    /// Record a liveness signal from a node.
    pub async fn heartbeat(&self, node_id: &str) -> SwarmResult<()> {
        self.ensure_running()?;
        let (transition, node) = {
            let mut state = self.shared.state.write().await;
            let node = state.node_mut(node_id)?;
            let transition = self.shared.detector.record_heartbeat(node, self.now());
            (transition, node.clone())
        };
        let Some(transition) = transition else {
            return Ok(());
        };

        if transition.is_recovery() {
            self.emit(SwarmEvent::NodeRecovery {
                node_id: node_id.to_string(),
                node,
            });
        }
        self.schedule_pending().await;
        Ok(())
    }

    /// Run one heartbeat sweep now. Waits for a sweep already in progress.
    pub async fn sweep_heartbeats(&self) -> SwarmResult<Vec<Transition>> {
        self.ensure_running()?;
        let _pass = self.shared.sweep_pass.lock().await;
        Ok(self.sweep().await)
    }

    // ── Tasks ────────────────────────────────────────────────────

    /// Store a task and make one scheduling attempt. Once the task is
    /// stored its id is returned whatever the attempt decided, even if a
    /// shutdown cut the attempt short; read the task to see the outcome.
    pub async fn submit_task(&self, spec: TaskSpec) -> SwarmResult<TaskId> {
        self.ensure_running()?;
        let task = {
            let mut state = self.shared.state.write().await;
            self.ensure_running()?;
            let now = self.now();
            let id = self.shared.ids.next("task", now);
            self.shared.scheduler.submit(&mut state, id, spec, now)?
        };
        let id = task.id.clone();
        self.emit(SwarmEvent::TaskSubmitted { task });

        match self.schedule_task(&id).await {
            Ok(_) => {}
            Err(SwarmError::ShutDown) => {
                debug!(task_id = %id, "shutdown during first scheduling attempt");
            }
            Err(e) => warn!(task_id = %id, error = %e, "first scheduling attempt failed"),
        }
        Ok(id)
    }

    pub async fn get_task(&self, task_id: &str) -> Option<Task> {
        self.shared.state.read().await.tasks.get(task_id).cloned()
    }

    pub async fn list_tasks(&self) -> Vec<Task> {
        self.shared.state.read().await.tasks.iter().cloned().collect()
    }

    pub async fn start_task(&self, task_id: &str) -> SwarmResult<()> {
        self.ensure_running()?;
        let mut state = self.shared.state.write().await;
        self.shared.scheduler.start(&mut state, task_id, self.now())?;
        Ok(())
    }

    /// Report a task finished. Freed capacity is offered to pending tasks.
    pub async fn complete_task(
        &self,
        task_id: &str,
        success: bool,
        duration_ms: u64,
    ) -> SwarmResult<TaskStatus> {
        self.ensure_running()?;
        let status = {
            let mut state = self.shared.state.write().await;
            self.shared
                .scheduler
                .complete(&mut state, task_id, success, duration_ms, self.now())?
        };
        self.schedule_pending().await;
        Ok(status)
    }

    pub async fn cancel_task(&self, task_id: &str) -> SwarmResult<()> {
        self.ensure_running()?;
        {
            let mut state = self.shared.state.write().await;
            self.shared.scheduler.cancel(&mut state, task_id, self.now())?;
        }
        self.schedule_pending().await;
        Ok(())
    }

    pub async fn update_progress(
        &self,
        task_id: &str,
        percentage: f64,
        phase: Option<String>,
        milestone: Option<String>,
    ) -> SwarmResult<()> {
        self.ensure_running()?;
        let mut state = self.shared.state.write().await;
        self.shared
            .scheduler
            .update_progress(&mut state, task_id, percentage, phase, milestone, self.now())?;
        Ok(())
    }

    // ── Swarm ────────────────────────────────────────────────────

    /// Metrics over one consistent snapshot.
    pub async fn swarm_status(&self) -> SwarmMetrics {
        let state = self.shared.state.read().await;
        let stats = self.shared.consensus.lock().await.stats();
        aggregate(&state, &stats)
    }

    /// `swarm_status` in Prometheus text format.
    pub async fn metrics_text(&self) -> String {
        render_prometheus(&self.swarm_status().await)
    }

    pub async fn allocation_hints(&self) -> Vec<AllocationHint> {
        allocation_hints(&*self.shared.state.read().await)
    }

    /// Run one optimization pass now. Waits for a pass already in progress.
    pub async fn optimize_swarm(&self) -> SwarmResult<OptimizationReport> {
        self.ensure_running()?;
        let _pass = self.shared.optimize_pass.lock().await;
        self.optimize().await
    }

    pub async fn consensus_state(&self) -> ConsensusState {
        self.shared.consensus.lock().await.state()
    }

    /// Cast a member's vote on the active proposal.
    pub async fn vote(
        &self,
        proposal_id: &str,
        voter: &str,
        approve: bool,
    ) -> SwarmResult<Vec<Resolution>> {
        let mut consensus = self.shared.consensus.lock().await;
        Ok(consensus.vote(proposal_id, voter, approve, self.now())?)
    }

    /// Stop both loops, abort open proposals, cancel every unfinished task
    /// and put every node into maintenance. Calling it again is a no-op.
    pub async fn shutdown(&self) -> SwarmResult<()> {
        if self.shared.shut_down.swap(true, Ordering::SeqCst) {
            debug!("engine already shut down");
            return Ok(());
        }
        info!("swarm engine shutting down");
        let _ = self.shared.shutdown_tx.send(true);

        // Wakes any ratification still waiting, so the loops can finish.
        let aborted = self.shared.consensus.lock().await.abort_all(self.now());

        let handles = std::mem::take(&mut *self.shared.loops.lock().await);
        for handle in handles {
            if let Err(e) = handle.await {
                warn!(error = %e, "background loop ended abnormally");
            }
        }

        let now = self.now();
        let mut cancelled = Vec::new();
        {
            let mut state = self.shared.state.write().await;
            let open: Vec<TaskId> = state
                .tasks
                .iter()
                .filter(|t| !t.status.is_terminal())
                .map(|t| t.id.clone())
                .collect();
            for task_id in open {
                if self.shared.scheduler.cancel(&mut state, &task_id, now).is_ok() {
                    cancelled.push(task_id);
                }
            }
            for node in state.nodes.iter_mut() {
                node.status.state = NodeStatus::Maintenance;
            }
        }

        info!(
            cancelled = cancelled.len(),
            aborted = aborted.len(),
            "swarm engine stopped"
        );
        self.emit(SwarmEvent::Shutdown {
            cancelled_tasks: cancelled,
            at_ms: now,
        });
        Ok(())
    }

    // ── Internals ────────────────────────────────────────────────

    fn now(&self) -> u64 {
        self.shared.clock.now_ms()
    }

    fn ensure_running(&self) -> SwarmResult<()> {
        if self.is_shut_down() {
            return Err(SwarmError::ShutDown);
        }
        Ok(())
    }

    fn check_capacity(&self, state: &SwarmState) -> SwarmResult<()> {
        let max = self.shared.config.max_nodes;
        if state.nodes.len() >= max {
            return Err(SwarmError::CapacityExceeded { max });
        }
        Ok(())
    }

    fn emit(&self, event: SwarmEvent) {
        let name = event.name();
        if self.shared.events.send(event).is_err() {
            debug!(event = name, "no subscribers");
        }
    }

    /// Get a change of `kind` ratified when the algorithm demands it.
    ///
    /// An aborted proposal is an error only in strict deployments; otherwise
    /// the change goes ahead and the abort is logged.
    async fn ratify(
        &self,
        kind: ProposalKind,
        payload: serde_json::Value,
        members: Vec<NodeId>,
    ) -> SwarmResult<()> {
        let ticket = {
            let mut consensus = self.shared.consensus.lock().await;
            if !consensus.requires_quorum(kind) {
                return Ok(());
            }
            // Checked under the lock so nothing is raised after `abort_all`.
            self.ensure_running()?;
            consensus.propose(kind, payload, PROPOSER, members, self.now())
        };
        let Ticket::Pending {
            proposal,
            mut outcome,
        } = ticket
        else {
            return Ok(());
        };

        let proposal_id = proposal.id.clone();
        self.emit(SwarmEvent::ConsensusProposed { proposal });

        let resolution = loop {
            tokio::select! {
                resolved = &mut outcome => break resolved.ok(),
                _ = tokio::time::sleep(CONSENSUS_POLL) => {
                    let now = self.now();
                    self.shared.consensus.lock().await.resolve(now);
                }
            }
        };

        match resolution {
            Some(r) if r.committed() => {
                debug!(%proposal_id, ?kind, approvals = r.approvals, "change ratified");
                Ok(())
            }
            other => {
                let timed_out = other.as_ref().is_some_and(|r| r.timed_out);
                if self.shared.config.consensus.strict {
                    warn!(%proposal_id, ?kind, timed_out, "proposal aborted; change rejected");
                    Err(SwarmError::Rejected {
                        kind,
                        proposal_id,
                        timed_out,
                    })
                } else {
                    warn!(%proposal_id, ?kind, timed_out, "proposal aborted; applying change anyway");
                    Ok(())
                }
            }
        }
    }

    /// Plan, ratify if needed, and commit one pending task, then deliver it.
    async fn schedule_task(&self, task_id: &str) -> SwarmResult<TaskStatus> {
        let needs_quorum = self
            .shared
            .consensus
            .lock()
            .await
            .requires_quorum(ProposalKind::TaskAssignment);

        let mut state = self.shared.state.write().await;
        let decision = self.shared.scheduler.plan(&state, task_id, self.now())?;
        if needs_quorum && let Decision::Assign { nodes, .. } = &decision {
            let members = state.active_node_ids();
            let payload = json!({ "task_id": task_id, "nodes": nodes });
            drop(state);
            let verdict = self.ratify(ProposalKind::TaskAssignment, payload, members).await;
            state = self.shared.state.write().await;
            match verdict {
                Ok(()) => {}
                Err(SwarmError::Rejected { proposal_id, .. }) => {
                    let task = state.task_mut(task_id)?;
                    task.reason = Some(format!("assignment rejected by proposal {proposal_id}"));
                    return Ok(task.status);
                }
                Err(e) => return Err(e),
            }
        }
        self.ensure_running()?;

        let status = self
            .shared
            .scheduler
            .apply(&mut state, task_id, decision, self.now())?;
        if status != TaskStatus::Scheduled {
            return Ok(status);
        }
        let task = state.task(task_id)?.clone();
        drop(state);

        self.emit(SwarmEvent::TaskScheduled { task });
        self.dispatch(task_id).await;
        Ok(status)
    }

    /// Offer every pending task to the scheduler, highest priority first.
    /// Returns the ids offered.
    async fn schedule_pending(&self) -> Vec<TaskId> {
        let queue = {
            let state = self.shared.state.read().await;
            self.shared.scheduler.pending_queue(&state)
        };
        let mut offered = Vec::new();
        for task_id in queue {
            match self.schedule_task(&task_id).await {
                Ok(_) => offered.push(task_id),
                Err(e) => debug!(%task_id, error = %e, "pending task skipped"),
            }
        }
        offered
    }

    /// Send a scheduled task to each of its nodes. Returns whether every
    /// node accepted it.
    async fn dispatch(&self, task_id: &str) -> bool {
        let (nodes, payload) = {
            let state = self.shared.state.read().await;
            let Ok(task) = state.task(task_id) else {
                return false;
            };
            if task.status != TaskStatus::Scheduled {
                return false;
            }
            (task.assigned_nodes.clone(), AssignmentPayload::from(task))
        };
        let payload = match serde_json::to_value(&payload) {
            Ok(v) => v,
            Err(e) => {
                warn!(task_id, error = %e, "failed to encode assignment");
                return false;
            }
        };

        let mut delivered = true;
        for node_id in &nodes {
            if let Err(e) = self.shared.delivery.send(node_id, &payload).await {
                warn!(task_id, %node_id, error = %e, "assignment delivery failed; will retry");
                delivered = false;
            }
        }

        let mut state = self.shared.state.write().await;
        let unchanged = state
            .task(task_id)
            .is_ok_and(|t| t.status == TaskStatus::Scheduled && t.assigned_nodes == nodes);
        if unchanged {
            let _ = self.shared.scheduler.mark_delivered(&mut state, task_id, delivered);
        }
        delivered
    }

    async fn sweep(&self) -> Vec<Transition> {
        let now = self.now();
        let reassign = self.shared.config.fault_tolerance.recovery_strategy == RecoveryStrategy::Reassign;
        let mut orphaned = 0;
        let transitions = {
            let mut state = self.shared.state.write().await;
            let transitions = self.shared.detector.sweep(&mut state.nodes, now);
            for t in transitions.iter().filter(|t| t.is_failure()) {
                let reassigned = if reassign {
                    self.shared.scheduler.reassign(&mut state, &t.node_id, now)
                } else {
                    Vec::new()
                };
                orphaned += reassigned.len();
                if let Some(node) = state.nodes.get(&t.node_id).cloned() {
                    self.emit(SwarmEvent::NodeFailure {
                        node_id: t.node_id.clone(),
                        node,
                        reassigned,
                    });
                }
            }
            transitions
        };
        if orphaned > 0 {
            self.schedule_pending().await;
        }
        transitions
    }

    async fn optimize(&self) -> SwarmResult<OptimizationReport> {
        let mut report = {
            let mut state = self.shared.state.write().await;
            self.ensure_running()?;
            let s = &self.shared;
            s.optimizer.optimize(&mut state, &s.topology, &s.scheduler, self.now())
        };

        report.rescheduled = self.schedule_pending().await;

        let undelivered = {
            let state = self.shared.state.read().await;
            self.shared.scheduler.undelivered(&state)
        };
        for task_id in undelivered {
            if self.dispatch(&task_id).await {
                report.redelivered.push(task_id);
            }
        }

        self.emit(SwarmEvent::SwarmOptimized {
            report: report.clone(),
        });
        Ok(report)
    }

    async fn spawn_loops(&self) {
        let weak = Arc::downgrade(&self.shared);
        let on_sweep: SweepCallback = Arc::new(move || -> BoxFuture<()> {
            let weak = weak.clone();
            Box::pin(async move {
                let Some(shared) = weak.upgrade() else { return };
                let engine = SwarmEngine { shared };
                if engine.is_shut_down() {
                    return;
                }
                let Ok(_pass) = engine.shared.sweep_pass.try_lock() else {
                    debug!("sweep still running; tick skipped");
                    return;
                };
                engine.sweep().await;
            })
        });

        let weak = Arc::downgrade(&self.shared);
        let on_pass: PassCallback = Arc::new(move || -> BoxFuture<anyhow::Result<OptimizationReport>> {
            let weak = weak.clone();
            Box::pin(async move {
                let shared = weak
                    .upgrade()
                    .ok_or_else(|| anyhow::anyhow!("engine dropped"))?;
                let engine = SwarmEngine { shared };
                let Ok(_pass) = engine.shared.optimize_pass.try_lock() else {
                    debug!("optimization still running; tick skipped");
                    return Ok(OptimizationReport::default());
                };
                Ok(engine.optimize().await?)
            })
        });

        let monitor = HeartbeatMonitor::new(self.shared.detector.interval(), on_sweep);
        let optimizer = OptimizationLoop::new(self.shared.optimizer.config().interval, on_pass);
        let sweep_shutdown = self.shared.shutdown_tx.subscribe();
        let optimize_shutdown = self.shared.shutdown_tx.subscribe();

        let mut loops = self.shared.loops.lock().await;
        loops.push(tokio::spawn(async move { monitor.run(sweep_shutdown).await }));
        loops.push(tokio::spawn(async move { optimizer.run(optimize_shutdown).await }));
        debug!("background loops spawned");
    }
}
