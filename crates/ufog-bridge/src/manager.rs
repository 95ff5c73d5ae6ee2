//! Run Manager (C11): create/start/stop/status/list over many independent
//! runs.
//!
//! Generalizes the teacher's single-global-`AppState` pattern (one
//! `Colony` per process, owned by one dedicated thread) into a
//! `HashMap<RunId, RunHandle>` registry behind an `RwLock` — the same
//! registry-behind-`RwLock` shape the teacher's
//! `phago_distributed::coordinator::ShardRegistry` uses, reused here for
//! runs instead of shards. Each run still gets its own dedicated OS thread
//! driving `ufog_runtime::scheduler::Run::step()` in a loop, exactly the
//! teacher's `AppState::new` thread-per-`Colony` model, because
//! `ufog_runtime::scheduler::Run` (like the teacher's `Colony`) has no
//! internal concurrency of its own to exploit for this role.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use tokio::sync::Notify;

use ufog_core::prelude::*;
use ufog_runtime::prelude::{Run, RunStatus};

use crate::bridge::SimBridge;
use crate::message::{
    event_to_wire, AgentDelta, AgentSnapshot, BridgeMessage, EdgeSnapshot, NodeSnapshot,
    RunSnapshot, RunStatusSnapshot, RunSummary, SNAPSHOT_SCHEMA_VERSION,
};

/// Default bound on each subscriber's priority queue (spec §4.10);
/// overridable per-subscription via `SimBridge::subscribe_with_capacity`.
const DEFAULT_SUBSCRIBER_QUEUE_CAPACITY: usize = 512;

struct RunHandle {
    config: SimConfig,
    created_at_epoch_ms: u64,
    status: Arc<Mutex<RunStatus>>,
    current_step: Arc<AtomicU64>,
    total_steps: u64,
    stop_requested: Arc<AtomicBool>,
    stopped_notify: Arc<Notify>,
    started: Arc<AtomicBool>,
    bridge: Arc<SimBridge>,
    snapshot: Arc<Mutex<Option<RunSnapshot>>>,
}

/// Rejected at `create_run`, before any run state is allocated — spec §7
/// "Configuration errors (pre-start): reject synchronously".
#[derive(Debug, Clone, PartialEq)]
pub struct RunNotFound;

/// Registry of all live runs in this process (spec §4.11). Cheap to
/// clone: internally an `Arc` around the shared map.
#[derive(Clone)]
pub struct RunManager {
    runs: Arc<RwLock<HashMap<RunId, RunHandle>>>,
}

impl Default for RunManager {
    fn default() -> Self {
        Self::new()
    }
}

impl RunManager {
    pub fn new() -> Self {
        Self {
            runs: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Validate `config` and allocate a new run in `starting` status.
    /// Rejects synchronously on configuration error (spec §7); no thread
    /// is spawned until `start`.
    pub fn create_run(&self, config: SimConfig) -> Result<RunId, ConfigError> {
        let config = config.validate()?;
        let run_id = RunId::new();
        let total_steps = config.total_steps();
        let handle = RunHandle {
            config: config.clone(),
            created_at_epoch_ms: epoch_ms(),
            status: Arc::new(Mutex::new(RunStatus::Starting)),
            current_step: Arc::new(AtomicU64::new(0)),
            total_steps,
            stop_requested: Arc::new(AtomicBool::new(false)),
            stopped_notify: Arc::new(Notify::new()),
            started: Arc::new(AtomicBool::new(false)),
            bridge: Arc::new(SimBridge::new(DEFAULT_SUBSCRIBER_QUEUE_CAPACITY)),
            snapshot: Arc::new(Mutex::new(None)),
        };
        self.runs
            .write()
            .unwrap_or_else(|p| p.into_inner())
            .insert(run_id, handle);
        Ok(run_id)
    }

    /// Idempotent transition to `running`: spawns the driver thread on
    /// first call, does nothing on subsequent calls for the same run.
    pub fn start(&self, run_id: RunId) -> Result<(), RunNotFound> {
        let runs = self.runs.read().unwrap_or_else(|p| p.into_inner());
        let handle = runs.get(&run_id).ok_or(RunNotFound)?;
        if handle.started.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        let config = handle.config.clone();
        let status = handle.status.clone();
        let current_step = handle.current_step.clone();
        let stop_requested = handle.stop_requested.clone();
        let stopped_notify = handle.stopped_notify.clone();
        let bridge = handle.bridge.clone();
        let snapshot = handle.snapshot.clone();
        drop(runs);

        std::thread::spawn(move || drive_run(run_id, config, status, current_step, stop_requested, stopped_notify, bridge, snapshot));
        Ok(())
    }

    /// Cooperative stop: sets the cancel flag and waits (async) for the
    /// driver thread to emit `done` and exit. No-op (same terminal status)
    /// if the run already stopped.
    pub async fn stop(&self, run_id: RunId) -> Result<RunStatus, RunNotFound> {
        let (already_terminal, stop_requested, stopped_notify, status) = {
            let runs = self.runs.read().unwrap_or_else(|p| p.into_inner());
            let handle = runs.get(&run_id).ok_or(RunNotFound)?;
            let current = *handle.status.lock().unwrap_or_else(|p| p.into_inner());
            let terminal = is_terminal(current);
            (
                terminal,
                handle.stop_requested.clone(),
                handle.stopped_notify.clone(),
                handle.status.clone(),
            )
        };
        if already_terminal {
            return Ok(*status.lock().unwrap_or_else(|p| p.into_inner()));
        }
        stop_requested.store(true, Ordering::SeqCst);
        stopped_notify.notified().await;
        Ok(*status.lock().unwrap_or_else(|p| p.into_inner()))
    }

    pub fn status(&self, run_id: RunId) -> Result<RunStatusSnapshot, RunNotFound> {
        let runs = self.runs.read().unwrap_or_else(|p| p.into_inner());
        let handle = runs.get(&run_id).ok_or(RunNotFound)?;
        Ok(RunStatusSnapshot {
            run_id,
            status: *handle.status.lock().unwrap_or_else(|p| p.into_inner()),
            current_step: handle.current_step.load(Ordering::Relaxed),
            total_steps: handle.total_steps,
        })
    }

    pub fn list(&self) -> Vec<RunStatusSnapshot> {
        let runs = self.runs.read().unwrap_or_else(|p| p.into_inner());
        runs.keys()
            .filter_map(|id| self.status_locked(&runs, *id))
            .collect()
    }

    fn status_locked(
        &self,
        runs: &HashMap<RunId, RunHandle>,
        run_id: RunId,
    ) -> Option<RunStatusSnapshot> {
        let handle = runs.get(&run_id)?;
        Some(RunStatusSnapshot {
            run_id,
            status: *handle.status.lock().unwrap_or_else(|p| p.into_inner()),
            current_step: handle.current_step.load(Ordering::Relaxed),
            total_steps: handle.total_steps,
        })
    }

    /// Subscribe to a run's message stream. A subscriber connecting before
    /// the run has completed any step gets `init_state` alone, same as a
    /// subscriber that raced `/sim/start` (spec §4.10 Scenario 1); only a
    /// subscriber attaching mid-run, after at least one step has landed,
    /// also gets a synthesized full `tick` replay of the live snapshot so
    /// it doesn't have to wait for the next natural tick to see agent
    /// state (Scenario 4).
    pub fn subscribe(
        &self,
        run_id: RunId,
    ) -> Result<(crate::bridge::Subscription, Vec<BridgeMessage>), RunNotFound> {
        let runs = self.runs.read().unwrap_or_else(|p| p.into_inner());
        let handle = runs.get(&run_id).ok_or(RunNotFound)?;
        let sub = handle.bridge.subscribe();
        let mut replay = vec![BridgeMessage::ConnectionConfirmed { run_id }];
        let snap = handle.snapshot.lock().unwrap_or_else(|p| p.into_inner()).clone();
        match snap {
            Some(s) if s.step > 0 => {
                let agents = s.agents.clone();
                replay.push(BridgeMessage::InitState {
                    nodes: s.nodes,
                    edges: s.edges,
                    config: s.config,
                });
                replay.push(BridgeMessage::Tick {
                    step: s.step,
                    agent_updates: agents
                        .into_iter()
                        .map(|a| AgentDelta {
                            agent_id: a.agent_id,
                            energy: Some(a.energy),
                            health: Some(a.health),
                        })
                        .collect(),
                });
            }
            Some(s) => {
                replay.push(BridgeMessage::InitState {
                    nodes: s.nodes,
                    edges: s.edges,
                    config: s.config,
                });
            }
            None => {
                replay.push(BridgeMessage::InitState {
                    nodes: Vec::new(),
                    edges: Vec::new(),
                    config: handle.config.clone(),
                });
            }
        }
        Ok((sub, replay))
    }

    pub fn dropped_total(&self, run_id: RunId) -> Result<u64, RunNotFound> {
        let runs = self.runs.read().unwrap_or_else(|p| p.into_inner());
        let handle = runs.get(&run_id).ok_or(RunNotFound)?;
        Ok(handle.bridge.dropped_total())
    }

    /// Liveness summary for `GET /health`'s `bridge_status` field.
    pub fn health_summary(&self) -> serde_json::Value {
        let runs = self.runs.read().unwrap_or_else(|p| p.into_inner());
        let running = runs
            .values()
            .filter(|h| {
                matches!(
                    *h.status.lock().unwrap_or_else(|p| p.into_inner()),
                    RunStatus::Running | RunStatus::Starting
                )
            })
            .count();
        serde_json::json!({ "total_runs": runs.len(), "running_runs": running })
    }
}

fn is_terminal(status: RunStatus) -> bool {
    matches!(
        status,
        RunStatus::Completed | RunStatus::Stopped | RunStatus::Failed
    )
}

fn epoch_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

#[allow(clippy::too_many_arguments)]
fn drive_run(
    run_id: RunId,
    config: SimConfig,
    status: Arc<Mutex<RunStatus>>,
    current_step: Arc<AtomicU64>,
    stop_requested: Arc<AtomicBool>,
    stopped_notify: Arc<Notify>,
    bridge: Arc<SimBridge>,
    snapshot: Arc<Mutex<Option<RunSnapshot>>>,
) {
    let mut run = match Run::new(config.clone()) {
        Ok(r) => r,
        Err(e) => {
            *status.lock().unwrap_or_else(|p| p.into_inner()) = RunStatus::Failed;
            bridge.publish(BridgeMessage::Error {
                error: "configuration_error".to_string(),
                detail: e.to_string(),
                step: None,
            });
            bridge.publish(BridgeMessage::Done {
                status: "failed".to_string(),
                final_step: 0,
                summary: RunSummary {
                    total_steps_run: 0,
                    final_active_agents: 0,
                    final_entanglements: 0,
                },
            });
            stopped_notify.notify_waiters();
            return;
        }
    };

    *status.lock().unwrap_or_else(|p| p.into_inner()) = RunStatus::Running;
    *snapshot.lock().unwrap_or_else(|p| p.into_inner()) = Some(build_snapshot(run_id, &run));

    loop {
        if stop_requested.load(Ordering::SeqCst) {
            run.request_stop();
        }

        let events = run.step();
        current_step.store(run.current_step, Ordering::Relaxed);
        *snapshot.lock().unwrap_or_else(|p| p.into_inner()) = Some(build_snapshot(run_id, &run));

        let step_no = run.current_step;
        let mut agent_updates = Vec::new();
        for event in &events {
            if let Event::AgentUpdate {
                agent_id,
                energy,
                health,
                ..
            } = event
            {
                agent_updates.push(AgentDelta {
                    agent_id: *agent_id,
                    energy: Some(*energy),
                    health: Some(*health),
                });
            } else {
                bridge.publish(event_to_wire(event));
            }
        }
        if !agent_updates.is_empty() || events.iter().any(|e| matches!(e, Event::StepComplete { .. })) {
            bridge.publish(BridgeMessage::Tick {
                step: step_no,
                agent_updates,
            });
        }
        if let Some(stats) = run.last_stats_clone() {
            bridge.publish(BridgeMessage::Stats {
                step: stats.step,
                stats: serde_json::to_value(&stats).unwrap_or(serde_json::Value::Null),
            });
        }

        let current_status = run.status;
        *status.lock().unwrap_or_else(|p| p.into_inner()) = current_status;

        if is_terminal(current_status) {
            let status_str = match current_status {
                RunStatus::Completed => "completed",
                RunStatus::Stopped => "stopped",
                RunStatus::Failed => "failed",
                _ => unreachable!(),
            };
            bridge.publish(BridgeMessage::Done {
                status: status_str.to_string(),
                final_step: run.current_step,
                summary: RunSummary {
                    total_steps_run: run.current_step,
                    final_active_agents: run.alive_count(),
                    final_entanglements: run.entanglements().len(),
                },
            });
            break;
        }

        if config.step_delay_seconds > 0.0 {
            std::thread::sleep(Duration::from_secs_f64(config.step_delay_seconds));
        }
    }

    stopped_notify.notify_waiters();
}

fn build_snapshot(run_id: RunId, run: &Run) -> RunSnapshot {
    let topology = run.topology();
    let mut nodes = Vec::new();
    let mut edges = Vec::new();
    for node_id in topology.all_node_ids() {
        if let Some(node) = topology.get(node_id) {
            nodes.push(NodeSnapshot {
                node_id: node.node_id,
                parent: node.parent,
                depth: node.depth,
                agent_id: node.agent_id,
            });
            if let Some(parent) = node.parent {
                edges.push(EdgeSnapshot {
                    parent,
                    child: node.node_id,
                });
            }
        }
    }
    let agents = run
        .agents()
        .values()
        .map(|a| AgentSnapshot {
            agent_id: a.agent_id,
            node_id: a.node_id,
            energy: a.energy,
            health: a.health,
            role: a.role,
            active_memes: a.active_memes.clone(),
        })
        .collect();

    RunSnapshot {
        schema_version: SNAPSHOT_SCHEMA_VERSION,
        run_id,
        step: run.current_step,
        nodes,
        edges,
        agents,
        config: run.config.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cfg() -> SimConfig {
        SimConfig {
            num_agents: 3,
            num_generations: 1,
            steps_per_generation: 3,
            seed: 1,
            enable_entanglement: false,
            ..Default::default()
        }
    }

    #[test]
    fn zero_agents_rejected_synchronously() {
        let manager = RunManager::new();
        let result = manager.create_run(SimConfig {
            num_agents: 0,
            ..Default::default()
        });
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn create_start_stop_reaches_terminal_status() {
        let manager = RunManager::new();
        let run_id = manager.create_run(cfg()).unwrap();
        manager.start(run_id).unwrap();
        tokio::time::timeout(Duration::from_secs(5), manager.stop(run_id))
            .await
            .expect("stop should complete")
            .unwrap();
        let status = manager.status(run_id).unwrap();
        assert!(is_terminal(status.status));
    }

    #[tokio::test]
    async fn stop_on_already_stopped_run_is_noop() {
        let manager = RunManager::new();
        let run_id = manager.create_run(cfg()).unwrap();
        manager.start(run_id).unwrap();
        let first = tokio::time::timeout(Duration::from_secs(5), manager.stop(run_id))
            .await
            .unwrap()
            .unwrap();
        let second = tokio::time::timeout(Duration::from_secs(5), manager.stop(run_id))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn unknown_run_id_rejected() {
        let manager = RunManager::new();
        assert!(manager.status(RunId::new()).is_err());
    }

    #[tokio::test]
    async fn subscribe_right_after_start_gets_no_spurious_tick() {
        let manager = RunManager::new();
        let run_id = manager.create_run(cfg()).unwrap();
        manager.start(run_id).unwrap();
        // Race `/sim/start`: the driver thread may not have completed a
        // step yet, so this must not see a `tick` before any ran.
        let (_sub, replay) = manager.subscribe(run_id).unwrap();
        assert!(matches!(replay[0], BridgeMessage::ConnectionConfirmed { .. }));
        assert!(matches!(replay[1], BridgeMessage::InitState { .. }));
        assert!(
            !replay.iter().any(|m| matches!(m, BridgeMessage::Tick { .. })),
            "subscribing before any step ran must not replay a tick"
        );
        let _ = tokio::time::timeout(Duration::from_secs(5), manager.stop(run_id)).await;
    }

    #[tokio::test]
    async fn subscribe_mid_run_replays_full_tick() {
        let manager = RunManager::new();
        let run_id = manager.create_run(cfg()).unwrap();
        manager.start(run_id).unwrap();
        // Wait for at least one step to land before attaching.
        for _ in 0..200 {
            if manager.status(run_id).unwrap().current_step > 0 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        let (_sub, replay) = manager.subscribe(run_id).unwrap();
        assert!(matches!(replay[0], BridgeMessage::ConnectionConfirmed { .. }));
        assert!(matches!(replay[1], BridgeMessage::InitState { .. }));
        assert!(
            replay.iter().any(|m| matches!(m, BridgeMessage::Tick { .. })),
            "subscribing mid-run must replay one full tick"
        );
        let _ = tokio::time::timeout(Duration::from_secs(5), manager.stop(run_id)).await;
    }
}
