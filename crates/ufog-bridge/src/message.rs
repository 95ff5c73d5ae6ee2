//! The SimBridge wire schema (spec §4.10): a closed `#[serde(tag = "type")]`
//! enum replacing the teacher's ad hoc `{"type": "...", "data": ...}` JSON
//! shape (`phago_web::routes::ws`) with seven named, typed variants.

use serde::{Deserialize, Serialize};
use ufog_core::prelude::*;
use ufog_runtime::prelude::RunStatus;

/// A node as seen by a subscriber: position in the tree plus the agent
/// currently occupying it, if any.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeSnapshot {
    pub node_id: NodeId,
    pub parent: Option<NodeId>,
    pub depth: u32,
    pub agent_id: Option<AgentId>,
}

/// One parent-child edge of the tree.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EdgeSnapshot {
    pub parent: NodeId,
    pub child: NodeId,
}

/// Full per-agent state, used only for `init_state`'s reconstructed full
/// tick (spec §4.10: "a full `tick` containing all agents").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentSnapshot {
    pub agent_id: AgentId,
    pub node_id: NodeId,
    pub energy: f64,
    pub health: f64,
    pub role: Role,
    pub active_memes: Vec<MemeId>,
}

/// A delta-encoded agent update: only the fields whose value changed
/// versus the last value transmitted for that agent (spec §4.10's delta
/// property). `energy`/`health` are `None` when unchanged this step.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentDelta {
    pub agent_id: AgentId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub energy: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub health: Option<f64>,
}

/// A reconstructed live snapshot of a run, self-describing per spec §6's
/// "MUST be self-describing (schema version field)" persisted-state
/// contract — reused here for the mid-run-subscribe replay, not just
/// on-disk persistence (which this implementation does not perform).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSnapshot {
    pub schema_version: u32,
    pub run_id: RunId,
    pub step: Step,
    pub nodes: Vec<NodeSnapshot>,
    pub edges: Vec<EdgeSnapshot>,
    pub agents: Vec<AgentSnapshot>,
    pub config: SimConfig,
}

pub const SNAPSHOT_SCHEMA_VERSION: u32 = 1;

/// A status snapshot returned by `GET /sim/status`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunStatusSnapshot {
    pub run_id: RunId,
    pub status: RunStatus,
    pub current_step: Step,
    pub total_steps: u64,
}

/// The summary carried by a terminal `done` message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSummary {
    pub total_steps_run: Step,
    pub final_active_agents: usize,
    pub final_entanglements: usize,
}

/// The closed discriminated union of server-to-client wire messages (spec
/// §4.10). Exactly these seven variants; adding one is an explicit schema
/// change, per Design Notes §9's "closed discriminated union" redesign
/// flag applied to the transport layer as well as the domain `Event`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BridgeMessage {
    ConnectionConfirmed {
        run_id: RunId,
    },
    InitState {
        nodes: Vec<NodeSnapshot>,
        edges: Vec<EdgeSnapshot>,
        config: SimConfig,
    },
    Tick {
        step: Step,
        agent_updates: Vec<AgentDelta>,
    },
    Event {
        event_type: String,
        data: serde_json::Value,
    },
    Stats {
        step: Step,
        stats: serde_json::Value,
    },
    Done {
        status: String,
        final_step: Step,
        summary: RunSummary,
    },
    Error {
        error: String,
        detail: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        step: Option<Step>,
    },
}

impl BridgeMessage {
    /// Whether this message is a `tick` — used by the subscriber
    /// backpressure policy, which drops oldest non-tick messages before
    /// oldest ticks (spec §4.10).
    pub fn is_tick(&self) -> bool {
        matches!(self, BridgeMessage::Tick { .. })
    }
}

/// Translate a domain `Event` (spec §3) into its wire `event` message.
pub fn event_to_wire(event: &Event) -> BridgeMessage {
    let event_type = match event {
        Event::AgentUpdate { .. } => "AGENT_UPDATE",
        Event::Entanglement { .. } => "ENTANGLEMENT",
        Event::MemeSpread { .. } => "MEME_SPREAD",
        Event::MemeMutate { .. } => "MEME_MUTATE",
        Event::MemeEvicted { .. } => "MEME_EVICTED",
        Event::HealthEvent { .. } => "HEALTH_EVENT",
        Event::StepComplete { .. } => "STEP_COMPLETE",
        Event::GenerationComplete { .. } => "GENERATION_COMPLETE",
        Event::Error { .. } => "ERROR",
    };
    BridgeMessage::Event {
        event_type: event_type.to_string(),
        data: serde_json::to_value(event).unwrap_or(serde_json::Value::Null),
    }
}
