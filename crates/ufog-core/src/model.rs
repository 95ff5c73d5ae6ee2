//! Shared data model (spec §3): Agent, TreeNode, Meme, Entanglement,
//! Envelope, Event — the entity schema every engine crate operates on.
//!
//! These are plain data types; the behavior that creates, mutates and
//! destroys them lives in `ufog-runtime`'s engines, per the Design Notes
//! "arena + stable ID" redesign flag (cross-references are IDs here,
//! never structural pointers).

use crate::ids::{AgentId, EnvelopeId, EventId, MemeId, NodeId, Step};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// A small fixed enumeration of agent roles (Design Notes: "specialized
/// agent roles are fields, not subclasses").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Role {
    Worker,
    Relay,
    Sentinel,
}

/// Per-agent state (spec §3 Agent). `energy`/`health` are clamped to
/// `[0, 1]` by every mutator in `ufog-runtime::agent`, never by the
/// reader.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentState {
    pub agent_id: AgentId,
    pub node_id: NodeId,
    pub energy: f64,
    pub health: f64,
    pub role: Role,
    pub active_memes: Vec<MemeId>,
    #[serde(skip)]
    pub mailbox: VecDeque<Envelope>,
    pub last_step_applied: Step,
    /// Bookkeeping for the quarantine policy (spec §7): consecutive
    /// panicking steps within the current generation.
    pub consecutive_failures: u32,
    pub terminal: bool,
}

impl AgentState {
    pub fn new(agent_id: AgentId, node_id: NodeId, role: Role) -> Self {
        Self {
            agent_id,
            node_id,
            energy: 1.0,
            health: 1.0,
            role,
            active_memes: Vec::new(),
            mailbox: VecDeque::new(),
            last_step_applied: 0,
            consecutive_failures: 0,
            terminal: false,
        }
    }

    pub fn clamp_vitals(&mut self) {
        self.energy = self.energy.clamp(0.0, 1.0);
        self.health = self.health.clamp(0.0, 1.0);
    }

    pub fn is_dead(&self) -> bool {
        self.health <= 0.0
    }
}

/// A position in the fractal tree (spec §3 TreeNode).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TreeNode {
    pub node_id: NodeId,
    pub parent: Option<NodeId>,
    pub children: Vec<NodeId>,
    pub depth: u32,
    pub agent_id: Option<AgentId>,
}

impl TreeNode {
    pub fn root(node_id: NodeId) -> Self {
        Self {
            node_id,
            parent: None,
            children: Vec::new(),
            depth: 0,
            agent_id: None,
        }
    }
}

/// The class of transmissible behavior a meme encodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MemeKind {
    Behavioral,
    Cognitive,
    Social,
    Resource,
    Communication,
}

/// An immutable meme genome version (spec §3 Meme). Mutation/crossover
/// always produce a *new* `Meme`; existing ones are never edited.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Meme {
    pub meme_id: MemeId,
    pub kind: MemeKind,
    pub genome: Vec<u8>,
    pub fitness: f64,
    pub generation: u32,
    pub parent_meme_ids: Vec<MemeId>,
}

/// A pairwise coupling between two agents (spec §3 Entanglement). `pair`
/// is stored in canonical `(min, max)` order by the IDs' `Ord` impl so
/// `(a, b)` and `(b, a)` are always the same key.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Entanglement {
    pub pair: (AgentId, AgentId),
    pub strength: f64,
    pub created_step: Step,
    pub last_reinforced_step: Step,
}

impl Entanglement {
    pub fn canonical_pair(a: AgentId, b: AgentId) -> (AgentId, AgentId) {
        if a <= b {
            (a, b)
        } else {
            (b, a)
        }
    }
}

/// How an Envelope is routed through the tree (spec §4.5).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Route {
    Unicast(AgentId),
    BroadcastChildren,
    BroadcastSubtree,
    PropagateToRoot,
}

/// The kind of payload an Envelope carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EnvelopeKind {
    Data,
    MemeCarrier,
    ControlPing,
}

/// A typed, routed message between agents (spec §3 Envelope). Delivered
/// at most once; discarded past `expiry_step`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope {
    pub envelope_id: EnvelopeId,
    pub kind: EnvelopeKind,
    pub sender: AgentId,
    pub route: Route,
    pub payload: Vec<u8>,
    pub issued_step: Step,
    pub expiry_step: Step,
}

/// The closed discriminated union of domain events (spec §3 Event;
/// Design Notes: "a closed discriminated union of event kinds with a
/// single emit/consume interface").
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event_type", content = "data")]
pub enum Event {
    AgentUpdate {
        event_id: EventId,
        step: Step,
        agent_id: AgentId,
        energy: f64,
        health: f64,
    },
    Entanglement {
        event_id: EventId,
        step: Step,
        pair: (AgentId, AgentId),
        kind: EntanglementEventKind,
        strength: f64,
    },
    MemeSpread {
        event_id: EventId,
        step: Step,
        meme_id: MemeId,
        target: AgentId,
    },
    MemeMutate {
        event_id: EventId,
        step: Step,
        parent: MemeId,
        child: MemeId,
    },
    MemeEvicted {
        event_id: EventId,
        step: Step,
        meme_id: MemeId,
        agent_id: AgentId,
    },
    HealthEvent {
        event_id: EventId,
        step: Step,
        agent_id: AgentId,
        health: f64,
        cause: String,
    },
    StepComplete {
        event_id: EventId,
        step: Step,
    },
    GenerationComplete {
        event_id: EventId,
        generation: u32,
        step: Step,
    },
    Error {
        event_id: EventId,
        step: Step,
        error_key: String,
        detail: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EntanglementEventKind {
    Create,
    Reinforce,
    Destroy,
}

impl Event {
    pub fn step(&self) -> Step {
        match self {
            Event::AgentUpdate { step, .. }
            | Event::Entanglement { step, .. }
            | Event::MemeSpread { step, .. }
            | Event::MemeMutate { step, .. }
            | Event::MemeEvicted { step, .. }
            | Event::HealthEvent { step, .. }
            | Event::StepComplete { step, .. }
            | Event::GenerationComplete { step, .. }
            | Event::Error { step, .. } => *step,
        }
    }
}
