//! Shared identity, clock, data model, error and observability primitives
//! for the UtilityFog simulation core.
//!
//! This crate has no runtime behavior of its own — it is the vocabulary
//! `ufog-runtime` and `ufog-bridge` both build on, the same role
//! `phago-core` plays for the rest of its workspace.

pub mod config;
pub mod error;
pub mod ids;
pub mod model;
pub mod observability;
pub mod rng;

pub mod prelude {
    pub use crate::config::SimConfig;
    pub use crate::error::{ConfigError, InvariantError, RoutingError, SubscriberError, UfogError};
    pub use crate::ids::{AgentId, EnvelopeId, EventId, IdMinter, MemeId, NodeId, RunId, Step};
    pub use crate::model::{
        AgentState, Entanglement, EntanglementEventKind, Envelope, EnvelopeKind, Event, Meme,
        MemeKind, Role, Route, TreeNode,
    };
    pub use crate::observability::{Counter, Gauge, Histogram, Metrics, RateLimitedSink};
    pub use crate::rng::DeterministicRng;
}
