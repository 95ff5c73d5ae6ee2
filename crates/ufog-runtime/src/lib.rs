//! Topology, agent, messaging, meme, entanglement, evolution and scheduler
//! engines (C3-C9) for a UtilityFog simulation run.
//!
//! `ufog-core` supplies the vocabulary (ids, config, data model, errors,
//! observability); this crate supplies the behavior that creates, mutates
//! and destroys those entities over the lifetime of one `Run`.

pub mod agent;
pub mod entanglement;
pub mod evolution;
pub mod meme;
pub mod messaging;
pub mod scheduler;
pub mod topology;

pub mod prelude {
    pub use crate::agent::{apply_step, InboxSnapshot, Services, StepOutcome};
    pub use crate::entanglement::{EntanglementConfig, EntanglementTable, Perturbation};
    pub use crate::evolution::{rank, reproduce_memes, roulette_select, FitnessTracker};
    pub use crate::meme::MemeRegistry;
    pub use crate::messaging::{route_envelope, Mailboxes, RouteOutcome};
    pub use crate::scheduler::{Run, RunStatus, StepStats};
    pub use crate::topology::TreeTopology;
}
