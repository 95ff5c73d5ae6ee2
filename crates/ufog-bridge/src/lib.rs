//! SimBridge and Run Manager (C10-C11): the HTTP/WebSocket front door onto
//! one or more `ufog_runtime::scheduler::Run`s.
//!
//! Generalizes the teacher's single-process `phago-web` crate (one
//! `AppState` wrapping exactly one `Colony`) into a multi-run server: the
//! router/handler/state split is the same, `RunManager` just takes the
//! place of the teacher's bare `AppState` fields to allow more than one
//! run to exist at once.

pub mod bridge;
pub mod manager;
pub mod message;
pub mod routes;

pub mod prelude {
    pub use crate::bridge::{SimBridge, Subscription};
    pub use crate::manager::{RunManager, RunNotFound};
    pub use crate::message::{
        event_to_wire, AgentDelta, AgentSnapshot, BridgeMessage, EdgeSnapshot, NodeSnapshot,
        RunSnapshot, RunStatusSnapshot, RunSummary, SNAPSHOT_SCHEMA_VERSION,
    };
    pub use crate::routes::build_router;
}
