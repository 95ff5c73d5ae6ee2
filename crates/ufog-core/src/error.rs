//! Error taxonomy for the simulation core.
//!
//! Mirrors spec §7: configuration errors reject synchronously, routing
//! errors recover locally and surface as `ERROR` events, invariant
//! violations are fatal and fail the run, subscriber errors are isolated
//! to one subscription, and observability errors never leave
//! `crate::observability`.

use std::fmt;

/// Top-level error type returned by value from engines; the scheduler
/// alone decides which variants are fatal.
#[derive(Debug, Clone, PartialEq)]
pub enum UfogError {
    Config(ConfigError),
    Routing(RoutingError),
    Invariant(InvariantError),
    Subscriber(SubscriberError),
    Io(String),
}

impl fmt::Display for UfogError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UfogError::Config(e) => write!(f, "configuration error: {e}"),
            UfogError::Routing(e) => write!(f, "routing error: {e}"),
            UfogError::Invariant(e) => write!(f, "invariant violation: {e}"),
            UfogError::Subscriber(e) => write!(f, "subscriber error: {e}"),
            UfogError::Io(s) => write!(f, "io error: {s}"),
        }
    }
}

impl std::error::Error for UfogError {}

impl From<ConfigError> for UfogError {
    fn from(e: ConfigError) -> Self {
        UfogError::Config(e)
    }
}

impl From<RoutingError> for UfogError {
    fn from(e: RoutingError) -> Self {
        UfogError::Routing(e)
    }
}

impl From<InvariantError> for UfogError {
    fn from(e: InvariantError) -> Self {
        UfogError::Invariant(e)
    }
}

impl From<SubscriberError> for UfogError {
    fn from(e: SubscriberError) -> Self {
        UfogError::Subscriber(e)
    }
}

impl From<std::io::Error> for UfogError {
    fn from(e: std::io::Error) -> Self {
        UfogError::Io(e.to_string())
    }
}

/// Rejected synchronously at `create_run`, before any run state exists.
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigError {
    UnknownKey(String),
    OutOfRange { key: String, detail: String },
    ZeroAgents,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::UnknownKey(k) => write!(f, "unknown configuration key: {k}"),
            ConfigError::OutOfRange { key, detail } => {
                write!(f, "configuration key '{key}' out of range: {detail}")
            }
            ConfigError::ZeroAgents => write!(f, "num_agents must be at least 1"),
        }
    }
}

impl std::error::Error for ConfigError {}

/// Recovered locally by the Messaging Fabric; surfaced as a rate-limited
/// `ERROR` event, never propagated as an exception.
#[derive(Debug, Clone, PartialEq)]
pub enum RoutingError {
    UnknownTarget(String),
    MailboxOverflow(String),
    EnvelopeExpired(String),
    CycleDetected,
}

impl fmt::Display for RoutingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RoutingError::UnknownTarget(t) => write!(f, "unknown target: {t}"),
            RoutingError::MailboxOverflow(t) => write!(f, "mailbox overflow for target: {t}"),
            RoutingError::EnvelopeExpired(id) => write!(f, "envelope expired: {id}"),
            RoutingError::CycleDetected => write!(f, "cycle detected in routing path"),
        }
    }
}

impl std::error::Error for RoutingError {}

/// Fatal: indicates an implementation bug, never user input. The
/// scheduler transitions the run to `failed` on encountering one of
/// these.
#[derive(Debug, Clone, PartialEq)]
pub enum InvariantError {
    TopologyCycle,
    DuplicateId(String),
    MemeCapacityUnderflow,
    MissingRoot,
    DepthExceeded { node: String, depth: u32, max: u32 },
    BranchingExceeded { node: String, count: usize, max: usize },
}

impl fmt::Display for InvariantError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InvariantError::TopologyCycle => write!(f, "topology contains a cycle"),
            InvariantError::DuplicateId(id) => write!(f, "duplicate id: {id}"),
            InvariantError::MemeCapacityUnderflow => write!(f, "meme capacity underflow"),
            InvariantError::MissingRoot => write!(f, "topology has no root"),
            InvariantError::DepthExceeded { node, depth, max } => {
                write!(f, "node {node} at depth {depth} exceeds max depth {max}")
            }
            InvariantError::BranchingExceeded { node, count, max } => {
                write!(f, "node {node} has {count} children, exceeds branching factor {max}")
            }
        }
    }
}

impl std::error::Error for InvariantError {}

/// Isolated to one subscription; the scheduler is never blocked by these.
#[derive(Debug, Clone, PartialEq)]
pub enum SubscriberError {
    Lagged(u64),
    Disconnected,
}

impl fmt::Display for SubscriberError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SubscriberError::Lagged(n) => write!(f, "subscriber lagged behind by {n} messages"),
            SubscriberError::Disconnected => write!(f, "subscriber disconnected"),
        }
    }
}

impl std::error::Error for SubscriberError {}

pub type Result<T> = std::result::Result<T, UfogError>;
