//! Messaging Fabric (C5): routes Envelopes by unicast, broadcast-children,
//! broadcast-subtree and propagate-to-root, with at-most-once delivery
//! and per-target backpressure.
//!
//! Follows the teacher's bounded-channel backpressure idiom
//! (`DocumentChannel`'s `try_send`-returns-bool pattern in `streaming.rs`)
//! generalized from a single channel to one bounded FIFO per
//! `(sender, target)` pair, stored as a capacity-bounded `VecDeque` on
//! each agent's own mailbox.
//!
//! Implementation note: unicast/subtree/root routing resolve to their
//! destination mailbox directly rather than hopping the tree edge by
//! edge — the scheduler has no wall-clock transit latency to model, and
//! the observable contracts (at-most-once, FIFO per sender/target,
//! `expiry_step`, `mailbox_overflow`) don't depend on the hop count.

use std::collections::{HashMap, HashSet, VecDeque};
use ufog_core::prelude::*;

use crate::topology::TreeTopology;

/// Per-agent bounded mailboxes, keyed by the owning agent.
pub struct Mailboxes {
    capacity: usize,
    queues: HashMap<AgentId, VecDeque<Envelope>>,
}

impl Mailboxes {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            queues: HashMap::new(),
        }
    }

    pub fn ensure(&mut self, agent: AgentId) {
        self.queues.entry(agent).or_default();
    }

    /// Freeze this agent's current mailbox contents for the step (Phase 1
    /// inbox snapshot), leaving the mailbox empty for this step's
    /// deliveries.
    pub fn take_snapshot(&mut self, agent: AgentId) -> Vec<Envelope> {
        self.queues
            .get_mut(&agent)
            .map(|q| q.drain(..).collect())
            .unwrap_or_default()
    }

    /// Attempt delivery to `target`'s mailbox; returns `false` (dropped at
    /// sender side) if the mailbox is already at capacity.
    fn try_deliver(&mut self, target: AgentId, envelope: Envelope) -> bool {
        let queue = self.queues.entry(target).or_default();
        if queue.len() >= self.capacity {
            false
        } else {
            queue.push_back(envelope);
            true
        }
    }

    pub fn remove_agent(&mut self, agent: AgentId) {
        self.queues.remove(&agent);
    }
}

/// Outcome of routing one envelope, used to emit `ERROR`/overflow events.
pub enum RouteOutcome {
    Delivered { target: AgentId },
    Dropped { target: AgentId, reason: RoutingError },
    Expired,
}

/// Route a single outbox envelope. `agent_of_node`/`node_of_agent` map
/// the live agent population onto topology positions.
#[allow(clippy::too_many_arguments)]
pub fn route_envelope(
    envelope: Envelope,
    sender_node: NodeId,
    topology: &TreeTopology,
    agent_of_node: &HashMap<NodeId, AgentId>,
    mailboxes: &mut Mailboxes,
    current_step: Step,
    seen: &mut HashSet<EnvelopeId>,
) -> Vec<RouteOutcome> {
    if envelope.expiry_step < current_step {
        return vec![RouteOutcome::Expired];
    }
    if !seen.insert(envelope.envelope_id) {
        // Already delivered this envelope id once; at-most-once holds.
        return Vec::new();
    }

    match &envelope.route {
        Route::Unicast(target) => {
            let ok = mailboxes.try_deliver(*target, envelope.clone());
            vec![if ok {
                RouteOutcome::Delivered { target: *target }
            } else {
                RouteOutcome::Dropped {
                    target: *target,
                    reason: RoutingError::MailboxOverflow(target.to_string()),
                }
            }]
        }
        Route::BroadcastChildren => {
            let Some(node) = topology.get(sender_node) else {
                return vec![RouteOutcome::Dropped {
                    target: envelope.sender,
                    reason: RoutingError::UnknownTarget(sender_node.to_string()),
                }];
            };
            node.children
                .iter()
                .filter_map(|child| agent_of_node.get(child).copied())
                .map(|target| deliver_or_drop(mailboxes, target, envelope.clone()))
                .collect()
        }
        Route::BroadcastSubtree => {
            let subtree = topology.subtree(sender_node);
            subtree
                .into_iter()
                .filter(|n| *n != sender_node)
                .filter_map(|n| agent_of_node.get(&n).copied())
                .map(|target| deliver_or_drop(mailboxes, target, envelope.clone()))
                .collect()
        }
        Route::PropagateToRoot => {
            let path = topology.path_to_root(sender_node);
            let Some(root_node) = path.last().copied() else {
                return vec![RouteOutcome::Dropped {
                    target: envelope.sender,
                    reason: RoutingError::UnknownTarget(sender_node.to_string()),
                }];
            };
            if root_node == sender_node {
                return Vec::new();
            }
            let Some(target) = agent_of_node.get(&root_node).copied() else {
                return Vec::new();
            };
            vec![deliver_or_drop(mailboxes, target, envelope)]
        }
    }
}

fn deliver_or_drop(mailboxes: &mut Mailboxes, target: AgentId, envelope: Envelope) -> RouteOutcome {
    if mailboxes.try_deliver(target, envelope) {
        RouteOutcome::Delivered { target }
    } else {
        RouteOutcome::Dropped {
            target,
            reason: RoutingError::MailboxOverflow(target.to_string()),
        }
    }
}
