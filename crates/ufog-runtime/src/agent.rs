//! Agent (C4): a single tagged-capability-set agent shape (Design Notes
//! §9: no polymorphic agent hierarchy — specialized behavior is a `Role`
//! field, not a subclass) whose `apply_step` is a pure function over
//! `(prior_state, inbox_snapshot, deterministic_rng)`. Side effects only
//! ever happen through the returned outbox and events, mirroring the
//! teacher's `Agent::tick(&self, substrate) -> AgentAction` shape without
//! the `dyn Agent` indirection the teacher needs for its digester zoo.

use ufog_core::prelude::*;

/// A step's frozen mailbox contents, produced by the scheduler's Phase 1.
#[derive(Debug, Clone, Default)]
pub struct InboxSnapshot {
    pub envelopes: Vec<Envelope>,
}

/// Read-only environment an agent consults while deciding its step.
/// Agents never mutate shared state directly; everything here is a
/// snapshot taken before Phase 2 begins (spec §5: "reads during
/// `apply_step` see the pre-phase snapshot").
pub struct Services<'a> {
    pub node_id: NodeId,
    pub neighbor_agents: &'a [AgentId],
    pub step: Step,
    pub mailbox_capacity: usize,
    pub energy_drain: f64,
    pub energy_gain: f64,
    pub health_recovery_rate: f64,
    pub meme_spread_chance: f64,
}

/// Everything `apply_step` produces: an outbox to route, a state delta to
/// apply, and events to flush. The scheduler applies all of this in
/// Phase 3+; `apply_step` itself never mutates `AgentState`.
#[derive(Debug, Clone)]
pub struct StepOutcome {
    pub outbox: Vec<Envelope>,
    pub energy: f64,
    pub health: f64,
    pub emitted_events: Vec<Event>,
}

/// Pure function over `(prior_state, inbox_snapshot, deterministic_rng)`.
/// Updates energy by the baseline drain plus a per-processed-envelope
/// gain (saturating at 1.0); updates health down proportionally to
/// envelopes that could not fit this step's mailbox capacity, and
/// recovers it at the configured rate when idle (spec §4.4).
pub fn apply_step(
    state: &AgentState,
    inbox: &InboxSnapshot,
    services: &Services,
    rng: &mut DeterministicRng,
    ids: &mut IdMinter,
) -> StepOutcome {
    let processed: Vec<&Envelope> = inbox
        .envelopes
        .iter()
        .take(services.mailbox_capacity)
        .collect();
    let overflow = inbox.envelopes.len().saturating_sub(services.mailbox_capacity);

    let mut energy = state.energy - services.energy_drain;
    energy += services.energy_gain * processed.len() as f64;
    energy = energy.clamp(0.0, 1.0);

    let mut health = state.health;
    if overflow > 0 {
        health -= services.energy_drain.max(0.01) * overflow as f64;
    } else if processed.is_empty() {
        health += services.health_recovery_rate;
    }
    health = health.clamp(0.0, 1.0);

    let mut outbox = Vec::new();
    let mut emitted_events = Vec::new();

    // A worker with live neighbors occasionally emits a unicast envelope
    // to a deterministically chosen neighbor; relays/sentinels stay quiet
    // unless they have traffic to forward. This keeps the fabric
    // exercised without making every agent chatty every step.
    if matches!(state.role, Role::Worker) && !services.neighbor_agents.is_empty() && rng.chance(0.3)
    {
        let target = services.neighbor_agents[rng.index(services.neighbor_agents.len())];
        outbox.push(Envelope {
            envelope_id: ids.envelope(),
            kind: EnvelopeKind::Data,
            sender: state.agent_id,
            route: Route::Unicast(target),
            payload: Vec::new(),
            issued_step: services.step,
            expiry_step: services.step + 4,
        });
    }

    // Carriers occasionally forward one of their active memes to a
    // neighbor, triggering the Meme Engine's Propagate(source, targets)
    // (spec §4.6) on delivery.
    if !state.active_memes.is_empty()
        && !services.neighbor_agents.is_empty()
        && rng.chance(services.meme_spread_chance)
    {
        let target = services.neighbor_agents[rng.index(services.neighbor_agents.len())];
        let meme_id = state.active_memes[rng.index(state.active_memes.len())];
        outbox.push(Envelope {
            envelope_id: ids.envelope(),
            kind: EnvelopeKind::MemeCarrier,
            sender: state.agent_id,
            route: Route::Unicast(target),
            payload: meme_id.0.as_bytes().to_vec(),
            issued_step: services.step,
            expiry_step: services.step + 4,
        });
    }

    if overflow > 0 {
        emitted_events.push(Event::HealthEvent {
            event_id: ids.event(),
            step: services.step,
            agent_id: state.agent_id,
            health,
            cause: "mailbox_overflow".to_string(),
        });
    }

    StepOutcome {
        outbox,
        energy,
        health,
        emitted_events,
    }
}
