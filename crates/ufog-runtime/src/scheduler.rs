//! Scheduler / Run Loop (C9): the single-threaded cooperative driver over
//! the agent population.
//!
//! This is the direct structural descendant of the teacher's
//! `Colony::tick()` multi-phase step function (`colony.rs`): the same
//! "collect `(id, outcome)` pairs during the read-only phase, apply them
//! in a second phase, decay shared state in a third" discipline, with
//! pacing (Phase 8) and a run-level state machine layered on top — the
//! teacher has no run lifecycle because it has no concept of "run" at
//! all, `Colony` just runs until its caller stops calling `tick()`.

use std::collections::HashMap;
use std::time::Instant;

use ufog_core::prelude::*;

use crate::agent::{apply_step, InboxSnapshot, Services};
use crate::entanglement::{EntanglementConfig, EntanglementTable};
use crate::evolution::{self, FitnessTracker};
use crate::meme::MemeRegistry;
use crate::messaging::{route_envelope, Mailboxes, RouteOutcome};
use crate::topology::TreeTopology;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunStatus {
    Idle,
    Starting,
    Running,
    Completing,
    Completed,
    Stopped,
    Failed,
}

use serde::{Deserialize, Serialize};

/// Per-step statistics (spec §4.9 Phase 6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepStats {
    pub step: Step,
    pub active_agents: usize,
    pub mean_energy: f64,
    pub mean_health: f64,
    pub meme_diversity: f64,
    pub entanglement_count: usize,
    pub dropped_messages: u64,
}

/// One end-to-end simulation instance (spec §3 Run). Owns its Topology,
/// agent population, MemeRegistry, EntanglementTable and Scheduler state
/// exclusively for its lifetime.
pub struct Run {
    pub run_id: RunId,
    pub config: SimConfig,
    pub status: RunStatus,
    pub current_step: Step,
    pub total_steps: u64,

    topology: TreeTopology,
    agents: HashMap<AgentId, AgentState>,
    agent_order: Vec<AgentId>,
    node_of_agent: HashMap<AgentId, NodeId>,
    agent_of_node: HashMap<NodeId, AgentId>,
    mailboxes: Mailboxes,
    memes: MemeRegistry,
    entanglements: EntanglementTable,
    fitness: FitnessTracker,
    pub metrics: Metrics,

    last_transmitted: HashMap<AgentId, (f64, f64)>,
    pending_events: Vec<Event>,
    seen_envelopes: std::collections::HashSet<EnvelopeId>,
    last_stats: Option<StepStats>,
    /// Times each meme has been propagated to a new carrier since the last
    /// generation boundary (spec §4.6 fitness update's "downstream
    /// propagation count observed in the previous generation").
    meme_propagation_counts: HashMap<MemeId, u32>,

    /// Every ID embedded in this run's event stream is minted here, from
    /// streams seeded off `config.seed` (spec.md:57): same seed, same IDs,
    /// same positions, so two runs of the same `(config, seed)` diff to
    /// zero (Testable Scenario 2).
    ids: IdMinter,

    rng_agent_apply: DeterministicRng,
    rng_meme_mutate: DeterministicRng,
    rng_meme_crossover: DeterministicRng,
    rng_evolution_roulette: DeterministicRng,
    rng_agent_spawn: DeterministicRng,

    cancel_requested: bool,
    started_at: Instant,
}

/// Max consecutive panicking steps before an agent is quarantined (spec
/// §7: "repeated failures within a generation quarantine the agent").
const QUARANTINE_THRESHOLD: u32 = 3;

impl Run {
    pub fn new(config: SimConfig) -> Result<Self, ConfigError> {
        let config = config.validate()?;
        let mut ids = IdMinter::for_seed(config.seed);
        let (mut topology, node_order) = TreeTopology::build(
            config.num_agents,
            config.network_depth,
            config.branching_factor,
            &mut ids,
        );

        let mut agents = HashMap::new();
        let mut agent_order = Vec::new();
        let mut node_of_agent = HashMap::new();
        let mut agent_of_node = HashMap::new();
        let mut mailboxes = Mailboxes::new(config.mailbox_capacity);
        let mut memes = MemeRegistry::default();
        let mut fitness = FitnessTracker::default();
        let mut rng_agent_spawn = DeterministicRng::for_component(config.seed, "agent.spawn");
        let mut rng_meme_mutate = DeterministicRng::for_component(config.seed, "meme.mutate");

        for node_id in &node_order {
            let agent_id = ids.agent();
            let role = match rng_agent_spawn.index(3) {
                0 => Role::Worker,
                1 => Role::Relay,
                _ => Role::Sentinel,
            };
            let mut state = AgentState::new(agent_id, *node_id, role);
            for _ in 0..config.initial_memes_per_agent {
                let meme_id =
                    memes.spawn_initial(MemeKind::Behavioral, 8, &mut rng_meme_mutate, &mut ids);
                state.active_memes.push(meme_id);
            }
            topology.assign_agent(*node_id, agent_id);
            mailboxes.ensure(agent_id);
            fitness.register(agent_id);
            node_of_agent.insert(agent_id, *node_id);
            agent_of_node.insert(*node_id, agent_id);
            agent_order.push(agent_id);
            agents.insert(agent_id, state);
        }
        agent_order.sort();

        let total_steps = config.total_steps();

        Ok(Self {
            run_id: RunId::new(),
            status: RunStatus::Starting,
            current_step: 0,
            total_steps,
            topology,
            agents,
            agent_order,
            node_of_agent,
            agent_of_node,
            mailboxes,
            memes,
            entanglements: EntanglementTable::default(),
            fitness,
            metrics: Metrics::new(config.error_rate_limit_per_minute),
            last_transmitted: HashMap::new(),
            pending_events: Vec::new(),
            seen_envelopes: std::collections::HashSet::new(),
            last_stats: None,
            meme_propagation_counts: HashMap::new(),
            ids,
            rng_agent_apply: DeterministicRng::for_component(config.seed, "agent.apply"),
            rng_meme_mutate: DeterministicRng::for_component(config.seed, "meme.mutate"),
            rng_meme_crossover: DeterministicRng::for_component(config.seed, "meme.crossover"),
            rng_evolution_roulette: DeterministicRng::for_component(config.seed, "evolution.roulette"),
            rng_agent_spawn,
            cancel_requested: false,
            started_at: Instant::now(),
            config,
        })
    }

    pub fn request_stop(&mut self) {
        self.cancel_requested = true;
    }

    pub fn alive_count(&self) -> usize {
        self.agents.values().filter(|a| !a.terminal).count()
    }

    pub fn agents(&self) -> &HashMap<AgentId, AgentState> {
        &self.agents
    }

    pub fn topology(&self) -> &TreeTopology {
        &self.topology
    }

    pub fn entanglements(&self) -> &EntanglementTable {
        &self.entanglements
    }

    fn wall_clock_exceeded(&self) -> bool {
        match self.config.wall_clock_budget_seconds {
            Some(budget) => self.started_at.elapsed().as_secs_f64() >= budget,
            None => false,
        }
    }

    /// Advance the run by exactly one step, per spec §4.9's ordered
    /// sub-phases. Returns the events emitted this step, strictly
    /// appended-to in step order and flushed before any event of the
    /// next step (spec §5 ordering guarantee).
    pub fn step(&mut self) -> Vec<Event> {
        if self.status == RunStatus::Completed
            || self.status == RunStatus::Stopped
            || self.status == RunStatus::Failed
        {
            return Vec::new();
        }
        self.status = RunStatus::Running;

        let started = Instant::now();
        let step_no = self.current_step + 1;
        let mut events: Vec<Event> = std::mem::take(&mut self.pending_events);

        if self.cancel_requested || self.wall_clock_exceeded() {
            self.status = RunStatus::Stopped;
            events.push(Event::StepComplete {
                event_id: self.ids.event(),
                step: self.current_step,
            });
            return events;
        }

        // Phase 1: inbox snapshot.
        let mut snapshots: HashMap<AgentId, InboxSnapshot> = HashMap::new();
        for agent_id in &self.agent_order {
            snapshots.insert(
                *agent_id,
                InboxSnapshot {
                    envelopes: self.mailboxes.take_snapshot(*agent_id),
                },
            );
        }

        // Phase 2: agent apply, strictly in ascending agent_id order
        // (spec §4.9 step 2; this implementation does not parallelize,
        // so the deterministic order requirement is satisfied trivially).
        let mut outcomes = Vec::new();
        for agent_id in self.agent_order.clone() {
            let Some(state) = self.agents.get(&agent_id) else {
                continue;
            };
            if state.terminal || state.consecutive_failures >= QUARANTINE_THRESHOLD {
                continue;
            }
            let node_id = self.node_of_agent[&agent_id];
            let neighbor_agents: Vec<AgentId> = self
                .topology
                .neighbors(node_id)
                .into_iter()
                .filter_map(|n| self.agent_of_node.get(&n).copied())
                .collect();
            let services = Services {
                node_id,
                neighbor_agents: &neighbor_agents,
                step: step_no,
                mailbox_capacity: self.config.mailbox_capacity,
                energy_drain: self.config.energy_drain,
                energy_gain: self.config.energy_gain,
                health_recovery_rate: self.config.health_recovery_rate,
                meme_spread_chance: self.config.meme_spread_chance,
            };
            let inbox = snapshots.remove(&agent_id).unwrap_or_default();
            let state_clone = state.clone();
            let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
                apply_step(
                    &state_clone,
                    &inbox,
                    &services,
                    &mut self.rng_agent_apply,
                    &mut self.ids,
                )
            }));
            match result {
                Ok(outcome) => {
                    if let Some(s) = self.agents.get_mut(&agent_id) {
                        s.consecutive_failures = 0;
                    }
                    outcomes.push((agent_id, outcome));
                }
                Err(_) => {
                    if let Some(s) = self.agents.get_mut(&agent_id) {
                        s.health *= 0.5;
                        s.consecutive_failures += 1;
                    }
                    events.push(Event::Error {
                        event_id: self.ids.event(),
                        step: step_no,
                        error_key: "agent_panic".to_string(),
                        detail: agent_id.to_string(),
                    });
                }
            }
        }
        // Deterministic post-order merge by agent_id (already sorted, but
        // made explicit per spec §4.9/§5's "merged in deterministic
        // post-order" contract).
        outcomes.sort_by_key(|(id, _)| *id);

        // Apply state deltas.
        for (agent_id, outcome) in &outcomes {
            if let Some(state) = self.agents.get_mut(agent_id) {
                state.energy = outcome.energy;
                state.health = outcome.health;
                state.clamp_vitals();
                state.last_step_applied = step_no;
                if state.is_dead() && self.config.death_enabled {
                    state.terminal = true;
                }
            }
            events.extend(outcome.emitted_events.clone());
        }

        // Phase 3: routing.
        for (agent_id, outcome) in &outcomes {
            let node_id = self.node_of_agent[agent_id];
            for envelope in &outcome.outbox {
                let route_outcomes = route_envelope(
                    envelope.clone(),
                    node_id,
                    &self.topology,
                    &self.agent_of_node,
                    &mut self.mailboxes,
                    step_no,
                    &mut self.seen_envelopes,
                );
                for r in route_outcomes {
                    match r {
                        RouteOutcome::Delivered { target } => {
                            self.fitness.record_message_handled(target);
                            if envelope.kind == EnvelopeKind::MemeCarrier {
                                if let Some(meme_id) = decode_meme_id(&envelope.payload) {
                                    if let Some(target_state) = self.agents.get_mut(&target) {
                                        let evicted = self.memes.propagate(
                                            &mut target_state.active_memes,
                                            meme_id,
                                            self.config.max_memes_per_agent as usize,
                                        );
                                        *self
                                            .meme_propagation_counts
                                            .entry(meme_id)
                                            .or_insert(0) += 1;
                                        events.push(Event::MemeSpread {
                                            event_id: self.ids.event(),
                                            step: step_no,
                                            meme_id,
                                            target,
                                        });
                                        if let Some(evicted_id) = evicted {
                                            events.push(Event::MemeEvicted {
                                                event_id: self.ids.event(),
                                                step: step_no,
                                                meme_id: evicted_id,
                                                agent_id: target,
                                            });
                                        }
                                    }
                                }
                            }
                        }
                        RouteOutcome::Dropped { target: _, reason } => {
                            self.metrics.mailbox_overflow_total.incr();
                            self.metrics.dropped_messages_total.incr();
                            match self.metrics.error_sink.offer("mailbox_overflow") {
                                ufog_core::observability::SinkOutcome::Emit => {
                                    events.push(Event::Error {
                                        event_id: self.ids.event(),
                                        step: step_no,
                                        error_key: "mailbox_overflow".to_string(),
                                        detail: reason.to_string(),
                                    });
                                }
                                ufog_core::observability::SinkOutcome::Suppress { .. } => {}
                            }
                        }
                        RouteOutcome::Expired => {
                            self.metrics.dropped_messages_total.incr();
                        }
                    }
                }
            }
        }

        // Phase 4 (meme propagation) happens inline in Phase 3 above, as
        // delivery of `MemeCarrier` envelopes is itself the propagation
        // trigger (spec §4.6 Propagate(source, targets)).

        // Phase 5: entanglement update.
        if self.config.enable_entanglement {
            let snapshot: Vec<(AgentId, Vec<MemeId>, NodeId)> = self
                .agent_order
                .iter()
                .filter_map(|id| {
                    let state = self.agents.get(id)?;
                    if state.terminal {
                        return None;
                    }
                    Some((*id, state.active_memes.clone(), self.node_of_agent[id]))
                })
                .collect();
            let ent_config = EntanglementConfig {
                threshold: self.config.entanglement_threshold,
                initial_strength: self.config.initial_strength,
                reinforcement: self.config.reinforcement,
                decay_rate: self.config.decay_rate,
                min_entanglement: self.config.min_entanglement,
                candidates_k: self.config.entanglement_candidates_k,
                reinforcement_event_delta: self.config.reinforcement_event_delta,
            };
            let (ent_events, perturbations) = self.entanglements.step(
                &snapshot,
                &self.topology,
                &ent_config,
                step_no,
                &mut self.ids,
            );
            events.extend(ent_events);
            for p in perturbations {
                let (a, b) = p.pair;
                if let Some(sa) = self.agents.get_mut(&a) {
                    sa.energy = (sa.energy + p.magnitude).clamp(0.0, 1.0);
                }
                if let Some(sb) = self.agents.get_mut(&b) {
                    sb.energy = (sb.energy + p.magnitude).clamp(0.0, 1.0);
                }
            }
        }

        // Phase 6: stats aggregation.
        let alive: Vec<&AgentState> = self.agents.values().filter(|a| !a.terminal).collect();
        let active_agents = alive.len();
        let mean_energy = if active_agents == 0 {
            0.0
        } else {
            alive.iter().map(|a| a.energy).sum::<f64>() / active_agents as f64
        };
        let mean_health = if active_agents == 0 {
            0.0
        } else {
            alive.iter().map(|a| a.health).sum::<f64>() / active_agents as f64
        };
        let distinct_memes: std::collections::HashSet<MemeId> = alive
            .iter()
            .flat_map(|a| a.active_memes.iter().copied())
            .collect();
        let total_meme_slots: usize = alive.iter().map(|a| a.active_memes.len()).sum();
        let meme_diversity = if total_meme_slots == 0 {
            0.0
        } else {
            distinct_memes.len() as f64 / total_meme_slots as f64
        };
        let stats = StepStats {
            step: step_no,
            active_agents,
            mean_energy,
            mean_health,
            meme_diversity,
            entanglement_count: self.entanglements.len(),
            dropped_messages: self.metrics.dropped_messages_total.get(),
        };
        self.metrics.agents_alive.set(active_agents as f64);

        // Phase 7: emit — AGENT_UPDATE only for agents whose transmitted
        // state differs (delta encoding), in ascending agent_id order.
        for agent_id in &self.agent_order {
            let Some(state) = self.agents.get(agent_id) else {
                continue;
            };
            let prev = self.last_transmitted.get(agent_id).copied();
            let changed = match prev {
                Some((e, h)) => (e - state.energy).abs() > 1e-9 || (h - state.health).abs() > 1e-9,
                None => true,
            };
            if changed {
                events.push(Event::AgentUpdate {
                    event_id: self.ids.event(),
                    step: step_no,
                    agent_id: *agent_id,
                    energy: state.energy,
                    health: state.health,
                });
                self.last_transmitted
                    .insert(*agent_id, (state.energy, state.health));
            }
        }
        events.push(Event::StepComplete {
            event_id: self.ids.event(),
            step: step_no,
        });

        self.current_step = step_no;
        self.metrics
            .step_duration_seconds
            .observe(started.elapsed().as_secs_f64());

        // Generation boundary: runs after step 7's flush, events appended
        // to the *next* step's flush (spec §4.9's closing note).
        if step_no % self.config.steps_per_generation as u64 == 0 {
            let gen_events = self.run_generation_boundary(step_no);
            self.pending_events.extend(gen_events);
        }

        if step_no >= self.total_steps {
            self.status = RunStatus::Completed;
        }

        self.last_stats = Some(stats);
        events
    }

    pub fn last_stats_clone(&self) -> Option<StepStats> {
        self.last_stats.clone()
    }

    /// Evolution Driver (C8): elite carry-forward, roulette reproduction
    /// over non-elite slots, dead-node detachment and tree compaction.
    fn run_generation_boundary(&mut self, step_no: Step) -> Vec<Event> {
        let mut events = Vec::new();

        // Fitness update (spec §4.6): each carried meme's fitness is a
        // weighted sum of its carrier's current energy/health and how many
        // times it was propagated to a new agent during this generation.
        let propagation_counts = self.meme_propagation_counts.clone();
        for state in self.agents.values() {
            if state.terminal {
                continue;
            }
            for meme_id in &state.active_memes {
                let count = propagation_counts.get(meme_id).copied().unwrap_or(0);
                self.memes
                    .update_fitness(*meme_id, state.energy, state.health, count);
            }
        }
        self.meme_propagation_counts.clear();

        let alive_ids: Vec<AgentId> = self
            .agent_order
            .iter()
            .copied()
            .filter(|id| !self.agents[id].terminal)
            .collect();
        let fitnesses: Vec<(AgentId, f64)> = alive_ids
            .iter()
            .map(|id| (*id, self.fitness.fitness_of(&self.agents[id], &self.memes)))
            .collect();
        let ranked = evolution::rank(&fitnesses);
        let elite_count =
            ((ranked.len() as f64) * self.config.elite_fraction).ceil() as usize;
        let elite_count = elite_count.min(ranked.len());

        for (agent_id, _) in ranked.iter().skip(elite_count) {
            let node_id = self.node_of_agent[agent_id];
            let role = self.agents[agent_id].role;
            let parent_a = evolution::roulette_select(&ranked, &mut self.rng_evolution_roulette);
            let parent_b = evolution::roulette_select(&ranked, &mut self.rng_evolution_roulette);
            let parent_a_memes = self.agents[&parent_a].active_memes.clone();
            let parent_b_memes = self.agents[&parent_b].active_memes.clone();
            let produced = evolution::reproduce_memes(
                &parent_a_memes,
                &parent_b_memes,
                &mut self.memes,
                self.config.crossover_rate,
                self.config.mutation_rate,
                &mut self.rng_meme_crossover,
                &mut self.ids,
            );
            let mut child_memes = Vec::with_capacity(produced.len());
            for (crossed, final_id) in produced {
                events.push(Event::MemeMutate {
                    event_id: self.ids.event(),
                    step: step_no,
                    parent: crossed,
                    child: final_id,
                });
                child_memes.push(final_id);
            }

            self.fitness.remove(*agent_id);
            self.agents.remove(agent_id);
            self.node_of_agent.remove(agent_id);

            let new_agent_id = self.ids.agent();
            let mut new_state = AgentState::new(new_agent_id, node_id, role);
            new_state.active_memes = child_memes;
            self.topology.assign_agent(node_id, new_agent_id);
            self.agent_of_node.insert(node_id, new_agent_id);
            self.node_of_agent.insert(new_agent_id, node_id);
            self.mailboxes.ensure(new_agent_id);
            self.fitness.register(new_agent_id);
            self.agents.insert(new_agent_id, new_state);

            let pos = self.agent_order.iter().position(|id| id == agent_id).unwrap();
            self.agent_order[pos] = new_agent_id;
        }

        // Dead agents' nodes are detached and the tree compacted.
        let dead_ids: Vec<AgentId> = self
            .agent_order
            .iter()
            .copied()
            .filter(|id| self.agents.get(id).map(|a| a.terminal).unwrap_or(false))
            .collect();
        for dead_id in dead_ids {
            let node_id = self.node_of_agent[&dead_id];
            let _ = self.topology.remove_node(node_id);
            self.agents.remove(&dead_id);
            self.node_of_agent.remove(&dead_id);
            self.agent_of_node.remove(&node_id);
            self.mailboxes.remove_agent(dead_id);
            self.entanglements.remove_agent(dead_id);
            self.fitness.remove(dead_id);
            self.agent_order.retain(|id| *id != dead_id);
        }

        // Quarantine counters reset at every generation boundary.
        for state in self.agents.values_mut() {
            state.consecutive_failures = 0;
        }

        self.agent_order.sort();

        events.push(Event::GenerationComplete {
            event_id: self.ids.event(),
            generation: (step_no / self.config.steps_per_generation as u64) as u32,
            step: step_no,
        });
        events
    }
}

fn decode_meme_id(payload: &[u8]) -> Option<MemeId> {
    if payload.len() != 16 {
        return None;
    }
    let bytes: [u8; 16] = payload.try_into().ok()?;
    Some(MemeId(uuid::Uuid::from_bytes(bytes)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cfg(num_agents: u32, generations: u32, steps: u32, seed: u64) -> SimConfig {
        SimConfig {
            num_agents,
            num_generations: generations,
            steps_per_generation: steps,
            seed,
            enable_entanglement: false,
            ..Default::default()
        }
    }

    #[test]
    fn smoke_five_agents_two_generations() {
        let mut run = Run::new(cfg(5, 2, 10, 1)).unwrap();
        let mut gen_completes = 0;
        for s in 1..=20u64 {
            let events = run.step();
            assert!(events.iter().any(|e| matches!(e, Event::StepComplete { step, .. } if *step == s)));
            if events
                .iter()
                .any(|e| matches!(e, Event::GenerationComplete { .. }))
            {
                gen_completes += 1;
            }
        }
        assert_eq!(gen_completes, 2);
        assert_eq!(run.status, RunStatus::Completed);
        assert_eq!(run.current_step, 20);
    }

    #[test]
    fn meme_fitness_is_updated_at_generation_boundary() {
        let mut run = Run::new(cfg(5, 1, 3, 1)).unwrap();
        for _ in 0..3 {
            run.step();
        }
        let any_rated = run
            .agents()
            .values()
            .flat_map(|a| a.active_memes.iter())
            .filter_map(|id| run.memes.get(id))
            .any(|m| m.fitness != 0.0);
        assert!(any_rated, "expected at least one meme to have a non-zero fitness after a generation boundary");
    }

    #[test]
    fn determinism_same_seed_same_stream() {
        let mut run_a = Run::new(cfg(5, 2, 10, 1)).unwrap();
        let mut run_b = Run::new(cfg(5, 2, 10, 1)).unwrap();
        let mut any_events = false;
        for _ in 0..20 {
            let ea = run_a.step();
            let eb = run_b.step();
            assert_eq!(ea.len(), eb.len());
            any_events |= !ea.is_empty();
            // Full content comparison (IDs included, via serialized JSON
            // since `Event` has no `PartialEq`): two runs built from the
            // same `(config, seed)` must emit byte-for-byte identical
            // events at every step, not just the same event count.
            let va = serde_json::to_value(&ea).unwrap();
            let vb = serde_json::to_value(&eb).unwrap();
            assert_eq!(va, vb);
        }
        assert!(any_events, "expected at least one event across 20 steps");
        assert_eq!(run_a.current_step, run_b.current_step);
    }

    #[test]
    fn single_agent_completes_without_messaging() {
        let mut run = Run::new(cfg(1, 1, 5, 2)).unwrap();
        for _ in 0..5 {
            run.step();
        }
        assert_eq!(run.status, RunStatus::Completed);
    }

    #[test]
    fn zero_agents_rejected_at_create() {
        let result = Run::new(cfg(0, 1, 5, 1));
        assert!(result.is_err());
    }

    #[test]
    fn cancellation_stops_before_total_steps() {
        let mut run = Run::new(cfg(5, 20, 50, 3)).unwrap();
        for _ in 0..42 {
            run.step();
        }
        run.request_stop();
        let events = run.step();
        assert_eq!(run.status, RunStatus::Stopped);
        assert!(events.iter().any(|e| matches!(e, Event::StepComplete { .. })));
        assert!(run.current_step <= 43);
    }
}
