//! Evolution Driver (C8): generational fitness scoring, selection,
//! reproduction, and tree compaction after death.
//!
//! Fitness bookkeeping is built from the teacher's
//! `phago_agents::fitness::FitnessTracker` (per-agent `HashMap`,
//! `recompute_fitness`, `fittest`, `mean_fitness`, generation counter),
//! re-weighted per spec §4.8 onto energy/health/messages/meme-fitness
//! instead of the teacher's concepts/edges-per-tick formula.

use std::collections::HashMap;
use ufog_core::prelude::*;

use crate::meme::MemeRegistry;

#[derive(Debug, Clone, Default)]
pub struct AgentFitnessData {
    pub messages_handled: u64,
}

#[derive(Default)]
pub struct FitnessTracker {
    data: HashMap<AgentId, AgentFitnessData>,
}

impl FitnessTracker {
    pub fn register(&mut self, agent_id: AgentId) {
        self.data.entry(agent_id).or_default();
    }

    pub fn record_message_handled(&mut self, agent_id: AgentId) {
        self.data.entry(agent_id).or_default().messages_handled += 1;
    }

    pub fn remove(&mut self, agent_id: AgentId) {
        self.data.remove(&agent_id);
    }

    /// Weighted mean of final energy, final health, messages
    /// successfully handled (log-scaled to bound its influence), and
    /// carried-meme fitness (spec §4.8 step 1).
    pub fn fitness_of(&self, state: &AgentState, memes: &MemeRegistry) -> f64 {
        let messages = self
            .data
            .get(&state.agent_id)
            .map(|d| d.messages_handled)
            .unwrap_or(0);
        let message_term = (1.0 + messages as f64).ln() / 10.0;
        let meme_term = if state.active_memes.is_empty() {
            0.0
        } else {
            state
                .active_memes
                .iter()
                .filter_map(|id| memes.get(id))
                .map(|m| m.fitness)
                .sum::<f64>()
                / state.active_memes.len() as f64
        };
        0.3 * state.energy + 0.3 * state.health + 0.2 * message_term.min(1.0) + 0.2 * meme_term
    }
}

/// Rank agents descending by fitness; ties broken by `AgentId` for
/// determinism.
pub fn rank(agents: &[(AgentId, f64)]) -> Vec<(AgentId, f64)> {
    let mut ranked = agents.to_vec();
    ranked.sort_by(|a, b| {
        b.1.partial_cmp(&a.1)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.0.cmp(&b.0))
    });
    ranked
}

/// Fitness-proportional (roulette) selection of one agent from `ranked`.
/// Falls back to uniform selection if every fitness is zero.
pub fn roulette_select(ranked: &[(AgentId, f64)], rng: &mut DeterministicRng) -> AgentId {
    let total: f64 = ranked.iter().map(|(_, f)| f.max(0.0)).sum();
    if total <= 0.0 {
        return ranked[rng.index(ranked.len())].0;
    }
    let pick = rng.next_f64() * total;
    let mut acc = 0.0;
    for (id, f) in ranked {
        acc += f.max(0.0);
        if acc >= pick {
            return *id;
        }
    }
    ranked.last().unwrap().0
}

/// Build a child's meme pool: crossover each parent's active memes
/// pairwise (shorter list wins the extras by simple truncation), then
/// mutate each resulting meme with probability `mutation_rate`. Returns,
/// for each produced meme, the crossed-over meme it was mutated from
/// (spec §4.6: every crossover and mutation emits its own Event).
pub fn reproduce_memes(
    parent_a: &[MemeId],
    parent_b: &[MemeId],
    registry: &mut MemeRegistry,
    crossover_rate: f64,
    mutation_rate: f64,
    rng: &mut DeterministicRng,
    ids: &mut IdMinter,
) -> Vec<(MemeId, MemeId)> {
    let n = parent_a.len().min(parent_b.len());
    let mut children = Vec::with_capacity(n);
    for i in 0..n {
        if let Some(crossed) = registry.crossover(parent_a[i], parent_b[i], crossover_rate, rng, ids) {
            let final_id = registry.mutate(crossed, mutation_rate, rng, ids).unwrap_or(crossed);
            children.push((crossed, final_id));
        }
    }
    children
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::meme::MemeRegistry;

    #[test]
    fn rank_orders_descending_with_deterministic_ties() {
        let a = AgentId::new();
        let b = AgentId::new();
        let ranked = rank(&[(a, 0.5), (b, 0.9)]);
        assert_eq!(ranked[0].0, b);
    }

    #[test]
    fn roulette_select_prefers_higher_fitness_statistically() {
        let a = AgentId::new();
        let b = AgentId::new();
        let ranked = vec![(a, 0.01), (b, 0.99)];
        let mut rng = DeterministicRng::for_component(1, "evolution.roulette");
        let mut b_wins = 0;
        for _ in 0..200 {
            if roulette_select(&ranked, &mut rng) == b {
                b_wins += 1;
            }
        }
        assert!(b_wins > 150);
    }

    #[test]
    fn reproduce_memes_produces_bounded_children() {
        let mut registry = MemeRegistry::default();
        let mut rng = DeterministicRng::for_component(1, "meme.mutate");
        let mut ids = IdMinter::for_seed(1);
        let a = vec![registry.spawn_initial(MemeKind::Behavioral, 4, &mut rng, &mut ids)];
        let b = vec![registry.spawn_initial(MemeKind::Behavioral, 4, &mut rng, &mut ids)];
        let children = reproduce_memes(&a, &b, &mut registry, 0.5, 0.1, &mut rng, &mut ids);
        assert_eq!(children.len(), 1);
        let (crossed, final_id) = children[0];
        assert!(registry.get(&crossed).is_some());
        assert!(registry.get(&final_id).is_some());
    }
}
