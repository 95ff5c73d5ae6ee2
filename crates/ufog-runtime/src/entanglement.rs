//! Entanglement Engine (C7): pairwise coupling formation, reinforcement,
//! decay and correlated perturbation.
//!
//! Candidate similarity scoring follows the teacher's `signal.rs`
//! weighted-gradient scoring idiom (`compute_gradient`), adapted from a
//! spatial signal field to a meme-overlap + topological-distance score.
//! Commit ordering and decay-then-prune sequencing mirror `colony.rs`
//! Phase 4's `decay_edges_activity` + `prune_to_max_degree` discipline.

use std::collections::HashMap;
use rayon::prelude::*;
use ufog_core::prelude::*;

use crate::topology::TreeTopology;

#[derive(Default)]
pub struct EntanglementTable {
    pairs: HashMap<(AgentId, AgentId), Entanglement>,
}

pub struct EntanglementConfig {
    pub threshold: f64,
    pub initial_strength: f64,
    pub reinforcement: f64,
    pub decay_rate: f64,
    pub min_entanglement: f64,
    pub candidates_k: usize,
    /// Minimum strength delta a reinforcement must cross before it emits
    /// its own `ENTANGLEMENT` event (spec §4.7: "reinforcement... above a
    /// configured delta").
    pub reinforcement_event_delta: f64,
}

/// A symmetric energy/health nudge applied to both members of a live
/// pair, proportional to its strength.
pub struct Perturbation {
    pub pair: (AgentId, AgentId),
    pub magnitude: f64,
}

impl EntanglementTable {
    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    pub fn get(&self, a: AgentId, b: AgentId) -> Option<&Entanglement> {
        self.pairs.get(&Entanglement::canonical_pair(a, b))
    }

    pub fn all(&self) -> impl Iterator<Item = &Entanglement> {
        self.pairs.values()
    }

    pub fn remove_agent(&mut self, agent: AgentId) {
        self.pairs.retain(|(a, b), _| *a != agent && *b != agent);
    }

    /// Similarity score combining meme-set overlap (Jaccard) with inverse
    /// topological distance; in `[0, 1]`.
    fn similarity(
        a_memes: &[MemeId],
        b_memes: &[MemeId],
        a_node: NodeId,
        b_node: NodeId,
        topology: &TreeTopology,
    ) -> f64 {
        let overlap = if a_memes.is_empty() && b_memes.is_empty() {
            0.0
        } else {
            let a_set: std::collections::HashSet<_> = a_memes.iter().collect();
            let b_set: std::collections::HashSet<_> = b_memes.iter().collect();
            let inter = a_set.intersection(&b_set).count();
            let union = a_set.union(&b_set).count().max(1);
            inter as f64 / union as f64
        };

        let dist = tree_distance(a_node, b_node, topology) as f64;
        let proximity = 1.0 / (1.0 + dist);

        0.6 * overlap + 0.4 * proximity
    }

    /// Run one step of the engine: select candidates, commit new/
    /// reinforced pairs in deterministic order, decay the rest, evict
    /// below-threshold pairs, and compute correlated perturbations.
    /// Returns the emitted `Entanglement` events plus the perturbations
    /// to apply to agent vitals.
    pub fn step(
        &mut self,
        agents: &[(AgentId, Vec<MemeId>, NodeId)],
        topology: &TreeTopology,
        config: &EntanglementConfig,
        current_step: Step,
        ids: &mut IdMinter,
    ) -> (Vec<Event>, Vec<Perturbation>) {
        let mut events = Vec::new();

        // 1. Candidate selection: for each agent, up to k best-scoring
        // partners above threshold. Read-only over the step's agent
        // snapshot (no shared mutable state, no RNG draws), so this scan
        // runs on rayon's pool the same way a systems-style Rust codebase
        // would reach for data-parallelism across an independent-iteration
        // phase (spec §5; see DESIGN.md for why this phase gets it and
        // Phase 2 agent apply does not).
        let per_agent: Vec<Vec<(AgentId, AgentId)>> = agents
            .par_iter()
            .enumerate()
            .map(|(i, (a_id, a_memes, a_node))| {
                let mut scored: Vec<(AgentId, f64)> = agents
                    .iter()
                    .enumerate()
                    .filter(|(j, _)| *j != i)
                    .map(|(_, (b_id, b_memes, b_node))| {
                        (*b_id, Self::similarity(a_memes, b_memes, *a_node, *b_node, topology))
                    })
                    .filter(|(_, score)| *score >= config.threshold)
                    .collect();
                scored.sort_by(|x, y| y.1.partial_cmp(&x.1).unwrap_or(std::cmp::Ordering::Equal));
                scored.truncate(config.candidates_k);
                scored
                    .into_iter()
                    .map(|(b_id, _)| Entanglement::canonical_pair(*a_id, b_id))
                    .collect()
            })
            .collect();
        let mut candidates: Vec<(AgentId, AgentId)> = per_agent.into_iter().flatten().collect();

        // 2. Pair commit: deterministic order, duplicates coalesced.
        candidates.sort();
        candidates.dedup();

        let mut touched: std::collections::HashSet<(AgentId, AgentId)> =
            std::collections::HashSet::new();

        for pair in candidates {
            touched.insert(pair);
            match self.pairs.get_mut(&pair) {
                Some(existing) => {
                    let before = existing.strength;
                    existing.strength = (existing.strength + config.reinforcement).min(1.0);
                    existing.last_reinforced_step = current_step;
                    if existing.strength - before > config.reinforcement_event_delta {
                        events.push(Event::Entanglement {
                            event_id: ids.event(),
                            step: current_step,
                            pair,
                            kind: EntanglementEventKind::Reinforce,
                            strength: existing.strength,
                        });
                    }
                }
                None => {
                    let entanglement = Entanglement {
                        pair,
                        strength: config.initial_strength,
                        created_step: current_step,
                        last_reinforced_step: current_step,
                    };
                    self.pairs.insert(pair, entanglement);
                    events.push(Event::Entanglement {
                        event_id: ids.event(),
                        step: current_step,
                        pair,
                        kind: EntanglementEventKind::Create,
                        strength: config.initial_strength,
                    });
                }
            }
        }

        // 3. Decay all pairs not reinforced this step; evict below floor.
        let mut destroyed = Vec::new();
        for (pair, ent) in self.pairs.iter_mut() {
            if !touched.contains(pair) {
                ent.strength *= 1.0 - config.decay_rate;
                if ent.strength < config.min_entanglement {
                    destroyed.push(*pair);
                }
            }
        }
        for pair in &destroyed {
            self.pairs.remove(pair);
            events.push(Event::Entanglement {
                event_id: ids.event(),
                step: current_step,
                pair: *pair,
                kind: EntanglementEventKind::Destroy,
                strength: 0.0,
            });
        }

        // 4. Correlated perturbation for every surviving live pair.
        let perturbations = self
            .pairs
            .values()
            .map(|ent| Perturbation {
                pair: ent.pair,
                magnitude: ent.strength * 0.01,
            })
            .collect();

        (events, perturbations)
    }
}

fn tree_distance(a: NodeId, b: NodeId, topology: &TreeTopology) -> u32 {
    if a == b {
        return 0;
    }
    let path_a = topology.path_to_root(a);
    let path_b = topology.path_to_root(b);
    let set_b: std::collections::HashSet<_> = path_b.iter().collect();
    let mut lca_depth_from_a = None;
    for (i, n) in path_a.iter().enumerate() {
        if set_b.contains(n) {
            lca_depth_from_a = Some(i);
            break;
        }
    }
    let Some(i) = lca_depth_from_a else {
        return (path_a.len() + path_b.len()) as u32;
    };
    let lca = path_a[i];
    let j = path_b.iter().position(|n| *n == lca).unwrap_or(path_b.len());
    (i + j) as u32
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cfg() -> EntanglementConfig {
        EntanglementConfig {
            threshold: 0.3,
            initial_strength: 0.5,
            reinforcement: 0.1,
            decay_rate: 0.5,
            min_entanglement: 0.05,
            candidates_k: 4,
            reinforcement_event_delta: 0.01,
        }
    }

    #[test]
    fn identical_meme_sets_at_same_node_form_pair() {
        let (topo, order) = TreeTopology::build(2, 1, 1, &mut IdMinter::for_seed(1));
        let meme = MemeId::new();
        let a = AgentId::new();
        let b = AgentId::new();
        let agents = vec![
            (a, vec![meme], order[0]),
            (b, vec![meme], order[0]),
        ];
        let mut table = EntanglementTable::default();
        let mut ids = IdMinter::for_seed(1);
        let (events, _perturbations) = table.step(&agents, &topo, &cfg(), 1, &mut ids);
        assert_eq!(table.len(), 1);
        assert!(events
            .iter()
            .any(|e| matches!(e, Event::Entanglement { kind: EntanglementEventKind::Create, .. })));
    }

    #[test]
    fn unreinforced_pairs_decay_and_are_removed() {
        let (topo, order) = TreeTopology::build(2, 1, 1, &mut IdMinter::for_seed(1));
        let meme = MemeId::new();
        let a = AgentId::new();
        let b = AgentId::new();
        let agents = vec![(a, vec![meme], order[0]), (b, vec![meme], order[0])];
        let mut table = EntanglementTable::default();
        let mut ids = IdMinter::for_seed(1);
        table.step(&agents, &topo, &cfg(), 1, &mut ids);
        assert_eq!(table.len(), 1);

        // No shared memes next step -> no candidate, pair decays.
        let agents_no_overlap = vec![(a, vec![], order[0]), (b, vec![MemeId::new()], order[0])];
        for step in 2..6 {
            table.step(&agents_no_overlap, &topo, &cfg(), step, &mut ids);
        }
        assert_eq!(table.len(), 0);
    }

    #[test]
    fn strength_never_exceeds_one_or_drops_below_floor_while_live() {
        let (topo, order) = TreeTopology::build(2, 1, 1, &mut IdMinter::for_seed(1));
        let meme = MemeId::new();
        let a = AgentId::new();
        let b = AgentId::new();
        let agents = vec![(a, vec![meme], order[0]), (b, vec![meme], order[0])];
        let mut table = EntanglementTable::default();
        let mut ids = IdMinter::for_seed(1);
        for step in 1..20 {
            table.step(&agents, &topo, &cfg(), step, &mut ids);
        }
        for e in table.all() {
            assert!(e.strength <= 1.0);
            assert!(e.strength >= cfg().min_entanglement);
        }
    }
}
