//! Meme Engine (C6): meme genomes, mutation/crossover, per-agent meme
//! pools and propagation/eviction, built directly from the teacher's
//! `phago_agents::genome::AgentGenome` inline splitmix64 mutation idiom,
//! generalized from fixed `f64` fields to an opaque byte-vector genome.

use std::collections::HashMap;
use ufog_core::prelude::*;

/// The single source of truth for meme genomes (spec §3: "Memes are
/// shared by ID, never by structural reference").
#[derive(Default)]
pub struct MemeRegistry {
    memes: HashMap<MemeId, Meme>,
}

impl MemeRegistry {
    pub fn insert(&mut self, meme: Meme) -> MemeId {
        let id = meme.meme_id;
        self.memes.insert(id, meme);
        id
    }

    pub fn get(&self, id: &MemeId) -> Option<&Meme> {
        self.memes.get(id)
    }

    pub fn spawn_initial(
        &mut self,
        kind: MemeKind,
        genome_len: usize,
        rng: &mut DeterministicRng,
        ids: &mut IdMinter,
    ) -> MemeId {
        let genome = (0..genome_len).map(|_| rng.next_byte()).collect();
        self.insert(Meme {
            meme_id: ids.meme(),
            kind,
            genome,
            fitness: 0.0,
            generation: 0,
            parent_meme_ids: Vec::new(),
        })
    }

    /// Flip each byte of `m`'s genome independently with probability
    /// `mutation_rate`, drawn from `rng`. The new meme has
    /// `generation = m.generation + 1` and a single parent.
    pub fn mutate(
        &mut self,
        m: MemeId,
        mutation_rate: f64,
        rng: &mut DeterministicRng,
        ids: &mut IdMinter,
    ) -> Option<MemeId> {
        let parent = self.memes.get(&m)?.clone();
        let mut genome = parent.genome.clone();
        for byte in genome.iter_mut() {
            if rng.chance(mutation_rate) {
                *byte ^= rng.next_byte();
            }
        }
        let child = Meme {
            meme_id: ids.meme(),
            kind: parent.kind,
            genome,
            fitness: 0.0,
            generation: parent.generation + 1,
            parent_meme_ids: vec![parent.meme_id],
        };
        Some(self.insert(child))
    }

    /// Uniform crossover with probability `crossover_rate`; otherwise a
    /// single-point crossover at a uniformly chosen index. New meme's
    /// generation is `max(m1.gen, m2.gen) + 1` with both parents recorded.
    pub fn crossover(
        &mut self,
        m1: MemeId,
        m2: MemeId,
        crossover_rate: f64,
        rng: &mut DeterministicRng,
        ids: &mut IdMinter,
    ) -> Option<MemeId> {
        let a = self.memes.get(&m1)?.clone();
        let b = self.memes.get(&m2)?.clone();
        let len = a.genome.len().min(b.genome.len());
        let mut genome = Vec::with_capacity(len);

        if rng.chance(crossover_rate) {
            for i in 0..len {
                genome.push(if rng.chance(0.5) { a.genome[i] } else { b.genome[i] });
            }
        } else {
            let point = rng.index(len.max(1));
            for i in 0..len {
                genome.push(if i < point { a.genome[i] } else { b.genome[i] });
            }
        }

        let child = Meme {
            meme_id: ids.meme(),
            kind: a.kind,
            genome,
            fitness: 0.0,
            generation: a.generation.max(b.generation) + 1,
            parent_meme_ids: vec![a.meme_id, b.meme_id],
        };
        Some(self.insert(child))
    }

    /// Add `meme_id` to `active_memes` subject to `max_memes_per_agent`;
    /// on overflow evict the lowest-fitness meme, ties broken by oldest
    /// `generation` then lowest `meme_id` bytes — a fully deterministic
    /// multi-key sort, the same discipline as the teacher's
    /// `to_die.sort(); to_die.dedup();` ordering in `colony.rs`.
    pub fn propagate(&self, active_memes: &mut Vec<MemeId>, meme_id: MemeId, max_memes_per_agent: usize) -> Option<MemeId> {
        if active_memes.contains(&meme_id) {
            return None;
        }
        active_memes.push(meme_id);
        if active_memes.len() <= max_memes_per_agent {
            return None;
        }
        let evicted = active_memes
            .iter()
            .copied()
            .min_by(|x, y| self.eviction_key(*x).cmp(&self.eviction_key(*y)))?;
        active_memes.retain(|id| *id != evicted);
        Some(evicted)
    }

    fn eviction_key(&self, id: MemeId) -> (u64, u32, [u8; 16]) {
        let Some(m) = self.memes.get(&id) else {
            return (u64::MAX, u32::MAX, *id.0.as_bytes());
        };
        (m.fitness.to_bits(), m.generation, *id.0.as_bytes())
    }

    /// Weighted-sum fitness update at a generation boundary: carrier
    /// energy/health plus downstream propagation count observed in the
    /// previous generation.
    pub fn update_fitness(&mut self, id: MemeId, carrier_energy: f64, carrier_health: f64, propagation_count: u32) {
        if let Some(m) = self.memes.get_mut(&id) {
            m.fitness = 0.4 * carrier_energy + 0.4 * carrier_health + 0.2 * propagation_count as f64;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mutate_produces_new_generation() {
        let mut reg = MemeRegistry::default();
        let mut rng = DeterministicRng::for_component(1, "meme.mutate");
        let mut ids = IdMinter::for_seed(1);
        let parent = reg.spawn_initial(MemeKind::Behavioral, 8, &mut rng, &mut ids);
        let child = reg.mutate(parent, 0.5, &mut rng, &mut ids).unwrap();
        let child_meme = reg.get(&child).unwrap();
        assert_eq!(child_meme.generation, 1);
        assert_eq!(child_meme.parent_meme_ids, vec![parent]);
    }

    #[test]
    fn zero_mutation_rate_leaves_genome_unchanged() {
        let mut reg = MemeRegistry::default();
        let mut rng = DeterministicRng::for_component(1, "meme.mutate");
        let mut ids = IdMinter::for_seed(1);
        let parent = reg.spawn_initial(MemeKind::Behavioral, 8, &mut rng, &mut ids);
        let parent_genome = reg.get(&parent).unwrap().genome.clone();
        let child = reg.mutate(parent, 0.0, &mut rng, &mut ids).unwrap();
        assert_eq!(reg.get(&child).unwrap().genome, parent_genome);
    }

    #[test]
    fn crossover_sets_both_parents_and_max_generation() {
        let mut reg = MemeRegistry::default();
        let mut rng = DeterministicRng::for_component(1, "meme.crossover");
        let mut ids = IdMinter::for_seed(1);
        let a = reg.spawn_initial(MemeKind::Social, 8, &mut rng, &mut ids);
        let b = reg.spawn_initial(MemeKind::Social, 8, &mut rng, &mut ids);
        reg.mutate(b, 0.0, &mut rng, &mut ids); // bump nothing; just exercise path
        let child = reg.crossover(a, b, 0.5, &mut rng, &mut ids).unwrap();
        let child_meme = reg.get(&child).unwrap();
        assert_eq!(child_meme.parent_meme_ids.len(), 2);
        assert_eq!(child_meme.generation, 1);
    }

    #[test]
    fn propagate_evicts_lowest_fitness_on_overflow() {
        let mut reg = MemeRegistry::default();
        let mut rng = DeterministicRng::for_component(1, "meme.mutate");
        let mut ids = IdMinter::for_seed(1);
        let low = reg.spawn_initial(MemeKind::Behavioral, 4, &mut rng, &mut ids);
        let high = reg.spawn_initial(MemeKind::Behavioral, 4, &mut rng, &mut ids);
        reg.update_fitness(low, 0.1, 0.1, 0);
        reg.update_fitness(high, 0.9, 0.9, 5);

        let mut active = vec![low];
        assert!(reg.propagate(&mut active, high, 1).is_some());
        // capacity 1: one of the two must have been evicted, and it must
        // be the lower-fitness one (`low`).
        assert_eq!(active, vec![high]);
    }

    #[test]
    fn propagate_is_idempotent_for_existing_meme() {
        let mut reg = MemeRegistry::default();
        let mut rng = DeterministicRng::for_component(1, "meme.mutate");
        let mut ids = IdMinter::for_seed(1);
        let m = reg.spawn_initial(MemeKind::Behavioral, 4, &mut rng, &mut ids);
        let mut active = vec![m];
        assert!(reg.propagate(&mut active, m, 4).is_none());
        assert_eq!(active, vec![m]);
    }
}
