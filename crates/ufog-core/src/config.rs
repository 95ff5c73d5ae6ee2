//! Per-run configuration.
//!
//! Immutable once a run starts (Design Notes §9: "module-level mutable
//! configuration" is re-architected into one `Config` captured at
//! `start`; a hot-reload is a new run). `#[serde(deny_unknown_fields)]`
//! gives the "unknown keys are rejected with a structured error"
//! contract for free on deserialization; numeric range checks happen in
//! `SimConfig::validate`.

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct SimConfig {
    pub num_agents: u32,
    pub network_depth: u32,
    pub branching_factor: u32,
    pub num_generations: u32,
    pub steps_per_generation: u32,
    pub simulation_steps: Option<u64>,
    pub mutation_rate: f64,
    pub crossover_rate: f64,
    pub initial_memes_per_agent: u32,
    pub max_memes_per_agent: u32,
    pub enable_entanglement: bool,
    pub entanglement_threshold: f64,
    pub initial_strength: f64,
    pub reinforcement: f64,
    pub decay_rate: f64,
    pub min_entanglement: f64,
    /// Minimum strength delta a reinforcement must cross before it emits
    /// its own `ENTANGLEMENT` event (spec §4.7).
    pub reinforcement_event_delta: f64,
    pub step_delay_seconds: f64,
    pub seed: u64,
    pub wall_clock_budget_seconds: Option<f64>,
    pub mailbox_capacity: usize,
    pub death_enabled: bool,
    pub elite_fraction: f64,
    pub energy_drain: f64,
    pub energy_gain: f64,
    pub health_recovery_rate: f64,
    pub entanglement_candidates_k: usize,
    /// Max `ERROR` events per `error_key` per sliding minute before
    /// suppression (spec §4.2's rate-limited error sink).
    pub error_rate_limit_per_minute: u32,
    /// Per-step, per-agent chance of emitting a `MemeCarrier` envelope to
    /// a neighbor when the agent carries at least one active meme (spec
    /// §4.6 Propagate(source, targets)).
    pub meme_spread_chance: f64,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            num_agents: 10,
            network_depth: 3,
            branching_factor: 3,
            num_generations: 5,
            steps_per_generation: 10,
            simulation_steps: None,
            mutation_rate: 0.01,
            crossover_rate: 0.5,
            initial_memes_per_agent: 2,
            max_memes_per_agent: 8,
            enable_entanglement: true,
            entanglement_threshold: 0.6,
            initial_strength: 0.5,
            reinforcement: 0.1,
            decay_rate: 0.05,
            min_entanglement: 0.05,
            reinforcement_event_delta: 0.01,
            step_delay_seconds: 0.0,
            seed: 1,
            wall_clock_budget_seconds: None,
            mailbox_capacity: 16,
            death_enabled: true,
            elite_fraction: 0.2,
            energy_drain: 0.02,
            energy_gain: 0.01,
            health_recovery_rate: 0.02,
            entanglement_candidates_k: 4,
            error_rate_limit_per_minute: 60,
            meme_spread_chance: 0.2,
        }
    }
}

impl SimConfig {
    /// Derive `simulation_steps` from `num_generations * steps_per_generation`
    /// when not explicitly set, and reject out-of-range values.
    pub fn validate(&self) -> Result<SimConfig, ConfigError> {
        if self.num_agents == 0 {
            return Err(ConfigError::ZeroAgents);
        }
        if !(0.0..=1.0).contains(&self.mutation_rate) {
            return Err(ConfigError::OutOfRange {
                key: "mutation_rate".into(),
                detail: "must be within [0, 1]".into(),
            });
        }
        if !(0.0..=1.0).contains(&self.crossover_rate) {
            return Err(ConfigError::OutOfRange {
                key: "crossover_rate".into(),
                detail: "must be within [0, 1]".into(),
            });
        }
        if !(0.0..=1.0).contains(&self.entanglement_threshold) {
            return Err(ConfigError::OutOfRange {
                key: "entanglement_threshold".into(),
                detail: "must be within [0, 1]".into(),
            });
        }
        if !(0.0..=1.0).contains(&self.elite_fraction) {
            return Err(ConfigError::OutOfRange {
                key: "elite_fraction".into(),
                detail: "must be within [0, 1]".into(),
            });
        }
        if self.branching_factor == 0 {
            return Err(ConfigError::OutOfRange {
                key: "branching_factor".into(),
                detail: "must be at least 1".into(),
            });
        }
        if !(0.0..=1.0).contains(&self.meme_spread_chance) {
            return Err(ConfigError::OutOfRange {
                key: "meme_spread_chance".into(),
                detail: "must be within [0, 1]".into(),
            });
        }
        if !(0.0..=1.0).contains(&self.reinforcement_event_delta) {
            return Err(ConfigError::OutOfRange {
                key: "reinforcement_event_delta".into(),
                detail: "must be within [0, 1]".into(),
            });
        }
        let mut cfg = self.clone();
        if cfg.simulation_steps.is_none() {
            cfg.simulation_steps =
                Some(cfg.num_generations as u64 * cfg.steps_per_generation as u64);
        }
        Ok(cfg)
    }

    pub fn total_steps(&self) -> u64 {
        self.simulation_steps
            .unwrap_or(self.num_generations as u64 * self.steps_per_generation as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_agents_rejected() {
        let cfg = SimConfig {
            num_agents: 0,
            ..Default::default()
        };
        assert_eq!(cfg.validate(), Err(ConfigError::ZeroAgents));
    }

    #[test]
    fn derives_simulation_steps() {
        let cfg = SimConfig {
            num_generations: 2,
            steps_per_generation: 10,
            ..Default::default()
        }
        .validate()
        .unwrap();
        assert_eq!(cfg.total_steps(), 20);
    }

    #[test]
    fn unknown_key_rejected_at_deserialize() {
        let json = r#"{"num_agents": 5, "bogus_key": 1}"#;
        let result: Result<SimConfig, _> = serde_json::from_str(json);
        assert!(result.is_err());
    }

    #[test]
    fn out_of_range_mutation_rate_rejected() {
        let cfg = SimConfig {
            mutation_rate: 1.5,
            ..Default::default()
        };
        assert!(cfg.validate().is_err());
    }
}
