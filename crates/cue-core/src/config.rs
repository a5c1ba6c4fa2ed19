//! Synthesis core configuration
//!
//! All tunable parameters in one place. Loaded from TOML at startup,
//! falls back to defaults if no config file exists.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SynthesisConfig {
    /// Cognitive agent learning parameters.
    pub agent: AgentConfig,
    /// Complex event processing parameters.
    pub cep: CepConfig,
    /// Harmonic resonance detection.
    pub resonance: ResonanceConfig,
    /// Simulation driver parameters.
    pub simulation: SimulationConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    /// Q-learning step size.
    pub learning_rate: f64,
    /// Weight of the best next-state estimate.
    pub discount_factor: f64,
    /// Probability of a uniformly random pick when no rule applies (0.0 - 1.0).
    pub exploration_rate: f64,
    /// Visits required before an association can become a rule.
    pub min_visits: u64,
    /// Consecutive positive rewards required before promotion.
    pub min_positive_streak: u64,
    /// Estimate that must be exceeded before promotion.
    pub min_estimate: f64,
    /// Seed for the exploration RNG.
    pub seed: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CepConfig {
    /// Ring buffer capacity of the event history.
    pub history_capacity: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ResonanceConfig {
    /// Domains that must align. Empty means every domain of the entity.
    pub domains: Vec<String>,
    /// Residue at which the domains must align.
    pub target_residue: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    /// Seed for peer-local reward simulation. Each peer mixes in a hash of its state path.
    pub seed: u64,
    /// Domains given to an agent's own entity when it is hosted.
    pub agent_domains: BTreeMap<String, u64>,
    /// Actions offered to hosted agents each tick.
    pub candidate_actions: Vec<String>,
    /// Bases the "reconfigure" action rotates the agent's default context through.
    pub base_cycle: Vec<u64>,
    /// Probability that a simulated outcome is rewarded.
    pub reward_probability: f64,
    pub positive_reward: f64,
    pub negative_reward: f64,
    /// Lifetime of rectification proofs issued by peers.
    pub rectification_ttl_ms: i64,
}

// ============================================================
// Defaults
// ============================================================

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            learning_rate: 0.1,
            discount_factor: 0.9,
            exploration_rate: 0.1,
            min_visits: 10,
            min_positive_streak: 10,
            min_estimate: 0.0,
            seed: 7,
        }
    }
}

impl Default for CepConfig {
    fn default() -> Self {
        Self { history_capacity: 100 }
    }
}

impl Default for ResonanceConfig {
    fn default() -> Self {
        Self { domains: Vec::new(), target_residue: 0 }
    }
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            seed: 42,
            agent_domains: BTreeMap::from([("default".to_string(), 7)]),
            candidate_actions: vec!["explore".into(), "exploit".into(), "reconfigure".into()],
            base_cycle: vec![7, 11, 13],
            reward_probability: 0.5,
            positive_reward: 5.0,
            negative_reward: -1.0,
            rectification_ttl_ms: 60_000,
        }
    }
}

// ============================================================
// Loading
// ============================================================

impl SynthesisConfig {
    /// Load config from a TOML file, falling back to defaults.
    pub fn load(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(content) => match toml::from_str::<Self>(&content) {
                Ok(config) => match config.validate() {
                    Ok(()) => {
                        tracing::info!("Loaded config from {}", path.display());
                        config
                    }
                    Err(e) => {
                        tracing::warn!("Rejected {}: {} - using defaults", path.display(), e);
                        Self::default()
                    }
                },
                Err(e) => {
                    tracing::warn!("Failed to parse {}: {} - using defaults", path.display(), e);
                    Self::default()
                }
            },
            Err(_) => {
                tracing::info!("No config at {} - using defaults", path.display());
                Self::default()
            }
        }
    }

    /// Every modulus the simulation can hand out must be positive.
    pub fn validate(&self) -> Result<()> {
        let sim = &self.simulation;
        if sim.agent_domains.is_empty() {
            return Err(Error::validation("simulation.agent_domains must name at least one domain"));
        }
        if let Some((name, _)) = sim.agent_domains.iter().find(|(_, b)| **b == 0) {
            return Err(Error::validation(format!(
                "simulation.agent_domains.{} must be positive",
                name
            )));
        }
        if sim.base_cycle.contains(&0) {
            return Err(Error::validation("simulation.base_cycle entries must be positive"));
        }
        Ok(())
    }

    /// Write the current config as TOML (for generating a default config file).
    pub fn to_toml(&self) -> String {
        toml::to_string_pretty(self).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let config = SynthesisConfig::default();
        assert_eq!(config.cep.history_capacity, 100);
        assert_eq!(config.agent.learning_rate, 0.1);
        assert_eq!(config.agent.discount_factor, 0.9);
        assert_eq!(config.resonance.target_residue, 0);
        assert_eq!(config.simulation.agent_domains.get("default"), Some(&7));
    }

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let config = SynthesisConfig::load(Path::new("/nonexistent/cue.toml"));
        assert_eq!(config.cep.history_capacity, 100);
    }

    #[test]
    fn partial_toml_keeps_other_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cue.toml");
        std::fs::write(&path, "[cep]\nhistory_capacity = 5\n").unwrap();
        let config = SynthesisConfig::load(&path);
        assert_eq!(config.cep.history_capacity, 5);
        assert_eq!(config.agent.min_visits, 10);
    }

    #[test]
    fn invalid_toml_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cue.toml");
        std::fs::write(&path, "this is = = not toml").unwrap();
        let config = SynthesisConfig::load(&path);
        assert_eq!(config.cep.history_capacity, 100);
    }

    #[test]
    fn defaults_are_valid() {
        assert!(SynthesisConfig::default().validate().is_ok());
    }

    #[test]
    fn zero_moduli_fail_validation() {
        let mut config = SynthesisConfig::default();
        config.simulation.base_cycle = vec![7, 0];
        assert!(config.validate().unwrap_err().is_validation());

        let mut config = SynthesisConfig::default();
        config.simulation.agent_domains.insert("weekly".into(), 0);
        assert!(config.validate().unwrap_err().is_validation());

        let mut config = SynthesisConfig::default();
        config.simulation.agent_domains.clear();
        assert!(config.validate().is_err());
    }

    #[test]
    fn invalid_values_fall_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cue.toml");
        std::fs::write(&path, "[simulation]\nbase_cycle = [7, 0]\n").unwrap();
        let config = SynthesisConfig::load(&path);
        assert_eq!(config.simulation.base_cycle, vec![7, 11, 13]);
    }

    #[test]
    fn dumped_toml_parses_back() {
        let text = SynthesisConfig::default().to_toml();
        let parsed: SynthesisConfig = toml::from_str(&text).unwrap();
        assert_eq!(parsed.simulation.base_cycle, vec![7, 11, 13]);
    }
}
