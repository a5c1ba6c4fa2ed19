//! ClarionMduAgent — learns from experience, promotes what it is sure of.

use crate::implicit::ImplicitStore;
use crate::metacog::MetaCognitiveState;
use cue_core::{
    AgentConfig, AgentSnapshot, ExplicitRule, Result, RuleProvenance, StateKey, WeightedMduState,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{debug, info};

/// Returned when there is neither an applicable rule nor any candidate.
pub const NOOP_ACTION: &str = "noop";

#[derive(Clone)]
pub struct ClarionMduAgent {
    id: String,
    config: AgentConfig,
    implicit: ImplicitStore,
    explicit_rules: Vec<ExplicitRule>,
    mcs: MetaCognitiveState,
    rng: StdRng,
}

impl std::fmt::Debug for ClarionMduAgent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClarionMduAgent")
            .field("id", &self.id)
            .field("associations", &self.implicit.association_count())
            .field("explicit_rules", &self.explicit_rules.len())
            .field("mcs", &self.mcs)
            .finish()
    }
}

impl ClarionMduAgent {
    pub fn new(id: impl Into<String>, config: AgentConfig) -> Self {
        let rng = StdRng::seed_from_u64(config.seed);
        Self {
            id: id.into(),
            config,
            implicit: ImplicitStore::new(),
            explicit_rules: Vec::new(),
            mcs: MetaCognitiveState::default(),
            rng,
        }
    }

    /// Restore an agent's knowledge. The exploration RNG restarts from the configured seed.
    pub fn from_snapshot(snapshot: AgentSnapshot, config: AgentConfig) -> Result<Self> {
        let mcs = MetaCognitiveState::from_bases(snapshot.active_bases)?;
        let mut agent = Self::new(snapshot.agent_id, config);
        agent.implicit = ImplicitStore::from_entries(snapshot.implicit);
        agent.explicit_rules = snapshot.explicit_rules;
        agent.mcs = mcs;
        Ok(agent)
    }

    pub fn snapshot(&self) -> AgentSnapshot {
        AgentSnapshot {
            agent_id: self.id.clone(),
            implicit: self.implicit.entries(),
            explicit_rules: self.explicit_rules.clone(),
            active_bases: self.mcs.active_bases().clone(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Bottom-up learning: update the implicit estimate for `(state, action)` and
    /// promote it to an explicit rule once the evidence is sufficient.
    ///
    /// Returns the rule minted by this experience, if any.
    pub fn learn_from_experience(
        &mut self,
        state: &WeightedMduState,
        action: &str,
        reward: f64,
        next_state: &WeightedMduState,
    ) -> Option<ExplicitRule> {
        let key = state.key();
        let association = self.implicit.update(
            key,
            action,
            reward,
            next_state.key(),
            self.config.learning_rate,
            self.config.discount_factor,
        );
        debug!(
            "Agent {}: q({}, {}) = {:.3} after {} visits",
            self.id, key, action, association.estimate, association.visits
        );

        let promotable = association.visits >= self.config.min_visits
            && association.positive_streak >= self.config.min_positive_streak
            && association.estimate > self.config.min_estimate;
        if !promotable || self.rule_for(key).is_some() {
            return None;
        }

        let rule = ExplicitRule {
            condition: key,
            action: action.to_string(),
            provenance: RuleProvenance {
                visits: association.visits,
                estimate: association.estimate,
                positive_streak: association.positive_streak,
            },
        };
        info!(
            "Agent {}: new explicit rule IF ({}, {}) THEN {}",
            self.id, key.l, key.a, rule.action
        );
        self.explicit_rules.push(rule.clone());
        Some(rule)
    }

    /// Explicit rules first, unconditionally. Otherwise epsilon-greedy over
    /// `candidates` by estimate, ties going to the earlier candidate.
    pub fn decide_next_action<S: AsRef<str>>(&mut self, state: &WeightedMduState, candidates: &[S]) -> String {
        let key = state.key();
        if let Some(rule) = self.rule_for(key) {
            return rule.action.clone();
        }
        if candidates.is_empty() {
            return NOOP_ACTION.to_string();
        }

        if self.rng.gen::<f64>() < self.config.exploration_rate {
            let pick = self.rng.gen_range(0..candidates.len());
            return candidates[pick].as_ref().to_string();
        }

        let mut best = candidates[0].as_ref();
        let mut best_value = self.implicit.estimate(key, best);
        for candidate in &candidates[1..] {
            let value = self.implicit.estimate(key, candidate.as_ref());
            if value > best_value {
                best = candidate.as_ref();
                best_value = value;
            }
        }
        best.to_string()
    }

    pub fn rule_for(&self, condition: StateKey) -> Option<&ExplicitRule> {
        self.explicit_rules.iter().find(|r| r.condition == condition)
    }

    pub fn get_explicit_rules(&self) -> &[ExplicitRule] {
        &self.explicit_rules
    }

    pub fn implicit_knowledge(&self) -> &ImplicitStore {
        &self.implicit
    }

    pub fn mcs(&self) -> &MetaCognitiveState {
        &self.mcs
    }

    pub fn reconfigure_bases(&mut self, context: &str, base: u64) -> Result<()> {
        self.mcs.reconfigure_bases(context, base)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn greedy() -> AgentConfig {
        AgentConfig { exploration_rate: 0.0, ..AgentConfig::default() }
    }

    #[test]
    fn fresh_agent_knows_nothing() {
        let agent = ClarionMduAgent::new("a", AgentConfig::default());
        assert!(agent.implicit_knowledge().is_empty());
        assert!(agent.get_explicit_rules().is_empty());
        assert_eq!(agent.mcs().active_base("default"), Some(7));
    }

    #[test]
    fn promotion_happens_at_min_visits() {
        let mut agent = ClarionMduAgent::new("a", greedy());
        let s = WeightedMduState::new(1, 3, 7, 2.5);
        let n = WeightedMduState::new(1, 4, 7, 3.0);
        for _ in 0..9 {
            assert!(agent.learn_from_experience(&s, "optimize", 2.0, &n).is_none());
        }
        let rule = agent.learn_from_experience(&s, "optimize", 2.0, &n).unwrap();
        assert_eq!(rule.condition, StateKey { l: 1, a: 3 });
        assert_eq!(rule.provenance.visits, 10);
        assert!(agent.learn_from_experience(&s, "optimize", 2.0, &n).is_none());
        assert_eq!(agent.get_explicit_rules().len(), 1);
    }

    #[test]
    fn empty_candidates_yield_noop() {
        let mut agent = ClarionMduAgent::new("a", greedy());
        let s = WeightedMduState::new(0, 0, 7, 0.0);
        assert_eq!(agent.decide_next_action::<&str>(&s, &[]), NOOP_ACTION);
    }

    #[test]
    fn exploration_is_reproducible_per_seed() {
        let config = AgentConfig { exploration_rate: 1.0, seed: 99, ..AgentConfig::default() };
        let mut a = ClarionMduAgent::new("a", config.clone());
        let mut b = ClarionMduAgent::new("b", config);
        let s = WeightedMduState::new(0, 0, 7, 0.0);
        let candidates = ["x", "y", "z"];
        let picks_a: Vec<String> = (0..20).map(|_| a.decide_next_action(&s, &candidates)).collect();
        let picks_b: Vec<String> = (0..20).map(|_| b.decide_next_action(&s, &candidates)).collect();
        assert_eq!(picks_a, picks_b);
        assert!(picks_a.iter().all(|p| candidates.contains(&p.as_str())));
    }
}
