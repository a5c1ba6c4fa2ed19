//! Implicit (sub-symbolic) knowledge: Q-value estimates per `(state, action)`.

use cue_core::{ImplicitAssociation, ImplicitEntry, StateKey};
use std::collections::BTreeMap;

#[derive(Clone, Debug, Default)]
pub struct ImplicitStore {
    table: BTreeMap<StateKey, BTreeMap<String, ImplicitAssociation>>,
}

impl ImplicitStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_entries(entries: Vec<ImplicitEntry>) -> Self {
        let mut store = Self::new();
        for entry in entries {
            store.table.entry(entry.state).or_default().insert(entry.action, entry.association);
        }
        store
    }

    pub fn entries(&self) -> Vec<ImplicitEntry> {
        self.table
            .iter()
            .flat_map(|(state, actions)| {
                actions.iter().map(move |(action, association)| ImplicitEntry {
                    state: *state,
                    action: action.clone(),
                    association: association.clone(),
                })
            })
            .collect()
    }

    pub fn get(&self, state: StateKey, action: &str) -> Option<&ImplicitAssociation> {
        self.table.get(&state).and_then(|actions| actions.get(action))
    }

    pub fn estimate(&self, state: StateKey, action: &str) -> f64 {
        self.get(state, action).map(|a| a.estimate).unwrap_or(0.0)
    }

    /// Best estimate reachable from `state`, floored at zero.
    pub fn best_value(&self, state: StateKey) -> f64 {
        self.table
            .get(&state)
            .map(|actions| actions.values().map(|a| a.estimate).fold(0.0, f64::max))
            .unwrap_or(0.0)
    }

    /// Q-learning step: `q += lr * (reward + gamma * best(next) - q)`.
    pub fn update(
        &mut self,
        state: StateKey,
        action: &str,
        reward: f64,
        next: StateKey,
        learning_rate: f64,
        discount_factor: f64,
    ) -> ImplicitAssociation {
        let best_next = self.best_value(next);
        let association = self.table.entry(state).or_default().entry(action.to_string()).or_default();

        association.estimate += learning_rate * (reward + discount_factor * best_next - association.estimate);
        association.visits += 1;
        if reward > 0.0 {
            association.positive_streak += 1;
        } else {
            association.positive_streak = 0;
        }
        association.clone()
    }

    /// Number of distinct states with any knowledge.
    pub fn state_count(&self) -> usize {
        self.table.len()
    }

    pub fn association_count(&self) -> usize {
        self.table.values().map(|a| a.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }
}
