//! MduStateMachine — multi-domain Modulo-Divisive Unfolding
//!
//! A counter `N` under base `B` unfolds to `(L, A) = (N / B, N % B)`. Each
//! entity carries several named domains, each advancing under its own base.
//! Bases may change between updates, so the `(L, A)` reached after a given
//! number of steps depends on the path taken; `base_history` records that
//! path for the primary domain.

use cue_core::{EntityState, Error, MduState, Result};
use std::collections::BTreeMap;
use tracing::debug;

/// Name of the domain every entity gets when no domains are supplied.
pub const DEFAULT_DOMAIN: &str = "default";
pub const DEFAULT_BASE: u64 = 7;

/// Unfold an absolute count under a fixed base into `(L, A)`.
pub fn unfold(n: u64, b: u64) -> Result<(u64, u64)> {
    if b == 0 {
        return Err(Error::validation("modulus must be positive"));
    }
    Ok((n / b, n % b))
}

/// What changed during one update.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MduTransition {
    pub entity_id: String,
    /// Domains whose residue wrapped back to zero this step.
    pub wrapped: Vec<String>,
    /// True when the primary domain wrapped (an L-transition).
    pub l_transition: bool,
}

#[derive(Debug, Default)]
pub struct MduStateMachine {
    entities: BTreeMap<String, EntityState>,
}

impl MduStateMachine {
    pub fn new() -> Self {
        Self::default()
    }

    /// `{"default": 7}`
    pub fn default_domains() -> BTreeMap<String, u64> {
        BTreeMap::from([(DEFAULT_DOMAIN.to_string(), DEFAULT_BASE)])
    }

    /// Rebuild from persisted states, rejecting any that break the residue invariant.
    pub fn from_states(states: Vec<EntityState>) -> Result<Self> {
        let mut entities = BTreeMap::new();
        for state in states {
            for (name, domain) in &state.multi_domain_state {
                if domain.b == 0 || domain.a >= domain.b {
                    return Err(Error::validation(format!(
                        "entity {} domain '{}' violates 0 <= A < B (A={}, B={})",
                        state.entity_id, name, domain.a, domain.b
                    )));
                }
            }
            entities.insert(state.entity_id.clone(), state);
        }
        Ok(Self { entities })
    }

    /// Create an entity at `L = 0`, every domain at `A = 0`.
    ///
    /// Initializing an entity that already exists leaves it untouched.
    pub fn initialize_entity(
        &mut self,
        entity_id: &str,
        domains: &BTreeMap<String, u64>,
    ) -> Result<&EntityState> {
        if self.entities.contains_key(entity_id) {
            return Ok(&self.entities[entity_id]);
        }
        if domains.is_empty() {
            return Err(Error::validation(format!("entity {} needs at least one domain", entity_id)));
        }
        if let Some((name, _)) = domains.iter().find(|(_, b)| **b == 0) {
            return Err(Error::validation(format!(
                "domain '{}' of entity {} has non-positive modulus",
                name, entity_id
            )));
        }

        let primary_domain = if domains.contains_key(DEFAULT_DOMAIN) {
            DEFAULT_DOMAIN.to_string()
        } else {
            // Non-empty was checked above.
            domains.keys().next().cloned().unwrap_or_default()
        };

        let state = EntityState {
            entity_id: entity_id.to_string(),
            current_l: 0,
            primary_domain,
            multi_domain_state: domains.iter().map(|(name, &b)| (name.clone(), MduState::new(b))).collect(),
            base_history: Vec::new(),
        };
        debug!("Initialized entity {} with {} domains", entity_id, domains.len());
        Ok(self.entities.entry(entity_id.to_string()).or_insert(state))
    }

    /// Advance every domain of the entity by one step.
    pub fn update_entity_state(&mut self, entity_id: &str) -> Result<MduTransition> {
        let state = self
            .entities
            .get_mut(entity_id)
            .ok_or_else(|| Error::EntityNotFound(entity_id.to_string()))?;

        let mut wrapped = Vec::new();
        let mut l_transition = false;
        for (name, domain) in state.multi_domain_state.iter_mut() {
            domain.a += 1;
            if domain.a >= domain.b {
                domain.a = 0;
                domain.l += 1;
                wrapped.push(name.clone());
                if *name == state.primary_domain {
                    l_transition = true;
                    state.current_l += 1;
                    state.base_history.push(domain.b);
                }
            }
        }

        if !wrapped.is_empty() {
            debug!("Entity {} completed a cycle in {:?}", entity_id, wrapped);
        }
        Ok(MduTransition {
            entity_id: entity_id.to_string(),
            wrapped,
            l_transition,
        })
    }

    /// Switch one domain to a new base. The residue is reduced so `A < B` still holds.
    /// An unknown domain is added at `A = 0`.
    pub fn set_domain_base(&mut self, entity_id: &str, domain: &str, b: u64) -> Result<()> {
        if b == 0 {
            return Err(Error::validation("modulus must be positive"));
        }
        let state = self
            .entities
            .get_mut(entity_id)
            .ok_or_else(|| Error::EntityNotFound(entity_id.to_string()))?;

        let entry = state.multi_domain_state.entry(domain.to_string()).or_insert_with(|| MduState::new(b));
        if entry.b != b {
            debug!("Entity {} domain '{}' base {} -> {}", entity_id, domain, entry.b, b);
            entry.b = b;
            entry.a %= b;
        }
        Ok(())
    }

    /// Put back a previously captured entity state, replacing the current one.
    pub fn restore_entity(&mut self, state: EntityState) {
        debug!("Entity {} restored", state.entity_id);
        self.entities.insert(state.entity_id.clone(), state);
    }

    pub fn entity(&self, entity_id: &str) -> Option<&EntityState> {
        self.entities.get(entity_id)
    }

    /// Entities ordered by id.
    pub fn entities(&self) -> impl Iterator<Item = &EntityState> {
        self.entities.values()
    }

    pub fn entity_ids(&self) -> Vec<String> {
        self.entities.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    pub fn snapshot(&self) -> Vec<EntityState> {
        self.entities.values().cloned().collect()
    }
}
