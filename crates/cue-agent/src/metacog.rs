//! Meta-cognitive subsystem: which base each context operates under.

use cue_core::{Error, Result};
use std::collections::BTreeMap;
use tracing::info;

pub const DEFAULT_CONTEXT: &str = "default";
pub const DEFAULT_BASE: u64 = 7;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MetaCognitiveState {
    active_bases: BTreeMap<String, u64>,
}

impl Default for MetaCognitiveState {
    fn default() -> Self {
        Self {
            active_bases: BTreeMap::from([(DEFAULT_CONTEXT.to_string(), DEFAULT_BASE)]),
        }
    }
}

impl MetaCognitiveState {
    pub fn from_bases(active_bases: BTreeMap<String, u64>) -> Result<Self> {
        if let Some((context, _)) = active_bases.iter().find(|(_, b)| **b == 0) {
            return Err(Error::validation(format!("context '{}' has non-positive base", context)));
        }
        Ok(Self { active_bases })
    }

    /// Set the base of one context. Other contexts are untouched.
    pub fn reconfigure_bases(&mut self, context: &str, base: u64) -> Result<()> {
        if base == 0 {
            return Err(Error::validation("base must be positive"));
        }
        info!("MCS: context '{}' now uses base B={}", context, base);
        self.active_bases.insert(context.to_string(), base);
        Ok(())
    }

    pub fn active_base(&self, context: &str) -> Option<u64> {
        self.active_bases.get(context).copied()
    }

    pub fn active_bases(&self) -> &BTreeMap<String, u64> {
        &self.active_bases
    }
}
