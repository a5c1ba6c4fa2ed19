//! Core types for the CUE synthesis core

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Kind of event flowing through peers and the network log.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventType {
    StateChanged,
    AgentAction,
    AgentLearnedRule,
    HarmonicResonanceTrigger,
    CtlQuorumActivated,
    RectificationProof,
}

impl EventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::StateChanged => "STATE_CHANGED",
            Self::AgentAction => "AGENT_ACTION",
            Self::AgentLearnedRule => "AGENT_LEARNED_RULE",
            Self::HarmonicResonanceTrigger => "HARMONIC_RESONANCE_TRIGGER",
            Self::CtlQuorumActivated => "CTL_QUORUM_ACTIVATED",
            Self::RectificationProof => "RECTIFICATION_PROOF",
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Intended propagation scope. Advisory only; nothing in the core enforces it.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventLevel {
    #[default]
    Local,
    PeerToPeer,
    Group,
    Global,
}

/// An event as it appears on the wire: `{type, level, payload, timestamp}`.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct CueEvent {
    #[serde(rename = "type")]
    pub event_type: EventType,
    pub level: EventLevel,
    pub payload: serde_json::Value,
    /// Unix milliseconds.
    pub timestamp: i64,
}

impl CueEvent {
    pub fn new(event_type: EventType, level: EventLevel, payload: serde_json::Value) -> Self {
        Self {
            event_type,
            level,
            payload,
            timestamp: chrono::Utc::now().timestamp_millis(),
        }
    }

    pub fn with_timestamp(mut self, timestamp: i64) -> Self {
        self.timestamp = timestamp;
        self
    }

    /// Canonical byte encoding used for signing and event ids.
    ///
    /// Compact JSON, struct fields in declaration order, object keys sorted
    /// (serde_json's default map is ordered).
    pub fn canonical_bytes(&self) -> crate::Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    /// Content address of the event: hex SHA-256 over the canonical encoding.
    pub fn id(&self) -> crate::Result<String> {
        Ok(crate::protocol::sha256_hex(&self.canonical_bytes()?))
    }
}

/// An event plus the signature of its source peer.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SignedEvent {
    pub event: CueEvent,
    pub source_credential_id: String,
    pub signature: String,
}

// ===========================================================================
// MDU state
// ===========================================================================

/// One modular domain: level `l`, residue `a`, modulus `b` with `0 <= a < b`.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct MduState {
    #[serde(rename = "L", default)]
    pub l: u64,
    #[serde(rename = "A")]
    pub a: u64,
    #[serde(rename = "B")]
    pub b: u64,
}

impl MduState {
    pub fn new(b: u64) -> Self {
        Self { l: 0, a: 0, b }
    }
}

/// Per-entity multi-domain state with path-dependent history.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct EntityState {
    pub entity_id: String,
    /// Level counter of the primary domain.
    pub current_l: u64,
    pub primary_domain: String,
    pub multi_domain_state: BTreeMap<String, MduState>,
    /// Modulus in force at each wrap of the primary domain, oldest first.
    pub base_history: Vec<u64>,
}

impl EntityState {
    pub fn primary(&self) -> Option<&MduState> {
        self.multi_domain_state.get(&self.primary_domain)
    }

    pub fn domain(&self, name: &str) -> Option<&MduState> {
        self.multi_domain_state.get(name)
    }
}

/// An MDU coordinate plus a salience weight, consumed by the cognitive agent.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq)]
pub struct WeightedMduState {
    #[serde(rename = "L")]
    pub l: u64,
    #[serde(rename = "A")]
    pub a: u64,
    #[serde(rename = "B")]
    pub b: u64,
    pub w: f64,
}

impl WeightedMduState {
    pub fn new(l: u64, a: u64, b: u64, w: f64) -> Self {
        Self { l, a, b, w }
    }

    pub fn key(&self) -> StateKey {
        StateKey { l: self.l, a: self.a }
    }
}

/// Discretized state signature `(L, A)` used by implicit and explicit knowledge.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StateKey {
    #[serde(rename = "L")]
    pub l: u64,
    #[serde(rename = "A")]
    pub a: u64,
}

impl fmt::Display for StateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.l, self.a)
    }
}

// ===========================================================================
// Agent knowledge
// ===========================================================================

/// Sub-symbolic knowledge for one `(state, action)` pair.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ImplicitAssociation {
    pub estimate: f64,
    pub visits: u64,
    /// Consecutive positive rewards ending at the latest visit.
    pub positive_streak: u64,
}

/// Evidence that justified promoting an association to a rule.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RuleProvenance {
    pub visits: u64,
    pub estimate: f64,
    pub positive_streak: u64,
}

/// Symbolic `IF (L, A) THEN action` rule.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ExplicitRule {
    pub condition: StateKey,
    pub action: String,
    pub provenance: RuleProvenance,
}

/// Flattened implicit store entry, used for persistence.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ImplicitEntry {
    pub state: StateKey,
    pub action: String,
    pub association: ImplicitAssociation,
}

/// Everything an agent knows, in a serializable shape.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AgentSnapshot {
    pub agent_id: String,
    pub implicit: Vec<ImplicitEntry>,
    pub explicit_rules: Vec<ExplicitRule>,
    pub active_bases: BTreeMap<String, u64>,
}

/// Opaque per-peer state handed to the persistence collaborator.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PeerSnapshot {
    pub credential_id: String,
    pub private_key: String,
    #[serde(default)]
    pub entity_states: Vec<EntityState>,
    #[serde(default)]
    pub agent: Option<AgentSnapshot>,
}

// ===========================================================================
// Network
// ===========================================================================

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct NetworkStats {
    pub peer_count: usize,
    pub total_events: usize,
    pub events_by_type: BTreeMap<String, usize>,
}

impl NetworkStats {
    pub fn count(&self, event_type: EventType) -> usize {
        self.events_by_type.get(event_type.as_str()).copied().unwrap_or(0)
    }
}
