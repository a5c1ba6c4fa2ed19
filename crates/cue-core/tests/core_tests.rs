//! Tests for cue-core: event wire shape, canonical encoding, snapshots, errors

use cue_core::*;
use serde_json::json;
use std::collections::BTreeMap;

// ===========================================================================
// EventType / EventLevel
// ===========================================================================

#[test]
fn event_type_serializes_screaming_snake_case() {
    assert_eq!(serde_json::to_string(&EventType::StateChanged).unwrap(), r#""STATE_CHANGED""#);
    assert_eq!(
        serde_json::to_string(&EventType::HarmonicResonanceTrigger).unwrap(),
        r#""HARMONIC_RESONANCE_TRIGGER""#
    );
    assert_eq!(
        serde_json::to_string(&EventType::CtlQuorumActivated).unwrap(),
        r#""CTL_QUORUM_ACTIVATED""#
    );
}

#[test]
fn event_type_as_str_matches_serde() {
    let all = [
        EventType::StateChanged,
        EventType::AgentAction,
        EventType::AgentLearnedRule,
        EventType::HarmonicResonanceTrigger,
        EventType::CtlQuorumActivated,
        EventType::RectificationProof,
    ];
    for t in all {
        let json = serde_json::to_string(&t).unwrap();
        assert_eq!(json, format!("\"{}\"", t.as_str()));
    }
}

#[test]
fn event_level_serializes_peer_to_peer() {
    assert_eq!(serde_json::to_string(&EventLevel::PeerToPeer).unwrap(), r#""PEER_TO_PEER""#);
    assert_eq!(serde_json::to_string(&EventLevel::Local).unwrap(), r#""LOCAL""#);
}

// ===========================================================================
// CueEvent
// ===========================================================================

#[test]
fn event_wire_shape_uses_type_key() {
    let event = CueEvent::new(EventType::AgentAction, EventLevel::Local, json!({"action": "explore"}))
        .with_timestamp(123);
    let value = serde_json::to_value(&event).unwrap();
    assert_eq!(value["type"], "AGENT_ACTION");
    assert_eq!(value["level"], "LOCAL");
    assert_eq!(value["payload"]["action"], "explore");
    assert_eq!(value["timestamp"], 123);
}

#[test]
fn canonical_bytes_ignore_payload_key_order() {
    let a = CueEvent::new(EventType::StateChanged, EventLevel::Local, json!({"x": 1, "y": 2}))
        .with_timestamp(5);
    let b = CueEvent::new(EventType::StateChanged, EventLevel::Local, json!({"y": 2, "x": 1}))
        .with_timestamp(5);
    assert_eq!(a.canonical_bytes().unwrap(), b.canonical_bytes().unwrap());
    assert_eq!(a.id().unwrap(), b.id().unwrap());
}

#[test]
fn event_id_changes_with_payload() {
    let a = CueEvent::new(EventType::StateChanged, EventLevel::Local, json!({"x": 1})).with_timestamp(5);
    let mut b = a.clone();
    b.payload = json!({"x": 2});
    assert_ne!(a.id().unwrap(), b.id().unwrap());
    assert_eq!(a.id().unwrap().len(), 64);
}

#[test]
fn signed_event_uses_camel_case() {
    let signed = SignedEvent {
        event: CueEvent::new(EventType::StateChanged, EventLevel::Local, json!({})),
        source_credential_id: "peer".into(),
        signature: "sig".into(),
    };
    let json = serde_json::to_string(&signed).unwrap();
    assert!(json.contains("sourceCredentialId"));
}

// ===========================================================================
// MDU types
// ===========================================================================

#[test]
fn mdu_state_uses_letter_keys() {
    let state = MduState { l: 1, a: 2, b: 7 };
    let value = serde_json::to_value(state).unwrap();
    assert_eq!(value, json!({"L": 1, "A": 2, "B": 7}));
}

#[test]
fn mdu_state_level_defaults_when_absent() {
    let state: MduState = serde_json::from_str(r#"{"A": 3, "B": 5}"#).unwrap();
    assert_eq!(state, MduState { l: 0, a: 3, b: 5 });
}

#[test]
fn entity_state_primary_lookup() {
    let mut domains = BTreeMap::new();
    domains.insert("default".to_string(), MduState::new(7));
    domains.insert("weekly".to_string(), MduState::new(2));
    let entity = EntityState {
        entity_id: "e".into(),
        current_l: 0,
        primary_domain: "default".into(),
        multi_domain_state: domains,
        base_history: vec![],
    };
    assert_eq!(entity.primary().unwrap().b, 7);
    assert_eq!(entity.domain("weekly").unwrap().b, 2);
    assert!(entity.domain("monthly").is_none());
}

#[test]
fn weighted_state_key_discards_weight() {
    let s = WeightedMduState::new(2, 5, 7, 1.5);
    assert_eq!(s.key(), StateKey { l: 2, a: 5 });
    assert_eq!(s.key().to_string(), "2-5");
}

// ===========================================================================
// Snapshots and stats
// ===========================================================================

#[test]
fn peer_snapshot_tolerates_missing_optional_sections() {
    let snap: PeerSnapshot =
        serde_json::from_str(r#"{"credentialId": "pk", "privateKey": "sk"}"#).unwrap();
    assert!(snap.entity_states.is_empty());
    assert!(snap.agent.is_none());
}

#[test]
fn network_stats_count_defaults_to_zero() {
    let mut stats = NetworkStats::default();
    stats.events_by_type.insert("STATE_CHANGED".into(), 4);
    assert_eq!(stats.count(EventType::StateChanged), 4);
    assert_eq!(stats.count(EventType::AgentAction), 0);
}

// ===========================================================================
// Error
// ===========================================================================

#[test]
fn error_display_messages() {
    assert_eq!(Error::validation("bad modulus").to_string(), "validation error: bad modulus");
    assert_eq!(
        Error::collaborator("store", "disk full").to_string(),
        "collaborator failure: store - disk full"
    );
    assert_eq!(Error::EntityNotFound("e1".into()).to_string(), "entity not found: e1");
    assert_eq!(Error::ConsensusNotInitialized.to_string(), "consensus not initialized");
}

#[test]
fn error_categories() {
    assert!(Error::validation("x").is_validation());
    assert!(!Error::validation("x").is_collaborator());
    assert!(Error::collaborator("crypto", "x").is_collaborator());
}

#[test]
fn error_from_json() {
    let err: Error = serde_json::from_str::<serde_json::Value>("{{bad").unwrap_err().into();
    assert!(err.to_string().starts_with("json error:"));
}
