//! CueNetwork — peers, the event log, network CEP and CTL consensus.
//!
//! The network is driven externally: one `simulation_step` per tick, peers in
//! insertion order, entities in id order. Everything a peer emits is recorded
//! in the append-only log and passed through the network CEP engine; events
//! derived by CEP rules are appended after the event that triggered them.

use crate::peer::CuePeer;
use cue_core::{CueEvent, Error, EventLevel, EventType, NetworkStats, Result, SignedEvent, SynthesisConfig};
use cue_substrate::{CepEngine, CepRule, CtlConsensus, Quorum, VALIDATOR_COUNT};
use serde::Serialize;
use serde_json::json;
use tracing::{debug, info};

/// Summary of one simulation tick.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StepReport {
    pub tick: u64,
    /// Events recorded during the tick, derived CEP events included.
    pub events: usize,
    pub resonances: usize,
    pub rules_learned: usize,
}

pub struct CueNetwork {
    peers: Vec<CuePeer>,
    event_log: Vec<CueEvent>,
    cep: CepEngine,
    ctl: Option<CtlConsensus>,
    tick: u64,
}

impl Default for CueNetwork {
    fn default() -> Self {
        Self::new(&SynthesisConfig::default())
    }
}

impl CueNetwork {
    pub fn new(config: &SynthesisConfig) -> Self {
        Self {
            peers: Vec::new(),
            event_log: Vec::new(),
            cep: CepEngine::with_capacity(config.cep.history_capacity),
            ctl: None,
            tick: 0,
        }
    }

    // ========================================================================
    // Peers
    // ========================================================================

    pub fn add_peer(&mut self, peer: CuePeer) -> Result<()> {
        if self.peer(peer.credential_id()).is_some() {
            return Err(Error::validation(format!("peer {} already joined", peer.credential_id())));
        }
        info!("Peer {} joined the network ({} peers)", peer.short_id(), self.peers.len() + 1);
        self.peers.push(peer);
        Ok(())
    }

    pub fn peer(&self, credential_id: &str) -> Option<&CuePeer> {
        self.peers.iter().find(|p| p.credential_id() == credential_id)
    }

    pub fn peer_mut(&mut self, credential_id: &str) -> Option<&mut CuePeer> {
        self.peers.iter_mut().find(|p| p.credential_id() == credential_id)
    }

    fn require_peer(&mut self, credential_id: &str) -> Result<&mut CuePeer> {
        self.peer_mut(credential_id)
            .ok_or_else(|| Error::PeerNotFound(credential_id.to_string()))
    }

    pub fn peers(&self) -> &[CuePeer] {
        &self.peers
    }

    pub fn peer_ids(&self) -> Vec<String> {
        self.peers.iter().map(|p| p.credential_id().to_string()).collect()
    }

    // ========================================================================
    // Event log and CEP
    // ========================================================================

    pub fn register_rule(&mut self, rule: CepRule) {
        self.cep.register_rule(rule);
    }

    pub fn cep(&self) -> &CepEngine {
        &self.cep
    }

    /// Append an event, then whatever the CEP rules derive from it.
    pub fn record(&mut self, event: CueEvent) {
        let report = self.cep.process_event(event.clone());
        self.event_log.push(event);
        if !report.emitted.is_empty() {
            debug!("CEP derived {} events", report.emitted.len());
        }
        self.event_log.extend(report.emitted);
    }

    fn record_all(&mut self, events: &[CueEvent]) {
        for event in events {
            self.record(event.clone());
        }
    }

    pub fn get_event_log(&self) -> &[CueEvent] {
        &self.event_log
    }

    pub fn clear_event_log(&mut self) {
        self.event_log.clear();
    }

    pub fn get_stats(&self) -> NetworkStats {
        let mut stats = NetworkStats {
            peer_count: self.peers.len(),
            total_events: self.event_log.len(),
            ..NetworkStats::default()
        };
        for event in &self.event_log {
            *stats.events_by_type.entry(event.event_type.as_str().to_string()).or_insert(0) += 1;
        }
        stats
    }

    // ========================================================================
    // Consensus
    // ========================================================================

    /// Use the first seven peers as validators.
    pub fn initialize_consensus(&mut self) -> Result<()> {
        if self.peers.len() < VALIDATOR_COUNT {
            return Err(Error::validation(format!(
                "consensus needs {} peers, network has {}",
                VALIDATOR_COUNT,
                self.peers.len()
            )));
        }
        let validators = self.peer_ids().into_iter().take(VALIDATOR_COUNT).collect();
        self.ctl = Some(CtlConsensus::new(validators)?);
        info!("CTL consensus initialized with {} validators", VALIDATOR_COUNT);
        Ok(())
    }

    /// Like `initialize_consensus`, padding missing validators with `mock-validator-N`.
    pub fn initialize_consensus_with_mock_validators(&mut self) -> Result<()> {
        let mut validators: Vec<String> = self.peer_ids().into_iter().take(VALIDATOR_COUNT).collect();
        let real = validators.len();
        for i in real..VALIDATOR_COUNT {
            validators.push(format!("mock-validator-{}", i));
        }
        self.ctl = Some(CtlConsensus::new(validators)?);
        info!(
            "CTL consensus initialized with {} peers and {} mock validators",
            real,
            VALIDATOR_COUNT - real
        );
        Ok(())
    }

    pub fn consensus(&self) -> Option<&CtlConsensus> {
        self.ctl.as_ref()
    }

    pub fn run_consensus_round(&mut self, seed: &str) -> Result<Quorum> {
        let ctl = self.ctl.as_ref().ok_or(Error::ConsensusNotInitialized)?;
        let quorum = ctl.get_activated_quorum(seed);
        info!("CTL round {:?} activated line {}", seed, quorum.line);
        self.record(CueEvent::new(
            EventType::CtlQuorumActivated,
            EventLevel::Group,
            json!({
                "quorum": quorum.validators,
                "roundSeed": seed,
                "line": quorum.line,
            }),
        ));
        Ok(quorum)
    }

    // ========================================================================
    // Driving peers
    // ========================================================================

    pub fn update_entity_state(&mut self, peer_id: &str, entity_id: &str) -> Result<Vec<CueEvent>> {
        let events = self.require_peer(peer_id)?.update_entity_state(entity_id)?;
        self.record_all(&events);
        Ok(events)
    }

    pub fn run_agent_decision(&mut self, peer_id: &str) -> Result<Vec<CueEvent>> {
        let events = self.require_peer(peer_id)?.run_agent_decision()?;
        self.record_all(&events);
        Ok(events)
    }

    /// Hand a signed event to every peer except its source. Returns how many accepted it.
    pub fn deliver(&mut self, signed: &SignedEvent) -> usize {
        self.peers
            .iter_mut()
            .filter(|p| p.credential_id() != signed.source_credential_id)
            .map(|p| p.process_incoming_event(signed))
            .filter(|accepted| *accepted)
            .count()
    }

    /// One tick: every peer advances each of its entities, then runs its agent once.
    pub fn simulation_step(&mut self) -> Result<StepReport> {
        self.tick += 1;
        let log_start = self.event_log.len();

        for index in 0..self.peers.len() {
            let mut events = Vec::new();
            let outcome = Self::advance_peer(&mut self.peers[index], &mut events);
            // Whatever the peer committed before failing still belongs in the log.
            self.record_all(&events);
            outcome?;
        }

        let recorded = &self.event_log[log_start..];
        let report = StepReport {
            tick: self.tick,
            events: recorded.len(),
            resonances: recorded
                .iter()
                .filter(|e| e.event_type == EventType::HarmonicResonanceTrigger)
                .count(),
            rules_learned: recorded
                .iter()
                .filter(|e| e.event_type == EventType::AgentLearnedRule)
                .count(),
        };
        debug!(
            "Tick {}: {} events, {} resonances, {} rules learned",
            report.tick, report.events, report.resonances, report.rules_learned
        );
        Ok(report)
    }

    fn advance_peer(peer: &mut CuePeer, events: &mut Vec<CueEvent>) -> Result<()> {
        for entity_id in peer.entity_ids() {
            events.extend(peer.update_entity_state(&entity_id)?);
        }
        if peer.agent().is_some() {
            events.extend(peer.run_agent_decision()?);
        }
        Ok(())
    }

    pub fn tick(&self) -> u64 {
        self.tick
    }
}
