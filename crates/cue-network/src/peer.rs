//! CuePeer — a credentialed participant owning entities and at most one agent.
//!
//! Every state change is persisted through the injected `SnapshotStore` right
//! after it happens, so a peer reopened at the same path resumes where it left off.

use crate::crypto::CryptoProvider;
use crate::store::SnapshotStore;
use cue_agent::ClarionMduAgent;
use cue_core::protocol::sha256_hex;
use cue_core::{
    AgentConfig, CueEvent, EntityState, Error, EventLevel, EventType, PeerSnapshot, RectificationProof, Result,
    SignedEvent, SynthesisConfig, WeightedMduState,
};
use cue_substrate::crt::check_harmonic_resonance;
use cue_substrate::MduStateMachine;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde_json::json;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Action name that rotates the agent's default base.
pub const RECONFIGURE_ACTION: &str = "reconfigure";

/// Mix a label into a configured seed so peers sharing a config still diverge.
fn derive_seed(base: u64, label: &str) -> u64 {
    let digest = sha256_hex(label.as_bytes());
    let prefix = u64::from_str_radix(&digest[..16], 16).unwrap_or(0);
    base ^ prefix
}

pub struct CuePeer {
    credential_id: String,
    private_key: String,
    state_path: String,
    mdu: MduStateMachine,
    agent: Option<ClarionMduAgent>,
    store: Arc<dyn SnapshotStore>,
    crypto: Arc<dyn CryptoProvider>,
    config: SynthesisConfig,
    rng: StdRng,
    accepted_events: usize,
}

impl std::fmt::Debug for CuePeer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CuePeer")
            .field("credential_id", &self.credential_id)
            .field("state_path", &self.state_path)
            .field("entities", &self.mdu.len())
            .field("agent", &self.agent)
            .finish()
    }
}

impl CuePeer {
    /// Rehydrate the peer stored at `state_path`, or mint a new credential and
    /// save a fresh snapshot there.
    pub fn open(
        state_path: impl Into<String>,
        store: Arc<dyn SnapshotStore>,
        crypto: Arc<dyn CryptoProvider>,
        config: SynthesisConfig,
    ) -> Result<Self> {
        config.validate()?;
        let state_path = state_path.into();
        let rng = StdRng::seed_from_u64(derive_seed(config.simulation.seed, &state_path));

        match store.load(&state_path)? {
            Some(snapshot) => {
                let mdu = MduStateMachine::from_states(snapshot.entity_states)?;
                let agent = match snapshot.agent {
                    Some(agent) => {
                        let agent_config = Self::agent_config(&config, &agent.agent_id);
                        Some(ClarionMduAgent::from_snapshot(agent, agent_config)?)
                    }
                    None => None,
                };
                let peer = Self {
                    credential_id: snapshot.credential_id,
                    private_key: snapshot.private_key,
                    state_path,
                    mdu,
                    agent,
                    store,
                    crypto,
                    config,
                    rng,
                    accepted_events: 0,
                };
                info!(
                    "Peer {} restored from {} ({} entities)",
                    peer.short_id(),
                    peer.state_path,
                    peer.mdu.len()
                );
                Ok(peer)
            }
            None => {
                let keys = crypto.generate_key_pair()?;
                let peer = Self {
                    credential_id: keys.public_key,
                    private_key: keys.private_key,
                    state_path,
                    mdu: MduStateMachine::new(),
                    agent: None,
                    store,
                    crypto,
                    config,
                    rng,
                    accepted_events: 0,
                };
                peer.save()?;
                info!("Peer {} created at {}", peer.short_id(), peer.state_path);
                Ok(peer)
            }
        }
    }

    fn agent_config(config: &SynthesisConfig, agent_id: &str) -> AgentConfig {
        AgentConfig {
            seed: derive_seed(config.agent.seed, agent_id),
            ..config.agent.clone()
        }
    }

    pub fn credential_id(&self) -> &str {
        &self.credential_id
    }

    /// Tail of the credential, for log lines.
    pub fn short_id(&self) -> &str {
        let start = self.credential_id.len().saturating_sub(6);
        self.credential_id.get(start..).unwrap_or(&self.credential_id)
    }

    pub fn state_path(&self) -> &str {
        &self.state_path
    }

    pub fn snapshot(&self) -> PeerSnapshot {
        PeerSnapshot {
            credential_id: self.credential_id.clone(),
            private_key: self.private_key.clone(),
            entity_states: self.mdu.snapshot(),
            agent: self.agent.as_ref().map(|a| a.snapshot()),
        }
    }

    pub fn save(&self) -> Result<()> {
        self.store.save(&self.state_path, &self.snapshot())
    }

    // ========================================================================
    // Entities
    // ========================================================================

    pub fn initialize_entity(&mut self, entity_id: &str, domains: &BTreeMap<String, u64>) -> Result<()> {
        self.mdu.initialize_entity(entity_id, domains)?;
        self.save()
    }

    pub fn entity(&self, entity_id: &str) -> Option<&EntityState> {
        self.mdu.entity(entity_id)
    }

    pub fn entities(&self) -> impl Iterator<Item = &EntityState> {
        self.mdu.entities()
    }

    /// Entity ids in ascending order.
    pub fn entity_ids(&self) -> Vec<String> {
        self.mdu.entity_ids()
    }

    /// Advance one entity. Emits `STATE_CHANGED`, plus `HARMONIC_RESONANCE_TRIGGER`
    /// when the new state is resonant.
    ///
    /// If the snapshot cannot be saved the entity is restored and no events are returned.
    pub fn update_entity_state(&mut self, entity_id: &str) -> Result<Vec<CueEvent>> {
        let before = self
            .mdu
            .entity(entity_id)
            .cloned()
            .ok_or_else(|| Error::EntityNotFound(entity_id.to_string()))?;
        match self.advance_entity(entity_id).and_then(|events| self.save().map(|()| events)) {
            Ok(events) => Ok(events),
            Err(e) => {
                warn!("Peer {}: update of {} rolled back: {}", self.short_id(), entity_id, e);
                self.mdu.restore_entity(before);
                Err(e)
            }
        }
    }

    fn advance_entity(&mut self, entity_id: &str) -> Result<Vec<CueEvent>> {
        self.apply_agent_bases(entity_id)?;
        let transition = self.mdu.update_entity_state(entity_id)?;
        let state = self
            .mdu
            .entity(entity_id)
            .ok_or_else(|| Error::EntityNotFound(entity_id.to_string()))?;
        let primary = state
            .primary()
            .ok_or_else(|| Error::validation(format!("entity {} lost its primary domain", entity_id)))?;

        let mut events = vec![CueEvent::new(
            EventType::StateChanged,
            EventLevel::Local,
            json!({
                "entityId": entity_id,
                "newState": { "L": state.current_l, "A": primary.a, "B": primary.b },
                "wrapped": transition.wrapped,
                "lTransition": transition.l_transition,
            }),
        )];

        if let Some(domains) = self.resonant_domains(state) {
            info!(
                "Peer {}: harmonic resonance on {} across {:?}",
                self.short_id(),
                entity_id,
                domains
            );
            events.push(CueEvent::new(
                EventType::HarmonicResonanceTrigger,
                EventLevel::Group,
                json!({
                    "entityId": entity_id,
                    "domains": domains,
                    "targetResidue": self.config.resonance.target_residue,
                    "L": state.current_l,
                }),
            ));
        }
        Ok(events)
    }

    /// Domains that just aligned, or `None` when the entity is not resonant.
    fn resonant_domains(&self, state: &EntityState) -> Option<Vec<String>> {
        let domains: Vec<String> = if self.config.resonance.domains.is_empty() {
            if state.multi_domain_state.len() < 2 {
                return None;
            }
            state.multi_domain_state.keys().cloned().collect()
        } else {
            self.config.resonance.domains.clone()
        };
        check_harmonic_resonance(&state.multi_domain_state, &domains, self.config.resonance.target_residue)
            .then_some(domains)
    }

    /// Push the hosted agent's active bases onto its own entity.
    fn apply_agent_bases(&mut self, entity_id: &str) -> Result<()> {
        let Some(agent) = self.agent.as_ref().filter(|a| a.id() == entity_id) else {
            return Ok(());
        };
        let Some(state) = self.mdu.entity(entity_id) else {
            return Ok(());
        };
        let changes: Vec<(String, u64)> = agent
            .mcs()
            .active_bases()
            .iter()
            .filter(|(ctx, b)| state.domain(ctx).is_some_and(|d| d.b != **b))
            .map(|(ctx, b)| (ctx.clone(), *b))
            .collect();
        for (ctx, b) in changes {
            debug!("Peer {}: {} domain {} now base {}", self.short_id(), entity_id, ctx, b);
            self.mdu.set_domain_base(entity_id, &ctx, b)?;
        }
        Ok(())
    }

    // ========================================================================
    // Agent
    // ========================================================================

    /// Host an agent and create its entity with the configured agent domains.
    pub fn host_agent(&mut self, agent_id: &str) -> Result<()> {
        if let Some(existing) = &self.agent {
            if existing.id() == agent_id {
                return Ok(());
            }
            return Err(Error::validation(format!(
                "peer {} already hosts agent {}",
                self.short_id(),
                existing.id()
            )));
        }
        self.mdu.initialize_entity(agent_id, &self.config.simulation.agent_domains)?;
        self.agent = Some(ClarionMduAgent::new(agent_id, Self::agent_config(&self.config, agent_id)));
        info!("Peer {} hosting agent {}", self.short_id(), agent_id);
        self.save()
    }

    pub fn agent(&self) -> Option<&ClarionMduAgent> {
        self.agent.as_ref()
    }

    pub fn agent_mut(&mut self) -> Option<&mut ClarionMduAgent> {
        self.agent.as_mut()
    }

    /// One decide-act-learn cycle of the hosted agent against a simulated outcome.
    ///
    /// If the snapshot cannot be saved the agent and the reward RNG are restored.
    pub fn run_agent_decision(&mut self) -> Result<Vec<CueEvent>> {
        let before = (self.agent.clone(), self.rng.clone());
        match self.decide_and_learn().and_then(|events| self.save().map(|()| events)) {
            Ok(events) => Ok(events),
            Err(e) => {
                warn!("Peer {}: agent decision rolled back: {}", self.short_id(), e);
                (self.agent, self.rng) = before;
                Err(e)
            }
        }
    }

    fn decide_and_learn(&mut self) -> Result<Vec<CueEvent>> {
        let agent = self
            .agent
            .as_mut()
            .ok_or_else(|| Error::NoAgent(self.credential_id.clone()))?;
        let agent_id = agent.id().to_string();
        let entity = self
            .mdu
            .entity(&agent_id)
            .ok_or_else(|| Error::EntityNotFound(agent_id.clone()))?;
        let primary = entity
            .primary()
            .ok_or_else(|| Error::validation(format!("entity {} lost its primary domain", agent_id)))?;

        let salience = self.rng.gen::<f64>() * 10.0;
        let state = WeightedMduState::new(entity.current_l, primary.a, primary.b, salience);
        let action = agent.decide_next_action(&state, &self.config.simulation.candidate_actions);

        let sim = &self.config.simulation;
        let reward = if self.rng.gen::<f64>() < sim.reward_probability {
            sim.positive_reward
        } else {
            sim.negative_reward
        };
        let next_a = (state.a + 1) % state.b;
        let next_l = if next_a == 0 { state.l + 1 } else { state.l };
        let next_state = WeightedMduState::new(next_l, next_a, state.b, salience + reward);

        // Base change first: a rejected base must not leave learning behind.
        let mut reconfigured = None;
        if action == RECONFIGURE_ACTION && !sim.base_cycle.is_empty() {
            let current = agent.mcs().active_base("default");
            let position = current.and_then(|b| sim.base_cycle.iter().position(|c| *c == b));
            let next_base = match position {
                Some(i) => sim.base_cycle[(i + 1) % sim.base_cycle.len()],
                None => sim.base_cycle[0],
            };
            agent.reconfigure_bases("default", next_base)?;
            reconfigured = Some(next_base);
        }
        let minted = agent.learn_from_experience(&state, &action, reward, &next_state);

        let mut events = vec![CueEvent::new(
            EventType::AgentAction,
            EventLevel::Local,
            json!({
                "agentId": agent_id,
                "action": action,
                "reward": reward,
                "state": serde_json::to_value(state)?,
                "reconfiguredBase": reconfigured,
            }),
        )];
        if let Some(rule) = minted {
            events.push(CueEvent::new(
                EventType::AgentLearnedRule,
                EventLevel::PeerToPeer,
                json!({ "agentId": agent_id, "rule": serde_json::to_value(rule)? }),
            ));
        }
        Ok(events)
    }

    // ========================================================================
    // Signing and trust
    // ========================================================================

    pub fn sign(&self, event: &CueEvent) -> Result<SignedEvent> {
        let signature = self.crypto.sign(&event.canonical_bytes()?, &self.private_key)?;
        Ok(SignedEvent {
            event: event.clone(),
            source_credential_id: self.credential_id.clone(),
            signature,
        })
    }

    /// Accept or reject an event from another peer. Trust decisions are never errors.
    pub fn process_incoming_event(&mut self, signed: &SignedEvent) -> bool {
        let Ok(bytes) = signed.event.canonical_bytes() else {
            warn!("Peer {} rejected unencodable {}", self.short_id(), signed.event.event_type);
            return false;
        };
        if !self.crypto.verify(&bytes, &signed.signature, &signed.source_credential_id) {
            warn!(
                "Peer {} rejected {} from {}: bad signature",
                self.short_id(),
                signed.event.event_type,
                signed.source_credential_id
            );
            return false;
        }
        if signed.event.event_type == EventType::RectificationProof
            && !self.honors_rectification(&signed.event, chrono::Utc::now().timestamp_millis())
        {
            return false;
        }
        debug!(
            "Peer {} accepted {} from {}",
            self.short_id(),
            signed.event.event_type,
            signed.source_credential_id
        );
        self.accepted_events += 1;
        true
    }

    /// A proof is honored when its hash covers its fields, it has not expired,
    /// and its issuer's signature over the hash checks out.
    pub fn honors_rectification(&self, event: &CueEvent, now_ms: i64) -> bool {
        let proof = match RectificationProof::from_event(event) {
            Ok(proof) => proof,
            Err(e) => {
                warn!("Peer {}: unreadable rectification proof: {}", self.short_id(), e);
                return false;
            }
        };
        if !proof.hash_matches() {
            warn!("Peer {}: rectification proof hash mismatch", self.short_id());
            return false;
        }
        if proof.is_expired(now_ms) {
            warn!(
                "Peer {}: rectification proof for {} expired at {}",
                self.short_id(),
                proof.rectified_event_id,
                proof.expiration_timestamp
            );
            return false;
        }
        self.crypto
            .verify(proof.proof_hash.as_bytes(), &proof.signature, &proof.signer_credential_id)
    }

    /// Claim that `rectifying` supersedes `rectified`. `ttl_ms` defaults to the
    /// configured proof lifetime.
    pub fn issue_rectification(
        &self,
        rectified: &CueEvent,
        rectifying: &CueEvent,
        ttl_ms: Option<i64>,
    ) -> Result<CueEvent> {
        let timestamp = chrono::Utc::now().timestamp_millis();
        let expiration_timestamp = timestamp + ttl_ms.unwrap_or(self.config.simulation.rectification_ttl_ms);
        let rectified_event_id = rectified.id()?;
        let rectifying_event_id = rectifying.id()?;
        let proof_hash =
            RectificationProof::compute_hash(&rectified_event_id, &rectifying_event_id, timestamp, expiration_timestamp);
        let signature = self.crypto.sign(proof_hash.as_bytes(), &self.private_key)?;

        let proof = RectificationProof {
            rectified_event_id,
            rectifying_event_id,
            proof_hash,
            timestamp,
            signer_credential_id: self.credential_id.clone(),
            signature,
            expiration_timestamp,
        };
        info!(
            "Peer {} issued rectification {} -> {}",
            self.short_id(),
            proof.rectified_event_id,
            proof.rectifying_event_id
        );
        proof.to_event()
    }

    /// Events from other peers accepted since this peer was opened.
    pub fn accepted_events(&self) -> usize {
        self.accepted_events
    }
}
