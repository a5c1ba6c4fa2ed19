//! Protocol payloads shared by peers and the network.
//!
//! Most payloads are free-form JSON. `RECTIFICATION_PROOF` has a fixed shape
//! because peers must be able to check it without trusting the sender.

use crate::types::{CueEvent, EventLevel, EventType};
use crate::{Error, Result};
use ring::digest;
use serde::{Deserialize, Serialize};

/// Lowercase hex SHA-256 of `bytes`.
pub fn sha256_hex(bytes: &[u8]) -> String {
    let hash = digest::digest(&digest::SHA256, bytes);
    hash.as_ref().iter().map(|b| format!("{:02x}", b)).collect()
}

/// A signed claim that one event supersedes another.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RectificationProof {
    pub rectified_event_id: String,
    pub rectifying_event_id: String,
    pub proof_hash: String,
    pub timestamp: i64,
    pub signer_credential_id: String,
    pub signature: String,
    pub expiration_timestamp: i64,
}

impl RectificationProof {
    /// Hash binding the two event ids and the validity window.
    pub fn compute_hash(
        rectified_event_id: &str,
        rectifying_event_id: &str,
        timestamp: i64,
        expiration_timestamp: i64,
    ) -> String {
        let material = format!(
            "{}:{}:{}:{}",
            rectified_event_id, rectifying_event_id, timestamp, expiration_timestamp
        );
        sha256_hex(material.as_bytes())
    }

    /// True when the stored hash matches the fields it claims to cover.
    pub fn hash_matches(&self) -> bool {
        self.proof_hash
            == Self::compute_hash(
                &self.rectified_event_id,
                &self.rectifying_event_id,
                self.timestamp,
                self.expiration_timestamp,
            )
    }

    /// A proof past its expiration is not honorable.
    pub fn is_expired(&self, now_ms: i64) -> bool {
        now_ms >= self.expiration_timestamp
    }

    pub fn to_event(&self) -> Result<CueEvent> {
        let payload = serde_json::to_value(self)?;
        Ok(CueEvent::new(EventType::RectificationProof, EventLevel::Global, payload)
            .with_timestamp(self.timestamp))
    }

    pub fn from_event(event: &CueEvent) -> Result<Self> {
        if event.event_type != EventType::RectificationProof {
            return Err(Error::validation(format!(
                "expected RECTIFICATION_PROOF, got {}",
                event.event_type
            )));
        }
        Ok(serde_json::from_value(event.payload.clone())?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn proof(expiration: i64) -> RectificationProof {
        let proof_hash = RectificationProof::compute_hash("old", "new", 1_000, expiration);
        RectificationProof {
            rectified_event_id: "old".into(),
            rectifying_event_id: "new".into(),
            proof_hash,
            timestamp: 1_000,
            signer_credential_id: "signer".into(),
            signature: "sig".into(),
            expiration_timestamp: expiration,
        }
    }

    #[test]
    fn sha256_hex_known_vector() {
        assert_eq!(
            sha256_hex(b"abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn expiry_is_inclusive() {
        let p = proof(2_000);
        assert!(!p.is_expired(1_999));
        assert!(p.is_expired(2_000));
    }

    #[test]
    fn tampered_window_breaks_hash() {
        let mut p = proof(2_000);
        assert!(p.hash_matches());
        p.expiration_timestamp = 9_999;
        assert!(!p.hash_matches());
    }

    #[test]
    fn payload_uses_camel_case() {
        let event = proof(2_000).to_event().unwrap();
        assert_eq!(event.event_type, EventType::RectificationProof);
        assert!(event.payload.get("rectifiedEventId").is_some());
        assert!(event.payload.get("expirationTimestamp").is_some());
        let back = RectificationProof::from_event(&event).unwrap();
        assert_eq!(back, proof(2_000));
    }

    #[test]
    fn from_event_rejects_other_types() {
        let event = CueEvent::new(EventType::StateChanged, EventLevel::Local, serde_json::json!({}));
        assert!(RectificationProof::from_event(&event).unwrap_err().is_validation());
    }
}
