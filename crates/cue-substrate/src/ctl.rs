//! CtlConsensus — the "Continuous Transylvanian Lottery"
//!
//! Seven validators are placed on the points of the Fano plane. A seed picks
//! one of the seven lines and the three validators on it form the quorum.
//! Every pair of validators shares exactly one line, so over the seven
//! possible quorums every pair co-serves exactly once.

use cue_core::{Error, Result};
use ring::digest;
use serde::Serialize;
use std::collections::HashSet;
use tracing::debug;

pub const VALIDATOR_COUNT: usize = 7;

/// The seven lines of the Fano plane over points 0..7.
pub const FANO_LINES: [[usize; 3]; 7] = [
    [0, 1, 2],
    [0, 3, 4],
    [0, 5, 6],
    [1, 3, 5],
    [1, 4, 6],
    [2, 3, 6],
    [2, 4, 5],
];

/// The validators activated for one round.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Quorum {
    pub line: usize,
    pub validators: [String; 3],
}

impl Quorum {
    pub fn contains(&self, validator: &str) -> bool {
        self.validators.iter().any(|v| v == validator)
    }
}

#[derive(Clone, Debug)]
pub struct CtlConsensus {
    validators: Vec<String>,
}

impl CtlConsensus {
    /// Requires exactly seven distinct validator ids.
    pub fn new(validator_ids: Vec<String>) -> Result<Self> {
        if validator_ids.len() != VALIDATOR_COUNT {
            return Err(Error::validation(format!(
                "CTL requires exactly {} validators, got {}",
                VALIDATOR_COUNT,
                validator_ids.len()
            )));
        }
        let distinct: HashSet<&String> = validator_ids.iter().collect();
        if distinct.len() != VALIDATOR_COUNT {
            return Err(Error::validation("CTL validator ids must be distinct"));
        }
        Ok(Self { validators: validator_ids })
    }

    pub fn validators(&self) -> &[String] {
        &self.validators
    }

    /// Line selected by `seed`: first eight bytes of SHA-256(seed), big-endian, mod 7.
    pub fn line_index(seed: &str) -> usize {
        let hash = digest::digest(&digest::SHA256, seed.as_bytes());
        let mut prefix = [0u8; 8];
        prefix.copy_from_slice(&hash.as_ref()[..8]);
        (u64::from_be_bytes(prefix) % FANO_LINES.len() as u64) as usize
    }

    /// Same seed, same quorum.
    pub fn get_activated_quorum(&self, seed: &str) -> Quorum {
        let line = Self::line_index(seed);
        debug!("CTL seed {:?} selected line {}", seed, line);
        self.quorum_for_line(line)
    }

    fn quorum_for_line(&self, line: usize) -> Quorum {
        let [p0, p1, p2] = FANO_LINES[line];
        Quorum {
            line,
            validators: [
                self.validators[p0].clone(),
                self.validators[p1].clone(),
                self.validators[p2].clone(),
            ],
        }
    }

    /// Every quorum the validator can be drawn into (three for a member, none otherwise).
    pub fn quorums_containing(&self, validator: &str) -> Vec<Quorum> {
        let Some(point) = self.validators.iter().position(|v| v == validator) else {
            return Vec::new();
        };
        FANO_LINES
            .iter()
            .enumerate()
            .filter(|(_, line)| line.contains(&point))
            .map(|(i, _)| self.quorum_for_line(i))
            .collect()
    }
}
