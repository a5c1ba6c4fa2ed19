//! CUE Substrate - the deterministic building blocks peers are made of
//!
//! - `mdu`: multi-domain modular state with path-dependent history
//! - `crt`: Chinese Remainder Theorem solving and alignment checks
//! - `ctl`: Fano-plane quorum selection ("Continuous Transylvanian Lottery")
//! - `cep`: rule-driven complex event processing over a bounded history

pub mod cep;
pub mod crt;
pub mod ctl;
pub mod mdu;

pub use cep::{CepEngine, CepReport, CepRule, RuleFailure};
pub use ctl::{CtlConsensus, Quorum, FANO_LINES, VALIDATOR_COUNT};
pub use mdu::{unfold, MduStateMachine, MduTransition};
