//! CUE Network - signing peers and the deterministic simulation network
//!
//! Peers own their entities, an optional hosted agent, and a signing
//! credential. The network owns the peers, the append-only event log, the
//! network-level CEP engine and CTL consensus, and the tick driver.
//! Persistence and cryptography are injected collaborators.

pub mod crypto;
pub mod network;
pub mod peer;
pub mod store;

pub use crypto::{CryptoProvider, Ed25519Crypto, KeyPair};
pub use network::{CueNetwork, StepReport};
pub use peer::CuePeer;
pub use store::{LocalFsStore, MemoryStore, SnapshotStore};
