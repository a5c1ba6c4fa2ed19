//! CUE Agent - CLARION-style cognition over MDU coordinates
//!
//! Bottom level: Q-value estimates per `(state, action)` learned from reward.
//! Top level: explicit `IF (L, A) THEN action` rules promoted from well-supported
//! estimates. Explicit knowledge overrides implicit knowledge when deciding.
//! A meta-cognitive layer owns the bases the agent operates under.

pub mod agent;
pub mod implicit;
pub mod metacog;

pub use agent::{ClarionMduAgent, NOOP_ACTION};
pub use implicit::ImplicitStore;
pub use metacog::MetaCognitiveState;
