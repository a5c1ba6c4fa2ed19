//! Complex event processing over a bounded event history
//!
//! Rules are `(pattern, action)` pairs evaluated in registration order for
//! every incoming event. The history is a ring buffer; the oldest event is
//! evicted once capacity is reached. A failing action (error or panic) or a
//! panicking pattern is logged and recorded, and the remaining rules still run.

use cue_core::{CueEvent, Result};
use std::collections::VecDeque;
use std::panic::{self, AssertUnwindSafe};
use tracing::{debug, warn};

pub const DEFAULT_HISTORY_CAPACITY: usize = 100;

/// Predicate over the incoming event and the history (which already contains it).
pub type Pattern = Box<dyn Fn(&CueEvent, &VecDeque<CueEvent>) -> bool>;

/// Callback run on a match. Returned events are derived events for the caller to record.
pub type Action = Box<dyn FnMut(&CueEvent, &VecDeque<CueEvent>) -> Result<Vec<CueEvent>>>;

pub struct CepRule {
    pub id: String,
    pattern: Pattern,
    action: Action,
}

impl CepRule {
    pub fn new(
        id: impl Into<String>,
        pattern: impl Fn(&CueEvent, &VecDeque<CueEvent>) -> bool + 'static,
        action: impl FnMut(&CueEvent, &VecDeque<CueEvent>) -> Result<Vec<CueEvent>> + 'static,
    ) -> Self {
        Self {
            id: id.into(),
            pattern: Box::new(pattern),
            action: Box::new(action),
        }
    }
}

impl std::fmt::Debug for CepRule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CepRule").field("id", &self.id).finish_non_exhaustive()
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RuleFailure {
    pub rule_id: String,
    pub message: String,
}

/// Outcome of processing one event.
#[derive(Clone, Debug, Default)]
pub struct CepReport {
    /// Rules whose pattern matched, in evaluation order.
    pub matched: Vec<String>,
    pub failed: Vec<RuleFailure>,
    pub emitted: Vec<CueEvent>,
}

#[derive(Debug)]
pub struct CepEngine {
    rules: Vec<CepRule>,
    history: VecDeque<CueEvent>,
    capacity: usize,
}

impl Default for CepEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl CepEngine {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_HISTORY_CAPACITY)
    }

    /// A capacity of zero is raised to one.
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            rules: Vec::new(),
            history: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Add a rule, or replace the rule with the same id in place.
    pub fn register_rule(&mut self, rule: CepRule) {
        match self.rules.iter_mut().find(|r| r.id == rule.id) {
            Some(existing) => {
                debug!("CEP rule {} replaced", rule.id);
                *existing = rule;
            }
            None => {
                debug!("CEP rule {} registered", rule.id);
                self.rules.push(rule);
            }
        }
    }

    pub fn remove_rule(&mut self, id: &str) -> bool {
        let before = self.rules.len();
        self.rules.retain(|r| r.id != id);
        self.rules.len() != before
    }

    pub fn rule_ids(&self) -> Vec<&str> {
        self.rules.iter().map(|r| r.id.as_str()).collect()
    }

    pub fn process_event(&mut self, event: CueEvent) -> CepReport {
        if self.history.len() == self.capacity {
            self.history.pop_front();
        }
        self.history.push_back(event);

        let Self { rules, history, .. } = self;
        let history = &*history;
        let mut report = CepReport::default();
        let Some(current) = history.back() else {
            return report;
        };

        for rule in rules.iter_mut() {
            match panic::catch_unwind(AssertUnwindSafe(|| (rule.pattern)(current, history))) {
                Ok(true) => {}
                Ok(false) => continue,
                Err(payload) => {
                    let message = panic_message(payload.as_ref());
                    warn!("CEP rule {} pattern panicked: {}", rule.id, message);
                    report.failed.push(RuleFailure { rule_id: rule.id.clone(), message });
                    continue;
                }
            }
            report.matched.push(rule.id.clone());

            let outcome = panic::catch_unwind(AssertUnwindSafe(|| (rule.action)(current, history)));
            match outcome {
                Ok(Ok(derived)) => report.emitted.extend(derived),
                Ok(Err(e)) => {
                    warn!("CEP rule {} failed: {}", rule.id, e);
                    report.failed.push(RuleFailure { rule_id: rule.id.clone(), message: e.to_string() });
                }
                Err(payload) => {
                    let message = panic_message(payload.as_ref());
                    warn!("CEP rule {} panicked: {}", rule.id, message);
                    report.failed.push(RuleFailure { rule_id: rule.id.clone(), message });
                }
            }
        }
        report
    }

    /// Buffered events, oldest first.
    pub fn get_event_history(&self) -> Vec<CueEvent> {
        self.history.iter().cloned().collect()
    }

    pub fn history_len(&self) -> usize {
        self.history.len()
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "panic".to_string()
    }
}
