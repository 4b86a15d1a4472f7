//! Session data model: mutable state map plus an append-only event log.
//!
//! The state map holds `current_phase` and task-scoped facts (the chosen book,
//! the reading pace, ...). It is best-effort durable only; the event log is the
//! source of truth the recovery scanner falls back on.

mod event;

pub use event::{Event, EventKind, USER_AUTHOR};

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::phase::Phase;

/// State key holding the current workflow phase.
pub const CURRENT_PHASE_KEY: &str = "current_phase";

/// Mutable key/value state of one session.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionState {
    values: Map<String, Value>,
}

impl SessionState {
    pub fn new() -> Self {
        Self::default()
    }

    /// State for a brand-new session.
    pub fn starting_at(phase: Phase) -> Self {
        let mut state = Self::new();
        state.set_current_phase(phase);
        state
    }

    /// The stored phase, if present and valid.
    pub fn current_phase(&self) -> Option<Phase> {
        self.values
            .get(CURRENT_PHASE_KEY)
            .and_then(Value::as_str)
            .and_then(|s| s.parse().ok())
    }

    pub fn set_current_phase(&mut self, phase: Phase) {
        self.values.insert(
            CURRENT_PHASE_KEY.to_string(),
            Value::String(phase.as_str().to_string()),
        );
    }

    pub fn clear_current_phase(&mut self) {
        self.values.remove(CURRENT_PHASE_KEY);
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    /// Deserialize a fact into a typed value; missing or malformed facts read as None.
    pub fn get_as<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.values
            .get(key)
            .and_then(|v| serde_json::from_value(v.clone()).ok())
    }

    pub fn set(&mut self, key: &str, value: Value) {
        self.values.insert(key.to_string(), value);
    }

    pub fn set_as<T: Serialize>(&mut self, key: &str, value: &T) -> Result<(), serde_json::Error> {
        let value = serde_json::to_value(value)?;
        self.values.insert(key.to_string(), value);
        Ok(())
    }

    pub fn flag(&self, key: &str) -> bool {
        self.values.get(key).and_then(Value::as_bool).unwrap_or(false)
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.values.remove(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.values.keys()
    }
}

/// Listing entry for a stored session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSummary {
    pub id: String,
    pub created_at: DateTime<Utc>,
    pub event_count: u64,
    pub current_phase: Option<Phase>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_new_state_has_no_phase() {
        let state = SessionState::new();
        assert!(state.current_phase().is_none());
        assert!(state.is_empty());
    }

    #[test]
    fn test_starting_at_sets_phase() {
        let state = SessionState::starting_at(Phase::Discovery);
        assert_eq!(state.current_phase(), Some(Phase::Discovery));
        assert_eq!(state.get(CURRENT_PHASE_KEY), Some(&json!("discovery")));
    }

    #[test]
    fn test_invalid_phase_value_reads_as_absent() {
        let mut state = SessionState::new();
        state.set(CURRENT_PHASE_KEY, json!("reading"));
        assert!(state.current_phase().is_none());
        state.set(CURRENT_PHASE_KEY, json!(3));
        assert!(state.current_phase().is_none());
    }

    #[test]
    fn test_clear_current_phase_keeps_facts() {
        let mut state = SessionState::starting_at(Phase::Engagement);
        state.set("book_discovery_completed", json!(true));
        state.clear_current_phase();
        assert!(state.current_phase().is_none());
        assert!(state.flag("book_discovery_completed"));
    }

    #[test]
    fn test_typed_facts() {
        #[derive(Debug, PartialEq, Serialize, Deserialize)]
        struct Pace {
            minutes: u32,
        }

        let mut state = SessionState::new();
        state.set_as("pace", &Pace { minutes: 30 }).unwrap();
        assert_eq!(state.get_as::<Pace>("pace"), Some(Pace { minutes: 30 }));
        assert_eq!(state.get_as::<Pace>("missing"), None);
    }

    #[test]
    fn test_state_serializes_as_plain_map() {
        let mut state = SessionState::starting_at(Phase::Scheduling);
        state.set("minutes", json!(20));
        let value = serde_json::to_value(&state).unwrap();
        assert_eq!(value, json!({"current_phase": "scheduling", "minutes": 20}));
    }
}
