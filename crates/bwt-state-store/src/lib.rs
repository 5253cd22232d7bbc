//! Published sensor state storage
//!
//! The state store is the observable surface of the bridge: every extractor
//! republishes into it on each snapshot cycle. It tracks the current
//! [`State`] per entity with last_changed preserved when the value did not
//! change.

use std::collections::HashMap;
use std::sync::Arc;

use dashmap::DashMap;
use tracing::{debug, trace};

use bwt_core::State;

/// Stores the current state of all published entities
#[derive(Default)]
pub struct StateStore {
    /// All entity states keyed by entity_id string
    states: DashMap<String, State>,
}

impl StateStore {
    /// Create a new empty state store
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the state of an entity.
    ///
    /// If the entity already has a state, `last_changed` is only updated
    /// when the value actually changed.
    pub fn set(
        &self,
        entity_id: &str,
        value: impl Into<String>,
        attributes: HashMap<String, serde_json::Value>,
    ) -> State {
        let value = value.into();

        let new_state = match self.states.get(entity_id) {
            Some(existing) => existing.with_update(value, attributes),
            None => State::new(entity_id, value, attributes),
        };

        trace!(entity_id, state = %new_state.state, "setting entity state");
        self.states.insert(entity_id.to_string(), new_state.clone());
        new_state
    }

    /// Get the current state of an entity
    pub fn get(&self, entity_id: &str) -> Option<State> {
        self.states.get(entity_id).map(|s| s.clone())
    }

    /// Get the state value as a string, or None if entity doesn't exist
    pub fn get_value(&self, entity_id: &str) -> Option<String> {
        self.states.get(entity_id).map(|s| s.state.clone())
    }

    /// Check if an entity is in a specific state
    pub fn is_state(&self, entity_id: &str, value: &str) -> bool {
        self.get_value(entity_id).as_deref() == Some(value)
    }

    /// Remove an entity's state
    pub fn remove(&self, entity_id: &str) -> Option<State> {
        let removed = self.states.remove(entity_id).map(|(_, s)| s);
        if removed.is_some() {
            debug!(entity_id, "removed entity state");
        }
        removed
    }

    /// Get all states
    pub fn all(&self) -> Vec<State> {
        self.states.iter().map(|r| r.value().clone()).collect()
    }

    /// Get the total number of entities
    pub fn len(&self) -> usize {
        self.states.len()
    }

    /// Check if the store is empty
    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }
}

/// Thread-safe wrapper for StateStore
pub type SharedStateStore = Arc<StateStore>;
