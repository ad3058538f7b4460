//! Insertion-ordered arena keyed by string id.
//!
//! Removal leaves a tombstone so slot order keeps matching insertion
//! order; tombstones are compacted away once they outnumber live entries.

use std::collections::HashMap;

use tracing::debug;

use crate::error::{StateError, StateResult};

/// Values stored in an arena expose their id.
pub trait Keyed {
    fn key(&self) -> &str;
}

impl Keyed for swarm_core::Node {
    fn key(&self) -> &str {
        &self.id
    }
}

impl Keyed for swarm_core::Task {
    fn key(&self) -> &str {
        &self.id
    }
}

const COMPACT_MIN_TOMBSTONES: usize = 32;

#[derive(Debug, Clone)]
pub struct Arena<T> {
    slots: Vec<Option<T>>,
    index: HashMap<String, usize>,
}

impl<T> Default for Arena<T> {
    fn default() -> Self {
        Self {
            slots: Vec::new(),
            index: HashMap::new(),
        }
    }
}

impl<T: Keyed> Arena<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a new value. Fails if the id is already present.
    pub fn insert(&mut self, value: T) -> StateResult<()> {
        let key = value.key().to_string();
        if self.index.contains_key(&key) {
            return Err(StateError::Duplicate(key));
        }
        self.index.insert(key, self.slots.len());
        self.slots.push(Some(value));
        Ok(())
    }

    pub fn get(&self, id: &str) -> Option<&T> {
        let slot = *self.index.get(id)?;
        self.slots.get(slot)?.as_ref()
    }

    pub fn get_mut(&mut self, id: &str) -> Option<&mut T> {
        let slot = *self.index.get(id)?;
        self.slots.get_mut(slot)?.as_mut()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    pub fn remove(&mut self, id: &str) -> Option<T> {
        let slot = self.index.remove(id)?;
        let value = self.slots.get_mut(slot)?.take();
        self.maybe_compact();
        value
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Insertion rank of an id; lower means inserted earlier.
    pub fn rank(&self, id: &str) -> Option<usize> {
        self.index.get(id).copied()
    }

    /// Live values in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.slots.iter().filter_map(Option::as_ref)
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut T> {
        self.slots.iter_mut().filter_map(Option::as_mut)
    }

    /// Ids in insertion order.
    pub fn ids(&self) -> Vec<String> {
        self.iter().map(|v| v.key().to_string()).collect()
    }

    fn maybe_compact(&mut self) {
        let tombstones = self.slots.len() - self.index.len();
        if tombstones < COMPACT_MIN_TOMBSTONES || tombstones <= self.index.len() {
            return;
        }
        self.slots.retain(Option::is_some);
        self.index.clear();
        for (slot, value) in self.slots.iter().enumerate() {
            if let Some(v) = value {
                self.index.insert(v.key().to_string(), slot);
            }
        }
        debug!(tombstones, live = self.index.len(), "arena compacted");
    }
}
