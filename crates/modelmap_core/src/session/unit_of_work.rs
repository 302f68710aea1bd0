//! Pending changes of a transaction.

use crate::engine::WriteOp;
use crate::entity::{EntityKey, EntityRef};
use crate::error::CoreResult;
use std::collections::HashMap;

/// Insertion-ordered set of entities, keyed by [`EntityKey`].
///
/// Re-inserting an entity replaces its snapshot but keeps its position,
/// so iteration order is the order entities were first tracked.
#[derive(Debug, Default, Clone)]
pub struct TrackedSet {
    entries: Vec<EntityRef>,
    positions: HashMap<EntityKey, usize>,
}

impl TrackedSet {
    /// Creates an empty set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces an entity. Returns true if it was not tracked yet.
    pub fn insert(&mut self, entity: EntityRef) -> bool {
        let key = entity.key();
        if let Some(&pos) = self.positions.get(&key) {
            self.entries[pos] = entity;
            false
        } else {
            self.positions.insert(key, self.entries.len());
            self.entries.push(entity);
            true
        }
    }

    /// Removes an entity by key.
    pub fn remove(&mut self, key: &EntityKey) -> Option<EntityRef> {
        let pos = self.positions.remove(key)?;
        let removed = self.entries.remove(pos);
        for entity in &self.entries[pos..] {
            if let Some(p) = self.positions.get_mut(&entity.key()) {
                *p -= 1;
            }
        }
        Some(removed)
    }

    /// Returns the tracked snapshot of an entity.
    #[must_use]
    pub fn get(&self, key: &EntityKey) -> Option<&EntityRef> {
        self.positions.get(key).map(|&pos| &self.entries[pos])
    }

    /// Checks whether an entity is tracked.
    #[must_use]
    pub fn contains(&self, key: &EntityKey) -> bool {
        self.positions.contains_key(key)
    }

    /// Number of tracked entities.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the set is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterates in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &EntityRef> {
        self.entries.iter()
    }

    /// Copies the tracked handles, in insertion order.
    #[must_use]
    pub fn to_vec(&self) -> Vec<EntityRef> {
        self.entries.clone()
    }
}

/// New, modified and deleted entities awaiting the next flush.
#[derive(Debug, Default, Clone)]
pub(crate) struct UnitOfWork {
    pub(crate) new: TrackedSet,
    pub(crate) dirty: TrackedSet,
    pub(crate) deleted: TrackedSet,
}

impl UnitOfWork {
    /// Tracks an entity that has never been written.
    ///
    /// Re-adding a deleted entity turns the delete into an update.
    pub(crate) fn add_new(&mut self, entity: EntityRef) {
        let key = entity.key();
        if self.deleted.remove(&key).is_some() || self.dirty.contains(&key) {
            self.dirty.insert(entity);
        } else {
            self.new.insert(entity);
        }
    }

    /// Tracks a modification. Returns false if the entity is being deleted.
    pub(crate) fn mark_dirty(&mut self, entity: EntityRef) -> bool {
        let key = entity.key();
        if self.deleted.contains(&key) {
            return false;
        }
        if self.new.contains(&key) {
            self.new.insert(entity);
        } else {
            self.dirty.insert(entity);
        }
        true
    }

    /// Tracks a deletion.
    ///
    /// Deleting an entity that is only pending insertion cancels the insert.
    pub(crate) fn delete(&mut self, entity: EntityRef) {
        let key = entity.key();
        if self.new.remove(&key).is_some() {
            return;
        }
        self.dirty.remove(&key);
        self.deleted.insert(entity);
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.new.is_empty() && self.dirty.is_empty() && self.deleted.is_empty()
    }

    /// Encodes the pending changes into writes: inserts, then updates,
    /// then deletes.
    pub(crate) fn to_writes(&self) -> CoreResult<Vec<WriteOp>> {
        let mut ops = Vec::with_capacity(self.new.len() + self.dirty.len() + self.deleted.len());
        for entity in self.new.iter().chain(self.dirty.iter()) {
            ops.push(WriteOp::Put {
                key: entity.key(),
                payload: entity.encode()?,
            });
        }
        for entity in self.deleted.iter() {
            ops.push(WriteOp::Delete { key: entity.key() });
        }
        Ok(ops)
    }
}
