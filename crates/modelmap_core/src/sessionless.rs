//! Object collector for code paths that run without a database.

use crate::entity::{EntityKey, EntityRef};
use crate::session::TrackedSet;
use crate::transaction::TransactionalResource;
use crate::Session;
use parking_lot::Mutex;

/// Stand-in for a session when entities are assembled in memory only,
/// for example while importing a model store before it is persisted.
///
/// It collects objects but has no transactions, so the transaction guard
/// runs its body untouched.
#[derive(Debug, Default)]
pub struct SessionlessContext {
    objects: Mutex<TrackedSet>,
}

impl SessionlessContext {
    /// Creates an empty context.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Collects an object, replacing an earlier snapshot with the same key.
    pub fn add(&self, entity: EntityRef) {
        self.objects.lock().insert(entity);
    }

    /// Forgets an object.
    pub fn delete(&self, entity: &EntityRef) {
        self.objects.lock().remove(&entity.key());
    }

    /// Looks up a collected object.
    #[must_use]
    pub fn get(&self, key: &EntityKey) -> Option<EntityRef> {
        self.objects.lock().get(key).cloned()
    }

    /// Collected objects, in the order they were first added.
    #[must_use]
    pub fn objects(&self) -> Vec<EntityRef> {
        self.objects.lock().to_vec()
    }

    /// Number of collected objects.
    #[must_use]
    pub fn len(&self) -> usize {
        self.objects.lock().len()
    }

    /// Whether nothing has been collected.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.objects.lock().is_empty()
    }

    /// There is nothing to write; flushing is a no-op.
    pub fn flush(&self) {}
}

impl TransactionalResource for SessionlessContext {
    fn transactional_session(&self) -> Option<Session> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::{Entity, EntityId};
    use crate::error::CoreResult;
    use std::sync::Arc;

    #[derive(Debug)]
    struct Tag(EntityId, &'static str);

    impl Entity for Tag {
        fn kind(&self) -> &'static str {
            "Tag"
        }

        fn id(&self) -> EntityId {
            self.0
        }

        fn encode(&self) -> CoreResult<Vec<u8>> {
            Ok(self.1.as_bytes().to_vec())
        }
    }

    #[test]
    fn collects_and_forgets_objects() {
        let ctx = SessionlessContext::new();
        let tag: EntityRef = Arc::new(Tag(EntityId::new(), "a"));
        ctx.add(Arc::clone(&tag));
        ctx.flush();

        assert_eq!(ctx.len(), 1);
        assert!(ctx.get(&tag.key()).is_some());

        ctx.delete(&tag);
        assert!(ctx.is_empty());
        assert!(ctx.get(&tag.key()).is_none());
    }

    #[test]
    fn is_not_a_transactional_session() {
        assert!(SessionlessContext::new().transactional_session().is_none());
    }
}
