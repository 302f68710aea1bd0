//! The session handle.

use crate::engine::{Engine, WriteOp};
use crate::entity::{EntityKey, EntityRef};
use crate::error::{CoreError, CoreResult};
use crate::session::hook::{FlushContext, FlushHook};
use crate::session::unit_of_work::UnitOfWork;
use crate::types::{SequenceNumber, SessionId};
use parking_lot::Mutex;
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn};

/// A unit of work bound to an [`Engine`].
///
/// `Session` is a cheap handle: clones refer to the same session, and
/// [`Session::ptr_eq`] tells whether two handles are the same session.
/// The session is meant to be driven by one owner at a time; the internal
/// lock only keeps its state consistent, it does not order callers.
///
/// ## Lifecycle
///
/// ```rust,ignore
/// session.begin()?;
/// session.add(entity)?;
/// session.flush()?;   // optional, runs the flush hook early
/// session.commit()?;  // flushes the rest and applies the batch
/// session.close();
/// ```
#[derive(Clone)]
pub struct Session {
    inner: Arc<SessionInner>,
}

struct SessionInner {
    id: SessionId,
    engine: Arc<Engine>,
    hook: Option<Arc<dyn FlushHook>>,
    state: Mutex<SessionState>,
}

#[derive(Default)]
struct SessionState {
    closed: bool,
    txn: Option<ActiveTransaction>,
}

#[derive(Default)]
struct ActiveTransaction {
    /// Changes since the last flush.
    pending: UnitOfWork,
    /// Writes produced by earlier flushes, applied on commit.
    staged: Vec<WriteOp>,
    /// Keys written by earlier flushes of this transaction.
    staged_keys: HashSet<EntityKey>,
    /// Set while the flush hook runs.
    flushing: bool,
}

impl Session {
    pub(crate) fn new(engine: Arc<Engine>, hook: Option<Arc<dyn FlushHook>>) -> Self {
        let id = SessionId::new();
        debug!(session = %id, "session created");
        Self {
            inner: Arc::new(SessionInner {
                id,
                engine,
                hook,
                state: Mutex::new(SessionState::default()),
            }),
        }
    }

    /// Returns the session ID.
    #[must_use]
    pub fn id(&self) -> SessionId {
        self.inner.id
    }

    /// Returns true if both handles refer to the same session.
    #[must_use]
    pub fn ptr_eq(&self, other: &Session) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// The engine this session is bound to.
    #[must_use]
    pub fn engine(&self) -> &Arc<Engine> {
        &self.inner.engine
    }

    /// Whether the session has been closed.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.inner.state.lock().closed
    }

    /// Whether a transaction is active.
    #[must_use]
    pub fn in_transaction(&self) -> bool {
        self.inner.state.lock().txn.is_some()
    }

    /// Begins a transaction.
    ///
    /// # Errors
    ///
    /// Fails if the session is closed or a transaction is already active.
    pub fn begin(&self) -> CoreResult<()> {
        let mut state = self.inner.state.lock();
        if state.closed {
            return Err(self.closed_error());
        }
        if state.txn.is_some() {
            return Err(CoreError::invalid_operation("transaction already begun"));
        }
        state.txn = Some(ActiveTransaction::default());
        debug!(session = %self.inner.id, "transaction begun");
        Ok(())
    }

    /// Tracks an entity.
    ///
    /// Entities already committed, or written by an earlier flush of this
    /// transaction, are tracked as modified; anything else as new.
    ///
    /// # Errors
    ///
    /// Fails if no transaction is active.
    pub fn add(&self, entity: EntityRef) -> CoreResult<()> {
        let key = entity.key();
        let committed = self.inner.engine.contains(&key);
        self.with_transaction_state(|txn| {
            if committed || txn.staged_keys.contains(&key) {
                txn.pending.mark_dirty(entity);
            } else {
                txn.pending.add_new(entity);
            }
        })
    }

    /// Tracks a modification of an entity.
    ///
    /// Ignored when the entity is already pending deletion.
    ///
    /// # Errors
    ///
    /// Fails if no transaction is active.
    pub fn mark_dirty(&self, entity: EntityRef) -> CoreResult<()> {
        self.with_transaction_state(|txn| {
            txn.pending.mark_dirty(entity);
        })
    }

    /// Tracks a deletion.
    ///
    /// # Errors
    ///
    /// Fails if no transaction is active.
    pub fn delete(&self, entity: EntityRef) -> CoreResult<()> {
        self.with_transaction_state(|txn| txn.pending.delete(entity))
    }

    /// Entities pending insertion, in tracking order.
    #[must_use]
    pub fn new_entities(&self) -> Vec<EntityRef> {
        self.pending_snapshot(|uow| uow.new.to_vec())
    }

    /// Entities pending update, in tracking order.
    #[must_use]
    pub fn dirty(&self) -> Vec<EntityRef> {
        self.pending_snapshot(|uow| uow.dirty.to_vec())
    }

    /// Entities pending deletion, in tracking order.
    #[must_use]
    pub fn deleted(&self) -> Vec<EntityRef> {
        self.pending_snapshot(|uow| uow.deleted.to_vec())
    }

    /// Number of writes staged by earlier flushes of the transaction.
    #[must_use]
    pub fn staged_count(&self) -> usize {
        self.inner
            .state
            .lock()
            .txn
            .as_ref()
            .map_or(0, |txn| txn.staged.len())
    }

    /// Runs the flush hook over pending changes and stages them.
    ///
    /// Each flush sees only the entities changed since the previous flush;
    /// with nothing pending the hook does not run. On error nothing is
    /// staged, the changes stay pending, and anything the hook tracked
    /// during the failed flush is dropped.
    ///
    /// # Errors
    ///
    /// Fails if no transaction is active, if a flush is already running on
    /// this session, or with whatever the hook or entity encoding returns.
    pub fn flush(&self) -> CoreResult<()> {
        let (before, dirty, deleted) = {
            let mut state = self.inner.state.lock();
            let txn = Self::active(&mut state, self.inner.id)?;
            if txn.flushing {
                return Err(CoreError::invalid_operation("flush already in progress"));
            }
            if txn.pending.is_empty() {
                return Ok(());
            }
            txn.flushing = true;
            (
                txn.pending.clone(),
                txn.pending.dirty.to_vec(),
                txn.pending.deleted.to_vec(),
            )
        };

        let hooked = match &self.inner.hook {
            Some(hook) => hook.before_flush(
                self,
                &FlushContext {
                    dirty: &dirty,
                    deleted: &deleted,
                },
            ),
            None => Ok(()),
        };

        let mut state = self.inner.state.lock();
        let txn = state
            .txn
            .as_mut()
            .ok_or_else(|| CoreError::invalid_operation("transaction ended during flush"))?;
        txn.flushing = false;
        let writes = match hooked.and_then(|()| txn.pending.to_writes()) {
            Ok(writes) => writes,
            Err(err) => {
                // Version records from a failed flush must not be written twice.
                txn.pending = before;
                return Err(err);
            }
        };
        txn.pending = UnitOfWork::default();
        for op in &writes {
            if let WriteOp::Put { key, .. } = op {
                txn.staged_keys.insert(key.clone());
            }
        }
        debug!(
            session = %self.inner.id,
            writes = writes.len(),
            dirty = dirty.len(),
            deleted = deleted.len(),
            "flushed"
        );
        txn.staged.extend(writes);
        Ok(())
    }

    /// Flushes and commits the transaction.
    ///
    /// If the flush or the engine write fails, the transaction is rolled
    /// back and nothing from it is persisted.
    ///
    /// # Errors
    ///
    /// Fails if no transaction is active, or with the flush or engine error.
    pub fn commit(&self) -> CoreResult<SequenceNumber> {
        if let Err(err) = self.flush() {
            if self.in_transaction() {
                warn!(session = %self.inner.id, error = %err, "flush failed, rolling back");
                self.discard();
            }
            return Err(err);
        }

        let txn = self
            .inner
            .state
            .lock()
            .txn
            .take()
            .ok_or_else(|| CoreError::invalid_operation("no transaction to commit"))?;
        let sequence = self.inner.engine.apply(&txn.staged)?;
        debug!(session = %self.inner.id, %sequence, "transaction committed");
        Ok(sequence)
    }

    /// Rolls back the active transaction, if any.
    ///
    /// Pending and staged writes are discarded.
    pub fn rollback(&self) {
        if self.discard() {
            debug!(session = %self.inner.id, "transaction rolled back");
        }
    }

    /// Closes the session, rolling back any active transaction.
    ///
    /// Closing twice is harmless.
    pub fn close(&self) {
        let mut state = self.inner.state.lock();
        if state.closed {
            return;
        }
        if state.txn.take().is_some() {
            debug!(session = %self.inner.id, "transaction rolled back on close");
        }
        state.closed = true;
        debug!(session = %self.inner.id, "session closed");
    }

    fn discard(&self) -> bool {
        self.inner.state.lock().txn.take().is_some()
    }

    fn closed_error(&self) -> CoreError {
        CoreError::SessionClosed {
            session: self.inner.id.to_string(),
        }
    }

    fn active(state: &mut SessionState, id: SessionId) -> CoreResult<&mut ActiveTransaction> {
        if state.closed {
            return Err(CoreError::SessionClosed {
                session: id.to_string(),
            });
        }
        state
            .txn
            .as_mut()
            .ok_or_else(|| CoreError::invalid_operation("no active transaction"))
    }

    fn with_transaction_state<F>(&self, f: F) -> CoreResult<()>
    where
        F: FnOnce(&mut ActiveTransaction),
    {
        let mut state = self.inner.state.lock();
        f(Self::active(&mut state, self.inner.id)?);
        Ok(())
    }

    fn pending_snapshot<F>(&self, f: F) -> Vec<EntityRef>
    where
        F: FnOnce(&UnitOfWork) -> Vec<EntityRef>,
    {
        self.inner
            .state
            .lock()
            .txn
            .as_ref()
            .map_or_else(Vec::new, |txn| f(&txn.pending))
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.inner.id)
            .field("versioned", &self.inner.hook.is_some())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::encode_cbor;
    use crate::entity::{Entity, EntityId};
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Debug)]
    struct Note {
        id: EntityId,
        text: String,
    }

    impl Entity for Note {
        fn kind(&self) -> &'static str {
            "Note"
        }

        fn id(&self) -> EntityId {
            self.id
        }

        fn encode(&self) -> CoreResult<Vec<u8>> {
            encode_cbor(&self.text)
        }
    }

    fn note(id: EntityId, text: &str) -> EntityRef {
        Arc::new(Note {
            id,
            text: text.to_string(),
        })
    }

    fn session() -> Session {
        Session::new(Arc::new(Engine::in_memory()), None)
    }

    /// Counts flushes and optionally rejects them.
    struct CountingHook {
        calls: AtomicUsize,
        reject: bool,
    }

    impl FlushHook for CountingHook {
        fn before_flush(&self, _: &Session, _: &FlushContext<'_>) -> CoreResult<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.reject {
                Err(CoreError::integrity_violation("flush", "rejected"))
            } else {
                Ok(())
            }
        }
    }

    #[test]
    fn mutations_require_a_transaction() {
        let session = session();
        let err = session.add(note(EntityId::new(), "x")).unwrap_err();
        assert!(matches!(err, CoreError::InvalidOperation { .. }));
    }

    #[test]
    fn begin_twice_fails() {
        let session = session();
        session.begin().unwrap();
        assert!(session.begin().is_err());
    }

    #[test]
    fn commit_persists_new_entities() {
        let session = session();
        let id = EntityId::new();
        session.begin().unwrap();
        session.add(note(id, "hello")).unwrap();
        assert_eq!(session.new_entities().len(), 1);

        session.commit().unwrap();

        assert!(!session.in_transaction());
        let key = EntityKey::new("Note", id);
        assert_eq!(
            session.engine().load_as::<String>(&key).unwrap(),
            Some("hello".to_string())
        );
    }

    #[test]
    fn add_of_committed_entity_is_dirty() {
        let session = session();
        let id = EntityId::new();
        session.begin().unwrap();
        session.add(note(id, "v1")).unwrap();
        session.commit().unwrap();

        session.begin().unwrap();
        session.add(note(id, "v2")).unwrap();
        assert!(session.new_entities().is_empty());
        assert_eq!(session.dirty().len(), 1);
    }

    #[test]
    fn add_after_flush_is_dirty() {
        let session = session();
        let id = EntityId::new();
        session.begin().unwrap();
        session.add(note(id, "v1")).unwrap();
        session.flush().unwrap();
        session.add(note(id, "v2")).unwrap();

        assert_eq!(session.dirty().len(), 1);
        assert_eq!(session.staged_count(), 1);
    }

    #[test]
    fn rollback_discards_staged_writes() {
        let session = session();
        session.begin().unwrap();
        session.add(note(EntityId::new(), "gone")).unwrap();
        session.flush().unwrap();
        session.rollback();

        assert!(!session.in_transaction());
        assert_eq!(session.engine().record_count(), 0);
    }

    #[test]
    fn rejected_flush_rolls_back_commit() {
        let hook = Arc::new(CountingHook {
            calls: AtomicUsize::new(0),
            reject: true,
        });
        let session = Session::new(Arc::new(Engine::in_memory()), Some(hook.clone()));
        session.begin().unwrap();
        session.add(note(EntityId::new(), "never")).unwrap();

        assert!(session.commit().unwrap_err().is_integrity_violation());
        assert!(!session.in_transaction());
        assert_eq!(session.engine().record_count(), 0);
        assert_eq!(hook.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn rejected_explicit_flush_keeps_changes_pending() {
        let hook = Arc::new(CountingHook {
            calls: AtomicUsize::new(0),
            reject: true,
        });
        let session = Session::new(Arc::new(Engine::in_memory()), Some(hook));
        session.begin().unwrap();
        session.add(note(EntityId::new(), "kept")).unwrap();

        assert!(session.flush().is_err());
        assert!(session.in_transaction());
        assert_eq!(session.new_entities().len(), 1);
        assert_eq!(session.staged_count(), 0);
    }

    #[test]
    fn hook_runs_once_per_non_empty_flush() {
        let hook = Arc::new(CountingHook {
            calls: AtomicUsize::new(0),
            reject: false,
        });
        let session = Session::new(Arc::new(Engine::in_memory()), Some(hook.clone()));
        session.begin().unwrap();
        session.flush().unwrap();
        session.add(note(EntityId::new(), "first")).unwrap();
        session.flush().unwrap();
        session.add(note(EntityId::new(), "second")).unwrap();
        session.commit().unwrap();

        assert_eq!(hook.calls.load(Ordering::SeqCst), 2);
        assert_eq!(session.engine().record_count(), 2);
    }

    #[test]
    fn closed_session_rejects_work() {
        let session = session();
        session.begin().unwrap();
        session.close();
        session.close();

        assert!(session.is_closed());
        assert!(!session.in_transaction());
        assert!(matches!(
            session.begin(),
            Err(CoreError::SessionClosed { .. })
        ));
    }

    #[test]
    fn clones_are_the_same_session() {
        let a = session();
        let b = a.clone();
        assert!(a.ptr_eq(&b));
        assert_eq!(a.id(), b.id());
        assert!(!a.ptr_eq(&session()));
    }
}
