//! Owner-scoped session registry.

use crate::context::{OwnerContext, OwnerKey};
use crate::session::{Session, SessionFactory};
use crate::transaction::TransactionalResource;
use parking_lot::Mutex;
use std::collections::HashMap;
use tracing::debug;

/// Hands out one session per logical owner.
///
/// Sessions are created lazily on the first lookup for an owner and cached
/// until the owner is evicted. Lookups and evictions from different owners
/// are serialized on the internal map; two threads sharing one owner key
/// are expected to coordinate themselves.
///
/// The registry is an ordinary value: build one per mapping and pass it
/// where it is needed.
pub struct SessionRegistry {
    factory: SessionFactory,
    sessions: Mutex<HashMap<OwnerKey, Session>>,
}

impl SessionRegistry {
    /// Creates an empty registry producing sessions from `factory`.
    #[must_use]
    pub fn new(factory: SessionFactory) -> Self {
        Self {
            factory,
            sessions: Mutex::new(HashMap::new()),
        }
    }

    /// Returns the session of the owner `ctx` resolves to, creating it on
    /// first use.
    ///
    /// A cached session that its owner closed is replaced by a fresh one.
    #[must_use]
    pub fn current(&self, ctx: &OwnerContext) -> Session {
        self.session_for(ctx.resolve())
    }

    /// Returns the session cached for `owner`, creating it on first use.
    #[must_use]
    pub fn session_for(&self, owner: OwnerKey) -> Session {
        let mut sessions = self.sessions.lock();
        if let Some(session) = sessions.get(&owner) {
            if !session.is_closed() {
                return session.clone();
            }
        }
        let session = self.factory.create();
        debug!(%owner, session = %session.id(), "registered session");
        sessions.insert(owner, session.clone());
        session
    }

    /// Creates a session that is not registered to any owner.
    ///
    /// Use it for work that must not share transaction boundaries with the
    /// owner's session. The caller closes it.
    #[must_use]
    pub fn new_session(&self) -> Session {
        self.factory.create()
    }

    /// Closes and forgets the session of `owner`.
    ///
    /// Owners that never asked for a session have nothing cached, so this
    /// is a cheap no-op for them. Returns whether a session was removed.
    pub fn evict(&self, owner: &OwnerKey) -> bool {
        let removed = self.sessions.lock().remove(owner);
        match removed {
            Some(session) => {
                session.close();
                debug!(%owner, session = %session.id(), "evicted session");
                true
            }
            None => false,
        }
    }

    /// Evicts the owner `ctx` currently resolves to.
    pub fn remove_current(&self, ctx: &OwnerContext) -> bool {
        self.evict(&ctx.resolve())
    }

    /// Whether a session is cached for `owner`.
    #[must_use]
    pub fn contains(&self, owner: &OwnerKey) -> bool {
        self.sessions.lock().contains_key(owner)
    }

    /// Number of cached sessions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.sessions.lock().len()
    }

    /// Whether no session is cached.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sessions.lock().is_empty()
    }

    /// Closes and forgets every cached session. Returns how many there were.
    pub fn clear(&self) -> usize {
        let drained: Vec<Session> = self.sessions.lock().drain().map(|(_, s)| s).collect();
        for session in &drained {
            session.close();
        }
        drained.len()
    }

    /// The factory sessions are created from.
    #[must_use]
    pub fn factory(&self) -> &SessionFactory {
        &self.factory
    }

    /// A proxy resolving to the current session of `ctx` on each use.
    #[must_use]
    pub fn scoped(&self, ctx: &OwnerContext) -> ScopedSession<'_> {
        ScopedSession {
            registry: self,
            ctx: ctx.clone(),
        }
    }
}

impl std::fmt::Debug for SessionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionRegistry")
            .field("sessions", &self.len())
            .finish_non_exhaustive()
    }
}

/// Registry proxy bound to one owner context.
///
/// Stands in for "the current session" where a concrete session handle
/// would pin the owner too early.
#[derive(Debug, Clone)]
pub struct ScopedSession<'a> {
    registry: &'a SessionRegistry,
    ctx: OwnerContext,
}

impl ScopedSession<'_> {
    /// The owner's current session.
    #[must_use]
    pub fn get(&self) -> Session {
        self.registry.current(&self.ctx)
    }

    /// Evicts the owner's session.
    pub fn remove(&self) -> bool {
        self.registry.remove_current(&self.ctx)
    }

    /// The owner this proxy resolves to right now.
    #[must_use]
    pub fn owner(&self) -> OwnerKey {
        self.ctx.resolve()
    }
}

impl TransactionalResource for ScopedSession<'_> {
    fn transactional_session(&self) -> Option<Session> {
        Some(self.get())
    }
}
