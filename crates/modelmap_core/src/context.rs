//! Owner keys and the context that carries a request override.
//!
//! Every session lookup resolves an [`OwnerKey`] from an [`OwnerContext`].
//! The context is an immutable value: starting a request forks a new
//! context carrying the request ID, and that value is handed explicitly
//! to whatever threads or tasks work on the request. Contexts that were
//! not derived from it never observe the override.

use std::fmt;
use std::sync::Arc;
use std::thread::{self, JoinHandle, ThreadId};

/// Identity of the logical owner of a session.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum OwnerKey {
    /// An externally supplied identifier, such as a request ID.
    Request(Arc<str>),
    /// The thread the lookup ran on, when no request is active.
    Thread(ThreadId),
}

impl OwnerKey {
    /// Key of the calling thread.
    #[must_use]
    pub fn current_thread() -> Self {
        Self::Thread(thread::current().id())
    }

    /// Key for an external request identifier.
    pub fn request(id: impl Into<Arc<str>>) -> Self {
        Self::Request(id.into())
    }

    /// Returns the request identifier, if this is a request key.
    #[must_use]
    pub fn request_id(&self) -> Option<&str> {
        match self {
            Self::Request(id) => Some(id),
            Self::Thread(_) => None,
        }
    }
}

impl fmt::Display for OwnerKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Request(id) => write!(f, "request:{id}"),
            Self::Thread(id) => write!(f, "thread:{id:?}"),
        }
    }
}

/// Per-branch owner state.
///
/// The default context has no override and resolves to the calling
/// thread. Clones are cheap and share the override.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OwnerContext {
    request_id: Option<Arc<str>>,
}

impl OwnerContext {
    /// Creates a context with no override.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Forks a context owned by `request_id`.
    ///
    /// `self` is left untouched, so siblings holding the parent context
    /// keep resolving to their previous owner.
    #[must_use]
    pub fn begin_owner(&self, request_id: impl Into<Arc<str>>) -> Self {
        Self {
            request_id: Some(request_id.into()),
        }
    }

    /// The request override, if set and non-empty.
    #[must_use]
    pub fn request_id(&self) -> Option<&str> {
        self.request_id.as_deref().filter(|id| !id.is_empty())
    }

    /// Resolves the owner of the current branch.
    ///
    /// Evaluated on every call: a context without override resolves to
    /// whichever thread is running, so a pooled worker serving several
    /// owners over its lifetime gets a fresh answer each time.
    #[must_use]
    pub fn resolve(&self) -> OwnerKey {
        match &self.request_id {
            Some(id) if !id.is_empty() => OwnerKey::Request(Arc::clone(id)),
            _ => OwnerKey::current_thread(),
        }
    }

    /// Spawns a thread that inherits this context.
    pub fn spawn<F, T>(&self, f: F) -> JoinHandle<T>
    where
        F: FnOnce(OwnerContext) -> T + Send + 'static,
        T: Send + 'static,
    {
        let ctx = self.clone();
        thread::spawn(move || f(ctx))
    }
}
