//! Session factory.

use crate::engine::Engine;
use crate::session::{FlushHook, Session};
use crate::versioning::VersioningHook;
use std::fmt;
use std::sync::Arc;

/// Creates sessions bound to one engine.
///
/// The flush hook is fixed when the factory is built; every session the
/// factory creates runs that single hook on each flush. Clones share the
/// engine and the hook.
#[derive(Clone)]
pub struct SessionFactory {
    engine: Arc<Engine>,
    hook: Option<Arc<dyn FlushHook>>,
}

impl SessionFactory {
    /// Creates a factory whose sessions run no flush hook.
    #[must_use]
    pub fn new(engine: Arc<Engine>) -> Self {
        Self { engine, hook: None }
    }

    /// Creates a factory whose sessions run `hook` before every flush.
    #[must_use]
    pub fn with_hook(engine: Arc<Engine>, hook: Arc<dyn FlushHook>) -> Self {
        Self {
            engine,
            hook: Some(hook),
        }
    }

    /// Creates a factory with the versioning hook attached.
    #[must_use]
    pub fn versioned(engine: Arc<Engine>, strict: bool) -> Self {
        Self::with_hook(engine, Arc::new(VersioningHook::new(strict)))
    }

    /// Creates a new session.
    #[must_use]
    pub fn create(&self) -> Session {
        Session::new(Arc::clone(&self.engine), self.hook.clone())
    }

    /// The engine sessions are bound to.
    #[must_use]
    pub fn engine(&self) -> &Arc<Engine> {
        &self.engine
    }

    /// Whether sessions run a flush hook.
    #[must_use]
    pub fn has_hook(&self) -> bool {
        self.hook.is_some()
    }
}

impl fmt::Debug for SessionFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionFactory")
            .field("engine", &self.engine)
            .field("has_hook", &self.has_hook())
            .finish()
    }
}
