//! Test mappings and helpers.
//!
//! Provides a [`TestMapping`] over an in-memory backend that can be
//! reopened to check what a restart would recover.

use crate::faults::FaultyBackend;
use crate::models::all_modules;
use modelmap_core::{Config, CoreResult, ModelMapping, OwnerContext, Session};
use modelmap_storage::InMemoryBackend;
use std::sync::Once;
use tracing_subscriber::EnvFilter;

/// A mapping over every test model, backed by a shared in-memory buffer.
pub struct TestMapping {
    /// The mapping under test.
    pub mapping: ModelMapping,
    backend: FaultyBackend,
}

impl TestMapping {
    /// A mapping whose flush validation is lenient.
    #[must_use]
    pub fn lenient() -> Self {
        Self::with_config(Config::default())
    }

    /// A mapping whose flush validation is strict.
    #[must_use]
    pub fn strict() -> Self {
        Self::with_config(Config::default().strict_versioning(true))
    }

    /// A mapping built with `config` over an empty backend.
    #[must_use]
    pub fn with_config(config: Config) -> Self {
        init_test_logging();
        let backend = FaultyBackend::default();
        let mapping = ModelMapping::open(&all_modules(), Box::new(backend.clone()), config)
            .expect("Failed to open test mapping");
        Self { mapping, backend }
    }

    /// Handle to the backend, for arming faults.
    #[must_use]
    pub fn backend(&self) -> &FaultyBackend {
        &self.backend
    }

    /// Opens a second mapping over the bytes written so far, as a restart
    /// would see them.
    ///
    /// # Errors
    ///
    /// Returns the recovery error if the log cannot be replayed.
    pub fn reopen(&self) -> CoreResult<ModelMapping> {
        let bytes = self.backend.inner().snapshot();
        ModelMapping::open(
            &all_modules(),
            Box::new(InMemoryBackend::with_data(bytes)),
            self.mapping.config().clone(),
        )
    }
}

impl std::ops::Deref for TestMapping {
    type Target = ModelMapping;

    fn deref(&self) -> &Self::Target {
        &self.mapping
    }
}

/// Runs `f` with the session of a fresh request owner, then ends the owner.
pub fn with_request<F, R>(mapping: &ModelMapping, request_id: &str, f: F) -> R
where
    F: FnOnce(&Session) -> R,
{
    let ctx = mapping.begin_owner(&OwnerContext::new(), request_id);
    let result = f(&mapping.session(&ctx));
    mapping.end_owner(&ctx);
    result
}

/// Installs a `tracing` subscriber for tests, once per process.
///
/// Honours `RUST_LOG`; defaults to warnings only.
pub fn init_test_logging() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .try_init();
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Note;
    use std::sync::Arc;

    #[test]
    fn reopen_sees_committed_writes() {
        let test = TestMapping::lenient();
        let note = Note::new("hello");
        let key = modelmap_core::Entity::key(&note);

        with_request(&test, "req-1", |session| {
            session.transaction(|| session.add(Arc::new(note.clone())))
        })
        .unwrap();

        let reopened = test.reopen().unwrap();
        assert_eq!(reopened.engine().load_as::<Note>(&key).unwrap(), Some(note));
    }

    #[test]
    fn with_request_ends_the_owner() {
        let test = TestMapping::lenient();
        let session = with_request(&test, "req-2", Session::clone);
        assert!(session.is_closed());
        assert!(test.registry().is_empty());
    }
}
