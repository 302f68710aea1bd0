//! Model mapping facade.
//!
//! [`ModelMapping`] is what an application holds on to: the model catalog,
//! the engine, and the registry handing out one session per owner. The
//! versioning hook is attached to the session factory here, once.

use crate::catalog::{ModelCatalog, ModelModule, ModelType};
use crate::config::Config;
use crate::context::{OwnerContext, OwnerKey};
use crate::engine::Engine;
use crate::error::CoreResult;
use crate::registry::{ScopedSession, SessionRegistry};
use crate::session::{Session, SessionFactory};
use modelmap_storage::StorageBackend;
use std::sync::Arc;
use tracing::{debug, info};

/// Models every mapping that serves user accounts must provide.
pub const SHARED_MODEL_NAMES: [&str; 4] = ["User", "UserSession", "ApiKeys", "PasswordResetToken"];

/// Catalog, engine and session registry wired together.
#[derive(Debug)]
pub struct ModelMapping {
    catalog: ModelCatalog,
    registry: SessionRegistry,
    config: Config,
}

impl ModelMapping {
    /// Builds a mapping over `engine` from the given modules.
    #[must_use]
    pub fn new(modules: &[ModelModule], engine: Arc<Engine>, config: Config) -> Self {
        let catalog = ModelCatalog::build(modules);
        let factory = SessionFactory::versioned(engine, config.strict_versioning);
        info!(
            models = catalog.len(),
            modules = modules.len(),
            strict_versioning = config.strict_versioning,
            "model mapping ready"
        );
        Self {
            catalog,
            registry: SessionRegistry::new(factory),
            config,
        }
    }

    /// Builds a mapping over a fresh in-memory engine.
    #[must_use]
    pub fn in_memory(modules: &[ModelModule], config: Config) -> Self {
        Self::new(modules, Arc::new(Engine::in_memory()), config)
    }

    /// Opens the engine stored in `backend`, recovering committed state,
    /// and builds a mapping over it.
    ///
    /// # Errors
    ///
    /// Returns an error if the commit log cannot be recovered.
    pub fn open(
        modules: &[ModelModule],
        backend: Box<dyn StorageBackend>,
        config: Config,
    ) -> CoreResult<Self> {
        let engine = Engine::open(backend, config.sync_on_commit)?;
        Ok(Self::new(modules, Arc::new(engine), config))
    }

    /// Builds a mapping that must provide the account models in
    /// [`SHARED_MODEL_NAMES`].
    ///
    /// # Errors
    ///
    /// Returns [`crate::CoreError::MissingModel`] for the first account
    /// model the modules do not declare.
    pub fn shared(
        modules: &[ModelModule],
        engine: Arc<Engine>,
        config: Config,
    ) -> CoreResult<Self> {
        let mapping = Self::new(modules, engine, config);
        for name in SHARED_MODEL_NAMES {
            mapping.catalog.require(name)?;
        }
        Ok(mapping)
    }

    /// The session of the owner `ctx` resolves to.
    #[must_use]
    pub fn session(&self, ctx: &OwnerContext) -> Session {
        self.registry.current(ctx)
    }

    /// A proxy for the current session of `ctx`.
    #[must_use]
    pub fn context(&self, ctx: &OwnerContext) -> ScopedSession<'_> {
        self.registry.scoped(ctx)
    }

    /// A session outside the registry. The caller closes it.
    #[must_use]
    pub fn new_session(&self) -> Session {
        self.registry.new_session()
    }

    /// Starts tracking a request owner.
    ///
    /// Returns a context forked from `ctx`; `ctx` itself is unchanged.
    #[must_use]
    pub fn begin_owner(&self, ctx: &OwnerContext, request_id: &str) -> OwnerContext {
        debug!(request_id, "begin owner");
        ctx.begin_owner(request_id)
    }

    /// Stops tracking the request owner of `ctx`, closing its session.
    ///
    /// Contexts without a request id are left alone: their thread owner
    /// outlives the request.
    pub fn end_owner(&self, ctx: &OwnerContext) -> bool {
        match ctx.request_id() {
            Some(request_id) => {
                debug!(request_id, "end owner");
                self.registry.evict(&OwnerKey::request(request_id))
            }
            None => false,
        }
    }

    /// Closes and forgets the session of `owner`.
    pub fn evict(&self, owner: &OwnerKey) -> bool {
        self.registry.evict(owner)
    }

    /// The model catalog.
    #[must_use]
    pub fn catalog(&self) -> &ModelCatalog {
        &self.catalog
    }

    /// Looks up a model by name.
    #[must_use]
    pub fn model(&self, name: &str) -> Option<&ModelType> {
        self.catalog.get(name)
    }

    /// The engine sessions are bound to.
    #[must_use]
    pub fn engine(&self) -> &Arc<Engine> {
        self.registry.factory().engine()
    }

    /// The session registry.
    #[must_use]
    pub fn registry(&self) -> &SessionRegistry {
        &self.registry
    }

    /// The configuration the mapping was built with.
    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Closes every cached session.
    pub fn shutdown(&self) {
        let closed = self.registry.clear();
        info!(closed, "model mapping shut down");
    }
}
