//! # modelmap Core
//!
//! Request-scoped persistence sessions with transactional versioning hooks.
//!
//! This crate provides:
//! - An owner context deciding which logical owner (request or thread)
//!   a session belongs to
//! - A session registry handing out one session per owner
//! - A transaction guard that begins and commits only at the outermost level
//! - A flush hook creating version records, with optional strict validation
//! - A model catalog built from an ordered list of modules
//! - A small commit-log engine sessions write to
//!
//! ## Example
//!
//! ```rust
//! use modelmap_core::{Config, ModelMapping, ModelModule, OwnerContext};
//!
//! struct History;
//!
//! let modules = [ModelModule::new("histories").declare::<History>("History")];
//! let mapping = ModelMapping::in_memory(&modules, Config::default());
//!
//! let request = mapping.begin_owner(&OwnerContext::new(), "req-42");
//! let session = mapping.session(&request);
//! assert!(session.ptr_eq(&mapping.session(&request)));
//!
//! mapping.end_owner(&request);
//! assert!(session.is_closed());
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod catalog;
mod config;
mod context;
mod engine;
mod entity;
mod error;
mod mapping;
mod registry;
mod session;
mod sessionless;
mod transaction;
mod types;
mod versioning;

pub use catalog::{ModelCatalog, ModelModule, ModelType};
pub use config::{parse_flag, Config, STRICT_VERSIONING_ENV};
pub use context::{OwnerContext, OwnerKey};
pub use engine::{decode_cbor, encode_cbor, CommitLog, Engine, LogRecord, WriteOp, LOG_MAGIC};
pub use entity::{
    AuditedEntity, CreatesVersionRecord, Entity, EntityId, EntityKey, EntityRef, EXEMPT_EXTENSION,
};
pub use error::{CoreError, CoreResult};
pub use mapping::{ModelMapping, SHARED_MODEL_NAMES};
pub use registry::{ScopedSession, SessionRegistry};
pub use session::{FlushContext, FlushHook, Session, SessionFactory, TrackedSet};
pub use sessionless::SessionlessContext;
pub use transaction::{with_transaction, TransactionalResource};
pub use types::{SequenceNumber, SessionId, TransactionId};
pub use versioning::{check_integrity, VersioningHook};
