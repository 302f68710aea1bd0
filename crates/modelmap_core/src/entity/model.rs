//! Entity contract and opt-in capabilities.

use crate::entity::{EntityId, EntityKey};
use crate::error::CoreResult;
use crate::session::Session;
use std::fmt;
use std::sync::Arc;

/// Extension marker of audited entities that are exempt from strict checks.
///
/// Custom builds are stored without a parent container or sequence number.
pub const EXEMPT_EXTENSION: &str = "len";

/// Shared handle to an entity tracked by a session.
pub type EntityRef = Arc<dyn Entity>;

/// A persisted domain object.
///
/// Entities are immutable snapshots: to record a modification, build the
/// updated value and hand it to [`Session::mark_dirty`]. The session keys
/// tracked entities by [`Entity::key`], so the latest snapshot wins.
pub trait Entity: Send + Sync + fmt::Debug {
    /// Model name, matching the catalog entry of the type.
    fn kind(&self) -> &'static str;

    /// Identity of the entity within its model.
    fn id(&self) -> EntityId;

    /// Serializes the entity for the commit log.
    ///
    /// # Errors
    ///
    /// Returns a codec error if the entity cannot be encoded.
    fn encode(&self) -> CoreResult<Vec<u8>>;

    /// Storage key of the entity.
    fn key(&self) -> EntityKey {
        EntityKey::new(self.kind(), self.id())
    }

    /// Returns the version-record capability if this entity participates
    /// in version history.
    fn as_versioned(&self) -> Option<&dyn CreatesVersionRecord> {
        None
    }

    /// Returns the audited view used by strict flush validation.
    fn as_audited(&self) -> Option<&dyn AuditedEntity> {
        None
    }
}

/// Capability of entities that keep a version history.
///
/// Invoked by the versioning hook while a flush is in progress. The
/// implementation typically adds a history record to `session`; that
/// record is written in the same flush.
pub trait CreatesVersionRecord: Send + Sync {
    /// Creates a version record for the current state of the entity.
    ///
    /// `deleted` is true when the entity is being removed.
    ///
    /// # Errors
    ///
    /// Any error aborts the flush and the enclosing transaction.
    fn create_version(&self, session: &Session, deleted: bool) -> CoreResult<()>;
}

/// Fields of an audited entity read by strict flush validation.
///
/// An audited entity lives inside a parent container (for example a
/// history), carries a human-facing sequence number within it, and points
/// at a data payload with a size and a state.
pub trait AuditedEntity: Send + Sync {
    /// Extension marker; [`EXEMPT_EXTENSION`] skips validation.
    fn extension(&self) -> &str;

    /// Loaded reference to the parent container, if any.
    fn parent_ref(&self) -> Option<EntityId>;

    /// Foreign-key value of the parent container, if any.
    fn parent_id(&self) -> Option<i64>;

    /// Sequence number within the parent container. Zero counts as unset.
    fn sequence_number(&self) -> Option<u64>;

    /// Size of the data payload, when known.
    fn data_size(&self) -> Option<u64>;

    /// Current state of the data payload.
    fn data_state(&self) -> &str;

    /// States in which no payload is expected, so an unknown size is fine.
    fn no_data_states(&self) -> &'static [&'static str];
}
