//! Entity identity and the capabilities entities can opt into.

mod id;
mod model;

pub use id::{EntityId, EntityKey};
pub use model::{AuditedEntity, CreatesVersionRecord, Entity, EntityRef, EXEMPT_EXTENSION};
