//! Version history creation at flush time.
//!
//! The [`VersioningHook`] is attached to a [`crate::SessionFactory`] and
//! runs before every flush. Modified entities that keep a history get a
//! version record, then deleted ones get a version record flagged as
//! deleted. In strict mode audited entities are validated first, and a
//! violation aborts the flush together with its transaction.

use crate::entity::{AuditedEntity, CreatesVersionRecord, EntityRef, EXEMPT_EXTENSION};
use crate::error::{CoreError, CoreResult};
use crate::session::{FlushContext, FlushHook, Session};
use tracing::{trace, warn};

/// Flush hook creating version records.
#[derive(Debug, Clone, Copy, Default)]
pub struct VersioningHook {
    strict: bool,
}

impl VersioningHook {
    /// Creates a hook; `strict` enables audited-entity validation.
    #[must_use]
    pub const fn new(strict: bool) -> Self {
        Self { strict }
    }

    /// Whether audited entities are validated.
    #[must_use]
    pub const fn is_strict(&self) -> bool {
        self.strict
    }

    /// Returns the version capability of `entity`, validating it first in
    /// strict mode. Entities without the capability yield `None`.
    fn versioned<'a>(
        &self,
        entity: &'a EntityRef,
    ) -> CoreResult<Option<&'a dyn CreatesVersionRecord>> {
        let Some(versioned) = entity.as_versioned() else {
            return Ok(None);
        };
        if self.strict {
            if let Some(audited) = entity.as_audited() {
                check_integrity(&entity.key().to_string(), audited)?;
            }
        }
        Ok(Some(versioned))
    }
}

impl FlushHook for VersioningHook {
    fn before_flush(&self, session: &Session, flush: &FlushContext<'_>) -> CoreResult<()> {
        for entity in flush.dirty {
            if let Some(versioned) = self.versioned(entity)? {
                trace!(entity = %entity.key(), "creating version");
                versioned.create_version(session, false)?;
            }
        }
        for entity in flush.deleted {
            if let Some(versioned) = self.versioned(entity)? {
                trace!(entity = %entity.key(), "creating deletion version");
                versioned.create_version(session, true)?;
            }
        }
        Ok(())
    }
}

/// Validates the structural invariants of an audited entity.
///
/// Checks, in order: exempt extension (passes), parent container,
/// sequence number, then size-or-no-data state.
///
/// # Errors
///
/// Returns [`CoreError::IntegrityViolation`] naming the first failed check.
pub fn check_integrity(label: &str, entity: &dyn AuditedEntity) -> CoreResult<()> {
    if entity.extension() == EXEMPT_EXTENSION {
        return Ok(());
    }

    let violation = if entity.parent_ref().is_none() && entity.parent_id().is_none() {
        Some("without parent container, this is not valid".to_string())
    } else if entity.sequence_number().unwrap_or(0) == 0 {
        Some("without sequence number, this is not valid".to_string())
    } else if entity.data_size().is_none()
        && !entity
            .no_data_states()
            .iter()
            .any(|state| *state == entity.data_state())
    {
        Some(format!(
            "in state {} with unknown size, this is not valid",
            entity.data_state()
        ))
    } else {
        None
    };

    match violation {
        Some(message) => {
            warn!(entity = label, %message, "integrity violation during flush");
            Err(CoreError::integrity_violation(label, message))
        }
        None => Ok(()),
    }
}
