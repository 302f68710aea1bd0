//! Pre-flush callback contract.

use crate::entity::EntityRef;
use crate::error::CoreResult;
use crate::session::Session;

/// Entities changed since the previous flush of a transaction.
#[derive(Debug, Clone, Copy)]
pub struct FlushContext<'a> {
    /// Modified entities, in the order they were first marked.
    pub dirty: &'a [EntityRef],
    /// Deleted entities, in the order they were deleted.
    pub deleted: &'a [EntityRef],
}

/// Callback run synchronously before a flush stages its writes.
///
/// The session lock is not held while the hook runs, so the hook may add
/// entities to `session`; they are staged by the same flush. The hook must
/// not flush or commit the session itself.
pub trait FlushHook: Send + Sync {
    /// Inspects the flush. Returning an error aborts the flush.
    ///
    /// # Errors
    ///
    /// Implementations return an error to reject the pending changes.
    fn before_flush(&self, session: &Session, flush: &FlushContext<'_>) -> CoreResult<()>;
}
