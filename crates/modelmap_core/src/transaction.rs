//! Transaction guard.
//!
//! [`with_transaction`] runs a unit of work inside exactly one transaction.
//! Code wrapped in it is safe both as a top-level entry point, where it
//! begins and commits, and as a helper nested inside another guarded call
//! on the same session, where it joins the outer transaction.

use crate::error::CoreError;
use crate::session::Session;
use tracing::debug;

/// Something the transaction guard may manage.
///
/// Resources that are not backed by a transactional session return `None`
/// and the guard runs its body without transaction management.
pub trait TransactionalResource {
    /// The session whose transaction should wrap the work, if any.
    fn transactional_session(&self) -> Option<Session>;
}

impl TransactionalResource for Session {
    fn transactional_session(&self) -> Option<Session> {
        Some(self.clone())
    }
}

/// Runs `body` inside a transaction on `resource`.
///
/// - not a session: `body` runs as is;
/// - a transaction is already active: `body` joins it;
/// - otherwise a transaction is begun, committed if `body` succeeds and
///   rolled back if it fails or panics.
///
/// # Errors
///
/// Returns the error of `body` unchanged after rolling back, or the
/// begin/commit error converted into `E`.
pub fn with_transaction<R, T, E, F>(resource: &R, body: F) -> Result<T, E>
where
    R: TransactionalResource + ?Sized,
    F: FnOnce() -> Result<T, E>,
    E: From<CoreError>,
{
    let Some(session) = resource.transactional_session() else {
        return body();
    };
    if session.in_transaction() {
        return body();
    }

    session.begin()?;
    let guard = RollbackOnDrop {
        session: &session,
        armed: true,
    };
    let value = body()?;
    guard.disarm();
    session.commit()?;
    Ok(value)
}

impl Session {
    /// Runs `body` inside a transaction on this session.
    ///
    /// See [`with_transaction`].
    ///
    /// # Errors
    ///
    /// Returns the body error after rollback, or the begin/commit error.
    pub fn transaction<T, E, F>(&self, body: F) -> Result<T, E>
    where
        F: FnOnce() -> Result<T, E>,
        E: From<CoreError>,
    {
        with_transaction(self, body)
    }
}

/// Rolls the transaction back unless the body completed.
struct RollbackOnDrop<'a> {
    session: &'a Session,
    armed: bool,
}

impl RollbackOnDrop<'_> {
    fn disarm(mut self) {
        self.armed = false;
    }
}

impl Drop for RollbackOnDrop<'_> {
    fn drop(&mut self) {
        if self.armed {
            debug!(session = %self.session.id(), "guarded body failed, rolling back");
            self.session.rollback();
        }
    }
}
