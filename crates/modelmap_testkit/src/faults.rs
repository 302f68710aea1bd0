//! Storage fault injection.
//!
//! [`FaultyBackend`] wraps an [`InMemoryBackend`] and can reject appends,
//! tear them after a number of bytes the way a crash mid-write would, or
//! fail the sync that follows a good append.
//! Clones share the buffer and the fault plan, so a test keeps one handle
//! to arm faults after giving the other to an engine.

use modelmap_storage::{InMemoryBackend, StorageBackend, StorageError, StorageResult};
use parking_lot::Mutex;
use std::sync::Arc;

/// What the next write does.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Fault {
    /// Appends succeed.
    #[default]
    None,
    /// Appends fail without writing.
    RejectAppends,
    /// The next append writes only this many bytes, then fails.
    TearAfter(usize),
    /// Appends succeed; the next flush fails.
    FailFlush,
}

/// A backend with an armed fault plan.
#[derive(Debug, Clone, Default)]
pub struct FaultyBackend {
    inner: InMemoryBackend,
    fault: Arc<Mutex<Fault>>,
}

impl FaultyBackend {
    /// Wraps `inner` with no fault armed.
    #[must_use]
    pub fn new(inner: InMemoryBackend) -> Self {
        Self {
            inner,
            fault: Arc::default(),
        }
    }

    /// Arms a fault for subsequent appends.
    pub fn arm(&self, fault: Fault) {
        *self.fault.lock() = fault;
    }

    /// Disarms any fault.
    pub fn disarm(&self) {
        self.arm(Fault::None);
    }

    /// The wrapped bytes, as a crash would leave them.
    #[must_use]
    pub fn inner(&self) -> &InMemoryBackend {
        &self.inner
    }
}

impl StorageBackend for FaultyBackend {
    fn read_at(&self, offset: u64, len: usize) -> StorageResult<Vec<u8>> {
        self.inner.read_at(offset, len)
    }

    fn append(&mut self, data: &[u8]) -> StorageResult<u64> {
        let fault = *self.fault.lock();
        match fault {
            Fault::None | Fault::FailFlush => self.inner.append(data),
            Fault::RejectAppends => Err(StorageError::WriteRejected(
                "simulated append failure".to_string(),
            )),
            Fault::TearAfter(keep) => {
                // One torn write per arming; the process is assumed dead after it.
                self.disarm();
                self.inner.append(&data[..keep.min(data.len())])?;
                Err(StorageError::WriteRejected(
                    "simulated crash during append".to_string(),
                ))
            }
        }
    }

    fn flush(&mut self) -> StorageResult<()> {
        if *self.fault.lock() == Fault::FailFlush {
            self.disarm();
            return Err(StorageError::WriteRejected(
                "simulated sync failure".to_string(),
            ));
        }
        self.inner.flush()
    }

    fn size(&self) -> StorageResult<u64> {
        self.inner.size()
    }

    fn truncate(&mut self, new_size: u64) -> StorageResult<()> {
        self.inner.truncate(new_size)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejected_appends_write_nothing() {
        let mut backend = FaultyBackend::default();
        backend.arm(Fault::RejectAppends);
        assert!(backend.append(b"abc").is_err());
        assert_eq!(backend.size().unwrap(), 0);

        backend.disarm();
        assert_eq!(backend.append(b"abc").unwrap(), 0);
    }

    #[test]
    fn torn_append_keeps_a_prefix_once() {
        let mut backend = FaultyBackend::default();
        let observer = backend.clone();
        observer.arm(Fault::TearAfter(2));

        assert!(backend.append(b"abcdef").is_err());
        assert_eq!(observer.inner().snapshot(), b"ab");
        assert_eq!(backend.append(b"gh").unwrap(), 2);
    }

    #[test]
    fn failed_flush_keeps_the_append_once() {
        let mut backend = FaultyBackend::default();
        backend.arm(Fault::FailFlush);

        assert_eq!(backend.append(b"abc").unwrap(), 0);
        assert!(backend.flush().is_err());
        assert!(backend.flush().is_ok());
        assert_eq!(backend.size().unwrap(), 3);
    }
}
