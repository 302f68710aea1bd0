//! Commit log writer and reader.

use crate::engine::record::{decode_cbor, encode_cbor, LogRecord, LOG_MAGIC};
use crate::error::{CoreError, CoreResult};
use modelmap_storage::StorageBackend;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::warn;

/// magic (4) + length (4)
const HEADER_SIZE: usize = 8;

/// Append-only log of committed batches.
pub struct CommitLog {
    backend: Mutex<Box<dyn StorageBackend>>,
    sync_on_commit: bool,
    /// Set when a failed batch could not be trimmed off the log.
    poisoned: AtomicBool,
}

impl CommitLog {
    /// Creates a commit log over `backend`.
    pub fn new(backend: Box<dyn StorageBackend>, sync_on_commit: bool) -> Self {
        Self {
            backend: Mutex::new(backend),
            sync_on_commit,
            poisoned: AtomicBool::new(false),
        }
    }

    /// Appends a batch of records with a single backend write.
    ///
    /// Returns the offset of the first frame. A batch whose append or
    /// flush fails is trimmed back off the log, so it is never replayed;
    /// a crash mid-append leaves a torn tail that recovery discards. If
    /// the trim itself fails the log refuses every later append.
    ///
    /// # Errors
    ///
    /// Returns an error if a record cannot be encoded, a payload exceeds
    /// 4 GiB, the backend fails, or the log is poisoned.
    pub fn append_batch(&self, records: &[LogRecord]) -> CoreResult<u64> {
        let mut data = Vec::new();
        for record in records {
            let payload = encode_cbor(record)?;
            let len = u32::try_from(payload.len())
                .map_err(|_| CoreError::invalid_operation("log record payload too large"))?;
            data.extend_from_slice(&LOG_MAGIC);
            data.extend_from_slice(&len.to_le_bytes());
            data.extend_from_slice(&payload);
        }

        let mut backend = self.backend.lock();
        if self.is_poisoned() {
            return Err(CoreError::invalid_operation(
                "commit log holds an unacknowledged batch, reopen the engine",
            ));
        }
        let start = backend.size()?;
        let written = backend.append(&data).and_then(|offset| {
            if self.sync_on_commit {
                backend.flush()?;
            }
            Ok(offset)
        });
        match written {
            Ok(offset) => Ok(offset),
            Err(err) => {
                self.trim_to(&mut **backend, start);
                Err(err.into())
            }
        }
    }

    /// Whether a failed batch is stuck in the log.
    #[must_use]
    pub fn is_poisoned(&self) -> bool {
        self.poisoned.load(Ordering::SeqCst)
    }

    fn trim_to(&self, backend: &mut dyn StorageBackend, start: u64) {
        let trimmed = match backend.size() {
            Ok(size) if size > start => backend.truncate(start),
            Ok(_) => Ok(()),
            Err(err) => Err(err),
        };
        if let Err(err) = trimmed {
            warn!(error = %err, offset = start, "could not trim failed commit log write");
            self.poisoned.store(true, Ordering::SeqCst);
        }
    }

    /// Current log size in bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot report its size.
    pub fn size(&self) -> CoreResult<u64> {
        Ok(self.backend.lock().size()?)
    }

    /// Reads every complete frame from the start of the log.
    ///
    /// A torn frame at the tail is truncated away. Returns the records in
    /// log order together with their offsets.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::LogCorruption`] on a bad magic or an
    /// undecodable payload.
    pub fn replay(&self) -> CoreResult<Vec<(u64, LogRecord)>> {
        let mut backend = self.backend.lock();
        let size = backend.size()?;
        let mut records = Vec::new();
        let mut offset = 0u64;

        while offset < size {
            if size - offset < HEADER_SIZE as u64 {
                break;
            }
            let header = backend.read_at(offset, HEADER_SIZE)?;
            if header[..4] != LOG_MAGIC {
                return Err(CoreError::log_corruption(offset, "bad frame magic"));
            }
            let len = u32::from_le_bytes([header[4], header[5], header[6], header[7]]);
            let body_start = offset + HEADER_SIZE as u64;
            if size - body_start < u64::from(len) {
                break;
            }
            let payload = backend.read_at(body_start, len as usize)?;
            let record = decode_cbor::<LogRecord>(&payload)
                .map_err(|e| CoreError::log_corruption(offset, e.to_string()))?;
            records.push((offset, record));
            offset = body_start + u64::from(len);
        }

        if offset < size {
            warn!(
                valid_bytes = offset,
                torn_bytes = size - offset,
                "truncating torn commit log tail"
            );
            backend.truncate(offset)?;
        }

        Ok(records)
    }
}
