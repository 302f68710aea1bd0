//! The storage engine sessions are bound to.

use crate::engine::log::CommitLog;
use crate::engine::record::{decode_cbor, LogRecord, WriteOp};
use crate::entity::EntityKey;
use crate::error::CoreResult;
use crate::types::{SequenceNumber, TransactionId};
use modelmap_storage::{InMemoryBackend, StorageBackend};
use parking_lot::{Mutex, RwLock};
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::debug;

/// Transactional store of entity payloads.
///
/// The engine is the opaque resource sessions bind to. It knows nothing
/// about sessions, owners or versioning: it applies batches of
/// [`WriteOp`]s atomically and serves the latest committed payloads.
///
/// ## Commit Ordering
///
/// Batches are serialized by a commit lock. Each batch is appended to the
/// commit log before it becomes visible in the index, and receives the next
/// sequence number.
pub struct Engine {
    /// Durable record of committed batches.
    log: CommitLog,
    /// Latest committed payload per entity.
    index: RwLock<HashMap<EntityKey, Vec<u8>>>,
    /// Next transaction ID.
    next_txid: AtomicU64,
    /// Sequence of the last committed batch.
    committed_seq: AtomicU64,
    /// Only one batch commits at a time.
    commit_lock: Mutex<()>,
}

impl Engine {
    /// Creates an empty engine over an in-memory backend.
    #[must_use]
    pub fn in_memory() -> Self {
        Self {
            log: CommitLog::new(Box::new(InMemoryBackend::new()), true),
            index: RwLock::new(HashMap::new()),
            next_txid: AtomicU64::new(1),
            committed_seq: AtomicU64::new(0),
            commit_lock: Mutex::new(()),
        }
    }

    /// Opens an engine over `backend`, replaying committed batches.
    ///
    /// # Errors
    ///
    /// Returns an error if the log is corrupted or the backend fails.
    pub fn open(backend: Box<dyn StorageBackend>, sync_on_commit: bool) -> CoreResult<Self> {
        let log = CommitLog::new(backend, sync_on_commit);
        let mut index = HashMap::new();
        let mut pending: HashMap<u64, Vec<LogRecord>> = HashMap::new();
        let mut max_txid = 0u64;
        let mut committed_seq = 0u64;

        for (_, record) in log.replay()? {
            let txid = record.txid();
            max_txid = max_txid.max(txid);
            match record {
                LogRecord::Begin { .. } => {
                    pending.insert(txid, Vec::new());
                }
                LogRecord::Put { .. } | LogRecord::Delete { .. } => {
                    pending.entry(txid).or_default().push(record);
                }
                LogRecord::Commit { sequence, .. } => {
                    for op in pending.remove(&txid).unwrap_or_default() {
                        match op {
                            LogRecord::Put { key, payload, .. } => {
                                index.insert(key, payload);
                            }
                            LogRecord::Delete { key, .. } => {
                                index.remove(&key);
                            }
                            LogRecord::Begin { .. } | LogRecord::Commit { .. } => {}
                        }
                    }
                    committed_seq = committed_seq.max(sequence);
                }
            }
        }

        debug!(
            records = index.len(),
            committed_seq,
            discarded_txns = pending.len(),
            "engine recovered"
        );

        Ok(Self {
            log,
            index: RwLock::new(index),
            next_txid: AtomicU64::new(max_txid + 1),
            committed_seq: AtomicU64::new(committed_seq),
            commit_lock: Mutex::new(()),
        })
    }

    /// Applies a batch of writes atomically.
    ///
    /// An empty batch writes nothing and returns the current committed
    /// sequence.
    ///
    /// # Errors
    ///
    /// Returns an error if the commit log cannot be written; the index is
    /// left untouched in that case.
    pub fn apply(&self, batch: &[WriteOp]) -> CoreResult<SequenceNumber> {
        let _guard = self.commit_lock.lock();
        if batch.is_empty() {
            return Ok(self.committed_seq());
        }

        let txid = TransactionId::new(self.next_txid.fetch_add(1, Ordering::SeqCst));
        let sequence = self.committed_seq().next();

        let mut records = Vec::with_capacity(batch.len() + 2);
        records.push(LogRecord::Begin {
            txid: txid.as_u64(),
        });
        records.extend(batch.iter().map(|op| LogRecord::from_write(txid.as_u64(), op)));
        records.push(LogRecord::Commit {
            txid: txid.as_u64(),
            sequence: sequence.as_u64(),
        });
        self.log.append_batch(&records)?;

        {
            let mut index = self.index.write();
            for op in batch {
                match op {
                    WriteOp::Put { key, payload } => {
                        index.insert(key.clone(), payload.clone());
                    }
                    WriteOp::Delete { key } => {
                        index.remove(key);
                    }
                }
            }
        }
        self.committed_seq
            .store(sequence.as_u64(), Ordering::SeqCst);

        debug!(%txid, %sequence, writes = batch.len(), "batch committed");
        Ok(sequence)
    }

    /// Returns the committed payload of an entity.
    #[must_use]
    pub fn load(&self, key: &EntityKey) -> Option<Vec<u8>> {
        self.index.read().get(key).cloned()
    }

    /// Returns the committed payload of an entity decoded as `T`.
    ///
    /// # Errors
    ///
    /// Returns a codec error if the payload is not a CBOR encoding of `T`.
    pub fn load_as<T: DeserializeOwned>(&self, key: &EntityKey) -> CoreResult<Option<T>> {
        self.load(key).map(|bytes| decode_cbor(&bytes)).transpose()
    }

    /// Checks whether an entity has been committed.
    #[must_use]
    pub fn contains(&self, key: &EntityKey) -> bool {
        self.index.read().contains_key(key)
    }

    /// Number of committed entities.
    #[must_use]
    pub fn record_count(&self) -> usize {
        self.index.read().len()
    }

    /// Keys of all committed entities of one model, sorted.
    #[must_use]
    pub fn keys_of_kind(&self, kind: &str) -> Vec<EntityKey> {
        let mut keys: Vec<EntityKey> = self
            .index
            .read()
            .keys()
            .filter(|key| key.kind == kind)
            .cloned()
            .collect();
        keys.sort();
        keys
    }

    /// Sequence number of the last committed batch.
    #[must_use]
    pub fn committed_seq(&self) -> SequenceNumber {
        SequenceNumber::new(self.committed_seq.load(Ordering::SeqCst))
    }

    /// Size of the commit log in bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot report its size.
    pub fn log_size(&self) -> CoreResult<u64> {
        self.log.size()
    }
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("records", &self.record_count())
            .field("committed_seq", &self.committed_seq())
            .finish_non_exhaustive()
    }
}
