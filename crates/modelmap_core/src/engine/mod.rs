//! Minimal transactional storage engine behind sessions.
//!
//! Committed batches are appended to a commit log on a
//! [`modelmap_storage::StorageBackend`] and then applied to an in-memory
//! index of the latest payload per entity.
//!
//! ## Commit Log Frame Format
//!
//! ```text
//! | magic (4) | length (4, LE) | CBOR payload (N) |
//! ```
//!
//! ## Recovery Policy
//!
//! - A truncated frame at the end of the log is a torn write: it is cut off
//!   and recovery proceeds with the frames before it.
//! - A bad magic or an undecodable payload is corruption and fails the open.
//! - Only transactions with a `Commit` record are replayed.

mod log;
mod record;
mod store;

pub use log::CommitLog;
pub use record::{decode_cbor, encode_cbor, LogRecord, WriteOp, LOG_MAGIC};
pub use store::Engine;
