//! # modelmap storage
//!
//! Byte-store backends for the modelmap commit log.
//!
//! Backends are **opaque byte stores**: they append, read back and flush
//! bytes. Framing, record types and recovery belong to `modelmap_core`.
//!
//! ## Available Backends
//!
//! - [`InMemoryBackend`] - for tests and ephemeral mappings
//!
//! ## Example
//!
//! ```rust
//! use modelmap_storage::{StorageBackend, InMemoryBackend};
//!
//! let mut backend = InMemoryBackend::new();
//! let offset = backend.append(b"frame").unwrap();
//! assert_eq!(backend.read_at(offset, 5).unwrap(), b"frame");
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod backend;
mod error;
mod memory;

pub use backend::StorageBackend;
pub use error::{StorageError, StorageResult};
pub use memory::InMemoryBackend;
