//! # modelmap Testkit
//!
//! Test utilities for modelmap.
//!
//! This crate provides:
//! - Domain models with version history and strict-mode fields
//! - Test mappings over an in-memory backend that can be reopened
//! - Storage fault injection for rollback and recovery tests
//! - One-time `tracing` initialisation for tests
//!
//! The cross-crate integration tests live in this crate's `tests/`.
//!
//! ## Usage
//!
//! ```rust
//! use modelmap_testkit::prelude::*;
//! use std::sync::Arc;
//!
//! let test = TestMapping::strict();
//! with_request(&test, "req-1", |session| {
//!     session.transaction(|| session.add(Arc::new(Note::new("hi"))))
//! })
//! .unwrap();
//! assert_eq!(test.engine().record_count(), 1);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod faults;
pub mod fixtures;
pub mod models;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::faults::*;
    pub use crate::fixtures::*;
    pub use crate::models::*;
}

pub use faults::*;
pub use fixtures::*;
pub use models::*;
