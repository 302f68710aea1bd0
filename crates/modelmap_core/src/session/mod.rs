//! Sessions: units of work bound to the engine.
//!
//! A [`Session`] tracks new, modified and deleted entities inside a
//! transaction. Flushing runs the factory's [`FlushHook`] over the
//! modified and deleted entities, then stages the writes; committing
//! applies every staged write to the [`crate::Engine`] as one batch.

mod factory;
mod handle;
mod hook;
mod unit_of_work;

pub use factory::SessionFactory;
pub use handle::Session;
pub use hook::{FlushContext, FlushHook};
pub use unit_of_work::TrackedSet;
