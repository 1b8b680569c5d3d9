//! Memory management utilities.
//!
//! Pools are owned by the systems that use them; there are no process-wide singletons, so
//! several independent simulations can coexist.

pub mod arena;

pub use arena::{Arena, ArenaHandle, ArenaIndex};
