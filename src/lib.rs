//! Rigid-body physics core: narrow-phase dispatch, persistent contact manifolds,
//! simulation islands and a sequential-impulse constraint solver.

pub mod error;
pub mod physics;
pub mod utilities;

pub use error::{PhysicsError, Result};
