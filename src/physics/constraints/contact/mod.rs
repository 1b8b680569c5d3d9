//! Contact constraint rows, in the pooled per-step form and the form persisted on
//! manifold points.

pub mod contact_constraint;
pub mod solver_constraint;

pub use contact_constraint::{
    prepare_persistent_contact, resolve_single_collision_combined, resolve_single_friction, restitution_curve,
    ConstraintPersistentData,
};
pub use solver_constraint::{
    resolve_single_collision_combined_cache_friendly, resolve_single_friction_cache_friendly, SolverConstraint,
    SolverConstraintType,
};
