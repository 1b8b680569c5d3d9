//! Solver-side state: body snapshots, contact rows and the typed joints.

pub mod cone_twist;
pub mod contact;
pub mod contact_solver_info;
pub mod generic_6dof;
pub mod hinge;
pub mod jacobian_entry;
pub mod point_to_point;
pub mod solver_body;
pub mod typed_constraint;

pub use cone_twist::ConeTwistConstraint;
pub use contact_solver_info::{ContactSolverInfo, SolverMode};
pub use generic_6dof::{Generic6DofConstraint, LimitState, RotationalLimitMotor, TranslationalLimitMotor};
pub use hinge::HingeConstraint;
pub use jacobian_entry::JacobianEntry;
pub use point_to_point::{ConstraintSetting, Point2PointConstraint};
pub use solver_body::{body_pair_mut, SolverBody};
pub use typed_constraint::{ConstraintLink, TypedConstraint};
