use glam::Vec3;

use super::cone_twist::ConeTwistConstraint;
use super::generic_6dof::Generic6DofConstraint;
use super::hinge::HingeConstraint;
use super::jacobian_entry::JacobianEntry;
use super::point_to_point::Point2PointConstraint;
use super::solver_body::SolverBody;
use crate::physics::handles::ObjectHandle;

/// Bodies and bookkeeping shared by every joint kind.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConstraintLink {
    pub rb_a: ObjectHandle,
    /// `None` links body A to the solver's fixed body.
    pub rb_b: Option<ObjectHandle>,
    pub user_constraint_id: i32,
    pub applied_impulse: f32,
}

impl ConstraintLink {
    pub fn new(rb_a: ObjectHandle, rb_b: Option<ObjectHandle>) -> Self {
        Self {
            rb_a,
            rb_b,
            user_constraint_id: -1,
            applied_impulse: 0.0,
        }
    }
}

/// Linear row between two world-space pivots.
pub(crate) fn linear_jacobian(
    body_a: &SolverBody,
    body_b: &SolverBody,
    pivot_a_in_w: Vec3,
    pivot_b_in_w: Vec3,
    axis: Vec3,
) -> JacobianEntry {
    JacobianEntry::linear(
        body_a.world_transform.basis.transpose(),
        body_b.world_transform.basis.transpose(),
        pivot_a_in_w - body_a.center_of_mass_position(),
        pivot_b_in_w - body_b.center_of_mass_position(),
        axis,
        body_a.inv_inertia_diag_local,
        body_a.inv_mass,
        body_b.inv_inertia_diag_local,
        body_b.inv_mass,
    )
}

pub(crate) fn angular_jacobian(body_a: &SolverBody, body_b: &SolverBody, axis: Vec3) -> JacobianEntry {
    JacobianEntry::angular(
        axis,
        body_a.world_transform.basis.transpose(),
        body_b.world_transform.basis.transpose(),
        body_a.inv_inertia_diag_local,
        body_b.inv_inertia_diag_local,
    )
}

/// A joint between two rigid bodies, solved alongside contacts.
///
/// `build_jacobian` runs once per step before the iterations; `solve_constraint` runs
/// once per iteration and applies one corrective impulse.
#[derive(Debug, Clone, PartialEq)]
pub enum TypedConstraint {
    Point2Point(Point2PointConstraint),
    Hinge(HingeConstraint),
    ConeTwist(ConeTwistConstraint),
    Generic6DoF(Generic6DofConstraint),
}

impl TypedConstraint {
    #[inline]
    fn link(&self) -> &ConstraintLink {
        match self {
            Self::Point2Point(c) => &c.link,
            Self::Hinge(c) => &c.link,
            Self::ConeTwist(c) => &c.link,
            Self::Generic6DoF(c) => &c.link,
        }
    }

    #[inline]
    fn link_mut(&mut self) -> &mut ConstraintLink {
        match self {
            Self::Point2Point(c) => &mut c.link,
            Self::Hinge(c) => &mut c.link,
            Self::ConeTwist(c) => &mut c.link,
            Self::Generic6DoF(c) => &mut c.link,
        }
    }

    #[inline]
    pub fn body_a(&self) -> ObjectHandle {
        self.link().rb_a
    }

    #[inline]
    pub fn body_b(&self) -> Option<ObjectHandle> {
        self.link().rb_b
    }

    /// Impulse accumulated along the linear rows during the last solve.
    #[inline]
    pub fn applied_impulse(&self) -> f32 {
        self.link().applied_impulse
    }

    #[inline]
    pub fn user_constraint_id(&self) -> i32 {
        self.link().user_constraint_id
    }

    pub fn set_user_constraint_id(&mut self, id: i32) {
        self.link_mut().user_constraint_id = id;
    }

    pub fn build_jacobian(&mut self, body_a: &SolverBody, body_b: &SolverBody) {
        match self {
            Self::Point2Point(c) => c.build_jacobian(body_a, body_b),
            Self::Hinge(c) => c.build_jacobian(body_a, body_b),
            Self::ConeTwist(c) => c.build_jacobian(body_a, body_b),
            Self::Generic6DoF(c) => c.build_jacobian(body_a, body_b),
        }
    }

    pub fn solve_constraint(&mut self, body_a: &mut SolverBody, body_b: &mut SolverBody, time_step: f32) {
        match self {
            Self::Point2Point(c) => c.solve_constraint(body_a, body_b, time_step),
            Self::Hinge(c) => c.solve_constraint(body_a, body_b, time_step),
            Self::ConeTwist(c) => c.solve_constraint(body_a, body_b, time_step),
            Self::Generic6DoF(c) => c.solve_constraint(body_a, body_b, time_step),
        }
    }
}

impl From<Point2PointConstraint> for TypedConstraint {
    fn from(c: Point2PointConstraint) -> Self {
        Self::Point2Point(c)
    }
}

impl From<HingeConstraint> for TypedConstraint {
    fn from(c: HingeConstraint) -> Self {
        Self::Hinge(c)
    }
}

impl From<ConeTwistConstraint> for TypedConstraint {
    fn from(c: ConeTwistConstraint) -> Self {
        Self::ConeTwist(c)
    }
}

impl From<Generic6DofConstraint> for TypedConstraint {
    fn from(c: Generic6DofConstraint) -> Self {
        Self::Generic6DoF(c)
    }
}
