use glam::Vec3;

use super::jacobian_entry::JacobianEntry;
use super::solver_body::SolverBody;
use super::typed_constraint::{linear_jacobian, ConstraintLink};
use crate::physics::handles::ObjectHandle;

/// Positional and velocity gains of a point-to-point joint.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ConstraintSetting {
    pub tau: f32,
    pub damping: f32,
}

impl Default for ConstraintSetting {
    fn default() -> Self {
        Self { tau: 0.3, damping: 1.0 }
    }
}

/// Ball-socket joint: keeps a pivot on each body at the same world position.
#[derive(Debug, Clone, PartialEq)]
pub struct Point2PointConstraint {
    pub(crate) link: ConstraintLink,
    jac: [JacobianEntry; 3],
    pivot_in_a: Vec3,
    pivot_in_b: Vec3,
    pub setting: ConstraintSetting,
}

impl Point2PointConstraint {
    /// Joins `pivot_in_a` on body A with `pivot_in_b` on body B. Without a body B,
    /// `pivot_in_b` is a fixed world-space anchor.
    pub fn new(rb_a: ObjectHandle, pivot_in_a: Vec3, rb_b: Option<ObjectHandle>, pivot_in_b: Vec3) -> Self {
        Self {
            link: ConstraintLink::new(rb_a, rb_b),
            jac: [JacobianEntry::default(); 3],
            pivot_in_a,
            pivot_in_b,
            setting: ConstraintSetting::default(),
        }
    }

    #[inline]
    pub fn pivot_in_a(&self) -> Vec3 {
        self.pivot_in_a
    }

    #[inline]
    pub fn pivot_in_b(&self) -> Vec3 {
        self.pivot_in_b
    }

    pub fn set_pivot_a(&mut self, pivot_a: Vec3) {
        self.pivot_in_a = pivot_a;
    }

    pub fn set_pivot_b(&mut self, pivot_b: Vec3) {
        self.pivot_in_b = pivot_b;
    }

    pub fn build_jacobian(&mut self, body_a: &SolverBody, body_b: &SolverBody) {
        self.link.applied_impulse = 0.0;
        let pivot_a_in_w = body_a.world_transform.transform_point(self.pivot_in_a);
        let pivot_b_in_w = body_b.world_transform.transform_point(self.pivot_in_b);
        for (i, axis) in [Vec3::X, Vec3::Y, Vec3::Z].into_iter().enumerate() {
            self.jac[i] = linear_jacobian(body_a, body_b, pivot_a_in_w, pivot_b_in_w, axis);
        }
    }

    pub fn solve_constraint(&mut self, body_a: &mut SolverBody, body_b: &mut SolverBody, time_step: f32) {
        let pivot_a_in_w = body_a.world_transform.transform_point(self.pivot_in_a);
        let pivot_b_in_w = body_b.world_transform.transform_point(self.pivot_in_b);
        let rel_pos1 = pivot_a_in_w - body_a.center_of_mass_position();
        let rel_pos2 = pivot_b_in_w - body_b.center_of_mass_position();

        for jac in &self.jac {
            let normal = jac.linear_joint_axis;
            let jac_diag_ab_inv = jac.diagonal_inv();

            let vel = body_a.velocity_in_local_point(rel_pos1) - body_b.velocity_in_local_point(rel_pos2);
            let rel_vel = normal.dot(vel);

            // Positional error (zeroth order error).
            let depth = -(pivot_a_in_w - pivot_b_in_w).dot(normal);
            let impulse = depth * self.setting.tau / time_step * jac_diag_ab_inv
                - self.setting.damping * rel_vel * jac_diag_ab_inv;
            self.link.applied_impulse += impulse;

            let impulse_vector = normal * impulse;
            body_a.apply_impulse(impulse_vector, rel_pos1);
            body_b.apply_impulse(-impulse_vector, rel_pos2);
        }
    }
}
