use glam::Vec3;

use crate::physics::constraints::contact_solver_info::ContactSolverInfo;
use crate::physics::constraints::solver_body::SolverBody;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SolverConstraintType {
    Contact1D,
    Friction1D,
}

/// One pooled constraint row between two solver bodies.
///
/// Contact rows point at their source manifold point so that accumulated impulses can be
/// written back for warm starting. Friction rows point at the contact row that bounds them.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SolverConstraint {
    pub relpos1_cross_normal: Vec3,
    pub contact_normal: Vec3,
    pub relpos2_cross_normal: Vec3,
    pub angular_component_a: Vec3,
    pub angular_component_b: Vec3,
    pub applied_impulse: f32,
    pub friction: f32,
    pub restitution: f32,
    pub jac_diag_ab_inv: f32,
    pub penetration: f32,
    pub solver_body_id_a: usize,
    pub solver_body_id_b: usize,
    /// Contact rows: index of the first of two friction rows. Friction rows: index of the contact row.
    pub friction_index: usize,
    /// Manifold slot and point index of the source contact.
    pub original_contact_point: Option<(usize, usize)>,
    pub constraint_type: SolverConstraintType,
}

impl Default for SolverConstraint {
    fn default() -> Self {
        Self {
            relpos1_cross_normal: Vec3::ZERO,
            contact_normal: Vec3::ZERO,
            relpos2_cross_normal: Vec3::ZERO,
            angular_component_a: Vec3::ZERO,
            angular_component_b: Vec3::ZERO,
            applied_impulse: 0.0,
            friction: 0.0,
            restitution: 0.0,
            jac_diag_ab_inv: 0.0,
            penetration: 0.0,
            solver_body_id_a: 0,
            solver_body_id_b: 0,
            friction_index: 0,
            original_contact_point: None,
            constraint_type: SolverConstraintType::Contact1D,
        }
    }
}

impl SolverConstraint {
    /// Relative velocity along the row, using the precomputed lever arms.
    #[inline(always)]
    fn relative_velocity(&self, body1: &SolverBody, body2: &SolverBody) -> f32 {
        let vel1_dot_n =
            self.contact_normal.dot(body1.linear_velocity) + self.relpos1_cross_normal.dot(body1.angular_velocity);
        let vel2_dot_n =
            self.contact_normal.dot(body2.linear_velocity) + self.relpos2_cross_normal.dot(body2.angular_velocity);
        vel1_dot_n - vel2_dot_n
    }

    #[inline(always)]
    fn apply(&self, body1: &mut SolverBody, body2: &mut SolverBody, impulse: f32) {
        body1.internal_apply_impulse(self.contact_normal * body1.inv_mass, self.angular_component_a, impulse);
        body2.internal_apply_impulse(self.contact_normal * body2.inv_mass, self.angular_component_b, -impulse);
    }
}

/// Non-penetration row with Baumgarte bias and restitution. Returns the impulse delta.
pub fn resolve_single_collision_combined_cache_friendly(
    body1: &mut SolverBody,
    body2: &mut SolverBody,
    constraint: &mut SolverConstraint,
    info: &ContactSolverInfo,
) -> f32 {
    let rel_vel = constraint.relative_velocity(body1, body2);

    let positional_error = -constraint.penetration * info.erp / info.time_step;
    let velocity_error = constraint.restitution - rel_vel;

    let penetration_impulse = positional_error * constraint.jac_diag_ab_inv;
    let velocity_impulse = velocity_error * constraint.jac_diag_ab_inv;
    let normal_impulse = penetration_impulse + velocity_impulse;

    let old_normal_impulse = constraint.applied_impulse;
    constraint.applied_impulse = (old_normal_impulse + normal_impulse).max(0.0);
    let normal_impulse = constraint.applied_impulse - old_normal_impulse;

    constraint.apply(body1, body2, normal_impulse);
    normal_impulse
}

/// Friction row bounded by `applied_normal_impulse × friction` (box approximation of the cone).
pub fn resolve_single_friction_cache_friendly(
    body1: &mut SolverBody,
    body2: &mut SolverBody,
    constraint: &mut SolverConstraint,
    _info: &ContactSolverInfo,
    applied_normal_impulse: f32,
) -> f32 {
    let limit = applied_normal_impulse * constraint.friction;
    if applied_normal_impulse > 0.0 {
        let rel_vel = constraint.relative_velocity(body1, body2);
        // Impulse that moves us to zero relative velocity.
        let j1 = -rel_vel * constraint.jac_diag_ab_inv;
        let old_tangent_impulse = constraint.applied_impulse;
        constraint.applied_impulse = (old_tangent_impulse + j1).clamp(-limit, limit);
        let j1 = constraint.applied_impulse - old_tangent_impulse;
        constraint.apply(body1, body2, j1);
    }
    0.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn sliding_pair() -> (SolverBody, SolverBody) {
        let mut top = SolverBody::fixed();
        top.inv_mass = 1.0;
        top.linear_velocity = Vec3::new(3.0, 0.0, 0.0);
        (top, SolverBody::fixed())
    }

    #[test]
    fn test_friction_is_bounded_by_normal_impulse() {
        let (mut top, mut ground) = sliding_pair();
        let mut row = SolverConstraint {
            contact_normal: Vec3::X,
            friction: 0.5,
            jac_diag_ab_inv: 1.0,
            constraint_type: SolverConstraintType::Friction1D,
            ..Default::default()
        };
        let info = ContactSolverInfo::default();
        resolve_single_friction_cache_friendly(&mut top, &mut ground, &mut row, &info, 2.0);
        assert_relative_eq!(row.applied_impulse, -1.0);
        assert_relative_eq!(top.linear_velocity.x, 2.0);
    }

    #[test]
    fn test_no_friction_without_normal_impulse() {
        let (mut top, mut ground) = sliding_pair();
        let mut row = SolverConstraint {
            contact_normal: Vec3::X,
            friction: 0.5,
            jac_diag_ab_inv: 1.0,
            ..Default::default()
        };
        resolve_single_friction_cache_friendly(&mut top, &mut ground, &mut row, &ContactSolverInfo::default(), 0.0);
        assert_eq!(row.applied_impulse, 0.0);
        assert_relative_eq!(top.linear_velocity.x, 3.0);
    }

    #[test]
    fn test_contact_impulse_never_pulls() {
        let mut a = SolverBody::fixed();
        a.inv_mass = 1.0;
        a.linear_velocity = Vec3::new(0.0, 2.0, 0.0);
        let mut b = SolverBody::fixed();
        let mut row = SolverConstraint {
            contact_normal: Vec3::Y,
            jac_diag_ab_inv: 1.0,
            ..Default::default()
        };
        let delta = resolve_single_collision_combined_cache_friendly(&mut a, &mut b, &mut row, &ContactSolverInfo::default());
        assert_eq!(delta, 0.0);
        assert_eq!(row.applied_impulse, 0.0);
    }
}
