use glam::Vec3;

use crate::physics::collision_detection::contact_manifold::ManifoldPoint;
use crate::physics::constraints::contact_solver_info::{ContactSolverInfo, SolverMode};
use crate::physics::constraints::solver_body::SolverBody;
use crate::utilities::math_helper::plane_space;

/// Solver state stored on a contact point between steps, used when the solver runs
/// without per-step pools.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConstraintPersistentData {
    pub applied_impulse: f32,
    pub prev_applied_impulse: f32,
    pub accumulated_tangent_impulse0: f32,
    pub accumulated_tangent_impulse1: f32,
    pub jac_diag_ab_inv: f32,
    pub jac_diag_ab_inv_tangent0: f32,
    pub jac_diag_ab_inv_tangent1: f32,
    /// Lifetime of the contact when this payload was last prepared.
    pub persistent_lifetime: u32,
    pub restitution: f32,
    pub friction: f32,
    pub penetration: f32,
    pub friction_world_tangential0: Vec3,
    pub friction_world_tangential1: Vec3,
    pub friction_angular_component0_a: Vec3,
    pub friction_angular_component0_b: Vec3,
    pub friction_angular_component1_a: Vec3,
    pub friction_angular_component1_b: Vec3,
    pub angular_component_a: Vec3,
    pub angular_component_b: Vec3,
}

/// Target separating velocity after a bounce.
#[inline(always)]
pub fn restitution_curve(rel_vel: f32, restitution: f32) -> f32 {
    -rel_vel * restitution
}

/// Builds or refreshes the payload of `cp` for this step and applies the warm start.
///
/// The payload is reset when the point's lifetime no longer matches, which means the
/// slot was reused by an unrelated contact.
pub fn prepare_persistent_contact(
    cp: &mut ManifoldPoint,
    body0: &mut SolverBody,
    body1: &mut SolverBody,
    info: &ContactSolverInfo,
) {
    let pos1 = cp.position_world_on_a;
    let pos2 = cp.position_world_on_b;
    let normal = cp.normal_world_on_b;
    let rel_pos1 = pos1 - body0.center_of_mass_position();
    let rel_pos2 = pos2 - body1.center_of_mass_position();

    let mut cpd = match cp.persistent_data.take() {
        Some(mut cpd) => {
            cpd.persistent_lifetime += 1;
            if cpd.persistent_lifetime != cp.lifetime {
                cpd = ConstraintPersistentData::default();
                cpd.persistent_lifetime = cp.lifetime;
            }
            cpd
        }
        None => ConstraintPersistentData {
            persistent_lifetime: cp.lifetime,
            ..Default::default()
        },
    };

    let torque_axis0 = rel_pos1.cross(normal);
    let torque_axis1 = rel_pos2.cross(normal);
    cpd.angular_component_a = body0.inv_inertia_world * torque_axis0;
    cpd.angular_component_b = body1.inv_inertia_world * torque_axis1;
    let jac_diag_ab = body0.inv_mass
        + cpd.angular_component_a.dot(torque_axis0)
        + body1.inv_mass
        + cpd.angular_component_b.dot(torque_axis1);
    debug_assert!(jac_diag_ab > 0.0);
    cpd.jac_diag_ab_inv = 1.0 / jac_diag_ab;

    let vel = body0.velocity_in_local_point(rel_pos1) - body1.velocity_in_local_point(rel_pos2);
    let rel_vel = normal.dot(vel);

    cpd.penetration = cp.distance + info.linear_slop;
    cpd.friction = cp.combined_friction;
    cpd.restitution = restitution_curve(rel_vel, cp.combined_restitution).max(0.0);

    // Restitution and penetration push the same way; keep the larger.
    let pen_vel = -cpd.penetration / info.time_step;
    if cpd.restitution > pen_vel {
        cpd.penetration = 0.0;
    }

    let relaxation = info.damping;
    if info.solver_mode.contains(SolverMode::USE_WARMSTARTING) {
        cpd.applied_impulse *= relaxation;
    } else {
        cpd.applied_impulse = 0.0;
    }
    cpd.prev_applied_impulse = cpd.applied_impulse;

    let (t0, t1) = plane_space(normal);
    cpd.friction_world_tangential0 = t0;
    cpd.friction_world_tangential1 = t1;
    cpd.accumulated_tangent_impulse0 = 0.0;
    cpd.accumulated_tangent_impulse1 = 0.0;

    let denom0 = body0.compute_impulse_denominator(pos1, t0) + body1.compute_impulse_denominator(pos2, t0);
    cpd.jac_diag_ab_inv_tangent0 = relaxation / denom0;
    let denom1 = body0.compute_impulse_denominator(pos1, t1) + body1.compute_impulse_denominator(pos2, t1);
    cpd.jac_diag_ab_inv_tangent1 = relaxation / denom1;

    cpd.friction_angular_component0_a = body0.inv_inertia_world * rel_pos1.cross(t0);
    cpd.friction_angular_component1_a = body0.inv_inertia_world * rel_pos1.cross(t1);
    cpd.friction_angular_component0_b = body1.inv_inertia_world * rel_pos2.cross(t0);
    cpd.friction_angular_component1_b = body1.inv_inertia_world * rel_pos2.cross(t1);

    let total_impulse = normal * cpd.applied_impulse;
    body0.apply_impulse(total_impulse, rel_pos1);
    body1.apply_impulse(-total_impulse, rel_pos2);

    cp.lateral_friction_dir1 = t0;
    cp.lateral_friction_dir2 = t1;
    cp.persistent_data = Some(cpd);
}

/// Normal impulse for one contact, stored on its persistent payload. Returns the delta.
pub fn resolve_single_collision_combined(
    body1: &mut SolverBody,
    body2: &mut SolverBody,
    cp: &mut ManifoldPoint,
    info: &ContactSolverInfo,
) -> f32 {
    let Some(cpd) = cp.persistent_data.as_mut() else {
        return 0.0;
    };
    let normal = cp.normal_world_on_b;
    let rel_pos1 = cp.position_world_on_a - body1.center_of_mass_position();
    let rel_pos2 = cp.position_world_on_b - body2.center_of_mass_position();
    let vel = body1.velocity_in_local_point(rel_pos1) - body2.velocity_in_local_point(rel_pos2);
    let rel_vel = normal.dot(vel);

    let k_cor = info.erp / info.time_step;
    let positional_error = k_cor * -cpd.penetration;
    let velocity_error = cpd.restitution - rel_vel;

    let penetration_impulse = positional_error * cpd.jac_diag_ab_inv;
    let velocity_impulse = velocity_error * cpd.jac_diag_ab_inv;
    let mut normal_impulse = penetration_impulse + velocity_impulse;

    // Clamp the accumulated impulse, not the increment.
    let old_normal_impulse = cpd.applied_impulse;
    cpd.applied_impulse = (old_normal_impulse + normal_impulse).max(0.0);
    normal_impulse = cpd.applied_impulse - old_normal_impulse;

    body1.internal_apply_impulse(normal * body1.inv_mass, cpd.angular_component_a, normal_impulse);
    body2.internal_apply_impulse(normal * body2.inv_mass, cpd.angular_component_b, -normal_impulse);
    normal_impulse
}

/// Two friction rows for one contact, bounded by the current normal impulse.
pub fn resolve_single_friction(
    body1: &mut SolverBody,
    body2: &mut SolverBody,
    cp: &mut ManifoldPoint,
    _info: &ContactSolverInfo,
) -> f32 {
    let Some(cpd) = cp.persistent_data.as_mut() else {
        return 0.0;
    };
    let limit = cpd.applied_impulse * cpd.friction;
    if cpd.applied_impulse > 0.0 {
        let rel_pos1 = cp.position_world_on_a - body1.center_of_mass_position();
        let rel_pos2 = cp.position_world_on_b - body2.center_of_mass_position();
        let vel = body1.velocity_in_local_point(rel_pos1) - body2.velocity_in_local_point(rel_pos2);

        let vrel0 = cpd.friction_world_tangential0.dot(vel);
        let old0 = cpd.accumulated_tangent_impulse0;
        cpd.accumulated_tangent_impulse0 = (old0 - vrel0 * cpd.jac_diag_ab_inv_tangent0).clamp(-limit, limit);
        let j1 = cpd.accumulated_tangent_impulse0 - old0;

        let vrel1 = cpd.friction_world_tangential1.dot(vel);
        let old1 = cpd.accumulated_tangent_impulse1;
        cpd.accumulated_tangent_impulse1 = (old1 - vrel1 * cpd.jac_diag_ab_inv_tangent1).clamp(-limit, limit);
        let j2 = cpd.accumulated_tangent_impulse1 - old1;

        let t0 = cpd.friction_world_tangential0;
        let t1 = cpd.friction_world_tangential1;
        body1.internal_apply_impulse(t0 * body1.inv_mass, cpd.friction_angular_component0_a, j1);
        body1.internal_apply_impulse(t1 * body1.inv_mass, cpd.friction_angular_component1_a, j2);
        body2.internal_apply_impulse(t0 * body2.inv_mass, cpd.friction_angular_component0_b, -j1);
        body2.internal_apply_impulse(t1 * body2.inv_mass, cpd.friction_angular_component1_b, -j2);
    }
    cpd.applied_impulse
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit_body(x: f32, vx: f32) -> SolverBody {
        let mut body = SolverBody::fixed();
        body.world_transform.origin = Vec3::new(x, 0.0, 0.0);
        body.linear_velocity = Vec3::new(vx, 0.0, 0.0);
        body.inv_mass = 1.0;
        body.inv_inertia_diag_local = Vec3::splat(2.5);
        body.inv_inertia_world = glam::Mat3::from_diagonal(Vec3::splat(2.5));
        body
    }

    #[test]
    fn test_persistent_contact_stops_approach() {
        // A on the right moving left into B; normal on B points to A (+X).
        let mut a = unit_body(0.9, -1.0);
        let mut b = unit_body(-0.9, 1.0);
        let mut cp = ManifoldPoint::new(Vec3::new(-0.5, 0.0, 0.0), Vec3::new(0.5, 0.0, 0.0), Vec3::X, 0.0);
        cp.position_world_on_a = Vec3::ZERO;
        cp.position_world_on_b = Vec3::ZERO;
        let info = ContactSolverInfo::default();
        prepare_persistent_contact(&mut cp, &mut a, &mut b, &info);
        for _ in 0..10 {
            resolve_single_collision_combined(&mut a, &mut b, &mut cp, &info);
        }
        let separating = a.linear_velocity.x - b.linear_velocity.x;
        assert!(separating.abs() < 1e-4);
        assert!(cp.persistent_data.as_ref().unwrap().applied_impulse >= 0.0);
    }

    #[test]
    fn test_mismatched_lifetime_resets_payload() {
        let mut a = unit_body(1.0, 0.0);
        let mut b = unit_body(-1.0, 0.0);
        let mut cp = ManifoldPoint::new(Vec3::ZERO, Vec3::ZERO, Vec3::X, 0.0);
        cp.persistent_data = Some(ConstraintPersistentData {
            applied_impulse: 5.0,
            persistent_lifetime: 40,
            ..Default::default()
        });
        cp.lifetime = 2;
        prepare_persistent_contact(&mut cp, &mut a, &mut b, &ContactSolverInfo::default());
        let cpd = cp.persistent_data.unwrap();
        assert_eq!(cpd.applied_impulse, 0.0);
        assert_eq!(cpd.persistent_lifetime, 2);
    }
}
