use glam::Vec3;

use super::jacobian_entry::JacobianEntry;
use super::solver_body::SolverBody;
use super::typed_constraint::{linear_jacobian, ConstraintLink};
use crate::physics::handles::ObjectHandle;
use crate::utilities::math_helper::{atan2_fast, plane_space, shortest_arc_quat, LARGE_FLOAT, SIMD_EPSILON};
use crate::utilities::transform::Transform;

// Sharpens the swing fade-in near the cone axis.
const SWING_THRESHOLD: f32 = 10.0;

/// Ball joint whose swing is bounded by an elliptic cone about the frames' X axes, plus a
/// twist limit about that axis.
#[derive(Debug, Clone, PartialEq)]
pub struct ConeTwistConstraint {
    pub(crate) link: ConstraintLink,
    jac: [JacobianEntry; 3],
    rb_a_frame: Transform,
    rb_b_frame: Transform,

    limit_softness: f32,
    bias_factor: f32,
    relaxation_factor: f32,

    swing_span1: f32,
    swing_span2: f32,
    twist_span: f32,

    swing_axis: Vec3,
    twist_axis: Vec3,
    k_swing: f32,
    k_twist: f32,
    twist_limit_sign: f32,
    swing_correction: f32,
    twist_correction: f32,
    acc_swing_limit_impulse: f32,
    acc_twist_limit_impulse: f32,

    angular_only: bool,
    solve_twist_limit: bool,
    solve_swing_limit: bool,
}

impl ConeTwistConstraint {
    /// Without a body B, `rb_b_frame` is in world space.
    pub fn new(rb_a: ObjectHandle, rb_b: Option<ObjectHandle>, rb_a_frame: Transform, rb_b_frame: Transform) -> Self {
        Self {
            link: ConstraintLink::new(rb_a, rb_b),
            jac: [JacobianEntry::default(); 3],
            rb_a_frame,
            rb_b_frame,
            limit_softness: 0.8,
            bias_factor: 0.3,
            relaxation_factor: 1.0,
            swing_span1: LARGE_FLOAT,
            swing_span2: LARGE_FLOAT,
            twist_span: LARGE_FLOAT,
            swing_axis: Vec3::ZERO,
            twist_axis: Vec3::ZERO,
            k_swing: 0.0,
            k_twist: 0.0,
            twist_limit_sign: 0.0,
            swing_correction: 0.0,
            twist_correction: 0.0,
            acc_swing_limit_impulse: 0.0,
            acc_twist_limit_impulse: 0.0,
            angular_only: false,
            solve_twist_limit: false,
            solve_swing_limit: false,
        }
    }

    pub fn set_angular_only(&mut self, angular_only: bool) {
        self.angular_only = angular_only;
    }

    pub fn set_limit(&mut self, swing_span1: f32, swing_span2: f32, twist_span: f32) {
        self.set_limit_with(swing_span1, swing_span2, twist_span, 0.8, 0.3, 1.0);
    }

    pub fn set_limit_with(
        &mut self,
        swing_span1: f32,
        swing_span2: f32,
        twist_span: f32,
        softness: f32,
        bias_factor: f32,
        relaxation_factor: f32,
    ) {
        self.swing_span1 = swing_span1;
        self.swing_span2 = swing_span2;
        self.twist_span = twist_span;
        self.limit_softness = softness;
        self.bias_factor = bias_factor;
        self.relaxation_factor = relaxation_factor;
    }

    #[inline]
    pub fn solve_swing_limit(&self) -> bool {
        self.solve_swing_limit
    }

    #[inline]
    pub fn solve_twist_limit(&self) -> bool {
        self.solve_twist_limit
    }

    fn angular_k(body_a: &SolverBody, body_b: &SolverBody, axis: Vec3) -> f32 {
        let denom = body_a.compute_angular_impulse_denominator(axis) + body_b.compute_angular_impulse_denominator(axis);
        if denom > SIMD_EPSILON {
            1.0 / denom
        } else {
            0.0
        }
    }

    pub fn build_jacobian(&mut self, body_a: &SolverBody, body_b: &SolverBody) {
        self.link.applied_impulse = 0.0;

        self.swing_correction = 0.0;
        self.twist_limit_sign = 0.0;
        self.solve_twist_limit = false;
        self.solve_swing_limit = false;
        self.acc_twist_limit_impulse = 0.0;
        self.acc_swing_limit_impulse = 0.0;

        if !self.angular_only {
            let pivot_a_in_w = body_a.world_transform.transform_point(self.rb_a_frame.origin);
            let pivot_b_in_w = body_b.world_transform.transform_point(self.rb_b_frame.origin);
            let rel_pos = pivot_b_in_w - pivot_a_in_w;
            let normal0 = if rel_pos.length_squared() > SIMD_EPSILON {
                rel_pos.normalize()
            } else {
                Vec3::X
            };
            let (normal1, normal2) = plane_space(normal0);
            for (i, normal) in [normal0, normal1, normal2].into_iter().enumerate() {
                self.jac[i] = linear_jacobian(body_a, body_b, pivot_a_in_w, pivot_b_in_w, normal);
            }
        }

        let basis_a = body_a.world_transform.basis;
        let basis_b = body_b.world_transform.basis;
        let b1_axis1 = basis_a * self.rb_a_frame.basis.x_axis;
        let b1_axis2 = basis_a * self.rb_a_frame.basis.y_axis;
        let b1_axis3 = basis_a * self.rb_a_frame.basis.z_axis;
        let b2_axis1 = basis_b * self.rb_b_frame.basis.x_axis;

        let mut swing1 = 0.0;
        let mut swing2 = 0.0;
        let fade = |swx: f32, swy: f32| {
            let fact = (swy * swy + swx * swx) * SWING_THRESHOLD * SWING_THRESHOLD;
            fact / (fact + 1.0)
        };

        if self.swing_span1 >= 0.05 {
            let swx = b2_axis1.dot(b1_axis1);
            let swy = b2_axis1.dot(b1_axis2);
            swing1 = atan2_fast(swy, swx) * fade(swx, swy);
        }
        if self.swing_span2 >= 0.05 {
            let swx = b2_axis1.dot(b1_axis1);
            let swy = b2_axis1.dot(b1_axis3);
            swing2 = atan2_fast(swy, swx) * fade(swx, swy);
        }

        let r_max_angle1_sq = 1.0 / (self.swing_span1 * self.swing_span1);
        let r_max_angle2_sq = 1.0 / (self.swing_span2 * self.swing_span2);
        let ellipse_angle = swing1 * swing1 * r_max_angle1_sq + swing2 * swing2 * r_max_angle2_sq;

        if ellipse_angle > 1.0 {
            self.swing_correction = ellipse_angle - 1.0;
            self.solve_swing_limit = true;

            // Correction axis from the ellipse gradient.
            let swing_axis = b2_axis1.cross(b1_axis2 * b2_axis1.dot(b1_axis2) + b1_axis3 * b2_axis1.dot(b1_axis3));
            let swing_axis_sign = if b2_axis1.dot(b1_axis1) >= 0.0 { 1.0 } else { -1.0 };
            self.swing_axis = swing_axis.normalize_or_zero() * swing_axis_sign;
            self.k_swing = Self::angular_k(body_a, body_b, self.swing_axis);
        }

        if self.twist_span >= 0.0 {
            let b2_axis2 = basis_b * self.rb_b_frame.basis.y_axis;
            let rotation_arc = shortest_arc_quat(b2_axis1, b1_axis1);
            let twist_ref = rotation_arc * b2_axis2;
            let twist = atan2_fast(twist_ref.dot(b1_axis3), twist_ref.dot(b1_axis2));

            let locked_free_factor = if self.twist_span > 0.05 { self.limit_softness } else { 0.0 };
            if twist <= -self.twist_span * locked_free_factor {
                self.twist_correction = -(twist + self.twist_span);
                self.solve_twist_limit = true;
                self.twist_axis = -(b2_axis1 + b1_axis1).normalize_or_zero();
                self.twist_limit_sign = -1.0;
                self.k_twist = Self::angular_k(body_a, body_b, self.twist_axis);
            } else if twist > self.twist_span * locked_free_factor {
                self.twist_correction = twist - self.twist_span;
                self.solve_twist_limit = true;
                self.twist_axis = (b2_axis1 + b1_axis1).normalize_or_zero();
                self.twist_limit_sign = 1.0;
                self.k_twist = Self::angular_k(body_a, body_b, self.twist_axis);
            }
        }
    }

    pub fn solve_constraint(&mut self, body_a: &mut SolverBody, body_b: &mut SolverBody, time_step: f32) {
        let pivot_a_in_w = body_a.world_transform.transform_point(self.rb_a_frame.origin);
        let pivot_b_in_w = body_b.world_transform.transform_point(self.rb_b_frame.origin);
        let tau = 0.3;

        if !self.angular_only {
            let rel_pos1 = pivot_a_in_w - body_a.center_of_mass_position();
            let rel_pos2 = pivot_b_in_w - body_b.center_of_mass_position();
            for jac in &self.jac {
                let normal = jac.linear_joint_axis;
                let jac_diag_ab_inv = jac.diagonal_inv();
                let vel = body_a.velocity_in_local_point(rel_pos1) - body_b.velocity_in_local_point(rel_pos2);
                let rel_vel = normal.dot(vel);
                let depth = -(pivot_a_in_w - pivot_b_in_w).dot(normal);
                let impulse = depth * tau / time_step * jac_diag_ab_inv - rel_vel * jac_diag_ab_inv;
                self.link.applied_impulse += impulse;
                let impulse_vector = normal * impulse;
                body_a.apply_impulse(impulse_vector, rel_pos1);
                body_b.apply_impulse(-impulse_vector, rel_pos2);
            }
        }

        let ang_vel_a = body_a.angular_velocity;
        let ang_vel_b = body_b.angular_velocity;
        let relaxation_sq = self.relaxation_factor * self.relaxation_factor;

        if self.solve_swing_limit {
            let amplitude = (ang_vel_b - ang_vel_a).dot(self.swing_axis) * relaxation_sq
                + self.swing_correction * (1.0 / time_step) * self.bias_factor;
            let impulse_mag = amplitude * self.k_swing;

            // Accumulated swing impulse only pushes back into the cone.
            let temp = self.acc_swing_limit_impulse;
            self.acc_swing_limit_impulse = (self.acc_swing_limit_impulse + impulse_mag).max(0.0);
            let impulse = self.swing_axis * (self.acc_swing_limit_impulse - temp);
            body_a.apply_torque_impulse(impulse);
            body_b.apply_torque_impulse(-impulse);
        }

        if self.solve_twist_limit {
            let amplitude = (ang_vel_b - ang_vel_a).dot(self.twist_axis) * relaxation_sq
                + self.twist_correction * (1.0 / time_step) * self.bias_factor;
            let impulse_mag = amplitude * self.k_twist;

            let temp = self.acc_twist_limit_impulse;
            self.acc_twist_limit_impulse = (self.acc_twist_limit_impulse + impulse_mag).max(0.0);
            let impulse = self.twist_axis * (self.acc_twist_limit_impulse - temp);
            body_a.apply_torque_impulse(impulse);
            body_b.apply_torque_impulse(-impulse);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::{Mat3, Quat};

    fn dynamic_body() -> SolverBody {
        let mut body = SolverBody::fixed();
        body.inv_mass = 1.0;
        body.inv_inertia_diag_local = Vec3::ONE;
        body.inv_inertia_world = Mat3::IDENTITY;
        body
    }

    #[test]
    fn test_inside_cone_is_inactive() {
        let mut cone = ConeTwistConstraint::new(ObjectHandle::default(), None, Transform::IDENTITY, Transform::IDENTITY);
        cone.set_limit(0.5, 0.5, 0.5);
        cone.build_jacobian(&dynamic_body(), &SolverBody::fixed());
        assert!(!cone.solve_swing_limit());
        assert!(!cone.solve_twist_limit());
    }

    #[test]
    fn test_swing_past_cone_is_pushed_back() {
        let mut body = dynamic_body();
        // Fixed B is tilted 0.8 rad about Z, swinging its X axis out of A's 0.3 rad cone.
        let mut fixed = SolverBody::fixed();
        fixed.world_transform.basis = Mat3::from_quat(Quat::from_rotation_z(0.8));
        let mut cone = ConeTwistConstraint::new(ObjectHandle::default(), None, Transform::IDENTITY, Transform::IDENTITY);
        cone.set_angular_only(true);
        cone.set_limit(0.3, 0.3, LARGE_FLOAT);
        cone.build_jacobian(&body, &fixed);
        assert!(cone.solve_swing_limit());
        cone.solve_constraint(&mut body, &mut fixed, 1.0 / 60.0);
        // A turns towards B about +Z.
        assert!(body.angular_velocity.z > 0.0);
    }
}
