use glam::{Mat3, Vec3};

use super::jacobian_entry::JacobianEntry;
use super::solver_body::SolverBody;
use super::typed_constraint::{linear_jacobian, ConstraintLink};
use crate::physics::handles::ObjectHandle;
use crate::utilities::math_helper::{atan2_fast, plane_space, shortest_arc_quat, LARGE_FLOAT, SIMD_EPSILON};
use crate::utilities::transform::Transform;

/// Revolute joint: one rotational degree of freedom about the frames' Z axes, with an
/// optional angle limit and velocity motor.
///
/// The limit is free while `lower_limit > upper_limit`, locked when they are equal and
/// one-sided between.
#[derive(Debug, Clone, PartialEq)]
pub struct HingeConstraint {
    pub(crate) link: ConstraintLink,
    jac: [JacobianEntry; 3],
    rb_a_frame: Transform,
    rb_b_frame: Transform,

    motor_target_velocity: f32,
    max_motor_impulse: f32,
    enable_angular_motor: bool,

    limit_softness: f32,
    bias_factor: f32,
    relaxation_factor: f32,
    lower_limit: f32,
    upper_limit: f32,

    k_hinge: f32,
    limit_sign: f32,
    correction: f32,
    acc_limit_impulse: f32,
    solve_limit: bool,
    locked: bool,

    angular_only: bool,
}

impl HingeConstraint {
    /// Hinge about `axis_in_a` / `axis_in_b` through the given pivots, all in each body's
    /// local frame. Without a body B, pivot and axis B are in world space. The current
    /// relative orientation is taken as angle zero.
    pub fn new(
        rb_a: ObjectHandle,
        rb_b: Option<ObjectHandle>,
        pivot_in_a: Vec3,
        pivot_in_b: Vec3,
        axis_in_a: Vec3,
        axis_in_b: Vec3,
    ) -> Self {
        let axis_in_a = axis_in_a.normalize();
        let axis_in_b = axis_in_b.normalize();

        let projection = axis_in_a.dot(Vec3::X);
        let (rb_axis_a1, rb_axis_a2) = if projection >= 1.0 - SIMD_EPSILON {
            (-Vec3::Z, Vec3::Y)
        } else if projection <= -1.0 + SIMD_EPSILON {
            (Vec3::Z, Vec3::Y)
        } else {
            let a2 = axis_in_a.cross(Vec3::X).normalize();
            (a2.cross(axis_in_a), a2)
        };
        let rb_a_frame = Transform::new(Mat3::from_cols(rb_axis_a1, rb_axis_a2, axis_in_a), pivot_in_a);

        let rotation_arc = shortest_arc_quat(axis_in_a, axis_in_b);
        let rb_axis_b1 = rotation_arc * rb_axis_a1;
        let rb_axis_b2 = axis_in_b.cross(rb_axis_b1);
        let rb_b_frame = Transform::new(Mat3::from_cols(rb_axis_b1, rb_axis_b2, axis_in_b), pivot_in_b);

        Self::from_frames(rb_a, rb_b, rb_a_frame, rb_b_frame)
    }

    /// Hinge between two explicit joint frames. The hinge axis is each frame's Z column.
    pub fn from_frames(rb_a: ObjectHandle, rb_b: Option<ObjectHandle>, rb_a_frame: Transform, rb_b_frame: Transform) -> Self {
        Self {
            link: ConstraintLink::new(rb_a, rb_b),
            jac: [JacobianEntry::default(); 3],
            rb_a_frame,
            rb_b_frame,
            motor_target_velocity: 0.0,
            max_motor_impulse: 0.0,
            enable_angular_motor: false,
            limit_softness: 0.9,
            bias_factor: 0.3,
            relaxation_factor: 1.0,
            lower_limit: LARGE_FLOAT,
            upper_limit: -LARGE_FLOAT,
            k_hinge: 0.0,
            limit_sign: 0.0,
            correction: 0.0,
            acc_limit_impulse: 0.0,
            solve_limit: false,
            locked: false,
            angular_only: false,
        }
    }

    pub fn set_angular_only(&mut self, angular_only: bool) {
        self.angular_only = angular_only;
    }

    pub fn enable_angular_motor(&mut self, enable: bool, target_velocity: f32, max_motor_impulse: f32) {
        self.enable_angular_motor = enable;
        self.motor_target_velocity = target_velocity;
        self.max_motor_impulse = max_motor_impulse;
    }

    pub fn set_limit(&mut self, low: f32, high: f32) {
        self.set_limit_with(low, high, 0.9, 0.3, 1.0);
    }

    pub fn set_limit_with(&mut self, low: f32, high: f32, softness: f32, bias_factor: f32, relaxation_factor: f32) {
        self.lower_limit = low;
        self.upper_limit = high;
        self.limit_softness = softness;
        self.bias_factor = bias_factor;
        self.relaxation_factor = relaxation_factor;
    }

    #[inline]
    pub fn lower_limit(&self) -> f32 {
        self.lower_limit
    }

    #[inline]
    pub fn upper_limit(&self) -> f32 {
        self.upper_limit
    }

    #[inline]
    pub fn solve_limit(&self) -> bool {
        self.solve_limit
    }

    #[inline]
    pub fn frame_a(&self) -> &Transform {
        &self.rb_a_frame
    }

    #[inline]
    pub fn frame_b(&self) -> &Transform {
        &self.rb_b_frame
    }

    /// Signed angle of B's reference axis measured in A's hinge plane.
    pub fn hinge_angle(&self, body_a: &SolverBody, body_b: &SolverBody) -> f32 {
        let basis_a = body_a.world_transform.basis;
        let ref_axis0 = basis_a * self.rb_a_frame.basis.x_axis;
        let ref_axis1 = basis_a * self.rb_a_frame.basis.y_axis;
        let swing_axis = body_b.world_transform.basis * self.rb_b_frame.basis.y_axis;
        atan2_fast(swing_axis.dot(ref_axis0), swing_axis.dot(ref_axis1))
    }

    pub fn build_jacobian(&mut self, body_a: &SolverBody, body_b: &SolverBody) {
        self.link.applied_impulse = 0.0;

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

        let hinge_angle = self.hinge_angle(body_a, body_b);

        self.correction = 0.0;
        self.limit_sign = 0.0;
        self.solve_limit = false;
        self.locked = false;
        self.acc_limit_impulse = 0.0;

        if self.lower_limit == self.upper_limit {
            self.correction = self.lower_limit - hinge_angle;
            self.limit_sign = 1.0;
            self.solve_limit = true;
            self.locked = true;
        } else if self.lower_limit < self.upper_limit {
            if hinge_angle <= self.lower_limit * self.limit_softness {
                self.correction = self.lower_limit - hinge_angle;
                self.limit_sign = 1.0;
                self.solve_limit = true;
            } else if hinge_angle >= self.upper_limit * self.limit_softness {
                self.correction = self.upper_limit - hinge_angle;
                self.limit_sign = -1.0;
                self.solve_limit = true;
            }
        }

        // K = J W Jᵀ about the hinge axis.
        let axis_a = body_a.world_transform.basis * self.rb_a_frame.basis.z_axis;
        let denom = body_a.compute_angular_impulse_denominator(axis_a) + body_b.compute_angular_impulse_denominator(axis_a);
        self.k_hinge = if denom > SIMD_EPSILON { 1.0 / denom } else { 0.0 };
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

        let axis_a = body_a.world_transform.basis * self.rb_a_frame.basis.z_axis;
        let axis_b = body_b.world_transform.basis * self.rb_b_frame.basis.z_axis;

        let ang_vel_a = body_a.angular_velocity;
        let ang_vel_b = body_b.angular_velocity;
        let ang_vel_around_hinge_axis_a = axis_a * axis_a.dot(ang_vel_a);
        let ang_vel_around_hinge_axis_b = axis_b * axis_b.dot(ang_vel_b);

        let ang_a_orthog = ang_vel_a - ang_vel_around_hinge_axis_a;
        let ang_b_orthog = ang_vel_b - ang_vel_around_hinge_axis_b;
        let mut velrel_orthog = ang_a_orthog - ang_b_orthog;

        // Orthogonal angular velocity correction.
        let len = velrel_orthog.length();
        if len > 0.00001 {
            let normal = velrel_orthog / len;
            let denom = body_a.compute_angular_impulse_denominator(normal) + body_b.compute_angular_impulse_denominator(normal);
            if denom > SIMD_EPSILON {
                velrel_orthog *= (1.0 / denom) * self.relaxation_factor;
            }
        }

        // Angular positional correction, rotating the axes towards each other.
        let mut angular_error = axis_a.cross(axis_b) * (1.0 / time_step);
        let len2 = angular_error.length();
        if len2 > 0.00001 {
            let normal2 = angular_error / len2;
            let denom2 = body_a.compute_angular_impulse_denominator(normal2) + body_b.compute_angular_impulse_denominator(normal2);
            if denom2 > SIMD_EPSILON {
                angular_error *= 1.0 / denom2;
            }
        }

        body_a.apply_torque_impulse(-velrel_orthog + angular_error);
        body_b.apply_torque_impulse(velrel_orthog - angular_error);

        if self.solve_limit {
            let amplitude = ((ang_vel_b - ang_vel_a).dot(axis_a) * self.relaxation_factor
                + self.correction * (1.0 / time_step) * self.bias_factor)
                * self.limit_sign;
            let mut impulse_mag = amplitude * self.k_hinge;

            // A locked hinge pushes both ways; a one-sided limit only pushes out.
            let temp = self.acc_limit_impulse;
            self.acc_limit_impulse = if self.locked {
                self.acc_limit_impulse + impulse_mag
            } else {
                (self.acc_limit_impulse + impulse_mag).max(0.0)
            };
            impulse_mag = self.acc_limit_impulse - temp;

            let impulse = axis_a * impulse_mag * self.limit_sign;
            body_a.apply_torque_impulse(impulse);
            body_b.apply_torque_impulse(-impulse);
        }

        if self.enable_angular_motor {
            let velrel = ang_vel_around_hinge_axis_a - ang_vel_around_hinge_axis_b;
            let proj_rel_vel = velrel.dot(axis_a);
            let motor_relvel = self.motor_target_velocity - proj_rel_vel;
            let unclipped_motor_impulse = self.k_hinge * motor_relvel;
            let clipped_motor_impulse = unclipped_motor_impulse.clamp(-self.max_motor_impulse, self.max_motor_impulse);
            let motor_imp = axis_a * clipped_motor_impulse;
            body_a.apply_torque_impulse(motor_imp);
            body_b.apply_torque_impulse(-motor_imp);
        }
    }
}
