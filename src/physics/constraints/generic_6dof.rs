use glam::Vec3;

use super::jacobian_entry::JacobianEntry;
use super::solver_body::SolverBody;
use super::typed_constraint::{angular_jacobian, linear_jacobian, ConstraintLink};
use crate::physics::handles::ObjectHandle;
use crate::utilities::math_helper::{matrix_to_euler_xyz, LARGE_FLOAT, SIMD_EPSILON};
use crate::utilities::transform::Transform;

/// Which side of an angular range the current angle is on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LimitState {
    #[default]
    Inside,
    BelowLower,
    AboveUpper,
}

/// Limit and motor for one rotational degree of freedom.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RotationalLimitMotor {
    /// `lo_limit > hi_limit` leaves the axis free.
    pub lo_limit: f32,
    pub hi_limit: f32,
    pub target_velocity: f32,
    pub max_motor_force: f32,
    pub max_limit_force: f32,
    pub damping: f32,
    pub limit_softness: f32,
    pub erp: f32,
    pub bounce: f32,
    pub enable_motor: bool,

    #[cfg_attr(feature = "serde", serde(skip))]
    current_limit_error: f32,
    #[cfg_attr(feature = "serde", serde(skip))]
    current_limit: LimitState,
    #[cfg_attr(feature = "serde", serde(skip))]
    accumulated_impulse: f32,
}

impl Default for RotationalLimitMotor {
    fn default() -> Self {
        Self {
            lo_limit: 1.0,
            hi_limit: -1.0,
            target_velocity: 0.0,
            max_motor_force: 0.1,
            max_limit_force: 300.0,
            damping: 1.0,
            limit_softness: 0.5,
            erp: 0.5,
            bounce: 0.0,
            enable_motor: false,
            current_limit_error: 0.0,
            current_limit: LimitState::Inside,
            accumulated_impulse: 0.0,
        }
    }
}

impl RotationalLimitMotor {
    #[inline]
    pub fn is_limited(&self) -> bool {
        self.lo_limit <= self.hi_limit
    }

    #[inline]
    pub fn need_apply_torques(&self) -> bool {
        self.current_limit != LimitState::Inside || self.enable_motor
    }

    #[inline]
    pub fn current_limit(&self) -> LimitState {
        self.current_limit
    }

    #[inline]
    pub fn accumulated_impulse(&self) -> f32 {
        self.accumulated_impulse
    }

    /// Classifies `test_value` against the range and records the error past the bound.
    pub fn test_limit_value(&mut self, test_value: f32) -> LimitState {
        self.current_limit_error = 0.0;
        self.current_limit = if !self.is_limited() {
            LimitState::Inside
        } else if test_value < self.lo_limit {
            self.current_limit_error = test_value - self.lo_limit;
            LimitState::BelowLower
        } else if test_value > self.hi_limit {
            self.current_limit_error = test_value - self.hi_limit;
            LimitState::AboveUpper
        } else {
            LimitState::Inside
        };
        self.current_limit
    }

    /// Drives the relative angular velocity of B about `axis` (measured against A) and
    /// returns the impulse applied this call.
    pub fn solve_angular_limits(
        &mut self,
        time_step: f32,
        axis: Vec3,
        jac_diag_ab_inv: f32,
        body_a: &mut SolverBody,
        body_b: &mut SolverBody,
    ) -> f32 {
        if !self.need_apply_torques() {
            return 0.0;
        }

        let (target_velocity, max_force) = if self.current_limit != LimitState::Inside {
            (-self.erp * self.current_limit_error / time_step, self.max_limit_force)
        } else {
            (self.target_velocity, self.max_motor_force)
        };
        let max_impulse = max_force * time_step;

        let rel_vel = axis.dot(body_b.angular_velocity - body_a.angular_velocity);
        let motor_rel_vel = self.limit_softness * (target_velocity - self.damping * rel_vel);
        if motor_rel_vel.abs() < SIMD_EPSILON {
            return 0.0;
        }

        let unclamped = (1.0 + self.bounce) * motor_rel_vel * jac_diag_ab_inv;

        // A limit only pushes back inside the range; a motor drives both ways.
        let (lo, hi) = match self.current_limit {
            LimitState::Inside => (-max_impulse, max_impulse),
            LimitState::BelowLower => (0.0, max_impulse),
            LimitState::AboveUpper => (-max_impulse, 0.0),
        };
        let old = self.accumulated_impulse;
        self.accumulated_impulse = (old + unclamped).clamp(lo, hi);
        let impulse = self.accumulated_impulse - old;

        let torque = axis * impulse;
        body_b.apply_torque_impulse(torque);
        body_a.apply_torque_impulse(-torque);
        impulse
    }
}

/// Limits for the three translational degrees of freedom.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TranslationalLimitMotor {
    /// Per axis, `lower > upper` leaves the axis free; equal values lock it.
    pub lower_limit: Vec3,
    pub upper_limit: Vec3,
    pub limit_softness: f32,
    pub damping: f32,
    pub restitution: f32,
    #[cfg_attr(feature = "serde", serde(skip))]
    accumulated_impulse: Vec3,
}

impl Default for TranslationalLimitMotor {
    fn default() -> Self {
        Self {
            lower_limit: Vec3::ZERO,
            upper_limit: Vec3::ZERO,
            limit_softness: 0.7,
            damping: 1.0,
            restitution: 0.5,
            accumulated_impulse: Vec3::ZERO,
        }
    }
}

impl TranslationalLimitMotor {
    #[inline]
    pub fn is_limited(&self, index: usize) -> bool {
        self.upper_limit[index] >= self.lower_limit[index]
    }

    #[inline]
    pub fn accumulated_impulse(&self) -> Vec3 {
        self.accumulated_impulse
    }

    #[allow(clippy::too_many_arguments)]
    pub fn solve_linear_axis(
        &mut self,
        time_step: f32,
        jac_diag_ab_inv: f32,
        body_a: &mut SolverBody,
        point_in_a: Vec3,
        body_b: &mut SolverBody,
        point_in_b: Vec3,
        index: usize,
        axis: Vec3,
    ) -> f32 {
        let rel_pos1 = point_in_a - body_a.center_of_mass_position();
        let rel_pos2 = point_in_b - body_b.center_of_mass_position();

        let vel = body_a.velocity_in_local_point(rel_pos1) - body_b.velocity_in_local_point(rel_pos2);
        let rel_vel = axis.dot(vel);

        // Offset of B's anchor from A's along the axis.
        let mut depth = (point_in_b - point_in_a).dot(axis);
        let min_limit = self.lower_limit[index];
        let max_limit = self.upper_limit[index];
        let mut lo = -LARGE_FLOAT;
        let mut hi = LARGE_FLOAT;

        if min_limit < max_limit {
            if depth > max_limit {
                depth -= max_limit;
                lo = 0.0;
            } else if depth < min_limit {
                depth -= min_limit;
                hi = 0.0;
            } else {
                return 0.0;
            }
        } else {
            depth -= min_limit;
        }

        let normal_impulse =
            self.limit_softness * (self.restitution * depth / time_step - self.damping * rel_vel) * jac_diag_ab_inv;

        let old = self.accumulated_impulse[index];
        self.accumulated_impulse[index] = (old + normal_impulse).clamp(lo, hi);
        let normal_impulse = self.accumulated_impulse[index] - old;

        let impulse_vector = axis * normal_impulse;
        body_a.apply_impulse(impulse_vector, rel_pos1);
        body_b.apply_impulse(-impulse_vector, rel_pos2);
        normal_impulse
    }
}

/// Six degree of freedom joint. Each translation along frame A's axes and each Euler
/// angle of frame B relative to frame A can be free, limited or locked.
#[derive(Debug, Clone, PartialEq)]
pub struct Generic6DofConstraint {
    pub(crate) link: ConstraintLink,
    frame_in_a: Transform,
    frame_in_b: Transform,
    use_linear_reference_frame_a: bool,

    jac_linear: [JacobianEntry; 3],
    jac_ang: [JacobianEntry; 3],

    pub linear_limits: TranslationalLimitMotor,
    pub angular_limits: [RotationalLimitMotor; 3],

    calculated_transform_a: Transform,
    calculated_transform_b: Transform,
    calculated_axis_angle_diff: Vec3,
    calculated_axis: [Vec3; 3],
}

impl Generic6DofConstraint {
    /// Without a body B, `frame_in_b` is in world space.
    pub fn new(
        rb_a: ObjectHandle,
        rb_b: Option<ObjectHandle>,
        frame_in_a: Transform,
        frame_in_b: Transform,
        use_linear_reference_frame_a: bool,
    ) -> Self {
        Self {
            link: ConstraintLink::new(rb_a, rb_b),
            frame_in_a,
            frame_in_b,
            use_linear_reference_frame_a,
            jac_linear: [JacobianEntry::default(); 3],
            jac_ang: [JacobianEntry::default(); 3],
            linear_limits: TranslationalLimitMotor::default(),
            angular_limits: [RotationalLimitMotor::default(); 3],
            calculated_transform_a: Transform::IDENTITY,
            calculated_transform_b: Transform::IDENTITY,
            calculated_axis_angle_diff: Vec3::ZERO,
            calculated_axis: [Vec3::X, Vec3::Y, Vec3::Z],
        }
    }

    pub fn set_linear_lower_limit(&mut self, linear_lower: Vec3) {
        self.linear_limits.lower_limit = linear_lower;
    }

    pub fn set_linear_upper_limit(&mut self, linear_upper: Vec3) {
        self.linear_limits.upper_limit = linear_upper;
    }

    pub fn set_angular_lower_limit(&mut self, angular_lower: Vec3) {
        for (motor, lo) in self.angular_limits.iter_mut().zip(angular_lower.to_array()) {
            motor.lo_limit = lo;
        }
    }

    pub fn set_angular_upper_limit(&mut self, angular_upper: Vec3) {
        for (motor, hi) in self.angular_limits.iter_mut().zip(angular_upper.to_array()) {
            motor.hi_limit = hi;
        }
    }

    /// Sets the range of one degree of freedom: 0..3 are translations, 3..6 rotations.
    pub fn set_limit(&mut self, axis: usize, lo: f32, hi: f32) {
        match axis {
            0..=2 => {
                self.linear_limits.lower_limit[axis] = lo;
                self.linear_limits.upper_limit[axis] = hi;
            }
            3..=5 => {
                self.angular_limits[axis - 3].lo_limit = lo;
                self.angular_limits[axis - 3].hi_limit = hi;
            }
            _ => {}
        }
    }

    #[inline]
    pub fn frame_in_a(&self) -> &Transform {
        &self.frame_in_a
    }

    #[inline]
    pub fn frame_in_b(&self) -> &Transform {
        &self.frame_in_b
    }

    #[inline]
    pub fn calculated_transform_a(&self) -> &Transform {
        &self.calculated_transform_a
    }

    #[inline]
    pub fn calculated_transform_b(&self) -> &Transform {
        &self.calculated_transform_b
    }

    /// Rotation axis of one Euler angle, valid after `calculate_transforms`.
    #[inline]
    pub fn axis(&self, axis_index: usize) -> Vec3 {
        self.calculated_axis[axis_index]
    }

    /// Euler angle of frame B relative to frame A, valid after `calculate_transforms`.
    #[inline]
    pub fn angle(&self, axis_index: usize) -> f32 {
        self.calculated_axis_angle_diff[axis_index]
    }

    /// Refreshes the world frames, relative Euler angles and their rotation axes.
    pub fn calculate_transforms(&mut self, body_a: &SolverBody, body_b: &SolverBody) {
        self.calculated_transform_a = body_a.world_transform * self.frame_in_a;
        self.calculated_transform_b = body_b.world_transform * self.frame_in_b;

        let basis_a = self.calculated_transform_a.basis;
        let basis_b = self.calculated_transform_b.basis;
        self.calculated_axis_angle_diff = matrix_to_euler_xyz(basis_a.transpose() * basis_b);

        // Axes of the XYZ Euler decomposition in world space.
        let axis0 = basis_b.x_axis;
        let axis2 = basis_a.z_axis;
        let axis1 = axis2.cross(axis0);
        self.calculated_axis = [
            axis1.cross(axis2).normalize_or_zero(),
            axis1.normalize_or_zero(),
            axis0.cross(axis1).normalize_or_zero(),
        ];
    }

    fn test_angular_limit_motor(&mut self, axis_index: usize) -> bool {
        let angle = self.calculated_axis_angle_diff[axis_index];
        let motor = &mut self.angular_limits[axis_index];
        motor.test_limit_value(angle);
        motor.need_apply_torques()
    }

    fn linear_axis(&self, index: usize) -> Vec3 {
        if self.use_linear_reference_frame_a {
            self.calculated_transform_a.basis.col(index)
        } else {
            self.calculated_transform_b.basis.col(index)
        }
    }

    pub fn build_jacobian(&mut self, body_a: &SolverBody, body_b: &SolverBody) {
        self.link.applied_impulse = 0.0;
        self.linear_limits.accumulated_impulse = Vec3::ZERO;
        for motor in &mut self.angular_limits {
            motor.accumulated_impulse = 0.0;
        }

        self.calculate_transforms(body_a, body_b);

        let pivot_a_in_w = self.calculated_transform_a.origin;
        let pivot_b_in_w = self.calculated_transform_b.origin;
        for i in 0..3 {
            if self.linear_limits.is_limited(i) {
                let normal_world = self.linear_axis(i);
                self.jac_linear[i] = linear_jacobian(body_a, body_b, pivot_a_in_w, pivot_b_in_w, normal_world);
            }
        }

        for i in 0..3 {
            if self.test_angular_limit_motor(i) {
                self.jac_ang[i] = angular_jacobian(body_a, body_b, self.calculated_axis[i]);
            }
        }
    }

    pub fn solve_constraint(&mut self, body_a: &mut SolverBody, body_b: &mut SolverBody, time_step: f32) {
        let point_in_a = self.calculated_transform_a.origin;
        let point_in_b = self.calculated_transform_b.origin;

        for i in 0..3 {
            if self.linear_limits.is_limited(i) {
                let jac_diag_ab_inv = self.jac_linear[i].diagonal_inv();
                let axis = self.linear_axis(i);
                self.link.applied_impulse += self.linear_limits.solve_linear_axis(
                    time_step,
                    jac_diag_ab_inv,
                    body_a,
                    point_in_a,
                    body_b,
                    point_in_b,
                    i,
                    axis,
                );
            }
        }

        for i in 0..3 {
            if self.angular_limits[i].need_apply_torques() {
                let jac_diag_ab_inv = self.jac_ang[i].diagonal_inv();
                let axis = self.calculated_axis[i];
                self.angular_limits[i].solve_angular_limits(time_step, axis, jac_diag_ab_inv, body_a, body_b);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use glam::{Mat3, Quat};

    fn dynamic_body() -> SolverBody {
        let mut body = SolverBody::fixed();
        body.inv_mass = 1.0;
        body.inv_inertia_diag_local = Vec3::ONE;
        body.inv_inertia_world = Mat3::IDENTITY;
        body
    }

    #[test]
    fn test_default_axes_are_free_rotations_and_locked_translations() {
        let dof = Generic6DofConstraint::new(ObjectHandle::default(), None, Transform::IDENTITY, Transform::IDENTITY, true);
        assert!((0..3).all(|i| dof.linear_limits.is_limited(i)));
        assert!(dof.angular_limits.iter().all(|m| !m.is_limited()));
    }

    #[test]
    fn test_relative_angle_of_b_in_a() {
        let mut body = dynamic_body();
        body.world_transform.basis = Mat3::from_quat(Quat::from_rotation_x(0.5));
        let mut dof = Generic6DofConstraint::new(ObjectHandle::default(), None, Transform::IDENTITY, Transform::IDENTITY, true);
        dof.calculate_transforms(&body, &SolverBody::fixed());
        assert_relative_eq!(dof.angle(0), -0.5, epsilon = 1e-5);
        assert_relative_eq!(dof.axis(0), Vec3::X, epsilon = 1e-5);
    }

    #[test]
    fn test_angular_limit_rotates_back_into_range() {
        let mut body = dynamic_body();
        body.world_transform.basis = Mat3::from_quat(Quat::from_rotation_x(0.5));
        let mut fixed = SolverBody::fixed();
        let mut dof = Generic6DofConstraint::new(ObjectHandle::default(), None, Transform::IDENTITY, Transform::IDENTITY, true);
        dof.set_angular_lower_limit(Vec3::new(-0.2, 0.0, 0.0));
        dof.set_angular_upper_limit(Vec3::new(0.2, 0.0, 0.0));
        dof.build_jacobian(&body, &fixed);
        assert_eq!(dof.angular_limits[0].current_limit(), LimitState::BelowLower);
        dof.solve_constraint(&mut body, &mut fixed, 1.0 / 60.0);
        assert!(body.angular_velocity.x < 0.0);
        assert_eq!(fixed.angular_velocity, Vec3::ZERO);
    }

    #[test]
    fn test_motor_spins_up_free_axis() {
        let mut body = dynamic_body();
        let mut fixed = SolverBody::fixed();
        let mut dof = Generic6DofConstraint::new(ObjectHandle::default(), None, Transform::IDENTITY, Transform::IDENTITY, true);
        dof.angular_limits[2].enable_motor = true;
        dof.angular_limits[2].target_velocity = 1.0;
        dof.angular_limits[2].max_motor_force = 1000.0;
        dof.build_jacobian(&body, &fixed);
        for _ in 0..20 {
            dof.solve_constraint(&mut body, &mut fixed, 1.0 / 60.0);
        }
        // The motor drives B relative to A, so A spins the other way.
        assert!(body.angular_velocity.z < 0.0);
    }

    #[test]
    fn test_linear_range_is_unilateral_inside_bounds() {
        let mut body = dynamic_body();
        let mut fixed = SolverBody::fixed();
        let mut dof = Generic6DofConstraint::new(ObjectHandle::default(), None, Transform::IDENTITY, Transform::IDENTITY, true);
        dof.set_linear_lower_limit(Vec3::splat(-1.0));
        dof.set_linear_upper_limit(Vec3::splat(1.0));
        body.linear_velocity = Vec3::new(0.5, 0.0, 0.0);
        dof.build_jacobian(&body, &fixed);
        dof.solve_constraint(&mut body, &mut fixed, 1.0 / 60.0);
        assert_eq!(body.linear_velocity, Vec3::new(0.5, 0.0, 0.0));
    }
}
