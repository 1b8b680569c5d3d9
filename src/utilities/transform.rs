use glam::{Mat3, Quat, Vec3};
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use std::ops::Mul;

/// Largest rotation integrated in one step. Faster spins are clamped to avoid aliasing.
const ANGULAR_MOTION_THRESHOLD: f32 = 0.5 * std::f32::consts::FRAC_PI_2;

/// Rigid transform: an orthonormal rotation basis followed by a translation.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Transform {
    pub basis: Mat3,
    pub origin: Vec3,
}

impl Default for Transform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Transform {
    pub const IDENTITY: Self = Self {
        basis: Mat3::IDENTITY,
        origin: Vec3::ZERO,
    };

    #[inline]
    pub fn new(basis: Mat3, origin: Vec3) -> Self {
        Self { basis, origin }
    }

    #[inline]
    pub fn from_translation(origin: Vec3) -> Self {
        Self {
            basis: Mat3::IDENTITY,
            origin,
        }
    }

    #[inline]
    pub fn from_rotation_translation(rotation: Quat, origin: Vec3) -> Self {
        Self {
            basis: Mat3::from_quat(rotation),
            origin,
        }
    }

    /// Rotation part as a normalized quaternion.
    #[inline]
    pub fn rotation(&self) -> Quat {
        Quat::from_mat3(&self.basis).normalize()
    }

    #[inline]
    pub fn set_rotation(&mut self, rotation: Quat) {
        self.basis = Mat3::from_quat(rotation);
    }

    #[inline(always)]
    pub fn transform_point(&self, point: Vec3) -> Vec3 {
        self.basis * point + self.origin
    }

    #[inline(always)]
    pub fn transform_vector(&self, vector: Vec3) -> Vec3 {
        self.basis * vector
    }

    /// Maps a world point into this transform's local space.
    #[inline(always)]
    pub fn inv_xform(&self, point: Vec3) -> Vec3 {
        self.basis.transpose() * (point - self.origin)
    }

    #[inline]
    pub fn inverse(&self) -> Self {
        let inv = self.basis.transpose();
        Self {
            basis: inv,
            origin: inv * -self.origin,
        }
    }

    /// Computes `self⁻¹ * other`, the pose of `other` expressed in this transform's frame.
    #[inline]
    pub fn inverse_times(&self, other: &Transform) -> Self {
        let inv = self.basis.transpose();
        Self {
            basis: inv * other.basis,
            origin: inv * (other.origin - self.origin),
        }
    }
}

impl Mul for Transform {
    type Output = Transform;

    #[inline]
    fn mul(self, rhs: Transform) -> Transform {
        Transform {
            basis: self.basis * rhs.basis,
            origin: self.transform_point(rhs.origin),
        }
    }
}

/// Integrates a transform forward by the given velocities using the exponential map.
pub fn integrate_transform(
    current: &Transform,
    linear_velocity: Vec3,
    angular_velocity: Vec3,
    time_step: f32,
) -> Transform {
    let origin = current.origin + linear_velocity * time_step;

    let mut angle = angular_velocity.length();
    if angle * time_step > ANGULAR_MOTION_THRESHOLD {
        angle = ANGULAR_MOTION_THRESHOLD / time_step;
    }

    let axis = if angle < 0.001 {
        // Taylor expansion of sin(x/2)/x; avoids dividing by a vanishing angle.
        angular_velocity
            * (0.5 * time_step
                - (time_step * time_step * time_step) * 0.020_833_334 * angle * angle)
    } else {
        angular_velocity * ((0.5 * angle * time_step).sin() / angle)
    };
    let delta = Quat::from_xyzw(axis.x, axis.y, axis.z, (angle * time_step * 0.5).cos());
    let rotation = (delta * current.rotation()).normalize();

    Transform::from_rotation_translation(rotation, origin)
}

/// Returns the axis and angle of the rotation taking `t0` to `t1`.
pub fn calculate_diff_axis_angle(t0: &Transform, t1: &Transform) -> (Vec3, f32) {
    let delta = t1.basis * t0.basis.transpose();
    let mut q = Quat::from_mat3(&delta).normalize();
    if q.w < 0.0 {
        q = -q;
    }
    let angle = 2.0 * q.w.clamp(-1.0, 1.0).acos();
    let axis = Vec3::new(q.x, q.y, q.z);
    let len2 = axis.length_squared();
    if len2 < f32::EPSILON * f32::EPSILON {
        (Vec3::X, angle)
    } else {
        (axis / len2.sqrt(), angle)
    }
}

/// Recovers the linear and angular velocity that moves `t0` to `t1` in `time_step`.
pub fn calculate_velocity(t0: &Transform, t1: &Transform, time_step: f32) -> (Vec3, Vec3) {
    let linear = (t1.origin - t0.origin) / time_step;
    let (axis, angle) = calculate_diff_axis_angle(t0, t1);
    (linear, axis * angle / time_step)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_inverse_round_trip() {
        let t = Transform::from_rotation_translation(
            Quat::from_axis_angle(Vec3::new(1.0, 1.0, 0.0).normalize(), 0.7),
            Vec3::new(1.0, -2.0, 3.0),
        );
        let p = Vec3::new(0.5, 0.25, -4.0);
        let back = t.inv_xform(t.transform_point(p));
        assert_relative_eq!(back.x, p.x, epsilon = 1e-5);
        assert_relative_eq!(back.y, p.y, epsilon = 1e-5);
        assert_relative_eq!(back.z, p.z, epsilon = 1e-5);

        let identity = t.inverse() * t;
        assert_relative_eq!(identity.origin.length(), 0.0, epsilon = 1e-5);
    }

    #[test]
    fn test_integrate_and_recover_velocity() {
        let start = Transform::IDENTITY;
        let linear = Vec3::new(1.0, 0.0, -2.0);
        let angular = Vec3::new(0.0, 0.5, 0.0);
        let dt = 1.0 / 60.0;
        let end = integrate_transform(&start, linear, angular, dt);
        let (lin, ang) = calculate_velocity(&start, &end, dt);
        assert_relative_eq!(lin.x, linear.x, epsilon = 1e-3);
        assert_relative_eq!(lin.z, linear.z, epsilon = 1e-3);
        assert_relative_eq!(ang.y, angular.y, epsilon = 1e-2);
    }
}
