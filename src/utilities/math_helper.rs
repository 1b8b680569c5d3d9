use glam::{Mat3, Quat, Vec3};
use std::f32::consts::{FRAC_PI_4, PI};

/// Tolerance used for degenerate-length checks throughout the engine.
pub const SIMD_EPSILON: f32 = f32::EPSILON;

/// Stand-in for "unbounded" in limits and hit distances.
pub const LARGE_FLOAT: f32 = 1e30;

/// Clamps a value between a minimum and maximum value.
#[inline(always)]
pub fn clamp<T: PartialOrd>(value: T, min: T, max: T) -> T {
    if value < min {
        min
    } else if value > max {
        max
    } else {
        value
    }
}

/// Returns -1 if the value is negative and 1 otherwise.
#[inline(always)]
pub fn binary_sign(x: f32) -> f32 {
    if x < 0.0 {
        -1.0
    } else {
        1.0
    }
}

/// Wraps an angle into the [-pi, pi] interval.
#[inline]
pub fn normalize_angle(angle: f32) -> f32 {
    let angle = angle % (2.0 * PI);
    if angle < -PI {
        angle + 2.0 * PI
    } else if angle > PI {
        angle - 2.0 * PI
    } else {
        angle
    }
}

/// Cheap atan2 approximation. Maximum error is about 0.07 radians, which is enough for
/// limit tests that are corrected iteratively anyway.
#[inline]
pub fn atan2_fast(y: f32, x: f32) -> f32 {
    let coeff_1 = FRAC_PI_4;
    let coeff_2 = 3.0 * coeff_1;
    let abs_y = y.abs();
    let angle = if x >= 0.0 {
        let r = (x - abs_y) / (x + abs_y);
        coeff_1 - coeff_1 * r
    } else {
        let r = (x + abs_y) / (abs_y - x);
        coeff_2 - coeff_1 * r
    };
    if y < 0.0 {
        -angle
    } else {
        angle
    }
}

/// Builds two unit vectors orthogonal to `n` and to each other.
///
/// `n` is expected to be normalized. The branch picks the axis pair that avoids
/// dividing by a tiny component so the basis is stable for every input direction.
#[inline]
pub fn plane_space(n: Vec3) -> (Vec3, Vec3) {
    if n.z.abs() > std::f32::consts::FRAC_1_SQRT_2 {
        // Choose p in the y-z plane.
        let a = n.y * n.y + n.z * n.z;
        let k = 1.0 / a.sqrt();
        let p = Vec3::new(0.0, -n.z * k, n.y * k);
        let q = Vec3::new(a * k, -n.x * p.z, n.x * p.y);
        (p, q)
    } else {
        // Choose p in the x-y plane.
        let a = n.x * n.x + n.y * n.y;
        let k = 1.0 / a.sqrt();
        let p = Vec3::new(-n.y * k, n.x * k, 0.0);
        let q = Vec3::new(-n.z * p.y, n.z * p.x, a * k);
        (p, q)
    }
}

/// Computes the shortest rotation taking `v0` onto `v1`. Both inputs must be normalized.
#[inline]
pub fn shortest_arc_quat(v0: Vec3, v1: Vec3) -> Quat {
    let c = v0.cross(v1);
    let d = v0.dot(v1);
    if d < -1.0 + SIMD_EPSILON {
        // Antiparallel: rotate half a turn around any perpendicular axis.
        let (axis, _) = plane_space(v0);
        return Quat::from_xyzw(axis.x, axis.y, axis.z, 0.0);
    }
    let s = ((1.0 + d) * 2.0).sqrt();
    let rs = 1.0 / s;
    Quat::from_xyzw(c.x * rs, c.y * rs, c.z * rs, s * 0.5)
}

/// Rotates `v0` by the shortest arc taking it onto `v1`.
#[inline]
pub fn shortest_arc_rotate(v0: Vec3, v1: Vec3) -> Vec3 {
    shortest_arc_quat(v0, v1) * v0
}

/// Returns the world inverse inertia tensor for a diagonal local inverse inertia.
#[inline]
pub fn world_inverse_inertia(basis: Mat3, inv_inertia_local: Vec3) -> Mat3 {
    basis * Mat3::from_diagonal(inv_inertia_local) * basis.transpose()
}

/// Euler decomposition R = Rx * Ry * Rz of a rotation matrix. Returns (x, y, z) angles.
///
/// The y angle is clamped to [-pi/2, pi/2]; at the gimbal singularity z is folded into x.
pub fn matrix_to_euler_xyz(m: Mat3) -> Vec3 {
    // m.col(c)[r] is row r, column c.
    let r02 = m.z_axis.x;
    if r02 < 1.0 {
        if r02 > -1.0 {
            let y = r02.asin();
            let x = (-m.z_axis.y).atan2(m.z_axis.z);
            let z = (-m.y_axis.x).atan2(m.x_axis.x);
            Vec3::new(x, y, z)
        } else {
            // Not unique: x - z = atan2(r10, r11).
            let x = -(m.x_axis.y.atan2(m.y_axis.y));
            Vec3::new(x, -std::f32::consts::FRAC_PI_2, 0.0)
        }
    } else {
        // Not unique: x + z = atan2(r10, r11).
        let x = m.x_axis.y.atan2(m.y_axis.y);
        Vec3::new(x, std::f32::consts::FRAC_PI_2, 0.0)
    }
}
