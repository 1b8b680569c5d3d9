use glam::{Mat3, Vec3};

/// One row of a two-body constraint Jacobian with its effective-mass diagonal.
///
/// Angular terms are kept in each body's local frame so the diagonal can use the
/// diagonal local inverse inertia directly.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct JacobianEntry {
    pub linear_joint_axis: Vec3,
    pub a_j: Vec3,
    pub b_j: Vec3,
    pub m0_minv_jt: Vec3,
    pub m1_minv_jt: Vec3,
    /// J M⁻¹ Jᵀ
    pub a_diag: f32,
}

impl Default for JacobianEntry {
    fn default() -> Self {
        Self {
            linear_joint_axis: Vec3::ZERO,
            a_j: Vec3::ZERO,
            b_j: Vec3::ZERO,
            m0_minv_jt: Vec3::ZERO,
            m1_minv_jt: Vec3::ZERO,
            a_diag: 1.0,
        }
    }
}

impl JacobianEntry {
    /// Linear row between two bodies along `joint_axis`, acting at `rel_pos1` / `rel_pos2`.
    #[allow(clippy::too_many_arguments)]
    pub fn linear(
        world_to_a: Mat3,
        world_to_b: Mat3,
        rel_pos1: Vec3,
        rel_pos2: Vec3,
        joint_axis: Vec3,
        inertia_inv_a: Vec3,
        mass_inv_a: f32,
        inertia_inv_b: Vec3,
        mass_inv_b: f32,
    ) -> Self {
        let a_j = world_to_a * rel_pos1.cross(joint_axis);
        let b_j = world_to_b * rel_pos2.cross(-joint_axis);
        let m0_minv_jt = inertia_inv_a * a_j;
        let m1_minv_jt = inertia_inv_b * b_j;
        let a_diag = mass_inv_a + m0_minv_jt.dot(a_j) + mass_inv_b + m1_minv_jt.dot(b_j);
        Self {
            linear_joint_axis: joint_axis,
            a_j,
            b_j,
            m0_minv_jt,
            m1_minv_jt,
            a_diag,
        }
    }

    /// Purely angular row about `joint_axis`.
    pub fn angular(joint_axis: Vec3, world_to_a: Mat3, world_to_b: Mat3, inertia_inv_a: Vec3, inertia_inv_b: Vec3) -> Self {
        let a_j = world_to_a * joint_axis;
        let b_j = world_to_b * -joint_axis;
        let m0_minv_jt = inertia_inv_a * a_j;
        let m1_minv_jt = inertia_inv_b * b_j;
        Self {
            linear_joint_axis: Vec3::ZERO,
            a_j,
            b_j,
            m0_minv_jt,
            m1_minv_jt,
            a_diag: m0_minv_jt.dot(a_j) + m1_minv_jt.dot(b_j),
        }
    }

    #[inline(always)]
    pub fn diagonal(&self) -> f32 {
        self.a_diag
    }

    /// Inverse of the diagonal, zero when the row has no effective mass.
    #[inline]
    pub fn diagonal_inv(&self) -> f32 {
        if self.a_diag > f32::EPSILON {
            1.0 / self.a_diag
        } else {
            0.0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_linear_row_through_centers_is_mass_sum() {
        let entry = JacobianEntry::linear(
            Mat3::IDENTITY,
            Mat3::IDENTITY,
            Vec3::ZERO,
            Vec3::ZERO,
            Vec3::X,
            Vec3::ONE,
            1.0,
            Vec3::ONE,
            0.5,
        );
        assert_relative_eq!(entry.diagonal(), 1.5);
    }

    #[test]
    fn test_angular_row_against_fixed_body() {
        let entry = JacobianEntry::angular(Vec3::Z, Mat3::IDENTITY, Mat3::IDENTITY, Vec3::splat(2.0), Vec3::ZERO);
        assert_relative_eq!(entry.diagonal(), 2.0);
        assert_eq!(JacobianEntry::angular(Vec3::Z, Mat3::IDENTITY, Mat3::IDENTITY, Vec3::ZERO, Vec3::ZERO).diagonal_inv(), 0.0);
    }
}
