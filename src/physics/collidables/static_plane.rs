use glam::Vec3;

use crate::utilities::bounding_box::BoundingBox;
use crate::utilities::math_helper::LARGE_FLOAT;
use crate::utilities::transform::Transform;

/// Infinite half space `normal · x <= constant` in local space. Static only.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StaticPlane {
    pub normal: Vec3,
    pub constant: f32,
}

impl StaticPlane {
    #[inline]
    pub fn new(normal: Vec3, constant: f32) -> Self {
        Self { normal, constant }
    }

    /// Unbounded in every axis the plane is not aligned with.
    pub fn aabb(&self, transform: &Transform) -> BoundingBox {
        let world_normal = transform.transform_vector(self.normal);
        let point = transform.transform_point(self.normal * self.constant);
        let mut min = Vec3::splat(-LARGE_FLOAT);
        let mut max = Vec3::splat(LARGE_FLOAT);
        for axis in 0..3 {
            if (world_normal[axis].abs() - 1.0).abs() < 1e-6 {
                min[axis] = point[axis].min(point[axis] - LARGE_FLOAT * world_normal[axis]);
                max[axis] = point[axis].max(point[axis] - LARGE_FLOAT * world_normal[axis]);
            }
        }
        BoundingBox::new(min, max)
    }

    /// Segment test against the plane's surface, hit only when entering from the front.
    pub fn ray_test(&self, transform: &Transform, from: Vec3, to: Vec3) -> Option<(f32, Vec3)> {
        let n = transform.transform_vector(self.normal);
        let c = self.constant + transform.origin.dot(n);
        let d0 = n.dot(from) - c;
        let d1 = n.dot(to) - c;
        if d0 < 0.0 || d1 >= 0.0 {
            return None;
        }
        Some((d0 / (d0 - d1), n))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_ray_from_front() {
        let plane = StaticPlane::new(Vec3::Y, 1.0);
        let (fraction, normal) = plane
            .ray_test(&Transform::IDENTITY, Vec3::new(0.0, 3.0, 0.0), Vec3::new(0.0, -1.0, 0.0))
            .unwrap();
        assert_relative_eq!(fraction, 0.5);
        assert_relative_eq!(normal.y, 1.0);
        assert!(plane
            .ray_test(&Transform::IDENTITY, Vec3::new(0.0, -3.0, 0.0), Vec3::new(0.0, 3.0, 0.0))
            .is_none());
    }

    #[test]
    fn test_axis_aligned_aabb_is_half_space() {
        let plane = StaticPlane::new(Vec3::Y, 0.0);
        let aabb = plane.aabb(&Transform::IDENTITY);
        assert_relative_eq!(aabb.max.y, 0.0);
        assert!(aabb.min.y < -1e20);
        assert!(aabb.max.x > 1e20);
    }
}
