use glam::Vec3;

use super::shape::ConvexShape;

/// Swept sphere along the local Y axis. The radius is margin; the core is a segment.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Capsule {
    /// Spherical expansion of the internal line segment.
    pub radius: f32,
    /// Half of the length of the internal line segment.
    pub half_height: f32,
}

impl Capsule {
    /// Creates a capsule from its radius and full segment length.
    #[inline]
    pub fn new(radius: f32, length: f32) -> Self {
        Self {
            radius,
            half_height: length * 0.5,
        }
    }
}

impl ConvexShape for Capsule {
    #[inline]
    fn local_support_without_margin(&self, direction: Vec3) -> Vec3 {
        if direction.y >= 0.0 {
            Vec3::new(0.0, self.half_height, 0.0)
        } else {
            Vec3::new(0.0, -self.half_height, 0.0)
        }
    }

    #[inline(always)]
    fn margin(&self) -> f32 {
        self.radius
    }
}
