use glam::Vec3;

use super::shape::{ConvexShape, DEFAULT_COLLISION_MARGIN};

/// Collision shape representing a solid cuboid.
///
/// The stored half extents describe the core; the margin rounds the corners outward so
/// the full box matches the extents it was created with.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoxShape {
    implicit_half_extents: Vec3,
    margin: f32,
}

impl BoxShape {
    /// Creates a box whose outer surface has the given half extents.
    pub fn new(half_extents: Vec3) -> Self {
        let margin = DEFAULT_COLLISION_MARGIN.min(half_extents.min_element());
        Self {
            implicit_half_extents: half_extents - Vec3::splat(margin),
            margin,
        }
    }

    /// Half extents of the outer surface.
    #[inline]
    pub fn half_extents_with_margin(&self) -> Vec3 {
        self.implicit_half_extents + Vec3::splat(self.margin)
    }

    #[inline]
    pub fn half_extents_without_margin(&self) -> Vec3 {
        self.implicit_half_extents
    }

    /// Changes the margin while keeping the outer surface where it is.
    pub fn set_margin(&mut self, margin: f32) {
        let outer = self.half_extents_with_margin();
        self.margin = margin.min(outer.min_element());
        self.implicit_half_extents = outer - Vec3::splat(self.margin);
    }
}

impl ConvexShape for BoxShape {
    #[inline]
    fn local_support_without_margin(&self, direction: Vec3) -> Vec3 {
        let h = self.implicit_half_extents;
        Vec3::new(
            if direction.x >= 0.0 { h.x } else { -h.x },
            if direction.y >= 0.0 { h.y } else { -h.y },
            if direction.z >= 0.0 { h.z } else { -h.z },
        )
    }

    #[inline(always)]
    fn margin(&self) -> f32 {
        self.margin
    }
}
