use crate::utilities::transform::Transform;
use glam::Vec3;

/// Provides simple axis-aligned bounding box functionality.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BoundingBox {
    /// Location with the lowest X, Y, and Z coordinates in the axis-aligned bounding box.
    pub min: Vec3,
    /// Location with the highest X, Y, and Z coordinates in the axis-aligned bounding box.
    pub max: Vec3,
}

impl BoundingBox {
    /// Constructs a bounding box from the specified minimum and maximum.
    #[inline]
    pub fn new(min: Vec3, max: Vec3) -> Self {
        Self { min, max }
    }

    /// Box with inverted infinite bounds; merging anything into it yields that thing.
    #[inline]
    pub fn empty() -> Self {
        Self {
            min: Vec3::splat(f32::MAX),
            max: Vec3::splat(-f32::MAX),
        }
    }

    /// Determines if a bounding box intersects another bounding box.
    #[inline]
    pub fn intersects(a: &Self, b: &Self) -> bool {
        Self::intersects_bounds(a.min, a.max, b.min, b.max)
    }

    /// Determines if a bounding box intersects another bounding box.
    #[inline]
    pub fn intersects_bounds(min_a: Vec3, max_a: Vec3, min_b: Vec3, max_b: Vec3) -> bool {
        !(max_a.cmplt(min_b).any() || max_b.cmplt(min_a).any())
    }

    /// Computes a bounding box which contains two other bounding boxes.
    #[inline]
    pub fn create_merged(a: &Self, b: &Self) -> Self {
        Self {
            min: a.min.min(b.min),
            max: a.max.max(b.max),
        }
    }

    /// Grows the box to contain a point.
    #[inline]
    pub fn merge_point(&mut self, point: Vec3) {
        self.min = self.min.min(point);
        self.max = self.max.max(point);
    }

    /// Grows the box uniformly in all directions.
    #[inline]
    pub fn expand(&mut self, margin: f32) {
        self.min -= Vec3::splat(margin);
        self.max += Vec3::splat(margin);
    }

    /// Squared length of the box diagonal. Used to detect degenerate or exploding bounds.
    #[inline]
    pub fn diagonal_length_squared(&self) -> f32 {
        (self.max - self.min).length_squared()
    }

    /// Computes the world-space box of a local box `[-half_extents, half_extents]`
    /// centred at `local_center`, grown by `margin`.
    pub fn transform_local_box(
        half_extents: Vec3,
        local_center: Vec3,
        transform: &Transform,
        margin: f32,
    ) -> Self {
        let half = half_extents + Vec3::splat(margin);
        let abs_basis = glam::Mat3::from_cols(
            transform.basis.x_axis.abs(),
            transform.basis.y_axis.abs(),
            transform.basis.z_axis.abs(),
        );
        let center = transform.transform_point(local_center);
        let extent = abs_basis * half;
        Self {
            min: center - extent,
            max: center + extent,
        }
    }

    /// Tests whether a segment clipped to the slab range hits the box.
    pub fn ray_overlaps(&self, from: Vec3, to: Vec3) -> bool {
        let dir = to - from;
        let mut t_min = 0.0f32;
        let mut t_max = 1.0f32;
        for axis in 0..3 {
            if dir[axis].abs() < 1e-12 {
                if from[axis] < self.min[axis] || from[axis] > self.max[axis] {
                    return false;
                }
            } else {
                let inv = 1.0 / dir[axis];
                let mut t0 = (self.min[axis] - from[axis]) * inv;
                let mut t1 = (self.max[axis] - from[axis]) * inv;
                if t0 > t1 {
                    std::mem::swap(&mut t0, &mut t1);
                }
                t_min = t_min.max(t0);
                t_max = t_max.min(t1);
                if t_min > t_max {
                    return false;
                }
            }
        }
        true
    }
}
