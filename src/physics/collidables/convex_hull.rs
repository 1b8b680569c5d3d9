use glam::Vec3;

use super::shape::{ConvexShape, DEFAULT_COLLISION_MARGIN};

/// Convex hull of a point cloud. Points need not be on the hull; interior ones are never
/// selected by the support mapping.
#[derive(Debug, Clone, PartialEq)]
pub struct ConvexHull {
    pub points: Vec<Vec3>,
    margin: f32,
}

impl ConvexHull {
    pub fn new(points: Vec<Vec3>) -> Self {
        Self {
            points,
            margin: DEFAULT_COLLISION_MARGIN,
        }
    }

    pub fn set_margin(&mut self, margin: f32) {
        self.margin = margin;
    }
}

impl ConvexShape for ConvexHull {
    fn local_support_without_margin(&self, direction: Vec3) -> Vec3 {
        let mut best = Vec3::ZERO;
        let mut best_dot = f32::MIN;
        for &point in &self.points {
            let dot = point.dot(direction);
            if dot > best_dot {
                best_dot = dot;
                best = point;
            }
        }
        best
    }

    #[inline(always)]
    fn margin(&self) -> f32 {
        self.margin
    }
}
