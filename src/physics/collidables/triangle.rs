use glam::Vec3;

use super::shape::ConvexShape;

/// Single triangle. Mostly built on the fly for triangles of a concave mesh.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TriangleShape {
    pub vertices: [Vec3; 3],
    margin: f32,
}

impl TriangleShape {
    #[inline]
    pub fn new(a: Vec3, b: Vec3, c: Vec3) -> Self {
        Self {
            vertices: [a, b, c],
            margin: 0.0,
        }
    }

    #[inline]
    pub fn with_margin(mut self, margin: f32) -> Self {
        self.margin = margin;
        self
    }

    /// Unnormalized face normal following the winding a, b, c.
    #[inline]
    pub fn face_normal(&self) -> Vec3 {
        let [a, b, c] = self.vertices;
        (b - a).cross(c - a)
    }

    /// Two-sided segment test against the triangle's plane. Returns the fraction along
    /// `from -> to` and the face normal facing the segment start.
    pub fn ray_test(&self, from: Vec3, to: Vec3) -> Option<(f32, Vec3)> {
        let [a, b, c] = self.vertices;
        let ab = b - a;
        let ac = c - a;
        let direction = to - from;
        let p = direction.cross(ac);
        let det = ab.dot(p);
        if det.abs() < 1e-12 {
            return None;
        }
        let inv_det = 1.0 / det;
        let ao = from - a;
        let u = ao.dot(p) * inv_det;
        if !(0.0..=1.0).contains(&u) {
            return None;
        }
        let q = ao.cross(ab);
        let v = direction.dot(q) * inv_det;
        if v < 0.0 || u + v > 1.0 {
            return None;
        }
        let t = ac.dot(q) * inv_det;
        if !(0.0..=1.0).contains(&t) {
            return None;
        }
        let mut normal = ab.cross(ac).normalize();
        if normal.dot(direction) > 0.0 {
            normal = -normal;
        }
        Some((t, normal))
    }
}

impl ConvexShape for TriangleShape {
    #[inline]
    fn local_support_without_margin(&self, direction: Vec3) -> Vec3 {
        let dots = Vec3::new(
            direction.dot(self.vertices[0]),
            direction.dot(self.vertices[1]),
            direction.dot(self.vertices[2]),
        );
        if dots.x >= dots.y && dots.x >= dots.z {
            self.vertices[0]
        } else if dots.y >= dots.z {
            self.vertices[1]
        } else {
            self.vertices[2]
        }
    }

    #[inline(always)]
    fn margin(&self) -> f32 {
        self.margin
    }
}
