use glam::Vec3;

use super::shape::ConvexShape;
use crate::utilities::transform::Transform;

/// Collision shape representing a sphere. The whole radius is margin; the core is a point.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sphere {
    /// Radius of the sphere.
    pub radius: f32,
}

impl Sphere {
    /// Creates a sphere shape.
    #[inline(always)]
    pub fn new(radius: f32) -> Self {
        Self { radius }
    }

    /// Tests the segment `from -> to` against the sphere placed at `transform`.
    ///
    /// Returns the hit fraction along the segment and the outward surface normal. Rays
    /// starting inside report a hit at fraction 0.
    pub fn ray_test(&self, transform: &Transform, from: Vec3, to: Vec3) -> Option<(f32, Vec3)> {
        let direction = to - from;
        let length = direction.length();
        if length <= f32::EPSILON {
            return None;
        }
        let d = direction / length;

        // Move the origin up to the earliest possible impact time.
        let mut o = from - transform.origin;
        let t_offset = (-o.dot(d) - self.radius).max(0.0);
        o += d * t_offset;
        let b = o.dot(d);
        let c = o.dot(o) - self.radius * self.radius;

        if b > 0.0 && c > 0.0 {
            // Ray is outside and pointing away, no hit.
            return None;
        }

        let discriminant = b * b - c;
        if discriminant < 0.0 {
            return None;
        }
        let t = (-b - discriminant.sqrt()).max(-t_offset);
        let normal = (o + d * t) / self.radius;
        let fraction = (t + t_offset) / length;
        if fraction > 1.0 {
            return None;
        }
        Some((fraction, normal))
    }
}

impl ConvexShape for Sphere {
    #[inline(always)]
    fn local_support_without_margin(&self, _direction: Vec3) -> Vec3 {
        Vec3::ZERO
    }

    #[inline(always)]
    fn margin(&self) -> f32 {
        self.radius
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_ray_hits_front_face() {
        let sphere = Sphere::new(1.0);
        let hit = sphere
            .ray_test(&Transform::IDENTITY, Vec3::new(-3.0, 0.0, 0.0), Vec3::new(3.0, 0.0, 0.0))
            .unwrap();
        assert_relative_eq!(hit.0, 2.0 / 6.0, epsilon = 1e-5);
        assert_relative_eq!(hit.1.x, -1.0, epsilon = 1e-5);
    }

    #[test]
    fn test_ray_misses() {
        let sphere = Sphere::new(1.0);
        assert!(sphere
            .ray_test(&Transform::IDENTITY, Vec3::new(-3.0, 2.0, 0.0), Vec3::new(3.0, 2.0, 0.0))
            .is_none());
        assert!(sphere
            .ray_test(&Transform::IDENTITY, Vec3::new(-3.0, 0.0, 0.0), Vec3::new(-2.5, 0.0, 0.0))
            .is_none());
    }
}
