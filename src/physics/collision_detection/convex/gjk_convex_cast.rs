use glam::Vec3;

use super::gjk_pair_detector::{ClosestPointInput, GjkPairDetector};
use super::simplex_solver::VoronoiSimplexSolver;
use crate::physics::collidables::ConvexShape;
use crate::utilities::transform::Transform;

const MAX_ITERATIONS: u32 = 32;

/// Outcome of a successful cast.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CastResult {
    /// Fraction of the motion at first contact, in [0, 1].
    pub fraction: f32,
    /// Contact normal on B, pointing towards A.
    pub normal: Vec3,
    pub hit_point: Vec3,
}

/// Conservative-advancement cast of two convex shapes along linear motions.
///
/// Rotation during the motion is ignored; only the origins are interpolated.
pub struct GjkConvexCast<'a> {
    shape_a: &'a dyn ConvexShape,
    shape_b: &'a dyn ConvexShape,
    /// Tolerated penetration before a hit that moves apart is still reported.
    pub allowed_penetration: f32,
}

impl<'a> GjkConvexCast<'a> {
    pub fn new(shape_a: &'a dyn ConvexShape, shape_b: &'a dyn ConvexShape) -> Self {
        Self {
            shape_a,
            shape_b,
            allowed_penetration: 0.0,
        }
    }

    pub fn calc_time_of_impact(
        &self,
        from_a: &Transform,
        to_a: &Transform,
        from_b: &Transform,
        to_b: &Transform,
        simplex_solver: &mut VoronoiSimplexSolver,
    ) -> Option<CastResult> {
        simplex_solver.reset();

        // Compute linear velocity for this interval, to interpolate.
        let lin_vel_a = to_a.origin - from_a.origin;
        let lin_vel_b = to_b.origin - from_b.origin;
        let radius = 0.001f32;
        let mut lambda = 0.0f32;
        let r = lin_vel_a - lin_vel_b;
        let mut last_lambda = lambda;
        let mut num_iter = 0;

        let mut gjk = GjkPairDetector::new(self.shape_a, self.shape_b, None);
        let mut input = ClosestPointInput::new(*from_a, *from_b);

        let first = gjk.get_closest_points(&input, simplex_solver)?;
        let mut dist = first.distance;
        let mut n = first.normal_on_b;
        let mut c = first.point_on_b;

        while dist > radius {
            num_iter += 1;
            if num_iter > MAX_ITERATIONS {
                return None;
            }
            let projected_linear_velocity = r.dot(n);
            let d_lambda = dist / projected_linear_velocity;
            lambda -= d_lambda;

            if !(0.0..=1.0).contains(&lambda) || lambda <= last_lambda {
                return None;
            }
            last_lambda = lambda;

            input.transform_a.origin = from_a.origin.lerp(to_a.origin, lambda);
            input.transform_b.origin = from_b.origin.lerp(to_b.origin, lambda);

            let step = gjk.get_closest_points(&input, simplex_solver)?;
            if step.distance < 0.0 {
                return Some(CastResult {
                    fraction: last_lambda,
                    normal: step.normal_on_b,
                    hit_point: step.point_on_b,
                });
            }
            c = step.point_on_b;
            n = step.normal_on_b;
            dist = step.distance;
        }

        // Don't report a time of impact for motion away from the contact normal.
        if n.dot(r) >= -self.allowed_penetration {
            return None;
        }
        Some(CastResult {
            fraction: lambda,
            normal: n,
            hit_point: c,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::physics::collidables::Sphere;
    use approx::assert_relative_eq;

    #[test]
    fn test_sphere_sweeps_into_sphere() {
        let moving = Sphere::new(0.5);
        let fixed = Sphere::new(0.5);
        let cast = GjkConvexCast::new(&moving, &fixed);
        let mut simplex = VoronoiSimplexSolver::new();
        let result = cast
            .calc_time_of_impact(
                &Transform::from_translation(Vec3::new(-5.0, 0.0, 0.0)),
                &Transform::from_translation(Vec3::new(5.0, 0.0, 0.0)),
                &Transform::IDENTITY,
                &Transform::IDENTITY,
                &mut simplex,
            )
            .unwrap();
        // Contact when the centers are 1 apart: x = -1, i.e. 4/10 of the motion.
        assert_relative_eq!(result.fraction, 0.4, epsilon = 1e-3);
        assert_relative_eq!(result.normal.x, -1.0, epsilon = 1e-3);
    }

    #[test]
    fn test_moving_away_is_no_hit() {
        let a = Sphere::new(0.5);
        let b = Sphere::new(0.5);
        let cast = GjkConvexCast::new(&a, &b);
        let mut simplex = VoronoiSimplexSolver::new();
        assert!(cast
            .calc_time_of_impact(
                &Transform::from_translation(Vec3::new(-2.0, 0.0, 0.0)),
                &Transform::from_translation(Vec3::new(-7.0, 0.0, 0.0)),
                &Transform::IDENTITY,
                &Transform::IDENTITY,
                &mut simplex,
            )
            .is_none());
    }
}
