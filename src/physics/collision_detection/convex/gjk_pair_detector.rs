use glam::Vec3;

use super::penetration_depth::MinkowskiPenetrationDepthSolver;
use super::simplex_solver::VoronoiSimplexSolver;
use crate::physics::collidables::ConvexShape;
use crate::utilities::transform::Transform;

const REL_ERROR2: f32 = 1.0e-6;
const GJK_MAX_ITERATIONS: u32 = 1000;

/// Query for the closest points between two convex shapes.
#[derive(Debug, Clone, Copy)]
pub struct ClosestPointInput {
    pub transform_a: Transform,
    pub transform_b: Transform,
    /// Early-out bound on squared separation, in the same units as the GJK distance.
    pub maximum_distance_squared: f32,
}

impl ClosestPointInput {
    pub fn new(transform_a: Transform, transform_b: Transform) -> Self {
        Self {
            transform_a,
            transform_b,
            maximum_distance_squared: f32::MAX,
        }
    }
}

/// Closest features between two convex shapes. Negative distance means penetration.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClosestPoints {
    /// Unit normal on B pointing towards A.
    pub normal_on_b: Vec3,
    pub point_on_b: Vec3,
    pub distance: f32,
}

impl ClosestPoints {
    #[inline]
    pub fn point_on_a(&self) -> Vec3 {
        self.point_on_b + self.normal_on_b * self.distance
    }
}

/// GJK distance query between two convex shapes, with an optional penetration-depth
/// fallback for overlapping cores.
pub struct GjkPairDetector<'a> {
    shape_a: &'a dyn ConvexShape,
    shape_b: &'a dyn ConvexShape,
    penetration_depth_solver: Option<&'a MinkowskiPenetrationDepthSolver>,
    cached_separating_axis: Vec3,
    ignore_margin: bool,
    /// Reason the last query stopped on a degenerate simplex. Zero when it did not.
    pub degenerate_simplex: u32,
    /// Which branch produced the last result: 1 GJK, 3 penetration solver.
    pub last_used_method: i32,
    pub current_iteration: u32,
}

impl<'a> GjkPairDetector<'a> {
    pub fn new(
        shape_a: &'a dyn ConvexShape,
        shape_b: &'a dyn ConvexShape,
        penetration_depth_solver: Option<&'a MinkowskiPenetrationDepthSolver>,
    ) -> Self {
        Self {
            shape_a,
            shape_b,
            penetration_depth_solver,
            cached_separating_axis: Vec3::Y,
            ignore_margin: false,
            degenerate_simplex: 0,
            last_used_method: -1,
            current_iteration: 0,
        }
    }

    /// Treat both shapes as their cores only.
    pub fn set_ignore_margin(&mut self, ignore_margin: bool) {
        self.ignore_margin = ignore_margin;
    }

    #[inline]
    pub fn set_cached_separating_axis(&mut self, axis: Vec3) {
        self.cached_separating_axis = axis;
    }

    #[inline]
    pub fn cached_separating_axis(&self) -> Vec3 {
        self.cached_separating_axis
    }

    pub fn get_closest_points(
        &mut self,
        input: &ClosestPointInput,
        simplex_solver: &mut VoronoiSimplexSolver,
    ) -> Option<ClosestPoints> {
        let mut distance = 0.0f32;
        let mut normal_in_b = Vec3::ZERO;
        let mut point_on_b = Vec3::ZERO;

        // Work around the midpoint to keep the numbers small.
        let mut local_trans_a = input.transform_a;
        let mut local_trans_b = input.transform_b;
        let position_offset = (local_trans_a.origin + local_trans_b.origin) * 0.5;
        local_trans_a.origin -= position_offset;
        local_trans_b.origin -= position_offset;

        let (margin_a, margin_b) = if self.ignore_margin {
            (0.0, 0.0)
        } else {
            (self.shape_a.margin(), self.shape_b.margin())
        };

        self.current_iteration = 0;
        self.cached_separating_axis = Vec3::Y;
        self.degenerate_simplex = 0;
        self.last_used_method = -1;

        let mut is_valid = false;
        let mut check_simplex = false;
        let mut check_penetration = true;

        let mut squared_distance = f32::MAX;
        let margin = margin_a + margin_b;

        simplex_solver.reset();

        let inv_basis_a = local_trans_a.basis.transpose();
        let inv_basis_b = local_trans_b.basis.transpose();

        loop {
            let separating_axis_in_a = inv_basis_a * -self.cached_separating_axis;
            let separating_axis_in_b = inv_basis_b * self.cached_separating_axis;

            let p_in_a = self.shape_a.local_support_without_margin(separating_axis_in_a);
            let q_in_b = self.shape_b.local_support_without_margin(separating_axis_in_b);
            let p_world = local_trans_a.transform_point(p_in_a);
            let q_world = local_trans_b.transform_point(q_in_b);

            let w = p_world - q_world;
            let delta = self.cached_separating_axis.dot(w);

            // Potential exit, they don't overlap.
            if delta > 0.0 && delta * delta > squared_distance * input.maximum_distance_squared {
                check_penetration = false;
                break;
            }

            // Exit 0: the new point is already in the simplex, or we didn't come any closer.
            if simplex_solver.in_simplex(w) {
                self.degenerate_simplex = 1;
                check_simplex = true;
                break;
            }

            // Are we getting any closer?
            let f0 = squared_distance - delta;
            let f1 = squared_distance * REL_ERROR2;
            if f0 <= f1 {
                if f0 <= 0.0 {
                    self.degenerate_simplex = 2;
                }
                check_simplex = true;
                break;
            }

            simplex_solver.add_vertex(w, p_world, q_world);

            // Calculate the closest point to the origin (update vector v).
            match simplex_solver.closest() {
                Some(v) => self.cached_separating_axis = v,
                None => {
                    self.degenerate_simplex = 3;
                    check_simplex = true;
                    break;
                }
            }

            if self.cached_separating_axis.length_squared() < REL_ERROR2 {
                self.degenerate_simplex = 6;
                check_simplex = true;
                break;
            }

            let previous_squared_distance = squared_distance;
            squared_distance = self.cached_separating_axis.length_squared();

            // Redundant with the f0 test above, kept to stop on stalled progress.
            if previous_squared_distance - squared_distance <= f32::EPSILON * previous_squared_distance {
                self.cached_separating_axis = simplex_solver.backup_closest();
                check_simplex = true;
                break;
            }

            self.current_iteration += 1;
            if self.current_iteration > GJK_MAX_ITERATIONS {
                break;
            }

            if simplex_solver.fully_simplex() {
                self.cached_separating_axis = simplex_solver.backup_closest();
                break;
            }
        }

        if check_simplex {
            let (p, q) = simplex_solver.compute_points();
            point_on_b = q;
            normal_in_b = p - q;
            let len_sqr = self.cached_separating_axis.length_squared();
            if len_sqr < 0.0001 {
                self.degenerate_simplex = 5;
            }
            if len_sqr > f32::EPSILON * f32::EPSILON {
                let rlen = 1.0 / len_sqr.sqrt();
                normal_in_b *= rlen;
                let s = squared_distance.sqrt();
                point_on_b += self.cached_separating_axis * (margin_b / s);
                distance = (1.0 / rlen) - margin;
                is_valid = true;
                self.last_used_method = 1;
            } else {
                self.last_used_method = 2;
            }
        }

        let catch_degenerate_penetration_case = self.penetration_depth_solver.is_some()
            && self.degenerate_simplex != 0
            && (distance + margin) < 0.01;

        if check_penetration && (!is_valid || catch_degenerate_penetration_case) {
            if let Some(solver) = self.penetration_depth_solver {
                // Penetration case: the cores overlap.
                if let Some((tmp_a, tmp_b)) = solver.calc_pen_depth(
                    simplex_solver,
                    self.shape_a,
                    self.shape_b,
                    &local_trans_a,
                    &local_trans_b,
                ) {
                    let tmp_normal_in_b = tmp_b - tmp_a;
                    let len_sqr = tmp_normal_in_b.length_squared();
                    if len_sqr > f32::EPSILON * f32::EPSILON {
                        let tmp_normal_in_b = tmp_normal_in_b / len_sqr.sqrt();
                        let distance2 = -(tmp_a - tmp_b).length();
                        if !is_valid || distance2 < distance {
                            distance = distance2;
                            point_on_b = tmp_b;
                            normal_in_b = tmp_normal_in_b;
                            is_valid = true;
                            self.last_used_method = 3;
                        } else {
                            self.last_used_method = 8;
                        }
                    } else {
                        self.last_used_method = 9;
                    }
                }
            }
        }

        if is_valid {
            Some(ClosestPoints {
                normal_on_b: normal_in_b,
                point_on_b: point_on_b + position_offset,
                distance,
            })
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::physics::collidables::{BoxShape, Sphere};
    use approx::assert_relative_eq;

    #[test]
    fn test_separated_spheres() {
        let a = Sphere::new(1.0);
        let b = Sphere::new(0.5);
        let pen = MinkowskiPenetrationDepthSolver;
        let mut gjk = GjkPairDetector::new(&a, &b, Some(&pen));
        let input = ClosestPointInput::new(
            Transform::from_translation(Vec3::new(3.0, 0.0, 0.0)),
            Transform::IDENTITY,
        );
        let mut simplex = VoronoiSimplexSolver::new();
        let result = gjk.get_closest_points(&input, &mut simplex).unwrap();
        assert_relative_eq!(result.distance, 1.5, epsilon = 1e-4);
        assert_relative_eq!(result.normal_on_b.x, 1.0, epsilon = 1e-4);
        assert_relative_eq!(result.point_on_b.x, 0.5, epsilon = 1e-4);
    }

    #[test]
    fn test_overlapping_boxes_use_penetration_solver() {
        let a = BoxShape::new(Vec3::splat(1.0));
        let b = BoxShape::new(Vec3::splat(1.0));
        let pen = MinkowskiPenetrationDepthSolver;
        let mut gjk = GjkPairDetector::new(&a, &b, Some(&pen));
        let input = ClosestPointInput::new(
            Transform::from_translation(Vec3::new(0.0, 1.5, 0.0)),
            Transform::IDENTITY,
        );
        let mut simplex = VoronoiSimplexSolver::new();
        let result = gjk.get_closest_points(&input, &mut simplex).unwrap();
        assert_relative_eq!(result.distance, -0.5, epsilon = 1e-2);
        assert_relative_eq!(result.normal_on_b.y, 1.0, epsilon = 1e-2);
    }
}
