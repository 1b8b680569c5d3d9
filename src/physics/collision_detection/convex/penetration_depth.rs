use glam::Vec3;
use std::sync::OnceLock;

use super::gjk_pair_detector::{ClosestPointInput, GjkPairDetector};
use super::simplex_solver::VoronoiSimplexSolver;
use crate::physics::collidables::ConvexShape;
use crate::utilities::transform::Transform;

const NUM_UNITSPHERE_POINTS: usize = 42;

/// Vertices and edge midpoints of an icosahedron, projected onto the unit sphere.
fn unit_sphere_directions() -> &'static [Vec3; NUM_UNITSPHERE_POINTS] {
    static DIRECTIONS: OnceLock<[Vec3; NUM_UNITSPHERE_POINTS]> = OnceLock::new();
    DIRECTIONS.get_or_init(|| {
        let phi = (1.0 + 5f32.sqrt()) * 0.5;
        let vertices = [
            Vec3::new(-1.0, phi, 0.0),
            Vec3::new(1.0, phi, 0.0),
            Vec3::new(-1.0, -phi, 0.0),
            Vec3::new(1.0, -phi, 0.0),
            Vec3::new(0.0, -1.0, phi),
            Vec3::new(0.0, 1.0, phi),
            Vec3::new(0.0, -1.0, -phi),
            Vec3::new(0.0, 1.0, -phi),
            Vec3::new(phi, 0.0, -1.0),
            Vec3::new(phi, 0.0, 1.0),
            Vec3::new(-phi, 0.0, -1.0),
            Vec3::new(-phi, 0.0, 1.0),
        ];
        let mut directions = [Vec3::ZERO; NUM_UNITSPHERE_POINTS];
        let mut count = 0;
        for v in vertices {
            directions[count] = v.normalize();
            count += 1;
        }
        // Icosahedron edges join vertices at the minimal distance of 2.
        for i in 0..vertices.len() {
            for j in (i + 1)..vertices.len() {
                if (vertices[i].distance_squared(vertices[j]) - 4.0).abs() < 1e-3 {
                    directions[count] = (vertices[i] + vertices[j]).normalize();
                    count += 1;
                }
            }
        }
        debug_assert_eq!(count, NUM_UNITSPHERE_POINTS);
        directions
    })
}

/// Estimates penetration depth by sampling the Minkowski difference's support function
/// along a fixed set of directions, then refines the winner with a separated GJK query.
#[derive(Debug, Clone, Copy, Default)]
pub struct MinkowskiPenetrationDepthSolver;

impl MinkowskiPenetrationDepthSolver {
    /// Returns the deepest points on A and B, both on their margin-inclusive surfaces.
    pub fn calc_pen_depth(
        &self,
        simplex_solver: &mut VoronoiSimplexSolver,
        shape_a: &dyn ConvexShape,
        shape_b: &dyn ConvexShape,
        trans_a: &Transform,
        trans_b: &Transform,
    ) -> Option<(Vec3, Vec3)> {
        let inv_basis_a = trans_a.basis.transpose();
        let inv_basis_b = trans_b.basis.transpose();

        let mut min_proj = f32::MAX;
        let mut min_norm = Vec3::ZERO;
        let mut min_a = Vec3::ZERO;
        let mut min_b = Vec3::ZERO;

        let mut test_direction = |norm: Vec3| {
            let p_in_a = shape_a.local_support_without_margin(inv_basis_a * -norm);
            let q_in_b = shape_b.local_support_without_margin(inv_basis_b * norm);
            let p_world = trans_a.transform_point(p_in_a);
            let q_world = trans_b.transform_point(q_in_b);
            let delta = norm.dot(q_world - p_world);
            if delta < min_proj {
                min_proj = delta;
                min_norm = norm;
                min_a = p_world;
                min_b = q_world;
            }
        };

        for &norm in unit_sphere_directions() {
            test_direction(norm);
        }
        // Face normals of both frames give exact answers for boxes and flat contacts.
        for basis in [trans_a.basis, trans_b.basis] {
            for axis in [basis.x_axis, basis.y_axis, basis.z_axis] {
                test_direction(axis);
                test_direction(-axis);
            }
        }

        min_a += min_norm * shape_a.margin();
        min_b -= min_norm * shape_b.margin();
        min_proj += shape_a.margin() + shape_b.margin();

        // Push A out along the chosen direction and measure the remaining gap exactly.
        let mut displaced_a = *trans_a;
        displaced_a.origin += min_norm * min_proj;
        let input = ClosestPointInput::new(displaced_a, *trans_b);

        let mut gjk = GjkPairDetector::new(shape_a, shape_b, None);
        match gjk.get_closest_points(&input, simplex_solver) {
            Some(result) => {
                let corrected_depth = min_proj - result.distance;
                let pa = result.point_on_b - min_norm * corrected_depth;
                Some((pa, result.point_on_b))
            }
            None => Some((min_a, min_b)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_directions_are_unit_and_distinct() {
        let dirs = unit_sphere_directions();
        for (i, d) in dirs.iter().enumerate() {
            assert!((d.length() - 1.0).abs() < 1e-5);
            for e in &dirs[i + 1..] {
                assert!(d.distance_squared(*e) > 1e-3);
            }
        }
    }
}
