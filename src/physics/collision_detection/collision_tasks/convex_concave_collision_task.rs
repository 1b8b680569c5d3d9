use glam::Vec3;

use super::{CollisionObjectWrapper, ManifoldSlot};
use crate::physics::collidables::{CollisionShape, Sphere, TriangleShape};
use crate::physics::collision_detection::convex::{GjkConvexCast, VoronoiSimplexSolver};
use crate::physics::collision_detection::manifold_result::ManifoldResult;
use crate::physics::collision_detection::narrow_phase::{CollisionDispatcher, DispatcherInfo};
use crate::physics::handles::ManifoldHandle;
use crate::utilities::transform::Transform;

/// Convex shape against a triangle mesh.
///
/// Every mesh triangle near the convex becomes a temporary triangle shape that runs
/// through the convex algorithm the dispatcher selects, all reporting into one manifold.
/// Contacts carry the triangle's part and index so each triangle's points are cached
/// separately.
#[derive(Debug, Clone, Default)]
pub struct ConvexConcaveCollisionAlgorithm {
    slot: ManifoldSlot,
    swapped: bool,
}

impl ConvexConcaveCollisionAlgorithm {
    pub fn new(shared_manifold: Option<ManifoldHandle>, swapped: bool) -> Self {
        Self {
            slot: ManifoldSlot::new(shared_manifold),
            swapped,
        }
    }

    /// True when the mesh is the pair's first object.
    #[inline]
    pub fn is_swapped(&self) -> bool {
        self.swapped
    }

    #[inline]
    pub fn manifold(&self) -> Option<ManifoldHandle> {
        self.slot.handle()
    }

    pub fn process_collision(
        &mut self,
        body0: &CollisionObjectWrapper<'_>,
        body1: &CollisionObjectWrapper<'_>,
        dispatcher: &mut CollisionDispatcher,
        info: &DispatcherInfo,
        result: &mut ManifoldResult,
    ) {
        let (convex_body, tri_body) = if self.swapped { (body1, body0) } else { (body0, body1) };
        let CollisionShape::TriangleMesh(mesh) = tri_body.shape else {
            return;
        };
        if !convex_body.shape.is_convex() {
            return;
        }
        let manifold = self.slot.get_or_create(convex_body.handle, tri_body.handle, dispatcher);
        result.set_persistent_manifold(manifold);

        // Candidate triangles: those overlapping the convex's bounds in mesh space.
        let triangle_margin = mesh.margin();
        let convex_in_mesh = tri_body.world_transform.inverse_times(&convex_body.world_transform);
        let mut aabb = convex_body.shape.aabb(&convex_in_mesh);
        aabb.expand(triangle_margin);

        let swapped = self.swapped;
        mesh.process_all_triangles(
            |vertices, part_id, triangle_index| {
                let [a, b, c] = *vertices;
                let triangle = CollisionShape::Triangle(TriangleShape::new(a, b, c).with_margin(triangle_margin));
                let tri_view = tri_body.with_shape(&triangle);
                if swapped {
                    result.set_shape_identifiers(part_id, triangle_index, -1, -1);
                } else {
                    result.set_shape_identifiers(-1, -1, part_id, triangle_index);
                }
                let mut algorithm = dispatcher.find_algorithm(convex_body, &tri_view, Some(manifold));
                algorithm.process_collision(convex_body, &tri_view, dispatcher, info, result);
                algorithm.release(dispatcher);
            },
            aabb.min,
            aabb.max,
        );
        result.set_shape_identifiers(-1, -1, -1, -1);

        result.refresh_contact_points(dispatcher);
    }

    /// Swept-sphere raycast against the mesh triangles near the convex's path.
    ///
    /// Only the convex moves; the mesh is taken as static over the step.
    pub fn calculate_time_of_impact(
        &mut self,
        body0: &CollisionObjectWrapper<'_>,
        body1: &CollisionObjectWrapper<'_>,
    ) -> f32 {
        let (convex_body, tri_body) = if self.swapped { (body1, body0) } else { (body0, body1) };
        let square_motion =
            (convex_body.interpolation_world_transform.origin - convex_body.world_transform.origin).length_squared();
        if square_motion < convex_body.ccd_square_motion_threshold {
            return 1.0;
        }
        let CollisionShape::TriangleMesh(mesh) = tri_body.shape else {
            return 1.0;
        };

        let mesh_inverse = tri_body.world_transform.inverse();
        let from = mesh_inverse * convex_body.world_transform;
        let to = mesh_inverse * convex_body.interpolation_world_transform;
        let radius = convex_body.ccd_swept_sphere_radius;
        let ray_min = from.origin.min(to.origin) - Vec3::splat(radius);
        let ray_max = from.origin.max(to.origin) + Vec3::splat(radius);

        let sphere = Sphere::new(radius);
        let mut simplex = VoronoiSimplexSolver::new();
        let mut hit_fraction = convex_body.hit_fraction;
        mesh.process_all_triangles(
            |vertices, _, _| {
                let [a, b, c] = *vertices;
                let triangle = TriangleShape::new(a, b, c);
                let cast = GjkConvexCast::new(&sphere, &triangle);
                if let Some(hit) =
                    cast.calc_time_of_impact(&from, &to, &Transform::IDENTITY, &Transform::IDENTITY, &mut simplex)
                {
                    hit_fraction = hit_fraction.min(hit.fraction);
                }
            },
            ray_min,
            ray_max,
        );

        if hit_fraction < convex_body.hit_fraction {
            hit_fraction
        } else {
            1.0
        }
    }

    pub fn release(self, dispatcher: &mut CollisionDispatcher) {
        self.slot.release(dispatcher);
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::*;
    use super::super::CollisionAlgorithm;
    use super::*;
    use crate::physics::collision_detection::collision_task_registry::AlgorithmKind;
    use crate::physics::collision_object::CollisionObject;

    /// Two triangles forming the square [-5, 5]² in the y = 0 plane, facing up.
    fn floor() -> CollisionObject {
        let vertices = vec![
            Vec3::new(-5.0, 0.0, -5.0),
            Vec3::new(5.0, 0.0, -5.0),
            Vec3::new(5.0, 0.0, 5.0),
            Vec3::new(-5.0, 0.0, 5.0),
        ];
        let indices = vec![[0, 2, 1], [0, 3, 2]];
        fixed(CollisionShape::triangle_mesh(vertices, indices).unwrap(), Vec3::ZERO)
    }

    #[test]
    fn test_sphere_on_mesh_tags_triangle() {
        let mut dispatcher = CollisionDispatcher::new();
        let ball = body(CollisionShape::sphere(0.5).unwrap(), Vec3::new(1.0, 0.45, 2.0));
        let mut algorithm = CollisionAlgorithm::new(AlgorithmKind::ConvexConcave, None);
        let manifold = collide(&mut algorithm, &mut dispatcher, &ball, &floor()).unwrap();
        let m = dispatcher.manifold(manifold).unwrap();
        assert!(m.num_contacts() >= 1);
        for point in m.points() {
            assert!(point.distance() < 0.0);
            assert!(point.normal_world_on_b.y.abs() > 0.9);
            assert_eq!(point.part_id1, 0);
            assert!(point.index1 == 0 || point.index1 == 1);
        }
        // Triangle views are transient; only the pair's manifold remains.
        assert_eq!(dispatcher.num_manifolds(), 1);
    }

    #[test]
    fn test_swapped_mesh_first() {
        let mut dispatcher = CollisionDispatcher::new();
        let cube = body(CollisionShape::cuboid(Vec3::splat(0.5)).unwrap(), Vec3::new(-2.0, 0.5, -3.0));
        let mut algorithm = CollisionAlgorithm::new(AlgorithmKind::SwappedConvexConcave, None);
        let manifold = collide(&mut algorithm, &mut dispatcher, &floor(), &cube).unwrap();
        let m = dispatcher.manifold(manifold).unwrap();
        assert_eq!(m.body0(), handle(1));
        assert!(m.num_contacts() >= 1);
        assert!(m.points().iter().all(|p| p.part_id1 == 0));
    }

    #[test]
    fn test_far_convex_touches_no_triangle() {
        let mut dispatcher = CollisionDispatcher::new();
        let ball = body(CollisionShape::sphere(0.5).unwrap(), Vec3::new(0.0, 3.0, 0.0));
        let mut algorithm = CollisionAlgorithm::new(AlgorithmKind::ConvexConcave, None);
        let manifold = collide(&mut algorithm, &mut dispatcher, &ball, &floor()).unwrap();
        assert_eq!(dispatcher.manifold(manifold).unwrap().num_contacts(), 0);
    }

    #[test]
    fn test_time_of_impact_against_floor() {
        let mut dispatcher = CollisionDispatcher::new();
        let mut ball = body(CollisionShape::sphere(0.5).unwrap(), Vec3::new(1.0, 4.0, 0.3));
        ball.interpolation_world_transform = Transform::from_translation(Vec3::new(1.0, -4.0, 0.3));
        ball.ccd_square_motion_threshold = 0.01;
        ball.ccd_swept_sphere_radius = 0.5;
        let ground = floor();
        let mut algorithm = CollisionAlgorithm::new(AlgorithmKind::ConvexConcave, None);
        let w0 = CollisionObjectWrapper::new(handle(0), &ball);
        let w1 = CollisionObjectWrapper::new(handle(1), &ground);
        let toi = algorithm.calculate_time_of_impact(&w0, &w1, &mut dispatcher, &DispatcherInfo::default());
        // Touches when the center is at y = 0.5: 3.5 of 8 units travelled.
        assert!((toi - 3.5 / 8.0).abs() < 0.02, "toi = {toi}");
    }
}
