use super::{CollisionObjectWrapper, ManifoldSlot};
use crate::physics::collidables::{ConvexShape, Sphere};
use crate::physics::collision_detection::convex::{
    ClosestPointInput, GjkConvexCast, GjkPairDetector, MinkowskiPenetrationDepthSolver, VoronoiSimplexSolver,
};
use crate::physics::collision_detection::manifold_result::ManifoldResult;
use crate::physics::collision_detection::narrow_phase::{CollisionDispatcher, DispatcherInfo};
use crate::physics::handles::ManifoldHandle;
use crate::utilities::transform::Transform;

/// Generic convex vs convex contact through GJK with a penetration-depth fallback.
///
/// Emits at most one point per call; the persistent manifold accumulates points across
/// calls and reduces them to four.
#[derive(Debug, Clone, Default)]
pub struct ConvexConvexAlgorithm {
    slot: ManifoldSlot,
    simplex_solver: VoronoiSimplexSolver,
    penetration_depth_solver: MinkowskiPenetrationDepthSolver,
}

impl ConvexConvexAlgorithm {
    pub fn new(shared_manifold: Option<ManifoldHandle>) -> Self {
        Self {
            slot: ManifoldSlot::new(shared_manifold),
            ..Default::default()
        }
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
        result: &mut ManifoldResult,
    ) {
        let (Some(convex0), Some(convex1)) = (body0.shape.as_convex(), body1.shape.as_convex()) else {
            return;
        };
        let manifold = self.slot.get_or_create(body0.handle, body1.handle, dispatcher);
        result.set_persistent_manifold(manifold);
        let threshold = dispatcher
            .manifold(manifold)
            .map_or(dispatcher.contact_breaking_threshold(), |m| m.contact_breaking_threshold());

        let mut input = ClosestPointInput::new(body0.world_transform, body1.world_transform);
        let reach = convex0.margin() + convex1.margin() + threshold;
        input.maximum_distance_squared = reach * reach;

        let mut gjk = GjkPairDetector::new(convex0, convex1, Some(&self.penetration_depth_solver));
        if let Some(closest) = gjk.get_closest_points(&input, &mut self.simplex_solver) {
            result.add_contact_point(closest.normal_on_b, closest.point_on_b, closest.distance, dispatcher);
        }

        if self.slot.owns_manifold() {
            result.refresh_contact_points(dispatcher);
        }
    }

    /// Swept-sphere approximation of continuous collision.
    ///
    /// Each side is cast in turn against a sphere standing in for the other, and the
    /// earlier of the two impacts wins. Rotation over the step is ignored.
    pub fn calculate_time_of_impact(
        &mut self,
        body0: &CollisionObjectWrapper<'_>,
        body1: &CollisionObjectWrapper<'_>,
        info: &DispatcherInfo,
    ) -> f32 {
        let square_motion0 =
            (body0.interpolation_world_transform.origin - body0.world_transform.origin).length_squared();
        let square_motion1 =
            (body1.interpolation_world_transform.origin - body1.world_transform.origin).length_squared();
        if square_motion0 < body0.ccd_square_motion_threshold && square_motion1 < body1.ccd_square_motion_threshold {
            return 1.0;
        }
        let (Some(convex0), Some(convex1)) = (body0.shape.as_convex(), body1.shape.as_convex()) else {
            return 1.0;
        };

        let sphere1 = Sphere::new(body1.ccd_swept_sphere_radius);
        let sphere0 = Sphere::new(body0.ccd_swept_sphere_radius);
        let from_to = |body: &CollisionObjectWrapper<'_>| -> (Transform, Transform) {
            (body.world_transform, body.interpolation_world_transform)
        };
        let (from0, to0) = from_to(body0);
        let (from1, to1) = from_to(body1);

        let mut fraction = 1.0f32;
        let casts: [(&dyn ConvexShape, &dyn ConvexShape); 2] = [(convex0, &sphere1), (&sphere0, convex1)];
        for (shape_a, shape_b) in casts {
            let mut cast = GjkConvexCast::new(shape_a, shape_b);
            cast.allowed_penetration = info.allowed_ccd_penetration;
            if let Some(hit) = cast.calc_time_of_impact(&from0, &to0, &from1, &to1, &mut self.simplex_solver) {
                fraction = fraction.min(hit.fraction);
            }
        }
        fraction
    }

    pub fn release(self, dispatcher: &mut CollisionDispatcher) {
        self.slot.release(dispatcher);
    }
}
