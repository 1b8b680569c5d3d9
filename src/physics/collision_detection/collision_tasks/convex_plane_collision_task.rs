use super::{CollisionObjectWrapper, ManifoldSlot};
use crate::physics::collidables::CollisionShape;
use crate::physics::collision_detection::manifold_result::ManifoldResult;
use crate::physics::collision_detection::narrow_phase::CollisionDispatcher;
use crate::physics::handles::ManifoldHandle;

/// Convex shape against an infinite static plane.
///
/// The deepest support point of the convex along the plane's inward normal yields a single
/// contact per call; the persistent manifold gathers the rest over time.
#[derive(Debug, Clone, Default)]
pub struct ConvexPlaneCollisionAlgorithm {
    slot: ManifoldSlot,
    swapped: bool,
}

impl ConvexPlaneCollisionAlgorithm {
    pub fn new(shared_manifold: Option<ManifoldHandle>, swapped: bool) -> Self {
        Self {
            slot: ManifoldSlot::new(shared_manifold),
            swapped,
        }
    }

    /// True when the plane is the pair's first object.
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
        result: &mut ManifoldResult,
    ) {
        let (convex_body, plane_body) = if self.swapped { (body1, body0) } else { (body0, body1) };
        let (Some(convex), CollisionShape::StaticPlane(plane)) = (convex_body.shape.as_convex(), plane_body.shape)
        else {
            return;
        };
        let manifold = self.slot.get_or_create(convex_body.handle, plane_body.handle, dispatcher);
        result.set_persistent_manifold(manifold);

        let plane_in_convex = convex_body.world_transform.inverse_times(&plane_body.world_transform);
        let convex_in_plane = plane_body.world_transform.inverse_times(&convex_body.world_transform);

        let support = convex.local_support_without_margin(plane_in_convex.basis * -plane.normal);
        let support_in_plane = convex_in_plane.transform_point(support);
        let distance = plane.normal.dot(support_in_plane) - plane.constant - convex.margin();

        let threshold = dispatcher
            .manifold(manifold)
            .map_or(dispatcher.contact_breaking_threshold(), |m| m.contact_breaking_threshold());
        if distance < threshold {
            let projected = support_in_plane - plane.normal * (distance + convex.margin());
            let normal_on_plane = plane_body.world_transform.basis * plane.normal;
            let point_on_plane = plane_body.world_transform.transform_point(projected);
            result.add_contact_point(normal_on_plane, point_on_plane, distance, dispatcher);
        }

        if self.slot.owns_manifold() {
            result.refresh_contact_points(dispatcher);
        }
    }

    pub fn release(self, dispatcher: &mut CollisionDispatcher) {
        self.slot.release(dispatcher);
    }
}
