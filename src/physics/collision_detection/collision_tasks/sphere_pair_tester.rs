use glam::Vec3;

use super::{CollisionObjectWrapper, ManifoldSlot};
use crate::physics::collidables::CollisionShape;
use crate::physics::collision_detection::manifold_result::ManifoldResult;
use crate::physics::collision_detection::narrow_phase::CollisionDispatcher;
use crate::physics::handles::ManifoldHandle;
use crate::utilities::math_helper::SIMD_EPSILON;

/// Closed-form sphere vs sphere contact.
///
/// The manifold is cleared and rewritten on every call; there is never more than the one
/// point along the center axis.
#[derive(Debug, Clone, Default)]
pub struct SphereSphereCollisionAlgorithm {
    slot: ManifoldSlot,
}

impl SphereSphereCollisionAlgorithm {
    pub fn new(shared_manifold: Option<ManifoldHandle>) -> Self {
        Self {
            slot: ManifoldSlot::new(shared_manifold),
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
        let (CollisionShape::Sphere(sphere0), CollisionShape::Sphere(sphere1)) = (body0.shape, body1.shape) else {
            return;
        };
        let manifold = self.slot.get_or_create(body0.handle, body1.handle, dispatcher);
        result.set_persistent_manifold(manifold);
        dispatcher.clear_manifold(manifold);

        let diff = body0.world_transform.origin - body1.world_transform.origin;
        let len = diff.length();
        let radius_sum = sphere0.radius + sphere1.radius;
        if len > radius_sum {
            return;
        }
        let dist = len - radius_sum;

        // Coincident centers have no axis of their own.
        let normal_on_b = if len > SIMD_EPSILON { diff / len } else { Vec3::X };
        let point_on_b = body1.world_transform.origin + normal_on_b * sphere1.radius;
        result.add_contact_point(normal_on_b, point_on_b, dist, dispatcher);
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
    use approx::assert_relative_eq;

    fn spheres(distance: f32) -> (CollisionDispatcher, Option<ManifoldHandle>) {
        let mut dispatcher = CollisionDispatcher::new();
        let a = body(CollisionShape::sphere(1.0).unwrap(), Vec3::ZERO);
        let b = body(CollisionShape::sphere(0.5).unwrap(), Vec3::new(distance, 0.0, 0.0));
        let mut algorithm = CollisionAlgorithm::new(AlgorithmKind::SphereSphere, None);
        let manifold = collide(&mut algorithm, &mut dispatcher, &a, &b);
        (dispatcher, manifold)
    }

    #[test]
    fn test_contact_iff_within_radius_sum() {
        let (dispatcher, manifold) = spheres(1.4);
        let m = dispatcher.manifold(manifold.unwrap()).unwrap();
        assert_eq!(m.num_contacts(), 1);
        let point = m.contact_point(0);
        assert_relative_eq!(point.distance(), -0.1, epsilon = 1e-5);
        assert_relative_eq!(point.normal_world_on_b, Vec3::NEG_X, epsilon = 1e-5);
        assert_relative_eq!(point.position_world_on_b(), Vec3::new(0.9, 0.0, 0.0), epsilon = 1e-5);

        let (dispatcher, manifold) = spheres(1.5);
        assert_eq!(dispatcher.manifold(manifold.unwrap()).unwrap().num_contacts(), 1);

        let (dispatcher, manifold) = spheres(1.6);
        assert_eq!(dispatcher.manifold(manifold.unwrap()).unwrap().num_contacts(), 0);
    }

    #[test]
    fn test_coincident_centers_use_default_axis() {
        let (dispatcher, manifold) = spheres(0.0);
        let m = dispatcher.manifold(manifold.unwrap()).unwrap();
        assert_eq!(m.num_contacts(), 1);
        let point = m.contact_point(0);
        assert_eq!(point.normal_world_on_b, Vec3::X);
        assert_relative_eq!(point.distance(), -1.5, epsilon = 1e-6);
        assert!(point.normal_world_on_b.is_finite());
    }

    #[test]
    fn test_manifold_is_rewritten_each_call() {
        let mut dispatcher = CollisionDispatcher::new();
        let a = body(CollisionShape::sphere(1.0).unwrap(), Vec3::ZERO);
        let mut b = body(CollisionShape::sphere(1.0).unwrap(), Vec3::X * 1.9);
        let mut algorithm = CollisionAlgorithm::new(AlgorithmKind::SphereSphere, None);
        let manifold = collide(&mut algorithm, &mut dispatcher, &a, &b).unwrap();
        b.world_transform.origin = Vec3::Y * 1.8;
        collide(&mut algorithm, &mut dispatcher, &a, &b);
        let m = dispatcher.manifold(manifold).unwrap();
        assert_eq!(m.num_contacts(), 1);
        assert_relative_eq!(m.contact_point(0).normal_world_on_b, Vec3::NEG_Y, epsilon = 1e-5);
    }
}
