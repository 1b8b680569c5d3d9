//! Pairwise narrow-phase algorithms.
//!
//! An algorithm is created once per overlapping pair by the dispatcher and cached on the
//! pair, so whatever manifold it owns persists while the pair keeps overlapping.

pub mod compound_pair_collision_task;
pub mod convex_collision_task;
pub mod convex_concave_collision_task;
pub mod convex_plane_collision_task;
pub mod sphere_pair_tester;

pub use compound_pair_collision_task::CompoundCollisionAlgorithm;
pub use convex_collision_task::ConvexConvexAlgorithm;
pub use convex_concave_collision_task::ConvexConcaveCollisionAlgorithm;
pub use convex_plane_collision_task::ConvexPlaneCollisionAlgorithm;
pub use sphere_pair_tester::SphereSphereCollisionAlgorithm;

use super::collision_task_registry::AlgorithmKind;
use super::manifold_result::ManifoldResult;
use super::narrow_phase::{CollisionDispatcher, DispatcherInfo};
use crate::physics::collidables::CollisionShape;
use crate::physics::collision_object::CollisionObject;
use crate::physics::handles::{ManifoldHandle, ObjectHandle};
use crate::utilities::transform::Transform;

/// What an algorithm sees of one side of a pair.
///
/// Compound and concave algorithms substitute a child or triangle shape and its world
/// pose here while keeping the root object's handle.
#[derive(Debug, Clone, Copy)]
pub struct CollisionObjectWrapper<'a> {
    pub handle: ObjectHandle,
    pub shape: &'a CollisionShape,
    pub world_transform: Transform,
    pub interpolation_world_transform: Transform,
    pub hit_fraction: f32,
    pub ccd_square_motion_threshold: f32,
    pub ccd_swept_sphere_radius: f32,
}

impl<'a> CollisionObjectWrapper<'a> {
    pub fn new(handle: ObjectHandle, object: &'a CollisionObject) -> Self {
        Self {
            handle,
            shape: object.shape().as_ref(),
            world_transform: object.world_transform,
            interpolation_world_transform: object.interpolation_world_transform,
            hit_fraction: object.hit_fraction,
            ccd_square_motion_threshold: object.ccd_square_motion_threshold,
            ccd_swept_sphere_radius: object.ccd_swept_sphere_radius,
        }
    }

    /// The same object seen through a child shape placed at `local` relative to it.
    pub fn with_child<'b>(&self, shape: &'b CollisionShape, local: &Transform) -> CollisionObjectWrapper<'b> {
        CollisionObjectWrapper {
            handle: self.handle,
            shape,
            world_transform: self.world_transform * *local,
            interpolation_world_transform: self.interpolation_world_transform * *local,
            hit_fraction: self.hit_fraction,
            ccd_square_motion_threshold: self.ccd_square_motion_threshold,
            ccd_swept_sphere_radius: self.ccd_swept_sphere_radius,
        }
    }

    /// The same object with its shape replaced, pose unchanged.
    pub fn with_shape<'b>(&self, shape: &'b CollisionShape) -> CollisionObjectWrapper<'b> {
        self.with_child(shape, &Transform::IDENTITY)
    }
}

/// Manifold used by an algorithm, either created by it or lent by a parent algorithm.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct ManifoldSlot {
    manifold: Option<ManifoldHandle>,
    owned: bool,
}

impl ManifoldSlot {
    pub(crate) fn new(shared: Option<ManifoldHandle>) -> Self {
        Self {
            manifold: shared,
            owned: false,
        }
    }

    #[inline]
    pub(crate) fn handle(&self) -> Option<ManifoldHandle> {
        self.manifold
    }

    #[inline]
    pub(crate) fn owns_manifold(&self) -> bool {
        self.owned
    }

    /// Returns the manifold, creating an owned one for `(body0, body1)` on first use.
    pub(crate) fn get_or_create(
        &mut self,
        body0: ObjectHandle,
        body1: ObjectHandle,
        dispatcher: &mut CollisionDispatcher,
    ) -> ManifoldHandle {
        if let Some(handle) = self.manifold {
            if dispatcher.manifold(handle).is_some() {
                return handle;
            }
        }
        let handle = dispatcher.get_new_manifold(body0, body1);
        self.manifold = Some(handle);
        self.owned = true;
        handle
    }

    pub(crate) fn release(self, dispatcher: &mut CollisionDispatcher) {
        if let (true, Some(handle)) = (self.owned, self.manifold) {
            dispatcher.release_manifold(handle);
        }
    }
}

/// Narrow-phase algorithm for one pair, selected by [`AlgorithmKind`].
#[derive(Debug)]
pub enum CollisionAlgorithm {
    /// Pairs with no contact generation.
    Empty,
    SphereSphere(SphereSphereCollisionAlgorithm),
    ConvexConvex(ConvexConvexAlgorithm),
    ConvexConcave(ConvexConcaveCollisionAlgorithm),
    Compound(CompoundCollisionAlgorithm),
    ConvexPlane(ConvexPlaneCollisionAlgorithm),
}

impl CollisionAlgorithm {
    pub fn new(kind: AlgorithmKind, shared_manifold: Option<ManifoldHandle>) -> Self {
        match kind {
            AlgorithmKind::Empty => CollisionAlgorithm::Empty,
            AlgorithmKind::SphereSphere => {
                CollisionAlgorithm::SphereSphere(SphereSphereCollisionAlgorithm::new(shared_manifold))
            }
            AlgorithmKind::ConvexConvex => {
                CollisionAlgorithm::ConvexConvex(ConvexConvexAlgorithm::new(shared_manifold))
            }
            AlgorithmKind::ConvexConcave => {
                CollisionAlgorithm::ConvexConcave(ConvexConcaveCollisionAlgorithm::new(shared_manifold, false))
            }
            AlgorithmKind::SwappedConvexConcave => {
                CollisionAlgorithm::ConvexConcave(ConvexConcaveCollisionAlgorithm::new(shared_manifold, true))
            }
            AlgorithmKind::Compound => CollisionAlgorithm::Compound(CompoundCollisionAlgorithm::new(false)),
            AlgorithmKind::SwappedCompound => CollisionAlgorithm::Compound(CompoundCollisionAlgorithm::new(true)),
            AlgorithmKind::ConvexPlane => {
                CollisionAlgorithm::ConvexPlane(ConvexPlaneCollisionAlgorithm::new(shared_manifold, false))
            }
            AlgorithmKind::SwappedConvexPlane => {
                CollisionAlgorithm::ConvexPlane(ConvexPlaneCollisionAlgorithm::new(shared_manifold, true))
            }
        }
    }

    pub fn kind(&self) -> AlgorithmKind {
        match self {
            CollisionAlgorithm::Empty => AlgorithmKind::Empty,
            CollisionAlgorithm::SphereSphere(_) => AlgorithmKind::SphereSphere,
            CollisionAlgorithm::ConvexConvex(_) => AlgorithmKind::ConvexConvex,
            CollisionAlgorithm::ConvexConcave(a) if a.is_swapped() => AlgorithmKind::SwappedConvexConcave,
            CollisionAlgorithm::ConvexConcave(_) => AlgorithmKind::ConvexConcave,
            CollisionAlgorithm::Compound(a) if a.is_swapped() => AlgorithmKind::SwappedCompound,
            CollisionAlgorithm::Compound(_) => AlgorithmKind::Compound,
            CollisionAlgorithm::ConvexPlane(a) if a.is_swapped() => AlgorithmKind::SwappedConvexPlane,
            CollisionAlgorithm::ConvexPlane(_) => AlgorithmKind::ConvexPlane,
        }
    }

    /// Generates contacts at the current transforms and reports them through `result`.
    pub fn process_collision(
        &mut self,
        body0: &CollisionObjectWrapper<'_>,
        body1: &CollisionObjectWrapper<'_>,
        dispatcher: &mut CollisionDispatcher,
        info: &DispatcherInfo,
        result: &mut ManifoldResult,
    ) {
        match self {
            CollisionAlgorithm::Empty => {}
            CollisionAlgorithm::SphereSphere(a) => a.process_collision(body0, body1, dispatcher, result),
            CollisionAlgorithm::ConvexConvex(a) => a.process_collision(body0, body1, dispatcher, result),
            CollisionAlgorithm::ConvexConcave(a) => a.process_collision(body0, body1, dispatcher, info, result),
            CollisionAlgorithm::Compound(a) => a.process_collision(body0, body1, dispatcher, info, result),
            CollisionAlgorithm::ConvexPlane(a) => a.process_collision(body0, body1, dispatcher, result),
        }
    }

    /// Earliest fraction in `[0, 1]` of the motion from the world to the interpolation
    /// transforms at which the pair touches; 1 means no impact.
    pub fn calculate_time_of_impact(
        &mut self,
        body0: &CollisionObjectWrapper<'_>,
        body1: &CollisionObjectWrapper<'_>,
        dispatcher: &mut CollisionDispatcher,
        info: &DispatcherInfo,
    ) -> f32 {
        match self {
            CollisionAlgorithm::Empty | CollisionAlgorithm::SphereSphere(_) | CollisionAlgorithm::ConvexPlane(_) => 1.0,
            CollisionAlgorithm::ConvexConvex(a) => a.calculate_time_of_impact(body0, body1, info),
            CollisionAlgorithm::ConvexConcave(a) => a.calculate_time_of_impact(body0, body1),
            CollisionAlgorithm::Compound(a) => a.calculate_time_of_impact(body0, body1, dispatcher, info),
        }
    }

    /// Handle of the manifold this algorithm reports into, if it has one yet.
    pub fn manifold(&self) -> Option<ManifoldHandle> {
        match self {
            CollisionAlgorithm::Empty | CollisionAlgorithm::Compound(_) => None,
            CollisionAlgorithm::SphereSphere(a) => a.manifold(),
            CollisionAlgorithm::ConvexConvex(a) => a.manifold(),
            CollisionAlgorithm::ConvexConcave(a) => a.manifold(),
            CollisionAlgorithm::ConvexPlane(a) => a.manifold(),
        }
    }

    /// Frees every manifold the algorithm, or any child algorithm, owns.
    pub fn release(self, dispatcher: &mut CollisionDispatcher) {
        match self {
            CollisionAlgorithm::Empty => {}
            CollisionAlgorithm::SphereSphere(a) => a.release(dispatcher),
            CollisionAlgorithm::ConvexConvex(a) => a.release(dispatcher),
            CollisionAlgorithm::ConvexConcave(a) => a.release(dispatcher),
            CollisionAlgorithm::Compound(a) => a.release(dispatcher),
            CollisionAlgorithm::ConvexPlane(a) => a.release(dispatcher),
        }
    }
}


#[cfg(test)]
mod tests {
    use super::test_support::*;
    use super::*;
    use glam::Vec3;

    #[test]
    fn test_kind_round_trips_through_constructor() {
        for kind in [
            AlgorithmKind::Empty,
            AlgorithmKind::SphereSphere,
            AlgorithmKind::ConvexConvex,
            AlgorithmKind::ConvexConcave,
            AlgorithmKind::SwappedConvexConcave,
            AlgorithmKind::Compound,
            AlgorithmKind::SwappedCompound,
            AlgorithmKind::ConvexPlane,
            AlgorithmKind::SwappedConvexPlane,
        ] {
            assert_eq!(CollisionAlgorithm::new(kind, None).kind(), kind);
        }
    }

    #[test]
    fn test_release_frees_owned_manifold_only() {
        let mut dispatcher = CollisionDispatcher::new();
        let a = body(CollisionShape::sphere(1.0).unwrap(), Vec3::ZERO);
        let b = body(CollisionShape::sphere(1.0).unwrap(), Vec3::X * 1.5);

        let mut owner = CollisionAlgorithm::new(AlgorithmKind::SphereSphere, None);
        collide(&mut owner, &mut dispatcher, &a, &b);
        assert_eq!(dispatcher.num_manifolds(), 1);
        owner.release(&mut dispatcher);
        assert_eq!(dispatcher.num_manifolds(), 0);

        let shared = dispatcher.get_new_manifold(handle(0), handle(1));
        let mut borrower = CollisionAlgorithm::new(AlgorithmKind::SphereSphere, Some(shared));
        assert_eq!(collide(&mut borrower, &mut dispatcher, &a, &b), Some(shared));
        borrower.release(&mut dispatcher);
        assert!(dispatcher.manifold(shared).is_some());
    }

    #[test]
    fn test_child_wrapper_composes_pose() {
        let object = body(CollisionShape::sphere(1.0).unwrap(), Vec3::X);
        let child_shape = CollisionShape::sphere(0.5).unwrap();
        let wrapper = CollisionObjectWrapper::new(handle(3), &object);
        let child = wrapper.with_child(&child_shape, &Transform::from_translation(Vec3::Y));
        assert_eq!(child.handle, handle(3));
        assert_eq!(child.world_transform.origin, Vec3::new(1.0, 1.0, 0.0));
    }
}
