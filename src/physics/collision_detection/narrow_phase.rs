use tracing::trace;

use super::collision_task_registry::{AlgorithmKind, CollisionTaskRegistry};
use super::collision_tasks::{CollisionAlgorithm, CollisionObjectWrapper};
use super::contact_manifold::{PersistentManifold, DEFAULT_CONTACT_BREAKING_THRESHOLD};
use super::manifold_result::ManifoldResult;
use super::narrow_phase_callbacks::ContactCallbacks;
use super::pair_cache::OverlappingPairCache;
use crate::physics::collision_object::CollisionObject;
use crate::physics::handles::{ManifoldHandle, ObjectHandle};
use crate::utilities::memory::Arena;

/// How a dispatch pass treats each pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum DispatchFunc {
    /// Refresh contact manifolds at the current transforms.
    #[default]
    Discrete,
    /// Compute the earliest time of impact along the step's motion.
    Continuous,
}

/// Per-pass parameters of the narrow phase.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DispatcherInfo {
    pub time_step: f32,
    pub step_count: u32,
    pub dispatch_func: DispatchFunc,
    /// Smallest time of impact found in the last continuous pass; 1 means none.
    pub time_of_impact: f32,
    pub allowed_ccd_penetration: f32,
}

impl Default for DispatcherInfo {
    fn default() -> Self {
        Self {
            time_step: 0.0,
            step_count: 0,
            dispatch_func: DispatchFunc::Discrete,
            time_of_impact: 1.0,
            allowed_ccd_penetration: 0.04,
        }
    }
}

/// Owns the contact manifolds and runs the narrow phase over broadphase pairs.
///
/// Manifolds live in a generational arena, so a handle kept past
/// [`release_manifold`](Self::release_manifold) resolves to nothing instead of another
/// pair's contacts.
pub struct CollisionDispatcher {
    manifolds: Arena<PersistentManifold, ManifoldHandle>,
    registry: CollisionTaskRegistry,
    callbacks: ContactCallbacks,
    contact_breaking_threshold: f32,
}

impl Default for CollisionDispatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for CollisionDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CollisionDispatcher")
            .field("num_manifolds", &self.manifolds.len())
            .field("registry", &self.registry)
            .field("callbacks", &self.callbacks)
            .field("contact_breaking_threshold", &self.contact_breaking_threshold)
            .finish()
    }
}

impl CollisionDispatcher {
    pub fn new() -> Self {
        Self {
            manifolds: Arena::new(),
            registry: CollisionTaskRegistry::new(),
            callbacks: ContactCallbacks::new(),
            contact_breaking_threshold: DEFAULT_CONTACT_BREAKING_THRESHOLD,
        }
    }

    pub fn with_callbacks(mut self, callbacks: ContactCallbacks) -> Self {
        self.callbacks = callbacks;
        self
    }

    pub fn with_contact_breaking_threshold(mut self, threshold: f32) -> Self {
        self.contact_breaking_threshold = threshold;
        self
    }

    #[inline]
    pub fn contact_breaking_threshold(&self) -> f32 {
        self.contact_breaking_threshold
    }

    #[inline]
    pub fn registry(&self) -> &CollisionTaskRegistry {
        &self.registry
    }

    #[inline]
    pub fn registry_mut(&mut self) -> &mut CollisionTaskRegistry {
        &mut self.registry
    }

    #[inline]
    pub fn callbacks(&self) -> &ContactCallbacks {
        &self.callbacks
    }

    #[inline]
    pub fn callbacks_mut(&mut self) -> &mut ContactCallbacks {
        &mut self.callbacks
    }

    /// Creates the algorithm the registry selects for the two shapes. A shared manifold
    /// makes the algorithm report into it instead of creating its own.
    pub fn find_algorithm(
        &mut self,
        body0: &CollisionObjectWrapper<'_>,
        body1: &CollisionObjectWrapper<'_>,
        shared_manifold: Option<ManifoldHandle>,
    ) -> CollisionAlgorithm {
        let kind = self.registry.get_task_reference(body0.shape.shape_type(), body1.shape.shape_type());
        trace!(?kind, body0 = %body0.handle, body1 = %body1.handle, "created collision algorithm");
        CollisionAlgorithm::new(kind, shared_manifold)
    }

    /// Kind the registry would select for two shapes, without creating anything.
    #[inline]
    pub fn algorithm_kind(&self, body0: &CollisionObjectWrapper<'_>, body1: &CollisionObjectWrapper<'_>) -> AlgorithmKind {
        self.registry.get_task_reference(body0.shape.shape_type(), body1.shape.shape_type())
    }

    /// Whether the narrow phase should run for the pair at all.
    pub fn needs_collision(
        &self,
        handle0: ObjectHandle,
        body0: &CollisionObject,
        handle1: ObjectHandle,
        body1: &CollisionObject,
    ) -> bool {
        if !body0.is_active() && !body1.is_active() {
            return false;
        }
        if !body0.filter_accepts(body1) {
            return false;
        }
        body0.check_collide_with(handle1) && body1.check_collide_with(handle0)
    }

    /// Whether contacts between the pair should be solved.
    pub fn needs_response(&self, body0: &CollisionObject, body1: &CollisionObject) -> bool {
        body0.has_contact_response()
            && body1.has_contact_response()
            && !(body0.is_static_or_kinematic_object() && body1.is_static_or_kinematic_object())
    }

    /// Runs the narrow phase for every overlapping pair.
    ///
    /// The algorithm created for a pair is cached on the pair so its manifold persists
    /// across steps. A continuous pass lowers both objects' hit fractions and records the
    /// smallest time of impact in `info`.
    pub fn dispatch_all_collision_pairs(
        &mut self,
        pair_cache: &mut OverlappingPairCache,
        objects: &mut Arena<CollisionObject, ObjectHandle>,
        info: &mut DispatcherInfo,
    ) {
        if info.dispatch_func == DispatchFunc::Continuous {
            info.time_of_impact = 1.0;
        }
        pair_cache.process_all_overlapping_pairs(|pair| {
            let (handle0, handle1) = (pair.object0, pair.object1);
            let toi = {
                let (Some(object0), Some(object1)) = (objects.get(handle0), objects.get(handle1)) else {
                    return false;
                };
                if !self.needs_collision(handle0, object0, handle1, object1) {
                    return false;
                }
                let body0 = CollisionObjectWrapper::new(handle0, object0);
                let body1 = CollisionObjectWrapper::new(handle1, object1);
                if pair.algorithm.is_none() {
                    pair.algorithm = Some(self.find_algorithm(&body0, &body1, None));
                }
                let Some(algorithm) = pair.algorithm.as_mut() else {
                    return false;
                };
                match info.dispatch_func {
                    DispatchFunc::Discrete => {
                        let mut result = ManifoldResult::new(handle0, object0, handle1, object1);
                        algorithm.process_collision(&body0, &body1, self, info, &mut result);
                        return false;
                    }
                    DispatchFunc::Continuous => algorithm.calculate_time_of_impact(&body0, &body1, self, info),
                }
            };
            for handle in [handle0, handle1] {
                if let Some(object) = objects.get_mut(handle) {
                    object.hit_fraction = object.hit_fraction.min(toi);
                }
            }
            info.time_of_impact = info.time_of_impact.min(toi);
            false
        });
    }

    /// Allocates an empty manifold for the ordered pair.
    pub fn get_new_manifold(&mut self, body0: ObjectHandle, body1: ObjectHandle) -> ManifoldHandle {
        self.manifolds
            .insert(PersistentManifold::new(body0, body1, self.contact_breaking_threshold))
    }

    /// Frees a manifold. Points still carrying solver data are reported as destroyed.
    pub fn release_manifold(&mut self, handle: ManifoldHandle) {
        if let Some(mut manifold) = self.manifolds.remove(handle) {
            manifold.clear_manifold(&mut self.callbacks);
        }
    }

    pub fn clear_manifold(&mut self, handle: ManifoldHandle) {
        if let Some(manifold) = self.manifolds.get_mut(handle) {
            manifold.clear_manifold(&mut self.callbacks);
        }
    }

    #[inline]
    pub fn manifold(&self, handle: ManifoldHandle) -> Option<&PersistentManifold> {
        self.manifolds.get(handle)
    }

    #[inline]
    pub fn manifold_mut(&mut self, handle: ManifoldHandle) -> Option<&mut PersistentManifold> {
        self.manifolds.get_mut(handle)
    }

    /// A manifold together with the callbacks its edits must report to.
    #[inline]
    pub fn manifold_and_callbacks_mut(
        &mut self,
        handle: ManifoldHandle,
    ) -> Option<(&mut PersistentManifold, &mut ContactCallbacks)> {
        let manifold = self.manifolds.get_mut(handle)?;
        Some((manifold, &mut self.callbacks))
    }

    pub fn manifolds(&self) -> impl Iterator<Item = (ManifoldHandle, &PersistentManifold)> {
        self.manifolds.iter()
    }

    pub fn manifold_handles(&self) -> Vec<ManifoldHandle> {
        self.manifolds.handles()
    }

    #[inline]
    pub fn num_manifolds(&self) -> usize {
        self.manifolds.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::physics::collidables::CollisionShape;
    use crate::physics::collision_detection::contact_manifold::ManifoldPoint;
    use crate::physics::collision_object::ActivationState;
    use crate::physics::constraints::contact::ConstraintPersistentData;
    use crate::physics::rigid_body::RigidBodyDescription;
    use crate::utilities::memory::ArenaIndex;
    use crate::utilities::transform::Transform;
    use glam::Vec3;
    use std::cell::Cell;
    use std::rc::Rc;
    use std::sync::Arc;

    fn handle(index: u32) -> ObjectHandle {
        ObjectHandle(ArenaIndex { index, generation: 0 })
    }

    fn dynamic() -> CollisionObject {
        CollisionObject::new_rigid_body(
            Arc::new(CollisionShape::sphere(1.0).unwrap()),
            Transform::IDENTITY,
            &RigidBodyDescription::dynamic(1.0, Vec3::splat(0.4)),
        )
    }

    fn fixed() -> CollisionObject {
        CollisionObject::new(Arc::new(CollisionShape::sphere(1.0).unwrap()), Transform::IDENTITY)
    }

    #[test]
    fn test_needs_collision() {
        let dispatcher = CollisionDispatcher::new();
        let mut a = dynamic();
        let mut b = dynamic();
        assert!(dispatcher.needs_collision(handle(0), &a, handle(1), &b));

        a.force_activation_state(ActivationState::IslandSleeping);
        b.force_activation_state(ActivationState::IslandSleeping);
        assert!(!dispatcher.needs_collision(handle(0), &a, handle(1), &b));

        b.force_activation_state(ActivationState::ActiveTag);
        b.add_ignored_collision(handle(0));
        assert!(!dispatcher.needs_collision(handle(0), &a, handle(1), &b));
    }

    #[test]
    fn test_needs_response() {
        let dispatcher = CollisionDispatcher::new();
        assert!(dispatcher.needs_response(&dynamic(), &fixed()));
        assert!(!dispatcher.needs_response(&fixed(), &fixed()));
        let mut ghost = dynamic();
        ghost.collision_flags |= crate::physics::collision_object::CollisionFlags::NO_CONTACT_RESPONSE;
        assert!(!dispatcher.needs_response(&ghost, &dynamic()));
    }

    #[test]
    fn test_release_notifies_destroyed_payloads() {
        let destroyed = Rc::new(Cell::new(0));
        let counter = Rc::clone(&destroyed);
        let mut dispatcher = CollisionDispatcher::new().with_callbacks(
            ContactCallbacks::new().with_contact_destroyed(move |_: &ConstraintPersistentData| {
                counter.set(counter.get() + 1)
            }),
        );
        let manifold = dispatcher.get_new_manifold(handle(0), handle(1));
        let (m, callbacks) = dispatcher.manifold_and_callbacks_mut(manifold).unwrap();
        let mut with_payload = ManifoldPoint::new(Vec3::ZERO, Vec3::ZERO, Vec3::Y, -0.01);
        with_payload.persistent_data = Some(ConstraintPersistentData::default());
        m.add_manifold_point(with_payload, callbacks);
        m.add_manifold_point(ManifoldPoint::new(Vec3::X, Vec3::X, Vec3::Y, -0.01), callbacks);

        assert_eq!(dispatcher.num_manifolds(), 1);
        dispatcher.release_manifold(manifold);
        assert_eq!(dispatcher.num_manifolds(), 0);
        assert_eq!(destroyed.get(), 1);
        assert!(dispatcher.manifold(manifold).is_none());

        // A new manifold may reuse the slot but not the stale handle.
        let reused = dispatcher.get_new_manifold(handle(0), handle(1));
        assert_ne!(reused, manifold);
        assert!(dispatcher.manifold(manifold).is_none());
    }
}
