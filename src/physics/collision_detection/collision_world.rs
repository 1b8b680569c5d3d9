use glam::Vec3;
use rustc_hash::FxHashMap;
use tracing::{debug, trace};

use super::broad_phase::{Broadphase, SimpleBroadphase};
use super::narrow_phase::{CollisionDispatcher, DispatchFunc, DispatcherInfo};
use crate::error::{PhysicsError, Result};
use crate::physics::collision_object::{ActivationState, CollisionFilterGroups, CollisionObject};
use crate::physics::diagnostics::{Diagnostic, DiagnosticSink, TracingSink};
use crate::physics::handles::{ObjectHandle, ProxyHandle};
use crate::utilities::memory::Arena;

/// Bounds whose squared diagonal reaches this are treated as a numerical blow-up.
const AABB_OVERFLOW_DIAGONAL_SQUARED: f32 = 1e12;

/// Registry of collision objects with their broadphase proxies, plus the dispatcher that
/// turns overlapping pairs into contact manifolds.
pub struct CollisionWorld {
    pub(crate) objects: Arena<CollisionObject, ObjectHandle>,
    proxies: FxHashMap<ObjectHandle, ProxyHandle>,
    pub(crate) broadphase: Box<dyn Broadphase>,
    pub(crate) dispatcher: CollisionDispatcher,
    pub(crate) dispatch_info: DispatcherInfo,
    pub(crate) diagnostics: Box<dyn DiagnosticSink>,
    report_aabb_overflow: bool,
}

impl Default for CollisionWorld {
    fn default() -> Self {
        Self::new(Box::new(SimpleBroadphase::new()), CollisionDispatcher::new())
    }
}

impl std::fmt::Debug for CollisionWorld {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CollisionWorld")
            .field("num_objects", &self.objects.len())
            .field("num_pairs", &self.broadphase.overlapping_pair_cache().len())
            .field("dispatcher", &self.dispatcher)
            .field("dispatch_info", &self.dispatch_info)
            .finish()
    }
}

impl CollisionWorld {
    pub fn new(broadphase: Box<dyn Broadphase>, dispatcher: CollisionDispatcher) -> Self {
        Self {
            objects: Arena::new(),
            proxies: FxHashMap::default(),
            broadphase,
            dispatcher,
            dispatch_info: DispatcherInfo::default(),
            diagnostics: Box::new(TracingSink),
            report_aabb_overflow: true,
        }
    }

    /// Routes diagnostics to `sink` instead of `tracing`.
    pub fn with_diagnostic_sink(mut self, sink: Box<dyn DiagnosticSink>) -> Self {
        self.diagnostics = sink;
        self
    }

    pub fn set_diagnostic_sink(&mut self, sink: Box<dyn DiagnosticSink>) {
        self.diagnostics = sink;
    }

    /// Registers an object under the given filter group and mask.
    pub fn add_collision_object(
        &mut self,
        mut object: CollisionObject,
        group: CollisionFilterGroups,
        mask: CollisionFilterGroups,
    ) -> ObjectHandle {
        object.filter_group = group;
        object.filter_mask = mask;
        let aabb = object.shape().aabb(&object.world_transform);
        let handle = self.objects.insert(object);
        let proxy = self.broadphase.create_proxy(aabb.min, aabb.max, handle, group, mask);
        self.proxies.insert(handle, proxy);
        trace!(object = %handle, "added collision object");
        handle
    }

    /// Unregisters an object. Its pairs are dropped and their manifolds released.
    pub fn remove_collision_object(&mut self, handle: ObjectHandle) -> Result<CollisionObject> {
        let object = self
            .objects
            .remove(handle)
            .ok_or_else(|| PhysicsError::StaleHandle(handle.to_string()))?;
        if let Some(proxy) = self.proxies.remove(&handle) {
            self.broadphase.destroy_proxy(proxy, &mut self.dispatcher);
        }
        trace!(object = %handle, "removed collision object");
        Ok(object)
    }

    #[inline]
    pub fn object(&self, handle: ObjectHandle) -> Option<&CollisionObject> {
        self.objects.get(handle)
    }

    #[inline]
    pub fn object_mut(&mut self, handle: ObjectHandle) -> Option<&mut CollisionObject> {
        self.objects.get_mut(handle)
    }

    pub fn objects(&self) -> impl Iterator<Item = (ObjectHandle, &CollisionObject)> {
        self.objects.iter()
    }

    pub fn objects_mut(&mut self) -> impl Iterator<Item = (ObjectHandle, &mut CollisionObject)> {
        self.objects.iter_mut()
    }

    #[inline]
    pub fn num_collision_objects(&self) -> usize {
        self.objects.len()
    }

    #[inline]
    pub fn proxy(&self, handle: ObjectHandle) -> Option<ProxyHandle> {
        self.proxies.get(&handle).copied()
    }

    #[inline]
    pub fn dispatcher(&self) -> &CollisionDispatcher {
        &self.dispatcher
    }

    #[inline]
    pub fn dispatcher_mut(&mut self) -> &mut CollisionDispatcher {
        &mut self.dispatcher
    }

    #[inline]
    pub fn dispatch_info(&self) -> &DispatcherInfo {
        &self.dispatch_info
    }

    #[inline]
    pub fn dispatch_info_mut(&mut self) -> &mut DispatcherInfo {
        &mut self.dispatch_info
    }

    #[inline]
    pub fn broadphase(&self) -> &dyn Broadphase {
        self.broadphase.as_ref()
    }

    /// Pushes the bounds of one object to the broadphase, padded by the contact breaking
    /// threshold.
    ///
    /// Moving objects with absurd bounds are taken out of the simulation instead; the
    /// first such event is reported to the diagnostic sink.
    pub fn update_single_aabb(&mut self, handle: ObjectHandle) {
        let Some(object) = self.objects.get_mut(handle) else {
            return;
        };
        let Some(&proxy) = self.proxies.get(&handle) else {
            return;
        };
        let mut aabb = object.shape().aabb(&object.world_transform);
        aabb.expand(self.dispatcher.contact_breaking_threshold());

        if object.is_static_object() || aabb.diagonal_length_squared() < AABB_OVERFLOW_DIAGONAL_SQUARED {
            self.broadphase.set_aabb(proxy, aabb.min, aabb.max);
            return;
        }

        object.force_activation_state(ActivationState::DisableSimulation);
        if self.report_aabb_overflow {
            self.report_aabb_overflow = false;
            self.diagnostics.report(&Diagnostic::AabbOverflow {
                object: handle,
                aabb_min: aabb.min,
                aabb_max: aabb.max,
            });
        }
    }

    /// Refreshes the bounds of every active object.
    pub fn update_aabbs(&mut self) {
        let active: Vec<ObjectHandle> = self
            .objects
            .iter()
            .filter(|(_, object)| object.is_active())
            .map(|(handle, _)| handle)
            .collect();
        for handle in active {
            self.update_single_aabb(handle);
        }
    }

    /// One full detection pass: bounds, broadphase pairs, then the narrow phase.
    pub fn perform_discrete_collision_detection(&mut self) {
        self.update_aabbs();
        self.broadphase.calculate_overlapping_pairs(&mut self.dispatcher);
        self.dispatch_info.dispatch_func = DispatchFunc::Discrete;
        let pair_cache = self.broadphase.overlapping_pair_cache_mut();
        self.dispatcher
            .dispatch_all_collision_pairs(pair_cache, &mut self.objects, &mut self.dispatch_info);
        debug!(
            pairs = self.broadphase.overlapping_pair_cache().len(),
            manifolds = self.dispatcher.num_manifolds(),
            "discrete collision detection"
        );
    }

    /// Time-of-impact pass over the current pairs, sweeping each object from its world
    /// transform to its interpolation transform. Lowers hit fractions; returns the
    /// smallest time of impact found.
    pub fn perform_continuous_collision_detection(&mut self) -> f32 {
        self.dispatch_info.dispatch_func = DispatchFunc::Continuous;
        let pair_cache = self.broadphase.overlapping_pair_cache_mut();
        self.dispatcher
            .dispatch_all_collision_pairs(pair_cache, &mut self.objects, &mut self.dispatch_info);
        self.dispatch_info.dispatch_func = DispatchFunc::Discrete;
        self.dispatch_info.time_of_impact
    }

    /// Bounds of an object as the broadphase currently sees them.
    pub fn broadphase_aabb(&self, handle: ObjectHandle) -> Option<(Vec3, Vec3)> {
        let proxy = self.broadphase.proxy(*self.proxies.get(&handle)?)?;
        Some((proxy.aabb_min, proxy.aabb_max))
    }
}
