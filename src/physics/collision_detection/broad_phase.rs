use glam::Vec3;

use super::narrow_phase::CollisionDispatcher;
use super::pair_cache::OverlappingPairCache;
use crate::physics::collision_object::CollisionFilterGroups;
use crate::physics::handles::{ObjectHandle, ProxyHandle};
use crate::utilities::bounding_box::BoundingBox;
use crate::utilities::memory::Arena;

/// Broadphase entry of one collision object.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BroadphaseProxy {
    pub aabb_min: Vec3,
    pub aabb_max: Vec3,
    pub client_object: ObjectHandle,
    pub collision_filter_group: CollisionFilterGroups,
    pub collision_filter_mask: CollisionFilterGroups,
}

impl BroadphaseProxy {
    /// Group/mask test in both directions.
    #[inline]
    pub fn needs_broadphase_collision(&self, other: &BroadphaseProxy) -> bool {
        self.collision_filter_group.intersects(other.collision_filter_mask)
            && other.collision_filter_group.intersects(self.collision_filter_mask)
    }

    #[inline]
    pub fn overlaps(&self, other: &BroadphaseProxy) -> bool {
        BoundingBox::intersects_bounds(self.aabb_min, self.aabb_max, other.aabb_min, other.aabb_max)
    }
}

/// Source of candidate pairs for the narrow phase.
pub trait Broadphase {
    fn create_proxy(
        &mut self,
        aabb_min: Vec3,
        aabb_max: Vec3,
        client_object: ObjectHandle,
        collision_filter_group: CollisionFilterGroups,
        collision_filter_mask: CollisionFilterGroups,
    ) -> ProxyHandle;

    /// Removes the proxy together with its pairs, releasing their algorithms.
    fn destroy_proxy(&mut self, proxy: ProxyHandle, dispatcher: &mut CollisionDispatcher);

    fn set_aabb(&mut self, proxy: ProxyHandle, aabb_min: Vec3, aabb_max: Vec3);

    fn proxy(&self, proxy: ProxyHandle) -> Option<&BroadphaseProxy>;

    /// Brings the pair cache up to date with the current bounds. Pairs that stopped
    /// overlapping are removed and their algorithms released.
    fn calculate_overlapping_pairs(&mut self, dispatcher: &mut CollisionDispatcher);

    fn overlapping_pair_cache(&self) -> &OverlappingPairCache;

    fn overlapping_pair_cache_mut(&mut self) -> &mut OverlappingPairCache;
}

/// Brute-force broadphase testing every proxy against every other.
#[derive(Debug, Default)]
pub struct SimpleBroadphase {
    proxies: Arena<BroadphaseProxy, ProxyHandle>,
    pair_cache: OverlappingPairCache,
}

impl SimpleBroadphase {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn num_proxies(&self) -> usize {
        self.proxies.len()
    }
}

impl Broadphase for SimpleBroadphase {
    fn create_proxy(
        &mut self,
        aabb_min: Vec3,
        aabb_max: Vec3,
        client_object: ObjectHandle,
        collision_filter_group: CollisionFilterGroups,
        collision_filter_mask: CollisionFilterGroups,
    ) -> ProxyHandle {
        self.proxies.insert(BroadphaseProxy {
            aabb_min,
            aabb_max,
            client_object,
            collision_filter_group,
            collision_filter_mask,
        })
    }

    fn destroy_proxy(&mut self, proxy: ProxyHandle, dispatcher: &mut CollisionDispatcher) {
        self.pair_cache
            .remove_overlapping_pairs_containing_proxy(proxy, dispatcher);
        self.proxies.remove(proxy);
    }

    fn set_aabb(&mut self, proxy: ProxyHandle, aabb_min: Vec3, aabb_max: Vec3) {
        if let Some(p) = self.proxies.get_mut(proxy) {
            p.aabb_min = aabb_min;
            p.aabb_max = aabb_max;
        }
    }

    #[inline]
    fn proxy(&self, proxy: ProxyHandle) -> Option<&BroadphaseProxy> {
        self.proxies.get(proxy)
    }

    fn calculate_overlapping_pairs(&mut self, dispatcher: &mut CollisionDispatcher) {
        let proxies: Vec<(ProxyHandle, BroadphaseProxy)> = self.proxies.iter().map(|(h, p)| (h, *p)).collect();
        for (i, (handle0, proxy0)) in proxies.iter().enumerate() {
            for (handle1, proxy1) in &proxies[i + 1..] {
                if proxy0.overlaps(proxy1) && proxy0.needs_broadphase_collision(proxy1) {
                    self.pair_cache.add_overlapping_pair(
                        *handle0,
                        proxy0.client_object,
                        *handle1,
                        proxy1.client_object,
                    );
                }
            }
        }

        let proxies = &self.proxies;
        self.pair_cache.process_all_overlapping_pairs(|pair| {
            let still_overlapping = match (proxies.get(pair.proxy0), proxies.get(pair.proxy1)) {
                (Some(p0), Some(p1)) => p0.overlaps(p1),
                _ => false,
            };
            if !still_overlapping {
                pair.clean(dispatcher);
            }
            !still_overlapping
        });
    }

    #[inline]
    fn overlapping_pair_cache(&self) -> &OverlappingPairCache {
        &self.pair_cache
    }

    #[inline]
    fn overlapping_pair_cache_mut(&mut self) -> &mut OverlappingPairCache {
        &mut self.pair_cache
    }
}
