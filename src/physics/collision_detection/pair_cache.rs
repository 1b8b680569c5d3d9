use rustc_hash::FxHashMap;
use std::fmt;

use super::collision_tasks::CollisionAlgorithm;
use super::narrow_phase::CollisionDispatcher;
use crate::physics::handles::{ObjectHandle, ProxyHandle};

/// Two overlapping broadphase proxies and the narrow-phase algorithm cached for them.
///
/// The pair outlives a single step; keeping the algorithm here is what lets contact
/// manifolds persist while the proxies keep overlapping.
#[derive(Debug)]
pub struct BroadphasePair {
    pub proxy0: ProxyHandle,
    pub proxy1: ProxyHandle,
    pub object0: ObjectHandle,
    pub object1: ObjectHandle,
    pub algorithm: Option<CollisionAlgorithm>,
}

impl BroadphasePair {
    #[inline]
    pub fn contains_proxy(&self, proxy: ProxyHandle) -> bool {
        self.proxy0 == proxy || self.proxy1 == proxy
    }

    /// Releases the cached algorithm and whatever manifolds it owns.
    pub fn clean(&mut self, dispatcher: &mut CollisionDispatcher) {
        if let Some(algorithm) = self.algorithm.take() {
            algorithm.release(dispatcher);
        }
    }
}

impl fmt::Display for BroadphasePair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<{}, {}>", self.object0, self.object1)
    }
}

/// Set of overlapping proxy pairs, indexed by the ordered proxy handles.
#[derive(Debug, Default)]
pub struct OverlappingPairCache {
    pairs: Vec<BroadphasePair>,
    index: FxHashMap<(ProxyHandle, ProxyHandle), usize>,
}

impl OverlappingPairCache {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    fn key(proxy0: ProxyHandle, proxy1: ProxyHandle) -> (ProxyHandle, ProxyHandle) {
        if proxy0 <= proxy1 {
            (proxy0, proxy1)
        } else {
            (proxy1, proxy0)
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    #[inline]
    pub fn pairs(&self) -> &[BroadphasePair] {
        &self.pairs
    }

    #[inline]
    pub fn pairs_mut(&mut self) -> &mut [BroadphasePair] {
        &mut self.pairs
    }

    pub fn find_pair(&self, proxy0: ProxyHandle, proxy1: ProxyHandle) -> Option<&BroadphasePair> {
        self.index
            .get(&Self::key(proxy0, proxy1))
            .map(|&i| &self.pairs[i])
    }

    /// Adds the pair unless it is already present. Returns whether it was added.
    /// Proxies are stored in handle order.
    pub fn add_overlapping_pair(
        &mut self,
        proxy0: ProxyHandle,
        object0: ObjectHandle,
        proxy1: ProxyHandle,
        object1: ObjectHandle,
    ) -> bool {
        debug_assert_ne!(proxy0, proxy1);
        let key = Self::key(proxy0, proxy1);
        if self.index.contains_key(&key) {
            return false;
        }
        let (object0, object1) = if key.0 == proxy0 {
            (object0, object1)
        } else {
            (object1, object0)
        };
        self.index.insert(key, self.pairs.len());
        self.pairs.push(BroadphasePair {
            proxy0: key.0,
            proxy1: key.1,
            object0,
            object1,
            algorithm: None,
        });
        true
    }

    fn remove_at(&mut self, index: usize) -> BroadphasePair {
        let pair = self.pairs.swap_remove(index);
        self.index.remove(&(pair.proxy0, pair.proxy1));
        if let Some(moved) = self.pairs.get(index) {
            self.index.insert((moved.proxy0, moved.proxy1), index);
        }
        pair
    }

    /// Removes the pair and releases its algorithm. Returns whether it existed.
    pub fn remove_overlapping_pair(
        &mut self,
        proxy0: ProxyHandle,
        proxy1: ProxyHandle,
        dispatcher: &mut CollisionDispatcher,
    ) -> bool {
        match self.index.get(&Self::key(proxy0, proxy1)).copied() {
            Some(i) => {
                self.remove_at(i).clean(dispatcher);
                true
            }
            None => false,
        }
    }

    /// Releases the algorithms of every pair involving `proxy`, keeping the pairs.
    pub fn clean_proxy_from_pairs(&mut self, proxy: ProxyHandle, dispatcher: &mut CollisionDispatcher) {
        for pair in self.pairs.iter_mut().filter(|p| p.contains_proxy(proxy)) {
            pair.clean(dispatcher);
        }
    }

    pub fn remove_overlapping_pairs_containing_proxy(
        &mut self,
        proxy: ProxyHandle,
        dispatcher: &mut CollisionDispatcher,
    ) {
        let mut i = 0;
        while i < self.pairs.len() {
            if self.pairs[i].contains_proxy(proxy) {
                self.remove_at(i).clean(dispatcher);
            } else {
                i += 1;
            }
        }
    }

    /// Visits every pair. A callback returning `true` drops that pair; it must have
    /// released the pair's algorithm first.
    pub fn process_all_overlapping_pairs<F>(&mut self, mut callback: F)
    where
        F: FnMut(&mut BroadphasePair) -> bool,
    {
        let mut i = 0;
        while i < self.pairs.len() {
            if callback(&mut self.pairs[i]) {
                let removed = self.remove_at(i);
                debug_assert!(removed.algorithm.is_none(), "pair {removed} dropped with a live algorithm");
            } else {
                i += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utilities::memory::ArenaIndex;

    fn proxy(index: u32) -> ProxyHandle {
        ProxyHandle(ArenaIndex { index, generation: 0 })
    }

    fn object(index: u32) -> ObjectHandle {
        ObjectHandle(ArenaIndex { index, generation: 0 })
    }

    #[test]
    fn test_pairs_are_unordered_and_unique() {
        let mut cache = OverlappingPairCache::new();
        assert!(cache.add_overlapping_pair(proxy(2), object(20), proxy(1), object(10)));
        assert!(!cache.add_overlapping_pair(proxy(1), object(10), proxy(2), object(20)));
        let pair = cache.find_pair(proxy(2), proxy(1)).unwrap();
        assert_eq!((pair.proxy0, pair.object0), (proxy(1), object(10)));
        assert_eq!((pair.proxy1, pair.object1), (proxy(2), object(20)));
    }

    #[test]
    fn test_removal_keeps_index_consistent() {
        let mut dispatcher = CollisionDispatcher::new();
        let mut cache = OverlappingPairCache::new();
        cache.add_overlapping_pair(proxy(0), object(0), proxy(1), object(1));
        cache.add_overlapping_pair(proxy(0), object(0), proxy(2), object(2));
        cache.add_overlapping_pair(proxy(1), object(1), proxy(2), object(2));

        assert!(cache.remove_overlapping_pair(proxy(0), proxy(1), &mut dispatcher));
        assert!(!cache.remove_overlapping_pair(proxy(0), proxy(1), &mut dispatcher));
        assert!(cache.find_pair(proxy(1), proxy(2)).is_some());

        cache.remove_overlapping_pairs_containing_proxy(proxy(2), &mut dispatcher);
        assert!(cache.is_empty());
    }

    #[test]
    fn test_process_can_drop_pairs() {
        let mut cache = OverlappingPairCache::new();
        for i in 1..5 {
            cache.add_overlapping_pair(proxy(0), object(0), proxy(i), object(i));
        }
        cache.process_all_overlapping_pairs(|pair| pair.proxy1.0.index % 2 == 0);
        assert_eq!(cache.len(), 2);
        assert!(cache.find_pair(proxy(0), proxy(1)).is_some());
        assert!(cache.find_pair(proxy(0), proxy(3)).is_some());
    }
}
