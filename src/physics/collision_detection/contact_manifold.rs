use glam::Vec3;

use super::narrow_phase_callbacks::ContactCallbacks;
use crate::physics::constraints::contact::ConstraintPersistentData;
use crate::physics::handles::ObjectHandle;
use crate::utilities::transform::Transform;

/// Maximum number of contacts a manifold keeps.
pub const MANIFOLD_CACHE_SIZE: usize = 4;

/// Default distance beyond which cached contacts are dropped.
pub const DEFAULT_CONTACT_BREAKING_THRESHOLD: f32 = 0.02;

/// One cached contact between two bodies.
#[derive(Debug, Clone, PartialEq)]
pub struct ManifoldPoint {
    /// Contact point in body A's local frame. Used for identity matching across steps.
    pub local_point_a: Vec3,
    pub local_point_b: Vec3,
    pub position_world_on_a: Vec3,
    /// Contact point on B's surface in world space.
    pub position_world_on_b: Vec3,
    /// Unit normal on B pointing towards A.
    pub normal_world_on_b: Vec3,
    /// Signed separation; negative is penetration.
    pub distance: f32,
    pub combined_friction: f32,
    pub combined_restitution: f32,
    pub part_id0: i32,
    pub part_id1: i32,
    pub index0: i32,
    pub index1: i32,
    /// Accumulated normal impulse, reused for warm starting.
    pub applied_impulse: f32,
    pub applied_impulse_lateral1: f32,
    pub applied_impulse_lateral2: f32,
    pub lateral_friction_dir1: Vec3,
    pub lateral_friction_dir2: Vec3,
    pub lateral_friction_initialized: bool,
    /// Number of refreshes this contact survived.
    pub lifetime: u32,
    /// Solver state carried by the non-pooled solver path.
    pub persistent_data: Option<ConstraintPersistentData>,
}

impl ManifoldPoint {
    pub fn new(local_point_a: Vec3, local_point_b: Vec3, normal_world_on_b: Vec3, distance: f32) -> Self {
        Self {
            local_point_a,
            local_point_b,
            position_world_on_a: Vec3::ZERO,
            position_world_on_b: Vec3::ZERO,
            normal_world_on_b,
            distance,
            combined_friction: 0.0,
            combined_restitution: 0.0,
            part_id0: -1,
            part_id1: -1,
            index0: -1,
            index1: -1,
            applied_impulse: 0.0,
            applied_impulse_lateral1: 0.0,
            applied_impulse_lateral2: 0.0,
            lateral_friction_dir1: Vec3::ZERO,
            lateral_friction_dir2: Vec3::ZERO,
            lateral_friction_initialized: false,
            lifetime: 0,
            persistent_data: None,
        }
    }

    #[inline(always)]
    pub fn distance(&self) -> f32 {
        self.distance
    }

    #[inline(always)]
    pub fn lifetime(&self) -> u32 {
        self.lifetime
    }

    #[inline]
    pub fn position_world_on_a(&self) -> Vec3 {
        self.position_world_on_a
    }

    #[inline]
    pub fn position_world_on_b(&self) -> Vec3 {
        self.position_world_on_b
    }
}

/// Contact cache for one pair of bodies.
///
/// Body order is fixed when the manifold is created; every point stores its local
/// coordinates in that order. New contacts replace a nearby cached one so that their
/// accumulated impulses carry over, and a full cache evicts the point whose removal
/// loses the least contact area.
#[derive(Debug, Clone, PartialEq)]
pub struct PersistentManifold {
    point_cache: Vec<ManifoldPoint>,
    body0: ObjectHandle,
    body1: ObjectHandle,
    contact_breaking_threshold: f32,
}

impl PersistentManifold {
    pub fn new(body0: ObjectHandle, body1: ObjectHandle, contact_breaking_threshold: f32) -> Self {
        Self {
            point_cache: Vec::with_capacity(MANIFOLD_CACHE_SIZE),
            body0,
            body1,
            contact_breaking_threshold,
        }
    }

    #[inline(always)]
    pub fn body0(&self) -> ObjectHandle {
        self.body0
    }

    #[inline(always)]
    pub fn body1(&self) -> ObjectHandle {
        self.body1
    }

    #[inline(always)]
    pub fn num_contacts(&self) -> usize {
        self.point_cache.len()
    }

    #[inline]
    pub fn contact_point(&self, index: usize) -> &ManifoldPoint {
        &self.point_cache[index]
    }

    #[inline]
    pub fn contact_point_mut(&mut self, index: usize) -> &mut ManifoldPoint {
        &mut self.point_cache[index]
    }

    #[inline]
    pub fn points(&self) -> &[ManifoldPoint] {
        &self.point_cache
    }

    #[inline]
    pub fn points_mut(&mut self) -> &mut [ManifoldPoint] {
        &mut self.point_cache
    }

    #[inline(always)]
    pub fn contact_breaking_threshold(&self) -> f32 {
        self.contact_breaking_threshold
    }

    /// Picks the cached point to evict so that the remaining four span the largest area.
    /// The deepest point is never chosen.
    fn sort_cached_points(&self, pt: &ManifoldPoint) -> usize {
        let cache = &self.point_cache;
        let mut max_penetration_index = None;
        let mut max_penetration = pt.distance;
        for (i, p) in cache.iter().enumerate() {
            if p.distance < max_penetration {
                max_penetration_index = Some(i);
                max_penetration = p.distance;
            }
        }

        let area = |a: Vec3, b: Vec3| a.cross(b).length_squared();
        let l = |i: usize| cache[i].local_point_a;
        let new = pt.local_point_a;
        let mut res = [0.0f32; 4];
        if max_penetration_index != Some(0) {
            res[0] = area(new - l(1), l(3) - l(2));
        }
        if max_penetration_index != Some(1) {
            res[1] = area(new - l(0), l(3) - l(2));
        }
        if max_penetration_index != Some(2) {
            res[2] = area(new - l(0), l(3) - l(1));
        }
        if max_penetration_index != Some(3) {
            res[3] = area(new - l(0), l(2) - l(1));
        }

        let mut biggest_area = 0;
        for i in 1..4 {
            if res[i] > res[biggest_area] {
                biggest_area = i;
            }
        }
        biggest_area
    }

    /// Index of a cached point within the breaking threshold of `new_point`, if any.
    pub fn get_cache_entry(&self, new_point: &ManifoldPoint) -> Option<usize> {
        let mut shortest_dist = self.contact_breaking_threshold * self.contact_breaking_threshold;
        let mut nearest = None;
        for (i, mp) in self.point_cache.iter().enumerate() {
            let dist = mp.local_point_a.distance_squared(new_point.local_point_a);
            if dist < shortest_dist {
                shortest_dist = dist;
                nearest = Some(i);
            }
        }
        nearest
    }

    /// Inserts a point, evicting one when the cache is full. Returns the slot used.
    pub fn add_manifold_point(&mut self, new_point: ManifoldPoint, callbacks: &mut ContactCallbacks) -> usize {
        debug_assert!(self.valid_contact_distance(&new_point));
        if self.point_cache.len() == MANIFOLD_CACHE_SIZE {
            let insert_index = self.sort_cached_points(&new_point);
            callbacks.clear_user_cache(&mut self.point_cache[insert_index]);
            self.point_cache[insert_index] = new_point;
            insert_index
        } else {
            self.point_cache.push(new_point);
            self.point_cache.len() - 1
        }
    }

    /// Overwrites slot `insert_index` with fresh geometry while keeping the contact's
    /// history: lifetime, accumulated impulses and solver payload.
    pub fn replace_contact_point(&mut self, mut new_point: ManifoldPoint, insert_index: usize) {
        let old = &mut self.point_cache[insert_index];
        debug_assert!(self.contact_breaking_threshold >= 0.0);
        new_point.lifetime = old.lifetime;
        new_point.applied_impulse = old.applied_impulse;
        new_point.applied_impulse_lateral1 = old.applied_impulse_lateral1;
        new_point.applied_impulse_lateral2 = old.applied_impulse_lateral2;
        new_point.persistent_data = old.persistent_data.take();
        *old = new_point;
    }

    pub fn remove_contact_point(&mut self, index: usize, callbacks: &mut ContactCallbacks) {
        callbacks.clear_user_cache(&mut self.point_cache[index]);
        self.point_cache.swap_remove(index);
    }

    #[inline]
    pub fn valid_contact_distance(&self, pt: &ManifoldPoint) -> bool {
        pt.distance <= self.contact_breaking_threshold
    }

    /// Recomputes world positions and distances from the latest transforms and drops
    /// contacts that separated or slid too far apart tangentially.
    pub fn refresh_contact_points(
        &mut self,
        tr_a: &Transform,
        tr_b: &Transform,
        callbacks: &mut ContactCallbacks,
    ) {
        for mp in self.point_cache.iter_mut().rev() {
            mp.position_world_on_a = tr_a.transform_point(mp.local_point_a);
            mp.position_world_on_b = tr_b.transform_point(mp.local_point_b);
            mp.distance = (mp.position_world_on_a - mp.position_world_on_b).dot(mp.normal_world_on_b);
            mp.lifetime += 1;
        }

        let threshold_sq = self.contact_breaking_threshold * self.contact_breaking_threshold;
        for i in (0..self.point_cache.len()).rev() {
            let mp = &self.point_cache[i];
            if !self.valid_contact_distance(mp) {
                self.remove_contact_point(i, callbacks);
            } else {
                // Contact also becomes invalid when relative movement orthogonal to the normal exceeds the margin.
                let projected_point = mp.position_world_on_a - mp.normal_world_on_b * mp.distance;
                let projected_difference = mp.position_world_on_b - projected_point;
                if projected_difference.length_squared() > threshold_sq {
                    self.remove_contact_point(i, callbacks);
                }
            }
        }
    }

    /// Removes every point.
    pub fn clear_manifold(&mut self, callbacks: &mut ContactCallbacks) {
        for mp in &mut self.point_cache {
            callbacks.clear_user_cache(mp);
        }
        self.point_cache.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utilities::memory::ArenaIndex;
    use proptest::prelude::*;

    fn handle(index: u32) -> ObjectHandle {
        ObjectHandle(ArenaIndex {
            index,
            generation: 0,
        })
    }

    fn point_at(x: f32, z: f32, distance: f32) -> ManifoldPoint {
        let local = Vec3::new(x, 0.0, z);
        ManifoldPoint::new(local, local, Vec3::Y, distance)
    }

    #[test]
    fn test_cache_entry_matches_nearby_point() {
        let mut manifold = PersistentManifold::new(handle(0), handle(1), 0.02);
        let mut callbacks = ContactCallbacks::default();
        manifold.add_manifold_point(point_at(0.0, 0.0, -0.01), &mut callbacks);
        assert_eq!(manifold.get_cache_entry(&point_at(0.01, 0.0, -0.01)), Some(0));
        assert_eq!(manifold.get_cache_entry(&point_at(0.5, 0.0, -0.01)), None);
    }

    #[test]
    fn test_replace_preserves_history() {
        let mut manifold = PersistentManifold::new(handle(0), handle(1), 0.02);
        let mut callbacks = ContactCallbacks::default();
        manifold.add_manifold_point(point_at(0.0, 0.0, -0.01), &mut callbacks);
        {
            let p = manifold.contact_point_mut(0);
            p.applied_impulse = 3.0;
            p.lifetime = 7;
        }
        manifold.replace_contact_point(point_at(0.001, 0.0, -0.02), 0);
        let p = manifold.contact_point(0);
        assert_eq!(p.applied_impulse, 3.0);
        assert_eq!(p.lifetime, 7);
        assert_eq!(p.distance, -0.02);
    }

    #[test]
    fn test_full_cache_keeps_deepest_point() {
        let mut manifold = PersistentManifold::new(handle(0), handle(1), 0.02);
        let mut callbacks = ContactCallbacks::default();
        manifold.add_manifold_point(point_at(-1.0, -1.0, -0.01), &mut callbacks);
        manifold.add_manifold_point(point_at(1.0, -1.0, -0.01), &mut callbacks);
        manifold.add_manifold_point(point_at(1.0, 1.0, -0.01), &mut callbacks);
        manifold.add_manifold_point(point_at(-1.0, 1.0, -0.5), &mut callbacks);
        manifold.add_manifold_point(point_at(0.0, 0.0, -0.01), &mut callbacks);
        assert_eq!(manifold.num_contacts(), 4);
        assert!(manifold.points().iter().any(|p| p.distance == -0.5));
    }

    #[test]
    fn test_refresh_drops_separated_points() {
        let mut manifold = PersistentManifold::new(handle(0), handle(1), 0.02);
        let mut callbacks = ContactCallbacks::default();
        manifold.add_manifold_point(point_at(0.0, 0.0, -0.01), &mut callbacks);
        let lifted = Transform::from_translation(Vec3::new(0.0, 1.0, 0.0));
        manifold.refresh_contact_points(&lifted, &Transform::IDENTITY, &mut callbacks);
        assert_eq!(manifold.num_contacts(), 0);
    }

    #[test]
    fn test_refresh_drops_tangential_drift() {
        let mut manifold = PersistentManifold::new(handle(0), handle(1), 0.02);
        let mut callbacks = ContactCallbacks::default();
        manifold.add_manifold_point(point_at(0.0, 0.0, 0.0), &mut callbacks);
        let slid = Transform::from_translation(Vec3::new(0.5, 0.0, 0.0));
        manifold.refresh_contact_points(&slid, &Transform::IDENTITY, &mut callbacks);
        assert_eq!(manifold.num_contacts(), 0);
    }

    proptest! {
        #[test]
        fn prop_never_more_than_four_points(
            points in proptest::collection::vec((-1.0f32..1.0, -1.0f32..1.0, -0.1f32..0.02), 1..40)
        ) {
            let mut manifold = PersistentManifold::new(handle(0), handle(1), 0.02);
            let mut callbacks = ContactCallbacks::default();
            for (x, z, d) in points {
                let pt = point_at(x, z, d);
                match manifold.get_cache_entry(&pt) {
                    Some(index) => manifold.replace_contact_point(pt, index),
                    None => {
                        manifold.add_manifold_point(pt, &mut callbacks);
                    }
                }
                prop_assert!(manifold.num_contacts() <= MANIFOLD_CACHE_SIZE);
                for p in manifold.points() {
                    prop_assert!(p.distance <= manifold.contact_breaking_threshold());
                }
            }
        }
    }
}
