use rustc_hash::FxHashMap;
use tracing::trace;

use crate::physics::collision_detection::narrow_phase::CollisionDispatcher;
use crate::physics::collision_detection::pair_cache::OverlappingPairCache;
use crate::physics::collision_object::{ActivationState, CollisionObject};
use crate::physics::handles::{ManifoldHandle, ObjectHandle};
use crate::physics::union_find::UnionFind;
use crate::utilities::memory::Arena;

/// One connected group of bodies handed to the island callback.
#[derive(Debug, Clone, Copy)]
pub struct Island<'a> {
    /// Union-find root of the group. Stable only for the current step.
    pub id: i32,
    pub bodies: &'a [ObjectHandle],
    /// Manifolds whose contacts need a response, all belonging to this island.
    pub manifolds: &'a [ManifoldHandle],
}

/// Groups objects into simulation islands each step and puts islands to sleep together.
///
/// Island tags are kept in a side table rebuilt by [`update_activation_state`], keyed by
/// each object's dense position in the current step. Objects that never merge islands
/// (static, kinematic, response-less) get the tag `-1`.
///
/// [`update_activation_state`]: SimulationIslandManager::update_activation_state
#[derive(Debug, Default)]
pub struct SimulationIslandManager {
    union_find: UnionFind,
    handles: Vec<ObjectHandle>,
    index_of: FxHashMap<ObjectHandle, usize>,
    island_tags: Vec<i32>,
    island_bodies: Vec<ObjectHandle>,
    island_manifolds: Vec<(i32, ManifoldHandle)>,
    manifold_scratch: Vec<ManifoldHandle>,
}

impl SimulationIslandManager {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn union_find(&self) -> &UnionFind {
        &self.union_find
    }

    /// Island tag assigned to `handle` this step. `-1` for objects outside every island.
    pub fn island_tag(&self, handle: ObjectHandle) -> Option<i32> {
        self.index_of.get(&handle).map(|&i| self.island_tags[i])
    }

    /// Gives every object a dense tag, resets the union-find to singletons and merges
    /// objects that share a broadphase pair.
    pub fn update_activation_state(
        &mut self,
        objects: &mut Arena<CollisionObject, ObjectHandle>,
        pair_cache: &OverlappingPairCache,
    ) {
        self.handles.clear();
        self.index_of.clear();
        for (handle, object) in objects.iter_mut() {
            self.index_of.insert(handle, self.handles.len());
            self.handles.push(handle);
            object.hit_fraction = 1.0;
        }
        let n = self.handles.len();
        self.island_tags.clear();
        self.island_tags.extend(0..n as i32);
        self.union_find.reset(n);
        self.find_unions(objects, pair_cache);
    }

    pub fn find_unions(&mut self, objects: &Arena<CollisionObject, ObjectHandle>, pair_cache: &OverlappingPairCache) {
        for pair in pair_cache.pairs() {
            let (Some(object0), Some(object1)) = (objects.get(pair.object0), objects.get(pair.object1)) else {
                continue;
            };
            if !(object0.merges_simulation_islands() && object1.merges_simulation_islands()) {
                continue;
            }
            if let (Some(&a), Some(&b)) = (self.index_of.get(&pair.object0), self.index_of.get(&pair.object1)) {
                self.union_find.unite(a, b);
            }
        }
    }

    /// Merges the islands of two constrained bodies, as long as one of them is awake.
    pub fn unite_constraint_bodies(
        &mut self,
        objects: &Arena<CollisionObject, ObjectHandle>,
        body_a: ObjectHandle,
        body_b: Option<ObjectHandle>,
    ) {
        let Some(body_b) = body_b else {
            return;
        };
        let (Some(object_a), Some(object_b)) = (objects.get(body_a), objects.get(body_b)) else {
            return;
        };
        if !(object_a.merges_simulation_islands() && object_b.merges_simulation_islands()) {
            return;
        }
        if !(object_a.is_active() || object_b.is_active()) {
            return;
        }
        if let (Some(&a), Some(&b)) = (self.index_of.get(&body_a), self.index_of.get(&body_b)) {
            self.union_find.unite(a, b);
        }
    }

    /// Replaces each object's tag with its union-find root.
    pub fn store_island_activation_state(&mut self, objects: &Arena<CollisionObject, ObjectHandle>) {
        for i in 0..self.handles.len() {
            let merges = objects
                .get(self.handles[i])
                .is_some_and(CollisionObject::merges_simulation_islands);
            self.island_tags[i] = if merges { self.union_find.find(i) as i32 } else { -1 };
        }
    }

    fn manifold_island_id(&self, body0: ObjectHandle, body1: ObjectHandle) -> i32 {
        let tag0 = self.island_tag(body0).unwrap_or(-1);
        if tag0 >= 0 {
            tag0
        } else {
            self.island_tag(body1).unwrap_or(-1)
        }
    }

    /// Updates island sleep states, gathers the manifolds that need a response per island
    /// and invokes `callback` for every island whose bodies are all awake.
    ///
    /// Islands are visited in ascending root order. An island sleeps only when none of its
    /// members is active or has deactivation disabled; otherwise sleeping members are
    /// nudged to [`ActivationState::WantsDeactivation`]. Kinematic objects wake whatever
    /// they touch without joining its island.
    pub fn build_and_process_islands<F>(
        &mut self,
        objects: &mut Arena<CollisionObject, ObjectHandle>,
        dispatcher: &mut CollisionDispatcher,
        mut callback: F,
    ) where
        F: FnMut(&mut Arena<CollisionObject, ObjectHandle>, &mut CollisionDispatcher, &Island<'_>),
    {
        self.union_find.sort_islands();
        let num_elements = self.union_find.num_elements();

        let mut start = 0;
        while start < num_elements {
            let island_id = self.union_find.element(start).id as i32;
            let mut end = start + 1;
            while end < num_elements && self.union_find.element(end).id as i32 == island_id {
                end += 1;
            }

            let all_sleeping = (start..end).all(|idx| {
                let i = self.union_find.element(idx).sz;
                if self.island_tags[i] != island_id {
                    return true;
                }
                objects.get(self.handles[i]).map_or(true, |object| {
                    !matches!(
                        object.activation_state(),
                        ActivationState::ActiveTag | ActivationState::DisableDeactivation
                    )
                })
            });

            for idx in start..end {
                let i = self.union_find.element(idx).sz;
                if self.island_tags[i] != island_id {
                    continue;
                }
                let Some(object) = objects.get_mut(self.handles[i]) else {
                    continue;
                };
                if all_sleeping {
                    object.set_activation_state(ActivationState::IslandSleeping);
                } else if object.activation_state() == ActivationState::IslandSleeping {
                    object.set_activation_state(ActivationState::WantsDeactivation);
                }
            }
            start = end;
        }

        self.island_manifolds.clear();
        for handle in dispatcher.manifold_handles() {
            let Some(manifold) = dispatcher.manifold(handle) else {
                continue;
            };
            let (handle0, handle1) = (manifold.body0(), manifold.body1());
            let (Some(object0), Some(object1)) = (objects.get(handle0), objects.get(handle1)) else {
                continue;
            };
            let state0 = object0.activation_state();
            let state1 = object1.activation_state();
            if state0 == ActivationState::IslandSleeping && state1 == ActivationState::IslandSleeping {
                continue;
            }
            let wake1 = object0.is_kinematic_object() && state0 != ActivationState::IslandSleeping;
            let wake0 = object1.is_kinematic_object() && state1 != ActivationState::IslandSleeping;
            let responds = dispatcher.needs_response(object0, object1);

            if wake1 {
                if let Some(object) = objects.get_mut(handle1) {
                    object.activate(false);
                }
            }
            if wake0 {
                if let Some(object) = objects.get_mut(handle0) {
                    object.activate(false);
                }
            }
            if responds {
                self.island_manifolds
                    .push((self.manifold_island_id(handle0, handle1), handle));
            }
        }
        self.island_manifolds.sort_by_key(|&(island_id, _)| island_id);
        self.manifold_scratch.clear();
        self.manifold_scratch
            .extend(self.island_manifolds.iter().map(|&(_, handle)| handle));

        let mut start_manifold = 0;
        let mut start = 0;
        while start < num_elements {
            let island_id = self.union_find.element(start).id as i32;
            self.island_bodies.clear();
            let mut island_sleeping = false;
            let mut end = start;
            while end < num_elements && self.union_find.element(end).id as i32 == island_id {
                let handle = self.handles[self.union_find.element(end).sz];
                self.island_bodies.push(handle);
                if !objects.get(handle).is_some_and(CollisionObject::is_active) {
                    island_sleeping = true;
                }
                end += 1;
            }

            while start_manifold < self.island_manifolds.len() && self.island_manifolds[start_manifold].0 < island_id {
                start_manifold += 1;
            }
            let mut end_manifold = start_manifold;
            while end_manifold < self.island_manifolds.len() && self.island_manifolds[end_manifold].0 == island_id {
                end_manifold += 1;
            }

            if !island_sleeping {
                let island = Island {
                    id: island_id,
                    bodies: &self.island_bodies,
                    manifolds: &self.manifold_scratch[start_manifold..end_manifold],
                };
                callback(objects, dispatcher, &island);
            } else {
                trace!(island_id, bodies = self.island_bodies.len(), "island sleeping");
            }
            start_manifold = end_manifold;
            start = end;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::physics::collidables::CollisionShape;
    use crate::physics::collision_detection::CollisionWorld;
    use crate::physics::collision_object::CollisionFilterGroups;
    use crate::physics::rigid_body::RigidBodyDescription;
    use crate::utilities::transform::Transform;
    use glam::Vec3;
    use std::sync::Arc;

    fn ball(world: &mut CollisionWorld, origin: Vec3) -> ObjectHandle {
        let object = CollisionObject::new_rigid_body(
            Arc::new(CollisionShape::sphere(0.5).unwrap()),
            Transform::from_translation(origin),
            &RigidBodyDescription::dynamic(1.0, Vec3::splat(0.1)),
        );
        world.add_collision_object(object, CollisionFilterGroups::DEFAULT, CollisionFilterGroups::ALL)
    }

    /// Runs detection and island building, recording (bodies, manifolds) per callback.
    fn islands(world: &mut CollisionWorld, manager: &mut SimulationIslandManager) -> Vec<(usize, usize)> {
        world.perform_discrete_collision_detection();
        manager.update_activation_state(&mut world.objects, world.broadphase.overlapping_pair_cache());
        manager.store_island_activation_state(&world.objects);
        let mut seen = Vec::new();
        manager.build_and_process_islands(&mut world.objects, &mut world.dispatcher, |_, _, island| {
            seen.push((island.bodies.len(), island.manifolds.len()));
        });
        seen
    }

    #[test]
    fn test_disjoint_bodies_form_separate_islands() {
        let mut world = CollisionWorld::default();
        for i in 0..5 {
            ball(&mut world, Vec3::new(i as f32 * 10.0, 0.0, 0.0));
        }
        let mut manager = SimulationIslandManager::new();
        let seen = islands(&mut world, &mut manager);
        assert_eq!(seen, vec![(1, 0); 5]);
    }

    #[test]
    fn test_touching_bodies_share_an_island() {
        let mut world = CollisionWorld::default();
        let a = ball(&mut world, Vec3::ZERO);
        let b = ball(&mut world, Vec3::new(0.9, 0.0, 0.0));
        ball(&mut world, Vec3::new(20.0, 0.0, 0.0));
        let mut manager = SimulationIslandManager::new();
        let mut seen = islands(&mut world, &mut manager);
        seen.sort();
        assert_eq!(seen, vec![(1, 0), (2, 1)]);
        assert_eq!(manager.island_tag(a), manager.island_tag(b));
    }

    #[test]
    fn test_static_objects_do_not_merge() {
        let mut world = CollisionWorld::default();
        let ground = world.add_collision_object(
            CollisionObject::new(
                Arc::new(CollisionShape::static_plane(Vec3::Y, 0.0).unwrap()),
                Transform::IDENTITY,
            ),
            CollisionFilterGroups::STATIC,
            CollisionFilterGroups::ALL,
        );
        let a = ball(&mut world, Vec3::new(0.0, 0.45, 0.0));
        let b = ball(&mut world, Vec3::new(5.0, 0.45, 0.0));
        let mut manager = SimulationIslandManager::new();
        let seen = islands(&mut world, &mut manager);
        assert_eq!(manager.island_tag(ground), Some(-1));
        assert_ne!(manager.island_tag(a), manager.island_tag(b));
        // Each ball gets its ground manifold; the plane sits alone in a third group.
        let with_manifolds = seen.iter().filter(|&&(_, m)| m == 1).count();
        assert_eq!(with_manifolds, 2);
    }

    #[test]
    fn test_island_sleeps_when_no_member_is_active() {
        let mut world = CollisionWorld::default();
        let a = ball(&mut world, Vec3::ZERO);
        let b = ball(&mut world, Vec3::new(0.9, 0.0, 0.0));
        for handle in [a, b] {
            world
                .object_mut(handle)
                .unwrap()
                .set_activation_state(ActivationState::WantsDeactivation);
        }
        let mut manager = SimulationIslandManager::new();
        let seen = islands(&mut world, &mut manager);
        assert!(seen.is_empty());
        assert_eq!(world.object(a).unwrap().activation_state(), ActivationState::IslandSleeping);
        assert_eq!(world.object(b).unwrap().activation_state(), ActivationState::IslandSleeping);
    }

    #[test]
    fn test_one_awake_member_keeps_island_awake() {
        let mut world = CollisionWorld::default();
        let a = ball(&mut world, Vec3::ZERO);
        let b = ball(&mut world, Vec3::new(0.9, 0.0, 0.0));
        world
            .object_mut(b)
            .unwrap()
            .set_activation_state(ActivationState::IslandSleeping);
        let mut manager = SimulationIslandManager::new();
        let seen = islands(&mut world, &mut manager);
        // b is promoted out of sleep, so the island is solved this step.
        assert_eq!(seen, vec![(2, 1)]);
        assert_eq!(world.object(a).unwrap().activation_state(), ActivationState::ActiveTag);
        assert_eq!(
            world.object(b).unwrap().activation_state(),
            ActivationState::WantsDeactivation
        );
    }
}
