use super::{CollisionAlgorithm, CollisionObjectWrapper};
use crate::physics::collidables::CollisionShape;
use crate::physics::collision_detection::manifold_result::ManifoldResult;
use crate::physics::collision_detection::narrow_phase::{CollisionDispatcher, DispatcherInfo};

/// Compound shape against anything.
///
/// Keeps one child algorithm per child shape, created the first time the child is
/// visited. Each child runs with the compound's handle but the child's shape and composed
/// world transform, so contacts still belong to the root pair.
#[derive(Debug, Default)]
pub struct CompoundCollisionAlgorithm {
    child_algorithms: Vec<Option<CollisionAlgorithm>>,
    swapped: bool,
}

impl CompoundCollisionAlgorithm {
    pub fn new(swapped: bool) -> Self {
        Self {
            child_algorithms: Vec::new(),
            swapped,
        }
    }

    /// True when the compound is the pair's second object.
    #[inline]
    pub fn is_swapped(&self) -> bool {
        self.swapped
    }

    #[inline]
    pub fn num_child_algorithms(&self) -> usize {
        self.child_algorithms.iter().filter(|a| a.is_some()).count()
    }

    pub fn process_collision(
        &mut self,
        body0: &CollisionObjectWrapper<'_>,
        body1: &CollisionObjectWrapper<'_>,
        dispatcher: &mut CollisionDispatcher,
        info: &DispatcherInfo,
        result: &mut ManifoldResult,
    ) {
        let (compound_body, other_body) = if self.swapped { (body1, body0) } else { (body0, body1) };
        let CollisionShape::Compound(compound) = compound_body.shape else {
            return;
        };
        let children = compound.children();
        self.fit_child_count(children.len(), dispatcher);

        for (child, slot) in children.iter().zip(self.child_algorithms.iter_mut()) {
            let child_body = compound_body.with_child(&child.shape, &child.transform);
            let algorithm = slot.get_or_insert_with(|| dispatcher.find_algorithm(&child_body, other_body, None));
            algorithm.process_collision(&child_body, other_body, dispatcher, info, result);
        }
    }

    /// Earliest impact over all children.
    pub fn calculate_time_of_impact(
        &mut self,
        body0: &CollisionObjectWrapper<'_>,
        body1: &CollisionObjectWrapper<'_>,
        dispatcher: &mut CollisionDispatcher,
        info: &DispatcherInfo,
    ) -> f32 {
        let (compound_body, other_body) = if self.swapped { (body1, body0) } else { (body0, body1) };
        let CollisionShape::Compound(compound) = compound_body.shape else {
            return 1.0;
        };
        let children = compound.children();
        self.fit_child_count(children.len(), dispatcher);

        let mut hit_fraction = 1.0f32;
        for (child, slot) in children.iter().zip(self.child_algorithms.iter_mut()) {
            let child_body = compound_body.with_child(&child.shape, &child.transform);
            let algorithm = slot.get_or_insert_with(|| dispatcher.find_algorithm(&child_body, other_body, None));
            hit_fraction = hit_fraction.min(algorithm.calculate_time_of_impact(&child_body, other_body, dispatcher, info));
        }
        hit_fraction
    }

    /// Matches the slot count to the compound's children. Algorithms of children that no
    /// longer exist are released so their manifolds go back to the dispatcher.
    fn fit_child_count(&mut self, count: usize, dispatcher: &mut CollisionDispatcher) {
        if self.child_algorithms.len() > count {
            for algorithm in self.child_algorithms.drain(count..).flatten() {
                algorithm.release(dispatcher);
            }
        } else {
            self.child_algorithms.resize_with(count, || None);
        }
    }

    pub fn release(self, dispatcher: &mut CollisionDispatcher) {
        for algorithm in self.child_algorithms.into_iter().flatten() {
            algorithm.release(dispatcher);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::*;
    use super::*;
    use crate::physics::collision_detection::collision_task_registry::AlgorithmKind;
    use crate::physics::collision_object::CollisionObject;
    use crate::utilities::transform::Transform;
    use glam::Vec3;
    use std::sync::Arc;

    /// Two unit spheres at x = -1 and x = +1.
    fn dumbbell(origin: Vec3) -> CollisionObject {
        let sphere = Arc::new(CollisionShape::sphere(1.0).unwrap());
        let shape = CollisionShape::compound(vec![
            (Transform::from_translation(Vec3::NEG_X), Arc::clone(&sphere)),
            (Transform::from_translation(Vec3::X), sphere),
        ])
        .unwrap();
        body(shape, origin)
    }

    #[test]
    fn test_each_child_gets_its_own_algorithm() {
        let mut dispatcher = CollisionDispatcher::new();
        let compound = dumbbell(Vec3::ZERO);
        let ball = body(CollisionShape::sphere(0.5).unwrap(), Vec3::new(1.0, 1.4, 0.0));
        let mut algorithm = CollisionAlgorithm::new(AlgorithmKind::Compound, None);
        collide(&mut algorithm, &mut dispatcher, &compound, &ball);

        let CollisionAlgorithm::Compound(inner) = &algorithm else {
            panic!("expected a compound algorithm");
        };
        assert_eq!(inner.num_child_algorithms(), 2);
        assert_eq!(dispatcher.num_manifolds(), 2);
        let touching: Vec<_> = dispatcher.manifolds().filter(|(_, m)| m.num_contacts() > 0).collect();
        assert_eq!(touching.len(), 1);
        let (_, manifold) = touching[0];
        assert_eq!(manifold.body0(), handle(0));
        assert!(manifold.contact_point(0).distance() < 0.0);

        algorithm.release(&mut dispatcher);
        assert_eq!(dispatcher.num_manifolds(), 0);
    }

    #[test]
    fn test_shrinking_compound_releases_dropped_children() {
        let mut dispatcher = CollisionDispatcher::new();
        let ball = body(CollisionShape::sphere(0.5).unwrap(), Vec3::new(1.0, 1.4, 0.0));
        let mut algorithm = CollisionAlgorithm::new(AlgorithmKind::Compound, None);
        collide(&mut algorithm, &mut dispatcher, &dumbbell(Vec3::ZERO), &ball);
        assert_eq!(dispatcher.num_manifolds(), 2);

        let single = CollisionShape::compound(vec![(
            Transform::from_translation(Vec3::X),
            Arc::new(CollisionShape::sphere(1.0).unwrap()),
        )])
        .unwrap();
        collide(&mut algorithm, &mut dispatcher, &body(single, Vec3::ZERO), &ball);

        let CollisionAlgorithm::Compound(inner) = &algorithm else {
            panic!("expected a compound algorithm");
        };
        assert_eq!(inner.num_child_algorithms(), 1);
        assert_eq!(dispatcher.num_manifolds(), 1);
    }

    #[test]
    fn test_swapped_compound_second() {
        let mut dispatcher = CollisionDispatcher::new();
        let ground = fixed(CollisionShape::static_plane(Vec3::Y, 0.0).unwrap(), Vec3::ZERO);
        let compound = dumbbell(Vec3::new(0.0, 0.95, 0.0));
        let mut algorithm = CollisionAlgorithm::new(AlgorithmKind::SwappedCompound, None);
        collide(&mut algorithm, &mut dispatcher, &ground, &compound);
        let contacts: usize = dispatcher.manifolds().map(|(_, m)| m.num_contacts()).sum();
        assert_eq!(contacts, 2);
        for (_, m) in dispatcher.manifolds() {
            // Child manifolds are keyed by the compound's own handle.
            assert_eq!(m.body0(), handle(1));
        }
    }
}
