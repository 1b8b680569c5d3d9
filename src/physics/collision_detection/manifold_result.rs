use glam::Vec3;
use tracing::debug;

use super::contact_manifold::ManifoldPoint;
use super::narrow_phase::CollisionDispatcher;
use super::narrow_phase_callbacks::ContactAddedInfo;
use crate::physics::collision_object::{CollisionFlags, CollisionObject};
use crate::physics::handles::{ManifoldHandle, ObjectHandle};
use crate::utilities::transform::Transform;

const MAX_FRICTION: f32 = 10.0;

/// Friction of a contact between two materials.
#[inline]
pub fn calculate_combined_friction(friction0: f32, friction1: f32) -> f32 {
    (friction0 * friction1).clamp(-MAX_FRICTION, MAX_FRICTION)
}

#[inline]
pub fn calculate_combined_restitution(restitution0: f32, restitution1: f32) -> f32 {
    restitution0 * restitution1
}

/// Sink through which narrow-phase algorithms report contacts for one object pair.
///
/// Holds the root objects' transforms and materials. Algorithms report points in the order
/// of the manifold they attached; when that order is the reverse of this result's, the
/// local frames are swapped on insertion.
#[derive(Debug, Clone)]
pub struct ManifoldResult {
    manifold: Option<ManifoldHandle>,
    body0: ObjectHandle,
    body1: ObjectHandle,
    root_trans_a: Transform,
    root_trans_b: Transform,
    friction0: f32,
    friction1: f32,
    restitution0: f32,
    restitution1: f32,
    custom_material: bool,
    part_id0: i32,
    part_id1: i32,
    index0: i32,
    index1: i32,
}

impl ManifoldResult {
    pub fn new(body0: ObjectHandle, object0: &CollisionObject, body1: ObjectHandle, object1: &CollisionObject) -> Self {
        let custom_material = object0.collision_flags.contains(CollisionFlags::CUSTOM_MATERIAL_CALLBACK)
            || object1.collision_flags.contains(CollisionFlags::CUSTOM_MATERIAL_CALLBACK);
        Self {
            manifold: None,
            body0,
            body1,
            root_trans_a: object0.world_transform,
            root_trans_b: object1.world_transform,
            friction0: object0.friction,
            friction1: object1.friction,
            restitution0: object0.restitution,
            restitution1: object1.restitution,
            custom_material,
            part_id0: -1,
            part_id1: -1,
            index0: -1,
            index1: -1,
        }
    }

    #[inline]
    pub fn body0(&self) -> ObjectHandle {
        self.body0
    }

    #[inline]
    pub fn body1(&self) -> ObjectHandle {
        self.body1
    }

    #[inline]
    pub fn set_persistent_manifold(&mut self, manifold: ManifoldHandle) {
        self.manifold = Some(manifold);
    }

    #[inline]
    pub fn persistent_manifold(&self) -> Option<ManifoldHandle> {
        self.manifold
    }

    /// Feature ids for subsequent contacts, in this result's body order.
    pub fn set_shape_identifiers(&mut self, part_id0: i32, index0: i32, part_id1: i32, index1: i32) {
        self.part_id0 = part_id0;
        self.part_id1 = part_id1;
        self.index0 = index0;
        self.index1 = index1;
    }

    /// Records a contact. `normal_on_b_in_world` points from the manifold's second body
    /// towards its first; `point_in_world` lies on the second body.
    pub fn add_contact_point(
        &mut self,
        normal_on_b_in_world: Vec3,
        point_in_world: Vec3,
        depth: f32,
        dispatcher: &mut CollisionDispatcher,
    ) {
        let Some(handle) = self.manifold else {
            debug!(body0 = %self.body0, body1 = %self.body1, "contact reported without a manifold");
            return;
        };
        let custom_material = self.custom_material;
        let (manifold, callbacks) = match dispatcher.manifold_and_callbacks_mut(handle) {
            Some(parts) => parts,
            None => return,
        };

        if depth > manifold.contact_breaking_threshold() {
            return;
        }

        let is_swapped = manifold.body0() != self.body0;
        let point_a = point_in_world + normal_on_b_in_world * depth;
        let (local_a, local_b) = if is_swapped {
            (self.root_trans_b.inv_xform(point_a), self.root_trans_a.inv_xform(point_in_world))
        } else {
            (self.root_trans_a.inv_xform(point_a), self.root_trans_b.inv_xform(point_in_world))
        };

        let mut new_pt = ManifoldPoint::new(local_a, local_b, normal_on_b_in_world, depth);
        new_pt.position_world_on_a = point_a;
        new_pt.position_world_on_b = point_in_world;
        new_pt.combined_friction = calculate_combined_friction(self.friction0, self.friction1);
        new_pt.combined_restitution = calculate_combined_restitution(self.restitution0, self.restitution1);

        // Feature ids follow the manifold's body order.
        let (object0, object1) = if is_swapped {
            new_pt.part_id0 = self.part_id1;
            new_pt.index0 = self.index1;
            new_pt.part_id1 = self.part_id0;
            new_pt.index1 = self.index0;
            (self.body1, self.body0)
        } else {
            new_pt.part_id0 = self.part_id0;
            new_pt.index0 = self.index0;
            new_pt.part_id1 = self.part_id1;
            new_pt.index1 = self.index1;
            (self.body0, self.body1)
        };

        let insert_index = match manifold.get_cache_entry(&new_pt) {
            Some(index) => {
                manifold.replace_contact_point(new_pt, index);
                index
            }
            None => manifold.add_manifold_point(new_pt, callbacks),
        };

        if custom_material {
            let point = manifold.contact_point_mut(insert_index);
            let info = ContactAddedInfo {
                object0,
                part_id0: point.part_id0,
                index0: point.index0,
                object1,
                part_id1: point.part_id1,
                index1: point.index1,
            };
            callbacks.notify_contact_added(point, &info);
        }
    }

    /// Refreshes the attached manifold against the root transforms.
    pub fn refresh_contact_points(&self, dispatcher: &mut CollisionDispatcher) {
        let Some(handle) = self.manifold else {
            return;
        };
        let Some((manifold, callbacks)) = dispatcher.manifold_and_callbacks_mut(handle) else {
            return;
        };
        if manifold.num_contacts() == 0 {
            return;
        }
        if manifold.body0() != self.body0 {
            manifold.refresh_contact_points(&self.root_trans_b, &self.root_trans_a, callbacks);
        } else {
            manifold.refresh_contact_points(&self.root_trans_a, &self.root_trans_b, callbacks);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::physics::collidables::CollisionShape;
    use crate::physics::collision_detection::narrow_phase_callbacks::ContactCallbacks;
    use crate::physics::rigid_body::RigidBodyDescription;
    use crate::utilities::memory::ArenaIndex;
    use approx::{assert_abs_diff_eq, assert_relative_eq};
    use glam::{EulerRot, Quat};
    use proptest::prelude::*;
    use std::sync::Arc;

    fn handle(index: u32) -> ObjectHandle {
        ObjectHandle(ArenaIndex { index, generation: 0 })
    }

    fn object(origin: Vec3, friction: f32, restitution: f32) -> CollisionObject {
        let description = RigidBodyDescription::dynamic(1.0, Vec3::splat(0.4))
            .with_friction(friction)
            .with_restitution(restitution);
        CollisionObject::new_rigid_body(
            Arc::new(CollisionShape::sphere(1.0).unwrap()),
            Transform::from_translation(origin),
            &description,
        )
    }

    #[test]
    fn test_combined_material() {
        assert_relative_eq!(calculate_combined_friction(0.5, 0.4), 0.2);
        assert_relative_eq!(calculate_combined_friction(8.0, 8.0), 10.0);
        assert_relative_eq!(calculate_combined_restitution(0.5, 0.5), 0.25);
    }

    #[test]
    fn test_rejects_points_beyond_threshold() {
        let mut dispatcher = CollisionDispatcher::new();
        let a = object(Vec3::ZERO, 0.5, 0.0);
        let b = object(Vec3::X * 2.5, 0.5, 0.0);
        let manifold = dispatcher.get_new_manifold(handle(0), handle(1));
        let mut result = ManifoldResult::new(handle(0), &a, handle(1), &b);
        result.set_persistent_manifold(manifold);
        result.add_contact_point(Vec3::NEG_X, Vec3::X * 1.5, 0.5, &mut dispatcher);
        assert_eq!(dispatcher.manifold(manifold).unwrap().num_contacts(), 0);
        result.add_contact_point(Vec3::NEG_X, Vec3::X * 1.5, -0.01, &mut dispatcher);
        assert_eq!(dispatcher.manifold(manifold).unwrap().num_contacts(), 1);
    }

    #[test]
    fn test_swapped_manifold_uses_mirrored_frames() {
        let mut dispatcher = CollisionDispatcher::new();
        let a = object(Vec3::ZERO, 0.5, 0.0);
        let b = object(Vec3::X * 1.9, 0.5, 0.0);
        // Manifold stores (b, a); the result is in (a, b) order.
        let manifold = dispatcher.get_new_manifold(handle(1), handle(0));
        let mut result = ManifoldResult::new(handle(0), &a, handle(1), &b);
        result.set_persistent_manifold(manifold);
        result.set_shape_identifiers(-1, -1, 0, 7);
        // Normal on a pointing towards b; point on a's surface.
        result.add_contact_point(Vec3::X, Vec3::X, -0.1, &mut dispatcher);
        let point = dispatcher.manifold(manifold).unwrap().contact_point(0).clone();
        assert_relative_eq!(point.local_point_a, Vec3::new(-0.9 - 0.1, 0.0, 0.0), epsilon = 1e-5);
        assert_relative_eq!(point.local_point_b, Vec3::X, epsilon = 1e-5);
        assert_eq!((point.part_id0, point.index0), (0, 7));
    }

    #[test]
    fn test_custom_material_hook_runs() {
        let mut dispatcher = CollisionDispatcher::new().with_callbacks(ContactCallbacks::new().with_contact_added(
            |point: &mut ManifoldPoint, _info: &ContactAddedInfo| {
                point.combined_friction = 0.0;
                true
            },
        ));
        let mut a = object(Vec3::ZERO, 0.5, 0.0);
        a.collision_flags |= CollisionFlags::CUSTOM_MATERIAL_CALLBACK;
        let b = object(Vec3::X * 1.9, 0.5, 0.0);
        let manifold = dispatcher.get_new_manifold(handle(0), handle(1));
        let mut result = ManifoldResult::new(handle(0), &a, handle(1), &b);
        result.set_persistent_manifold(manifold);
        result.add_contact_point(Vec3::NEG_X, Vec3::X * 0.9, -0.1, &mut dispatcher);
        assert_eq!(dispatcher.manifold(manifold).unwrap().contact_point(0).combined_friction, 0.0);
    }

    #[test]
    fn test_contact_without_manifold_is_ignored() {
        let mut dispatcher = CollisionDispatcher::new();
        let a = object(Vec3::ZERO, 0.5, 0.0);
        let b = object(Vec3::X * 1.9, 0.5, 0.0);
        let mut result = ManifoldResult::new(handle(0), &a, handle(1), &b);
        result.add_contact_point(Vec3::NEG_X, Vec3::X * 0.9, -0.1, &mut dispatcher);
        assert_eq!(dispatcher.num_manifolds(), 0);
        assert_eq!(result.persistent_manifold(), None);
    }

    #[test]
    fn test_refresh_keeps_point_of_tilted_box_on_plane() {
        let mut dispatcher = CollisionDispatcher::new();
        let mut cube = object(Vec3::ZERO, 0.5, 0.0);
        cube.world_transform = Transform::from_rotation_translation(
            Quat::from_euler(EulerRot::XYZ, 0.3, 0.7, -0.2),
            Vec3::new(3.0, 0.49, -2.0),
        );
        let mut ground = object(Vec3::ZERO, 0.5, 0.0);
        ground.world_transform = Transform::from_translation(Vec3::new(-1.0, 0.0, 4.0));

        let manifold = dispatcher.get_new_manifold(handle(0), handle(1));
        let mut result = ManifoldResult::new(handle(0), &cube, handle(1), &ground);
        result.set_persistent_manifold(manifold);
        let on_ground = Vec3::new(2.6, 0.0, -1.7);
        result.add_contact_point(Vec3::Y, on_ground, -0.01, &mut dispatcher);
        let before = dispatcher.manifold(manifold).unwrap().contact_point(0).clone();

        result.refresh_contact_points(&mut dispatcher);
        let m = dispatcher.manifold(manifold).unwrap();
        assert_eq!(m.num_contacts(), 1);
        let after = m.contact_point(0);
        assert_abs_diff_eq!(after.position_world_on_a, before.position_world_on_a, epsilon = 1e-4);
        assert_abs_diff_eq!(after.position_world_on_b, on_ground, epsilon = 1e-4);
        assert_abs_diff_eq!(after.distance, -0.01, epsilon = 1e-4);
    }

    fn rotation() -> impl Strategy<Value = Quat> {
        (-3.0f32..3.0, -3.0f32..3.0, -3.0f32..3.0).prop_map(|(x, y, z)| Quat::from_euler(EulerRot::XYZ, x, y, z))
    }

    fn position() -> impl Strategy<Value = Vec3> {
        (-5.0f32..5.0, -5.0f32..5.0, -5.0f32..5.0).prop_map(|(x, y, z)| Vec3::new(x, y, z))
    }

    proptest! {
        #[test]
        fn prop_refresh_with_same_transforms_keeps_point(
            rot_a in rotation(),
            at_a in position(),
            rot_b in rotation(),
            at_b in position(),
            normal_rot in rotation(),
            point in position(),
            depth in -0.1f32..0.015,
        ) {
            let mut dispatcher = CollisionDispatcher::new();
            let mut a = object(Vec3::ZERO, 0.5, 0.0);
            a.world_transform = Transform::from_rotation_translation(rot_a, at_a);
            let mut b = object(Vec3::ZERO, 0.5, 0.0);
            b.world_transform = Transform::from_rotation_translation(rot_b, at_b);
            let normal = normal_rot * Vec3::Y;

            let manifold = dispatcher.get_new_manifold(handle(0), handle(1));
            let mut result = ManifoldResult::new(handle(0), &a, handle(1), &b);
            result.set_persistent_manifold(manifold);
            result.add_contact_point(normal, point, depth, &mut dispatcher);
            prop_assert_eq!(dispatcher.manifold(manifold).unwrap().num_contacts(), 1);
            let before = dispatcher.manifold(manifold).unwrap().contact_point(0).clone();

            result.refresh_contact_points(&mut dispatcher);
            let m = dispatcher.manifold(manifold).unwrap();
            prop_assert_eq!(m.num_contacts(), 1);
            let after = m.contact_point(0);
            prop_assert!(after.position_world_on_a.abs_diff_eq(before.position_world_on_a, 1e-3));
            prop_assert!(after.position_world_on_b.abs_diff_eq(point, 1e-3));
            prop_assert!((after.distance - depth).abs() < 1e-3);
        }
    }
}
