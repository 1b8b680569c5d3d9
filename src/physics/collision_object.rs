use bitflags::bitflags;
use glam::Vec3;
use std::sync::Arc;

use crate::physics::collidables::CollisionShape;
use crate::physics::handles::ObjectHandle;
use crate::physics::rigid_body::{RigidBody, RigidBodyDescription};
use crate::utilities::transform::Transform;

bitflags! {
    /// Per-object behaviour switches.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    #[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
    pub struct CollisionFlags: u32 {
        /// Never moves; infinite mass.
        const STATIC_OBJECT = 1;
        /// Moved by the user; pushes others but is not pushed back.
        const KINEMATIC_OBJECT = 1 << 1;
        /// Detects contacts but produces no collision response.
        const NO_CONTACT_RESPONSE = 1 << 2;
        /// Routes new contacts through the contact-added material hook.
        const CUSTOM_MATERIAL_CALLBACK = 1 << 3;
    }
}

bitflags! {
    /// Broadphase filter groups. An object collides with another when each one's mask
    /// contains the other's group.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    #[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
    pub struct CollisionFilterGroups: u16 {
        const DEFAULT = 1;
        const STATIC = 1 << 1;
        const KINEMATIC = 1 << 2;
        const DEBRIS = 1 << 3;
        const SENSOR_TRIGGER = 1 << 4;
        const ALL = u16::MAX;
    }
}

impl Default for CollisionFilterGroups {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Activation state of a collision object. Drives island sleeping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ActivationState {
    ActiveTag = 1,
    IslandSleeping = 2,
    WantsDeactivation = 3,
    DisableDeactivation = 4,
    DisableSimulation = 5,
}

/// Anything that participates in collision detection: a shape placed in the world plus
/// filtering, material and activation data. Dynamic objects also carry a [`RigidBody`].
#[derive(Debug, Clone)]
pub struct CollisionObject {
    shape: Arc<CollisionShape>,
    pub world_transform: Transform,
    /// Predicted end-of-step transform while a step is in flight; the swept target for
    /// continuous collision. Kinematic objects keep their previous pose here.
    pub interpolation_world_transform: Transform,
    activation_state: ActivationState,
    /// Seconds spent below the sleeping thresholds.
    pub deactivation_time: f32,
    pub collision_flags: CollisionFlags,
    pub filter_group: CollisionFilterGroups,
    pub filter_mask: CollisionFilterGroups,
    pub friction: f32,
    pub restitution: f32,
    /// Fraction of the step the object actually moved after continuous collision.
    pub hit_fraction: f32,
    /// Continuous collision is skipped when squared motion in a step is below this.
    pub ccd_square_motion_threshold: f32,
    /// Radius of the sphere used to approximate this object in swept tests.
    pub ccd_swept_sphere_radius: f32,
    ignored_collisions: Vec<ObjectHandle>,
    rigid_body: Option<RigidBody>,
}

impl CollisionObject {
    /// Creates a static-by-default collision object without dynamics.
    pub fn new(shape: Arc<CollisionShape>, world_transform: Transform) -> Self {
        Self {
            shape,
            world_transform,
            interpolation_world_transform: world_transform,
            activation_state: ActivationState::ActiveTag,
            deactivation_time: 0.0,
            collision_flags: CollisionFlags::STATIC_OBJECT,
            filter_group: CollisionFilterGroups::DEFAULT,
            filter_mask: CollisionFilterGroups::ALL,
            friction: 0.5,
            restitution: 0.0,
            hit_fraction: 1.0,
            ccd_square_motion_threshold: 0.0,
            ccd_swept_sphere_radius: 0.0,
            ignored_collisions: Vec::new(),
            rigid_body: None,
        }
    }

    /// Creates an object with a rigid body. A zero mass makes it static.
    pub fn new_rigid_body(
        shape: Arc<CollisionShape>,
        world_transform: Transform,
        description: &RigidBodyDescription,
    ) -> Self {
        let mut object = Self::new(shape, world_transform);
        let body = RigidBody::new(description, world_transform.basis);
        object.collision_flags = if body.has_finite_mass() {
            CollisionFlags::empty()
        } else {
            CollisionFlags::STATIC_OBJECT
        };
        object.friction = description.friction;
        object.restitution = description.restitution;
        object.rigid_body = Some(body);
        object
    }

    #[inline]
    pub fn shape(&self) -> &Arc<CollisionShape> {
        &self.shape
    }

    pub fn set_shape(&mut self, shape: Arc<CollisionShape>) {
        self.shape = shape;
    }

    #[inline]
    pub fn rigid_body(&self) -> Option<&RigidBody> {
        self.rigid_body.as_ref()
    }

    #[inline]
    pub fn rigid_body_mut(&mut self) -> Option<&mut RigidBody> {
        self.rigid_body.as_mut()
    }

    #[inline(always)]
    pub fn is_static_object(&self) -> bool {
        self.collision_flags.contains(CollisionFlags::STATIC_OBJECT)
    }

    #[inline(always)]
    pub fn is_kinematic_object(&self) -> bool {
        self.collision_flags.contains(CollisionFlags::KINEMATIC_OBJECT)
    }

    #[inline(always)]
    pub fn is_static_or_kinematic_object(&self) -> bool {
        self.collision_flags
            .intersects(CollisionFlags::STATIC_OBJECT | CollisionFlags::KINEMATIC_OBJECT)
    }

    #[inline(always)]
    pub fn has_contact_response(&self) -> bool {
        !self.collision_flags.contains(CollisionFlags::NO_CONTACT_RESPONSE)
    }

    /// Static, kinematic and response-less objects do not join islands.
    #[inline]
    pub fn merges_simulation_islands(&self) -> bool {
        !self.collision_flags.intersects(
            CollisionFlags::STATIC_OBJECT
                | CollisionFlags::KINEMATIC_OBJECT
                | CollisionFlags::NO_CONTACT_RESPONSE,
        )
    }

    #[inline(always)]
    pub fn activation_state(&self) -> ActivationState {
        self.activation_state
    }

    /// Changes the activation state unless deactivation or simulation has been disabled.
    pub fn set_activation_state(&mut self, state: ActivationState) {
        if !matches!(
            self.activation_state,
            ActivationState::DisableDeactivation | ActivationState::DisableSimulation
        ) {
            self.activation_state = state;
        }
    }

    /// Changes the activation state unconditionally.
    pub fn force_activation_state(&mut self, state: ActivationState) {
        self.activation_state = state;
    }

    /// Wakes the object. Static and kinematic objects only wake when forced.
    pub fn activate(&mut self, force: bool) {
        if force || !self.is_static_or_kinematic_object() {
            self.set_activation_state(ActivationState::ActiveTag);
            self.deactivation_time = 0.0;
        }
    }

    #[inline(always)]
    pub fn is_active(&self) -> bool {
        !matches!(
            self.activation_state,
            ActivationState::IslandSleeping | ActivationState::DisableSimulation
        )
    }

    /// Never collide with `other`. Used for bodies linked by a constraint.
    pub fn add_ignored_collision(&mut self, other: ObjectHandle) {
        if !self.ignored_collisions.contains(&other) {
            self.ignored_collisions.push(other);
        }
    }

    pub fn remove_ignored_collision(&mut self, other: ObjectHandle) {
        self.ignored_collisions.retain(|h| *h != other);
    }

    #[inline]
    pub fn check_collide_with(&self, other: ObjectHandle) -> bool {
        !self.ignored_collisions.contains(&other)
    }

    /// Group/mask test in both directions.
    #[inline]
    pub fn filter_accepts(&self, other: &CollisionObject) -> bool {
        self.filter_mask.intersects(other.filter_group) && other.filter_mask.intersects(self.filter_group)
    }

    /// True when this object would like to be put to sleep.
    pub fn wants_sleeping(&self, deactivation_time: f32, disable_deactivation: bool) -> bool {
        if self.activation_state == ActivationState::DisableDeactivation {
            return false;
        }
        if disable_deactivation || deactivation_time == 0.0 {
            return false;
        }
        if matches!(
            self.activation_state,
            ActivationState::IslandSleeping | ActivationState::WantsDeactivation
        ) {
            return true;
        }
        self.deactivation_time > deactivation_time
    }

    /// Accumulates time spent below the body's sleeping thresholds.
    pub fn update_deactivation(&mut self, time_step: f32) {
        if matches!(
            self.activation_state,
            ActivationState::IslandSleeping | ActivationState::DisableDeactivation
        ) {
            return;
        }
        let resting = self
            .rigid_body
            .as_ref()
            .map_or(true, RigidBody::is_below_sleeping_thresholds);
        if resting {
            self.deactivation_time += time_step;
        } else {
            self.deactivation_time = 0.0;
            self.set_activation_state(ActivationState::ActiveTag);
        }
    }

    /// Center of mass in world space.
    #[inline(always)]
    pub fn center_of_mass_position(&self) -> Vec3 {
        self.world_transform.origin
    }

    /// Velocity of the material point at world position `point`. Zero without a body.
    pub fn velocity_at_world_point(&self, point: Vec3) -> Vec3 {
        self.rigid_body.as_ref().map_or(Vec3::ZERO, |body| {
            body.velocity_in_local_point(point - self.world_transform.origin)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sphere_object() -> CollisionObject {
        CollisionObject::new_rigid_body(
            Arc::new(CollisionShape::sphere(1.0).unwrap()),
            Transform::IDENTITY,
            &RigidBodyDescription::dynamic(1.0, Vec3::splat(0.4)),
        )
    }

    #[test]
    fn test_disabled_deactivation_is_sticky() {
        let mut object = sphere_object();
        object.force_activation_state(ActivationState::DisableDeactivation);
        object.set_activation_state(ActivationState::IslandSleeping);
        assert_eq!(object.activation_state(), ActivationState::DisableDeactivation);
        assert!(!object.wants_sleeping(2.0, false));
    }

    #[test]
    fn test_resting_body_wants_sleep_after_timeout() {
        let mut object = sphere_object();
        for _ in 0..130 {
            object.update_deactivation(1.0 / 60.0);
        }
        assert!(object.wants_sleeping(2.0, false));
        assert!(!object.wants_sleeping(2.0, true));
    }

    #[test]
    fn test_flags() {
        let object = sphere_object();
        assert!(!object.is_static_or_kinematic_object());
        assert!(object.merges_simulation_islands());
        let fixed = CollisionObject::new(
            Arc::new(CollisionShape::sphere(1.0).unwrap()),
            Transform::IDENTITY,
        );
        assert!(fixed.is_static_object());
        assert!(!fixed.merges_simulation_islands());
    }

    #[test]
    fn test_filter() {
        let mut a = sphere_object();
        let mut b = sphere_object();
        assert!(a.filter_accepts(&b));
        a.filter_group = CollisionFilterGroups::DEBRIS;
        b.filter_mask = CollisionFilterGroups::ALL - CollisionFilterGroups::DEBRIS;
        assert!(!a.filter_accepts(&b));
    }
}
