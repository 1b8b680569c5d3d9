use glam::{Mat3, Vec3};
use std::f32::consts::FRAC_PI_2;

use crate::utilities::math_helper::world_inverse_inertia;
use crate::utilities::transform::{integrate_transform, Transform};

/// Spins faster than this many radians per step are clamped during integration.
const MAX_ANGULAR_STEP: f32 = FRAC_PI_2;

/// Describes a rigid body's mass, damping and sleeping settings at creation.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RigidBodyDescription {
    /// Zero mass makes the body static.
    pub mass: f32,
    /// Principal moments of inertia. Typically from `CollisionShape::calculate_local_inertia`.
    pub local_inertia: Vec3,
    pub linear_damping: f32,
    pub angular_damping: f32,
    pub friction: f32,
    pub restitution: f32,
    /// Linear speed under which the body accumulates deactivation time.
    pub linear_sleeping_threshold: f32,
    /// Angular speed under which the body accumulates deactivation time.
    pub angular_sleeping_threshold: f32,
}

impl Default for RigidBodyDescription {
    fn default() -> Self {
        Self {
            mass: 0.0,
            local_inertia: Vec3::ZERO,
            linear_damping: 0.0,
            angular_damping: 0.0,
            friction: 0.5,
            restitution: 0.0,
            linear_sleeping_threshold: 0.8,
            angular_sleeping_threshold: 1.0,
        }
    }
}

impl RigidBodyDescription {
    #[must_use]
    pub fn dynamic(mass: f32, local_inertia: Vec3) -> Self {
        Self {
            mass,
            local_inertia,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn fixed() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_damping(mut self, linear: f32, angular: f32) -> Self {
        self.linear_damping = linear;
        self.angular_damping = angular;
        self
    }

    #[must_use]
    pub fn with_friction(mut self, friction: f32) -> Self {
        self.friction = friction;
        self
    }

    #[must_use]
    pub fn with_restitution(mut self, restitution: f32) -> Self {
        self.restitution = restitution;
        self
    }
}

/// Dynamic state attached to a collision object that takes part in the simulation.
///
/// Positions live on the owning collision object; this holds mass properties and motion.
#[derive(Debug, Clone, PartialEq)]
pub struct RigidBody {
    inverse_mass: f32,
    inv_inertia_local: Vec3,
    inv_inertia_tensor_world: Mat3,
    pub linear_velocity: Vec3,
    pub angular_velocity: Vec3,
    /// Scales angular response to impulses. Zero locks rotation.
    pub angular_factor: f32,
    linear_damping: f32,
    angular_damping: f32,
    /// Gravity acceleration applied to this body.
    gravity: Vec3,
    total_force: Vec3,
    total_torque: Vec3,
    pub linear_sleeping_threshold: f32,
    pub angular_sleeping_threshold: f32,
}

impl RigidBody {
    pub fn new(description: &RigidBodyDescription, basis: Mat3) -> Self {
        let mut body = Self {
            inverse_mass: 0.0,
            inv_inertia_local: Vec3::ZERO,
            inv_inertia_tensor_world: Mat3::ZERO,
            linear_velocity: Vec3::ZERO,
            angular_velocity: Vec3::ZERO,
            angular_factor: 1.0,
            linear_damping: 0.0,
            angular_damping: 0.0,
            gravity: Vec3::ZERO,
            total_force: Vec3::ZERO,
            total_torque: Vec3::ZERO,
            linear_sleeping_threshold: description.linear_sleeping_threshold,
            angular_sleeping_threshold: description.angular_sleeping_threshold,
        };
        body.set_mass_props(description.mass, description.local_inertia);
        body.set_damping(description.linear_damping, description.angular_damping);
        body.update_inertia_tensor(basis);
        body
    }

    pub fn set_mass_props(&mut self, mass: f32, inertia: Vec3) {
        self.inverse_mass = if mass == 0.0 { 0.0 } else { 1.0 / mass };
        let inv = |i: f32| if i != 0.0 { 1.0 / i } else { 0.0 };
        self.inv_inertia_local = Vec3::new(inv(inertia.x), inv(inertia.y), inv(inertia.z));
    }

    pub fn set_damping(&mut self, linear: f32, angular: f32) {
        self.linear_damping = linear.clamp(0.0, 1.0);
        self.angular_damping = angular.clamp(0.0, 1.0);
    }

    #[inline(always)]
    pub fn inverse_mass(&self) -> f32 {
        self.inverse_mass
    }

    #[inline(always)]
    pub fn inv_inertia_diag_local(&self) -> Vec3 {
        self.inv_inertia_local
    }

    #[inline(always)]
    pub fn inv_inertia_tensor_world(&self) -> Mat3 {
        self.inv_inertia_tensor_world
    }

    #[inline(always)]
    pub fn has_finite_mass(&self) -> bool {
        self.inverse_mass != 0.0
    }

    #[inline]
    pub fn gravity(&self) -> Vec3 {
        self.gravity
    }

    /// Sets the gravitational acceleration acting on the body.
    pub fn set_gravity(&mut self, acceleration: Vec3) {
        if self.inverse_mass != 0.0 {
            self.gravity = acceleration * (1.0 / self.inverse_mass);
        }
    }

    pub fn update_inertia_tensor(&mut self, basis: Mat3) {
        self.inv_inertia_tensor_world = world_inverse_inertia(basis, self.inv_inertia_local);
    }

    #[inline]
    pub fn apply_central_force(&mut self, force: Vec3) {
        self.total_force += force;
    }

    #[inline]
    pub fn apply_torque(&mut self, torque: Vec3) {
        self.total_torque += torque;
    }

    pub fn apply_force(&mut self, force: Vec3, rel_pos: Vec3) {
        self.apply_central_force(force);
        self.apply_torque(rel_pos.cross(force) * self.angular_factor);
    }

    pub fn apply_gravity(&mut self) {
        if self.has_finite_mass() {
            self.apply_central_force(self.gravity);
        }
    }

    #[inline]
    pub fn total_force(&self) -> Vec3 {
        self.total_force
    }

    #[inline]
    pub fn total_torque(&self) -> Vec3 {
        self.total_torque
    }

    pub fn clear_forces(&mut self) {
        self.total_force = Vec3::ZERO;
        self.total_torque = Vec3::ZERO;
    }

    #[inline]
    pub fn apply_central_impulse(&mut self, impulse: Vec3) {
        self.linear_velocity += impulse * self.inverse_mass;
    }

    #[inline]
    pub fn apply_torque_impulse(&mut self, torque: Vec3) {
        self.angular_velocity += self.inv_inertia_tensor_world * torque;
    }

    /// Applies an impulse at `rel_pos`, measured from the center of mass.
    pub fn apply_impulse(&mut self, impulse: Vec3, rel_pos: Vec3) {
        if self.inverse_mass != 0.0 {
            self.apply_central_impulse(impulse);
            if self.angular_factor != 0.0 {
                self.apply_torque_impulse(rel_pos.cross(impulse) * self.angular_factor);
            }
        }
    }

    /// Velocity of the material point at `rel_pos` from the center of mass.
    #[inline]
    pub fn velocity_in_local_point(&self, rel_pos: Vec3) -> Vec3 {
        self.linear_velocity + self.angular_velocity.cross(rel_pos)
    }

    /// Effective inverse mass for an impulse along `normal` at `rel_pos`.
    pub fn compute_impulse_denominator(&self, rel_pos: Vec3, normal: Vec3) -> f32 {
        let c0 = rel_pos.cross(normal);
        let vec = (self.inv_inertia_tensor_world * c0).cross(rel_pos);
        self.inverse_mass + normal.dot(vec)
    }

    /// Effective inverse inertia for an angular impulse about `axis`.
    pub fn compute_angular_impulse_denominator(&self, axis: Vec3) -> f32 {
        axis.dot(self.inv_inertia_tensor_world * axis)
    }

    /// Applies accumulated forces to the velocities over `time_step`.
    pub fn integrate_velocities(&mut self, time_step: f32) {
        if !self.has_finite_mass() {
            return;
        }
        self.linear_velocity += self.total_force * (self.inverse_mass * time_step);
        self.angular_velocity += self.inv_inertia_tensor_world * self.total_torque * time_step;

        let angular_speed = self.angular_velocity.length();
        if angular_speed * time_step > MAX_ANGULAR_STEP {
            self.angular_velocity *= (MAX_ANGULAR_STEP / time_step) / angular_speed;
        }
    }

    pub fn apply_damping(&mut self, time_step: f32) {
        self.linear_velocity *= (1.0 - time_step * self.linear_damping).clamp(0.0, 1.0);
        self.angular_velocity *= (1.0 - time_step * self.angular_damping).clamp(0.0, 1.0);
    }

    /// Where `world_transform` ends up after `time_step` at the current velocities.
    pub fn predict_integrated_transform(&self, world_transform: &Transform, time_step: f32) -> Transform {
        integrate_transform(
            world_transform,
            self.linear_velocity,
            self.angular_velocity,
            time_step,
        )
    }

    /// Speeds are below the sleeping thresholds.
    #[inline]
    pub fn is_below_sleeping_thresholds(&self) -> bool {
        self.linear_velocity.length_squared()
            < self.linear_sleeping_threshold * self.linear_sleeping_threshold
            && self.angular_velocity.length_squared()
                < self.angular_sleeping_threshold * self.angular_sleeping_threshold
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn unit_body() -> RigidBody {
        RigidBody::new(
            &RigidBodyDescription::dynamic(1.0, Vec3::splat(0.4)),
            Mat3::IDENTITY,
        )
    }

    #[test]
    fn test_static_body_ignores_impulses() {
        let mut body = RigidBody::new(&RigidBodyDescription::fixed(), Mat3::IDENTITY);
        body.apply_impulse(Vec3::X, Vec3::Y);
        assert_eq!(body.linear_velocity, Vec3::ZERO);
        assert_eq!(body.angular_velocity, Vec3::ZERO);
    }

    #[test]
    fn test_off_center_impulse_spins() {
        let mut body = unit_body();
        body.apply_impulse(Vec3::X, Vec3::Y);
        assert_relative_eq!(body.linear_velocity.x, 1.0);
        // r x J = Y x X = -Z, scaled by 1 / 0.4.
        assert_relative_eq!(body.angular_velocity.z, -2.5, epsilon = 1e-5);
    }

    #[test]
    fn test_impulse_denominator_matches_response() {
        let body = unit_body();
        let denominator = body.compute_impulse_denominator(Vec3::Y, Vec3::X);
        assert_relative_eq!(denominator, 1.0 + 2.5, epsilon = 1e-5);
    }

    #[test]
    fn test_gravity_integration() {
        let mut body = unit_body();
        body.set_gravity(Vec3::new(0.0, -10.0, 0.0));
        body.apply_gravity();
        body.integrate_velocities(0.1);
        assert_relative_eq!(body.linear_velocity.y, -1.0, epsilon = 1e-6);
    }
}
