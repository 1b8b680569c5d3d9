use glam::{Mat3, Vec3};

use crate::physics::collision_object::CollisionObject;
use crate::physics::handles::ObjectHandle;
use crate::utilities::transform::Transform;

/// Velocity and mass snapshot of one body for the duration of a solve.
///
/// Static and kinematic objects get a snapshot too, with zero inverse mass, so that
/// every constraint row is handled uniformly. Only snapshots with finite mass are
/// written back.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SolverBody {
    /// Source object. `None` for the solver's fixed body.
    pub object: Option<ObjectHandle>,
    pub world_transform: Transform,
    pub linear_velocity: Vec3,
    pub angular_velocity: Vec3,
    pub inv_mass: f32,
    pub inv_inertia_diag_local: Vec3,
    pub inv_inertia_world: Mat3,
    pub angular_factor: f32,
    pub friction: f32,
}

impl SolverBody {
    /// A body that never moves. Stands in for the missing side of one-body constraints.
    pub fn fixed() -> Self {
        Self {
            object: None,
            world_transform: Transform::IDENTITY,
            linear_velocity: Vec3::ZERO,
            angular_velocity: Vec3::ZERO,
            inv_mass: 0.0,
            inv_inertia_diag_local: Vec3::ZERO,
            inv_inertia_world: Mat3::ZERO,
            angular_factor: 1.0,
            friction: 0.0,
        }
    }

    pub fn from_object(handle: ObjectHandle, object: &CollisionObject) -> Self {
        let mut body = Self::fixed();
        body.object = Some(handle);
        body.world_transform = object.world_transform;
        body.friction = object.friction;
        if let Some(rb) = object.rigid_body() {
            body.linear_velocity = rb.linear_velocity;
            body.angular_velocity = rb.angular_velocity;
            body.angular_factor = rb.angular_factor;
            // Kinematic objects keep their driven velocity but behave as infinitely heavy.
            if !object.is_static_or_kinematic_object() {
                body.inv_mass = rb.inverse_mass();
                body.inv_inertia_diag_local = rb.inv_inertia_diag_local();
                body.inv_inertia_world = rb.inv_inertia_tensor_world();
            }
        }
        body
    }

    #[inline(always)]
    pub fn center_of_mass_position(&self) -> Vec3 {
        self.world_transform.origin
    }

    #[inline(always)]
    pub fn has_finite_mass(&self) -> bool {
        self.inv_mass != 0.0
    }

    #[inline]
    pub fn velocity_in_local_point(&self, rel_pos: Vec3) -> Vec3 {
        self.linear_velocity + self.angular_velocity.cross(rel_pos)
    }

    /// Applies an impulse whose linear and angular effects were precomputed.
    #[inline(always)]
    pub fn internal_apply_impulse(&mut self, linear_component: Vec3, angular_component: Vec3, impulse_magnitude: f32) {
        if self.inv_mass != 0.0 {
            self.linear_velocity += linear_component * impulse_magnitude;
            self.angular_velocity += angular_component * (impulse_magnitude * self.angular_factor);
        }
    }

    #[inline]
    pub fn apply_impulse(&mut self, impulse: Vec3, rel_pos: Vec3) {
        if self.inv_mass != 0.0 {
            self.linear_velocity += impulse * self.inv_mass;
            self.apply_torque_impulse(rel_pos.cross(impulse));
        }
    }

    #[inline]
    pub fn apply_torque_impulse(&mut self, torque: Vec3) {
        self.angular_velocity += self.inv_inertia_world * torque * self.angular_factor;
    }

    pub fn compute_impulse_denominator(&self, pos: Vec3, normal: Vec3) -> f32 {
        let r0 = pos - self.center_of_mass_position();
        let c0 = r0.cross(normal);
        let vec = (self.inv_inertia_world * c0).cross(r0);
        self.inv_mass + normal.dot(vec)
    }

    #[inline]
    pub fn compute_angular_impulse_denominator(&self, axis: Vec3) -> f32 {
        axis.dot(self.inv_inertia_world * axis)
    }

    /// Copies the solved velocities back onto the source object.
    pub fn writeback_velocity(&self, object: &mut CollisionObject) {
        if self.inv_mass == 0.0 {
            return;
        }
        if let Some(rb) = object.rigid_body_mut() {
            rb.linear_velocity = self.linear_velocity;
            rb.angular_velocity = self.angular_velocity;
        }
    }
}

/// Mutable access to two distinct solver bodies.
#[inline]
pub fn body_pair_mut(bodies: &mut [SolverBody], a: usize, b: usize) -> (&mut SolverBody, &mut SolverBody) {
    assert_ne!(a, b, "a constraint cannot link a body to itself");
    if a < b {
        let (left, right) = bodies.split_at_mut(b);
        (&mut left[a], &mut right[0])
    } else {
        let (left, right) = bodies.split_at_mut(a);
        (&mut right[0], &mut left[b])
    }
}
