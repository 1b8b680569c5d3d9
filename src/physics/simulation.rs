use glam::Vec3;
use rustc_hash::FxHashMap;
use tracing::{debug, trace};

use crate::error::{PhysicsError, Result};
use crate::physics::collision_detection::broad_phase::SimpleBroadphase;
use crate::physics::collision_detection::collision_world::CollisionWorld;
use crate::physics::collision_detection::narrow_phase::CollisionDispatcher;
use crate::physics::collision_object::{ActivationState, CollisionFilterGroups, CollisionObject};
use crate::physics::constraints::contact_solver_info::ContactSolverInfo;
use crate::physics::constraints::typed_constraint::TypedConstraint;
use crate::physics::handles::{ConstraintHandle, ObjectHandle};
use crate::physics::island_manager::SimulationIslandManager;
use crate::physics::solver::SequentialImpulseConstraintSolver;
use crate::physics::world_config::WorldConfig;
use crate::utilities::memory::Arena;
use crate::utilities::transform::{calculate_velocity, integrate_transform, Transform};

#[derive(Debug)]
struct ConstraintSlot {
    constraint: TypedConstraint,
    disables_collisions: bool,
}

/// Rigid-body world: collision detection, islands, the constraint solver and integration,
/// advanced in fixed steps.
///
/// Each internal step runs, in order: velocity integration and motion prediction,
/// discrete collision detection, island building, constraint solving per awake island,
/// transform integration and deactivation bookkeeping.
#[derive(Debug)]
pub struct DynamicsWorld {
    collision_world: CollisionWorld,
    constraints: Arena<ConstraintSlot, ConstraintHandle>,
    solver: SequentialImpulseConstraintSolver,
    island_manager: SimulationIslandManager,
    config: WorldConfig,
    /// Time accumulated towards the next fixed step.
    local_time: f32,
}

impl Default for DynamicsWorld {
    fn default() -> Self {
        Self::from_parts(CollisionWorld::default(), WorldConfig::default())
    }
}

impl DynamicsWorld {
    pub fn new(config: WorldConfig) -> Result<Self> {
        config.validate()?;
        let dispatcher = CollisionDispatcher::new().with_contact_breaking_threshold(config.contact_breaking_threshold);
        Ok(Self::from_parts(
            CollisionWorld::new(Box::new(SimpleBroadphase::new()), dispatcher),
            config,
        ))
    }

    /// Builds a world around an existing collision world, keeping its broadphase,
    /// dispatcher and diagnostic sink.
    pub fn with_collision_world(collision_world: CollisionWorld, config: WorldConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self::from_parts(collision_world, config))
    }

    fn from_parts(collision_world: CollisionWorld, config: WorldConfig) -> Self {
        let mut solver = SequentialImpulseConstraintSolver::new();
        solver.set_random_seed(config.random_seed);
        let mut world = Self {
            collision_world,
            constraints: Arena::new(),
            solver,
            island_manager: SimulationIslandManager::new(),
            config,
            local_time: 0.0,
        };
        world.set_gravity(config.gravity);
        world
    }

    #[inline]
    pub fn collision_world(&self) -> &CollisionWorld {
        &self.collision_world
    }

    #[inline]
    pub fn collision_world_mut(&mut self) -> &mut CollisionWorld {
        &mut self.collision_world
    }

    #[inline]
    pub fn config(&self) -> &WorldConfig {
        &self.config
    }

    #[inline]
    pub fn solver_info(&self) -> &ContactSolverInfo {
        &self.config.solver_info
    }

    pub fn set_solver_info(&mut self, solver_info: ContactSolverInfo) -> Result<()> {
        solver_info.validate()?;
        self.config.solver_info = solver_info;
        Ok(())
    }

    #[inline]
    pub fn solver(&self) -> &SequentialImpulseConstraintSolver {
        &self.solver
    }

    #[inline]
    pub fn solver_mut(&mut self) -> &mut SequentialImpulseConstraintSolver {
        &mut self.solver
    }

    #[inline]
    pub fn island_manager(&self) -> &SimulationIslandManager {
        &self.island_manager
    }

    #[inline]
    pub fn object(&self, handle: ObjectHandle) -> Option<&CollisionObject> {
        self.collision_world.object(handle)
    }

    #[inline]
    pub fn object_mut(&mut self, handle: ObjectHandle) -> Option<&mut CollisionObject> {
        self.collision_world.object_mut(handle)
    }

    #[inline]
    pub fn gravity(&self) -> Vec3 {
        self.config.gravity
    }

    /// Sets gravity on the world and on every dynamic body already in it.
    pub fn set_gravity(&mut self, gravity: Vec3) {
        self.config.gravity = gravity;
        for (_, object) in self.collision_world.objects.iter_mut() {
            if object.is_static_or_kinematic_object() {
                continue;
            }
            if let Some(body) = object.rigid_body_mut() {
                body.set_gravity(gravity);
            }
        }
    }

    /// Adds a body with the default filtering: dynamic bodies collide with everything,
    /// static and kinematic ones with everything but other static objects.
    pub fn add_rigid_body(&mut self, object: CollisionObject) -> ObjectHandle {
        let (group, mask) = if object.is_static_or_kinematic_object() {
            (
                CollisionFilterGroups::STATIC,
                CollisionFilterGroups::ALL - CollisionFilterGroups::STATIC,
            )
        } else {
            (CollisionFilterGroups::DEFAULT, CollisionFilterGroups::ALL)
        };
        self.add_rigid_body_with_filter(object, group, mask)
    }

    pub fn add_rigid_body_with_filter(
        &mut self,
        mut object: CollisionObject,
        group: CollisionFilterGroups,
        mask: CollisionFilterGroups,
    ) -> ObjectHandle {
        if !object.is_static_or_kinematic_object() {
            if let Some(body) = object.rigid_body_mut() {
                body.set_gravity(self.config.gravity);
            }
        }
        let handle = self.collision_world.add_collision_object(object, group, mask);
        debug!(%handle, "added rigid body");
        handle
    }

    /// Removes a body together with every constraint attached to it.
    pub fn remove_rigid_body(&mut self, handle: ObjectHandle) -> Result<CollisionObject> {
        let attached: Vec<ConstraintHandle> = self
            .constraints
            .iter()
            .filter(|(_, slot)| slot.constraint.body_a() == handle || slot.constraint.body_b() == Some(handle))
            .map(|(constraint, _)| constraint)
            .collect();
        for constraint in attached {
            self.remove_constraint(constraint)?;
        }
        let object = self.collision_world.remove_collision_object(handle)?;
        debug!(%handle, "removed rigid body");
        Ok(object)
    }

    /// Adds a joint. With `disable_collisions_between_linked_bodies` the two bodies stop
    /// generating contacts with each other until the constraint is removed.
    pub fn add_constraint(
        &mut self,
        constraint: impl Into<TypedConstraint>,
        disable_collisions_between_linked_bodies: bool,
    ) -> Result<ConstraintHandle> {
        let constraint = constraint.into();
        let body_a = constraint.body_a();
        if self.collision_world.object(body_a).is_none() {
            return Err(PhysicsError::StaleHandle(body_a.to_string()));
        }
        if let Some(body_b) = constraint.body_b() {
            if self.collision_world.object(body_b).is_none() {
                return Err(PhysicsError::StaleHandle(body_b.to_string()));
            }
            if disable_collisions_between_linked_bodies {
                if let Some((a, b)) = self.collision_world.objects.get2_mut(body_a, body_b) {
                    a.add_ignored_collision(body_b);
                    b.add_ignored_collision(body_a);
                }
            }
        }
        Ok(self.constraints.insert(ConstraintSlot {
            constraint,
            disables_collisions: disable_collisions_between_linked_bodies,
        }))
    }

    pub fn remove_constraint(&mut self, handle: ConstraintHandle) -> Result<TypedConstraint> {
        let slot = self
            .constraints
            .remove(handle)
            .ok_or_else(|| PhysicsError::StaleHandle(handle.to_string()))?;
        if slot.disables_collisions {
            let body_a = slot.constraint.body_a();
            if let Some(body_b) = slot.constraint.body_b() {
                if let Some((a, b)) = self.collision_world.objects.get2_mut(body_a, body_b) {
                    a.remove_ignored_collision(body_b);
                    b.remove_ignored_collision(body_a);
                }
            }
        }
        Ok(slot.constraint)
    }

    #[inline]
    pub fn constraint(&self, handle: ConstraintHandle) -> Option<&TypedConstraint> {
        self.constraints.get(handle).map(|slot| &slot.constraint)
    }

    #[inline]
    pub fn constraint_mut(&mut self, handle: ConstraintHandle) -> Option<&mut TypedConstraint> {
        self.constraints.get_mut(handle).map(|slot| &mut slot.constraint)
    }

    #[inline]
    pub fn num_constraints(&self) -> usize {
        self.constraints.len()
    }

    /// Advances the world by `time_step` of real time.
    ///
    /// With `max_sub_steps > 0` time is accumulated and consumed in steps of
    /// `fixed_time_step`, at most `max_sub_steps` per call; leftover time is kept for the
    /// next call and used by [`interpolated_world_transform`]. With `max_sub_steps == 0`
    /// a single step of `time_step` is taken. Returns the number of fixed steps that were
    /// due, before clamping.
    ///
    /// [`interpolated_world_transform`]: DynamicsWorld::interpolated_world_transform
    pub fn step_simulation(&mut self, time_step: f32, max_sub_steps: u32, fixed_time_step: f32) -> u32 {
        let mut num_sub_steps = 0u32;
        let mut max_sub_steps = max_sub_steps;
        let mut fixed_time_step = fixed_time_step;
        if max_sub_steps > 0 {
            self.local_time += time_step;
            if fixed_time_step > 0.0 && self.local_time >= fixed_time_step {
                num_sub_steps = (self.local_time / fixed_time_step) as u32;
                self.local_time -= num_sub_steps as f32 * fixed_time_step;
            }
        } else {
            fixed_time_step = time_step;
            self.local_time = time_step;
            if time_step.abs() < f32::EPSILON {
                max_sub_steps = 0;
            } else {
                num_sub_steps = 1;
                max_sub_steps = 1;
            }
        }

        if num_sub_steps > 0 {
            self.save_kinematic_state(fixed_time_step);
            self.apply_gravity();
            let clamped = num_sub_steps.min(max_sub_steps);
            for _ in 0..clamped {
                self.internal_single_step_simulation(fixed_time_step);
            }
            debug!(
                sub_steps = clamped,
                due = num_sub_steps,
                fixed_time_step,
                "stepped simulation"
            );
        }
        self.clear_forces();
        num_sub_steps
    }

    /// One fixed step of length `time_step`.
    pub fn internal_single_step_simulation(&mut self, time_step: f32) {
        self.predict_unconstrained_motion(time_step);

        let dispatch_info = self.collision_world.dispatch_info_mut();
        dispatch_info.time_step = time_step;
        dispatch_info.step_count = 0;
        self.collision_world.perform_discrete_collision_detection();

        self.calculate_simulation_islands();
        self.config.solver_info.time_step = time_step;
        self.solve_constraints();

        self.integrate_transforms(time_step);
        self.update_activation_state(time_step);
        trace!(time_step, "internal step");
    }

    /// Turns kinematic motion since the last step into velocities so contacts see it.
    pub fn save_kinematic_state(&mut self, time_step: f32) {
        if time_step == 0.0 {
            return;
        }
        for (_, object) in self.collision_world.objects.iter_mut() {
            if !object.is_kinematic_object() || object.activation_state() == ActivationState::IslandSleeping {
                continue;
            }
            let (linear, angular) =
                calculate_velocity(&object.interpolation_world_transform, &object.world_transform, time_step);
            object.interpolation_world_transform = object.world_transform;
            if let Some(body) = object.rigid_body_mut() {
                body.linear_velocity = linear;
                body.angular_velocity = angular;
            }
        }
    }

    pub fn apply_gravity(&mut self) {
        for (_, object) in self.collision_world.objects.iter_mut() {
            if !object.is_active() {
                continue;
            }
            if let Some(body) = object.rigid_body_mut() {
                body.apply_gravity();
            }
        }
    }

    /// Integrates forces into velocities, applies damping and predicts the end-of-step
    /// transform of every awake dynamic body.
    pub fn predict_unconstrained_motion(&mut self, time_step: f32) {
        for (_, object) in self.collision_world.objects.iter_mut() {
            if object.is_static_or_kinematic_object() || !object.is_active() {
                continue;
            }
            let world_transform = object.world_transform;
            let Some(body) = object.rigid_body_mut() else {
                continue;
            };
            body.integrate_velocities(time_step);
            body.apply_damping(time_step);
            let predicted = body.predict_integrated_transform(&world_transform, time_step);
            object.interpolation_world_transform = predicted;
        }
    }

    /// Builds this step's islands from the current pairs and constraints.
    pub fn calculate_simulation_islands(&mut self) {
        let world = &mut self.collision_world;
        self.island_manager
            .update_activation_state(&mut world.objects, world.broadphase.overlapping_pair_cache());
        for (_, slot) in self.constraints.iter() {
            self.island_manager
                .unite_constraint_bodies(&world.objects, slot.constraint.body_a(), slot.constraint.body_b());
        }
        self.island_manager.store_island_activation_state(&world.objects);
    }

    fn constraint_island_id(&self, constraint: &TypedConstraint) -> i32 {
        let tag_a = self.island_manager.island_tag(constraint.body_a()).unwrap_or(-1);
        if tag_a >= 0 {
            return tag_a;
        }
        constraint
            .body_b()
            .and_then(|body_b| self.island_manager.island_tag(body_b))
            .unwrap_or(-1)
    }

    /// Solves every awake island with its contacts and the constraints that belong to it.
    pub fn solve_constraints(&mut self) {
        let constraint_islands: FxHashMap<ConstraintHandle, i32> = self
            .constraints
            .iter()
            .map(|(handle, slot)| (handle, self.constraint_island_id(&slot.constraint)))
            .collect();

        let info = self.config.solver_info;
        let solver = &mut self.solver;
        let constraints = &mut self.constraints;
        let world = &mut self.collision_world;
        let sink = &mut *world.diagnostics;
        self.island_manager
            .build_and_process_islands(&mut world.objects, &mut world.dispatcher, |objects, dispatcher, island| {
                let mut group: Vec<&mut TypedConstraint> = constraints
                    .iter_mut()
                    .filter(|(handle, _)| constraint_islands.get(handle) == Some(&island.id))
                    .map(|(_, slot)| &mut slot.constraint)
                    .collect();
                solver.solve_group(
                    island.bodies,
                    island.manifolds,
                    &mut group,
                    objects,
                    dispatcher,
                    &info,
                    &mut *sink,
                );
            });
    }

    /// Moves awake dynamic bodies by their solved velocities.
    ///
    /// With continuous collision enabled, bodies are first swept to their predicted
    /// transforms and only advance up to their time of impact.
    pub fn integrate_transforms(&mut self, time_step: f32) {
        if self.config.use_continuous {
            for (_, object) in self.collision_world.objects.iter_mut() {
                if object.is_static_or_kinematic_object() || !object.is_active() {
                    continue;
                }
                let world_transform = object.world_transform;
                if let Some(predicted) = object
                    .rigid_body()
                    .map(|body| body.predict_integrated_transform(&world_transform, time_step))
                {
                    object.interpolation_world_transform = predicted;
                }
                object.hit_fraction = 1.0;
            }
            let toi = self.collision_world.perform_continuous_collision_detection();
            trace!(toi, "continuous collision");
        }

        for (_, object) in self.collision_world.objects.iter_mut() {
            if object.is_static_or_kinematic_object() || !object.is_active() {
                continue;
            }
            let step = if self.config.use_continuous {
                time_step * object.hit_fraction
            } else {
                time_step
            };
            let world_transform = object.world_transform;
            let Some(body) = object.rigid_body_mut() else {
                continue;
            };
            let predicted = body.predict_integrated_transform(&world_transform, step);
            body.update_inertia_tensor(predicted.basis);
            object.world_transform = predicted;
            object.interpolation_world_transform = predicted;
        }
    }

    /// Accumulates rest time and moves bodies between awake and wanting to sleep.
    pub fn update_activation_state(&mut self, time_step: f32) {
        let deactivation_time = self.config.deactivation_time;
        let disable_deactivation = self.config.disable_deactivation;
        for (_, object) in self.collision_world.objects.iter_mut() {
            if object.rigid_body().is_none() {
                continue;
            }
            object.update_deactivation(time_step);
            if object.wants_sleeping(deactivation_time, disable_deactivation) {
                if object.is_static_or_kinematic_object() {
                    object.set_activation_state(ActivationState::IslandSleeping);
                } else if object.activation_state() == ActivationState::ActiveTag {
                    object.set_activation_state(ActivationState::WantsDeactivation);
                }
            } else if object.activation_state() != ActivationState::DisableDeactivation {
                object.set_activation_state(ActivationState::ActiveTag);
            }
        }
    }

    pub fn clear_forces(&mut self) {
        for (_, object) in self.collision_world.objects.iter_mut() {
            if let Some(body) = object.rigid_body_mut() {
                body.clear_forces();
            }
        }
    }

    /// Pose of `handle` extrapolated over the time not yet consumed by a fixed step.
    /// Smooths rendering between steps.
    pub fn interpolated_world_transform(&self, handle: ObjectHandle) -> Option<Transform> {
        let object = self.collision_world.object(handle)?;
        Some(match object.rigid_body() {
            Some(body) if object.is_active() && !object.is_static_object() => integrate_transform(
                &object.world_transform,
                body.linear_velocity,
                body.angular_velocity,
                self.local_time,
            ),
            _ => object.world_transform,
        })
    }
}
