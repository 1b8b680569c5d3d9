use glam::Vec3;
use rustc_hash::FxHashMap;
use tracing::trace;

use crate::physics::collision_detection::contact_manifold::ManifoldPoint;
use crate::physics::collision_detection::narrow_phase::CollisionDispatcher;
use crate::physics::collision_object::CollisionObject;
use crate::physics::constraints::contact::{
    prepare_persistent_contact, resolve_single_collision_combined, resolve_single_collision_combined_cache_friendly,
    resolve_single_friction, resolve_single_friction_cache_friendly, restitution_curve, SolverConstraint,
    SolverConstraintType,
};
use crate::physics::constraints::contact_solver_info::{ContactSolverInfo, SolverMode};
use crate::physics::constraints::solver_body::{body_pair_mut, SolverBody};
use crate::physics::constraints::typed_constraint::TypedConstraint;
use crate::physics::diagnostics::{Diagnostic, DiagnosticSink};
use crate::physics::handles::{ManifoldHandle, ObjectHandle};
use crate::utilities::math_helper::plane_space;
use crate::utilities::memory::Arena;
use crate::utilities::random::SolverRng;

/// Index of the immovable body that stands in for the missing side of one-body joints.
const FIXED_BODY: usize = 0;

/// Gauss-Seidel style solver for contacts, friction and typed constraints.
///
/// With [`SolverMode::CACHE_FRIENDLY`] set (the default) every contact becomes pooled
/// per-step rows and the solved impulses are copied back onto the manifold points for
/// warm starting. With the flag cleared, rows live on each point's persistent payload
/// instead. Both paths iterate over velocity snapshots of the touched bodies and write
/// the result back once at the end.
///
/// All pools are owned by the solver and reused between calls.
#[derive(Debug, Default)]
pub struct SequentialImpulseConstraintSolver {
    tmp_solver_body_pool: Vec<SolverBody>,
    tmp_solver_constraint_pool: Vec<SolverConstraint>,
    tmp_solver_friction_constraint_pool: Vec<SolverConstraint>,
    order_tmp_constraint_pool: Vec<usize>,
    order_friction_constraint_pool: Vec<usize>,
    /// Per-call map from object to its snapshot in `tmp_solver_body_pool`.
    companion_ids: FxHashMap<ObjectHandle, usize>,
    /// (manifold slot, point index) visiting order for the persistent path.
    point_order: Vec<(usize, usize)>,
    rng: SolverRng,
}

impl SequentialImpulseConstraintSolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_random_seed(&mut self, seed: u32) {
        self.rng.set_seed(seed);
    }

    #[inline]
    pub fn random_seed(&self) -> u32 {
        self.rng.seed()
    }

    /// Advances the shuffling generator.
    #[inline]
    pub fn rand2(&mut self) -> u32 {
        self.rng.rand2()
    }

    /// Value in `[0, n)` from the shuffling generator.
    #[inline]
    pub fn rand_int2(&mut self, n: usize) -> usize {
        self.rng.rand_int2(n)
    }

    /// Solves one island.
    ///
    /// `bodies` are the island's members. Snapshots are only made for bodies touched by
    /// a contact or a constraint. Returns the summed magnitude of the normal impulse
    /// corrections applied during the last iteration, a rough convergence residual.
    #[allow(clippy::too_many_arguments)]
    pub fn solve_group(
        &mut self,
        bodies: &[ObjectHandle],
        manifolds: &[ManifoldHandle],
        constraints: &mut [&mut TypedConstraint],
        objects: &mut Arena<CollisionObject, ObjectHandle>,
        dispatcher: &mut CollisionDispatcher,
        info: &ContactSolverInfo,
        sink: &mut dyn DiagnosticSink,
    ) -> f32 {
        if manifolds.is_empty() && constraints.is_empty() {
            return 0.0;
        }
        trace!(
            bodies = bodies.len(),
            manifolds = manifolds.len(),
            constraints = constraints.len(),
            "solve group"
        );

        self.tmp_solver_body_pool.clear();
        self.companion_ids.clear();
        self.tmp_solver_body_pool.push(SolverBody::fixed());

        let residual = if info.solver_mode.contains(SolverMode::CACHE_FRIENDLY) {
            self.solve_group_cache_friendly_setup(manifolds, constraints, objects, dispatcher, info);
            let residual = self.solve_group_cache_friendly_iterations(constraints, info);
            self.write_back_impulses(manifolds, dispatcher);
            residual
        } else {
            self.solve_group_persistent(manifolds, constraints, objects, dispatcher, info)
        };

        self.write_back_velocities(objects, sink);
        self.tmp_solver_constraint_pool.clear();
        self.tmp_solver_friction_constraint_pool.clear();
        self.order_tmp_constraint_pool.clear();
        self.order_friction_constraint_pool.clear();
        self.point_order.clear();
        residual
    }

    /// Snapshot index for `handle`, creating the snapshot on first use. Unknown objects
    /// map to the fixed body.
    fn get_or_init_solver_body(&mut self, handle: ObjectHandle, objects: &Arena<CollisionObject, ObjectHandle>) -> usize {
        if let Some(&id) = self.companion_ids.get(&handle) {
            return id;
        }
        let Some(object) = objects.get(handle) else {
            return FIXED_BODY;
        };
        let id = self.tmp_solver_body_pool.len();
        self.tmp_solver_body_pool.push(SolverBody::from_object(handle, object));
        self.companion_ids.insert(handle, id);
        id
    }

    fn constraint_bodies(
        &mut self,
        constraint: &TypedConstraint,
        objects: &Arena<CollisionObject, ObjectHandle>,
    ) -> (usize, usize) {
        let a = self.get_or_init_solver_body(constraint.body_a(), objects);
        let b = match constraint.body_b() {
            Some(handle) => self.get_or_init_solver_body(handle, objects),
            None => FIXED_BODY,
        };
        (a, b)
    }

    #[allow(clippy::too_many_arguments)]
    fn add_friction_constraint(
        &mut self,
        normal_axis: Vec3,
        solver_body_id_a: usize,
        solver_body_id_b: usize,
        contact_index: usize,
        cp: &ManifoldPoint,
        rel_pos1: Vec3,
        rel_pos2: Vec3,
    ) {
        let body_a = &self.tmp_solver_body_pool[solver_body_id_a];
        let body_b = &self.tmp_solver_body_pool[solver_body_id_b];
        let relpos1_cross_normal = rel_pos1.cross(normal_axis);
        let relpos2_cross_normal = rel_pos2.cross(normal_axis);
        let angular_component_a = body_a.inv_inertia_world * relpos1_cross_normal;
        let angular_component_b = body_b.inv_inertia_world * relpos2_cross_normal;
        let denom0 = body_a.inv_mass + normal_axis.dot(angular_component_a.cross(rel_pos1));
        let denom1 = body_b.inv_mass + normal_axis.dot(angular_component_b.cross(rel_pos2));
        let denom = denom0 + denom1;

        self.tmp_solver_friction_constraint_pool.push(SolverConstraint {
            relpos1_cross_normal,
            contact_normal: normal_axis,
            relpos2_cross_normal,
            angular_component_a,
            angular_component_b,
            applied_impulse: 0.0,
            friction: cp.combined_friction,
            restitution: 0.0,
            jac_diag_ab_inv: if denom > 0.0 { 1.0 / denom } else { 0.0 },
            penetration: 0.0,
            solver_body_id_a,
            solver_body_id_b,
            friction_index: contact_index,
            original_contact_point: None,
            constraint_type: SolverConstraintType::Friction1D,
        });
    }

    /// Builds one normal row and two friction rows for a touching contact, warm starting
    /// all three from the impulses stored on the point.
    fn setup_contact(
        &mut self,
        cp: &mut ManifoldPoint,
        source: (usize, usize),
        solver_body_id_a: usize,
        solver_body_id_b: usize,
        info: &ContactSolverInfo,
    ) {
        let body_a = self.tmp_solver_body_pool[solver_body_id_a];
        let body_b = self.tmp_solver_body_pool[solver_body_id_b];
        let normal = cp.normal_world_on_b;
        let rel_pos1 = cp.position_world_on_a - body_a.center_of_mass_position();
        let rel_pos2 = cp.position_world_on_b - body_b.center_of_mass_position();

        let relpos1_cross_normal = rel_pos1.cross(normal);
        let relpos2_cross_normal = rel_pos2.cross(normal);
        let angular_component_a = body_a.inv_inertia_world * relpos1_cross_normal;
        let angular_component_b = body_b.inv_inertia_world * relpos2_cross_normal;
        let denom0 = body_a.inv_mass + normal.dot(angular_component_a.cross(rel_pos1));
        let denom1 = body_b.inv_mass + normal.dot(angular_component_b.cross(rel_pos2));
        let denom = denom0 + denom1;

        let vel = body_a.velocity_in_local_point(rel_pos1) - body_b.velocity_in_local_point(rel_pos2);
        let rel_vel = normal.dot(vel);

        let mut penetration = cp.distance + info.linear_slop;
        let restitution = restitution_curve(rel_vel, cp.combined_restitution).max(0.0);
        // Bouncing already separates faster than the positional correction would.
        if restitution > -penetration / info.time_step {
            penetration = 0.0;
        }

        let warmstarting = info.solver_mode.contains(SolverMode::USE_WARMSTARTING);
        let applied_impulse = if warmstarting {
            cp.applied_impulse * info.warmstarting_factor
        } else {
            0.0
        };

        let contact_index = self.tmp_solver_constraint_pool.len();
        let friction_index = self.tmp_solver_friction_constraint_pool.len();
        self.tmp_solver_constraint_pool.push(SolverConstraint {
            relpos1_cross_normal,
            contact_normal: normal,
            relpos2_cross_normal,
            angular_component_a,
            angular_component_b,
            applied_impulse,
            friction: cp.combined_friction,
            restitution,
            jac_diag_ab_inv: if denom > 0.0 { 1.0 / denom } else { 0.0 },
            penetration,
            solver_body_id_a,
            solver_body_id_b,
            friction_index,
            original_contact_point: Some(source),
            constraint_type: SolverConstraintType::Contact1D,
        });
        if applied_impulse != 0.0 {
            let (a, b) = body_pair_mut(&mut self.tmp_solver_body_pool, solver_body_id_a, solver_body_id_b);
            a.internal_apply_impulse(normal * a.inv_mass, angular_component_a, applied_impulse);
            b.internal_apply_impulse(normal * b.inv_mass, angular_component_b, -applied_impulse);
        }

        if !cp.lateral_friction_initialized {
            let lateral = vel - normal * rel_vel;
            let lat_rel_vel = lateral.length_squared();
            if lat_rel_vel > f32::EPSILON {
                let dir1 = lateral / lat_rel_vel.sqrt();
                cp.lateral_friction_dir1 = dir1;
                cp.lateral_friction_dir2 = dir1.cross(normal).normalize_or_zero();
            } else {
                let (dir1, dir2) = plane_space(normal);
                cp.lateral_friction_dir1 = dir1;
                cp.lateral_friction_dir2 = dir2;
            }
            cp.lateral_friction_initialized = true;
        }
        let (dir1, dir2) = (cp.lateral_friction_dir1, cp.lateral_friction_dir2);
        self.add_friction_constraint(dir1, solver_body_id_a, solver_body_id_b, contact_index, cp, rel_pos1, rel_pos2);
        self.add_friction_constraint(dir2, solver_body_id_a, solver_body_id_b, contact_index, cp, rel_pos1, rel_pos2);

        for (offset, stored) in [(0, cp.applied_impulse_lateral1), (1, cp.applied_impulse_lateral2)] {
            let row = &mut self.tmp_solver_friction_constraint_pool[friction_index + offset];
            row.applied_impulse = if warmstarting { stored * info.warmstarting_factor } else { 0.0 };
            let row = *row;
            if row.applied_impulse != 0.0 {
                let (a, b) = body_pair_mut(&mut self.tmp_solver_body_pool, solver_body_id_a, solver_body_id_b);
                a.internal_apply_impulse(row.contact_normal * a.inv_mass, row.angular_component_a, row.applied_impulse);
                b.internal_apply_impulse(row.contact_normal * b.inv_mass, row.angular_component_b, -row.applied_impulse);
            }
        }
    }

    fn solve_group_cache_friendly_setup(
        &mut self,
        manifolds: &[ManifoldHandle],
        constraints: &mut [&mut TypedConstraint],
        objects: &Arena<CollisionObject, ObjectHandle>,
        dispatcher: &mut CollisionDispatcher,
        info: &ContactSolverInfo,
    ) {
        for (slot, &handle) in manifolds.iter().enumerate() {
            let Some(manifold) = dispatcher.manifold_mut(handle) else {
                continue;
            };
            if manifold.num_contacts() == 0 {
                continue;
            }
            let id_a = self.get_or_init_solver_body(manifold.body0(), objects);
            let id_b = self.get_or_init_solver_body(manifold.body1(), objects);
            if id_a == id_b {
                continue;
            }
            for (j, cp) in manifold.points_mut().iter_mut().enumerate() {
                if cp.distance <= 0.0 {
                    self.setup_contact(cp, (slot, j), id_a, id_b, info);
                }
            }
        }

        for constraint in constraints.iter_mut() {
            let (a, b) = self.constraint_bodies(&**constraint, objects);
            let body_a = self.tmp_solver_body_pool[a];
            let body_b = self.tmp_solver_body_pool[b];
            constraint.build_jacobian(&body_a, &body_b);
        }

        self.order_tmp_constraint_pool.clear();
        self.order_tmp_constraint_pool
            .extend(0..self.tmp_solver_constraint_pool.len());
        self.order_friction_constraint_pool.clear();
        self.order_friction_constraint_pool
            .extend(0..self.tmp_solver_friction_constraint_pool.len());
    }

    fn solve_typed_constraints(&mut self, constraints: &mut [&mut TypedConstraint], time_step: f32) {
        for constraint in constraints.iter_mut() {
            let a = self.companion_ids.get(&constraint.body_a()).copied().unwrap_or(FIXED_BODY);
            let b = constraint
                .body_b()
                .and_then(|handle| self.companion_ids.get(&handle).copied())
                .unwrap_or(FIXED_BODY);
            if a == b {
                continue;
            }
            let (body_a, body_b) = body_pair_mut(&mut self.tmp_solver_body_pool, a, b);
            constraint.solve_constraint(body_a, body_b, time_step);
        }
    }

    fn solve_group_cache_friendly_iterations(
        &mut self,
        constraints: &mut [&mut TypedConstraint],
        info: &ContactSolverInfo,
    ) -> f32 {
        let mut residual = 0.0;
        for iteration in 0..info.num_iterations {
            if info.solver_mode.contains(SolverMode::RANDOMIZE_ORDER) && iteration & 7 == 0 {
                self.rng.shuffle(&mut self.order_tmp_constraint_pool);
                self.rng.shuffle(&mut self.order_friction_constraint_pool);
            }

            self.solve_typed_constraints(constraints, info.time_step);

            residual = 0.0;
            for &index in &self.order_tmp_constraint_pool {
                let row = &mut self.tmp_solver_constraint_pool[index];
                let (a, b) = body_pair_mut(&mut self.tmp_solver_body_pool, row.solver_body_id_a, row.solver_body_id_b);
                residual += resolve_single_collision_combined_cache_friendly(a, b, row, info).abs();
            }

            for &index in &self.order_friction_constraint_pool {
                let row = &mut self.tmp_solver_friction_constraint_pool[index];
                let total_impulse = self.tmp_solver_constraint_pool[row.friction_index].applied_impulse;
                let (a, b) = body_pair_mut(&mut self.tmp_solver_body_pool, row.solver_body_id_a, row.solver_body_id_b);
                resolve_single_friction_cache_friendly(a, b, row, info, total_impulse);
            }
        }
        residual
    }

    /// Stores the solved impulses on their source points for next step's warm start.
    fn write_back_impulses(&self, manifolds: &[ManifoldHandle], dispatcher: &mut CollisionDispatcher) {
        for row in &self.tmp_solver_constraint_pool {
            let Some((slot, point)) = row.original_contact_point else {
                continue;
            };
            let Some(manifold) = dispatcher.manifold_mut(manifolds[slot]) else {
                continue;
            };
            let cp = manifold.contact_point_mut(point);
            cp.applied_impulse = row.applied_impulse;
            cp.applied_impulse_lateral1 = self.tmp_solver_friction_constraint_pool[row.friction_index].applied_impulse;
            cp.applied_impulse_lateral2 = self.tmp_solver_friction_constraint_pool[row.friction_index + 1].applied_impulse;
        }
    }

    /// Variant that keeps each contact's rows on its persistent payload.
    fn solve_group_persistent(
        &mut self,
        manifolds: &[ManifoldHandle],
        constraints: &mut [&mut TypedConstraint],
        objects: &Arena<CollisionObject, ObjectHandle>,
        dispatcher: &mut CollisionDispatcher,
        info: &ContactSolverInfo,
    ) -> f32 {
        let mut manifold_bodies = Vec::with_capacity(manifolds.len());
        for (slot, &handle) in manifolds.iter().enumerate() {
            let Some(manifold) = dispatcher.manifold_mut(handle) else {
                manifold_bodies.push((FIXED_BODY, FIXED_BODY));
                continue;
            };
            let id_a = self.get_or_init_solver_body(manifold.body0(), objects);
            let id_b = self.get_or_init_solver_body(manifold.body1(), objects);
            manifold_bodies.push((id_a, id_b));
            if id_a == id_b {
                continue;
            }
            for (j, cp) in manifold.points_mut().iter_mut().enumerate() {
                if cp.distance <= 0.0 {
                    let (a, b) = body_pair_mut(&mut self.tmp_solver_body_pool, id_a, id_b);
                    prepare_persistent_contact(cp, a, b, info);
                }
                self.point_order.push((slot, j));
            }
        }

        for constraint in constraints.iter_mut() {
            let (a, b) = self.constraint_bodies(&**constraint, objects);
            let body_a = self.tmp_solver_body_pool[a];
            let body_b = self.tmp_solver_body_pool[b];
            constraint.build_jacobian(&body_a, &body_b);
        }

        let mut residual = 0.0;
        for iteration in 0..info.num_iterations {
            if info.solver_mode.contains(SolverMode::RANDOMIZE_ORDER) && iteration & 7 == 0 {
                self.rng.shuffle(&mut self.point_order);
            }

            self.solve_typed_constraints(constraints, info.time_step);

            residual = 0.0;
            for &(slot, j) in &self.point_order {
                let (id_a, id_b) = manifold_bodies[slot];
                let Some(cp) = dispatcher.manifold_mut(manifolds[slot]).map(|m| m.contact_point_mut(j)) else {
                    continue;
                };
                if id_a == id_b || cp.distance > 0.0 {
                    continue;
                }
                let (a, b) = body_pair_mut(&mut self.tmp_solver_body_pool, id_a, id_b);
                residual += resolve_single_collision_combined(a, b, cp, info).abs();
            }
            for &(slot, j) in &self.point_order {
                let (id_a, id_b) = manifold_bodies[slot];
                let Some(cp) = dispatcher.manifold_mut(manifolds[slot]).map(|m| m.contact_point_mut(j)) else {
                    continue;
                };
                if id_a == id_b || cp.distance > 0.0 {
                    continue;
                }
                let (a, b) = body_pair_mut(&mut self.tmp_solver_body_pool, id_a, id_b);
                resolve_single_friction(a, b, cp, info);
            }
        }

        // Mirror the payload impulses onto the point so both paths expose the same data.
        for &(slot, j) in &self.point_order {
            let Some(manifold) = dispatcher.manifold_mut(manifolds[slot]) else {
                continue;
            };
            let cp = manifold.contact_point_mut(j);
            if let Some(cpd) = cp.persistent_data.as_ref() {
                let (normal, lateral1, lateral2) = (
                    cpd.applied_impulse,
                    cpd.accumulated_tangent_impulse0,
                    cpd.accumulated_tangent_impulse1,
                );
                cp.applied_impulse = normal;
                cp.applied_impulse_lateral1 = lateral1;
                cp.applied_impulse_lateral2 = lateral2;
            }
        }
        residual
    }

    /// Copies snapshot velocities back to their objects. Non-finite results are zeroed
    /// and reported instead of being written.
    fn write_back_velocities(&self, objects: &mut Arena<CollisionObject, ObjectHandle>, sink: &mut dyn DiagnosticSink) {
        for body in self.tmp_solver_body_pool.iter().skip(1) {
            let Some(handle) = body.object else {
                continue;
            };
            let Some(object) = objects.get_mut(handle) else {
                continue;
            };
            if !body.has_finite_mass() {
                continue;
            }
            if body.linear_velocity.is_finite() && body.angular_velocity.is_finite() {
                body.writeback_velocity(object);
            } else {
                let mut reset = *body;
                reset.linear_velocity = Vec3::ZERO;
                reset.angular_velocity = Vec3::ZERO;
                reset.writeback_velocity(object);
                sink.report(&Diagnostic::NonFiniteState { object: handle });
            }
        }
    }
}
