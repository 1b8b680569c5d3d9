use std::sync::Arc;

use approx::assert_abs_diff_eq;
use glam::Vec3;
use rust_rigid_physics::physics::collidables::CollisionShape;
use rust_rigid_physics::physics::constraints::{ContactSolverInfo, HingeConstraint, SolverMode};
use rust_rigid_physics::physics::{ActivationState, CollisionObject, DynamicsWorld, ObjectHandle, RigidBodyDescription, WorldConfig};
use rust_rigid_physics::utilities::Transform;

const DT: f32 = 1.0 / 60.0;

fn add_ground(world: &mut DynamicsWorld) -> ObjectHandle {
    world.add_rigid_body(CollisionObject::new(
        Arc::new(CollisionShape::static_plane(Vec3::Y, 0.0).unwrap()),
        Transform::IDENTITY,
    ))
}

fn add_sphere(world: &mut DynamicsWorld, radius: f32, origin: Vec3) -> ObjectHandle {
    let shape = CollisionShape::sphere(radius).unwrap();
    let inertia = shape.calculate_local_inertia(1.0);
    world.add_rigid_body(CollisionObject::new_rigid_body(
        Arc::new(shape),
        Transform::from_translation(origin),
        &RigidBodyDescription::dynamic(1.0, inertia),
    ))
}

fn add_box(world: &mut DynamicsWorld, half_extents: Vec3, origin: Vec3) -> ObjectHandle {
    let shape = CollisionShape::cuboid(half_extents).unwrap();
    let inertia = shape.calculate_local_inertia(1.0);
    world.add_rigid_body(CollisionObject::new_rigid_body(
        Arc::new(shape),
        Transform::from_translation(origin),
        &RigidBodyDescription::dynamic(1.0, inertia),
    ))
}

fn run(world: &mut DynamicsWorld, steps: usize) {
    for _ in 0..steps {
        world.step_simulation(DT, 1, DT);
    }
}

#[test]
fn test_box_settles_on_ground() {
    let mut world = DynamicsWorld::default();
    add_ground(&mut world);
    let cube = add_box(&mut world, Vec3::splat(0.5), Vec3::new(0.0, 1.0, 0.0));
    run(&mut world, 300);

    let object = world.object(cube).unwrap();
    assert!(object.world_transform.origin.y > 0.3, "fell through: {}", object.world_transform.origin);
    assert_abs_diff_eq!(object.world_transform.origin.y, 0.5, epsilon = 0.15);
    let manifolds: Vec<_> = world.collision_world().dispatcher().manifolds().collect();
    assert!(!manifolds.is_empty());
    for (_, manifold) in manifolds {
        assert!(manifold.num_contacts() <= 4);
    }
}

#[test]
fn test_head_on_spheres_stop_approaching() {
    let config = WorldConfig::default().with_gravity(Vec3::ZERO);
    let mut world = DynamicsWorld::new(config).unwrap();
    let a = add_sphere(&mut world, 0.5, Vec3::new(-1.0, 0.0, 0.0));
    let b = add_sphere(&mut world, 0.5, Vec3::new(1.0, 0.0, 0.0));
    world.object_mut(a).unwrap().rigid_body_mut().unwrap().linear_velocity = Vec3::new(2.0, 0.0, 0.0);
    world.object_mut(b).unwrap().rigid_body_mut().unwrap().linear_velocity = Vec3::new(-2.0, 0.0, 0.0);
    run(&mut world, 90);

    let pa = world.object(a).unwrap().world_transform.origin;
    let pb = world.object(b).unwrap().world_transform.origin;
    assert!(pb.x - pa.x > 0.9, "spheres overlap too deeply: {pa} {pb}");
    let va = world.object(a).unwrap().rigid_body().unwrap().linear_velocity;
    let vb = world.object(b).unwrap().rigid_body().unwrap().linear_velocity;
    assert!(va.x - vb.x < 0.05);
    // Momentum is conserved by equal and opposite impulses.
    assert_abs_diff_eq!(va.x + vb.x, 0.0, epsilon = 1e-3);
}

#[test]
fn test_separate_bodies_form_separate_islands() {
    let mut world = DynamicsWorld::default();
    let ground = add_ground(&mut world);
    let balls: Vec<ObjectHandle> = (0..4)
        .map(|i| add_sphere(&mut world, 0.5, Vec3::new(i as f32 * 3.0, 0.5, 0.0)))
        .collect();
    run(&mut world, 1);

    let islands = world.island_manager();
    assert_eq!(islands.island_tag(ground), Some(-1));
    let mut tags: Vec<i32> = balls.iter().map(|&b| islands.island_tag(b).unwrap()).collect();
    assert!(tags.iter().all(|&t| t >= 0));
    tags.sort_unstable();
    tags.dedup();
    assert_eq!(tags.len(), balls.len());
}

#[test]
fn test_touching_bodies_share_an_island() {
    let config = WorldConfig::default().with_gravity(Vec3::ZERO);
    let mut world = DynamicsWorld::new(config).unwrap();
    let a = add_sphere(&mut world, 0.5, Vec3::ZERO);
    let b = add_sphere(&mut world, 0.5, Vec3::new(0.99, 0.0, 0.0));
    let c = add_sphere(&mut world, 0.5, Vec3::new(5.0, 0.0, 0.0));
    run(&mut world, 1);

    let islands = world.island_manager();
    assert_eq!(islands.island_tag(a), islands.island_tag(b));
    assert_ne!(islands.island_tag(a), islands.island_tag(c));
}

fn pile(seed: u32) -> Vec<Transform> {
    let config = WorldConfig::default().with_random_seed(seed);
    let mut world = DynamicsWorld::new(config).unwrap();
    add_ground(&mut world);
    let mut handles = Vec::new();
    for i in 0..6 {
        let x = (i % 3) as f32 * 0.9 - 0.9;
        let y = 0.6 + (i / 3) as f32 * 1.1;
        handles.push(add_sphere(&mut world, 0.5, Vec3::new(x, y, 0.1 * i as f32)));
    }
    run(&mut world, 120);
    handles
        .iter()
        .map(|&h| world.object(h).unwrap().world_transform)
        .collect()
}

#[test]
fn test_same_seed_reproduces_simulation() {
    let first = pile(7);
    let second = pile(7);
    for (a, b) in first.iter().zip(&second) {
        assert_eq!(a.origin.to_array(), b.origin.to_array());
        assert_eq!(a.basis.to_cols_array(), b.basis.to_cols_array());
    }
}

#[test]
fn test_locked_hinge_holds_body_still() {
    let config = WorldConfig::default()
        .with_gravity(Vec3::ZERO)
        .with_disable_deactivation(true);
    let mut world = DynamicsWorld::new(config).unwrap();
    let door = add_box(&mut world, Vec3::new(0.5, 1.0, 0.05), Vec3::new(0.5, 0.0, 0.0));
    let mut hinge = HingeConstraint::new(door, None, Vec3::new(-0.5, 0.0, 0.0), Vec3::ZERO, Vec3::Y, Vec3::Y);
    hinge.set_limit(0.0, 0.0);
    world.add_constraint(hinge, false).unwrap();
    world.object_mut(door).unwrap().rigid_body_mut().unwrap().angular_velocity = Vec3::new(0.0, 1.0, 0.0);
    run(&mut world, 120);

    let object = world.object(door).unwrap();
    let spin = object.rigid_body().unwrap().angular_velocity;
    assert!(spin.length() < 0.05, "hinge still spinning: {spin}");
    assert_abs_diff_eq!(object.world_transform.origin.x, 0.5, epsilon = 0.05);
}

#[test]
fn test_locked_hinge_resists_constant_torque() {
    let config = WorldConfig::default()
        .with_gravity(Vec3::ZERO)
        .with_disable_deactivation(true);
    let mut world = DynamicsWorld::new(config).unwrap();
    let door = add_box(&mut world, Vec3::new(0.5, 1.0, 0.05), Vec3::new(0.5, 0.0, 0.0));
    let mut hinge = HingeConstraint::new(door, None, Vec3::new(-0.5, 0.0, 0.0), Vec3::ZERO, Vec3::Y, Vec3::Y);
    hinge.set_limit(0.0, 0.0);
    world.add_constraint(hinge, false).unwrap();

    for step in 0..300 {
        world
            .object_mut(door)
            .unwrap()
            .rigid_body_mut()
            .unwrap()
            .apply_torque(Vec3::new(0.0, 5.0, 0.0));
        world.step_simulation(DT, 1, DT);
        if step >= 200 {
            let basis = world.object(door).unwrap().world_transform.basis;
            // Rotation about Y carries the local X axis to (cos, 0, -sin).
            let angle = (-basis.x_axis.z).atan2(basis.x_axis.x);
            assert!(angle.abs() < 1e-2, "hinge drifted to {angle} at step {step}");
        }
    }
    let origin = world.object(door).unwrap().world_transform.origin;
    assert_abs_diff_eq!(origin.x, 0.5, epsilon = 0.05);
}

#[test]
fn test_free_hinge_swings_under_gravity() {
    let mut world = DynamicsWorld::new(WorldConfig::default().with_disable_deactivation(true)).unwrap();
    let arm = add_box(&mut world, Vec3::new(0.5, 0.05, 0.05), Vec3::new(0.5, 0.0, 0.0));
    let hinge = HingeConstraint::new(arm, None, Vec3::new(-0.5, 0.0, 0.0), Vec3::ZERO, Vec3::Z, Vec3::Z);
    world.add_constraint(hinge, false).unwrap();
    run(&mut world, 30);

    let origin = world.object(arm).unwrap().world_transform.origin;
    assert!(origin.y < -0.05, "arm did not swing: {origin}");
    assert_abs_diff_eq!(origin.length(), 0.5, epsilon = 0.05);
    assert_abs_diff_eq!(origin.z, 0.0, epsilon = 0.01);
}

#[test]
fn test_persistent_solver_also_rests_on_ground() {
    let mode = SolverMode::default() - SolverMode::CACHE_FRIENDLY;
    let info = ContactSolverInfo::default().with_solver_mode(mode);
    let mut world = DynamicsWorld::new(WorldConfig::default().with_solver_info(info)).unwrap();
    add_ground(&mut world);
    let ball = add_sphere(&mut world, 0.5, Vec3::new(0.0, 1.0, 0.0));
    run(&mut world, 240);

    assert_abs_diff_eq!(world.object(ball).unwrap().world_transform.origin.y, 0.5, epsilon = 0.05);
}

#[test]
fn test_sleeping_body_wakes_when_hit() {
    let mut world = DynamicsWorld::new(WorldConfig::default().with_deactivation_time(0.2)).unwrap();
    add_ground(&mut world);
    let resting = add_sphere(&mut world, 0.5, Vec3::new(0.0, 0.5, 0.0));
    run(&mut world, 120);
    assert_eq!(world.object(resting).unwrap().activation_state(), ActivationState::IslandSleeping);

    let dropped = add_sphere(&mut world, 0.5, Vec3::new(0.0, 1.6, 0.0));
    world.object_mut(dropped).unwrap().rigid_body_mut().unwrap().linear_velocity = Vec3::new(0.0, -3.0, 0.0);
    run(&mut world, 10);
    assert!(world.object(resting).unwrap().is_active());
}
