use std::sync::Arc;

use approx::assert_abs_diff_eq;
use glam::Vec3;
use rust_rigid_physics::physics::collidables::CollisionShape;
use rust_rigid_physics::physics::collision_detection::{
    ClosestConvexResultCallback, ClosestRayResultCallback, CollisionWorld,
};
use rust_rigid_physics::physics::{CollisionFilterGroups, CollisionObject, ObjectHandle};
use rust_rigid_physics::utilities::Transform;

fn world_with_floor_and_ball() -> (CollisionWorld, ObjectHandle, ObjectHandle) {
    let mut world = CollisionWorld::default();
    let floor = world.add_collision_object(
        CollisionObject::new(Arc::new(CollisionShape::static_plane(Vec3::Y, 0.0).unwrap()), Transform::IDENTITY),
        CollisionFilterGroups::STATIC,
        CollisionFilterGroups::ALL,
    );
    let ball = world.add_collision_object(
        CollisionObject::new(
            Arc::new(CollisionShape::sphere(1.0).unwrap()),
            Transform::from_translation(Vec3::new(5.0, 2.0, 0.0)),
        ),
        CollisionFilterGroups::DEFAULT,
        CollisionFilterGroups::ALL,
    );
    (world, floor, ball)
}

#[test]
fn test_ray_hits_floor() {
    let (world, floor, _) = world_with_floor_and_ball();
    let from = Vec3::new(0.0, 10.0, 0.0);
    let to = Vec3::new(0.0, -10.0, 0.0);
    let mut callback = ClosestRayResultCallback::new(from, to);
    world.ray_test(from, to, &mut callback);

    assert_eq!(callback.collision_object, Some(floor));
    assert_abs_diff_eq!(callback.closest_hit_fraction, 0.5, epsilon = 1e-4);
    assert_abs_diff_eq!(callback.hit_normal_world.y, 1.0, epsilon = 1e-4);
}

#[test]
fn test_ray_reports_closest_of_two() {
    let (world, _, ball) = world_with_floor_and_ball();
    let from = Vec3::new(5.0, 10.0, 0.0);
    let to = Vec3::new(5.0, -10.0, 0.0);
    let mut callback = ClosestRayResultCallback::new(from, to);
    world.ray_test(from, to, &mut callback);

    assert_eq!(callback.collision_object, Some(ball));
    // The top of the ball sits at y = 3.
    assert_abs_diff_eq!(callback.hit_point_world.y, 3.0, epsilon = 1e-2);
}

#[test]
fn test_ray_respects_filter_mask() {
    let (world, _, _) = world_with_floor_and_ball();
    let from = Vec3::new(0.0, 10.0, 0.0);
    let to = Vec3::new(0.0, -10.0, 0.0);
    let mut callback = ClosestRayResultCallback::new(from, to);
    callback.collision_filter_mask = CollisionFilterGroups::ALL - CollisionFilterGroups::STATIC;
    world.ray_test(from, to, &mut callback);
    assert_eq!(callback.collision_object, None);
}

#[test]
fn test_sphere_sweep_stops_above_floor() {
    let (world, floor, _) = world_with_floor_and_ball();
    let cast = CollisionShape::sphere(0.5).unwrap();
    let convex = cast.as_convex().unwrap();
    let from = Transform::from_translation(Vec3::new(0.0, 4.5, 0.0));
    let to = Transform::from_translation(Vec3::new(0.0, -4.5, 0.0));
    let mut callback = ClosestConvexResultCallback::new(from.origin, to.origin);
    world.convex_sweep_test(convex, &from, &to, &mut callback);

    assert_eq!(callback.hit_collision_object, Some(floor));
    // The sphere touches the floor when its center reaches y = 0.5.
    assert_abs_diff_eq!(callback.closest_hit_fraction, 4.0 / 9.0, epsilon = 0.02);
}

#[test]
fn test_removed_object_is_not_hit() {
    let (mut world, floor, _) = world_with_floor_and_ball();
    world.remove_collision_object(floor).unwrap();
    assert!(world.remove_collision_object(floor).is_err());

    let from = Vec3::new(0.0, 10.0, 0.0);
    let to = Vec3::new(0.0, -10.0, 0.0);
    let mut callback = ClosestRayResultCallback::new(from, to);
    world.ray_test(from, to, &mut callback);
    assert_eq!(callback.collision_object, None);
}
