#![cfg(feature = "serde")]

use glam::Vec3;
use rust_rigid_physics::physics::constraints::{ContactSolverInfo, SolverMode};
use rust_rigid_physics::physics::{RigidBodyDescription, WorldConfig};

#[test]
fn test_world_config_round_trips_through_json() {
    let config = WorldConfig::default()
        .with_gravity(Vec3::new(0.0, -9.81, 0.0))
        .with_random_seed(42)
        .with_solver_info(
            ContactSolverInfo::default()
                .with_num_iterations(20)
                .with_solver_mode(SolverMode::USE_WARMSTARTING),
        );
    let json = serde_json::to_string(&config).unwrap();
    let back: WorldConfig = serde_json::from_str(&json).unwrap();
    assert_eq!(back, config);
}

#[test]
fn test_body_description_round_trips_through_json() {
    let description = RigidBodyDescription::dynamic(2.0, Vec3::ONE)
        .with_damping(0.1, 0.2)
        .with_friction(0.8);
    let json = serde_json::to_value(description).unwrap();
    assert_eq!(json["mass"], 2.0);
    let back: RigidBodyDescription = serde_json::from_value(json).unwrap();
    assert_eq!(back, description);
}
