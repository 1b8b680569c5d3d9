//! Rigid-body dynamics on top of the collision pipeline.

pub mod collidables;
pub mod collision_detection;
pub mod collision_object;
pub mod constraints;
pub mod diagnostics;
pub mod handles;
pub mod island_manager;
pub mod rigid_body;
pub mod simulation;
pub mod solver;
pub mod union_find;
pub mod world_config;

pub use collision_object::{ActivationState, CollisionFilterGroups, CollisionFlags, CollisionObject};
pub use handles::{ConstraintHandle, ManifoldHandle, ObjectHandle, ProxyHandle};
pub use island_manager::{Island, SimulationIslandManager};
pub use rigid_body::{RigidBody, RigidBodyDescription};
pub use simulation::DynamicsWorld;
pub use solver::SequentialImpulseConstraintSolver;
pub use union_find::UnionFind;
pub use world_config::WorldConfig;
