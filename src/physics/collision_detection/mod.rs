//! Collision pipeline: broadphase pairs, algorithm dispatch, persistent manifolds and
//! world-level queries.

pub mod broad_phase;
pub mod collision_task_registry;
pub mod collision_tasks;
pub mod collision_world;
pub mod contact_manifold;
pub mod convex;
pub mod manifold_result;
pub mod narrow_phase;
pub mod narrow_phase_callbacks;
pub mod pair_cache;
pub mod world_queries;

pub use broad_phase::{Broadphase, BroadphaseProxy, SimpleBroadphase};
pub use collision_task_registry::{AlgorithmKind, CollisionTaskRegistry};
pub use collision_tasks::{CollisionAlgorithm, CollisionObjectWrapper};
pub use collision_world::CollisionWorld;
pub use contact_manifold::{ManifoldPoint, PersistentManifold, DEFAULT_CONTACT_BREAKING_THRESHOLD, MANIFOLD_CACHE_SIZE};
pub use manifold_result::{calculate_combined_friction, calculate_combined_restitution, ManifoldResult};
pub use narrow_phase::{CollisionDispatcher, DispatchFunc, DispatcherInfo};
pub use narrow_phase_callbacks::{ContactAddedInfo, ContactCallbacks};
pub use pair_cache::{BroadphasePair, OverlappingPairCache};
pub use world_queries::{
    ClosestConvexResultCallback, ClosestRayResultCallback, ConvexResultCallback, LocalConvexResult, LocalRayResult, LocalShapeInfo,
    RayResultCallback,
};
