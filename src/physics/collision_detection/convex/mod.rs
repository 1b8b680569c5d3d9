//! Convex geometry primitives used by the narrow phase: simplex, closest points,
//! penetration depth and linear casts.

pub mod gjk_convex_cast;
pub mod gjk_pair_detector;
pub mod penetration_depth;
pub mod simplex_solver;

pub use gjk_convex_cast::{CastResult, GjkConvexCast};
pub use gjk_pair_detector::{ClosestPointInput, ClosestPoints, GjkPairDetector};
pub use penetration_depth::MinkowskiPenetrationDepthSolver;
pub use simplex_solver::VoronoiSimplexSolver;
