pub mod shape;

// Convex shape primitives
pub mod box_shape;
pub mod capsule;
pub mod convex_hull;
pub mod sphere;
pub mod triangle;

// Non-convex shapes
pub mod compound;
pub mod mesh;
pub mod static_plane;

pub use box_shape::BoxShape;
pub use capsule::Capsule;
pub use compound::{CompoundChild, CompoundShape};
pub use convex_hull::ConvexHull;
pub use mesh::TriangleMesh;
pub use shape::{CollisionShape, ConvexShape, ShapeType, DEFAULT_COLLISION_MARGIN};
pub use sphere::Sphere;
pub use static_plane::StaticPlane;
pub use triangle::TriangleShape;
