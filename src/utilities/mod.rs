pub mod bounding_box;
pub mod math_helper;
pub mod memory;
pub mod random;
pub mod transform;

pub use self::bounding_box::BoundingBox;
pub use self::transform::Transform;
