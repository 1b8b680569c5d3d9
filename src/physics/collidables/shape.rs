use glam::Vec3;
use std::sync::Arc;

use super::{
    BoxShape, Capsule, CompoundShape, ConvexHull, Sphere, StaticPlane,
    TriangleMesh, TriangleShape,
};
use crate::error::{PhysicsError, Result};
use crate::utilities::bounding_box::BoundingBox;
use crate::utilities::transform::Transform;

/// Margin given to polyhedral shapes unless overridden.
pub const DEFAULT_COLLISION_MARGIN: f32 = 0.04;

/// Ordinal tag of a shape variant. Used to key the collision algorithm table.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ShapeType {
    Box = 0,
    Triangle = 1,
    ConvexHull = 2,
    Sphere = 3,
    Capsule = 4,
    TriangleMesh = 5,
    StaticPlane = 6,
    Compound = 7,
}

impl ShapeType {
    /// Number of shape types; the side length of the algorithm table.
    pub const COUNT: usize = 8;

    pub const ALL: [ShapeType; Self::COUNT] = [
        ShapeType::Box,
        ShapeType::Triangle,
        ShapeType::ConvexHull,
        ShapeType::Sphere,
        ShapeType::Capsule,
        ShapeType::TriangleMesh,
        ShapeType::StaticPlane,
        ShapeType::Compound,
    ];

    #[inline(always)]
    pub fn ordinal(self) -> usize {
        self as usize
    }

    #[inline]
    pub fn is_convex(self) -> bool {
        matches!(
            self,
            ShapeType::Box
                | ShapeType::Triangle
                | ShapeType::ConvexHull
                | ShapeType::Sphere
                | ShapeType::Capsule
        )
    }

    #[inline]
    pub fn is_concave(self) -> bool {
        matches!(self, ShapeType::TriangleMesh)
    }

    #[inline]
    pub fn is_compound(self) -> bool {
        matches!(self, ShapeType::Compound)
    }

    #[inline]
    pub fn is_plane(self) -> bool {
        matches!(self, ShapeType::StaticPlane)
    }
}

/// Support mapping of a convex shape, the only query the convex geometry solvers need.
///
/// The core of the shape is what `local_support_without_margin` describes; the margin
/// rounds it outward. Solvers work on the core and add margins back analytically.
pub trait ConvexShape {
    /// Furthest point of the core shape along `direction`, in local space.
    fn local_support_without_margin(&self, direction: Vec3) -> Vec3;

    fn margin(&self) -> f32;

    /// Furthest point of the full (margin included) shape along `direction`.
    #[inline]
    fn local_support_with_margin(&self, direction: Vec3) -> Vec3 {
        let mut support = self.local_support_without_margin(direction);
        let margin = self.margin();
        if margin != 0.0 {
            let dir = if direction.length_squared() < f32::EPSILON * f32::EPSILON {
                Vec3::NEG_ONE
            } else {
                direction
            };
            support += dir.normalize() * margin;
        }
        support
    }

    /// Exact world bounds via support queries along the world axes.
    fn convex_aabb(&self, transform: &Transform) -> BoundingBox {
        let mut aabb = BoundingBox::empty();
        let inv = transform.basis.transpose();
        for axis in [Vec3::X, Vec3::Y, Vec3::Z] {
            let hi = transform.transform_point(self.local_support_with_margin(inv * axis));
            let lo = transform.transform_point(self.local_support_with_margin(inv * -axis));
            aabb.merge_point(hi);
            aabb.merge_point(lo);
        }
        aabb
    }
}

/// Every geometry the collision pipeline understands.
#[derive(Debug, Clone)]
pub enum CollisionShape {
    Sphere(Sphere),
    Box(BoxShape),
    Capsule(Capsule),
    ConvexHull(ConvexHull),
    Triangle(TriangleShape),
    TriangleMesh(TriangleMesh),
    StaticPlane(StaticPlane),
    Compound(CompoundShape),
}

impl CollisionShape {
    pub fn sphere(radius: f32) -> Result<Self> {
        if !(radius > 0.0) || !radius.is_finite() {
            return Err(PhysicsError::InvalidShape(format!(
                "sphere radius must be positive, got {radius}"
            )));
        }
        Ok(Self::Sphere(Sphere::new(radius)))
    }

    /// Box with the given half extents. The collision margin is carved out of the extents.
    pub fn cuboid(half_extents: Vec3) -> Result<Self> {
        if half_extents.min_element() <= 0.0 || !half_extents.is_finite() {
            return Err(PhysicsError::InvalidShape(format!(
                "box half extents must be positive, got {half_extents}"
            )));
        }
        Ok(Self::Box(BoxShape::new(half_extents)))
    }

    /// Capsule aligned with the local Y axis.
    pub fn capsule(radius: f32, height: f32) -> Result<Self> {
        if !(radius > 0.0) || !(height >= 0.0) {
            return Err(PhysicsError::InvalidShape(format!(
                "capsule needs positive radius and non-negative height, got {radius}, {height}"
            )));
        }
        Ok(Self::Capsule(Capsule::new(radius, height)))
    }

    pub fn convex_hull(points: Vec<Vec3>) -> Result<Self> {
        if points.is_empty() {
            return Err(PhysicsError::InvalidShape(
                "convex hull needs at least one point".to_string(),
            ));
        }
        Ok(Self::ConvexHull(ConvexHull::new(points)))
    }

    pub fn triangle_mesh(vertices: Vec<Vec3>, indices: Vec<[u32; 3]>) -> Result<Self> {
        Ok(Self::TriangleMesh(TriangleMesh::new(vertices, indices)?))
    }

    /// Infinite plane `normal · x = constant`.
    pub fn static_plane(normal: Vec3, constant: f32) -> Result<Self> {
        if normal.length_squared() < f32::EPSILON {
            return Err(PhysicsError::InvalidShape(
                "plane normal must be non-zero".to_string(),
            ));
        }
        Ok(Self::StaticPlane(StaticPlane::new(normal.normalize(), constant)))
    }

    pub fn compound(children: Vec<(Transform, Arc<CollisionShape>)>) -> Result<Self> {
        let mut compound = CompoundShape::new();
        for (transform, shape) in children {
            compound.add_child_shape(transform, shape)?;
        }
        Ok(Self::Compound(compound))
    }

    #[inline]
    pub fn shape_type(&self) -> ShapeType {
        match self {
            Self::Sphere(_) => ShapeType::Sphere,
            Self::Box(_) => ShapeType::Box,
            Self::Capsule(_) => ShapeType::Capsule,
            Self::ConvexHull(_) => ShapeType::ConvexHull,
            Self::Triangle(_) => ShapeType::Triangle,
            Self::TriangleMesh(_) => ShapeType::TriangleMesh,
            Self::StaticPlane(_) => ShapeType::StaticPlane,
            Self::Compound(_) => ShapeType::Compound,
        }
    }

    #[inline]
    pub fn is_convex(&self) -> bool {
        self.shape_type().is_convex()
    }

    #[inline]
    pub fn is_concave(&self) -> bool {
        self.shape_type().is_concave()
    }

    #[inline]
    pub fn is_compound(&self) -> bool {
        self.shape_type().is_compound()
    }

    #[inline]
    pub fn is_plane(&self) -> bool {
        self.shape_type().is_plane()
    }

    /// Support mapping if this is a convex variant.
    pub fn as_convex(&self) -> Option<&dyn ConvexShape> {
        match self {
            Self::Sphere(s) => Some(s),
            Self::Box(s) => Some(s),
            Self::Capsule(s) => Some(s),
            Self::ConvexHull(s) => Some(s),
            Self::Triangle(s) => Some(s),
            _ => None,
        }
    }

    pub fn margin(&self) -> f32 {
        match self {
            Self::Sphere(s) => s.margin(),
            Self::Box(s) => s.margin(),
            Self::Capsule(s) => s.margin(),
            Self::ConvexHull(s) => s.margin(),
            Self::Triangle(s) => s.margin(),
            Self::TriangleMesh(s) => s.margin(),
            Self::StaticPlane(_) => 0.0,
            Self::Compound(s) => s.margin(),
        }
    }

    /// World-space bounds including the collision margin.
    pub fn aabb(&self, transform: &Transform) -> BoundingBox {
        match self {
            Self::Sphere(s) => {
                let center = transform.origin;
                let r = Vec3::splat(s.radius);
                BoundingBox::new(center - r, center + r)
            }
            Self::Box(s) => {
                BoundingBox::transform_local_box(s.half_extents_with_margin(), Vec3::ZERO, transform, 0.0)
            }
            Self::Capsule(s) => s.convex_aabb(transform),
            Self::ConvexHull(s) => s.convex_aabb(transform),
            Self::Triangle(s) => {
                let mut aabb = BoundingBox::empty();
                for v in &s.vertices {
                    aabb.merge_point(transform.transform_point(*v));
                }
                aabb.expand(s.margin());
                aabb
            }
            Self::TriangleMesh(s) => {
                let local = s.local_aabb();
                let half = (local.max - local.min) * 0.5;
                let center = (local.max + local.min) * 0.5;
                BoundingBox::transform_local_box(half, center, transform, s.margin())
            }
            Self::StaticPlane(s) => s.aabb(transform),
            Self::Compound(s) => s.aabb(transform),
        }
    }

    /// Diagonal of the principal inertia tensor for a body of the given mass.
    ///
    /// Concave and planar shapes only make sense on static bodies and report zero.
    pub fn calculate_local_inertia(&self, mass: f32) -> Vec3 {
        match self {
            Self::Sphere(s) => Vec3::splat(0.4 * mass * s.radius * s.radius),
            Self::Box(s) => box_inertia(s.half_extents_with_margin(), mass),
            Self::Capsule(s) => box_inertia(
                Vec3::new(s.radius, s.radius + s.half_height, s.radius),
                mass,
            ),
            Self::ConvexHull(s) => {
                let aabb = s.convex_aabb(&Transform::IDENTITY);
                box_inertia((aabb.max - aabb.min) * 0.5, mass)
            }
            Self::Compound(s) => {
                let aabb = s.aabb(&Transform::IDENTITY);
                box_inertia((aabb.max - aabb.min) * 0.5, mass)
            }
            Self::Triangle(_) | Self::TriangleMesh(_) | Self::StaticPlane(_) => Vec3::ZERO,
        }
    }

    /// Bounding sphere radius around the local origin, used for swept-sphere estimates.
    pub fn bounding_radius(&self) -> f32 {
        let aabb = self.aabb(&Transform::IDENTITY);
        aabb.min.abs().max(aabb.max.abs()).length()
    }
}

/// Box inertia from half extents.
#[inline]
fn box_inertia(half_extents: Vec3, mass: f32) -> Vec3 {
    let l = half_extents * 2.0;
    let l2 = l * l;
    Vec3::new(l2.y + l2.z, l2.x + l2.z, l2.x + l2.y) * (mass / 12.0)
}
