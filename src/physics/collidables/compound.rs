use glam::Vec3;
use std::sync::Arc;

use super::shape::CollisionShape;
use crate::error::{PhysicsError, Result};
use crate::utilities::bounding_box::BoundingBox;
use crate::utilities::transform::Transform;

/// Shape and pose of a child within a compound shape.
#[derive(Debug, Clone)]
pub struct CompoundChild {
    /// Pose of the child relative to the compound.
    pub transform: Transform,
    pub shape: Arc<CollisionShape>,
}

/// Rigid collection of child shapes, each with its own local transform.
#[derive(Debug, Clone, Default)]
pub struct CompoundShape {
    children: Vec<CompoundChild>,
    local_aabb: Option<BoundingBox>,
    margin: f32,
}

impl CompoundShape {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a child. Planes cannot be children; nested compounds are allowed.
    pub fn add_child_shape(&mut self, transform: Transform, shape: Arc<CollisionShape>) -> Result<()> {
        if shape.is_plane() {
            return Err(PhysicsError::InvalidShape(
                "static planes cannot be compound children".to_string(),
            ));
        }
        let child_aabb = shape.aabb(&transform);
        self.local_aabb = Some(match self.local_aabb {
            Some(aabb) => BoundingBox::create_merged(&aabb, &child_aabb),
            None => child_aabb,
        });
        self.children.push(CompoundChild { transform, shape });
        Ok(())
    }

    #[inline]
    pub fn children(&self) -> &[CompoundChild] {
        &self.children
    }

    #[inline]
    pub fn num_child_shapes(&self) -> usize {
        self.children.len()
    }

    #[inline]
    pub fn margin(&self) -> f32 {
        self.margin
    }

    pub fn aabb(&self, transform: &Transform) -> BoundingBox {
        match self.local_aabb {
            Some(local) => {
                let half = (local.max - local.min) * 0.5;
                let center = (local.max + local.min) * 0.5;
                BoundingBox::transform_local_box(half, center, transform, self.margin)
            }
            None => BoundingBox::new(transform.origin, transform.origin),
        }
    }

    /// Center of the children's bounds in local space.
    pub fn local_center(&self) -> Vec3 {
        self.local_aabb
            .map(|aabb| (aabb.min + aabb.max) * 0.5)
            .unwrap_or(Vec3::ZERO)
    }
}
