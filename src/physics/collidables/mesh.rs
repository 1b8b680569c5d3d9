use glam::Vec3;

use crate::error::{PhysicsError, Result};
use crate::utilities::bounding_box::BoundingBox;

/// Indexed triangle soup. Concave; only collides as a static or kinematic object.
#[derive(Debug, Clone, PartialEq)]
pub struct TriangleMesh {
    vertices: Vec<Vec3>,
    indices: Vec<[u32; 3]>,
    local_aabb: BoundingBox,
    margin: f32,
}

impl TriangleMesh {
    pub fn new(vertices: Vec<Vec3>, indices: Vec<[u32; 3]>) -> Result<Self> {
        for triangle in &indices {
            for &index in triangle {
                if index as usize >= vertices.len() {
                    return Err(PhysicsError::MeshIndexOutOfBounds {
                        index,
                        vertex_count: vertices.len(),
                    });
                }
            }
        }
        if indices.is_empty() {
            return Err(PhysicsError::InvalidShape(
                "triangle mesh has no triangles".to_string(),
            ));
        }
        let mut local_aabb = BoundingBox::empty();
        for &v in &vertices {
            local_aabb.merge_point(v);
        }
        Ok(Self {
            vertices,
            indices,
            local_aabb,
            margin: 0.0,
        })
    }

    #[inline]
    pub fn margin(&self) -> f32 {
        self.margin
    }

    pub fn set_margin(&mut self, margin: f32) {
        self.margin = margin;
    }

    #[inline]
    pub fn local_aabb(&self) -> BoundingBox {
        self.local_aabb
    }

    #[inline]
    pub fn triangle_count(&self) -> usize {
        self.indices.len()
    }

    #[inline]
    pub fn triangle(&self, triangle_index: usize) -> [Vec3; 3] {
        let [a, b, c] = self.indices[triangle_index];
        [
            self.vertices[a as usize],
            self.vertices[b as usize],
            self.vertices[c as usize],
        ]
    }

    /// Invokes `callback(vertices, part_id, triangle_index)` for every triangle whose bounds
    /// overlap `[aabb_min, aabb_max]`. Bounds are in the mesh's local space.
    pub fn process_all_triangles<F>(&self, mut callback: F, aabb_min: Vec3, aabb_max: Vec3)
    where
        F: FnMut(&[Vec3; 3], i32, i32),
    {
        if !BoundingBox::intersects_bounds(
            self.local_aabb.min,
            self.local_aabb.max,
            aabb_min,
            aabb_max,
        ) {
            return;
        }
        for triangle_index in 0..self.indices.len() {
            let triangle = self.triangle(triangle_index);
            let tri_min = triangle[0].min(triangle[1]).min(triangle[2]);
            let tri_max = triangle[0].max(triangle[1]).max(triangle[2]);
            if BoundingBox::intersects_bounds(tri_min, tri_max, aabb_min, aabb_max) {
                callback(&triangle, 0, triangle_index as i32);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quad() -> TriangleMesh {
        TriangleMesh::new(
            vec![
                Vec3::new(-1.0, 0.0, -1.0),
                Vec3::new(1.0, 0.0, -1.0),
                Vec3::new(1.0, 0.0, 1.0),
                Vec3::new(-1.0, 0.0, 1.0),
                Vec3::new(5.0, 0.0, 5.0),
                Vec3::new(6.0, 0.0, 5.0),
                Vec3::new(5.0, 0.0, 6.0),
            ],
            vec![[0, 1, 2], [0, 2, 3], [4, 5, 6]],
        )
        .unwrap()
    }

    #[test]
    fn test_bad_index_rejected() {
        let err = TriangleMesh::new(vec![Vec3::ZERO; 3], vec![[0, 1, 3]]).unwrap_err();
        assert_eq!(
            err,
            PhysicsError::MeshIndexOutOfBounds {
                index: 3,
                vertex_count: 3
            }
        );
    }

    #[test]
    fn test_process_overlapping_triangles_only() {
        let mesh = quad();
        let mut visited = Vec::new();
        mesh.process_all_triangles(
            |_, part, index| visited.push((part, index)),
            Vec3::splat(-0.5),
            Vec3::splat(0.5),
        );
        assert_eq!(visited, vec![(0, 0), (0, 1)]);
    }
}
