use glam::Vec3;

use super::collision_world::CollisionWorld;
use super::convex::{GjkConvexCast, VoronoiSimplexSolver};
use crate::physics::collidables::{CollisionShape, ConvexShape, Sphere, TriangleShape};
use crate::physics::collision_object::{CollisionFilterGroups, CollisionObject};
use crate::physics::handles::ObjectHandle;
use crate::utilities::bounding_box::BoundingBox;
use crate::utilities::transform::Transform;

/// Identifies the triangle of a mesh that was hit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LocalShapeInfo {
    pub part_id: i32,
    pub triangle_index: i32,
}

/// One ray hit. The normal is in world space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LocalRayResult {
    pub collision_object: ObjectHandle,
    pub local_shape_info: Option<LocalShapeInfo>,
    pub hit_normal_world: Vec3,
    pub hit_fraction: f32,
}

/// Receives the hits of [`CollisionWorld::ray_test`].
pub trait RayResultCallback {
    /// Hits at or beyond this fraction are not reported.
    fn closest_hit_fraction(&self) -> f32;

    /// Records a hit and returns the new cutoff fraction.
    fn add_single_result(&mut self, result: &LocalRayResult) -> f32;

    fn collision_filter_group(&self) -> CollisionFilterGroups {
        CollisionFilterGroups::DEFAULT
    }

    fn collision_filter_mask(&self) -> CollisionFilterGroups {
        CollisionFilterGroups::ALL
    }

    fn needs_collision(&self, object: &CollisionObject) -> bool {
        object.filter_group.intersects(self.collision_filter_mask())
            && self.collision_filter_group().intersects(object.filter_mask)
    }

    fn has_hit(&self) -> bool {
        self.closest_hit_fraction() < 1.0
    }
}

/// Keeps only the nearest ray hit.
#[derive(Debug, Clone, Copy)]
pub struct ClosestRayResultCallback {
    pub ray_from_world: Vec3,
    pub ray_to_world: Vec3,
    pub closest_hit_fraction: f32,
    pub collision_object: Option<ObjectHandle>,
    pub hit_normal_world: Vec3,
    pub hit_point_world: Vec3,
    pub collision_filter_group: CollisionFilterGroups,
    pub collision_filter_mask: CollisionFilterGroups,
}

impl ClosestRayResultCallback {
    pub fn new(ray_from_world: Vec3, ray_to_world: Vec3) -> Self {
        Self {
            ray_from_world,
            ray_to_world,
            closest_hit_fraction: 1.0,
            collision_object: None,
            hit_normal_world: Vec3::ZERO,
            hit_point_world: Vec3::ZERO,
            collision_filter_group: CollisionFilterGroups::DEFAULT,
            collision_filter_mask: CollisionFilterGroups::ALL,
        }
    }
}

impl RayResultCallback for ClosestRayResultCallback {
    #[inline]
    fn closest_hit_fraction(&self) -> f32 {
        self.closest_hit_fraction
    }

    fn add_single_result(&mut self, result: &LocalRayResult) -> f32 {
        debug_assert!(result.hit_fraction <= self.closest_hit_fraction);
        self.closest_hit_fraction = result.hit_fraction;
        self.collision_object = Some(result.collision_object);
        self.hit_normal_world = result.hit_normal_world;
        self.hit_point_world = self.ray_from_world.lerp(self.ray_to_world, result.hit_fraction);
        result.hit_fraction
    }

    fn collision_filter_group(&self) -> CollisionFilterGroups {
        self.collision_filter_group
    }

    fn collision_filter_mask(&self) -> CollisionFilterGroups {
        self.collision_filter_mask
    }
}

/// One hit of a convex sweep, in world space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LocalConvexResult {
    pub hit_collision_object: ObjectHandle,
    pub local_shape_info: Option<LocalShapeInfo>,
    pub hit_normal_world: Vec3,
    pub hit_point_world: Vec3,
    pub hit_fraction: f32,
}

/// Receives the hits of [`CollisionWorld::convex_sweep_test`].
pub trait ConvexResultCallback {
    fn closest_hit_fraction(&self) -> f32;

    fn add_single_result(&mut self, result: &LocalConvexResult) -> f32;

    fn collision_filter_group(&self) -> CollisionFilterGroups {
        CollisionFilterGroups::DEFAULT
    }

    fn collision_filter_mask(&self) -> CollisionFilterGroups {
        CollisionFilterGroups::ALL
    }

    fn needs_collision(&self, object: &CollisionObject) -> bool {
        object.filter_group.intersects(self.collision_filter_mask())
            && self.collision_filter_group().intersects(object.filter_mask)
    }

    fn has_hit(&self) -> bool {
        self.closest_hit_fraction() < 1.0
    }
}

/// Keeps only the earliest sweep hit.
#[derive(Debug, Clone, Copy)]
pub struct ClosestConvexResultCallback {
    pub convex_from_world: Vec3,
    pub convex_to_world: Vec3,
    pub closest_hit_fraction: f32,
    pub hit_collision_object: Option<ObjectHandle>,
    pub hit_normal_world: Vec3,
    pub hit_point_world: Vec3,
    pub collision_filter_group: CollisionFilterGroups,
    pub collision_filter_mask: CollisionFilterGroups,
}

impl ClosestConvexResultCallback {
    pub fn new(convex_from_world: Vec3, convex_to_world: Vec3) -> Self {
        Self {
            convex_from_world,
            convex_to_world,
            closest_hit_fraction: 1.0,
            hit_collision_object: None,
            hit_normal_world: Vec3::ZERO,
            hit_point_world: Vec3::ZERO,
            collision_filter_group: CollisionFilterGroups::DEFAULT,
            collision_filter_mask: CollisionFilterGroups::ALL,
        }
    }
}

impl ConvexResultCallback for ClosestConvexResultCallback {
    #[inline]
    fn closest_hit_fraction(&self) -> f32 {
        self.closest_hit_fraction
    }

    fn add_single_result(&mut self, result: &LocalConvexResult) -> f32 {
        debug_assert!(result.hit_fraction <= self.closest_hit_fraction);
        self.closest_hit_fraction = result.hit_fraction;
        self.hit_collision_object = Some(result.hit_collision_object);
        self.hit_normal_world = result.hit_normal_world;
        self.hit_point_world = result.hit_point_world;
        result.hit_fraction
    }

    fn collision_filter_group(&self) -> CollisionFilterGroups {
        self.collision_filter_group
    }

    fn collision_filter_mask(&self) -> CollisionFilterGroups {
        self.collision_filter_mask
    }
}

/// Normals shorter than this are considered degenerate and the hit is dropped.
const MIN_NORMAL_LENGTH_SQUARED: f32 = 1e-4;

/// Tests a segment against one shape placed at `transform`, reporting hits on `handle`.
pub fn ray_test_single(
    from: Vec3,
    to: Vec3,
    handle: ObjectHandle,
    shape: &CollisionShape,
    transform: &Transform,
    callback: &mut dyn RayResultCallback,
) {
    let report = |callback: &mut dyn RayResultCallback, fraction: f32, normal: Vec3, info: Option<LocalShapeInfo>| {
        if fraction < callback.closest_hit_fraction() && normal.length_squared() > MIN_NORMAL_LENGTH_SQUARED {
            callback.add_single_result(&LocalRayResult {
                collision_object: handle,
                local_shape_info: info,
                hit_normal_world: normal.normalize(),
                hit_fraction: fraction,
            });
        }
    };

    match shape {
        CollisionShape::Sphere(sphere) => {
            if let Some((fraction, normal)) = sphere.ray_test(transform, from, to) {
                report(callback, fraction, normal, None);
            }
        }
        CollisionShape::StaticPlane(plane) => {
            if let Some((fraction, normal)) = plane.ray_test(transform, from, to) {
                report(callback, fraction, normal, None);
            }
        }
        CollisionShape::TriangleMesh(mesh) => {
            let from_local = transform.inv_xform(from);
            let to_local = transform.inv_xform(to);
            mesh.process_all_triangles(
                |vertices, part_id, triangle_index| {
                    let [a, b, c] = *vertices;
                    if let Some((fraction, normal)) = TriangleShape::new(a, b, c).ray_test(from_local, to_local) {
                        let info = LocalShapeInfo { part_id, triangle_index };
                        report(&mut *callback, fraction, transform.basis * normal, Some(info));
                    }
                },
                from_local.min(to_local),
                from_local.max(to_local),
            );
        }
        CollisionShape::Compound(compound) => {
            for child in compound.children() {
                let child_transform = *transform * child.transform;
                ray_test_single(from, to, handle, &child.shape, &child_transform, &mut *callback);
            }
        }
        _ => {
            let Some(convex) = shape.as_convex() else {
                return;
            };
            let point = Sphere::new(0.0);
            let cast = GjkConvexCast::new(&point, convex);
            let mut simplex = VoronoiSimplexSolver::new();
            if let Some(hit) = cast.calc_time_of_impact(
                &Transform::from_translation(from),
                &Transform::from_translation(to),
                transform,
                transform,
                &mut simplex,
            ) {
                report(callback, hit.fraction, hit.normal, None);
            }
        }
    }
}

/// Sweeps `cast_shape` from `from` to `to` against one shape placed at `transform`.
#[allow(clippy::too_many_arguments)]
pub fn object_query_single(
    cast_shape: &dyn ConvexShape,
    from: &Transform,
    to: &Transform,
    handle: ObjectHandle,
    shape: &CollisionShape,
    transform: &Transform,
    callback: &mut dyn ConvexResultCallback,
    allowed_penetration: f32,
) {
    let report = |callback: &mut dyn ConvexResultCallback, fraction: f32, normal: Vec3, point: Vec3, info: Option<LocalShapeInfo>| {
        if fraction < callback.closest_hit_fraction() && normal.length_squared() > MIN_NORMAL_LENGTH_SQUARED {
            callback.add_single_result(&LocalConvexResult {
                hit_collision_object: handle,
                local_shape_info: info,
                hit_normal_world: normal.normalize(),
                hit_point_world: point,
                hit_fraction: fraction,
            });
        }
    };

    match shape {
        CollisionShape::StaticPlane(plane) => {
            let n = transform.transform_vector(plane.normal);
            let c = plane.constant + transform.origin.dot(n);
            let support = from.transform_point(cast_shape.local_support_with_margin(from.basis.transpose() * -n));
            let motion = to.origin - from.origin;
            let d0 = n.dot(support) - c;
            let approach = n.dot(motion);
            if approach >= 0.0 || d0 + approach > 0.0 || d0 < -allowed_penetration {
                return;
            }
            let fraction = (d0 / -approach).max(0.0);
            let contact = support + motion * fraction;
            report(callback, fraction, n, contact - n * n.dot(contact) + n * c, None);
        }
        CollisionShape::TriangleMesh(mesh) => {
            let inverse = transform.inverse();
            let from_local = inverse * *from;
            let to_local = inverse * *to;
            let cast_aabb = cast_shape.convex_aabb(&Transform::new(from_local.basis, Vec3::ZERO));
            let sweep_min = from_local.origin.min(to_local.origin) + cast_aabb.min;
            let sweep_max = from_local.origin.max(to_local.origin) + cast_aabb.max;
            let mut simplex = VoronoiSimplexSolver::new();
            mesh.process_all_triangles(
                |vertices, part_id, triangle_index| {
                    let [a, b, c] = *vertices;
                    let triangle = TriangleShape::new(a, b, c).with_margin(mesh.margin());
                    let mut cast = GjkConvexCast::new(cast_shape, &triangle);
                    cast.allowed_penetration = allowed_penetration;
                    if let Some(hit) = cast.calc_time_of_impact(
                        &from_local,
                        &to_local,
                        &Transform::IDENTITY,
                        &Transform::IDENTITY,
                        &mut simplex,
                    ) {
                        let info = LocalShapeInfo { part_id, triangle_index };
                        report(
                            &mut *callback,
                            hit.fraction,
                            transform.basis * hit.normal,
                            transform.transform_point(hit.hit_point),
                            Some(info),
                        );
                    }
                },
                sweep_min,
                sweep_max,
            );
        }
        CollisionShape::Compound(compound) => {
            for child in compound.children() {
                let child_transform = *transform * child.transform;
                object_query_single(
                    cast_shape,
                    from,
                    to,
                    handle,
                    &child.shape,
                    &child_transform,
                    &mut *callback,
                    allowed_penetration,
                );
            }
        }
        _ => {
            let Some(convex) = shape.as_convex() else {
                return;
            };
            let mut cast = GjkConvexCast::new(cast_shape, convex);
            cast.allowed_penetration = allowed_penetration;
            let mut simplex = VoronoiSimplexSolver::new();
            if let Some(hit) = cast.calc_time_of_impact(from, to, transform, transform, &mut simplex) {
                report(callback, hit.fraction, hit.normal, hit.hit_point, None);
            }
        }
    }
}

impl CollisionWorld {
    /// Casts a ray through every object whose filters accept the callback and whose
    /// bounds the segment touches.
    pub fn ray_test(&self, from: Vec3, to: Vec3, callback: &mut impl RayResultCallback) {
        for (handle, object) in self.objects() {
            if !callback.needs_collision(object) {
                continue;
            }
            let aabb = object.shape().aabb(&object.world_transform);
            if aabb.ray_overlaps(from, to) {
                ray_test_single(from, to, handle, object.shape(), &object.world_transform, callback);
            }
        }
    }

    /// Sweeps a convex shape between two poses. Rotation along the sweep is ignored.
    pub fn convex_sweep_test(
        &self,
        cast_shape: &dyn ConvexShape,
        from: &Transform,
        to: &Transform,
        callback: &mut impl ConvexResultCallback,
    ) {
        let cast_aabb = cast_shape.convex_aabb(&Transform::new(from.basis, Vec3::ZERO));
        let allowed_penetration = self.dispatch_info().allowed_ccd_penetration;
        for (handle, object) in self.objects() {
            if !callback.needs_collision(object) {
                continue;
            }
            let aabb = object.shape().aabb(&object.world_transform);
            let swept = BoundingBox::new(aabb.min - cast_aabb.max, aabb.max - cast_aabb.min);
            if swept.ray_overlaps(from.origin, to.origin) {
                object_query_single(
                    cast_shape,
                    from,
                    to,
                    handle,
                    object.shape(),
                    &object.world_transform,
                    callback,
                    allowed_penetration,
                );
            }
        }
    }
}
