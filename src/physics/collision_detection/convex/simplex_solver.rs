use glam::Vec3;

/// Squared distance under which two simplex vertices count as the same point.
const EQUAL_VERTEX_THRESHOLD: f32 = 1e-4;

#[derive(Debug, Clone, Copy, Default)]
struct SubSimplexClosestResult {
    closest_point_on_simplex: Vec3,
    used_vertices: [bool; 4],
    barycentric_coords: [f32; 4],
    degenerate: bool,
}

impl SubSimplexClosestResult {
    #[inline]
    fn reset(&mut self) {
        self.degenerate = false;
        self.barycentric_coords = [0.0; 4];
        self.used_vertices = [false; 4];
    }

    #[inline]
    fn is_valid(&self) -> bool {
        self.barycentric_coords.iter().all(|&c| c >= 0.0)
    }

    #[inline]
    fn set_barycentric_coordinates(&mut self, a: f32, b: f32, c: f32, d: f32) {
        self.barycentric_coords = [a, b, c, d];
    }
}

/// Incremental simplex for GJK. Finds the point of the simplex nearest the origin using
/// Voronoi region tests and drops vertices that do not support it.
///
/// Tracks the witness points on both shapes alongside each Minkowski difference vertex.
#[derive(Debug, Clone, Default)]
pub struct VoronoiSimplexSolver {
    num_vertices: usize,
    simplex_vectors_w: [Vec3; 4],
    simplex_points_p: [Vec3; 4],
    simplex_points_q: [Vec3; 4],
    cached_p1: Vec3,
    cached_p2: Vec3,
    cached_v: Vec3,
    last_w: Vec3,
    cached_valid_closest: bool,
    needs_update: bool,
    cached_bc: SubSimplexClosestResult,
}

impl VoronoiSimplexSolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reset(&mut self) {
        self.cached_valid_closest = false;
        self.num_vertices = 0;
        self.needs_update = true;
        self.last_w = Vec3::splat(1e30);
        self.cached_bc.reset();
    }

    #[inline]
    pub fn num_vertices(&self) -> usize {
        self.num_vertices
    }

    #[inline]
    pub fn fully_simplex(&self) -> bool {
        self.num_vertices == 4
    }

    #[inline]
    pub fn empty_simplex(&self) -> bool {
        self.num_vertices == 0
    }

    pub fn add_vertex(&mut self, w: Vec3, p: Vec3, q: Vec3) {
        debug_assert!(self.num_vertices < 4, "simplex overflow");
        self.last_w = w;
        self.needs_update = true;
        self.simplex_vectors_w[self.num_vertices] = w;
        self.simplex_points_p[self.num_vertices] = p;
        self.simplex_points_q[self.num_vertices] = q;
        self.num_vertices += 1;
    }

    /// Returns the point of the simplex closest to the origin, or `None` if it cannot be
    /// determined (degenerate simplex or the origin is enclosed).
    pub fn closest(&mut self) -> Option<Vec3> {
        if self.update_closest_vectors_and_points() {
            Some(self.cached_v)
        } else {
            None
        }
    }

    /// Last successfully computed closest vector.
    #[inline]
    pub fn backup_closest(&self) -> Vec3 {
        self.cached_v
    }

    pub fn max_vertex(&self) -> f32 {
        self.simplex_vectors_w[..self.num_vertices]
            .iter()
            .map(|w| w.length_squared())
            .fold(0.0, f32::max)
    }

    pub fn in_simplex(&self, w: Vec3) -> bool {
        self.simplex_vectors_w[..self.num_vertices]
            .iter()
            .any(|v| v.distance_squared(w) <= EQUAL_VERTEX_THRESHOLD)
            || w == self.last_w
    }

    /// Witness points on shape A and shape B for the current closest vector.
    pub fn compute_points(&mut self) -> (Vec3, Vec3) {
        self.update_closest_vectors_and_points();
        (self.cached_p1, self.cached_p2)
    }

    fn remove_vertex(&mut self, index: usize) {
        debug_assert!(self.num_vertices > 0);
        self.num_vertices -= 1;
        self.simplex_vectors_w[index] = self.simplex_vectors_w[self.num_vertices];
        self.simplex_points_p[index] = self.simplex_points_p[self.num_vertices];
        self.simplex_points_q[index] = self.simplex_points_q[self.num_vertices];
    }

    fn reduce_vertices(&mut self, used: [bool; 4]) {
        if self.num_vertices >= 4 && !used[3] {
            self.remove_vertex(3);
        }
        if self.num_vertices >= 3 && !used[2] {
            self.remove_vertex(2);
        }
        if self.num_vertices >= 2 && !used[1] {
            self.remove_vertex(1);
        }
        if self.num_vertices >= 1 && !used[0] {
            self.remove_vertex(0);
        }
    }

    fn update_closest_vectors_and_points(&mut self) -> bool {
        if !self.needs_update {
            return self.cached_valid_closest;
        }
        self.cached_bc.reset();
        self.needs_update = false;

        match self.num_vertices {
            0 => self.cached_valid_closest = false,
            1 => {
                self.cached_p1 = self.simplex_points_p[0];
                self.cached_p2 = self.simplex_points_q[0];
                self.cached_v = self.cached_p1 - self.cached_p2;
                self.cached_bc.set_barycentric_coordinates(1.0, 0.0, 0.0, 0.0);
                self.cached_valid_closest = self.cached_bc.is_valid();
            }
            2 => {
                let from = self.simplex_vectors_w[0];
                let to = self.simplex_vectors_w[1];
                let v = to - from;
                let mut t = v.dot(-from);
                if t > 0.0 {
                    let dot_vv = v.length_squared();
                    if t < dot_vv {
                        t /= dot_vv;
                        self.cached_bc.used_vertices[0] = true;
                        self.cached_bc.used_vertices[1] = true;
                    } else {
                        t = 1.0;
                        self.cached_bc.used_vertices[1] = true;
                    }
                } else {
                    t = 0.0;
                    self.cached_bc.used_vertices[0] = true;
                }
                self.cached_bc.set_barycentric_coordinates(1.0 - t, t, 0.0, 0.0);
                self.cached_bc.closest_point_on_simplex = from + v * t;

                self.cached_p1 = self.simplex_points_p[0]
                    + (self.simplex_points_p[1] - self.simplex_points_p[0]) * t;
                self.cached_p2 = self.simplex_points_q[0]
                    + (self.simplex_points_q[1] - self.simplex_points_q[0]) * t;
                self.cached_v = self.cached_p1 - self.cached_p2;

                let used = self.cached_bc.used_vertices;
                self.reduce_vertices(used);
                self.cached_valid_closest = self.cached_bc.is_valid();
            }
            3 => {
                let [a, b, c, _] = self.simplex_vectors_w;
                closest_pt_point_triangle(Vec3::ZERO, a, b, c, &mut self.cached_bc);
                let bc = self.cached_bc.barycentric_coords;
                self.cached_p1 = self.simplex_points_p[0] * bc[0]
                    + self.simplex_points_p[1] * bc[1]
                    + self.simplex_points_p[2] * bc[2];
                self.cached_p2 = self.simplex_points_q[0] * bc[0]
                    + self.simplex_points_q[1] * bc[1]
                    + self.simplex_points_q[2] * bc[2];
                self.cached_v = self.cached_p1 - self.cached_p2;

                let used = self.cached_bc.used_vertices;
                self.reduce_vertices(used);
                self.cached_valid_closest = self.cached_bc.is_valid();
            }
            4 => {
                let [a, b, c, d] = self.simplex_vectors_w;
                let has_separation =
                    closest_pt_point_tetrahedron(Vec3::ZERO, a, b, c, d, &mut self.cached_bc);
                if has_separation {
                    let bc = self.cached_bc.barycentric_coords;
                    self.cached_p1 = self.simplex_points_p[0] * bc[0]
                        + self.simplex_points_p[1] * bc[1]
                        + self.simplex_points_p[2] * bc[2]
                        + self.simplex_points_p[3] * bc[3];
                    self.cached_p2 = self.simplex_points_q[0] * bc[0]
                        + self.simplex_points_q[1] * bc[1]
                        + self.simplex_points_q[2] * bc[2]
                        + self.simplex_points_q[3] * bc[3];
                    self.cached_v = self.cached_p1 - self.cached_p2;
                    let used = self.cached_bc.used_vertices;
                    self.reduce_vertices(used);
                    self.cached_valid_closest = self.cached_bc.is_valid();
                } else if self.cached_bc.degenerate {
                    self.cached_valid_closest = false;
                } else {
                    // The origin is inside the tetrahedron: zero separation.
                    self.cached_valid_closest = true;
                    self.cached_v = Vec3::ZERO;
                }
            }
            _ => self.cached_valid_closest = false,
        }
        self.cached_valid_closest
    }
}

/// Closest point on triangle abc to p, recording barycentric weights and supporting vertices.
fn closest_pt_point_triangle(
    p: Vec3,
    a: Vec3,
    b: Vec3,
    c: Vec3,
    result: &mut SubSimplexClosestResult,
) {
    result.used_vertices = [false; 4];

    // Check if P in vertex region outside A
    let ab = b - a;
    let ac = c - a;
    let ap = p - a;
    let d1 = ab.dot(ap);
    let d2 = ac.dot(ap);
    if d1 <= 0.0 && d2 <= 0.0 {
        result.closest_point_on_simplex = a;
        result.used_vertices[0] = true;
        result.set_barycentric_coordinates(1.0, 0.0, 0.0, 0.0);
        return;
    }

    // Check if P in vertex region outside B
    let bp = p - b;
    let d3 = ab.dot(bp);
    let d4 = ac.dot(bp);
    if d3 >= 0.0 && d4 <= d3 {
        result.closest_point_on_simplex = b;
        result.used_vertices[1] = true;
        result.set_barycentric_coordinates(0.0, 1.0, 0.0, 0.0);
        return;
    }

    // Check if P in edge region of AB
    let vc = d1 * d4 - d3 * d2;
    if vc <= 0.0 && d1 >= 0.0 && d3 <= 0.0 {
        let v = d1 / (d1 - d3);
        result.closest_point_on_simplex = a + ab * v;
        result.used_vertices[0] = true;
        result.used_vertices[1] = true;
        result.set_barycentric_coordinates(1.0 - v, v, 0.0, 0.0);
        return;
    }

    // Check if P in vertex region outside C
    let cp = p - c;
    let d5 = ab.dot(cp);
    let d6 = ac.dot(cp);
    if d6 >= 0.0 && d5 <= d6 {
        result.closest_point_on_simplex = c;
        result.used_vertices[2] = true;
        result.set_barycentric_coordinates(0.0, 0.0, 1.0, 0.0);
        return;
    }

    // Check if P in edge region of AC
    let vb = d5 * d2 - d1 * d6;
    if vb <= 0.0 && d2 >= 0.0 && d6 <= 0.0 {
        let w = d2 / (d2 - d6);
        result.closest_point_on_simplex = a + ac * w;
        result.used_vertices[0] = true;
        result.used_vertices[2] = true;
        result.set_barycentric_coordinates(1.0 - w, 0.0, w, 0.0);
        return;
    }

    // Check if P in edge region of BC
    let va = d3 * d6 - d5 * d4;
    if va <= 0.0 && (d4 - d3) >= 0.0 && (d5 - d6) >= 0.0 {
        let w = (d4 - d3) / ((d4 - d3) + (d5 - d6));
        result.closest_point_on_simplex = b + (c - b) * w;
        result.used_vertices[1] = true;
        result.used_vertices[2] = true;
        result.set_barycentric_coordinates(0.0, 1.0 - w, w, 0.0);
        return;
    }

    // P inside face region.
    let denom = 1.0 / (va + vb + vc);
    let v = vb * denom;
    let w = vc * denom;
    result.closest_point_on_simplex = a + ab * v + ac * w;
    result.used_vertices[0] = true;
    result.used_vertices[1] = true;
    result.used_vertices[2] = true;
    result.set_barycentric_coordinates(1.0 - v - w, v, w, 0.0);
}

/// 1 if p is on the opposite side of plane abc from d, 0 if on the same side, -1 if the
/// tetrahedron is degenerate.
fn point_outside_of_plane(p: Vec3, a: Vec3, b: Vec3, c: Vec3, d: Vec3) -> i32 {
    let normal = (b - a).cross(c - a);
    let sign_p = (p - a).dot(normal);
    let sign_d = (d - a).dot(normal);
    if sign_d * sign_d < 1e-4 * 1e-4 {
        return -1;
    }
    i32::from(sign_p * sign_d < 0.0)
}

fn closest_pt_point_tetrahedron(
    p: Vec3,
    a: Vec3,
    b: Vec3,
    c: Vec3,
    d: Vec3,
    final_result: &mut SubSimplexClosestResult,
) -> bool {
    let mut temp = SubSimplexClosestResult::default();

    final_result.closest_point_on_simplex = p;
    final_result.used_vertices = [true; 4];

    let outside_abc = point_outside_of_plane(p, a, b, c, d);
    let outside_acd = point_outside_of_plane(p, a, c, d, b);
    let outside_adb = point_outside_of_plane(p, a, d, b, c);
    let outside_bdc = point_outside_of_plane(p, b, d, c, a);

    if outside_abc < 0 || outside_acd < 0 || outside_adb < 0 || outside_bdc < 0 {
        final_result.degenerate = true;
        return false;
    }
    if outside_abc == 0 && outside_acd == 0 && outside_adb == 0 && outside_bdc == 0 {
        return false;
    }

    let mut best_sq_dist = f32::MAX;

    if outside_abc != 0 {
        closest_pt_point_triangle(p, a, b, c, &mut temp);
        let q = temp.closest_point_on_simplex;
        let sq_dist = (q - p).length_squared();
        if sq_dist < best_sq_dist {
            best_sq_dist = sq_dist;
            final_result.closest_point_on_simplex = q;
            final_result.used_vertices = [
                temp.used_vertices[0],
                temp.used_vertices[1],
                temp.used_vertices[2],
                false,
            ];
            let bc = temp.barycentric_coords;
            final_result.set_barycentric_coordinates(bc[0], bc[1], bc[2], 0.0);
        }
    }

    if outside_acd != 0 {
        closest_pt_point_triangle(p, a, c, d, &mut temp);
        let q = temp.closest_point_on_simplex;
        let sq_dist = (q - p).length_squared();
        if sq_dist < best_sq_dist {
            best_sq_dist = sq_dist;
            final_result.closest_point_on_simplex = q;
            final_result.used_vertices = [
                temp.used_vertices[0],
                false,
                temp.used_vertices[1],
                temp.used_vertices[2],
            ];
            let bc = temp.barycentric_coords;
            final_result.set_barycentric_coordinates(bc[0], 0.0, bc[1], bc[2]);
        }
    }

    if outside_adb != 0 {
        closest_pt_point_triangle(p, a, d, b, &mut temp);
        let q = temp.closest_point_on_simplex;
        let sq_dist = (q - p).length_squared();
        if sq_dist < best_sq_dist {
            best_sq_dist = sq_dist;
            final_result.closest_point_on_simplex = q;
            final_result.used_vertices = [
                temp.used_vertices[0],
                temp.used_vertices[2],
                false,
                temp.used_vertices[1],
            ];
            let bc = temp.barycentric_coords;
            final_result.set_barycentric_coordinates(bc[0], bc[2], 0.0, bc[1]);
        }
    }

    if outside_bdc != 0 {
        closest_pt_point_triangle(p, b, d, c, &mut temp);
        let q = temp.closest_point_on_simplex;
        let sq_dist = (q - p).length_squared();
        if sq_dist < best_sq_dist {
            final_result.closest_point_on_simplex = q;
            final_result.used_vertices = [
                false,
                temp.used_vertices[0],
                temp.used_vertices[2],
                temp.used_vertices[1],
            ];
            let bc = temp.barycentric_coords;
            final_result.set_barycentric_coordinates(0.0, bc[0], bc[2], bc[1]);
        }
    }

    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_segment_closest_point() {
        let mut solver = VoronoiSimplexSolver::new();
        solver.reset();
        let a = Vec3::new(-1.0, 1.0, 0.0);
        let b = Vec3::new(1.0, 1.0, 0.0);
        solver.add_vertex(a, a, Vec3::ZERO);
        solver.add_vertex(b, b, Vec3::ZERO);
        let v = solver.closest().unwrap();
        assert_relative_eq!(v.y, 1.0, epsilon = 1e-6);
        assert_relative_eq!(v.x, 0.0, epsilon = 1e-6);
        assert_eq!(solver.num_vertices(), 2);
    }

    #[test]
    fn test_triangle_reduces_to_vertex() {
        let mut solver = VoronoiSimplexSolver::new();
        solver.reset();
        for w in [
            Vec3::new(1.0, 1.0, 0.0),
            Vec3::new(3.0, 1.0, 0.0),
            Vec3::new(1.0, 3.0, 0.0),
        ] {
            solver.add_vertex(w, w, Vec3::ZERO);
        }
        let v = solver.closest().unwrap();
        assert_relative_eq!(v.x, 1.0, epsilon = 1e-6);
        assert_relative_eq!(v.y, 1.0, epsilon = 1e-6);
        assert_eq!(solver.num_vertices(), 1);
    }

    #[test]
    fn test_tetrahedron_containing_origin() {
        let mut solver = VoronoiSimplexSolver::new();
        solver.reset();
        for w in [
            Vec3::new(1.0, -1.0, -1.0),
            Vec3::new(-1.0, -1.0, -1.0),
            Vec3::new(0.0, -1.0, 1.0),
            Vec3::new(0.0, 1.0, 0.0),
        ] {
            solver.add_vertex(w, w, Vec3::ZERO);
        }
        let v = solver.closest().unwrap();
        assert_relative_eq!(v.length(), 0.0);
    }
}
