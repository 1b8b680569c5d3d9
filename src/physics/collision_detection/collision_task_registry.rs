use crate::physics::collidables::ShapeType;

/// Narrow-phase algorithm selected for an ordered pair of shape types.
///
/// `Swapped*` kinds handle the mirrored order of their base kind: the concave, plane or
/// compound shape comes first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum AlgorithmKind {
    #[default]
    Empty,
    SphereSphere,
    ConvexConvex,
    ConvexConcave,
    SwappedConvexConcave,
    Compound,
    SwappedCompound,
    ConvexPlane,
    SwappedConvexPlane,
}

/// Table of algorithm kinds keyed by the two shape-type ordinals.
///
/// The table is total: every pair resolves, unmatched pairs to [`AlgorithmKind::Empty`].
#[derive(Debug, Clone)]
pub struct CollisionTaskRegistry {
    top_level_matrix: [[AlgorithmKind; ShapeType::COUNT]; ShapeType::COUNT],
}

impl Default for CollisionTaskRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl CollisionTaskRegistry {
    /// Builds the default table.
    pub fn new() -> Self {
        let mut top_level_matrix = [[AlgorithmKind::Empty; ShapeType::COUNT]; ShapeType::COUNT];
        for a in ShapeType::ALL {
            for b in ShapeType::ALL {
                top_level_matrix[a.ordinal()][b.ordinal()] = Self::default_kind(a, b);
            }
        }
        Self { top_level_matrix }
    }

    /// Resolution order: sphere pair fast path, compounds, concave meshes, planes, convex.
    pub fn default_kind(a: ShapeType, b: ShapeType) -> AlgorithmKind {
        if a == ShapeType::Sphere && b == ShapeType::Sphere {
            AlgorithmKind::SphereSphere
        } else if a.is_compound() {
            AlgorithmKind::Compound
        } else if b.is_compound() {
            AlgorithmKind::SwappedCompound
        } else if a.is_convex() && b.is_concave() {
            AlgorithmKind::ConvexConcave
        } else if a.is_concave() && b.is_convex() {
            AlgorithmKind::SwappedConvexConcave
        } else if a.is_convex() && b.is_plane() {
            AlgorithmKind::ConvexPlane
        } else if a.is_plane() && b.is_convex() {
            AlgorithmKind::SwappedConvexPlane
        } else if a.is_convex() && b.is_convex() {
            AlgorithmKind::ConvexConvex
        } else {
            AlgorithmKind::Empty
        }
    }

    #[inline(always)]
    pub fn get_task_reference(&self, a: ShapeType, b: ShapeType) -> AlgorithmKind {
        self.top_level_matrix[a.ordinal()][b.ordinal()]
    }

    /// Overrides the entry for the ordered pair `(a, b)`. Returns the previous kind.
    pub fn register_pair(&mut self, a: ShapeType, b: ShapeType, kind: AlgorithmKind) -> AlgorithmKind {
        std::mem::replace(&mut self.top_level_matrix[a.ordinal()][b.ordinal()], kind)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_is_total_and_mirrored() {
        let registry = CollisionTaskRegistry::new();
        assert_eq!(
            registry.get_task_reference(ShapeType::Sphere, ShapeType::Sphere),
            AlgorithmKind::SphereSphere
        );
        assert_eq!(
            registry.get_task_reference(ShapeType::Box, ShapeType::TriangleMesh),
            AlgorithmKind::ConvexConcave
        );
        assert_eq!(
            registry.get_task_reference(ShapeType::TriangleMesh, ShapeType::Capsule),
            AlgorithmKind::SwappedConvexConcave
        );
        assert_eq!(
            registry.get_task_reference(ShapeType::ConvexHull, ShapeType::StaticPlane),
            AlgorithmKind::ConvexPlane
        );
        assert_eq!(
            registry.get_task_reference(ShapeType::StaticPlane, ShapeType::Sphere),
            AlgorithmKind::SwappedConvexPlane
        );
        assert_eq!(
            registry.get_task_reference(ShapeType::Compound, ShapeType::TriangleMesh),
            AlgorithmKind::Compound
        );
        assert_eq!(
            registry.get_task_reference(ShapeType::StaticPlane, ShapeType::Compound),
            AlgorithmKind::SwappedCompound
        );
        assert_eq!(
            registry.get_task_reference(ShapeType::Sphere, ShapeType::Box),
            AlgorithmKind::ConvexConvex
        );
    }

    #[test]
    fn test_unmatched_pairs_fall_back_to_empty() {
        let registry = CollisionTaskRegistry::new();
        assert_eq!(
            registry.get_task_reference(ShapeType::TriangleMesh, ShapeType::TriangleMesh),
            AlgorithmKind::Empty
        );
        assert_eq!(
            registry.get_task_reference(ShapeType::StaticPlane, ShapeType::TriangleMesh),
            AlgorithmKind::Empty
        );
    }

    #[test]
    fn test_register_pair_overrides_one_entry() {
        let mut registry = CollisionTaskRegistry::new();
        let previous = registry.register_pair(ShapeType::Sphere, ShapeType::Sphere, AlgorithmKind::ConvexConvex);
        assert_eq!(previous, AlgorithmKind::SphereSphere);
        assert_eq!(
            registry.get_task_reference(ShapeType::Sphere, ShapeType::Sphere),
            AlgorithmKind::ConvexConvex
        );
        assert_eq!(
            registry.get_task_reference(ShapeType::Sphere, ShapeType::Box),
            AlgorithmKind::ConvexConvex
        );
    }
}
