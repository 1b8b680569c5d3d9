use crate::utilities::memory::{ArenaHandle, ArenaIndex};
use std::hash::Hash;

// Newtype Pattern for enhanced type safety
#[derive(Debug, Copy, Clone, Default, Eq, PartialEq, Hash, PartialOrd, Ord)]
pub struct ObjectHandle(pub ArenaIndex);

#[derive(Debug, Copy, Clone, Default, Eq, PartialEq, Hash, PartialOrd, Ord)]
pub struct ManifoldHandle(pub ArenaIndex);

#[derive(Debug, Copy, Clone, Default, Eq, PartialEq, Hash, PartialOrd, Ord)]
pub struct ConstraintHandle(pub ArenaIndex);

#[derive(Debug, Copy, Clone, Default, Eq, PartialEq, Hash, PartialOrd, Ord)]
pub struct ProxyHandle(pub ArenaIndex);

macro_rules! impl_arena_handle {
    ($($name:ident),*) => {
        $(
            impl ArenaHandle for $name {
                #[inline(always)]
                fn from_arena_index(index: ArenaIndex) -> Self {
                    Self(index)
                }

                #[inline(always)]
                fn arena_index(self) -> ArenaIndex {
                    self.0
                }
            }

            // Simple implementations for Display for user-friendliness
            impl std::fmt::Display for $name {
                fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
                    write!(f, "{}<{}:{}>", stringify!($name), self.0.index, self.0.generation)
                }
            }
        )*
    };
}

impl_arena_handle!(ObjectHandle, ManifoldHandle, ConstraintHandle, ProxyHandle);

impl ObjectHandle {
    /// Slot index, dense enough to key per-step side tables.
    #[inline(always)]
    pub fn slot(self) -> usize {
        self.0.index as usize
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        let handle = ObjectHandle(ArenaIndex {
            index: 3,
            generation: 1,
        });
        assert_eq!(handle.to_string(), "ObjectHandle<3:1>");
    }
}
