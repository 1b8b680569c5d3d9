use std::marker::PhantomData;

/// Slot index plus the generation the slot had when the value was inserted.
#[derive(Debug, Copy, Clone, Default, Eq, PartialEq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ArenaIndex {
    pub index: u32,
    pub generation: u32,
}

/// Typed handle wrapping an [`ArenaIndex`].
pub trait ArenaHandle: Copy {
    fn from_arena_index(index: ArenaIndex) -> Self;
    fn arena_index(self) -> ArenaIndex;
}

impl ArenaHandle for ArenaIndex {
    #[inline(always)]
    fn from_arena_index(index: ArenaIndex) -> Self {
        index
    }

    #[inline(always)]
    fn arena_index(self) -> ArenaIndex {
        self
    }
}

#[derive(Debug, Clone)]
enum Slot<T> {
    Occupied { generation: u32, value: T },
    Free { generation: u32 },
}

/// Pool of values addressed by generation-checked handles.
///
/// Insertion reuses the most recently released slot before growing, like an id pool.
/// Releasing a slot bumps its generation, so handles to the old value are rejected
/// instead of aliasing whatever is stored there next. Iteration is in slot order.
#[derive(Debug, Clone)]
pub struct Arena<T, H: ArenaHandle = ArenaIndex> {
    slots: Vec<Slot<T>>,
    available_ids: Vec<u32>,
    len: usize,
    _handle: PhantomData<H>,
}

impl<T, H: ArenaHandle> Default for Arena<T, H> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T, H: ArenaHandle> Arena<T, H> {
    pub fn new() -> Self {
        Self {
            slots: Vec::new(),
            available_ids: Vec::new(),
            len: 0,
            _handle: PhantomData,
        }
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            slots: Vec::with_capacity(capacity),
            available_ids: Vec::new(),
            len: 0,
            _handle: PhantomData,
        }
    }

    /// Number of live values.
    #[inline(always)]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline(always)]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Number of slots ever allocated; an upper bound on any live slot index.
    #[inline(always)]
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    pub fn insert(&mut self, value: T) -> H {
        self.len += 1;
        if let Some(index) = self.available_ids.pop() {
            let slot = &mut self.slots[index as usize];
            let generation = match *slot {
                Slot::Free { generation } => generation,
                Slot::Occupied { .. } => unreachable!("free list points at an occupied slot"),
            };
            *slot = Slot::Occupied { generation, value };
            H::from_arena_index(ArenaIndex { index, generation })
        } else {
            let index = self.slots.len() as u32;
            self.slots.push(Slot::Occupied {
                generation: 0,
                value,
            });
            H::from_arena_index(ArenaIndex {
                index,
                generation: 0,
            })
        }
    }

    /// Removes the value behind `handle`. Returns `None` for stale handles.
    pub fn remove(&mut self, handle: H) -> Option<T> {
        let ArenaIndex { index, generation } = handle.arena_index();
        let slot = self.slots.get_mut(index as usize)?;
        let live = matches!(slot, Slot::Occupied { generation: g, .. } if *g == generation);
        if !live {
            return None;
        }
        let next = Slot::Free {
            generation: generation.wrapping_add(1),
        };
        let old = std::mem::replace(slot, next);
        self.available_ids.push(index);
        self.len -= 1;
        match old {
            Slot::Occupied { value, .. } => Some(value),
            Slot::Free { .. } => None,
        }
    }

    #[inline]
    pub fn contains(&self, handle: H) -> bool {
        self.get(handle).is_some()
    }

    #[inline]
    pub fn get(&self, handle: H) -> Option<&T> {
        let ArenaIndex { index, generation } = handle.arena_index();
        match self.slots.get(index as usize)? {
            Slot::Occupied { generation: g, value } if *g == generation => Some(value),
            _ => None,
        }
    }

    #[inline]
    pub fn get_mut(&mut self, handle: H) -> Option<&mut T> {
        let ArenaIndex { index, generation } = handle.arena_index();
        match self.slots.get_mut(index as usize)? {
            Slot::Occupied { generation: g, value } if *g == generation => Some(value),
            _ => None,
        }
    }

    /// Mutable access to two distinct values at once.
    pub fn get2_mut(&mut self, a: H, b: H) -> Option<(&mut T, &mut T)> {
        let ia = a.arena_index();
        let ib = b.arena_index();
        if ia.index == ib.index {
            return None;
        }
        let (lo, hi, flipped) = if ia.index < ib.index {
            (ia, ib, false)
        } else {
            (ib, ia, true)
        };
        if hi.index as usize >= self.slots.len() {
            return None;
        }
        let (left, right) = self.slots.split_at_mut(hi.index as usize);
        let first = match &mut left[lo.index as usize] {
            Slot::Occupied { generation, value } if *generation == lo.generation => value,
            _ => return None,
        };
        let second = match &mut right[0] {
            Slot::Occupied { generation, value } if *generation == hi.generation => value,
            _ => return None,
        };
        if flipped {
            Some((second, first))
        } else {
            Some((first, second))
        }
    }

    /// Iterates live values in slot order.
    pub fn iter(&self) -> impl Iterator<Item = (H, &T)> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(index, slot)| match slot {
                Slot::Occupied { generation, value } => Some((
                    H::from_arena_index(ArenaIndex {
                        index: index as u32,
                        generation: *generation,
                    }),
                    value,
                )),
                Slot::Free { .. } => None,
            })
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (H, &mut T)> {
        self.slots
            .iter_mut()
            .enumerate()
            .filter_map(|(index, slot)| match slot {
                Slot::Occupied { generation, value } => Some((
                    H::from_arena_index(ArenaIndex {
                        index: index as u32,
                        generation: *generation,
                    }),
                    value,
                )),
                Slot::Free { .. } => None,
            })
    }

    /// Live handles in slot order.
    pub fn handles(&self) -> Vec<H> {
        self.iter().map(|(handle, _)| handle).collect()
    }

    /// Removes every value. Outstanding handles become stale.
    pub fn clear(&mut self) {
        self.available_ids.clear();
        for (index, slot) in self.slots.iter_mut().enumerate().rev() {
            let generation = match slot {
                Slot::Occupied { generation, .. } => generation.wrapping_add(1),
                Slot::Free { generation } => *generation,
            };
            *slot = Slot::Free { generation };
            self.available_ids.push(index as u32);
        }
        self.len = 0;
    }
}
