/// Seeded linear congruential generator used to shuffle solver order.
///
/// Reproducible across runs and platforms; two solvers seeded identically visit
/// constraints in the same order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SolverRng {
    seed: u32,
}

impl Default for SolverRng {
    fn default() -> Self {
        Self { seed: 0 }
    }
}

impl SolverRng {
    #[inline]
    pub fn new(seed: u32) -> Self {
        Self { seed }
    }

    #[inline]
    pub fn seed(&self) -> u32 {
        self.seed
    }

    #[inline]
    pub fn set_seed(&mut self, seed: u32) {
        self.seed = seed;
    }

    /// Advances the generator and returns the raw 32-bit state.
    #[inline]
    pub fn rand2(&mut self) -> u32 {
        self.seed = self.seed.wrapping_mul(1_664_525).wrapping_add(1_013_904_223);
        self.seed
    }

    /// Returns a value in `[0, n)`.
    ///
    /// High bits are folded into the low bits for small ranges so that the LCG's weak
    /// low-order bits still produce a usable spread.
    #[inline]
    pub fn rand_int2(&mut self, n: usize) -> usize {
        debug_assert!(n > 0);
        let un = n as u32;
        let mut r = self.rand2();
        if un <= 0x0001_0000 {
            r ^= r >> 16;
            if un <= 0x0000_0100 {
                r ^= r >> 8;
                if un <= 0x0000_0010 {
                    r ^= r >> 4;
                    if un <= 0x0000_0004 {
                        r ^= r >> 2;
                        if un <= 0x0000_0002 {
                            r ^= r >> 1;
                        }
                    }
                }
            }
        }
        (r % un) as usize
    }

    /// In-place Fisher-Yates-style shuffle, swapping each slot with a random earlier one.
    pub fn shuffle<T>(&mut self, items: &mut [T]) {
        for j in 1..items.len() {
            let swapi = self.rand_int2(j + 1);
            items.swap(j, swapi);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_seed_same_sequence() {
        let mut a = SolverRng::new(42);
        let mut b = SolverRng::new(42);
        for _ in 0..100 {
            assert_eq!(a.rand2(), b.rand2());
        }
    }

    #[test]
    fn test_known_first_value() {
        let mut rng = SolverRng::new(0);
        assert_eq!(rng.rand2(), 1_013_904_223);
    }

    #[test]
    fn test_rand_int_range() {
        let mut rng = SolverRng::new(7);
        for n in 1..50 {
            for _ in 0..20 {
                assert!(rng.rand_int2(n) < n);
            }
        }
    }

    #[test]
    fn test_shuffle_is_permutation() {
        let mut rng = SolverRng::new(3);
        let mut items: Vec<u32> = (0..16).collect();
        rng.shuffle(&mut items);
        let mut sorted = items.clone();
        sorted.sort_unstable();
        assert_eq!(sorted, (0..16).collect::<Vec<_>>());
    }
}
