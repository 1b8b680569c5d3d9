/// Node of the union-find forest.
///
/// Before [`UnionFind::sort_islands`], `id` is the parent link and `sz` the subtree size.
/// Afterwards `id` is the root and `sz` the element's original index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Element {
    pub id: usize,
    pub sz: usize,
}

/// Weighted quick-union with path halving, rebuilt every step to group bodies into
/// islands.
#[derive(Debug, Clone, Default)]
pub struct UnionFind {
    elements: Vec<Element>,
}

impl UnionFind {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resets to `n` singleton sets.
    pub fn reset(&mut self, n: usize) {
        self.elements.clear();
        self.elements.extend((0..n).map(|i| Element { id: i, sz: 1 }));
    }

    #[inline]
    pub fn num_elements(&self) -> usize {
        self.elements.len()
    }

    #[inline]
    pub fn is_root(&self, x: usize) -> bool {
        x == self.elements[x].id
    }

    #[inline]
    pub fn element(&self, index: usize) -> &Element {
        &self.elements[index]
    }

    #[inline]
    pub fn elements(&self) -> &[Element] {
        &self.elements
    }

    /// Root of `x`'s set. Halves the path on the way up.
    pub fn find(&mut self, mut x: usize) -> usize {
        while x != self.elements[x].id {
            let grandparent = self.elements[self.elements[x].id].id;
            self.elements[x].id = grandparent;
            x = grandparent;
        }
        x
    }

    /// Merges the sets of `p` and `q`, hanging the smaller tree under the larger.
    pub fn unite(&mut self, p: usize, q: usize) {
        let i = self.find(p);
        let j = self.find(q);
        if i == j {
            return;
        }
        if self.elements[i].sz < self.elements[j].sz {
            self.elements[i].id = j;
            self.elements[j].sz += self.elements[i].sz;
        } else {
            self.elements[j].id = i;
            self.elements[i].sz += self.elements[j].sz;
        }
    }

    /// Flattens every element onto its root, records its original index in `sz` and
    /// orders the elements by root. The sort is stable, so members of an island keep
    /// their original relative order.
    ///
    /// Roots are resolved before sorting; `find` mutates the forest and must not run
    /// inside the comparator.
    pub fn sort_islands(&mut self) {
        for i in 0..self.elements.len() {
            let root = self.find(i);
            self.elements[i].id = root;
        }
        for (i, element) in self.elements.iter_mut().enumerate() {
            element.sz = i;
        }
        self.elements.sort_by_key(|e| e.id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_unite_and_find() {
        let mut uf = UnionFind::new();
        uf.reset(6);
        uf.unite(0, 1);
        uf.unite(2, 3);
        uf.unite(1, 3);
        assert_eq!(uf.find(0), uf.find(2));
        assert_ne!(uf.find(0), uf.find(4));
        assert!(uf.is_root(5));
        assert_eq!(uf.num_elements(), 6);
    }

    #[test]
    fn test_sort_islands_groups_by_root() {
        let mut uf = UnionFind::new();
        uf.reset(5);
        uf.unite(4, 0);
        uf.unite(3, 1);
        uf.sort_islands();
        let ids: Vec<usize> = uf.elements().iter().map(|e| e.id).collect();
        let mut sorted = ids.clone();
        sorted.sort();
        assert_eq!(ids, sorted);
        // Every original index shows up once.
        let mut original: Vec<usize> = uf.elements().iter().map(|e| e.sz).collect();
        original.sort();
        assert_eq!(original, vec![0, 1, 2, 3, 4]);
        // Stable: members of one island stay in index order.
        let island: Vec<usize> = uf
            .elements()
            .iter()
            .filter(|e| e.id == uf.elements()[0].id)
            .map(|e| e.sz)
            .collect();
        assert!(island.windows(2).all(|w| w[0] < w[1]));
    }

    proptest! {
        #[test]
        fn prop_unions_match_naive_components(
            n in 1usize..40,
            edges in prop::collection::vec((0usize..40, 0usize..40), 0..60),
        ) {
            let edges: Vec<(usize, usize)> = edges.into_iter().map(|(a, b)| (a % n, b % n)).collect();
            let mut uf = UnionFind::new();
            uf.reset(n);
            for &(a, b) in &edges {
                uf.unite(a, b);
            }

            // Naive labelling by repeated relaxation.
            let mut label: Vec<usize> = (0..n).collect();
            loop {
                let mut changed = false;
                for &(a, b) in &edges {
                    let m = label[a].min(label[b]);
                    if label[a] != m || label[b] != m {
                        label[a] = m;
                        label[b] = m;
                        changed = true;
                    }
                }
                if !changed {
                    break;
                }
            }

            for a in 0..n {
                for b in 0..n {
                    prop_assert_eq!(uf.find(a) == uf.find(b), label[a] == label[b]);
                }
            }

            uf.sort_islands();
            for i in 1..n {
                prop_assert!(uf.element(i - 1).id <= uf.element(i).id);
            }
            for e in uf.elements() {
                prop_assert_eq!(label[e.id], label[e.sz]);
            }
        }
    }
}
