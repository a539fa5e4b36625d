//! Sum tree for proportional sampling.
//!
//! Nodes are stored in a flat array: the children of node `k` are `2k + 1`
//! and `2k + 2`, and leaf `j` is node `j + capacity - 1`. Every internal node
//! holds the sum of its children, recomputed on each update so rounding
//! errors do not accumulate.

#[derive(Debug, Clone)]
pub struct SumTree {
    capacity: usize,
    tree: Vec<f64>,
}

impl SumTree {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            tree: vec![0.0; 2 * capacity - 1],
        }
    }

    /// Sum of all leaves.
    pub fn total(&self) -> f64 {
        self.tree[0]
    }

    /// Value of leaf `ix`.
    pub fn leaf(&self, ix: usize) -> f64 {
        self.tree[ix + self.capacity - 1]
    }

    /// Sets leaf `ix` to `p` and updates its ancestors.
    pub fn set(&mut self, ix: usize, p: f64) {
        debug_assert!(ix < self.capacity);
        let mut k = ix + self.capacity - 1;
        self.tree[k] = p;
        while k > 0 {
            k = (k - 1) / 2;
            self.tree[k] = self.tree[2 * k + 1] + self.tree[2 * k + 2];
        }
    }

    /// Returns the leaf whose cumulative range contains `s`.
    ///
    /// `s` is expected in `[0, total)`. Leaves with zero value are never
    /// returned while the tree has positive mass.
    pub fn get(&self, s: f64) -> usize {
        let mut k = 0;
        let mut s = s;
        loop {
            let left = 2 * k + 1;
            if left >= self.tree.len() {
                break;
            }
            let right = left + 1;
            if self.tree[left] > 0.0 && (s < self.tree[left] || self.tree[right] <= 0.0) {
                k = left;
            } else {
                s -= self.tree[left];
                k = right;
            }
        }
        k + 1 - self.capacity
    }
}

#[cfg(test)]
mod tests {
    use super::SumTree;

    #[test]
    fn test_sum_tree_retrieval() {
        let mut tree = SumTree::new(8);
        for (ix, p) in [1.0, 2.0, 0.0, 3.0, 4.0].into_iter().enumerate() {
            tree.set(ix, p);
        }
        assert_eq!(tree.total(), 10.0);
        assert_eq!(tree.get(0.0), 0);
        assert_eq!(tree.get(0.99), 0);
        assert_eq!(tree.get(1.0), 1);
        assert_eq!(tree.get(2.99), 1);
        assert_eq!(tree.get(3.0), 3);
        assert_eq!(tree.get(5.99), 3);
        assert_eq!(tree.get(6.0), 4);
        assert_eq!(tree.get(9.99), 4);

        // Beyond the total, the rightmost non-empty leaf.
        assert_eq!(tree.get(10.5), 4);
    }

    #[test]
    fn test_sum_tree_overwrite() {
        let mut tree = SumTree::new(4);
        tree.set(2, 5.0);
        tree.set(2, 1.5);
        tree.set(0, 0.5);
        assert_eq!(tree.total(), 2.0);
        assert_eq!(tree.leaf(2), 1.5);
        assert_eq!(tree.get(0.7), 2);
    }

    #[test]
    fn test_sum_tree_proportional() {
        use rand::{rngs::StdRng, Rng, SeedableRng};

        let mut tree = SumTree::new(3);
        tree.set(0, 1.0);
        tree.set(1, 3.0);
        let mut rng = StdRng::seed_from_u64(0);
        let mut counts = [0usize; 3];
        for _ in 0..10_000 {
            counts[tree.get(rng.gen::<f64>() * tree.total())] += 1;
        }
        assert_eq!(counts[2], 0);
        let ratio = counts[1] as f64 / counts[0] as f64;
        assert!((ratio - 3.0).abs() < 0.3, "ratio = {}", ratio);
    }
}
