//! Enumeration of set partitions, used to expand the multivariate chain rule.
//!
//! # Examples
//!
//! Partitions of `{0, 1, 2}` into two blocks:
//!
//! ```rust
//! use computed_variable::combinatorics::SetPartitionIterator;
//!
//! let mut p = SetPartitionIterator::new(3, 2);
//! let mut partitions = vec![];
//! while let Some(a) = p.next() {
//!     partitions.push(a.iter().map(|b| b.to_vec()).collect::<Vec<_>>());
//! }
//!
//! let ans = vec![
//!     vec![vec![2], vec![0, 1]],
//!     vec![vec![1], vec![0, 2]],
//!     vec![vec![0], vec![1, 2]],
//! ];
//!
//! assert_eq!(partitions, ans);
//! ```
use smallvec::SmallVec;

/// A block of a set partition: sorted element indices.
pub type Block = SmallVec<[usize; 4]>;

/// An iterator over the partitions of the set `{0, .., n-1}` into exactly `k` non-empty blocks.
///
/// Every unordered partition is generated exactly once. The blocks of a generated partition
/// are in canonical order: non-decreasing size, and blocks of equal size ordered by their
/// smallest element. Each block is sorted.
///
/// The partitions are enumerated as restricted growth strings `a` with `a[0] = 0` and
/// `a[i] <= max(a[..i]) + 1`, where `a[i]` is the block of element `i`.
pub struct SetPartitionIterator {
    n: usize,
    k: usize,
    rgs: Vec<usize>,
    blocks: Vec<Block>,
    init: bool,
    done: bool,
}

impl SetPartitionIterator {
    /// Creates a new `SetPartitionIterator` over the partitions of `n` elements into `k` blocks.
    pub fn new(n: usize, k: usize) -> SetPartitionIterator {
        let done = k == 0 || k > n;
        let mut rgs = vec![0; n];
        if !done {
            // the lexicographically smallest string that uses exactly `k` blocks
            for (b, r) in rgs[n - k + 1..].iter_mut().enumerate() {
                *r = b + 1;
            }
        }

        SetPartitionIterator {
            n,
            k,
            rgs,
            blocks: Vec::with_capacity(k),
            init: false,
            done,
        }
    }

    /// Advances the iterator and returns the next partition.
    pub fn next(&mut self) -> Option<&[Block]> {
        if self.done {
            return None;
        }

        if !self.init {
            self.init = true;
        } else if !self.advance() {
            self.done = true;
            return None;
        }

        self.fill_blocks();
        Some(&self.blocks)
    }

    /// Move to the next restricted growth string with exactly `k` blocks.
    fn advance(&mut self) -> bool {
        for i in (1..self.n).rev() {
            let prefix_max = self.rgs[..i].iter().copied().max().unwrap_or(0);
            let limit = (prefix_max + 1).min(self.k - 1);

            for v in self.rgs[i] + 1..=limit {
                let used = prefix_max.max(v) + 1;
                let remaining = self.n - 1 - i;
                if self.k - used > remaining {
                    continue;
                }

                self.rgs[i] = v;
                // the smallest completion opens the missing blocks at the very end
                let fresh = self.k - used;
                for (j, r) in self.rgs[i + 1..].iter_mut().enumerate() {
                    *r = if j + fresh >= remaining {
                        used + j + fresh - remaining
                    } else {
                        0
                    };
                }
                return true;
            }
        }

        false
    }

    fn fill_blocks(&mut self) {
        self.blocks.clear();
        self.blocks.resize(self.k, SmallVec::new());
        for (e, b) in self.rgs.iter().enumerate() {
            self.blocks[*b].push(e);
        }

        // blocks are ordered by their smallest element, so a stable sort
        // on the length gives the canonical order
        self.blocks.sort_by_key(|b| b.len());
    }
}

/// Collect all partitions of `{0, .., n-1}` into `k` blocks.
pub fn set_partitions(n: usize, k: usize) -> Vec<Vec<Block>> {
    let mut res = vec![];
    let mut it = SetPartitionIterator::new(n, k);
    while let Some(p) = it.next() {
        res.push(p.to_vec());
    }
    res
}
