//! Partitioning of components by time step.

use crate::slab::Adaptivity;
use crate::Float;

/// Maintains a permutation of the component indices and splits it, position
/// by position, into groups that share a sub-slab.
///
/// A call to [`Partition::update`] partitions the components at
/// `offset..` into a head that tolerates the returned step and a tail that
/// needs smaller steps; the head becomes the elements of one sub-slab and
/// the tail is handled by the recursion.
#[derive(Debug, Clone)]
pub struct Partition {
    indices: Vec<u32>,
    threshold: Float,
}

impl Partition {
    pub(crate) fn new(n: usize, threshold: Float) -> Partition {
        Partition {
            indices: (0..n as u32).collect(),
            threshold,
        }
    }

    /// Number of components.
    pub fn size(&self) -> usize {
        self.indices.len()
    }

    /// Component index at permutation position `pos`.
    pub fn index(&self, pos: usize) -> usize {
        self.indices[pos] as usize
    }

    /// Partition the components at `offset..` and return `(k, end)`: all
    /// components at `offset..end` tolerate a step of at least `k <= kmax`.
    ///
    /// The permutation is reordered in place; positions before `offset` are
    /// left untouched.
    pub(crate) fn update(
        &mut self,
        offset: usize,
        adaptivity: &Adaptivity,
        kmax: Float,
    ) -> (Float, usize) {
        // Largest tolerated step among the remaining components, capped by
        // the room we have.
        let mut klarge: Float = 0.0;
        for pos in offset..self.indices.len() {
            klarge = klarge.max(adaptivity.timestep(self.indices[pos] as usize));
        }
        let klarge = klarge.min(kmax);

        // Components within a factor `threshold` of the largest step go in
        // the head and share this sub-slab.
        let kcut = self.threshold * klarge;
        let mut end = offset;
        for pos in offset..self.indices.len() {
            if adaptivity.timestep(self.indices[pos] as usize) >= kcut {
                self.indices.swap(pos, end);
                end += 1;
            }
        }

        // The sub-slab length is the smallest step in the head.
        let mut k = Float::MAX;
        for pos in offset..end {
            k = k.min(adaptivity.timestep(self.indices[pos] as usize));
        }
        (k.min(kmax), end)
    }
}
