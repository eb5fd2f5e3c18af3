//! Axis-aligned integer index ranges, inclusive on both ends.

use serde::{Deserialize, Serialize};

/// A dense rectangular range of grid indices, `lo[k]..=hi[k]` per axis.
///
/// Boxes owned by a rank are never empty: `lo[k] <= hi[k]` holds on every
/// axis. Emptiness only arises as the *result* of an intersection, which is
/// why [`IndexBox::intersect`] returns `Option`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IndexBox {
    lo: Vec<usize>,
    hi: Vec<usize>,
}

impl IndexBox {
    /// Build a box from inclusive bounds.
    pub fn new(lo: Vec<usize>, hi: Vec<usize>) -> Self {
        debug_assert_eq!(lo.len(), hi.len());
        debug_assert!(lo.iter().zip(&hi).all(|(l, h)| l <= h));
        Self { lo, hi }
    }

    /// Number of spatial axes.
    pub fn ndim(&self) -> usize {
        self.lo.len()
    }

    /// Inclusive lower bound along `axis`.
    pub fn lo(&self, axis: usize) -> usize {
        self.lo[axis]
    }

    /// Inclusive upper bound along `axis`.
    pub fn hi(&self, axis: usize) -> usize {
        self.hi[axis]
    }

    /// `(lo, hi)` bound slices, both inclusive.
    pub fn bounds(&self) -> (&[usize], &[usize]) {
        (&self.lo, &self.hi)
    }

    /// Number of cells along `axis`.
    pub fn extent(&self, axis: usize) -> usize {
        self.hi[axis] - self.lo[axis] + 1
    }

    /// Per-axis extents, i.e. the shape of an array sized to this box.
    pub fn shape(&self) -> Vec<usize> {
        (0..self.ndim()).map(|k| self.extent(k)).collect()
    }

    /// Total cell count.
    pub fn num_cells(&self) -> usize {
        (0..self.ndim()).map(|k| self.extent(k)).product()
    }

    /// Whether `other` lies entirely inside `self`.
    pub fn contains(&self, other: &IndexBox) -> bool {
        self.ndim() == other.ndim()
            && (0..self.ndim()).all(|k| self.lo[k] <= other.lo[k] && other.hi[k] <= self.hi[k])
    }

    /// Per-axis intersection; `None` if any axis range comes up empty.
    pub fn intersect(&self, other: &IndexBox) -> Option<IndexBox> {
        debug_assert_eq!(self.ndim(), other.ndim());
        let mut lo = Vec::with_capacity(self.ndim());
        let mut hi = Vec::with_capacity(self.ndim());
        for k in 0..self.ndim() {
            let l = self.lo[k].max(other.lo[k]);
            let h = self.hi[k].min(other.hi[k]);
            if l > h {
                return None;
            }
            lo.push(l);
            hi.push(h);
        }
        Some(IndexBox { lo, hi })
    }
}
