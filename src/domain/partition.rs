//! GridPartition: immutable rectilinear tiling of a global grid.

use log::debug;
use serde::{Deserialize, Serialize};

use crate::domain::factorize::factorize;
use crate::domain::index_box::IndexBox;
use crate::error::DecompError;

/// How a global D-dimensional grid is divided into one block per rank.
///
/// Ranks are contiguous `0..num_ranks()`, linearized over the block grid in
/// C order (axis 0 slowest). The union of all rank boxes tiles the domain
/// exactly once. Immutable after construction.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GridPartition {
    domain: Vec<usize>,
    layout: Vec<usize>,
    boxes: Vec<IndexBox>,
}

impl GridPartition {
    /// Tile `domain` into `nproc` blocks using the automatic factorization
    /// policy (see [`factorize`](crate::domain::factorize::factorize)).
    pub fn new(domain: &[usize], nproc: usize) -> Result<Self, DecompError> {
        let layout = factorize(domain, nproc)?;
        Self::with_layout(domain, &layout)
    }

    /// Tile `domain` with an explicit per-axis block count.
    ///
    /// Remainder cells along each split axis go to the lowest-indexed
    /// blocks, so block `i` of `b` on an axis of extent `n` owns
    /// `n/b + 1` cells if `i < n % b`, else `n/b`.
    pub fn with_layout(domain: &[usize], layout: &[usize]) -> Result<Self, DecompError> {
        let nproc = layout.iter().product::<usize>();
        let invalid = |reason: String| DecompError::InvalidPartition {
            domain: domain.to_vec(),
            nproc,
            reason,
        };
        if domain.is_empty() {
            return Err(invalid("domain must have at least one axis".into()));
        }
        if layout.len() != domain.len() {
            return Err(invalid(format!(
                "layout has {} axes, domain has {}",
                layout.len(),
                domain.len()
            )));
        }
        for (k, (&n, &b)) in domain.iter().zip(layout).enumerate() {
            if n == 0 || b == 0 {
                return Err(invalid(format!("axis {k} has zero extent or zero blocks")));
            }
            if b > n {
                return Err(invalid(format!(
                    "axis {k} has extent {n} but {b} blocks"
                )));
            }
        }

        let splits: Vec<Vec<(usize, usize)>> = domain
            .iter()
            .zip(layout)
            .map(|(&n, &b)| axis_ranges(n, b))
            .collect();

        let mut boxes = Vec::with_capacity(nproc);
        let mut coords = vec![0usize; layout.len()];
        for _ in 0..nproc {
            let lo = coords.iter().zip(&splits).map(|(&c, s)| s[c].0).collect();
            let hi = coords.iter().zip(&splits).map(|(&c, s)| s[c].1).collect();
            boxes.push(IndexBox::new(lo, hi));
            // C-order increment: last axis fastest.
            for k in (0..layout.len()).rev() {
                coords[k] += 1;
                if coords[k] < layout[k] {
                    break;
                }
                coords[k] = 0;
            }
        }

        debug!(
            "partitioned domain {:?} into {:?} blocks ({} ranks)",
            domain, layout, nproc
        );
        Ok(Self {
            domain: domain.to_vec(),
            layout: layout.to_vec(),
            boxes,
        })
    }

    /// Global domain extents.
    pub fn domain(&self) -> &[usize] {
        &self.domain
    }

    /// Number of spatial axes.
    pub fn ndim(&self) -> usize {
        self.domain.len()
    }

    /// Number of ranks (= number of blocks).
    pub fn num_ranks(&self) -> usize {
        self.boxes.len()
    }

    /// Blocks per axis.
    pub fn layout(&self) -> &[usize] {
        &self.layout
    }

    /// The box owned by `rank`.
    ///
    /// # Panics
    /// If `rank >= num_ranks()`.
    pub fn rank_box(&self, rank: usize) -> &IndexBox {
        &self.boxes[rank]
    }

    /// All rank boxes, rank-indexed.
    pub fn boxes(&self) -> &[IndexBox] {
        &self.boxes
    }
}

/// Inclusive `(lo, hi)` ranges cutting an axis of extent `n` into `b` blocks,
/// remainder cells to the lowest-indexed blocks.
fn axis_ranges(n: usize, b: usize) -> Vec<(usize, usize)> {
    let (base, rem) = (n / b, n % b);
    let mut out = Vec::with_capacity(b);
    let mut lo = 0;
    for i in 0..b {
        let len = base + usize::from(i < rem);
        out.push((lo, lo + len - 1));
        lo += len;
    }
    out
}
