//! PencilPlan: a derived partition with one axis left unsplit.

use crate::domain::factorize::factorize;
use crate::domain::index_box::IndexBox;
use crate::domain::partition::GridPartition;
use crate::error::DecompError;

/// A pencil decomposition derived from a block partition.
///
/// Every rank's box spans the full global extent along the chosen axis;
/// the remaining axes are re-split over the same process group with the
/// same factorization policy as [`GridPartition::new`]. A plan is bound to
/// exactly one axis; deriving a plan for another axis is cheap.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PencilPlan {
    partition: GridPartition,
    axis: usize,
}

impl PencilPlan {
    /// Derive the pencil partition for `axis` from `source`.
    pub fn derive(source: &GridPartition, axis: usize) -> Result<Self, DecompError> {
        let domain = source.domain();
        let nproc = source.num_ranks();
        if axis >= domain.len() {
            return Err(DecompError::InvalidPartition {
                domain: domain.to_vec(),
                nproc,
                reason: format!(
                    "pencil axis {axis} out of range for {}-dimensional domain",
                    domain.len()
                ),
            });
        }

        let reduced: Vec<usize> = domain
            .iter()
            .enumerate()
            .filter(|&(k, _)| k != axis)
            .map(|(_, &n)| n)
            .collect();
        let mut layout = factorize(&reduced, nproc)?;
        layout.insert(axis, 1);

        let partition = GridPartition::with_layout(domain, &layout)?;
        Ok(Self { partition, axis })
    }

    /// The derived partition.
    pub fn partition(&self) -> &GridPartition {
        &self.partition
    }

    /// The unsplit axis.
    pub fn axis(&self) -> usize {
        self.axis
    }

    /// The pencil box owned by `rank`.
    pub fn rank_box(&self, rank: usize) -> &IndexBox {
        self.partition.rank_box(rank)
    }
}
