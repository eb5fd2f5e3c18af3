//! Overlap resolution: the communication schedule between two partitions.

use std::collections::BTreeMap;
use std::ops::Bound;

use itertools::Itertools;
use log::debug;

use crate::domain::index_box::IndexBox;
use crate::domain::partition::GridPartition;

/// The intersection boxes between every ordered `(src, dst)` rank pair of
/// two partitions over the same global domain.
///
/// Pairs with empty intersection are absent. For any fixed rank, the stored
/// boxes as source tile that rank's full source box, and as destination its
/// full destination box; this double completeness is what makes the
/// redistribution a bijection on cells. Iteration is in ascending
/// `(src, dst)` order so downstream buffer ordering is reproducible.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OverlapSchedule {
    by_src: BTreeMap<(usize, usize), IndexBox>,
    by_dst: BTreeMap<(usize, usize), IndexBox>,
}

/// Intersect every rank pair of `src` and `dst`.
///
/// Both partitions must cover the same global domain with the same number
/// of ranks; the engine guarantees this by deriving both from one source
/// partition. All P×P candidate pairs are examined, which is fine at the
/// moderate process counts this crate targets.
pub fn resolve(src: &GridPartition, dst: &GridPartition) -> OverlapSchedule {
    debug_assert_eq!(src.domain(), dst.domain());
    debug_assert_eq!(src.num_ranks(), dst.num_ranks());

    let p = src.num_ranks();
    let mut by_src = BTreeMap::new();
    let mut by_dst = BTreeMap::new();
    for (s, d) in (0..p).cartesian_product(0..p) {
        if let Some(overlap) = src.rank_box(s).intersect(dst.rank_box(d)) {
            by_src.insert((s, d), overlap.clone());
            by_dst.insert((d, s), overlap);
        }
    }
    let schedule = OverlapSchedule { by_src, by_dst };
    debug!(
        "resolved overlap schedule: {} nonempty pairs of {}",
        schedule.len(),
        p * p
    );
    debug_assert!(schedule.is_complete(src, dst));
    schedule
}

impl OverlapSchedule {
    /// Number of nonempty `(src, dst)` pairs.
    pub fn len(&self) -> usize {
        self.by_src.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_src.is_empty()
    }

    /// The intersection box for `(src, dst)`, if nonempty.
    pub fn get(&self, src: usize, dst: usize) -> Option<&IndexBox> {
        self.by_src.get(&(src, dst))
    }

    /// All entries in ascending `(src, dst)` order.
    pub fn iter(&self) -> impl Iterator<Item = (usize, usize, &IndexBox)> {
        self.by_src.iter().map(|(&(s, d), b)| (s, d, b))
    }

    /// Destinations `src` sends to, with the overlap boxes, ascending.
    pub fn sends_from(&self, src: usize) -> impl Iterator<Item = (usize, &IndexBox)> {
        self.by_src
            .range((Bound::Included((src, 0)), Bound::Included((src, usize::MAX))))
            .map(|(&(_, d), b)| (d, b))
    }

    /// Sources `dst` receives from, with the overlap boxes, ascending.
    pub fn recvs_to(&self, dst: usize) -> impl Iterator<Item = (usize, &IndexBox)> {
        self.by_dst
            .range((Bound::Included((dst, 0)), Bound::Included((dst, usize::MAX))))
            .map(|(&(_, s), b)| (s, b))
    }

    /// Check the double completeness invariant: per rank, the overlap boxes
    /// account for every cell of the source box exactly once, and likewise
    /// for the destination box. Rectilinear partitions make the entries
    /// pairwise disjoint, so a cell-count match is exact coverage.
    pub fn is_complete(&self, src: &GridPartition, dst: &GridPartition) -> bool {
        (0..src.num_ranks()).all(|r| {
            let sent: usize = self.sends_from(r).map(|(_, b)| b.num_cells()).sum();
            let recvd: usize = self.recvs_to(r).map(|(_, b)| b.num_cells()).sum();
            sent == src.rank_box(r).num_cells() && recvd == dst.rank_box(r).num_cells()
        })
    }
}
