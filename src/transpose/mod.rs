//! Collective block↔pencil redistribution of local field arrays.
//!
//! A [`TransposeWrapper`] is bound to one `(GridPartition, axis)` pair and
//! one communicator for its lifetime. It caches the derived [`PencilPlan`]
//! and the chunk→pencil [`OverlapSchedule`]; the inverse direction reuses
//! the same schedule with source and destination roles swapped, never
//! recomputed. Values are only moved, never recomputed, so a round trip is
//! bit-identical.
//!
//! The transpose is collective: every rank in the group must call it for
//! the exchange to complete, and no partial result is observable before
//! all expected buffers have arrived.

use std::mem::size_of;

use bytemuck::{Pod, bytes_of, cast_slice, pod_collect_to_vec, pod_read_unaligned};
use log::{debug, trace};
use ndarray::{ArrayBase, ArrayD, ArrayViewD, AxisDescription, Data, IxDyn, Slice};

use crate::comm::{Communicator, Wait};
use crate::domain::index_box::IndexBox;
use crate::domain::partition::GridPartition;
use crate::domain::pencil::PencilPlan;
use crate::error::DecompError;
use crate::schedule::{OverlapSchedule, resolve};
use crate::wire::{HDR_BYTES, MAX_DIMS, WIRE_VERSION, WireHdr};

const TO_PENCIL_TAG: u16 = 0x60;
const FROM_PENCIL_TAG: u16 = 0x61;

#[derive(Clone, Copy, PartialEq, Eq)]
enum Direction {
    Forward,
    Reverse,
}

/// Redistribution engine between a block partition and one pencil axis.
pub struct TransposeWrapper<C: Communicator> {
    partition: GridPartition,
    plan: PencilPlan,
    /// Chunk→pencil schedule; the reverse direction reads it swapped.
    schedule: OverlapSchedule,
    comm: C,
    rank: usize,
}

impl<C: Communicator> TransposeWrapper<C> {
    /// Bind a wrapper to `partition`, pencil `axis` and `comm`.
    pub fn new(partition: &GridPartition, axis: usize, comm: C) -> Result<Self, DecompError> {
        if partition.num_ranks() != comm.size() {
            return Err(DecompError::PartitionMismatch {
                partition_ranks: partition.num_ranks(),
                comm_ranks: comm.size(),
            });
        }
        if partition.ndim() > MAX_DIMS {
            return Err(DecompError::InvalidPartition {
                domain: partition.domain().to_vec(),
                nproc: partition.num_ranks(),
                reason: format!("at most {MAX_DIMS} spatial axes are supported"),
            });
        }
        let plan = PencilPlan::derive(partition, axis)?;
        let schedule = resolve(partition, plan.partition());
        let rank = comm.rank();
        debug!(
            "rank {rank}: transpose wrapper for axis {axis}, {} schedule entries",
            schedule.len()
        );
        Ok(Self {
            partition: partition.clone(),
            plan,
            schedule,
            comm,
            rank,
        })
    }

    /// The unsplit axis this wrapper transposes along.
    pub fn axis(&self) -> usize {
        self.plan.axis()
    }

    /// This rank's box in the block partition.
    pub fn chunk_box(&self) -> &IndexBox {
        self.partition.rank_box(self.rank)
    }

    /// This rank's box in the pencil partition.
    pub fn pencil_box(&self) -> &IndexBox {
        self.plan.rank_box(self.rank)
    }

    pub fn partition(&self) -> &GridPartition {
        &self.partition
    }

    pub fn plan(&self) -> &PencilPlan {
        &self.plan
    }

    pub fn schedule(&self) -> &OverlapSchedule {
        &self.schedule
    }

    /// Redistribute this rank's chunk-local array into its pencil-local
    /// array. `chunk` must be sized to [`chunk_box`](Self::chunk_box), with
    /// an optional trailing component axis that is carried through
    /// untouched. Collective: every rank must call this.
    pub fn to_pencil<T, S>(&self, chunk: &ArrayBase<S, IxDyn>) -> Result<ArrayD<T>, DecompError>
    where
        T: Pod,
        S: Data<Elem = T>,
    {
        self.redistribute(chunk.view(), Direction::Forward)
    }

    /// Exact inverse of [`to_pencil`](Self::to_pencil): pencil-local back to
    /// chunk-local. `from_pencil(to_pencil(x)) == x` element-wise.
    pub fn from_pencil<T, S>(&self, pencil: &ArrayBase<S, IxDyn>) -> Result<ArrayD<T>, DecompError>
    where
        T: Pod,
        S: Data<Elem = T>,
    {
        self.redistribute(pencil.view(), Direction::Reverse)
    }

    fn redistribute<T: Pod>(
        &self,
        local: ArrayViewD<'_, T>,
        dir: Direction,
    ) -> Result<ArrayD<T>, DecompError> {
        let (src_box, dst_box, tag) = match dir {
            Direction::Forward => (self.chunk_box(), self.pencil_box(), TO_PENCIL_TAG),
            Direction::Reverse => (self.pencil_box(), self.chunk_box(), FROM_PENCIL_TAG),
        };
        let (ncomp, has_comp) = expect_shape(local.shape(), src_box)?;

        let mut out_shape = dst_box.shape();
        if has_comp {
            out_shape.push(ncomp);
        }
        let mut out = ArrayD::from_elem(IxDyn(&out_shape), T::zeroed());

        let me = self.rank;
        // Forward: I send the entries where I am the source. Reverse swaps
        // the roles, so my sends are the forward schedule's receives.
        let sends: Vec<(usize, &IndexBox)> = match dir {
            Direction::Forward => self.schedule.sends_from(me).collect(),
            Direction::Reverse => self.schedule.recvs_to(me).collect(),
        };
        let recvs: Vec<(usize, &IndexBox)> = match dir {
            Direction::Forward => self.schedule.recvs_to(me).collect(),
            Direction::Reverse => self.schedule.sends_from(me).collect(),
        };

        // Post all receives first; lengths are known from the schedule.
        let mut pending_recvs = Vec::with_capacity(recvs.len());
        for &(peer, region) in &recvs {
            if peer == me {
                continue;
            }
            let len = HDR_BYTES + region.num_cells() * ncomp * size_of::<T>();
            pending_recvs.push((peer, region, self.comm.irecv(peer, tag, len)));
        }

        // Self-overlap is a local copy, not a message.
        if let Some(region) = sends.iter().find(|&&(p, _)| p == me).map(|&(_, b)| b) {
            let src_view = local.slice_each_axis(region_slices(src_box, region));
            let mut dst_view = out.slice_each_axis_mut(region_slices(dst_box, region));
            dst_view.assign(&src_view);
        }

        // Pack and post sends; buffers stay alive until every handle is
        // drained below.
        let mut send_bufs = Vec::with_capacity(sends.len());
        let mut pending_sends = Vec::with_capacity(sends.len());
        for &(peer, region) in &sends {
            if peer == me {
                continue;
            }
            let buf = pack(&local, src_box, region, ncomp);
            trace!(
                "rank {me}: sending {} bytes covering {:?} to rank {peer}",
                buf.len(),
                region
            );
            pending_sends.push(self.comm.isend(peer, tag, &buf));
            send_bufs.push(buf);
        }

        // Wait for every expected buffer. Capture the first failure but
        // keep draining handles so peers are not stranded mid-exchange.
        let mut maybe_err = None;
        for (peer, region, h) in pending_recvs {
            match h.wait() {
                Some(bytes) => {
                    if let Err(e) = unpack(&mut out, dst_box, region, ncomp, &bytes, peer) {
                        if maybe_err.is_none() {
                            maybe_err = Some(e);
                        }
                    }
                }
                None => {
                    if maybe_err.is_none() {
                        maybe_err = Some(DecompError::Comm {
                            peer,
                            reason: "no data received".into(),
                        });
                    }
                }
            }
        }
        for s in pending_sends {
            let _ = s.wait();
        }

        match maybe_err {
            Some(e) => Err(e),
            None => Ok(out),
        }
    }
}

/// Validate a local array shape against the owning box; returns the
/// component count and whether a trailing component axis is present.
fn expect_shape(shape: &[usize], owner: &IndexBox) -> Result<(usize, bool), DecompError> {
    let d = owner.ndim();
    let expected = owner.shape();
    let ok = if shape.len() == d {
        shape == expected.as_slice()
    } else if shape.len() == d + 1 {
        shape[..d] == expected[..] && shape[d] >= 1
    } else {
        false
    };
    if !ok {
        return Err(DecompError::ShapeMismatch {
            expected,
            actual: shape.to_vec(),
        });
    }
    Ok(if shape.len() == d {
        (1, false)
    } else {
        (shape[d], true)
    })
}

/// Slicing closure selecting `region` (global coordinates) out of an array
/// whose spatial origin is `owner.lo`; any trailing component axis is taken
/// in full.
fn region_slices(owner: &IndexBox, region: &IndexBox) -> impl FnMut(AxisDescription) -> Slice {
    let d = owner.ndim();
    let lo: Vec<isize> = (0..d)
        .map(|k| (region.lo(k) - owner.lo(k)) as isize)
        .collect();
    let hi: Vec<isize> = (0..d)
        .map(|k| (region.hi(k) - owner.lo(k)) as isize)
        .collect();
    move |ax: AxisDescription| {
        let k = ax.axis.index();
        if k < d {
            Slice::from(lo[k]..=hi[k])
        } else {
            Slice::from(..)
        }
    }
}

/// Serialize the sub-array covering `region` (all components) behind a
/// [`WireHdr`]. Elements are packed in the logical row-major order of the
/// sliced view; the receiver unpacks in the same order by construction.
fn pack<T: Pod>(
    local: &ArrayViewD<'_, T>,
    owner: &IndexBox,
    region: &IndexBox,
    ncomp: usize,
) -> Vec<u8> {
    let view = local.slice_each_axis(region_slices(owner, region));
    let elems: Vec<T> = view.iter().copied().collect();
    debug_assert_eq!(elems.len(), region.num_cells() * ncomp);
    let hdr = WireHdr::new(region, ncomp, elems.len());
    let mut buf = Vec::with_capacity(HDR_BYTES + elems.len() * size_of::<T>());
    buf.extend_from_slice(bytes_of(&hdr));
    buf.extend_from_slice(cast_slice(&elems));
    buf
}

/// Validate a received buffer against the scheduled overlap and write its
/// elements into `out` at `region` translated into local index space.
fn unpack<T: Pod>(
    out: &mut ArrayD<T>,
    owner: &IndexBox,
    region: &IndexBox,
    ncomp: usize,
    bytes: &[u8],
    peer: usize,
) -> Result<(), DecompError> {
    let comm_err = |reason: String| DecompError::Comm { peer, reason };
    if bytes.len() < HDR_BYTES {
        return Err(comm_err(format!("short buffer: {} bytes", bytes.len())));
    }
    let hdr: WireHdr = pod_read_unaligned(&bytes[..HDR_BYTES]);
    if hdr.version() != WIRE_VERSION {
        return Err(comm_err(format!("wire version {}", hdr.version())));
    }
    let expected = region.num_cells() * ncomp;
    if hdr.region() != *region || hdr.ncomp() != ncomp || hdr.count() != expected {
        return Err(comm_err(format!(
            "buffer covers {:?} x{} ({} elements), schedule expects {:?} x{} ({} elements)",
            hdr.region(),
            hdr.ncomp(),
            hdr.count(),
            region,
            ncomp,
            expected
        )));
    }
    let payload = &bytes[HDR_BYTES..];
    if payload.len() != expected * size_of::<T>() {
        return Err(comm_err(format!(
            "payload is {} bytes, expected {}",
            payload.len(),
            expected * size_of::<T>()
        )));
    }
    let elems: Vec<T> = pod_collect_to_vec(payload);
    let mut view = out.slice_each_axis_mut(region_slices(owner, region));
    for (dst, src) in view.iter_mut().zip(elems) {
        *dst = src;
    }
    Ok(())
}
