//! Fixed, versioned, little-endian wire types for redistribution buffers.
//!
//! Every exchanged buffer starts with a [`WireHdr`] naming the overlap box,
//! the component count and the element count, so the receiving rank can
//! validate shape metadata before unpacking a single element. All
//! multi-byte integers are little-endian on the wire: stored pre-LE with
//! `.to_le()` and decoded with `from_le`.

use bytemuck::{Pod, Zeroable};
use std::mem::{align_of, size_of};

use crate::domain::index_box::IndexBox;

/// Highest spatial dimensionality carried on the wire.
pub const MAX_DIMS: usize = 3;

/// Bump when the layout or semantics change in incompatible ways.
pub const WIRE_VERSION: u16 = 1;

/// Header size in bytes; the element payload follows immediately.
pub const HDR_BYTES: usize = size_of::<WireHdr>();

#[repr(C)]
#[derive(Copy, Clone, Pod, Zeroable)]
pub struct WireHdr {
    pub version_le: u16, // = WIRE_VERSION.to_le()
    pub ndim_le: u16,
    pub ncomp_le: u32,
    pub lo_le: [u64; MAX_DIMS], // inclusive, unused axes zero
    pub hi_le: [u64; MAX_DIMS],
    pub count_le: u64, // element count including components
}

impl WireHdr {
    pub fn new(region: &IndexBox, ncomp: usize, count: usize) -> Self {
        let mut lo_le = [0u64; MAX_DIMS];
        let mut hi_le = [0u64; MAX_DIMS];
        for k in 0..region.ndim() {
            lo_le[k] = (region.lo(k) as u64).to_le();
            hi_le[k] = (region.hi(k) as u64).to_le();
        }
        Self {
            version_le: WIRE_VERSION.to_le(),
            ndim_le: (region.ndim() as u16).to_le(),
            ncomp_le: (ncomp as u32).to_le(),
            lo_le,
            hi_le,
            count_le: (count as u64).to_le(),
        }
    }

    pub fn version(&self) -> u16 {
        u16::from_le(self.version_le)
    }
    pub fn ndim(&self) -> usize {
        u16::from_le(self.ndim_le) as usize
    }
    pub fn ncomp(&self) -> usize {
        u32::from_le(self.ncomp_le) as usize
    }
    pub fn count(&self) -> usize {
        u64::from_le(self.count_le) as usize
    }

    /// The overlap box this buffer covers.
    pub fn region(&self) -> IndexBox {
        let d = self.ndim().min(MAX_DIMS);
        let lo = (0..d).map(|k| u64::from_le(self.lo_le[k]) as usize).collect();
        let hi = (0..d).map(|k| u64::from_le(self.hi_le[k]) as usize).collect();
        IndexBox::new(lo, hi)
    }
}

// ===== Compile-time sanity checks =========================================

const _: () = {
    // Pod/Zeroable ensures no padding contains uninit when cast to bytes.
    assert!(size_of::<WireHdr>() == 64);
    assert!(align_of::<WireHdr>() == 8);
};
