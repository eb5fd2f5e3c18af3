//! # pencil-decomp
//!
//! pencil-decomp losslessly redistributes structured-grid simulation data
//! between a block ("chunk") domain decomposition and a pencil
//! decomposition along a chosen axis, for parallel post-processing steps
//! (directional derivatives, 1D transforms) that need the full extent of
//! one axis on every rank.
//!
//! ## Pieces
//! - [`domain::GridPartition`]: immutable rectilinear tiling of the global
//!   grid, one box per rank
//! - [`domain::PencilPlan`]: derived partition with one axis unsplit
//! - [`schedule::resolve`]: the deterministic all-pairs overlap schedule
//!   between two partitions
//! - [`transpose::TransposeWrapper`]: the collective `to_pencil` /
//!   `from_pencil` exchange; round trips are bit-identical
//! - [`comm`]: pluggable communication backends (no-op, in-process
//!   threads, MPI behind the `mpi-support` feature)
//! - [`reader::ParallelChunkReader`]: per-rank chunk access over a serial
//!   data source
//!
//! ## Determinism
//!
//! Partitions, pencil plans and overlap schedules are pure functions of
//! `(domain, nproc, axis)` and identical on every rank, so each rank
//! derives the same communication schedule without any runtime discovery.
//! Schedule iteration is ordered by `(src, dst)` to keep buffer ordering
//! reproducible under test.
//!
//! ## Usage
//!
//! ```
//! use ndarray::Array3;
//! use pencil_decomp::comm::NoComm;
//! use pencil_decomp::domain::GridPartition;
//! use pencil_decomp::transpose::TransposeWrapper;
//!
//! let partition = GridPartition::new(&[8, 8, 8], 1)?;
//! let tw = TransposeWrapper::new(&partition, 0, NoComm)?;
//! let x = Array3::<f64>::zeros((8, 8, 8)).into_dyn();
//! let pencil = tw.to_pencil(&x)?;
//! let back: ndarray::ArrayD<f64> = tw.from_pencil(&pencil)?;
//! assert_eq!(back, x);
//! # Ok::<(), pencil_decomp::error::DecompError>(())
//! ```

pub mod comm;
pub mod domain;
pub mod error;
pub mod reader;
pub mod schedule;
pub mod transpose;
pub mod wire;

/// A convenient prelude importing the most-used traits & types.
pub mod prelude {
    #[cfg(feature = "mpi-support")]
    pub use crate::comm::MpiComm;
    pub use crate::comm::{Communicator, NoComm, ThreadComm, Wait};
    pub use crate::domain::{GridPartition, IndexBox, PencilPlan};
    pub use crate::error::DecompError;
    pub use crate::reader::{InMemoryReader, ParallelChunkReader, SerialBlockReader};
    pub use crate::schedule::{OverlapSchedule, resolve};
    pub use crate::transpose::TransposeWrapper;
}
