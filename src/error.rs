//! DecompError: unified error type for pencil-decomp public APIs.
//!
//! Every failure a caller can observe is one of these variants. Errors are
//! raised synchronously on the rank that detects them; because the exchange
//! is collective, a rank that errors out of a transpose must be assumed to
//! strand its peers, and the caller should abort the whole process group.

use thiserror::Error;

/// Unified error type for pencil-decomp operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DecompError {
    /// The global domain cannot be rectilinearly tiled into the requested
    /// number of blocks under the factorization policy.
    #[error("domain {domain:?} cannot be tiled into {nproc} blocks: {reason}")]
    InvalidPartition {
        domain: Vec<usize>,
        nproc: usize,
        reason: String,
    },
    /// A local array's shape disagrees with the box the partition assigns
    /// to this rank (an optional trailing component axis is allowed).
    #[error("local array shape {actual:?} does not match rank box shape {expected:?}")]
    ShapeMismatch {
        expected: Vec<usize>,
        actual: Vec<usize>,
    },
    /// A wrapper was invoked against a communicator whose process group
    /// does not match the partition it was built from.
    #[error("partition describes {partition_ranks} ranks but communicator has {comm_ranks}")]
    PartitionMismatch {
        partition_ranks: usize,
        comm_ranks: usize,
    },
    /// The message-passing substrate failed. Fatal; never retried.
    #[error("communication with rank {peer} failed: {reason}")]
    Comm { peer: usize, reason: String },
    /// A reader was asked for a field it does not carry.
    #[error("unknown field `{0}`")]
    UnknownField(String),
}
