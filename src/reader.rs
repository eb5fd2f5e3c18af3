//! ParallelChunkReader: per-rank chunk access over a serial reader.
//!
//! The redistribution engine never fetches data itself; this thin layer
//! owns the [`GridPartition`] for the life of a dataset and produces each
//! rank's chunk-local field data by restricting a serial reader to that
//! rank's box. File-format readers live outside this crate; tests use the
//! in-memory implementation below.

use std::collections::BTreeMap;

use ndarray::{ArrayD, Slice};

use crate::domain::index_box::IndexBox;
use crate::domain::partition::GridPartition;
use crate::error::DecompError;

/// A serial data source that can read any rectangular sub-domain.
///
/// Returned arrays carry the box's spatial shape plus an optional trailing
/// component axis for vector fields.
pub trait SerialBlockReader {
    /// Global domain extents.
    fn domain(&self) -> Vec<usize>;
    /// Read `name` restricted to `region`.
    fn read_box(&self, name: &str, region: &IndexBox) -> Result<ArrayD<f64>, DecompError>;
}

/// Per-rank view over a serial reader, bound to one partition.
pub struct ParallelChunkReader<R> {
    reader: R,
    partition: GridPartition,
    rank: usize,
}

impl<R: SerialBlockReader> ParallelChunkReader<R> {
    /// Partition the reader's domain over `nproc` ranks and bind to `rank`.
    pub fn new(reader: R, nproc: usize, rank: usize) -> Result<Self, DecompError> {
        let domain = reader.domain();
        let partition = GridPartition::new(&domain, nproc)?;
        if rank >= nproc {
            return Err(DecompError::PartitionMismatch {
                partition_ranks: nproc,
                comm_ranks: rank + 1,
            });
        }
        Ok(Self {
            reader,
            partition,
            rank,
        })
    }

    /// The partition this reader distributes data over.
    pub fn partition(&self) -> &GridPartition {
        &self.partition
    }

    /// This rank's chunk box.
    pub fn chunk(&self) -> &IndexBox {
        self.partition.rank_box(self.rank)
    }

    /// Read this rank's chunk of field `name`.
    pub fn read(&self, name: &str) -> Result<ArrayD<f64>, DecompError> {
        let chunk = self.chunk();
        let data = self.reader.read_box(name, chunk)?;
        let d = chunk.ndim();
        let expected = chunk.shape();
        let ok = (data.ndim() == d || data.ndim() == d + 1)
            && data.shape()[..d] == expected[..]
            && (data.ndim() == d || data.shape()[d] >= 1);
        if !ok {
            return Err(DecompError::ShapeMismatch {
                expected,
                actual: data.shape().to_vec(),
            });
        }
        Ok(data)
    }
}

/// Serial reader over global in-memory arrays; the test-suite stand-in for
/// a file-format reader.
pub struct InMemoryReader {
    domain: Vec<usize>,
    fields: BTreeMap<String, ArrayD<f64>>,
}

impl InMemoryReader {
    pub fn new(domain: &[usize]) -> Self {
        Self {
            domain: domain.to_vec(),
            fields: BTreeMap::new(),
        }
    }

    /// Register a global field array (spatial shape = domain, optional
    /// trailing component axis).
    pub fn insert(&mut self, name: &str, data: ArrayD<f64>) -> Result<(), DecompError> {
        let d = self.domain.len();
        let ok = (data.ndim() == d || data.ndim() == d + 1)
            && data.shape()[..d] == self.domain[..]
            && (data.ndim() == d || data.shape()[d] >= 1);
        if !ok {
            return Err(DecompError::ShapeMismatch {
                expected: self.domain.clone(),
                actual: data.shape().to_vec(),
            });
        }
        self.fields.insert(name.to_string(), data);
        Ok(())
    }
}

impl SerialBlockReader for InMemoryReader {
    fn domain(&self) -> Vec<usize> {
        self.domain.clone()
    }

    fn read_box(&self, name: &str, region: &IndexBox) -> Result<ArrayD<f64>, DecompError> {
        let data = self
            .fields
            .get(name)
            .ok_or_else(|| DecompError::UnknownField(name.to_string()))?;
        let d = region.ndim();
        let view = data.slice_each_axis(|ax| {
            let k = ax.axis.index();
            if k < d {
                Slice::from(region.lo(k) as isize..=region.hi(k) as isize)
            } else {
                Slice::from(..)
            }
        });
        Ok(view.to_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array3;

    fn synthetic(domain: &[usize; 3]) -> ArrayD<f64> {
        Array3::from_shape_fn((domain[0], domain[1], domain[2]), |(i, j, k)| {
            (i * 100 + j * 10 + k) as f64
        })
        .into_dyn()
    }

    #[test]
    fn each_rank_reads_its_own_chunk() {
        let domain = [8, 8, 8];
        let global = synthetic(&domain);
        for rank in 0..4 {
            let mut reader = InMemoryReader::new(&domain);
            reader.insert("density", global.clone()).unwrap();
            let pr = ParallelChunkReader::new(reader, 4, rank).unwrap();
            let chunk = pr.chunk().clone();
            let local = pr.read("density").unwrap();
            assert_eq!(local.shape(), chunk.shape().as_slice());
            assert_eq!(
                local[[0, 0, 0]],
                (chunk.lo(0) * 100 + chunk.lo(1) * 10 + chunk.lo(2)) as f64
            );
        }
    }

    #[test]
    fn unknown_field_errors() {
        let reader = InMemoryReader::new(&[4, 4]);
        let pr = ParallelChunkReader::new(reader, 1, 0).unwrap();
        assert!(matches!(
            pr.read("missing"),
            Err(DecompError::UnknownField(_))
        ));
    }

    #[test]
    fn insert_rejects_wrong_global_shape() {
        let mut reader = InMemoryReader::new(&[4, 4]);
        let bad = ndarray::Array2::<f64>::zeros((4, 5)).into_dyn();
        assert!(matches!(
            reader.insert("f", bad),
            Err(DecompError::ShapeMismatch { .. })
        ));
    }

    #[test]
    fn rank_out_of_range_is_rejected() {
        let reader = InMemoryReader::new(&[8, 8]);
        assert!(ParallelChunkReader::new(reader, 2, 2).is_err());
    }
}
