//! Multi-rank round-trip tests: every rank runs on its own thread over a
//! shared in-memory communicator universe, mirroring how the collective
//! exchange runs across processes.

use ndarray::{Array3, Array4, ArrayD, Slice};
use pencil_decomp::comm::{NoComm, ThreadComm};
use pencil_decomp::domain::{GridPartition, IndexBox};
use pencil_decomp::transpose::TransposeWrapper;

/// Run `f(rank, comm)` on one thread per rank; panics propagate.
fn run_ranks(p: usize, f: impl Fn(usize, ThreadComm) + Send + Sync) {
    let comms = ThreadComm::universe(p);
    std::thread::scope(|s| {
        for (rank, comm) in comms.into_iter().enumerate() {
            let f = &f;
            s.spawn(move || f(rank, comm));
        }
    });
}

/// `value(i,j,k) = i*100 + j*10 + k`, distinguishable per cell.
fn synthetic(domain: [usize; 3]) -> ArrayD<f64> {
    Array3::from_shape_fn((domain[0], domain[1], domain[2]), |(i, j, k)| {
        (i * 100 + j * 10 + k) as f64
    })
    .into_dyn()
}

/// Slice `region` out of a global array (component axis, if any, in full).
fn extract(global: &ArrayD<f64>, region: &IndexBox) -> ArrayD<f64> {
    let d = region.ndim();
    global
        .slice_each_axis(|ax| {
            let k = ax.axis.index();
            if k < d {
                Slice::from(region.lo(k) as isize..=region.hi(k) as isize)
            } else {
                Slice::from(..)
            }
        })
        .to_owned()
}

#[test]
fn scenario_8cubed_four_ranks_axis_x() {
    let domain = [8, 8, 8];
    let global = synthetic(domain);
    let partition = GridPartition::new(&domain, 4).unwrap();
    assert_eq!(partition.layout(), &[2, 2, 1]);

    run_ranks(4, |_, comm| {
        let tw = TransposeWrapper::new(&partition, 0, comm).unwrap();
        let chunk = extract(&global, tw.chunk_box());

        let pencil = tw.to_pencil(&chunk).unwrap();
        assert_eq!(pencil.shape(), &[8, 4, 4]);
        assert_eq!(tw.pencil_box().lo(0), 0);
        assert_eq!(tw.pencil_box().hi(0), 7);
        assert_eq!(pencil, extract(&global, tw.pencil_box()));

        let back: ArrayD<f64> = tw.from_pencil(&pencil).unwrap();
        assert_eq!(back, chunk);
    });
}

#[test]
fn scalar_round_trip_every_axis() {
    let domain = [8, 8, 8];
    let global = synthetic(domain);
    let partition = GridPartition::new(&domain, 4).unwrap();

    for axis in 0..3 {
        run_ranks(4, |_, comm| {
            let tw = TransposeWrapper::new(&partition, axis, comm).unwrap();
            let chunk = extract(&global, tw.chunk_box());
            let pencil = tw.to_pencil(&chunk).unwrap();
            assert_eq!(pencil, extract(&global, tw.pencil_box()));
            let back: ArrayD<f64> = tw.from_pencil(&pencil).unwrap();
            assert_eq!(back, chunk);
        });
    }
}

#[test]
fn vector_round_trip_every_axis() {
    let domain = [8, 8, 8];
    // Three components, each offset so components cannot be confused.
    let global = Array4::from_shape_fn((8, 8, 8, 3), |(i, j, k, c)| {
        (i * 100 + j * 10 + k) as f64 + (c as f64) * 1e4
    })
    .into_dyn();
    let partition = GridPartition::new(&domain, 4).unwrap();

    for axis in 0..3 {
        run_ranks(4, |_, comm| {
            let tw = TransposeWrapper::new(&partition, axis, comm).unwrap();
            let chunk = extract(&global, tw.chunk_box());
            let pencil = tw.to_pencil(&chunk).unwrap();
            let mut expected_shape = tw.pencil_box().shape();
            expected_shape.push(3);
            assert_eq!(pencil.shape(), expected_shape.as_slice());
            assert_eq!(pencil, extract(&global, tw.pencil_box()));
            let back: ArrayD<f64> = tw.from_pencil(&pencil).unwrap();
            assert_eq!(back, chunk);
        });
    }
}

#[test]
fn uneven_domain_round_trips() {
    // 7x5x4 over 4 ranks: remainder cells sit in the lowest-indexed
    // blocks, so chunk and pencil extents differ across ranks.
    let domain = [7, 5, 4];
    let global = synthetic(domain);
    let partition = GridPartition::new(&domain, 4).unwrap();

    for axis in 0..3 {
        run_ranks(4, |_, comm| {
            let tw = TransposeWrapper::new(&partition, axis, comm).unwrap();
            let chunk = extract(&global, tw.chunk_box());
            let pencil = tw.to_pencil(&chunk).unwrap();
            assert_eq!(pencil, extract(&global, tw.pencil_box()));
            let back: ArrayD<f64> = tw.from_pencil(&pencil).unwrap();
            assert_eq!(back, chunk);
        });
    }
}

#[test]
fn two_dimensional_round_trip() {
    let global = ndarray::Array2::from_shape_fn((8, 6), |(i, j)| (i * 10 + j) as f64).into_dyn();
    let partition = GridPartition::new(&[8, 6], 2).unwrap();

    for axis in 0..2 {
        run_ranks(2, |_, comm| {
            let tw = TransposeWrapper::new(&partition, axis, comm).unwrap();
            let chunk = extract(&global, tw.chunk_box());
            let pencil = tw.to_pencil(&chunk).unwrap();
            assert_eq!(pencil, extract(&global, tw.pencil_box()));
            let back: ArrayD<f64> = tw.from_pencil(&pencil).unwrap();
            assert_eq!(back, chunk);
        });
    }
}

#[test]
fn integer_elements_move_bit_identically() {
    let global = Array3::from_shape_fn((8, 8, 8), |(i, j, k)| (i * 100 + j * 10 + k) as u32)
        .into_dyn();
    let partition = GridPartition::new(&[8, 8, 8], 4).unwrap();

    run_ranks(4, |_, comm| {
        let tw = TransposeWrapper::new(&partition, 1, comm).unwrap();
        let d = tw.chunk_box().ndim();
        let chunk = global
            .slice_each_axis(|ax| {
                let k = ax.axis.index();
                if k < d {
                    Slice::from(
                        tw.chunk_box().lo(k) as isize..=tw.chunk_box().hi(k) as isize,
                    )
                } else {
                    Slice::from(..)
                }
            })
            .to_owned();
        let pencil = tw.to_pencil(&chunk).unwrap();
        let back: ArrayD<u32> = tw.from_pencil(&pencil).unwrap();
        assert_eq!(back, chunk);
    });
}

#[test]
fn degenerate_single_rank_is_a_noop_copy() {
    let domain = [8, 8, 8];
    let global = synthetic(domain);
    let partition = GridPartition::new(&domain, 1).unwrap();
    let tw = TransposeWrapper::new(&partition, 2, NoComm).unwrap();

    // Chunk and pencil partitions coincide with the full domain.
    assert_eq!(tw.chunk_box(), tw.pencil_box());
    let pencil = tw.to_pencil(&global).unwrap();
    assert_eq!(pencil, global);
    let back: ArrayD<f64> = tw.from_pencil(&pencil).unwrap();
    assert_eq!(back, global);
}

#[test]
fn wrapper_rejects_wrong_group_size() {
    let partition = GridPartition::new(&[8, 8, 8], 4).unwrap();
    run_ranks(2, |_, comm| {
        assert!(matches!(
            TransposeWrapper::new(&partition, 0, comm),
            Err(pencil_decomp::error::DecompError::PartitionMismatch {
                partition_ranks: 4,
                comm_ranks: 2
            })
        ));
    });
}
