//! End-to-end pipeline: per-rank chunks come from a ParallelChunkReader,
//! get transposed to pencils, and the reassembled pencil view must equal
//! the original global array cell for cell.

use std::sync::Mutex;

use ndarray::{Array3, ArrayD, Slice};
use pencil_decomp::comm::ThreadComm;
use pencil_decomp::domain::GridPartition;
use pencil_decomp::reader::{InMemoryReader, ParallelChunkReader};
use pencil_decomp::transpose::TransposeWrapper;

fn run_ranks(p: usize, f: impl Fn(usize, ThreadComm) + Send + Sync) {
    let comms = ThreadComm::universe(p);
    std::thread::scope(|s| {
        for (rank, comm) in comms.into_iter().enumerate() {
            let f = &f;
            s.spawn(move || f(rank, comm));
        }
    });
}

fn synthetic(domain: [usize; 3]) -> ArrayD<f64> {
    Array3::from_shape_fn((domain[0], domain[1], domain[2]), |(i, j, k)| {
        (i * 100 + j * 10 + k) as f64
    })
    .into_dyn()
}

#[test]
fn reassembled_pencils_reproduce_the_global_array() {
    let domain = [8, 8, 8];
    let nproc = 4;
    let global = synthetic(domain);

    for axis in 0..3 {
        let pencils: Mutex<Vec<Option<ArrayD<f64>>>> = Mutex::new(vec![None; nproc]);
        let plan_boxes: Mutex<Vec<Option<pencil_decomp::domain::IndexBox>>> =
            Mutex::new(vec![None; nproc]);

        run_ranks(nproc, |rank, comm| {
            // Each rank reads its own chunk through the reader layer, the
            // way a dataset would be ingested in production.
            let mut reader = InMemoryReader::new(&domain);
            reader.insert("density", global.clone()).unwrap();
            let pr = ParallelChunkReader::new(reader, nproc, rank).unwrap();
            let chunk = pr.read("density").unwrap();

            let tw = TransposeWrapper::new(pr.partition(), axis, comm).unwrap();
            let pencil = tw.to_pencil(&chunk).unwrap();

            plan_boxes.lock().unwrap()[rank] = Some(tw.pencil_box().clone());
            pencils.lock().unwrap()[rank] = Some(pencil);
        });

        let mut assembled = ArrayD::<f64>::zeros(ndarray::IxDyn(&domain));
        let pencils = pencils.into_inner().unwrap();
        let plan_boxes = plan_boxes.into_inner().unwrap();
        for (pencil, b) in pencils.into_iter().zip(plan_boxes) {
            let (pencil, b) = (pencil.unwrap(), b.unwrap());
            let mut slot = assembled.slice_each_axis_mut(|ax| {
                let k = ax.axis.index();
                Slice::from(b.lo(k) as isize..=b.hi(k) as isize)
            });
            slot.assign(&pencil);
        }
        assert_eq!(assembled, global, "axis {axis}");
    }
}

#[test]
fn chunk_assembly_matches_pencil_assembly_on_uneven_domain() {
    let domain = [9, 7, 5];
    let nproc = 4;
    let global = synthetic(domain);
    let partition = GridPartition::new(&domain, nproc).unwrap();

    let pencils: Mutex<Vec<Option<ArrayD<f64>>>> = Mutex::new(vec![None; nproc]);
    let boxes: Mutex<Vec<Option<pencil_decomp::domain::IndexBox>>> =
        Mutex::new(vec![None; nproc]);

    run_ranks(nproc, |rank, comm| {
        let tw = TransposeWrapper::new(&partition, 1, comm).unwrap();
        let d = tw.chunk_box().ndim();
        let chunk = global
            .slice_each_axis(|ax| {
                let k = ax.axis.index();
                if k < d {
                    Slice::from(tw.chunk_box().lo(k) as isize..=tw.chunk_box().hi(k) as isize)
                } else {
                    Slice::from(..)
                }
            })
            .to_owned();
        let pencil = tw.to_pencil(&chunk).unwrap();
        boxes.lock().unwrap()[rank] = Some(tw.pencil_box().clone());
        pencils.lock().unwrap()[rank] = Some(pencil);
    });

    let mut assembled = ArrayD::<f64>::zeros(ndarray::IxDyn(&domain));
    for (pencil, b) in pencils
        .into_inner()
        .unwrap()
        .into_iter()
        .zip(boxes.into_inner().unwrap())
    {
        let (pencil, b) = (pencil.unwrap(), b.unwrap());
        let mut slot = assembled.slice_each_axis_mut(|ax| {
            let k = ax.axis.index();
            Slice::from(b.lo(k) as isize..=b.hi(k) as isize)
        });
        slot.assign(&pencil);
    }
    assert_eq!(assembled, global);
}
