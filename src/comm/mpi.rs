//! MPI-backed communicator (feature `mpi-support`).
//!
//! Wraps the world communicator of an `rsmpi` universe. Send buffers are
//! copied and leaked for the lifetime of the immediate request, then
//! reclaimed when the handle is waited on; the engine always drains every
//! handle before an operation returns.

use mpi::request::{Request, StaticScope};
use mpi::topology::SimpleCommunicator;
use mpi::traits::*;

use super::{Communicator, Wait};

pub struct MpiComm {
    universe: mpi::environment::Universe,
    rank: usize,
    size: usize,
}

// The universe handle carries no thread-affine state; MPI init/teardown is
// process-global and the engine only ever uses the comm from one thread.
unsafe impl Send for MpiComm {}
unsafe impl Sync for MpiComm {}

impl MpiComm {
    /// Initialize MPI and bind to the world communicator.
    ///
    /// Returns `None` if MPI was already initialized.
    pub fn new() -> Option<Self> {
        let universe = mpi::initialize()?;
        let world = universe.world();
        let rank = world.rank() as usize;
        let size = world.size() as usize;
        Some(Self {
            universe,
            rank,
            size,
        })
    }

    fn world(&self) -> SimpleCommunicator {
        self.universe.world()
    }
}

pub struct MpiSendHandle {
    req: Request<'static, [u8], StaticScope>,
    buf: *mut [u8],
}

impl Wait for MpiSendHandle {
    fn wait(self) -> Option<Vec<u8>> {
        self.req.wait();
        drop(unsafe { Box::from_raw(self.buf) });
        None
    }
}

pub struct MpiRecvHandle {
    req: Request<'static, [u8], StaticScope>,
    buf: *mut [u8],
}

impl Wait for MpiRecvHandle {
    fn wait(self) -> Option<Vec<u8>> {
        self.req.wait();
        let buf = unsafe { Box::from_raw(self.buf) };
        Some(buf.into_vec())
    }
}

impl Communicator for MpiComm {
    type SendHandle = MpiSendHandle;
    type RecvHandle = MpiRecvHandle;

    fn rank(&self) -> usize {
        self.rank
    }
    fn size(&self) -> usize {
        self.size
    }

    fn isend(&self, peer: usize, tag: u16, buf: &[u8]) -> MpiSendHandle {
        let data: &'static mut [u8] = Box::leak(buf.to_vec().into_boxed_slice());
        let ptr: *mut [u8] = data;
        let req = self
            .world()
            .process_at_rank(peer as i32)
            .immediate_send_with_tag(StaticScope, &*data, i32::from(tag));
        MpiSendHandle { req, buf: ptr }
    }

    fn irecv(&self, peer: usize, tag: u16, len: usize) -> MpiRecvHandle {
        let data: &'static mut [u8] = Box::leak(vec![0u8; len].into_boxed_slice());
        let ptr: *mut [u8] = data;
        let req = self
            .world()
            .process_at_rank(peer as i32)
            .immediate_receive_into_with_tag(StaticScope, data, i32::from(tag));
        MpiRecvHandle { req, buf: ptr }
    }
}
