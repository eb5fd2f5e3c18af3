//! Thin facade over intra-process or inter-process (MPI) message passing.
//!
//! Messages are contiguous byte slices. All handles are waitable but
//! non-blocking; the transpose engine calls `.wait()` before it trusts that
//! a buffer has arrived. The engine's correctness logic depends only on
//! this interface, so a single-process in-memory backend ([`ThreadComm`])
//! exercises the full exchange in unit tests.

use std::collections::VecDeque;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use bytes::Bytes;

#[cfg(feature = "mpi-support")]
pub mod mpi;
#[cfg(feature = "mpi-support")]
pub use mpi::MpiComm;

/// Non-blocking communication interface (minimal by design).
///
/// A communicator is bound to one process group: `rank()` identifies the
/// caller within it and `size()` is the group size the partition must match.
pub trait Communicator: Send + Sync + 'static {
    /// Handle returned by `isend`.
    type SendHandle: Wait;
    /// Handle returned by `irecv`.
    type RecvHandle: Wait;

    fn rank(&self) -> usize;
    fn size(&self) -> usize;

    fn isend(&self, peer: usize, tag: u16, buf: &[u8]) -> Self::SendHandle;
    /// Post a receive of up to `len` bytes from `peer`.
    fn irecv(&self, peer: usize, tag: u16, len: usize) -> Self::RecvHandle;
}

/// Anything that can be waited on.
pub trait Wait {
    /// Wait for completion and return the received data (if any).
    fn wait(self) -> Option<Vec<u8>>;
}

impl Wait for () {
    fn wait(self) -> Option<Vec<u8>> {
        None
    }
}

/// Compile-time no-op comm for single-rank use and pure serial unit tests.
///
/// A one-rank transpose never talks to a peer, so every exchange reduces to
/// the local self-overlap copy and these methods are never reached.
#[derive(Clone, Debug, Default)]
pub struct NoComm;

impl Communicator for NoComm {
    type SendHandle = ();
    type RecvHandle = ();

    fn rank(&self) -> usize {
        0
    }
    fn size(&self) -> usize {
        1
    }

    fn isend(&self, _peer: usize, _tag: u16, _buf: &[u8]) {}
    fn irecv(&self, _peer: usize, _tag: u16, _len: usize) {}
}

// --- ThreadComm: intra-process, one universe per process group ---

/// How long a receive waits before giving up and surfacing a comm failure.
const RECV_TIMEOUT: Duration = Duration::from_secs(30);

struct Message {
    src: usize,
    tag: u16,
    payload: Bytes,
}

struct Inbox {
    rx: Receiver<Message>,
    /// Arrived messages not yet claimed by a matching `irecv`.
    stash: VecDeque<Message>,
}

/// In-memory backend: a universe of `size` communicators sharing mpsc
/// channels, one per simulated rank. Delivery is FIFO per `(src, dst)`
/// pair, matching the ordered-delivery guarantee the engine assumes.
pub struct ThreadComm {
    rank: usize,
    size: usize,
    peers: Mutex<Vec<Sender<Message>>>,
    inbox: Arc<Mutex<Inbox>>,
}

impl ThreadComm {
    /// Create one communicator per rank, all wired to each other.
    pub fn universe(size: usize) -> Vec<ThreadComm> {
        let (txs, rxs): (Vec<_>, Vec<_>) = (0..size).map(|_| mpsc::channel::<Message>()).unzip();
        rxs.into_iter()
            .enumerate()
            .map(|(rank, rx)| ThreadComm {
                rank,
                size,
                peers: Mutex::new(txs.clone()),
                inbox: Arc::new(Mutex::new(Inbox {
                    rx,
                    stash: VecDeque::new(),
                })),
            })
            .collect()
    }
}

impl Communicator for ThreadComm {
    type SendHandle = ();
    type RecvHandle = ThreadRecvHandle;

    fn rank(&self) -> usize {
        self.rank
    }
    fn size(&self) -> usize {
        self.size
    }

    fn isend(&self, peer: usize, tag: u16, buf: &[u8]) {
        let msg = Message {
            src: self.rank,
            tag,
            payload: Bytes::copy_from_slice(buf),
        };
        if let Ok(peers) = self.peers.lock() {
            // A closed channel means the peer is gone; its receives will
            // time out and report the failure on that side.
            let _ = peers[peer].send(msg);
        }
    }

    fn irecv(&self, peer: usize, tag: u16, len: usize) -> ThreadRecvHandle {
        ThreadRecvHandle {
            inbox: Arc::clone(&self.inbox),
            peer,
            tag,
            len,
        }
    }
}

/// Pending receive on a [`ThreadComm`].
pub struct ThreadRecvHandle {
    inbox: Arc<Mutex<Inbox>>,
    peer: usize,
    tag: u16,
    len: usize,
}

impl Wait for ThreadRecvHandle {
    fn wait(self) -> Option<Vec<u8>> {
        let mut inbox = self.inbox.lock().ok()?;
        let matches = |m: &Message| m.src == self.peer && m.tag == self.tag;
        if let Some(pos) = inbox.stash.iter().position(matches) {
            return inbox.stash.remove(pos).map(|m| clip(&m.payload, self.len));
        }
        loop {
            match inbox.rx.recv_timeout(RECV_TIMEOUT) {
                Ok(m) if matches(&m) => return Some(clip(&m.payload, self.len)),
                Ok(m) => inbox.stash.push_back(m),
                Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => {
                    return None;
                }
            }
        }
    }
}

fn clip(payload: &Bytes, len: usize) -> Vec<u8> {
    payload[..payload.len().min(len)].to_vec()
}
