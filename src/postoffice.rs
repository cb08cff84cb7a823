//! Cross-thread message routing within one host.
//!
//! Each scheduler owns a [`PostOffice`]: an [`Inbound`] queue that peer
//! schedulers push into, plus a peer table mapping postcodes to the other
//! schedulers' inbound queues. The peer table is populated once at host
//! startup and immutable afterwards.
//!
//! # Locking rule
//!
//! The inbound lock is the only mutable state shared across threads, and
//! critical sections are minimal: push one message, or pop a batch into a
//! local buffer. A thread holds at most one inbound lock at a time and
//! never calls back into routing while holding it; the drain is therefore
//! two-phase (pop under the lock, deliver after release), which rules out
//! lock cycles through a peer's push.

use std::collections::hash_map::Entry;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::addr::PostCode;
use crate::error::RouteFailure;
use crate::msg::Msg;
use crate::tracing_compat::trace;

/// Maximum number of messages popped from the inbound queue per drain.
pub const INBOUND_DRAIN_BATCH: usize = 30;

/// Default capacity of an inbound queue.
pub const DEFAULT_INBOUND_CAPACITY: usize = 100_000;

/// A multi-producer, single-consumer cross-thread message queue.
///
/// Producers are peer schedulers; the sole consumer is the owning
/// scheduler's drain step.
#[derive(Debug)]
pub struct Inbound {
    queue: Mutex<VecDeque<Msg>>,
    capacity: usize,
}

impl Inbound {
    /// Creates a queue bounded at `capacity` messages.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            queue: Mutex::new(VecDeque::new()),
            capacity,
        }
    }

    /// Enqueues a message, handing it back if the queue is at capacity.
    pub fn push(&self, msg: Msg) -> Result<(), Msg> {
        let mut queue = self.queue.lock();
        if queue.len() >= self.capacity {
            return Err(msg);
        }
        queue.push_back(msg);
        Ok(())
    }

    /// Pops up to `max` messages into `buf`, returning how many.
    ///
    /// The lock is released before this returns; delivery of the popped
    /// messages must happen outside it.
    pub fn drain_into(&self, max: usize, buf: &mut Vec<Msg>) -> usize {
        let mut queue = self.queue.lock();
        let n = queue.len().min(max);
        buf.extend(queue.drain(..n));
        n
    }

    /// Number of queued messages.
    #[must_use]
    pub fn len(&self) -> usize {
        self.queue.lock().len()
    }

    /// Returns true if nothing is queued.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.queue.lock().is_empty()
    }
}

/// Per-scheduler router for messages whose target lives on another
/// scheduler of the same host.
#[derive(Debug)]
pub struct PostOffice {
    postcode: PostCode,
    inbound: Arc<Inbound>,
    peers: HashMap<PostCode, Arc<Inbound>>,
}

impl PostOffice {
    /// Creates a post office for the scheduler at `postcode`.
    #[must_use]
    pub fn new(postcode: PostCode, inbound_capacity: usize) -> Self {
        Self {
            postcode,
            inbound: Arc::new(Inbound::new(inbound_capacity)),
            peers: HashMap::new(),
        }
    }

    /// The owning scheduler's postcode.
    #[must_use]
    pub const fn postcode(&self) -> &PostCode {
        &self.postcode
    }

    /// A shared handle to the own inbound queue, for peers to push into.
    #[must_use]
    pub fn inbound(&self) -> Arc<Inbound> {
        Arc::clone(&self.inbound)
    }

    /// Returns true if the own inbound queue is empty.
    #[must_use]
    pub fn inbound_is_empty(&self) -> bool {
        self.inbound.is_empty()
    }

    /// Registers peer inbound queues. Idempotent; the own postcode is
    /// skipped so a full host list can be passed as-is.
    pub fn add_peers<I>(&mut self, peers: I)
    where
        I: IntoIterator<Item = (PostCode, Arc<Inbound>)>,
    {
        for (postcode, inbound) in peers {
            if postcode == self.postcode {
                continue;
            }
            if let Entry::Vacant(entry) = self.peers.entry(postcode) {
                entry.insert(inbound);
            }
        }
    }

    /// The registered peer postcodes, in no particular order.
    pub fn peer_postcodes(&self) -> impl Iterator<Item = &PostCode> {
        self.peers.keys()
    }

    /// Accepts a message for cross-thread delivery.
    ///
    /// Pushes into the target scheduler's inbound queue under its lock and
    /// releases immediately. On failure the message comes back with the
    /// reason so the caller can notify the sender.
    pub fn route_remote(&self, msg: Msg) -> Result<(), (RouteFailure, Msg)> {
        let target = msg.target.postcode();
        if !target.same_process(&self.postcode) {
            return Err((RouteFailure::CrossHost, msg));
        }
        let Some(peer) = self.peers.get(target) else {
            return Err((RouteFailure::UnknownPeer, msg));
        };
        trace!(from = %self.postcode, to = %target, kind = msg.body.kind(), "routing cross-thread");
        peer.push(msg).map_err(|msg| (RouteFailure::QueueFull, msg))
    }

    /// Pops up to [`INBOUND_DRAIN_BATCH`] messages from the own inbound
    /// queue into `buf`, two-phase: the lock is gone before delivery.
    pub fn drain_into(&self, buf: &mut Vec<Msg>) -> usize {
        self.inbound.drain_into(INBOUND_DRAIN_BATCH, buf)
    }
}
