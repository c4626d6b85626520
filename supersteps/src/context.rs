//! Contexts handed to analysers.

use crate::graph::TemporalGraph;
use crate::{Time, VertexId};

/// The worker executing a computation, and the size of the cluster.
///
/// Analysers receive this explicitly with every invocation. It is intended for partition-aware
/// iteration and for gating diagnostics, never for correctness.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct ExecutionContext {
    /// Index of this worker.
    pub worker: usize,
    /// Total number of workers.
    pub peers: usize,
}

impl ExecutionContext {
    /// Creates a context for worker `worker` of `peers`.
    pub fn new(worker: usize, peers: usize) -> Self {
        ExecutionContext { worker, peers: peers.max(1) }
    }
    /// The worker responsible for `vertex`.
    #[inline]
    pub fn owner(&self, vertex: VertexId) -> usize {
        (vertex % self.peers as u64) as usize
    }
    /// True if this worker is responsible for `vertex`.
    #[inline]
    pub fn owns(&self, vertex: VertexId) -> bool {
        self.owner(vertex) == self.worker
    }
    /// True for the one worker designated to report diagnostics.
    #[inline]
    pub fn is_leader(&self) -> bool {
        self.worker == 0
    }
}

/// Everything one `setup` or `analyse` invocation may see and touch.
///
/// The state is the vertex's own, and the outbox collects messages for the next superstep.
/// Neither is committed until the invocation returns successfully.
pub struct VertexContext<'a, G, S, M> {
    vertex: VertexId,
    superstep: usize,
    graph: &'a G,
    execution: ExecutionContext,
    state: &'a mut S,
    outbox: &'a mut Vec<(VertexId, M)>,
    halt: bool,
}

impl<'a, G: TemporalGraph, S, M: Clone> VertexContext<'a, G, S, M> {
    /// Assembles a context. Votes start out as "active".
    pub fn new(
        vertex: VertexId,
        superstep: usize,
        graph: &'a G,
        execution: ExecutionContext,
        state: &'a mut S,
        outbox: &'a mut Vec<(VertexId, M)>,
    ) -> Self {
        VertexContext { vertex, superstep, graph, execution, state, outbox, halt: false }
    }

    /// The vertex being computed.
    #[inline] pub fn id(&self) -> VertexId { self.vertex }
    /// The current superstep; zero during `setup`.
    #[inline] pub fn superstep(&self) -> usize { self.superstep }
    /// The graph being analysed.
    #[inline] pub fn graph(&self) -> &'a G { self.graph }
    /// The executing worker.
    #[inline] pub fn execution(&self) -> &ExecutionContext { &self.execution }
    /// The vertex's state.
    #[inline] pub fn state(&self) -> &S { &*self.state }
    /// Mutable access to the vertex's state.
    #[inline] pub fn state_mut(&mut self) -> &mut S { &mut *self.state }

    /// True if `vertex` is alive in `[time, time + window)`.
    pub fn alive_within(&self, time: Time, window: Time) -> bool {
        self.graph.alive_within(self.vertex, time, window)
    }

    /// Sends `message` to `target`, for delivery in the next superstep.
    pub fn send(&mut self, target: VertexId, message: M) {
        self.outbox.push((target, message));
    }

    /// Sends `message` to every structural neighbour, for delivery in the next superstep.
    ///
    /// Returns the number of recipients.
    pub fn send_to_neighbours(&mut self, message: M) -> usize {
        let neighbours = self.graph.neighbours(self.vertex);
        let mut sent = 0;
        for neighbour in neighbours {
            if neighbour != self.vertex {
                self.outbox.push((neighbour, message.clone()));
                sent += 1;
            }
        }
        sent
    }

    /// Excludes the vertex from later supersteps, until a message arrives for it.
    ///
    /// Votes cast during `setup` are ignored.
    pub fn vote_to_halt(&mut self) {
        self.halt = true;
    }

    /// True if the vertex has voted to halt in this invocation.
    pub fn voted_to_halt(&self) -> bool {
        self.halt
    }
}
