//! The superstep scheduler.
//!
//! A [`Scheduler`] runs on one timely worker and drives the vertices that worker owns. All
//! workers run their schedulers in lockstep: each superstep ends in a barrier on the message
//! bus, and every worker leaves the barrier with the same global [`Tally`], from which each
//! decides, identically, whether to continue.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use serde::{Deserialize, Serialize};

use timely::communication::Allocate;
use timely::worker::Worker;

use crate::analyser::Analyser;
use crate::bus::{Generation, MessageBus, Tally};
use crate::context::{ExecutionContext, VertexContext};
use crate::error::ComputeError;
use crate::graph::TemporalGraph;
use crate::logging::{Logger, RunSummary, SuperstepSummary, VertexFailure};
use crate::state::VertexStore;
use crate::VertexId;

/// Why a run stopped.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TerminationReason {
    /// No vertex was active and no message was in flight.
    Converged,
    /// The iteration cap was reached first.
    IterationLimitExceeded,
    /// Cancellation was requested and observed at a barrier.
    Cancelled,
}

/// The outcome of a run.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Termination {
    /// Why the run stopped.
    pub reason: TerminationReason,
    /// The number of `analyse` supersteps executed, not counting setup.
    pub supersteps: usize,
}

/// A shared flag requesting that a run stop at its next barrier.
#[derive(Clone, Debug, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    /// A token not yet cancelled.
    pub fn new() -> Self { Self::default() }
    /// Requests cancellation.
    pub fn cancel(&self) { self.flag.store(true, Ordering::SeqCst); }
    /// True once cancellation has been requested.
    pub fn is_cancelled(&self) -> bool { self.flag.load(Ordering::SeqCst) }
}

/// Drives one worker's vertices through setup and supersteps.
pub struct Scheduler<'w, W: Allocate, G: TemporalGraph, A: Analyser<G>> {
    worker: &'w mut Worker<W>,
    graph: Arc<G>,
    analyser: Arc<A>,
    execution: ExecutionContext,
    store: VertexStore<A::State>,
    bus: MessageBus<A::Message>,
    cancel: CancelToken,
    logger: Logger,
}

impl<'w, W, G, A> Scheduler<'w, W, G, A>
where
    W: Allocate,
    G: TemporalGraph,
    A: Analyser<G>,
{
    /// Creates a scheduler for the vertices of `graph` owned by `worker`.
    ///
    /// This builds a dataflow, and so must be called by every worker of the computation.
    pub fn new(worker: &'w mut Worker<W>, graph: Arc<G>, analyser: Arc<A>) -> Self {
        let execution = ExecutionContext::new(worker.index(), worker.peers());
        let bus = MessageBus::new(worker);
        let store = VertexStore::new(graph.vertices().into_iter().filter(|vertex| execution.owns(*vertex)));
        Scheduler {
            worker,
            graph,
            analyser,
            execution,
            store,
            bus,
            cancel: CancelToken::new(),
            logger: Logger::new(execution.worker, false),
        }
    }

    /// Observes `cancel` at every barrier.
    pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Enables per-superstep diagnostics.
    pub fn verbose(mut self, verbose: bool) -> Self {
        self.logger = Logger::new(self.execution.worker, verbose);
        self
    }

    /// The worker this scheduler runs on.
    pub fn execution(&self) -> ExecutionContext { self.execution }

    /// The vertices this worker owns, with their current state.
    pub fn store(&self) -> &VertexStore<A::State> { &self.store }

    /// Runs setup, then supersteps until convergence, cancellation, or `max_iterations`.
    pub fn run(&mut self, max_iterations: usize) -> Termination {

        let started = Instant::now();

        let (mut inbox, mut tally) = self.setup();
        let mut superstep = 0;

        let reason = loop {
            if superstep > 0 && tally.quiescent() {
                break TerminationReason::Converged;
            }
            if tally.cancelled {
                break TerminationReason::Cancelled;
            }
            if superstep >= max_iterations {
                break TerminationReason::IterationLimitExceeded;
            }
            superstep += 1;
            let (next, next_tally) = self.superstep(superstep, inbox);
            inbox = next;
            tally = next_tally;
        };

        if !inbox.is_empty() {
            tracing::debug!(
                target: "supersteps",
                worker = self.execution.worker,
                undelivered = inbox.len(),
                "messages left unread at termination",
            );
        }

        self.logger.log(RunSummary {
            reason,
            superstep,
            elapsed_micros: started.elapsed().as_micros() as u64,
        });

        Termination { reason, supersteps: superstep }
    }

    /// Extracts the records of every vertex this worker owns.
    pub fn records(&self) -> Vec<A::Record> {
        let mut records = Vec::new();
        for (vertex, slot) in self.store.iter() {
            self.analyser.extract(vertex, &self.graph, &slot.state, &mut records);
        }
        records
    }

    /// Superstep zero: every vertex runs `setup`, and all vertices start out active.
    fn setup(&mut self) -> (Generation<A::Message>, Tally) {
        let started = Instant::now();
        let vertices = self.store.iter().map(|(vertex, _)| vertex).collect::<Vec<_>>();
        let mut failed = 0;
        for &vertex in vertices.iter() {
            if !self.invoke(vertex, 0, &[]) {
                failed += 1;
            }
        }
        self.store.activate_all();
        self.close(0, vertices.len(), failed, started)
    }

    /// Superstep `superstep`, reading `inbox`.
    fn superstep(&mut self, superstep: usize, mut inbox: Generation<A::Message>) -> (Generation<A::Message>, Tally) {
        let started = Instant::now();
        let active = self
            .store
            .iter()
            .filter(|(vertex, slot)| !slot.halted() || inbox.contains(*vertex))
            .map(|(vertex, _)| vertex)
            .collect::<Vec<_>>();
        let mut failed = 0;
        for &vertex in active.iter() {
            let messages = inbox.take(vertex);
            if !self.invoke(vertex, superstep, &messages) {
                failed += 1;
            }
        }
        if !inbox.is_empty() {
            tracing::debug!(
                target: "supersteps",
                worker = self.execution.worker,
                superstep,
                dropped = inbox.len(),
                "messages addressed to unknown vertices",
            );
        }
        self.close(superstep, active.len(), failed, started)
    }

    /// Runs one invocation against a copy of the vertex state.
    ///
    /// The copy, the vote, and the outbox are committed only if the invocation returns `Ok`.
    /// Returns false if the invocation failed.
    fn invoke(&mut self, vertex: VertexId, superstep: usize, messages: &[A::Message]) -> bool {

        let mut state = match self.store.get(vertex) {
            Some(slot) => slot.state.clone(),
            None => return true,
        };
        let mut outbox = Vec::new();

        let outcome = {
            let mut context = VertexContext::new(vertex, superstep, &*self.graph, self.execution, &mut state, &mut outbox);
            let analyser = &self.analyser;
            let result = panic::catch_unwind(AssertUnwindSafe(|| {
                if superstep == 0 {
                    analyser.setup(&mut context)
                } else {
                    analyser.analyse(&mut context, messages)
                }
            }));
            match result {
                Ok(Ok(())) => Ok(context.voted_to_halt()),
                Ok(Err(error)) => Err(error),
                Err(payload) => Err(ComputeError::Panicked { vertex, reason: panic_reason(payload) }),
            }
        };

        match outcome {
            Ok(halted) => {
                self.store.commit(vertex, state, halted && superstep > 0);
                for (target, message) in outbox {
                    self.bus.post(target, message);
                }
                true
            }
            Err(error) => {
                self.logger.log(VertexFailure {
                    superstep,
                    vertex,
                    worker: self.execution.worker,
                    reason: error.to_string(),
                });
                false
            }
        }
    }

    /// Publishes this worker's tally and waits at the barrier.
    fn close(&mut self, superstep: usize, invoked: usize, failed: u64, started: Instant) -> (Generation<A::Message>, Tally) {
        let local = Tally {
            active: self.store.active_count() as u64,
            sent: self.bus.pending(),
            failed,
            cancelled: self.cancel.is_cancelled(),
        };
        self.bus.publish(local);
        let (generation, tally) = self.bus.barrier(self.worker);
        self.logger.log(SuperstepSummary {
            superstep,
            invoked,
            active: tally.active,
            messages: tally.sent,
            failures: tally.failed,
            elapsed_micros: started.elapsed().as_micros() as u64,
        });
        (generation, tally)
    }
}

fn panic_reason(payload: Box<dyn Any + Send>) -> String {
    if let Some(reason) = payload.downcast_ref::<&str>() {
        (*reason).to_string()
    } else if let Some(reason) = payload.downcast_ref::<String>() {
        reason.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::{panic_reason, CancelToken};

    #[test]
    fn cancel_tokens_are_shared() {
        let token = CancelToken::new();
        let clone = token.clone();
        assert!(!clone.is_cancelled());
        token.cancel();
        assert!(clone.is_cancelled());
    }

    #[test]
    fn panic_payloads() {
        assert_eq!(panic_reason(Box::new("static")), "static");
        assert_eq!(panic_reason(Box::new(String::from("owned"))), "owned");
        assert_eq!(panic_reason(Box::new(7)), "non-string panic payload");
    }
}
