//! Loggers and logging events for superstep execution.
//!
//! Events are plain serializable records, emitted through `tracing` under the `supersteps`
//! target. Summaries of supersteps and of termination are diagnostics: they are reported only in
//! verbose mode, and only by the leading worker, to avoid one copy per worker. Vertex failures are
//! always reported, by whichever worker observed them.

use serde::{Deserialize, Serialize};

use crate::scheduler::TerminationReason;
use crate::VertexId;

/// Possible superstep events.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SuperstepEvent {
    /// Setup completed for all vertices.
    Setup(SuperstepSummary),
    /// A superstep completed across all workers.
    Superstep(SuperstepSummary),
    /// A vertex invocation failed and was discarded.
    Failure(VertexFailure),
    /// The run terminated.
    Terminated(RunSummary),
}

/// Global counts and local timing for one superstep.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SuperstepSummary {
    /// The superstep number, zero for setup.
    pub superstep: usize,
    /// Vertices invoked by this worker.
    pub invoked: usize,
    /// Vertices left active, summed over workers.
    pub active: u64,
    /// Messages sent, summed over workers.
    pub messages: u64,
    /// Failed invocations, summed over workers.
    pub failures: u64,
    /// Time this worker spent in the superstep, including the barrier.
    pub elapsed_micros: u64,
}

impl From<SuperstepSummary> for SuperstepEvent {
    fn from(e: SuperstepSummary) -> Self {
        if e.superstep == 0 { SuperstepEvent::Setup(e) } else { SuperstepEvent::Superstep(e) }
    }
}

/// A discarded vertex invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VertexFailure {
    /// The superstep of the invocation.
    pub superstep: usize,
    /// The failing vertex.
    pub vertex: VertexId,
    /// The worker that ran it.
    pub worker: usize,
    /// A description of the failure.
    pub reason: String,
}

impl From<VertexFailure> for SuperstepEvent { fn from(e: VertexFailure) -> Self { SuperstepEvent::Failure(e) } }

/// The outcome of a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSummary {
    /// Why the run stopped.
    pub reason: TerminationReason,
    /// The last superstep executed.
    pub superstep: usize,
    /// Total time spent in the run, in microseconds.
    pub elapsed_micros: u64,
}

impl From<RunSummary> for SuperstepEvent { fn from(e: RunSummary) -> Self { SuperstepEvent::Terminated(e) } }

/// Routes superstep events of one worker to `tracing`.
#[derive(Copy, Clone, Debug)]
pub struct Logger {
    worker: usize,
    verbose: bool,
}

impl Logger {
    /// Creates a logger for `worker`.
    pub fn new(worker: usize, verbose: bool) -> Self {
        Logger { worker, verbose }
    }

    /// True if this logger reports diagnostics.
    pub fn reports(&self) -> bool {
        self.verbose && self.worker == 0
    }

    /// Logs an event.
    pub fn log<E: Into<SuperstepEvent>>(&self, event: E) {
        match event.into() {
            SuperstepEvent::Failure(failure) => {
                tracing::warn!(
                    target: "supersteps",
                    superstep = failure.superstep,
                    vertex = failure.vertex,
                    worker = failure.worker,
                    reason = %failure.reason,
                    "vertex invocation failed; state left unchanged",
                );
            }
            event if !self.reports() => {
                tracing::trace!(target: "supersteps", worker = self.worker, event = ?event);
            }
            SuperstepEvent::Setup(summary) | SuperstepEvent::Superstep(summary) => {
                tracing::info!(
                    target: "supersteps",
                    superstep = summary.superstep,
                    invoked = summary.invoked,
                    active = summary.active,
                    messages = summary.messages,
                    failures = summary.failures,
                    elapsed_micros = summary.elapsed_micros,
                    "superstep complete",
                );
            }
            SuperstepEvent::Terminated(termination) => {
                tracing::info!(
                    target: "supersteps",
                    reason = ?termination.reason,
                    superstep = termination.superstep,
                    elapsed_micros = termination.elapsed_micros,
                    "run terminated",
                );
            }
        }
    }
}
