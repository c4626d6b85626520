//! The unit of vertex-centric computation.

use crate::context::VertexContext;
use crate::error::ComputeError;
use crate::graph::TemporalGraph;
use crate::{Message, VertexId};

/// A computation run once per vertex per superstep.
///
/// Implementations describe what one vertex does; the [`Scheduler`](crate::Scheduler) decides
/// when it runs. Within a superstep invocations may happen in any order and on any worker, and
/// no invocation observes another's output for the same superstep. Each invocation reads only
/// its own state and inbox, and writes only its own state and outgoing messages.
///
/// Results are read out after termination in two parts. [`extract`](Analyser::extract) runs
/// on the worker owning each vertex, and [`return_results`](Analyser::return_results) runs once,
/// over the records gathered from every worker.
pub trait Analyser<G: TemporalGraph> {
    /// Per-vertex state, created by `Default` before `setup`.
    type State: Clone + Default;
    /// Messages exchanged between vertices.
    type Message: Message;
    /// Per-vertex results, gathered across workers after termination.
    type Record: Send + 'static;
    /// The final result of the computation.
    type Output;

    /// Initializes a vertex at superstep zero. No messages are visible.
    fn setup(&self, context: &mut VertexContext<'_, G, Self::State, Self::Message>) -> Result<(), ComputeError>;

    /// Recomputes a vertex from the messages sent to it in the prior superstep.
    fn analyse(&self, context: &mut VertexContext<'_, G, Self::State, Self::Message>, messages: &[Self::Message]) -> Result<(), ComputeError>;

    /// Emits the records describing one vertex's final state.
    fn extract(&self, vertex: VertexId, graph: &G, state: &Self::State, records: &mut Vec<Self::Record>);

    /// Combines the records of every vertex into the final output.
    fn return_results(&self, records: Vec<Self::Record>) -> Self::Output;
}
