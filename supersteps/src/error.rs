//! Errors raised by analysers, configuration, and job execution.

use thiserror::Error;

use crate::scheduler::Termination;
use crate::{Time, VertexId};

/// A failure inside one vertex's `setup` or `analyse`.
///
/// The scheduler recovers from these locally: the failing invocation is discarded and the
/// vertex keeps whatever state, vote, and outgoing messages it had before the call.
#[derive(Debug, Error)]
pub enum ComputeError {
    /// The invocation panicked.
    #[error("vertex {vertex} panicked: {reason}")]
    Panicked {
        /// The vertex whose invocation panicked.
        vertex: VertexId,
        /// The panic payload, when it was a string.
        reason: String,
    },

    /// Any other failure reported by an analyser.
    #[error("{0}")]
    Failed(String),
}

impl ComputeError {
    /// Builds a generic failure from a message.
    pub fn failed(reason: impl Into<String>) -> Self {
        ComputeError::Failed(reason.into())
    }
}

/// Invalid analyser or run configuration.
#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("missing required argument `{0}`")]
    Missing(&'static str),

    #[error("argument `{name}` has invalid value {value:?}")]
    Invalid {
        name: &'static str,
        value: String,
    },

    #[error("layer size must be positive, got {0}")]
    LayerSize(Time),

    #[error("window end {end} precedes start {start}")]
    Window {
        start: Time,
        end: Time,
    },
}

/// Failures starting, running, or joining timely workers.
#[derive(Debug, Error)]
pub enum JobError {
    /// Timely could not start the computation.
    #[error("failed to start workers: {0}")]
    Startup(String),

    /// A worker terminated abnormally.
    #[error("worker failed: {0}")]
    Worker(String),

    /// The computation ran without any worker.
    #[error("no workers reported a result")]
    NoWorkers,

    /// Workers stopped for different reasons or at different supersteps.
    #[error("workers disagree on termination: {first:?} and {other:?}")]
    Disagreement {
        /// The first worker's termination.
        first: Termination,
        /// A differing termination.
        other: Termination,
    },

    /// Results could not be written to the configured sink.
    #[error("failed to write results: {0}")]
    Output(#[from] std::io::Error),
}
