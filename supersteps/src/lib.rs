//! Supersteps is a barrier-synchronized, vertex-centric computation engine for temporal graphs.
//!
//! Computations are written as [`Analyser`]s: a `setup` phase that runs once for every vertex,
//! and an `analyse` phase that runs repeatedly, once per superstep, for every vertex that either
//! received messages or has not yet voted to halt. Messages sent in superstep `s` are delivered
//! at superstep `s + 1` and never earlier, which lets every vertex compute against an immutable
//! inbox without coordinating with any other vertex.
//!
//! Supersteps executes on timely dataflow workers. Each worker owns a partition of the vertices,
//! and the message bus between supersteps is a timely exchange whose completion, observed through
//! a probe, is the global barrier. The same program runs on one thread, many threads, or many
//! processes, as configured through `timely::Config`.
//!
//! The crate ships one workload, [`algorithms::MultilayerLpa`], a temporal multilayer label
//! propagation that slices each vertex into per-layer instances over a snapshot schedule.
//!
//! # Examples
//!
//! ```ignore
//! use std::sync::Arc;
//! use supersteps::graph::EdgeListGraph;
//! use supersteps::algorithms::{LpaConfig, MultilayerLpa};
//! use supersteps::job::{self, RunOptions};
//!
//! let mut graph = EdgeListGraph::new();
//! graph.add_edge(0, 1, 2);
//! graph.add_edge(0, 2, 3);
//! graph.add_edge(0, 1, 3);
//!
//! let config = LpaConfig::new(0, 0, 10).with_seed(7);
//! let options = RunOptions::default().with_max_iterations(config.max_iterations());
//! let result = job::execute(timely::Config::process(2), Arc::new(graph), MultilayerLpa::new(config), options)?;
//!
//! for community in result.output.iter() {
//!     println!("{}", community);
//! }
//! ```

use std::fmt::Debug;

pub use analyser::Analyser;
pub use context::{ExecutionContext, VertexContext};
pub use error::{ComputeError, ConfigError, JobError};
pub use graph::{EdgeRef, TemporalGraph};
pub use scheduler::{CancelToken, Scheduler, Termination, TerminationReason};

/// Identifies a vertex.
pub type VertexId = u64;

/// A point in graph time.
pub type Time = i64;

/// A composite trait for messages exchanged between vertices.
///
/// Messages cross worker (and process) boundaries, and so must be serializable.
pub trait Message : timely::ExchangeData + Clone + Debug { }
impl<T: timely::ExchangeData + Clone + Debug> Message for T { }

pub mod algorithms;
pub mod analyser;
pub mod bus;
pub mod context;
pub mod error;
pub mod graph;
pub mod job;
pub mod logging;
pub mod scheduler;
pub mod state;
