//! Multilayer label propagation over a random temporal graph.
//!
//! Usage: `multilayer_lpa <top> <weight> <maxIterations> <start> <end> <layerSize> [omega] [seed] [-- timely flags]`
//!
//! For example, `cargo run --example multilayer_lpa -- 5 "" 50 -20 100 10 average 7 -- -w 2`.
//! Set `SUPERSTEPS_VERBOSE=1` for per-superstep diagnostics and `SUPERSTEPS_OUTPUT` to write the
//! communities to a file.

use std::sync::Arc;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing_subscriber::{fmt, EnvFilter};

use supersteps::algorithms::{LpaConfig, MultilayerLpa};
use supersteps::graph::EdgeListGraph;
use supersteps::job::{self, RunOptions};
use supersteps::JobError;

const NODES: u64 = 200;
const EDGES: usize = 1_000;

fn main() -> Result<(), Box<dyn std::error::Error>> {

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt().with_env_filter(filter).with_target(true).compact().init();

    let args = std::env::args().skip(1).collect::<Vec<_>>();
    let (positional, flags) = job::split_args(&args);

    let config = LpaConfig::from_args(positional)?;
    let workers = timely::Config::from_args(flags.iter().cloned()).map_err(JobError::Startup)?;

    let (start, end) = config.span().unwrap_or((0, 0));

    let mut rng = StdRng::seed_from_u64(0);
    let mut graph = EdgeListGraph::new();
    for vertex in 0 .. NODES {
        graph.add_vertex_with(rng.random_range(start ..= end), vertex, "name", &format!("v{}", vertex));
    }
    for _ in 0 .. EDGES {
        let src = rng.random_range(0 .. NODES);
        let dst = rng.random_range(0 .. NODES);
        let weight = rng.random_range(0.5 .. 2.0);
        graph.add_edge_with(rng.random_range(start ..= end), src, dst, &[("weight", weight)]);
    }

    let options = RunOptions::from_env().with_max_iterations(config.max_iterations());
    let output = options.output.clone();

    let timer = std::time::Instant::now();
    let result = job::execute(workers, Arc::new(graph), MultilayerLpa::new(config), options)?;
    tracing::info!(
        reason = ?result.termination.reason,
        supersteps = result.termination.supersteps,
        communities = result.output.len(),
        elapsed = ?timer.elapsed(),
        "label propagation finished",
    );

    job::write_output(&result.output, output.as_deref())?;
    Ok(())
}
