//! Running an analyser across timely workers.

use std::fmt::Display;
use std::fs::File;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::analyser::Analyser;
use crate::error::JobError;
use crate::graph::TemporalGraph;
use crate::scheduler::{CancelToken, Scheduler, Termination};

/// Names the environment variable that enables per-superstep diagnostics.
pub const VERBOSE_VAR: &str = "SUPERSTEPS_VERBOSE";
/// Names the environment variable holding the path results are written to.
pub const OUTPUT_VAR: &str = "SUPERSTEPS_OUTPUT";

/// Options shared by every worker of a run.
#[derive(Clone, Debug)]
pub struct RunOptions {
    /// The largest number of `analyse` supersteps to run.
    pub max_iterations: usize,
    /// Report per-superstep diagnostics from worker zero.
    pub verbose: bool,
    /// Where results go; standard output if unset.
    pub output: Option<PathBuf>,
    /// Observed by every worker at every barrier.
    pub cancel: CancelToken,
}

impl Default for RunOptions {
    fn default() -> Self {
        RunOptions {
            max_iterations: 500,
            verbose: false,
            output: None,
            cancel: CancelToken::new(),
        }
    }
}

impl RunOptions {
    /// Default options, with verbosity and output taken from the environment.
    ///
    /// Verbosity is enabled by any value of `SUPERSTEPS_VERBOSE` other than empty, `0`, or `false`.
    pub fn from_env() -> Self {
        let verbose = std::env::var(VERBOSE_VAR)
            .map(|value| !matches!(value.trim(), "" | "0" | "false"))
            .unwrap_or(false);
        let output = std::env::var_os(OUTPUT_VAR)
            .filter(|value| !value.is_empty())
            .map(PathBuf::from);
        RunOptions { verbose, output, ..RunOptions::default() }
    }
    /// Sets the iteration cap.
    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }
    /// Sets verbosity.
    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }
    /// Sets the output path.
    pub fn with_output<P: Into<PathBuf>>(mut self, output: P) -> Self {
        self.output = Some(output.into());
        self
    }
    /// Uses `cancel` to stop the run.
    pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }
}

/// The result of a completed run.
#[derive(Debug)]
pub struct JobResult<O> {
    /// What the analyser returned.
    pub output: O,
    /// How the run ended.
    pub termination: Termination,
}

/// Runs `analyser` over `graph` on the workers described by `config`.
///
/// Each worker schedules the vertices it owns. Once all workers have terminated, their records
/// are gathered, in worker order, and handed to `return_results` exactly once.
pub fn execute<G, A>(config: timely::Config, graph: Arc<G>, analyser: A, options: RunOptions) -> Result<JobResult<A::Output>, JobError>
where
    G: TemporalGraph + Send + Sync + 'static,
    A: Analyser<G> + Send + Sync + 'static,
{
    let analyser = Arc::new(analyser);

    let shared = Arc::clone(&analyser);
    let max_iterations = options.max_iterations;
    let verbose = options.verbose;
    let cancel = options.cancel.clone();

    let results = timely::execute(config, move |worker| {
        let mut scheduler = Scheduler::new(worker, Arc::clone(&graph), Arc::clone(&shared))
            .with_cancel(cancel.clone())
            .verbose(verbose);
        let termination = scheduler.run(max_iterations);
        (termination, scheduler.records())
    })
    .map_err(JobError::Startup)?
    .join();

    let mut terminations = Vec::new();
    let mut records = Vec::new();
    for result in results {
        let (local, mut batch) = result.map_err(JobError::Worker)?;
        terminations.push(local);
        records.append(&mut batch);
    }
    let termination = agreed(terminations)?;

    tracing::debug!(target: "supersteps", records = records.len(), reason = ?termination.reason, "gathered records");

    let output = analyser.return_results(records);
    Ok(JobResult { output, termination })
}

/// Splits command-line arguments at the first `--` into analyser arguments and timely flags.
///
/// Without a `--`, every argument belongs to the analyser.
pub fn split_args<S: AsRef<str>>(args: &[S]) -> (&[S], &[S]) {
    match args.iter().position(|arg| arg.as_ref() == "--") {
        Some(split) => (&args[.. split], &args[split + 1 ..]),
        None => (args, &args[args.len() ..]),
    }
}

/// The termination every worker reported, or an error if any two workers differ.
fn agreed<I: IntoIterator<Item=Termination>>(terminations: I) -> Result<Termination, JobError> {
    let mut terminations = terminations.into_iter();
    let first = terminations.next().ok_or(JobError::NoWorkers)?;
    match terminations.find(|other| *other != first) {
        Some(other) => Err(JobError::Disagreement { first, other }),
        None => Ok(first),
    }
}

/// Writes `output` to `path`, or to standard output if no path is given.
pub fn write_output<O: Display>(output: &O, path: Option<&Path>) -> Result<(), JobError> {
    match path {
        Some(path) => {
            let mut file = File::create(path)?;
            writeln!(file, "{}", output)?;
            file.flush()?;
        }
        None => {
            let stdout = io::stdout();
            let mut lock = stdout.lock();
            writeln!(lock, "{}", output)?;
        }
    }
    Ok(())
}
