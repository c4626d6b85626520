use std::sync::Arc;

use supersteps::graph::EdgeListGraph;
use supersteps::job::{self, RunOptions};
use supersteps::{Analyser, CancelToken, ComputeError, TerminationReason, VertexContext, VertexId};

type Context<'a, S, M> = VertexContext<'a, EdgeListGraph, S, M>;

fn configs() -> Vec<timely::Config> {
    vec![timely::Config::thread(), timely::Config::process(2)]
}

fn triangle() -> EdgeListGraph {
    let mut graph = EdgeListGraph::new();
    graph.add_edge(0, 1, 2);
    graph.add_edge(0, 2, 3);
    graph.add_edge(0, 3, 1);
    graph
}

/// Every vertex's final state, in vertex order.
fn by_vertex<S>(mut records: Vec<(VertexId, S)>) -> Vec<(VertexId, S)> {
    records.sort_by_key(|(vertex, _)| *vertex);
    records
}

#[derive(Clone, Debug, Default, PartialEq)]
struct Log {
    setups: usize,
    invocations: Vec<(usize, Vec<(VertexId, usize)>)>,
}

/// Sends `(id, superstep)` to all neighbours in setup and in supersteps before `rounds`.
///
/// Always votes to halt.
struct Echo {
    rounds: usize,
}

impl Analyser<EdgeListGraph> for Echo {
    type State = Log;
    type Message = (VertexId, usize);
    type Record = (VertexId, Log);
    type Output = Vec<(VertexId, Log)>;

    fn setup(&self, context: &mut Context<'_, Log, (VertexId, usize)>) -> Result<(), ComputeError> {
        context.state_mut().setups += 1;
        let id = context.id();
        context.send_to_neighbours((id, 0));
        context.vote_to_halt();
        Ok(())
    }

    fn analyse(&self, context: &mut Context<'_, Log, (VertexId, usize)>, messages: &[(VertexId, usize)]) -> Result<(), ComputeError> {
        let superstep = context.superstep();
        let mut received = messages.to_vec();
        received.sort();
        context.state_mut().invocations.push((superstep, received));
        if superstep < self.rounds {
            let id = context.id();
            context.send_to_neighbours((id, superstep));
        }
        context.vote_to_halt();
        Ok(())
    }

    fn extract(&self, vertex: VertexId, _graph: &EdgeListGraph, state: &Log, records: &mut Vec<(VertexId, Log)>) {
        records.push((vertex, state.clone()));
    }

    fn return_results(&self, records: Vec<(VertexId, Log)>) -> Vec<(VertexId, Log)> {
        by_vertex(records)
    }
}

#[test_log::test]
fn messages_arrive_in_the_next_superstep() {
    for config in configs() {
        let result = job::execute(config, Arc::new(triangle()), Echo { rounds: 3 }, RunOptions::default()).unwrap();

        assert_eq!(result.termination.reason, TerminationReason::Converged);
        assert_eq!(result.termination.supersteps, 3);
        assert_eq!(result.output.len(), 3);

        for (vertex, log) in result.output.iter() {
            assert_eq!(log.setups, 1);
            let others = [1, 2, 3].into_iter().filter(|other| other != vertex).collect::<Vec<_>>();
            let expected = (1 ..= 3)
                .map(|superstep| (superstep, others.iter().map(|other| (*other, superstep - 1)).collect::<Vec<_>>()))
                .collect::<Vec<_>>();
            assert_eq!(log.invocations, expected);
        }
    }
}

#[test_log::test]
fn barriers_hold_across_repeated_runs() {
    let graph = Arc::new(triangle());
    for workers in [2, 3] {
        for _ in 0 .. 20 {
            let result = job::execute(timely::Config::process(workers), Arc::clone(&graph), Echo { rounds: 3 }, RunOptions::default()).unwrap();
            assert_eq!(result.termination.reason, TerminationReason::Converged);
            assert_eq!(result.termination.supersteps, 3);
            for (vertex, log) in result.output.iter() {
                let supersteps = log.invocations.iter().map(|(superstep, _)| *superstep).collect::<Vec<_>>();
                assert_eq!(supersteps, vec![1, 2, 3]);
                for (superstep, received) in log.invocations.iter() {
                    assert_eq!(received.len(), 2, "vertex {} in superstep {}", vertex, superstep);
                    assert!(received.iter().all(|(_, sent)| *sent == superstep - 1));
                }
            }
        }
    }
}

#[test_log::test]
fn iteration_limit() {
    for config in configs() {
        let options = RunOptions::default().with_max_iterations(2);
        let result = job::execute(config, Arc::new(triangle()), Echo { rounds: 10 }, options).unwrap();
        assert_eq!(result.termination.reason, TerminationReason::IterationLimitExceeded);
        assert_eq!(result.termination.supersteps, 2);
        assert!(result.output.iter().all(|(_, log)| log.invocations.len() == 2));
    }
}

#[test_log::test]
fn zero_iterations_run_setup_only() {
    let options = RunOptions::default().with_max_iterations(0);
    let result = job::execute(timely::Config::thread(), Arc::new(triangle()), Echo { rounds: 10 }, options).unwrap();
    assert_eq!(result.termination.reason, TerminationReason::IterationLimitExceeded);
    assert_eq!(result.termination.supersteps, 0);
    assert!(result.output.iter().all(|(_, log)| log.setups == 1 && log.invocations.is_empty()));
}

#[test_log::test]
fn empty_graphs_converge() {
    for config in configs() {
        let result = job::execute(config, Arc::new(EdgeListGraph::new()), Echo { rounds: 10 }, RunOptions::default()).unwrap();
        assert_eq!(result.termination.reason, TerminationReason::Converged);
        assert_eq!(result.termination.supersteps, 1);
        assert!(result.output.is_empty());
    }
}

/// Vertex 1 messages vertex 2 in the first superstep; everyone votes to halt.
struct Nudge;

impl Analyser<EdgeListGraph> for Nudge {
    type State = Vec<usize>;
    type Message = ();
    type Record = (VertexId, Vec<usize>);
    type Output = Vec<(VertexId, Vec<usize>)>;

    fn setup(&self, _context: &mut Context<'_, Vec<usize>, ()>) -> Result<(), ComputeError> {
        Ok(())
    }

    fn analyse(&self, context: &mut Context<'_, Vec<usize>, ()>, _messages: &[()]) -> Result<(), ComputeError> {
        let superstep = context.superstep();
        context.state_mut().push(superstep);
        if context.id() == 1 && superstep == 1 {
            context.send(2, ());
        }
        context.vote_to_halt();
        Ok(())
    }

    fn extract(&self, vertex: VertexId, _graph: &EdgeListGraph, state: &Vec<usize>, records: &mut Vec<(VertexId, Vec<usize>)>) {
        records.push((vertex, state.clone()));
    }

    fn return_results(&self, records: Vec<(VertexId, Vec<usize>)>) -> Vec<(VertexId, Vec<usize>)> {
        by_vertex(records)
    }
}

#[test_log::test]
fn halted_vertices_wake_only_for_messages() {
    let mut graph = EdgeListGraph::new();
    graph.add_edge(0, 1, 2);
    graph.add_vertex(0, 3);
    let graph = Arc::new(graph);

    for config in configs() {
        let result = job::execute(config, Arc::clone(&graph), Nudge, RunOptions::default()).unwrap();
        assert_eq!(result.termination.reason, TerminationReason::Converged);
        assert_eq!(result.termination.supersteps, 2);
        assert_eq!(result.output, vec![(1, vec![1]), (2, vec![1, 2]), (3, vec![1])]);
    }
}

/// Vertex 2 fails and vertex 3 panics in the first superstep, after touching state and outbox.
struct Flaky;

impl Analyser<EdgeListGraph> for Flaky {
    type State = Vec<(usize, Vec<VertexId>)>;
    type Message = VertexId;
    type Record = (VertexId, Vec<(usize, Vec<VertexId>)>);
    type Output = Vec<(VertexId, Vec<(usize, Vec<VertexId>)>)>;

    fn setup(&self, _context: &mut Context<'_, Self::State, VertexId>) -> Result<(), ComputeError> {
        Ok(())
    }

    fn analyse(&self, context: &mut Context<'_, Self::State, VertexId>, messages: &[VertexId]) -> Result<(), ComputeError> {
        let superstep = context.superstep();
        let id = context.id();
        let mut senders = messages.to_vec();
        senders.sort();
        context.state_mut().push((superstep, senders));
        context.send_to_neighbours(id);
        if superstep >= 2 {
            context.vote_to_halt();
        }
        match (id, superstep) {
            (2, 1) => Err(ComputeError::failed("rejected")),
            (3, 1) => panic!("vertex three gives up"),
            _ => Ok(()),
        }
    }

    fn extract(&self, vertex: VertexId, _graph: &EdgeListGraph, state: &Self::State, records: &mut Vec<Self::Record>) {
        records.push((vertex, state.clone()));
    }

    fn return_results(&self, records: Vec<Self::Record>) -> Self::Output {
        by_vertex(records)
    }
}

#[test_log::test]
fn failures_are_isolated() {
    for config in configs() {
        let options = RunOptions::default().with_max_iterations(2);
        let result = job::execute(config, Arc::new(triangle()), Flaky, options).unwrap();
        assert_eq!(result.termination.reason, TerminationReason::IterationLimitExceeded);
        assert_eq!(result.termination.supersteps, 2);
        assert_eq!(
            result.output,
            vec![
                (1, vec![(1, vec![]), (2, vec![])]),
                (2, vec![(2, vec![1])]),
                (3, vec![(2, vec![1])]),
            ],
        );
    }
}

/// Never halts; cancels `token` when any vertex reaches superstep `at`.
struct Spinner {
    token: CancelToken,
    at: usize,
}

impl Analyser<EdgeListGraph> for Spinner {
    type State = usize;
    type Message = ();
    type Record = (VertexId, usize);
    type Output = Vec<(VertexId, usize)>;

    fn setup(&self, _context: &mut Context<'_, usize, ()>) -> Result<(), ComputeError> {
        Ok(())
    }

    fn analyse(&self, context: &mut Context<'_, usize, ()>, _messages: &[()]) -> Result<(), ComputeError> {
        *context.state_mut() += 1;
        if context.superstep() == self.at {
            self.token.cancel();
        }
        Ok(())
    }

    fn extract(&self, vertex: VertexId, _graph: &EdgeListGraph, state: &usize, records: &mut Vec<(VertexId, usize)>) {
        records.push((vertex, *state));
    }

    fn return_results(&self, records: Vec<(VertexId, usize)>) -> Vec<(VertexId, usize)> {
        by_vertex(records)
    }
}

#[test_log::test]
fn cancellation_is_observed_at_barriers() {
    for config in configs() {
        let token = CancelToken::new();
        let options = RunOptions::default().with_max_iterations(100).with_cancel(token.clone());
        let result = job::execute(config, Arc::new(triangle()), Spinner { token, at: 3 }, options).unwrap();
        assert_eq!(result.termination.reason, TerminationReason::Cancelled);
        assert_eq!(result.termination.supersteps, 3);
        assert_eq!(result.output, vec![(1, 3), (2, 3), (3, 3)]);
    }
}

#[test_log::test]
fn cancelled_before_start() {
    let token = CancelToken::new();
    token.cancel();
    let options = RunOptions::default().with_cancel(token);
    let result = job::execute(timely::Config::process(2), Arc::new(triangle()), Echo { rounds: 10 }, options).unwrap();
    assert_eq!(result.termination.reason, TerminationReason::Cancelled);
    assert_eq!(result.termination.supersteps, 0);
    assert!(result.output.iter().all(|(_, log)| log.setups == 1 && log.invocations.is_empty()));
}
