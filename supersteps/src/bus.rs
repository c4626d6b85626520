//! The message bus between supersteps.
//!
//! The bus holds two generations. Messages posted during superstep `s` are written into the
//! timely input at time `s`, from where they are exchanged to the worker owning each recipient.
//! At the barrier the input advances to `s + 1` and the worker steps the dataflow until its probe
//! confirms that every worker's time-`s` messages have arrived. Only then are the time-`s`
//! arrivals frozen into a [`Generation`], the readable inbox for superstep `s + 1`. Parcels from
//! workers that have already moved on to `s + 1` may arrive during the same wait; they stay
//! buffered under their own time until the next barrier.
//!
//! Alongside messages, every worker publishes a [`Tally`] to every other worker at each barrier,
//! so that all workers reach the same termination decision from the same global counts.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;

use fnv::FnvHashMap;
use serde::{Deserialize, Serialize};

use timely::communication::Allocate;
use timely::container::CapacityContainerBuilder;
use timely::dataflow::operators::{Exchange, Inspect, Probe};
use timely::dataflow::{InputHandle, ProbeHandle};
use timely::worker::Worker;

use crate::context::ExecutionContext;
use crate::{Message, VertexId};

/// Counts one worker reports at a barrier, and their sums across workers.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tally {
    /// Vertices that have not voted to halt.
    pub active: u64,
    /// Messages posted in the closing superstep.
    pub sent: u64,
    /// Vertex invocations that failed in the closing superstep.
    pub failed: u64,
    /// Whether cancellation was requested.
    pub cancelled: bool,
}

impl Tally {
    /// Accumulates another worker's tally into this one.
    pub fn merge(&mut self, other: &Tally) {
        self.active += other.active;
        self.sent += other.sent;
        self.failed += other.failed;
        self.cancelled |= other.cancelled;
    }
    /// True if no vertex is active and no message is in flight.
    pub fn quiescent(&self) -> bool {
        self.active == 0 && self.sent == 0
    }
}

/// What travels between workers.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum Payload<M> {
    /// A message for a vertex.
    Message {
        /// The recipient.
        target: VertexId,
        /// The message itself.
        message: M,
    },
    /// A worker's tally for the closing superstep.
    Tally(Tally),
}

/// A payload addressed to a worker.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Parcel<M> {
    /// The worker that must receive the payload.
    pub worker: usize,
    /// The payload.
    pub payload: Payload<M>,
}

/// The messages readable during one superstep, grouped by recipient.
///
/// A generation is built once, at a barrier, and is only read from afterwards.
#[derive(Debug)]
pub struct Generation<M> {
    messages: FnvHashMap<VertexId, Vec<M>>,
    count: usize,
}

impl<M> Default for Generation<M> {
    fn default() -> Self {
        Generation { messages: FnvHashMap::default(), count: 0 }
    }
}

impl<M> Generation<M> {
    /// Adds a message for `target`.
    pub fn push(&mut self, target: VertexId, message: M) {
        self.messages.entry(target).or_default().push(message);
        self.count += 1;
    }
    /// True if at least one message is addressed to `vertex`.
    pub fn contains(&self, vertex: VertexId) -> bool {
        self.messages.contains_key(&vertex)
    }
    /// Removes and returns the messages addressed to `vertex`.
    pub fn take(&mut self, vertex: VertexId) -> Vec<M> {
        let messages = self.messages.remove(&vertex).unwrap_or_default();
        self.count -= messages.len();
        messages
    }
    /// The recipients of messages in this generation, in no particular order.
    pub fn recipients(&self) -> impl Iterator<Item=VertexId> + '_ {
        self.messages.keys().copied()
    }
    /// The number of messages not yet taken.
    pub fn len(&self) -> usize { self.count }
    /// True if there are no messages.
    pub fn is_empty(&self) -> bool { self.count == 0 }
}

/// A worker's endpoint on the message bus.
pub struct MessageBus<M: Message> {
    input: InputHandle<u64, CapacityContainerBuilder<Vec<Parcel<M>>>>,
    probe: ProbeHandle<u64>,
    arrived: Rc<RefCell<BTreeMap<u64, Vec<Parcel<M>>>>>,
    execution: ExecutionContext,
    pending: u64,
}

impl<M: Message> MessageBus<M> {
    /// Constructs the exchange dataflow in `worker`.
    ///
    /// Every worker of a computation must construct its bus, in the same order relative to other
    /// dataflows, as timely requires.
    pub fn new<A: Allocate>(worker: &mut Worker<A>) -> Self {

        let execution = ExecutionContext::new(worker.index(), worker.peers());

        let mut input = <InputHandle<u64, CapacityContainerBuilder<Vec<Parcel<M>>>>>::new();
        let mut probe = ProbeHandle::new();
        let arrived: Rc<RefCell<BTreeMap<u64, Vec<Parcel<M>>>>> = Rc::new(RefCell::new(BTreeMap::new()));

        let delivered = Rc::clone(&arrived);
        worker.dataflow::<u64, _, _>(|scope| {
            input
                .to_stream(scope)
                .exchange(|parcel| parcel.worker as u64)
                .inspect_batch(move |time, parcels| {
                    delivered
                        .borrow_mut()
                        .entry(*time)
                        .or_default()
                        .extend(parcels.iter().cloned());
                })
                .probe_with(&mut probe);
        });

        MessageBus { input, probe, arrived, execution, pending: 0 }
    }

    /// The superstep whose messages are currently being written.
    pub fn superstep(&self) -> usize {
        *self.input.time() as usize
    }

    /// The number of messages posted since the last barrier.
    pub fn pending(&self) -> u64 {
        self.pending
    }

    /// Posts `message` for `target`, to be readable in the next superstep.
    pub fn post(&mut self, target: VertexId, message: M) {
        let worker = self.execution.owner(target);
        self.input.send(Parcel { worker, payload: Payload::Message { target, message } });
        self.pending += 1;
    }

    /// Sends this worker's tally to every worker, including itself.
    pub fn publish(&mut self, tally: Tally) {
        for worker in 0 .. self.execution.peers {
            self.input.send(Parcel { worker, payload: Payload::Tally(tally) });
        }
    }

    /// Closes the current generation and blocks until all workers have closed it too.
    ///
    /// Returns the frozen generation, now readable, and the tally summed over all workers.
    pub fn barrier<A: Allocate>(&mut self, worker: &mut Worker<A>) -> (Generation<M>, Tally) {

        let next = *self.input.time() + 1;
        self.input.advance_to(next);
        worker.step_while(|| self.probe.less_than(self.input.time()));

        self.pending = 0;

        let ready = take_before(&mut self.arrived.borrow_mut(), next);

        let mut generation = Generation::default();
        let mut tally = Tally::default();
        for parcel in ready.into_values().flatten() {
            match parcel.payload {
                Payload::Message { target, message } => generation.push(target, message),
                Payload::Tally(other) => tally.merge(&other),
            }
        }

        (generation, tally)
    }
}

/// Removes and returns the batches stamped earlier than `next`, leaving later ones in place.
fn take_before<P>(arrived: &mut BTreeMap<u64, Vec<P>>, next: u64) -> BTreeMap<u64, Vec<P>> {
    let later = arrived.split_off(&next);
    std::mem::replace(arrived, later)
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::{take_before, Generation, Tally};

    #[test]
    fn later_batches_wait_for_their_barrier() {
        let mut arrived = BTreeMap::new();
        arrived.insert(3, vec!["s3"]);
        arrived.insert(4, vec!["s4-a", "s4-b"]);
        let ready = take_before(&mut arrived, 4);
        assert_eq!(ready.into_values().flatten().collect::<Vec<_>>(), vec!["s3"]);
        assert_eq!(arrived.keys().copied().collect::<Vec<_>>(), vec![4]);
        assert_eq!(take_before(&mut arrived, 5).into_values().flatten().count(), 2);
        assert!(arrived.is_empty());
    }

    #[test]
    fn generation_groups_by_recipient() {
        let mut generation = Generation::default();
        generation.push(2, "a");
        generation.push(1, "b");
        generation.push(2, "c");
        assert_eq!(generation.len(), 3);
        assert!(generation.contains(2));
        assert!(!generation.contains(3));
        assert_eq!(generation.take(2), vec!["a", "c"]);
        assert!(!generation.contains(2));
        assert_eq!(generation.len(), 1);
        assert_eq!(generation.recipients().collect::<Vec<_>>(), vec![1]);
        assert!(generation.take(2).is_empty());
    }

    #[test]
    fn tallies_merge() {
        let mut tally = Tally { active: 1, sent: 2, failed: 0, cancelled: false };
        tally.merge(&Tally { active: 0, sent: 3, failed: 1, cancelled: true });
        assert_eq!(tally, Tally { active: 1, sent: 5, failed: 1, cancelled: true });
        assert!(!tally.quiescent());
        assert!(Tally::default().quiescent());
    }
}
