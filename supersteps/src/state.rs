//! Per-vertex state held by one worker.

use std::collections::BTreeMap;

use crate::VertexId;

/// One vertex's state and halting vote.
#[derive(Clone, Debug)]
pub struct VertexSlot<S> {
    /// Analyser-defined state.
    pub state: S,
    halted: bool,
}

impl<S> VertexSlot<S> {
    /// True if the vertex's last recorded vote was to halt.
    #[inline] pub fn halted(&self) -> bool { self.halted }
}

/// The vertices owned by one worker, in increasing identifier order.
///
/// A vertex's slot is mutated only while its own analyser invocation is committed, and is never
/// read by any other vertex.
#[derive(Clone, Debug)]
pub struct VertexStore<S> {
    slots: BTreeMap<VertexId, VertexSlot<S>>,
}

impl<S: Default> VertexStore<S> {
    /// Creates default state for each of `vertices`, all active.
    pub fn new<I: IntoIterator<Item=VertexId>>(vertices: I) -> Self {
        let slots = vertices
            .into_iter()
            .map(|vertex| (vertex, VertexSlot { state: S::default(), halted: false }))
            .collect();
        VertexStore { slots }
    }
}

impl<S> VertexStore<S> {
    /// Number of vertices held.
    pub fn len(&self) -> usize { self.slots.len() }
    /// True if no vertices are held.
    pub fn is_empty(&self) -> bool { self.slots.is_empty() }
    /// True if `vertex` is held by this store.
    pub fn contains(&self, vertex: VertexId) -> bool { self.slots.contains_key(&vertex) }

    /// The slot of `vertex`.
    pub fn get(&self, vertex: VertexId) -> Option<&VertexSlot<S>> {
        self.slots.get(&vertex)
    }

    /// Replaces the state and vote of `vertex` with the outcome of a successful invocation.
    pub fn commit(&mut self, vertex: VertexId, state: S, halted: bool) {
        if let Some(slot) = self.slots.get_mut(&vertex) {
            slot.state = state;
            slot.halted = halted;
        }
    }

    /// Marks every vertex active.
    pub fn activate_all(&mut self) {
        for slot in self.slots.values_mut() {
            slot.halted = false;
        }
    }

    /// The number of vertices that have not voted to halt.
    pub fn active_count(&self) -> usize {
        self.slots.values().filter(|slot| !slot.halted).count()
    }

    /// Iterates over vertices and their slots, in identifier order.
    pub fn iter(&self) -> impl Iterator<Item=(VertexId, &VertexSlot<S>)> {
        self.slots.iter().map(|(vertex, slot)| (*vertex, slot))
    }
}
