//! Read-only access to a temporal graph.
//!
//! The engine does not store graphs. It consumes them through [`TemporalGraph`], which answers
//! liveness, neighbourhood, and property questions for a vertex within a window of time. All
//! methods take `&self` and the trait requires nothing of implementors beyond answering
//! consistently; workers share one graph behind an `Arc` and query it concurrently.
//!
//! [`EdgeListGraph`] is a small in-memory implementation, used by the tests and the example.

use std::collections::{BTreeMap, BTreeSet};

use fnv::FnvHashMap;

use crate::{Time, VertexId};

/// A directed edge, identified by its endpoints.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EdgeRef {
    /// Source vertex.
    pub src: VertexId,
    /// Destination vertex.
    pub dst: VertexId,
}

impl EdgeRef {
    /// Creates a new edge reference.
    pub fn new(src: VertexId, dst: VertexId) -> Self {
        EdgeRef { src, dst }
    }
    /// The endpoint that is not `vertex`.
    ///
    /// For an edge not incident on `vertex` this returns `src`.
    pub fn other(&self, vertex: VertexId) -> VertexId {
        if self.src == vertex { self.dst } else { self.src }
    }
}

/// Queries against a temporally-versioned graph.
pub trait TemporalGraph {
    /// Every vertex the graph knows about, in increasing order.
    fn vertices(&self) -> Vec<VertexId>;

    /// True if `vertex` shows any activity in `[time, time + window)`.
    fn alive_within(&self, vertex: VertexId, time: Time, window: Time) -> bool;

    /// The distinct structural neighbours of `vertex`, over all time, excluding itself.
    fn neighbours(&self, vertex: VertexId) -> Vec<VertexId>;

    /// Edges incident on `vertex`, in either direction, active somewhere in `[start, end]`.
    ///
    /// Self-loops are not reported.
    fn edges_between(&self, vertex: VertexId, start: Time, end: Time) -> Vec<EdgeRef>;

    /// The value of a numeric property on an edge, if set.
    fn edge_property(&self, edge: &EdgeRef, name: &str) -> Option<f64>;

    /// The value of a property on a vertex, if set.
    fn vertex_property(&self, vertex: VertexId, name: &str) -> Option<String>;
}

/// The history of one directed edge.
#[derive(Clone, Debug, Default)]
struct EdgeHistory {
    times: BTreeSet<Time>,
    properties: FnvHashMap<String, f64>,
}

/// An in-memory temporal graph built from timestamped edge and vertex events.
///
/// Adding an edge at time `t` makes both endpoints active at `t`. Properties are not versioned:
/// the most recently added value of a property is the one reported.
#[derive(Clone, Debug, Default)]
pub struct EdgeListGraph {
    activity: BTreeMap<VertexId, BTreeSet<Time>>,
    properties: FnvHashMap<VertexId, FnvHashMap<String, String>>,
    edges: BTreeMap<EdgeRef, EdgeHistory>,
    incident: FnvHashMap<VertexId, BTreeSet<EdgeRef>>,
}

impl EdgeListGraph {
    /// Creates an empty graph.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records activity of `vertex` at `time`.
    pub fn add_vertex(&mut self, time: Time, vertex: VertexId) {
        self.activity.entry(vertex).or_default().insert(time);
    }

    /// Records activity of `vertex` at `time`, and sets a vertex property.
    pub fn add_vertex_with(&mut self, time: Time, vertex: VertexId, name: &str, value: &str) {
        self.add_vertex(time, vertex);
        self.properties
            .entry(vertex)
            .or_default()
            .insert(name.to_string(), value.to_string());
    }

    /// Records an edge from `src` to `dst` at `time`.
    pub fn add_edge(&mut self, time: Time, src: VertexId, dst: VertexId) {
        self.add_edge_with(time, src, dst, &[]);
    }

    /// Records an edge from `src` to `dst` at `time`, setting numeric edge properties.
    pub fn add_edge_with(&mut self, time: Time, src: VertexId, dst: VertexId, properties: &[(&str, f64)]) {
        self.add_vertex(time, src);
        self.add_vertex(time, dst);
        let edge = EdgeRef::new(src, dst);
        let history = self.edges.entry(edge).or_default();
        history.times.insert(time);
        for (name, value) in properties {
            history.properties.insert(name.to_string(), *value);
        }
        if src != dst {
            self.incident.entry(src).or_default().insert(edge);
            self.incident.entry(dst).or_default().insert(edge);
        }
    }

    /// The number of vertices.
    pub fn vertex_count(&self) -> usize {
        self.activity.len()
    }

    /// The number of distinct directed edges.
    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }
}

impl TemporalGraph for EdgeListGraph {
    fn vertices(&self) -> Vec<VertexId> {
        self.activity.keys().copied().collect()
    }

    fn alive_within(&self, vertex: VertexId, time: Time, window: Time) -> bool {
        if window <= 0 {
            return false;
        }
        self.activity
            .get(&vertex)
            .map(|times| times.range(time .. time.saturating_add(window)).next().is_some())
            .unwrap_or(false)
    }

    fn neighbours(&self, vertex: VertexId) -> Vec<VertexId> {
        let neighbours: BTreeSet<VertexId> = self.incident
            .get(&vertex)
            .into_iter()
            .flatten()
            .map(|edge| edge.other(vertex))
            .collect();
        neighbours.into_iter().collect()
    }

    fn edges_between(&self, vertex: VertexId, start: Time, end: Time) -> Vec<EdgeRef> {
        if end < start {
            return Vec::new();
        }
        self.incident
            .get(&vertex)
            .into_iter()
            .flatten()
            .filter(|edge| {
                self.edges
                    .get(edge)
                    .map(|history| history.times.range(start ..= end).next().is_some())
                    .unwrap_or(false)
            })
            .copied()
            .collect()
    }

    fn edge_property(&self, edge: &EdgeRef, name: &str) -> Option<f64> {
        self.edges.get(edge)?.properties.get(name).copied()
    }

    fn vertex_property(&self, vertex: VertexId, name: &str) -> Option<String> {
        self.properties.get(&vertex)?.get(name).cloned()
    }
}
