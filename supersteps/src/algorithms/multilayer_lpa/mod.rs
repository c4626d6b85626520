//! Temporal multilayer label propagation.
//!
//! Each vertex is sliced into one instance per layer in which it is alive, and each instance
//! carries its own label. An instance adopts the label with the greatest weight among its
//! neighbours' labels at the same layer and its own labels at the adjacent layers, which are
//! linked to it by implicit inter-layer edges weighted by [`Omega`].
//!
//! Every instance keeps the pair `(old, current)`, so that a vertex oscillating between two
//! labels is recognised as stable. A vertex votes to halt once all its instances are stable.

use std::collections::BTreeMap;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::analyser::Analyser;
use crate::context::VertexContext;
use crate::error::ComputeError;
use crate::graph::TemporalGraph;
use crate::{Time, VertexId};

mod communities;
mod config;

pub use self::communities::{Communities, Community, Member};
pub use self::config::{LpaConfig, Omega};

/// An opaque community label. Only equality and order carry meaning.
pub type Label = u64;

/// The labels of one vertex instance.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LayerLabel {
    /// The layer timestamp.
    pub time: Time,
    /// The label held before `current`.
    pub old: Label,
    /// The label held now.
    pub current: Label,
}

/// Per-vertex state: one entry per alive layer, in increasing time.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct LpaState {
    /// Labels of each alive layer.
    pub layers: Vec<LayerLabel>,
    /// The number of layer updates judged stable, over all supersteps.
    pub stable_rounds: u64,
}

impl LpaState {
    /// The current label at layer `time`, if the vertex is alive there.
    pub fn label_at(&self, time: Time) -> Option<Label> {
        self.layers
            .binary_search_by_key(&time, |layer| layer.time)
            .ok()
            .map(|index| self.layers[index].current)
    }

    fn broadcast(&self, sender: VertexId) -> LabelMessage {
        LabelMessage {
            sender,
            labels: self.layers.iter().map(|layer| (layer.time, layer.current)).collect(),
        }
    }
}

/// A vertex's current labels, one per alive layer.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelMessage {
    /// The sending vertex.
    pub sender: VertexId,
    /// `(layer, label)` pairs.
    pub labels: Vec<(Time, Label)>,
}

impl LabelMessage {
    /// The sender's label at exactly `time`.
    pub fn label_at(&self, time: Time) -> Option<Label> {
        self.labels.iter().find(|(t, _)| *t == time).map(|(_, label)| *label)
    }
}

/// The label with the greatest summed weight, ties going to the largest label.
///
/// Returns `None` if there are no observations.
pub fn dominant_label<I: IntoIterator<Item=(Label, f64)>>(observations: I) -> Option<Label> {
    let mut totals = BTreeMap::new();
    for (label, weight) in observations {
        *totals.entry(label).or_insert(0.0) += weight;
    }
    let mut best: Option<(Label, f64)> = None;
    for (label, total) in totals {
        match best {
            Some((_, weight)) if total < weight => { }
            _ => best = Some((label, total)),
        }
    }
    best.map(|(label, _)| label)
}

/// Applies the winning label to a layer. Returns true if the layer is stable.
///
/// A layer is stable if there was no winner, or if the winner is either of its labels. A stable
/// layer keeps both labels, with the smaller as `old`. Otherwise `current` becomes `old` and the
/// winner becomes `current`.
pub fn relabel(layer: &mut LayerLabel, winner: Option<Label>) -> bool {
    match winner {
        None => true,
        Some(winner) if winner == layer.current || winner == layer.old => {
            let (low, high) = if layer.old <= layer.current { (layer.old, layer.current) } else { (layer.current, layer.old) };
            layer.old = low;
            layer.current = high;
            true
        }
        Some(winner) => {
            layer.old = layer.current;
            layer.current = winner;
            false
        }
    }
}

/// The mean of `weights`, or one if there are none.
fn mean(weights: &BTreeMap<VertexId, f64>) -> f64 {
    if weights.is_empty() {
        1.0
    } else {
        weights.values().sum::<f64>() / weights.len() as f64
    }
}

/// Derives the label seed of `vertex` from the run seed.
fn vertex_seed(seed: u64, vertex: VertexId) -> u64 {
    seed ^ vertex.wrapping_add(1).wrapping_mul(0x9E37_79B9_7F4A_7C15)
}

/// Temporal multilayer label propagation.
#[derive(Clone, Debug)]
pub struct MultilayerLpa {
    config: LpaConfig,
    seed: u64,
    snapshots: Vec<Time>,
}

impl MultilayerLpa {
    /// Prepares a run. Without a configured seed, one is drawn at random here.
    pub fn new(config: LpaConfig) -> Self {
        let seed = config.seed().unwrap_or_else(rand::random);
        let snapshots = config.snapshots();
        MultilayerLpa { config, seed, snapshots }
    }

    /// The configuration.
    pub fn config(&self) -> &LpaConfig { &self.config }

    /// The seed from which each vertex's initial labels derive.
    pub fn seed(&self) -> u64 { self.seed }

    /// Average edge weight to each distinct neighbour, over edges active in `[time - layerSize, time]`.
    pub fn neighbour_weights<G: TemporalGraph>(&self, graph: &G, vertex: VertexId, time: Time) -> BTreeMap<VertexId, f64> {
        let mut sums: BTreeMap<VertexId, (f64, usize)> = BTreeMap::new();
        for edge in graph.edges_between(vertex, time.saturating_sub(self.config.layer_size()), time) {
            let weight = self.config
                .weight()
                .and_then(|name| graph.edge_property(&edge, name))
                .unwrap_or(1.0);
            let entry = sums.entry(edge.other(vertex)).or_insert((0.0, 0));
            entry.0 += weight;
            entry.1 += 1;
        }
        sums.into_iter()
            .map(|(neighbour, (sum, count))| (neighbour, sum / count as f64))
            .collect()
    }

    /// The weight of the inter-layer edge for a layer whose neighbourhood weights are `weights`.
    fn omega(&self, weights: impl FnOnce() -> BTreeMap<VertexId, f64>) -> f64 {
        match self.config.omega() {
            Omega::Constant(weight) => weight,
            Omega::Average => mean(&weights()),
        }
    }
}

impl<G: TemporalGraph> Analyser<G> for MultilayerLpa {
    type State = LpaState;
    type Message = LabelMessage;
    type Record = (Label, Member);
    type Output = Communities;

    fn setup(&self, context: &mut VertexContext<'_, G, LpaState, LabelMessage>) -> Result<(), ComputeError> {
        let vertex = context.id();
        let layer_size = self.config.layer_size();
        let mut rng = StdRng::seed_from_u64(vertex_seed(self.seed, vertex));

        let layers = self.snapshots
            .iter()
            .copied()
            .filter(|&time| context.alive_within(time, layer_size))
            .map(|time| LayerLabel { time, old: rng.random(), current: rng.random() })
            .collect::<Vec<_>>();

        *context.state_mut() = LpaState { layers, stable_rounds: 0 };
        if !context.state().layers.is_empty() {
            let message = context.state().broadcast(vertex);
            context.send_to_neighbours(message);
        }
        Ok(())
    }

    fn analyse(&self, context: &mut VertexContext<'_, G, LpaState, LabelMessage>, messages: &[LabelMessage]) -> Result<(), ComputeError> {
        let vertex = context.id();
        let graph = context.graph();
        let layer_size = self.config.layer_size();

        if context.state().layers.is_empty() {
            context.vote_to_halt();
            return Ok(());
        }

        // Labels as they stood at the start of the superstep.
        let before = context.state().clone();
        let mut after = before.clone();
        let mut stable = 0;

        for layer in after.layers.iter_mut() {
            let time = layer.time;
            let weights = self.neighbour_weights(graph, vertex, time);

            let mut observations = messages
                .iter()
                .filter_map(|message| {
                    let weight = weights.get(&message.sender)?;
                    message.label_at(time).map(|label| (label, *weight))
                })
                .collect::<Vec<_>>();

            let backward = time.saturating_sub(layer_size);
            if let Some(label) = before.label_at(backward) {
                observations.push((label, self.omega(|| self.neighbour_weights(graph, vertex, backward))));
            }
            if let Some(label) = before.label_at(time.saturating_add(layer_size)) {
                observations.push((label, self.omega(|| weights.clone())));
            }

            if relabel(layer, dominant_label(observations)) {
                stable += 1;
            }
        }

        let all_stable = stable == after.layers.len();
        after.stable_rounds += stable as u64;
        *context.state_mut() = after;

        let message = context.state().broadcast(vertex);
        context.send_to_neighbours(message);
        if all_stable {
            context.vote_to_halt();
        }
        Ok(())
    }

    fn extract(&self, vertex: VertexId, graph: &G, state: &LpaState, records: &mut Vec<(Label, Member)>) {
        let name = graph.vertex_property(vertex, "name").unwrap_or_else(|| vertex.to_string());
        for layer in state.layers.iter() {
            records.push((layer.current, Member { vertex, name: name.clone(), time: layer.time }));
        }
    }

    fn return_results(&self, records: Vec<(Label, Member)>) -> Communities {
        Communities::from_records(records, self.config.top())
    }
}
