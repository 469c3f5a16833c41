//! Log Transform
//!
//! Step 2.0: The Translator
//!
//! Multiplying rates around a loop becomes adding weights once every rate
//! `r` is replaced by `-ln(r)`: a loop with product > 1 turns into a loop
//! whose weights sum below zero, i.e. a negative cycle.
//!
//! A fictitious source vertex with zero-weight edges to every currency is
//! added so a single-source relaxation reaches the whole graph.

use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use std::collections::HashMap;

use crate::cartographer::{Currency, RateGraph};

/// Vertex of the transformed graph
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Vertex {
    /// Fictitious source, exists only for one detection pass
    Source,
    Currency(Currency),
}

impl Vertex {
    pub fn currency(&self) -> Option<&Currency> {
        match self {
            Vertex::Source => None,
            Vertex::Currency(c) => Some(c),
        }
    }
}

/// Additive-weight graph derived from a rate snapshot
#[derive(Debug, Clone)]
pub struct TransformedGraph {
    pub graph: DiGraph<Vertex, f64>,
    source: NodeIndex,
    currency_to_node: HashMap<Currency, NodeIndex>,
}

impl TransformedGraph {
    /// Build the `-ln(rate)` graph plus fictitious source.
    ///
    /// Panics if a non-positive or non-finite rate is present: the rate
    /// graph refuses such rates on write, so seeing one here means that
    /// contract was bypassed.
    pub fn from_rates(rates: &RateGraph) -> Self {
        let mut graph = DiGraph::with_capacity(rates.node_count() + 1, rates.edge_count() + rates.node_count());
        let mut currency_to_node = HashMap::with_capacity(rates.node_count());

        let source = graph.add_node(Vertex::Source);

        for currency in rates.currencies() {
            let node = graph.add_node(Vertex::Currency(currency.clone()));
            currency_to_node.insert(currency.clone(), node);
        }

        for (origin, destination, rate) in rates.edges() {
            assert!(
                rate.is_finite() && rate > 0.0,
                "rate graph invariant breached: {} -> {} has rate {}",
                origin,
                destination,
                rate
            );
            let from = currency_to_node[origin];
            let to = currency_to_node[destination];
            graph.add_edge(from, to, -rate.ln());
        }

        // symbol order, so two passes over one snapshot relax identically
        for currency in rates.currencies() {
            graph.add_edge(source, currency_to_node[currency], 0.0);
        }

        Self {
            graph,
            source,
            currency_to_node,
        }
    }

    pub fn source(&self) -> NodeIndex {
        self.source
    }

    pub fn node(&self, currency: &Currency) -> Option<NodeIndex> {
        self.currency_to_node.get(currency).copied()
    }

    pub fn vertex(&self, node: NodeIndex) -> Option<&Vertex> {
        self.graph.node_weight(node)
    }

    /// Weight of the edge `origin -> destination`, if present
    pub fn weight(&self, origin: &Currency, destination: &Currency) -> Option<f64> {
        let from = self.node(origin)?;
        let to = self.node(destination)?;
        self.graph
            .edges(from)
            .find(|e| e.target() == to)
            .map(|e| *e.weight())
    }

    /// Currency count, not counting the fictitious source
    pub fn real_node_count(&self) -> usize {
        self.currency_to_node.len()
    }

    pub fn vertex_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }
}
