//! Bellman-Ford Negative Cycle Search
//!
//! Step 2.1: The Pathfinder
//!
//! Relaxes the `-ln(rate)` graph from the fictitious source `|N|+1` times,
//! then scans once more. An edge that still relaxes proves a reachable
//! negative cycle; the cycle is recovered by walking predecessor pointers
//! back until a vertex repeats.
//!
//! Exactly one cycle is returned per pass. No attempt is made to enumerate
//! every negative cycle or to pick the best one.

use petgraph::graph::NodeIndex;
use petgraph::visit::EdgeRef;
use std::collections::HashSet;
use std::fmt;
use tracing::{debug, trace, warn};

use super::transform::{TransformedGraph, Vertex};
use crate::cartographer::{Currency, RateGraph};

/// Minimum improvement (in log space) for a relaxation to count.
///
/// Exact reciprocal pairs round to weight sums around -1e-17; without a
/// floor those would surface as phantom cycles with product 1.0000000000000002.
pub const DEFAULT_TOLERANCE: f64 = 1e-12;

/// A closed conversion loop `[n0, n1, ..., nk]` with `n0 == nk`
#[derive(Debug, Clone, PartialEq)]
pub struct Cycle {
    path: Vec<Currency>,
    /// Sum of `-ln(rate)` along the loop, as seen by the detector
    pub total_weight: f64,
}

impl Cycle {
    /// Build a cycle from a closed path. Returns `None` unless the path
    /// starts and ends at the same currency and has at least two hops.
    pub fn new(path: Vec<Currency>, total_weight: f64) -> Option<Self> {
        let cycle = Self { path, total_weight };
        cycle.is_valid().then_some(cycle)
    }

    pub fn path(&self) -> &[Currency] {
        &self.path
    }

    pub fn hop_count(&self) -> usize {
        self.path.len().saturating_sub(1)
    }

    /// `(from, to)` for every hop, in traversal order
    pub fn hops(&self) -> impl Iterator<Item = (&Currency, &Currency)> {
        self.path.windows(2).map(|w| (&w[0], &w[1]))
    }

    /// Distinct currencies on the loop
    pub fn currencies(&self) -> HashSet<&Currency> {
        self.path.iter().collect()
    }

    pub fn contains(&self, currency: &Currency) -> bool {
        self.path.contains(currency)
    }

    /// Return implied by the log-domain weights (`exp(-total_weight)`)
    pub fn implied_return(&self) -> f64 {
        (-self.total_weight).exp()
    }

    /// Validate that the cycle is well-formed
    /// - Must start and end at the same currency
    /// - Must have at least two hops
    /// - Must not visit any intermediate currency more than once
    pub fn is_valid(&self) -> bool {
        if self.path.len() < 3 {
            return false;
        }

        if self.path.first() != self.path.last() {
            return false;
        }

        let loop_nodes = &self.path[..self.path.len() - 1];
        let unique: HashSet<_> = loop_nodes.iter().collect();
        if unique.len() != loop_nodes.len() {
            debug!("Cycle has duplicate intermediate nodes - invalid");
            return false;
        }

        true
    }

    /// Same loop, possibly starting at a different currency
    pub fn rotations_equal(&self, other: &Cycle) -> bool {
        let a = &self.path[..self.path.len() - 1];
        let b = &other.path[..other.path.len() - 1];
        if a.len() != b.len() {
            return false;
        }
        let Some(offset) = b.iter().position(|c| c == &a[0]) else {
            return false;
        };
        (0..a.len()).all(|i| a[i] == b[(i + offset) % b.len()])
    }
}

impl fmt::Display for Cycle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let path = self
            .path
            .iter()
            .map(Currency::as_str)
            .collect::<Vec<_>>()
            .join(" → ");
        f.write_str(&path)
    }
}

/// Bellman-Ford detector over the fictitious-source graph
#[derive(Debug, Clone, Copy)]
pub struct CycleDetector {
    tolerance: f64,
}

impl Default for CycleDetector {
    fn default() -> Self {
        Self::new()
    }
}

impl CycleDetector {
    pub fn new() -> Self {
        Self {
            tolerance: DEFAULT_TOLERANCE,
        }
    }

    /// Transform a rate snapshot and search it for one negative cycle
    pub fn detect(&self, rates: &RateGraph) -> Option<Cycle> {
        if rates.node_count() < 2 {
            return None;
        }
        self.detect_transformed(&TransformedGraph::from_rates(rates))
    }

    /// Search an already transformed graph for one negative cycle
    pub fn detect_transformed(&self, transformed: &TransformedGraph) -> Option<Cycle> {
        if transformed.real_node_count() < 2 {
            return None;
        }

        let vertex_count = transformed.vertex_count();
        let edges: Vec<(usize, usize, f64)> = transformed
            .graph
            .edge_references()
            .map(|e| (e.source().index(), e.target().index(), *e.weight()))
            .collect();

        let mut distance = vec![f64::INFINITY; vertex_count];
        let mut predecessor: Vec<Option<usize>> = vec![None; vertex_count];
        distance[transformed.source().index()] = 0.0;

        // One pass per vertex, fictitious source included
        for pass in 0..vertex_count {
            let mut relaxed = false;
            for &(u, v, w) in &edges {
                if distance[u] + w < distance[v] - self.tolerance {
                    distance[v] = distance[u] + w;
                    predecessor[v] = Some(u);
                    relaxed = true;
                }
            }
            if !relaxed {
                trace!("Converged after {} passes - no negative cycle", pass + 1);
                return None;
            }
        }

        let (u, v) = edges
            .iter()
            .find(|&&(u, v, w)| distance[u] + w < distance[v] - self.tolerance)
            .map(|&(u, v, _)| (u, v))?;
        predecessor[v] = Some(u);

        let Some(loop_nodes) = walk_back(&predecessor, v, vertex_count) else {
            warn!("Predecessor chain from {:?} ended without closing a loop", transformed.vertex(NodeIndex::new(v)));
            return None;
        };

        self.build_cycle(transformed, &loop_nodes)
    }

    fn build_cycle(&self, transformed: &TransformedGraph, loop_nodes: &[usize]) -> Option<Cycle> {
        let mut path = Vec::with_capacity(loop_nodes.len());
        for &index in loop_nodes {
            let vertex = transformed.vertex(NodeIndex::new(index));
            match vertex.and_then(Vertex::currency) {
                Some(currency) => path.push(currency.clone()),
                None => {
                    warn!("Negative cycle passed through non-currency vertex {:?}", vertex);
                    return None;
                }
            }
        }

        let mut total_weight = 0.0;
        for pair in loop_nodes.windows(2) {
            let edge = transformed
                .graph
                .find_edge(NodeIndex::new(pair[0]), NodeIndex::new(pair[1]))?;
            total_weight += transformed.graph[edge];
        }

        let cycle = Cycle::new(path, total_weight);
        match &cycle {
            Some(c) => debug!("Negative cycle: {} (implied return {:.6})", c, c.implied_return()),
            None => warn!("Extracted loop failed validation"),
        }
        cycle
    }
}

/// Follow predecessors from `start` until a vertex repeats; return the loop
/// in forward (origin -> destination) order, closed on its first vertex.
fn walk_back(predecessor: &[Option<usize>], start: usize, limit: usize) -> Option<Vec<usize>> {
    let mut seen_at: Vec<Option<usize>> = vec![None; predecessor.len()];
    let mut order = Vec::new();
    let mut current = start;

    loop {
        if let Some(first) = seen_at[current] {
            let mut cycle = order[first..].to_vec();
            cycle.push(current);
            cycle.reverse();
            return Some(cycle);
        }
        if order.len() > limit {
            return None;
        }
        seen_at[current] = Some(order.len());
        order.push(current);
        current = predecessor[current]?;
    }
}
