//! Graph Construction - STREAMING Edition
//!
//! Step 1.2: The Map Maker
//!
//! Currencies are nodes, conversion rates are edges. Rates are stored
//! exactly as received (units of destination per unit of origin, fees
//! already folded in) and every write goes through a SANITY CHECK so a
//! zero or negative rate can never reach the -ln transform.
//!
//! The graph is shared between the feed (writer) and the scanner (reader)
//! through [`GraphHandle`]. Readers take a point-in-time snapshot and never
//! hold the lock while relaxing edges.

use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::fmt;
use std::sync::Arc;

use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use super::market::{Instrument, QuoteUpdate};

// ============================================
// CURRENCY
// ============================================

/// A currency symbol ("USDT", "BTC", ...).
///
/// Cheap to clone; always stored upper-case so "btc" and "BTC" are the
/// same node.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Currency(Arc<str>);

impl Currency {
    pub fn new(symbol: &str) -> Self {
        Self(Arc::from(symbol.trim().to_uppercase()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for Currency {
    fn from(symbol: &str) -> Self {
        Self::new(symbol)
    }
}

impl From<String> for Currency {
    fn from(symbol: String) -> Self {
        Self::new(&symbol)
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ============================================
// ERRORS
// ============================================

#[derive(Debug, Clone, Error, PartialEq)]
pub enum GraphError {
    /// Rates must be finite and strictly positive for -ln(rate) to exist
    #[error("invalid rate {rate} for {origin} -> {destination}")]
    InvalidRate {
        origin: Currency,
        destination: Currency,
        rate: f64,
    },

    #[error("self-loop on {0} rejected")]
    SelfLoop(Currency),

    #[error("no edge {origin} -> {destination} in graph")]
    MissingEdge {
        origin: Currency,
        destination: Currency,
    },
}

fn validate_rate(origin: &Currency, destination: &Currency, rate: f64) -> Result<(), GraphError> {
    if origin == destination {
        return Err(GraphError::SelfLoop(origin.clone()));
    }
    if !rate.is_finite() || rate <= 0.0 {
        return Err(GraphError::InvalidRate {
            origin: origin.clone(),
            destination: destination.clone(),
            rate,
        });
    }
    Ok(())
}

// ============================================
// RATE GRAPH
// ============================================

/// Outcome of pruning the graph against the set of listed instruments
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PruneReport {
    pub removed_nodes: Vec<Currency>,
    pub removed_edges: usize,
}

impl PruneReport {
    pub fn is_empty(&self) -> bool {
        self.removed_nodes.is_empty() && self.removed_edges == 0
    }
}

/// Directed graph of conversion rates.
///
/// Invariant: every currency that appears as a destination is also a key of
/// the outer map, so the key set is exactly the node set.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RateGraph {
    rates: BTreeMap<Currency, BTreeMap<Currency, f64>>,
}

impl RateGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a graph from `(origin, destination, rate)` triples.
    /// Invalid triples are skipped with a warning.
    pub fn from_rates<I, C>(rates: I) -> Self
    where
        I: IntoIterator<Item = (C, C, f64)>,
        C: Into<Currency>,
    {
        let mut graph = Self::new();
        let mut skipped_invalid = 0;

        for (origin, destination, rate) in rates {
            if let Err(e) = graph.upsert(origin.into(), destination.into(), rate) {
                warn!("Skipping rate: {}", e);
                skipped_invalid += 1;
            }
        }

        debug!(
            "Graph built: {} nodes, {} edges ({} skipped)",
            graph.node_count(),
            graph.edge_count(),
            skipped_invalid
        );

        graph
    }

    /// Insert or overwrite the edge `origin -> destination`.
    ///
    /// Fails (graph unchanged) when the rate is not finite and positive, or
    /// when origin and destination are the same currency.
    pub fn upsert(&mut self, origin: Currency, destination: Currency, rate: f64) -> Result<(), GraphError> {
        validate_rate(&origin, &destination, rate)?;
        self.rates.entry(destination.clone()).or_default();
        self.rates.entry(origin).or_default().insert(destination, rate);
        Ok(())
    }

    /// Write both directions of a traded pair, or neither.
    pub fn upsert_pair(
        &mut self,
        base: Currency,
        quote: Currency,
        base_to_quote: f64,
        quote_to_base: f64,
    ) -> Result<(), GraphError> {
        validate_rate(&base, &quote, base_to_quote)?;
        validate_rate(&quote, &base, quote_to_base)?;

        self.rates.entry(base.clone()).or_default().insert(quote.clone(), base_to_quote);
        self.rates.entry(quote).or_default().insert(base, quote_to_base);
        Ok(())
    }

    pub fn rate(&self, origin: &Currency, destination: &Currency) -> Option<f64> {
        self.rates.get(origin)?.get(destination).copied()
    }

    pub fn contains(&self, currency: &Currency) -> bool {
        self.rates.contains_key(currency)
    }

    pub fn node_count(&self) -> usize {
        self.rates.len()
    }

    pub fn edge_count(&self) -> usize {
        self.rates.values().map(BTreeMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.rates.is_empty()
    }

    /// All currencies, in symbol order
    pub fn currencies(&self) -> impl Iterator<Item = &Currency> {
        self.rates.keys()
    }

    /// All edges as `(origin, destination, rate)`, in symbol order
    pub fn edges(&self) -> impl Iterator<Item = (&Currency, &Currency, f64)> {
        self.rates
            .iter()
            .flat_map(|(origin, row)| row.iter().map(move |(dest, &rate)| (origin, dest, rate)))
    }

    /// Remove a single edge. Nodes left without any edge are pruned.
    pub fn remove_edge(&mut self, origin: &Currency, destination: &Currency) -> bool {
        let removed = self
            .rates
            .get_mut(origin)
            .map(|row| row.remove(destination).is_some())
            .unwrap_or(false);

        if removed {
            self.prune_orphan(origin);
            self.prune_orphan(destination);
        }
        removed
    }

    /// Remove a node with every edge into and out of it.
    pub fn remove_node(&mut self, currency: &Currency) -> bool {
        let Some(outgoing) = self.rates.remove(currency) else {
            return false;
        };

        let mut neighbours: BTreeSet<Currency> = outgoing.into_keys().collect();
        for (origin, row) in self.rates.iter_mut() {
            if row.remove(currency).is_some() {
                neighbours.insert(origin.clone());
            }
        }

        for neighbour in &neighbours {
            self.prune_orphan(neighbour);
        }
        true
    }

    /// Remove both directions of a delisted instrument.
    pub fn remove_instrument(&mut self, instrument: &Instrument) -> bool {
        let forward = self.remove_edge(&instrument.base, &instrument.quote);
        let backward = self.remove_edge(&instrument.quote, &instrument.base);
        forward || backward
    }

    /// Drop every node and edge not backed by a currently listed instrument.
    ///
    /// A currency survives if it is a leg of any active instrument; an edge
    /// survives if its pair is listed in either orientation.
    pub fn retain_instruments(&mut self, active: &HashSet<Instrument>) -> PruneReport {
        let mut report = PruneReport::default();

        let listed: HashSet<&Currency> = active
            .iter()
            .flat_map(|i| [&i.base, &i.quote])
            .collect();

        let stale_nodes: Vec<Currency> = self
            .rates
            .keys()
            .filter(|c| !listed.contains(c))
            .cloned()
            .collect();

        report.removed_edges += self
            .edges()
            .filter(|(origin, dest, _)| !listed.contains(origin) || !listed.contains(dest))
            .count();

        for currency in &stale_nodes {
            self.rates.remove(currency);
            for row in self.rates.values_mut() {
                row.remove(currency);
            }
        }
        report.removed_nodes = stale_nodes;

        for (origin, row) in self.rates.iter_mut() {
            let before = row.len();
            row.retain(|dest, _| {
                active.contains(&Instrument::new(origin.clone(), dest.clone()))
                    || active.contains(&Instrument::new(dest.clone(), origin.clone()))
            });
            report.removed_edges += before - row.len();
        }

        let orphans: Vec<Currency> = self
            .rates
            .keys()
            .filter(|c| self.is_orphan(c))
            .cloned()
            .collect();
        for orphan in orphans {
            self.rates.remove(&orphan);
            report.removed_nodes.push(orphan);
        }

        report
    }

    fn is_orphan(&self, currency: &Currency) -> bool {
        let has_outgoing = self.rates.get(currency).is_some_and(|row| !row.is_empty());
        let has_incoming = self.rates.values().any(|row| row.contains_key(currency));
        !has_outgoing && !has_incoming
    }

    fn prune_orphan(&mut self, currency: &Currency) {
        if self.contains(currency) && self.is_orphan(currency) {
            self.rates.remove(currency);
        }
    }
}

// ============================================
// SHARED HANDLE
// ============================================

/// Result of applying one feed message to the graph
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ApplyReport {
    pub applied: usize,
    pub rejected: usize,
}

impl ApplyReport {
    pub fn changed(&self) -> bool {
        self.applied > 0
    }
}

/// Shared-ownership handle to the live rate graph.
///
/// Writers go through a write lock and copy-on-write, so a snapshot
/// handed to a detection pass is frozen at the moment it was taken.
#[derive(Debug, Clone, Default)]
pub struct GraphHandle {
    inner: Arc<RwLock<Arc<RateGraph>>>,
}

impl GraphHandle {
    pub fn new(graph: RateGraph) -> Self {
        Self {
            inner: Arc::new(RwLock::new(Arc::new(graph))),
        }
    }

    /// Point-in-time immutable view of the graph
    pub async fn snapshot(&self) -> Arc<RateGraph> {
        Arc::clone(&*self.inner.read().await)
    }

    pub async fn upsert(&self, origin: Currency, destination: Currency, rate: f64) -> Result<(), GraphError> {
        let mut guard = self.inner.write().await;
        Arc::make_mut(&mut guard).upsert(origin, destination, rate)
    }

    /// Apply a batch of quotes under a single write lock.
    ///
    /// Each quote writes base->quote and quote->base together; a quote whose
    /// fee-adjusted rates fail validation is skipped and counted.
    pub async fn apply_quotes(&self, quotes: &[QuoteUpdate], fee_rate: f64) -> ApplyReport {
        let mut report = ApplyReport::default();
        if quotes.is_empty() {
            return report;
        }

        let mut guard = self.inner.write().await;
        let graph = Arc::make_mut(&mut guard);

        for quote in quotes {
            let (base_to_quote, quote_to_base) = quote.conversion_rates(fee_rate);
            match graph.upsert_pair(
                quote.instrument.base.clone(),
                quote.instrument.quote.clone(),
                base_to_quote,
                quote_to_base,
            ) {
                Ok(()) => report.applied += 1,
                Err(e) => {
                    warn!("Rejected quote for {}: {}", quote.instrument, e);
                    report.rejected += 1;
                }
            }
        }

        report
    }

    pub async fn retain_instruments(&self, active: &HashSet<Instrument>) -> PruneReport {
        let mut guard = self.inner.write().await;
        let report = Arc::make_mut(&mut guard).retain_instruments(active);

        if !report.is_empty() {
            info!(
                "Cleaned graph: removed {} delisted currencies, {} stale edges",
                report.removed_nodes.len(),
                report.removed_edges
            );
        }
        report
    }
}
