//! Phase 3: The Scanner
//!
//! Waits for graph version bumps from the feed, takes a snapshot and runs
//! transform → Bellman-Ford → profit filter on the blocking pool. Only one
//! pass runs at a time; versions published during a pass collapse into a
//! single follow-up pass over the newest snapshot.

use chrono::Utc;
use indicatif::{ProgressBar, ProgressStyle};
use std::time::{Duration, Instant};
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use crate::brain::{CycleDetector, Evaluation, ProfitFilter};
use crate::cartographer::{GraphHandle, RateGraph};
use crate::config::Config;
use crate::journal::OpportunityJournal;

const SPINNER_FRAMES: &[&str] = &["-", "\\", "|", "/"];

/// Detect and price at most one cycle in `rates`
pub fn scan(rates: &RateGraph, detector: &CycleDetector, filter: &ProfitFilter) -> Option<Evaluation> {
    let cycle = detector.detect(rates)?;
    match filter.evaluate(&cycle, rates) {
        Ok(evaluation) => Some(evaluation),
        Err(e) => {
            warn!("Could not price cycle {}: {}", cycle, e);
            None
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ScanStats {
    pub passes: u64,
    pub cycles_found: u64,
    pub opportunities: u64,
    pub best_ratio: Option<f64>,
    pub last_pass: Option<Duration>,
}

pub struct Scanner {
    graph: GraphHandle,
    detector: CycleDetector,
    filter: ProfitFilter,
    journal: Option<OpportunityJournal>,
    spinner: ProgressBar,
    stats: ScanStats,
}

impl Scanner {
    pub fn new(graph: GraphHandle, detector: CycleDetector, filter: ProfitFilter) -> Self {
        Self {
            graph,
            detector,
            filter,
            journal: None,
            spinner: ProgressBar::hidden(),
            stats: ScanStats::default(),
        }
    }

    pub fn from_config(graph: GraphHandle, config: &Config) -> Self {
        let scanner = Self::new(
            graph,
            CycleDetector::new(),
            ProfitFilter::new(config.min_profit_ratio),
        );
        if config.opportunity_log {
            scanner.with_journal(OpportunityJournal::new(&config.opportunity_log_path))
        } else {
            scanner
        }
    }

    pub fn with_journal(mut self, journal: OpportunityJournal) -> Self {
        self.journal = Some(journal);
        self
    }

    /// Tick a console spinner between passes
    pub fn with_spinner(mut self) -> Self {
        let spinner = ProgressBar::new_spinner();
        spinner.set_style(
            ProgressStyle::default_spinner()
                .tick_strings(SPINNER_FRAMES)
                .template("{msg} {spinner:.cyan}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        spinner.set_message("Searching for opportunities");
        spinner.enable_steady_tick(Duration::from_millis(100));
        self.spinner = spinner;
        self
    }

    pub fn stats(&self) -> &ScanStats {
        &self.stats
    }

    /// Scan on every graph version until shutdown or until the feed is gone
    pub async fn run(
        mut self,
        mut updates: watch::Receiver<u64>,
        mut shutdown: watch::Receiver<bool>,
    ) -> ScanStats {
        info!(
            "🧠 Scanner ready (min profit ratio {:.4})",
            self.filter.min_profit_ratio()
        );

        loop {
            if *shutdown.borrow() {
                break;
            }

            tokio::select! {
                biased;
                _ = shutdown.changed() => break,
                changed = updates.changed() => {
                    if changed.is_err() {
                        debug!("Update channel closed");
                        break;
                    }
                }
            }

            let version = *updates.borrow_and_update();
            self.pass(version).await;
        }

        self.spinner.finish_and_clear();
        info!(
            "🧠 Scanner stopped after {} passes ({} opportunities)",
            self.stats.passes, self.stats.opportunities
        );
        self.stats
    }

    /// One detection pass over the current snapshot
    pub async fn pass(&mut self, version: u64) {
        let snapshot = self.graph.snapshot().await;
        let detector = self.detector;
        let filter = self.filter;

        let started = Instant::now();
        let result = tokio::task::spawn_blocking(move || scan(&snapshot, &detector, &filter)).await;
        let elapsed = started.elapsed();

        self.stats.passes += 1;
        self.stats.last_pass = Some(elapsed);

        match result {
            Ok(Some(evaluation)) => self.report(evaluation),
            Ok(None) => debug!("v{}: no negative cycle ({:?})", version, elapsed),
            Err(e) => error!("Detection pass v{} failed: {}", version, e),
        }
    }

    fn report(&mut self, evaluation: Evaluation) {
        self.stats.cycles_found += 1;
        self.stats.best_ratio = Some(
            self.stats
                .best_ratio
                .map_or(evaluation.profit_ratio, |best| best.max(evaluation.profit_ratio)),
        );

        if !evaluation.is_opportunity {
            debug!(
                "Cycle {} below threshold: {:.6}x",
                evaluation.cycle, evaluation.profit_ratio
            );
            return;
        }

        self.stats.opportunities += 1;
        let opportunity = evaluation.into_opportunity(Utc::now());
        info!(
            cycle = %opportunity.cycle,
            profit_ratio = opportunity.profit_ratio,
            profit_pct = opportunity.profit_percentage(),
            "Arbitrage opportunity"
        );

        self.spinner.suspend(|| opportunity.print_breakdown());

        if let Some(journal) = &self.journal {
            if let Err(e) = journal.append(&opportunity) {
                error!("Failed to write {}: {}", journal.path().display(), e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profitable() -> RateGraph {
        RateGraph::from_rates([("A", "B", 2.0), ("B", "C", 2.0), ("C", "A", 0.30)])
    }

    #[test]
    fn test_scan_finds_and_prices_cycle() {
        let eval = scan(&profitable(), &CycleDetector::new(), &ProfitFilter::default()).unwrap();
        assert!(eval.is_opportunity);
        assert!((eval.profit_ratio - 1.2).abs() < 1e-12);
    }

    #[test]
    fn test_scan_respects_threshold() {
        let eval = scan(&profitable(), &CycleDetector::new(), &ProfitFilter::new(1.5)).unwrap();
        assert!(!eval.is_opportunity);
    }

    #[test]
    fn test_scan_without_cycle() {
        let dag = RateGraph::from_rates([("A", "B", 2.0), ("B", "C", 2.0)]);
        assert!(scan(&dag, &CycleDetector::new(), &ProfitFilter::default()).is_none());
        assert!(scan(&RateGraph::new(), &CycleDetector::new(), &ProfitFilter::default()).is_none());
    }

    #[tokio::test]
    async fn test_run_reports_and_journals_until_feed_closes() {
        let dir = tempfile::tempdir().unwrap();
        let log_path = dir.path().join("arbitrage.txt");

        let graph = GraphHandle::new(profitable());
        let scanner = Scanner::new(graph, CycleDetector::new(), ProfitFilter::default())
            .with_journal(OpportunityJournal::new(&log_path));

        let (updates_tx, updates_rx) = watch::channel(0u64);
        let (_shutdown_tx, shutdown_rx) = watch::channel(false);

        // two bumps before the scanner runs collapse into one pass
        updates_tx.send_modify(|v| *v += 1);
        updates_tx.send_modify(|v| *v += 1);
        drop(updates_tx);

        let stats = scanner.run(updates_rx, shutdown_rx).await;
        assert_eq!(stats.passes, 1);
        assert_eq!(stats.opportunities, 1);
        assert!(stats.last_pass.is_some());
        assert!((stats.best_ratio.unwrap() - 1.2).abs() < 1e-12);

        let journal = std::fs::read_to_string(&log_path).unwrap();
        assert!(journal.starts_with("Cycle Time "));
        assert!(journal.contains("Profit ratio: 1.200000 (+20.0000%)"));
    }

    #[tokio::test]
    async fn test_run_stops_on_shutdown() {
        let scanner = Scanner::new(
            GraphHandle::default(),
            CycleDetector::new(),
            ProfitFilter::default(),
        );
        let (_updates_tx, updates_rx) = watch::channel(0u64);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let handle = tokio::spawn(scanner.run(updates_rx, shutdown_rx));
        shutdown_tx.send(true).unwrap();

        let stats = handle.await.unwrap();
        assert_eq!(stats.passes, 0);
    }
}
