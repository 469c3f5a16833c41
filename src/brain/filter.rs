//! Profit Filter
//!
//! Step 2.2: The Filter
//!
//! Re-prices a detected cycle from the raw rates of the snapshot it was
//! found in (never from the log-domain distances, which drift through the
//! transform / relax / back-walk pipeline) and keeps only loops whose
//! product beats the configured ratio.
//!
//! Classification is exclusive: opportunity iff `profit_ratio > min_profit_ratio`.

use chrono::{DateTime, Utc};
use console::style;
use tracing::debug;

use super::Cycle;
use crate::cartographer::{Currency, GraphError, RateGraph};

/// Default minimum product-of-rates to report (5% round trip)
pub const DEFAULT_MIN_PROFIT_RATIO: f64 = 1.05;

/// One conversion step of a cycle
#[derive(Debug, Clone, PartialEq)]
pub struct Leg {
    pub from: Currency,
    pub to: Currency,
    pub rate: f64,
    /// Product of rates up to and including this leg
    pub running_product: f64,
}

/// Result of re-pricing a cycle
#[derive(Debug, Clone)]
pub struct Evaluation {
    pub cycle: Cycle,
    pub profit_ratio: f64,
    pub is_opportunity: bool,
    pub legs: Vec<Leg>,
}

impl Evaluation {
    pub fn profit_percentage(&self) -> f64 {
        (self.profit_ratio - 1.0) * 100.0
    }

    pub fn into_opportunity(self, timestamp: DateTime<Utc>) -> Opportunity {
        Opportunity {
            cycle: self.cycle,
            profit_ratio: self.profit_ratio,
            timestamp,
            legs: self.legs,
        }
    }
}

/// A cycle that cleared the threshold, stamped with when it was seen
#[derive(Debug, Clone)]
pub struct Opportunity {
    pub cycle: Cycle,
    pub profit_ratio: f64,
    pub timestamp: DateTime<Utc>,
    pub legs: Vec<Leg>,
}

impl Opportunity {
    pub fn profit_percentage(&self) -> f64 {
        (self.profit_ratio - 1.0) * 100.0
    }

    /// Print the per-leg breakdown, starting with one unit of the first currency
    pub fn print_breakdown(&self) {
        println!();
        println!(
            "{}",
            style(format!(
                "💰 OPPORTUNITY: {} | {:.6}x ({:+.4}%)",
                self.cycle,
                self.profit_ratio,
                self.profit_percentage()
            ))
            .green()
            .bold()
        );
        println!("   Seen at {}", self.timestamp.format("%Y-%m-%d %H:%M:%S UTC"));
        println!("   Starting with 1 {}:", self.cycle.path()[0]);
        for leg in &self.legs {
            println!(
                "     {} → {}: {:.6} || Total → {:.6}",
                style(&leg.from).cyan(),
                style(&leg.to).cyan(),
                leg.rate,
                leg.running_product
            );
        }
        println!();
    }
}

/// Profit calculator and filter
#[derive(Debug, Clone, Copy)]
pub struct ProfitFilter {
    /// Minimum product of rates for a cycle to count as an opportunity
    min_profit_ratio: f64,
}

impl ProfitFilter {
    pub fn new(min_profit_ratio: f64) -> Self {
        Self { min_profit_ratio }
    }

    pub fn min_profit_ratio(&self) -> f64 {
        self.min_profit_ratio
    }

    pub fn is_opportunity(&self, profit_ratio: f64) -> bool {
        profit_ratio > self.min_profit_ratio
    }

    /// Multiply the snapshot's rates around the cycle and classify it.
    ///
    /// Fails only if a hop has no edge in `rates`, which cannot happen when
    /// `rates` is the snapshot the cycle was detected in.
    pub fn evaluate(&self, cycle: &Cycle, rates: &RateGraph) -> Result<Evaluation, GraphError> {
        let mut legs = Vec::with_capacity(cycle.hop_count());
        let mut product = 1.0;

        for (from, to) in cycle.hops() {
            let rate = rates.rate(from, to).ok_or_else(|| GraphError::MissingEdge {
                origin: from.clone(),
                destination: to.clone(),
            })?;
            product *= rate;
            legs.push(Leg {
                from: from.clone(),
                to: to.clone(),
                rate,
                running_product: product,
            });
        }

        let is_opportunity = self.is_opportunity(product);
        debug!(
            "Evaluated {} | {:.6}x | opportunity: {}",
            cycle, product, is_opportunity
        );

        Ok(Evaluation {
            cycle: cycle.clone(),
            profit_ratio: product,
            is_opportunity,
            legs,
        })
    }
}

impl Default for ProfitFilter {
    fn default() -> Self {
        Self::new(DEFAULT_MIN_PROFIT_RATIO)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::brain::CycleDetector;
    use crate::cartographer::QuoteUpdate;

    fn c(s: &str) -> Currency {
        Currency::new(s)
    }

    fn triangle(ab: f64, bc: f64, ca: f64) -> (RateGraph, Cycle) {
        let rates = RateGraph::from_rates([("A", "B", ab), ("B", "C", bc), ("C", "A", ca)]);
        let cycle = Cycle::new(vec![c("A"), c("B"), c("C"), c("A")], 0.0).unwrap();
        (rates, cycle)
    }

    #[test]
    fn test_profit_recomputed_from_rates() {
        let rates = RateGraph::from_rates([("A", "B", 2.0), ("B", "C", 2.0), ("C", "A", 0.30)]);
        let cycle = CycleDetector::new().detect(&rates).unwrap();

        let eval = ProfitFilter::default().evaluate(&cycle, &rates).unwrap();
        assert!((eval.profit_ratio - 1.2).abs() < 1e-12);
        assert!(eval.is_opportunity);
        assert!((eval.profit_percentage() - 20.0).abs() < 1e-9);
        assert_eq!(eval.legs.len(), 3);
        assert!((eval.legs[2].running_product - eval.profit_ratio).abs() < 1e-15);
    }

    #[test]
    fn test_threshold_is_exclusive() {
        let filter = ProfitFilter::new(1.05);
        assert!(!filter.is_opportunity(1.05));
        assert!(!filter.is_opportunity(1.0499999));
        assert!(filter.is_opportunity(1.0500001));

        let (rates, cycle) = triangle(1.0, 1.0, 1.0499999);
        assert!(!filter.evaluate(&cycle, &rates).unwrap().is_opportunity);

        let (rates, cycle) = triangle(1.0, 1.0, 1.0500001);
        assert!(filter.evaluate(&cycle, &rates).unwrap().is_opportunity);
    }

    #[test]
    fn test_missing_edge_is_reported() {
        let rates = RateGraph::from_rates([("A", "B", 2.0), ("B", "C", 2.0)]);
        let cycle = Cycle::new(vec![c("A"), c("B"), c("C"), c("A")], 0.0).unwrap();

        let err = ProfitFilter::default().evaluate(&cycle, &rates).unwrap_err();
        assert_eq!(
            err,
            GraphError::MissingEdge {
                origin: c("C"),
                destination: c("A")
            }
        );
    }

    #[test]
    fn test_higher_fee_lowers_every_cycle() {
        // A -> B -> C -> A sells base at the bid on every leg: 2 * 2 * 0.265 = 1.06 gross
        let quotes = [
            QuoteUpdate::new("A_B".parse().unwrap(), 2.0, 2.0),
            QuoteUpdate::new("B_C".parse().unwrap(), 2.0, 2.0),
            QuoteUpdate::new("C_A".parse().unwrap(), 0.265, 0.265),
        ];
        let cycle = Cycle::new(vec![c("A"), c("B"), c("C"), c("A")], 0.0).unwrap();
        let filter = ProfitFilter::new(1.05);

        let mut last = f64::INFINITY;
        let mut verdicts = Vec::new();
        for fee in [0.0, 0.001, 0.005, 0.01] {
            let mut rates = RateGraph::new();
            for q in &quotes {
                let (fwd, back) = q.conversion_rates(fee);
                rates
                    .upsert_pair(q.instrument.base.clone(), q.instrument.quote.clone(), fwd, back)
                    .unwrap();
            }
            let eval = filter.evaluate(&cycle, &rates).unwrap();
            assert!(eval.profit_ratio < last, "fee {fee} did not lower the ratio");
            last = eval.profit_ratio;
            verdicts.push(eval.is_opportunity);
        }

        // 6% at no fee, 1.06 * 0.99^3 ~ 1.0285 at 1%
        assert!(verdicts[0]);
        assert!(!verdicts[3]);
    }

    #[test]
    fn test_opportunity_keeps_evaluation_data() {
        let (rates, cycle) = triangle(2.0, 2.0, 0.3);
        let eval = ProfitFilter::default().evaluate(&cycle, &rates).unwrap();
        let now = Utc::now();
        let opp = eval.clone().into_opportunity(now);

        assert_eq!(opp.timestamp, now);
        assert_eq!(opp.profit_ratio, eval.profit_ratio);
        assert_eq!(opp.legs, eval.legs);
        assert_eq!(opp.cycle, eval.cycle);
    }
}
