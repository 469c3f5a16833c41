//! Phase 2: The Brain
//!
//! Responsible for:
//! - Turning the rate graph into a -ln(rate) graph with a fictitious source
//! - Finding one negative cycle (arbitrage loop) with Bellman-Ford
//! - Re-pricing the loop from raw rates and filtering by profit ratio

mod bellman_ford;
mod filter;
mod transform;

pub use bellman_ford::{Cycle, CycleDetector, DEFAULT_TOLERANCE};
pub use filter::{Evaluation, Leg, Opportunity, ProfitFilter, DEFAULT_MIN_PROFIT_RATIO};
pub use transform::{TransformedGraph, Vertex};
