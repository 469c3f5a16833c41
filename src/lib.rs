//! arbscan - streaming currency-cycle arbitrage detector
//!
//! - [`cartographer`]: rate graph, market model and the Poloniex feed
//! - [`brain`]: -ln(rate) transform, Bellman-Ford cycle search, profit filter
//! - [`scanner`]: detection loop driven by graph updates
//! - [`journal`]: append-only opportunity log

pub mod brain;
pub mod cartographer;
pub mod config;
pub mod journal;
pub mod scanner;

pub use brain::{Cycle, CycleDetector, Evaluation, Opportunity, ProfitFilter};
pub use cartographer::{Currency, GraphHandle, Instrument, QuoteUpdate, RateGraph};
pub use config::Config;
pub use scanner::{scan, Scanner};
