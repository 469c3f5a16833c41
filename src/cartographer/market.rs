//! Market model: instruments and top-of-book quotes
//!
//! Step 1.1: The Price Reader
//!
//! Turns a best bid / best ask for a `BASE_QUOTE` instrument into the two
//! complementary conversion rates stored in the graph. The fee convention is
//! fixed here and nowhere else:
//!
//! - base -> quote: sell base at the bid, fee deducted: `bid * (1 - fee)`
//! - quote -> base: buy base at the ask, fee added: `1 / (ask * (1 + fee))`

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

use super::graph::Currency;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("malformed instrument symbol {0:?} (expected BASE_QUOTE)")]
pub struct InstrumentParseError(pub String);

/// A traded pair such as `BTC_USDT` (base BTC, quote USDT)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Instrument {
    pub base: Currency,
    pub quote: Currency,
}

impl Instrument {
    pub fn new(base: Currency, quote: Currency) -> Self {
        Self { base, quote }
    }

    /// Exchange symbol, e.g. `BTC_USDT`
    pub fn symbol(&self) -> String {
        format!("{}_{}", self.base, self.quote)
    }
}

impl FromStr for Instrument {
    type Err = InstrumentParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (base, quote) = s
            .trim()
            .split_once('_')
            .ok_or_else(|| InstrumentParseError(s.to_string()))?;

        if base.is_empty() || quote.is_empty() || quote.contains('_') || base == quote {
            return Err(InstrumentParseError(s.to_string()));
        }

        Ok(Self::new(Currency::new(base), Currency::new(quote)))
    }
}

impl fmt::Display for Instrument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}", self.base, self.quote)
    }
}

/// Best bid / best ask for one instrument, prices in quote units per base
#[derive(Debug, Clone, PartialEq)]
pub struct QuoteUpdate {
    pub instrument: Instrument,
    pub best_bid: f64,
    pub best_ask: f64,
}

impl QuoteUpdate {
    pub fn new(instrument: Instrument, best_bid: f64, best_ask: f64) -> Self {
        Self {
            instrument,
            best_bid,
            best_ask,
        }
    }

    /// Fee-adjusted `(base_to_quote, quote_to_base)` rates.
    ///
    /// Non-positive prices produce non-positive (or infinite) rates, which
    /// the graph rejects on write.
    pub fn conversion_rates(&self, fee_rate: f64) -> (f64, f64) {
        let base_to_quote = self.best_bid * (1.0 - fee_rate);
        let quote_to_base = 1.0 / (self.best_ask * (1.0 + fee_rate));
        (base_to_quote, quote_to_base)
    }
}
