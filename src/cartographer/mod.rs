//! Phase 1: The Cartographer (Data Ingest)
//!
//! Streams best bid/ask quotes from the exchange websocket into a shared,
//! snapshot-able rate graph.

mod graph;
mod market;
mod poloniex;

pub use graph::{ApplyReport, Currency, GraphError, GraphHandle, PruneReport, RateGraph};
pub use market::{Instrument, InstrumentParseError, QuoteUpdate};
pub use poloniex::{
    parse_book_message, parse_ticker_symbols, Backoff, FeedError, FeedStats, PoloniexFeed,
};
