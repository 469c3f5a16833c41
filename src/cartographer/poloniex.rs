//! Poloniex Feed
//!
//! Step 1.2: The Listener
//!
//! Keeps the rate graph in step with the Poloniex v3 public websocket.
//! Each session:
//! 1. Discovers listed symbols over the `ticker` channel
//! 2. Drops delisted currencies and pairs from the graph
//! 3. Subscribes to `book` and applies every top-of-book update
//! 4. Ends on the session budget, a receive timeout or a disconnect
//!
//! Disconnects are retried forever with backoff. The graph is never reset
//! between sessions; stale edges stay until the next discovery prunes them.

use std::collections::HashSet;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use rand::Rng;
use serde::Deserialize;
use serde_json::{json, Value};
use thiserror::Error;
use tokio::net::TcpStream;
use tokio::sync::watch;
use tokio::time::{sleep, sleep_until, Instant};
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};
use tracing::{debug, error, info, trace, warn};

use super::graph::GraphHandle;
use super::market::{Instrument, InstrumentParseError, QuoteUpdate};
use crate::config::Config;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

const PING_MESSAGE: &str = r#"{"event":"ping"}"#;

#[derive(Debug, Error)]
pub enum FeedError {
    #[error(transparent)]
    InvalidInstrument(#[from] InstrumentParseError),

    #[error("invalid {side} price {value} for {symbol}")]
    InvalidPrice {
        symbol: String,
        side: &'static str,
        value: String,
    },

    #[error("websocket error: {0}")]
    Websocket(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("malformed feed message: {0}")]
    Json(#[from] serde_json::Error),

    #[error("no market data received for {0:?}")]
    Timeout(Duration),

    #[error("connection closed by server")]
    Closed,
}

// ============================================
// WIRE FORMAT
// ============================================

#[derive(Debug, Deserialize)]
struct FeedMessage {
    #[serde(default)]
    channel: Option<String>,
    #[serde(default)]
    event: Option<String>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    data: Option<Vec<Value>>,
}

#[derive(Debug, Deserialize)]
struct BookEntry {
    symbol: String,
    #[serde(default)]
    asks: Vec<Vec<Value>>,
    #[serde(default)]
    bids: Vec<Vec<Value>>,
}

#[derive(Debug, Deserialize)]
struct TickerEntry {
    symbol: String,
}

/// Parse one `book` channel message into top-of-book quotes.
///
/// Non-book messages (subscription acks, pongs) yield an empty list.
/// Entries with an empty side, a malformed symbol or an unusable price are
/// skipped individually; only a message that is not JSON at all fails.
pub fn parse_book_message(text: &str) -> Result<Vec<QuoteUpdate>, FeedError> {
    let msg: FeedMessage = serde_json::from_str(text)?;

    if msg.event.as_deref() == Some("error") {
        warn!("Feed error event: {}", msg.message.as_deref().unwrap_or("<no message>"));
        return Ok(vec![]);
    }

    let is_book = msg.channel.as_deref().is_some_and(|c| c.starts_with("book"));
    let Some(data) = msg.data.filter(|_| is_book) else {
        trace!("Ignoring non-book message: {}", text);
        return Ok(vec![]);
    };

    let mut quotes = Vec::with_capacity(data.len());
    for entry in data {
        match parse_book_entry(entry) {
            Ok(Some(quote)) => quotes.push(quote),
            Ok(None) => {}
            Err(e) => debug!("Skipping book entry: {}", e),
        }
    }
    Ok(quotes)
}

fn parse_book_entry(entry: Value) -> Result<Option<QuoteUpdate>, FeedError> {
    let entry: BookEntry = serde_json::from_value(entry)?;
    let instrument: Instrument = entry.symbol.parse()?;

    let (Some(ask), Some(bid)) = (entry.asks.first(), entry.bids.first()) else {
        return Ok(None);
    };
    let best_ask = level_price(ask, &entry.symbol, "ask")?;
    let best_bid = level_price(bid, &entry.symbol, "bid")?;

    Ok(Some(QuoteUpdate::new(instrument, best_bid, best_ask)))
}

/// Price of a `[price, quantity]` level; Poloniex sends prices as strings
fn level_price(level: &[Value], symbol: &str, side: &'static str) -> Result<f64, FeedError> {
    let invalid = |value: String| FeedError::InvalidPrice {
        symbol: symbol.to_string(),
        side,
        value,
    };

    let raw = level.first().ok_or_else(|| invalid("<missing>".to_string()))?;
    let price = match raw {
        Value::String(s) => s.parse::<f64>().ok(),
        Value::Number(n) => n.as_f64(),
        _ => None,
    };

    match price {
        Some(p) if p.is_finite() && p > 0.0 => Ok(p),
        _ => Err(invalid(raw.to_string())),
    }
}

/// Listed instruments from a `ticker` snapshot, or `None` for any message
/// that carries no `data` (subscription ack, pong)
pub fn parse_ticker_symbols(text: &str) -> Option<Vec<Instrument>> {
    let msg: FeedMessage = serde_json::from_str(text).ok()?;
    let data = msg.data?;

    let instruments = data
        .into_iter()
        .filter_map(|entry| {
            let ticker: TickerEntry = serde_json::from_value(entry).ok()?;
            match ticker.symbol.parse::<Instrument>() {
                Ok(instrument) => Some(instrument),
                Err(e) => {
                    debug!("Skipping listed symbol: {}", e);
                    None
                }
            }
        })
        .collect();
    Some(instruments)
}

// ============================================
// RECONNECT BACKOFF
// ============================================

/// Exponential reconnect delay. With `initial == max` it degenerates to a
/// fixed delay.
#[derive(Debug, Clone)]
pub struct Backoff {
    initial: Duration,
    max: Duration,
    current: Duration,
    multiplier: u32,
}

impl Backoff {
    pub fn new(initial: Duration, max: Duration) -> Self {
        let max = max.max(initial);
        Self {
            initial,
            max,
            current: initial,
            multiplier: 2,
        }
    }

    /// Delay for the next attempt, then grow toward the cap
    pub fn next_delay(&mut self) -> Duration {
        let delay = self.current;
        self.current = self
            .current
            .checked_mul(self.multiplier)
            .unwrap_or(self.max)
            .min(self.max);
        delay
    }

    /// `delay` plus up to 10% random jitter
    pub fn jittered(delay: Duration) -> Duration {
        let factor = rand::thread_rng().gen_range(0.0..=0.1);
        delay + delay.mul_f64(factor)
    }

    pub fn reset(&mut self) {
        self.current = self.initial;
    }
}

// ============================================
// FEED
// ============================================

/// Counters reported when the feed stops
#[derive(Debug, Clone, Default)]
pub struct FeedStats {
    pub sessions: u64,
    pub connection_failures: u64,
    pub messages: u64,
    pub ignored_messages: u64,
    pub quotes_applied: u64,
    pub quotes_rejected: u64,
    pub graph_versions: u64,
}

/// Poloniex websocket feed writing into a shared rate graph
pub struct PoloniexFeed {
    config: Config,
    graph: GraphHandle,
    updates: watch::Sender<u64>,
    backoff: Backoff,
    stats: FeedStats,
}

impl PoloniexFeed {
    /// `updates` carries a version counter bumped after every message that
    /// changed the graph
    pub fn new(config: Config, graph: GraphHandle, updates: watch::Sender<u64>) -> Self {
        let backoff = config.backoff();
        Self {
            config,
            graph,
            updates,
            backoff,
            stats: FeedStats::default(),
        }
    }

    pub fn stats(&self) -> &FeedStats {
        &self.stats
    }

    /// Run sessions until `shutdown` flips to true (or its sender is gone)
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) -> FeedStats {
        info!("📡 Feed starting: {}", self.config.feed_url);

        loop {
            if *shutdown.borrow() {
                break;
            }

            let outcome = tokio::select! {
                _ = shutdown.changed() => break,
                outcome = self.session() => outcome,
            };

            match outcome {
                Ok(()) => debug!("Session budget spent, re-discovering symbols"),
                Err(e) => {
                    self.stats.connection_failures += 1;
                    let delay = Backoff::jittered(self.backoff.next_delay());
                    warn!("Feed connection lost ({}), reconnecting in {:.1}s", e, delay.as_secs_f64());

                    tokio::select! {
                        _ = shutdown.changed() => break,
                        _ = sleep(delay) => {}
                    }
                }
            }
        }

        info!(
            "📡 Feed stopped after {} sessions ({} failures)",
            self.stats.sessions, self.stats.connection_failures
        );
        self.stats
    }

    /// Discover, clean, subscribe and stream until the session ends
    async fn session(&mut self) -> Result<(), FeedError> {
        let listed = self.discover_symbols().await?;
        let listed_set: HashSet<Instrument> = listed.iter().cloned().collect();
        self.graph.retain_instruments(&listed_set).await;

        let symbols = self.select_symbols(&listed);
        self.stats.sessions += 1;
        info!(
            "Session #{}: {} listed symbols, subscribing to {}",
            self.stats.sessions,
            listed.len(),
            symbols.len()
        );

        self.stream_session(&symbols).await
    }

    /// Fetch the currently listed instruments from the `ticker` channel
    pub async fn discover_symbols(&self) -> Result<Vec<Instrument>, FeedError> {
        let mut ws = self.connect().await?;
        let request = json!({
            "event": "subscribe",
            "channel": ["ticker"],
            "symbols": ["all"],
        });
        ws.send(Message::Text(request.to_string())).await?;

        let timeout = self.config.receive_timeout();
        let instruments = loop {
            let frame = tokio::time::timeout(timeout, ws.next())
                .await
                .map_err(|_| FeedError::Timeout(timeout))?;

            match frame {
                Some(Ok(Message::Text(text))) => match parse_ticker_symbols(&text) {
                    Some(instruments) if !instruments.is_empty() => break instruments,
                    _ => trace!("Waiting for ticker snapshot: {}", text),
                },
                Some(Ok(Message::Ping(data))) => ws.send(Message::Pong(data)).await?,
                Some(Ok(Message::Close(_))) | None => return Err(FeedError::Closed),
                Some(Ok(_)) => {}
                Some(Err(e)) => return Err(e.into()),
            }
        };

        if let Err(e) = ws.close(None).await {
            debug!("Discovery socket close: {}", e);
        }
        debug!("Discovered {} instruments", instruments.len());
        Ok(instruments)
    }

    /// Restrict to configured symbols when any are set
    fn select_symbols(&self, listed: &[Instrument]) -> Vec<Instrument> {
        if self.config.symbols.is_empty() {
            return listed.to_vec();
        }

        let wanted: HashSet<&str> = self.config.symbols.iter().map(String::as_str).collect();
        let selected: Vec<Instrument> = listed
            .iter()
            .filter(|i| wanted.contains(i.symbol().as_str()))
            .cloned()
            .collect();

        if selected.len() < wanted.len() {
            warn!(
                "{} configured symbols are not listed on the exchange",
                wanted.len() - selected.len()
            );
        }
        selected
    }

    async fn connect(&self) -> Result<WsStream, FeedError> {
        let (ws, response) = connect_async(self.config.feed_url.as_str()).await?;
        debug!("Websocket connected ({})", response.status());
        Ok(ws)
    }

    /// One `book` subscription. `Ok` means the session budget ran out.
    async fn stream_session(&mut self, symbols: &[Instrument]) -> Result<(), FeedError> {
        let mut ws = self.connect().await?;
        let request = json!({
            "event": "subscribe",
            "channel": ["book"],
            "symbols": symbols.iter().map(Instrument::symbol).collect::<Vec<_>>(),
        });
        ws.send(Message::Text(request.to_string())).await?;

        let receive_timeout = self.config.receive_timeout();
        let ping_every = self.config.ping_interval();
        let mut ping = tokio::time::interval_at(Instant::now() + ping_every, ping_every);

        let budget = self.config.session_budget();
        let session_end = async move {
            match budget {
                Some(budget) => sleep(budget).await,
                None => std::future::pending::<()>().await,
            }
        };
        tokio::pin!(session_end);

        // heartbeat replies do not count, only applied book data does
        let mut last_data = Instant::now();
        loop {
            tokio::select! {
                _ = &mut session_end => {
                    if let Err(e) = ws.close(None).await {
                        debug!("Session socket close: {}", e);
                    }
                    return Ok(());
                }
                _ = sleep_until(last_data + receive_timeout) => {
                    return Err(FeedError::Timeout(receive_timeout));
                }
                _ = ping.tick() => {
                    ws.send(Message::Text(PING_MESSAGE.to_string())).await?;
                }
                frame = ws.next() => {
                    match frame {
                        Some(Ok(Message::Text(text))) => {
                            if self.handle_text(&text).await {
                                last_data = Instant::now();
                            }
                        }
                        Some(Ok(Message::Ping(data))) => ws.send(Message::Pong(data)).await?,
                        Some(Ok(Message::Close(frame))) => {
                            info!("Websocket closed by server: {:?}", frame);
                            return Err(FeedError::Closed);
                        }
                        Some(Ok(_)) => {}
                        Some(Err(e)) => {
                            error!("Websocket error: {}", e);
                            return Err(e.into());
                        }
                        None => return Err(FeedError::Closed),
                    }
                }
            }
        }
    }

    /// Apply one text frame to the graph and notify the scanner if it
    /// changed. Returns whether the graph changed.
    async fn handle_text(&mut self, text: &str) -> bool {
        self.stats.messages += 1;

        let quotes = match parse_book_message(text) {
            Ok(quotes) => quotes,
            Err(e) => {
                debug!("Skipping unparseable message: {}", e);
                self.stats.ignored_messages += 1;
                return false;
            }
        };
        if quotes.is_empty() {
            self.stats.ignored_messages += 1;
            return false;
        }

        let report = self.graph.apply_quotes(&quotes, self.config.fee_rate).await;
        self.stats.quotes_applied += report.applied as u64;
        self.stats.quotes_rejected += report.rejected as u64;

        if report.changed() {
            // data is flowing again
            self.backoff.reset();
            self.stats.graph_versions += 1;
            self.updates.send_modify(|version| *version += 1);
        }
        report.changed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cartographer::Currency;
    use futures::{SinkExt, StreamExt};
    use std::net::SocketAddr;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use tokio::net::TcpListener;
    use tokio::time::timeout;

    const BOOK_MSG: &str = r#"{
        "channel": "book",
        "data": [
            {"symbol": "BTC_USDT", "createTime": 1648052239156,
             "asks": [["40000.5", "0.01"], ["40001", "1"]],
             "bids": [["39999.5", "0.02"]],
             "id": 1, "ts": 1648052239192},
            {"symbol": "ETH_USDT", "asks": [], "bids": [["3000", "1"]]},
            {"symbol": "ETHBTC", "asks": [["0.07", "1"]], "bids": [["0.069", "1"]]},
            {"symbol": "ETH_BTC", "asks": [["0", "1"]], "bids": [["0.069", "1"]]}
        ]
    }"#;

    #[test]
    fn test_parse_book_message() {
        let quotes = parse_book_message(BOOK_MSG).unwrap();

        // empty side, malformed symbol and zero price are all skipped
        assert_eq!(quotes.len(), 1);
        let q = &quotes[0];
        assert_eq!(q.instrument.base, Currency::new("BTC"));
        assert_eq!(q.instrument.quote, Currency::new("USDT"));
        assert_eq!(q.best_ask, 40000.5);
        assert_eq!(q.best_bid, 39999.5);
    }

    #[test]
    fn test_non_book_messages_are_ignored() {
        let ack = r#"{"event":"subscribe","channel":"book","symbols":["BTC_USDT"]}"#;
        assert!(parse_book_message(ack).unwrap().is_empty());

        let pong = r#"{"event":"pong"}"#;
        assert!(parse_book_message(pong).unwrap().is_empty());

        let ticker = r#"{"channel":"ticker","data":[{"symbol":"BTC_USDT"}]}"#;
        assert!(parse_book_message(ticker).unwrap().is_empty());

        assert!(matches!(parse_book_message("not json"), Err(FeedError::Json(_))));
    }

    #[test]
    fn test_level_price_rejects_garbage() {
        let ok = vec![Value::from("1.25"), Value::from("3")];
        assert_eq!(level_price(&ok, "A_B", "bid").unwrap(), 1.25);

        let numeric = vec![Value::from(2.5)];
        assert_eq!(level_price(&numeric, "A_B", "ask").unwrap(), 2.5);

        for bad in [vec![], vec![Value::from("abc")], vec![Value::from("-1")], vec![Value::Null]] {
            assert!(matches!(
                level_price(&bad, "A_B", "ask"),
                Err(FeedError::InvalidPrice { .. })
            ));
        }
    }

    #[test]
    fn test_parse_ticker_symbols() {
        let snapshot = r#"{"channel":"ticker","data":[
            {"symbol":"BTC_USDT","close":"40000"},
            {"symbol":"ETH_BTC","close":"0.07"},
            {"symbol":"BROKEN"}
        ]}"#;
        let instruments = parse_ticker_symbols(snapshot).unwrap();
        assert_eq!(instruments.len(), 2);
        assert_eq!(instruments[1].symbol(), "ETH_BTC");

        assert!(parse_ticker_symbols(r#"{"event":"subscribe","channel":"ticker"}"#).is_none());
        assert!(parse_ticker_symbols("garbage").is_none());
    }

    #[test]
    fn test_backoff_fixed_at_defaults() {
        let mut backoff = Config::default().backoff();
        for _ in 0..5 {
            assert_eq!(backoff.next_delay(), Duration::from_secs(2));
        }
    }

    #[test]
    fn test_backoff_exponential_capped_and_reset() {
        let mut backoff = Backoff::new(Duration::from_secs(1), Duration::from_secs(10));
        let delays: Vec<u64> = (0..6).map(|_| backoff.next_delay().as_secs()).collect();
        assert_eq!(delays, vec![1, 2, 4, 8, 10, 10]);

        backoff.reset();
        assert_eq!(backoff.next_delay(), Duration::from_secs(1));
    }

    #[test]
    fn test_jitter_bounded() {
        let base = Duration::from_secs(2);
        for _ in 0..100 {
            let d = Backoff::jittered(base);
            assert!(d >= base && d <= base.mul_f64(1.1));
        }
    }

    fn test_feed(config: Config) -> (PoloniexFeed, GraphHandle, watch::Receiver<u64>) {
        let graph = GraphHandle::default();
        let (tx, rx) = watch::channel(0u64);
        (PoloniexFeed::new(config, graph.clone(), tx), graph, rx)
    }

    #[tokio::test]
    async fn test_handle_text_updates_graph_and_version() {
        let config = Config {
            fee_rate: 0.0,
            reconnect_delay_secs: 1,
            reconnect_max_delay_secs: 8,
            ..Config::default()
        };
        let (mut feed, graph, mut rx) = test_feed(config);

        // two failed attempts grew the delay
        feed.backoff.next_delay();
        feed.backoff.next_delay();

        assert!(feed.handle_text(BOOK_MSG).await);

        // data flowing again resets the reconnect delay
        assert_eq!(feed.backoff.next_delay(), Duration::from_secs(1));
        assert_eq!(feed.stats().graph_versions, 1);

        assert!(rx.has_changed().unwrap());
        assert_eq!(*rx.borrow_and_update(), 1);

        let snapshot = graph.snapshot().await;
        let btc = Currency::new("BTC");
        let usdt = Currency::new("USDT");
        assert_eq!(snapshot.rate(&btc, &usdt), Some(39999.5));
        assert_eq!(snapshot.rate(&usdt, &btc), Some(1.0 / 40000.5));
        assert_eq!(snapshot.edge_count(), 2);
        assert_eq!(feed.stats().quotes_applied, 1);
    }

    #[tokio::test]
    async fn test_handle_text_ignores_noise_without_notifying() {
        let (mut feed, graph, rx) = test_feed(Config::default());

        assert!(!feed.handle_text(r#"{"event":"pong"}"#).await);
        assert!(!feed.handle_text("}{").await);

        assert!(!rx.has_changed().unwrap());
        assert!(graph.snapshot().await.is_empty());
        assert_eq!(feed.stats().messages, 2);
        assert_eq!(feed.stats().ignored_messages, 2);
    }

    #[test]
    fn test_select_symbols_restricts_to_configured() {
        let config = Config {
            symbols: vec!["ETH_BTC".to_string(), "DOGE_USDT".to_string()],
            ..Config::default()
        };
        let (feed, _, _) = test_feed(config);
        let listed: Vec<Instrument> = ["BTC_USDT", "ETH_BTC", "ETH_USDT"]
            .iter()
            .map(|s| s.parse().unwrap())
            .collect();

        let selected = feed.select_symbols(&listed);
        assert_eq!(selected.len(), 1);
        assert_eq!(selected[0].symbol(), "ETH_BTC");
    }

    // ============================================
    // CONNECTION LOOP (local listener, no exchange)
    // ============================================

    const TICKER_SNAPSHOT: &str = r#"{"channel":"ticker","data":[{"symbol":"BTC_USDT"}]}"#;

    fn local_config(addr: SocketAddr) -> Config {
        Config {
            feed_url: format!("ws://{}", addr),
            reconnect_delay_secs: 0,
            reconnect_max_delay_secs: 0,
            receive_timeout_secs: 1,
            ping_interval_secs: 1,
            session_secs: 0,
            opportunity_log: false,
            ..Config::default()
        }
    }

    async fn local_listener() -> (TcpListener, SocketAddr) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        (listener, addr)
    }

    /// Answers symbol discovery, then only ever sends heartbeat replies on `book`
    async fn serve_heartbeats_only(listener: TcpListener) {
        while let Ok((socket, _)) = listener.accept().await {
            tokio::spawn(async move {
                let Ok(mut ws) = tokio_tungstenite::accept_async(socket).await else {
                    return;
                };
                let Some(Ok(Message::Text(request))) = ws.next().await else {
                    return;
                };
                if request.contains("ticker") {
                    let _ = ws.send(Message::Text(TICKER_SNAPSHOT.to_string())).await;
                    while let Some(Ok(_)) = ws.next().await {}
                    return;
                }
                while ws
                    .send(Message::Text(r#"{"event":"pong"}"#.to_string()))
                    .await
                    .is_ok()
                {
                    sleep(Duration::from_millis(100)).await;
                }
            });
        }
    }

    #[tokio::test]
    async fn test_shutdown_unblocks_pending_handshake() {
        let (listener, addr) = local_listener().await;
        // accept TCP but never answer the websocket handshake
        let server = tokio::spawn(async move {
            let (_socket, _) = listener.accept().await.unwrap();
            std::future::pending::<()>().await;
        });

        let config = Config {
            receive_timeout_secs: 3600,
            ..local_config(addr)
        };
        let (feed, _, _rx) = test_feed(config);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let handle = tokio::spawn(feed.run(shutdown_rx));

        sleep(Duration::from_millis(100)).await;
        shutdown_tx.send(true).unwrap();

        let stats = timeout(Duration::from_secs(2), handle)
            .await
            .expect("feed ignored shutdown")
            .unwrap();
        assert_eq!(stats.sessions, 0);
        assert_eq!(stats.connection_failures, 0);
        server.abort();
    }

    #[tokio::test]
    async fn test_dropped_connections_are_retried() {
        let (listener, addr) = local_listener().await;
        let accepted = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&accepted);
        let server = tokio::spawn(async move {
            while let Ok((socket, _)) = listener.accept().await {
                counter.fetch_add(1, Ordering::SeqCst);
                drop(socket);
            }
        });

        let (feed, _, _rx) = test_feed(local_config(addr));
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let handle = tokio::spawn(feed.run(shutdown_rx));

        timeout(Duration::from_secs(5), async {
            while accepted.load(Ordering::SeqCst) < 3 {
                sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("feed stopped reconnecting");

        shutdown_tx.send(true).unwrap();
        let stats = timeout(Duration::from_secs(2), handle)
            .await
            .expect("feed ignored shutdown")
            .unwrap();
        assert!(stats.connection_failures >= 2);
        assert_eq!(stats.sessions, 0);
        server.abort();
    }

    #[tokio::test]
    async fn test_heartbeats_alone_hit_receive_timeout() {
        let (listener, addr) = local_listener().await;
        let server = tokio::spawn(serve_heartbeats_only(listener));

        let (feed, graph, _rx) = test_feed(local_config(addr));
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let handle = tokio::spawn(feed.run(shutdown_rx));

        // receive timeout is 1s; pongs arrive every 100ms
        sleep(Duration::from_millis(2500)).await;
        shutdown_tx.send(true).unwrap();

        let stats = timeout(Duration::from_secs(2), handle)
            .await
            .expect("feed ignored shutdown")
            .unwrap();
        assert!(stats.sessions >= 1);
        assert!(stats.connection_failures >= 1);
        assert!(stats.ignored_messages > 0);
        assert_eq!(stats.quotes_applied, 0);
        assert!(graph.snapshot().await.is_empty());
        server.abort();
    }
}
