//! Configuration for arbscan
//!
//! Every value can come from the environment (or a `.env` file) or from a
//! TOML file. Missing values fall back to the defaults below: 0.2% fee per
//! leg, 5% minimum round trip, fixed 2s reconnect delay, 60s subscription
//! sessions.

use eyre::Result;
use serde::{Deserialize, Deserializer, Serialize};
use std::env;
use std::fs;
use std::path::Path;
use std::time::Duration;

use crate::brain::DEFAULT_MIN_PROFIT_RATIO;
use crate::cartographer::Backoff;

/// Poloniex v3 public websocket
pub const DEFAULT_FEED_URL: &str = "wss://ws.poloniex.com/ws/public";

// ============================================
// MAIN CONFIGURATION
// ============================================

/// Main configuration struct for arbscan
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    // ========== Feed Settings ==========
    /// Websocket endpoint of the market data feed
    pub feed_url: String,

    /// Restrict the order book subscription to these `BASE_QUOTE` symbols.
    /// Empty = every symbol the exchange lists.
    #[serde(deserialize_with = "deserialize_symbols")]
    pub symbols: Vec<String>,

    // ========== Profit Settings ==========
    /// Per-leg transaction fee (0.002 = 0.2%), folded into every stored rate
    pub fee_rate: f64,

    /// Minimum product of rates around a cycle to report it (exclusive)
    #[serde(alias = "minProfitRatio")]
    pub min_profit_ratio: f64,

    // ========== Connection Settings ==========
    /// Delay before the first reconnect attempt
    pub reconnect_delay_secs: u64,

    /// Upper bound for the reconnect delay. Equal to `reconnect_delay_secs`
    /// means a fixed delay; larger means doubling up to this cap.
    pub reconnect_max_delay_secs: u64,

    /// Treat the connection as dead if no book data arrives for this long
    pub receive_timeout_secs: u64,

    /// Application-level ping cadence
    pub ping_interval_secs: u64,

    /// Length of one subscription session before symbols are re-discovered
    /// and the graph is cleaned. 0 = never end a session on a timer.
    pub session_secs: u64,

    // ========== Journal Settings ==========
    /// Append opportunities to a text log
    pub opportunity_log: bool,

    /// Path of the opportunity log
    pub opportunity_log_path: String,
}

impl Config {
    /// Load configuration from environment variables and .env file
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        let defaults = Self::default();

        Ok(Self {
            // Feed
            feed_url: env::var("FEED_URL").unwrap_or(defaults.feed_url),
            symbols: env::var("SYMBOLS")
                .map(|s| normalize_symbols(s.split(',')))
                .unwrap_or_default(),

            // Profit
            fee_rate: env::var("FEE_RATE")
                .unwrap_or_else(|_| "0.002".to_string())
                .parse()
                .unwrap_or(defaults.fee_rate),
            min_profit_ratio: env::var("MIN_PROFIT_RATIO")
                .unwrap_or_else(|_| DEFAULT_MIN_PROFIT_RATIO.to_string())
                .parse()
                .unwrap_or(defaults.min_profit_ratio),

            // Connection
            reconnect_delay_secs: env::var("RECONNECT_DELAY_SECS")
                .unwrap_or_else(|_| "2".to_string())
                .parse()
                .unwrap_or(defaults.reconnect_delay_secs),
            reconnect_max_delay_secs: env::var("RECONNECT_MAX_DELAY_SECS")
                .unwrap_or_else(|_| "2".to_string())
                .parse()
                .unwrap_or(defaults.reconnect_max_delay_secs),
            receive_timeout_secs: env::var("RECEIVE_TIMEOUT_SECS")
                .unwrap_or_else(|_| "30".to_string())
                .parse()
                .unwrap_or(defaults.receive_timeout_secs),
            ping_interval_secs: env::var("PING_INTERVAL_SECS")
                .unwrap_or_else(|_| "20".to_string())
                .parse()
                .unwrap_or(defaults.ping_interval_secs),
            session_secs: env::var("SESSION_SECS")
                .unwrap_or_else(|_| "60".to_string())
                .parse()
                .unwrap_or(defaults.session_secs),

            // Journal
            opportunity_log: env::var("OPPORTUNITY_LOG")
                .unwrap_or_else(|_| "true".to_string())
                .parse()
                .unwrap_or(defaults.opportunity_log),
            opportunity_log_path: env::var("OPPORTUNITY_LOG_PATH")
                .unwrap_or(defaults.opportunity_log_path),
        })
    }

    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to a TOML file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }

    /// Validate configuration before starting the feed
    pub fn validate(&self) -> Result<()> {
        if !(self.feed_url.starts_with("ws://") || self.feed_url.starts_with("wss://")) {
            return Err(eyre::eyre!(
                "Invalid FEED_URL {:?} - expected a ws:// or wss:// endpoint",
                self.feed_url
            ));
        }

        if !self.fee_rate.is_finite() || self.fee_rate < 0.0 || self.fee_rate >= 1.0 {
            return Err(eyre::eyre!(
                "FEE_RATE must be in [0, 1) (currently {})",
                self.fee_rate
            ));
        }

        if !self.min_profit_ratio.is_finite() || self.min_profit_ratio <= 0.0 {
            return Err(eyre::eyre!(
                "MIN_PROFIT_RATIO must be a positive number (currently {})",
                self.min_profit_ratio
            ));
        }

        if self.reconnect_max_delay_secs < self.reconnect_delay_secs {
            return Err(eyre::eyre!(
                "RECONNECT_MAX_DELAY_SECS ({}) is below RECONNECT_DELAY_SECS ({})",
                self.reconnect_max_delay_secs,
                self.reconnect_delay_secs
            ));
        }

        if self.receive_timeout_secs == 0 {
            return Err(eyre::eyre!("RECEIVE_TIMEOUT_SECS must be at least 1"));
        }

        if self.ping_interval_secs == 0 {
            return Err(eyre::eyre!("PING_INTERVAL_SECS must be at least 1"));
        }

        if self.opportunity_log && self.opportunity_log_path.trim().is_empty() {
            return Err(eyre::eyre!("OPPORTUNITY_LOG is on but OPPORTUNITY_LOG_PATH is empty"));
        }

        Ok(())
    }

    /// Reconnect policy derived from the delay settings
    pub fn backoff(&self) -> Backoff {
        Backoff::new(
            Duration::from_secs(self.reconnect_delay_secs),
            Duration::from_secs(self.reconnect_max_delay_secs),
        )
    }

    pub fn receive_timeout(&self) -> Duration {
        Duration::from_secs(self.receive_timeout_secs)
    }

    pub fn ping_interval(&self) -> Duration {
        Duration::from_secs(self.ping_interval_secs)
    }

    /// `None` when sessions are not time-boxed
    pub fn session_budget(&self) -> Option<Duration> {
        (self.session_secs > 0).then(|| Duration::from_secs(self.session_secs))
    }

    /// Print configuration summary
    pub fn print_summary(&self) {
        let symbols = if self.symbols.is_empty() {
            "all listed".to_string()
        } else {
            format!("{} selected", self.symbols.len())
        };
        let backoff = if self.reconnect_max_delay_secs > self.reconnect_delay_secs {
            format!("{}s → {}s", self.reconnect_delay_secs, self.reconnect_max_delay_secs)
        } else {
            format!("fixed {}s", self.reconnect_delay_secs)
        };
        let session = if self.session_secs == 0 {
            "unbounded".to_string()
        } else {
            format!("{}s", self.session_secs)
        };

        println!("╔════════════════════════════════════════════════════════════╗");
        println!("║                 ARBSCAN - CONFIGURATION                    ║");
        println!("╠════════════════════════════════════════════════════════════╣");
        println!("║ FEED                                                       ║");
        println!("║ • Endpoint:        {:<40} ║", truncate(&self.feed_url, 40));
        println!("║ • Symbols:         {:<40} ║", symbols);
        println!("╠════════════════════════════════════════════════════════════╣");
        println!("║ PROFIT                                                     ║");
        println!("║ • Fee per leg:     {:<39.3}% ║", self.fee_rate * 100.0);
        println!("║ • Min ratio:       {:<40.4} ║", self.min_profit_ratio);
        println!("╠════════════════════════════════════════════════════════════╣");
        println!("║ CONNECTION                                                 ║");
        println!("║ • Reconnect:       {:<40} ║", backoff);
        println!("║ • Recv timeout:    {:<39}s ║", self.receive_timeout_secs);
        println!("║ • Session:         {:<40} ║", session);
        println!("╠════════════════════════════════════════════════════════════╣");
        println!("║ JOURNAL                                                    ║");
        println!("║ • Opportunity Log: {:<40} ║",
            if self.opportunity_log { truncate(&self.opportunity_log_path, 40) } else { "✗ Disabled".to_string() }
        );
        println!("╚════════════════════════════════════════════════════════════╝");
    }
}

/// Trim and upper-case symbols so they compare equal to `Instrument::symbol`
fn normalize_symbols<I, S>(symbols: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    symbols
        .into_iter()
        .map(|sym| sym.as_ref().trim().to_uppercase())
        .filter(|sym| !sym.is_empty())
        .collect()
}

fn deserialize_symbols<'de, D>(deserializer: D) -> std::result::Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Vec::<String>::deserialize(deserializer)?;
    Ok(normalize_symbols(raw))
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let head: String = s.chars().take(max - 3).collect();
        format!("{}...", head)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            feed_url: DEFAULT_FEED_URL.to_string(),
            symbols: vec![],
            fee_rate: 0.002,
            min_profit_ratio: DEFAULT_MIN_PROFIT_RATIO,
            reconnect_delay_secs: 2,
            reconnect_max_delay_secs: 2,
            receive_timeout_secs: 30,
            ping_interval_secs: 20,
            session_secs: 60,
            opportunity_log: true,
            opportunity_log_path: "./logs/arbitrage.txt".to_string(),
        }
    }
}

// ============================================
// TESTS
// ============================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.min_profit_ratio, 1.05);
        assert_eq!(config.fee_rate, 0.002);
        assert_eq!(config.reconnect_delay_secs, 2);
        assert_eq!(config.session_budget(), Some(Duration::from_secs(60)));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_toml_accepts_camel_case_threshold() {
        let config: Config = toml::from_str(
            r#"
            minProfitRatio = 1.01
            fee_rate = 0.001
            symbols = ["BTC_USDT", "ETH_USDT"]
            "#,
        )
        .unwrap();

        assert_eq!(config.min_profit_ratio, 1.01);
        assert_eq!(config.fee_rate, 0.001);
        assert_eq!(config.symbols.len(), 2);
        // untouched fields keep their defaults
        assert_eq!(config.feed_url, DEFAULT_FEED_URL);
        assert_eq!(config.session_secs, 60);
    }

    #[test]
    fn test_file_symbols_are_normalized() {
        let config: Config = toml::from_str(r#"symbols = ["btc_usdt", " eth_btc ", ""]"#).unwrap();
        assert_eq!(config.symbols, vec!["BTC_USDT", "ETH_BTC"]);

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("lower.toml");
        std::fs::write(&path, "symbols = [\"doge_usdt\"]\n").unwrap();
        assert_eq!(Config::from_file(&path).unwrap().symbols, vec!["DOGE_USDT"]);
    }

    #[test]
    fn test_normalize_symbols() {
        assert_eq!(
            normalize_symbols("btc_usdt, ,Eth_Btc".split(',')),
            vec!["BTC_USDT", "ETH_BTC"]
        );
    }

    #[test]
    fn test_file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("arbscan.toml");

        let mut config = Config::default();
        config.min_profit_ratio = 1.02;
        config.session_secs = 0;
        config.save_to_file(&path).unwrap();

        let loaded = Config::from_file(&path).unwrap();
        assert_eq!(loaded, config);
        assert_eq!(loaded.session_budget(), None);
    }

    #[test]
    fn test_validation_failures() {
        let bad_url = Config {
            feed_url: "https://ws.poloniex.com".to_string(),
            ..Config::default()
        };
        assert!(bad_url.validate().is_err());

        let bad_fee = Config {
            fee_rate: 1.5,
            ..Config::default()
        };
        assert!(bad_fee.validate().is_err());

        let bad_ratio = Config {
            min_profit_ratio: 0.0,
            ..Config::default()
        };
        assert!(bad_ratio.validate().is_err());

        let bad_backoff = Config {
            reconnect_delay_secs: 10,
            reconnect_max_delay_secs: 5,
            ..Config::default()
        };
        assert!(bad_backoff.validate().is_err());
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("wss://very-long-endpoint", 10), "wss://v...");
    }
}
