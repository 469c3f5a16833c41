//! Diagnostic tool - Check configuration before going live
//!
//! Run with: cargo run --bin diagnose

use std::env;

use arbscan::config::Config;

fn main() {
    println!("🔍 ARBSCAN DIAGNOSTIC CHECK\n");

    // Load .env
    dotenvy::dotenv().ok();

    println!("═══════════════════════════════════════════════════");
    println!("                  CONFIGURATION                     ");
    println!("═══════════════════════════════════════════════════\n");

    let checks = [
        ("FEED_URL", "wss://ws.poloniex.com/ws/public", "Market data websocket"),
        ("SYMBOLS", "", "Restrict subscription (empty = all)"),
        ("FEE_RATE", "0.002", "Fee applied to every conversion"),
        ("MIN_PROFIT_RATIO", "1.05", "Report cycles above this ratio"),
        ("RECONNECT_DELAY_SECS", "2", "First reconnect delay"),
        ("RECONNECT_MAX_DELAY_SECS", "2", "Reconnect delay cap"),
        ("RECEIVE_TIMEOUT_SECS", "30", "Silence before reconnecting"),
        ("PING_INTERVAL_SECS", "20", "Heartbeat cadence"),
        ("SESSION_SECS", "60", "Re-discover symbols every N seconds"),
        ("OPPORTUNITY_LOG", "true", "Journal opportunities?"),
        ("OPPORTUNITY_LOG_PATH", "./logs/arbitrage.txt", "Journal location"),
    ];

    for (key, default, desc) in checks {
        let value = env::var(key).unwrap_or_else(|_| default.to_string());
        let is_default = env::var(key).is_err();
        let marker = if is_default { "(default)" } else { "(from .env)" };
        let shown = if value.is_empty() { "<empty>" } else { value.as_str() };
        println!("  {}: {} {}", key, shown, marker);
        println!("    └─ {}\n", desc);
    }

    println!("═══════════════════════════════════════════════════");
    println!("                    VALIDATION                      ");
    println!("═══════════════════════════════════════════════════\n");

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            println!("  ❌ Could not load configuration: {}", e);
            return;
        }
    };

    match config.validate() {
        Ok(()) => println!("  ✅ Configuration is valid"),
        Err(e) => println!("  ❌ {}", e),
    }

    println!("\n═══════════════════════════════════════════════════");
    println!("                  WHAT TO EXPECT                    ");
    println!("═══════════════════════════════════════════════════\n");

    // Three fee-paying legs is the shortest realistic cycle
    let fee_drag = (1.0 - config.fee_rate).powi(3);
    let gross_needed = config.min_profit_ratio / fee_drag;

    println!("  With MIN_PROFIT_RATIO = {:.4} and FEE_RATE = {:.3}%:", config.min_profit_ratio, config.fee_rate * 100.0);
    println!("  • A triangle must gain {:.3}% before fees", (gross_needed - 1.0) * 100.0);
    println!("  • Fee drag over 3 legs: {:.3}%", (1.0 - fee_drag) * 100.0);

    if config.min_profit_ratio <= 1.0 {
        println!("\n  ⚠️  Ratio at or below 1.0! Every negative cycle will be reported,");
        println!("     including ones that lose money.");
    } else if config.min_profit_ratio < 1.005 {
        println!("\n  ⚠️  Low threshold! Expect noise from stale or thin books.");
    }

    if config.reconnect_max_delay_secs > config.reconnect_delay_secs {
        println!(
            "\n  ↻ Reconnect backoff doubles from {}s up to {}s",
            config.reconnect_delay_secs, config.reconnect_max_delay_secs
        );
    }

    println!("\n✅ Diagnostic complete!\n");
}
