//! arbscan - live currency-cycle arbitrage detector
//!
//! Run with: cargo run -- [--config arbscan.toml] [--min-profit-ratio 1.01]
//!
//! Streams Poloniex order books into a rate graph and reports every
//! Bellman-Ford cycle whose round trip beats the profit ratio.

use clap::Parser;
use color_eyre::eyre::Result;
use console::style;
use std::path::PathBuf;
use std::time::Instant;
use tokio::sync::watch;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use arbscan::cartographer::{FeedStats, GraphHandle, PoloniexFeed};
use arbscan::config::Config;
use arbscan::scanner::{ScanStats, Scanner};

#[derive(Debug, Parser)]
#[command(name = "arbscan", version, about = "Streaming currency-cycle arbitrage detector")]
struct Args {
    /// TOML configuration file (environment / .env is used otherwise)
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Override the minimum profit ratio (e.g. 1.01 for 1%)
    #[arg(long)]
    min_profit_ratio: Option<f64>,

    /// Override the per-leg fee rate (e.g. 0.002 for 0.2%)
    #[arg(long)]
    fee_rate: Option<f64>,

    /// No spinner and no configuration summary
    #[arg(short, long)]
    quiet: bool,
}

fn print_banner() {
    println!();
    println!(
        "{}",
        style("═══════════════════════════════════════════════════════════════").cyan()
    );
    println!(
        "{}",
        style(" 🔁 ARBSCAN - Currency Cycle Arbitrage Detector").cyan().bold()
    );
    println!(
        "{}",
        style("    Poloniex order books | -ln(rate) graph | Bellman-Ford").cyan()
    );
    println!(
        "{}",
        style("═══════════════════════════════════════════════════════════════").cyan()
    );
    println!();
}

fn load_config(args: &Args) -> Result<Config> {
    let mut config = match &args.config {
        Some(path) => {
            info!("Loading configuration from {}", path.display());
            Config::from_file(path)?
        }
        None => Config::from_env()?,
    };

    if let Some(ratio) = args.min_profit_ratio {
        config.min_profit_ratio = ratio;
    }
    if let Some(fee) = args.fee_rate {
        config.fee_rate = fee;
    }

    config.validate()?;
    Ok(config)
}

fn print_summary(feed: &FeedStats, scan: &ScanStats, runtime_secs: u64) {
    println!();
    println!(
        "{}",
        style("═══════════════════════════════════════════════════════════════").green()
    );
    println!("{}", style(" ✅ SCANNER STOPPED").green().bold());
    println!(
        "{}",
        style("═══════════════════════════════════════════════════════════════").green()
    );
    println!("   Runtime:            {}s", runtime_secs);
    println!("   Feed sessions:      {} ({} reconnects)", feed.sessions, feed.connection_failures);
    println!("   Messages:           {}", feed.messages);
    println!("   Quotes applied:     {} ({} rejected)", feed.quotes_applied, feed.quotes_rejected);
    println!("   Graph versions:     {}", feed.graph_versions);
    println!("   Detection passes:   {}", scan.passes);
    if let Some(last) = scan.last_pass {
        println!("   Last pass took:     {:.2?}", last);
    }
    println!("   Cycles found:       {}", scan.cycles_found);
    println!("   Opportunities:      {}", scan.opportunities);
    if let Some(best) = scan.best_ratio {
        println!("   Best cycle ratio:   {:.6}x", best);
    }
    println!();
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("arbscan=info".parse()?),
        )
        .init();

    let args = Args::parse();
    print_banner();

    let config = load_config(&args)?;
    if !args.quiet {
        config.print_summary();
    }

    let graph = GraphHandle::default();
    let (updates_tx, updates_rx) = watch::channel(0u64);
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let feed = PoloniexFeed::new(config.clone(), graph.clone(), updates_tx);
    let mut scanner = Scanner::from_config(graph, &config);
    if !args.quiet {
        scanner = scanner.with_spinner();
    }

    let started = Instant::now();
    let feed_task = tokio::spawn(feed.run(shutdown_rx.clone()));
    let scan_task = tokio::spawn(scanner.run(updates_rx, shutdown_rx));

    tokio::signal::ctrl_c().await?;
    info!("Ctrl-C received, shutting down");
    if shutdown_tx.send(true).is_err() {
        warn!("All tasks already stopped");
    }

    let feed_stats = feed_task.await?;
    let scan_stats = scan_task.await?;

    print_summary(&feed_stats, &scan_stats, started.elapsed().as_secs());
    Ok(())
}
