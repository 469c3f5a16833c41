//! Offline detection demo
//!
//! Run with: cargo run --bin demo-graph [-- rates.toml]
//!
//! Without a file the built-in GBP/USD/AUD/NZD table is used. A rate file
//! lists outgoing rates per origin:
//!
//! ```toml
//! [rates.GBP]
//! USD = 1.27
//! AUD = 1.82
//! ```

use clap::Parser;
use color_eyre::eyre::{Result, WrapErr};
use console::style;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;

use arbscan::brain::{CycleDetector, ProfitFilter, DEFAULT_MIN_PROFIT_RATIO};
use arbscan::cartographer::{Currency, RateGraph};

#[derive(Debug, Parser)]
#[command(name = "demo-graph", about = "Run cycle detection over a fixed rate table")]
struct Args {
    /// TOML rate table (`[rates.ORIGIN] DEST = rate`)
    rates: Option<PathBuf>,

    #[arg(long, default_value_t = DEFAULT_MIN_PROFIT_RATIO)]
    min_profit_ratio: f64,
}

#[derive(Debug, Deserialize)]
struct RateTable {
    rates: BTreeMap<String, BTreeMap<String, f64>>,
}

fn sample_rates() -> Vec<(&'static str, &'static str, f64)> {
    vec![
        ("GBP", "USD", 1.27),
        ("GBP", "AUD", 1.82),
        ("USD", "AUD", 1.43),
        ("USD", "NZD", 1.51),
        ("USD", "GBP", 0.79),
        ("AUD", "GBP", 0.55),
        ("AUD", "USD", 0.7),
        ("AUD", "NZD", 1.05),
        ("NZD", "AUD", 0.95),
        ("NZD", "USD", 0.66),
    ]
}

fn build_graph(table: RateTable) -> Result<RateGraph> {
    let mut graph = RateGraph::new();
    for (origin, destinations) in table.rates {
        for (destination, rate) in destinations {
            graph
                .upsert(Currency::from(origin.as_str()), Currency::from(destination.as_str()), rate)
                .wrap_err("Invalid entry in rate table")?;
        }
    }
    Ok(graph)
}

fn load_graph(args: &Args) -> Result<RateGraph> {
    match &args.rates {
        Some(path) => {
            let content = fs::read_to_string(path)
                .wrap_err_with(|| format!("Could not read {}", path.display()))?;
            let table: RateTable = toml::from_str(&content)?;
            build_graph(table)
        }
        None => Ok(RateGraph::from_rates(sample_rates())),
    }
}

fn main() -> Result<()> {
    color_eyre::install()?;
    let args = Args::parse();

    let graph = load_graph(&args)?;
    println!(
        "{} {} currencies, {} rates",
        style("✓").green(),
        graph.node_count(),
        graph.edge_count()
    );

    let Some(cycle) = CycleDetector::new().detect(&graph) else {
        println!("{}", style("No negative cycle found.").yellow());
        return Ok(());
    };

    let evaluation = ProfitFilter::new(args.min_profit_ratio).evaluate(&cycle, &graph)?;

    println!("{} Negative cycle: {}", style("✓").green(), style(&cycle).cyan());
    println!("Starting with 1 {}:", cycle.path()[0]);
    for leg in &evaluation.legs {
        println!(
            "  {} → {}: {:.6} || Total → {:.6}",
            leg.from, leg.to, leg.rate, leg.running_product
        );
    }

    let verdict = if evaluation.is_opportunity {
        style("💰 above threshold").green().bold()
    } else {
        style("○ below threshold").yellow()
    };
    println!(
        "Profit: {:.6}x ({:+.4}%) {}",
        evaluation.profit_ratio,
        evaluation.profit_percentage(),
        verdict
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sample_has_cycle() {
        let graph = RateGraph::from_rates(sample_rates());
        assert_eq!(graph.node_count(), 4);

        let cycle = CycleDetector::new().detect(&graph).unwrap();
        let eval = ProfitFilter::new(1.0).evaluate(&cycle, &graph).unwrap();
        assert!(eval.profit_ratio > 1.0);
    }

    #[test]
    fn test_rate_table_from_toml() {
        let table: RateTable = toml::from_str(
            r#"
            [rates.usd]
            EUR = 0.9
            [rates.EUR]
            USD = 1.2
            "#,
        )
        .unwrap();
        let graph = build_graph(table).unwrap();
        assert_eq!(graph.rate(&Currency::new("USD"), &Currency::new("EUR")), Some(0.9));

        let bad: RateTable = toml::from_str("[rates.A]\nB = -1.0").unwrap();
        assert!(build_graph(bad).is_err());
    }
}
