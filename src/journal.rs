//! Opportunity journal
//!
//! Append-only text log, one block per opportunity:
//!
//! ```text
//! Cycle Time 2026-10-16 12:00:00 UTC
//! Positive cycle: USDT → BTC → ETH → USDT
//! Profit ratio: 1.062100 (+6.2100%)
//!
//! ```

use eyre::Result;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::brain::Opportunity;

#[derive(Debug, Clone)]
pub struct OpportunityJournal {
    path: PathBuf,
}

impl OpportunityJournal {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one record, creating parent directories if needed
    pub fn append(&self, opportunity: &Opportunity) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }

        let mut file = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;

        file.write_all(format_record(opportunity).as_bytes())?;
        Ok(())
    }
}

pub fn format_record(opportunity: &Opportunity) -> String {
    format!(
        "Cycle Time {}\nPositive cycle: {}\nProfit ratio: {:.6} ({:+.4}%)\n\n",
        opportunity.timestamp.format("%Y-%m-%d %H:%M:%S UTC"),
        opportunity.cycle,
        opportunity.profit_ratio,
        opportunity.profit_percentage()
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::brain::Cycle;
    use crate::cartographer::Currency;
    use chrono::{TimeZone, Utc};

    fn opportunity(ratio: f64) -> Opportunity {
        let path = ["USDT", "BTC", "ETH", "USDT"].map(Currency::new).to_vec();
        Opportunity {
            cycle: Cycle::new(path, 0.0).unwrap(),
            profit_ratio: ratio,
            timestamp: Utc.with_ymd_and_hms(2026, 10, 16, 12, 0, 0).unwrap(),
            legs: vec![],
        }
    }

    #[test]
    fn test_record_format() {
        assert_eq!(
            format_record(&opportunity(1.0621)),
            "Cycle Time 2026-10-16 12:00:00 UTC\n\
             Positive cycle: USDT → BTC → ETH → USDT\n\
             Profit ratio: 1.062100 (+6.2100%)\n\n"
        );
    }

    #[test]
    fn test_append_creates_dirs_and_appends() {
        let dir = tempfile::tempdir().unwrap();
        let journal = OpportunityJournal::new(dir.path().join("logs").join("arbitrage.txt"));

        journal.append(&opportunity(1.0621)).unwrap();
        journal.append(&opportunity(1.10)).unwrap();

        let content = fs::read_to_string(journal.path()).unwrap();
        assert_eq!(content.matches("Cycle Time").count(), 2);
        assert!(content.contains("Profit ratio: 1.100000 (+10.0000%)"));
        assert!(content.ends_with("\n\n"));
    }

    #[test]
    fn test_append_fails_when_path_is_a_directory() {
        let dir = tempfile::tempdir().unwrap();
        let journal = OpportunityJournal::new(dir.path());
        assert!(journal.append(&opportunity(1.2)).is_err());
    }
}
