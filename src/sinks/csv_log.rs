//! CSV log sink.
//!
//! Append-only tabular record store. The first write to a fresh file
//! writes the header row; subsequent writes append one row per qualifying
//! event. The file is never assumed to pre-exist.
//!
//! Schema: `timestamp, cycle, edge, edge_pct, sim_pnl_usdt`, then one
//! `<SYMBOL>_bid` / `<SYMBOL>_ask` column pair per tracked instrument in
//! configured order.

use anyhow::Result;
use async_trait::async_trait;
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::sinks::AlertSink;
use crate::types::{AlertRecord, TriarbError};

pub struct CsvSink {
    path: PathBuf,
    symbols: Vec<String>,
}

impl CsvSink {
    pub fn new(path: impl Into<PathBuf>, symbols: &[String]) -> Self {
        Self {
            path: path.into(),
            symbols: symbols.to_vec(),
        }
    }

    /// Write the header row if the file does not exist yet.
    fn ensure_header(&self) -> Result<(), TriarbError> {
        if Path::new(&self.path).exists() {
            return Ok(());
        }

        let mut header: Vec<String> = ["timestamp", "cycle", "edge", "edge_pct", "sim_pnl_usdt"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        for symbol in &self.symbols {
            header.push(format!("{symbol}_bid"));
            header.push(format!("{symbol}_ask"));
        }

        let mut writer = csv::Writer::from_path(&self.path)
            .map_err(|e| TriarbError::Sink(format!("create {}: {e}", self.path.display())))?;
        writer
            .write_record(&header)
            .and_then(|_| writer.flush().map_err(Into::into))
            .map_err(|e| TriarbError::Sink(format!("write header: {e}")))?;

        debug!(path = %self.path.display(), "Log file created with header");
        Ok(())
    }
}

#[async_trait]
impl AlertSink for CsvSink {
    async fn append(&self, record: &AlertRecord) -> Result<()> {
        self.ensure_header()?;

        let mut row: Vec<String> = vec![
            record
                .timestamp
                .format("%Y-%m-%d %H:%M:%S%.3f")
                .to_string(),
            record.cycle_id.clone(),
            record.edge.to_string(),
            record.edge_pct.to_string(),
            record.simulated_pnl.to_string(),
        ];
        for symbol in &self.symbols {
            match record.quote_for(symbol) {
                Some(q) => {
                    row.push(q.bid.to_string());
                    row.push(q.ask.to_string());
                }
                None => {
                    row.push(String::new());
                    row.push(String::new());
                }
            }
        }

        let file = OpenOptions::new()
            .append(true)
            .open(&self.path)
            .map_err(|e| TriarbError::Sink(format!("open {}: {e}", self.path.display())))?;
        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(file);
        writer
            .write_record(&row)
            .and_then(|_| writer.flush().map_err(Into::into))
            .map_err(|e| TriarbError::Sink(format!("append row: {e}")))?;

        Ok(())
    }

    fn name(&self) -> &str {
        "csv"
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Quote;
    use chrono::Utc;

    fn temp_path() -> PathBuf {
        let mut p = std::env::temp_dir();
        p.push(format!("triarb_test_log_{}.csv", uuid::Uuid::new_v4()));
        p
    }

    fn symbols() -> Vec<String> {
        vec!["BTCUSDT".to_string(), "ETHUSDT".to_string()]
    }

    fn record(cycle: &str, edge: f64) -> AlertRecord {
        AlertRecord {
            timestamp: Utc::now(),
            cycle_id: cycle.to_string(),
            edge,
            edge_pct: edge * 100.0,
            simulated_pnl: 1000.0 * edge,
            quotes: vec![
                ("BTCUSDT".to_string(), Quote::new(50000.0, 50010.0)),
                ("ETHUSDT".to_string(), Quote::new(3000.0, 3001.0)),
            ],
        }
    }

    #[tokio::test]
    async fn test_header_written_once() {
        let path = temp_path();
        let sink = CsvSink::new(&path, &symbols());

        sink.append(&record("A", 0.0135)).await.unwrap();
        sink.append(&record("B", 0.0021)).await.unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 3); // header + 2 rows
        assert_eq!(
            lines[0],
            "timestamp,cycle,edge,edge_pct,sim_pnl_usdt,BTCUSDT_bid,BTCUSDT_ask,ETHUSDT_bid,ETHUSDT_ask"
        );

        std::fs::remove_file(&path).unwrap();
    }

    #[tokio::test]
    async fn test_row_contents() {
        let path = temp_path();
        let sink = CsvSink::new(&path, &symbols());

        sink.append(&record("A", 0.0135)).await.unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        let row = contents.lines().nth(1).unwrap();
        assert!(row.contains(",A,"));
        assert!(row.contains("0.0135"));
        assert!(row.contains("13.5")); // simulated P&L on 1000
        assert!(row.contains("50000"));
        assert!(row.contains("3001"));

        std::fs::remove_file(&path).unwrap();
    }

    #[tokio::test]
    async fn test_appends_to_existing_file_without_new_header() {
        let path = temp_path();

        {
            let sink = CsvSink::new(&path, &symbols());
            sink.append(&record("A", 0.01)).await.unwrap();
        }
        // A fresh sink instance against the same file must not re-header.
        {
            let sink = CsvSink::new(&path, &symbols());
            sink.append(&record("B", 0.02)).await.unwrap();
        }

        let contents = std::fs::read_to_string(&path).unwrap();
        assert_eq!(contents.lines().count(), 3);
        assert_eq!(contents.matches("timestamp").count(), 1);

        std::fs::remove_file(&path).unwrap();
    }
}
