//! The evaluation activity.
//!
//! Wakes on a free-running interval and runs one evaluate → detect →
//! dispatch pass per tick. The interval is not driven by feed arrivals:
//! re-evaluating unchanged quotes is the poll granularity for crossing
//! detection and cooldown expiry. Sink/notifier I/O happens inline here,
//! so a slow send delays the next pass but never blocks feed updates.

use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{error, info};

use crate::book::QuoteBook;
use crate::catalog::CycleCatalog;
use crate::engine::crossing::CrossingDetector;
use crate::engine::dispatch::AlertDispatcher;
use crate::engine::evaluator::EdgeEvaluator;
use crate::types::CycleEvaluation;

/// Owns the whole evaluation-side pipeline. The feed task only shares the
/// `QuoteBook`; crossing and cooldown state live here, unsynchronized.
pub struct Monitor {
    book: Arc<QuoteBook>,
    catalog: CycleCatalog,
    evaluator: EdgeEvaluator,
    detector: CrossingDetector,
    dispatcher: AlertDispatcher,
    symbols: Vec<String>,
    poll_interval: Duration,
}

impl Monitor {
    pub fn new(
        book: Arc<QuoteBook>,
        catalog: CycleCatalog,
        evaluator: EdgeEvaluator,
        detector: CrossingDetector,
        dispatcher: AlertDispatcher,
        symbols: Vec<String>,
        poll_interval: Duration,
    ) -> Self {
        Self {
            book,
            catalog,
            evaluator,
            detector,
            dispatcher,
            symbols,
            poll_interval,
        }
    }

    /// Run until the shutdown signal flips.
    pub async fn run(&mut self, mut shutdown: watch::Receiver<bool>) {
        let mut interval = tokio::time::interval(self.poll_interval);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        info!(
            cycles = self.catalog.len(),
            instruments = self.symbols.len(),
            interval_ms = self.poll_interval.as_millis() as u64,
            "Evaluation loop started"
        );

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    self.tick(Utc::now()).await;
                }
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        info!("Evaluation loop stopping");
                        break;
                    }
                }
            }
        }
    }

    /// One evaluate → detect → dispatch pass. Public so tests can drive
    /// the pipeline tick by tick with a controlled clock.
    pub async fn tick(&mut self, now: DateTime<Utc>) {
        // Quotes still warming up: simply not ready, not an error.
        let Some(snapshot) = self.book.snapshot(&self.symbols) else {
            return;
        };

        let evaluations = self.evaluator.evaluate_all(&snapshot, &self.catalog, now);
        if evaluations.is_empty() {
            return;
        }

        self.log_status(&evaluations, now);

        let events = self.detector.observe(&evaluations);
        if events.is_empty() {
            return;
        }

        match self.dispatcher.dispatch(&events, &snapshot, now).await {
            Ok(outcome) => {
                info!(
                    events = outcome.appended,
                    notified = outcome.notified.as_deref().unwrap_or("-"),
                    "Crossing events dispatched"
                );
            }
            Err(e) => {
                // A sink failure loses this tick's rows but must never
                // take the evaluation loop down.
                error!(error = %e, "Alert dispatch failed");
            }
        }
    }

    /// Compact all-cycles status line, printed only while at least one
    /// cycle is above threshold.
    fn log_status(&self, evaluations: &[CycleEvaluation], now: DateTime<Utc>) {
        let threshold = self.detector.threshold();
        if !evaluations.iter().any(|e| e.net_edge > threshold) {
            return;
        }

        let status = evaluations
            .iter()
            .map(|e| format!("{}:{:>+8.4}%", e.cycle_id, e.edge_pct()))
            .collect::<Vec<_>>()
            .join(" | ");

        info!("[{}] {}", now.format("%H:%M:%S%.3f"), status);
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{QuoteSide, RateOp};
    use crate::config::{CycleConfig, LegConfig};
    use crate::types::Instrument;
    use crate::engine::crossing::AlertPolicy;
    use crate::engine::dispatch::CooldownScope;
    use crate::sinks::AlertSink;
    use crate::types::AlertRecord;
    use async_trait::async_trait;
    use std::sync::Mutex;

    struct RecordingSink {
        records: Arc<Mutex<Vec<AlertRecord>>>,
    }

    #[async_trait]
    impl AlertSink for RecordingSink {
        async fn append(&self, record: &AlertRecord) -> anyhow::Result<()> {
            self.records.lock().unwrap().push(record.clone());
            Ok(())
        }

        fn name(&self) -> &str {
            "recording"
        }
    }

    fn triangle_monitor() -> (Monitor, Arc<QuoteBook>, Arc<Mutex<Vec<AlertRecord>>>) {
        let instruments: Vec<Instrument> = [
            ("BTCUSDT", "BTC", "USDT"),
            ("ETHUSDT", "ETH", "USDT"),
            ("ETHBTC", "ETH", "BTC"),
        ]
        .iter()
        .map(|(s, b, q)| Instrument {
            symbol: s.to_string(),
            base: b.to_string(),
            quote: q.to_string(),
        })
        .collect();

        let cycles = vec![CycleConfig {
            id: "A".into(),
            description: String::new(),
            legs: vec![
                LegConfig {
                    symbol: "BTCUSDT".into(),
                    side: QuoteSide::Ask,
                    op: RateOp::Divide,
                },
                LegConfig {
                    symbol: "ETHBTC".into(),
                    side: QuoteSide::Ask,
                    op: RateOp::Divide,
                },
                LegConfig {
                    symbol: "ETHUSDT".into(),
                    side: QuoteSide::Bid,
                    op: RateOp::Multiply,
                },
            ],
        }];

        let catalog = CycleCatalog::new(&cycles, &instruments).unwrap();
        let symbols: Vec<String> = instruments.iter().map(|i| i.symbol.clone()).collect();
        let book = Arc::new(QuoteBook::new());

        let records = Arc::new(Mutex::new(Vec::new()));
        let sink = RecordingSink {
            records: records.clone(),
        };
        let dispatcher = AlertDispatcher::new(
            Box::new(sink),
            None,
            CooldownScope::Global,
            chrono::Duration::seconds(1),
            1000.0,
            0.001,
            0.0,
        );

        let monitor = Monitor::new(
            book.clone(),
            catalog,
            EdgeEvaluator::new(0.001),
            CrossingDetector::new(0.0, AlertPolicy::EdgeTriggered),
            dispatcher,
            symbols,
            Duration::from_millis(1),
        );

        (monitor, book, records)
    }

    #[tokio::test]
    async fn test_tick_before_readiness_is_a_noop() {
        let (mut monitor, book, records) = triangle_monitor();
        book.update("BTCUSDT", 50000.0, 50010.0);

        monitor.tick(Utc::now()).await;
        assert!(records.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_crossing_produces_one_record() {
        let (mut monitor, book, records) = triangle_monitor();
        book.update("BTCUSDT", 50000.0, 50010.0);
        book.update("ETHUSDT", 3000.0, 3001.0);
        book.update("ETHBTC", 0.0589, 0.0590); // mispriced ask, ~+1.36% edge

        let now = Utc::now();
        monitor.tick(now).await;
        // Edge-triggered: a second tick on unchanged data adds nothing.
        monitor.tick(now + chrono::Duration::milliseconds(1)).await;

        let records = records.lock().unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].cycle_id, "A");
        assert!(records[0].edge > 0.013);
        assert_eq!(records[0].quotes.len(), 3);
    }

    #[tokio::test]
    async fn test_balanced_market_produces_nothing() {
        let (mut monitor, book, records) = triangle_monitor();
        book.update("BTCUSDT", 50000.0, 50010.0);
        book.update("ETHUSDT", 3000.0, 3001.0);
        book.update("ETHBTC", 0.0600, 0.0601);

        monitor.tick(Utc::now()).await;
        assert!(records.lock().unwrap().is_empty());
    }
}
