//! Alert dispatch.
//!
//! Fans qualifying events out to the durable log sink and, behind a
//! cooldown gate, to the notification transport. The log path is never
//! rate-limited: every qualifying event becomes a row. At most one
//! notification goes out per evaluation pass: the cycle with the largest
//! net edge, ties broken by catalog declaration order.

use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;
use std::collections::HashMap;
use tracing::{info, warn};

use crate::book::BookSnapshot;
use crate::sinks::{AlertSink, Notifier};
use crate::types::{AlertRecord, CycleEvaluation};

// ---------------------------------------------------------------------------
// Cooldown
// ---------------------------------------------------------------------------

/// Scope of the notification cooldown window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CooldownScope {
    /// One window shared across all cycles.
    Global,
    /// An independent window per cycle.
    PerCycle,
}

/// Tracks when the next notification is allowed for each scope key.
/// Initially every scope is immediately eligible.
struct CooldownGate {
    scope: CooldownScope,
    cooldown: Duration,
    next_allowed: HashMap<String, DateTime<Utc>>,
}

impl CooldownGate {
    fn new(scope: CooldownScope, cooldown: Duration) -> Self {
        Self {
            scope,
            cooldown,
            next_allowed: HashMap::new(),
        }
    }

    fn key(&self, cycle_id: &str) -> String {
        match self.scope {
            CooldownScope::Global => String::new(),
            CooldownScope::PerCycle => cycle_id.to_string(),
        }
    }

    fn is_open(&self, cycle_id: &str, now: DateTime<Utc>) -> bool {
        match self.next_allowed.get(&self.key(cycle_id)) {
            Some(next) => now >= *next,
            None => true,
        }
    }

    /// Start the window for this scope. Called on every send attempt,
    /// successful or not, so a failing transport cannot retry-storm.
    fn arm(&mut self, cycle_id: &str, now: DateTime<Utc>) {
        self.next_allowed
            .insert(self.key(cycle_id), now + self.cooldown);
    }
}

// ---------------------------------------------------------------------------
// Dispatcher
// ---------------------------------------------------------------------------

/// What one dispatch pass did; returned for logging and tests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchOutcome {
    /// Rows appended to the durable sink.
    pub appended: usize,
    /// Cycle id of the sent (or attempted) notification, if any.
    pub notified: Option<String>,
}

/// Policy + fan-out stage between the crossing detector and the sinks.
pub struct AlertDispatcher {
    sink: Box<dyn AlertSink>,
    notifier: Option<Box<dyn Notifier>>,
    gate: CooldownGate,
    notional: f64,
    taker_fee: f64,
    threshold: f64,
}

impl AlertDispatcher {
    pub fn new(
        sink: Box<dyn AlertSink>,
        notifier: Option<Box<dyn Notifier>>,
        scope: CooldownScope,
        cooldown: Duration,
        notional: f64,
        taker_fee: f64,
        threshold: f64,
    ) -> Self {
        Self {
            sink,
            notifier,
            gate: CooldownGate::new(scope, cooldown),
            notional,
            taker_fee,
            threshold,
        }
    }

    /// Forward one tick's qualifying events.
    ///
    /// All events are appended to the durable sink; a sink failure aborts
    /// the pass with an error (the caller logs it and the loop continues).
    /// Notification failures are recovered here: logged, cooldown armed,
    /// pass still succeeds.
    pub async fn dispatch(
        &mut self,
        events: &[CycleEvaluation],
        snapshot: &BookSnapshot,
        now: DateTime<Utc>,
    ) -> anyhow::Result<DispatchOutcome> {
        if events.is_empty() {
            return Ok(DispatchOutcome {
                appended: 0,
                notified: None,
            });
        }

        let mut appended = 0;
        for event in events {
            let record = self.record_for(event, snapshot);
            self.sink.append(&record).await?;
            appended += 1;
        }

        // Best cycle: largest net edge; first declared wins ties.
        let best = events
            .iter()
            .skip(1)
            .fold(&events[0], |best, e| {
                if e.net_edge > best.net_edge {
                    e
                } else {
                    best
                }
            });

        let mut notified = None;
        if let Some(notifier) = &self.notifier {
            if self.gate.is_open(&best.cycle_id, now) {
                let record = self.record_for(best, snapshot);
                let text = self.format_notification(&record);
                match notifier.send(&text).await {
                    Ok(()) => {
                        info!(
                            transport = notifier.name(),
                            cycle = %best.cycle_id,
                            edge = format!("{:+.4}%", best.edge_pct()),
                            "Notification sent"
                        );
                    }
                    Err(e) => {
                        warn!(
                            transport = notifier.name(),
                            cycle = %best.cycle_id,
                            error = %e,
                            "Notification failed, continuing"
                        );
                    }
                }
                // Armed on attempt regardless of outcome.
                self.gate.arm(&best.cycle_id, now);
                notified = Some(best.cycle_id.clone());
            }
        }

        Ok(DispatchOutcome { appended, notified })
    }

    fn record_for(&self, event: &CycleEvaluation, snapshot: &BookSnapshot) -> AlertRecord {
        AlertRecord {
            timestamp: event.timestamp,
            cycle_id: event.cycle_id.clone(),
            edge: event.net_edge,
            edge_pct: event.edge_pct(),
            simulated_pnl: self.notional * event.net_edge,
            quotes: snapshot.quotes().to_vec(),
        }
    }

    /// Short Markdown message mirroring the durable record.
    fn format_notification(&self, record: &AlertRecord) -> String {
        let quotes = record
            .quotes
            .iter()
            .map(|(symbol, q)| {
                format!(
                    "`{}` {}/{}",
                    symbol,
                    format_price(q.bid),
                    format_price(q.ask)
                )
            })
            .collect::<Vec<_>>()
            .join(" | ");

        format!(
            "*Arb Opportunity*  Cycle *{}*\n\
             Edge: *{:.3}%*   (sim P&L on ${:.0}: {:.2})\n\
             Threshold: {:.3}%   Fees/leg: {:.2}%\n\
             {}",
            record.cycle_id,
            record.edge_pct,
            self.notional,
            record.simulated_pnl,
            self.threshold * 100.0,
            self.taker_fee * 100.0,
            quotes,
        )
    }
}

/// Two decimals for large quotes, eight for sub-unit cross rates.
fn format_price(price: f64) -> String {
    if price >= 100.0 {
        format!("{price:.2}")
    } else {
        format!("{price:.8}")
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
