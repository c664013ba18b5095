//! Shared types for the TRIARB monitor.
//!
//! These types form the data model used across all modules.
//! They are designed to be stable so that the book, catalog, engine,
//! and sink modules can depend on them without circular references.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// Instrument
// ---------------------------------------------------------------------------

/// A tradable currency pair with independent bid/ask quotes.
///
/// The instrument set is fixed at startup from configuration; instruments
/// are never created or destroyed at runtime.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Instrument {
    /// Exchange symbol, e.g. "BTCUSDT".
    pub symbol: String,
    /// Base asset, e.g. "BTC".
    pub base: String,
    /// Quote asset, e.g. "USDT".
    pub quote: String,
}

impl fmt::Display for Instrument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}/{})", self.symbol, self.base, self.quote)
    }
}

// ---------------------------------------------------------------------------
// Quote
// ---------------------------------------------------------------------------

/// Latest top-of-book quote for one instrument.
///
/// Bid and ask always travel together: the book stores `Option<Quote>`, so
/// an instrument either has no data yet or a complete pair from one tick.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Quote {
    pub bid: f64,
    pub ask: f64,
}

impl fmt::Display for Quote {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.bid, self.ask)
    }
}

impl Quote {
    pub fn new(bid: f64, ask: f64) -> Self {
        Self { bid, ask }
    }

    /// Whether both sides are positive finite numbers. This is the one
    /// place the quote invariant is checked: the feed gate drops ticks
    /// failing it, and the evaluator re-checks before consuming a rate.
    ///
    /// Feed data is trusted as-is beyond this check; `bid <= ask` is
    /// expected but not enforced.
    pub fn is_valid(&self) -> bool {
        self.bid.is_finite() && self.ask.is_finite() && self.bid > 0.0 && self.ask > 0.0
    }
}

// ---------------------------------------------------------------------------
// Cycle evaluation
// ---------------------------------------------------------------------------

/// Result of evaluating one cycle against the current quote snapshot.
///
/// Ephemeral: consumed immediately by the crossing detector, never
/// persisted as an entity.
#[derive(Debug, Clone)]
pub struct CycleEvaluation {
    pub cycle_id: String,
    /// Units of the start asset after traversing all legs (before fees).
    pub gross_ratio: f64,
    /// Fee-adjusted net fractional return: `gross × (1 - fee)^legs - 1`.
    pub net_edge: f64,
    pub timestamp: DateTime<Utc>,
}

impl CycleEvaluation {
    /// Net edge expressed as a percentage.
    pub fn edge_pct(&self) -> f64 {
        self.net_edge * 100.0
    }
}

impl fmt::Display for CycleEvaluation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {:+.4}%", self.cycle_id, self.edge_pct())
    }
}

// ---------------------------------------------------------------------------
// Alert record
// ---------------------------------------------------------------------------

/// The unit appended to the durable log and formatted for notification.
///
/// Immutable once constructed; carries the full per-instrument quote
/// snapshot that produced the edge so a row is auditable on its own.
#[derive(Debug, Clone)]
pub struct AlertRecord {
    pub timestamp: DateTime<Utc>,
    pub cycle_id: String,
    /// Net edge as a decimal (0.0035 = 0.35%).
    pub edge: f64,
    /// Net edge as a percentage.
    pub edge_pct: f64,
    /// Simulated P&L on the configured notional.
    pub simulated_pnl: f64,
    /// All tracked instruments' quotes at dispatch time, in catalog order.
    pub quotes: Vec<(String, Quote)>,
}

impl AlertRecord {
    /// Look up the snapshot quote for one instrument.
    pub fn quote_for(&self, symbol: &str) -> Option<&Quote> {
        self.quotes
            .iter()
            .find(|(s, _)| s == symbol)
            .map(|(_, q)| q)
    }
}

impl fmt::Display for AlertRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "cycle {} edge={:+.4}% pnl={:+.2}",
            self.cycle_id, self.edge_pct, self.simulated_pnl,
        )
    }
}

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Domain-specific error types for TRIARB.
#[derive(Debug, thiserror::Error)]
pub enum TriarbError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Feed error: {0}")]
    Feed(String),

    #[error("Log sink error: {0}")]
    Sink(String),

    #[error("Notification error ({transport}): {message}")]
    Notify { transport: String, message: String },
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
