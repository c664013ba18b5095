//! Shared quote book.
//!
//! In-memory table mapping instrument symbol to its latest bid/ask pair,
//! written by the feed task and read by the evaluation loop. The bid/ask
//! pair for one instrument is stored as a single value, so a reader can
//! never observe one side updated and the other stale for the same tick.
//!
//! Consistency model: each instrument's pair reflects a single update call,
//! but different instruments may reflect different wall-clock instants,
//! because ticks arrive independently per symbol, exactly like the
//! upstream top-of-book stream. Callers must not assume a transactional
//! multi-instrument snapshot.

use parking_lot::RwLock;
use std::collections::HashMap;

use crate::types::Quote;

// ---------------------------------------------------------------------------
// Snapshot
// ---------------------------------------------------------------------------

/// A point-in-time read of the book for a requested instrument set,
/// in request order. Only produced when every requested instrument has
/// received at least one update.
#[derive(Debug, Clone)]
pub struct BookSnapshot {
    quotes: Vec<(String, Quote)>,
}

impl BookSnapshot {
    /// Quote for one instrument, if it was part of the requested set.
    pub fn get(&self, symbol: &str) -> Option<&Quote> {
        self.quotes
            .iter()
            .find(|(s, _)| s == symbol)
            .map(|(_, q)| q)
    }

    /// All `(symbol, quote)` pairs in request order.
    pub fn quotes(&self) -> &[(String, Quote)] {
        &self.quotes
    }
}

// ---------------------------------------------------------------------------
// QuoteBook
// ---------------------------------------------------------------------------

/// Shared mutable quote state, held behind an `Arc`: the feed task is the
/// writer, the monitor the reader.
#[derive(Debug, Default)]
pub struct QuoteBook {
    quotes: RwLock<HashMap<String, Quote>>,
}

impl QuoteBook {
    pub fn new() -> Self {
        Self::default()
    }

    /// Overwrite both sides for an instrument as one atomic pair.
    pub fn update(&self, symbol: &str, bid: f64, ask: f64) {
        self.quotes
            .write()
            .insert(symbol.to_string(), Quote::new(bid, ask));
    }

    /// Latest pair for one instrument, or `None` before its first tick.
    pub fn get(&self, symbol: &str) -> Option<Quote> {
        self.quotes.read().get(symbol).copied()
    }

    /// Consistent read of the requested instruments, or `None` while any
    /// of them has never received an update.
    pub fn snapshot(&self, symbols: &[String]) -> Option<BookSnapshot> {
        let quotes = self.quotes.read();
        let mut out = Vec::with_capacity(symbols.len());
        for symbol in symbols {
            out.push((symbol.clone(), *quotes.get(symbol)?));
        }
        Some(BookSnapshot { quotes: out })
    }

    /// Whether every requested instrument has received at least one update.
    /// Once true it stays true (quotes are overwritten, never removed)
    /// except across an explicit `clear`.
    pub fn is_ready(&self, symbols: &[String]) -> bool {
        let quotes = self.quotes.read();
        symbols.iter().all(|s| quotes.contains_key(s))
    }

    /// Discard all quotes. Used after a feed reconnect so state is rebuilt
    /// from fresh ticks rather than trusted across the gap.
    pub fn clear(&self) {
        self.quotes.write().clear();
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
