//! Edge evaluation.
//!
//! Computes the fee-adjusted net return of traversing each catalog cycle
//! against the current quote snapshot. Pure arithmetic over a snapshot;
//! no I/O, no state.

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::book::BookSnapshot;
use crate::catalog::{CycleCatalog, Leg, QuoteSide, RateOp};
use crate::types::CycleEvaluation;

// ---------------------------------------------------------------------------
// Per-cycle failure conditions
// ---------------------------------------------------------------------------

/// Why one cycle could not be evaluated this tick. Treated as stale data:
/// the cycle is skipped, never surfaced as an error or a NaN/Inf edge.
#[derive(Debug, thiserror::Error)]
enum EvalError {
    #[error("no quote for {0}")]
    MissingQuote(String),

    #[error("unusable quote for {0}")]
    BadQuote(String),

    #[error("non-finite running product after {0}")]
    Overflow(String),
}

// ---------------------------------------------------------------------------
// Evaluator
// ---------------------------------------------------------------------------

/// Evaluates every catalog cycle against a book snapshot.
pub struct EdgeEvaluator {
    taker_fee: f64,
}

impl EdgeEvaluator {
    pub fn new(taker_fee: f64) -> Self {
        Self { taker_fee }
    }

    /// Evaluate all cycles, in catalog declaration order.
    ///
    /// Cycles whose quotes are momentarily unusable are skipped with a
    /// debug log; the remaining cycles still evaluate. The caller is
    /// responsible for only passing complete snapshots (`QuoteBook`
    /// returns `None` before readiness).
    pub fn evaluate_all(
        &self,
        snapshot: &BookSnapshot,
        catalog: &CycleCatalog,
        now: DateTime<Utc>,
    ) -> Vec<CycleEvaluation> {
        let mut evaluations = Vec::with_capacity(catalog.len());

        for cycle in catalog.cycles() {
            match self.evaluate_cycle(snapshot, &cycle.id, &cycle.legs, now) {
                Ok(eval) => evaluations.push(eval),
                Err(e) => {
                    debug!(cycle = %cycle.id, reason = %e, "Cycle skipped this tick");
                }
            }
        }

        evaluations
    }

    /// Traverse one cycle's legs starting from a notional 1 unit of its
    /// start asset. The fee factor `(1 - taker_fee)^legs` compounds per
    /// actual leg count and is applied once at the end, not folded into
    /// each intermediate rate.
    fn evaluate_cycle(
        &self,
        snapshot: &BookSnapshot,
        cycle_id: &str,
        legs: &[Leg],
        now: DateTime<Utc>,
    ) -> Result<CycleEvaluation, EvalError> {
        let mut amount = 1.0f64;

        for leg in legs {
            let quote = snapshot
                .get(&leg.symbol)
                .ok_or_else(|| EvalError::MissingQuote(leg.symbol.clone()))?;

            // The book trusts feed data as-is, so the quote invariant is
            // re-checked here before a rate is consumed.
            if !quote.is_valid() {
                return Err(EvalError::BadQuote(leg.symbol.clone()));
            }

            let rate = match leg.side {
                QuoteSide::Bid => quote.bid,
                QuoteSide::Ask => quote.ask,
            };

            amount = match leg.op {
                RateOp::Multiply => amount * rate,
                RateOp::Divide => amount / rate,
            };
            if !amount.is_finite() {
                return Err(EvalError::Overflow(leg.symbol.clone()));
            }
        }

        let fee_factor = (1.0 - self.taker_fee).powi(legs.len() as i32);
        let net_edge = amount * fee_factor - 1.0;

        Ok(CycleEvaluation {
            cycle_id: cycle_id.to_string(),
            gross_ratio: amount,
            net_edge,
            timestamp: now,
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::book::QuoteBook;
    use crate::catalog::{CycleCatalog, QuoteSide, RateOp};
    use crate::config::{CycleConfig, LegConfig};
    use crate::types::Instrument;

    fn instruments() -> Vec<Instrument> {
        [
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
        .collect()
    }

    fn leg(symbol: &str, side: QuoteSide, op: RateOp) -> LegConfig {
        LegConfig {
            symbol: symbol.into(),
            side,
            op,
        }
    }

    /// Forward and reverse cycles over the BTC-ETH-USDT triangle.
    fn cycles() -> Vec<CycleConfig> {
        vec![
            CycleConfig {
                id: "A".into(),
                description: "USDT -> BTC -> ETH -> USDT".into(),
                legs: vec![
                    leg("BTCUSDT", QuoteSide::Ask, RateOp::Divide),
                    leg("ETHBTC", QuoteSide::Ask, RateOp::Divide),
                    leg("ETHUSDT", QuoteSide::Bid, RateOp::Multiply),
                ],
            },
            CycleConfig {
                id: "B".into(),
                description: "USDT -> ETH -> BTC -> USDT".into(),
                legs: vec![
                    leg("ETHUSDT", QuoteSide::Ask, RateOp::Divide),
                    leg("ETHBTC", QuoteSide::Bid, RateOp::Multiply),
                    leg("BTCUSDT", QuoteSide::Bid, RateOp::Multiply),
                ],
            },
        ]
    }

    fn catalog() -> CycleCatalog {
        CycleCatalog::new(&cycles(), &instruments()).unwrap()
    }

    fn symbols() -> Vec<String> {
        instruments().iter().map(|i| i.symbol.clone()).collect()
    }

    fn book_with(eth_btc_ask: f64) -> QuoteBook {
        let book = QuoteBook::new();
        book.update("BTCUSDT", 50000.0, 50010.0);
        book.update("ETHUSDT", 3000.0, 3001.0);
        book.update("ETHBTC", 0.0600, eth_btc_ask);
        book
    }

    #[test]
    fn test_balanced_market_below_threshold() {
        // gross = (1/50010) * (1/0.0601) * 3000 ≈ 0.99814
        // net   = gross * 0.999^3 - 1      ≈ -0.00486
        let book = book_with(0.0601);
        let snap = book.snapshot(&symbols()).unwrap();
        let evals = EdgeEvaluator::new(0.001).evaluate_all(&snap, &catalog(), Utc::now());

        assert_eq!(evals.len(), 2);
        let a = &evals[0];
        assert_eq!(a.cycle_id, "A");
        assert!((a.gross_ratio - 0.99814).abs() < 5e-4);
        assert!(a.net_edge < 0.0, "balanced market must show no edge");
        assert!((a.net_edge - (-0.00486)).abs() < 5e-4);
    }

    #[test]
    fn test_mispriced_ask_shows_positive_edge() {
        // ETHBTC ask dropped to 0.0590:
        // gross = (1/50010) * (1/0.0590) * 3000 ≈ 1.0167
        // net   ≈ +0.0136 (1.36%)
        let book = book_with(0.0590);
        let snap = book.snapshot(&symbols()).unwrap();
        let evals = EdgeEvaluator::new(0.001).evaluate_all(&snap, &catalog(), Utc::now());

        let a = &evals[0];
        assert!(a.net_edge > 0.013 && a.net_edge < 0.0145, "got {}", a.net_edge);
    }

    #[test]
    fn test_zero_fee_identity() {
        let book = book_with(0.0601);
        let snap = book.snapshot(&symbols()).unwrap();
        let evals = EdgeEvaluator::new(0.0).evaluate_all(&snap, &catalog(), Utc::now());

        for eval in &evals {
            assert!(
                (eval.net_edge - (eval.gross_ratio - 1.0)).abs() < 1e-12,
                "with zero fee, net edge must equal gross - 1"
            );
        }
    }

    #[test]
    fn test_all_edges_finite_for_positive_quotes() {
        let book = book_with(0.0601);
        let snap = book.snapshot(&symbols()).unwrap();
        let evals = EdgeEvaluator::new(0.001).evaluate_all(&snap, &catalog(), Utc::now());

        assert_eq!(evals.len(), 2);
        for eval in &evals {
            assert!(eval.net_edge.is_finite());
            assert!(eval.gross_ratio.is_finite());
        }
    }

    #[test]
    fn test_forward_and_reverse_are_distinct() {
        let book = book_with(0.0590);
        let snap = book.snapshot(&symbols()).unwrap();
        let evals = EdgeEvaluator::new(0.001).evaluate_all(&snap, &catalog(), Utc::now());

        // A mispricing that helps the forward direction hurts the reverse.
        assert!(evals[0].net_edge > 0.0);
        assert!(evals[1].net_edge < 0.0);
    }

    #[test]
    fn test_invalid_quote_skips_only_dependent_cycles() {
        // A third cycle that never touches ETHBTC: a buy/sell round trip
        // on BTCUSDT alone.
        let mut cycles = cycles();
        cycles.push(CycleConfig {
            id: "RT".into(),
            description: String::new(),
            legs: vec![
                leg("BTCUSDT", QuoteSide::Ask, RateOp::Divide),
                leg("BTCUSDT", QuoteSide::Bid, RateOp::Multiply),
            ],
        });
        let catalog = CycleCatalog::new(&cycles, &instruments()).unwrap();

        let book = QuoteBook::new();
        book.update("BTCUSDT", 50000.0, 50010.0);
        book.update("ETHUSDT", 3000.0, 3001.0);
        book.update("ETHBTC", 0.0600, 0.0); // malformed ask

        let evals = EdgeEvaluator::new(0.001).evaluate_all(
            &book.snapshot(&symbols()).unwrap(),
            &catalog,
            Utc::now(),
        );

        // The ETHBTC quote violates the pair invariant, so both triangle
        // directions are skipped; the round trip still evaluates.
        assert_eq!(evals.len(), 1);
        assert_eq!(evals[0].cycle_id, "RT");
        assert!(evals[0].net_edge.is_finite());
    }

    #[test]
    fn test_fee_compounds_per_leg_count() {
        // A degenerate 2-leg round trip: buy at ask, sell at bid on the
        // same instrument. gross = bid/ask, fee factor = (1-fee)^2.
        let instruments = vec![Instrument {
            symbol: "BTCUSDT".into(),
            base: "BTC".into(),
            quote: "USDT".into(),
        }];
        let cycles = vec![CycleConfig {
            id: "RT".into(),
            description: String::new(),
            legs: vec![
                leg("BTCUSDT", QuoteSide::Ask, RateOp::Divide),
                leg("BTCUSDT", QuoteSide::Bid, RateOp::Multiply),
            ],
        }];
        let catalog = CycleCatalog::new(&cycles, &instruments).unwrap();

        let book = QuoteBook::new();
        book.update("BTCUSDT", 50000.0, 50010.0);
        let snap = book.snapshot(&["BTCUSDT".to_string()]).unwrap();

        let fee = 0.001;
        let evals = EdgeEvaluator::new(fee).evaluate_all(&snap, &catalog, Utc::now());
        let expected = (50000.0 / 50010.0) * (1.0 - fee) * (1.0 - fee) - 1.0;
        assert!((evals[0].net_edge - expected).abs() < 1e-12);
    }
}
