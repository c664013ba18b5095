//! Cycle catalog.
//!
//! Static definition of which instruments compose which triangular cycle,
//! in what order, and which quote side each leg consumes. Cycles are fully
//! defined at startup from configuration and never change shape at runtime.
//!
//! Two cycles may traverse the same triangle in opposite directions; the
//! catalog encodes both as distinct entries so neither direction is
//! silently skipped. Declaration order is meaningful: it breaks ties when
//! the dispatcher selects a single best cycle.

use serde::Deserialize;
use std::collections::HashSet;
use std::fmt;

use crate::config::CycleConfig;
use crate::types::{Instrument, TriarbError};

// ---------------------------------------------------------------------------
// Leg descriptors
// ---------------------------------------------------------------------------

/// Which side of the quote a leg consumes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QuoteSide {
    Bid,
    Ask,
}

impl fmt::Display for QuoteSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QuoteSide::Bid => write!(f, "bid"),
            QuoteSide::Ask => write!(f, "ask"),
        }
    }
}

/// How the leg's rate is applied to the running amount.
///
/// Divide when buying the base through an ask (quote → base), multiply
/// when selling the base through a bid (base → quote).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RateOp {
    Multiply,
    Divide,
}

/// One conversion step of a cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Leg {
    pub symbol: String,
    pub side: QuoteSide,
    pub op: RateOp,
}

impl fmt::Display for Leg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let op = match self.op {
            RateOp::Multiply => "*",
            RateOp::Divide => "/",
        };
        write!(f, "{}{}({})", op, self.symbol, self.side)
    }
}

// ---------------------------------------------------------------------------
// Cycle
// ---------------------------------------------------------------------------

/// A named, fixed sequence of legs returning to the starting asset.
#[derive(Debug, Clone)]
pub struct Cycle {
    pub id: String,
    pub description: String,
    pub legs: Vec<Leg>,
}

impl fmt::Display for Cycle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.id)?;
        if !self.description.is_empty() {
            write!(f, " ({})", self.description)?;
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Catalog
// ---------------------------------------------------------------------------

/// The full set of cycles under watch, in declaration order.
#[derive(Debug, Clone)]
pub struct CycleCatalog {
    cycles: Vec<Cycle>,
}

impl CycleCatalog {
    /// Build the catalog from configuration, validating that every leg
    /// references a configured instrument. Fails startup otherwise.
    pub fn new(
        cycles: &[CycleConfig],
        instruments: &[Instrument],
    ) -> Result<Self, TriarbError> {
        if cycles.is_empty() {
            return Err(TriarbError::Config("no cycles configured".to_string()));
        }

        let known: HashSet<&str> = instruments.iter().map(|i| i.symbol.as_str()).collect();

        let mut seen_ids: HashSet<&str> = HashSet::new();
        let mut built = Vec::with_capacity(cycles.len());

        for cfg in cycles {
            if !seen_ids.insert(cfg.id.as_str()) {
                return Err(TriarbError::Config(format!(
                    "duplicate cycle id: {}",
                    cfg.id
                )));
            }
            if cfg.legs.is_empty() {
                return Err(TriarbError::Config(format!("cycle {} has no legs", cfg.id)));
            }
            for leg in &cfg.legs {
                if !known.contains(leg.symbol.as_str()) {
                    return Err(TriarbError::Config(format!(
                        "cycle {} references unknown instrument {}",
                        cfg.id, leg.symbol
                    )));
                }
            }

            built.push(Cycle {
                id: cfg.id.clone(),
                description: cfg.description.clone(),
                legs: cfg
                    .legs
                    .iter()
                    .map(|l| Leg {
                        symbol: l.symbol.clone(),
                        side: l.side,
                        op: l.op,
                    })
                    .collect(),
            });
        }

        Ok(Self { cycles: built })
    }

    /// All cycles in declaration order.
    pub fn cycles(&self) -> &[Cycle] {
        &self.cycles
    }

    /// Ordered leg descriptors for one cycle.
    pub fn legs_of(&self, cycle_id: &str) -> Option<&[Leg]> {
        self.cycles
            .iter()
            .find(|c| c.id == cycle_id)
            .map(|c| c.legs.as_slice())
    }

    pub fn len(&self) -> usize {
        self.cycles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cycles.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
