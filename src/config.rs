//! Configuration loading from TOML with environment variable resolution.
//!
//! Reads `config.toml` and deserializes into strongly-typed structs.
//! Secrets (the Telegram bot token) are referenced by env-var name in the
//! config and resolved at runtime via `std::env::var`.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::HashSet;
use std::fs;

use crate::catalog::{QuoteSide, RateOp};
use crate::engine::crossing::AlertPolicy;
use crate::engine::dispatch::CooldownScope;
use crate::types::{Instrument, TriarbError};

/// Top-level application configuration.
#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub monitor: MonitorConfig,
    pub feed: FeedConfig,
    pub instruments: Vec<Instrument>,
    pub cycles: Vec<CycleConfig>,
    pub alerts: AlertsConfig,
    pub log: LogSinkConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct MonitorConfig {
    pub name: String,
    /// Evaluation poll interval in milliseconds. Free-running; the loop
    /// re-evaluates unchanged data on purpose (this is the granularity of
    /// crossing detection and cooldown expiry).
    pub poll_interval_ms: u64,
    /// Proportional taker fee charged per leg (0.001 = 0.10%).
    pub taker_fee: f64,
    /// Alert threshold as a decimal edge. May be negative to surface
    /// near-breakeven opportunities.
    pub threshold: f64,
    /// Notional amount in the start asset for simulated P&L.
    pub notional: f64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct FeedConfig {
    /// Combined-stream WebSocket endpoint.
    pub ws_url: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct CycleConfig {
    pub id: String,
    #[serde(default)]
    pub description: String,
    pub legs: Vec<LegConfig>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LegConfig {
    pub symbol: String,
    pub side: QuoteSide,
    pub op: RateOp,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AlertsConfig {
    pub policy: AlertPolicy,
    /// Minimum gap between two forwarded notifications for one scope.
    pub cooldown_secs: u64,
    pub cooldown_scope: CooldownScope,
    pub telegram_bot_token_env: Option<String>,
    pub telegram_chat_id_env: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LogSinkConfig {
    pub csv_path: String,
}

impl AppConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: &str) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {path}"))?;
        let config: AppConfig = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {path}"))?;
        Ok(config)
    }

    /// Validate scalar ranges and instrument-set integrity. Fatal at
    /// startup, before any activity begins. Cycle/leg cross-references are
    /// checked separately when the catalog is built.
    pub fn validate(&self) -> Result<(), TriarbError> {
        let m = &self.monitor;

        if m.poll_interval_ms == 0 {
            return Err(TriarbError::Config(
                "poll_interval_ms must be greater than zero".to_string(),
            ));
        }
        if !(0.0..1.0).contains(&m.taker_fee) {
            return Err(TriarbError::Config(format!(
                "taker_fee must be in [0, 1), got {}",
                m.taker_fee
            )));
        }
        if !m.threshold.is_finite() {
            return Err(TriarbError::Config("threshold must be finite".to_string()));
        }
        if !(m.notional.is_finite() && m.notional > 0.0) {
            return Err(TriarbError::Config(format!(
                "notional must be positive, got {}",
                m.notional
            )));
        }
        if self.instruments.is_empty() {
            return Err(TriarbError::Config(
                "no instruments configured".to_string(),
            ));
        }

        let mut seen: HashSet<&str> = HashSet::new();
        for inst in &self.instruments {
            if !seen.insert(inst.symbol.as_str()) {
                return Err(TriarbError::Config(format!(
                    "duplicate instrument symbol: {}",
                    inst.symbol
                )));
            }
        }

        Ok(())
    }

    /// Resolve an environment variable name to its value.
    /// Useful for loading secrets referenced in the config.
    pub fn resolve_env(env_name: &str) -> Result<String> {
        std::env::var(env_name)
            .with_context(|| format!("Environment variable not set: {env_name}"))
    }

    /// Symbols of all configured instruments, in declaration order.
    pub fn symbols(&self) -> Vec<String> {
        self.instruments.iter().map(|i| i.symbol.clone()).collect()
    }
}
