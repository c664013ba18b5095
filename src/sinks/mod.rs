//! Outbound sinks.
//!
//! Defines the two collaborator seams the dispatcher fans out through:
//! - `AlertSink` — durable append-only record store (CSV file)
//! - `Notifier` — out-of-band text notification (Telegram)
//!
//! Both are called, not owned: they carry no pipeline state and may block
//! on I/O, which serializes with the next evaluation pass but never with
//! feed updates.

pub mod csv_log;
pub mod telegram;

use anyhow::Result;
use async_trait::async_trait;

use crate::types::AlertRecord;

/// Append-only durable record store.
///
/// Every qualifying event is appended; this path is never rate-limited.
#[async_trait]
pub trait AlertSink: Send + Sync {
    /// Append one record, creating the store (and its header) on first use.
    async fn append(&self, record: &AlertRecord) -> Result<()>;

    /// Sink name for logging and identification.
    fn name(&self) -> &str;
}

/// Out-of-band notification transport.
///
/// Implementations must bound their own delivery timeout; a failure is
/// returned to the dispatcher, which logs it and moves on.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Deliver a short formatted text message.
    async fn send(&self, text: &str) -> Result<()>;

    /// Transport name for logging and identification.
    fn name(&self) -> &str;
}
