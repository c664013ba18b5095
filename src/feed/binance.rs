//! Binance bookTicker feed adapter.
//!
//! Subscribes to the combined bookTicker stream for the configured
//! instrument set and writes each tick into the shared `QuoteBook`.
//! Malformed messages and unknown symbols are dropped silently; one bad
//! tick never affects other instruments' state.
//!
//! On connection loss the adapter reconnects with exponential backoff and
//! clears the book first, so the pipeline reports not-ready until fresh
//! quotes arrive rather than evaluating across the gap.

use anyhow::{Context, Result};
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, info, warn};

use crate::book::QuoteBook;
use crate::feed::Tick;
use crate::types::{Quote, TriarbError};

/// Initial reconnect delay; doubles per failed attempt.
const RECONNECT_DELAY_MIN: Duration = Duration::from_millis(100);
/// Reconnect delay cap.
const RECONNECT_DELAY_MAX: Duration = Duration::from_secs(30);

// ---------------------------------------------------------------------------
// Wire format (Binance JSON → Rust)
// ---------------------------------------------------------------------------

/// Combined-stream envelope: `{"stream":"btcusdt@bookTicker","data":{...}}`.
/// Control frames (subscription acks) have no `data` field.
#[derive(Debug, Deserialize)]
struct StreamEnvelope {
    #[serde(default)]
    data: Option<BookTickerData>,
}

/// bookTicker payload. Prices arrive as strings.
#[derive(Debug, Deserialize)]
struct BookTickerData {
    #[serde(rename = "s")]
    symbol: String,
    #[serde(rename = "b")]
    bid: String,
    #[serde(rename = "a")]
    ask: String,
}

/// Parse one stream message into a tick, or `None` for anything that
/// should be dropped: control frames, unknown symbols, missing fields,
/// unparseable or non-positive prices.
fn parse_tick(text: &str, subscribed: &HashSet<String>) -> Option<Tick> {
    let envelope: StreamEnvelope = serde_json::from_str(text).ok()?;
    let data = envelope.data?;

    if !subscribed.contains(&data.symbol) {
        return None;
    }

    let bid: f64 = data.bid.parse().ok()?;
    let ask: f64 = data.ask.parse().ok()?;
    if !Quote::new(bid, ask).is_valid() {
        return None;
    }

    Some(Tick {
        symbol: data.symbol,
        bid,
        ask,
    })
}

// ---------------------------------------------------------------------------
// Feed
// ---------------------------------------------------------------------------

/// Why one connection attempt ended.
enum StreamEnd {
    Shutdown,
    Remote,
}

pub struct BinanceFeed {
    base_url: String,
    symbols: Vec<String>,
}

impl BinanceFeed {
    pub fn new(base_url: String, symbols: Vec<String>) -> Self {
        Self { base_url, symbols }
    }

    /// Combined stream URL for the subscribed symbols.
    fn stream_url(&self) -> String {
        let streams = self
            .symbols
            .iter()
            .map(|s| format!("{}@bookTicker", s.to_lowercase()))
            .collect::<Vec<_>>()
            .join("/");
        format!("{}?streams={}", self.base_url, streams)
    }

    /// Run for the process lifetime: connect, stream ticks into the book,
    /// reconnect with backoff on loss. Returns when shutdown is signalled.
    pub async fn run(
        self,
        book: Arc<QuoteBook>,
        mut shutdown: watch::Receiver<bool>,
    ) -> Result<()> {
        let url = self.stream_url();
        let subscribed: HashSet<String> = self.symbols.iter().cloned().collect();
        let mut delay = RECONNECT_DELAY_MIN;

        loop {
            if *shutdown.borrow() {
                return Ok(());
            }

            match self
                .connect_and_stream(&url, &subscribed, &book, &mut shutdown)
                .await
            {
                Ok(StreamEnd::Shutdown) => return Ok(()),
                Ok(StreamEnd::Remote) => {
                    warn!("Feed stream closed by remote, reconnecting");
                    delay = RECONNECT_DELAY_MIN;
                }
                Err(e) => {
                    warn!(error = %e, delay_ms = delay.as_millis() as u64, "Feed error, backing off");
                    delay = (delay * 2).min(RECONNECT_DELAY_MAX);
                }
            }

            // Quotes from before the gap are not trusted; the book is
            // rebuilt from fresh ticks after resubscribing.
            book.clear();

            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        return Ok(());
                    }
                }
            }
        }
    }

    async fn connect_and_stream(
        &self,
        url: &str,
        subscribed: &HashSet<String>,
        book: &QuoteBook,
        shutdown: &mut watch::Receiver<bool>,
    ) -> Result<StreamEnd> {
        let (ws, _) = connect_async(url)
            .await
            .map_err(|e| TriarbError::Feed(format!("connect to {url}: {e}")))
            .context("WebSocket connection failed")?;

        info!(symbols = self.symbols.len(), "Feed connected");
        let (mut write, mut read) = ws.split();

        loop {
            tokio::select! {
                msg = read.next() => {
                    let msg = match msg {
                        Some(Ok(m)) => m,
                        Some(Err(e)) => {
                            return Err(TriarbError::Feed(format!("stream read: {e}")).into());
                        }
                        None => return Ok(StreamEnd::Remote),
                    };

                    match msg {
                        Message::Text(text) => {
                            match parse_tick(&text, subscribed) {
                                Some(tick) => book.update(&tick.symbol, tick.bid, tick.ask),
                                None => debug!("Dropped unusable feed message"),
                            }
                        }
                        Message::Ping(payload) => {
                            let _ = write.send(Message::Pong(payload)).await;
                        }
                        Message::Close(_) => return Ok(StreamEnd::Remote),
                        _ => {}
                    }
                }
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        let _ = write.send(Message::Close(None)).await;
                        return Ok(StreamEnd::Shutdown);
                    }
                }
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
