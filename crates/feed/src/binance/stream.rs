use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures_util::StreamExt;
use tokio::sync::mpsc;
use tokio_tungstenite::connect_async;
use tracing::{debug, info, warn};
use url::Url;

use common::{Candle, Error, MarketDataSource, Result};

use super::kline::parse_kline_event;

/// Binance 1-minute kline WebSocket stream for a single pair.
///
/// Forwards closed candles only, in strictly increasing open-time order, to a
/// single signal engine. Reconnects automatically with exponential backoff.
/// Minutes missed while disconnected are fetched from a history source, when
/// one is attached, before the next live candle is forwarded.
pub struct BinanceStream {
    pair: String,
    candle_tx: mpsc::Sender<Candle>,
    /// Open time of the last forwarded candle; older or repeated klines are dropped.
    last_open: Option<DateTime<Utc>>,
    history: Option<Arc<dyn MarketDataSource>>,
}

impl BinanceStream {
    pub fn new(pair: impl Into<String>, candle_tx: mpsc::Sender<Candle>) -> Self {
        Self {
            pair: pair.into(),
            candle_tx,
            last_open: None,
            history: None,
        }
    }

    /// Fill gaps in the live feed from `history`.
    pub fn with_backfill(mut self, history: Arc<dyn MarketDataSource>) -> Self {
        self.history = Some(history);
        self
    }

    /// Skip everything up to and including `open_time`, e.g. the last warm-up candle.
    pub fn resume_after(mut self, open_time: Option<DateTime<Utc>>) -> Self {
        self.last_open = open_time;
        self
    }

    /// Run the stream loop until the receiving engine goes away.
    /// Call this inside a `tokio::spawn`.
    pub async fn run(mut self) {
        let mut backoff = Duration::from_secs(1);
        const MAX_BACKOFF: Duration = Duration::from_secs(60);

        loop {
            info!(pair = %self.pair, "Connecting to Binance WebSocket stream");
            match self.connect_once().await {
                Ok(()) => {
                    info!(pair = %self.pair, "WebSocket stream closed cleanly");
                    // Binance ends sessions after 24h; reconnect after a short delay.
                    tokio::time::sleep(Duration::from_secs(1)).await;
                    backoff = Duration::from_secs(1);
                }
                Err(e) => {
                    warn!(pair = %self.pair, error = %e, backoff = ?backoff, "WebSocket error, reconnecting");
                    tokio::time::sleep(backoff).await;
                    backoff = (backoff * 2).min(MAX_BACKOFF);
                }
            }

            if self.candle_tx.is_closed() {
                info!(pair = %self.pair, "Candle receiver dropped, stopping stream");
                return;
            }
        }
    }

    async fn connect_once(&mut self) -> Result<()> {
        let url_str = format!(
            "wss://stream.binance.com:9443/ws/{}@kline_1m",
            self.pair.to_lowercase()
        );
        let url = Url::parse(&url_str).map_err(|e| Error::WebSocket(e.to_string()))?;

        let (ws_stream, _) = connect_async(url)
            .await
            .map_err(|e| Error::WebSocket(e.to_string()))?;

        let (_, mut read) = ws_stream.split();

        while let Some(msg) = read.next().await {
            let msg = msg.map_err(|e| Error::WebSocket(e.to_string()))?;

            if let tokio_tungstenite::tungstenite::Message::Text(text) = msg {
                match parse_kline_event(&text) {
                    Ok(Some(candle)) => {
                        if !self.forward(candle).await {
                            return Ok(());
                        }
                    }
                    Ok(None) => {} // open kline or non-kline message
                    Err(e) => {
                        warn!(pair = %self.pair, error = %e, "Failed to parse kline event");
                    }
                }
            }
        }

        Ok(())
    }

    /// Returns false once the receiver is gone.
    async fn forward(&mut self, candle: Candle) -> bool {
        if let Some(last) = self.last_open {
            if candle.open_time - last > chrono::Duration::minutes(1)
                && !self.backfill(last, candle.open_time).await
            {
                return false;
            }
        }

        if !accept(&mut self.last_open, &candle) {
            debug!(pair = %self.pair, open_time = %candle.open_time, "Dropping stale kline");
            return true;
        }
        self.candle_tx.send(candle).await.is_ok()
    }

    /// Forward the candles strictly between `last` and `next`.
    /// A failed or short fetch leaves the gap in place.
    async fn backfill(&mut self, last: DateTime<Utc>, next: DateTime<Utc>) -> bool {
        let missing = ((next - last).num_minutes() - 1).max(0) as usize;
        let Some(history) = self.history.clone() else {
            warn!(pair = %self.pair, missing, "Gap in live candles, no history source attached");
            return true;
        };

        // The newest closed kline may be `next` itself, plus one for slack.
        let fetched = match history.recent_candles(&self.pair, missing + 2).await {
            Ok(candles) => candles,
            Err(e) => {
                warn!(pair = %self.pair, missing, error = %e, "Gap backfill failed");
                return true;
            }
        };

        let mut filled = 0;
        for candle in fetched
            .into_iter()
            .filter(|c| c.open_time > last && c.open_time < next)
        {
            if !accept(&mut self.last_open, &candle) {
                continue;
            }
            if self.candle_tx.send(candle).await.is_err() {
                return false;
            }
            filled += 1;
        }

        if filled < missing {
            warn!(pair = %self.pair, missing, filled, "Gap only partly backfilled");
        } else {
            info!(pair = %self.pair, filled, "Gap backfilled");
        }
        true
    }
}

/// Enforces strictly increasing open times.
fn accept(last_open: &mut Option<DateTime<Utc>>, candle: &Candle) -> bool {
    if matches!(last_open, Some(last) if candle.open_time <= *last) {
        return false;
    }
    *last_open = Some(candle.open_time);
    true
}
