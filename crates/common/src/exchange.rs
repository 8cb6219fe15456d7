use async_trait::async_trait;

use crate::{Candle, Result};

/// Abstraction over the exchange's historical market data.
///
/// `BinanceRest` implements this for live runs. It is only consulted once per
/// pipeline at startup to warm up the oscillators before live candles flow.
#[async_trait]
pub trait MarketDataSource: Send + Sync {
    /// Most recent `count` closed 1-minute candles for `pair`, oldest first.
    /// May return fewer when the exchange has less history.
    async fn recent_candles(&self, pair: &str, count: usize) -> Result<Vec<Candle>>;
}
