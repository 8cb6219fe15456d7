use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde_json::Value;
use tracing::debug;

use common::{Candle, Error, MarketDataSource, Result};

use super::kline::parse_rest_kline;

const BASE_URL: &str = "https://api.binance.com";
/// Exchange cap on rows per `/api/v3/klines` request.
const MAX_KLINES_PER_REQUEST: usize = 1000;

/// Public market-data REST client for Binance. Only used to fetch warm-up history.
pub struct BinanceRest {
    http: Client,
    base_url: String,
}

impl BinanceRest {
    pub fn new() -> Result<Self> {
        Self::with_base_url(BASE_URL)
    }

    pub fn with_base_url(base_url: impl Into<String>) -> Result<Self> {
        let http = Client::builder()
            .use_rustls_tls()
            .build()
            .map_err(|e| Error::Http(e.to_string()))?;
        Ok(Self {
            http,
            base_url: base_url.into(),
        })
    }

    /// One page of 1-minute klines ending at `end_time` (inclusive), oldest first.
    async fn klines_page(
        &self,
        pair: &str,
        limit: usize,
        end_time: Option<DateTime<Utc>>,
    ) -> Result<Vec<(Candle, DateTime<Utc>)>> {
        let mut url = format!(
            "{}/api/v3/klines?symbol={pair}&interval=1m&limit={limit}",
            self.base_url
        );
        if let Some(end) = end_time {
            url.push_str(&format!("&endTime={}", end.timestamp_millis()));
        }

        debug!(pair, limit, "Fetching kline history");
        let resp = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| Error::Http(e.to_string()))?;

        let status = resp.status();
        let body = resp.text().await.map_err(|e| Error::Http(e.to_string()))?;
        if !status.is_success() {
            return Err(Error::Exchange(format!("HTTP {status}: {body}")));
        }

        let rows: Vec<Vec<Value>> = serde_json::from_str(&body)?;
        rows.iter().map(|row| parse_rest_kline(row)).collect()
    }
}

#[async_trait]
impl MarketDataSource for BinanceRest {
    async fn recent_candles(&self, pair: &str, count: usize) -> Result<Vec<Candle>> {
        let now = Utc::now();
        let mut pages: Vec<Vec<Candle>> = Vec::new();
        let mut collected = 0;
        let mut end_time = None;

        while collected < count {
            // Ask for one extra row: the newest kline may still be open.
            let limit = (count - collected + 1).min(MAX_KLINES_PER_REQUEST);
            let rows = self.klines_page(pair, limit, end_time).await?;
            let Some((oldest, _)) = rows.first() else {
                break;
            };
            end_time = Some(oldest.open_time - chrono::Duration::milliseconds(1));
            let fetched = rows.len();

            let mut closed: Vec<Candle> = rows
                .into_iter()
                .filter(|(_, close_time)| *close_time < now)
                .map(|(candle, _)| candle)
                .collect();
            let keep = closed.len().min(count - collected);
            closed.drain(..closed.len() - keep);
            collected += keep;
            pages.push(closed);

            if fetched < limit {
                break; // no older history
            }
        }

        Ok(pages.into_iter().rev().flatten().collect())
    }
}
