use chrono::{DateTime, TimeZone, Utc};
use serde::Deserialize;
use serde_json::Value;

use common::{Candle, Error, Result};

// ─── WebSocket kline events ──────────────────────────────────────────────────

#[derive(Deserialize)]
struct KlineWrapper {
    k: KlineData,
}

#[derive(Deserialize)]
struct KlineData {
    #[serde(rename = "t")]
    open_time_ms: i64,
    #[serde(rename = "o")]
    open: String,
    #[serde(rename = "h")]
    high: String,
    #[serde(rename = "l")]
    low: String,
    #[serde(rename = "c")]
    close: String,
    #[serde(rename = "v")]
    volume: String,
    #[serde(rename = "x")]
    is_closed: bool,
}

/// Parse a stream message. `Ok(None)` for non-kline messages and for klines
/// that have not closed yet.
pub(crate) fn parse_kline_event(text: &str) -> Result<Option<Candle>> {
    // Kline messages have an "e" field set to "kline"
    let wrapper: Value = serde_json::from_str(text)?;
    if wrapper.get("e").and_then(|v| v.as_str()) != Some("kline") {
        return Ok(None);
    }

    let k = serde_json::from_value::<KlineWrapper>(wrapper)?.k;
    if !k.is_closed {
        return Ok(None);
    }

    Ok(Some(Candle {
        open_time: millis(k.open_time_ms)?,
        open: price(&k.open)?,
        high: price(&k.high)?,
        low: price(&k.low)?,
        close: price(&k.close)?,
        volume: price(&k.volume)?,
    }))
}

// ─── REST kline rows ─────────────────────────────────────────────────────────

/// One row of `/api/v3/klines`:
/// `[openTime, open, high, low, close, volume, closeTime, ...]`.
/// Returns the candle and its close time.
pub(crate) fn parse_rest_kline(row: &[Value]) -> Result<(Candle, DateTime<Utc>)> {
    if row.len() < 7 {
        return Err(Error::Exchange(format!(
            "kline row has {} fields, expected at least 7",
            row.len()
        )));
    }

    let field = |i: usize| -> Result<f64> {
        row[i]
            .as_str()
            .ok_or_else(|| Error::Exchange(format!("kline field {i} is not a string")))
            .and_then(price)
    };
    let time = |i: usize| -> Result<DateTime<Utc>> {
        row[i]
            .as_i64()
            .ok_or_else(|| Error::Exchange(format!("kline field {i} is not a timestamp")))
            .and_then(millis)
    };

    let candle = Candle {
        open_time: time(0)?,
        open: field(1)?,
        high: field(2)?,
        low: field(3)?,
        close: field(4)?,
        volume: field(5)?,
    };
    Ok((candle, time(6)?))
}

fn price(raw: &str) -> Result<f64> {
    raw.parse::<f64>()
        .map_err(|e| Error::Exchange(format!("bad number '{raw}': {e}")))
}

fn millis(ms: i64) -> Result<DateTime<Utc>> {
    Utc.timestamp_millis_opt(ms)
        .single()
        .ok_or_else(|| Error::Exchange(format!("bad timestamp {ms}")))
}
