use chrono::{DateTime, Utc};

use common::Candle;

/// Single downstream consumer of derived candles.
pub trait CandleSink {
    fn on_candle(&mut self, candle: &Candle);
}

impl CandleSink for Vec<Candle> {
    fn on_candle(&mut self, candle: &Candle) {
        self.push(*candle);
    }
}

/// Folds every `bucket_size` consecutive base candles into one derived candle
/// and hands it to its sink before `write` returns.
///
/// Buckets are formed by arrival count, not by wall-clock alignment. A bucket
/// that never fills is never emitted.
#[derive(Debug, Clone)]
pub struct CandleBatcher<S> {
    bucket_size: usize,
    pending: Vec<Candle>,
    sink: S,
}

impl<S: CandleSink> CandleBatcher<S> {
    pub fn new(bucket_size: usize, sink: S) -> Self {
        assert!(bucket_size >= 1, "bucket size must be >= 1");
        Self {
            bucket_size,
            pending: Vec::with_capacity(bucket_size),
            sink,
        }
    }

    /// Append one base candle. Returns the derived candle when this write
    /// completed a bucket.
    pub fn write(&mut self, candle: Candle) -> Option<Candle> {
        self.pending.push(candle);
        if self.pending.len() < self.bucket_size {
            return None;
        }

        let derived = fold(&self.pending);
        self.pending.clear();
        self.sink.on_candle(&derived);
        Some(derived)
    }

    pub fn bucket_size(&self) -> usize {
        self.bucket_size
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Open time of the bucket currently being filled.
    pub fn bucket_start(&self) -> Option<DateTime<Utc>> {
        self.pending.first().map(|c| c.open_time)
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn into_sink(self) -> S {
        self.sink
    }
}

/// Caller guarantees `candles` is non-empty.
fn fold(candles: &[Candle]) -> Candle {
    let first = candles[0];
    let last = candles[candles.len() - 1];

    candles[1..].iter().fold(
        Candle {
            close: last.close,
            ..first
        },
        |mut acc, c| {
            acc.high = acc.high.max(c.high);
            acc.low = acc.low.min(c.low);
            acc.volume += c.volume;
            acc
        },
    )
}
