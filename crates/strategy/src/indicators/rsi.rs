use common::Candle;

use crate::batcher::CandleSink;

/// Incremental RSI (Relative Strength Index).
///
/// Uses Wilder's smoothed moving average. The first close counts as sample 1;
/// every later close adds one sample and one price change. Until `period`
/// samples the changes are averaged arithmetically, afterwards each change is
/// blended in with weight `1 / period`. `value()` is `None` until `period`
/// closes have been fed.
#[derive(Debug, Clone)]
pub struct Rsi {
    period: usize,
    avg_gain: f64,
    avg_loss: f64,
    prev_close: Option<f64>,
    /// Closes consumed so far.
    samples: usize,
    value: Option<f64>,
}

impl Rsi {
    pub fn new(period: usize) -> Self {
        assert!(period >= 2, "RSI period must be >= 2");
        Self {
            period,
            avg_gain: 0.0,
            avg_loss: 0.0,
            prev_close: None,
            samples: 0,
            value: None,
        }
    }

    /// Feed one close and return the current reading, if warmed up.
    pub fn update(&mut self, close: f64) -> Option<f64> {
        self.samples += 1;
        let prev = self.prev_close.replace(close)?;

        let change = close - prev;
        let gain = change.max(0.0);
        let loss = (-change).max(0.0);

        if self.samples <= self.period {
            // Running arithmetic mean over the changes seen so far.
            let n = (self.samples - 1) as f64;
            self.avg_gain += (gain - self.avg_gain) / n;
            self.avg_loss += (loss - self.avg_loss) / n;
            if self.samples < self.period {
                return None;
            }
        } else {
            let p = self.period as f64;
            self.avg_gain = (self.avg_gain * (p - 1.0) + gain) / p;
            self.avg_loss = (self.avg_loss * (p - 1.0) + loss) / p;
        }

        let value = rsi_from_averages(self.avg_gain, self.avg_loss);
        self.value = Some(value);
        Some(value)
    }

    pub fn value(&self) -> Option<f64> {
        self.value
    }

    pub fn samples(&self) -> usize {
        self.samples
    }
}

impl CandleSink for Rsi {
    fn on_candle(&mut self, candle: &Candle) {
        self.update(candle.close);
    }
}

fn rsi_from_averages(avg_gain: f64, avg_loss: f64) -> f64 {
    if avg_loss == 0.0 {
        // Flat market reads neutral.
        return if avg_gain > 0.0 { 100.0 } else { 50.0 };
    }
    let rs = avg_gain / avg_loss;
    100.0 - 100.0 / (1.0 + rs)
}
