use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use common::{Advice, Candle, Notifier, Result};

use crate::batcher::CandleBatcher;
use crate::config::StrategyConfig;
use crate::indicators::Rsi;
use crate::signal::{transition, Decision, EngineState, Readings, Thresholds};

/// Two-time-frame RSI strategy for one pair.
///
/// Every base candle is written to a fast and a slow batcher, each feeding its
/// own RSI. After forwarding, the rule table runs against both readings once
/// they exist and the first `required_history` candles have been consumed.
pub struct SignalEngine {
    name: String,
    pair: String,
    asset: String,
    thresholds: Thresholds,
    fast: CandleBatcher<Rsi>,
    slow: CandleBatcher<Rsi>,
    state: EngineState,
    required_history: usize,
    ticks: usize,
    notifier: Box<dyn Notifier>,
}

impl SignalEngine {
    /// Build an engine from a strategy entry. Fails on invalid parameters.
    pub fn new(cfg: &StrategyConfig, notifier: Box<dyn Notifier>) -> Result<Self> {
        let params = &cfg.params;
        params.validate()?;

        Ok(Self {
            name: cfg.name.clone(),
            pair: cfg.pair.clone(),
            asset: cfg.asset.clone(),
            thresholds: params.thresholds(),
            fast: CandleBatcher::new(params.fast_bucket, Rsi::new(params.period)),
            slow: CandleBatcher::new(params.slow_bucket, Rsi::new(params.period)),
            state: EngineState::default(),
            required_history: params.required_history(),
            ticks: 0,
            notifier,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn pair(&self) -> &str {
        &self.pair
    }

    pub fn state(&self) -> &EngineState {
        &self.state
    }

    pub fn fast_rsi(&self) -> Option<f64> {
        self.fast.sink().value()
    }

    pub fn slow_rsi(&self) -> Option<f64> {
        self.slow.sink().value()
    }

    pub fn required_history(&self) -> usize {
        self.required_history
    }

    /// Base candles consumed so far, warm-up included.
    pub fn ticks(&self) -> usize {
        self.ticks
    }

    /// Process one base candle. Returns advice when the rule table changed position.
    pub fn on_candle(&mut self, candle: &Candle) -> Option<Advice> {
        self.ingest(candle);

        if self.ticks <= self.required_history {
            return None;
        }

        let readings = match (self.fast_rsi(), self.slow_rsi()) {
            (Some(fast), Some(slow)) => Readings { fast, slow },
            _ => return None,
        };

        let (next, decision) = transition(self.state, &self.thresholds, readings, candle.close);
        self.state = next;
        let decision = decision?;

        let advice = Advice {
            pair: self.pair.clone(),
            direction: decision.direction(),
            price: candle.close,
            timestamp: candle.open_time,
        };
        info!(
            strategy = %self.name,
            direction = %advice.direction,
            price = advice.price,
            fast_rsi = readings.fast,
            slow_rsi = readings.slow,
            "{}",
            decision.action()
        );

        let message = self.alert_message(&decision, readings, candle.close);
        if let Err(e) = self.notifier.notify(&message) {
            warn!(strategy = %self.name, error = %e, "Alert not delivered");
        }

        Some(advice)
    }

    /// Feed historical candles before live data. Only batchers and oscillators
    /// are updated: the rule table never runs, so no advice or alert is produced
    /// and the position stays as it was. Returns how many candles were consumed.
    pub fn warm_up(&mut self, candles: &[Candle]) -> usize {
        for candle in candles {
            self.ingest(candle);
        }
        info!(
            strategy = %self.name,
            candles = candles.len(),
            fast_rsi = ?self.fast_rsi(),
            slow_rsi = ?self.slow_rsi(),
            slow_samples = self.slow.sink().samples(),
            slow_pending = self.slow.pending_len(),
            slow_bucket_start = ?self.slow.bucket_start(),
            "Warm-up complete"
        );
        candles.len()
    }

    /// Price bookkeeping and forwarding to both frames.
    fn ingest(&mut self, candle: &Candle) {
        self.state.last_price = candle.close;
        self.ticks += 1;

        if self.fast.write(*candle).is_some() {
            debug!(strategy = %self.name, rsi = ?self.fast_rsi(), "Fast RSI updated");
        }
        if self.slow.write(*candle).is_some() {
            info!(strategy = %self.name, rsi = ?self.slow_rsi(), "Slow RSI updated");
        }
    }

    fn alert_message(&self, decision: &Decision, readings: Readings, price: f64) -> String {
        let mut msg = format!(
            "{} current price: {price}\n\
             Slow RSI ({}m): {:.2}\n\
             Fast RSI ({}m): {:.2}\n\
             {}",
            self.asset,
            self.slow.bucket_size(),
            readings.slow,
            self.fast.bucket_size(),
            readings.fast,
            decision.action(),
        );
        if let Some(entry) = decision.entry_price() {
            msg.push_str(&format!("\nBought at {entry}"));
        }
        msg
    }

    /// Drive the engine from a candle channel until it closes.
    /// Advice is forwarded to `advice_tx`; stops if that channel closes.
    pub async fn run(
        mut self,
        mut candle_rx: mpsc::Receiver<Candle>,
        advice_tx: mpsc::Sender<Advice>,
    ) {
        info!(strategy = %self.name, pair = %self.pair, "Signal engine running");
        while let Some(candle) = candle_rx.recv().await {
            if let Some(advice) = self.on_candle(&candle) {
                if advice_tx.send(advice).await.is_err() {
                    warn!(strategy = %self.name, "Advice channel closed, stopping signal engine");
                    return;
                }
            }
        }
        warn!(strategy = %self.name, "Candle channel closed");
    }
}
