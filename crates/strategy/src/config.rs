use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use common::{Error, Result};

use crate::signal::Thresholds;

/// Top-level strategy config file (TOML).
///
/// Example `config/strategies.toml`:
/// ```toml
/// [[strategy]]
/// name = "BTC RSI fall"
/// pair = "BTCUSDT"
/// asset = "BTC"
///
/// [strategy.params]
/// fast_bucket = 5
/// slow_bucket = 60
/// period = 14
/// oversold = 30.0
/// overbought = 70.0
/// sell_when_rsi_falls_to = 50.0
/// ```
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StrategyFileConfig {
    #[serde(rename = "strategy")]
    pub strategies: Vec<StrategyConfig>,
}

/// One independent pipeline: a pair, its label and its parameters.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StrategyConfig {
    /// Human-readable name shown in logs.
    pub name: String,
    /// Exchange symbol, e.g. "BTCUSDT".
    pub pair: String,
    /// Asset label used in alert messages, e.g. "BTC".
    pub asset: String,
    #[serde(default)]
    pub params: RsiFallParams,
}

/// Parameters of the two-time-frame RSI fall strategy.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RsiFallParams {
    /// Resolution of incoming base candles, in minutes. Must be 1.
    pub candle_size: u32,
    /// Base candles per fast-frame candle.
    pub fast_bucket: usize,
    /// Base candles per slow-frame candle.
    pub slow_bucket: usize,
    /// RSI lookback used on both frames.
    pub period: usize,
    pub oversold: f64,
    pub overbought: f64,
    /// Slow RSI level that arms the stall exit once crossed upwards.
    pub sell_when_rsi_falls_to: f64,
    /// Base candles consumed before rules are evaluated.
    /// Defaults to enough history to initialize the slow RSI (`slow_bucket * period`).
    pub history_size: Option<usize>,
}

impl Default for RsiFallParams {
    fn default() -> Self {
        Self {
            candle_size: 1,
            fast_bucket: 5,
            slow_bucket: 60,
            period: 14,
            oversold: 30.0,
            overbought: 70.0,
            sell_when_rsi_falls_to: 50.0,
            history_size: None,
        }
    }
}

impl RsiFallParams {
    pub fn thresholds(&self) -> Thresholds {
        Thresholds {
            oversold: self.oversold,
            overbought: self.overbought,
            fall_latch: self.sell_when_rsi_falls_to,
        }
    }

    pub fn required_history(&self) -> usize {
        self.history_size.unwrap_or(self.slow_bucket * self.period)
    }

    /// Reject parameter sets the strategy cannot run with.
    pub fn validate(&self) -> Result<()> {
        // Bucket ratios assume 1-minute base candles.
        if self.candle_size != 1 {
            return Err(Error::Config(format!(
                "candle_size must be 1 minute, got {}",
                self.candle_size
            )));
        }
        if self.fast_bucket == 0 || self.slow_bucket == 0 {
            return Err(Error::Config("bucket sizes must be at least 1".into()));
        }
        if self.fast_bucket >= self.slow_bucket {
            return Err(Error::Config(format!(
                "fast_bucket ({}) must be smaller than slow_bucket ({})",
                self.fast_bucket, self.slow_bucket
            )));
        }
        if self.period < 2 {
            return Err(Error::Config(format!(
                "period must be >= 2, got {}",
                self.period
            )));
        }
        self.thresholds().validate()
    }
}

impl StrategyFileConfig {
    /// Load and validate from a TOML file.
    pub fn load(path: &str) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("failed to read strategy config at '{path}': {e}"))
        })?;
        Self::parse(&content)
            .map_err(|e| Error::Config(format!("invalid strategy config at '{path}': {e}")))
    }

    pub fn parse(content: &str) -> Result<Self> {
        let cfg: Self = toml::from_str(content).map_err(|e| Error::Config(e.to_string()))?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<()> {
        if self.strategies.is_empty() {
            return Err(Error::Config("no [[strategy]] entries configured".into()));
        }
        let mut names = HashSet::new();
        for s in &self.strategies {
            if !names.insert(s.name.as_str()) {
                return Err(Error::Config(format!("duplicate strategy name '{}'", s.name)));
            }
            s.params
                .validate()
                .map_err(|e| Error::Config(format!("strategy '{}': {e}", s.name)))?;
        }
        Ok(())
    }
}
