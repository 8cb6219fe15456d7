pub mod batcher;
pub mod config;
pub mod engine;
pub mod indicators;
pub mod signal;

pub use batcher::{CandleBatcher, CandleSink};
pub use config::{RsiFallParams, StrategyConfig, StrategyFileConfig};
pub use engine::SignalEngine;
pub use indicators::Rsi;
pub use signal::{transition, Decision, EngineState, Position, Readings, Thresholds};
