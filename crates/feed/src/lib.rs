pub mod binance;

pub use binance::{BinanceRest, BinanceStream};
