mod kline;
pub mod rest;
pub mod stream;

pub use rest::BinanceRest;
pub use stream::BinanceStream;
