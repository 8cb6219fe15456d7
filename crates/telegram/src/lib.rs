pub mod alerts;

pub use alerts::TelegramNotifier;
