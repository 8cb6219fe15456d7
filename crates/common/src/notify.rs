use tracing::info;

use crate::Result;

/// Best-effort delivery of human-readable alerts.
///
/// Implementations must not block: the signal engine calls `notify` inline on
/// its tick and only logs a returned error.
pub trait Notifier: Send {
    fn notify(&self, message: &str) -> Result<()>;
}

/// Writes alerts to the tracing log. Used when no chat transport is configured.
#[derive(Debug, Clone, Default)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, message: &str) -> Result<()> {
        info!(alert = %message, "Strategy alert");
        Ok(())
    }
}
