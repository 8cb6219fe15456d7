use teloxide::prelude::*;
use tokio::sync::mpsc;
use tracing::{info, warn};

use common::{Error, Notifier, Result};

/// Alerts waiting for delivery. Full queue means Telegram is not keeping up.
const ALERT_QUEUE_CAPACITY: usize = 64;

/// Delivers strategy alerts to Telegram chats in the background.
///
/// `notify` only enqueues, so a slow or unreachable Telegram API never stalls
/// a signal engine. Clones share one delivery task.
#[derive(Clone)]
pub struct TelegramNotifier {
    queue: mpsc::Sender<String>,
}

impl TelegramNotifier {
    /// Spawn the delivery task. Must be called inside a tokio runtime.
    pub fn spawn(token: String, chat_ids: Vec<i64>) -> Self {
        let (notifier, rx) = Self::channel(ALERT_QUEUE_CAPACITY);
        let bot = Bot::new(token);
        let chat_ids: Vec<ChatId> = chat_ids.into_iter().map(ChatId).collect();
        info!(chats = chat_ids.len(), "Telegram alerts enabled");
        tokio::spawn(forward_alerts(bot, chat_ids, rx));
        notifier
    }

    fn channel(capacity: usize) -> (Self, mpsc::Receiver<String>) {
        let (queue, rx) = mpsc::channel(capacity);
        (Self { queue }, rx)
    }
}

impl Notifier for TelegramNotifier {
    fn notify(&self, message: &str) -> Result<()> {
        self.queue.try_send(message.to_string()).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => Error::Notify("alert queue full".into()),
            mpsc::error::TrySendError::Closed(_) => {
                Error::Notify("alert delivery task stopped".into())
            }
        })
    }
}

async fn forward_alerts(bot: Bot, chat_ids: Vec<ChatId>, mut rx: mpsc::Receiver<String>) {
    while let Some(message) = rx.recv().await {
        send_alert(&bot, &chat_ids, &message).await;
    }
    info!("All alert senders dropped, Telegram delivery stopping");
}

/// Send an alert to all configured chat IDs. Failures are logged, never returned.
async fn send_alert(bot: &Bot, chat_ids: &[ChatId], message: &str) {
    for &chat_id in chat_ids {
        if let Err(e) = bot.send_message(chat_id, message).await {
            warn!(chat_id = ?chat_id, error = %e, "Failed to send Telegram alert");
        }
    }
}
