use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use common::{Advice, Config, LogNotifier, MarketDataSource, Notifier};
use feed::{BinanceRest, BinanceStream};
use strategy::{SignalEngine, StrategyFileConfig};
use telegram_notify::TelegramNotifier;

#[tokio::main]
async fn main() {
    // ── Logging ──────────────────────────────────────────────────────────────
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // ── Config ────────────────────────────────────────────────────────────────
    let cfg = Config::from_env();
    let strategy_file = StrategyFileConfig::load(&cfg.strategy_config_path)
        .unwrap_or_else(|e| panic!("{e}"));
    info!(
        strategies = strategy_file.strategies.len(),
        path = %cfg.strategy_config_path,
        "FallBot starting"
    );

    // ── Alerts ────────────────────────────────────────────────────────────────
    let telegram = match (&cfg.telegram_token, cfg.telegram_chat_ids.is_empty()) {
        (Some(token), false) => Some(TelegramNotifier::spawn(
            token.clone(),
            cfg.telegram_chat_ids.clone(),
        )),
        (Some(_), true) => {
            warn!("TELEGRAM_TOKEN set without TELEGRAM_CHAT_IDS, alerts go to the log");
            None
        }
        (None, _) => None,
    };

    // ── Advice consumer ───────────────────────────────────────────────────────
    // Order execution lives outside this process; advice is emitted as JSON.
    let (advice_tx, mut advice_rx) = mpsc::channel::<Advice>(128);
    tokio::spawn(async move {
        while let Some(advice) = advice_rx.recv().await {
            match serde_json::to_string(&advice) {
                Ok(json) => info!(advice = %json, "Advice"),
                Err(e) => warn!(error = %e, "Failed to encode advice"),
            }
        }
    });

    // ── Pipelines (one independent engine per strategy) ───────────────────────
    let history: Arc<dyn MarketDataSource> = Arc::new(
        BinanceRest::new().unwrap_or_else(|e| panic!("Failed to build REST client: {e}")),
    );

    for strategy_cfg in &strategy_file.strategies {
        let notifier: Box<dyn Notifier> = match &telegram {
            Some(t) => Box::new(t.clone()),
            None => Box::new(LogNotifier),
        };
        let mut engine = SignalEngine::new(strategy_cfg, notifier)
            .unwrap_or_else(|e| panic!("Strategy '{}': {e}", strategy_cfg.name));

        let warm_up = match history
            .recent_candles(engine.pair(), engine.required_history())
            .await
        {
            Ok(candles) => candles,
            Err(e) => {
                warn!(strategy = %engine.name(), error = %e, "Warm-up history unavailable, starting cold");
                Vec::new()
            }
        };
        engine.warm_up(&warm_up);
        let resume_after = warm_up.last().map(|c| c.open_time);

        let (candle_tx, candle_rx) = mpsc::channel(256);
        let stream = BinanceStream::new(engine.pair(), candle_tx)
            .resume_after(resume_after)
            .with_backfill(history.clone());

        info!(
            strategy = %engine.name(),
            pair = %engine.pair(),
            warm_up = warm_up.len(),
            "Pipeline started"
        );
        tokio::spawn(stream.run());
        tokio::spawn(engine.run(candle_rx, advice_tx.clone()));
    }
    drop(advice_tx);

    // Keep main alive
    info!("All pipelines started. Waiting for shutdown signal.");
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Failed to listen for shutdown signal");
    }
    info!("Shutdown signal received. Exiting.");
}
