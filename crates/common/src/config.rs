/// Process-level configuration loaded from environment variables at startup.
/// Strategy parameters live in the TOML file named by `strategy_config_path`.
#[derive(Debug, Clone)]
pub struct Config {
    // Telegram (optional; alerts fall back to the log when unset)
    pub telegram_token: Option<String>,
    pub telegram_chat_ids: Vec<i64>,

    // Strategy config file path
    pub strategy_config_path: String,
}

impl Config {
    /// Load all configuration from environment variables.
    /// Loads `.env` if present. Panics on malformed values.
    pub fn from_env() -> Self {
        let _ = dotenvy::dotenv(); // ignore error if .env not present

        let telegram_chat_ids = optional_env("TELEGRAM_CHAT_IDS")
            .map(|ids| parse_chat_ids(&ids))
            .unwrap_or_default();

        Config {
            telegram_token: optional_env("TELEGRAM_TOKEN").filter(|t| !t.trim().is_empty()),
            telegram_chat_ids,
            strategy_config_path: optional_env("STRATEGY_CONFIG_PATH")
                .unwrap_or_else(|| "config/strategies.toml".to_string()),
        }
    }
}

fn parse_chat_ids(raw: &str) -> Vec<i64> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse::<i64>().unwrap_or_else(|_| {
                panic!("TELEGRAM_CHAT_IDS contains non-numeric ID: '{s}'")
            })
        })
        .collect()
}

fn optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok()
}
