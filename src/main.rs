mod clock;
mod config;
mod extract;
mod filter;
mod payload;
mod pipeline;
mod platform;
mod weeek;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::clock::SystemClock;
use crate::config::Config;
use crate::pipeline::Pipeline;
use crate::platform::telegram::{self, TelegramAcknowledger};

#[tokio::main]
async fn main() -> Result<()> {
    // An explicit path must exist; the default one is optional
    let (config_path, required) = match std::env::args().nth(1) {
        Some(path) => (PathBuf::from(path), true),
        None => (PathBuf::from("config.toml"), false),
    };

    let dotenv_loaded = config::load_dotenv(Path::new(".env"))?;

    let config = Config::load(&config_path, required)
        .with_context(|| format!("Failed to load config from {}", config_path.display()))?;

    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| config.general.filter_directive().into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    if dotenv_loaded {
        info!("Environment loaded from .env");
    }
    info!("Configuration loaded from: {}", config_path.display());
    info!("  Weeek endpoint: {}", config.weeek.tasks_url());
    info!("  Timezone: {}", config.tasks.timezone);
    info!("  Allowed chats: {:?}", config.telegram.allowed_chat_ids);

    let bot = teloxide::Bot::new(&config.telegram.bot_token);
    info!("Bot starting...");

    let self_id = telegram::resolve_self_id(&bot).await;

    let pipeline = Arc::new(Pipeline::new(
        &config,
        self_id,
        TelegramAcknowledger::new(bot.clone()),
        Arc::new(SystemClock),
    )?);

    telegram::run(bot, pipeline).await?;

    Ok(())
}
