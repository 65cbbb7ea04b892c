//! NiftyNavigator Telegram bot
//!
//! # Usage
//!
//! ```bash
//! # .env or environment
//! export TELEGRAM_BOT_TOKEN="123456:ABC..."
//! export OPENROUTER_API_KEY="sk-or-..."
//!
//! cargo run --bin nifty-navigator -p nifty-bot
//! cargo run --bin nifty-navigator -p nifty-bot -- --check
//! ```

use clap::Parser;
use nifty_bot::advisor::Advisor;
use nifty_bot::agents::{AgentSettings, RecommendationAgent, ValidationAgent};
use nifty_bot::api::{AlphaVantageClient, Messenger, TelegramClient, YahooFinanceClient};
use nifty_bot::monitor::Monitor;
use nifty_bot::prompts::Prompts;
use nifty_bot::retry::RetryPolicy;
use nifty_bot::{
    BotConfig, BotError, DataProvider, MarketData, MarketService, MonitorRegistry, MonitorStore,
    NiftyBot, PositionStore,
};
use nifty_llm::LLMProvider;
use nifty_llm::providers::{OpenAIConfig, OpenAIProvider};
use nifty_utils::{EnvError, LogFormat, init_tracing, load_dotenv};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

const DEFAULT_LOG_FILTER: &str = "warn,nifty_bot=info,nifty_llm=info";

/// Telegram bot for NSE intraday picks and position alerts
#[derive(Debug, Parser)]
#[command(name = "nifty-navigator", version, about)]
struct Cli {
    /// Directory for positions.json and monitor.json
    #[arg(long, value_name = "DIR")]
    data_dir: Option<PathBuf>,

    /// OpenRouter model id
    #[arg(long)]
    model: Option<String>,

    /// Seconds between monitoring sweeps
    #[arg(long, value_name = "SECS")]
    poll_interval: Option<u64>,

    /// Log as JSON lines
    #[arg(long)]
    json_logs: bool,

    /// Validate configuration and the Telegram token, then exit
    #[arg(long)]
    check: bool,
}

fn load_config(cli: &Cli) -> nifty_bot::Result<BotConfig> {
    let mut builder = BotConfig::builder();
    if let Some(dir) = &cli.data_dir {
        builder = builder.data_dir(dir);
    }
    if let Some(model) = &cli.model {
        builder = builder.model(model);
    }
    if let Some(secs) = cli.poll_interval {
        builder = builder.poll_interval(Duration::from_secs(secs));
    }
    builder.with_env()?.build()
}

fn market_provider(config: &BotConfig) -> nifty_bot::Result<Arc<dyn MarketData>> {
    let provider: Arc<dyn MarketData> = match config.data_provider {
        DataProvider::Yahoo => Arc::new(YahooFinanceClient::new()?),
        DataProvider::AlphaVantage => {
            let key = config.alpha_vantage_api_key.clone().ok_or_else(|| {
                BotError::from(EnvError::Missing("ALPHA_VANTAGE_API_KEY".to_string()))
            })?;
            Arc::new(AlphaVantageClient::new(key, config.alpha_vantage_rate_limit))
        }
    };

    Ok(Arc::new(MarketService::new(
        provider,
        config.cache_ttl_realtime,
        RetryPolicy::new(config.max_retries, config.retry_backoff_base),
    )))
}

fn llm_provider(config: &BotConfig) -> anyhow::Result<Arc<dyn LLMProvider>> {
    let mut openai = OpenAIConfig::openrouter(config.openrouter_api_key.clone());
    if let Some(base) = &config.openrouter_api_base {
        openai = openai.with_api_base(base.clone());
    }
    Ok(Arc::new(OpenAIProvider::with_config(openai)?))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let dotenv_loaded = load_dotenv();
    let format = if cli.json_logs {
        LogFormat::Json
    } else {
        LogFormat::Pretty
    };
    init_tracing(DEFAULT_LOG_FILTER, format);
    if dotenv_loaded {
        tracing::debug!("environment seeded from .env");
    }

    let config = load_config(&cli)?;
    tracing::info!(?config, "configuration loaded");

    let telegram = TelegramClient::new(
        &config.telegram_token,
        config.telegram_rate_limit,
        config.long_poll_timeout,
    )?;
    let me = telegram.get_me().await?;
    let handle = me.username.as_deref().unwrap_or(&me.first_name);
    tracing::info!(bot = handle, "authenticated with Telegram");

    if cli.check {
        println!("Configuration OK, bot @{handle}");
        return Ok(());
    }

    let market = market_provider(&config)?;
    tracing::info!(provider = market.name(), "market data ready");

    let llm = llm_provider(&config)?;
    let prompts = Arc::new(Prompts::new()?);
    let settings = AgentSettings::new(config.model.clone());
    let advisor = Arc::new(Advisor::new(
        RecommendationAgent::new(
            Arc::clone(&llm),
            Arc::clone(&prompts),
            settings.clone(),
            config.max_picks,
        ),
        ValidationAgent::new(llm, prompts, settings),
        Arc::clone(&market),
        config.liquidity,
        config.max_picks,
    ));

    let positions = Arc::new(PositionStore::load(config.positions_path()).await?);
    let monitor_store = Arc::new(MonitorStore::load(config.monitor_path()).await?);

    let messenger: Arc<dyn Messenger> = Arc::new(telegram.clone());
    let monitor = Arc::new(Monitor::new(
        Arc::clone(&positions),
        Arc::clone(&market),
        Arc::clone(&messenger),
        config.thresholds,
    ));
    let registry = Arc::new(MonitorRegistry::new(
        monitor,
        monitor_store,
        config.poll_interval,
        config.market_hours_only,
    ));
    registry.resume().await?;

    let bot = Arc::new(NiftyBot::new(messenger, advisor, market, positions, registry));

    println!("🤖 NiftyNavigator is running as @{handle}. Press Ctrl-C to stop.");
    bot.run(&telegram, config.long_poll_timeout).await?;

    tracing::info!("bye");
    Ok(())
}
