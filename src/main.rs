// sentinel - passive monitoring pipeline
//
// Polls a set of configured boards, clusters incoming threads into
// persistent investigation clusters by embedding similarity, scores
// newsworthiness, and streams an LLM-written headline over an in-process
// event bus once a cluster crosses the significance threshold.
//
// Architecture:
// - storage: relational persistence of threads/comments + cascade cleanup
// - storage::repository: write-through cache in front of the engine
// - scrape: board polling (live or test-mode), rate-limited and retried
// - llm: uniform chat/translate/vision/embed surface over a local server
// - cluster: centroid-based clustering, merge, TTL expiry, significance
// - report: dossier assembly and headline prompt/parsing
// - events + monitor: the bus and the recurring-cycle orchestrator
// - tui: optional terminal front-end over the event bus (disable with
//   --headless); out of core scope, kept only as the UI shell

use std::sync::Arc;

use anyhow::{Context, Result};
use sentinel::config::{AppMode, Config};
use sentinel::events::Bus;
use sentinel::llm::{LlmGateway, LocalLlmGateway};
use sentinel::logging::{LogBuffer, TuiLogLayer};
use sentinel::monitor::Monitor;
use sentinel::scrape::testmode::TestModeScraper;
use sentinel::scrape::{LiveScraper, Scraper};
use sentinel::storage::{RepositoryCache, StorageEngine};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = sentinel::cli::Cli::parse_args();
    if sentinel::cli::handle_cli(&cli) {
        return Ok(());
    }

    Config::ensure_config_exists();
    let mut config = Config::from_env();
    if let Some(mode) = cli.mode() {
        config.mode = mode;
    }
    if cli.headless {
        config.enable_tui = false;
    }

    let log_buffer = LogBuffer::new();
    init_logging(&config, &log_buffer)?;

    sentinel::startup::print_startup(&config);
    sentinel::startup::log_startup(&config);

    std::fs::create_dir_all(&config.data_dir)
        .with_context(|| format!("creating data directory {}", config.data_dir.display()))?;

    let storage = Arc::new(
        StorageEngine::open(&config.db_path()).with_context(|| {
            format!("opening storage engine at {}", config.db_path().display())
        })?,
    );
    let repository = Arc::new(RepositoryCache::new(storage.clone()));
    repository.warmup().context("warming up repository cache")?;

    let scraper: Arc<dyn Scraper> = match config.mode {
        AppMode::Test => Arc::new(TestModeScraper::new(repository.clone())),
        AppMode::Prod => Arc::new(LiveScraper::new(
            repository.clone(),
            "https://www.reddit.com",
        )),
    };

    let llm: Arc<dyn LlmGateway> = match LocalLlmGateway::connect(&config.agent.ollama).await {
        Ok(gateway) => Arc::new(gateway),
        Err(e) => {
            tracing::error!("fatal: could not resolve LLM gateway models: {e:#}");
            return Err(e.context("LLM gateway startup"));
        }
    };

    let bus = Bus::default();
    let monitor = Arc::new(Monitor::new(
        config.clone(),
        repository.clone(),
        storage.clone(),
        scraper,
        llm,
        bus.clone(),
    ));

    let shutdown = CancellationToken::new();
    let monitor_handle = {
        let monitor = monitor.clone();
        let shutdown = shutdown.clone();
        tokio::spawn(async move { monitor.run(shutdown).await })
    };

    if config.enable_tui {
        tracing::info!("starting TUI");
        if let Err(e) = sentinel::tui::run_tui(bus.subscribe(), log_buffer, config.clone()).await {
            tracing::error!("TUI error: {e:?}");
        }
        shutdown.cancel();
    } else {
        tracing::info!("headless mode, waiting for Ctrl+C");
        tokio::signal::ctrl_c().await.context("waiting on ctrl-c")?;
        shutdown.cancel();
    }

    let _ = monitor_handle.await;
    repository.shutdown().await;
    tracing::info!("shutdown complete");
    Ok(())
}

/// Wires the bus's `tracing::Level`-mirrored output and, in TUI mode, the
/// in-memory ring buffer the log panel reads from; in headless mode logs
/// go straight to stdout so they aren't silently dropped.
fn init_logging(config: &Config, log_buffer: &LogBuffer) -> Result<()> {
    let default_filter = format!("sentinel={}", config.logging.level);
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| default_filter.into());

    let file_appender = tracing_appender::rolling::Builder::new()
        .rotation(match config.logging.file_rotation {
            sentinel::config::LogRotation::Hourly => tracing_appender::rolling::Rotation::HOURLY,
            sentinel::config::LogRotation::Daily => tracing_appender::rolling::Rotation::DAILY,
            sentinel::config::LogRotation::Never => tracing_appender::rolling::Rotation::NEVER,
        })
        .filename_prefix(&config.logging.file_prefix)
        .build(config.log_dir())
        .context("building rolling file appender")?;
    // Leaked intentionally: the non-blocking writer's guard must outlive
    // the process, and main never returns before shutdown anyway.
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
    Box::leak(Box::new(guard));

    if config.enable_tui {
        tracing_subscriber::registry()
            .with(filter)
            .with(TuiLogLayer::new(log_buffer.clone()))
            .with(tracing_subscriber::fmt::layer().with_writer(non_blocking).with_ansi(false))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .with(tracing_subscriber::fmt::layer().with_writer(non_blocking).with_ansi(false))
            .init();
    }

    Ok(())
}
