//! CLI entrypoint for crossbar
//!
//! Wires the layers together: configuration, logging, the session store
//! and its sweeper, the bot hub, the LLM client, and finally either the
//! HTTP transports (default) or the interactive REPL.

use anyhow::{Context, Result, bail};
use clap::Parser;
use crossbar_application::{
    ConversationLogger, GatewayStats, NoConversationLogger, ProcessMessageUseCase,
};
use crossbar_infrastructure::{
    BackendToolRegistry, BotHub, ChatCompletionsClient, ConfigLoader, FileConfig, IdleSweeper,
    InMemorySessionStore, JsonlConversationLogger, Severity, TelegramApi,
};
use crossbar_presentation::{AppState, GatewayRepl, TelegramContext, http};
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "crossbar", version, about = "Multi-protocol LLM gateway")]
struct Cli {
    /// Path to a config file (highest-priority file source)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Ignore config files and use built-in defaults
    #[arg(long)]
    no_config: bool,

    /// Run the interactive REPL instead of the HTTP transports
    #[arg(long)]
    repl: bool,

    /// Verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Write logs to this file instead of stderr
    #[arg(long)]
    log_file: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => EnvFilter::new("warn"),
        1 => EnvFilter::new("info"),
        2 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    };

    // file logging keeps the REPL's stdout clean; the guard must outlive main
    let _log_guard = match &cli.log_file {
        Some(path) => {
            let dir = path.parent().unwrap_or_else(|| std::path::Path::new("."));
            let file = path.file_name().context("log file path has no file name")?;
            let appender = tracing_appender::rolling::never(dir, file);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(writer)
                .with_ansi(false)
                .init();
            Some(guard)
        }
        None => {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_target(false)
                .init();
            None
        }
    };

    let config = if cli.no_config {
        ConfigLoader::load_defaults()
    } else {
        ConfigLoader::load(cli.config.as_ref()).map_err(|e| anyhow::anyhow!("{}", e))?
    };
    report_config_issues(&config)?;

    info!("starting crossbar");

    // === Dependency injection ===
    let store = Arc::new(InMemorySessionStore::new());
    let registry = Arc::new(BackendToolRegistry::new());
    let hub = BotHub::new(registry.clone());
    let llm = Arc::new(
        ChatCompletionsClient::new(config.llm_settings())
            .map_err(|e| anyhow::anyhow!("failed to build LLM client: {}", e))?,
    );
    let logger: Arc<dyn ConversationLogger> = match &config.log.transcript_path {
        Some(path) => match JsonlConversationLogger::new(path) {
            Some(l) => Arc::new(l),
            None => {
                warn!("transcript logging disabled: could not open {}", path);
                Arc::new(NoConversationLogger)
            }
        },
        None => Arc::new(NoConversationLogger),
    };

    let use_case = Arc::new(ProcessMessageUseCase::new(
        store.clone(),
        registry.clone(),
        llm,
        hub.clone(),
        logger,
        Arc::new(GatewayStats::new()),
        config.execution_params(),
    ));

    let shutdown = CancellationToken::new();

    // background: idle eviction
    IdleSweeper::new(store.clone(), config.idle_eviction(), config.sweep_period())
        .spawn(shutdown.clone());

    // background: bot hub listener
    let bot_listener = tokio::net::TcpListener::bind(&config.server.bots_bind)
        .await
        .with_context(|| format!("failed to bind bot hub on {}", config.server.bots_bind))?;
    tokio::spawn(hub.clone().run(bot_listener, shutdown.clone()));

    if cli.repl {
        let repl = GatewayRepl::new(use_case);
        let result = repl.run().await;
        shutdown.cancel();
        result.map_err(|e| anyhow::anyhow!("repl error: {}", e))?;
        return Ok(());
    }

    let telegram = build_telegram(&config)?;
    let state = AppState {
        use_case,
        telegram,
        api_keys: config.auth.api_keys.clone(),
    };

    let served = http::run(state, &config.server.http_bind).await;
    shutdown.cancel();
    served
}

fn report_config_issues(config: &FileConfig) -> Result<()> {
    let issues = config.validate();
    let mut fatal = false;
    for issue in &issues {
        match issue.severity {
            Severity::Warning => warn!("config: {}", issue.message),
            Severity::Error => {
                error!("config: {}", issue.message);
                fatal = true;
            }
        }
    }
    if fatal {
        bail!("configuration errors prevent startup");
    }
    Ok(())
}

fn build_telegram(config: &FileConfig) -> Result<Option<TelegramContext>> {
    if !config.telegram.enabled {
        return Ok(None);
    }
    let api = TelegramApi::new(&config.telegram.bot_token, &config.telegram.api_base)
        .map_err(|e| anyhow::anyhow!("failed to build Telegram client: {}", e))?;
    info!("telegram transport enabled");
    Ok(Some(TelegramContext {
        delivery: Arc::new(api),
        webhook_secret: config.telegram.webhook_secret.clone(),
    }))
}
