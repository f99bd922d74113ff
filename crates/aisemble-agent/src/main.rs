//! # aisemble-agent
//!
//! AIsemble server binary — wires together all crates and starts the
//! HTTP server.

#![deny(unsafe_code)]

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use aisemble_llm::{OpenAiConfig, OpenAiProvider, Provider};
use aisemble_runtime::{ChatOrchestrator, SessionService, TranscriptCache};
use aisemble_server::{
    AisembleServer, AppState, Authenticator, ServerConfig, ShutdownCoordinator, metrics,
};
use aisemble_settings::{LogFormat, Settings};
use aisemble_store::{ChatStore, PoolConfig};
use aisemble_youtube::{InnerTubeClient, InnerTubeConfig};

/// AIsemble server.
#[derive(Parser, Debug)]
#[command(name = "aisemble-agent", about = "AIsemble chat server")]
struct Cli {
    /// Path to the settings file (defaults to `~/.aisemble/settings.json`).
    #[arg(long)]
    config: Option<PathBuf>,

    /// Path to the `SQLite` database (defaults to `~/.aisemble/aisemble.db`).
    #[arg(long)]
    db: Option<PathBuf>,

    /// Host to bind (overrides settings).
    #[arg(long)]
    host: Option<String>,

    /// Port to bind (overrides settings; 0 for auto-assign).
    #[arg(long)]
    port: Option<u16>,

    /// Log output format (overrides settings).
    #[arg(long, value_parser = ["text", "json"])]
    log_format: Option<String>,
}

impl Cli {
    fn default_db_path() -> PathBuf {
        let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
        PathBuf::from(home).join(".aisemble").join("aisemble.db")
    }
}

fn ensure_parent_dir(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
    }
    Ok(())
}

/// Apply CLI overrides on top of loaded settings.
fn apply_cli_overrides(settings: &mut Settings, args: &Cli) {
    if let Some(host) = &args.host {
        settings.server.host.clone_from(host);
    }
    if let Some(port) = args.port {
        settings.server.port = port;
    }
    match args.log_format.as_deref() {
        Some("json") => settings.logging.format = LogFormat::Json,
        Some("text") => settings.logging.format = LogFormat::Text,
        _ => {}
    }
}

/// Resolve the database path: CLI flag, then settings, then the default.
fn resolve_db_path(cli_db: Option<PathBuf>, settings: &Settings) -> PathBuf {
    cli_db
        .or_else(|| settings.database.path.clone().map(PathBuf::from))
        .unwrap_or_else(Cli::default_db_path)
}

fn init_logging(settings: &Settings) {
    // Settings provide the default filter; RUST_LOG wins when set.
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&settings.logging.level));
    let registry = tracing_subscriber::registry().with(filter);
    match settings.logging.format {
        LogFormat::Json => registry
            .with(tracing_subscriber::fmt::layer().json())
            .init(),
        LogFormat::Text => registry.with(tracing_subscriber::fmt::layer()).init(),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Cli::parse();

    // Settings first: the database path and log format both come from them.
    let settings_path = args
        .config
        .clone()
        .unwrap_or_else(aisemble_settings::settings_path);
    let mut settings = aisemble_settings::load_settings_from_path(&settings_path)
        .with_context(|| format!("Failed to load settings from {}", settings_path.display()))?;
    apply_cli_overrides(&mut settings, &args);

    anyhow::ensure!(
        !settings.auth.jwt_secret.is_empty(),
        "auth.jwtSecret is not configured (set AISEMBLE_JWT_SECRET or add it to {})",
        settings_path.display()
    );

    let db_path = resolve_db_path(args.db.clone(), &settings);
    ensure_parent_dir(&db_path)?;
    let store = Arc::new(
        ChatStore::open_file(&db_path, &PoolConfig::default())
            .context("Failed to open database")?,
    );

    init_logging(&settings);
    tracing::info!(db = %db_path.display(), "database ready");

    if settings.llm.api_key.is_empty() {
        tracing::warn!("llm.apiKey is empty; model requests will fail until it is set");
    }

    // Services are constructed once here and injected everywhere.
    let platform = Arc::new(InnerTubeClient::new(InnerTubeConfig {
        base_url: settings.youtube.base_url.clone(),
        lang: settings.youtube.lang.clone(),
        region: settings.youtube.region.clone(),
        ..InnerTubeConfig::default()
    }));
    let provider: Arc<dyn Provider> = Arc::new(OpenAiProvider::new(OpenAiConfig {
        base_url: settings.llm.base_url.clone(),
        api_key: settings.llm.api_key.clone(),
        model: settings.llm.model.clone(),
        temperature: settings.llm.temperature,
        max_tokens: settings.llm.max_tokens,
    }));
    let cache = Arc::new(TranscriptCache::new(
        Arc::clone(&store),
        Arc::clone(&platform),
    ));
    let sessions = Arc::new(SessionService::new(Arc::clone(&store)));
    let orchestrator = Arc::new(ChatOrchestrator::new(
        provider,
        Arc::clone(&store),
        cache,
        Arc::clone(&sessions),
    ));

    let metrics_handle = metrics::install_recorder();
    let shutdown = Arc::new(ShutdownCoordinator::new());

    let state = AppState {
        orchestrator,
        sessions,
        store,
        platform,
        auth: Arc::new(Authenticator::new(&settings.auth.jwt_secret)),
        metrics: metrics_handle,
        shutdown: Arc::clone(&shutdown),
    };
    let config = ServerConfig {
        host: settings.server.host.clone(),
        port: settings.server.port,
        ..ServerConfig::default()
    };
    let shutdown_timeout = Duration::from_secs(config.shutdown_timeout_secs);

    let server = AisembleServer::new(config, state);
    let (addr, handle) = server.listen().await.context("Failed to bind server")?;
    tracing::info!(model = %settings.llm.model, "AIsemble agent listening on http://{addr}");

    // Wait for shutdown signal
    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for ctrl-c")?;

    tracing::info!("Shutting down...");
    shutdown
        .graceful_shutdown(vec![handle], Some(shutdown_timeout))
        .await;
    tracing::info!("Shutdown complete");
    Ok(())
}
