//! Chaos Request Service (chaos-rq) - Main entry point
//!
//! Builds the map pool from the configured library, listens for `!chaos`
//! requests in Twitch chat and serves the queue over HTTP.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use chaos_common::config::{resolve_config_path, ChaosConfig, ConfigStore};
use chaos_pool::db::SqliteLibrary;
use chaos_pool::extra_data::InfoDatResolver;
use chaos_pool::playlist::BplistDirectory;
use chaos_pool::{LibrarySource, MapPool, PoolFilter, SongCatalog, StaticLibrary};
use chaos_rq::api::{self, AppContext};
use chaos_rq::chat::TwitchChat;
use chaos_rq::{RequestHandler, SharedState};
use clap::Parser;
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Command-line arguments for chaos-rq
#[derive(Parser, Debug)]
#[command(name = "chaos-rq")]
#[command(about = "Chat request queue for the chaos map pool")]
#[command(version)]
struct Args {
    /// Configuration file (overrides CHAOS_CONFIG)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Port to listen on
    #[arg(short, long, default_value = "5750", env = "CHAOS_RQ_PORT")]
    port: u16,

    /// Do not connect to chat
    #[arg(long)]
    no_chat: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config_store = ConfigStore::new(resolve_config_path(args.config.as_deref()));
    let config = config_store.current();

    let default_filter = format!(
        "chaos_rq={level},chaos_pool={level},chaos_common={level},tower_http=info",
        level = config.logging.level
    );
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!(
        "Starting Chaos Request Service (chaos-rq) v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );
    match config_store.path() {
        Some(path) => info!("Config file: {}", path.display()),
        None => info!("No config file, using defaults"),
    }

    let filter = build_filter(&config).await?;
    let pool = Arc::new(MapPool::new(filter));
    let state = Arc::new(SharedState::new(pool, config_store));

    // Initial build, then optional periodic refresh
    let refresh_state = state.clone();
    tokio::spawn(async move {
        refresh_loop(refresh_state).await;
    });

    if args.no_chat {
        info!("Chat disabled (--no-chat)");
    } else if config.chat.channels.is_empty() {
        warn!("No chat channels configured, chat requests disabled");
    } else {
        let (transport, rx) =
            TwitchChat::connect(&config.chat).context("Failed to start chat connection")?;
        let handler = Arc::new(RequestHandler::new(state.clone(), transport));
        tokio::spawn(handler.run(rx));
    }

    api::serve(AppContext { state }, args.port, shutdown_signal())
        .await
        .context("HTTP server failed")?;

    info!("Server shutdown complete");
    Ok(())
}

/// Assemble the filter from the configured collaborators
async fn build_filter(config: &ChaosConfig) -> Result<PoolFilter> {
    let library: Arc<dyn LibrarySource> = match &config.library.database {
        Some(path) => {
            let library = SqliteLibrary::connect_readonly(path)
                .await
                .with_context(|| format!("Failed to open library database {}", path.display()))?;
            info!("Library database: {}", path.display());
            Arc::new(library)
        }
        None => {
            warn!("No library database configured, pool will be empty");
            Arc::new(StaticLibrary::default())
        }
    };

    let metadata = Arc::new(SongCatalog::from_config(&config.metadata));

    let mut filter =
        PoolFilter::new(library, metadata).with_extra_data(Arc::new(InfoDatResolver::new()));

    if let Some(directory) = &config.playlists.directory {
        info!("Playlist directory: {}", directory.display());
        filter = filter.with_playlists(Arc::new(BplistDirectory::new(directory)));
    }

    Ok(filter)
}

/// Rebuild at startup, then every `refresh_interval_secs` (0 = never)
async fn refresh_loop(state: Arc<SharedState>) {
    loop {
        if let Err(e) = state.rebuild_pool().await {
            error!("Pool rebuild failed: {}", e);
        }

        let interval = state.config.current().pool.refresh_interval_secs;
        if interval == 0 {
            break;
        }
        tokio::time::sleep(Duration::from_secs(interval)).await;
    }
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}
