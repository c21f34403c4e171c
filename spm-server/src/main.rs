//! spm-server - Stash playlist manager backend
//!
//! Serves marker previews, smart playlist compilation and item ratings over
//! HTTP for the browser UI.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use spm_common::config::{
    default_config_path, load_toml_config, CacheBackend, ConfigOverrides, ResolvedConfig,
};
use spm_common::db::init_database;
use spm_core::{FileCachePort, MatchCache, MemoryCachePort, StashClient};
use spm_server::{build_router, log_directives, AppState};
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, reload, util::SubscriberInitExt, EnvFilter};

/// Command-line arguments for spm-server
#[derive(Parser, Debug)]
#[command(name = "spm-server")]
#[command(about = "Smart playlist backend for Stash")]
#[command(version)]
struct Args {
    /// TOML configuration file
    #[arg(short, long, env = "SPM_CONFIG")]
    config: Option<PathBuf>,

    /// Folder holding the database and file cache
    #[arg(short, long)]
    root_folder: Option<PathBuf>,

    /// Stash base URL, e.g. http://localhost:9999
    #[arg(long)]
    stash_url: Option<String>,

    /// Stash API key
    #[arg(long)]
    stash_api_key: Option<String>,

    /// Port to listen on
    #[arg(short, long)]
    port: Option<u16>,

    /// Default log level when RUST_LOG is unset
    #[arg(long)]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Installed before config loading so its warnings are not lost; the level
    // is narrowed to the resolved config once that is known
    let env_filter = EnvFilter::try_from_default_env().ok();
    let filter_from_env = env_filter.is_some();
    let initial_filter = env_filter.unwrap_or_else(|| {
        EnvFilter::new(log_directives(args.log_level.as_deref().unwrap_or("info")))
    });
    let (filter_layer, filter_handle) = reload::Layer::new(initial_filter);
    tracing_subscriber::registry()
        .with(filter_layer)
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config_path = args.config.clone().unwrap_or_else(default_config_path);
    let config_found = config_path.exists();
    let toml_config = load_toml_config(&config_path)
        .with_context(|| format!("Failed to load {}", config_path.display()))?;

    let config = ResolvedConfig::resolve(
        ConfigOverrides {
            root_folder: args.root_folder,
            stash_url: args.stash_url,
            stash_api_key: args.stash_api_key,
            port: args.port,
            log_level: args.log_level,
        },
        toml_config,
    )
    .context("Invalid configuration")?;

    if !filter_from_env {
        if let Err(e) = filter_handle.reload(EnvFilter::new(log_directives(&config.log_level))) {
            warn!("Failed to apply log level {}: {}", config.log_level, e);
        }
    }

    info!(
        "Starting spm-server v{} on port {}",
        env!("CARGO_PKG_VERSION"),
        config.port
    );
    if config_found {
        info!("Configuration: {}", config_path.display());
    } else {
        warn!("No configuration file at {}, using defaults", config_path.display());
    }
    info!("Root folder: {}", config.root_folder.display());

    let db = init_database(&config.database_path())
        .await
        .context("Failed to initialize database")?;

    let cache = match config.cache.backend {
        CacheBackend::Memory => {
            MatchCache::with_ttl(Arc::new(MemoryCachePort::new()), config.cache.ttl())
        }
        CacheBackend::File => {
            let port = FileCachePort::new(config.cache_dir())
                .context("Failed to create marker cache directory")?;
            info!("Marker cache directory: {}", port.dir().display());
            MatchCache::with_ttl(Arc::new(port), config.cache.ttl())
        }
    };
    info!(
        backend = ?config.cache.backend,
        ttl_minutes = config.cache.ttl_minutes,
        "Marker cache ready"
    );

    let stash = StashClient::new(&config.stash_url, config.stash_api_key.clone())
        .context("Failed to create Stash client")?;
    info!(
        endpoint = stash.endpoint(),
        api_key = config.stash_api_key.is_some(),
        "Stash client ready"
    );

    let app = build_router(AppState::new(db, Arc::new(stash), cache));

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("Failed to bind to address")?;
    info!("Listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shutdown complete");
    Ok(())
}

/// Resolves on Ctrl+C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
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
