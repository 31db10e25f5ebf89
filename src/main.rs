use std::{net::SocketAddr, sync::Arc};

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod cache;
mod config;
mod db;
mod error;
mod handlers;
mod models;
mod monitor;
mod queue;
mod shortcode;
mod store;
#[cfg(test)]
mod test_logs;
mod workers;

use cache::LinkCache;
use config::AppConfig;
use db::SqliteStore;
use monitor::{AvailabilityMonitor, HttpProbe};
use queue::{click_queue, ClickQueue};
use shortcode::LinkAllocator;
use store::LinkStore;
use workers::WorkerPool;

// ── Shared application state ───────────────────────────────────────────────

pub struct AppState {
    pub store: Arc<dyn LinkStore>,
    pub allocator: LinkAllocator,
    pub cache: LinkCache,
    /// Producer half of the click queue. Dropping the last `AppState` closes
    /// the queue and lets the click workers drain.
    pub clicks: ClickQueue,
    pub config: AppConfig,
}

// ── Command line ───────────────────────────────────────────────────────────

/// URL shortener with asynchronous click analytics and destination monitoring
#[derive(Parser, Debug)]
#[command(name = "linkpulse")]
#[command(version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the HTTP server, click workers and URL monitor (default)
    Serve,
    /// Shorten a URL and print the result
    Create {
        /// Long URL to shorten
        #[arg(long)]
        url: String,
    },
    /// Apply database migrations and exit
    Migrate,
}

// ── Entry point ────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env (ignore error if file is absent — env vars may already be set)
    dotenvy::dotenv().ok();

    // Initialise structured logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "linkpulse=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    let config = AppConfig::from_env()?;

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => serve(config).await,
        Command::Create { url } => create(config, &url).await,
        Command::Migrate => {
            open_store(&config).await?;
            println!("Database migrations applied.");
            Ok(())
        }
    }
}

/// Connect to the database and bring the schema up to date.
async fn open_store(config: &AppConfig) -> anyhow::Result<SqliteStore> {
    let store = SqliteStore::connect(&config.database_url)
        .await
        .with_context(|| format!("failed to open database {}", config.database_url))?;
    store.migrate().await.context("failed to apply migrations")?;
    tracing::info!("Database migrations applied");
    Ok(store)
}

async fn create(config: AppConfig, url: &str) -> anyhow::Result<()> {
    let url = url.trim();
    if let Err(msg) = handlers::api::validate_destination(url) {
        anyhow::bail!("invalid URL {url:?}: {msg}");
    }

    let store = Arc::new(open_store(&config).await?);
    let link = LinkAllocator::new(store)
        .create_link(url)
        .await
        .context("failed to create short link")?;

    println!("Short URL created:");
    println!("Code: {}", link.short_code);
    println!("Full URL: {}", config.short_url(&link.short_code));
    Ok(())
}

async fn serve(config: AppConfig) -> anyhow::Result<()> {
    tracing::info!("Starting linkpulse on {}:{}", config.host, config.port);
    tracing::info!("Base URL: {}", config.base_url);

    let store = Arc::new(open_store(&config).await?);

    let cache = LinkCache::new();
    db::warm_cache(store.as_ref(), &cache).await?;

    // ── Background tasks ───────────────────────────────────────────────────
    let (clicks, receiver) = click_queue(config.click_buffer_size);
    let workers = WorkerPool::start(config.click_worker_count, receiver, store.clone());
    tracing::info!(
        "Click queue ready (buffer={}) with {} worker(s)",
        config.click_buffer_size,
        workers.len()
    );

    let probe = HttpProbe::new().context("failed to build HTTP probe client")?;
    let monitor = Arc::new(AvailabilityMonitor::new(
        store.clone(),
        Arc::new(probe),
        config.monitor_interval,
    ))
    .start();

    // ── Router ─────────────────────────────────────────────────────────────
    let bind_addr = format!("{}:{}", config.host, config.port);
    let shutdown_grace = config.shutdown_grace;

    let state = Arc::new(AppState {
        store: store.clone(),
        allocator: LinkAllocator::new(store),
        cache,
        clicks,
        config,
    });
    let app = handlers::router(state);

    // ── Serve ──────────────────────────────────────────────────────────────
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("failed to bind {bind_addr}"))?;
    tracing::info!("Listening on http://{}", listener.local_addr()?);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    // The router (and with it the last click producer) is gone, so the
    // workers only have to drain what is already queued.
    tracing::info!("HTTP server stopped, draining click queue");
    workers.drain(shutdown_grace).await;

    monitor.abort();
    tracing::info!("Shutdown complete");
    Ok(())
}

/// Resolves on Ctrl+C or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
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
        _ = ctrl_c => tracing::info!("Received Ctrl+C, shutting down"),
        _ = terminate => tracing::info!("Received SIGTERM, shutting down"),
    }
}
