//! # estate-api: Binary Entry Point
//!
//! Parses configuration, picks a storage backend, starts the rate limiter
//! sweep and serves until SIGINT or SIGTERM. Shutdown then waits, within
//! the grace period, for background tasks before stopping the sweep.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing_subscriber::EnvFilter;

use estate_api::config::{Config, LogFormat};
use estate_api::db::{self, PgStore};
use estate_api::notify::{LogNotifier, Notifier, WebhookNotifier};
use estate_api::store::memory::MemoryStore;
use estate_api::store::Models;
use estate_api::{shutdown, AppState};

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    match format {
        LogFormat::Json => builder.json().init(),
        LogFormat::Pretty => builder.pretty().init(),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::parse();
    init_tracing(config.log_format);
    tracing::debug!(?config, "configuration loaded");

    let models = match &config.database_url {
        Some(url) => {
            let pool = db::init_pool(url, config.db_max_open_conns, config.db_timeout())
                .await
                .context("connecting to database")?;
            tracing::info!("database connection pool established");
            Models::postgres(PgStore::new(pool, config.db_timeout()))
        }
        None => {
            tracing::warn!("no database configured, keeping state in memory");
            Models::memory(Arc::new(MemoryStore::new()))
        }
    };

    let notifier: Arc<dyn Notifier> = match &config.notify_webhook_url {
        Some(url) => Arc::new(WebhookNotifier::new(url.clone()).context("building notifier")?),
        None => Arc::new(LogNotifier),
    };

    let state = AppState::new(config, models, notifier);

    let (stop_sweep, sweep_rx) = watch::channel(false);
    let sweeper = state
        .limiter
        .enabled()
        .then(|| state.limiter.spawn_sweeper(sweep_rx));

    let addr = SocketAddr::from(([0, 0, 0, 0], state.config.port));
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding {addr}"))?;
    tracing::info!(
        %addr,
        env = state.config.environment.as_str(),
        upload_dir = %state.config.upload_dir.display(),
        "starting server"
    );

    let grace = state.config.shutdown_grace();
    let background = state.background.clone();
    shutdown::serve_until(listener, estate_api::app(state), shutdown::signal(), grace).await?;

    tracing::info!(
        outstanding = background.outstanding(),
        "completing background tasks"
    );
    if !background.wait(grace).await {
        tracing::warn!(
            outstanding = background.outstanding(),
            "background tasks still running at exit"
        );
    }

    let _ = stop_sweep.send(true);
    if let Some(sweeper) = sweeper {
        let _ = sweeper.await;
    }

    tracing::info!(%addr, "stopped server");
    Ok(())
}
