//! # Graceful Shutdown
//!
//! On SIGINT or SIGTERM the listener stops accepting connections and
//! in-flight requests get the grace period to finish. After that the server
//! stops waiting on them; they are dropped when the runtime exits.

use std::future::Future;
use std::net::SocketAddr;
use std::time::Duration;

use anyhow::Context;
use axum::Router;
use tokio::net::TcpListener;
use tokio::sync::watch;

/// Resolves on the first SIGINT or SIGTERM.
pub async fn signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for SIGINT");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => tracing::info!(signal = "SIGINT", "shutting down server"),
        () = terminate => tracing::info!(signal = "SIGTERM", "shutting down server"),
    }
}

/// Serve `app` until `shutdown` resolves, then drain for at most `grace`.
pub async fn serve_until<F>(
    listener: TcpListener,
    app: Router,
    shutdown: F,
    grace: Duration,
) -> anyhow::Result<()>
where
    F: Future<Output = ()> + Send,
{
    let (stop_tx, mut stop_rx) = watch::channel(false);
    let mut server = tokio::spawn(async move {
        axum::serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(async move {
            let _ = stop_rx.changed().await;
        })
        .await
    });

    tokio::select! {
        finished = &mut server => {
            finished.context("server task failed")?.context("server error")?;
            return Ok(());
        }
        () = shutdown => {}
    }

    let _ = stop_tx.send(true);
    match tokio::time::timeout(grace, &mut server).await {
        Ok(finished) => {
            finished.context("server task failed")?.context("server error")?;
            tracing::info!("in-flight requests completed");
        }
        Err(_) => {
            tracing::warn!(grace_secs = grace.as_secs(), "grace period elapsed, abandoning open connections");
            server.abort();
        }
    }
    Ok(())
}
