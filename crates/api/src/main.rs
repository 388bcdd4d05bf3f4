use std::sync::Arc;

use axum::extract::Request;
use axum::ServiceExt;
use tokio::sync::Notify;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use gifspin_api::config::ServerConfig;
use gifspin_api::router::build_app;
use gifspin_api::state::AppState;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    // --- Tracing ---
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "gifspin_api=debug,gifspin_core=debug,tower_http=debug".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // --- Configuration ---
    let config = ServerConfig::from_env();
    tracing::info!(
        listen = %config.listen_addr,
        temp_dir = %config.temp_dir.display(),
        binary = %config.binary_path.display(),
        dispatch_size = config.dispatch_size,
        "Loaded server configuration"
    );

    if let Err(e) = tokio::fs::create_dir_all(&config.temp_dir).await {
        tracing::warn!(error = %e, dir = %config.temp_dir.display(), "Could not create temp directory");
    }

    let shutdown_timeout = config.shutdown_timeout;
    let addr = config.listen_addr;

    // --- Application ---
    let state = AppState::new(config);
    let app = build_app(state.clone());

    // --- Start server ---
    tracing::info!(%addr, "Starting server");
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind to address");

    let stop = Arc::new(Notify::new());
    let mut server = tokio::spawn({
        let stop = Arc::clone(&stop);
        async move {
            axum::serve(listener, ServiceExt::<Request>::into_make_service(app))
                .with_graceful_shutdown(async move { stop.notified().await })
                .await
        }
    });

    tokio::select! {
        () = shutdown_signal() => {}
        result = &mut server => {
            match result {
                Ok(Ok(())) => tracing::warn!("Server exited before any shutdown signal"),
                Ok(Err(e)) => tracing::error!(error = %e, "Server error"),
                Err(e) => tracing::error!(error = %e, "Server task failed"),
            }
            return;
        }
    }

    // --- Graceful shutdown ---
    state.dispatcher.close();
    stop.notify_one();
    tracing::info!(
        grace_ms = shutdown_timeout.as_millis() as u64,
        in_use = state.dispatcher.in_use(),
        "Draining in-flight requests"
    );

    match tokio::time::timeout(shutdown_timeout, &mut server).await {
        Ok(Ok(Ok(()))) => tracing::info!("Graceful shutdown complete"),
        Ok(Ok(Err(e))) => tracing::error!(error = %e, "Server error during shutdown"),
        Ok(Err(e)) => tracing::error!(error = %e, "Server task failed during shutdown"),
        Err(_) => {
            tracing::error!("Shutdown took too long, cancelling remaining work");
            state.root.cancel();
            server.abort();
        }
    }
}

/// Wait for a termination signal to initiate graceful shutdown.
///
/// Handles SIGINT (Ctrl-C) everywhere, plus SIGTERM, SIGHUP and SIGQUIT on
/// Unix, so the server drains whether stopped interactively, by a process
/// manager, or by a closing terminal.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl-C handler");
    };

    #[cfg(unix)]
    let other = async {
        use tokio::signal::unix::{signal, SignalKind};

        let mut terminate = signal(SignalKind::terminate()).expect("Failed to install SIGTERM handler");
        let mut hangup = signal(SignalKind::hangup()).expect("Failed to install SIGHUP handler");
        let mut quit = signal(SignalKind::quit()).expect("Failed to install SIGQUIT handler");

        tokio::select! {
            _ = terminate.recv() => "SIGTERM",
            _ = hangup.recv() => "SIGHUP",
            _ = quit.recv() => "SIGQUIT",
        }
    };

    #[cfg(not(unix))]
    let other = std::future::pending::<&'static str>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received SIGINT (Ctrl-C), starting graceful shutdown");
        }
        name = other => {
            tracing::info!(signal = name, "Received termination signal, starting graceful shutdown");
        }
    }
}
