//! HTTP server lifecycle.

use std::fs;
use std::net::SocketAddr;
use std::path::PathBuf;

use axum::middleware;
use tokio::signal;
use tracing::{info, warn};

use crate::error::CliError;

use super::{
    middleware::{create_middleware_stack, request_logger},
    routes::create_router,
    AppState,
};

/// Directory holding the server state file.
fn get_servers_dir() -> Result<PathBuf, CliError> {
    let home = dirs::home_dir()
        .ok_or_else(|| CliError::Server("cannot find home directory".to_string()))?;
    let servers_dir = home.join(".overwatch").join("servers");
    fs::create_dir_all(&servers_dir)
        .map_err(|e| CliError::Server(format!("failed to create servers directory: {e}")))?;
    Ok(servers_dir)
}

/// Record where the server is reachable so local tooling can find it.
fn write_state_file(host: &str, port: u16) -> Result<(), CliError> {
    let state_file = get_servers_dir()?.join("overwatch.state");

    let state = serde_json::json!({
        "port": port,
        "pid": std::process::id(),
        "url": format!("http://{host}:{port}"),
        "started_at": chrono::Utc::now().to_rfc3339(),
    });
    let body = serde_json::to_string_pretty(&state)
        .map_err(|e| CliError::Server(format!("failed to encode state file: {e}")))?;
    fs::write(&state_file, body)
        .map_err(|e| CliError::Server(format!("failed to write state file: {e}")))?;

    info!("state file written to {}", state_file.display());
    Ok(())
}

/// Serve until ctrl-c, SIGTERM, or a shutdown broadcast.
pub async fn start_server(host: String, port: u16, state: AppState) -> Result<(), CliError> {
    let router = create_router(state.clone());
    let app = router
        .layer(middleware::from_fn(request_logger))
        .layer(create_middleware_stack());

    let addr: SocketAddr = format!("{host}:{port}")
        .parse()
        .map_err(|e| CliError::Server(format!("invalid bind address: {e}")))?;

    write_state_file(&host, port)?;

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("http server listening on http://{addr}");

    let mut shutdown_rx = state.shutdown_tx.subscribe();

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            tokio::select! {
                _ = signal::ctrl_c() => {
                    info!("received ctrl-c");
                }
                _ = shutdown_rx.recv() => {
                    info!("received shutdown signal");
                }
                _ = wait_for_sigterm() => {
                    info!("received SIGTERM");
                }
            }
            info!("starting graceful shutdown");
        })
        .await
        .map_err(|e| CliError::Server(e.to_string()))?;

    info!("server shutdown complete");

    let state_file = get_servers_dir()?.join("overwatch.state");
    if let Err(e) = fs::remove_file(&state_file) {
        warn!("failed to remove state file: {e}");
    }

    Ok(())
}

#[cfg(unix)]
async fn wait_for_sigterm() {
    use tokio::signal::unix::{signal, SignalKind};

    match signal(SignalKind::terminate()) {
        Ok(mut sigterm) => {
            sigterm.recv().await;
        }
        Err(e) => {
            warn!("failed to install SIGTERM handler: {e}");
            std::future::pending::<()>().await;
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_sigterm() {
    std::future::pending::<()>().await
}
