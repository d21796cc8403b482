//! `overwatch serve`: HTTP API plus the scan scheduler.

use std::sync::Arc;

use tokio::sync::broadcast;

use overwatch_core::config::AppConfig;
use overwatch_core::pipeline::PipelineExecutor;
use overwatch_core::scheduler::ScanScheduler;
use overwatch_core::store::JobRunStore;
use overwatch_plugins::factory::build_toolset;

use crate::commands::cli::ServeArgs;
use crate::error::CliError;
use crate::http::{start_server, AppState};

pub async fn handle_serve(args: ServeArgs, cfg: Arc<AppConfig>) -> Result<(), CliError> {
    let host = args.host.unwrap_or_else(|| cfg.http_server.host.clone());
    let port = args.port.unwrap_or(cfg.http_server.port);

    let tools = build_toolset(&cfg.tools);
    let store = JobRunStore::new();
    let executor = PipelineExecutor::new(store.clone(), tools, cfg.clone());
    let scheduler = ScanScheduler::new(store, executor, cfg.clone());

    let dispatch_loop = scheduler.spawn_loop();

    let (shutdown_tx, _) = broadcast::channel(1);
    let state = AppState::new(scheduler, cfg, shutdown_tx);

    let result = start_server(host, port, state).await;
    dispatch_loop.abort();
    result
}
