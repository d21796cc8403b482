//! `overwatch scan`: one-shot run-now scan from the terminal.

use std::sync::Arc;
use std::time::Duration;

use overwatch_core::config::AppConfig;
use overwatch_core::model::{normalize_targets, slugify, LaunchMode, Project, RunState};
use overwatch_core::pipeline::PipelineExecutor;
use overwatch_core::proxy::ProxyMeta;
use overwatch_core::scheduler::{ScanScheduler, SubmitRequest};
use overwatch_core::store::JobRunStore;
use overwatch_plugins::factory::build_toolset;

use crate::commands::cli::ScanArgs;
use crate::error::CliError;

const POLL_INTERVAL: Duration = Duration::from_millis(500);

pub async fn handle_scan(args: ScanArgs, cfg: Arc<AppConfig>) -> Result<i32, CliError> {
    let slug = slugify(&args.name);
    if slug.is_empty() {
        return Err(CliError::Config(
            "project name must contain at least one alphanumeric character".to_string(),
        ));
    }
    let targets = normalize_targets(&args.targets);

    let tools = build_toolset(&cfg.tools);
    let store = JobRunStore::new();
    let executor = PipelineExecutor::new(store.clone(), tools, cfg.clone());
    let scheduler = ScanScheduler::new(store.clone(), executor, cfg.clone());

    store
        .create_project(Project::new(args.name.trim(), targets, ProxyMeta::default()))
        .await?;

    let descriptor = scheduler
        .submit(SubmitRequest {
            slug: slug.clone(),
            mode: LaunchMode::RunNow,
            scheduled_for: None,
            skip_subdomain_enum: args.skip_subdomain_enum,
            proxy_credentials: None,
        })
        .await?;

    println!("run {} started for '{slug}'", descriptor.run_id);

    let mut last_step = 0;
    loop {
        scheduler.tick().await;
        let run = store.get_run(&slug, &descriptor.run_id).await?;

        if run.progress.step != last_step {
            last_step = run.progress.step;
            println!(
                "[{}/{}] {}",
                run.progress.step, run.progress.total, run.progress.label
            );
        }

        if run.state.is_terminal() {
            for warning in &run.warnings {
                eprintln!("warning: {warning}");
            }
            println!("{}: {}", run.state.as_str(), run.status_message);
            if let Some(report) = &run.report_path {
                println!("report: {}", report.display());
            }
            return Ok(match run.state {
                RunState::Succeeded => 0,
                RunState::Cancelled => 2,
                _ => 1,
            });
        }

        tokio::time::sleep(POLL_INTERVAL).await;
    }
}
