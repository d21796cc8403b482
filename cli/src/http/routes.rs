//! HTTP route handlers.

use axum::{
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Json, Router,
};
use serde::Deserialize;

use overwatch_core::artifacts::RunArtifacts;
use overwatch_core::model::{LaunchMode, Progress, Project};
use overwatch_core::scheduler::{CancelOutcome, SubmitRequest};

use crate::http::{
    models::*,
    state::AppState,
    validation::{build_proxy, credentials_from, parse_targets, validate_project_name},
};

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/api/v1/scans", get(list_scans).post(create_scan))
        .route("/api/v1/scans/:slug", put(update_scan).delete(delete_scan))
        .route("/api/v1/scans/:slug/rescan", post(rescan))
        .route(
            "/api/v1/scans/:slug/runs/:run_id/download",
            get(download_report),
        )
        .route("/api/v1/runs/:run_id/cancel", post(cancel_run))
        .route("/health", get(health))
        .with_state(state)
}

fn parse_mode(mode: &str) -> Result<LaunchMode, HttpServerError> {
    match mode {
        "run_now" => Ok(LaunchMode::RunNow),
        "queue" => Ok(LaunchMode::Queue),
        "schedule" => Ok(LaunchMode::Schedule),
        other => Err(HttpServerError::InvalidRequest(format!(
            "unknown start_mode: {other}"
        ))),
    }
}

/// GET /api/v1/scans
async fn list_scans(State(state): State<AppState>) -> Result<Json<Vec<ScanListItem>>, HttpServerError> {
    state.count_request("/api/v1/scans");

    let rows = state.store().list_projects().await;
    let mut items = Vec::with_capacity(rows.len());
    for (index, (project, latest_run)) in rows.into_iter().enumerate() {
        let mut item = ScanListItem {
            slug: project.slug.clone(),
            index: index + 1,
            name: project.name.clone(),
            targets_count: project.targets.len(),
            progress: ProgressView::from(&Progress::default()),
            ran_at: None,
            status: "idle".to_string(),
            status_message: String::new(),
            report: None,
            run_id: None,
            locked: project.locked,
            is_running: false,
        };
        if let Some(run) = &latest_run {
            item = item.with_run(run);
        }
        // A pending job has no run record yet; surface it over the last
        // terminal run's state.
        if let Some(pending) = state.scheduler.pending_for(&project.slug).await {
            item.run_id = Some(pending.run_id.clone());
            item.status = match pending.mode {
                LaunchMode::Schedule => "scheduled".to_string(),
                _ => "queued".to_string(),
            };
            item.status_message = match pending.scheduled_for {
                Some(at) => format!("scheduled for {}", at.format("%Y-%m-%d %H:%M UTC")),
                None => format!("queue position {}", pending.queue_position + 1),
            };
            item.progress = ProgressView::from(&Progress::default());
            item.report = None;
        }
        items.push(item);
    }
    Ok(Json(items))
}

/// POST /api/v1/scans
async fn create_scan(
    State(state): State<AppState>,
    Json(req): Json<CreateScanRequest>,
) -> Result<Json<CreateScanResponse>, HttpServerError> {
    state.count_request("/api/v1/scans");

    let slug = validate_project_name(&req.project_name)?;
    let targets = parse_targets(&req.targets)?;
    let (proxy, credentials) = build_proxy(&req)?;
    let mode = parse_mode(&req.start_mode)?;

    // Everything validated before the project record exists.
    let project = Project::new(req.project_name.trim(), targets, proxy);
    state
        .store()
        .create_project(project)
        .await
        .inspect_err(|_| state.count_error())?;

    let descriptor = match state
        .scheduler
        .submit(SubmitRequest {
            slug: slug.clone(),
            mode,
            scheduled_for: req.scheduled_for,
            skip_subdomain_enum: req.skip_subdomain_enum,
            proxy_credentials: credentials,
        })
        .await
    {
        Ok(descriptor) => descriptor,
        Err(e) => {
            // A rejected submission leaves nothing behind; the project
            // record exists only once a job was accepted for it.
            let _ = state.store().delete_project(&slug).await;
            state.count_error();
            return Err(e.into());
        }
    };

    Ok(Json(CreateScanResponse {
        success: true,
        slug,
        run_id: descriptor.run_id,
        scheduled_for: descriptor.scheduled_for,
        queue_position: descriptor.queue_position,
    }))
}

/// PUT /api/v1/scans/{slug}
async fn update_scan(
    State(state): State<AppState>,
    Path(slug): Path<String>,
    Json(req): Json<CreateScanRequest>,
) -> Result<Json<MessageResponse>, HttpServerError> {
    state.count_request("/api/v1/scans/{slug}");

    validate_project_name(&req.project_name)?;
    let targets = parse_targets(&req.targets)?;
    let (proxy, _credentials) = build_proxy(&req)?;

    state
        .store()
        .update_project(&slug, req.project_name.trim(), targets, proxy)
        .await
        .inspect_err(|_| state.count_error())?;

    Ok(Json(MessageResponse {
        success: true,
        message: format!("project '{slug}' updated"),
    }))
}

/// DELETE /api/v1/scans/{slug}
async fn delete_scan(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> Result<Json<MessageResponse>, HttpServerError> {
    state.count_request("/api/v1/scans/{slug}");

    // Goes through the scheduler so a project with a pending (not yet
    // dispatched, hence unlocked) job is refused too.
    state
        .scheduler
        .delete_project(&slug)
        .await
        .inspect_err(|_| state.count_error())?;

    // Artifacts go with the record. A missing directory is fine.
    let project_dir = std::path::Path::new(&state.config.data_dir)
        .join("projects")
        .join(&slug);
    if let Err(e) = tokio::fs::remove_dir_all(&project_dir).await {
        if e.kind() != std::io::ErrorKind::NotFound {
            tracing::warn!(slug = %slug, error = %e, "artifact cleanup failed");
        }
    }

    Ok(Json(MessageResponse {
        success: true,
        message: format!("project '{slug}' deleted"),
    }))
}

/// POST /api/v1/scans/{slug}/rescan
async fn rescan(
    State(state): State<AppState>,
    Path(slug): Path<String>,
    body: Option<Json<RescanRequest>>,
) -> Result<Json<CreateScanResponse>, HttpServerError> {
    state.count_request("/api/v1/scans/{slug}/rescan");

    let req = body.map(|Json(r)| r).unwrap_or_default();
    let mode = parse_mode(&req.start_mode)?;
    // Stored metadata only says whether the last submission was
    // authenticated; without resupplied credentials the proxy degrades to
    // unauthenticated for this run.
    let credentials = credentials_from(req.proxy_user.as_deref(), req.proxy_pass.as_deref());

    let descriptor = state
        .scheduler
        .submit(SubmitRequest {
            slug: slug.clone(),
            mode,
            scheduled_for: req.scheduled_for,
            skip_subdomain_enum: req.skip_subdomain_enum,
            proxy_credentials: credentials,
        })
        .await
        .inspect_err(|_| state.count_error())?;

    Ok(Json(CreateScanResponse {
        success: true,
        slug,
        run_id: descriptor.run_id,
        scheduled_for: descriptor.scheduled_for,
        queue_position: descriptor.queue_position,
    }))
}

/// POST /api/v1/runs/{run_id}/cancel
async fn cancel_run(
    State(state): State<AppState>,
    Path(run_id): Path<String>,
) -> Result<Json<CancelResponse>, HttpServerError> {
    state.count_request("/api/v1/runs/{run_id}/cancel");

    let outcome = state
        .scheduler
        .cancel(&run_id)
        .await
        .inspect_err(|_| state.count_error())?;

    let outcome = match outcome {
        CancelOutcome::PendingRemoved => "pending_removed",
        CancelOutcome::Signalled => "signalled",
        CancelOutcome::AlreadyTerminal => "already_terminal",
    };
    Ok(Json(CancelResponse {
        success: true,
        outcome: outcome.to_string(),
    }))
}

#[derive(Debug, Deserialize)]
struct DownloadQuery {
    #[serde(default = "default_format")]
    format: String,
}

fn default_format() -> String {
    "html".to_string()
}

/// GET /api/v1/scans/{slug}/runs/{run_id}/download?format=html|json|csv
async fn download_report(
    State(state): State<AppState>,
    Path((slug, run_id)): Path<(String, String)>,
    Query(q): Query<DownloadQuery>,
) -> Result<Response, HttpServerError> {
    state.count_request("/api/v1/scans/{slug}/runs/{run_id}/download");

    let run = state.store().get_run(&slug, &run_id).await?;
    let artifacts = RunArtifacts::new(run.artifact_dir.clone());

    let (path, content_type, ext) = match q.format.as_str() {
        "html" => (artifacts.report_html_path(), "text/html; charset=utf-8", "html"),
        "json" => (artifacts.report_json_path(), "application/json", "json"),
        "csv" => (artifacts.report_csv_path(), "text/csv; charset=utf-8", "csv"),
        other => {
            return Err(HttpServerError::InvalidRequest(format!(
                "unknown format: {other}"
            )))
        }
    };

    let body = tokio::fs::read(&path).await.map_err(|_| {
        HttpServerError::NotFound(format!("report not available for run '{run_id}'"))
    })?;

    let disposition = format!("attachment; filename=\"{slug}-{run_id}.{ext}\"");
    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, content_type.to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        body,
    )
        .into_response())
}

/// GET /health
async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let (uptime_seconds, requests_total) = match state.stats.read() {
        Ok(stats) => (stats.uptime_seconds(), stats.requests_total),
        Err(_) => (0.0, 0),
    };
    Json(HealthResponse {
        status: "ok".to_string(),
        uptime_seconds,
        active_runs: state.scheduler.active_count().await,
        queued_jobs: state.scheduler.queued_count().await,
        requests_total,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use overwatch_core::config::AppConfig;
    use overwatch_core::error::ToolError;
    use overwatch_core::pipeline::PipelineExecutor;
    use overwatch_core::scheduler::ScanScheduler;
    use overwatch_core::store::JobRunStore;
    use overwatch_core::tools::{ToolHandle, ToolInvocation, ToolOutput, ToolPlugin, ToolSet};
    use std::sync::Arc;
    use tokio::sync::broadcast;

    struct StubTool(&'static str);

    #[async_trait]
    impl ToolPlugin for StubTool {
        fn name(&self) -> &str {
            self.0
        }

        fn is_available(&self) -> bool {
            true
        }

        async fn invoke(&self, req: ToolInvocation) -> Result<ToolOutput, ToolError> {
            Ok(ToolOutput {
                artifact: req.output_dir.join(format!("{}.txt", self.0)),
                lines: vec![],
                exit_code: 0,
                duration_ms: 1,
            })
        }
    }

    fn stub(name: &'static str) -> ToolHandle {
        Arc::new(StubTool(name))
    }

    fn test_state() -> (AppState, tempfile::TempDir) {
        let tmp = tempfile::tempdir().unwrap();
        let mut cfg = AppConfig::default();
        cfg.data_dir = tmp.path().to_string_lossy().to_string();
        let cfg = Arc::new(cfg);

        let tools = ToolSet {
            discovery: vec![stub("subfinder"), stub("assetfinder")],
            resolver: stub("dnsx"),
            prober: stub("httpx"),
            port_scanner: stub("naabu"),
            screenshotter: stub("gowitness"),
            vuln_scanner: stub("nuclei"),
        };
        let store = JobRunStore::new();
        let executor = PipelineExecutor::new(store.clone(), tools, cfg.clone());
        let scheduler = ScanScheduler::new(store, executor, cfg.clone());
        let (shutdown_tx, _) = broadcast::channel(1);
        (AppState::new(scheduler, cfg, shutdown_tx), tmp)
    }

    fn create_request(name: &str, mode: &str) -> CreateScanRequest {
        serde_json::from_str(&format!(
            r#"{{"project_name":"{name}","targets":"{}.example","start_mode":"{mode}"}}"#,
            name.to_lowercase()
        ))
        .unwrap()
    }

    #[tokio::test]
    async fn test_create_then_list() {
        let (state, _tmp) = test_state();

        let resp = create_scan(State(state.clone()), Json(create_request("Acme", "queue")))
            .await
            .unwrap();
        assert!(resp.0.success);
        assert_eq!(resp.0.slug, "acme");

        let items = list_scans(State(state)).await.unwrap().0;
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].slug, "acme");
        assert_eq!(items[0].index, 1);
        assert_eq!(items[0].status, "queued");
    }

    #[tokio::test]
    async fn test_duplicate_create_conflicts() {
        let (state, _tmp) = test_state();
        create_scan(State(state.clone()), Json(create_request("Acme", "queue")))
            .await
            .unwrap();
        let err = create_scan(State(state), Json(create_request("Acme", "queue")))
            .await
            .unwrap_err();
        assert!(matches!(err, HttpServerError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_invalid_start_mode_rejected() {
        let (state, _tmp) = test_state();
        let err = create_scan(State(state), Json(create_request("Acme", "later")))
            .await
            .unwrap_err();
        assert!(matches!(err, HttpServerError::InvalidRequest(_)));
    }

    #[tokio::test]
    async fn test_schedule_requires_future_time() {
        let (state, _tmp) = test_state();
        let mut req = create_request("Acme", "schedule");
        req.scheduled_for = Some(chrono::Utc::now() - chrono::Duration::hours(1));
        let err = create_scan(State(state), Json(req)).await.unwrap_err();
        assert!(matches!(err, HttpServerError::InvalidRequest(_)));
    }

    #[tokio::test]
    async fn test_rejected_schedule_leaves_no_project_behind() {
        let (state, _tmp) = test_state();

        let mut req = create_request("Acme", "schedule");
        req.scheduled_for = Some(chrono::Utc::now() - chrono::Duration::hours(1));
        let err = create_scan(State(state.clone()), Json(req)).await.unwrap_err();
        assert!(matches!(err, HttpServerError::InvalidRequest(_)));
        assert!(list_scans(State(state.clone())).await.unwrap().0.is_empty());

        // A corrected retry must not hit a duplicate-slug conflict.
        let mut req = create_request("Acme", "schedule");
        req.scheduled_for = Some(chrono::Utc::now() + chrono::Duration::hours(1));
        let resp = create_scan(State(state.clone()), Json(req)).await.unwrap();
        assert!(resp.0.success);

        let items = list_scans(State(state)).await.unwrap().0;
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].status, "scheduled");
    }

    #[tokio::test]
    async fn test_delete_with_pending_job_is_conflict() {
        let (state, _tmp) = test_state();
        // Occupy the slot so acme's job stays pending and unlocked.
        create_scan(State(state.clone()), Json(create_request("Gate", "run_now")))
            .await
            .unwrap();
        create_scan(State(state.clone()), Json(create_request("Acme", "queue")))
            .await
            .unwrap();

        let err = delete_scan(State(state.clone()), Path("acme".to_string()))
            .await
            .unwrap_err();
        assert!(matches!(err, HttpServerError::Conflict(_)));
        assert!(state.scheduler.pending_for("acme").await.is_some());
    }

    #[tokio::test]
    async fn test_cancel_unknown_run_is_404() {
        let (state, _tmp) = test_state();
        let err = cancel_run(State(state), Path("20990101-000000".to_string()))
            .await
            .unwrap_err();
        assert!(matches!(err, HttpServerError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_cancel_pending_is_idempotent_shape() {
        let (state, _tmp) = test_state();
        // Occupy the slot so the next submission stays queued.
        create_scan(State(state.clone()), Json(create_request("Gate", "run_now")))
            .await
            .unwrap();
        let resp = create_scan(State(state.clone()), Json(create_request("Acme", "queue")))
            .await
            .unwrap();

        let first = cancel_run(State(state.clone()), Path(resp.0.run_id.clone()))
            .await
            .unwrap();
        assert_eq!(first.0.outcome, "pending_removed");

        // The job is gone and no run record was ever created.
        let err = cancel_run(State(state), Path(resp.0.run_id))
            .await
            .unwrap_err();
        assert!(matches!(err, HttpServerError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_delete_then_list_empty() {
        let (state, _tmp) = test_state();
        create_scan(State(state.clone()), Json(create_request("Acme", "queue")))
            .await
            .unwrap();
        // Remove the pending job first so the project is deletable.
        let pending = state.scheduler.pending_for("acme").await.unwrap();
        state.scheduler.cancel(&pending.run_id).await.unwrap();

        delete_scan(State(state.clone()), Path("acme".to_string()))
            .await
            .unwrap();
        let items = list_scans(State(state)).await.unwrap().0;
        assert!(items.is_empty());
    }

    #[tokio::test]
    async fn test_rescan_missing_project_is_404() {
        let (state, _tmp) = test_state();
        let err = rescan(State(state), Path("ghost".to_string()), None)
            .await
            .unwrap_err();
        assert!(matches!(err, HttpServerError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_health_reports_counters() {
        let (state, _tmp) = test_state();
        let resp = health(State(state)).await;
        assert_eq!(resp.0.status, "ok");
        assert_eq!(resp.0.active_runs, 0);
    }
}
