//! HTTP API data models.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use overwatch_core::error::ApiError;
use overwatch_core::model::{Progress, Run};

// ============= Scan list =============

#[derive(Debug, Serialize)]
pub struct ProgressView {
    pub step: u8,
    pub total: u8,
    pub percent: u8,
    pub label: String,
}

impl From<&Progress> for ProgressView {
    fn from(p: &Progress) -> Self {
        Self {
            step: p.step,
            total: p.total,
            percent: p.percent(),
            label: p.label.clone(),
        }
    }
}

/// One row of `GET /api/v1/scans`.
#[derive(Debug, Serialize)]
pub struct ScanListItem {
    pub slug: String,
    pub index: usize,
    pub name: String,
    pub targets_count: usize,
    pub progress: ProgressView,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ran_at: Option<DateTime<Utc>>,
    pub status: String,
    pub status_message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub report: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub run_id: Option<String>,
    pub locked: bool,
    pub is_running: bool,
}

impl ScanListItem {
    /// Fold the latest run (if any) into the row.
    pub fn with_run(mut self, run: &Run) -> Self {
        self.progress = ProgressView::from(&run.progress);
        self.ran_at = Some(run.created_at);
        self.status = run.state.as_str().to_string();
        self.status_message = run.status_message.clone();
        self.report = run
            .report_path
            .as_ref()
            .map(|p| p.to_string_lossy().to_string());
        self.run_id = Some(run.run_id.clone());
        self.is_running = !run.state.is_terminal();
        self
    }
}

// ============= Create / update =============

#[derive(Debug, Deserialize)]
pub struct CreateScanRequest {
    pub project_name: String,
    /// Newline-separated seed targets.
    pub targets: String,
    #[serde(default = "default_start_mode")]
    pub start_mode: String,
    #[serde(default)]
    pub scheduled_for: Option<DateTime<Utc>>,
    #[serde(default)]
    pub proxy_enabled: bool,
    #[serde(default = "default_proxy_type")]
    pub proxy_type: String,
    #[serde(default)]
    pub proxy_host: String,
    #[serde(default)]
    pub proxy_port: u16,
    #[serde(default)]
    pub proxy_user: Option<String>,
    #[serde(default)]
    pub proxy_pass: Option<String>,
    #[serde(default)]
    pub skip_subdomain_enum: bool,
}

fn default_start_mode() -> String {
    "run_now".to_string()
}

fn default_proxy_type() -> String {
    "http".to_string()
}

#[derive(Debug, Serialize)]
pub struct CreateScanResponse {
    pub success: bool,
    pub slug: String,
    pub run_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scheduled_for: Option<DateTime<Utc>>,
    pub queue_position: usize,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub success: bool,
    pub message: String,
}

// ============= Rescan =============

#[derive(Debug, Deserialize)]
pub struct RescanRequest {
    #[serde(default = "default_start_mode")]
    pub start_mode: String,
    #[serde(default)]
    pub scheduled_for: Option<DateTime<Utc>>,
    /// Credentials are never persisted; resupply them here or the proxy
    /// degrades to unauthenticated for this run.
    #[serde(default)]
    pub proxy_user: Option<String>,
    #[serde(default)]
    pub proxy_pass: Option<String>,
    #[serde(default)]
    pub skip_subdomain_enum: bool,
}

impl Default for RescanRequest {
    fn default() -> Self {
        Self {
            start_mode: default_start_mode(),
            scheduled_for: None,
            proxy_user: None,
            proxy_pass: None,
            skip_subdomain_enum: false,
        }
    }
}

// ============= Cancel =============

#[derive(Debug, Serialize)]
pub struct CancelResponse {
    pub success: bool,
    /// "pending_removed" | "signalled" | "already_terminal"
    pub outcome: String,
}

// ============= Health =============

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub uptime_seconds: f64,
    pub active_runs: usize,
    pub queued_jobs: usize,
    pub requests_total: u64,
}

// ============= Errors =============

#[derive(Debug)]
pub enum HttpServerError {
    InvalidRequest(String),
    Conflict(String),
    NotFound(String),
    Internal(String),
}

impl From<ApiError> for HttpServerError {
    fn from(e: ApiError) -> Self {
        match e {
            ApiError::Validation(msg) => Self::InvalidRequest(msg),
            ApiError::Conflict(msg) => Self::Conflict(msg),
            ApiError::NotFound(msg) => Self::NotFound(msg),
            ApiError::Internal(msg) => Self::Internal(msg),
        }
    }
}

impl IntoResponse for HttpServerError {
    fn into_response(self) -> Response {
        let (status, error_code, message) = match self {
            Self::InvalidRequest(msg) => (StatusCode::BAD_REQUEST, "INVALID_REQUEST", msg),
            Self::Conflict(msg) => (StatusCode::CONFLICT, "CONFLICT", msg),
            Self::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg),
            Self::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR", msg),
        };

        let body = serde_json::json!({
            "success": false,
            "error": message,
            "error_code": error_code,
        });

        (status, Json(body)).into_response()
    }
}
