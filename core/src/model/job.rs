use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::proxy::ProxyCredentials;

/// How a submitted job enters the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LaunchMode {
    RunNow,
    Queue,
    Schedule,
}

/// Scheduling envelope preceding a run's dispatch.
///
/// Jobs live only inside the scheduler: no run record or artifact directory
/// exists until the job is dispatched. Credentials ride along transiently
/// for proxy injection and are dropped with the job.
#[derive(Debug, Clone)]
pub struct Job {
    pub run_id: String,
    pub project_slug: String,
    pub mode: LaunchMode,
    pub scheduled_for: Option<DateTime<Utc>>,
    pub skip_subdomain_enum: bool,
    pub submitted_at: DateTime<Utc>,
    pub proxy_credentials: Option<ProxyCredentials>,
}

/// What `submit` hands back to the caller.
#[derive(Debug, Clone, Serialize)]
pub struct JobDescriptor {
    pub run_id: String,
    pub slug: String,
    pub mode: LaunchMode,
    pub scheduled_for: Option<DateTime<Utc>>,
    /// Position in the FIFO queue at submission time (0 = next).
    pub queue_position: usize,
}
