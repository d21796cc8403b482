//! Canonical per-stage records. These are what the report synthesizer
//! renders and what the machine-readable companions serialize.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::RunStats;

/// One probed HTTP/HTTPS endpoint (stage 4).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceProbe {
    pub url: String,
    pub host: String,
    pub status_code: u16,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub webserver: String,
    #[serde(default)]
    pub technologies: Vec<String>,
}

/// Open ports discovered for one host (stage 5).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HostPorts {
    pub host: String,
    pub ip: String,
    /// Sorted ascending.
    pub ports: Vec<u16>,
    pub port_count: usize,
}

/// One vulnerability finding (stage 8).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Finding {
    pub template: String,
    pub name: String,
    pub severity: String,
    pub host: String,
    pub matched_at: String,
}

/// The canonical summary record written at stage 9.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanSummary {
    pub project_slug: String,
    pub run_id: String,
    pub targets: Vec<String>,
    pub stats: RunStats,
    /// Best-effort failures absorbed during the run.
    pub warnings: Vec<String>,
    /// Non-failure annotations, e.g. why visual capture was skipped.
    pub notes: Vec<String>,
    pub generated_at: DateTime<Utc>,
}
