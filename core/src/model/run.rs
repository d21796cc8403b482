use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Number of pipeline steps every run walks through.
pub const TOTAL_STEPS: u8 = 10;

/// Lifecycle state of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunState {
    Scheduled,
    Queued,
    Running,
    Succeeded,
    Failed,
    Cancelled,
}

impl RunState {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed | Self::Cancelled)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Scheduled => "scheduled",
            Self::Queued => "queued",
            Self::Running => "running",
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        }
    }
}

/// Immutable progress snapshot, replaced wholesale once per stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Progress {
    pub step: u8,
    pub total: u8,
    pub label: String,
}

impl Progress {
    pub fn at(step: u8, label: &str) -> Self {
        Self {
            step,
            total: TOTAL_STEPS,
            label: label.to_string(),
        }
    }

    pub fn percent(&self) -> u8 {
        if self.total == 0 {
            return 0;
        }
        ((self.step as u16 * 100) / self.total as u16) as u8
    }
}

impl Default for Progress {
    fn default() -> Self {
        Self::at(0, "pending")
    }
}

/// Per-stage statistics merged into the run record as stages complete.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunStats {
    pub total_subdomains: usize,
    pub live_dns: usize,
    pub live_http: usize,
    pub open_ports: usize,
    pub vulnerabilities: usize,
}

/// One concrete execution of the pipeline for a project.
///
/// Mutated only by its executor; immutable once terminal except for report
/// path attachment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Run {
    pub run_id: String,
    pub project_slug: String,
    pub state: RunState,
    pub progress: Progress,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    pub artifact_dir: PathBuf,
    pub stats: RunStats,
    /// Short human-readable summary of the terminal outcome.
    pub status_message: String,
    /// Best-effort stage failures absorbed without failing the run.
    pub warnings: Vec<String>,
    pub report_path: Option<PathBuf>,
}

impl Run {
    pub fn new(run_id: &str, project_slug: &str, artifact_dir: PathBuf) -> Self {
        Self {
            run_id: run_id.to_string(),
            project_slug: project_slug.to_string(),
            state: RunState::Running,
            progress: Progress::default(),
            created_at: Utc::now(),
            started_at: Some(Utc::now()),
            finished_at: None,
            artifact_dir,
            stats: RunStats::default(),
            status_message: String::new(),
            warnings: Vec::new(),
            report_path: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_states() {
        assert!(RunState::Succeeded.is_terminal());
        assert!(RunState::Failed.is_terminal());
        assert!(RunState::Cancelled.is_terminal());
        assert!(!RunState::Running.is_terminal());
        assert!(!RunState::Queued.is_terminal());
    }

    #[test]
    fn test_progress_percent() {
        assert_eq!(Progress::at(0, "pending").percent(), 0);
        assert_eq!(Progress::at(5, "half").percent(), 50);
        assert_eq!(Progress::at(10, "done").percent(), 100);
    }

    #[test]
    fn test_state_serializes_lowercase() {
        let s = serde_json::to_string(&RunState::Succeeded).unwrap();
        assert_eq!(s, "\"succeeded\"");
    }
}
