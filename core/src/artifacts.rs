//! Per-run artifact directory layout.
//!
//! Each run exclusively owns its directory until it reaches a terminal
//! state, after which the tree is read-only.

use std::path::{Path, PathBuf};

/// Resolved paths inside one run's artifact directory.
#[derive(Debug, Clone)]
pub struct RunArtifacts {
    pub root: PathBuf,
}

impl RunArtifacts {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    /// Create the directory skeleton: `raw/`, `screenshots/`, `logs/`.
    pub async fn prepare(&self) -> std::io::Result<()> {
        tokio::fs::create_dir_all(self.raw_dir()).await?;
        tokio::fs::create_dir_all(self.screenshots_dir()).await?;
        tokio::fs::create_dir_all(self.logs_dir()).await?;
        Ok(())
    }

    /// Raw intermediate tool output.
    pub fn raw_dir(&self) -> PathBuf {
        self.root.join("raw")
    }

    pub fn screenshots_dir(&self) -> PathBuf {
        self.root.join("screenshots")
    }

    pub fn logs_dir(&self) -> PathBuf {
        self.root.join("logs")
    }

    /// Canonical summary record (stage 9).
    pub fn summary_path(&self) -> PathBuf {
        self.root.join("summary.json")
    }

    /// Deduplicated-by-URL technology table (stage 6).
    pub fn technologies_path(&self) -> PathBuf {
        self.root.join("technologies.json")
    }

    /// Port table: array of `{host, ip, ports, port_count}` (stage 5).
    pub fn ports_path(&self) -> PathBuf {
        self.root.join("ports.json")
    }

    /// Newline-delimited vulnerability findings (stage 8).
    pub fn findings_path(&self) -> PathBuf {
        self.root.join("findings.jsonl")
    }

    pub fn report_html_path(&self) -> PathBuf {
        self.root.join("report.html")
    }

    pub fn report_json_path(&self) -> PathBuf {
        self.root.join("report.json")
    }

    pub fn report_csv_path(&self) -> PathBuf {
        self.root.join("report.csv")
    }
}

/// Artifact directory for a given run: `<data_dir>/projects/<slug>/runs/<run_id>`.
pub fn run_dir(data_dir: &Path, slug: &str, run_id: &str) -> PathBuf {
    data_dir
        .join("projects")
        .join(slug)
        .join("runs")
        .join(run_id)
}
