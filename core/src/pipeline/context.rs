//! Mutable working set for one run, owned exclusively by its executor.

use std::collections::HashMap;

use tokio::sync::watch;

use crate::artifacts::RunArtifacts;
use crate::model::RunStats;

use super::records::{Finding, HostPorts, ServiceProbe};

/// Accumulated stage outputs handed forward through the pipeline. Counters
/// become fields of the immutable progress/stats snapshots persisted to the
/// store; nothing here is shared.
pub struct PipelineContext {
    pub slug: String,
    pub run_id: String,
    pub artifacts: RunArtifacts,
    /// Proxy environment injected into every tool invocation.
    pub proxy_env: HashMap<String, String>,
    pub cancel: watch::Receiver<bool>,

    pub targets: Vec<String>,
    pub live_hosts: Vec<String>,
    /// host -> resolved address, filled by the liveness stage.
    pub ips: HashMap<String, String>,
    pub probes: Vec<ServiceProbe>,
    pub technologies: Vec<ServiceProbe>,
    pub host_ports: Vec<HostPorts>,
    pub findings: Vec<Finding>,
    pub stats: RunStats,

    /// Set when stage 2 or 3 resolves to nothing; later external stages
    /// record themselves as skipped and the run still ends succeeded.
    pub early_exit: Option<String>,
    /// Absorbed best-effort failures.
    pub warnings: Vec<String>,
    /// Non-failure annotations (e.g. visual capture skip reason).
    pub notes: Vec<String>,
}

impl PipelineContext {
    pub fn new(
        slug: &str,
        run_id: &str,
        artifacts: RunArtifacts,
        proxy_env: HashMap<String, String>,
        cancel: watch::Receiver<bool>,
    ) -> Self {
        Self {
            slug: slug.to_string(),
            run_id: run_id.to_string(),
            artifacts,
            proxy_env,
            cancel,
            targets: Vec::new(),
            live_hosts: Vec::new(),
            ips: HashMap::new(),
            probes: Vec::new(),
            technologies: Vec::new(),
            host_ports: Vec::new(),
            findings: Vec::new(),
            stats: RunStats::default(),
            early_exit: None,
            warnings: Vec::new(),
            notes: Vec::new(),
        }
    }

    pub fn cancel_requested(&self) -> bool {
        *self.cancel.borrow()
    }

    pub fn warn(&mut self, stage: &str, detail: impl std::fmt::Display) {
        let msg = format!("{stage}: {detail}");
        tracing::warn!(target: "overwatch.pipeline", run_id = %self.run_id, "{msg}");
        self.warnings.push(msg);
    }

    pub fn note(&mut self, msg: impl Into<String>) {
        let msg = msg.into();
        tracing::info!(target: "overwatch.pipeline", run_id = %self.run_id, "{msg}");
        self.notes.push(msg);
    }
}
