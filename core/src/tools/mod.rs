//! Uniform capability interface over external recon tools.
//!
//! Each concrete tool (subdomain finder, DNS resolver, HTTP prober, port
//! scanner, vulnerability scanner) implements [`ToolPlugin`], keeping the
//! pipeline executor tool-agnostic: new tools slot in without touching
//! pipeline logic.

pub mod process;

pub use process::{run_tool, ProcessSpec};

use async_trait::async_trait;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

use crate::error::ToolError;

/// One invocation of an external tool.
#[derive(Debug, Clone)]
pub struct ToolInvocation {
    /// Input hosts/URLs, fed to the tool one per line.
    pub targets: Vec<String>,
    /// Directory the tool's artifact is written under (the run's `raw/`
    /// area, or `screenshots/` for visual capture).
    pub output_dir: PathBuf,
    /// Extra process environment, typically the proxy injection map.
    pub env: HashMap<String, String>,
    pub timeout: Duration,
    /// Cooperative cancellation; the process is killed after the grace
    /// period when this flips to true.
    pub cancel: Option<watch::Receiver<bool>>,
    pub cancel_grace: Duration,
}

impl ToolInvocation {
    pub fn new(targets: Vec<String>, output_dir: PathBuf, timeout: Duration) -> Self {
        Self {
            targets,
            output_dir,
            env: HashMap::new(),
            timeout,
            cancel: None,
            cancel_grace: Duration::from_secs(5),
        }
    }

    pub fn with_env(mut self, env: HashMap<String, String>) -> Self {
        self.env = env;
        self
    }

    pub fn with_cancel(mut self, cancel: watch::Receiver<bool>, grace: Duration) -> Self {
        self.cancel = Some(cancel);
        self.cancel_grace = grace;
        self
    }
}

/// Result of a successful invocation.
#[derive(Debug, Clone)]
pub struct ToolOutput {
    /// Where the tool's stdout was persisted.
    pub artifact: PathBuf,
    /// Stdout split into non-empty lines. Adapters normalize their tool to
    /// one record per line (`-silent` / JSON-lines flags).
    pub lines: Vec<String>,
    pub exit_code: i32,
    pub duration_ms: u64,
}

/// Uniform capability wrapping one external tool.
#[async_trait]
pub trait ToolPlugin: Send + Sync {
    fn name(&self) -> &str;

    /// Whether the underlying binary is on PATH (or at its configured
    /// location). Checked by the pipeline's dependency stage.
    fn is_available(&self) -> bool;

    async fn invoke(&self, req: ToolInvocation) -> Result<ToolOutput, ToolError>;
}

pub type ToolHandle = Arc<dyn ToolPlugin>;

/// The fixed set of tool roles the pipeline drives.
#[derive(Clone)]
pub struct ToolSet {
    /// Two independent subdomain discovery tools, run concurrently.
    pub discovery: Vec<ToolHandle>,
    pub resolver: ToolHandle,
    pub prober: ToolHandle,
    pub port_scanner: ToolHandle,
    pub screenshotter: ToolHandle,
    pub vuln_scanner: ToolHandle,
}

impl ToolSet {
    /// All tools the dependency check must find, in stage order.
    pub fn required(&self) -> Vec<ToolHandle> {
        let mut all: Vec<ToolHandle> = self.discovery.clone();
        all.push(self.resolver.clone());
        all.push(self.prober.clone());
        all.push(self.port_scanner.clone());
        all.push(self.screenshotter.clone());
        all.push(self.vuln_scanner.clone());
        all
    }
}

impl std::fmt::Debug for ToolSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolSet")
            .field(
                "discovery",
                &self.discovery.iter().map(|t| t.name()).collect::<Vec<_>>(),
            )
            .field("resolver", &self.resolver.name())
            .field("prober", &self.prober.name())
            .field("port_scanner", &self.port_scanner.name())
            .field("screenshotter", &self.screenshotter.name())
            .field("vuln_scanner", &self.vuln_scanner.name())
            .finish()
    }
}
