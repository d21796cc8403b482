//! Shared test doubles: scripted [`ToolPlugin`] implementations and a
//! harness wiring store, executor and scheduler against a temp data dir.

// Each integration test binary compiles this module and uses a subset.
#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use overwatch_core::config::AppConfig;
use overwatch_core::error::ToolError;
use overwatch_core::pipeline::PipelineExecutor;
use overwatch_core::scheduler::ScanScheduler;
use overwatch_core::store::JobRunStore;
use overwatch_core::tools::{ToolHandle, ToolInvocation, ToolOutput, ToolPlugin, ToolSet};

/// Observed environment of the last invocation, for proxy assertions.
pub type EnvProbe = Arc<Mutex<Option<HashMap<String, String>>>>;

enum Script {
    Lines(Vec<String>),
    Fail { code: i32, stderr: String },
    Missing,
    /// Park until the run's cancel channel flips, then report cancelled.
    BlockUntilCancelled,
}

pub struct MockTool {
    name: String,
    script: Script,
    seen_env: EnvProbe,
}

impl MockTool {
    pub fn lines(name: &str, lines: &[&str]) -> ToolHandle {
        Arc::new(Self {
            name: name.to_string(),
            script: Script::Lines(lines.iter().map(|s| s.to_string()).collect()),
            seen_env: Arc::new(Mutex::new(None)),
        })
    }

    pub fn lines_probed(name: &str, lines: &[&str]) -> (ToolHandle, EnvProbe) {
        let probe: EnvProbe = Arc::new(Mutex::new(None));
        let tool = Arc::new(Self {
            name: name.to_string(),
            script: Script::Lines(lines.iter().map(|s| s.to_string()).collect()),
            seen_env: probe.clone(),
        });
        (tool, probe)
    }

    pub fn failing(name: &str, code: i32) -> ToolHandle {
        Arc::new(Self {
            name: name.to_string(),
            script: Script::Fail {
                code,
                stderr: "boom".to_string(),
            },
            seen_env: Arc::new(Mutex::new(None)),
        })
    }

    pub fn missing(name: &str) -> ToolHandle {
        Arc::new(Self {
            name: name.to_string(),
            script: Script::Missing,
            seen_env: Arc::new(Mutex::new(None)),
        })
    }

    pub fn blocking(name: &str) -> ToolHandle {
        Arc::new(Self {
            name: name.to_string(),
            script: Script::BlockUntilCancelled,
            seen_env: Arc::new(Mutex::new(None)),
        })
    }
}

#[async_trait]
impl ToolPlugin for MockTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn is_available(&self) -> bool {
        !matches!(self.script, Script::Missing)
    }

    async fn invoke(&self, req: ToolInvocation) -> Result<ToolOutput, ToolError> {
        if let Ok(mut seen) = self.seen_env.lock() {
            *seen = Some(req.env.clone());
        }

        match &self.script {
            Script::Lines(lines) => {
                let artifact = req.output_dir.join(format!("{}.txt", self.name));
                let _ = tokio::fs::write(&artifact, lines.join("\n")).await;
                Ok(ToolOutput {
                    artifact,
                    lines: lines.clone(),
                    exit_code: 0,
                    duration_ms: 1,
                })
            }
            Script::Fail { code, stderr } => Err(ToolError::NonZeroExit {
                tool: self.name.clone(),
                code: *code,
                stderr_tail: stderr.clone(),
            }),
            Script::Missing => Err(ToolError::Unavailable(self.name.clone())),
            Script::BlockUntilCancelled => {
                let mut cancel = req.cancel.clone();
                match cancel.as_mut() {
                    Some(rx) => {
                        while !*rx.borrow() {
                            if rx.changed().await.is_err() {
                                break;
                            }
                        }
                    }
                    None => std::future::pending::<()>().await,
                }
                Err(ToolError::Cancelled(self.name.clone()))
            }
        }
    }
}

/// A fully scripted happy-path tool set for a scan of `acme.example`.
pub fn happy_toolset() -> ToolSet {
    ToolSet {
        discovery: vec![
            MockTool::lines("subfinder", &["a.acme.example", "b.acme.example"]),
            MockTool::lines("assetfinder", &["b.acme.example", "c.acme.example"]),
        ],
        resolver: MockTool::lines(
            "dnsx",
            &["a.acme.example [10.0.0.1]", "acme.example [10.0.0.2]"],
        ),
        prober: MockTool::lines(
            "httpx",
            &[
                r#"{"url":"https://a.acme.example","host":"a.acme.example","status_code":200,"title":"A","webserver":"nginx","tech":["Nginx"]}"#,
                r#"{"url":"https://acme.example","host":"acme.example","status_code":302,"title":"Root","webserver":"apache","tech":["Apache","PHP"]}"#,
            ],
        ),
        port_scanner: MockTool::lines(
            "naabu",
            &["a.acme.example:80", "a.acme.example:443", "acme.example:443"],
        ),
        screenshotter: MockTool::lines("gowitness", &[]),
        vuln_scanner: MockTool::lines(
            "nuclei",
            &[
                r#"{"template-id":"tls-version","info":{"name":"TLS Version","severity":"medium"},"host":"https://acme.example","matched-at":"https://acme.example:443"}"#,
            ],
        ),
    }
}

/// A tool set where nothing resolves and nothing is found.
pub fn empty_toolset() -> ToolSet {
    ToolSet {
        discovery: vec![
            MockTool::lines("subfinder", &[]),
            MockTool::lines("assetfinder", &[]),
        ],
        resolver: MockTool::lines("dnsx", &[]),
        prober: MockTool::lines("httpx", &[]),
        port_scanner: MockTool::lines("naabu", &[]),
        screenshotter: MockTool::lines("gowitness", &[]),
        vuln_scanner: MockTool::lines("nuclei", &[]),
    }
}

pub struct Harness {
    pub store: JobRunStore,
    pub scheduler: ScanScheduler,
    pub executor: PipelineExecutor,
    pub cfg: Arc<AppConfig>,
    _tmp: tempfile::TempDir,
}

pub fn harness(tools: ToolSet, max_concurrent: usize) -> Harness {
    let tmp = tempfile::tempdir().unwrap();
    let mut cfg = AppConfig::default();
    cfg.data_dir = tmp.path().to_string_lossy().to_string();
    cfg.scheduler.max_concurrent_runs = max_concurrent;
    let cfg = Arc::new(cfg);

    let store = JobRunStore::new();
    let executor = PipelineExecutor::new(store.clone(), tools, cfg.clone());
    let scheduler = ScanScheduler::new(store.clone(), executor.clone(), cfg.clone());

    Harness {
        store,
        scheduler,
        executor,
        cfg,
        _tmp: tmp,
    }
}

/// Drive ticks until the run reaches a terminal state and its executor
/// task is reaped, so lock state and the active set are settled.
pub async fn wait_terminal(
    h: &Harness,
    slug: &str,
    run_id: &str,
) -> overwatch_core::model::Run {
    for _ in 0..200 {
        h.scheduler.tick().await;
        if let Ok(run) = h.store.get_run(slug, run_id).await {
            if run.state.is_terminal() && h.scheduler.active_count().await == 0 {
                return run;
            }
        }
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    }
    panic!("run {run_id} never reached a terminal state");
}
