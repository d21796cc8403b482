//! Drives the ten-stage pipeline for one run.
//!
//! The progress snapshot is written to the store before each stage's work
//! begins, so a polling reader never observes a skipped step. Cancellation
//! is polled at every stage boundary; in-flight external processes are
//! signalled through the invocation's cancel channel and killed after the
//! configured grace period.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::watch;

use crate::artifacts::{run_dir, RunArtifacts};
use crate::config::AppConfig;
use crate::error::{EngineError, ToolError};
use crate::model::{normalize_targets, Progress, RunState};
use crate::proxy::{proxy_env, ProxyCredentials, ProxyMeta};
use crate::report;
use crate::store::JobRunStore;
use crate::tools::{ToolHandle, ToolInvocation, ToolSet};

use super::context::PipelineContext;
use super::parse;
use super::records::ScanSummary;
use super::stages::{StageDef, StagePolicy, STAGES};

/// Everything the executor needs about a dispatched job. Credentials are
/// consumed here and dropped with the request.
pub struct RunRequest {
    pub slug: String,
    pub run_id: String,
    pub targets: Vec<String>,
    pub proxy: ProxyMeta,
    pub proxy_credentials: Option<ProxyCredentials>,
    pub skip_subdomain_enum: bool,
    pub cancel: watch::Receiver<bool>,
}

/// Terminal outcome of one pipeline execution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunVerdict {
    Succeeded(String),
    Failed(String),
    Cancelled,
}

#[derive(Clone)]
pub struct PipelineExecutor {
    store: JobRunStore,
    tools: ToolSet,
    cfg: Arc<AppConfig>,
}

impl PipelineExecutor {
    pub fn new(store: JobRunStore, tools: ToolSet, cfg: Arc<AppConfig>) -> Self {
        Self { store, tools, cfg }
    }

    /// Run the pipeline to a terminal state. Expects the run record to
    /// exist in state running with the project lock held; both are settled
    /// here on exit.
    pub async fn execute(&self, req: RunRequest) -> RunVerdict {
        let artifacts = RunArtifacts::new(run_dir(
            std::path::Path::new(&self.cfg.data_dir),
            &req.slug,
            &req.run_id,
        ));

        let verdict = match artifacts.prepare().await {
            Ok(()) => {
                let env = proxy_env(&req.proxy, req.proxy_credentials.as_ref());
                let mut ctx = PipelineContext::new(
                    &req.slug,
                    &req.run_id,
                    artifacts,
                    env,
                    req.cancel.clone(),
                );
                match self.run_pipeline(&mut ctx, &req).await {
                    Ok(verdict) => {
                        self.persist_outcome(&ctx, &verdict).await;
                        verdict
                    }
                    Err(e) => {
                        let verdict = RunVerdict::Failed(e.status_message());
                        tracing::error!(
                            target: "overwatch.pipeline",
                            run_id = %req.run_id,
                            error = %e,
                            "run failed"
                        );
                        self.persist_outcome(&ctx, &verdict).await;
                        verdict
                    }
                }
            }
            Err(e) => {
                let verdict = RunVerdict::Failed("could not create artifact directory".to_string());
                tracing::error!(
                    target: "overwatch.pipeline",
                    run_id = %req.run_id,
                    error = %e,
                    "artifact directory setup failed"
                );
                let _ = self
                    .store
                    .update_run(&req.slug, &req.run_id, |r| {
                        r.state = RunState::Failed;
                        r.status_message = "could not create artifact directory".to_string();
                    })
                    .await;
                verdict
            }
        };

        self.store.release_lock(&req.slug).await;
        verdict
    }

    async fn persist_outcome(&self, ctx: &PipelineContext, verdict: &RunVerdict) {
        let (state, message) = match verdict {
            RunVerdict::Succeeded(msg) => (RunState::Succeeded, msg.clone()),
            RunVerdict::Failed(msg) => (RunState::Failed, msg.clone()),
            RunVerdict::Cancelled => (RunState::Cancelled, "cancelled by user".to_string()),
        };
        let stats = ctx.stats.clone();
        let warnings = ctx.warnings.clone();
        // Only a successful run lands on the final step; failed and
        // cancelled runs keep the progress they reached.
        let terminal_progress = match state {
            RunState::Succeeded => Some(Progress::at(crate::model::TOTAL_STEPS, "completed")),
            _ => None,
        };
        let res = self
            .store
            .update_run(&ctx.slug, &ctx.run_id, move |r| {
                r.state = state;
                r.status_message = message;
                r.stats = stats;
                r.warnings = warnings;
                if let Some(p) = terminal_progress {
                    r.progress = p;
                }
            })
            .await;
        if let Err(e) = res {
            tracing::error!(
                target: "overwatch.pipeline",
                run_id = %ctx.run_id,
                error = %e,
                "failed to persist terminal state"
            );
        }
    }

    async fn run_pipeline(
        &self,
        ctx: &mut PipelineContext,
        req: &RunRequest,
    ) -> Result<RunVerdict, EngineError> {
        for stage in STAGES.iter() {
            if ctx.cancel_requested() {
                return Ok(RunVerdict::Cancelled);
            }

            // Durably record the step before launching any work.
            self.store
                .update_run(&ctx.slug, &ctx.run_id, |r| {
                    r.progress = Progress::at(stage.step, stage.label);
                })
                .await
                .map_err(|e| EngineError::Store(e.to_string()))?;

            tracing::info!(
                target: "overwatch.pipeline",
                run_id = %ctx.run_id,
                step = stage.step,
                label = stage.label,
                "stage start"
            );

            self.run_stage(stage, ctx, req).await?;
        }

        let message = match &ctx.early_exit {
            Some(reason) => reason.clone(),
            None if ctx.warnings.is_empty() => "scan completed".to_string(),
            None => format!("scan completed with {} warning(s)", ctx.warnings.len()),
        };
        Ok(RunVerdict::Succeeded(message))
    }

    async fn run_stage(
        &self,
        stage: &StageDef,
        ctx: &mut PipelineContext,
        req: &RunRequest,
    ) -> Result<(), EngineError> {
        match stage.step {
            1 => self.stage_dependency_check(stage, ctx),
            2 => self.stage_target_acquisition(stage, ctx, req).await,
            3 => self.stage_liveness(stage, ctx).await,
            4 => self.stage_service_probe(stage, ctx).await,
            5 => self.stage_port_discovery(stage, ctx).await,
            6 => {
                self.stage_technology_aggregation(ctx).await;
                Ok(())
            }
            7 => self.stage_visual_capture(stage, ctx).await,
            8 => self.stage_vulnerability_scan(stage, ctx).await,
            9 => {
                self.stage_summary(ctx).await;
                Ok(())
            }
            10 => {
                self.stage_report(ctx).await;
                Ok(())
            }
            _ => unreachable!("stage table is dense"),
        }
    }

    fn invocation(&self, ctx: &PipelineContext, targets: Vec<String>, timeout_secs: u64) -> ToolInvocation {
        ToolInvocation::new(
            targets,
            ctx.artifacts.raw_dir(),
            Duration::from_secs(timeout_secs),
        )
        .with_env(ctx.proxy_env.clone())
        .with_cancel(
            ctx.cancel.clone(),
            Duration::from_millis(self.cfg.scheduler.cancel_grace_ms),
        )
    }

    /// Apply the stage's declared policy to a tool failure: fatal stages
    /// abort the run, best-effort stages absorb the failure into a warning.
    /// Cancellations are left to the stage-boundary poll.
    fn settle(
        ctx: &mut PipelineContext,
        stage: &StageDef,
        scope: &str,
        err: ToolError,
    ) -> Result<(), EngineError> {
        match stage.policy {
            StagePolicy::Fatal => Err(match err {
                ToolError::Unavailable(name) => EngineError::ToolUnavailable(name),
                other => EngineError::Executor(other.to_string()),
            }),
            StagePolicy::BestEffort => {
                if !matches!(err, ToolError::Cancelled(_)) {
                    ctx.warn(scope, err);
                }
                Ok(())
            }
        }
    }

    // ============= Stage 1 =============

    fn stage_dependency_check(
        &self,
        stage: &StageDef,
        ctx: &mut PipelineContext,
    ) -> Result<(), EngineError> {
        for tool in self.tools.required() {
            if !tool.is_available() {
                Self::settle(
                    ctx,
                    stage,
                    stage.label,
                    ToolError::Unavailable(tool.name().to_string()),
                )?;
                continue;
            }
            tracing::debug!(target: "overwatch.pipeline", run_id = %ctx.run_id, tool = tool.name(), "dependency ok");
        }
        Ok(())
    }

    // ============= Stage 2 =============

    async fn stage_target_acquisition(
        &self,
        stage: &StageDef,
        ctx: &mut PipelineContext,
        req: &RunRequest,
    ) -> Result<(), EngineError> {
        let seeds = normalize_targets(&req.targets);

        let mut union: HashSet<String> = seeds.iter().cloned().collect();
        if !req.skip_subdomain_enum {
            // The two discovery tools share no state; run them concurrently
            // and union-deduplicate afterwards.
            let timeout = self.cfg.tools.subfinder.timeout_secs;
            let invocations: Vec<(ToolHandle, ToolInvocation)> = self
                .tools
                .discovery
                .iter()
                .map(|t| (t.clone(), self.invocation(ctx, seeds.clone(), timeout)))
                .collect();

            let results = futures::future::join_all(
                invocations
                    .into_iter()
                    .map(|(tool, inv)| async move { (tool.name().to_string(), tool.invoke(inv).await) }),
            )
            .await;

            for (name, result) in results {
                match result {
                    Ok(out) => {
                        for line in out.lines {
                            union.insert(line.to_ascii_lowercase());
                        }
                    }
                    Err(e) => Self::settle(ctx, stage, &format!("target acquisition ({name})"), e)?,
                }
            }
        }

        let mut targets: Vec<String> = union.into_iter().collect();
        targets.sort();
        ctx.stats.total_subdomains = targets.len();

        let list = targets.join("\n");
        if let Err(e) = tokio::fs::write(ctx.artifacts.raw_dir().join("targets.txt"), list).await {
            ctx.warn("target acquisition", e);
        }

        if targets.is_empty() {
            // Graceful empty result, not a failure.
            ctx.early_exit = Some("no targets discovered".to_string());
        }
        ctx.targets = targets;
        Ok(())
    }

    // ============= Stage 3 =============

    async fn stage_liveness(
        &self,
        stage: &StageDef,
        ctx: &mut PipelineContext,
    ) -> Result<(), EngineError> {
        if ctx.early_exit.is_some() {
            ctx.note("liveness resolution skipped: no targets");
            return Ok(());
        }

        let inv = self.invocation(ctx, ctx.targets.clone(), self.cfg.tools.dnsx.timeout_secs);
        match self.tools.resolver.invoke(inv).await {
            Ok(out) => {
                for line in &out.lines {
                    if let Some((host, ip)) = parse::parse_resolve_line(line) {
                        if let Some(ip) = ip {
                            ctx.ips.insert(host.clone(), ip);
                        }
                        ctx.live_hosts.push(host);
                    }
                }
                ctx.live_hosts.sort();
                ctx.live_hosts.dedup();
            }
            Err(e) => Self::settle(ctx, stage, stage.label, e)?,
        }
        ctx.stats.live_dns = ctx.live_hosts.len();

        if ctx.live_hosts.is_empty() && ctx.early_exit.is_none() {
            ctx.early_exit = Some("no live hosts".to_string());
        }
        Ok(())
    }

    // ============= Stage 4 =============

    async fn stage_service_probe(
        &self,
        stage: &StageDef,
        ctx: &mut PipelineContext,
    ) -> Result<(), EngineError> {
        if ctx.early_exit.is_some() {
            ctx.note("service probing skipped: nothing to probe");
            return Ok(());
        }

        let inv = self.invocation(ctx, ctx.live_hosts.clone(), self.cfg.tools.httpx.timeout_secs);
        match self.tools.prober.invoke(inv).await {
            Ok(out) => {
                ctx.probes = out
                    .lines
                    .iter()
                    .filter_map(|l| parse::parse_probe_line(l))
                    .collect();
            }
            // Best-effort: empty result set, continue.
            Err(e) => Self::settle(ctx, stage, stage.label, e)?,
        }
        ctx.stats.live_http = ctx.probes.len();
        Ok(())
    }

    // ============= Stage 5 =============

    async fn stage_port_discovery(
        &self,
        stage: &StageDef,
        ctx: &mut PipelineContext,
    ) -> Result<(), EngineError> {
        if ctx.early_exit.is_none() {
            let inv = self.invocation(ctx, ctx.live_hosts.clone(), self.cfg.tools.naabu.timeout_secs);
            match self.tools.port_scanner.invoke(inv).await {
                Ok(out) => {
                    let pairs = out
                        .lines
                        .iter()
                        .filter_map(|l| parse::parse_port_line(l))
                        .collect();
                    ctx.host_ports = parse::group_ports(pairs, &ctx.ips);
                }
                Err(e) => Self::settle(ctx, stage, stage.label, e)?,
            }
        }
        ctx.stats.open_ports = ctx.host_ports.iter().map(|h| h.port_count).sum();

        // Always write the port map, empty marker included.
        if let Err(e) = write_json(&ctx.artifacts.ports_path(), &ctx.host_ports).await {
            ctx.warn(stage.label, e);
        }
        Ok(())
    }

    // ============= Stage 6 =============

    async fn stage_technology_aggregation(&self, ctx: &mut PipelineContext) {
        // Pure data transformation over stage 4 output.
        ctx.technologies = parse::dedupe_by_url(&ctx.probes);
        if let Err(e) = write_json(&ctx.artifacts.technologies_path(), &ctx.technologies).await {
            ctx.warn("technology aggregation", e);
        }
    }

    // ============= Stage 7 =============

    async fn stage_visual_capture(
        &self,
        stage: &StageDef,
        ctx: &mut PipelineContext,
    ) -> Result<(), EngineError> {
        let live_http = ctx.stats.live_http;
        let bound = self.cfg.tools.screenshot_max_hosts;

        if live_http == 0 {
            ctx.note("visual capture skipped: no live http services");
            return Ok(());
        }
        if live_http >= bound {
            ctx.note(format!(
                "visual capture skipped: {live_http} live http services exceeds bound of {bound}"
            ));
            return Ok(());
        }

        let urls: Vec<String> = ctx.probes.iter().map(|p| p.url.clone()).collect();
        let mut inv = self.invocation(ctx, urls, self.cfg.tools.gowitness.timeout_secs);
        inv.output_dir = ctx.artifacts.screenshots_dir();
        if let Err(e) = self.tools.screenshotter.invoke(inv).await {
            Self::settle(ctx, stage, stage.label, e)?;
        }
        Ok(())
    }

    // ============= Stage 8 =============

    async fn stage_vulnerability_scan(
        &self,
        stage: &StageDef,
        ctx: &mut PipelineContext,
    ) -> Result<(), EngineError> {
        if ctx.early_exit.is_none() && !ctx.probes.is_empty() {
            let urls: Vec<String> = ctx.probes.iter().map(|p| p.url.clone()).collect();
            let inv = self.invocation(ctx, urls, self.cfg.tools.nuclei.timeout_secs);
            match self.tools.vuln_scanner.invoke(inv).await {
                Ok(out) => {
                    ctx.findings = out
                        .lines
                        .iter()
                        .filter_map(|l| parse::parse_finding_line(l))
                        .collect();
                }
                Err(e) => Self::settle(ctx, stage, stage.label, e)?,
            }
        }
        ctx.stats.vulnerabilities = ctx.findings.len();

        // Newline-delimited findings record, written even when empty.
        let mut body = String::new();
        for f in &ctx.findings {
            if let Ok(line) = serde_json::to_string(f) {
                body.push_str(&line);
                body.push('\n');
            }
        }
        if let Err(e) = tokio::fs::write(ctx.artifacts.findings_path(), body).await {
            ctx.warn(stage.label, e);
        }
        Ok(())
    }

    // ============= Stage 9 =============

    async fn stage_summary(&self, ctx: &mut PipelineContext) {
        let summary = ScanSummary {
            project_slug: ctx.slug.clone(),
            run_id: ctx.run_id.clone(),
            targets: ctx.targets.clone(),
            stats: ctx.stats.clone(),
            warnings: ctx.warnings.clone(),
            notes: ctx.notes.clone(),
            generated_at: Utc::now(),
        };
        if let Err(e) = write_json(&ctx.artifacts.summary_path(), &summary).await {
            ctx.warn("summary aggregation", e);
        }
    }

    // ============= Stage 10 =============

    async fn stage_report(&self, ctx: &mut PipelineContext) {
        let summary = ScanSummary {
            project_slug: ctx.slug.clone(),
            run_id: ctx.run_id.clone(),
            targets: ctx.targets.clone(),
            stats: ctx.stats.clone(),
            warnings: ctx.warnings.clone(),
            notes: ctx.notes.clone(),
            generated_at: Utc::now(),
        };
        match report::synthesize(
            &ctx.artifacts,
            &summary,
            &ctx.technologies,
            &ctx.host_ports,
            &ctx.findings,
        )
        .await
        {
            Ok(report_path) => {
                if let Err(e) = self
                    .store
                    .attach_report(&ctx.slug, &ctx.run_id, report_path)
                    .await
                {
                    ctx.warn("report synthesis", e);
                }
            }
            Err(e) => ctx.warn("report synthesis", e),
        }
    }
}

async fn write_json<T: serde::Serialize>(
    path: &std::path::Path,
    value: &T,
) -> Result<(), std::io::Error> {
    let body = serde_json::to_string_pretty(value)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
    tokio::fs::write(path, body).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn context() -> PipelineContext {
        let (_tx, rx) = watch::channel(false);
        PipelineContext::new(
            "acme",
            "20260101-000000",
            RunArtifacts::new(std::path::PathBuf::from("/tmp/overwatch-test")),
            HashMap::new(),
            rx,
        )
    }

    fn stage(policy: StagePolicy) -> StageDef {
        StageDef {
            step: 5,
            label: "port discovery",
            policy,
        }
    }

    #[test]
    fn test_fatal_policy_aborts_with_missing_tool_message() {
        let mut ctx = context();
        let err = PipelineExecutor::settle(
            &mut ctx,
            &stage(StagePolicy::Fatal),
            "port discovery",
            ToolError::Unavailable("naabu".to_string()),
        )
        .unwrap_err();
        assert_eq!(err.status_message(), "missing required tool: naabu");
        assert!(ctx.warnings.is_empty());
    }

    #[test]
    fn test_best_effort_policy_absorbs_into_warning() {
        let mut ctx = context();
        PipelineExecutor::settle(
            &mut ctx,
            &stage(StagePolicy::BestEffort),
            "port discovery",
            ToolError::Timeout {
                tool: "naabu".to_string(),
                secs: 30,
            },
        )
        .unwrap();
        assert_eq!(ctx.warnings.len(), 1);
        assert!(ctx.warnings[0].contains("port discovery"));
    }

    #[test]
    fn test_cancellation_is_never_recorded_as_warning() {
        let mut ctx = context();
        PipelineExecutor::settle(
            &mut ctx,
            &stage(StagePolicy::BestEffort),
            "port discovery",
            ToolError::Cancelled("naabu".to_string()),
        )
        .unwrap();
        assert!(ctx.warnings.is_empty());
    }
}
