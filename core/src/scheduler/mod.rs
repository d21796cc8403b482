//! Job scheduling: submission, queueing, scheduled launches, cancellation
//! and the dispatch loop that feeds the pipeline executor.
//!
//! Jobs are held in memory until dispatch. Only at dispatch does a run
//! record and artifact directory come into existence, so cancelling a
//! pending job leaves no trace beyond the scheduler's own state.

use std::collections::{HashMap, VecDeque};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;

use crate::artifacts::run_dir;
use crate::config::AppConfig;
use crate::error::ApiError;
use crate::model::{Job, JobDescriptor, LaunchMode, Run, RunState};
use crate::pipeline::{PipelineExecutor, RunRequest, RunVerdict};
use crate::proxy::ProxyCredentials;
use crate::store::JobRunStore;

/// What a job submission asks for. Credentials are moved into the job and
/// never stored anywhere else.
#[derive(Debug)]
pub struct SubmitRequest {
    pub slug: String,
    pub mode: LaunchMode,
    pub scheduled_for: Option<DateTime<Utc>>,
    pub skip_subdomain_enum: bool,
    pub proxy_credentials: Option<ProxyCredentials>,
}

/// Outcome of a cancel request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelOutcome {
    /// The job never dispatched; it is gone and no run record exists.
    PendingRemoved,
    /// The run is active; it was signalled and will stop at the next
    /// stage boundary.
    Signalled,
    /// The run already reached a terminal state. Cancel is idempotent.
    AlreadyTerminal,
}

struct ActiveRun {
    slug: String,
    cancel_tx: watch::Sender<bool>,
    handle: JoinHandle<RunVerdict>,
}

#[derive(Default)]
struct SchedulerState {
    /// FIFO dispatch queue. `RunNow` immediacy comes from the inline tick
    /// after submission, not from queue position.
    queue: VecDeque<Job>,
    /// Future-dated jobs, promoted into the queue when due.
    scheduled: Vec<Job>,
    /// Dispatched runs keyed by run_id.
    active: HashMap<String, ActiveRun>,
}

/// Owns the job queue and drives dispatch. Clone-cheap handle.
#[derive(Clone)]
pub struct ScanScheduler {
    store: JobRunStore,
    executor: PipelineExecutor,
    cfg: Arc<AppConfig>,
    state: Arc<Mutex<SchedulerState>>,
}

impl ScanScheduler {
    pub fn new(store: JobRunStore, executor: PipelineExecutor, cfg: Arc<AppConfig>) -> Self {
        Self {
            store,
            executor,
            cfg,
            state: Arc::new(Mutex::new(SchedulerState::default())),
        }
    }

    pub fn store(&self) -> &JobRunStore {
        &self.store
    }

    /// Validate and enqueue one job for an existing project. At most one
    /// pending or active job per project.
    pub async fn submit(&self, req: SubmitRequest) -> Result<JobDescriptor, ApiError> {
        let project = self.store.get_project(&req.slug).await?;

        if project.targets.is_empty() {
            return Err(ApiError::Validation(
                "project has no targets".to_string(),
            ));
        }
        project.proxy.validate()?;

        let scheduled_for = match req.mode {
            LaunchMode::Schedule => {
                let at = req.scheduled_for.ok_or_else(|| {
                    ApiError::Validation("scheduled launch requires a start time".to_string())
                })?;
                if at <= Utc::now() {
                    return Err(ApiError::Validation(
                        "scheduled start time must be in the future".to_string(),
                    ));
                }
                Some(at)
            }
            _ => None,
        };

        if project.locked {
            return Err(ApiError::Conflict(format!(
                "project '{}' has an active run",
                req.slug
            )));
        }

        let mut state = self.state.lock().await;
        let busy = state.active.values().any(|a| a.slug == req.slug)
            || state.queue.iter().any(|j| j.project_slug == req.slug)
            || state.scheduled.iter().any(|j| j.project_slug == req.slug);
        if busy {
            return Err(ApiError::Conflict(format!(
                "project '{}' already has a pending or active job",
                req.slug
            )));
        }

        let run_id = self.store.allocate_run_id(&req.slug).await;
        let job = Job {
            run_id: run_id.clone(),
            project_slug: req.slug.clone(),
            mode: req.mode,
            scheduled_for,
            skip_subdomain_enum: req.skip_subdomain_enum,
            submitted_at: Utc::now(),
            proxy_credentials: req.proxy_credentials,
        };

        let queue_position = match req.mode {
            // A saturated run_now degrades to plain FIFO order; earlier
            // queued jobs keep their place.
            LaunchMode::RunNow | LaunchMode::Queue => {
                state.queue.push_back(job);
                state.queue.len() - 1
            }
            LaunchMode::Schedule => {
                state.scheduled.push(job);
                state.queue.len()
            }
        };
        drop(state);

        tracing::info!(
            target: "overwatch.scheduler",
            slug = %req.slug,
            run_id = %run_id,
            mode = ?req.mode,
            "job submitted"
        );

        // Immediate launches should not wait out a tick interval.
        if req.mode == LaunchMode::RunNow {
            self.tick().await;
        }

        Ok(JobDescriptor {
            run_id,
            slug: req.slug,
            mode: req.mode,
            scheduled_for,
            queue_position,
        })
    }

    /// Cancel by run_id: drop a pending job, signal an active run, or
    /// acknowledge an already-terminal one.
    pub async fn cancel(&self, run_id: &str) -> Result<CancelOutcome, ApiError> {
        let mut state = self.state.lock().await;

        if let Some(pos) = state.queue.iter().position(|j| j.run_id == run_id) {
            let job = state.queue.remove(pos);
            if let Some(job) = job {
                tracing::info!(
                    target: "overwatch.scheduler",
                    slug = %job.project_slug,
                    run_id = %run_id,
                    "pending job cancelled"
                );
            }
            return Ok(CancelOutcome::PendingRemoved);
        }
        if let Some(pos) = state.scheduled.iter().position(|j| j.run_id == run_id) {
            let job = state.scheduled.remove(pos);
            tracing::info!(
                target: "overwatch.scheduler",
                slug = %job.project_slug,
                run_id = %run_id,
                "scheduled job cancelled"
            );
            return Ok(CancelOutcome::PendingRemoved);
        }

        if let Some(active) = state.active.get(run_id) {
            // Signalled runs wind down at the next stage boundary; repeat
            // signals are harmless.
            let _ = active.cancel_tx.send(true);
            tracing::info!(
                target: "overwatch.scheduler",
                slug = %active.slug,
                run_id = %run_id,
                "cancel signalled to active run"
            );
            return Ok(CancelOutcome::Signalled);
        }
        drop(state);

        match self.store.find_run(run_id).await {
            Some(run) if run.state.is_terminal() => Ok(CancelOutcome::AlreadyTerminal),
            Some(_) => Ok(CancelOutcome::Signalled),
            None => Err(ApiError::NotFound(format!("run '{run_id}'"))),
        }
    }

    /// Pending (not yet dispatched) job for a project, if any. Lets the
    /// listing surface queued/scheduled state before a run record exists.
    pub async fn pending_for(&self, slug: &str) -> Option<JobDescriptor> {
        let state = self.state.lock().await;
        if let Some((pos, job)) = state
            .queue
            .iter()
            .enumerate()
            .find(|(_, j)| j.project_slug == slug)
        {
            return Some(JobDescriptor {
                run_id: job.run_id.clone(),
                slug: job.project_slug.clone(),
                mode: job.mode,
                scheduled_for: job.scheduled_for,
                queue_position: pos,
            });
        }
        state
            .scheduled
            .iter()
            .find(|j| j.project_slug == slug)
            .map(|job| JobDescriptor {
                run_id: job.run_id.clone(),
                slug: job.project_slug.clone(),
                mode: job.mode,
                scheduled_for: job.scheduled_for,
                queue_position: state.queue.len(),
            })
    }

    /// Delete a project, refusing while it has a pending or active job so
    /// the queue never holds a job for a missing project. The scheduler
    /// lock is held across the store call to keep a concurrent submit from
    /// slipping a job in between the check and the removal.
    pub async fn delete_project(&self, slug: &str) -> Result<(), ApiError> {
        let state = self.state.lock().await;
        let busy = state.active.values().any(|a| a.slug == slug)
            || state.queue.iter().any(|j| j.project_slug == slug)
            || state.scheduled.iter().any(|j| j.project_slug == slug);
        if busy {
            return Err(ApiError::Conflict(format!(
                "project '{slug}' has a pending or active job"
            )));
        }
        self.store.delete_project(slug).await
    }

    pub async fn active_count(&self) -> usize {
        self.state.lock().await.active.len()
    }

    pub async fn queued_count(&self) -> usize {
        let state = self.state.lock().await;
        state.queue.len() + state.scheduled.len()
    }

    /// One dispatch pass: reap finished runs, promote due scheduled jobs,
    /// launch while below the concurrency cap.
    pub async fn tick(&self) {
        self.reap_finished().await;

        let mut state = self.state.lock().await;
        self.promote_due(&mut state);

        while state.active.len() < self.cfg.scheduler.max_concurrent_runs {
            // First queued job whose project is not already running.
            let next = state.queue.iter().position(|j| {
                !state.active.values().any(|a| a.slug == j.project_slug)
            });
            let Some(pos) = next else { break };
            let Some(job) = state.queue.remove(pos) else {
                break;
            };
            match self.dispatch(job).await {
                Ok(active) => {
                    state.active.insert(active.0, active.1);
                }
                Err(e) => {
                    tracing::error!(
                        target: "overwatch.scheduler",
                        error = %e,
                        "dispatch failed, job dropped"
                    );
                }
            }
        }
    }

    /// Loop `tick` on the configured interval until aborted.
    pub fn spawn_loop(&self) -> JoinHandle<()> {
        let scheduler = self.clone();
        let interval = Duration::from_millis(self.cfg.scheduler.tick_interval_ms);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                scheduler.tick().await;
            }
        })
    }

    /// Move due scheduled jobs to the front of the queue, earliest first,
    /// ahead of plain FIFO entries.
    fn promote_due(&self, state: &mut SchedulerState) {
        let now = Utc::now();
        let mut due: Vec<Job> = Vec::new();
        state.scheduled.retain_mut(|job| {
            let is_due = job.scheduled_for.map(|at| at <= now).unwrap_or(true);
            if is_due {
                due.push(job.clone());
            }
            !is_due
        });
        due.sort_by_key(|j| j.scheduled_for);
        for job in due.into_iter().rev() {
            tracing::info!(
                target: "overwatch.scheduler",
                slug = %job.project_slug,
                run_id = %job.run_id,
                "scheduled job due"
            );
            state.queue.push_front(job);
        }
    }

    /// Create the run record, take the project lock and spawn the executor.
    async fn dispatch(&self, job: Job) -> Result<(String, ActiveRun), ApiError> {
        let slug = job.project_slug.clone();
        let run_id = job.run_id.clone();
        let project = self.store.get_project(&slug).await?;

        self.store.acquire_lock(&slug).await?;

        let artifact_dir = run_dir(Path::new(&self.cfg.data_dir), &slug, &run_id);
        let run = Run::new(&run_id, &slug, artifact_dir);
        if let Err(e) = self.store.create_run(run).await {
            self.store.release_lock(&slug).await;
            return Err(e);
        }

        let (cancel_tx, cancel_rx) = watch::channel(false);
        let request = RunRequest {
            slug: slug.clone(),
            run_id: run_id.clone(),
            targets: project.targets,
            proxy: project.proxy,
            proxy_credentials: job.proxy_credentials,
            skip_subdomain_enum: job.skip_subdomain_enum,
            cancel: cancel_rx,
        };

        tracing::info!(
            target: "overwatch.scheduler",
            slug = %slug,
            run_id = %run_id,
            "run dispatched"
        );

        let executor = self.executor.clone();
        let handle = tokio::spawn(async move { executor.execute(request).await });

        Ok((
            run_id,
            ActiveRun {
                slug,
                cancel_tx,
                handle,
            },
        ))
    }

    /// Join finished executor tasks. A panicked task leaves its run in the
    /// running state; settle it as failed and free the project.
    async fn reap_finished(&self) {
        let finished: Vec<(String, ActiveRun)> = {
            let mut state = self.state.lock().await;
            let ids: Vec<String> = state
                .active
                .iter()
                .filter(|(_, a)| a.handle.is_finished())
                .map(|(id, _)| id.clone())
                .collect();
            ids.into_iter()
                .filter_map(|id| state.active.remove(&id).map(|a| (id, a)))
                .collect()
        };

        for (run_id, active) in finished {
            match active.handle.await {
                Ok(verdict) => {
                    tracing::info!(
                        target: "overwatch.scheduler",
                        run_id = %run_id,
                        verdict = ?verdict,
                        "run finished"
                    );
                }
                Err(join_err) => {
                    tracing::error!(
                        target: "overwatch.scheduler",
                        run_id = %run_id,
                        error = %join_err,
                        "executor task panicked"
                    );
                    let _ = self
                        .store
                        .update_run(&active.slug, &run_id, |r| {
                            r.state = RunState::Failed;
                            r.status_message = "internal executor fault".to_string();
                        })
                        .await;
                    self.store.release_lock(&active.slug).await;
                }
            }
        }
    }
}
