//! In-process Job/Run store keyed by `(project slug, run_id)`.
//!
//! Listing and reads are snapshot reads (shared lock, cloned records). The
//! per-project exclusive lock is a record flag acquired by the executor at
//! dispatch and released at terminal state; API-layer mutations take the
//! same flag and fail with a conflict while it is held.

use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::RwLock;

use crate::error::ApiError;
use crate::model::{transitions, Project, Run, RunState};

#[derive(Debug, Clone)]
struct ProjectEntry {
    project: Project,
    /// BTreeMap keeps runs in run_id (timestamp) order.
    runs: BTreeMap<String, Run>,
}

/// Shared store handle. Clones are cheap and point at the same state.
#[derive(Debug, Clone, Default)]
pub struct JobRunStore {
    inner: Arc<RwLock<HashMap<String, ProjectEntry>>>,
}

impl JobRunStore {
    pub fn new() -> Self {
        Self::default()
    }

    // ============= Projects =============

    /// Create a project. Duplicate slugs are a conflict.
    pub async fn create_project(&self, project: Project) -> Result<(), ApiError> {
        let mut inner = self.inner.write().await;
        if inner.contains_key(&project.slug) {
            return Err(ApiError::Conflict(format!(
                "project '{}' already exists",
                project.slug
            )));
        }
        inner.insert(
            project.slug.clone(),
            ProjectEntry {
                project,
                runs: BTreeMap::new(),
            },
        );
        Ok(())
    }

    pub async fn get_project(&self, slug: &str) -> Result<Project, ApiError> {
        let inner = self.inner.read().await;
        inner
            .get(slug)
            .map(|e| e.project.clone())
            .ok_or_else(|| ApiError::NotFound(format!("project '{slug}'")))
    }

    pub async fn project_exists(&self, slug: &str) -> bool {
        self.inner.read().await.contains_key(slug)
    }

    /// Replace mutable project fields (name, targets, proxy metadata).
    /// Rejected while the project lock is held.
    pub async fn update_project(
        &self,
        slug: &str,
        name: &str,
        targets: Vec<String>,
        proxy: crate::proxy::ProxyMeta,
    ) -> Result<(), ApiError> {
        let mut inner = self.inner.write().await;
        let entry = inner
            .get_mut(slug)
            .ok_or_else(|| ApiError::NotFound(format!("project '{slug}'")))?;
        if entry.project.locked {
            return Err(ApiError::Conflict(format!(
                "project '{slug}' has an active run"
            )));
        }
        entry.project.name = name.to_string();
        entry.project.targets = targets;
        entry.project.proxy = proxy;
        Ok(())
    }

    /// Delete a project and its run records. Rejected while locked.
    pub async fn delete_project(&self, slug: &str) -> Result<(), ApiError> {
        let mut inner = self.inner.write().await;
        let entry = inner
            .get(slug)
            .ok_or_else(|| ApiError::NotFound(format!("project '{slug}'")))?;
        if entry.project.locked {
            return Err(ApiError::Conflict(format!(
                "project '{slug}' has an active run"
            )));
        }
        inner.remove(slug);
        Ok(())
    }

    /// Snapshot of every project with its most recent run, ordered by
    /// project creation time.
    pub async fn list_projects(&self) -> Vec<(Project, Option<Run>)> {
        let inner = self.inner.read().await;
        let mut rows: Vec<(Project, Option<Run>)> = inner
            .values()
            .map(|e| {
                let latest = e.runs.values().next_back().cloned();
                (e.project.clone(), latest)
            })
            .collect();
        rows.sort_by_key(|(p, _)| p.created_at);
        rows
    }

    // ============= Project lock =============

    /// Exclusive per-project lock, taken by the executor at dispatch.
    pub async fn acquire_lock(&self, slug: &str) -> Result<(), ApiError> {
        let mut inner = self.inner.write().await;
        let entry = inner
            .get_mut(slug)
            .ok_or_else(|| ApiError::NotFound(format!("project '{slug}'")))?;
        if entry.project.locked {
            return Err(ApiError::Conflict(format!(
                "project '{slug}' is already locked"
            )));
        }
        entry.project.locked = true;
        Ok(())
    }

    pub async fn release_lock(&self, slug: &str) {
        let mut inner = self.inner.write().await;
        if let Some(entry) = inner.get_mut(slug) {
            entry.project.locked = false;
        }
    }

    // ============= Runs =============

    /// Allocate a run_id unique within the project. Submission-second
    /// granularity; same-second collisions get a disambiguating suffix.
    pub async fn allocate_run_id(&self, slug: &str) -> String {
        let base = Utc::now().format("%Y%m%d-%H%M%S").to_string();
        let inner = self.inner.read().await;
        let Some(entry) = inner.get(slug) else {
            return base;
        };
        if !entry.runs.contains_key(&base) {
            return base;
        }
        let mut n = 2;
        loop {
            let candidate = format!("{base}-{n}");
            if !entry.runs.contains_key(&candidate) {
                return candidate;
            }
            n += 1;
        }
    }

    /// Insert a freshly dispatched run record. The run_id must not collide.
    pub async fn create_run(&self, run: Run) -> Result<(), ApiError> {
        let mut inner = self.inner.write().await;
        let entry = inner
            .get_mut(&run.project_slug)
            .ok_or_else(|| ApiError::NotFound(format!("project '{}'", run.project_slug)))?;
        if entry.runs.contains_key(&run.run_id) {
            return Err(ApiError::Conflict(format!(
                "run '{}' already exists for '{}'",
                run.run_id, run.project_slug
            )));
        }
        entry.runs.insert(run.run_id.clone(), run);
        Ok(())
    }

    pub async fn get_run(&self, slug: &str, run_id: &str) -> Result<Run, ApiError> {
        let inner = self.inner.read().await;
        inner
            .get(slug)
            .and_then(|e| e.runs.get(run_id))
            .cloned()
            .ok_or_else(|| ApiError::NotFound(format!("run '{run_id}' of '{slug}'")))
    }

    /// Locate a run by id alone (run ids embed a timestamp, collisions
    /// across projects are broken by first match in slug order).
    pub async fn find_run(&self, run_id: &str) -> Option<Run> {
        let inner = self.inner.read().await;
        let mut slugs: Vec<&String> = inner.keys().collect();
        slugs.sort();
        for slug in slugs {
            if let Some(run) = inner.get(slug).and_then(|e| e.runs.get(run_id)) {
                return Some(run.clone());
            }
        }
        None
    }

    /// Mutate a run under the store lock. Progress regressions are ignored
    /// so `progress.step` stays monotonically non-decreasing, and state
    /// changes must be legal transitions.
    pub async fn update_run<F>(&self, slug: &str, run_id: &str, mutate: F) -> Result<Run, ApiError>
    where
        F: FnOnce(&mut Run),
    {
        let mut inner = self.inner.write().await;
        let run = inner
            .get_mut(slug)
            .and_then(|e| e.runs.get_mut(run_id))
            .ok_or_else(|| ApiError::NotFound(format!("run '{run_id}' of '{slug}'")))?;

        let prev_state = run.state;
        let prev_step = run.progress.step;
        mutate(run);

        if run.progress.step < prev_step {
            tracing::warn!(
                target: "overwatch.store",
                run_id = %run_id,
                from = prev_step,
                to = run.progress.step,
                "ignoring progress regression"
            );
            run.progress.step = prev_step;
        }

        if run.state != prev_state {
            transitions::validate(prev_state, run.state)
                .map_err(|e| ApiError::Internal(e.to_string()))?;
            if run.state.is_terminal() {
                run.finished_at = Some(Utc::now());
            }
        }

        Ok(run.clone())
    }

    /// Attach the synthesized report to a terminal run.
    pub async fn attach_report(
        &self,
        slug: &str,
        run_id: &str,
        report: PathBuf,
    ) -> Result<(), ApiError> {
        let mut inner = self.inner.write().await;
        let run = inner
            .get_mut(slug)
            .and_then(|e| e.runs.get_mut(run_id))
            .ok_or_else(|| ApiError::NotFound(format!("run '{run_id}' of '{slug}'")))?;
        run.report_path = Some(report);
        Ok(())
    }
}
