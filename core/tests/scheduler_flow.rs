//! Dispatch ordering and lifecycle behavior across the scheduler: the
//! concurrency cap, scheduled-job promotion, pending cancellation and the
//! project lock during active runs.

mod common;

use chrono::Utc;
use overwatch_core::error::ApiError;
use overwatch_core::model::{LaunchMode, Project, RunState};
use overwatch_core::proxy::ProxyMeta;
use overwatch_core::scheduler::{CancelOutcome, SubmitRequest};
use overwatch_core::tools::ToolSet;

use common::{empty_toolset, harness, wait_terminal, Harness, MockTool};

/// Tool set whose resolver parks until cancelled, pinning every run inside
/// the liveness stage.
fn parked_toolset() -> ToolSet {
    ToolSet {
        resolver: MockTool::blocking("dnsx"),
        ..empty_toolset()
    }
}

async fn seed(h: &Harness, name: &str) {
    h.store
        .create_project(Project::new(
            name,
            vec![format!("{name}.example")],
            ProxyMeta::default(),
        ))
        .await
        .unwrap();
}

fn submit(slug: &str, mode: LaunchMode) -> SubmitRequest {
    SubmitRequest {
        slug: slug.to_string(),
        mode,
        scheduled_for: None,
        skip_subdomain_enum: false,
        proxy_credentials: None,
    }
}

/// Tick until a run record appears for the given run_id.
async fn wait_dispatched(h: &Harness, run_id: &str) {
    for _ in 0..200 {
        h.scheduler.tick().await;
        if h.store.find_run(run_id).await.is_some() {
            return;
        }
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    }
    panic!("run {run_id} was never dispatched");
}

#[tokio::test]
async fn test_queue_is_fifo_under_concurrency_cap() {
    let h = harness(parked_toolset(), 1);
    seed(&h, "gate").await;
    seed(&h, "acme").await;
    seed(&h, "beta").await;

    // Fill the single slot; the parked resolver keeps it occupied.
    let gate = h.scheduler.submit(submit("gate", LaunchMode::RunNow)).await.unwrap();
    assert!(h.store.find_run(&gate.run_id).await.is_some());

    let acme = h.scheduler.submit(submit("acme", LaunchMode::Queue)).await.unwrap();
    let beta = h.scheduler.submit(submit("beta", LaunchMode::Queue)).await.unwrap();

    h.scheduler.tick().await;
    assert_eq!(h.scheduler.active_count().await, 1);
    assert!(h.store.find_run(&acme.run_id).await.is_none());
    assert!(h.store.find_run(&beta.run_id).await.is_none());

    // Freeing the slot dispatches the queue head, not the newest entry.
    h.scheduler.cancel(&gate.run_id).await.unwrap();
    wait_dispatched(&h, &acme.run_id).await;
    assert!(h.store.find_run(&beta.run_id).await.is_none());
    assert!(h.scheduler.pending_for("beta").await.is_some());
}

#[tokio::test]
async fn test_run_now_waits_behind_earlier_queued_job_when_saturated() {
    let h = harness(parked_toolset(), 1);
    seed(&h, "gate").await;
    seed(&h, "acme").await;
    seed(&h, "beta").await;

    let gate = h.scheduler.submit(submit("gate", LaunchMode::RunNow)).await.unwrap();
    let acme = h.scheduler.submit(submit("acme", LaunchMode::Queue)).await.unwrap();
    // No free slot, so the run_now submission degrades to FIFO order.
    let beta = h.scheduler.submit(submit("beta", LaunchMode::RunNow)).await.unwrap();
    assert_eq!(beta.queue_position, 1);

    h.scheduler.cancel(&gate.run_id).await.unwrap();
    wait_dispatched(&h, &acme.run_id).await;
    assert!(h.store.find_run(&beta.run_id).await.is_none());
    assert!(h.scheduler.pending_for("beta").await.is_some());
}

#[tokio::test]
async fn test_due_scheduled_job_dispatches_ahead_of_queue() {
    let h = harness(parked_toolset(), 1);
    seed(&h, "gate").await;
    seed(&h, "acme").await;
    seed(&h, "beta").await;

    let gate = h.scheduler.submit(submit("gate", LaunchMode::RunNow)).await.unwrap();
    let acme = h.scheduler.submit(submit("acme", LaunchMode::Queue)).await.unwrap();
    let beta = h
        .scheduler
        .submit(SubmitRequest {
            scheduled_for: Some(Utc::now() + chrono::Duration::milliseconds(30)),
            ..submit("beta", LaunchMode::Schedule)
        })
        .await
        .unwrap();

    // Let the scheduled time pass before freeing the slot.
    tokio::time::sleep(std::time::Duration::from_millis(60)).await;
    h.scheduler.cancel(&gate.run_id).await.unwrap();

    wait_dispatched(&h, &beta.run_id).await;
    assert!(h.store.find_run(&acme.run_id).await.is_none());
}

#[tokio::test]
async fn test_cancel_scheduled_job_leaves_no_trace() {
    let h = harness(empty_toolset(), 1);
    seed(&h, "acme").await;

    let desc = h
        .scheduler
        .submit(SubmitRequest {
            scheduled_for: Some(Utc::now() + chrono::Duration::hours(1)),
            ..submit("acme", LaunchMode::Schedule)
        })
        .await
        .unwrap();
    assert_eq!(h.scheduler.queued_count().await, 1);

    let outcome = h.scheduler.cancel(&desc.run_id).await.unwrap();
    assert_eq!(outcome, CancelOutcome::PendingRemoved);
    assert_eq!(h.scheduler.queued_count().await, 0);
    assert!(h.store.find_run(&desc.run_id).await.is_none());

    // The project is free for a fresh submission.
    h.scheduler.submit(submit("acme", LaunchMode::Queue)).await.unwrap();
}

#[tokio::test]
async fn test_delete_is_rejected_while_job_pending() {
    let h = harness(parked_toolset(), 1);
    seed(&h, "gate").await;
    seed(&h, "beta").await;

    let gate = h.scheduler.submit(submit("gate", LaunchMode::RunNow)).await.unwrap();
    let beta = h.scheduler.submit(submit("beta", LaunchMode::Queue)).await.unwrap();

    // Pending jobs do not lock the project, so deletion must be refused
    // at the scheduler to avoid a job pointing at a missing project.
    assert!(!h.store.get_project("beta").await.unwrap().locked);
    let err = h.scheduler.delete_project("beta").await.unwrap_err();
    assert!(matches!(err, ApiError::Conflict(_)));
    assert!(h.store.project_exists("beta").await);

    h.scheduler.cancel(&beta.run_id).await.unwrap();
    h.scheduler.delete_project("beta").await.unwrap();
    assert!(h.scheduler.pending_for("beta").await.is_none());

    h.scheduler.cancel(&gate.run_id).await.unwrap();
}

#[tokio::test]
async fn test_delete_is_rejected_while_run_active() {
    let h = harness(parked_toolset(), 1);
    seed(&h, "acme").await;

    let desc = h.scheduler.submit(submit("acme", LaunchMode::RunNow)).await.unwrap();
    assert!(h.store.get_project("acme").await.unwrap().locked);

    let err = h.store.delete_project("acme").await.unwrap_err();
    assert!(matches!(err, ApiError::Conflict(_)));
    let err = h.scheduler.delete_project("acme").await.unwrap_err();
    assert!(matches!(err, ApiError::Conflict(_)));

    h.scheduler.cancel(&desc.run_id).await.unwrap();
    let run = wait_terminal(&h, "acme", &desc.run_id).await;
    assert_eq!(run.state, RunState::Cancelled);
    h.scheduler.delete_project("acme").await.unwrap();
}
