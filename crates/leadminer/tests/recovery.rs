//! Resuming persisted jobs after a restart.

mod common;

use common::{companies, TestHarness};
use leadminer::engine::ControlAction;
use leadminer::JobStatus;

#[tokio::test]
async fn hydrate_starts_one_worker_per_running_job() {
    let h = TestHarness::file_backed();
    let running = h.create_job(10);
    let paused = h.create_job(10);
    let cancelled = h.create_job(10);
    let completed = h.create_job(1);
    h.provider.push_page(companies(1..=1), vec![]);
    h.tick(&completed.id).await;
    h.engine
        .control_job(&paused.id, ControlAction::Pause)
        .unwrap();
    h.engine
        .control_job(&cancelled.id, ControlAction::Cancel)
        .unwrap();
    assert_eq!(h.job(&completed.id).status, JobStatus::Completed);

    let h = h.restart();
    assert!(h.engine.active_workers().is_empty());

    let started = h.engine.hydrate();
    assert_eq!(started, vec![running.id.clone()]);
    assert_eq!(h.engine.active_workers(), vec![running.id.clone()]);

    // A second hydration does not duplicate workers.
    assert!(h.engine.hydrate().is_empty());
    assert_eq!(h.engine.active_workers().len(), 1);
}

#[tokio::test]
async fn restarted_job_continues_from_persisted_cursor() {
    let h = TestHarness::file_backed();
    h.provider.push_page(companies(1..=4), vec![]);
    let job = h.create_job(10);
    h.tick(&job.id).await;

    let h = h.restart();
    h.engine.hydrate();
    h.provider.push_page(companies(3..=7), vec![]);
    h.tick(&job.id).await;

    assert_eq!(h.provider.requested_pages(), vec![2]);
    let job = h.job(&job.id);
    assert_eq!(job.pages_fetched, 2);
    assert_eq!(job.found_count, 7);
    assert_eq!(h.stored_lead_keys().len(), 7);
}

#[tokio::test]
async fn restart_keeps_leads_and_audit_trail() {
    let h = TestHarness::file_backed();
    h.provider.push_page(companies(1..=2), vec![]);
    let job = h.create_job(10);
    h.tick(&job.id).await;
    let audit_before = h.engine.audit().entries().len();
    assert!(h.db_path().is_some_and(|p| p.exists()));

    let h = h.restart();
    assert_eq!(h.engine.get_leads_for_job(&job.id).len(), 2);
    assert_eq!(h.engine.audit().entries().len(), audit_before);
    assert_eq!(h.engine.list_jobs().len(), 1);
}
