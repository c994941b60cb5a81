//! End-to-end pipeline tests over the in-memory stores and mock enricher.
//!
//! Cover the batch flow (fetch size, concurrency bound, settle-then-report),
//! pause gating, idempotent start, cancellation, retry exhaustion, operator
//! retry/reprocess, and crash-recovery continuation. Virtual time
//! (`start_paused`) makes the latency- and backoff-sensitive tests
//! deterministic.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::sleep;
use uuid::Uuid;

use prospecta_core::{
    Error, ItemStatus, JobKind, JobStatus, JobStore, PipelineConfig, WorkItemStore,
};
use prospecta_enrich::{MockEnricher, MockOutcome};
use prospecta_pipeline::testing::{MemoryItemStore, MemoryJobStore};
use prospecta_pipeline::JobController;

struct Harness {
    jobs: MemoryJobStore,
    accounts: MemoryItemStore,
    prospects: MemoryItemStore,
    mock: MockEnricher,
    controller: JobController,
}

fn harness_with_mock(mock: MockEnricher, config: PipelineConfig) -> Harness {
    let jobs = MemoryJobStore::new();
    let accounts = MemoryItemStore::new();
    let prospects = MemoryItemStore::new();

    let mut controller = JobController::new(
        Arc::new(jobs.clone()),
        Arc::new(accounts.clone()),
        Arc::new(prospects.clone()),
        config,
    );
    controller.register_enricher(Arc::new(mock.clone()));

    Harness {
        jobs,
        accounts,
        prospects,
        mock,
        controller,
    }
}

fn harness(kind: JobKind, config: PipelineConfig) -> Harness {
    harness_with_mock(MockEnricher::new(kind), config)
}

async fn wait_for_status(jobs: &MemoryJobStore, job_id: Uuid, status: JobStatus) {
    for _ in 0..10_000 {
        if jobs.get_job(job_id).await.unwrap().status == status {
            return;
        }
        sleep(Duration::from_millis(20)).await;
    }
    panic!("job {job_id} never reached {status:?}");
}

async fn wait_for_idle(controller: &JobController, job_id: Uuid) {
    for _ in 0..10_000 {
        if !controller.registry().is_active(job_id) {
            return;
        }
        sleep(Duration::from_millis(20)).await;
    }
    panic!("scheduler for job {job_id} never detached");
}

#[tokio::test(start_paused = true)]
async fn test_batch_flow_respects_concurrency_and_fetch_size() {
    let h = harness_with_mock(
        MockEnricher::new(JobKind::Research).with_latency(Duration::from_millis(100)),
        PipelineConfig::default()
            .with_concurrency(5)
            .with_retry_delay_ms(10),
    );

    let ids = h.accounts.seed_items(12);
    let job_id = h.controller.create(JobKind::Research, &ids).await.unwrap();

    assert!(h.controller.start(job_id).await.unwrap());
    wait_for_status(&h.jobs, job_id, JobStatus::Completed).await;
    wait_for_idle(&h.controller, job_id).await;

    let job = h.jobs.get_job(job_id).await.unwrap();
    assert_eq!(job.processed_count, 12);
    assert_eq!(job.failed_count, 0);
    assert!(job.completed_at.is_some());

    // 12 items at a fetch size of 2 * 5: a full batch of 10, a batch of 2,
    // and the empty fetch that completes the job.
    assert_eq!(h.accounts.fetch_count(), 3);
    assert_eq!(h.mock.call_count(), 12);
    assert!(
        h.mock.max_active() <= 5,
        "observed {} concurrent enrichments",
        h.mock.max_active()
    );
    assert_eq!(h.accounts.count_with_status(ItemStatus::Completed), 12);

    // Progress is reported once per settled batch and only moves forward.
    let log = h.jobs.progress_log();
    assert_eq!(log.last(), Some(&(12, 0)));
    for pair in log.windows(2) {
        assert!(pair[1].0 >= pair[0].0, "processed count went backwards");
        assert!(pair[1].1 >= pair[0].1, "failed count went backwards");
    }
}

#[tokio::test(start_paused = true)]
async fn test_exhausted_item_fails_without_failing_the_job() {
    let h = harness(
        JobKind::Categorize,
        PipelineConfig::default()
            .with_concurrency(2)
            .with_max_retries(3)
            .with_retry_delay_ms(10),
    );

    let ids = h.accounts.seed_items(3);
    // One item burns its whole budget; the other two sail through.
    h.mock.script(
        ids[1],
        std::iter::repeat_with(|| MockOutcome::Transient).take(4),
    );

    let job_id = h
        .controller
        .create(JobKind::Categorize, &ids)
        .await
        .unwrap();
    assert!(h.controller.start(job_id).await.unwrap());
    wait_for_status(&h.jobs, job_id, JobStatus::Completed).await;

    let job = h.jobs.get_job(job_id).await.unwrap();
    assert_eq!(job.processed_count, 2);
    assert_eq!(job.failed_count, 1);
    assert_eq!(h.mock.calls_for(ids[1]), 4);

    let failed = h.accounts.get(ids[1]).await.unwrap();
    assert_eq!(failed.status, ItemStatus::Failed);
    assert!(failed
        .error_message
        .as_deref()
        .unwrap_or_default()
        .contains("mock transient failure"));
    assert_eq!(h.accounts.count_with_status(ItemStatus::Completed), 2);
}

#[tokio::test(start_paused = true)]
async fn test_start_is_idempotent_while_running() {
    let h = harness_with_mock(
        MockEnricher::new(JobKind::Research).with_latency(Duration::from_millis(500)),
        PipelineConfig::default(),
    );

    let ids = h.accounts.seed_items(4);
    let job_id = h.controller.create(JobKind::Research, &ids).await.unwrap();

    assert!(h.controller.start(job_id).await.unwrap());
    assert!(!h.controller.start(job_id).await.unwrap());
    assert_eq!(h.controller.registry().active_count(), 1);

    wait_for_status(&h.jobs, job_id, JobStatus::Completed).await;
    wait_for_idle(&h.controller, job_id).await;

    // Exactly one scheduler ran: every item enriched once.
    assert_eq!(h.mock.call_count(), 4);

    // A terminal job cannot be started again without a reset.
    assert!(matches!(
        h.controller.start(job_id).await,
        Err(Error::Job(_))
    ));
}

#[tokio::test]
async fn test_start_without_registered_enricher_is_an_error() {
    let jobs = MemoryJobStore::new();
    let accounts = MemoryItemStore::new();
    let prospects = MemoryItemStore::new();
    let controller = JobController::new(
        Arc::new(jobs.clone()),
        Arc::new(accounts.clone()),
        Arc::new(prospects),
        PipelineConfig::default(),
    );

    let ids = accounts.seed_items(1);
    let job_id = controller.create(JobKind::Triage, &ids).await.unwrap();

    assert!(matches!(controller.start(job_id).await, Err(Error::Job(_))));
    assert!(!controller.registry().is_active(job_id));
}

#[tokio::test]
async fn test_create_requires_items() {
    let h = harness(JobKind::Research, PipelineConfig::default());
    assert!(matches!(
        h.controller.create(JobKind::Research, &[]).await,
        Err(Error::InvalidInput(_))
    ));
}

#[tokio::test(start_paused = true)]
async fn test_pause_gates_dispatch_until_resume() {
    let h = harness(JobKind::Research, PipelineConfig::default());

    let ids = h.accounts.seed_items(4);
    let job_id = h.controller.create(JobKind::Research, &ids).await.unwrap();

    // Paused before start: the scheduler attaches but never fetches.
    h.controller.pause(job_id).await.unwrap();
    assert!(h.controller.start(job_id).await.unwrap());

    sleep(Duration::from_secs(30)).await;
    assert_eq!(h.accounts.fetch_count(), 0);
    assert_eq!(h.mock.call_count(), 0);
    let job = h.jobs.get_job(job_id).await.unwrap();
    assert_eq!(job.status, JobStatus::Processing);
    assert!(job.paused);

    h.controller.resume(job_id).await.unwrap();
    wait_for_status(&h.jobs, job_id, JobStatus::Completed).await;
    assert_eq!(h.jobs.get_job(job_id).await.unwrap().processed_count, 4);
}

#[tokio::test(start_paused = true)]
async fn test_pause_mid_run_lets_the_dispatched_batch_settle() {
    let h = harness_with_mock(
        MockEnricher::new(JobKind::Research).with_latency(Duration::from_millis(500)),
        PipelineConfig::default().with_concurrency(2),
    );

    let ids = h.accounts.seed_items(8);
    let job_id = h.controller.create(JobKind::Research, &ids).await.unwrap();
    assert!(h.controller.start(job_id).await.unwrap());

    // Let the first batch of 4 get dispatched, then pause while it is in
    // flight.
    sleep(Duration::from_millis(1)).await;
    assert_eq!(h.accounts.fetch_count(), 1);
    h.controller.pause(job_id).await.unwrap();

    // The in-flight batch lands and its progress is recorded; several pause
    // polls later there is still no second fetch.
    sleep(Duration::from_secs(12)).await;
    assert_eq!(h.accounts.fetch_count(), 1);
    assert_eq!(h.mock.call_count(), 4);
    assert_eq!(h.accounts.count_with_status(ItemStatus::Completed), 4);
    let job = h.jobs.get_job(job_id).await.unwrap();
    assert_eq!(job.status, JobStatus::Processing);
    assert!(job.paused);
    assert_eq!(job.processed_count, 4);

    h.controller.resume(job_id).await.unwrap();
    wait_for_status(&h.jobs, job_id, JobStatus::Completed).await;
    let job = h.jobs.get_job(job_id).await.unwrap();
    assert_eq!(job.processed_count, 8);
    assert_eq!(h.mock.call_count(), 8);
}

#[tokio::test(start_paused = true)]
async fn test_cancel_stops_a_paused_scheduler_without_fetching() {
    let h = harness(JobKind::Research, PipelineConfig::default());

    let ids = h.accounts.seed_items(4);
    let job_id = h.controller.create(JobKind::Research, &ids).await.unwrap();
    h.controller.pause(job_id).await.unwrap();
    assert!(h.controller.start(job_id).await.unwrap());
    sleep(Duration::from_secs(5)).await;

    h.controller.cancel(job_id).await.unwrap();
    h.controller.resume(job_id).await.unwrap();
    wait_for_idle(&h.controller, job_id).await;

    let job = h.jobs.get_job(job_id).await.unwrap();
    assert_eq!(job.status, JobStatus::Failed);
    assert_eq!(h.accounts.fetch_count(), 0);
    assert_eq!(h.mock.call_count(), 0);
    // Nothing was in flight, so everything is still pending.
    assert_eq!(h.accounts.count_with_status(ItemStatus::Pending), 4);
}

#[tokio::test]
async fn test_cancel_resets_in_flight_items() {
    let h = harness(JobKind::Research, PipelineConfig::default());

    let ids = h.accounts.seed_items(6);
    let job_id = h.controller.create(JobKind::Research, &ids).await.unwrap();
    h.jobs
        .update_status(job_id, JobStatus::Processing, None)
        .await
        .unwrap();
    for id in &ids[0..3] {
        h.accounts.set_status(*id, ItemStatus::Processing);
    }

    let reset = h.controller.cancel(job_id).await.unwrap();
    assert_eq!(reset, 3);

    let job = h.jobs.get_job(job_id).await.unwrap();
    assert_eq!(job.status, JobStatus::Failed);
    assert!(job.completed_at.is_some());
    assert_eq!(h.accounts.count_with_status(ItemStatus::Processing), 0);
    assert_eq!(h.accounts.count_with_status(ItemStatus::Pending), 6);

    // Cancelling a terminal job is rejected.
    assert!(matches!(
        h.controller.cancel(job_id).await,
        Err(Error::Job(_))
    ));
}

#[tokio::test]
async fn test_terminal_status_is_sticky_in_the_store() {
    let h = harness(JobKind::Research, PipelineConfig::default());
    let ids = h.accounts.seed_items(1);
    let job_id = h.controller.create(JobKind::Research, &ids).await.unwrap();

    h.jobs
        .update_status(job_id, JobStatus::Failed, None)
        .await
        .unwrap();

    // A late scheduler write cannot resurrect the job.
    assert!(matches!(
        h.jobs
            .update_status(job_id, JobStatus::Processing, None)
            .await,
        Err(Error::Job(_))
    ));
    assert_eq!(
        h.jobs.get_job(job_id).await.unwrap().status,
        JobStatus::Failed
    );
}

#[tokio::test(start_paused = true)]
async fn test_retry_and_reprocess_requeue_a_failed_item() {
    let h = harness(
        JobKind::Research,
        PipelineConfig::default()
            .with_max_retries(1)
            .with_retry_delay_ms(10),
    );

    let ids = h.accounts.seed_items(2);
    h.mock.script(
        ids[0],
        [MockOutcome::Transient, MockOutcome::Transient],
    );

    let job_id = h.controller.create(JobKind::Research, &ids).await.unwrap();
    assert!(h.controller.start(job_id).await.unwrap());
    wait_for_status(&h.jobs, job_id, JobStatus::Completed).await;
    wait_for_idle(&h.controller, job_id).await;
    assert_eq!(h.accounts.count_with_status(ItemStatus::Failed), 1);

    // Operator path: requeue the failed item, reset the job, run again.
    // The mock's script is exhausted, so the retried call succeeds.
    assert_eq!(h.controller.retry_items(job_id, &ids[0..1]).await.unwrap(), 1);
    h.controller.reprocess(job_id).await.unwrap();
    assert!(h.controller.start(job_id).await.unwrap());
    wait_for_status(&h.jobs, job_id, JobStatus::Completed).await;

    let job = h.jobs.get_job(job_id).await.unwrap();
    assert_eq!(job.processed_count, 1);
    assert_eq!(job.failed_count, 0);
    assert_eq!(h.accounts.count_with_status(ItemStatus::Completed), 2);
}

#[tokio::test(start_paused = true)]
async fn test_recovered_items_are_picked_up_on_restart() {
    let h = harness(JobKind::Research, PipelineConfig::default());

    let ids = h.accounts.seed_items(5);
    let job_id = h.controller.create(JobKind::Research, &ids).await.unwrap();

    // Simulate a crash mid-batch: two items stranded in processing.
    h.jobs
        .update_status(job_id, JobStatus::Processing, None)
        .await
        .unwrap();
    h.accounts.set_status(ids[0], ItemStatus::Processing);
    h.accounts.set_status(ids[1], ItemStatus::Processing);

    let recovered = h.accounts.recover_stuck().await.unwrap();
    assert_eq!(recovered, 2);
    assert_eq!(h.accounts.count_with_status(ItemStatus::Pending), 5);

    // A fresh process has an empty registry; start picks the job back up.
    assert!(h.controller.start(job_id).await.unwrap());
    wait_for_status(&h.jobs, job_id, JobStatus::Completed).await;
    assert_eq!(h.jobs.get_job(job_id).await.unwrap().processed_count, 5);
}

#[tokio::test(start_paused = true)]
async fn test_prospect_kind_routes_to_prospect_store() {
    let h = harness(JobKind::ProspectEnrich, PipelineConfig::default());

    let ids = h.prospects.seed_items(3);
    let job_id = h
        .controller
        .create(JobKind::ProspectEnrich, &ids)
        .await
        .unwrap();
    assert!(h.controller.start(job_id).await.unwrap());
    wait_for_status(&h.jobs, job_id, JobStatus::Completed).await;

    assert_eq!(h.prospects.count_with_status(ItemStatus::Completed), 3);
    assert_eq!(h.accounts.fetch_count(), 0);

    let (job, stats) = h.controller.progress(job_id).await.unwrap();
    assert_eq!(job.processed_count, 3);
    assert_eq!(stats.completed, 3);
    assert_eq!(stats.total, 3);

    let jobs = h.controller.list().await.unwrap();
    assert_eq!(jobs.len(), 1);
    assert_eq!(jobs[0].id, job_id);
}
