//! Job controller: the operator-facing surface of the pipeline.
//!
//! Creates jobs, starts schedulers (idempotently, via an in-process
//! registry of running jobs), and exposes pause/resume/cancel/retry.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use tracing::{info, warn};
use uuid::Uuid;

use prospecta_core::{
    CreateJobRequest, Enricher, Error, Job, JobKind, JobStatus, JobStore, PipelineConfig,
    QueueStats, Result, WorkItemStore,
};

use crate::scheduler::BatchScheduler;

/// In-process registry of jobs with a live scheduler. One scheduler per job:
/// registration is the mutual exclusion that makes `start` idempotent.
#[derive(Clone, Default)]
pub struct JobRegistry {
    active: Arc<Mutex<HashSet<Uuid>>>,
}

impl JobRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim a job slot. Returns false if the job already has a scheduler.
    pub fn try_register(&self, job_id: Uuid) -> bool {
        self.active.lock().unwrap().insert(job_id)
    }

    /// Release a job slot.
    pub fn deregister(&self, job_id: Uuid) {
        self.active.lock().unwrap().remove(&job_id);
    }

    /// Whether a scheduler is currently attached to the job.
    pub fn is_active(&self, job_id: Uuid) -> bool {
        self.active.lock().unwrap().contains(&job_id)
    }

    /// Number of jobs with live schedulers.
    pub fn active_count(&self) -> usize {
        self.active.lock().unwrap().len()
    }
}

/// Operator-facing pipeline controller.
pub struct JobController {
    jobs: Arc<dyn JobStore>,
    account_items: Arc<dyn WorkItemStore>,
    prospect_items: Arc<dyn WorkItemStore>,
    enrichers: HashMap<JobKind, Arc<dyn Enricher>>,
    config: PipelineConfig,
    registry: JobRegistry,
}

impl JobController {
    pub fn new(
        jobs: Arc<dyn JobStore>,
        account_items: Arc<dyn WorkItemStore>,
        prospect_items: Arc<dyn WorkItemStore>,
        config: PipelineConfig,
    ) -> Self {
        Self {
            jobs,
            account_items,
            prospect_items,
            enrichers: HashMap::new(),
            config: config.sanitized(),
            registry: JobRegistry::new(),
        }
    }

    /// Register the enricher serving a job kind. Replaces any previous
    /// registration for the same kind.
    pub fn register_enricher(&mut self, enricher: Arc<dyn Enricher>) {
        let kind = enricher.kind();
        if self.enrichers.insert(kind, enricher).is_some() {
            warn!(kind = %kind, "Replacing registered enricher");
        }
    }

    /// The registry of running jobs, for observability.
    pub fn registry(&self) -> &JobRegistry {
        &self.registry
    }

    fn item_store(&self, kind: JobKind) -> Arc<dyn WorkItemStore> {
        if kind.targets_prospects() {
            self.prospect_items.clone()
        } else {
            self.account_items.clone()
        }
    }

    /// Create a job over the given items and mark them pending. The job
    /// itself stays `pending` until [`JobController::start`].
    pub async fn create(&self, kind: JobKind, item_ids: &[Uuid]) -> Result<Uuid> {
        if item_ids.is_empty() {
            return Err(Error::InvalidInput("job needs at least one item".to_string()));
        }

        let job_id = self
            .jobs
            .create_job(CreateJobRequest {
                kind,
                total: item_ids.len() as i64,
            })
            .await?;

        let attached = self.item_store(kind).attach_pending(job_id, item_ids).await?;
        if attached != item_ids.len() as u64 {
            warn!(
                subsystem = "pipeline",
                component = "controller",
                job_id = %job_id,
                expected = item_ids.len(),
                attached,
                "Some items were not found when attaching to job"
            );
        }

        info!(
            subsystem = "pipeline",
            component = "controller",
            job_id = %job_id,
            kind = %kind,
            total = item_ids.len(),
            "Job created"
        );
        Ok(job_id)
    }

    /// Start a scheduler for the job. Idempotent: returns `Ok(false)` if
    /// the job is already running in this process, `Ok(true)` if a new
    /// scheduler was spawned. Terminal jobs are an error; reprocess them
    /// with [`JobController::reprocess`] first.
    pub async fn start(&self, job_id: Uuid) -> Result<bool> {
        let job = self.jobs.get_job(job_id).await?;
        if job.status.is_terminal() {
            return Err(Error::Job(format!(
                "job {job_id} is {}, reset it before starting",
                job.status.as_str()
            )));
        }

        let enricher = self
            .enrichers
            .get(&job.kind)
            .cloned()
            .ok_or_else(|| Error::Job(format!("no enricher registered for kind {}", job.kind)))?;

        if !self.registry.try_register(job_id) {
            info!(
                subsystem = "pipeline",
                component = "controller",
                job_id = %job_id,
                "Job already running, start is a no-op"
            );
            return Ok(false);
        }

        let scheduler = BatchScheduler::new(
            self.jobs.clone(),
            self.item_store(job.kind),
            enricher,
            self.config.clone(),
        );
        let registry = self.registry.clone();
        tokio::spawn(async move {
            // run() already logs and marks the job failed on error.
            let _ = scheduler.run(job_id).await;
            registry.deregister(job_id);
        });

        info!(
            subsystem = "pipeline",
            component = "controller",
            job_id = %job_id,
            kind = %job.kind,
            "Job started"
        );
        Ok(true)
    }

    /// Set the durable pause flag. In-flight items finish; the scheduler
    /// stops dispatching new batches on its next poll.
    pub async fn pause(&self, job_id: Uuid) -> Result<()> {
        self.jobs.set_paused(job_id, true).await
    }

    /// Clear the pause flag. A still-attached scheduler picks work back up
    /// on its next poll; after a restart, call [`JobController::start`].
    pub async fn resume(&self, job_id: Uuid) -> Result<()> {
        self.jobs.set_paused(job_id, false).await
    }

    /// Cancel a job: mark it `failed`, then put its in-flight items back to
    /// `pending` so no work is silently lost. The scheduler observes the
    /// terminal status at its next batch boundary and stops. Returns the
    /// number of items reset.
    pub async fn cancel(&self, job_id: Uuid) -> Result<u64> {
        let job = self.jobs.get_job(job_id).await?;
        if job.status.is_terminal() {
            return Err(Error::Job(format!(
                "job {job_id} is already {}",
                job.status.as_str()
            )));
        }

        self.jobs
            .update_status(job_id, JobStatus::Failed, None)
            .await?;
        let reset = self
            .item_store(job.kind)
            .reset_processing_for_job(job_id)
            .await?;

        info!(
            subsystem = "pipeline",
            component = "controller",
            job_id = %job_id,
            items_reset = reset,
            "Job cancelled"
        );
        Ok(reset)
    }

    /// Operator retry: put specific failed items back to `pending`.
    /// Returns the number of items reset. Does not restart the job.
    pub async fn retry_items(&self, job_id: Uuid, item_ids: &[Uuid]) -> Result<u64> {
        let job = self.jobs.get_job(job_id).await?;
        self.item_store(job.kind).reset_to_pending(item_ids).await
    }

    /// Operator reprocess: move a terminal job back to `pending` with
    /// zeroed counters. Items keep their statuses; pair with
    /// [`JobController::retry_items`] to requeue failures.
    pub async fn reprocess(&self, job_id: Uuid) -> Result<()> {
        self.jobs.reset_for_reprocessing(job_id).await
    }

    /// All jobs, newest first.
    pub async fn list(&self) -> Result<Vec<Job>> {
        self.jobs.list_jobs().await
    }

    /// Current job row and aggregate item counts.
    pub async fn progress(&self, job_id: Uuid) -> Result<(Job, QueueStats)> {
        let job = self.jobs.get_job(job_id).await?;
        let stats = self.item_store(job.kind).stats(job_id).await?;
        Ok((job, stats))
    }
}
