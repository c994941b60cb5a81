//! Batch scheduler: drives one job from `processing` to a terminal status.
//!
//! Loop shape per batch: observe pause and cancellation, fetch up to twice
//! the concurrency limit of pending items, dispatch them through a
//! semaphore so at most `concurrency` enrichments are in flight, wait for
//! the whole batch to settle, then write aggregate progress. An empty fetch
//! means the job is done.

use std::sync::Arc;
use std::time::Instant;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio::time::sleep;
use tracing::{debug, error, info};

use prospecta_core::{
    retry::BackoffPolicy, Enricher, Error, JobStatus, JobStore, PipelineConfig, Result,
    WorkItemStore,
};
use uuid::Uuid;

use crate::processor::{ItemOutcome, WorkUnitProcessor};

/// Runs one job's batches to completion.
pub struct BatchScheduler {
    jobs: Arc<dyn JobStore>,
    items: Arc<dyn WorkItemStore>,
    enricher: Arc<dyn Enricher>,
    config: PipelineConfig,
}

impl BatchScheduler {
    pub fn new(
        jobs: Arc<dyn JobStore>,
        items: Arc<dyn WorkItemStore>,
        enricher: Arc<dyn Enricher>,
        config: PipelineConfig,
    ) -> Self {
        Self {
            jobs,
            items,
            enricher,
            config,
        }
    }

    /// Run the job to a terminal status. Unexpected errors (store outages,
    /// poisoned state) mark the job `failed` before surfacing, so a job
    /// never stays `processing` with no scheduler attached.
    pub async fn run(&self, job_id: Uuid) -> Result<()> {
        let start = Instant::now();
        match self.drive(job_id).await {
            Ok(()) => {
                info!(
                    subsystem = "pipeline",
                    component = "scheduler",
                    job_id = %job_id,
                    duration_ms = start.elapsed().as_millis() as u64,
                    "Job run finished"
                );
                Ok(())
            }
            Err(e) => {
                error!(
                    subsystem = "pipeline",
                    component = "scheduler",
                    job_id = %job_id,
                    error = %e,
                    "Job run aborted, marking job failed"
                );
                // Terminal stickiness makes this a no-op when the abort was
                // itself caused by a concurrent cancellation.
                if let Err(mark_err) = self
                    .jobs
                    .update_status(job_id, JobStatus::Failed, None)
                    .await
                {
                    error!(
                        subsystem = "pipeline",
                        component = "scheduler",
                        job_id = %job_id,
                        error = %mark_err,
                        "Failed to mark aborted job failed"
                    );
                }
                Err(e)
            }
        }
    }

    async fn drive(&self, job_id: Uuid) -> Result<()> {
        let job = self.jobs.get_job(job_id).await?;
        if job.status.is_terminal() {
            return Err(Error::Job(format!(
                "job {job_id} is already {}",
                job.status.as_str()
            )));
        }

        self.jobs
            .update_status(job_id, JobStatus::Processing, None)
            .await?;

        let processor = WorkUnitProcessor::new(
            self.items.clone(),
            self.enricher.clone(),
            BackoffPolicy::new(self.config.retry_delay(), self.config.max_retries),
        );
        let semaphore = Arc::new(Semaphore::new(self.config.concurrency));

        // Resume-friendly: progress counters continue from the stored row
        // rather than restarting at zero.
        let mut processed = job.processed_count;
        let mut failed = job.failed_count;

        loop {
            let job = self.jobs.get_job(job_id).await?;

            // Cancellation marks the job failed out-of-band; stop fetching
            // and leave item cleanup to the cancel path.
            if job.status == JobStatus::Failed {
                info!(
                    subsystem = "pipeline",
                    component = "scheduler",
                    job_id = %job_id,
                    "Job cancelled, stopping"
                );
                return Ok(());
            }

            if job.paused {
                debug!(
                    subsystem = "pipeline",
                    component = "scheduler",
                    job_id = %job_id,
                    "Job paused, waiting"
                );
                sleep(self.config.pause_poll()).await;
                continue;
            }

            let batch = self.items.get_pending(job_id, self.config.batch_size()).await?;
            if batch.is_empty() {
                self.jobs
                    .update_status(job_id, JobStatus::Completed, None)
                    .await?;
                info!(
                    subsystem = "pipeline",
                    component = "scheduler",
                    job_id = %job_id,
                    processed,
                    failed,
                    "Job completed"
                );
                return Ok(());
            }

            debug!(
                subsystem = "pipeline",
                component = "scheduler",
                job_id = %job_id,
                batch_len = batch.len(),
                "Dispatching batch"
            );
            self.jobs
                .update_status(job_id, JobStatus::Processing, batch.first().map(|i| i.id))
                .await?;

            let mut tasks = JoinSet::new();
            for item in batch {
                let permit = semaphore
                    .clone()
                    .acquire_owned()
                    .await
                    .map_err(|_| Error::Internal("concurrency semaphore closed".to_string()))?;
                let processor = processor.clone();
                tasks.spawn(async move {
                    let outcome = processor.process(item).await;
                    drop(permit);
                    outcome
                });
            }

            // Settle the whole batch before writing progress: counters only
            // ever move forward, once per batch.
            while let Some(result) = tasks.join_next().await {
                match result {
                    Ok(ItemOutcome::Completed) => processed += 1,
                    Ok(ItemOutcome::Failed) => failed += 1,
                    Err(e) => {
                        error!(
                            subsystem = "pipeline",
                            component = "scheduler",
                            job_id = %job_id,
                            error = ?e,
                            "Item task panicked"
                        );
                        failed += 1;
                    }
                }
            }

            self.jobs.update_progress(job_id, processed, failed).await?;

            if let Some(delay) = self.config.batch_delay() {
                sleep(delay).await;
            }
        }
    }
}
