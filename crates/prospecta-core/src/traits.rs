//! Store traits for the durable pipeline state.
//!
//! The durable store exclusively owns persisted state: every status change is
//! written through before being considered effective. Implementations live in
//! `prospecta-db` (PostgreSQL) and `prospecta-pipeline::testing` (in-memory).

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::Result;
use crate::models::{CreateJobRequest, EnrichmentPatch, Job, JobStatus, QueueStats, WorkItem};

/// Repository for job records and aggregate progress.
#[async_trait]
pub trait JobStore: Send + Sync {
    /// Create a job in `pending` with the given item total.
    async fn create_job(&self, req: CreateJobRequest) -> Result<Uuid>;

    /// Fetch a job by id.
    async fn get_job(&self, id: Uuid) -> Result<Job>;

    /// List all jobs, newest first.
    async fn list_jobs(&self) -> Result<Vec<Job>>;

    /// Set job status, optionally advancing the advisory current-item
    /// pointer. Stamps `completed_at` once on the first transition to a
    /// terminal status; calling with the same status twice is a no-op
    /// side-effect-wise.
    ///
    /// Terminal statuses are sticky: once a job is `completed` or `failed`,
    /// writing a non-terminal status fails with [`crate::Error::Job`]. This
    /// is what lets a cancellation win the race against a scheduler that is
    /// mid-batch. Only [`JobStore::reset_for_reprocessing`] moves a job out
    /// of a terminal state.
    async fn update_status(
        &self,
        id: Uuid,
        status: JobStatus,
        current_item: Option<Uuid>,
    ) -> Result<()>;

    /// Write aggregate progress counters.
    async fn update_progress(&self, id: Uuid, processed: i64, failed: i64) -> Result<()>;

    /// Toggle the durable pause flag. The scheduler observes it on its next
    /// poll.
    async fn set_paused(&self, id: Uuid, paused: bool) -> Result<()>;

    /// Deliberate operator action: put a terminal job back to `pending` with
    /// zeroed counters so it can be reprocessed. Never invoked by the
    /// pipeline itself.
    async fn reset_for_reprocessing(&self, id: Uuid) -> Result<()>;
}

/// Repository for the work items a job processes.
///
/// Two Postgres implementations share this contract (accounts and
/// prospects); the pipeline is generic over it.
#[async_trait]
pub trait WorkItemStore: Send + Sync {
    /// Attach existing items to a job and mark them `pending`.
    async fn attach_pending(&self, job_id: Uuid, item_ids: &[Uuid]) -> Result<u64>;

    /// Fetch up to `limit` pending items for a job, ascending id order.
    async fn get_pending(&self, job_id: Uuid, limit: i64) -> Result<Vec<WorkItem>>;

    /// Fetch one item by id.
    async fn get(&self, id: Uuid) -> Result<WorkItem>;

    /// Mark an item `processing` immediately before dispatch.
    async fn mark_processing(&self, id: Uuid) -> Result<()>;

    /// Persist enrichment results onto the item's domain fields and mark it
    /// `completed`, in one transaction.
    async fn complete(&self, id: Uuid, patch: EnrichmentPatch) -> Result<()>;

    /// Mark an item `failed` with a human-readable error message, after the
    /// retry budget is exhausted.
    async fn fail(&self, id: Uuid, error: &str) -> Result<()>;

    /// Operator retry: reset specific items to `pending`, clearing error
    /// state. Returns the number of items reset.
    async fn reset_to_pending(&self, item_ids: &[Uuid]) -> Result<u64>;

    /// Cancel path: reset a job's in-flight (`processing`) items to
    /// `pending` so they are not silently lost on restart.
    async fn reset_processing_for_job(&self, job_id: Uuid) -> Result<u64>;

    /// Crash recovery: reset every item left `processing` by a previous
    /// process to `pending`, clearing any stale error message. Run once at
    /// store initialization.
    async fn recover_stuck(&self) -> Result<u64>;

    /// Aggregate item counts for a job.
    async fn stats(&self, job_id: Uuid) -> Result<QueueStats>;
}
