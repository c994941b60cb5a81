//! In-memory store implementations for tests.
//!
//! Honor the same contracts as the PostgreSQL stores, including sticky
//! terminal job statuses and the ascending-id pending order, plus a few
//! instrumentation hooks (fetch counter, progress log) the tests assert on.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use prospecta_core::{
    new_v7, CreateJobRequest, EnrichmentPatch, Error, ItemStatus, Job, JobStatus, JobStore,
    QueueStats, Result, WorkItem, WorkItemStore,
};

/// In-memory [`JobStore`]. Records every progress write so tests can assert
/// counters only ever move forward.
#[derive(Clone, Default)]
pub struct MemoryJobStore {
    jobs: Arc<Mutex<HashMap<Uuid, Job>>>,
    progress_log: Arc<Mutex<Vec<(i64, i64)>>>,
}

impl MemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every `(processed, failed)` pair written via `update_progress`.
    pub fn progress_log(&self) -> Vec<(i64, i64)> {
        self.progress_log.lock().unwrap().clone()
    }
}

#[async_trait]
impl JobStore for MemoryJobStore {
    async fn create_job(&self, req: CreateJobRequest) -> Result<Uuid> {
        let id = new_v7();
        let now = Utc::now();
        self.jobs.lock().unwrap().insert(
            id,
            Job {
                id,
                kind: req.kind,
                status: JobStatus::Pending,
                total: req.total,
                processed_count: 0,
                failed_count: 0,
                current_item_id: None,
                paused: false,
                created_at: now,
                updated_at: now,
                completed_at: None,
            },
        );
        Ok(id)
    }

    async fn get_job(&self, id: Uuid) -> Result<Job> {
        self.jobs
            .lock()
            .unwrap()
            .get(&id)
            .cloned()
            .ok_or(Error::JobNotFound(id))
    }

    async fn list_jobs(&self) -> Result<Vec<Job>> {
        let mut jobs: Vec<Job> = self.jobs.lock().unwrap().values().cloned().collect();
        jobs.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(jobs)
    }

    async fn update_status(
        &self,
        id: Uuid,
        status: JobStatus,
        current_item: Option<Uuid>,
    ) -> Result<()> {
        let mut jobs = self.jobs.lock().unwrap();
        let job = jobs.get_mut(&id).ok_or(Error::JobNotFound(id))?;

        if job.status.is_terminal() && !status.is_terminal() {
            return Err(Error::Job(format!(
                "job {id} is {} and cannot move to {}",
                job.status.as_str(),
                status.as_str()
            )));
        }

        job.status = status;
        if current_item.is_some() {
            job.current_item_id = current_item;
        }
        if status.is_terminal() && job.completed_at.is_none() {
            job.completed_at = Some(Utc::now());
        }
        job.updated_at = Utc::now();
        Ok(())
    }

    async fn update_progress(&self, id: Uuid, processed: i64, failed: i64) -> Result<()> {
        let mut jobs = self.jobs.lock().unwrap();
        let job = jobs.get_mut(&id).ok_or(Error::JobNotFound(id))?;
        job.processed_count = processed;
        job.failed_count = failed;
        job.updated_at = Utc::now();
        self.progress_log.lock().unwrap().push((processed, failed));
        Ok(())
    }

    async fn set_paused(&self, id: Uuid, paused: bool) -> Result<()> {
        let mut jobs = self.jobs.lock().unwrap();
        let job = jobs.get_mut(&id).ok_or(Error::JobNotFound(id))?;
        job.paused = paused;
        job.updated_at = Utc::now();
        Ok(())
    }

    async fn reset_for_reprocessing(&self, id: Uuid) -> Result<()> {
        let mut jobs = self.jobs.lock().unwrap();
        let job = jobs.get_mut(&id).ok_or(Error::JobNotFound(id))?;
        job.status = JobStatus::Pending;
        job.processed_count = 0;
        job.failed_count = 0;
        job.current_item_id = None;
        job.paused = false;
        job.completed_at = None;
        job.updated_at = Utc::now();
        Ok(())
    }
}

/// In-memory [`WorkItemStore`] over a BTreeMap, so pending order matches
/// the ascending-id order the SQL stores guarantee.
#[derive(Clone, Default)]
pub struct MemoryItemStore {
    items: Arc<Mutex<BTreeMap<Uuid, WorkItem>>>,
    fetch_count: Arc<AtomicUsize>,
}

impl MemoryItemStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert `n` unattached pending items, returning their ids in order.
    pub fn seed_items(&self, n: usize) -> Vec<Uuid> {
        let mut items = self.items.lock().unwrap();
        (0..n)
            .map(|i| {
                let id = new_v7();
                items.insert(
                    id,
                    WorkItem {
                        id,
                        job_id: None,
                        status: ItemStatus::Pending,
                        error_message: None,
                        processed_at: None,
                        payload: serde_json::json!({"seq": i}),
                    },
                );
                id
            })
            .collect()
    }

    /// Force an item's status, for arranging mid-flight states.
    pub fn set_status(&self, id: Uuid, status: ItemStatus) {
        if let Some(item) = self.items.lock().unwrap().get_mut(&id) {
            item.status = status;
        }
    }

    /// Number of items currently in the given status.
    pub fn count_with_status(&self, status: ItemStatus) -> usize {
        self.items
            .lock()
            .unwrap()
            .values()
            .filter(|i| i.status == status)
            .count()
    }

    /// Number of `get_pending` calls made so far.
    pub fn fetch_count(&self) -> usize {
        self.fetch_count.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl WorkItemStore for MemoryItemStore {
    async fn attach_pending(&self, job_id: Uuid, item_ids: &[Uuid]) -> Result<u64> {
        let mut items = self.items.lock().unwrap();
        let mut attached = 0;
        for id in item_ids {
            if let Some(item) = items.get_mut(id) {
                item.job_id = Some(job_id);
                item.status = ItemStatus::Pending;
                item.error_message = None;
                item.processed_at = None;
                attached += 1;
            }
        }
        Ok(attached)
    }

    async fn get_pending(&self, job_id: Uuid, limit: i64) -> Result<Vec<WorkItem>> {
        self.fetch_count.fetch_add(1, Ordering::SeqCst);
        let items = self.items.lock().unwrap();
        Ok(items
            .values()
            .filter(|i| i.job_id == Some(job_id) && i.status == ItemStatus::Pending)
            .take(limit.max(0) as usize)
            .cloned()
            .collect())
    }

    async fn get(&self, id: Uuid) -> Result<WorkItem> {
        self.items
            .lock()
            .unwrap()
            .get(&id)
            .cloned()
            .ok_or(Error::ItemNotFound(id))
    }

    async fn mark_processing(&self, id: Uuid) -> Result<()> {
        let mut items = self.items.lock().unwrap();
        let item = items.get_mut(&id).ok_or(Error::ItemNotFound(id))?;
        item.status = ItemStatus::Processing;
        Ok(())
    }

    async fn complete(&self, id: Uuid, patch: EnrichmentPatch) -> Result<()> {
        patch.validate()?;
        let mut items = self.items.lock().unwrap();
        let item = items.get_mut(&id).ok_or(Error::ItemNotFound(id))?;
        if let Some(obj) = item.payload.as_object_mut() {
            if let Some(research) = patch.research {
                obj.insert("research".to_string(), research);
            }
            if let Some(category) = patch.category {
                obj.insert("category".to_string(), category.into());
            }
            if let Some(tags) = patch.tags {
                obj.insert("tags".to_string(), serde_json::json!(tags));
            }
            if let Some(summary) = patch.summary {
                obj.insert("summary".to_string(), summary.into());
            }
        }
        item.status = ItemStatus::Completed;
        item.error_message = None;
        item.processed_at = Some(Utc::now());
        Ok(())
    }

    async fn fail(&self, id: Uuid, error: &str) -> Result<()> {
        let mut items = self.items.lock().unwrap();
        let item = items.get_mut(&id).ok_or(Error::ItemNotFound(id))?;
        item.status = ItemStatus::Failed;
        item.error_message = Some(error.to_string());
        item.processed_at = Some(Utc::now());
        Ok(())
    }

    async fn reset_to_pending(&self, item_ids: &[Uuid]) -> Result<u64> {
        let mut items = self.items.lock().unwrap();
        let mut reset = 0;
        for id in item_ids {
            if let Some(item) = items.get_mut(id) {
                item.status = ItemStatus::Pending;
                item.error_message = None;
                item.processed_at = None;
                reset += 1;
            }
        }
        Ok(reset)
    }

    async fn reset_processing_for_job(&self, job_id: Uuid) -> Result<u64> {
        let mut items = self.items.lock().unwrap();
        let mut reset = 0;
        for item in items.values_mut() {
            if item.job_id == Some(job_id) && item.status == ItemStatus::Processing {
                item.status = ItemStatus::Pending;
                item.error_message = None;
                item.processed_at = None;
                reset += 1;
            }
        }
        Ok(reset)
    }

    async fn recover_stuck(&self) -> Result<u64> {
        let mut items = self.items.lock().unwrap();
        let mut reset = 0;
        for item in items.values_mut() {
            if item.status == ItemStatus::Processing {
                item.status = ItemStatus::Pending;
                item.error_message = None;
                reset += 1;
            }
        }
        Ok(reset)
    }

    async fn stats(&self, job_id: Uuid) -> Result<QueueStats> {
        let items = self.items.lock().unwrap();
        let mut stats = QueueStats {
            pending: 0,
            processing: 0,
            completed: 0,
            failed: 0,
            total: 0,
        };
        for item in items.values().filter(|i| i.job_id == Some(job_id)) {
            stats.total += 1;
            match item.status {
                ItemStatus::Pending => stats.pending += 1,
                ItemStatus::Processing => stats.processing += 1,
                ItemStatus::Completed => stats.completed += 1,
                ItemStatus::Failed => stats.failed += 1,
            }
        }
        Ok(stats)
    }
}
