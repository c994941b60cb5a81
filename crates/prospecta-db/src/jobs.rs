//! Job store implementation.

use async_trait::async_trait;
use sqlx::{PgPool, Row};
use uuid::Uuid;

use prospecta_core::{
    new_v7, CreateJobRequest, Error, Job, JobKind, JobStatus, JobStore, Result,
};

use crate::retry::with_contention_retry;

/// PostgreSQL implementation of [`JobStore`].
#[derive(Clone)]
pub struct PgJobStore {
    pool: PgPool,
}

const JOB_COLUMNS: &str = "id, kind, status, total, processed_count, failed_count, \
     current_item_id, paused, created_at, updated_at, completed_at";

impl PgJobStore {
    /// Create a new PgJobStore with the given connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Parse a job row into a Job struct.
    fn parse_job_row(row: sqlx::postgres::PgRow) -> Job {
        Job {
            id: row.get("id"),
            kind: JobKind::parse(row.get("kind")),
            status: JobStatus::parse(row.get("status")),
            total: row.get("total"),
            processed_count: row.get("processed_count"),
            failed_count: row.get("failed_count"),
            current_item_id: row.get("current_item_id"),
            paused: row.get("paused"),
            created_at: row.get("created_at"),
            updated_at: row.get("updated_at"),
            completed_at: row.get("completed_at"),
        }
    }
}

#[async_trait]
impl JobStore for PgJobStore {
    async fn create_job(&self, req: CreateJobRequest) -> Result<Uuid> {
        let job_id = new_v7();
        let req = &req;
        with_contention_retry("create_job", || async move {
            sqlx::query(
                "INSERT INTO research_jobs (id, kind, status, total)
                 VALUES ($1, $2, 'pending', $3)",
            )
            .bind(job_id)
            .bind(req.kind.as_str())
            .bind(req.total)
            .execute(&self.pool)
            .await
            .map_err(Error::Database)?;
            Ok(())
        })
        .await?;
        Ok(job_id)
    }

    async fn get_job(&self, id: Uuid) -> Result<Job> {
        let row = sqlx::query(&format!(
            "SELECT {JOB_COLUMNS} FROM research_jobs WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?;

        row.map(Self::parse_job_row).ok_or(Error::JobNotFound(id))
    }

    async fn list_jobs(&self) -> Result<Vec<Job>> {
        let rows = sqlx::query(&format!(
            "SELECT {JOB_COLUMNS} FROM research_jobs ORDER BY created_at DESC"
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(rows.into_iter().map(Self::parse_job_row).collect())
    }

    async fn update_status(
        &self,
        id: Uuid,
        status: JobStatus,
        current_item: Option<Uuid>,
    ) -> Result<()> {
        // completed_at is stamped once, on the first transition to a
        // terminal status; repeat calls with the same status are no-ops.
        // The WHERE clause keeps terminal statuses sticky so a concurrent
        // non-terminal write cannot resurrect a cancelled job.
        with_contention_retry("update_job_status", || async move {
            let result = sqlx::query(
                "UPDATE research_jobs
                 SET status = $2,
                     current_item_id = COALESCE($3, current_item_id),
                     completed_at = CASE
                         WHEN $2 IN ('completed', 'failed')
                         THEN COALESCE(completed_at, NOW())
                         ELSE completed_at
                     END,
                     updated_at = NOW()
                 WHERE id = $1
                   AND (status NOT IN ('completed', 'failed')
                        OR $2 IN ('completed', 'failed'))",
            )
            .bind(id)
            .bind(status.as_str())
            .bind(current_item)
            .execute(&self.pool)
            .await
            .map_err(Error::Database)?;

            if result.rows_affected() == 0 {
                // Either the job does not exist, or it is terminal and the
                // write tried to move it back to a non-terminal status.
                let current = self.get_job(id).await?;
                return Err(Error::Job(format!(
                    "job {id} is {} and cannot move to {}",
                    current.status.as_str(),
                    status.as_str()
                )));
            }
            Ok(())
        })
        .await
    }

    async fn update_progress(&self, id: Uuid, processed: i64, failed: i64) -> Result<()> {
        with_contention_retry("update_job_progress", || async move {
            let result = sqlx::query(
                "UPDATE research_jobs
                 SET processed_count = $2, failed_count = $3, updated_at = NOW()
                 WHERE id = $1",
            )
            .bind(id)
            .bind(processed)
            .bind(failed)
            .execute(&self.pool)
            .await
            .map_err(Error::Database)?;

            if result.rows_affected() == 0 {
                return Err(Error::JobNotFound(id));
            }
            Ok(())
        })
        .await
    }

    async fn set_paused(&self, id: Uuid, paused: bool) -> Result<()> {
        with_contention_retry("set_job_paused", || async move {
            let result = sqlx::query(
                "UPDATE research_jobs SET paused = $2, updated_at = NOW() WHERE id = $1",
            )
            .bind(id)
            .bind(paused)
            .execute(&self.pool)
            .await
            .map_err(Error::Database)?;

            if result.rows_affected() == 0 {
                return Err(Error::JobNotFound(id));
            }
            Ok(())
        })
        .await
    }

    async fn reset_for_reprocessing(&self, id: Uuid) -> Result<()> {
        with_contention_retry("reset_job_for_reprocessing", || async move {
            let result = sqlx::query(
                "UPDATE research_jobs
                 SET status = 'pending', processed_count = 0, failed_count = 0,
                     current_item_id = NULL, paused = FALSE, completed_at = NULL,
                     updated_at = NOW()
                 WHERE id = $1",
            )
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(Error::Database)?;

            if result.rows_affected() == 0 {
                return Err(Error::JobNotFound(id));
            }
            Ok(())
        })
        .await
    }
}
