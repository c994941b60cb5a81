//! Prospect store implementation.
//!
//! Prospects are individual contacts at target accounts. The table is a
//! thinner mirror of accounts and shares the same pipeline state columns.

use async_trait::async_trait;
use serde_json::{json, Value as JsonValue};
use sqlx::{PgPool, Row};
use uuid::Uuid;

use prospecta_core::{
    new_v7, EnrichmentPatch, Error, ItemStatus, QueueStats, Result, WorkItem, WorkItemStore,
};

use crate::retry::with_contention_retry;

/// Request for creating a new prospect under an account.
#[derive(Debug, Clone)]
pub struct NewProspect {
    pub account_id: Uuid,
    pub full_name: String,
    pub title: Option<String>,
    pub email: Option<String>,
}

/// PostgreSQL implementation of [`WorkItemStore`] over the prospects table.
#[derive(Clone)]
pub struct PgProspectStore {
    pool: PgPool,
}

const PROSPECT_COLUMNS: &str = "id, account_id, job_id, status, error_message, processed_at, \
     full_name, title, email, research, summary";

impl PgProspectStore {
    /// Create a new PgProspectStore with the given connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Insert a new prospect (not yet attached to any job).
    pub async fn insert(&self, req: NewProspect) -> Result<Uuid> {
        let id = new_v7();
        let req = &req;
        with_contention_retry("insert_prospect", || async move {
            sqlx::query(
                "INSERT INTO prospects (id, account_id, status, full_name, title, email)
                 VALUES ($1, $2, 'pending', $3, $4, $5)",
            )
            .bind(id)
            .bind(req.account_id)
            .bind(&req.full_name)
            .bind(&req.title)
            .bind(&req.email)
            .execute(&self.pool)
            .await
            .map_err(Error::Database)?;
            Ok(())
        })
        .await?;
        Ok(id)
    }

    fn parse_item_row(row: sqlx::postgres::PgRow) -> WorkItem {
        let research: Option<JsonValue> = row.get("research");
        let payload = json!({
            "account_id": row.get::<Option<Uuid>, _>("account_id"),
            "full_name": row.get::<String, _>("full_name"),
            "title": row.get::<Option<String>, _>("title"),
            "email": row.get::<Option<String>, _>("email"),
            "research": research,
            "summary": row.get::<Option<String>, _>("summary"),
        });

        WorkItem {
            id: row.get("id"),
            job_id: row.get("job_id"),
            status: ItemStatus::parse(row.get("status")),
            error_message: row.get("error_message"),
            processed_at: row.get("processed_at"),
            payload,
        }
    }
}

#[async_trait]
impl WorkItemStore for PgProspectStore {
    async fn attach_pending(&self, job_id: Uuid, item_ids: &[Uuid]) -> Result<u64> {
        with_contention_retry("attach_prospects", || async move {
            let result = sqlx::query(
                "UPDATE prospects
                 SET job_id = $1, status = 'pending', error_message = NULL,
                     processed_at = NULL, updated_at = NOW()
                 WHERE id = ANY($2)",
            )
            .bind(job_id)
            .bind(item_ids)
            .execute(&self.pool)
            .await
            .map_err(Error::Database)?;
            Ok(result.rows_affected())
        })
        .await
    }

    async fn get_pending(&self, job_id: Uuid, limit: i64) -> Result<Vec<WorkItem>> {
        let rows = sqlx::query(&format!(
            "SELECT {PROSPECT_COLUMNS} FROM prospects
             WHERE job_id = $1 AND status = 'pending'
             ORDER BY id ASC
             LIMIT $2"
        ))
        .bind(job_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(rows.into_iter().map(Self::parse_item_row).collect())
    }

    async fn get(&self, id: Uuid) -> Result<WorkItem> {
        let row = sqlx::query(&format!(
            "SELECT {PROSPECT_COLUMNS} FROM prospects WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?;

        row.map(Self::parse_item_row).ok_or(Error::ItemNotFound(id))
    }

    async fn mark_processing(&self, id: Uuid) -> Result<()> {
        with_contention_retry("mark_prospect_processing", || async move {
            let result = sqlx::query(
                "UPDATE prospects SET status = 'processing', updated_at = NOW() WHERE id = $1",
            )
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(Error::Database)?;

            if result.rows_affected() == 0 {
                return Err(Error::ItemNotFound(id));
            }
            Ok(())
        })
        .await
    }

    async fn complete(&self, id: Uuid, patch: EnrichmentPatch) -> Result<()> {
        patch.validate()?;
        let patch = &patch;
        with_contention_retry("complete_prospect", || async move {
            let result = sqlx::query(
                "UPDATE prospects
                 SET research = COALESCE($2, research),
                     summary = COALESCE($3, summary),
                     status = 'completed', error_message = NULL,
                     processed_at = NOW(), updated_at = NOW()
                 WHERE id = $1",
            )
            .bind(id)
            .bind(&patch.research)
            .bind(&patch.summary)
            .execute(&self.pool)
            .await
            .map_err(Error::Database)?;

            if result.rows_affected() == 0 {
                return Err(Error::ItemNotFound(id));
            }
            Ok(())
        })
        .await
    }

    async fn fail(&self, id: Uuid, error: &str) -> Result<()> {
        with_contention_retry("fail_prospect", || async move {
            let result = sqlx::query(
                "UPDATE prospects
                 SET status = 'failed', error_message = $2,
                     processed_at = NOW(), updated_at = NOW()
                 WHERE id = $1",
            )
            .bind(id)
            .bind(error)
            .execute(&self.pool)
            .await
            .map_err(Error::Database)?;

            if result.rows_affected() == 0 {
                return Err(Error::ItemNotFound(id));
            }
            Ok(())
        })
        .await
    }

    async fn reset_to_pending(&self, item_ids: &[Uuid]) -> Result<u64> {
        with_contention_retry("reset_prospects_to_pending", || async move {
            let result = sqlx::query(
                "UPDATE prospects
                 SET status = 'pending', error_message = NULL,
                     processed_at = NULL, updated_at = NOW()
                 WHERE id = ANY($1)",
            )
            .bind(item_ids)
            .execute(&self.pool)
            .await
            .map_err(Error::Database)?;
            Ok(result.rows_affected())
        })
        .await
    }

    async fn reset_processing_for_job(&self, job_id: Uuid) -> Result<u64> {
        with_contention_retry("reset_processing_prospects", || async move {
            let result = sqlx::query(
                "UPDATE prospects
                 SET status = 'pending', error_message = NULL,
                     processed_at = NULL, updated_at = NOW()
                 WHERE job_id = $1 AND status = 'processing'",
            )
            .bind(job_id)
            .execute(&self.pool)
            .await
            .map_err(Error::Database)?;
            Ok(result.rows_affected())
        })
        .await
    }

    async fn recover_stuck(&self) -> Result<u64> {
        with_contention_retry("recover_stuck_prospects", || async move {
            let result = sqlx::query(
                "UPDATE prospects
                 SET status = 'pending', error_message = NULL, updated_at = NOW()
                 WHERE status = 'processing'",
            )
            .execute(&self.pool)
            .await
            .map_err(Error::Database)?;
            Ok(result.rows_affected())
        })
        .await
    }

    async fn stats(&self, job_id: Uuid) -> Result<QueueStats> {
        let row = sqlx::query(
            "SELECT
                 COUNT(*) FILTER (WHERE status = 'pending') AS pending,
                 COUNT(*) FILTER (WHERE status = 'processing') AS processing,
                 COUNT(*) FILTER (WHERE status = 'completed') AS completed,
                 COUNT(*) FILTER (WHERE status = 'failed') AS failed,
                 COUNT(*) AS total
             FROM prospects WHERE job_id = $1",
        )
        .bind(job_id)
        .fetch_one(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(QueueStats {
            pending: row.get("pending"),
            processing: row.get("processing"),
            completed: row.get("completed"),
            failed: row.get("failed"),
            total: row.get("total"),
        })
    }
}
