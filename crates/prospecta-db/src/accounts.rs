//! Account store implementation.
//!
//! Accounts are the target companies the pipeline enriches. The pipeline
//! only drives the `status` / `error_message` / `processed_at` columns; the
//! domain columns ride through as the opaque item payload.

use async_trait::async_trait;
use serde_json::{json, Value as JsonValue};
use sqlx::{PgPool, Row};
use uuid::Uuid;

use prospecta_core::{
    new_v7, EnrichmentPatch, Error, ItemStatus, QueueStats, Result, WorkItem, WorkItemStore,
};

use crate::retry::with_contention_retry;

/// Request for creating a new account.
#[derive(Debug, Clone)]
pub struct NewAccount {
    pub company_name: String,
    pub website: Option<String>,
    pub industry: Option<String>,
    pub employee_range: Option<String>,
}

/// PostgreSQL implementation of [`WorkItemStore`] over the accounts table.
#[derive(Clone)]
pub struct PgAccountStore {
    pool: PgPool,
}

const ACCOUNT_COLUMNS: &str = "id, job_id, status, error_message, processed_at, company_name, \
     website, industry, employee_range, research, category, tags, summary";

impl PgAccountStore {
    /// Create a new PgAccountStore with the given connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Insert a new account (not yet attached to any job).
    pub async fn insert(&self, req: NewAccount) -> Result<Uuid> {
        let id = new_v7();
        let req = &req;
        with_contention_retry("insert_account", || async move {
            sqlx::query(
                "INSERT INTO accounts (id, status, company_name, website, industry, employee_range)
                 VALUES ($1, 'pending', $2, $3, $4, $5)",
            )
            .bind(id)
            .bind(&req.company_name)
            .bind(&req.website)
            .bind(&req.industry)
            .bind(&req.employee_range)
            .execute(&self.pool)
            .await
            .map_err(Error::Database)?;
            Ok(())
        })
        .await?;
        Ok(id)
    }

    /// Parse an account row into the pipeline's work item shape.
    fn parse_item_row(row: sqlx::postgres::PgRow) -> WorkItem {
        let research: Option<JsonValue> = row.get("research");
        let tags: Option<Vec<String>> = row.get("tags");
        let payload = json!({
            "company_name": row.get::<String, _>("company_name"),
            "website": row.get::<Option<String>, _>("website"),
            "industry": row.get::<Option<String>, _>("industry"),
            "employee_range": row.get::<Option<String>, _>("employee_range"),
            "research": research,
            "category": row.get::<Option<String>, _>("category"),
            "tags": tags,
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
impl WorkItemStore for PgAccountStore {
    async fn attach_pending(&self, job_id: Uuid, item_ids: &[Uuid]) -> Result<u64> {
        with_contention_retry("attach_accounts", || async move {
            let result = sqlx::query(
                "UPDATE accounts
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
            "SELECT {ACCOUNT_COLUMNS} FROM accounts
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
            "SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?;

        row.map(Self::parse_item_row).ok_or(Error::ItemNotFound(id))
    }

    async fn mark_processing(&self, id: Uuid) -> Result<()> {
        with_contention_retry("mark_account_processing", || async move {
            let result = sqlx::query(
                "UPDATE accounts SET status = 'processing', updated_at = NOW() WHERE id = $1",
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
        // One statement: results and status land atomically.
        with_contention_retry("complete_account", || async move {
            let result = sqlx::query(
                "UPDATE accounts
                 SET research = COALESCE($2, research),
                     category = COALESCE($3, category),
                     tags = COALESCE($4, tags),
                     summary = COALESCE($5, summary),
                     status = 'completed', error_message = NULL,
                     processed_at = NOW(), updated_at = NOW()
                 WHERE id = $1",
            )
            .bind(id)
            .bind(&patch.research)
            .bind(&patch.category)
            .bind(&patch.tags)
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
        with_contention_retry("fail_account", || async move {
            let result = sqlx::query(
                "UPDATE accounts
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
        with_contention_retry("reset_accounts_to_pending", || async move {
            let result = sqlx::query(
                "UPDATE accounts
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
        with_contention_retry("reset_processing_accounts", || async move {
            let result = sqlx::query(
                "UPDATE accounts
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
        with_contention_retry("recover_stuck_accounts", || async move {
            let result = sqlx::query(
                "UPDATE accounts
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
             FROM accounts WHERE job_id = $1",
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
