//! PostgreSQL storage layer for the enrichment pipeline.
//!
//! Implements the store traits from `prospecta-core` over three tables:
//! `research_jobs`, `accounts`, and `prospects`. All writes go through a
//! contention-retry wrapper, and [`Database::init`] runs migrations and
//! crash recovery before handing out the combined context.

pub mod accounts;
pub mod jobs;
pub mod pool;
pub mod prospects;

mod retry;

use std::sync::Arc;

use tracing::info;

pub use accounts::{NewAccount, PgAccountStore};
pub use jobs::PgJobStore;
pub use pool::{create_pool, create_pool_with_config, PoolConfig};
pub use prospects::{NewProspect, PgProspectStore};

// Re-export core so binaries depend on one crate.
pub use prospecta_core::*;

/// Items moved out of `processing` during startup crash recovery.
#[derive(Debug, Clone, Copy, Default)]
pub struct RecoveryReport {
    pub accounts_reset: u64,
    pub prospects_reset: u64,
}

impl RecoveryReport {
    pub fn total(&self) -> u64 {
        self.accounts_reset + self.prospects_reset
    }
}

/// Combined database context: connection pool plus one repository per table.
#[derive(Clone)]
pub struct Database {
    pool: sqlx::PgPool,
    pub jobs: PgJobStore,
    pub accounts: PgAccountStore,
    pub prospects: PgProspectStore,
}

impl Database {
    /// Build a context around an existing pool. Does not run migrations
    /// or recovery; use [`Database::init`] for full startup.
    pub fn new(pool: sqlx::PgPool) -> Self {
        Self {
            jobs: PgJobStore::new(pool.clone()),
            accounts: PgAccountStore::new(pool.clone()),
            prospects: PgProspectStore::new(pool.clone()),
            pool,
        }
    }

    /// Connect, run migrations, and recover items stranded in `processing`
    /// by a previous crash. This is the single startup entry point.
    pub async fn init(database_url: &str) -> Result<(Self, RecoveryReport)> {
        let pool = create_pool(database_url).await?;

        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .map_err(|e| Error::Internal(format!("migration failed: {e}")))?;

        let db = Self::new(pool);
        let report = db.recover().await?;
        Ok((db, report))
    }

    /// Reset every item stuck in `processing` back to `pending`. A row in
    /// `processing` at startup means the previous process died mid-flight;
    /// the item's outcome was never recorded, so it is safe to redo.
    pub async fn recover(&self) -> Result<RecoveryReport> {
        let accounts_reset = self.accounts.recover_stuck().await?;
        let prospects_reset = self.prospects.recover_stuck().await?;

        let report = RecoveryReport {
            accounts_reset,
            prospects_reset,
        };
        if report.total() > 0 {
            info!(
                subsystem = "db",
                op = "recover",
                accounts_reset,
                prospects_reset,
                "Recovered items stranded in processing"
            );
        }
        Ok(report)
    }

    /// The item store backing a given job kind. Prospect-targeted kinds
    /// read and write the prospects table; everything else, accounts.
    pub fn item_store(&self, kind: JobKind) -> Arc<dyn WorkItemStore> {
        if kind.targets_prospects() {
            Arc::new(self.prospects.clone())
        } else {
            Arc::new(self.accounts.clone())
        }
    }

    /// Access the underlying connection pool.
    pub fn pool(&self) -> &sqlx::PgPool {
        &self.pool
    }
}
