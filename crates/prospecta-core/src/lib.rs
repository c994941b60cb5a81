//! # prospecta-core
//!
//! Core types, traits, and abstractions for the prospecta enrichment
//! pipeline.
//!
//! This crate provides:
//! - The job/work-item data model and status machines
//! - Store traits implemented by `prospecta-db` (PostgreSQL) and by the
//!   in-memory test stores
//! - The [`Enricher`] collaborator trait implemented by `prospecta-enrich`
//! - The pure retry/backoff policy and error classification
//! - Pipeline configuration and shared default constants

pub mod config;
pub mod defaults;
pub mod enrichment;
pub mod error;
pub mod logging;
pub mod models;
pub mod retry;
pub mod traits;

pub use config::PipelineConfig;
pub use enrichment::{Enricher, EnrichmentRequest};
pub use error::{Error, Result};
pub use models::{
    CreateJobRequest, EnrichmentPatch, ItemStatus, Job, JobKind, JobStatus, QueueStats, WorkItem,
};
pub use retry::{classify, BackoffPolicy, ErrorClass};
pub use traits::{JobStore, WorkItemStore};

/// Generate a time-ordered UUIDv7 for new records.
pub fn new_v7() -> uuid::Uuid {
    uuid::Uuid::now_v7()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_v7_is_time_ordered() {
        let a = new_v7();
        std::thread::sleep(std::time::Duration::from_millis(2));
        let b = new_v7();
        assert!(a < b);
    }
}
