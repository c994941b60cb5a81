//! # prospecta-pipeline
//!
//! The job pipeline: a generic batch runner that drives enrichment jobs
//! over work items, bounded by a concurrency limit, with per-item retry and
//! durable progress.
//!
//! - [`controller::JobController`] — operator surface: create, start,
//!   pause, resume, cancel, retry
//! - [`scheduler::BatchScheduler`] — per-job batch loop
//! - [`processor::WorkUnitProcessor`] — per-item attempt loop
//! - [`testing`] — in-memory stores used by the workspace's tests

pub mod controller;
pub mod processor;
pub mod scheduler;
pub mod testing;

pub use controller::{JobController, JobRegistry};
pub use processor::{ItemOutcome, WorkUnitProcessor};
pub use scheduler::BatchScheduler;
