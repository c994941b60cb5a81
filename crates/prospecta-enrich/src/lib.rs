//! Enrichment backends for the pipeline.
//!
//! Provides the HTTP client for the internal research service and a
//! scriptable mock used across the workspace's tests.

pub mod client;
pub mod mock;

pub use client::{HttpEnricher, ResearchClient, ResearchClientConfig};
pub use mock::{MockCall, MockEnricher, MockOutcome};
